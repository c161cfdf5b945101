//! HTTP request handlers.

pub mod boards;
pub mod meta;
pub mod notes;
pub mod sync;

pub use boards::*;
pub use meta::*;
pub use notes::*;
pub use sync::*;
