//! Fractional position keys for ordered lists.
//!
//! Columns within a board and tasks within a column are ordered by a
//! floating-point position key. Inserting between two neighbors takes their
//! midpoint, so a move writes exactly one row. Only relative order matters;
//! the key value itself is never shown to users.
//!
//! Repeated insertion between the same two neighbors halves the gap each
//! time and eventually exhausts f64 precision. [`needs_rebalance`] detects
//! that condition so callers can renumber the whole list (see
//! [`renumbered_position`]) before allocating.

/// Position assigned to the first item of an empty list.
pub const POSITION_SEED: f64 = 1000.0;

/// Gap between consecutive keys after a renumbering pass.
pub const POSITION_SPACING: f64 = 1000.0;

/// Compute the position key for an item placed between `before` and `after`.
///
/// `before` is the neighbor that will precede the item, `after` the neighbor
/// that will follow it. Callers moving an item within its own list must
/// exclude the moved item when picking neighbors so it is never compared
/// against itself.
pub fn allocate(before: Option<f64>, after: Option<f64>) -> f64 {
    match (before, after) {
        (Some(b), Some(a)) => (b + a) / 2.0,
        (None, Some(a)) => a - 1.0,
        (Some(b), None) => b + 1.0,
        (None, None) => POSITION_SEED,
    }
}

/// Check whether the gap between two neighbors is too small to split again.
///
/// True when the neighbors are closer than `epsilon` or when their midpoint
/// no longer strictly separates them (f64 precision exhausted). Callers
/// should renumber the list and retry the allocation.
pub fn needs_rebalance(before: Option<f64>, after: Option<f64>, epsilon: f64) -> bool {
    let (Some(b), Some(a)) = (before, after) else {
        return false;
    };
    if a - b <= epsilon {
        return true;
    }
    let mid = (b + a) / 2.0;
    !(b < mid && mid < a)
}

/// Position key for the item at `index` (0-based) after a renumbering pass.
pub fn renumbered_position(index: usize) -> f64 {
    POSITION_SPACING * (index as f64 + 1.0)
}
