//! Tolerant comparisons for heuristic scores
//!
//! Scores are real-valued sums, so two lines of play that should tie can differ
//! in the last bits. Infinite scores compare equal to themselves.

pub const EPSILON: f64 = 1e-6;

/// `a` is greater than `b` by more than the tolerance.
pub fn near_gt(a: f64, b: f64) -> bool {
    a - EPSILON > b
}

/// `a` is less than `b` by more than the tolerance.
pub fn near_lt(a: f64, b: f64) -> bool {
    a + EPSILON < b
}

pub fn near_eq(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() < EPSILON
}
