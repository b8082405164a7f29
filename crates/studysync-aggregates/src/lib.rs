//! Aggregate recomputation engine.
//!
//! Every function here is pure: it derives an aggregate (or a delta to one)
//! from detail rows and never touches storage. The same functions back both
//! the incremental path (stores applying a delta inside a transaction) and
//! the bulk path (the verifier rescanning every detail row), so the two agree
//! for any logical state.

mod membership;
mod ratings;
mod schedule;
mod users;

pub use membership::*;
pub use ratings::*;
pub use schedule::*;
pub use users::*;

/// Arithmetic mean of `count` values summing to `sum`; `None` for an empty set.
pub fn mean(sum: i64, count: i64) -> Option<f64> {
    if count <= 0 {
        None
    } else {
        Some(sum as f64 / count as f64)
    }
}
