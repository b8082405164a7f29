//! Storage abstraction for studysync.
//!
//! Backend crates (e.g., studysync-store-sqlite) implement [`Store`] so the
//! coordinator doesn't depend on any specific database engine or schema details.

use thiserror::Error;

mod store;
pub mod types;

pub use store::*;
pub use types::*;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    /// A compare-and-set lost a race or the database was busy. Safe to retry.
    #[error("conflict")]
    Conflict,
    #[error("capacity exceeded")]
    CapacityExceeded,
    #[error("validation failed: {0}")]
    Validation(String),
    /// The backend could not be reached in time. Safe to retry.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Transient failures the caller may retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Conflict | StoreError::Unavailable(_))
    }
}
