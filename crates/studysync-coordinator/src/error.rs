use studysync_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("group is full")]
    CapacityExceeded,
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("not eligible: {0}")]
    NotEligible(String),
    #[error("rating already submitted for this group")]
    DuplicateRating,
    #[error("concurrent update conflict")]
    ConcurrencyConflict,
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("rating edit not permitted: {0}")]
    EditNotPermitted(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl CoordinatorError {
    pub(crate) fn transition(from: impl ToString, to: impl ToString) -> Self {
        CoordinatorError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Transient failures the retry loop may re-run.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoordinatorError::ConcurrencyConflict | CoordinatorError::StorageUnavailable(_)
        )
    }
}

impl From<StoreError> for CoordinatorError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => CoordinatorError::NotFound("record"),
            // a unique key lost to a concurrent insert; the rerun sees the winner
            StoreError::AlreadyExists => CoordinatorError::ConcurrencyConflict,
            StoreError::Conflict => CoordinatorError::ConcurrencyConflict,
            StoreError::CapacityExceeded => CoordinatorError::CapacityExceeded,
            StoreError::Validation(msg) => CoordinatorError::Validation(msg),
            StoreError::Unavailable(msg) => CoordinatorError::StorageUnavailable(msg),
            StoreError::Backend(msg) => CoordinatorError::Storage(msg),
        }
    }
}

/// Map `StoreError::NotFound` to a named entity, everything else as usual.
pub(crate) fn not_found_as(what: &'static str) -> impl Fn(StoreError) -> CoordinatorError {
    move |e| match e {
        StoreError::NotFound => CoordinatorError::NotFound(what),
        other => other.into(),
    }
}
