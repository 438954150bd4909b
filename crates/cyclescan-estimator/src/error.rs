//! Estimator error types.
//!
//! Thin or missing data is never an error here; it is reported through
//! [`RateOutcome::InsufficientData`](crate::RateOutcome) and
//! [`RateBasis`](crate::RateBasis). Errors cover misuse and failures of the
//! snapshot source.

use thiserror::Error;

use cyclescan_core::CoreError;

#[derive(Debug, Error)]
pub enum EstimateError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("at least one window is required")]
    NoWindows,

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("unknown group: {0}")]
    UnknownGroup(String),

    #[error("snapshot source error: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("estimation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl EstimateError {
    pub fn from_source<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        EstimateError::Source(Box::new(err))
    }
}

pub type EstimateResult<T> = Result<T, EstimateError>;
