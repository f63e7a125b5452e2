// Error types for pool construction and control

use std::time::Duration;

use thiserror::Error;

use crate::target::MIN_POLL_INTERVAL;

/// Result type alias for pool operations
pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors returned synchronously by pool operations
///
/// The reconcile loop never reports through this type; anything it runs
/// into is logged and the tick is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Poll interval below the allowed floor
    #[error("duration below minimum ({min:?}): got {requested:?}", min = MIN_POLL_INTERVAL)]
    PollIntervalTooShort { requested: Duration },

    /// Pool built without a work function
    #[error("work function is missing, the pool would not start")]
    MissingWorkFunction,

    /// No tokio runtime to host the reconcile loop
    #[error("no async runtime available to run the pool")]
    NoRuntime,

    /// Malformed configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Workers still registered when the shutdown deadline passed
    #[error("graceful shutdown timed out with {remaining} workers still running")]
    ShutdownTimeout { remaining: u64 },
}

impl PoolError {
    /// Create an invalid configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        PoolError::InvalidConfig(msg.into())
    }

    /// Whether the error was caused by caller-supplied configuration
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PoolError::PollIntervalTooShort { .. }
                | PoolError::MissingWorkFunction
                | PoolError::NoRuntime
                | PoolError::InvalidConfig(_)
        )
    }
}
