use thiserror::Error;

use crate::ports::SourceError;

/// Error event delivered to registered error callbacks
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("sensor source {0}")]
    SourcePanic(String),

    #[error("reading callback failed: {0}")]
    Callback(String),
}

impl MonitorError {
    pub fn is_source(&self) -> bool {
        matches!(self, MonitorError::Source(_) | MonitorError::SourcePanic(_))
    }
}
