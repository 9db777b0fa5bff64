use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::Reading;

/// Failure reported by a sensor source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("sensor tool is not available: {0}")]
    Unavailable(String),

    #[error("timed out after {0:?} waiting for sensor data")]
    Timeout(Duration),

    #[error("sensor command failed: {0}")]
    CommandFailed(String),

    #[error("malformed sensor data: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Port for sampling the current set of hardware sensors
#[async_trait]
pub trait SensorSource: Send + Sync {
    /// Read every sensor once. Each call produces a fresh batch stamped
    /// with the time of the read.
    async fn current_readings(&self) -> Result<Vec<Reading>, SourceError>;
}
