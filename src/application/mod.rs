pub mod collector;
pub mod error;

pub use collector::{
    CallbackResult, CollectorConfig, CollectorService, DrainStats, ErrorCallback, ReadingCallback,
    DEFAULT_POLL_INTERVAL,
};
pub use error::MonitorError;
