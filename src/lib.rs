//! Background temperature sensor collection with per-sensor history and
//! drain-on-demand delivery of readings and errors.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{CollectorConfig, CollectorService, DrainStats, MonitorError};
pub use config::Config;
pub use domain::{History, Reading, ReadingStats, SensorCategory};
pub use ports::{SensorSource, SourceError};
