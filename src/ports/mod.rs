pub mod sensor_source;

pub use sensor_source::{SensorSource, SourceError};
