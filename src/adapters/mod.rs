pub mod lm_sensors;

pub use lm_sensors::{LmSensorsConfig, LmSensorsSource};
