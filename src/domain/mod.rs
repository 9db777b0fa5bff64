pub mod history;
pub mod reading;

pub use history::{History, DEFAULT_HISTORY_CAPACITY};
pub use reading::{Reading, ReadingStats, SensorCategory, CELSIUS};
