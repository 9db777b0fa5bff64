use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unit string used for every temperature reading
pub const CELSIUS: &str = "°C";

/// Coarse classification of the chip a sensor belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorCategory {
    Cpu,
    Gpu,
    Storage,
    Motherboard,
}

impl SensorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorCategory::Cpu => "CPU",
            SensorCategory::Gpu => "GPU",
            SensorCategory::Storage => "HDD/SSD",
            SensorCategory::Motherboard => "Motherboard",
        }
    }
}

impl fmt::Display for SensorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timestamped sensor sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub key: String,
    pub label: String,
    pub value: f64,
    pub unit: String,
    pub category: SensorCategory,
    pub timestamp: DateTime<Utc>,
}

impl Reading {
    /// Temperature reading in degrees Celsius, stamped with the current time
    pub fn celsius(
        key: impl Into<String>,
        label: impl Into<String>,
        value: f64,
        category: SensorCategory,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            value,
            unit: CELSIUS.to_string(),
            category,
            timestamp: Utc::now(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Aggregate over a run of readings from one sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReadingStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl ReadingStats {
    /// Returns `None` for an empty slice
    pub fn from_readings(readings: &[Reading]) -> Option<Self> {
        if readings.is_empty() {
            return None;
        }

        let (min, max, sum) = readings.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), r| (min.min(r.value), max.max(r.value), sum + r.value),
        );

        Some(Self {
            count: readings.len(),
            min,
            max,
            mean: sum / readings.len() as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_celsius_reading() {
        let reading = Reading::celsius("k10temp_Tctl_temp1_input", "Tctl", 52.0, SensorCategory::Cpu);
        assert_eq!(reading.unit, "°C");
        assert_eq!(reading.category.to_string(), "CPU");
    }

    #[test]
    fn test_category_serializes_lowercase() {
        let json = serde_json::to_string(&SensorCategory::Storage).unwrap();
        assert_eq!(json, "\"storage\"");
        assert_eq!(SensorCategory::Storage.as_str(), "HDD/SSD");
    }

    #[test]
    fn test_stats() {
        let readings: Vec<Reading> = [40.0, 50.0, 60.0]
            .iter()
            .map(|v| Reading::celsius("chip_temp1_input", "CPU", *v, SensorCategory::Cpu))
            .collect();

        let stats = ReadingStats::from_readings(&readings).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, 40.0);
        assert_eq!(stats.max, 60.0);
        assert_eq!(stats.mean, 50.0);

        assert!(ReadingStats::from_readings(&[]).is_none());
    }
}
