use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::{Reading, SensorCategory, CELSIUS};
use crate::ports::SourceError;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to parse sensor data as JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected sensors output format: {0}")]
    UnexpectedFormat(String),
}

impl From<ParseError> for SourceError {
    fn from(err: ParseError) -> Self {
        SourceError::Malformed(err.to_string())
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/// Parse the output of `sensors -j`.
///
/// Layout is `{ chip: { feature: { subfeature: number } } }`. Only
/// temperature inputs become readings; limits, alarms, fans and voltages
/// are skipped, as is anything that is not an object at the chip or
/// feature level (e.g. the `"Adapter"` string).
pub fn parse_sensors_json(content: &str, timestamp: DateTime<Utc>) -> ParseResult<Vec<Reading>> {
    let value: Value = serde_json::from_str(content)?;
    let chips = value.as_object().ok_or_else(|| {
        ParseError::UnexpectedFormat("expected top-level JSON object".to_string())
    })?;

    let mut readings = Vec::new();

    for (chip_name, chip_data) in chips {
        let Some(features) = chip_data.as_object() else {
            continue;
        };

        let category = categorize_chip(chip_name);
        for (feature_name, feature_data) in features {
            let Some(subfeatures) = feature_data.as_object() else {
                continue;
            };

            let label = feature_label(feature_name, subfeatures);
            for (subfeature_name, value) in subfeatures {
                if !is_temperature_input(feature_name, subfeature_name) {
                    continue;
                }
                let Some(value) = value.as_f64() else {
                    continue;
                };

                readings.push(Reading {
                    key: format!("{chip_name}_{feature_name}_{subfeature_name}"),
                    label: label.clone(),
                    value,
                    unit: CELSIUS.to_string(),
                    category,
                    timestamp,
                });
            }
        }
    }

    Ok(readings)
}

fn feature_label(feature_name: &str, subfeatures: &Map<String, Value>) -> String {
    match subfeatures.get("label") {
        Some(Value::String(label)) => label.clone(),
        Some(other) => other.to_string(),
        None => feature_name.to_string(),
    }
}

/// True when the subfeature is a temperature input (`tempN_input`, or any
/// `_input` under a `temp*`, `Tctl` or `Tdie` feature)
pub fn is_temperature_input(feature_name: &str, subfeature_name: &str) -> bool {
    let subfeature = subfeature_name.to_lowercase();
    let feature = feature_name.to_lowercase();

    if !subfeature.ends_with("_input") {
        return false;
    }

    subfeature.contains("temp")
        || feature.starts_with("temp")
        || feature.starts_with("tctl")
        || feature.starts_with("tdie")
}

/// Map a chip name such as `k10temp-pci-00c3` to a category
pub fn categorize_chip(chip_name: &str) -> SensorCategory {
    let chip = chip_name.to_lowercase();

    if ["cpu", "core", "k10temp"].iter().any(|p| chip.contains(p)) {
        SensorCategory::Cpu
    } else if ["gpu", "nvidia", "amdgpu"].iter().any(|p| chip.contains(p)) {
        SensorCategory::Gpu
    } else if ["nvme", "drivetemp"].iter().any(|p| chip.contains(p)) {
        SensorCategory::Storage
    } else {
        SensorCategory::Motherboard
    }
}
