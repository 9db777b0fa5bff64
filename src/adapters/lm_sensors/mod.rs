mod parser;

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;
use tracing::debug;

use crate::domain::Reading;
use crate::ports::{SensorSource, SourceError};

pub use parser::{categorize_chip, is_temperature_input, parse_sensors_json, ParseError};

/// How to invoke the lm-sensors CLI
#[derive(Debug, Clone)]
pub struct LmSensorsConfig {
    pub command: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl LmSensorsConfig {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            args: vec!["-j".to_string()],
            timeout,
        }
    }
}

impl Default for LmSensorsConfig {
    fn default() -> Self {
        Self::new("sensors", Duration::from_secs(10))
    }
}

/// Sensor source backed by `sensors -j`
#[derive(Debug, Clone)]
pub struct LmSensorsSource {
    config: LmSensorsConfig,
    program: Option<PathBuf>,
}

impl LmSensorsSource {
    /// The command is resolved once, here; a missing tool is reported on
    /// every read rather than at construction.
    pub fn new(config: LmSensorsConfig) -> Self {
        let program = locate(&config.command);
        Self { config, program }
    }

    pub fn with_defaults() -> Self {
        Self::new(LmSensorsConfig::default())
    }

    pub fn is_available(&self) -> bool {
        self.program.is_some()
    }

    async fn run_command(&self) -> Result<String, SourceError> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| SourceError::Unavailable(self.config.command.clone()))?;

        let output = Command::new(program)
            .args(&self.config.args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.config.timeout, output)
            .await
            .map_err(|_| SourceError::Timeout(self.config.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SourceError::CommandFailed(stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl SensorSource for LmSensorsSource {
    async fn current_readings(&self) -> Result<Vec<Reading>, SourceError> {
        let output = self.run_command().await?;
        if output.is_empty() {
            return Ok(Vec::new());
        }

        let readings = parse_sensors_json(&output, Utc::now())?;
        debug!(count = readings.len(), "parsed sensor readings");
        Ok(readings)
    }
}

/// Resolve a command name against `PATH`, or check it directly when it
/// already contains a path separator
fn locate(command: &str) -> Option<PathBuf> {
    let candidate = Path::new(command);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(command))
        .find(|path| path.is_file())
}
