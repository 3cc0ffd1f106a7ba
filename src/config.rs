//! Monitoring configuration and the JSON batch file model.

use crate::constants::sampling;
use crate::error::{BenchError, Result};

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings shared by every sampler attached to one experiment
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Interval between two samples of the same sampler
    pub interval: Duration,
    /// Whether memory is summed over the whole process tree
    pub include_children: bool,
    /// Prefix used to derive the per-sampler log file names
    pub record_path: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: sampling::STANDARD,
            include_children: true,
            record_path: None,
        }
    }
}

impl MonitorConfig {
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(BenchError::InvalidConfiguration(
                "Sampling interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Replace the record path prefix
    pub fn with_record_path(mut self, record_path: Option<PathBuf>) -> Self {
        self.record_path = record_path;
        self
    }

    /// Derive a log file name from the record path prefix, if any
    pub fn record_file(&self, suffix: &str) -> Option<PathBuf> {
        self.record_path
            .as_deref()
            .map(|prefix| derive_record_file(prefix, suffix))
    }
}

/// Append `suffix` to `prefix` without touching its existing extension.
pub fn derive_record_file(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

#[derive(Debug, Clone)]
pub struct MonitorConfigBuilder {
    interval_ms: u64,
    include_children: bool,
    record_path: Option<PathBuf>,
}

impl Default for MonitorConfigBuilder {
    fn default() -> Self {
        Self {
            interval_ms: sampling::STANDARD.as_millis() as u64,
            include_children: true,
            record_path: None,
        }
    }
}

impl MonitorConfigBuilder {
    pub fn interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    pub fn include_children(mut self, include_children: bool) -> Self {
        self.include_children = include_children;
        self
    }

    pub fn record_path(mut self, record_path: impl Into<PathBuf>) -> Self {
        self.record_path = Some(record_path.into());
        self
    }

    pub fn build(self) -> Result<MonitorConfig> {
        let config = MonitorConfig {
            interval: Duration::from_millis(self.interval_ms),
            include_children: self.include_children,
            record_path: self.record_path,
        };
        config.validate()?;
        Ok(config)
    }
}

fn default_interval_ms() -> u64 {
    sampling::STANDARD.as_millis() as u64
}

fn default_include_children() -> bool {
    true
}

/// One entry of a batch file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSpec {
    pub name: String,
    pub command: Vec<String>,
    #[serde(default)]
    pub record_path: Option<PathBuf>,
}

/// A batch of experiments as read from a JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_include_children")]
    pub include_children: bool,
    pub experiments: Vec<ExperimentSpec>,
}

impl BatchConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: BatchConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        self.base_monitor_config().validate()?;
        for spec in &self.experiments {
            if spec.command.is_empty() {
                return Err(BenchError::InvalidConfiguration(format!(
                    "Experiment \"{}\" has an empty command",
                    spec.name
                )));
            }
        }
        Ok(())
    }

    /// Monitor settings for one entry of the batch
    pub fn monitor_config(&self, spec: &ExperimentSpec) -> MonitorConfig {
        self.base_monitor_config()
            .with_record_path(spec.record_path.clone())
    }

    fn base_monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            interval: Duration::from_millis(self.interval_ms),
            include_children: self.include_children,
            record_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_config_validation() {
        let config = MonitorConfig::builder().interval_ms(0).build();
        assert!(config.is_err());
    }

    #[test]
    fn test_monitor_config_builder() -> Result<()> {
        let config = MonitorConfig::builder()
            .interval_ms(250)
            .include_children(false)
            .record_path("out/ex1")
            .build()?;

        assert_eq!(config.interval, Duration::from_millis(250));
        assert!(!config.include_children);
        assert_eq!(config.record_path, Some(PathBuf::from("out/ex1")));
        Ok(())
    }

    #[test]
    fn test_record_file_keeps_prefix_dots() {
        let config = MonitorConfig::default().with_record_path(Some("runs/v1.2".into()));
        assert_eq!(
            config.record_file(".cpu.report"),
            Some(PathBuf::from("runs/v1.2.cpu.report"))
        );
        assert_eq!(MonitorConfig::default().record_file(".cpu.report"), None);
    }

    #[test]
    fn test_batch_config_defaults() -> Result<()> {
        let batch = BatchConfig::from_json(
            r#"{"experiments": [{"name": "Simple", "command": ["true"]}]}"#,
        )?;

        assert_eq!(batch.interval_ms, 100);
        assert!(batch.include_children);
        assert_eq!(batch.experiments.len(), 1);
        assert_eq!(batch.experiments[0].record_path, None);
        Ok(())
    }

    #[test]
    fn test_batch_config_rejects_empty_command() {
        let batch = BatchConfig::from_json(
            r#"{"experiments": [{"name": "Broken", "command": []}]}"#,
        );
        assert!(matches!(batch, Err(BenchError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_batch_config_monitor_config() -> Result<()> {
        let batch = BatchConfig::from_json(
            r#"{
                "interval_ms": 20,
                "include_children": false,
                "experiments": [{"name": "A", "command": ["true"], "record_path": "ex1"}]
            }"#,
        )?;

        let config = batch.monitor_config(&batch.experiments[0]);
        assert_eq!(config.interval, Duration::from_millis(20));
        assert!(!config.include_children);
        assert_eq!(config.record_path, Some(PathBuf::from("ex1")));
        Ok(())
    }
}
