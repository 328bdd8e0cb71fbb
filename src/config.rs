use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

#[derive(clap::ValueEnum, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Debug,
    Json,
}

/// Daemon settings read from a YAML file.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DaemonConfig {
    #[serde(default = "DaemonConfig::default_interval", with = "humantime_serde")]
    pub interval: Duration,
    #[serde(default = "DaemonConfig::default_metrics")]
    pub metrics: Vec<String>,
    #[serde(default = "DaemonConfig::default_format")]
    pub format: OutputFormat,
}

impl DaemonConfig {
    fn default_interval() -> Duration {
        Duration::from_secs(10)
    }

    fn default_metrics() -> Vec<String> {
        vec!["status".into()]
    }

    fn default_format() -> OutputFormat {
        OutputFormat::Debug
    }

    pub fn load(config_file_path: &str) -> Result<Self> {
        log::debug!("Loading config file from {config_file_path:?}");
        let config_file = std::fs::File::open(config_file_path)
            .with_context(|| format!("Cannot open daemon config file {config_file_path:?}"))?;
        let config: Self = serde_yaml::from_reader(&config_file).with_context(|| {
            format!("Cannot read daemon config from file: {config_file_path:?}")
        })?;
        Ok(config)
    }
}
