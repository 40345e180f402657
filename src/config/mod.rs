use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::time::Duration;

use anyhow::{Context, bail};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub flow_endpoint: String,
    pub graph_endpoint: String,
    /// Optional query parameters for the graph endpoint.
    pub graph_params: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub request_interval_secs: u64,
    pub storage_interval_secs: u64,
    pub output_dir: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub shutdown_grace_secs: u64,
    pub service: ServiceConfig,
    pub recorder: RecorderConfig,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("reading config '{}'", path))?;
        let config: Self = toml::from_str(&content)?;
        config.validate().context("config validation failed")?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.service.base_url.trim().is_empty() {
            bail!("service.base_url must not be empty");
        }
        if !self.service.flow_endpoint.starts_with('/') {
            bail!("service.flow_endpoint must start with '/'");
        }
        if !self.service.graph_endpoint.starts_with('/') {
            bail!("service.graph_endpoint must start with '/'");
        }
        if self.recorder.request_interval_secs == 0 {
            bail!("recorder.request_interval_secs must be > 0");
        }
        if self.recorder.storage_interval_secs == 0 {
            bail!("recorder.storage_interval_secs must be > 0");
        }
        if self.recorder.output_dir.trim().is_empty() {
            bail!("recorder.output_dir must not be empty");
        }
        if self.shutdown_grace_secs == 0 {
            bail!("shutdown_grace_secs must be > 0");
        }
        Ok(())
    }

    pub fn request_interval(&self) -> Duration {
        Duration::from_secs(self.recorder.request_interval_secs)
    }

    pub fn storage_interval(&self) -> Duration {
        Duration::from_secs(self.recorder.storage_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn flow_url(&self) -> String {
        format!(
            "{}{}",
            self.service.base_url.trim_end_matches('/'),
            self.service.flow_endpoint
        )
    }

    pub fn graph_url(&self) -> String {
        format!(
            "{}{}",
            self.service.base_url.trim_end_matches('/'),
            self.service.graph_endpoint
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            shutdown_grace_secs: 30,
            service: ServiceConfig::default(),
            recorder: RecorderConfig::default(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            flow_endpoint: "/ndt/get_detected_flow_data".to_string(),
            graph_endpoint: "/ndt/get_graph_data".to_string(),
            graph_params: HashMap::new(),
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            request_interval_secs: 1,
            storage_interval_secs: 300,
            output_dir: "./recorded_info".to_string(),
        }
    }
}
