use anyhow::Result;
use coinosis_assessment::{DistributionConfig, SubmissionConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    pub backend: BackendConfig,
    pub settlement: SettlementConfig,
    pub distribution: DistributionSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Gas price of direct clap calls, in wei
    pub gas_price_wei: u64,
    /// Relay confirmation poll interval
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionSettings {
    pub commitment_window_secs: u64,
    pub gate_poll_interval_secs: u64,
    pub gas_limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty`, `compact` or `json`
    pub format: String,
    pub file_output: Option<PathBuf>,
    #[serde(default)]
    pub module_filters: HashMap<String, String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            gas_price_wei: 20_000_000_000,
            poll_interval_ms: 1000,
        }
    }
}

impl Default for DistributionSettings {
    fn default() -> Self {
        Self {
            commitment_window_secs: 5 * 60,
            gate_poll_interval_secs: 10,
            gas_limit: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_output: None,
            module_filters: HashMap::new(),
        }
    }
}

impl ClientConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("COINOSIS_BACKEND_URL") {
            if !url.is_empty() {
                self.backend.url = url;
            }
        }
        if let Ok(timeout) = env::var("COINOSIS_BACKEND_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.backend.timeout_secs = secs;
            }
        }

        if let Ok(price) = env::var("COINOSIS_GAS_PRICE_WEI") {
            if let Ok(wei) = price.parse() {
                self.settlement.gas_price_wei = wei;
            }
        }
        if let Ok(interval) = env::var("COINOSIS_POLL_INTERVAL_MS") {
            if let Ok(ms) = interval.parse() {
                self.settlement.poll_interval_ms = ms;
            }
        }

        if let Ok(window) = env::var("COINOSIS_COMMITMENT_WINDOW_SECS") {
            if let Ok(secs) = window.parse() {
                self.distribution.commitment_window_secs = secs;
            }
        }

        if let Ok(level) = env::var("COINOSIS_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = env::var("COINOSIS_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    pub fn submission_config(&self) -> SubmissionConfig {
        SubmissionConfig {
            gas_price: u128::from(self.settlement.gas_price_wei),
            poll_interval: Duration::from_millis(self.settlement.poll_interval_ms),
        }
    }

    pub fn distribution_config(&self) -> DistributionConfig {
        DistributionConfig {
            commitment_window: Duration::from_secs(self.distribution.commitment_window_secs),
            gate_poll_interval: Duration::from_secs(self.distribution.gate_poll_interval_secs),
            gas_limit: self.distribution.gas_limit,
        }
    }
}
