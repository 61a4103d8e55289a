use serde_derive::Deserialize;
use std::collections::BTreeMap;
use std::{env, fs};

pub const DEFAULT_CONFIG_PATH: &str = "energymeter.toml";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:7126";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// One `[[meters]]` entry. The sensor references are only checked when the
/// meter is registered.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeterConfig {
    pub name: String,
    pub power_sensor: String,
    pub consumption_sensor: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HomeAssistantConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
    /// Sensor id -> Home Assistant entity id. Sensor ids must not contain
    /// `.` so that meters can reference them as `<sensor>.<field>`.
    #[serde(default)]
    pub sensors: BTreeMap<String, String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    pub home_assistant: Option<HomeAssistantConfig>,
    #[serde(default)]
    pub meters: Vec<MeterConfig>,
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl AppConfig {
    /// Reads the file named by `ENERGY_CONFIG` and applies env overrides
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var("ENERGY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let contents = fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read config '{path}': {e}"))?;
        let mut cfg = Self::from_toml(&contents)?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn from_toml(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(bind_addr) = env::var("ENERGY_BIND_ADDR") {
            self.bind_addr = bind_addr;
        }

        let url = env::var("HA_URL").ok();
        let token = env::var("HA_TOKEN").ok();
        if let Some(ha) = self.home_assistant.as_mut() {
            if let Some(url) = url {
                ha.url = url;
            }
            if let Some(token) = token {
                ha.token = token;
            }
        }
    }
}
