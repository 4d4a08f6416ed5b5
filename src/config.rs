//! Relay configuration: built-in defaults, an optional `relay.toml`, then
//! environment variables, in increasing priority.

use std::{net::SocketAddr, str::FromStr, time::Duration};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::credentials::{CredentialTable, EQUIPMENT_TYPES};
use crate::error::ConfigError;

const CONFIG_FILE: &str = "relay.toml";

// Scalar settings read from the environment; credentials are looked up separately
const ENV_KEYS: [&str; 8] = [
    "BIND_HOST",
    "PORT",
    "LOG_LEVEL",
    "LOG_FORMAT",
    "CAL_API_BASE_URL",
    "CAL_API_TIMEOUT_MS",
    "MAX_BODY_BYTES",
    "CAL_API_KEY",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Environment variable: `BIND_HOST`
    #[serde(default = "default_host")]
    pub bind_host: String,
    /// Environment variable: `PORT`
    #[serde(default = "default_port")]
    pub port: u16,
    /// Fallback filter when `RUST_LOG` is unset. Environment variable: `LOG_LEVEL`
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Environment variable: `LOG_FORMAT`
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Environment variable: `CAL_API_BASE_URL`
    #[serde(default = "default_base_url")]
    pub cal_api_base_url: String,
    /// Connect + response timeout for upstream calls. Environment variable: `CAL_API_TIMEOUT_MS`
    #[serde(default = "default_timeout_ms")]
    pub cal_api_timeout_ms: u64,
    /// Environment variable: `MAX_BODY_BYTES`
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Key used when a request carries no equipment type. Environment variable: `CAL_API_KEY`
    #[serde(default)]
    pub cal_api_key: Option<String>,
    /// Per-equipment keys from `CAL_API_KEY_<TYPE>`
    #[serde(skip)]
    pub equipment_keys: Vec<(String, String)>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

fn default_base_url() -> String {
    "https://api.cal.com/v1".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            cal_api_base_url: default_base_url(),
            cal_api_timeout_ms: default_timeout_ms(),
            max_body_bytes: default_max_body_bytes(),
            cal_api_key: None,
            equipment_keys: Vec::new(),
        }
    }
}

impl RelayConfig {
    pub fn figment() -> Figment {
        let equipment_vars: Vec<String> = EQUIPMENT_TYPES
            .iter()
            .map(|name| format!("CAL_API_KEY_{name}"))
            .collect();

        Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::raw().only(&ENV_KEYS))
            .merge(Env::raw().filter(move |key| {
                equipment_vars
                    .iter()
                    .any(|var| key.as_str().eq_ignore_ascii_case(var))
            }))
    }

    /// Load from defaults, `relay.toml` and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment())
    }

    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let mut config: Self = figment.extract()?;

        for name in EQUIPMENT_TYPES {
            let key = format!("cal_api_key_{}", name.to_lowercase());
            let value = match figment.extract_inner::<String>(&key) {
                Ok(value) => value,
                Err(e) if e.missing() => continue,
                Err(e) => {
                    return Err(ConfigError::Invalid(format!(
                        "CAL_API_KEY_{name} must be a string: {e}"
                    )))
                }
            };
            if !value.trim().is_empty() {
                config.equipment_keys.push((name.to_string(), value));
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn server_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        SocketAddr::from_str(&addr)
            .map_err(|e| ConfigError::Invalid(format!("invalid bind address {addr}: {e}")))
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.cal_api_timeout_ms)
    }

    pub fn credentials(&self) -> CredentialTable {
        let table = self
            .equipment_keys
            .iter()
            .fold(CredentialTable::new(), |table, (name, key)| {
                table.with_equipment(name, key.clone())
            });

        match self.fallback_key() {
            Some(key) => table.with_fallback(key),
            None => table,
        }
    }

    /// `CAL_API_KEY`, trimmed; blank counts as unset.
    pub fn fallback_key(&self) -> Option<&str> {
        self.cal_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Equipment types with no key configured, for a startup warning.
    pub fn missing_equipment(&self) -> Vec<&'static str> {
        EQUIPMENT_TYPES
            .iter()
            .copied()
            .filter(|name| !self.equipment_keys.iter().any(|(n, _)| n == name))
            .collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be greater than 0".into()));
        }

        if self.cal_api_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "cal_api_timeout_ms must be greater than 0".into(),
            ));
        }

        if self.cal_api_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("cal_api_base_url must not be empty".into()));
        }

        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid("max_body_bytes must be greater than 0".into()));
        }

        Ok(())
    }
}
