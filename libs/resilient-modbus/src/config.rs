//! Client configuration
//!
//! Plain numeric/identifier settings with serde defaults, loadable through
//! figment from a YAML/TOML/JSON file layered with `MODBUS_*` environment
//! variables.

use crate::error::{ModbusError, Result};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix (`MODBUS_HOST`, `MODBUS_LOGGING__LEVEL`, ...)
pub const ENV_PREFIX: &str = "MODBUS_";

// ============================================================================
// Default Value Functions
// ============================================================================

fn default_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_base_retry_delay_ms() -> u64 {
    2000
}

fn default_max_retry_delay_ms() -> u64 {
    30_000
}

fn default_ping_count() -> u16 {
    1
}

fn default_invalid_cache_ttl_secs() -> u64 {
    600
}

fn default_invalid_cache_max() -> usize {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> Option<String> {
    Some("modbus.log".to_string())
}

fn default_max_log_files() -> usize {
    3
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Connection, back-off and quarantine settings for one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Device host; identifies the device in logs
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// Transport timeout, handed to the transport implementation
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Initial reconnection delay
    #[serde(default = "default_base_retry_delay_ms")]
    pub base_retry_delay_ms: u64,

    /// Upper bound of the reconnection delay
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,

    /// Holding register probed by the liveness check
    #[serde(default)]
    pub ping_addr: u16,

    #[serde(default = "default_ping_count")]
    pub ping_count: u16,

    #[serde(default = "default_invalid_cache_ttl_secs")]
    pub invalid_cache_ttl_secs: u64,

    #[serde(default = "default_invalid_cache_max")]
    pub invalid_cache_max: usize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Log sink settings used by [`init_logging`](crate::init_logging)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directives when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Mirror events to stdout
    #[serde(default)]
    pub console: bool,

    /// Rolling log file; `None` disables file output
    #[serde(default = "default_log_file")]
    pub log_file: Option<String>,

    #[serde(default = "default_max_log_files")]
    pub max_log_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: false,
            log_file: default_log_file(),
            max_log_files: default_max_log_files(),
        }
    }
}

impl ClientConfig {
    /// Configuration for `host` with every other field at its default
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            unit_id: default_unit_id(),
            timeout_ms: default_timeout_ms(),
            base_retry_delay_ms: default_base_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            ping_addr: 0,
            ping_count: default_ping_count(),
            invalid_cache_ttl_secs: default_invalid_cache_ttl_secs(),
            invalid_cache_max: default_invalid_cache_max(),
            logging: LoggingConfig::default(),
        }
    }

    /// `host:port`, used as the device identity in logs
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn base_retry_delay(&self) -> Duration {
        Duration::from_millis(self.base_retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    pub fn invalid_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.invalid_cache_ttl_secs)
    }

    /// Natural range checks; delays are unsigned so only their ordering is checked
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ModbusError::config("host must not be empty"));
        }
        if self.timeout_ms == 0 {
            return Err(ModbusError::config("timeout_ms must be greater than 0"));
        }
        if self.base_retry_delay_ms > self.max_retry_delay_ms {
            return Err(ModbusError::config(format!(
                "base_retry_delay_ms ({}) exceeds max_retry_delay_ms ({})",
                self.base_retry_delay_ms, self.max_retry_delay_ms
            )));
        }
        if self.ping_count == 0 {
            return Err(ModbusError::config("ping_count must be at least 1"));
        }
        if self.invalid_cache_max == 0 {
            return Err(ModbusError::config("invalid_cache_max must be at least 1"));
        }
        Ok(())
    }

    /// Load from a config file layered with `MODBUS_*` environment variables
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (`MODBUS_` prefix, `__` for nesting)
    /// 2. The file at `path` (format chosen by extension)
    /// 3. Default values
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ModbusError::config("Config file must have an extension"))?;

        let figment = Figment::from(Serialized::defaults(LoggingDefaults::default()));
        let figment = match extension {
            "toml" => figment.merge(Toml::file(path)),
            "yaml" | "yml" => figment.merge(Yaml::file(path)),
            "json" => figment.merge(Json::file(path)),
            _ => {
                return Err(ModbusError::config(format!(
                    "Unsupported config file format: {}",
                    extension
                )))
            },
        };

        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load from `MODBUS_*` environment variables only
    pub fn from_env() -> Result<Self> {
        Self::extract(
            Figment::from(Serialized::defaults(LoggingDefaults::default()))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }
}

/// Seed layer so that a partially specified `logging` table still gets defaults
#[derive(Debug, Default, Serialize)]
struct LoggingDefaults {
    logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_values() {
        let config = ClientConfig::new("192.168.1.10");
        assert_eq!(config.port, 502);
        assert_eq!(config.unit_id, 1);
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.base_retry_delay(), Duration::from_secs(2));
        assert_eq!(config.max_retry_delay(), Duration::from_secs(30));
        assert_eq!(config.invalid_cache_ttl(), Duration::from_secs(600));
        assert_eq!(config.invalid_cache_max, 500);
        assert_eq!(config.target(), "192.168.1.10:502");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let mut config = ClientConfig::new("plc");
        config.base_retry_delay_ms = 60_000;
        assert!(matches!(config.validate(), Err(ModbusError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_cache_bound() {
        let mut config = ClientConfig::new("plc");
        config.invalid_cache_max = 0;
        assert!(config.validate().is_err());

        let mut config = ClientConfig::new("  ");
        config.invalid_cache_max = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_yaml_with_partial_fields() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            "host: 10.1.2.3\nport: 1502\nping_addr: 40\nlogging:\n  console: true\n"
        )
        .unwrap();

        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.host, "10.1.2.3");
        assert_eq!(config.port, 1502);
        assert_eq!(config.ping_addr, 40);
        assert_eq!(config.ping_count, 1);
        assert!(config.logging.console);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.log_file.as_deref(), Some("modbus.log"));
    }

    #[test]
    fn test_load_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "host = \"plc-7\"\ninvalid_cache_ttl_secs = 60\ninvalid_cache_max = 10\n"
        )
        .unwrap();

        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.host, "plc-7");
        assert_eq!(config.invalid_cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.invalid_cache_max, 10);
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(
            file,
            r#"{{"host": "plc", "base_retry_delay_ms": 5000, "max_retry_delay_ms": 1000}}"#
        )
        .unwrap();

        assert!(matches!(
            ClientConfig::load(file.path()),
            Err(ModbusError::Config(_))
        ));
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        assert!(matches!(
            ClientConfig::load("client.ini"),
            Err(ModbusError::Config(_))
        ));
    }
}
