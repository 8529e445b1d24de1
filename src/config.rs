//! Dashboard configuration file
//!
//! Stored as TOML in the user's config directory. A missing file is created
//! with defaults on first start so it can be edited in place afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::mqtt::config::MqttConfig;
use crate::render::{DEFAULT_BLINK_INTERVAL, DEFAULT_RENDER_INTERVAL};

const CONFIG_DIR: &str = "dv8-dashboard";
const CONFIG_FILE: &str = "dashboard.toml";
const CONFIG_ENV: &str = "DV8_DASHBOARD_CONFIG";
const DEFAULT_MQTT_PORT: u16 = 1883;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid broker url: {0}")]
    InvalidBrokerUrl(String),

    #[error("{0} must be at least 1")]
    InvalidInterval(&'static str),

    #[error("No config directory available on this platform")]
    NoConfigDir,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BrokerConfig {
    /// `mqtt://host:port`, `host:port` or `host`
    pub url: String,
    pub client_id: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    pub reconnect_delay_ms: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: "mqtt://127.0.0.1:1883".to_string(),
            client_id: "dv8-dashboard".to_string(),
            user: None,
            password: None,
            keep_alive_secs: 5,
            reconnect_delay_ms: 1000,
        }
    }
}

impl BrokerConfig {
    /// Splits the url into host and port
    pub fn address(&self) -> Result<(String, u16), ConfigError> {
        let url = self.url.trim();
        let rest = url.strip_prefix("mqtt://").unwrap_or(url);
        if rest.is_empty() || rest.contains('/') {
            return Err(ConfigError::InvalidBrokerUrl(self.url.clone()));
        }

        match rest.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                let port = port
                    .parse()
                    .map_err(|_| ConfigError::InvalidBrokerUrl(self.url.clone()))?;
                Ok((host.to_string(), port))
            }
            Some(_) => Err(ConfigError::InvalidBrokerUrl(self.url.clone())),
            None => Ok((rest.to_string(), DEFAULT_MQTT_PORT)),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    pub fullscreen: bool,
    pub width: f32,
    pub height: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            fullscreen: false,
            width: 320.0,
            height: 240.0,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    /// Namespace the robot publishes under
    pub topic_prefix: String,
    pub blink_interval_ms: u64,
    pub render_interval_ms: u64,
    pub broker: BrokerConfig,
    pub display: DisplayConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            topic_prefix: "/robot/".to_string(),
            blink_interval_ms: DEFAULT_BLINK_INTERVAL.as_millis() as u64,
            render_interval_ms: DEFAULT_RENDER_INTERVAL.as_millis() as u64,
            broker: BrokerConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// `$DV8_DASHBOARD_CONFIG`, else `<config dir>/dv8-dashboard/dashboard.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the render and blink tasks cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval("render_interval_ms"));
        }
        if self.blink_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval("blink_interval_ms"));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Loads `path`, writing a default file first if it does not exist
    pub async fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if !tokio::fs::try_exists(path).await.map_err(io_err)? {
            info!("No config at {}, writing defaults", path.display());
            let config = Self::default();
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
            }
            tokio::fs::write(path, config.to_toml()?)
                .await
                .map_err(io_err)?;
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path).await.map_err(io_err)?;
        let config = Self::from_toml(&content)?;
        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub fn blink_interval(&self) -> Duration {
        Duration::from_millis(self.blink_interval_ms)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    /// Connection settings for the MQTT bridge
    pub fn mqtt_config(&self) -> Result<MqttConfig, ConfigError> {
        let (host, port) = self.broker.address()?;
        Ok(MqttConfig {
            host,
            port,
            client_id: self.broker.client_id.clone(),
            credentials: self.broker.user.clone().map(|user| {
                (user, self.broker.password.clone().unwrap_or_default())
            }),
            keep_alive: Duration::from_secs(self.broker.keep_alive_secs),
            reconnect_delay: Duration::from_millis(self.broker.reconnect_delay_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn broker(url: &str) -> BrokerConfig {
        BrokerConfig {
            url: url.to_string(),
            ..BrokerConfig::default()
        }
    }

    #[test]
    fn broker_address_forms() {
        assert_eq!(
            broker("mqtt://192.168.1.10:1884").address().unwrap(),
            ("192.168.1.10".to_string(), 1884)
        );
        assert_eq!(
            broker("broker.local:1883").address().unwrap(),
            ("broker.local".to_string(), 1883)
        );
        assert_eq!(
            broker("broker.local").address().unwrap(),
            ("broker.local".to_string(), DEFAULT_MQTT_PORT)
        );
    }

    #[test]
    fn invalid_broker_urls_are_rejected() {
        for url in ["", "mqtt://", "host:port", ":1883", "mqtt://host:1883/path"] {
            assert!(
                matches!(broker(url).address(), Err(ConfigError::InvalidBrokerUrl(_))),
                "{}",
                url
            );
        }
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config = DashboardConfig::from_toml(
            r#"
            blink_interval_ms = 250

            [broker]
            url = "mqtt://10.0.0.2:1883"
            user = "robot"
            "#,
        )
        .unwrap();

        assert_eq!(config.blink_interval(), Duration::from_millis(250));
        assert_eq!(config.topic_prefix, "/robot/");
        assert_eq!(config.broker.client_id, "dv8-dashboard");
        assert_eq!(config.display, DisplayConfig::default());

        let mqtt = config.mqtt_config().unwrap();
        assert_eq!(mqtt.host, "10.0.0.2");
        assert_eq!(mqtt.credentials, Some(("robot".to_string(), String::new())));
    }

    #[test]
    fn defaults_survive_serialization() {
        let config = DashboardConfig::default();
        let parsed = DashboardConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.render_interval(), Duration::from_millis(33));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        assert!(matches!(
            DashboardConfig::from_toml("blink_interval_ms = \"fast\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn zero_render_interval_is_rejected() {
        assert!(matches!(
            DashboardConfig::from_toml("render_interval_ms = 0"),
            Err(ConfigError::InvalidInterval("render_interval_ms"))
        ));
    }

    #[test]
    fn zero_blink_interval_is_rejected() {
        assert!(matches!(
            DashboardConfig::from_toml("blink_interval_ms = 0"),
            Err(ConfigError::InvalidInterval("blink_interval_ms"))
        ));
        assert!(DashboardConfig::from_toml("blink_interval_ms = 1").is_ok());
    }

    #[tokio::test]
    async fn zero_interval_in_file_fails_to_load() {
        let dir = std::env::temp_dir().join(format!(
            "dv8-dashboard-zero-{}-{}",
            std::process::id(),
            chrono::Local::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let path = dir.join(CONFIG_FILE);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(&path, "render_interval_ms = 0\nblink_interval_ms = 0\n").unwrap();

        let result = DashboardConfig::load_or_create(&path).await;
        assert!(matches!(result, Err(ConfigError::InvalidInterval(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_file_is_created_with_defaults() {
        let dir = std::env::temp_dir().join(format!(
            "dv8-dashboard-test-{}-{}",
            std::process::id(),
            chrono::Local::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let path = dir.join("nested").join(CONFIG_FILE);

        let created = DashboardConfig::load_or_create(&path).await.unwrap();
        assert_eq!(created, DashboardConfig::default());
        assert!(path.exists());

        let loaded = DashboardConfig::load_or_create(&path).await.unwrap();
        assert_eq!(loaded, created);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
