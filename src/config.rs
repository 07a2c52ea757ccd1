use std::env;
use std::net::SocketAddr;

use url::Url;

use crate::application::services::{BotIcons, DEFAULT_MAX_ATTEMPTS};
use crate::infrastructure::circleci::DEFAULT_API_URL;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:///data/ci-bridge/kv.sqlite";

/// Where the key-value store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite(String),
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Process configuration, read once at startup
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub store: StoreBackend,
    pub mattermost_url: String,
    pub mattermost_bot_token: String,
    pub command_token: Option<String>,
    pub circleci_api_url: String,
    pub webhook_secret: Option<String>,
    pub cas_max_attempts: u32,
    pub icons: BotIcons,
    pub log_format: LogFormat,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} is invalid: {message}")]
    Invalid { key: &'static str, message: String },
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let listen_addr = get("BRIDGE_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                key: "BRIDGE_LISTEN_ADDR",
                message: e.to_string(),
            })?;

        let store = match get("BRIDGE_DATABASE_URL") {
            Some(url) if url == "memory" => StoreBackend::Memory,
            Some(url) if url.starts_with("sqlite:") => StoreBackend::Sqlite(url),
            Some(url) => {
                return Err(ConfigError::Invalid {
                    key: "BRIDGE_DATABASE_URL",
                    message: format!("expected a sqlite: URL or `memory`, got `{}`", url),
                })
            }
            None => StoreBackend::Sqlite(DEFAULT_DATABASE_URL.to_string()),
        };

        let mattermost_url = get("MATTERMOST_URL").ok_or(ConfigError::Missing("MATTERMOST_URL"))?;
        parse_url("MATTERMOST_URL", &mattermost_url)?;
        let mattermost_bot_token = get("MATTERMOST_BOT_TOKEN").ok_or(ConfigError::Missing("MATTERMOST_BOT_TOKEN"))?;

        let circleci_api_url = get("CIRCLECI_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        parse_url("CIRCLECI_API_URL", &circleci_api_url)?;

        let cas_max_attempts = match get("KV_CAS_MAX_ATTEMPTS") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "KV_CAS_MAX_ATTEMPTS",
                        message: format!("expected a positive integer, got `{}`", raw),
                    })
                }
            },
            None => DEFAULT_MAX_ATTEMPTS,
        };

        let log_format = match get("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            listen_addr,
            store,
            mattermost_url,
            mattermost_bot_token,
            command_token: get("MATTERMOST_COMMAND_TOKEN"),
            circleci_api_url,
            webhook_secret: get("WEBHOOK_SECRET"),
            cas_max_attempts,
            icons: BotIcons {
                success: get("BOT_ICON_URL_SUCCESS"),
                failure: get("BOT_ICON_URL_FAILURE"),
            },
            log_format,
        })
    }
}

fn parse_url(key: &'static str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value).map(|_| ()).map_err(|e| ConfigError::Invalid {
        key,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("MATTERMOST_URL", "https://chat.acme.io"),
        ("MATTERMOST_BOT_TOKEN", "bot-token"),
    ];

    #[test]
    fn test_defaults() {
        let config = load(&REQUIRED).unwrap();
        assert_eq!(config.listen_addr.to_string(), DEFAULT_LISTEN_ADDR);
        assert_eq!(config.store, StoreBackend::Sqlite(DEFAULT_DATABASE_URL.to_string()));
        assert_eq!(config.circleci_api_url, DEFAULT_API_URL);
        assert_eq!(config.cas_max_attempts, 3);
        assert_eq!(config.log_format, LogFormat::Text);
        assert!(config.webhook_secret.is_none());
        assert!(config.command_token.is_none());
    }

    #[test]
    fn test_required_keys() {
        assert_eq!(load(&[]).unwrap_err(), ConfigError::Missing("MATTERMOST_URL"));
        assert_eq!(
            load(&[("MATTERMOST_URL", "https://chat.acme.io"), ("MATTERMOST_BOT_TOKEN", "  ")]).unwrap_err(),
            ConfigError::Missing("MATTERMOST_BOT_TOKEN")
        );
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("BRIDGE_DATABASE_URL", "memory"),
            ("KV_CAS_MAX_ATTEMPTS", "5"),
            ("WEBHOOK_SECRET", "s3cret"),
            ("BOT_ICON_URL_FAILURE", "https://cdn.acme.io/red.png"),
            ("LOG_FORMAT", "json"),
        ]);
        let config = load(&pairs).unwrap();

        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.cas_max_attempts, 5);
        assert_eq!(config.webhook_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.icons.failure.as_deref(), Some("https://cdn.acme.io/red.png"));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [
            ("KV_CAS_MAX_ATTEMPTS", "0"),
            ("KV_CAS_MAX_ATTEMPTS", "many"),
            ("BRIDGE_LISTEN_ADDR", "localhost"),
            ("BRIDGE_DATABASE_URL", "postgres://db"),
            ("CIRCLECI_API_URL", "circleci"),
        ] {
            let mut pairs = REQUIRED.to_vec();
            pairs.push((key, value));
            assert!(
                matches!(load(&pairs), Err(ConfigError::Invalid { key: k, .. }) if k == key),
                "{}={} should be rejected",
                key,
                value
            );
        }
    }
}
