//! Configuration loaded from the environment and an optional `.env` file.

use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram channel, enabled when a bot token is set.
    pub telegram: Option<TelegramConfig>,
    /// HTTP webhook channel, enabled when a port is set.
    pub http: Option<HttpConfig>,
    /// Whether the terminal channel runs.
    pub cli_enabled: bool,
    pub session: SessionConfig,
}

/// Telegram Bot API settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    /// Base URL of the Bot API.
    pub api_url: String,
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout: Duration,
}

/// HTTP webhook settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Shared secret every webhook request must carry.
    pub webhook_secret: Option<SecretString>,
    /// User id for requests that do not name one.
    pub user_id: String,
}

/// Session lifetime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Drop sessions idle longer than this. `None` keeps them forever.
    pub idle_timeout: Option<Duration>,
    /// How often the pruner runs.
    pub prune_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Some(Duration::from_secs(24 * 60 * 60)),
            prune_interval: Duration::from_secs(5 * 60),
        }
    }
}

impl Config {
    /// Load `.env` (if present) and read configuration from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let telegram = match env("TELEGRAM_BOT_TOKEN").or_else(|| env("BOT_TOKEN")) {
            Some(token) => Some(TelegramConfig {
                bot_token: SecretString::from(token),
                api_url: env("TELEGRAM_API_URL")
                    .unwrap_or_else(|| DEFAULT_TELEGRAM_API_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                poll_timeout: Duration::from_secs(parse_or(
                    "TELEGRAM_POLL_TIMEOUT_SECS",
                    env("TELEGRAM_POLL_TIMEOUT_SECS"),
                    30u64,
                )?),
            }),
            None => None,
        };

        let http = match env("HTTP_PORT") {
            Some(port) => {
                let port = parse_value::<u16>("HTTP_PORT", &port)?;
                let webhook_secret =
                    env("HTTP_WEBHOOK_SECRET").ok_or_else(|| ConfigError::MissingRequired {
                        key: "HTTP_WEBHOOK_SECRET".to_string(),
                        hint: "the HTTP channel refuses unauthenticated webhooks".to_string(),
                    })?;
                Some(HttpConfig {
                    host: env("HTTP_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                    port,
                    webhook_secret: Some(SecretString::from(webhook_secret)),
                    user_id: env("HTTP_USER_ID").unwrap_or_else(|| "http".to_string()),
                })
            }
            None => None,
        };

        let cli_enabled = match env("CLI_ENABLED") {
            Some(v) => parse_bool("CLI_ENABLED", &v)?,
            None => true,
        };

        let defaults = SessionConfig::default();
        let idle_secs = parse_or(
            "SESSION_IDLE_TIMEOUT_SECS",
            env("SESSION_IDLE_TIMEOUT_SECS"),
            defaults.idle_timeout.map_or(0, |d| d.as_secs()),
        )?;
        let prune_secs = parse_or(
            "SESSION_PRUNE_INTERVAL_SECS",
            env("SESSION_PRUNE_INTERVAL_SECS"),
            defaults.prune_interval.as_secs(),
        )?;
        if prune_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "SESSION_PRUNE_INTERVAL_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            telegram,
            http,
            cli_enabled,
            session: SessionConfig {
                idle_timeout: (idle_secs > 0).then(|| Duration::from_secs(idle_secs)),
                prune_interval: Duration::from_secs(prune_secs),
            },
        })
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert!(config.telegram.is_none());
        assert!(config.http.is_none());
        assert!(config.cli_enabled);
        assert_eq!(config.session, SessionConfig::default());
    }

    #[test]
    fn test_telegram_token_alias() {
        let config = config(&[("BOT_TOKEN", "123:abc")]).unwrap();
        let telegram = config.telegram.unwrap();
        assert_eq!(telegram.bot_token.expose_secret(), "123:abc");
        assert_eq!(telegram.api_url, DEFAULT_TELEGRAM_API_URL);
        assert_eq!(telegram.poll_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_http_requires_secret() {
        let err = config(&[("HTTP_PORT", "8080")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { .. }));

        let config = config(&[("HTTP_PORT", "8080"), ("HTTP_WEBHOOK_SECRET", "s")]).unwrap();
        let http = config.http.unwrap();
        assert_eq!(http.port, 8080);
        assert_eq!(http.host, "0.0.0.0");
        assert_eq!(http.user_id, "http");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            config(&[("HTTP_PORT", "eighty"), ("HTTP_WEBHOOK_SECRET", "s")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config(&[("CLI_ENABLED", "maybe")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            config(&[("SESSION_PRUNE_INTERVAL_SECS", "0")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_session_timeout_can_be_disabled() {
        let config = config(&[("SESSION_IDLE_TIMEOUT_SECS", "0"), ("CLI_ENABLED", "off")]).unwrap();
        assert_eq!(config.session.idle_timeout, None);
        assert!(!config.cli_enabled);
    }
}
