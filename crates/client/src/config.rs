//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `PODFORGE_API_BASE_URL` - REST API base URL (default: `http://localhost:8000/api`)
//! - `PODFORGE_POLL_INTERVAL_MS` - Draft status poll interval (default: 1500)
//! - `PODFORGE_POLL_MAX_ATTEMPTS` - Upper bound on draft polls (default: unbounded)
//! - `PODFORGE_REQUEST_TIMEOUT_SECS` - Per-request HTTP timeout (default: none)

use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1500;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST API base URL, without trailing slash
    pub api_base_url: Url,
    /// Draft polling behaviour
    pub polling: PollingConfig,
    /// HTTP request timeout, enforced by the gateway (none by default)
    pub request_timeout: Option<Duration>,
}

/// Draft status polling configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    /// Delay between resolutions while a draft is queued
    pub interval: Duration,
    /// Optional cap on resolutions; `None` polls until the server settles
    pub max_attempts: Option<u32>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_attempts: None,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_base_url(),
            polling: PollingConfig::default(),
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = parse_base_url(
            "PODFORGE_API_BASE_URL",
            &get_env_or_default("PODFORGE_API_BASE_URL", DEFAULT_API_BASE_URL),
        )?;

        let interval_ms = get_env_or_default(
            "PODFORGE_POLL_INTERVAL_MS",
            &DEFAULT_POLL_INTERVAL_MS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("PODFORGE_POLL_INTERVAL_MS".to_string(), e.to_string())
        })?;
        if interval_ms == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "PODFORGE_POLL_INTERVAL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let max_attempts = get_optional_env("PODFORGE_POLL_MAX_ATTEMPTS")
            .map(|s| {
                s.parse::<u32>().map_err(|e| {
                    ConfigError::InvalidEnvVar(
                        "PODFORGE_POLL_MAX_ATTEMPTS".to_string(),
                        e.to_string(),
                    )
                })
            })
            .transpose()?;

        let request_timeout = get_optional_env("PODFORGE_REQUEST_TIMEOUT_SECS")
            .map(|s| {
                s.parse::<u64>().map(Duration::from_secs).map_err(|e| {
                    ConfigError::InvalidEnvVar(
                        "PODFORGE_REQUEST_TIMEOUT_SECS".to_string(),
                        e.to_string(),
                    )
                })
            })
            .transpose()?;

        Ok(Self {
            api_base_url,
            polling: PollingConfig {
                interval: Duration::from_millis(interval_ms),
                max_attempts,
            },
            request_timeout,
        })
    }

    /// Same as the defaults, pointed at another API.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the URL is not an absolute http(s) URL.
    pub fn with_base_url(base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: parse_base_url("base_url", base_url)?,
            ..Self::default()
        })
    }
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_API_BASE_URL).unwrap_or_else(|_| unreachable!("default base URL is valid"))
}

fn parse_base_url(name: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value.trim_end_matches('/'))
        .map_err(|e| ConfigError::InvalidEnvVar(name.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            name.to_string(),
            format!("unsupported scheme {}", url.scheme()),
        ));
    }

    Ok(url)
}

fn get_env_or_default(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn get_optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base_url.as_str(), "http://localhost:8000/api");
        assert_eq!(config.polling.interval, Duration::from_millis(1500));
        assert_eq!(config.polling.max_attempts, None);
        assert_eq!(config.request_timeout, None);
    }

    #[test]
    fn test_with_base_url_strips_trailing_slash() {
        let config = ClientConfig::with_base_url("https://pod.example.com/api/").unwrap();
        assert_eq!(config.api_base_url.as_str(), "https://pod.example.com/api");
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        assert!(matches!(
            ClientConfig::with_base_url("ftp://pod.example.com"),
            Err(ConfigError::InvalidEnvVar(_, _))
        ));
        assert!(ClientConfig::with_base_url("not a url").is_err());
    }
}
