use clap::Parser;
use envconfig::Envconfig;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

use crate::error::ClickError;
use crate::rate_limiter::RateLimitSettings;

/// Which store implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Redis,
    /// Single-process store for local development.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!(
                "unknown store backend '{}', expected 'redis' or 'memory'",
                other
            )),
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreBackend::Redis => write!(f, "redis"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Envconfig, Validate, Clone)]
pub struct Config {
    /// Host to bind the HTTP listener to
    #[envconfig(from = "HOST", default = "0.0.0.0")]
    #[validate(length(min = 1))]
    pub host: String,

    /// Port to bind the HTTP listener to
    #[envconfig(from = "PORT", default = "3000")]
    pub port: u16,

    /// Redis connection URL, including credentials if any
    #[envconfig(from = "REDIS_URL", default = "redis://127.0.0.1:6379")]
    #[validate(length(min = 1))]
    pub redis_url: String,

    #[envconfig(from = "STORE_BACKEND", default = "redis")]
    pub store_backend: StoreBackend,

    /// Requests admitted per client per window
    #[envconfig(from = "RATE_LIMIT_MAX_REQUESTS", default = "10")]
    #[validate(range(min = 1))]
    pub rate_limit_max_requests: u64,

    #[envconfig(from = "RATE_LIMIT_WINDOW_SECS", default = "10")]
    #[validate(range(min = 1))]
    pub rate_limit_window_secs: u64,

    /// Aggregator sleep between polls of an empty queue
    #[envconfig(from = "AGGREGATOR_POLL_INTERVAL_MS", default = "100")]
    #[validate(range(min = 1))]
    pub poll_interval_ms: u64,

    /// Timeout for each store round-trip
    #[envconfig(from = "STORE_COMMAND_TIMEOUT_MS", default = "1000")]
    #[validate(range(min = 1))]
    pub store_command_timeout_ms: u64,

    /// Timeout for the initial store connection
    #[envconfig(from = "STORE_CONNECT_TIMEOUT_MS", default = "5000")]
    #[validate(range(min = 1))]
    pub store_connect_timeout_ms: u64,

    /// Take the client identity from X-Forwarded-For / X-Real-IP
    #[envconfig(from = "TRUST_PROXY_HEADERS", default = "false")]
    pub trust_proxy_headers: bool,

    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ClickError> {
        let config = Config::init_from_env().map_err(|e| ClickError::Config(e.to_string()))?;
        config.validated()
    }

    pub fn validated(self) -> Result<Self, ClickError> {
        self.validate()
            .map_err(|e| ClickError::Config(e.to_string()))?;
        Ok(self)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn rate_limit(&self) -> RateLimitSettings {
        RateLimitSettings {
            max_requests: self.rate_limit_max_requests,
            window: Duration::from_secs(self.rate_limit_window_secs),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn store_command_timeout(&self) -> Duration {
        Duration::from_millis(self.store_command_timeout_ms)
    }

    pub fn store_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.store_connect_timeout_ms)
    }
}

/// Command-line overrides applied on top of the environment.
#[derive(Debug, Default, Parser)]
#[command(name = "click-aggregator", version, about = "Rate-limited click counter")]
pub struct CliArgs {
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub redis_url: Option<String>,

    /// Store backend: redis or memory
    #[arg(long = "store")]
    pub store_backend: Option<StoreBackend>,

    #[arg(long)]
    pub log_level: Option<String>,
}

impl CliArgs {
    pub fn apply(self, mut config: Config) -> Config {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(redis_url) = self.redis_url {
            config.redis_url = redis_url;
        }
        if let Some(backend) = self.store_backend {
            config.store_backend = backend;
        }
        if let Some(level) = self.log_level {
            config.log_level = level;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, envconfig::Error> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::init_from_hashmap(&map)
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap().validated().unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
        assert_eq!(config.store_backend, StoreBackend::Redis);
        assert_eq!(config.rate_limit(), RateLimitSettings::default());
        assert_eq!(config.poll_interval(), Duration::from_millis(100));
        assert!(!config.trust_proxy_headers);
    }

    #[test]
    fn test_overrides_from_env() {
        let config = config_from(&[
            ("PORT", "8080"),
            ("STORE_BACKEND", "memory"),
            ("RATE_LIMIT_MAX_REQUESTS", "3"),
            ("RATE_LIMIT_WINDOW_SECS", "30"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.rate_limit().max_requests, 3);
        assert_eq!(config.rate_limit().window, Duration::from_secs(30));
    }

    #[test]
    fn test_zero_window_is_rejected() {
        let config = config_from(&[("RATE_LIMIT_WINDOW_SECS", "0")]).unwrap();
        assert!(matches!(config.validated(), Err(ClickError::Config(_))));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        assert!(config_from(&[("STORE_BACKEND", "postgres")]).is_err());
    }

    #[test]
    fn test_cli_overrides_env() {
        let args = CliArgs::parse_from(["click-aggregator", "--port", "4000", "--store", "memory"]);
        let config = args.apply(config_from(&[]).unwrap());
        assert_eq!(config.port, 4000);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
    }
}
