//! Environment-driven configuration for the cart HTTP service.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use webmarket_infra::CartConfig;
use webmarket_observability::LogFormat;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart service configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// Base URL of the product service, e.g. `http://localhost:5555/core`.
    pub product_service_url: String,
    pub cart: CartConfig,
    pub log_format: LogFormat,
    /// Redis URL for the outbound event channel; unset disables it.
    #[cfg(feature = "redis")]
    pub redis_url: Option<String>,
    #[cfg(feature = "redis")]
    pub events_channel: String,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` first so a `.env` file, if present, fills in
    /// variables that are not already set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = CartConfig::default();

        let bind_addr = parse_or(&get, "CART_BIND_ADDR", "0.0.0.0:8190".parse::<SocketAddr>())?;
        let product_service_url = get("PRODUCT_SERVICE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "http://localhost:5555/core".to_string());

        let lock_timeout = millis_or(&get, "CART_LOCK_TIMEOUT_MS", defaults.lock_timeout)?;
        let lookup_timeout = millis_or(&get, "PRODUCT_LOOKUP_TIMEOUT_MS", defaults.lookup_timeout)?;
        let capacity = match get("CART_EVENT_QUEUE_CAPACITY") {
            Some(raw) => parse_var::<usize>("CART_EVENT_QUEUE_CAPACITY", &raw)?,
            None => defaults.event_queue_capacity,
        };
        let cart = defaults
            .with_lock_timeout(lock_timeout)
            .with_lookup_timeout(lookup_timeout)
            .with_event_queue_capacity(capacity);

        let log_format = match get("LOG_FORMAT") {
            Some(raw) => parse_var::<LogFormat>("LOG_FORMAT", &raw)?,
            None => LogFormat::default(),
        };

        Ok(Self {
            bind_addr,
            product_service_url,
            cart,
            log_format,
            #[cfg(feature = "redis")]
            redis_url: get("REDIS_URL").filter(|v| !v.trim().is_empty()),
            #[cfg(feature = "redis")]
            events_channel: get("CART_EVENTS_CHANNEL").unwrap_or_else(|| "cart-events".to_string()),
        })
    }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(name.to_string(), e.to_string()))
}

fn parse_or<F, T, E>(get: &F, name: &str, default: Result<T, E>) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
    E: std::fmt::Display,
{
    match get(name) {
        Some(raw) => parse_var(name, &raw),
        None => default.map_err(|e| ConfigError::InvalidEnvVar(name.to_string(), e.to_string())),
    }
}

fn millis_or<F>(get: &F, name: &str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => {
            let ms = parse_var::<u64>(name, &raw)?;
            if ms == 0 {
                return Err(ConfigError::InvalidEnvVar(
                    name.to_string(),
                    "must be greater than zero".to_string(),
                ));
            }
            Ok(Duration::from_millis(ms))
        }
        None => Ok(default),
    }
}
