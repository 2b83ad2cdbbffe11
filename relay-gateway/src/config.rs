//! Process configuration read from the environment.

use std::time::Duration;

use relay_broker::config::{DEFAULT_PORT, DEFAULT_SEND_WINDOW};
use relay_broker::BrokerConfig;

use crate::liveness::{DEFAULT_STALE_THRESHOLD, DEFAULT_SWEEP_INTERVAL};

/// Default HTTP bind host.
pub const DEFAULT_HTTP_HOST: &str = "0.0.0.0";

/// Default HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// A configuration value that could not be used.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid value '{value}' for {name}: {reason}")]
pub struct ConfigError {
    /// Environment variable name.
    pub name: &'static str,
    /// The raw value found.
    pub value: String,
    /// What was wrong with it.
    pub reason: String,
}

/// Everything `main` needs to wire the gateway up.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct GatewayConfig {
    /// Broker connection settings. The container id is filled in at startup.
    pub broker: BrokerConfig,
    pub http_host: String,
    pub http_port: u16,
    /// How often stale workers are swept.
    pub sweep_interval: Duration,
    /// How old a health report may get before its worker is dropped.
    pub stale_threshold: Duration,
}

impl GatewayConfig {
    /// Read the configuration from process environment variables.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if a numeric variable does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = get("MESSAGING_SERVICE_HOST").unwrap_or_else(|| "localhost".to_owned());
        let port = parse_or(&get, "MESSAGING_SERVICE_PORT", DEFAULT_PORT)?;
        let send_window = parse_or(&get, "MESSAGING_SEND_WINDOW", DEFAULT_SEND_WINDOW)?;

        let mut broker = BrokerConfig::new(host, port).with_send_window(send_window);
        if let (Some(user), Some(password)) =
            (get("MESSAGING_SERVICE_USER"), get("MESSAGING_SERVICE_PASSWORD"))
        {
            broker = broker.with_credentials(user, password);
        }

        let sweep_ms = parse_or(&get, "WORKER_SWEEP_INTERVAL_MS", millis(DEFAULT_SWEEP_INTERVAL))?;
        if sweep_ms == 0 {
            return Err(ConfigError {
                name: "WORKER_SWEEP_INTERVAL_MS",
                value: "0".to_owned(),
                reason: "interval must be positive".to_owned(),
            });
        }
        let stale_ms =
            parse_or(&get, "WORKER_STALE_THRESHOLD_MS", millis(DEFAULT_STALE_THRESHOLD))?;

        Ok(Self {
            broker,
            http_host: get("HTTP_HOST").unwrap_or_else(|| DEFAULT_HTTP_HOST.to_owned()),
            http_port: parse_or(&get, "HTTP_PORT", DEFAULT_HTTP_PORT)?,
            sweep_interval: Duration::from_millis(sweep_ms),
            stale_threshold: Duration::from_millis(stale_ms),
        })
    }

    /// `host:port` for the HTTP listener.
    #[must_use]
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            http_host: DEFAULT_HTTP_HOST.to_owned(),
            http_port: DEFAULT_HTTP_PORT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            stale_threshold: DEFAULT_STALE_THRESHOLD,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn parse_or<T>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
