//! Client configuration from environment variables

use crate::reveal::DEFAULT_TICK;
use crate::state_machine::state::DEFAULT_STOP_GRACE;
use crate::transport::TransportConfig;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{var} must not be empty")]
    Empty { var: &'static str },
}

/// Everything the client needs to start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub backend_url: String,
    pub request_timeout: Duration,
    pub reveal_tick: Duration,
    pub stop_grace: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            reveal_tick: DEFAULT_TICK,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source; unset variables take defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let backend_url = match lookup("TUTOR_BACKEND_URL") {
            Some(url) if url.trim().is_empty() => {
                return Err(ConfigError::Empty {
                    var: "TUTOR_BACKEND_URL",
                })
            }
            Some(url) => url.trim().to_string(),
            None => defaults.backend_url,
        };

        let number = |var: &'static str| -> Result<Option<u64>, ConfigError> {
            lookup(var)
                .map(|value| {
                    value
                        .trim()
                        .parse::<u64>()
                        .map_err(|_| ConfigError::InvalidNumber { var, value })
                })
                .transpose()
        };

        Ok(Self {
            backend_url,
            request_timeout: number("TUTOR_REQUEST_TIMEOUT_SECS")?
                .map_or(defaults.request_timeout, Duration::from_secs),
            reveal_tick: number("TUTOR_REVEAL_TICK_MICROS")?
                .map_or(defaults.reveal_tick, Duration::from_micros),
            stop_grace: number("TUTOR_STOP_GRACE_MS")?
                .map_or(defaults.stop_grace, Duration::from_millis),
        })
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            base_url: self.backend_url.clone(),
            timeout: self.request_timeout,
        }
    }
}
