//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::controller::ChannelConfig;

pub const ENV_DB: &str = "WAREHOUSE_DB";
pub const ENV_LISTEN: &str = "WAREHOUSE_LISTEN";
pub const ENV_COMMAND_TIMEOUT_MS: &str = "WAREHOUSE_COMMAND_TIMEOUT_MS";
pub const ENV_COMMAND_QUEUE: &str = "WAREHOUSE_COMMAND_QUEUE";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid {var}={value:?}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseConfig {
    /// Persisted system list.
    pub db_path: PathBuf,
    pub listen: SocketAddr,
    pub command_timeout: Duration,
    pub command_queue: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("warehouse.json"),
            listen: SocketAddr::from(([0, 0, 0, 0], 8080)),
            command_timeout: Duration::from_millis(10_000),
            command_queue: 64,
        }
    }
}

impl WarehouseConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source; unset variables keep their
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_DB) {
            if value.trim().is_empty() {
                return Err(invalid(ENV_DB, value, "path cannot be empty"));
            }
            config.db_path = PathBuf::from(value);
        }
        if let Some(value) = lookup(ENV_LISTEN) {
            config.listen = value
                .parse()
                .map_err(|e: std::net::AddrParseError| invalid(ENV_LISTEN, value.clone(), e))?;
        }
        if let Some(value) = lookup(ENV_COMMAND_TIMEOUT_MS) {
            let ms = parse_positive(ENV_COMMAND_TIMEOUT_MS, &value)?;
            config.command_timeout = Duration::from_millis(ms);
        }
        if let Some(value) = lookup(ENV_COMMAND_QUEUE) {
            let depth = parse_positive(ENV_COMMAND_QUEUE, &value)?;
            config.command_queue = usize::try_from(depth)
                .map_err(|e| invalid(ENV_COMMAND_QUEUE, value.clone(), e))?;
        }

        Ok(config)
    }

    pub fn channel(&self) -> ChannelConfig {
        ChannelConfig {
            command_timeout: self.command_timeout,
            queue_depth: self.command_queue,
        }
    }
}

fn parse_positive(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(0) => Err(invalid(var, value.to_string(), "must be greater than zero")),
        Ok(n) => Ok(n),
        Err(e) => Err(invalid(var, value.to_string(), e)),
    }
}

fn invalid(var: &'static str, value: String, reason: impl ToString) -> ConfigError {
    ConfigError {
        var,
        value,
        reason: reason.to_string(),
    }
}
