use std::env;
use std::time::Duration;

use thiserror::Error;

/// Format used when rendering `created_at`/`updated_at` for clients.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

const DEFAULT_POOL_SIZE: u32 = 10;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CACHE_TTL_SECS: u64 = 15 * 60;
const DEFAULT_CACHE_SWEEP_SECS: u64 = 10 * 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no {0} environment variable found")]
    Missing(&'static str),
    #[error("{name} must be a positive integer, got `{value}`")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub pool_size: u32,
    /// Bounds both pool acquisition and every statement run on a pooled connection.
    pub timeout: Duration,
    pub user_cache_ttl: Duration,
    pub user_cache_sweep_interval: Duration,
}

impl Config {
    /// Reads the configuration from the process environment, loading `.env` first.
    pub fn from_env() -> Result<Config, ConfigError> {
        dotenv::dotenv().ok();
        Config::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Config, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let number = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(name) {
                None => Ok(default),
                Some(value) => match value.trim().parse::<u64>() {
                    Ok(n) if n > 0 => Ok(n),
                    _ => Err(ConfigError::Invalid { name, value }),
                },
            }
        };

        let pool_size = number("DATABASE_POOL_SIZE", u64::from(DEFAULT_POOL_SIZE))?;
        let pool_size = u32::try_from(pool_size).map_err(|_| ConfigError::Invalid {
            name: "DATABASE_POOL_SIZE",
            value: pool_size.to_string(),
        })?;

        Ok(Config {
            database_url,
            pool_size,
            timeout: Duration::from_secs(number("DATABASE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?),
            user_cache_ttl: Duration::from_secs(number(
                "USER_CACHE_TTL_SECS",
                DEFAULT_CACHE_TTL_SECS,
            )?),
            user_cache_sweep_interval: Duration::from_secs(number(
                "USER_CACHE_SWEEP_SECS",
                DEFAULT_CACHE_SWEEP_SECS,
            )?),
        })
    }
}
