use std::env;
use std::str::FromStr;

use anyhow::{anyhow, Context};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Postgres URL. Without one the service runs on the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub port: u16,
    pub nats_url: Option<String>,
    pub low_stock_threshold: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self { database_url: None, max_connections: 10, port: 8083, nats_url: None, low_stock_threshold: 5 }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let config = Config {
            database_url: lookup("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            port: parse_or(&lookup, "PORT", defaults.port)?,
            nats_url: lookup("NATS_URL").filter(|v| !v.trim().is_empty()),
            low_stock_threshold: parse_or(&lookup, "LOW_STOCK_THRESHOLD", defaults.low_stock_threshold)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if let Some(url) = &self.database_url {
            if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
                return Err(anyhow!("DATABASE_URL must start with 'postgres://'"));
            }
        }
        if self.max_connections == 0 {
            return Err(anyhow!("DATABASE_MAX_CONNECTIONS must be at least 1"));
        }
        Ok(())
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().with_context(|| format!("{key} has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
