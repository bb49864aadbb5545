use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::fetcher::http::DEFAULT_BASE_URL;
use crate::store::WriteStrategy;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Only required by modes that touch the database.
    pub database_url: Option<String>,
    pub api_base_url: String,
    pub page_size: u32,
    pub http_timeout: Duration,
    pub db_acquire_timeout: Duration,
    pub write_strategy: WriteStrategy,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let page_size = parse_or(&lookup, "PAGE_SIZE", 300u32)?;
        if page_size == 0 {
            bail!("PAGE_SIZE must be at least 1");
        }

        let write_strategy = match lookup("WRITE_STRATEGY") {
            Some(raw) => raw
                .parse::<WriteStrategy>()
                .map_err(anyhow::Error::msg)
                .context("WRITE_STRATEGY is invalid")?,
            None => WriteStrategy::default(),
        };

        Ok(Config {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            api_base_url: lookup("LISTINGS_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            page_size,
            http_timeout: timeout_secs(&lookup, "HTTP_TIMEOUT_SECS")?,
            db_acquire_timeout: timeout_secs(&lookup, "DB_ACQUIRE_TIMEOUT_SECS")?,
            write_strategy,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn require_database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("Required environment variable 'DATABASE_URL' is not set")
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number")),
        None => Ok(default),
    }
}

/// Whole seconds, default 30, at least 1.
fn timeout_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Duration> {
    let secs = parse_or(lookup, key, 30u64)?;
    if secs == 0 {
        bail!("{key} must be at least 1");
    }
    Ok(Duration::from_secs(secs))
}
