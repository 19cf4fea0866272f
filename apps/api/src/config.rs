use std::time::Duration;

use anyhow::{Context, Result};

use crate::search::CacheSettings;

/// Application configuration loaded from environment variables.
/// Fails at startup if `DATABASE_URL` is missing or a value does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    /// `postgres://`, `postgresql://`, `sqlite:` or `memory:` for the demo catalogue.
    pub database_url: String,
    pub port: u16,
    pub rust_log: String,
    pub db_pool_max: u32,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    /// Insert the demo catalogue into an SQL datastore at startup.
    pub seed_demo_jobs: bool,
    /// Salt mixed into hashed subscriber emails before they reach analytics.
    pub analytics_salt: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            db_pool_max: env_or("DB_POOL_MAX", 4)?,
            cache_ttl_secs: env_or("CACHE_TTL_SECS", 30)?,
            cache_max_entries: env_or("CACHE_MAX_ENTRIES", 128)?,
            seed_demo_jobs: env_or("SEED_DEMO_JOBS", false)?,
            analytics_salt: std::env::var("ANALYTICS_SALT").unwrap_or_else(|_| "dev".to_string()),
        })
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            ttl: Duration::from_secs(self.cache_ttl_secs),
            capacity: self.cache_max_entries,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_settings_from_config() {
        let config = Config {
            database_url: "memory:".into(),
            port: 8080,
            rust_log: "info".into(),
            db_pool_max: 4,
            cache_ttl_secs: 0,
            cache_max_entries: 16,
            seed_demo_jobs: false,
            analytics_salt: "dev".into(),
        };
        let settings = config.cache_settings();
        assert_eq!(settings.ttl, Duration::ZERO);
        assert_eq!(settings.capacity, 16);
    }

    #[test]
    fn test_env_or_falls_back_when_unset() {
        let value: u32 = env_or("JOBBOARD_TEST_UNSET_VARIABLE", 7).expect("default");
        assert_eq!(value, 7);
    }
}
