//! Environment configuration

use std::str::FromStr;
use std::time::Duration;

use subsvc_shared::PoolSettings;
use subsvc_subscriptions::ProvisionerConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub jwt_secret: String,
    pub plan_cache_ttl: Duration,
    pub db_statement_timeout: Duration,
    pub db_max_connections: u32,
    pub bucket_service_url: String,
    pub bucket_timeout: Duration,
    pub bucket_retries: usize,
    pub run_migrations: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let bind_address = lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        if bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Invalid {
                name: "BIND_ADDRESS",
                value: bind_address,
                reason: "expected host:port".to_string(),
            });
        }

        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", 25u32)?;
        if db_max_connections == 0 {
            return Err(ConfigError::Invalid {
                name: "DB_MAX_CONNECTIONS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            bind_address,
            jwt_secret: required("JWT_SECRET")?,
            plan_cache_ttl: Duration::from_secs(parse_or(&lookup, "PLAN_CACHE_TTL_SECS", 3600)?),
            db_statement_timeout: Duration::from_secs(parse_or(
                &lookup,
                "DB_STATEMENT_TIMEOUT_SECS",
                3,
            )?),
            db_max_connections,
            bucket_service_url: required("BUCKET_SERVICE_URL")?,
            bucket_timeout: Duration::from_secs(parse_or(&lookup, "BUCKET_TIMEOUT_SECS", 5)?),
            bucket_retries: parse_or(&lookup, "BUCKET_RETRIES", 3)?,
            run_migrations: parse_or(&lookup, "RUN_MIGRATIONS", false)?,
        })
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.db_max_connections,
            ..PoolSettings::default()
        }
    }

    pub fn provisioner_config(&self) -> ProvisionerConfig {
        ProvisionerConfig {
            base_url: self.bucket_service_url.clone(),
            timeout: self.bucket_timeout,
            retries: self.bucket_retries,
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: raw,
            reason: e.to_string(),
        }),
    }
}
