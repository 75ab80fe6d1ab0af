//! Configuration module
//!
//! Loads configuration from environment variables.

use sha2::{Digest, Sha256};
use std::env;
use std::time::Duration;

use crate::domain::{DEFAULT_HASH_COST, MAX_HASH_COST, MIN_HASH_COST};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// bcrypt work factor for vendor passwords
    pub password_hash_cost: u32,

    /// SHA-256 hex digest of the admin API key; the raw key is not kept
    pub admin_key_digest: String,

    /// How often the subscription expiry sweep runs
    pub expiry_sweep_interval: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORT"))?;

        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string());

        let password_hash_cost: u32 = lookup("PASSWORD_HASH_COST")
            .unwrap_or_else(|| DEFAULT_HASH_COST.to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PASSWORD_HASH_COST"))?;
        if !(MIN_HASH_COST..=MAX_HASH_COST).contains(&password_hash_cost) {
            return Err(ConfigError::InvalidValue("PASSWORD_HASH_COST"));
        }

        let admin_key = lookup("ADMIN_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingEnv("ADMIN_API_KEY"))?;

        let sweep_secs: u64 = lookup("EXPIRY_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|| "3600".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("EXPIRY_SWEEP_INTERVAL_SECS"))?;
        if sweep_secs == 0 {
            return Err(ConfigError::InvalidValue("EXPIRY_SWEEP_INTERVAL_SECS"));
        }

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            password_hash_cost,
            admin_key_digest: digest_key(&admin_key),
            expiry_sweep_interval: Duration::from_secs(sweep_secs),
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// SHA-256 hex digest of an API key
pub fn digest_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
