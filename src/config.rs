use dotenvy::dotenv;
use std::{env, str::FromStr, time::Duration};
use thiserror::Error;

pub const DEV_JWT_SECRET: &str = "your-secret-key-change-in-production";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing env var: {0}")]
    Missing(String),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_maxage_minutes: i64,
    pub port: u16,
    pub max_connections: u32,
    pub request_timeout: Duration,
}

/// Loads `.env` into the process environment. Returns `false` when no file was found.
pub fn load_env() -> bool {
    dotenv().is_ok()
}

pub fn get_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key.to_string()))
}

pub fn get_env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

pub fn jwt_secret_from_env() -> String {
    match env::var("JWT_SECRET") {
        Ok(secret) if !secret.is_empty() => secret,
        _ => {
            tracing::warn!("JWT_SECRET not set, using development secret");
            DEV_JWT_SECRET.to_string()
        }
    }
}

impl Config {
    pub const DEFAULT_JWT_MAXAGE_MINUTES: i64 = 24 * 60;

    pub fn from_env() -> Result<Config, ConfigError> {
        Ok(Config {
            database_url: get_env("DATABASE_URL")?,
            jwt_secret: jwt_secret_from_env(),
            jwt_maxage_minutes: get_env_or("JWT_MAXAGE", Self::DEFAULT_JWT_MAXAGE_MINUTES)?,
            port: get_env_or("PORT", 8080)?,
            max_connections: get_env_or("DATABASE_MAX_CONNECTIONS", 5)?,
            request_timeout: Duration::from_secs(get_env_or("REQUEST_TIMEOUT_SECS", 10)?),
        })
    }
}
