// ============================================================================
// Pairchat Config - Centralized configuration management
// ============================================================================
//
// Loads every setting the server needs from environment variables (with an
// optional .env file) and fills the rest with defaults from constants.rs.
//
// ============================================================================

mod cache;
mod constants;
mod database;
mod logging;
mod media;
mod redis;
mod worker;

pub use cache::CacheConfig;
pub use constants::{
    MAX_FRAME_SIZE, MAX_MESSAGE_SIZE, MAX_UPLOAD_SIZE, SECONDS_PER_DAY, SECONDS_PER_HOUR,
    SECONDS_PER_MINUTE,
};
pub use database::DbConfig;
pub use logging::LoggingConfig;
pub use media::MediaConfig;
pub use redis::RedisKeyPrefixes;
pub use worker::WorkerConfig;

use anyhow::{Context, Result};
use constants::*;

/// Main configuration structure for the pairchat server
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,

    /// HS256 secret used to validate bearer tokens issued by the auth service
    pub jwt_secret: String,

    pub port: u16,
    pub bind_address: String,
    pub heartbeat_interval_secs: u64,
    pub heartbeat_timeout_secs: u64,
    pub rust_log: String,

    // Sub-configurations
    pub logging: LoggingConfig,
    pub db: DbConfig,
    pub cache: CacheConfig,
    pub worker: WorkerConfig,
    pub media: MediaConfig,
    pub redis_key_prefixes: RedisKeyPrefixes,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let jwt_secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters");
        }

        let heartbeat_interval_secs = std::env::var("HEARTBEAT_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL_SECS);

        let heartbeat_timeout_secs = std::env::var("HEARTBEAT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_HEARTBEAT_TIMEOUT_SECS)
            .max(heartbeat_interval_secs * 2);

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            redis_url: std::env::var("REDIS_URL").context("REDIS_URL must be set")?,
            jwt_secret,
            port,
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| format!("0.0.0.0:{}", port)),
            heartbeat_interval_secs,
            heartbeat_timeout_secs,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),

            logging: LoggingConfig::from_env()?,
            db: DbConfig::from_env(),
            cache: CacheConfig::from_env(),
            worker: WorkerConfig::from_env(),
            media: MediaConfig::from_env(port),
            redis_key_prefixes: RedisKeyPrefixes::from_env(),
        })
    }
}
