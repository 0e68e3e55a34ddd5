//! # Pairchat Redis
//!
//! Low-level Redis client for the pairchat messaging server.
//!
//! ## Design Principles
//!
//! - **No business logic** - key names and data shapes belong to callers
//! - **No dependencies** on other pairchat-* crates
//! - **Cheap to clone** - every clone shares one reconnecting connection
//!
//! ## Features
//!
//! - Connection management with automatic reconnection
//! - Key-value, hash, list and sorted-set operations
//! - Atomic pipelines (MULTI/EXEC)
//! - Cursor-based key scans
//!
//! ## Example
//!
//! ```rust,no_run
//! use pairchat_redis::RedisClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = RedisClient::connect("redis://localhost:6379").await?;
//!
//!     client.zadd("chat:messages:c1", "{\"id\":\"m1\"}", 1.0).await?;
//!     let newest: Vec<String> = client.zrevrange("chat:messages:c1", 0, 9).await?;
//!
//!     Ok(())
//! }
//! ```

mod client;

pub use client::RedisClient;

// Re-export commonly used types
pub use redis::{pipe, Pipeline, RedisError};

/// Result type for Redis operations
pub type Result<T> = std::result::Result<T, RedisError>;
