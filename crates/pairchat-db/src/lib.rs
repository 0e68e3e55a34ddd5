//! # Pairchat Database
//!
//! Connection pooling and the SQL behind the durable message store.
//! Queries return `sqlx::Error` untouched so callers can tell an outage
//! apart from a missing row.

mod conversations;
mod messages;
mod users;

pub use conversations::{
    conversation_page, count_conversations, find_conversation_by_pair,
    find_or_create_conversation, get_conversation, touch_conversation, ConversationWithUnread,
};
pub use messages::{count_messages, mark_read, messages_newest_first, upsert_messages};
pub use users::get_user_profile;

use pairchat_config::DbConfig;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};

/// Database connection pool type
pub type DbPool = Pool<Postgres>;

pub type DbResult<T> = Result<T, sqlx::Error>;

/// Create a PostgreSQL connection pool
pub async fn create_pool(database_url: &str, db_config: &DbConfig) -> DbResult<DbPool> {
    PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(
            db_config.acquire_timeout_secs,
        ))
        .idle_timeout(Some(std::time::Duration::from_secs(
            db_config.idle_timeout_secs,
        )))
        .test_before_acquire(true)
        .connect(database_url)
        .await
}

/// `SELECT 1` round trip used by health checks
pub async fn ping(pool: &DbPool) -> DbResult<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
