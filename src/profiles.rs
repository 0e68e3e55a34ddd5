// ============================================================================
// User profile directory
// ============================================================================
//
// Display data (username, image) attached to delivered messages and
// conversation lists. Read through a short-lived Redis hash `user:{id}`,
// falling back to Postgres. The entry is warmed on joinApp and dropped on
// disconnect.
//
// ============================================================================

use async_trait::async_trait;
use pairchat_db::DbPool;
use pairchat_error::AppResult;
use pairchat_redis::RedisClient;
use pairchat_types::Profile;
use std::collections::HashMap;
use uuid::Uuid;

#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    /// Never fails for an unknown user: a placeholder profile is returned
    async fn profile(&self, user_id: Uuid) -> AppResult<Profile>;

    /// Load the profile into the cache ahead of the first send
    async fn warm(&self, user_id: Uuid) -> AppResult<()>;

    async fn evict(&self, user_id: Uuid) -> AppResult<()>;
}

pub struct CachedProfileDirectory {
    redis: RedisClient,
    pool: DbPool,
    key_prefix: String,
    ttl_secs: i64,
}

impl CachedProfileDirectory {
    pub fn new(redis: RedisClient, pool: DbPool, key_prefix: String, ttl_secs: u64) -> Self {
        Self {
            redis,
            pool,
            key_prefix,
            ttl_secs: ttl_secs as i64,
        }
    }

    fn key(&self, user_id: Uuid) -> String {
        format!("{}{}", self.key_prefix, user_id)
    }

    async fn cached(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        let mut redis = self.redis.clone();
        let fields = redis.hgetall(&self.key(user_id)).await?;
        Ok(profile_from_hash(user_id, &fields))
    }

    async fn store(&self, profile: &Profile) -> AppResult<()> {
        let key = self.key(profile.id);
        let mut redis = self.redis.clone();
        redis
            .hset_multiple(
                &key,
                &[
                    ("id", profile.id.to_string()),
                    ("username", profile.username.clone()),
                    ("image", profile.avatar.clone().unwrap_or_default()),
                ],
            )
            .await?;
        redis.expire(&key, self.ttl_secs).await?;
        Ok(())
    }

    async fn load(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        Ok(pairchat_db::get_user_profile(&self.pool, user_id).await?)
    }
}

fn profile_from_hash(user_id: Uuid, fields: &HashMap<String, String>) -> Option<Profile> {
    let username = fields.get("username")?.clone();
    let avatar = fields.get("image").filter(|a| !a.is_empty()).cloned();
    Some(Profile {
        id: user_id,
        username,
        avatar,
    })
}

#[async_trait]
impl ProfileDirectory for CachedProfileDirectory {
    async fn profile(&self, user_id: Uuid) -> AppResult<Profile> {
        match self.cached(user_id).await {
            Ok(Some(profile)) => return Ok(profile),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Profile cache read failed, using database");
            }
        }

        let Some(profile) = self.load(user_id).await? else {
            return Ok(Profile::unknown(user_id));
        };
        if let Err(e) = self.store(&profile).await {
            tracing::warn!(error = %e, "Failed to backfill profile cache");
        }
        Ok(profile)
    }

    async fn warm(&self, user_id: Uuid) -> AppResult<()> {
        if let Some(profile) = self.load(user_id).await? {
            self.store(&profile).await?;
        }
        Ok(())
    }

    async fn evict(&self, user_id: Uuid) -> AppResult<()> {
        let mut redis = self.redis.clone();
        redis.del(self.key(user_id)).await?;
        Ok(())
    }
}
