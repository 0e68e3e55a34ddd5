//! Redis client implementation with connection management

use crate::Result;
use redis::{aio::ConnectionManager, AsyncCommands};
use std::collections::HashMap;

/// Redis client with automatic reconnection
#[derive(Clone)]
pub struct RedisClient {
    conn: ConnectionManager,
}

impl RedisClient {
    /// Connect to Redis server
    ///
    /// Supports both redis:// and rediss:// (TLS) URLs
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    /// Get connection manager (for advanced operations)
    pub fn connection_mut(&mut self) -> &mut ConnectionManager {
        &mut self.conn
    }

    /// PING - round trip used by health checks
    pub async fn ping(&mut self) -> Result<()> {
        let _: String = redis::cmd("PING").query_async(&mut self.conn).await?;
        Ok(())
    }

    /// Run a pipeline (optionally `.atomic()`) and decode its result
    pub async fn run_pipeline<T: redis::FromRedisValue>(
        &mut self,
        pipeline: &redis::Pipeline,
    ) -> Result<T> {
        pipeline.query_async(&mut self.conn).await
    }

    // ============================================================================
    // Key Operations
    // ============================================================================

    /// DEL - Delete one or more keys
    pub async fn del<K>(&mut self, keys: K) -> Result<i64>
    where
        K: redis::ToRedisArgs + Send + Sync,
    {
        self.conn.del(keys).await
    }

    /// EXISTS - Check if key exists
    pub async fn exists(&mut self, key: &str) -> Result<bool> {
        self.conn.exists(key).await
    }

    /// EXPIRE - Set expiry time in seconds
    pub async fn expire(&mut self, key: &str, seconds: i64) -> Result<bool> {
        self.conn.expire(key, seconds).await
    }

    /// TYPE - Data type stored at key ("none" when absent)
    pub async fn key_type(&mut self, key: &str) -> Result<String> {
        redis::cmd("TYPE").arg(key).query_async(&mut self.conn).await
    }

    /// SCAN MATCH - Collect every key matching a glob pattern
    pub async fn scan_match(&mut self, pattern: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut iter: redis::AsyncIter<'_, String> = self.conn.scan_match(pattern).await?;
        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }
        Ok(keys)
    }

    // ============================================================================
    // Key-Value Operations
    // ============================================================================

    /// SET NX EX - Set only if absent, with expiry. Returns true when set.
    pub async fn set_nx_ex(&mut self, key: &str, value: &str, seconds: u64) -> Result<bool> {
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(seconds)
            .query_async(&mut self.conn)
            .await?;
        Ok(reply.is_some())
    }

    // ============================================================================
    // Hash Operations
    // ============================================================================

    /// HSET - Set several fields at once
    pub async fn hset_multiple(&mut self, key: &str, fields: &[(&str, String)]) -> Result<()> {
        self.conn.hset_multiple(key, fields).await
    }

    /// HGET - Read one field
    pub async fn hget<T: redis::FromRedisValue>(
        &mut self,
        key: &str,
        field: &str,
    ) -> Result<Option<T>> {
        self.conn.hget(key, field).await
    }

    /// HGETALL - Read every field
    pub async fn hgetall(&mut self, key: &str) -> Result<HashMap<String, String>> {
        self.conn.hgetall(key).await
    }

    /// HINCRBY - Atomically add to an integer field
    pub async fn hincr(&mut self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.conn.hincr(key, field, delta).await
    }

    /// HSET - Set a single field
    pub async fn hset(&mut self, key: &str, field: &str, value: &str) -> Result<()> {
        let _: i64 = self.conn.hset(key, field, value).await?;
        Ok(())
    }

    // ============================================================================
    // List Operations
    // ============================================================================

    /// LPUSH - Push to head of list
    pub async fn lpush<V>(&mut self, key: &str, value: V) -> Result<i64>
    where
        V: redis::ToRedisArgs + Send + Sync,
    {
        self.conn.lpush(key, value).await
    }

    /// RPOP - Pop from the tail, `None` when the list is empty
    pub async fn rpop(&mut self, key: &str) -> Result<Option<String>> {
        self.conn.rpop(key, None).await
    }

    /// LRANGE - Read a slice of a list
    pub async fn lrange(&mut self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        self.conn.lrange(key, start, stop).await
    }

    /// LLEN - Get list length
    pub async fn llen(&mut self, key: &str) -> Result<i64> {
        self.conn.llen(key).await
    }

    // ============================================================================
    // Sorted Set Operations
    // ============================================================================

    /// ZADD - Add or re-score a member
    pub async fn zadd(&mut self, key: &str, member: &str, score: f64) -> Result<i64> {
        self.conn.zadd(key, member, score).await
    }

    /// ZCARD - Number of members
    pub async fn zcard(&mut self, key: &str) -> Result<u64> {
        self.conn.zcard(key).await
    }

    /// ZRANGE WITHSCORES - Members in ascending score order
    pub async fn zrange_withscores(
        &mut self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>> {
        self.conn.zrange_withscores(key, start, stop).await
    }

    /// ZREVRANGE - Members in descending score order
    pub async fn zrevrange(&mut self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        self.conn.zrevrange(key, start, stop).await
    }

    /// ZREVRANGE WITHSCORES - Members and scores in descending score order
    pub async fn zrevrange_withscores(
        &mut self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>> {
        self.conn.zrevrange_withscores(key, start, stop).await
    }

    /// ZREMRANGEBYRANK - Drop members by ascending rank
    pub async fn zremrangebyrank(&mut self, key: &str, start: isize, stop: isize) -> Result<i64> {
        self.conn.zremrangebyrank(key, start, stop).await
    }

    /// ZUNIONSTORE with a single source - atomic copy of a sorted set.
    /// Returns the number of members copied.
    pub async fn zcopy(&mut self, destination: &str, source: &str) -> Result<u64> {
        self.conn.zunionstore(destination, &[source]).await
    }
}
