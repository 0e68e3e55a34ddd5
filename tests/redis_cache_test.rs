// ============================================================================
// Redis Cache Integration Tests
// ============================================================================
//
// Hot cache, summary cache and persistence queue against a real Redis.
// Every test works under its own random key namespace.
//
// Run with: cargo test --test redis_cache_test -- --ignored
// (Tests are marked with #[ignore] to skip unless Redis is available)
//
// ============================================================================

use chrono::{Duration, Utc};
use pairchat_config::RedisKeyPrefixes;
use pairchat_redis::RedisClient;
use pairchat_server::hot_cache::{HotCache, RedisHotCache};
use pairchat_server::persistence::{DeadLetterJob, JobQueue, RedisJobQueue};
use pairchat_server::summary::{ActivityUpdate, RedisSummaryCache, SummaryCache};
use pairchat_types::{ordered_pair, Message};
use serial_test::serial;
use std::env;
use uuid::Uuid;

async fn connect() -> RedisClient {
    let redis_url = env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    RedisClient::connect(&redis_url)
        .await
        .expect("Failed to create Redis connection for tests")
}

/// Default key layout under a throwaway namespace
fn test_prefixes() -> RedisKeyPrefixes {
    let ns = format!("test:{}:", Uuid::new_v4().simple());
    let d = RedisKeyPrefixes::default();
    RedisKeyPrefixes {
        hot_messages: format!("{}{}", ns, d.hot_messages),
        staging: format!("{}{}", ns, d.staging),
        read_marker: format!("{}{}", ns, d.read_marker),
        conversation_list: format!("{}{}", ns, d.conversation_list),
        conversation_details: format!("{}{}", ns, d.conversation_details),
        unseen: format!("{}{}", ns, d.unseen),
        user: format!("{}{}", ns, d.user),
        persist_queue: format!("{}{}", ns, d.persist_queue),
        persist_job: format!("{}{}", ns, d.persist_job),
        dead_letter: format!("{}{}", ns, d.dead_letter),
    }
}

fn messages(conversation_id: Uuid, count: i64) -> Vec<Message> {
    let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
    let base = pairchat_types::now_millis() - Duration::minutes(5);
    (0..count)
        .map(|i| {
            let mut m = Message::new(conversation_id, alice, bob, format!("m{}", i), None);
            m.created_at = base + Duration::milliseconds(i);
            m
        })
        .collect()
}

// ============================================================================
// Hot cache
// ============================================================================

#[tokio::test]
#[serial]
#[ignore] // Requires Redis - run with: cargo test --test redis_cache_test -- --ignored
async fn test_hot_cache_snapshot_is_newest_first() {
    let cache = RedisHotCache::new(connect().await, test_prefixes(), 3600);
    let cid = Uuid::new_v4();
    let sent = messages(cid, 4);
    for (i, m) in sent.iter().enumerate() {
        assert_eq!(cache.append(m).await.unwrap(), i as u64 + 1);
    }

    let snapshot = cache.snapshot(cid).await.unwrap();
    let ids: Vec<Uuid> = snapshot.iter().map(|m| m.id).collect();
    let expected: Vec<Uuid> = sent.iter().rev().map(|m| m.id).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
#[serial]
#[ignore] // Requires Redis
async fn test_hot_cache_append_replaces_corrupted_key() {
    let prefixes = test_prefixes();
    let mut redis = connect().await;
    let cid = Uuid::new_v4();
    let key = format!("{}{}", prefixes.hot_messages, cid);
    redis.hset(&key, "not", "a zset").await.unwrap();

    let cache = RedisHotCache::new(redis.clone(), prefixes, 3600);
    assert_eq!(cache.snapshot(cid).await.unwrap().len(), 0);

    redis.hset(&key, "not", "a zset").await.unwrap();
    let size = cache.append(&messages(cid, 1)[0]).await.unwrap();
    assert_eq!(size, 1);
    assert_eq!(redis.key_type(&key).await.unwrap(), "zset");
}

#[tokio::test]
#[serial]
#[ignore] // Requires Redis
async fn test_hot_cache_stage_and_clear_keeps_late_appends() {
    let cache = RedisHotCache::new(connect().await, test_prefixes(), 3600);
    let cid = Uuid::new_v4();
    let sent = messages(cid, 6);
    for m in &sent[..4] {
        cache.append(m).await.unwrap();
    }

    let batch = cache.stage(cid).await.unwrap();
    assert!(!batch.resumed);
    assert_eq!(batch.entries.len(), 4);

    // Arrives while the batch is being committed
    for m in &sent[4..] {
        cache.append(m).await.unwrap();
    }
    assert_eq!(cache.staged_conversations().await.unwrap(), vec![cid]);

    // A second stage before clearing resumes the same batch
    let resumed = cache.stage(cid).await.unwrap();
    assert!(resumed.resumed);
    assert_eq!(resumed.entries, batch.entries);

    cache.clear_staged(cid, &batch).await.unwrap();
    let left: Vec<Uuid> = cache.snapshot(cid).await.unwrap().iter().map(|m| m.id).collect();
    assert_eq!(left, vec![sent[5].id, sent[4].id]);
    assert!(cache.staged_conversations().await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
#[ignore] // Requires Redis
async fn test_hot_cache_read_markers() {
    let cache = RedisHotCache::new(connect().await, test_prefixes(), 3600);
    let cid = Uuid::new_v4();
    let reader = Uuid::new_v4();
    let at = pairchat_types::now_millis();

    cache.mark_read_through(cid, reader, at).await.unwrap();
    let markers = cache.read_markers(cid).await.unwrap();
    assert_eq!(markers.get(&reader), Some(&at.timestamp_millis()));
}

// ============================================================================
// Summary cache
// ============================================================================

#[tokio::test]
#[serial]
#[ignore] // Requires Redis
async fn test_summary_cache_tracks_recent_conversations() {
    let cache = RedisSummaryCache::new(connect().await, test_prefixes(), 3);
    let alice = Uuid::new_v4();
    let now = Utc::now();

    let mut conversations = Vec::new();
    for i in 0..4 {
        let cid = Uuid::new_v4();
        let peer = Uuid::new_v4();
        cache
            .record_activity(&ActivityUpdate {
                conversation_id: cid,
                sender_id: alice,
                receiver_id: peer,
                preview: format!("hello {}", i),
                at: now + Duration::seconds(i),
            })
            .await
            .unwrap();
        conversations.push((cid, peer));
    }

    let page = cache.conversation_page(alice, 1, 10).await.unwrap().unwrap();
    // Oldest entry trimmed past the cap
    assert_eq!(page.total, 3);
    let ids: Vec<Uuid> = page.entries.iter().map(|e| e.conversation_id).collect();
    assert_eq!(
        ids,
        vec![conversations[3].0, conversations[2].0, conversations[1].0]
    );
    assert_eq!(page.entries[0].last_message, "hello 3");

    // Past the cached window the caller falls back to the store
    assert!(cache.conversation_page(alice, 2, 10).await.unwrap().is_none());
    assert!(cache
        .conversation_page(Uuid::new_v4(), 1, 10)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
#[serial]
#[ignore] // Requires Redis
async fn test_summary_cache_unseen_counters() {
    let cache = RedisSummaryCache::new(connect().await, test_prefixes(), 15);
    let cid = Uuid::new_v4();
    let bob = Uuid::new_v4();

    assert_eq!(cache.unseen(cid, bob).await.unwrap(), 0);
    assert_eq!(cache.increment_unseen(cid, bob).await.unwrap(), 1);
    assert_eq!(cache.increment_unseen(cid, bob).await.unwrap(), 2);
    cache.clear_unseen(cid, bob).await.unwrap();
    assert_eq!(cache.unseen(cid, bob).await.unwrap(), 0);
}

#[tokio::test]
#[serial]
#[ignore] // Requires Redis
async fn test_summary_cache_participants_round_trip() {
    let cache = RedisSummaryCache::new(connect().await, test_prefixes(), 15);
    let cid = Uuid::new_v4();
    let (a, b) = ordered_pair(Uuid::new_v4(), Uuid::new_v4());

    assert_eq!(cache.participants(cid).await.unwrap(), None);
    cache
        .record_activity(&ActivityUpdate {
            conversation_id: cid,
            sender_id: b,
            receiver_id: a,
            preview: "hi".to_string(),
            at: Utc::now(),
        })
        .await
        .unwrap();
    let (x, y) = cache.participants(cid).await.unwrap().unwrap();
    assert_eq!(ordered_pair(x, y), (a, b));
}

// ============================================================================
// Persistence queue
// ============================================================================

#[tokio::test]
#[serial]
#[ignore] // Requires Redis
async fn test_job_queue_deduplicates_until_complete() {
    let queue = RedisJobQueue::new(connect().await, test_prefixes(), 300);
    let cid = Uuid::new_v4();

    assert!(queue.enqueue(cid).await.unwrap());
    assert!(!queue.enqueue(cid).await.unwrap());

    let job = queue.next().await.unwrap().unwrap();
    assert_eq!(job.conversation_id, cid);
    assert!(queue.next().await.unwrap().is_none());

    // Still claimed while in flight
    assert!(!queue.enqueue(cid).await.unwrap());
    queue.complete(&job).await.unwrap();
    assert!(queue.enqueue(cid).await.unwrap());
}

#[tokio::test]
#[serial]
#[ignore] // Requires Redis
async fn test_job_queue_retry_and_dead_letter() {
    let prefixes = test_prefixes();
    let mut redis = connect().await;
    let queue = RedisJobQueue::new(redis.clone(), prefixes.clone(), 300);
    let cid = Uuid::new_v4();

    queue.enqueue(cid).await.unwrap();
    let job = queue.next().await.unwrap().unwrap();
    queue.retry(job.next_attempt()).await.unwrap();

    let retried = queue.next().await.unwrap().unwrap();
    assert_eq!(retried.attempt, 1);

    queue
        .dead_letter(DeadLetterJob {
            attempts: 3,
            failure_reason: "pool timed out".to_string(),
            dead_lettered_at: Utc::now().timestamp_millis(),
            job: retried,
        })
        .await
        .unwrap();

    let dead = redis.lrange(&prefixes.dead_letter, 0, -1).await.unwrap();
    assert_eq!(dead.len(), 1);
    let record: DeadLetterJob = serde_json::from_str(&dead[0]).unwrap();
    assert_eq!(record.job.conversation_id, cid);
    // Claim released with the dead letter
    assert!(queue.enqueue(cid).await.unwrap());
}

#[tokio::test]
#[serial]
#[ignore] // Requires Redis
async fn test_job_queue_requeue_takes_over_claim() {
    let queue = RedisJobQueue::new(connect().await, test_prefixes(), 300);
    let cid = Uuid::new_v4();

    // Popped by a worker that never finished it
    queue.enqueue(cid).await.unwrap();
    queue.next().await.unwrap().unwrap();
    assert!(!queue.enqueue(cid).await.unwrap());

    queue.requeue(cid).await.unwrap();
    let job = queue.next().await.unwrap().unwrap();
    assert_eq!(job.conversation_id, cid);
    assert_eq!(job.attempt, 0);
    assert!(!queue.enqueue(cid).await.unwrap());

    queue.complete(&job).await.unwrap();
    assert!(queue.enqueue(cid).await.unwrap());
}
