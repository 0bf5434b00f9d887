use crate::models::poe::Attachment;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Key prefix shared by all backends so cache entries are recognizable when
/// inspecting the store directly.
const KEY_PREFIX: &str = "image_attachment:";

/// Default entry lifetime when `CHAT2POE_CACHE_TTL_SECONDS` is unset.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// TTL key/value store in front of the image upload endpoint.
///
/// Every failure degrades to a miss (`get`) or `false` (`set`); callers may
/// log but must never fail a request over the cache. Concurrent first-time
/// resolution of one source is not deduplicated: two requests may both miss
/// and both upload, which is accepted.
pub trait AttachmentCache: Send + Sync {
    fn get(&self, source_url: &str) -> Option<Attachment>;
    fn set(&self, source_url: &str, attachment: &Attachment, ttl: Duration) -> bool;
}

/// In-process backend: a mutex-guarded map with per-entry deadlines,
/// lazily evicted on read.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Attachment, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AttachmentCache for MemoryCache {
    fn get(&self, source_url: &str) -> Option<Attachment> {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match entries.get(source_url) {
            Some((attachment, expires_at)) if *expires_at > Instant::now() => {
                Some(attachment.clone())
            }
            Some(_) => {
                entries.remove(source_url);
                None
            }
            None => None,
        }
    }

    fn set(&self, source_url: &str, attachment: &Attachment, ttl: Duration) -> bool {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(
            source_url.to_string(),
            (attachment.clone(), Instant::now() + ttl),
        );
        true
    }
}

/// Redis backend with a small r2d2 pool; entries are JSON-encoded
/// attachments written with `SETEX`.
pub struct RedisCache {
    pool: r2d2::Pool<redis::Client>,
}

impl RedisCache {
    pub fn new(redis_url: &str) -> Result<Self, anyhow::Error> {
        let client = redis::Client::open(redis_url)?;
        let pool = r2d2::Pool::builder()
            .max_size(8)
            .connection_timeout(Duration::from_secs(2))
            .build(client)?;
        // Fail construction (not requests) when Redis is unreachable, so a
        // misconfigured URL is caught at startup.
        let mut conn = pool.get()?;
        redis::cmd("PING").query::<String>(&mut *conn)?;
        Ok(Self { pool })
    }

    fn cache_key(source_url: &str) -> String {
        format!("{KEY_PREFIX}{source_url}")
    }
}

impl AttachmentCache for RedisCache {
    fn get(&self, source_url: &str) -> Option<Attachment> {
        let mut conn = match self.pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!("attachment cache unavailable, treating as miss: {e}");
                return None;
            }
        };
        let raw: Option<String> = match redis::cmd("GET")
            .arg(Self::cache_key(source_url))
            .query(&mut *conn)
        {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("attachment cache read failed, treating as miss: {e}");
                return None;
            }
        };
        raw.and_then(|json| match serde_json::from_str(&json) {
            Ok(attachment) => Some(attachment),
            Err(e) => {
                tracing::error!("cached attachment failed to decode, treating as miss: {e}");
                None
            }
        })
    }

    fn set(&self, source_url: &str, attachment: &Attachment, ttl: Duration) -> bool {
        let json = match serde_json::to_string(attachment) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("attachment failed to encode for caching: {e}");
                return false;
            }
        };
        let mut conn = match self.pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!("attachment cache unavailable, skipping write: {e}");
                return false;
            }
        };
        match redis::cmd("SETEX")
            .arg(Self::cache_key(source_url))
            .arg(ttl.as_secs())
            .arg(json)
            .query::<()>(&mut *conn)
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("attachment cache write failed: {e}");
                false
            }
        }
    }
}

/// Pick a backend from the environment: Redis when `CHAT2POE_REDIS_URL` is
/// set and reachable, in-process memory otherwise.
pub fn cache_from_env() -> std::sync::Arc<dyn AttachmentCache> {
    if let Ok(url) = std::env::var("CHAT2POE_REDIS_URL") {
        let url = url.trim();
        if !url.is_empty() {
            match RedisCache::new(url) {
                Ok(cache) => {
                    tracing::info!("attachment cache backed by Redis");
                    return std::sync::Arc::new(cache);
                }
                Err(e) => {
                    tracing::warn!("Redis cache unavailable ({e}), falling back to memory");
                }
            }
        }
    }
    std::sync::Arc::new(MemoryCache::new())
}

/// Entry lifetime from `CHAT2POE_CACHE_TTL_SECONDS`, defaulting to 600s.
pub fn cache_ttl_from_env() -> Duration {
    std::env::var("CHAT2POE_CACHE_TTL_SECONDS")
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_CACHE_TTL)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(name: &str) -> Attachment {
        Attachment {
            url: format!("https://pfst.cf2.poecdn.net/base/image/{name}"),
            content_type: "image/png".to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn memory_cache_round_trips() {
        let cache = MemoryCache::new();
        let a = attachment("img_1_abc123.png");
        assert!(cache.get("data:image/png;base64,AAAA").is_none());
        assert!(cache.set("data:image/png;base64,AAAA", &a, Duration::from_secs(60)));
        assert_eq!(cache.get("data:image/png;base64,AAAA"), Some(a));
    }

    #[test]
    fn memory_cache_expires_entries() {
        let cache = MemoryCache::new();
        let a = attachment("img_2_def456.png");
        cache.set("key", &a, Duration::from_secs(0));
        assert!(cache.get("key").is_none());
    }

    #[test]
    fn ttl_env_parsing_falls_back_to_default() {
        // No env manipulation here; just pin the default.
        assert_eq!(DEFAULT_CACHE_TTL, Duration::from_secs(600));
    }
}
