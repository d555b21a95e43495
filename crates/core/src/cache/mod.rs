//! One-shot image cache.
//!
//! A capture's GIF is stored under a fresh key that the HTML page embeds as
//! the image URL. The browser's follow-up request takes the bytes out; a
//! second request for the same key is a miss.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;
use uuid::Uuid;

/// Bounds for entries that are never fetched.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entries kept at most; the oldest is evicted to make room.
    pub max_entries: usize,
    /// Entries older than this are dropped and no longer served.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 256,
            ttl: Duration::from_secs(5 * 60),
        }
    }
}

struct CacheEntry {
    bytes: Vec<u8>,
    stored: Instant,
}

/// Process-wide store of pending images.
pub struct ImageCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    config: CacheConfig,
}

impl ImageCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Store `bytes` under a new key and return the key.
    ///
    /// Keys are random 128-bit identifiers and are never handed out twice.
    pub fn store(&self, bytes: Vec<u8>) -> String {
        let key = Uuid::new_v4().simple().to_string();
        let mut entries = self.lock();

        let ttl = self.config.ttl;
        entries.retain(|_, entry| entry.stored.elapsed() < ttl);

        while !entries.is_empty() && entries.len() >= self.config.max_entries.max(1) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    debug!(key = %k, "evicting unfetched image");
                    entries.remove(&k);
                }
                None => break,
            }
        }

        entries.insert(
            key.clone(),
            CacheEntry {
                bytes,
                stored: Instant::now(),
            },
        );
        key
    }

    /// Remove and return the bytes for `key`.
    ///
    /// Returns `None` if the key was never stored, was already taken, or has
    /// expired.
    pub fn take_once(&self, key: &str) -> Option<Vec<u8>> {
        let entry = self.lock().remove(key)?;
        if entry.stored.elapsed() >= self.config.ttl {
            return None;
        }
        Some(entry.bytes)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}
