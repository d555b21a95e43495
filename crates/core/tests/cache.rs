//! Tests for the one-shot image cache.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use wrp_core::{CacheConfig, ImageCache};

#[test]
fn test_first_take_returns_bytes_then_misses() {
    let cache = ImageCache::default();
    let key = cache.store(vec![1, 2, 3]);

    assert_eq!(cache.take_once(&key), Some(vec![1, 2, 3]));
    assert_eq!(cache.take_once(&key), None);
    assert!(cache.is_empty());
}

#[test]
fn test_unknown_key_misses() {
    let cache = ImageCache::default();
    cache.store(vec![9]);

    assert_eq!(cache.take_once("0000"), None);
    assert_eq!(cache.take_once(""), None);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_keys_are_url_safe() {
    let cache = ImageCache::default();
    let key = cache.store(Vec::new());

    assert!(key.len() >= 32);
    assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_concurrent_stores_never_collide() {
    let cache = Arc::new(ImageCache::new(CacheConfig {
        max_entries: 10_000,
        ..Default::default()
    }));

    let handles: Vec<_> = (0..8u8)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                (0..200u16)
                    .map(|i| {
                        let payload = vec![t, (i >> 8) as u8, i as u8];
                        (cache.store(payload.clone()), payload)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let stored: Vec<(String, Vec<u8>)> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();

    let keys: HashSet<&String> = stored.iter().map(|(k, _)| k).collect();
    assert_eq!(keys.len(), 1600);
    assert_eq!(cache.len(), 1600);

    // Nothing was overwritten: every key still yields its own payload.
    for (key, payload) in &stored {
        assert_eq!(cache.take_once(key).as_ref(), Some(payload));
    }
    assert!(cache.is_empty());
}

#[test]
fn test_concurrent_takes_yield_each_entry_once() {
    let cache = Arc::new(ImageCache::default());
    let key = cache.store(vec![42]);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            thread::spawn(move || cache.take_once(&key))
        })
        .collect();

    let hits = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .count();
    assert_eq!(hits, 1);
}

#[test]
fn test_oldest_entry_is_evicted_at_capacity() {
    let cache = ImageCache::new(CacheConfig {
        max_entries: 2,
        ..Default::default()
    });

    let first = cache.store(vec![1]);
    thread::sleep(Duration::from_millis(2));
    let second = cache.store(vec![2]);
    thread::sleep(Duration::from_millis(2));
    let third = cache.store(vec![3]);

    assert_eq!(cache.len(), 2);
    assert_eq!(cache.take_once(&first), None);
    assert_eq!(cache.take_once(&second), Some(vec![2]));
    assert_eq!(cache.take_once(&third), Some(vec![3]));
}

#[test]
fn test_expired_entries_are_not_served() {
    let cache = ImageCache::new(CacheConfig {
        ttl: Duration::from_millis(20),
        ..Default::default()
    });

    let stale = cache.store(vec![1]);
    thread::sleep(Duration::from_millis(40));
    assert_eq!(cache.take_once(&stale), None);

    let old = cache.store(vec![2]);
    thread::sleep(Duration::from_millis(40));
    let fresh = cache.store(vec![3]);

    // Storing purged the expired entry.
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.take_once(&old), None);
    assert_eq!(cache.take_once(&fresh), Some(vec![3]));
}
