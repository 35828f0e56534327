//! Integration tests for the cache handle and its scope-store tree.

use std::sync::Arc;

use ram_pressure_cache::cache::hierarchical::Cache;
use ram_pressure_cache::cache::key::CacheKey;
use ram_pressure_cache::cache::policy::EvictionPolicy;
use ram_pressure_cache::cache::store::ScopeId;
use ram_pressure_cache::memory::FixedMemoryProbe;

fn key(tag: u8) -> CacheKey {
    CacheKey::from_digest([tag; 32])
}

fn classic_cache() -> Cache<String> {
    Cache::new(
        EvictionPolicy::NoEviction,
        Arc::new(FixedMemoryProbe::new(8.0)),
    )
}

#[test]
fn test_put_get_roundtrip_is_scope_local() {
    let cache = classic_cache();
    let inner = [ScopeId::from("subgraph-7")];
    cache.enter_scope(&inner);

    cache.put(&[], key(1), Arc::new("root value".into()), []);
    cache.put(&inner, key(2), Arc::new("inner value".into()), []);

    assert_eq!(cache.get(&[], &key(1)).unwrap().as_str(), "root value");
    assert_eq!(cache.get(&inner, &key(2)).unwrap().as_str(), "inner value");

    // Lookups route to the requesting scope's store only.
    assert!(cache.get(&inner, &key(1)).is_none());
    assert!(cache.get(&[], &key(2)).is_none());

    // A miss for a key that exists nowhere.
    assert!(cache.get(&[], &key(9)).is_none());
}

#[test]
fn test_overwrite_replaces_value() {
    let cache = classic_cache();
    cache.put(&[], key(1), Arc::new("first".into()), []);
    cache.put(&[], key(1), Arc::new("second".into()), []);

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get(&[], &key(1)).unwrap().as_str(), "second");
}

#[test]
fn test_key_lives_in_one_store_at_a_time() {
    let cache = classic_cache();
    let inner = [ScopeId::from("inner")];

    cache.put(&[], key(1), Arc::new("at root".into()), []);
    cache.put(&inner, key(1), Arc::new("moved inward".into()), []);

    assert_eq!(cache.len(), 1);
    assert!(cache.get(&[], &key(1)).is_none());
    assert_eq!(cache.get(&inner, &key(1)).unwrap().as_str(), "moved inward");
}

#[test]
fn test_invalidate_reaches_every_scope() {
    let cache = classic_cache();
    let inner = [ScopeId::from("inner")];
    cache.put(&inner, key(1), Arc::new("computed".into()), []);

    assert!(cache.invalidate(&key(1)));
    assert!(!cache.contains(&key(1)));
    // Idempotent on a gone key.
    assert!(!cache.invalidate(&key(1)));
}

#[test]
fn test_exit_scope_drops_local_entries_only() {
    let cache = classic_cache();
    let loop_scope = [ScopeId::from("loop")];
    let body = [ScopeId::from("loop"), ScopeId::from("body")];

    cache.put(&[], key(1), Arc::new("outer".into()), []);
    cache.put(&loop_scope, key(2), Arc::new("loop-local".into()), []);
    cache.put(&body, key(3), Arc::new("body-local".into()), []);

    // Exiting the loop scope takes its nested subcaches with it.
    assert_eq!(cache.exit_scope(&loop_scope), 2);
    assert!(cache.contains(&key(1)));
    assert!(!cache.contains(&key(2)));
    assert!(!cache.contains(&key(3)));
}

#[test]
fn test_keys_cover_all_scopes() {
    let cache = classic_cache();
    let inner = [ScopeId::from("inner")];
    cache.put(&[], key(1), Arc::new("a".into()), []);
    cache.put(&inner, key(2), Arc::new("b".into()), []);

    let mut keys = cache.keys();
    keys.sort();
    assert_eq!(keys, vec![key(1), key(2)]);
}

#[test]
fn test_values_are_shared_not_copied() {
    let cache = classic_cache();
    let value = Arc::new(String::from("large artifact"));
    cache.put(&[], key(1), Arc::clone(&value), []);

    let fetched = cache.get(&[], &key(1)).unwrap();
    assert!(Arc::ptr_eq(&fetched, &value));
}

#[test]
fn test_content_derived_keys_address_entries() {
    let cache = classic_cache();
    let inputs = serde_json::json!({"seed": 42, "steps": 20});
    let key = CacheKey::from_signature("sampler", &inputs).unwrap();

    cache.put(&[], key, Arc::new("sampled".into()), []);

    // An independently derived key for the same signature hits.
    let rederived = CacheKey::from_signature("sampler", &inputs).unwrap();
    assert_eq!(cache.get(&[], &rederived).unwrap().as_str(), "sampled");
}
