//! Integration tests for the cache registry.
//!
//! These tests verify the registry lifecycle:
//! - Cache creation, lookup and removal
//! - Bulk clearing across caches
//! - Statistics lookup by name
//! - Shutdown behavior for the registry and outstanding handles

use std::sync::Arc;
use tempfile::TempDir;
use tiercache::cache::CacheError;
use tiercache::config::{CacheConfig, RegistryConfig};
use tiercache::registry::{CacheRegistry, RegistryState};

// =============================================================================
// Test Helpers
// =============================================================================

async fn open_registry(temp: &TempDir) -> CacheRegistry {
    CacheRegistry::open(RegistryConfig::new(temp.path()))
        .await
        .unwrap()
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_registry_lifecycle() {
    let temp = TempDir::new().unwrap();
    let registry = open_registry(&temp).await;
    assert_eq!(registry.state(), RegistryState::Active);
    assert!(registry.cache_names().unwrap().is_empty());

    let users = registry
        .create_cache("users", CacheConfig::default())
        .await
        .unwrap();
    registry.add_cache("pages").await.unwrap();
    assert_eq!(registry.cache_names().unwrap(), vec!["pages", "users"]);

    users.put("u1", b"alice".to_vec()).await.unwrap();
    let again = registry.get_cache("users").unwrap();
    assert_eq!(again.get("u1").await.unwrap(), Some(b"alice".to_vec()));

    registry.remove_cache("pages").await.unwrap();
    assert_eq!(registry.cache_names().unwrap(), vec!["users"]);

    registry.shutdown().await;
    assert_eq!(registry.state(), RegistryState::Closed);
}

#[tokio::test]
async fn test_get_cache_never_creates() {
    let temp = TempDir::new().unwrap();
    let registry = open_registry(&temp).await;

    let result = registry.get_cache("ghost");
    assert!(matches!(result, Err(CacheError::CacheNotFound(ref name)) if name == "ghost"));
    assert!(registry.cache_names().unwrap().is_empty());
    assert!(matches!(
        registry.statistics("ghost").await,
        Err(CacheError::CacheNotFound(_))
    ));
    registry.shutdown().await;
}

#[tokio::test]
async fn test_create_existing_name_fails() {
    let temp = TempDir::new().unwrap();
    let registry = open_registry(&temp).await;

    registry.add_cache("c").await.unwrap();
    let result = registry.add_cache("c").await;
    assert!(matches!(result, Err(CacheError::CacheAlreadyExists(_))));
    registry.shutdown().await;
}

#[tokio::test]
async fn test_clear_all_keeps_definitions_and_statistics() {
    let temp = TempDir::new().unwrap();
    let registry = open_registry(&temp).await;

    let a = registry.add_cache("a").await.unwrap();
    let b = registry.add_cache("b").await.unwrap();
    for i in 0..5 {
        a.put(format!("k{}", i), vec![i]).await.unwrap();
        b.put(format!("k{}", i), vec![i]).await.unwrap();
    }
    a.get("k1").await.unwrap();

    registry.clear_all().await.unwrap();

    assert_eq!(registry.cache_names().unwrap(), vec!["a", "b"]);
    assert_eq!(a.size().await.unwrap(), 0);
    assert_eq!(b.size().await.unwrap(), 0);
    assert_eq!(a.get("k1").await.unwrap(), None);

    let stats = registry.statistics("a").await.unwrap();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.elements, 0);
    registry.shutdown().await;
}

#[tokio::test]
async fn test_statistics_by_name() {
    let temp = TempDir::new().unwrap();
    let registry = open_registry(&temp).await;

    let store = registry.add_cache("s").await.unwrap();
    store.put("k", vec![1]).await.unwrap();
    store.get("k").await.unwrap();
    store.get("k").await.unwrap();
    store.get("absent").await.unwrap();

    let stats = registry.statistics("s").await.unwrap();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.hits_in_memory, 2);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hit_rate, 67);
    assert_eq!(stats.elements, 1);
    assert!(stats.average_get_time >= 0.0);

    let json = stats.to_json();
    assert_eq!(json["hitRate"], 67);
    assert_eq!(json["elementsInMemory"], 1);
    registry.shutdown().await;
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test]
async fn test_shutdown_rejects_everything() {
    let temp = TempDir::new().unwrap();
    let registry = open_registry(&temp).await;
    let store = registry.add_cache("c").await.unwrap();
    store.put("k", vec![1]).await.unwrap();

    registry.shutdown().await;

    assert!(matches!(
        registry.create_cache("d", CacheConfig::default()).await,
        Err(CacheError::RegistryClosed)
    ));
    assert!(matches!(registry.get_cache("c"), Err(CacheError::RegistryClosed)));
    assert!(matches!(
        registry.remove_cache("c").await,
        Err(CacheError::RegistryClosed)
    ));
    assert!(matches!(registry.clear_all().await, Err(CacheError::RegistryClosed)));
    assert!(matches!(
        registry.statistics("c").await,
        Err(CacheError::RegistryClosed)
    ));

    assert!(matches!(store.get("k").await, Err(CacheError::RegistryClosed)));
    assert!(matches!(store.remove("k").await, Err(CacheError::RegistryClosed)));
    assert!(matches!(store.size().await, Err(CacheError::RegistryClosed)));
}

#[tokio::test]
async fn test_concurrent_shutdown_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let registry = Arc::new(open_registry(&temp).await);
    for name in ["a", "b", "c"] {
        let store = registry.add_cache(name).await.unwrap();
        store.put("k", vec![1]).await.unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.shutdown().await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(registry.state(), RegistryState::Closed);
    registry.shutdown().await;
    assert_eq!(registry.state(), RegistryState::Closed);
}

#[tokio::test]
async fn test_declared_caches_use_their_settings() {
    let temp = TempDir::new().unwrap();
    let config = RegistryConfig::from_ini_str(&format!(
        r#"
[registry]
root = {}

[defaults]
memory_capacity = 3

[cache:small]
memory_capacity = 1
disk_capacity = 0
"#,
        temp.path().display()
    ))
    .unwrap();

    let registry = CacheRegistry::open(config).await.unwrap();
    let small = registry.get_cache("small").unwrap();
    assert_eq!(small.config().memory_capacity, 1);
    assert_eq!(small.config().disk_capacity, 0);

    small.put("a", vec![1]).await.unwrap();
    small.put("b", vec![2]).await.unwrap();
    assert_eq!(small.size().await.unwrap(), 1);

    let added = registry.add_cache("added").await.unwrap();
    assert_eq!(added.config().memory_capacity, 3);
    registry.shutdown().await;
}
