// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! End-to-end scenarios for the prioritization engine.
//!
//! Every test wires a [`CacheCoordinator`] to an [`InMemoryQueryCache`] and
//! drives time with tokio's paused clock.
//!
//! # Running Tests
//! ```bash
//! cargo test --test scenarios
//! ```
//!
//! # Test Organization
//! - `ttl_*` - expiry sweeps
//! - `pressure_*` - gentle and aggressive cleanup
//! - `tags_*` - bulk operations
//! - `adapter_*` - event intake from the external cache
//! - `maintenance_*` - timer lifecycle

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use query_priority_cache::{
    AccessPattern, CacheAction, CacheCoordinator, CachePayload, EngineConfig, EvictionReason,
    InMemoryQueryCache, MaintenanceHandle, PressureLevel, Priority, QueryKey, Registration, Snapshot,
};

const MB: usize = 1024 * 1024;

// =============================================================================
// Helpers
// =============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("query_priority_cache=debug")
        .with_test_writer()
        .try_init();
}

fn engine(config: EngineConfig) -> (Arc<InMemoryQueryCache>, Arc<CacheCoordinator>) {
    init_tracing();
    let cache = Arc::new(InMemoryQueryCache::new());
    let coordinator = Arc::new(CacheCoordinator::new(config, cache.clone()).expect("valid config"));
    cache.subscribe(&coordinator);
    (cache, coordinator)
}

fn key(path: &str) -> QueryKey {
    QueryKey::from(path)
}

/// Put a query into the external cache and pin its metadata.
fn seed(cache: &InMemoryQueryCache, coordinator: &CacheCoordinator, path: &str, registration: Registration) {
    cache.insert(key(path), CachePayload::Opaque);
    coordinator.register(key(path), registration);
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test(start_paused = true)]
async fn register_then_get_round_trips() {
    let (_cache, coordinator) = engine(EngineConfig::default());
    let registration = Registration::new(Priority::High)
        .with_size(2048)
        .with_ttl(Duration::from_secs(90))
        .with_tags(["profile", "detail"]);
    coordinator.register(key("profile/me"), registration.clone());

    let meta = coordinator.get_metadata(&key("profile/me")).unwrap();
    assert_eq!(meta.key, key("profile/me"));
    assert_eq!(meta.priority, registration.priority);
    assert_eq!(meta.size, registration.size);
    assert_eq!(Some(meta.ttl), registration.ttl);
    assert_eq!(meta.tags, registration.tags);
    assert_eq!(meta.access_count, 0);
    assert_eq!(meta.pattern, AccessPattern::Cold);
    assert!(!meta.is_stale);
}

#[tokio::test(start_paused = true)]
async fn ten_accesses_within_window_is_hot() {
    let (_cache, coordinator) = engine(EngineConfig::default());
    coordinator.register(key("messages/list"), Registration::new(Priority::High));

    for _ in 0..9 {
        tokio::time::advance(Duration::from_secs(10)).await;
        coordinator.record_access(&key("messages/list"));
    }
    assert_eq!(coordinator.get_metadata(&key("messages/list")).unwrap().pattern, AccessPattern::Warm);

    coordinator.record_access(&key("messages/list"));
    assert_eq!(coordinator.get_metadata(&key("messages/list")).unwrap().pattern, AccessPattern::Hot);

    // Same count, but the entry has outlived the hot window
    tokio::time::advance(Duration::from_secs(5 * 60)).await;
    assert_eq!(coordinator.get_metadata(&key("messages/list")).unwrap().pattern, AccessPattern::Warm);
}

// =============================================================================
// TTL
// =============================================================================

#[tokio::test(start_paused = true)]
async fn ttl_sweep_removes_expired_medium_entry() {
    let (cache, coordinator) = engine(EngineConfig::default());
    seed(
        &cache,
        &coordinator,
        "K1",
        Registration::new(Priority::Medium).with_size(1000).with_ttl(Duration::from_millis(10_000)),
    );

    tokio::time::advance(Duration::from_secs(11)).await;
    let report = coordinator.sweep_expired().await.unwrap();

    assert_eq!(report.evicted, vec![key("K1")]);
    assert_eq!(report.freed_bytes, 1000);
    assert!(coordinator.get_metadata(&key("K1")).is_none());
    assert!(!cache.contains(&key("K1")));

    let stats = coordinator.stats();
    assert_eq!(stats.total_entries, 0);
    assert_eq!(stats.by_priority[&Priority::Medium], 0);
    assert_eq!(stats.total_size, 0);
}

#[tokio::test(start_paused = true)]
async fn ttl_sweep_ignores_tier_for_critical_override() {
    let (cache, coordinator) = engine(EngineConfig::default());
    seed(
        &cache,
        &coordinator,
        "auth/session",
        Registration::new(Priority::Critical).with_ttl(Duration::from_secs(1)),
    );
    seed(&cache, &coordinator, "auth/refresh", Registration::new(Priority::Critical));

    tokio::time::advance(Duration::from_secs(1)).await;
    assert!(coordinator.sweep_expired().await.unwrap().is_empty());

    tokio::time::advance(Duration::from_millis(1)).await;
    let report = coordinator.sweep_expired().await.unwrap();
    assert_eq!(report.evicted, vec![key("auth/session")]);
    assert!(coordinator.get_metadata(&key("auth/refresh")).is_some());
}

// =============================================================================
// Pressure
// =============================================================================

/// Ten Low entries of 6 MB each, k0 registered first. k0..k2 are then touched,
/// so the least recently used are k3, k4, k5, ...
async fn seed_sixty_megabytes(cache: &InMemoryQueryCache, coordinator: &CacheCoordinator) {
    for i in 0..10 {
        seed(
            cache,
            coordinator,
            &format!("marketplace/{i}"),
            Registration::new(Priority::Low).with_size(6 * MB),
        );
        tokio::time::advance(Duration::from_secs(1)).await;
    }
    for i in 0..3 {
        coordinator.record_access(&key(&format!("marketplace/{i}")));
    }
}

#[tokio::test(start_paused = true)]
async fn pressure_soft_evicts_thirty_percent_in_hybrid_order() {
    // 60 MB over a 50 MB budget is 120%: lift the critical threshold so the
    // pass lands in the soft band.
    let config = EngineConfig { critical_pressure_threshold: 2.0, ..Default::default() };
    let (cache, coordinator) = engine(config);
    seed_sixty_megabytes(&cache, &coordinator).await;
    assert_eq!(coordinator.store().total_size(), 60 * MB);

    let outcome = coordinator.check_pressure().await.unwrap();

    assert_eq!(outcome.level, PressureLevel::Soft);
    assert_eq!(
        outcome.evicted.evicted,
        vec![key("marketplace/3"), key("marketplace/4"), key("marketplace/5")]
    );
    assert_eq!(outcome.evicted.freed_bytes, 18 * MB);
    assert!(outcome.demoted.is_empty());
    assert_eq!(coordinator.store().total_size(), 42 * MB);
    assert_eq!(cache.len(), 7);
}

#[tokio::test(start_paused = true)]
async fn pressure_critical_evicts_half() {
    let (cache, coordinator) = engine(EngineConfig::default());
    seed_sixty_megabytes(&cache, &coordinator).await;

    let outcome = coordinator.check_pressure().await.unwrap();

    assert_eq!(outcome.level, PressureLevel::Critical);
    assert_eq!(outcome.evicted.len(), 5);
    assert_eq!(coordinator.store().total_size(), 30 * MB);
    assert!(!coordinator.memory_stats().is_under_pressure);
}

#[tokio::test(start_paused = true)]
async fn pressure_never_evicts_critical() {
    let config = EngineConfig { max_cache_bytes: 10 * MB, ..Default::default() };
    let (cache, coordinator) = engine(config);
    for i in 0..4 {
        seed(&cache, &coordinator, &format!("session/{i}"), Registration::new(Priority::Critical).with_size(5 * MB));
    }

    let outcome = coordinator.force_cleanup().await.unwrap();
    assert!(outcome.evicted.is_empty());
    assert_eq!(coordinator.store().len(), 4);
    assert_eq!(coordinator.memory_stats().percentage, 200.0);
}

#[tokio::test(start_paused = true)]
async fn pressure_critical_demotion_is_permanent() {
    let config = EngineConfig { max_cache_bytes: 10 * MB, ..Default::default() };
    let (cache, coordinator) = engine(config);
    for i in 0..4 {
        seed(&cache, &coordinator, &format!("business/{i}"), Registration::new(Priority::Medium).with_size(MB));
        tokio::time::advance(Duration::from_secs(1)).await;
    }
    seed(&cache, &coordinator, "session/me", Registration::new(Priority::Critical).with_size(8 * MB));

    let outcome = coordinator.check_pressure().await.unwrap();
    assert_eq!(outcome.level, PressureLevel::Critical);
    assert_eq!(outcome.demoted, vec![key("business/0"), key("business/1")]);

    let demotions = coordinator
        .recent_actions(100)
        .into_iter()
        .filter(|r| r.action == CacheAction::PriorityChange { from: Priority::Medium, to: Priority::Low })
        .count();
    assert_eq!(demotions, 2);

    // Evicted 2 of the 4 candidates, the demoted ones first
    assert_eq!(outcome.evicted.evicted, vec![key("business/0"), key("business/1")]);
    assert_eq!(coordinator.get_metadata(&key("business/2")).unwrap().priority, Priority::Medium);
}

// =============================================================================
// Tags
// =============================================================================

#[tokio::test(start_paused = true)]
async fn tags_evict_high_priority_unexpired_entry() {
    let (cache, coordinator) = engine(EngineConfig::default());
    seed(&cache, &coordinator, "profile/K", Registration::new(Priority::High).with_ttl(Duration::from_secs(3600)));
    seed(&cache, &coordinator, "profile/other", Registration::new(Priority::High));

    assert!(coordinator.add_tags(&key("profile/K"), ["marketplace"]));
    let report = coordinator.evict_by_tags(&["marketplace".to_string()]).await;

    assert_eq!(report.evicted, vec![key("profile/K")]);
    assert!(coordinator.get_metadata(&key("profile/K")).is_none());
    assert!(!cache.contains(&key("profile/K")));
    assert!(coordinator.get_metadata(&key("profile/other")).is_some());
    assert!(coordinator.find_by_tags(&["marketplace".to_string()]).is_empty());

    let last = coordinator.recent_actions(1);
    assert_eq!(last[0].action, CacheAction::Evict(EvictionReason::Tags));
}

// =============================================================================
// Adapter
// =============================================================================

#[tokio::test(start_paused = true)]
async fn adapter_classifies_by_domain() {
    let (cache, coordinator) = engine(EngineConfig::default());
    cache.insert(key("auth/token"), CachePayload::Opaque);
    cache.insert(key("messages/list"), CachePayload::Json(json!([1, 2, 3])));
    cache.insert(key("analytics/daily"), CachePayload::Opaque);

    let tier = |p: &str| coordinator.get_metadata(&key(p)).unwrap().priority;
    assert_eq!(tier("auth/token"), Priority::Critical);
    assert_eq!(tier("messages/list"), Priority::High);
    assert_eq!(tier("analytics/daily"), Priority::Background);

    assert_eq!(coordinator.get_metadata(&key("messages/list")).unwrap().size, "[1,2,3]".len());
    assert_eq!(coordinator.memory_stats().query_count, 3);
}

#[tokio::test(start_paused = true)]
async fn adapter_updates_count_as_accesses() {
    let (cache, coordinator) = engine(EngineConfig::default());
    cache.insert(key("reviews/1"), CachePayload::Opaque);
    cache.insert(key("reviews/1"), CachePayload::Opaque);
    cache.insert(key("reviews/1"), CachePayload::Opaque);

    let meta = coordinator.get_metadata(&key("reviews/1")).unwrap();
    assert_eq!(meta.access_count, 2);
    assert_eq!(meta.pattern, AccessPattern::Cool);
}

#[tokio::test(start_paused = true)]
async fn adapter_honors_exclusions() {
    let config = EngineConfig { auto_register_exclude: vec!["diagnostics".into()], ..Default::default() };
    let (cache, coordinator) = engine(config);
    cache.insert(key("diagnostics/trace"), CachePayload::Opaque);
    assert!(coordinator.get_metadata(&key("diagnostics/trace")).is_none());
    assert!(cache.contains(&key("diagnostics/trace")));
}

// =============================================================================
// Snapshots
// =============================================================================

#[tokio::test(start_paused = true)]
async fn snapshot_restores_into_fresh_engine() {
    let (cache, source) = engine(EngineConfig::default());
    seed(&cache, &source, "profile/me", Registration::new(Priority::High).with_tags(["profile"]));
    seed(&cache, &source, "marketplace/feed", Registration::new(Priority::Low).with_ttl(Duration::from_secs(5)));
    let json = source.export_snapshot().to_json().unwrap();

    tokio::time::advance(Duration::from_secs(6)).await;

    let (_cache, target) = engine(EngineConfig::default());
    let snapshot = Snapshot::from_json(&json).unwrap();
    assert_eq!(target.import_snapshot(snapshot).unwrap(), 2);

    // Ages are relative to export, so the short-lived entry is still alive here
    assert!(target.get_metadata(&key("marketplace/feed")).is_some());
    tokio::time::advance(Duration::from_secs(6)).await;
    let report = target.sweep_expired().await.unwrap();
    assert_eq!(report.evicted, vec![key("marketplace/feed")]);
    assert_eq!(target.get_metadata(&key("profile/me")).unwrap().priority, Priority::High);
}

// =============================================================================
// Maintenance
// =============================================================================

#[tokio::test(start_paused = true)]
async fn maintenance_pressure_timer_cleans_up() {
    let config = EngineConfig {
        max_cache_bytes: 10 * MB,
        pressure_check_interval_ms: 500,
        ..Default::default()
    };
    let (cache, coordinator) = engine(config);
    for i in 0..4 {
        seed(&cache, &coordinator, &format!("community/{i}"), Registration::new(Priority::Low).with_size(3 * MB));
    }

    let maintenance = MaintenanceHandle::start(Arc::clone(&coordinator));
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(coordinator.store().len(), 2);

    maintenance.stop().await;
}

#[tokio::test(start_paused = true)]
async fn maintenance_stop_twice_leaves_no_timers() {
    let (_cache, coordinator) = engine(EngineConfig::default());
    let maintenance = MaintenanceHandle::start(coordinator);
    maintenance.stop().await;
    maintenance.stop().await;
    assert!(!maintenance.is_running());
}
