// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic query-priority-cache usage example.
//!
//! Demonstrates:
//! 1. Wiring the coordinator to an in-memory query cache
//! 2. Automatic classification of queries as they land in the cache
//! 3. Explicit registration and tagging by a collaborator
//! 4. A pressure pass over budget
//! 5. Tag eviction (logout) and a snapshot export
//! 6. Displaying metrics
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use query_priority_cache::{
    CacheCoordinator, CachePayload, EngineConfig, InMemoryQueryCache, MaintenanceHandle, Priority, QueryKey,
    Registration,
};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter("query_priority_cache=info")
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║         query-priority-cache: Basic Usage Example             ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Configure and wire the engine
    // ─────────────────────────────────────────────────────────────────────────
    let config = EngineConfig {
        // Tiny budget so the demo crosses the thresholds quickly
        max_cache_bytes: 4 * 1024,
        ..Default::default()
    };
    let cache = Arc::new(InMemoryQueryCache::new());
    let coordinator = Arc::new(CacheCoordinator::new(config, cache.clone())?);
    cache.subscribe(&coordinator);
    let maintenance = MaintenanceHandle::start(Arc::clone(&coordinator));

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Queries land in the cache
    // ─────────────────────────────────────────────────────────────────────────
    println!("📥 Filling the query cache...");
    let queries = [
        ("auth/session", json!({"token": "abc", "expires": 3600})),
        ("profile/me", json!({"name": "Ada", "city": "London"})),
        ("messages/list", json!([{"id": 1, "body": "hi"}, {"id": 2, "body": "hello"}])),
        ("business/42", json!({"name": "Corner Café", "rating": 4.6})),
        ("marketplace/feed", json!({"items": vec![0; 200]})),
        ("analytics/daily", json!({"views": vec![1; 300]})),
    ];
    for (path, body) in queries {
        cache.insert(QueryKey::from(path), CachePayload::Json(body));
    }
    for meta in coordinator.store().entries() {
        println!("   {:<20} {:<10} {:>5} bytes", meta.key.to_string(), meta.priority, meta.size);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 3. A collaborator pins a query and tags it
    // ─────────────────────────────────────────────────────────────────────────
    coordinator.register(
        QueryKey::from("community/events"),
        Registration::new(Priority::Low).with_size(900).with_tags(["session-scoped"]),
    );
    coordinator.add_tags(&QueryKey::from("profile/me"), ["session-scoped"]);

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Pressure pass
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📊 {:?}", coordinator.memory_stats());
    if let Some(outcome) = coordinator.check_pressure().await {
        println!(
            "   Pressure {} at {:.0}%: demoted {}, evicted {} ({} bytes)",
            outcome.level,
            outcome.usage * 100.0,
            outcome.demoted.len(),
            outcome.evicted.len(),
            outcome.evicted.freed_bytes
        );
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Logout and snapshot
    // ─────────────────────────────────────────────────────────────────────────
    let report = coordinator.evict_by_tags(&["session-scoped".to_string()]).await;
    println!("\n🚪 Logout evicted {:?}", report.evicted.iter().map(ToString::to_string).collect::<Vec<_>>());

    let snapshot = coordinator.export_snapshot().to_json()?;
    println!("💾 Snapshot: {} bytes, {} entries", snapshot.len(), coordinator.stats().total_entries);

    println!("\n📜 Recent actions:");
    for record in coordinator.recent_actions(10) {
        println!("   {:<20} {:?}", record.key.to_string(), record.action);
    }

    maintenance.stop().await;

    println!("\n📈 Metrics:");
    dump_metrics(&snapshotter);
    Ok(())
}

fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines: Vec<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, value)| {
            let (_, key) = composite_key.into_parts();
            let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
            let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };
            let rendered = match value {
                DebugValue::Counter(v) => v.to_string(),
                DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
                DebugValue::Histogram(samples) => format!("{} samples", samples.len()),
            };
            format!("   {}{} = {}", key.name(), label_str, rendered)
        })
        .collect();
    lines.sort();

    if lines.is_empty() {
        println!("   (no metrics recorded)");
    }
    for line in lines {
        println!("{line}");
    }
}
