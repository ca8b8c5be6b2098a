// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Collaborator-facing operations: registration, access tracking and tagging.
//!
//! Calls naming an untracked key are silent no-ops.

use tracing::{debug, info};

use crate::action_log::CacheAction;
use crate::metadata::{CacheEntryMetadata, Priority, QueryKey, Registration};
use crate::store::RegisterOutcome;

use super::CacheCoordinator;

impl CacheCoordinator {
    /// Register or refresh an entry explicitly.
    ///
    /// A zero or missing TTL is replaced by the tier default.
    #[tracing::instrument(skip_all, fields(key = %key, priority = %registration.priority))]
    pub fn register(&self, key: QueryKey, registration: Registration) -> RegisterOutcome {
        let outcome = self.store.register(key.clone(), registration);
        self.log_registration(&key, outcome);
        self.publish_gauges();
        outcome
    }

    #[must_use]
    pub fn get_metadata(&self, key: &QueryKey) -> Option<CacheEntryMetadata> {
        self.store.get(key)
    }

    /// Count an access. Returns whether the key is tracked.
    pub fn record_access(&self, key: &QueryKey) -> bool {
        self.store.record_access(key)
    }

    /// Move an entry to another tier. Returns `(from, to)` when it changed.
    pub fn update_priority(&self, key: &QueryKey, priority: Priority) -> Option<(Priority, Priority)> {
        let change = self.store.update_priority(key, priority);
        if let Some((from, to)) = change {
            debug!(key = %key, %from, %to, "Priority updated");
            crate::metrics::record_priority_change(from, to);
            self.actions.record(key, CacheAction::PriorityChange { from, to });
        }
        change
    }

    /// Move every entry carrying any of `tags` to `priority`.
    /// Returns the number of entries whose tier changed.
    pub fn update_priority_by_tags(&self, tags: &[String], priority: Priority) -> usize {
        let changed = self.store.update_priority_by_tags(tags, priority);
        for (key, from) in &changed {
            crate::metrics::record_priority_change(*from, priority);
            self.actions.record(key, CacheAction::PriorityChange { from: *from, to: priority });
        }
        if !changed.is_empty() {
            info!(?tags, %priority, count = changed.len(), "Priority updated by tags");
        }
        changed.len()
    }

    pub fn add_tags<I, S>(&self, key: &QueryKey, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.store.add_tags(key, tags)
    }

    /// Keys carrying any of `tags`, deduplicated, in key order.
    #[must_use]
    pub fn find_by_tags(&self, tags: &[String]) -> Vec<QueryKey> {
        self.store.find_by_tags(tags)
    }

    pub fn mark_stale(&self, key: &QueryKey, stale: bool) -> bool {
        self.store.mark_stale(key, stale)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::coordinator_with;
    use super::*;
    use crate::config::EngineConfig;
    use std::time::Duration;

    #[tokio::test]
    async fn test_register_zero_ttl_uses_tier_default() {
        let (_cache, coordinator) = coordinator_with(EngineConfig::default());
        let key = QueryKey::from("auth/token");
        coordinator.register(key.clone(), Registration::new(Priority::Critical).with_ttl(Duration::ZERO));
        let meta = coordinator.get_metadata(&key).unwrap();
        assert_eq!(meta.ttl, EngineConfig::default().tier_ttls.for_priority(Priority::Critical));
    }

    #[tokio::test]
    async fn test_reregister_logs_tier_change_once() {
        let (_cache, coordinator) = coordinator_with(EngineConfig::default());
        let key = QueryKey::from("business/7");
        coordinator.register(key.clone(), Registration::new(Priority::Medium));
        coordinator.register(key.clone(), Registration::new(Priority::Medium));
        coordinator.register(key.clone(), Registration::new(Priority::High));

        let actions: Vec<_> = coordinator.recent_actions(10).into_iter().map(|r| r.action).collect();
        assert_eq!(
            actions,
            vec![
                CacheAction::Register,
                CacheAction::PriorityChange { from: Priority::Medium, to: Priority::High },
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_key_calls_are_noops() {
        let (_cache, coordinator) = coordinator_with(EngineConfig::default());
        let ghost = QueryKey::from("nobody/here");
        assert!(!coordinator.record_access(&ghost));
        assert!(coordinator.update_priority(&ghost, Priority::High).is_none());
        assert!(!coordinator.add_tags(&ghost, ["x"]));
        assert!(!coordinator.mark_stale(&ghost, true));
        assert!(coordinator.recent_actions(10).is_empty());
    }

    #[tokio::test]
    async fn test_update_priority_by_tags() {
        let (_cache, coordinator) = coordinator_with(EngineConfig::default());
        coordinator.register(QueryKey::from("a"), Registration::new(Priority::Low).with_tags(["feed"]));
        coordinator.register(QueryKey::from("b"), Registration::new(Priority::High).with_tags(["feed"]));
        coordinator.register(QueryKey::from("c"), Registration::new(Priority::Low).with_tags(["other"]));

        let changed = coordinator.update_priority_by_tags(&["feed".to_string()], Priority::High);
        assert_eq!(changed, 1);
        assert_eq!(coordinator.get_metadata(&QueryKey::from("a")).unwrap().priority, Priority::High);
        assert_eq!(coordinator.get_metadata(&QueryKey::from("c")).unwrap().priority, Priority::Low);
    }

    #[tokio::test]
    async fn test_find_by_tags_is_deduplicated() {
        let (_cache, coordinator) = coordinator_with(EngineConfig::default());
        coordinator.register(QueryKey::from("a"), Registration::new(Priority::Low).with_tags(["x", "y"]));
        coordinator.add_tags(&QueryKey::from("a"), ["z"]);
        let found = coordinator.find_by_tags(&["x".to_string(), "z".to_string()]);
        assert_eq!(found, vec![QueryKey::from("a")]);
    }
}
