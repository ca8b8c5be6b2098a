// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metadata store: the authoritative map from query key to entry metadata.
//!
//! Entries and the [`TagIndex`] sit behind one coarse `parking_lot::Mutex`.
//! `register` and `record_access` are read-modify-write sequences, so every
//! operation runs as a single critical section and no caller ever observes an
//! entry whose tags disagree with the index.
//!
//! Mutations on a missing key are silent no-ops: a fetch completing after
//! its entry was evicted is an expected race, not an error.

pub mod tag_index;

pub use tag_index::TagIndex;

use std::collections::{BTreeSet, HashMap};

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::classifier::{classify_pattern, PatternThresholds};
use crate::config::TierTtls;
use crate::metadata::{AccessPattern, CacheEntryMetadata, Priority, QueryKey, Registration};

/// What `register` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created,
    Updated {
        /// `(from, to)` when the tier actually changed
        priority_change: Option<(Priority, Priority)>,
    },
}

#[derive(Debug)]
struct Tracked {
    meta: CacheEntryMetadata,
    /// Registration order, used to keep candidate ordering stable
    seq: u64,
}

#[derive(Debug)]
struct StoreInner {
    entries: HashMap<QueryKey, Tracked>,
    tags: TagIndex,
    next_seq: u64,
    total_size: usize,
    thresholds: PatternThresholds,
    ttls: TierTtls,
}

impl StoreInner {
    fn pattern_at(&self, meta: &CacheEntryMetadata, now: Instant) -> AccessPattern {
        classify_pattern(meta.access_count, meta.age(now), &self.thresholds)
    }

    fn fresh(&self, meta: &CacheEntryMetadata, now: Instant) -> CacheEntryMetadata {
        let mut meta = meta.clone();
        meta.pattern = self.pattern_at(&meta, now);
        meta
    }

    fn insert(&mut self, meta: CacheEntryMetadata) {
        if let Some(old) = self.entries.remove(&meta.key) {
            self.tags.remove(&old.meta.key, &old.meta.tags);
            self.total_size = self.total_size.saturating_sub(old.meta.size);
        }
        self.tags.add(&meta.key, &meta.tags);
        self.total_size += meta.size;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(meta.key.clone(), Tracked { meta, seq });
    }

    fn set_priority(&mut self, key: &QueryKey, priority: Priority) -> Option<(Priority, Priority)> {
        let tracked = self.entries.get_mut(key)?;
        let previous = tracked.meta.priority;
        if previous == priority {
            return None;
        }
        tracked.meta.priority = priority;
        Some((previous, priority))
    }
}

/// Thread-safe metadata store with an embedded tag index.
#[derive(Debug)]
pub struct MetadataStore {
    inner: Mutex<StoreInner>,
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self::new(PatternThresholds::default(), TierTtls::default())
    }
}

impl MetadataStore {
    pub fn new(thresholds: PatternThresholds, ttls: TierTtls) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                entries: HashMap::new(),
                tags: TagIndex::new(),
                next_seq: 0,
                total_size: 0,
                thresholds,
                ttls,
            }),
        }
    }

    /// Replace classification settings. Existing TTLs are kept.
    pub fn reconfigure(&self, thresholds: PatternThresholds, ttls: TierTtls) {
        let mut inner = self.inner.lock();
        inner.thresholds = thresholds;
        inner.ttls = ttls;
    }

    /// Register or refresh an entry.
    ///
    /// An existing entry keeps `created_at` and `access_count`; its tags are
    /// merged and priority, size and TTL are overwritten.
    pub fn register(&self, key: QueryKey, registration: Registration) -> RegisterOutcome {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let ttl = registration
            .ttl
            .filter(|ttl| !ttl.is_zero())
            .unwrap_or_else(|| inner.ttls.for_priority(registration.priority));

        if let Some(tracked) = inner.entries.get(&key) {
            let mut meta = tracked.meta.clone();
            let previous_priority = meta.priority;
            let new_tags: Vec<String> = registration
                .tags
                .iter()
                .filter(|t| !meta.tags.contains(*t))
                .cloned()
                .collect();

            let old_size = meta.size;
            meta.tags.extend(new_tags.iter().cloned());
            meta.priority = registration.priority;
            meta.size = registration.size;
            meta.ttl = ttl;
            meta.last_accessed = now;
            meta.pattern = inner.pattern_at(&meta, now);

            inner.tags.add(&key, &new_tags);
            inner.total_size = inner.total_size.saturating_sub(old_size) + meta.size;
            if let Some(tracked) = inner.entries.get_mut(&key) {
                tracked.meta = meta;
            }

            let priority_change = (previous_priority != registration.priority)
                .then_some((previous_priority, registration.priority));
            if let Some((from, to)) = priority_change {
                debug!(key = %key, %from, %to, "Priority changed on re-registration");
            }
            return RegisterOutcome::Updated { priority_change };
        }

        let mut meta = CacheEntryMetadata {
            key,
            priority: registration.priority,
            size: registration.size,
            ttl,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            pattern: AccessPattern::Cold,
            tags: registration.tags,
            is_stale: false,
        };
        meta.pattern = inner.pattern_at(&meta, now);
        inner.insert(meta);
        RegisterOutcome::Created
    }

    /// Metadata for `key` with its pattern evaluated now.
    pub fn get(&self, key: &QueryKey) -> Option<CacheEntryMetadata> {
        let now = Instant::now();
        let inner = self.inner.lock();
        inner.entries.get(key).map(|t| inner.fresh(&t.meta, now))
    }

    /// Count an access. Returns `false` (and does nothing) for unknown keys.
    pub fn record_access(&self, key: &QueryKey) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let thresholds = inner.thresholds;
        match inner.entries.get_mut(key) {
            Some(tracked) => {
                let meta = &mut tracked.meta;
                meta.access_count = meta.access_count.saturating_add(1);
                meta.last_accessed = now;
                meta.pattern = classify_pattern(meta.access_count, meta.age(now), &thresholds);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, key: &QueryKey) -> Option<CacheEntryMetadata> {
        self.take_if(key, |_| true)
    }

    /// Remove `key` only if its current metadata satisfies `eligible`.
    ///
    /// The check and the removal share one critical section, so a concurrent
    /// tier change either lands before (and is seen) or finds nothing.
    pub fn take_if<F>(&self, key: &QueryKey, eligible: F) -> Option<CacheEntryMetadata>
    where
        F: FnOnce(&CacheEntryMetadata) -> bool,
    {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let current = inner.entries.get(key).map(|t| inner.fresh(&t.meta, now))?;
        if !eligible(&current) {
            return None;
        }
        let tracked = inner.entries.remove(key)?;
        inner.tags.remove(key, &tracked.meta.tags);
        inner.total_size = inner.total_size.saturating_sub(tracked.meta.size);
        Some(current)
    }

    /// Put back a record taken by [`take_if`](Self::take_if) unless the key was
    /// registered again in the meantime. Returns whether it was put back.
    pub fn reinstate(&self, meta: CacheEntryMetadata) -> bool {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&meta.key) {
            return false;
        }
        inner.insert(meta);
        true
    }

    /// Set the tier. Returns `(from, to)` only when it changed.
    pub fn update_priority(&self, key: &QueryKey, priority: Priority) -> Option<(Priority, Priority)> {
        self.inner.lock().set_priority(key, priority)
    }

    /// Set the tier of every entry carrying any of `tags`.
    /// Returns the keys whose tier changed, with their previous tier.
    pub fn update_priority_by_tags(&self, tags: &[String], priority: Priority) -> Vec<(QueryKey, Priority)> {
        let mut inner = self.inner.lock();
        let keys = inner.tags.find(tags);
        keys.into_iter()
            .filter_map(|key| {
                inner
                    .set_priority(&key, priority)
                    .map(|(from, _)| (key, from))
            })
            .collect()
    }

    /// Set the size estimate. Returns the previous size.
    pub fn update_size(&self, key: &QueryKey, size: usize) -> Option<usize> {
        let mut inner = self.inner.lock();
        let tracked = inner.entries.get_mut(key)?;
        let previous = std::mem::replace(&mut tracked.meta.size, size);
        inner.total_size = inner.total_size.saturating_sub(previous) + size;
        Some(previous)
    }

    pub fn mark_stale(&self, key: &QueryKey, stale: bool) -> bool {
        match self.inner.lock().entries.get_mut(key) {
            Some(tracked) => {
                tracked.meta.is_stale = stale;
                true
            }
            None => false,
        }
    }

    /// Merge tags into an entry and the index.
    pub fn add_tags<I, S>(&self, key: &QueryKey, tags: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut inner = self.inner.lock();
        let Some(tracked) = inner.entries.get_mut(key) else {
            return false;
        };
        let added: Vec<String> = tags
            .into_iter()
            .map(Into::into)
            .filter(|t| tracked.meta.tags.insert(t.clone()))
            .collect();
        inner.tags.add(key, &added);
        true
    }

    /// Keys carrying any of `tags` (OR semantics), in key order.
    pub fn find_by_tags(&self, tags: &[String]) -> Vec<QueryKey> {
        self.inner.lock().tags.find(tags).into_iter().collect()
    }

    /// All entries in registration order, patterns evaluated now.
    pub fn entries(&self) -> Vec<CacheEntryMetadata> {
        let now = Instant::now();
        let inner = self.inner.lock();
        let mut tracked: Vec<&Tracked> = inner.entries.values().collect();
        tracked.sort_by_key(|t| t.seq);
        tracked.into_iter().map(|t| inner.fresh(&t.meta, now)).collect()
    }

    /// Tracked keys in key order.
    pub fn keys(&self) -> BTreeSet<QueryKey> {
        self.inner.lock().entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Sum of tracked sizes in bytes.
    pub fn total_size(&self) -> usize {
        self.inner.lock().total_size
    }

    pub fn tag_count(&self) -> usize {
        self.inner.lock().tags.tag_count()
    }

    /// Insert a fully-formed record (snapshot restore). Replaces any existing entry.
    pub fn restore(&self, meta: CacheEntryMetadata) {
        self.inner.lock().insert(meta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn key(s: &str) -> QueryKey {
        QueryKey::from(s)
    }

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_register_then_get_round_trips() {
        let store = MetadataStore::default();
        let reg = Registration::new(Priority::Medium)
            .with_size(1000)
            .with_ttl(Duration::from_secs(10))
            .with_tags(["business"]);
        assert_eq!(store.register(key("business/1"), reg.clone()), RegisterOutcome::Created);

        let meta = store.get(&key("business/1")).unwrap();
        assert_eq!(meta.key, key("business/1"));
        assert_eq!(meta.priority, reg.priority);
        assert_eq!(meta.size, reg.size);
        assert_eq!(Some(meta.ttl), reg.ttl);
        assert_eq!(meta.tags, reg.tags);
        assert_eq!(meta.access_count, 0);
        assert_eq!(meta.pattern, AccessPattern::Cold);
        assert!(!meta.is_stale);
    }

    #[tokio::test]
    async fn test_reregister_merges_tags_and_reports_tier_change() {
        let store = MetadataStore::default();
        store.register(key("k"), Registration::new(Priority::Low).with_tags(["a"]));
        store.record_access(&key("k"));

        let outcome = store.register(key("k"), Registration::new(Priority::High).with_size(5).with_tags(["b"]));
        assert_eq!(
            outcome,
            RegisterOutcome::Updated { priority_change: Some((Priority::Low, Priority::High)) }
        );

        let meta = store.get(&key("k")).unwrap();
        let expected: BTreeSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(meta.tags, expected);
        assert_eq!(meta.access_count, 1);
        assert_eq!(meta.size, 5);
        assert_eq!(store.find_by_tags(&tags(&["b"])), vec![key("k")]);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_reregister_same_tier_reports_no_change() {
        let store = MetadataStore::default();
        store.register(key("k"), Registration::new(Priority::Low));
        let outcome = store.register(key("k"), Registration::new(Priority::Low));
        assert_eq!(outcome, RegisterOutcome::Updated { priority_change: None });
    }

    #[tokio::test]
    async fn test_missing_ttl_uses_tier_default() {
        let store = MetadataStore::default();
        store.register(key("k"), Registration::new(Priority::Background));
        let meta = store.get(&key("k")).unwrap();
        assert_eq!(meta.ttl, TierTtls::default().for_priority(Priority::Background));

        store.register(key("z"), Registration::new(Priority::High).with_ttl(Duration::ZERO));
        assert_eq!(store.get(&key("z")).unwrap().ttl, TierTtls::default().for_priority(Priority::High));
    }

    #[tokio::test]
    async fn test_missing_key_operations_are_noops() {
        let store = MetadataStore::default();
        let ghost = key("ghost");
        assert!(!store.record_access(&ghost));
        assert!(store.update_priority(&ghost, Priority::High).is_none());
        assert!(!store.add_tags(&ghost, ["x"]));
        assert!(!store.mark_stale(&ghost, true));
        assert!(store.update_size(&ghost, 10).is_none());
        assert!(store.remove(&ghost).is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ten_accesses_make_hot() {
        let store = MetadataStore::default();
        store.register(key("k"), Registration::new(Priority::Medium));
        for _ in 0..9 {
            store.record_access(&key("k"));
            tokio::time::advance(Duration::from_secs(10)).await;
        }
        assert_ne!(store.get(&key("k")).unwrap().pattern, AccessPattern::Hot);

        store.record_access(&key("k"));
        assert_eq!(store.get(&key("k")).unwrap().pattern, AccessPattern::Hot);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pattern_cools_with_age() {
        let store = MetadataStore::default();
        store.register(key("k"), Registration::new(Priority::Medium));
        for _ in 0..10 {
            store.record_access(&key("k"));
        }
        assert_eq!(store.get(&key("k")).unwrap().pattern, AccessPattern::Hot);

        tokio::time::advance(Duration::from_secs(6 * 60)).await;
        assert_eq!(store.get(&key("k")).unwrap().pattern, AccessPattern::Warm);
    }

    #[tokio::test]
    async fn test_total_size_tracks_mutations() {
        let store = MetadataStore::default();
        store.register(key("a"), Registration::new(Priority::Low).with_size(100));
        store.register(key("b"), Registration::new(Priority::Low).with_size(50));
        assert_eq!(store.total_size(), 150);

        store.register(key("a"), Registration::new(Priority::Low).with_size(10));
        assert_eq!(store.total_size(), 60);

        store.update_size(&key("b"), 5);
        assert_eq!(store.total_size(), 15);

        store.remove(&key("a"));
        assert_eq!(store.total_size(), 5);
    }

    #[tokio::test]
    async fn test_remove_drops_tag_postings() {
        let store = MetadataStore::default();
        store.register(key("a"), Registration::new(Priority::Low).with_tags(["x"]));
        store.add_tags(&key("a"), ["y"]);
        assert_eq!(store.tag_count(), 2);

        store.remove(&key("a"));
        assert_eq!(store.tag_count(), 0);
        assert!(store.find_by_tags(&tags(&["x", "y"])).is_empty());
    }

    #[tokio::test]
    async fn test_update_priority_by_tags() {
        let store = MetadataStore::default();
        store.register(key("a"), Registration::new(Priority::Medium).with_tags(["market"]));
        store.register(key("b"), Registration::new(Priority::Background).with_tags(["market"]));
        store.register(key("c"), Registration::new(Priority::Medium).with_tags(["other"]));

        let changed = store.update_priority_by_tags(&tags(&["market"]), Priority::Background);
        assert_eq!(changed, vec![(key("a"), Priority::Medium)]);
        assert_eq!(store.get(&key("a")).unwrap().priority, Priority::Background);
        assert_eq!(store.get(&key("c")).unwrap().priority, Priority::Medium);
    }

    #[tokio::test]
    async fn test_take_if_checks_under_lock() {
        let store = MetadataStore::default();
        store.register(key("a"), Registration::new(Priority::Low).with_size(7).with_tags(["x"]));
        store.update_priority(&key("a"), Priority::Critical);

        assert!(store.take_if(&key("a"), |m| m.priority.is_evictable()).is_none());
        assert_eq!(store.len(), 1);

        let taken = store.take_if(&key("a"), |m| m.tags.contains("x")).unwrap();
        assert_eq!(taken.priority, Priority::Critical);
        assert_eq!(store.total_size(), 0);
        assert_eq!(store.tag_count(), 0);
    }

    #[tokio::test]
    async fn test_reinstate_yields_to_newer_registration() {
        let store = MetadataStore::default();
        store.register(key("a"), Registration::new(Priority::Low).with_size(7).with_tags(["x"]));
        let taken = store.remove(&key("a")).unwrap();

        store.register(key("a"), Registration::new(Priority::High).with_size(3));
        assert!(!store.reinstate(taken.clone()));
        assert_eq!(store.get(&key("a")).unwrap().priority, Priority::High);

        store.remove(&key("a"));
        assert!(store.reinstate(taken));
        assert_eq!(store.total_size(), 7);
        assert_eq!(store.find_by_tags(&tags(&["x"])), vec![key("a")]);
    }

    #[tokio::test]
    async fn test_entries_in_registration_order() {
        let store = MetadataStore::default();
        for name in ["z", "a", "m"] {
            store.register(key(name), Registration::new(Priority::Low));
        }
        let order: Vec<_> = store.entries().into_iter().map(|m| m.key.to_string()).collect();
        assert_eq!(order, vec!["z", "a", "m"]);

        let sorted: Vec<_> = store.keys().into_iter().map(|k| k.to_string()).collect();
        assert_eq!(sorted, vec!["a", "m", "z"]);
    }
}
