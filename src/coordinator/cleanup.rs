// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Eviction, TTL sweeping and pressure-driven cleanup.
//!
//! Victims are selected from a store snapshot. Each one is then rechecked and
//! taken out of the store in a single critical section, so an entry promoted
//! to Critical (or retagged, or refreshed) after selection is skipped. The
//! external removal runs without any lock held. A victim the external cache
//! refuses gets its metadata back and is reported in
//! [`EvictionReport::failed`].
//!
//! # Cleanup levels
//!
//! ```text
//! Normal   → nothing
//! Soft     → evict gentle_eviction_fraction of candidates, sweep TTLs
//! Critical → demote Medium → Low, evict aggressive_eviction_fraction, sweep TTLs
//! ```

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::action_log::{CacheAction, EvictionReason};
use crate::config::EngineConfig;
use crate::eviction::{batch_len, eviction_candidates, select_demotions, EvictionReport, EvictionStrategy};
use crate::metadata::{CacheEntryMetadata, Priority, QueryKey};
use crate::metrics::PassTimer;
use crate::pressure::{usage_ratio, PressureLevel};

use super::{CacheCoordinator, PassGuard, PressureOutcome};

impl CacheCoordinator {
    /// Entries eligible for pressure eviction, most evictable first.
    #[must_use]
    pub fn eviction_candidates(&self, strategy: EvictionStrategy) -> Vec<CacheEntryMetadata> {
        eviction_candidates(self.store.entries(), strategy)
    }

    /// Evict `ceil(candidates × fraction)` entries under the configured strategy.
    #[tracing::instrument(skip(self))]
    pub async fn evict_batch(&self, fraction: f64) -> EvictionReport {
        let strategy = self.config.read().eviction_strategy;
        let candidates = self.eviction_candidates(strategy);
        let count = batch_len(candidates.len(), fraction);
        let victims: Vec<_> = candidates.into_iter().take(count).map(|m| m.key).collect();

        let report = self
            .remove_victims(victims, CacheAction::Evict(EvictionReason::Pressure), |m| {
                m.priority.is_evictable()
            })
            .await;
        crate::metrics::record_eviction(EvictionReason::Pressure.as_str(), report.len(), report.freed_bytes);
        if !report.is_empty() {
            info!(
                %strategy,
                evicted = report.len(),
                freed_bytes = report.freed_bytes,
                "Evicted batch"
            );
        }
        report
    }

    /// Evict every entry carrying any of `tags`, Critical included.
    #[tracing::instrument(skip(self))]
    pub async fn evict_by_tags(&self, tags: &[String]) -> EvictionReport {
        let victims = self.store.find_by_tags(tags);
        let report = self
            .remove_victims(victims, CacheAction::Evict(EvictionReason::Tags), |m| m.has_any_tag(tags))
            .await;
        crate::metrics::record_eviction(EvictionReason::Tags.as_str(), report.len(), report.freed_bytes);
        if !report.is_empty() {
            info!(evicted = report.len(), freed_bytes = report.freed_bytes, "Evicted by tags");
        }
        report
    }

    /// Evict one tracked entry regardless of tier.
    pub async fn evict_key(&self, key: &QueryKey) -> EvictionReport {
        let report = self
            .remove_victims(vec![key.clone()], CacheAction::Evict(EvictionReason::Explicit), |_| true)
            .await;
        crate::metrics::record_eviction(EvictionReason::Explicit.as_str(), report.len(), report.freed_bytes);
        report
    }

    /// Remove every entry past its TTL, any tier.
    ///
    /// Returns `None` when another sweep is already running.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_expired(&self) -> Option<EvictionReport> {
        let Some(_guard) = PassGuard::try_acquire(&self.sweep_pass) else {
            debug!("TTL sweep already running, skipping");
            crate::metrics::record_skipped_pass("sweep");
            return None;
        };
        let _timer = PassTimer::new("sweep");

        let now = Instant::now();
        let expired: Vec<_> = self
            .store
            .entries()
            .into_iter()
            .filter(|m| m.is_expired(now))
            .map(|m| m.key)
            .collect();
        if expired.is_empty() {
            return Some(EvictionReport::default());
        }

        let report = self
            .remove_victims(expired, CacheAction::Cleanup, |m| m.is_expired(Instant::now()))
            .await;
        crate::metrics::record_expiration(report.len(), report.freed_bytes);
        info!(expired = report.len(), freed_bytes = report.freed_bytes, "TTL sweep complete");
        Some(report)
    }

    /// Measure usage and run the cleanup its level calls for.
    ///
    /// Returns `None` when a pressure pass is already running.
    #[tracing::instrument(skip(self))]
    pub async fn check_pressure(&self) -> Option<PressureOutcome> {
        let Some(_guard) = PassGuard::try_acquire(&self.pressure_pass) else {
            debug!("Pressure pass already running, skipping");
            crate::metrics::record_skipped_pass("pressure");
            return None;
        };
        let _timer = PassTimer::new("pressure");

        let config = self.config();
        let (level, usage) = self.measure(&config);
        let outcome = match level {
            PressureLevel::Normal => PressureOutcome::idle(level, usage),
            PressureLevel::Soft => self.gentle_cleanup(&config, level, usage).await,
            PressureLevel::Critical => self.aggressive_cleanup(&config, level, usage).await,
        };
        Some(outcome)
    }

    /// Run aggressive cleanup now, whatever the current usage.
    ///
    /// Returns `None` when a pressure pass is already running.
    #[tracing::instrument(skip(self))]
    pub async fn force_cleanup(&self) -> Option<PressureOutcome> {
        let Some(_guard) = PassGuard::try_acquire(&self.pressure_pass) else {
            debug!("Pressure pass already running, forced cleanup skipped");
            crate::metrics::record_skipped_pass("pressure");
            return None;
        };
        let config = self.config();
        let (level, usage) = self.measure(&config);
        info!(%level, usage, "Forced cleanup");
        Some(self.aggressive_cleanup(&config, level, usage).await)
    }

    fn measure(&self, config: &EngineConfig) -> (PressureLevel, f64) {
        let usage = usage_ratio(self.store.total_size(), config.max_cache_bytes);
        let level = PressureLevel::from_usage(
            usage,
            config.soft_pressure_threshold,
            config.critical_pressure_threshold,
        );
        crate::metrics::set_memory_pressure(usage);
        crate::metrics::set_pressure_level(level as u8);
        (level, usage)
    }

    async fn gentle_cleanup(&self, config: &EngineConfig, level: PressureLevel, usage: f64) -> PressureOutcome {
        info!(usage, "Soft memory pressure, gentle cleanup");
        let mut outcome = PressureOutcome::idle(level, usage);
        outcome.evicted = self.evict_batch(config.gentle_eviction_fraction).await;
        outcome.expired = self.sweep_expired().await.unwrap_or_default();
        outcome
    }

    async fn aggressive_cleanup(&self, config: &EngineConfig, level: PressureLevel, usage: f64) -> PressureOutcome {
        warn!(usage, "Critical memory pressure, aggressive cleanup");
        let mut outcome = PressureOutcome::idle(level, usage);
        outcome.demoted = self.demote_medium(config.medium_demotion_fraction);
        outcome.evicted = self.evict_batch(config.aggressive_eviction_fraction).await;
        outcome.expired = self.sweep_expired().await.unwrap_or_default();
        outcome
    }

    /// Permanently move the least recently used share of Medium entries to Low.
    fn demote_medium(&self, fraction: f64) -> Vec<QueryKey> {
        let selected = select_demotions(&self.store.entries(), fraction);
        let demoted: Vec<_> = selected
            .into_iter()
            .filter(|key| self.update_priority(key, Priority::Low).is_some())
            .collect();
        if !demoted.is_empty() {
            info!(count = demoted.len(), "Demoted Medium entries to Low");
        }
        demoted
    }

    async fn remove_victims<F>(&self, victims: Vec<QueryKey>, action: CacheAction, eligible: F) -> EvictionReport
    where
        F: Fn(&CacheEntryMetadata) -> bool,
    {
        let mut report = EvictionReport::default();
        for key in victims {
            let Some(meta) = self.store.take_if(&key, &eligible) else {
                debug!(key = %key, "Victim no longer eligible, skipping");
                continue;
            };
            match self.adapter.remove(&key).await {
                Ok(present) => {
                    if !present {
                        debug!(key = %key, "External cache no longer held entry");
                    }
                    self.actions.record(&key, action);
                    report.freed_bytes += meta.size;
                    report.evicted.push(key);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "External cache refused removal, keeping metadata");
                    crate::metrics::record_removal_failure();
                    self.store.reinstate(meta);
                    report.failed.push(key);
                }
            }
        }
        self.publish_gauges();
        report
    }
}
