//! TTL cache around the fetch + normalize step.
//!
//! Entries are keyed by the exact `(date_from, date_to)` bounds. The store
//! lock is released while a fetch is in flight, so two concurrent misses for
//! the same key may both reach the upstream; the later insert wins.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::errors::LoadError;
use crate::models::{CoercionReport, SubscriptionRecord};
use crate::normalize::normalize;
use crate::source::SubscriptionSource;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Normalized table for one date range.
#[derive(Debug)]
pub struct Dataset {
    pub records: Vec<SubscriptionRecord>,
    pub report: CoercionReport,
}

type CacheKey = (String, String);

struct Entry {
    dataset: Arc<Dataset>,
    created_at: Instant,
}

pub struct SubscriptionCache {
    source: Arc<dyn SubscriptionSource>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl SubscriptionCache {
    pub fn new(source: Arc<dyn SubscriptionSource>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            source,
            clock,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get_or_fetch(
        &self,
        date_from: &str,
        date_to: &str,
    ) -> Result<Arc<Dataset>, LoadError> {
        let key = (date_from.to_string(), date_to.to_string());

        {
            let entries = self.entries.lock().await;
            if let Some(entry) = entries.get(&key) {
                if self.is_fresh(entry, self.clock.now()) {
                    debug!(date_from, date_to, "cache hit");
                    return Ok(Arc::clone(&entry.dataset));
                }
                debug!(date_from, date_to, "cache entry expired");
            } else {
                debug!(date_from, date_to, "cache miss");
            }
        }

        let raw = self.source.fetch(date_from, date_to).await.map_err(|err| {
            error!(date_from, date_to, "failed to load subscriptions: {err}");
            err
        })?;

        let normalized = normalize(&raw);
        if !normalized.report.is_clean() {
            warn!(
                failures = normalized.report.total(),
                fields = ?normalized.report.failures,
                "coerced malformed upstream values to defaults"
            );
        }

        let dataset = Arc::new(Dataset {
            records: normalized.records,
            report: normalized.report,
        });

        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| self.is_fresh(entry, now));
        entries.insert(
            key,
            Entry {
                dataset: Arc::clone(&dataset),
                created_at: now,
            },
        );

        Ok(dataset)
    }

    pub async fn invalidate_all(&self) {
        let mut entries = self.entries.lock().await;
        let dropped = entries.len();
        entries.clear();
        debug!(dropped, "cache invalidated");
    }

    #[cfg(test)]
    async fn entry_count(&self) -> usize {
        self.entries.lock().await.len()
    }

    fn is_fresh(&self, entry: &Entry, now: Instant) -> bool {
        now.saturating_duration_since(entry.created_at) < self.ttl
    }
}
