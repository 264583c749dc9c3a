//! In-process `RankedStore` used by unit tests and as a local fallback
//! when no Redis is configured.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{RankedStore, RankingStoreError};

#[derive(Default)]
struct ScoredSet {
    scores: HashMap<String, f64>,
    expires_at: Option<Instant>,
}

impl ScoredSet {
    fn expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if deadline <= now)
    }
}

/// Mutex-guarded map of sorted sets with lazy TTL expiry: an expired key
/// is dropped the next time any operation touches it.
#[derive(Default)]
pub struct MemoryRankedStore {
    sets: Mutex<HashMap<String, ScoredSet>>,
}

impl MemoryRankedStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_sets<T>(&self, f: impl FnOnce(&mut HashMap<String, ScoredSet>) -> T) -> T {
        let mut sets = match self.sets.lock() {
            Ok(guard) => guard,
            // A panic while holding the lock only happens in tests;
            // the data is still usable.
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();
        sets.retain(|_, set| !set.expired(now));
        f(&mut sets)
    }
}

#[async_trait]
impl RankedStore for MemoryRankedStore {
    async fn increment_score(
        &self,
        key: &str,
        member: &str,
        delta: f64,
    ) -> Result<f64, RankingStoreError> {
        Ok(self.with_sets(|sets| {
            let set = sets.entry(key.to_string()).or_default();
            let score = set.scores.entry(member.to_string()).or_insert(0.0);
            *score += delta;
            *score
        }))
    }

    async fn set_score(
        &self,
        key: &str,
        member: &str,
        score: f64,
    ) -> Result<(), RankingStoreError> {
        self.with_sets(|sets| {
            sets.entry(key.to_string())
                .or_default()
                .scores
                .insert(member.to_string(), score);
        });
        Ok(())
    }

    async fn member_score(
        &self,
        key: &str,
        member: &str,
    ) -> Result<Option<f64>, RankingStoreError> {
        Ok(self.with_sets(|sets| {
            sets.get(key)
                .and_then(|set| set.scores.get(member).copied())
        }))
    }

    async fn top_members(
        &self,
        key: &str,
        limit: usize,
    ) -> Result<Vec<String>, RankingStoreError> {
        Ok(self.with_sets(|sets| {
            let Some(set) = sets.get(key) else {
                return Vec::new();
            };
            let mut entries: Vec<(&String, f64)> =
                set.scores.iter().map(|(m, s)| (m, *s)).collect();
            // Score desc, member asc for deterministic ties.
            entries.sort_by(|a, b| {
                b.1.partial_cmp(&a.1)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.0.cmp(b.0))
            });
            entries
                .into_iter()
                .take(limit)
                .map(|(member, _)| member.clone())
                .collect()
        }))
    }

    async fn cardinality(&self, key: &str) -> Result<usize, RankingStoreError> {
        Ok(self.with_sets(|sets| sets.get(key).map(|set| set.scores.len()).unwrap_or(0)))
    }

    async fn remove_lowest(&self, key: &str, count: usize) -> Result<(), RankingStoreError> {
        self.with_sets(|sets| {
            let Some(set) = sets.get_mut(key) else {
                return;
            };
            let mut entries: Vec<(String, f64)> =
                set.scores.iter().map(|(m, s)| (m.clone(), *s)).collect();
            // Score asc, member desc: the mirror of top_members, so the
            // members removed are exactly the ones top_members lists last.
            entries.sort_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| b.0.cmp(&a.0))
            });
            for (member, _) in entries.into_iter().take(count) {
                set.scores.remove(&member);
            }
        });
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), RankingStoreError> {
        self.with_sets(|sets| {
            if let Some(set) = sets.get_mut(key) {
                set.expires_at = Some(Instant::now() + ttl);
            }
        });
        Ok(())
    }
}
