//! Memoizing, request-coalescing resolver from opaque identifiers to display names.
//!
//! Each key moves `pending -> resolved` or `pending -> (removed)` exactly once per
//! attempt. Concurrent callers for a pending key share the one lookup already in
//! flight. The lookup runs on its own task and settles its slot itself, so it
//! finishes even when every caller has gone away. Failures are handed to every
//! waiter of that attempt as the fallback name and are not remembered, so the
//! next `resolve` of the key starts a fresh attempt. Nothing here returns an
//! error.

use crate::model::election::{Candidate, Election, ElectionId};
use crate::source::{FetchError, NameLookup};
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Stable cache key: the election plus the candidate's opaque identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameKey {
    pub election: ElectionId,
    pub identifier: String,
}

impl NameKey {
    pub fn new(election: ElectionId, identifier: impl Into<String>) -> Self {
        Self {
            election,
            identifier: identifier.into(),
        }
    }

    pub fn for_candidate(election: &Election, candidate: &Candidate) -> Self {
        Self::new(election.id.clone(), candidate.description.clone())
    }
}

impl fmt::Display for NameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.election, self.identifier)
    }
}

/// A settled resolution. `fallback` is set when the lookup failed and `name`
/// holds the configured fallback string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedName {
    pub key: NameKey,
    pub name: String,
    pub fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameState {
    Pending,
    Resolved(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub lookups: u64,
    pub hits: u64,
    pub coalesced: u64,
    pub failures: u64,
}

type SharedLookup = Shared<BoxFuture<'static, Result<String, FetchError>>>;

enum Slot {
    Pending { attempt: u64, lookup: SharedLookup },
    Resolved { name: String, stored_at: u64 },
}

#[derive(Default)]
struct Slots {
    generation: u64,
    next_attempt: u64,
    next_stamp: u64,
    entries: HashMap<NameKey, Slot>,
}

impl Slots {
    fn is_current(&self, key: &NameKey, generation: u64, attempt: u64) -> bool {
        self.generation == generation
            && matches!(self.entries.get(key), Some(Slot::Pending { attempt: a, .. }) if *a == attempt)
    }

    fn resolved_count(&self) -> usize {
        self.entries
            .values()
            .filter(|s| matches!(s, Slot::Resolved { .. }))
            .count()
    }

    fn store(&mut self, key: NameKey, name: String, capacity: usize) {
        // The pending slot for `key` is about to become resolved, so it does not count.
        if self.resolved_count() >= capacity {
            let victim = self
                .entries
                .iter()
                .filter_map(|(k, s)| match s {
                    Slot::Resolved { stored_at, .. } => Some((k, *stored_at)),
                    Slot::Pending { .. } => None,
                })
                .min_by_key(|(_, stamp)| *stamp)
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                debug!(key = %victim, "evicting cached name");
                self.entries.remove(&victim);
            }
        }
        let stored_at = self.next_stamp;
        self.next_stamp += 1;
        self.entries.insert(key, Slot::Resolved { name, stored_at });
    }
}

#[derive(Default)]
struct Counters {
    lookups: AtomicU64,
    hits: AtomicU64,
    coalesced: AtomicU64,
    failures: AtomicU64,
}

/// Slot table and counters, shared with the lookup tasks that settle them.
#[derive(Default)]
struct Table {
    slots: Mutex<Slots>,
    counters: Counters,
}

impl Table {
    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the outcome of one attempt back, unless the cache was invalidated or
    /// the slot was replaced while the lookup ran.
    fn settle(
        &self,
        key: &NameKey,
        generation: u64,
        attempt: u64,
        capacity: usize,
        outcome: &Result<String, FetchError>,
    ) {
        let mut slots = self.slots();
        if !slots.is_current(key, generation, attempt) {
            debug!(key = %key, attempt, "discarding lookup for replaced slot");
            return;
        }
        match outcome {
            Ok(name) => slots.store(key.clone(), name.clone(), capacity),
            Err(e) => {
                slots.entries.remove(key);
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(key = %key, error = %e, "name lookup failed, using fallback");
            }
        }
    }
}

pub struct NameCache {
    source: Arc<dyn NameLookup>,
    fallback: String,
    capacity: usize,
    table: Arc<Table>,
}

impl NameCache {
    pub fn new(source: Arc<dyn NameLookup>, fallback: impl Into<String>, capacity: usize) -> Self {
        Self {
            source,
            fallback: fallback.into(),
            capacity: capacity.max(1),
            table: Arc::new(Table::default()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, Slots> {
        self.table.slots()
    }

    /// Run one lookup attempt on its own task and hand back a future every
    /// waiter can share.
    fn spawn_lookup(&self, key: &NameKey, generation: u64, attempt: u64) -> SharedLookup {
        let source = Arc::clone(&self.source);
        let table = Arc::clone(&self.table);
        let capacity = self.capacity;
        let key = key.clone();
        let task = tokio::spawn(async move {
            let outcome = source.lookup_name(&key.identifier).await;
            table.settle(&key, generation, attempt, capacity, &outcome);
            outcome
        });
        task.map(|joined| {
            joined.unwrap_or_else(|e| Err(FetchError::Network(format!("lookup task failed: {}", e))))
        })
        .boxed()
        .shared()
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Resolve one key. Returns the cached name immediately when present, joins
    /// the in-flight lookup when one exists, and otherwise issues a new lookup.
    pub async fn resolve(&self, key: &NameKey) -> ResolvedName {
        let lookup = {
            let mut slots = self.slots();
            let generation = slots.generation;
            match slots.entries.get(key) {
                Some(Slot::Resolved { name, .. }) => {
                    self.table.counters.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, "name cache hit");
                    return ResolvedName {
                        key: key.clone(),
                        name: name.clone(),
                        fallback: false,
                    };
                }
                Some(Slot::Pending { attempt, lookup }) => {
                    self.table.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, attempt, "joining in-flight lookup");
                    lookup.clone()
                }
                None => {
                    let attempt = slots.next_attempt;
                    slots.next_attempt += 1;
                    let lookup = self.spawn_lookup(key, generation, attempt);
                    slots.entries.insert(
                        key.clone(),
                        Slot::Pending {
                            attempt,
                            lookup: lookup.clone(),
                        },
                    );
                    self.table.counters.lookups.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %key, attempt, "issuing name lookup");
                    lookup
                }
            }
        };

        match lookup.await {
            Ok(name) => ResolvedName {
                key: key.clone(),
                name,
                fallback: false,
            },
            Err(_) => ResolvedName {
                key: key.clone(),
                name: self.fallback.clone(),
                fallback: true,
            },
        }
    }

    /// Resolve a batch. Lookups overlap; the result keeps the input order and is
    /// returned only once every key has settled.
    pub async fn resolve_all(&self, keys: &[NameKey]) -> Vec<ResolvedName> {
        join_all(keys.iter().map(|key| self.resolve(key))).await
    }

    /// Drop every entry. Lookups already in flight still answer their waiters but
    /// never write back.
    pub fn invalidate(&self) {
        let mut slots = self.slots();
        slots.generation += 1;
        slots.entries.clear();
        debug!(generation = slots.generation, "name cache invalidated");
    }

    pub fn peek(&self, key: &NameKey) -> Option<NameState> {
        self.slots().entries.get(key).map(|slot| match slot {
            Slot::Pending { .. } => NameState::Pending,
            Slot::Resolved { name, .. } => NameState::Resolved(name.clone()),
        })
    }

    pub fn len(&self) -> usize {
        self.slots().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let counters = &self.table.counters;
        CacheStats {
            lookups: counters.lookups.load(Ordering::Relaxed),
            hits: counters.hits.load(Ordering::Relaxed),
            coalesced: counters.coalesced.load(Ordering::Relaxed),
            failures: counters.failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fake::FakeSource;
    use std::time::Duration;

    fn key(id: &str) -> NameKey {
        NameKey::new(ElectionId::new("e-1"), id)
    }

    async fn source() -> Arc<FakeSource> {
        let source = Arc::new(FakeSource::default());
        source.set_name("u-1", "Ada Lovelace").await;
        source.set_name("u-2", "Grace Hopper").await;
        source
    }

    #[tokio::test]
    async fn second_resolve_is_served_from_cache() {
        let source = source().await;
        let cache = NameCache::new(source.clone(), "Unknown", 16);

        let first = cache.resolve(&key("u-1")).await;
        let second = cache.resolve(&key("u-1")).await;

        assert_eq!(first.name, "Ada Lovelace");
        assert_eq!(first, second);
        assert_eq!(source.lookups_for("u-1").await, 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_resolves_share_one_lookup() {
        let source = source().await;
        source.delay_name("u-1", Duration::from_millis(200)).await;
        let cache = NameCache::new(source.clone(), "Unknown", 16);

        let k = key("u-1");
        let (a, b) = tokio::join!(cache.resolve(&k), cache.resolve(&k));

        assert_eq!(a.name, "Ada Lovelace");
        assert_eq!(a, b);
        assert_eq!(source.lookups_for("u-1").await, 1);
        assert_eq!(cache.stats().coalesced, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_reaches_every_waiter_and_is_not_remembered() {
        let source = source().await;
        source.fail_name("u-2").await;
        source.delay_name("u-2", Duration::from_millis(50)).await;
        let cache = NameCache::new(source.clone(), "Unknown", 16);

        let k = key("u-2");
        let (a, b) = tokio::join!(cache.resolve(&k), cache.resolve(&k));
        assert!(a.fallback && b.fallback);
        assert_eq!(a.name, "Unknown");
        assert_eq!(cache.peek(&k), None);
        assert_eq!(cache.stats().failures, 1);

        source.heal_name("u-2").await;
        let retried = cache.resolve(&k).await;
        assert_eq!(retried.name, "Grace Hopper");
        assert_eq!(source.lookups_for("u-2").await, 2);
    }

    #[tokio::test]
    async fn unknown_identifier_falls_back() {
        let source = source().await;
        let cache = NameCache::new(source, "Unknown", 16);
        let resolved = cache.resolve(&key("u-404")).await;
        assert!(resolved.fallback);
        assert_eq!(resolved.name, "Unknown");
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_in_flight_across_invalidation_does_not_write_back() {
        let source = source().await;
        source.delay_name("u-1", Duration::from_millis(100)).await;
        let cache = Arc::new(NameCache::new(source.clone(), "Unknown", 16));

        let k = key("u-1");
        let pending = {
            let cache = Arc::clone(&cache);
            let k = k.clone();
            tokio::spawn(async move { cache.resolve(&k).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(cache.peek(&k), Some(NameState::Pending));

        cache.invalidate();
        let resolved = pending.await.unwrap();

        assert_eq!(resolved.name, "Ada Lovelace");
        assert_eq!(cache.peek(&k), None);
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_finishes_after_its_only_waiter_is_dropped() {
        let source = source().await;
        source.delay_name("u-1", Duration::from_millis(100)).await;
        let cache = Arc::new(NameCache::new(source.clone(), "Unknown", 16));

        let k = key("u-1");
        let waiter = {
            let cache = Arc::clone(&cache);
            let k = k.clone();
            tokio::spawn(async move { cache.resolve(&k).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(
            cache.peek(&k),
            Some(NameState::Resolved("Ada Lovelace".to_string()))
        );

        let again = cache.resolve(&k).await;
        assert_eq!(again.name, "Ada Lovelace");
        assert_eq!(source.lookups_for("u-1").await, 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn evicts_oldest_resolved_name_when_full() {
        let source = source().await;
        source.set_name("u-3", "Alan Turing").await;
        let cache = NameCache::new(source.clone(), "Unknown", 2);

        cache.resolve(&key("u-1")).await;
        cache.resolve(&key("u-2")).await;
        cache.resolve(&key("u-3")).await;

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.peek(&key("u-1")), None);
        assert_eq!(
            cache.peek(&key("u-3")),
            Some(NameState::Resolved("Alan Turing".to_string()))
        );
    }

    #[tokio::test]
    async fn resolve_all_keeps_input_order() {
        let source = source().await;
        let cache = NameCache::new(source, "Unknown", 16);
        let names: Vec<String> = cache
            .resolve_all(&[key("u-2"), key("u-9"), key("u-1")])
            .await
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["Grace Hopper", "Unknown", "Ada Lovelace"]);
    }
}
