//! Specialization cache for application nodes.
//!
//! Building the same `(function, left, right)` shape twice returns the node
//! built the first time, so callers can memoize compiled artifacts by node
//! identity. The cache is shared between threads: concurrent misses on one
//! key settle on a single stored node.

use crate::{Apply, BinaryFn, Term, TermRef};
use dashmap::DashMap;
use kiln_diagnostic::{Diagnostic, DiagnosticKind, ErrorCode, ToDiagnostic};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, trace};

/// Default number of nodes kept before least-recently-used eviction.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of stored nodes; `None` never evicts.
    pub capacity: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: Some(DEFAULT_CAPACITY),
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` nodes (at least one).
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity.max(1));
        self
    }

    /// Never evict.
    pub fn unbounded(mut self) -> Self {
        self.capacity = None;
        self
    }
}

/// A stored node does not match the key it is stored under.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cache entry for {key} holds {found}")]
pub struct CacheCorruption {
    pub key: String,
    pub found: String,
}

impl ToDiagnostic for CacheCorruption {
    fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(DiagnosticKind::Internal, self.to_string())
            .with_code(ErrorCode::CacheCorrupted)
    }
}

/// Counters reported by [`ApplyCache::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct ApplyKey {
    func: BinaryFn,
    left: TermRef,
    right: TermRef,
}

/// Subterms are shown by fingerprint; keys can sit on top of very large trees.
impl fmt::Display for ApplyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}(#{:016x}, #{:016x})",
            self.func,
            self.left.fingerprint(),
            self.right.fingerprint()
        )
    }
}

struct Entry {
    node: TermRef,
    last_used: AtomicU64,
}

/// Memo table from `(function, left, right)` to the `Apply` node built for it.
///
/// Bounded caches keep a recency index next to the map holding one record
/// per stored key. Hits only bump the entry's stamp; a stale record is moved
/// to the entry's current stamp when eviction reaches it.
pub struct ApplyCache {
    entries: DashMap<ApplyKey, Entry>,
    recency: Mutex<BTreeMap<u64, ApplyKey>>,
    capacity: Option<usize>,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl ApplyCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            recency: Mutex::new(BTreeMap::new()),
            capacity: config.capacity,
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn recency(&self) -> MutexGuard<'_, BTreeMap<u64, ApplyKey>> {
        self.recency.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached node for `(func, left, right)`, building and storing
    /// it on a miss.
    pub fn make_apply(&self, func: BinaryFn, left: TermRef, right: TermRef) -> TermRef {
        let key = ApplyKey { func, left, right };

        if let Some(entry) = self.entries.get(&key) {
            entry.last_used.fetch_max(self.tick(), Ordering::Relaxed);
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %key, "apply cache hit");
            return Arc::clone(&entry.node);
        }

        let mut inserted = None;
        let node = {
            let entry = self.entries.entry(key.clone()).or_insert_with(|| {
                let stamp = self.tick();
                inserted = Some(stamp);
                let apply = Apply::new(key.func.clone(), key.left.clone(), key.right.clone());
                Entry {
                    node: Arc::new(Term::Apply(apply)),
                    last_used: AtomicU64::new(stamp),
                }
            });
            if inserted.is_none() {
                entry.last_used.fetch_max(self.tick(), Ordering::Relaxed);
            }
            Arc::clone(&entry.node)
        };

        match inserted {
            Some(stamp) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                trace!(key = %key, "apply cache miss");
                if let Some(capacity) = self.capacity {
                    let mut recency = self.recency();
                    recency.insert(stamp, key);
                    self.evict_over_capacity(&mut recency, capacity);
                }
            }
            // Another thread stored this key between our lookup and insert.
            None => {
                self.hits.fetch_add(1, Ordering::Relaxed);
            }
        }
        node
    }

    fn evict_over_capacity(&self, recency: &mut BTreeMap<u64, ApplyKey>, capacity: usize) {
        while self.entries.len() > capacity {
            let Some((stamp, key)) = recency.pop_first() else {
                break;
            };
            let removed = self
                .entries
                .remove_if(&key, |_, entry| entry.last_used.load(Ordering::Relaxed) <= stamp);
            if removed.is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(key = %key, capacity, "evicted apply node");
                continue;
            }
            // Used since the record was written: requeue at its latest stamp.
            let current = self
                .entries
                .get(&key)
                .map(|entry| entry.last_used.load(Ordering::Relaxed));
            if let Some(current) = current {
                recency.insert(current, key);
            }
        }
    }

    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    /// Drop every stored node. Nodes already handed out stay valid.
    pub fn clear(&self) {
        let mut recency = self.recency();
        self.entries.clear();
        recency.clear();
    }

    /// Check that every stored node is the `Apply` its key describes.
    pub fn check_integrity(&self) -> Result<(), CacheCorruption> {
        for entry in self.entries.iter() {
            let key = entry.key();
            let matches = match entry.node.as_ref() {
                Term::Apply(apply) => {
                    apply.func() == &key.func
                        && apply.left() == &key.left
                        && apply.right() == &key.right
                }
                Term::Arg(_) => false,
            };
            if !matches {
                return Err(CacheCorruption {
                    key: key.to_string(),
                    found: entry.node.to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Default for ApplyCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl fmt::Debug for ApplyCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplyCache")
            .field("capacity", &self.capacity)
            .field("stats", &self.stats())
            .finish()
    }
}

static GLOBAL: LazyLock<ApplyCache> = LazyLock::new(ApplyCache::default);

/// The process-wide cache behind [`make_apply`].
pub fn global_cache() -> &'static ApplyCache {
    &GLOBAL
}

/// Build an application term through the process-wide cache.
pub fn make_apply(func: BinaryFn, left: TermRef, right: TermRef) -> TermRef {
    global_cache().make_apply(func, left, right)
}
