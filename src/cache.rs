//! TTL cache for repository queries
//!
//! Entries are keyed by `(scope, generation, signature)`. A write to an entity
//! type bumps that scope's generation, so every cached query for the scope
//! misses from then on and the stale entries age out through the TTL.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use mini_moka::sync::Cache;
use serde::Serialize;

/// Entity types whose queries are cached together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScope {
    Tasks,
    Projects,
    Reminders,
    Inbox,
    Fitness,
    Finance,
}

impl CacheScope {
    const ALL: [Self; 6] = [
        Self::Tasks,
        Self::Projects,
        Self::Reminders,
        Self::Inbox,
        Self::Fitness,
        Self::Finance,
    ];

    const fn index(self) -> usize {
        match self {
            Self::Tasks => 0,
            Self::Projects => 1,
            Self::Reminders => 2,
            Self::Inbox => 3,
            Self::Fitness => 4,
            Self::Finance => 5,
        }
    }

    const fn as_str(self) -> &'static str {
        match self {
            Self::Tasks => "tasks",
            Self::Projects => "projects",
            Self::Reminders => "reminders",
            Self::Inbox => "inbox",
            Self::Fitness => "fitness",
            Self::Finance => "finance",
        }
    }
}

type Entry = Arc<dyn Any + Send + Sync>;

struct Inner {
    entries: Cache<String, Entry>,
    generations: [AtomicU64; CacheScope::ALL.len()],
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

/// Shared query cache handle
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub entries: u64,
    pub hit_rate: f64,
}

impl QueryCache {
    /// Create a cache whose entries live for `ttl`
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Cache::builder()
                    .max_capacity(1024)
                    .time_to_live(ttl)
                    .build(),
                generations: Default::default(),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                invalidations: AtomicU64::new(0),
            }),
        }
    }

    fn key(&self, scope: CacheScope, signature: &str) -> String {
        let generation = self.inner.generations[scope.index()].load(Ordering::Acquire);
        format!("{}:{generation}:{signature}", scope.as_str())
    }

    /// Look up a cached value
    #[must_use]
    pub fn get<T>(&self, scope: CacheScope, signature: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let found = self
            .inner
            .entries
            .get(&self.key(scope, signature))
            .and_then(|entry| entry.downcast_ref::<T>().cloned());

        if found.is_some() {
            self.inner.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Store a value
    pub fn put<T>(&self, scope: CacheScope, signature: &str, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.inner
            .entries
            .insert(self.key(scope, signature), Arc::new(value));
    }

    /// Return the cached value or compute, store and return it
    ///
    /// # Errors
    ///
    /// Propagates the loader's error; failures are not cached
    pub fn get_or_load<T, E>(
        &self,
        scope: CacheScope,
        signature: &str,
        load: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
    {
        if let Some(hit) = self.get::<T>(scope, signature) {
            return Ok(hit);
        }
        let value = load()?;
        self.put(scope, signature, value.clone());
        Ok(value)
    }

    /// Drop every cached query for an entity type
    pub fn invalidate(&self, scope: CacheScope) {
        self.inner.generations[scope.index()].fetch_add(1, Ordering::AcqRel);
        self.inner.invalidations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(scope = scope.as_str(), "cache scope invalidated");
    }

    /// Drop everything
    pub fn clear(&self) {
        for scope in CacheScope::ALL {
            self.invalidate(scope);
        }
        self.inner.entries.invalidate_all();
    }

    /// Current counters
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let hits = self.inner.hits.load(Ordering::Relaxed);
        let misses = self.inner.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            invalidations: self.inner.invalidations.load(Ordering::Relaxed),
            entries: self.inner.entries.entry_count(),
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}
