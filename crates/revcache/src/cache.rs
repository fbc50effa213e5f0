//! LRU cache of document revisions
//!
//! Reconstructing a revision from the backing store is expensive, so recently
//! used revisions are kept in memory. Two kinds of lock are involved:
//!
//! - the store lock guards the key index and the recency list. It is held only
//!   for lookups, moves, inserts and evictions, never while loading.
//! - each entry's own lock guards that entry's payload and is held for the
//!   whole of a load, which serializes concurrent callers for the same key.
//!
//! The store lock is always released before an entry lock is taken.

use bytes::Bytes;
use parking_lot::Mutex;
use revcache_common::config::resolve_capacity;
use revcache_common::{BodyCopyType, Error, IdAndRev, RevCacheDelta, Result, RevisionCacheConfig};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::entry::CacheValue;
use crate::loader::{DocumentSource, RevisionLoader};
use crate::lru::{LruList, SlotId};
use crate::revision::DocumentRevision;
use crate::stats::StatsRecorder;

/// Key index plus recency order, guarded by the store lock
struct LruState {
    index: HashMap<IdAndRev, SlotId>,
    lru: LruList<Arc<CacheValue>>,
}

impl LruState {
    fn touch(&mut self, key: &IdAndRev) -> Option<Arc<CacheValue>> {
        let slot = *self.index.get(key)?;
        self.lru.move_to_front(slot);
        self.lru.get(slot).cloned()
    }

    fn purge_oldest(&mut self) {
        if let Some(value) = self.lru.pop_back() {
            let key = value.key();
            trace!(doc_id = %key.doc_id, rev_id = %key.rev_id, "evicting cached revision");
            self.index.remove(value.key());
        }
    }
}

/// An LRU cache of document revisions
///
/// Holds at most `capacity` revisions. Misses are filled by the optional
/// loader; concurrent misses on the same key share a single load.
pub struct RevisionCache {
    state: Mutex<LruState>,
    capacity: usize,
    loader: Option<Arc<dyn RevisionLoader>>,
    stats: Option<Arc<dyn StatsRecorder>>,
}

impl RevisionCache {
    /// Create a revision cache. A capacity of 0 selects the default.
    pub fn new(
        capacity: u32,
        loader: Option<Arc<dyn RevisionLoader>>,
        stats: Option<Arc<dyn StatsRecorder>>,
    ) -> Self {
        let capacity = resolve_capacity(capacity) as usize;
        info!(capacity, has_loader = loader.is_some(), "revision cache initialized");

        Self {
            state: Mutex::new(LruState {
                index: HashMap::with_capacity(capacity),
                lru: LruList::with_capacity(capacity),
            }),
            capacity,
            loader,
            stats,
        }
    }

    /// Create a revision cache from configuration
    pub fn from_config(
        config: &RevisionCacheConfig,
        loader: Option<Arc<dyn RevisionLoader>>,
        stats: Option<Arc<dyn StatsRecorder>>,
    ) -> Self {
        Self::new(config.resolved_capacity(), loader, stats)
    }

    /// Maximum number of cached revisions
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of revisions currently cached
    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    /// True if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether a revision is resident without touching its recency
    pub fn contains(&self, doc_id: &str, rev_id: &str) -> bool {
        self.state
            .lock()
            .index
            .contains_key(&IdAndRev::new(doc_id, rev_id))
    }

    /// Look up a revision, loading it on a miss if a loader is configured.
    ///
    /// Without a loader a miss returns an empty revision, the same as for a
    /// revision that does not exist.
    pub fn get(&self, doc_id: &str, rev_id: &str) -> Result<DocumentRevision> {
        self.get_from_cache(doc_id, rev_id, BodyCopyType::Shallow, self.loader.is_some())
    }

    /// Look up a revision in the cache only; never calls the loader
    pub fn get_cached(&self, doc_id: &str, rev_id: &str) -> Result<DocumentRevision> {
        self.get_from_cache(doc_id, rev_id, BodyCopyType::Shallow, false)
    }

    /// Like [`get`](Self::get), with the body copied per `copy_type`
    pub fn get_with_copy(
        &self,
        doc_id: &str,
        rev_id: &str,
        copy_type: BodyCopyType,
    ) -> Result<DocumentRevision> {
        self.get_from_cache(doc_id, rev_id, copy_type, self.loader.is_some())
    }

    /// Look up the current revision of a document.
    ///
    /// The document is always fetched from `source` to learn its current
    /// revision. If that revision is not cached it is built from the fetched
    /// document, so the store is read only once. A missing document yields an
    /// empty revision.
    pub fn get_active(
        &self,
        doc_id: &str,
        source: &dyn DocumentSource,
    ) -> Result<DocumentRevision> {
        if doc_id.is_empty() {
            return Err(Error::invalid_usage("empty doc id"));
        }

        debug!(doc_id, "fetching document for active revision");
        let Some(doc) = source.get_document(doc_id)? else {
            return Ok(DocumentRevision::default());
        };

        let key = IdAndRev::checked(doc_id, &doc.current_rev)?;
        let value = self.touch_or_insert(&key);
        let (hit, result) = value.load_for_doc(&doc, source, BodyCopyType::Shallow);
        self.record(hit);

        if let Err(err) = &result {
            warn!(%key, error = %err, "active revision load failed, evicting entry");
            self.remove_value(&value);
        }
        result
    }

    /// Add a revision to the cache.
    ///
    /// The revision must carry a history. If the key is already populated the
    /// call is ignored.
    pub fn put(&self, doc_id: &str, rev: DocumentRevision) -> Result<()> {
        if rev.history.is_none() {
            return Err(Error::invalid_usage(format!(
                "missing history for put of {doc_id}/{}",
                rev.rev_id
            )));
        }
        let key = IdAndRev::checked(doc_id, &rev.rev_id)?;
        self.touch_or_insert(&key).store(rev);
        Ok(())
    }

    /// Replace the delta on a cached revision.
    ///
    /// Does nothing if the revision is no longer cached.
    pub fn update_delta(
        &self,
        doc_id: &str,
        rev_id: &str,
        to_rev_id: impl Into<String>,
        delta_bytes: Bytes,
    ) -> Result<()> {
        let key = IdAndRev::checked(doc_id, rev_id)?;
        if let Some(value) = self.touch(&key) {
            value.update_delta(RevCacheDelta {
                to_rev_id: to_rev_id.into(),
                delta_bytes,
            });
        }
        Ok(())
    }

    fn get_from_cache(
        &self,
        doc_id: &str,
        rev_id: &str,
        copy_type: BodyCopyType,
        load_on_miss: bool,
    ) -> Result<DocumentRevision> {
        let key = IdAndRev::checked(doc_id, rev_id)?;
        let value = if load_on_miss {
            Some(self.touch_or_insert(&key))
        } else {
            self.touch(&key)
        };
        let Some(value) = value else {
            return Ok(DocumentRevision::default());
        };

        let loader = if load_on_miss { self.loader.as_deref() } else { None };
        let (hit, result) = value.load(loader, copy_type);
        self.record(hit);

        if let Err(err) = &result {
            warn!(%key, error = %err, "revision load failed, evicting entry");
            self.remove_value(&value);
        }
        result
    }

    fn record(&self, hit: bool) {
        if let Some(stats) = &self.stats {
            if hit {
                stats.record_hit();
            } else {
                stats.record_miss();
            }
        }
    }

    /// Find an entry and mark it most recently used
    fn touch(&self, key: &IdAndRev) -> Option<Arc<CacheValue>> {
        self.state.lock().touch(key)
    }

    /// Find or create an entry and mark it most recently used, evicting the
    /// least recently used entries if the cache grows past capacity
    fn touch_or_insert(&self, key: &IdAndRev) -> Arc<CacheValue> {
        let mut state = self.state.lock();
        if let Some(value) = state.touch(key) {
            return value;
        }

        let value = Arc::new(CacheValue::new(key.clone()));
        let slot = state.lru.push_front(Arc::clone(&value));
        state.index.insert(key.clone(), slot);
        while state.index.len() > self.capacity {
            state.purge_oldest();
        }
        value
    }

    /// Remove an entry, unless its key has since been taken by a newer entry
    fn remove_value(&self, value: &Arc<CacheValue>) {
        let mut state = self.state.lock();
        let Some(&slot) = state.index.get(value.key()) else {
            return;
        };
        if state
            .lru
            .get(slot)
            .is_some_and(|current| Arc::ptr_eq(current, value))
        {
            state.lru.remove(slot);
            state.index.remove(value.key());
        }
    }
}
