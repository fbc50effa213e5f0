//! Cache entry for one revision
//!
//! Each entry guards its payload with its own lock. The "is it loaded?"
//! check and the load itself happen inside one critical section, so
//! concurrent callers for the same key run the loader once and everyone
//! after the first sees a hit.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use revcache_common::{
    AttachmentsMeta, Body, BodyCopyType, ChannelSet, Error, IdAndRev, RevCacheDelta, Result,
    Revisions,
};
use std::sync::Arc;
use tracing::debug;

use crate::loader::{DocumentSource, RevisionLoader, SyncDocument};
use crate::revision::{DocumentRevision, LoadedRevision};

/// Payload of a cache entry, guarded by the entry lock
#[derive(Default)]
struct EntryState {
    body: Option<Arc<Body>>,
    history: Option<Arc<Revisions>>,
    channels: Option<Arc<ChannelSet>>,
    expiry: Option<DateTime<Utc>>,
    attachments: AttachmentsMeta,
    delta: Option<Arc<RevCacheDelta>>,
    err: Option<Error>,
}

impl EntryState {
    fn needs_load(&self) -> bool {
        self.body.is_none() && self.err.is_none()
    }

    fn populate(&mut self, loaded: Result<LoadedRevision>) {
        match loaded {
            Ok(rev) => {
                self.body = Some(Arc::new(rev.body));
                self.history = Some(Arc::new(rev.history));
                self.channels = Some(Arc::new(rev.channels));
                self.attachments = rev.attachments;
                self.expiry = rev.expiry;
            }
            Err(err) => self.err = Some(err),
        }
    }

    fn snapshot(&self, rev_id: &str, copy_type: BodyCopyType) -> DocumentRevision {
        DocumentRevision {
            rev_id: rev_id.to_string(),
            body: self.body.as_ref().map(|body| copy_type.apply(body)),
            history: self.history.clone(),
            channels: self.channels.clone(),
            expiry: self.expiry,
            // Attachment metadata is edited downstream, never hand out the cached map
            attachments: self.attachments.clone(),
            delta: self.delta.clone(),
        }
    }
}

/// One cached revision
pub(crate) struct CacheValue {
    key: IdAndRev,
    state: Mutex<EntryState>,
}

impl CacheValue {
    pub(crate) fn new(key: IdAndRev) -> Self {
        Self {
            key,
            state: Mutex::new(EntryState::default()),
        }
    }

    pub(crate) fn key(&self) -> &IdAndRev {
        &self.key
    }

    /// Return the cached revision, calling `loader` first if the entry has
    /// not been populated. Without a loader an unpopulated entry yields an
    /// empty revision.
    ///
    /// The returned flag is true for a cache hit.
    pub(crate) fn load(
        &self,
        loader: Option<&dyn RevisionLoader>,
        copy_type: BodyCopyType,
    ) -> (bool, Result<DocumentRevision>) {
        self.load_with(copy_type, loader.map(|l| move |key: &IdAndRev| l.load_revision(key)))
    }

    /// Like [`load`](Self::load), but populates the entry from a document
    /// that was already fetched instead of loading by key.
    pub(crate) fn load_for_doc(
        &self,
        doc: &SyncDocument,
        source: &dyn DocumentSource,
        copy_type: BodyCopyType,
    ) -> (bool, Result<DocumentRevision>) {
        self.load_with(
            copy_type,
            Some(|key: &IdAndRev| source.revision_for_document(doc, &key.rev_id)),
        )
    }

    fn load_with<F>(
        &self,
        copy_type: BodyCopyType,
        loader: Option<F>,
    ) -> (bool, Result<DocumentRevision>)
    where
        F: FnOnce(&IdAndRev) -> Result<LoadedRevision>,
    {
        let mut state = self.state.lock();

        let mut hit = true;
        if state.needs_load() {
            hit = false;
            if let Some(loader) = loader {
                debug!(
                    doc_id = %self.key.doc_id,
                    rev_id = %self.key.rev_id,
                    "revision cache miss, loading"
                );
                state.populate(loader(&self.key));
            }
        }

        let result = match &state.err {
            Some(err) => Err(err.clone()),
            None => Ok(state.snapshot(&self.key.rev_id, copy_type)),
        };
        (hit, result)
    }

    /// Store a revision unless the entry is already populated.
    ///
    /// The body always carries this entry's `_id` and `_rev`.
    pub(crate) fn store(&self, rev: DocumentRevision) {
        let mut state = self.state.lock();
        if state.body.is_some() {
            return;
        }

        let mut body = rev.body.map(Arc::unwrap_or_clone).unwrap_or_default();
        body.set_id_and_rev(&self.key);

        state.body = Some(Arc::new(body));
        state.history = rev.history;
        state.channels = rev.channels;
        state.expiry = rev.expiry;
        state.attachments = rev.attachments;
        state.err = None;
    }

    /// Replace the delta, whatever was there before
    pub(crate) fn update_delta(&self, delta: RevCacheDelta) {
        self.state.lock().delta = Some(Arc::new(delta));
    }

    #[cfg(test)]
    fn is_populated(&self) -> bool {
        self.state.lock().body.is_some()
    }
}
