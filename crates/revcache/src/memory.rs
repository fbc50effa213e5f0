//! In-memory document source
//!
//! Keeps every stored revision of each document in memory and serves both
//! the key-based loader and the active-revision fetch path. Counts the calls
//! it receives so callers can see how often the cache reached through to it.

use bytes::Bytes;
use parking_lot::RwLock;
use revcache_common::{Error, IdAndRev, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::loader::{DocumentSource, RevisionLoader, SyncDocument};
use crate::revision::LoadedRevision;

struct StoredDocument {
    current_rev: String,
    revisions: HashMap<String, LoadedRevision>,
}

/// Thread-safe in-memory document store
#[derive(Default)]
pub struct MemoryDocumentSource {
    documents: RwLock<HashMap<String, StoredDocument>>,
    document_fetches: AtomicU64,
    revision_loads: AtomicU64,
}

impl MemoryDocumentSource {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a revision and make it the document's current revision
    pub fn insert_revision(
        &self,
        doc_id: &str,
        rev_id: &str,
        revision: LoadedRevision,
    ) -> Result<()> {
        let key = IdAndRev::checked(doc_id, rev_id)?;
        let mut documents = self.documents.write();
        let doc = documents
            .entry(key.doc_id)
            .or_insert_with(|| StoredDocument {
                current_rev: String::new(),
                revisions: HashMap::new(),
            });
        doc.current_rev.clone_from(&key.rev_id);
        doc.revisions.insert(key.rev_id, revision);
        Ok(())
    }

    /// Remove a document and all of its revisions
    pub fn remove_document(&self, doc_id: &str) -> bool {
        self.documents.write().remove(doc_id).is_some()
    }

    /// Current revision ID of a document
    pub fn current_rev(&self, doc_id: &str) -> Option<String> {
        self.documents
            .read()
            .get(doc_id)
            .map(|doc| doc.current_rev.clone())
    }

    /// Number of stored documents
    pub fn document_count(&self) -> usize {
        self.documents.read().len()
    }

    /// Number of `get_document` calls served
    pub fn document_fetches(&self) -> u64 {
        self.document_fetches.load(Ordering::Relaxed)
    }

    /// Number of `load_revision` calls served
    pub fn revision_loads(&self) -> u64 {
        self.revision_loads.load(Ordering::Relaxed)
    }
}

impl RevisionLoader for MemoryDocumentSource {
    fn load_revision(&self, key: &IdAndRev) -> Result<LoadedRevision> {
        self.revision_loads.fetch_add(1, Ordering::Relaxed);

        let documents = self.documents.read();
        let mut revision = documents
            .get(&key.doc_id)
            .and_then(|doc| doc.revisions.get(&key.rev_id))
            .cloned()
            .ok_or_else(|| Error::revision_not_found(&key.doc_id, &key.rev_id))?;
        revision.body.set_id_and_rev(key);
        Ok(revision)
    }
}

impl DocumentSource for MemoryDocumentSource {
    fn get_document(&self, doc_id: &str) -> Result<Option<SyncDocument>> {
        self.document_fetches.fetch_add(1, Ordering::Relaxed);

        let documents = self.documents.read();
        let Some(doc) = documents.get(doc_id) else {
            return Ok(None);
        };
        let current = doc.revisions.get(&doc.current_rev).ok_or_else(|| {
            Error::internal(format!(
                "document {doc_id} points at missing revision {}",
                doc.current_rev
            ))
        })?;

        Ok(Some(SyncDocument {
            doc_id: doc_id.to_string(),
            current_rev: doc.current_rev.clone(),
            history: current.history.clone(),
            channels: current.channels.clone(),
            attachments: current.attachments.clone(),
            expiry: current.expiry,
            raw_body: Bytes::from(current.body.to_json()?),
        }))
    }
}
