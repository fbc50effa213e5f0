//! Loader and document-source seams
//!
//! The cache never talks to the backing store directly. Key-based misses go
//! through a [`RevisionLoader`]; `get_active` goes through a
//! [`DocumentSource`], which first fetches the raw document and then derives
//! the current revision from it without a second round trip.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use revcache_common::{AttachmentsMeta, Body, ChannelSet, Error, IdAndRev, Result, Revisions};

use crate::revision::LoadedRevision;

/// Loads a revision from the backing store on a cache miss
///
/// Called while the entry's lock is held, so it runs at most once per
/// population of a key. Any closure with the matching signature is a loader.
pub trait RevisionLoader: Send + Sync {
    fn load_revision(&self, key: &IdAndRev) -> Result<LoadedRevision>;
}

impl<F> RevisionLoader for F
where
    F: Fn(&IdAndRev) -> Result<LoadedRevision> + Send + Sync,
{
    fn load_revision(&self, key: &IdAndRev) -> Result<LoadedRevision> {
        self(key)
    }
}

/// A document as fetched from the backing store with only its sync
/// metadata decoded. The current revision's body stays serialized.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncDocument {
    pub doc_id: String,
    pub current_rev: String,
    pub history: Revisions,
    pub channels: ChannelSet,
    pub attachments: AttachmentsMeta,
    pub expiry: Option<DateTime<Utc>>,
    pub raw_body: Bytes,
}

/// Fetches documents for `RevisionCache::get_active`
pub trait DocumentSource: Send + Sync {
    /// Fetch a document by ID. `Ok(None)` means the document does not exist.
    fn get_document(&self, doc_id: &str) -> Result<Option<SyncDocument>>;

    /// Build the content of `rev_id` from an already-fetched document
    fn revision_for_document(&self, doc: &SyncDocument, rev_id: &str) -> Result<LoadedRevision> {
        revision_from_document(doc, rev_id)
    }
}

/// Decode the current revision carried by a fetched document.
///
/// Only the current revision is available from the document itself; any
/// other `rev_id` is reported as not found.
pub fn revision_from_document(doc: &SyncDocument, rev_id: &str) -> Result<LoadedRevision> {
    if rev_id != doc.current_rev {
        return Err(Error::revision_not_found(&doc.doc_id, rev_id));
    }

    let mut body = Body::from_json(&doc.raw_body)?;
    body.set_id_and_rev(&IdAndRev::new(&doc.doc_id, rev_id));

    Ok(LoadedRevision {
        body,
        history: doc.history.clone(),
        channels: doc.channels.clone(),
        attachments: doc.attachments.clone(),
        expiry: doc.expiry,
    })
}
