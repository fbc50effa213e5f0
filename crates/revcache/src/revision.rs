//! Revision values exchanged with the cache
//!
//! [`LoadedRevision`] is what loaders produce; [`DocumentRevision`] is the
//! snapshot handed to callers and accepted by `put`.

use chrono::{DateTime, Utc};
use revcache_common::{AttachmentsMeta, Body, ChannelSet, RevCacheDelta, Revisions};
use std::sync::Arc;

/// Revision content produced by a loader
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadedRevision {
    pub body: Body,
    pub history: Revisions,
    pub channels: ChannelSet,
    pub attachments: AttachmentsMeta,
    pub expiry: Option<DateTime<Utc>>,
}

impl LoadedRevision {
    /// Create a revision with a body and history and nothing else
    pub fn new(body: Body, history: Revisions) -> Self {
        Self {
            body,
            history,
            ..Self::default()
        }
    }

    /// Set the channels the revision belongs to
    #[must_use]
    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = channels.into_iter().map(Into::into).collect();
        self
    }

    /// Set the attachment metadata
    #[must_use]
    pub fn with_attachments(mut self, attachments: AttachmentsMeta) -> Self {
        self.attachments = attachments;
        self
    }

    /// Set the expiry
    #[must_use]
    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }
}

/// A snapshot of one cached revision
///
/// Body and attachments belong to the caller. History, channels and delta
/// are shared with the cache and must be treated as read-only; the `Arc`
/// wrappers enforce this.
///
/// A revision with no body is empty: the cache had nothing for the key.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DocumentRevision {
    pub rev_id: String,
    pub body: Option<Arc<Body>>,
    pub history: Option<Arc<Revisions>>,
    pub channels: Option<Arc<ChannelSet>>,
    pub expiry: Option<DateTime<Utc>>,
    pub attachments: AttachmentsMeta,
    pub delta: Option<Arc<RevCacheDelta>>,
}

impl DocumentRevision {
    /// Create a revision suitable for `RevisionCache::put`
    pub fn new(rev_id: impl Into<String>, body: Body, history: Revisions) -> Self {
        Self {
            rev_id: rev_id.into(),
            body: Some(Arc::new(body)),
            history: Some(Arc::new(history)),
            ..Self::default()
        }
    }

    /// Create a revision from loader output
    pub fn from_loaded(rev_id: impl Into<String>, loaded: LoadedRevision) -> Self {
        Self {
            rev_id: rev_id.into(),
            body: Some(Arc::new(loaded.body)),
            history: Some(Arc::new(loaded.history)),
            channels: Some(Arc::new(loaded.channels)),
            expiry: loaded.expiry,
            attachments: loaded.attachments,
            delta: None,
        }
    }

    /// Set the channels the revision belongs to
    #[must_use]
    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = Some(Arc::new(channels.into_iter().map(Into::into).collect()));
        self
    }

    /// Set the attachment metadata
    #[must_use]
    pub fn with_attachments(mut self, attachments: AttachmentsMeta) -> Self {
        self.attachments = attachments;
        self
    }

    /// Set the expiry
    #[must_use]
    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// True if the cache had nothing for the requested key
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_none()
    }

    /// Mutable access to the body, copying it first if the allocation is
    /// still shared with the cache
    pub fn body_mut(&mut self) -> Option<&mut Body> {
        self.body.as_mut().map(Arc::make_mut)
    }

    /// Check whether the revision belongs to `channel`
    #[must_use]
    pub fn in_channel(&self, channel: &str) -> bool {
        self.channels
            .as_ref()
            .is_some_and(|channels| channels.contains(channel))
    }
}
