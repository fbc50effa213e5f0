//! Core type definitions for the revision cache
//!
//! This module defines the cache key and the payload types that make up a
//! cached document revision: body, revision history, channel set, attachment
//! metadata and deltas.

use bytes::Bytes;
use derive_more::{Deref, DerefMut, Display, From, Into};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::error::{Error, Result};

/// Body property holding the document ID
pub const BODY_ID: &str = "_id";

/// Body property holding the revision ID
pub const BODY_REV: &str = "_rev";

/// Body property holding the encoded revision history
pub const BODY_REVISIONS: &str = "_revisions";

/// Body property holding attachment metadata
pub const BODY_ATTACHMENTS: &str = "_attachments";

/// Identifies one cached revision: a document ID plus one of its revision IDs
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{doc_id}/{rev_id}")]
pub struct IdAndRev {
    pub doc_id: String,
    pub rev_id: String,
}

impl IdAndRev {
    /// Create a new key
    pub fn new(doc_id: impl Into<String>, rev_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            rev_id: rev_id.into(),
        }
    }

    /// Create a key after checking that neither ID is empty
    pub fn checked(doc_id: &str, rev_id: &str) -> Result<Self> {
        if doc_id.is_empty() || rev_id.is_empty() {
            return Err(Error::invalid_usage(format!(
                "empty doc/rev id (doc_id={doc_id:?}, rev_id={rev_id:?})"
            )));
        }
        Ok(Self::new(doc_id, rev_id))
    }
}

/// A revision body: the JSON properties of one document revision
///
/// Property order is preserved as inserted.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, From, Into, Deref, DerefMut)]
#[serde(transparent)]
pub struct Body(Map<String, Value>);

impl Body {
    /// Create an empty body
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Parse a body from serialized JSON. The top level must be an object.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        match serde_json::from_slice::<Value>(data)? {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::Deserialization(format!(
                "revision body must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Serialize the body to JSON bytes
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.0).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Document ID stored in the body, if any
    pub fn doc_id(&self) -> Option<&str> {
        self.0.get(BODY_ID).and_then(Value::as_str)
    }

    /// Revision ID stored in the body, if any
    pub fn rev_id(&self) -> Option<&str> {
        self.0.get(BODY_REV).and_then(Value::as_str)
    }

    /// Set the `_id` and `_rev` properties, replacing whatever was there
    pub fn set_id_and_rev(&mut self, key: &IdAndRev) {
        self.0.insert(BODY_ID.to_string(), Value::String(key.doc_id.clone()));
        self.0.insert(BODY_REV.to_string(), Value::String(key.rev_id.clone()));
    }

    /// Consume the body and return the underlying JSON map
    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// How a cached body is copied before it is handed to a caller
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyCopyType {
    /// Share the cached allocation. Callers must mutate through
    /// `Arc::make_mut`, which copies before writing.
    None,
    /// Copy the top-level property map
    #[default]
    Shallow,
    /// Copy the full property tree
    Deep,
}

impl BodyCopyType {
    /// Produce the body a caller receives from the cached one
    #[must_use]
    pub fn apply(self, body: &Arc<Body>) -> Arc<Body> {
        match self {
            Self::None => Arc::clone(body),
            // JSON values own their children, so copying the top-level map
            // already yields a fully independent tree.
            Self::Shallow | Self::Deep => Arc::new(Body::clone(body)),
        }
    }
}

/// Revision history in `_revisions` form
///
/// `start` is the generation of the newest revision; `ids` holds revision
/// digests newest first, each one generation older than the previous.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revisions {
    pub start: u64,
    pub ids: Vec<String>,
}

impl Revisions {
    /// Create a history from a starting generation and digests (newest first)
    pub fn new(start: u64, ids: Vec<String>) -> Self {
        Self { start, ids }
    }

    /// Encode a chain of full revision IDs (`"<gen>-<digest>"`, newest first).
    ///
    /// Generations must decrease by exactly one along the chain.
    pub fn from_rev_ids<S: AsRef<str>>(rev_ids: &[S]) -> Result<Self> {
        let mut history = Self::default();
        for (i, rev_id) in rev_ids.iter().enumerate() {
            let rev_id = rev_id.as_ref();
            let (generation, digest) = parse_rev_id(rev_id).ok_or_else(|| {
                Error::invalid_argument(format!("malformed revision id: {rev_id}"))
            })?;
            if i == 0 {
                history.start = generation;
            } else if generation.checked_add(i as u64) != Some(history.start) {
                return Err(Error::invalid_argument(format!(
                    "revision {rev_id} breaks the ancestor chain starting at generation {}",
                    history.start
                )));
            }
            history.ids.push(digest.to_string());
        }
        Ok(history)
    }

    /// Decode back into full revision IDs, newest first
    pub fn rev_ids(&self) -> impl Iterator<Item = String> + '_ {
        self.ids
            .iter()
            .zip((0..=self.start).rev())
            .map(|(digest, generation)| format!("{generation}-{digest}"))
    }

    /// Number of revisions in the history
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True if the history holds no revisions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Split a revision ID of the form `"<generation>-<digest>"`
pub fn parse_rev_id(rev_id: &str) -> Option<(u64, &str)> {
    let (generation, digest) = rev_id.split_once('-')?;
    let generation = generation.parse().ok()?;
    if generation == 0 || digest.is_empty() {
        return None;
    }
    Some((generation, digest))
}

/// Set of access-control channels a revision belongs to
pub type ChannelSet = BTreeSet<String>;

/// Metadata describing one attachment of a revision
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentMeta {
    /// Content digest (e.g. `sha1-...`)
    pub digest: String,
    /// MIME type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Length of the attachment content in bytes
    #[serde(default)]
    pub length: u64,
    /// Generation of the revision that added the attachment
    #[serde(default)]
    pub revpos: u64,
    /// True when only metadata is present, not the content itself
    #[serde(default)]
    pub stub: bool,
}

/// Attachment metadata keyed by attachment name
pub type AttachmentsMeta = BTreeMap<String, AttachmentMeta>;

/// A precomputed delta from a cached revision to a newer one
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevCacheDelta {
    /// Revision the delta produces when applied
    pub to_rev_id: String,
    /// Encoded delta
    pub delta_bytes: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_checked() {
        let key = IdAndRev::checked("doc1", "1-a").unwrap();
        assert_eq!(key.to_string(), "doc1/1-a");

        assert!(IdAndRev::checked("", "1-a").unwrap_err().is_invalid_usage());
        assert!(IdAndRev::checked("doc1", "").unwrap_err().is_invalid_usage());
    }

    #[test]
    fn test_body_from_json() {
        let body = Body::from_json(br#"{"_id":"doc1","_rev":"1-a","value":42}"#).unwrap();
        assert_eq!(body.doc_id(), Some("doc1"));
        assert_eq!(body.rev_id(), Some("1-a"));
        assert_eq!(body.get("value"), Some(&json!(42)));

        let err = Body::from_json(b"[1,2,3]").unwrap_err();
        assert!(matches!(err, Error::Deserialization(_)));
        assert!(Body::from_json(b"{not json").is_err());
    }

    #[test]
    fn test_body_preserves_insertion_order() {
        let mut body = Body::new();
        body.insert("zeta".into(), json!(1));
        body.insert("alpha".into(), json!(2));
        body.set_id_and_rev(&IdAndRev::new("doc1", "1-a"));

        let keys: Vec<_> = body.keys().map(String::as_str).collect();
        assert_eq!(keys, ["zeta", "alpha", BODY_ID, BODY_REV]);
    }

    #[test]
    fn test_set_id_and_rev_overwrites() {
        let mut body = Body::from_json(br#"{"_id":"other","_rev":"9-z"}"#).unwrap();
        body.set_id_and_rev(&IdAndRev::new("doc1", "2-b"));
        assert_eq!(body.doc_id(), Some("doc1"));
        assert_eq!(body.rev_id(), Some("2-b"));
    }

    #[test]
    fn test_copy_policies() {
        let cached = Arc::new(Body::from_json(br#"{"nested":{"k":"v"}}"#).unwrap());

        let shared = BodyCopyType::None.apply(&cached);
        assert!(Arc::ptr_eq(&shared, &cached));

        for policy in [BodyCopyType::Shallow, BodyCopyType::Deep] {
            let mut copy = policy.apply(&cached);
            assert!(!Arc::ptr_eq(&copy, &cached));
            let body = Arc::get_mut(&mut copy).unwrap();
            body["nested"]["k"] = json!("changed");
            assert_eq!(cached["nested"]["k"], json!("v"));
        }
    }

    #[test]
    fn test_copy_none_copies_on_write() {
        let cached = Arc::new(Body::from_json(br#"{"k":"v"}"#).unwrap());
        let mut shared = BodyCopyType::None.apply(&cached);
        Arc::make_mut(&mut shared).insert("k".into(), json!("changed"));
        assert_eq!(cached["k"], json!("v"));
        assert_eq!(shared["k"], json!("changed"));
    }

    #[test]
    fn test_revisions_round_trip() {
        let history = Revisions::from_rev_ids(&["3-c", "2-b", "1-a"]).unwrap();
        assert_eq!(history.start, 3);
        assert_eq!(history.ids, ["c", "b", "a"]);
        assert_eq!(history.rev_ids().collect::<Vec<_>>(), ["3-c", "2-b", "1-a"]);
    }

    #[test]
    fn test_revisions_rejects_broken_chain() {
        assert!(Revisions::from_rev_ids(&["3-c", "1-a"]).is_err());
        assert!(Revisions::from_rev_ids(&["abc"]).is_err());
        assert!(Revisions::from_rev_ids::<&str>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_revisions_generation_overflow() {
        let max = format!("{}-a", u64::MAX);
        let err = Revisions::from_rev_ids(&[max.as_str(), max.as_str()]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));

        let prev = format!("{}-b", u64::MAX - 1);
        let history = Revisions::from_rev_ids(&[max.as_str(), prev.as_str()]).unwrap();
        assert_eq!(history.start, u64::MAX);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_parse_rev_id() {
        assert_eq!(parse_rev_id("12-abc"), Some((12, "abc")));
        assert_eq!(parse_rev_id("0-abc"), None);
        assert_eq!(parse_rev_id("x-abc"), None);
        assert_eq!(parse_rev_id("3-"), None);
    }

    #[test]
    fn test_attachment_meta_serde() {
        let meta: AttachmentMeta = serde_json::from_value(json!({
            "digest": "sha1-abc",
            "content_type": "image/png",
            "length": 10,
            "revpos": 2,
            "stub": true
        }))
        .unwrap();
        assert_eq!(meta.digest, "sha1-abc");
        assert_eq!(meta.content_type.as_deref(), Some("image/png"));
        assert!(meta.stub);
    }
}
