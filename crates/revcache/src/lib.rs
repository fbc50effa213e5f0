//! Revision Cache
//!
//! An in-memory cache of recently accessed document revisions for a
//! document synchronization server. Rebuilding a revision (body, history,
//! channels, attachments, expiry) from the backing store is expensive, so
//! the cache keeps the most recently used ones and makes sure concurrent
//! requests for the same revision trigger at most one rebuild.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │      RevisionCache       │  store lock: key index + LRU list
//! └────────────┬─────────────┘
//!              │ Arc<CacheValue>
//! ┌────────────▼─────────────┐
//! │        CacheValue        │  entry lock: payload, single-flight load
//! └────────────┬─────────────┘
//!              │ on miss
//! ┌────────────▼─────────────┐
//! │ RevisionLoader /         │  backing store
//! │ DocumentSource           │
//! └──────────────────────────┘
//! ```
//!
//! Callers receive [`DocumentRevision`] snapshots; the cached state is never
//! handed out mutably.

mod entry;

pub mod cache;
pub mod loader;
pub mod lru;
pub mod memory;
pub mod revision;
pub mod stats;

pub use cache::RevisionCache;
pub use loader::{revision_from_document, DocumentSource, RevisionLoader, SyncDocument};
pub use memory::MemoryDocumentSource;
pub use revision::{DocumentRevision, LoadedRevision};
pub use stats::{CacheStats, MetricsStatsRecorder, StatsRecorder};

pub use revcache_common::{BodyCopyType, Error, IdAndRev, Result};
