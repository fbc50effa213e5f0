//! Revision cache common types
//!
//! This crate provides the identifiers, revision payload types, error
//! definitions and configuration shared by the revision cache and its tools.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, LoggingConfig, RevisionCacheConfig, StatsConfig};
pub use error::{Error, Result};
pub use types::*;
