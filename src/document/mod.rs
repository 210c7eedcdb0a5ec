//! # Service Documents
//!
//! Metadata shared by every persisted document, the per-property description
//! a document template publishes to the index, and the versioned store that
//! stands in for the replicated document substrate.
//!
//! The store provides exactly what the task and resource services rely on:
//! an atomic read-modify-write against the latest version, a bounded version
//! history, and expiry once `documentExpirationTimeMicros` has passed.

pub mod description;
pub mod store;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use description::{
    DocumentDescription, PropertyDescription, PropertyIndexingOption, PropertyUsageOption,
};
pub use store::{DocumentStore, InMemoryDocumentStore, UpdateFn};

/// Substrate-managed fields carried by every document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    #[serde(default, rename = "documentSelfLink")]
    pub self_link: String,
    #[serde(default, rename = "documentVersion")]
    pub version: u64,
    #[serde(default, rename = "documentUpdateTimeMicros")]
    pub update_time_micros: i64,
    #[serde(
        default,
        rename = "documentExpirationTimeMicros",
        skip_serializing_if = "Option::is_none"
    )]
    pub expiration_time_micros: Option<i64>,
}

impl DocumentMeta {
    pub fn with_link(self_link: impl Into<String>) -> Self {
        Self {
            self_link: self_link.into(),
            ..Self::default()
        }
    }

    /// Expired when an expiry is set and lies at or before `now_micros`.
    /// A zero expiry means "never", as it does on the wire.
    pub fn is_expired_at(&self, now_micros: i64) -> bool {
        matches!(self.expiration_time_micros, Some(t) if t > 0 && t <= now_micros)
    }
}

/// A document the store can version and expire
pub trait ServiceDocument: Clone + fmt::Debug + Send + Sync + 'static {
    fn meta(&self) -> &DocumentMeta;

    fn meta_mut(&mut self) -> &mut DocumentMeta;

    fn self_link(&self) -> &str {
        &self.meta().self_link
    }

    fn version(&self) -> u64 {
        self.meta().version
    }
}
