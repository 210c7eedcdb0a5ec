//! Versioned document store.
//!
//! `InMemoryDocumentStore` backs tests and single-node hosts. Each document
//! lives in its own `DashMap` slot; an update holds that slot exclusively for
//! the duration of the read-modify-write, so concurrent writers to the same
//! link are serialized while writers to other links proceed in parallel.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::VecDeque;
use tracing::debug;

use super::ServiceDocument;
use crate::error::{ProvisionerError, Result};
use crate::utils::now_micros;

/// Mutation applied to the latest version of a document.
///
/// Returning an error abandons the update: the stored document is untouched.
pub type UpdateFn<D> = Box<dyn FnOnce(&mut D) -> Result<()> + Send>;

#[async_trait]
pub trait DocumentStore<D: ServiceDocument>: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Store a new document at its self link, starting at version 0
    async fn create(&self, document: D) -> Result<D>;

    /// Latest unexpired version of a document
    async fn get(&self, link: &str) -> Result<Option<D>>;

    /// Atomic read-modify-write against the latest version
    async fn update(&self, link: &str, update: UpdateFn<D>) -> Result<D>;

    /// Retained versions, oldest first, ending with the latest
    async fn history(&self, link: &str) -> Result<Vec<D>>;

    async fn get_version(&self, link: &str, version: u64) -> Result<Option<D>> {
        Ok(self
            .history(link)
            .await?
            .into_iter()
            .find(|d| d.version() == version))
    }

    async fn len(&self) -> usize;
}

#[derive(Debug)]
struct DocumentEntry<D> {
    current: D,
    previous: VecDeque<D>,
}

impl<D> DocumentEntry<D> {
    fn new(current: D) -> Self {
        Self {
            current,
            previous: VecDeque::new(),
        }
    }
}

/// In-memory store honouring version retention and expiry
#[derive(Debug)]
pub struct InMemoryDocumentStore<D> {
    documents: DashMap<String, DocumentEntry<D>>,
    /// Total versions kept per document, including the latest
    retention_limit: Option<usize>,
}

impl<D: ServiceDocument> InMemoryDocumentStore<D> {
    pub fn new() -> Self {
        Self {
            documents: DashMap::new(),
            retention_limit: None,
        }
    }

    pub fn with_retention_limit(limit: Option<usize>) -> Self {
        Self {
            documents: DashMap::new(),
            retention_limit: limit.filter(|l| *l > 0),
        }
    }

    fn purge_if_expired(&self, link: &str, now: i64) {
        if self
            .documents
            .remove_if(link, |_, entry| entry.current.meta().is_expired_at(now))
            .is_some()
        {
            debug!(link = link, "Purged expired document");
        }
    }

    fn retain(&self, entry: &mut DocumentEntry<D>) {
        if let Some(limit) = self.retention_limit {
            while entry.previous.len() + 1 > limit {
                entry.previous.pop_front();
            }
        }
    }
}

impl<D: ServiceDocument> Default for InMemoryDocumentStore<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<D: ServiceDocument> DocumentStore<D> for InMemoryDocumentStore<D> {
    fn backend_name(&self) -> &'static str {
        "in-memory"
    }

    async fn create(&self, mut document: D) -> Result<D> {
        let link = document.self_link().to_string();
        if link.is_empty() {
            return Err(ProvisionerError::InvalidArgument(
                "documentSelfLink is required".to_string(),
            ));
        }

        let now = now_micros();
        {
            let meta = document.meta_mut();
            meta.version = 0;
            meta.update_time_micros = now;
        }

        match self.documents.entry(link.clone()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().current.meta().is_expired_at(now) {
                    return Err(ProvisionerError::AlreadyExists(link));
                }
                occupied.insert(DocumentEntry::new(document.clone()));
            }
            Entry::Vacant(vacant) => {
                vacant.insert(DocumentEntry::new(document.clone()));
            }
        }

        debug!(link = %link, "Document created");
        Ok(document)
    }

    async fn get(&self, link: &str) -> Result<Option<D>> {
        self.purge_if_expired(link, now_micros());
        Ok(self.documents.get(link).map(|entry| entry.current.clone()))
    }

    async fn update(&self, link: &str, update: UpdateFn<D>) -> Result<D> {
        let now = now_micros();
        self.purge_if_expired(link, now);

        let mut entry = self
            .documents
            .get_mut(link)
            .ok_or_else(|| ProvisionerError::NotFound(link.to_string()))?;

        let mut next = entry.current.clone();
        update(&mut next)?;

        let version = entry.current.version() + 1;
        {
            let meta = next.meta_mut();
            meta.self_link = link.to_string();
            meta.version = version;
            meta.update_time_micros = now;
        }

        let previous = std::mem::replace(&mut entry.current, next);
        entry.previous.push_back(previous);
        self.retain(&mut *entry);

        debug!(link = link, version = version, "Document updated");
        Ok(entry.current.clone())
    }

    async fn history(&self, link: &str) -> Result<Vec<D>> {
        self.purge_if_expired(link, now_micros());
        let entry = self
            .documents
            .get(link)
            .ok_or_else(|| ProvisionerError::NotFound(link.to_string()))?;

        let mut versions: Vec<D> = entry.previous.iter().cloned().collect();
        versions.push(entry.current.clone());
        Ok(versions)
    }

    async fn len(&self) -> usize {
        self.documents.len()
    }
}
