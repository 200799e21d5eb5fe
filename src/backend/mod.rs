//! Knowledge backend contract and the sealed variant set.
//!
//! Every backend variant implements [`KnowledgeBackend`] with identical
//! semantics; the [`Backend`] enum is the closed set of variants the manager
//! can construct, so adding one is a compile-time-checked extension rather
//! than a string-keyed registry lookup.

pub mod vector;

use std::collections::BTreeMap;

use crate::item::{ItemUpdate, KnowledgeItem, SearchFilter, SearchResult};
use crate::store::StoreError;

pub use vector::VectorBackend;

/// Backend statistics mapping. Always includes `total_items`; backends may add
/// their own keys.
pub type Stats = BTreeMap<String, serde_json::Value>;

/// Errors surfaced by backend operations.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Malformed input item or argument.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The operation requires an existing id and none was found.
    #[error("item not found: {0}")]
    NotFound(String),

    /// The underlying store is unreachable or timed out.
    #[error("backend unavailable: {0}")]
    Unavailable(#[from] StoreError),
}

/// Contract every knowledge backend must honor.
///
/// Calls are synchronous; the underlying store may block on network or disk
/// I/O. Methods take `&self` and implementations serialize mutations to the
/// same id internally.
pub trait KnowledgeBackend: Send + Sync {
    /// Insert or upsert an item; returns whether it is now present and
    /// indexed.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Validation` if `content` is empty or `id` is
    /// missing, `BackendError::Unavailable` if the store cannot be reached.
    fn add_item(&self, item: KnowledgeItem) -> Result<bool, BackendError>;

    /// Exact lookup by id; no partial matching.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unavailable` if the store cannot be reached.
    fn get_item(&self, id: &str) -> Result<Option<KnowledgeItem>, BackendError>;

    /// Merge the given fields into the existing item, re-deriving the
    /// embedding only if `content` changed.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if `id` does not exist; this never
    /// silently upserts.
    fn update_item(&self, id: &str, update: ItemUpdate) -> Result<bool, BackendError>;

    /// Remove an item; returns whether one was actually removed. A missing id
    /// is `Ok(false)`, not an error.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unavailable` if the store cannot be reached.
    fn delete_item(&self, id: &str) -> Result<bool, BackendError>;

    /// Return at most `top_k` results ordered by descending score. The filter
    /// restricts candidates before ranking, not after.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Validation` if `top_k` is zero.
    fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>, BackendError>;

    /// List items, optionally restricted by category and tags (AND semantics
    /// when both are given). Order is unspecified.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unavailable` if the store cannot be reached.
    fn list_items(
        &self,
        category: Option<&str>,
        tags: Option<&[String]>,
    ) -> Result<Vec<KnowledgeItem>, BackendError>;

    /// Backend statistics; always includes `total_items`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unavailable` if the store cannot be reached.
    fn get_stats(&self) -> Result<Stats, BackendError>;

    /// Remove all items. Clearing an empty backend is not an error.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Unavailable` if the store cannot be reached.
    fn clear(&self) -> Result<(), BackendError>;
}

/// The sealed set of backend variants.
pub enum Backend {
    /// Adapter over a vector store collaborator.
    Vector(VectorBackend),
}

impl KnowledgeBackend for Backend {
    fn add_item(&self, item: KnowledgeItem) -> Result<bool, BackendError> {
        match self {
            Self::Vector(b) => b.add_item(item),
        }
    }

    fn get_item(&self, id: &str) -> Result<Option<KnowledgeItem>, BackendError> {
        match self {
            Self::Vector(b) => b.get_item(id),
        }
    }

    fn update_item(&self, id: &str, update: ItemUpdate) -> Result<bool, BackendError> {
        match self {
            Self::Vector(b) => b.update_item(id, update),
        }
    }

    fn delete_item(&self, id: &str) -> Result<bool, BackendError> {
        match self {
            Self::Vector(b) => b.delete_item(id),
        }
    }

    fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>, BackendError> {
        match self {
            Self::Vector(b) => b.search(query, top_k, filter),
        }
    }

    fn list_items(
        &self,
        category: Option<&str>,
        tags: Option<&[String]>,
    ) -> Result<Vec<KnowledgeItem>, BackendError> {
        match self {
            Self::Vector(b) => b.list_items(category, tags),
        }
    }

    fn get_stats(&self) -> Result<Stats, BackendError> {
        match self {
            Self::Vector(b) => b.get_stats(),
        }
    }

    fn clear(&self) -> Result<(), BackendError> {
        match self {
            Self::Vector(b) => b.clear(),
        }
    }
}
