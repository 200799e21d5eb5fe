//! Vector store collaborator trait and implementations.
//!
//! This module defines the capability the vector-backed knowledge backend
//! consumes: a store that keeps text keyed by id, derives embeddings when the
//! caller did not supply one, and answers nearest-by-similarity queries with
//! exact-match field filtering. The bundled [`memory::MemoryVectorStore`]
//! serves local use and tests; hosts plug remote vector databases in by
//! implementing [`VectorStore`].

pub mod memory;

use crate::item::Metadata;

/// Errors that can occur during vector store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("failed to read: {0}")]
    ReadError(String),

    #[error("failed to write: {0}")]
    WriteError(String),
}

/// One stored entry: content keyed by id, plus flattened fields.
///
/// `fields` carries whatever the backend flattened into the store (title,
/// category, tags, timestamps, caller metadata). The store does not interpret
/// them beyond exact-match filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub content: String,
    /// `None` asks the store to derive an embedding from `content`.
    pub embedding: Option<Vec<f32>>,
    pub fields: Metadata,
}

/// An exact-match condition on one record field.
#[derive(Debug, Clone)]
pub enum FieldMatch {
    /// The field value equals the given value.
    Equals(serde_json::Value),
    /// The field is an array containing the given value.
    Contains(serde_json::Value),
}

/// Conjunction of field conditions; a record matches when every pair matches.
pub type FieldFilter = [(String, FieldMatch)];

/// Returns true when `fields` satisfies every condition in `filter`.
#[must_use]
pub fn record_matches(fields: &Metadata, filter: &FieldFilter) -> bool {
    filter.iter().all(|(key, cond)| match cond {
        FieldMatch::Equals(expected) => fields.get(key) == Some(expected),
        FieldMatch::Contains(expected) => fields
            .get(key)
            .and_then(serde_json::Value::as_array)
            .is_some_and(|values| values.contains(expected)),
    })
}

/// Trait for vector stores (in-memory, Chroma-style remote servers, etc.).
///
/// Methods take `&self`; implementations guard internal state so that two
/// concurrent mutations to the same id cannot interleave into a corrupted
/// merge (last-writer-wins is acceptable).
pub trait VectorStore: Send + Sync {
    /// Insert or replace the record keyed by `record.id`, deriving the
    /// embedding from `content` when none is supplied.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store is unreachable or the write fails.
    fn upsert(&self, record: VectorRecord) -> Result<(), StoreError>;

    /// Exact lookup by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store is unreachable or the read fails.
    fn fetch(&self, id: &str) -> Result<Option<VectorRecord>, StoreError>;

    /// Return up to `top_k` records nearest to `text`, most similar first,
    /// restricted to records matching `filter` before ranking.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store is unreachable or the query fails.
    fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: &FieldFilter,
    ) -> Result<Vec<(VectorRecord, f32)>, StoreError>;

    /// Return all records matching `filter`, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store is unreachable or the read fails.
    fn scan(&self, filter: &FieldFilter) -> Result<Vec<VectorRecord>, StoreError>;

    /// Remove the record keyed by `id`; returns whether one was present.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store is unreachable or the write fails.
    fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Remove every record. Clearing an empty store is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store is unreachable or the write fails.
    fn clear(&self) -> Result<(), StoreError>;

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the store is unreachable.
    fn count(&self) -> Result<usize, StoreError>;
}
