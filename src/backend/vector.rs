//! Vector-store-backed knowledge backend.
//!
//! Adapter translating the [`KnowledgeBackend`] contract onto a
//! [`VectorStore`] collaborator: item fields are flattened into the store's
//! field map on write and reconstructed on read. Embedding derivation,
//! persistence and similarity ranking all belong to the store.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::backend::{BackendError, KnowledgeBackend, Stats};
use crate::item::{ItemUpdate, KnowledgeItem, Metadata, SearchFilter, SearchResult};
use crate::store::{FieldMatch, VectorRecord, VectorStore};

/// Field names the adapter owns inside the store's field map. Caller metadata
/// may not use them, otherwise the metadata round-trip guarantee would break.
const RESERVED_FIELDS: [&str; 4] = ["title", "category", "tags", "created_at"];

/// Knowledge backend bound to one collection of a vector store.
///
/// Duplicate-id policy: `add_item` is an idempotent upsert. Re-adding an id
/// replaces the stored copy, preserves the first `created_at`, and leaves
/// `total_items` unchanged.
pub struct VectorBackend {
    store: Box<dyn VectorStore>,
    collection: String,
}

impl VectorBackend {
    #[must_use]
    pub fn new(store: Box<dyn VectorStore>, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }

    fn validate_metadata(metadata: &Metadata) -> Result<(), BackendError> {
        for key in RESERVED_FIELDS {
            if metadata.contains_key(key) {
                return Err(BackendError::Validation(format!(
                    "metadata key '{key}' is reserved"
                )));
            }
        }
        Ok(())
    }

    fn flatten(item: &KnowledgeItem) -> VectorRecord {
        let mut fields = Metadata::new();

        if let Some(title) = &item.title {
            fields.insert("title".to_string(), json!(title));
        }
        if let Some(category) = &item.category {
            fields.insert("category".to_string(), json!(category));
        }
        fields.insert("tags".to_string(), json!(item.tags));
        if let Some(created_at) = item.created_at {
            fields.insert("created_at".to_string(), json!(created_at.to_rfc3339()));
        }
        for (key, value) in &item.metadata {
            fields.insert(key.clone(), value.clone());
        }

        VectorRecord {
            id: item.id.clone(),
            content: item.content.clone(),
            embedding: item.embedding.clone(),
            fields,
        }
    }

    fn unflatten(record: &VectorRecord) -> KnowledgeItem {
        let title = record
            .fields
            .get("title")
            .and_then(serde_json::Value::as_str)
            .map(String::from);
        let category = record
            .fields
            .get("category")
            .and_then(serde_json::Value::as_str)
            .map(String::from);
        let tags = record
            .fields
            .get("tags")
            .and_then(serde_json::Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(serde_json::Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        let created_at = record
            .fields
            .get("created_at")
            .and_then(serde_json::Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let metadata: Metadata = record
            .fields
            .iter()
            .filter(|(key, _)| !RESERVED_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        KnowledgeItem {
            id: record.id.clone(),
            content: record.content.clone(),
            title,
            category,
            tags,
            metadata,
            created_at,
            // Stores keep embeddings internal; reads do not expose them.
            embedding: None,
        }
    }

    fn to_field_filter(filter: Option<&SearchFilter>) -> Vec<(String, FieldMatch)> {
        let mut conditions = Vec::new();

        if let Some(filter) = filter {
            if let Some(category) = &filter.category {
                conditions.push(("category".to_string(), FieldMatch::Equals(json!(category))));
            }
            for tag in &filter.tags {
                conditions.push(("tags".to_string(), FieldMatch::Contains(json!(tag))));
            }
            for (key, value) in &filter.metadata {
                conditions.push((key.clone(), FieldMatch::Equals(value.clone())));
            }
        }

        conditions
    }
}

impl KnowledgeBackend for VectorBackend {
    fn add_item(&self, mut item: KnowledgeItem) -> Result<bool, BackendError> {
        if item.id.trim().is_empty() {
            return Err(BackendError::Validation("item id cannot be empty".to_string()));
        }
        if item.content.trim().is_empty() {
            return Err(BackendError::Validation(
                "item content cannot be empty".to_string(),
            ));
        }
        Self::validate_metadata(&item.metadata)?;

        // First insertion wins for created_at; upserts never touch it.
        if let Some(existing) = self.store.fetch(&item.id)? {
            item.created_at = Self::unflatten(&existing).created_at.or(item.created_at);
        }
        if item.created_at.is_none() {
            item.created_at = Some(Utc::now());
        }

        self.store.upsert(Self::flatten(&item))?;
        tracing::debug!(id = %item.id, collection = %self.collection, "item upserted");
        Ok(true)
    }

    fn get_item(&self, id: &str) -> Result<Option<KnowledgeItem>, BackendError> {
        let record = self.store.fetch(id)?;
        Ok(record.as_ref().map(Self::unflatten))
    }

    fn update_item(&self, id: &str, update: ItemUpdate) -> Result<bool, BackendError> {
        let Some(existing_record) = self.store.fetch(id)? else {
            return Err(BackendError::NotFound(id.to_string()));
        };
        let mut item = Self::unflatten(&existing_record);

        let content_changed = update
            .content
            .as_ref()
            .is_some_and(|content| *content != item.content);

        if let Some(content) = update.content {
            item.content = content;
        }
        if item.content.trim().is_empty() {
            return Err(BackendError::Validation(
                "item content cannot be empty".to_string(),
            ));
        }
        if let Some(title) = update.title {
            item.title = Some(title);
        }
        if let Some(category) = update.category {
            item.category = Some(category);
        }
        if let Some(tags) = update.tags {
            item.tags = tags;
        }
        if let Some(metadata) = update.metadata {
            Self::validate_metadata(&metadata)?;
            item.metadata.extend(metadata);
        }

        // Re-derive the embedding only when content changed; otherwise the
        // stored vector is still valid and re-embedding would be wasted work.
        item.embedding = match update.embedding {
            Some(embedding) => Some(embedding),
            None if content_changed => None,
            None => existing_record.embedding.clone(),
        };

        self.store.upsert(Self::flatten(&item))?;
        Ok(true)
    }

    fn delete_item(&self, id: &str) -> Result<bool, BackendError> {
        Ok(self.store.delete(id)?)
    }

    fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>, BackendError> {
        if top_k == 0 {
            return Err(BackendError::Validation(
                "top_k must be greater than zero".to_string(),
            ));
        }

        let conditions = Self::to_field_filter(filter);
        let matches = self.store.query(query, top_k, &conditions)?;

        Ok(matches
            .iter()
            .map(|(record, score)| SearchResult {
                item: Self::unflatten(record),
                score: *score,
            })
            .collect())
    }

    fn list_items(
        &self,
        category: Option<&str>,
        tags: Option<&[String]>,
    ) -> Result<Vec<KnowledgeItem>, BackendError> {
        let mut conditions = Vec::new();
        if let Some(category) = category {
            conditions.push(("category".to_string(), FieldMatch::Equals(json!(category))));
        }
        if let Some(tags) = tags {
            for tag in tags {
                conditions.push(("tags".to_string(), FieldMatch::Contains(json!(tag))));
            }
        }

        let records = self.store.scan(&conditions)?;
        Ok(records.iter().map(Self::unflatten).collect())
    }

    fn get_stats(&self) -> Result<Stats, BackendError> {
        let total = self.store.count()?;
        let records = self.store.scan(&[])?;

        let mut categories = BTreeSet::new();
        let mut tags = BTreeSet::new();
        for record in &records {
            let item = Self::unflatten(record);
            if let Some(category) = item.category {
                categories.insert(category);
            }
            tags.extend(item.tags);
        }

        let mut stats = Stats::new();
        stats.insert("total_items".to_string(), json!(total));
        stats.insert("categories".to_string(), json!(categories));
        stats.insert("tags".to_string(), json!(tags));
        stats.insert("collection".to_string(), json!(self.collection));
        Ok(stats)
    }

    fn clear(&self) -> Result<(), BackendError> {
        Ok(self.store.clear()?)
    }
}
