//! Knowledge item data model and search types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Open-ended mapping of string keys to scalar values.
///
/// Opaque to the core: backends must round-trip it unchanged.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// One unit of knowledge.
///
/// The `id` is caller-supplied and stable across updates. `created_at` is set
/// by the backend at first insertion and never mutated thereafter. When
/// `embedding` is absent the backend derives one from `content` at insertion
/// time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    /// Unique identifier within one backend's collection.
    pub id: String,
    /// The indexable text body. Required, non-empty.
    pub content: String,
    /// Optional free-text title, not interpreted by the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Optional free-text category, used only for exact-match filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Tags used only for exact-match filtering.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Caller metadata, opaque to the core.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
    /// Set at first insertion; never mutated by updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Optional precomputed embedding vector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl KnowledgeItem {
    /// Create an item with just an id and content.
    #[must_use]
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            title: None,
            category: None,
            tags: Vec::new(),
            metadata: Metadata::new(),
            created_at: None,
            embedding: None,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Partial update applied to an existing item.
///
/// Fields left as `None` are untouched. `metadata` entries merge key-wise into
/// the existing metadata; `tags` replace the existing set wholesale.
#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    pub content: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<Metadata>,
    pub embedding: Option<Vec<f32>>,
}

impl ItemUpdate {
    #[must_use]
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// A knowledge item paired with its relevance score.
///
/// Scores are backend-defined: higher means more relevant, and values are only
/// comparable within one backend's result set.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub item: KnowledgeItem,
    pub score: f32,
}

/// Restricts search candidates before ranking.
///
/// Every given field must match: `category` by equality, each tag by exact
/// membership, each metadata entry by equality (AND semantics).
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub metadata: Metadata,
}
