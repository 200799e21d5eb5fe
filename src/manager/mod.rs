//! Knowledge manager: owns named backends, routes operations by name, and
//! merges fan-out search results.
//!
//! The manager is explicit state scoped to one instance, not a process-wide
//! singleton. Construct it, register knowledge bases, and pass it to callers.

use std::collections::HashMap;
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;

use crate::backend::{Backend, BackendError, KnowledgeBackend, Stats, VectorBackend};
use crate::config::{BackendKind, KnowledgeBaseConfig, UnsupportedBackend};
use crate::item::{ItemUpdate, KnowledgeItem, SearchFilter, SearchResult};
use crate::store::{StoreError, VectorStore, memory::MemoryVectorStore};

/// Errors surfaced by manager-level registration and routing.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("unknown knowledge base: {0}")]
    UnknownKnowledgeBase(String),

    #[error("knowledge base already registered: {0}")]
    DuplicateName(String),

    #[error(transparent)]
    UnsupportedBackend(#[from] UnsupportedBackend),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

struct KbEntry {
    backend: Arc<Backend>,
    config: KnowledgeBaseConfig,
}

/// Per-knowledge-base slice of [`ManagerSummary`].
#[derive(Debug, Serialize)]
pub struct KnowledgeBaseSummary {
    pub name: String,
    pub backend_type: String,
    pub description: String,
    pub enabled: bool,
    /// Latest stats snapshot, or an `{"error": ...}` marker when the backend
    /// was unreachable.
    pub stats: Stats,
}

/// Snapshot of every registered knowledge base, in registration order.
#[derive(Debug, Serialize)]
pub struct ManagerSummary {
    pub total_knowledge_bases: usize,
    pub knowledge_bases: Vec<KnowledgeBaseSummary>,
}

/// Coordinates multiple independently-configured knowledge bases.
#[derive(Default)]
pub struct KnowledgeManager {
    entries: HashMap<String, KbEntry>,
    /// Registration order, for deterministic summary iteration.
    order: Vec<String>,
    search_timeout: Option<Duration>,
}

impl KnowledgeManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound each backend call inside [`Self::search_all`] by `timeout`; a
    /// query exceeding it counts as a per-backend failure.
    #[must_use]
    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = Some(timeout);
        self
    }

    /// Register a backend built from `config`, keyed by `name`.
    ///
    /// The built-in dispatch constructs the bundled in-memory vector store;
    /// hosts with a remote store use [`Self::add_knowledge_base_with_store`].
    /// Disabled configs are registered too; only fan-out search skips them.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if `name` is taken, `UnsupportedBackend` if
    /// `config.backend_type` is not a known kind.
    pub fn add_knowledge_base(
        &mut self,
        name: &str,
        config: KnowledgeBaseConfig,
    ) -> Result<(), ManagerError> {
        let kind: BackendKind = config.backend_type.parse()?;

        let backend = match kind {
            BackendKind::Vector => {
                let collection = config.connection_str("collection").unwrap_or(name);
                Backend::Vector(VectorBackend::new(
                    Box::new(MemoryVectorStore::new()),
                    collection,
                ))
            }
        };

        self.register(name, config, backend)
    }

    /// Register a backend over a host-provided vector store collaborator.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateName` if `name` is taken, `UnsupportedBackend` if
    /// `config.backend_type` is not a known kind.
    pub fn add_knowledge_base_with_store(
        &mut self,
        name: &str,
        config: KnowledgeBaseConfig,
        store: Box<dyn VectorStore>,
    ) -> Result<(), ManagerError> {
        let kind: BackendKind = config.backend_type.parse()?;

        let backend = match kind {
            BackendKind::Vector => {
                let collection = config.connection_str("collection").unwrap_or(name);
                Backend::Vector(VectorBackend::new(store, collection))
            }
        };

        self.register(name, config, backend)
    }

    fn register(
        &mut self,
        name: &str,
        config: KnowledgeBaseConfig,
        backend: Backend,
    ) -> Result<(), ManagerError> {
        if self.entries.contains_key(name) {
            return Err(ManagerError::DuplicateName(name.to_string()));
        }

        self.entries.insert(
            name.to_string(),
            KbEntry {
                backend: Arc::new(backend),
                config,
            },
        );
        self.order.push(name.to_string());
        tracing::info!(kb = name, "knowledge base registered");
        Ok(())
    }

    /// Unregister a knowledge base; returns whether one was present.
    pub fn remove_knowledge_base(&mut self, name: &str) -> bool {
        let removed = self.entries.remove(name).is_some();
        if removed {
            self.order.retain(|n| n != name);
            tracing::info!(kb = name, "knowledge base removed");
        }
        removed
    }

    /// Registered names in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Config of a registered knowledge base.
    #[must_use]
    pub fn config(&self, name: &str) -> Option<&KnowledgeBaseConfig> {
        self.entries.get(name).map(|e| &e.config)
    }

    fn backend(&self, name: &str) -> Result<&Arc<Backend>, ManagerError> {
        self.entries
            .get(name)
            .map(|e| &e.backend)
            .ok_or_else(|| ManagerError::UnknownKnowledgeBase(name.to_string()))
    }

    /// Add or upsert an item in the named knowledge base.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKnowledgeBase` for unregistered names; backend errors
    /// propagate.
    pub fn add_item(&self, name: &str, item: KnowledgeItem) -> Result<bool, ManagerError> {
        Ok(self.backend(name)?.add_item(item)?)
    }

    /// Exact lookup by id in the named knowledge base.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKnowledgeBase` for unregistered names; backend errors
    /// propagate.
    pub fn get_item(&self, name: &str, id: &str) -> Result<Option<KnowledgeItem>, ManagerError> {
        Ok(self.backend(name)?.get_item(id)?)
    }

    /// Apply a partial update to an existing item.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKnowledgeBase` for unregistered names; `NotFound`
    /// propagates for unknown ids.
    pub fn update_item(
        &self,
        name: &str,
        id: &str,
        update: ItemUpdate,
    ) -> Result<bool, ManagerError> {
        Ok(self.backend(name)?.update_item(id, update)?)
    }

    /// Delete an item; `Ok(false)` when the id was absent.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKnowledgeBase` for unregistered names; backend errors
    /// propagate.
    pub fn delete_item(&self, name: &str, id: &str) -> Result<bool, ManagerError> {
        Ok(self.backend(name)?.delete_item(id)?)
    }

    /// List items of the named knowledge base, optionally filtered.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKnowledgeBase` for unregistered names; backend errors
    /// propagate.
    pub fn list_items(
        &self,
        name: &str,
        category: Option<&str>,
        tags: Option<&[String]>,
    ) -> Result<Vec<KnowledgeItem>, ManagerError> {
        Ok(self.backend(name)?.list_items(category, tags)?)
    }

    /// Search one knowledge base.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKnowledgeBase` for unregistered names; backend errors
    /// propagate.
    pub fn search(
        &self,
        name: &str,
        query: &str,
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchResult>, ManagerError> {
        Ok(self.backend(name)?.search(query, top_k, filter)?)
    }

    /// Stats snapshot of the named knowledge base.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKnowledgeBase` for unregistered names; backend errors
    /// propagate.
    pub fn get_stats(&self, name: &str) -> Result<Stats, ManagerError> {
        Ok(self.backend(name)?.get_stats()?)
    }

    /// Remove all items from the named knowledge base.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKnowledgeBase` for unregistered names; backend errors
    /// propagate.
    pub fn clear(&self, name: &str) -> Result<(), ManagerError> {
        Ok(self.backend(name)?.clear()?)
    }

    /// Fan-out search across knowledge bases with merged results.
    ///
    /// Every enabled backend (or the subset in `kb_names`, which overrides the
    /// enabled flag but must be fully registered) is asked for `top_k` results;
    /// all results are concatenated, re-sorted by descending score, and
    /// truncated to `top_k`. Per-backend scores are not calibrated to a common
    /// scale, so the merge is a best-effort approximation of a global top-k,
    /// not a guarantee.
    ///
    /// A failing or timed-out backend is logged and omitted; if every backend
    /// fails the result is an empty vec, not an error.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `top_k` is zero, `UnknownKnowledgeBase` if any
    /// entry of `kb_names` is unregistered.
    pub fn search_all(
        &self,
        query: &str,
        top_k: usize,
        kb_names: Option<&[String]>,
    ) -> Result<Vec<SearchResult>, ManagerError> {
        if top_k == 0 {
            return Err(ManagerError::Backend(BackendError::Validation(
                "top_k must be greater than zero".to_string(),
            )));
        }

        let targets: Vec<&str> = match kb_names {
            Some(names) => {
                // Dedupe so a repeated name does not query its backend twice
                // and double-count results in the merge.
                let mut targets = Vec::new();
                for name in names {
                    if !self.entries.contains_key(name) {
                        return Err(ManagerError::UnknownKnowledgeBase(name.clone()));
                    }
                    if !targets.contains(&name.as_str()) {
                        targets.push(name.as_str());
                    }
                }
                targets
            }
            None => self
                .order
                .iter()
                .filter(|name| self.entries.get(*name).is_some_and(|e| e.config.enabled))
                .map(String::as_str)
                .collect(),
        };

        let mut merged = Vec::new();
        for name in targets {
            let Some(entry) = self.entries.get(name) else {
                continue;
            };
            match self.query_backend(&entry.backend, query, top_k) {
                Ok(results) => merged.extend(results),
                Err(err) => {
                    tracing::warn!(kb = name, error = %err, "skipping backend in fan-out search");
                }
            }
        }

        merged.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        merged.truncate(top_k);
        Ok(merged)
    }

    /// Query one backend, bounded by the configured timeout when set.
    ///
    /// The timed variant runs the query on a worker thread; on timeout the
    /// straggler keeps running detached and its late result is discarded.
    fn query_backend(
        &self,
        backend: &Arc<Backend>,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>, BackendError> {
        let Some(timeout) = self.search_timeout else {
            return backend.search(query, top_k, None);
        };

        let (tx, rx) = mpsc::channel();
        let backend = Arc::clone(backend);
        let query = query.to_string();
        thread::spawn(move || {
            let _ = tx.send(backend.search(&query, top_k, None));
        });

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(_) => Err(BackendError::Unavailable(StoreError::Unavailable(format!(
                "query timed out after {}ms",
                timeout.as_millis()
            )))),
        }
    }

    /// Enabled flags and stats snapshots for every registered knowledge base.
    ///
    /// Never fails: a backend whose stats call errors gets an error marker in
    /// place of its stats.
    #[must_use]
    pub fn get_summary(&self) -> ManagerSummary {
        let knowledge_bases = self
            .order
            .iter()
            .filter_map(|name| self.entries.get(name).map(|entry| (name, entry)))
            .map(|(name, entry)| {
                let stats = match entry.backend.get_stats() {
                    Ok(stats) => stats,
                    Err(err) => {
                        tracing::warn!(kb = %name, error = %err, "stats unavailable for summary");
                        let mut marker = Stats::new();
                        marker.insert("error".to_string(), json!(err.to_string()));
                        marker
                    }
                };
                KnowledgeBaseSummary {
                    name: name.clone(),
                    backend_type: entry.config.backend_type.clone(),
                    description: entry.config.description.clone(),
                    enabled: entry.config.enabled,
                    stats,
                }
            })
            .collect::<Vec<_>>();

        ManagerSummary {
            total_knowledge_bases: knowledge_bases.len(),
            knowledge_bases,
        }
    }
}
