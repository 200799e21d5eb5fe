//! Command implementations shared by CLI callers.
//!
//! Each command loads the config, builds a [`KnowledgeManager`] from it, and
//! runs one operation. The bundled in-memory store holds nothing across
//! processes, so knowledge bases that want durable CLI state point
//! `connection_info.seed` at a JSON file of items; `add` and `delete` rewrite
//! it after mutating.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;

use crate::config::{Config, expand_tilde};
use crate::item::{KnowledgeItem, SearchFilter, SearchResult};
use crate::manager::{KnowledgeManager, ManagerSummary};

/// Parse comma-separated tags into a vector.
///
/// Splits the input on commas, trims whitespace, and filters out empty
/// strings.
#[must_use]
pub fn parse_tags(tags: Option<String>) -> Vec<String> {
    tags.map(|t| {
        t.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

/// Build a manager with every configured knowledge base registered and its
/// seed items loaded.
///
/// # Errors
///
/// Returns an error if registration fails or a seed file cannot be read,
/// parsed, or loaded into its backend.
pub fn build_manager(config: &Config) -> anyhow::Result<KnowledgeManager> {
    let mut manager = KnowledgeManager::new();
    if let Some(ms) = config.search.timeout_ms {
        manager = manager.with_search_timeout(Duration::from_millis(ms));
    }

    for kb in &config.knowledge_bases {
        manager
            .add_knowledge_base(&kb.name, kb.clone())
            .with_context(|| format!("register knowledge base '{}'", kb.name))?;

        if let Some(seed) = kb.connection_str("seed") {
            let path = expand_tilde(seed);
            let items = load_seed(&path)
                .with_context(|| format!("load seed for knowledge base '{}'", kb.name))?;
            for item in items {
                manager
                    .add_item(&kb.name, item)
                    .with_context(|| format!("seed knowledge base '{}'", kb.name))?;
            }
        }
    }

    Ok(manager)
}

/// Read a seed file: a JSON array of items. A missing file is an empty seed.
fn load_seed(path: &Path) -> anyhow::Result<Vec<KnowledgeItem>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("read seed file {}", path.display()))?;
    let items: Vec<KnowledgeItem> = serde_json::from_str(&contents)
        .with_context(|| format!("parse seed file {}", path.display()))?;
    Ok(items)
}

fn write_seed(path: &Path, items: &[KnowledgeItem]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create dir {}", parent.display()))?;
    }

    let contents = serde_json::to_string_pretty(items)?;
    fs::write(path, contents).with_context(|| format!("write seed file {}", path.display()))
}

/// Persist the current items of `kb` back to its seed file, when one is
/// configured.
fn persist_seed(manager: &KnowledgeManager, kb: &str) -> anyhow::Result<()> {
    let Some(seed) = manager.config(kb).and_then(|c| c.connection_str("seed")) else {
        anyhow::bail!("knowledge base '{kb}' has no seed file; CLI changes would not persist");
    };

    let path = expand_tilde(seed);
    let previous = load_seed(&path)?;
    let mut items = manager.list_items(kb, None, None)?;
    restore_embeddings(&mut items, &previous);
    write_seed(&path, &items)
}

/// Backend reads keep embeddings store-internal, so a straight rewrite would
/// drop any embedding the seed file authored. Carry those forward for items
/// that survive.
fn restore_embeddings(items: &mut [KnowledgeItem], previous: &[KnowledgeItem]) {
    for item in items {
        if item.embedding.is_none() {
            item.embedding = previous
                .iter()
                .find(|p| p.id == item.id)
                .and_then(|p| p.embedding.clone());
        }
    }
}

/// Search one knowledge base, or fan out across all enabled ones.
///
/// # Errors
///
/// Returns an error if config loading fails, `kb` is unregistered, the query
/// arguments are invalid, or filters are given without naming a knowledge
/// base (fan-out search does not support them).
pub fn search(
    query: &str,
    top_k: Option<usize>,
    kb: Option<&str>,
    category: Option<String>,
    tags: Vec<String>,
) -> anyhow::Result<Vec<SearchResult>> {
    if kb.is_none() && (category.is_some() || !tags.is_empty()) {
        anyhow::bail!("category and tag filters require a single knowledge base");
    }

    let config = Config::load()?;
    let manager = build_manager(&config)?;
    let top_k = top_k.unwrap_or(config.search.default_top_k);

    if let Some(kb) = kb {
        let filter = SearchFilter {
            category,
            tags,
            ..SearchFilter::default()
        };
        Ok(manager.search(kb, query, top_k, Some(&filter))?)
    } else {
        Ok(manager.search_all(query, top_k, None)?)
    }
}

/// List items in one knowledge base.
///
/// # Errors
///
/// Returns an error if config loading fails or `kb` is unregistered.
pub fn list(
    kb: &str,
    category: Option<&str>,
    tags: &[String],
) -> anyhow::Result<Vec<KnowledgeItem>> {
    let config = Config::load()?;
    let manager = build_manager(&config)?;

    let tags = if tags.is_empty() { None } else { Some(tags) };
    Ok(manager.list_items(kb, category, tags)?)
}

/// Add an item to one knowledge base and persist it to the seed file.
///
/// # Errors
///
/// Returns an error if validation fails, `kb` is unregistered, or the
/// knowledge base has no seed file to persist to.
pub fn add(kb: &str, item: KnowledgeItem) -> anyhow::Result<()> {
    let config = Config::load()?;
    let manager = build_manager(&config)?;

    manager.add_item(kb, item)?;
    persist_seed(&manager, kb)
}

/// Fetch one item by id.
///
/// # Errors
///
/// Returns an error if `kb` is unregistered or the id does not exist.
pub fn get(kb: &str, id: &str) -> anyhow::Result<KnowledgeItem> {
    let config = Config::load()?;
    let manager = build_manager(&config)?;

    manager
        .get_item(kb, id)?
        .ok_or_else(|| anyhow::anyhow!("Item not found: {id}"))
}

/// Delete one item by id; returns whether anything was removed. Persists the
/// seed only when something changed.
///
/// # Errors
///
/// Returns an error if `kb` is unregistered or the seed cannot be rewritten.
pub fn delete(kb: &str, id: &str) -> anyhow::Result<bool> {
    let config = Config::load()?;
    let manager = build_manager(&config)?;

    let removed = manager.delete_item(kb, id)?;
    if removed {
        persist_seed(&manager, kb)?;
    }
    Ok(removed)
}

/// Summary of every registered knowledge base.
///
/// # Errors
///
/// Returns an error if config loading or manager construction fails.
pub fn summary() -> anyhow::Result<ManagerSummary> {
    let config = Config::load()?;
    let manager = build_manager(&config)?;
    Ok(manager.get_summary())
}
