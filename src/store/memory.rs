//! In-memory vector store with a hashed bag-of-words embedding.
//!
//! Embeddings are derived by hashing lowercased tokens into a fixed number of
//! buckets and L2-normalizing the counts; similarity is the cosine between the
//! query and record vectors. Deterministic within one process, no I/O, no
//! external model. Records live behind an `RwLock` so mutations to the same id
//! are serialized (last writer wins).

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;

use crate::store::{FieldFilter, StoreError, VectorRecord, VectorStore, record_matches};

/// Dimensionality of derived embeddings.
const EMBEDDING_DIM: usize = 256;

/// In-process vector store backing the bundled `vector` backend.
#[derive(Default)]
pub struct MemoryVectorStore {
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl MemoryVectorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_poisoned() -> StoreError {
        StoreError::Unavailable("store lock poisoned".to_string())
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

/// Hash tokens into buckets and L2-normalize the counts.
fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0_f32; EMBEDDING_DIM];

    for token in tokenize(text) {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let bucket = usize::try_from(hasher.finish() % EMBEDDING_DIM as u64).unwrap_or(0);
        vector[bucket] += 1.0;
    }

    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }

    vector
}

/// Cosine similarity of two normalized vectors.
///
/// Mismatched dimensions score 0.0: the core does not assume callers use the
/// bundled embedding scheme, so a foreign vector simply never matches.
fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl VectorStore for MemoryVectorStore {
    fn upsert(&self, mut record: VectorRecord) -> Result<(), StoreError> {
        if record.embedding.is_none() {
            record.embedding = Some(embed(&record.content));
        }

        let mut records = self.records.write().map_err(|_| Self::lock_poisoned())?;
        records.insert(record.id.clone(), record);
        Ok(())
    }

    fn fetch(&self, id: &str) -> Result<Option<VectorRecord>, StoreError> {
        let records = self.records.read().map_err(|_| Self::lock_poisoned())?;
        Ok(records.get(id).cloned())
    }

    fn query(
        &self,
        text: &str,
        top_k: usize,
        filter: &FieldFilter,
    ) -> Result<Vec<(VectorRecord, f32)>, StoreError> {
        let records = self.records.read().map_err(|_| Self::lock_poisoned())?;
        let query_vector = embed(text);

        let mut scored: Vec<(VectorRecord, f32)> = records
            .values()
            .filter(|r| record_matches(&r.fields, filter))
            .filter_map(|r| {
                let score = r
                    .embedding
                    .as_deref()
                    .map_or(0.0, |e| cosine(&query_vector, e));
                // Zero similarity means no shared vocabulary; not a match.
                (score > 0.0).then(|| (r.clone(), score))
            })
            .collect();

        // Descending score, id as tie-breaker for deterministic output.
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });
        scored.truncate(top_k);

        Ok(scored)
    }

    fn scan(&self, filter: &FieldFilter) -> Result<Vec<VectorRecord>, StoreError> {
        let records = self.records.read().map_err(|_| Self::lock_poisoned())?;

        let mut matched: Vec<VectorRecord> = records
            .values()
            .filter(|r| record_matches(&r.fields, filter))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(matched)
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut records = self.records.write().map_err(|_| Self::lock_poisoned())?;
        Ok(records.remove(id).is_some())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| Self::lock_poisoned())?;
        records.clear();
        Ok(())
    }

    fn count(&self) -> Result<usize, StoreError> {
        let records = self.records.read().map_err(|_| Self::lock_poisoned())?;
        Ok(records.len())
    }
}
