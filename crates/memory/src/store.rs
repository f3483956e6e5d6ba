//! Per-department context store: interaction records plus their vectors.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use erpmind_common::Department;

use crate::embedding::EmbeddingClient;
use crate::index::{IndexError, VectorIndex};
use crate::types::{
    truncate_chars, ContextConfig, InteractionRecord, RetrievedContext, StoreStats,
    EMBED_QUERY_CHARS, EMBED_RESPONSE_CHARS, MAX_EMBEDDING_CHARS, MAX_QUERY_CHARS,
    MAX_RESPONSE_CHARS, MIN_RESPONSE_CHARS,
};

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("record file is malformed: {0}")]
    Records(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored index has dimension {found}, store is configured for {expected}")]
    DimensionMismatch { expected: usize, found: usize },
}

/// What [`ContextStore::load`] found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// No usable snapshot; the store is unchanged.
    NotFound,
    /// Index and records were restored as saved.
    Loaded { entries: usize },
    /// Records were restored and the index re-embedded from them.
    Rebuilt { entries: usize },
}

/// Index blob path for a snapshot base path.
pub fn index_path(base: &Path) -> PathBuf {
    with_suffix(base, ".index")
}

/// Record list path for a snapshot base path.
pub fn records_path(base: &Path) -> PathBuf {
    with_suffix(base, ".json")
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut s: OsString = base.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// Records and vectors for interactions, searchable by similarity.
///
/// Row `i` of the index always belongs to `records[i]`. Every append goes
/// through [`ContextStore::store`], which adds exactly one vector (real or
/// zero placeholder) per record.
pub struct ContextStore {
    config: ContextConfig,
    embedder: Arc<dyn EmbeddingClient>,
    index: VectorIndex,
    records: Vec<InteractionRecord>,
    last_timestamp: u64,
}

impl ContextStore {
    pub fn new(config: ContextConfig, embedder: Arc<dyn EmbeddingClient>) -> Self {
        debug!(
            dimension = config.dimension,
            index = ?config.index,
            "Creating context store"
        );
        Self {
            index: VectorIndex::new(config.index, config.dimension),
            config,
            embedder,
            records: Vec::new(),
            last_timestamp: 0,
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[InteractionRecord] {
        &self.records
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            entries: self.records.len(),
            vectors: self.index.len(),
            dimensions: self.index.dim(),
        }
    }

    /// Remember an interaction. Returns the new record id, or `None` when the
    /// response is too short to be worth keeping.
    pub async fn store(
        &mut self,
        query: &str,
        response: &str,
        department: Department,
    ) -> Option<String> {
        if response.trim().chars().count() < MIN_RESPONSE_CHARS {
            debug!(department = %department, "Skipping short response");
            return None;
        }

        let combined = format!(
            "Q: {}\nA: {}",
            truncate_chars(query, EMBED_QUERY_CHARS),
            truncate_chars(response, EMBED_RESPONSE_CHARS)
        );
        let embedding_text = truncate_chars(&combined, MAX_EMBEDDING_CHARS).to_string();

        let (vector, embedding_succeeded) = self.embed_or_placeholder(&embedding_text, department).await;
        if let Err(e) = self.index.add(&vector) {
            // Neither side was appended, so rows stay aligned.
            warn!(department = %department, error = %e, "Index rejected vector");
            return None;
        }

        let record = InteractionRecord {
            id: Uuid::new_v4().to_string(),
            query: truncate_chars(query, MAX_QUERY_CHARS).to_string(),
            response: truncate_chars(response, MAX_RESPONSE_CHARS).to_string(),
            department,
            timestamp: self.next_timestamp(),
            embedding_text,
            embedding_succeeded,
        };
        let id = record.id.clone();
        self.records.push(record);

        debug!(
            department = %department,
            id = %id,
            embedded = embedding_succeeded,
            entries = self.records.len(),
            "Stored interaction"
        );
        Some(id)
    }

    /// Up to `k` records of `department` closest to `query`, closest first.
    ///
    /// Failures are logged and yield an empty result.
    pub async fn retrieve(
        &self,
        query: &str,
        department: Department,
        k: usize,
    ) -> Vec<RetrievedContext> {
        if k == 0 || self.records.is_empty() || self.index.is_empty() {
            return Vec::new();
        }

        let text = truncate_chars(query, MAX_EMBEDDING_CHARS);
        let vector = match self.embedder.embed(text).await {
            Ok(v) if v.len() == self.index.dim() => v,
            Ok(v) => {
                warn!(
                    department = %department,
                    expected = self.index.dim(),
                    actual = v.len(),
                    "Query embedding has wrong dimension, skipping retrieval"
                );
                return Vec::new();
            }
            Err(e) => {
                warn!(department = %department, error = %e, "Query embedding failed, skipping retrieval");
                return Vec::new();
            }
        };

        // The index is shared by every department, so over-fetch before filtering.
        let fetch = (2 * k).min(self.index.len());
        let hits = match self.index.search(&vector, fetch) {
            Ok(hits) => hits,
            Err(e) => {
                warn!(department = %department, error = %e, "Index search failed");
                return Vec::new();
            }
        };

        let mut results: Vec<RetrievedContext> = hits
            .into_iter()
            .filter_map(|(row, distance)| {
                let record = self.records.get(row)?;
                (record.department == department).then(|| RetrievedContext {
                    record: record.clone(),
                    distance,
                })
            })
            .collect();
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(k);

        debug!(
            department = %department,
            requested = k,
            returned = results.len(),
            "Retrieved context"
        );
        results
    }

    /// Drop every record and empty the index.
    pub fn clear(&mut self) {
        info!(entries = self.records.len(), "Clearing context store");
        self.records.clear();
        self.index.reset();
    }

    /// Write `<base>.index` and `<base>.json`.
    pub async fn save(&self, base: &Path) -> Result<(), MemoryError> {
        if let Some(parent) = base.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(index_path(base), self.index.to_bytes()?).await?;
        tokio::fs::write(records_path(base), serde_json::to_vec_pretty(&self.records)?).await?;

        info!(
            path = %base.display(),
            entries = self.records.len(),
            "Saved context snapshot"
        );
        Ok(())
    }

    /// Restore from `<base>.index` and `<base>.json`.
    ///
    /// Missing files are not an error. On any error the store keeps the state
    /// it had before the call.
    pub async fn load(&mut self, base: &Path) -> Result<LoadOutcome, MemoryError> {
        let records: Option<Vec<InteractionRecord>> = match read_optional(&records_path(base)).await? {
            Some(bytes) => Some(serde_json::from_slice(&bytes)?),
            None => None,
        };
        let index = match read_optional(&index_path(base)).await? {
            Some(bytes) => Some(VectorIndex::from_bytes(&bytes)?),
            None => None,
        };

        if let Some(index) = &index {
            if index.dim() != self.config.dimension {
                return Err(MemoryError::DimensionMismatch {
                    expected: self.config.dimension,
                    found: index.dim(),
                });
            }
        }

        let Some(records) = records else {
            if index.is_some() {
                warn!(
                    path = %base.display(),
                    "Index snapshot has no record file, ignoring it"
                );
            } else {
                debug!(path = %base.display(), "No context snapshot found");
            }
            return Ok(LoadOutcome::NotFound);
        };

        let outcome = match index {
            Some(index) if index.len() == records.len() => {
                let entries = records.len();
                self.commit(index, records);
                LoadOutcome::Loaded { entries }
            }
            index => {
                if let Some(index) = &index {
                    warn!(
                        path = %base.display(),
                        vectors = index.len(),
                        records = records.len(),
                        "Index snapshot disagrees with records, rebuilding"
                    );
                }
                let kind = index.map(|i| i.kind()).unwrap_or(self.config.index);
                let (index, records) = self.rebuild(VectorIndex::new(kind, self.config.dimension), records).await?;
                let entries = records.len();
                self.commit(index, records);
                LoadOutcome::Rebuilt { entries }
            }
        };

        info!(path = %base.display(), outcome = ?outcome, "Loaded context snapshot");
        Ok(outcome)
    }

    async fn rebuild(
        &self,
        mut index: VectorIndex,
        mut records: Vec<InteractionRecord>,
    ) -> Result<(VectorIndex, Vec<InteractionRecord>), MemoryError> {
        for record in &mut records {
            let (vector, ok) = self
                .embed_or_placeholder(&record.embedding_text, record.department)
                .await;
            index.add(&vector)?;
            record.embedding_succeeded = ok;
        }
        Ok((index, records))
    }

    fn commit(&mut self, index: VectorIndex, records: Vec<InteractionRecord>) {
        let newest = records.iter().map(|r| r.timestamp).max().unwrap_or(0);
        self.last_timestamp = self.last_timestamp.max(newest);
        self.index = index;
        self.records = records;
    }

    async fn embed_or_placeholder(&self, text: &str, department: Department) -> (Vec<f32>, bool) {
        let dim = self.index.dim();
        match self.embedder.embed(text).await {
            Ok(v) if v.len() == dim => (v, true),
            Ok(v) => {
                warn!(
                    department = %department,
                    expected = dim,
                    actual = v.len(),
                    "Embedding has wrong dimension, storing placeholder"
                );
                (vec![0.0; dim], false)
            }
            Err(e) => {
                warn!(department = %department, error = %e, "Embedding failed, storing placeholder");
                (vec![0.0; dim], false)
            }
        }
    }

    fn next_timestamp(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(self.last_timestamp);
        self.last_timestamp = self.last_timestamp.max(now);
        self.last_timestamp
    }
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, MemoryError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_paths_append_suffix() {
        let base = Path::new("context_data/context_Sales");
        assert_eq!(index_path(base), PathBuf::from("context_data/context_Sales.index"));
        assert_eq!(records_path(base), PathBuf::from("context_data/context_Sales.json"));

        let dotted = Path::new("ctx/v1.2");
        assert_eq!(records_path(dotted), PathBuf::from("ctx/v1.2.json"));
    }
}
