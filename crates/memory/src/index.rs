//! Nearest-neighbor indexes over fixed-dimension vectors.
//!
//! Rows are numbered by insertion order starting at zero; both variants
//! report squared L2 distances in ascending order. The graph variant uses
//! `hora`'s HNSW for candidate generation and re-ranks candidates exactly.

use std::fmt;

use hora::core::ann_index::ANNIndex;
use hora::core::metrics::Metric;
use hora::index::hnsw_idx::HNSWIndex;
use hora::index::hnsw_params::HNSWParams;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::types::IndexKind;

/// Neighbors per node above layer zero.
const HNSW_M: usize = 16;
const HNSW_EF_BUILD: usize = 40;
const HNSW_EF_SEARCH: usize = 16;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("vector has dimension {actual}, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index encoding failed: {0}")]
    Codec(#[from] bincode::Error),

    #[error("graph index rejected the operation: {0}")]
    Graph(&'static str),

    #[error("index blob is inconsistent: {0}")]
    Corrupt(String),
}

#[derive(Debug)]
pub enum VectorIndex {
    Flat(FlatIndex),
    Hnsw(HnswIndex),
}

/// On-disk form. Only the raw rows are kept; the graph is rebuilt on load.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    kind: IndexKind,
    dim: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    pub fn new(kind: IndexKind, dim: usize) -> Self {
        match kind {
            IndexKind::Flat => VectorIndex::Flat(FlatIndex::new(dim)),
            IndexKind::Hnsw => VectorIndex::Hnsw(HnswIndex::new(dim)),
        }
    }

    pub fn kind(&self) -> IndexKind {
        match self {
            VectorIndex::Flat(_) => IndexKind::Flat,
            VectorIndex::Hnsw(_) => IndexKind::Hnsw,
        }
    }

    fn rows(&self) -> &FlatIndex {
        match self {
            VectorIndex::Flat(i) => i,
            VectorIndex::Hnsw(i) => &i.rows,
        }
    }

    pub fn dim(&self) -> usize {
        self.rows().dim
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a vector and return its row.
    pub fn add(&mut self, vector: &[f32]) -> Result<usize, IndexError> {
        self.check_dim(vector)?;
        match self {
            VectorIndex::Flat(i) => Ok(i.add(vector)),
            VectorIndex::Hnsw(i) => i.add(vector),
        }
    }

    /// Up to `k` `(row, distance)` pairs closest to `query`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, IndexError> {
        self.check_dim(query)?;
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        Ok(match self {
            VectorIndex::Flat(i) => i.search(query, k),
            VectorIndex::Hnsw(i) => i.search(query, k),
        })
    }

    /// Drop every vector, keeping dimension and variant.
    pub fn reset(&mut self) {
        *self = VectorIndex::new(self.kind(), self.dim());
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, IndexError> {
        let rows = self.rows();
        let snapshot = Snapshot {
            kind: self.kind(),
            dim: rows.dim,
            data: rows.data.clone(),
        };
        Ok(bincode::serialize(&snapshot)?)
    }

    /// Decode a blob written by [`VectorIndex::to_bytes`], rejecting blobs
    /// whose rows do not fit the recorded dimension.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IndexError> {
        let snapshot: Snapshot = bincode::deserialize(bytes)?;
        if snapshot.dim == 0 {
            return Err(IndexError::Corrupt("dimension is zero".into()));
        }
        if snapshot.data.len() % snapshot.dim != 0 {
            return Err(IndexError::Corrupt(format!(
                "{} values do not divide into rows of {}",
                snapshot.data.len(),
                snapshot.dim
            )));
        }
        if snapshot.data.iter().any(|x| !x.is_finite()) {
            return Err(IndexError::Corrupt("non-finite component".into()));
        }

        let mut index = VectorIndex::new(snapshot.kind, snapshot.dim);
        for row in snapshot.data.chunks_exact(snapshot.dim) {
            index.add(row)?;
        }
        Ok(index)
    }

    fn check_dim(&self, vector: &[f32]) -> Result<(), IndexError> {
        if vector.len() != self.dim() {
            return Err(IndexError::DimensionMismatch {
                expected: self.dim(),
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn by_distance(hits: &mut [(usize, f32)]) {
    hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
}

/// Exact search by exhaustive scan.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dim: usize,
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.dim..(row + 1) * self.dim]
    }

    fn add(&mut self, vector: &[f32]) -> usize {
        self.data.extend_from_slice(vector);
        self.len() - 1
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> = (0..self.len())
            .map(|row| (row, squared_l2(query, self.row(row))))
            .collect();
        by_distance(&mut scored);
        scored.truncate(k);
        scored
    }
}

/// Approximate search over a hierarchical navigable small-world graph.
///
/// Graph node ids are row numbers. Raw rows are kept alongside the graph
/// for exact distances and snapshots.
pub struct HnswIndex {
    rows: FlatIndex,
    graph: HNSWIndex<f32, usize>,
}

impl fmt::Debug for HnswIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HnswIndex")
            .field("dim", &self.rows.dim)
            .field("len", &self.rows.len())
            .finish()
    }
}

impl HnswIndex {
    pub fn new(dim: usize) -> Self {
        Self {
            rows: FlatIndex::new(dim),
            graph: HNSWIndex::new(dim, &Self::params()),
        }
    }

    fn params() -> HNSWParams<f32> {
        HNSWParams::<f32>::default()
            .n_neighbor(HNSW_M)
            .n_neighbor0(HNSW_M * 2)
            .ef_build(HNSW_EF_BUILD)
            .ef_search(HNSW_EF_SEARCH)
    }

    fn add(&mut self, vector: &[f32]) -> Result<usize, IndexError> {
        let row = self.rows.len();
        self.graph.add(vector, row).map_err(IndexError::Graph)?;
        if let Err(e) = self.graph.build(Metric::Euclidean) {
            // Drop the half-inserted node so graph ids keep matching rows.
            self.rebuild_graph();
            return Err(IndexError::Graph(e));
        }
        Ok(self.rows.add(vector))
    }

    fn rebuild_graph(&mut self) {
        let mut graph = HNSWIndex::new(self.rows.dim, &Self::params());
        for row in 0..self.rows.len() {
            if graph.add(self.rows.row(row), row).is_err() {
                break;
            }
        }
        if let Err(e) = graph.build(Metric::Euclidean) {
            warn!(error = e, rows = self.rows.len(), "Graph rebuild failed");
        }
        self.graph = graph;
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let len = self.rows.len();
        let mut hits: Vec<(usize, f32)> = self
            .graph
            .search(query, k.max(HNSW_EF_SEARCH))
            .into_iter()
            .filter(|&row| row < len)
            .map(|row| (row, squared_l2(query, self.rows.row(row))))
            .collect();
        by_distance(&mut hits);
        hits.dedup_by_key(|hit| hit.0);
        hits.truncate(k);
        hits
    }
}
