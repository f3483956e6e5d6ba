//! Memory types and configuration.

use serde::{Deserialize, Serialize};

use erpmind_common::Department;

/// Stored query prefix bound, in characters.
pub const MAX_QUERY_CHARS: usize = 200;
/// Stored response prefix bound, in characters.
pub const MAX_RESPONSE_CHARS: usize = 500;
/// Bound on the embedded text and on embedded retrieval queries.
pub const MAX_EMBEDDING_CHARS: usize = 500;
/// Query prefix that goes into the embedded text.
pub const EMBED_QUERY_CHARS: usize = 100;
/// Response prefix that goes into the embedded text.
pub const EMBED_RESPONSE_CHARS: usize = 200;
/// Responses shorter than this (after trimming) are not remembered.
pub const MIN_RESPONSE_CHARS: usize = 10;

/// One remembered question/answer interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: String,

    /// Question text, truncated to [`MAX_QUERY_CHARS`].
    pub query: String,

    /// Answer text, truncated to [`MAX_RESPONSE_CHARS`].
    pub response: String,

    pub department: Department,

    /// Seconds since the Unix epoch.
    pub timestamp: u64,

    /// The exact string that was embedded.
    pub embedding_text: String,

    /// False when the index row is a zero-vector placeholder.
    pub embedding_succeeded: bool,
}

/// A record returned by retrieval with its distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContext {
    #[serde(flatten)]
    pub record: InteractionRecord,

    /// Squared L2 distance; smaller is more similar.
    pub distance: f32,
}

/// Nearest-neighbor index variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    /// Exhaustive scan.
    Flat,
    /// Hierarchical navigable small-world graph.
    Hnsw,
}

/// Configuration for one context store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub dimension: usize,
    pub index: IndexKind,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            dimension: 768,
            index: IndexKind::Hnsw,
        }
    }
}

impl ContextConfig {
    pub fn new(dimension: usize, use_hnsw: bool) -> Self {
        Self {
            dimension,
            index: if use_hnsw {
                IndexKind::Hnsw
            } else {
                IndexKind::Flat
            },
        }
    }
}

/// Size summary of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub entries: usize,
    pub vectors: usize,
    pub dimensions: usize,
}

/// First `max_chars` characters of `s`, never splitting a character.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
