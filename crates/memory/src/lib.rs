//! Per-department contextual memory.
//!
//! Each department keeps its past question/answer interactions in a
//! [`ContextStore`]: the records themselves plus one embedding vector per
//! record in a [`VectorIndex`]. Retrieval embeds the new question, searches
//! the index and keeps only the caller's department.
//!
//! ```text
//!   store(q, a, dept)                       retrieve(q, dept, k)
//!         │                                          │
//!         ▼                                          ▼
//!   EmbeddingClient ──(fail: zero vector)──▶  EmbeddingClient
//!         │                                          │
//!         ▼                                          ▼
//!   VectorIndex row i  ◀──── aligned ────▶  search 2k, filter dept, take k
//!   records[i]
//!         │
//!         ▼ save / load
//!   <base>.index (bincode)  +  <base>.json (records)
//! ```

pub mod embedding;
pub mod index;
pub mod retrieval;
pub mod store;
pub mod types;

pub use embedding::{build_embedder, EmbeddingClient, EmbeddingConfig, EmbeddingError};
pub use index::{IndexError, VectorIndex};
pub use retrieval::{render_context, with_context};
pub use store::{ContextStore, LoadOutcome, MemoryError};
pub use types::{
    truncate_chars, ContextConfig, IndexKind, InteractionRecord, RetrievedContext, StoreStats,
};
