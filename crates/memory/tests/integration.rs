//! Integration tests for the context store.
//!
//! A bag-of-words embedder stands in for the remote model so that texts
//! sharing words land close together and failures can be switched on.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use erpmind_common::Department;
use erpmind_memory::store::{index_path, records_path};
use erpmind_memory::{
    ContextConfig, ContextStore, EmbeddingClient, EmbeddingError, InteractionRecord, LoadOutcome,
    MemoryError,
};
use tempfile::TempDir;

const DIM: usize = 256;

struct BagOfWords {
    dim: usize,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl BagOfWords {
    fn new(dim: usize) -> Arc<Self> {
        Arc::new(Self {
            dim,
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingClient for BagOfWords {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Request("embedding service offline".into()));
        }
        let mut v = vec![0.0; self.dim];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let h = word
                .to_lowercase()
                .bytes()
                .fold(2_166_136_261u32, |h, b| (h ^ b as u32).wrapping_mul(16_777_619));
            v[h as usize % self.dim] += 1.0;
        }
        Ok(v)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

/// Always returns three components regardless of configuration.
struct ShortVectors;

#[async_trait]
impl EmbeddingClient for ShortVectors {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(vec![1.0, 2.0, 3.0])
    }

    fn dimension(&self) -> usize {
        3
    }
}

fn new_store(embedder: Arc<BagOfWords>) -> ContextStore {
    ContextStore::new(ContextConfig::new(DIM, true), embedder)
}

async fn seed(store: &mut ContextStore) {
    let entries = [
        ("What were sales this week?", "Sales this week were 42 orders worth 1.2M", Department::Sales),
        ("Show open sales orders", "There are 7 open sales orders this month", Department::Sales),
        ("Who is on leave this week?", "Asha and Ravi are on leave this week", Department::Hr),
        ("Leave calendar for next week", "Nobody has leave booked for next week", Department::Hr),
        ("Which items are low on stock?", "Laptop and Monitor are below reorder level", Department::Inventory),
        ("List unpaid invoices", "INV-50001 and INV-50007 are unpaid", Department::Accounts),
    ];
    for (q, a, dept) in entries {
        assert!(store.store(q, a, dept).await.is_some());
    }
}

#[tokio::test]
async fn rows_stay_aligned_when_embedding_fails() {
    let embedder = BagOfWords::new(DIM);
    let mut store = new_store(embedder.clone());

    for i in 0..8 {
        embedder.set_failing(i % 3 == 1);
        let id = store
            .store(&format!("question {i}"), &format!("a long enough answer {i}"), Department::Sales)
            .await;
        assert!(id.is_some());
        let stats = store.stats();
        assert_eq!(stats.entries, stats.vectors);
        assert_eq!(stats.entries, i + 1);
    }

    let flags: Vec<bool> = store.records().iter().map(|r| r.embedding_succeeded).collect();
    assert_eq!(flags, vec![true, false, true, true, false, true, true, false]);
}

#[tokio::test]
async fn wrong_dimension_embedding_becomes_placeholder() {
    let mut store = ContextStore::new(ContextConfig::new(DIM, false), Arc::new(ShortVectors));
    let id = store
        .store("stock of laptops?", "There are 25 laptops in Main", Department::Inventory)
        .await;
    assert!(id.is_some());
    assert!(!store.records()[0].embedding_succeeded);
    assert_eq!(store.stats().vectors, 1);
    assert_eq!(store.stats().dimensions, DIM);

    // Query vectors of the wrong size cannot be searched.
    assert!(store
        .retrieve("laptops", Department::Inventory, 2)
        .await
        .is_empty());
}

#[tokio::test]
async fn retrieval_is_scoped_to_department() {
    let mut store = new_store(BagOfWords::new(DIM));
    seed(&mut store).await;

    for dept in Department::ALL {
        let results = store.retrieve("leave this week sales orders", dept, 3).await;
        assert!(results.iter().all(|r| r.record.department == dept));
        assert!(results.len() <= 3);
    }

    let hr = store.retrieve("Who is on leave?", Department::Hr, 1).await;
    assert_eq!(hr.len(), 1);
    assert!(hr[0].record.response.contains("leave"));
}

#[tokio::test]
async fn retrieval_orders_by_distance_and_bounds_k() {
    let mut store = new_store(BagOfWords::new(DIM));
    seed(&mut store).await;

    let results = store.retrieve("sales orders this week", Department::Sales, 5).await;
    assert!(!results.is_empty() && results.len() <= 2);
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));

    assert!(store.retrieve("anything", Department::Sales, 0).await.is_empty());
    assert!(store.retrieve("anything", Department::Management, 4).await.is_empty());
}

#[tokio::test]
async fn empty_store_does_not_embed() {
    let embedder = BagOfWords::new(DIM);
    let store = new_store(embedder.clone());

    assert!(store.retrieve("sales?", Department::Sales, 2).await.is_empty());
    assert_eq!(embedder.calls(), 0);
}

#[tokio::test]
async fn retrieval_degrades_when_query_embedding_fails() {
    let embedder = BagOfWords::new(DIM);
    let mut store = new_store(embedder.clone());
    seed(&mut store).await;

    embedder.set_failing(true);
    assert!(store.retrieve("sales this week", Department::Sales, 2).await.is_empty());
}

#[tokio::test]
async fn short_responses_are_not_stored() {
    let mut store = new_store(BagOfWords::new(DIM));
    assert!(store.store("status?", "ok", Department::Sales).await.is_none());
    assert!(store.store("status?", "   ok     \n", Department::Sales).await.is_none());
    assert!(store.store("status?", "", Department::Sales).await.is_none());
    assert_eq!(store.len(), 0);
    assert_eq!(store.stats().vectors, 0);

    assert!(store.store("status?", "0123456789", Department::Sales).await.is_some());
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn long_text_is_truncated_before_persisting() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("context_Accounts");
    let mut store = new_store(BagOfWords::new(DIM));

    let query = "q".repeat(300);
    let response = "r".repeat(1000);
    store.store(&query, &response, Department::Accounts).await.unwrap();
    store.save(&base).await.unwrap();

    let saved: Vec<InteractionRecord> =
        serde_json::from_slice(&std::fs::read(records_path(&base)).unwrap()).unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].response.chars().count(), 500);
    assert_eq!(saved[0].query.chars().count(), 200);
    assert_eq!(
        saved[0].embedding_text,
        format!("Q: {}\nA: {}", "q".repeat(100), "r".repeat(200))
    );
}

#[tokio::test]
async fn embedding_text_is_capped() {
    let mut store = new_store(BagOfWords::new(DIM));
    let query = "é".repeat(400);
    let response = "ü".repeat(400);
    store.store(&query, &response, Department::Hr).await.unwrap();

    let record = &store.records()[0];
    assert!(record.embedding_text.chars().count() <= 500);
    assert!(record.embedding_text.starts_with("Q: é"));
}

#[tokio::test]
async fn save_clear_load_restores_the_store() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("nested").join("context_Sales");
    let mut store = new_store(BagOfWords::new(DIM));
    seed(&mut store).await;

    let ids: Vec<String> = store.records().iter().map(|r| r.id.clone()).collect();
    let before = store.retrieve("leave next week", Department::Hr, 2).await;

    store.save(&base).await.unwrap();
    store.clear();
    assert!(store.is_empty());
    assert_eq!(store.stats().vectors, 0);
    assert_eq!(store.stats().dimensions, DIM);

    let outcome = store.load(&base).await.unwrap();
    assert_eq!(outcome, LoadOutcome::Loaded { entries: 6 });

    let restored: Vec<String> = store.records().iter().map(|r| r.id.clone()).collect();
    assert_eq!(restored, ids);
    let after = store.retrieve("leave next week", Department::Hr, 2).await;
    assert_eq!(before, after);
}

#[tokio::test]
async fn load_rebuilds_index_from_records_alone() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("context_Hr");
    let embedder = BagOfWords::new(DIM);
    let mut store = new_store(embedder.clone());
    seed(&mut store).await;
    store.save(&base).await.unwrap();
    std::fs::remove_file(index_path(&base)).unwrap();

    let mut fresh = new_store(embedder.clone());
    let calls = embedder.calls();
    let outcome = fresh.load(&base).await.unwrap();
    assert_eq!(outcome, LoadOutcome::Rebuilt { entries: 6 });
    assert_eq!(embedder.calls(), calls + 6);
    assert_eq!(fresh.stats().vectors, 6);

    let hr = fresh.retrieve("Who is on leave?", Department::Hr, 2).await;
    assert!(!hr.is_empty());
    assert!(hr.iter().all(|r| r.record.department == Department::Hr));
}

#[tokio::test]
async fn rebuild_marks_records_that_could_not_be_embedded() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("context_Sales");
    let embedder = BagOfWords::new(DIM);
    let mut store = new_store(embedder.clone());
    seed(&mut store).await;
    store.save(&base).await.unwrap();
    std::fs::remove_file(index_path(&base)).unwrap();

    embedder.set_failing(true);
    let mut fresh = new_store(embedder.clone());
    fresh.load(&base).await.unwrap();
    assert_eq!(fresh.stats().vectors, fresh.len());
    assert!(fresh.records().iter().all(|r| !r.embedding_succeeded));
}

#[tokio::test]
async fn index_without_records_is_ignored() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("context_Inventory");
    let embedder = BagOfWords::new(DIM);
    let mut store = new_store(embedder.clone());
    seed(&mut store).await;
    store.save(&base).await.unwrap();
    std::fs::remove_file(records_path(&base)).unwrap();

    let mut fresh = new_store(embedder);
    fresh.store("What is in stock?", "Plenty of chairs in Main", Department::Inventory).await;
    assert_eq!(fresh.load(&base).await.unwrap(), LoadOutcome::NotFound);
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh.stats().vectors, 1);
}

#[tokio::test]
async fn missing_snapshot_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let mut store = new_store(BagOfWords::new(DIM));
    let outcome = store.load(&dir.path().join("nothing_here")).await.unwrap();
    assert_eq!(outcome, LoadOutcome::NotFound);
    assert!(store.is_empty());
}

#[tokio::test]
async fn failed_load_keeps_prior_state() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("context_Management");

    let mut other = ContextStore::new(ContextConfig::new(8, false), BagOfWords::new(8));
    other
        .store("growth plan?", "Focus on exports next year", Department::Management)
        .await
        .unwrap();
    other.save(&base).await.unwrap();

    let mut store = new_store(BagOfWords::new(DIM));
    seed(&mut store).await;
    let err = store.load(&base).await.unwrap_err();
    assert!(matches!(
        err,
        MemoryError::DimensionMismatch {
            expected: DIM,
            found: 8
        }
    ));
    assert_eq!(store.len(), 6);

    std::fs::write(records_path(&base), b"not json").unwrap();
    assert!(matches!(
        store.load(&base).await.unwrap_err(),
        MemoryError::Records(_)
    ));
    assert_eq!(store.len(), 6);
    assert_eq!(store.stats().vectors, 6);
}

#[tokio::test]
async fn truncated_index_blob_fails_load() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("context_Accounts");

    let mut saved = new_store(BagOfWords::new(DIM));
    seed(&mut saved).await;
    saved.save(&base).await.unwrap();
    let blob = std::fs::read(index_path(&base)).unwrap();
    std::fs::write(index_path(&base), &blob[..blob.len() - 3]).unwrap();

    let mut store = new_store(BagOfWords::new(DIM));
    assert!(store
        .store("open invoices?", "Three invoices are still open", Department::Accounts)
        .await
        .is_some());
    let err = store.load(&base).await.unwrap_err();
    assert!(matches!(err, MemoryError::Index(_)));
    assert_eq!(store.len(), 1);
    assert_eq!(store.stats().vectors, 1);
}

#[tokio::test]
async fn timestamps_never_go_backwards() {
    let mut store = new_store(BagOfWords::new(DIM));
    seed(&mut store).await;
    let stamps: Vec<u64> = store.records().iter().map(|r| r.timestamp).collect();
    assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    assert!(stamps[0] > 0);
}

#[tokio::test]
async fn flat_and_graph_indexes_agree_on_small_stores() {
    let mut flat = ContextStore::new(ContextConfig::new(DIM, false), BagOfWords::new(DIM));
    let mut graph = ContextStore::new(ContextConfig::new(DIM, true), BagOfWords::new(DIM));
    seed(&mut flat).await;
    seed(&mut graph).await;

    for dept in Department::ALL {
        let a: Vec<String> = flat
            .retrieve("orders leave stock invoices", dept, 2)
            .await
            .into_iter()
            .map(|r| r.record.query)
            .collect();
        let b: Vec<String> = graph
            .retrieve("orders leave stock invoices", dept, 2)
            .await
            .into_iter()
            .map(|r| r.record.query)
            .collect();
        assert_eq!(a, b, "department {dept}");
    }
}
