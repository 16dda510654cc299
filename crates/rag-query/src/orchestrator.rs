//! Retrieval orchestration: HyDE, dense + sparse fan-out, fusion, reranking.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use rag_core::{
    ChatModel, CrossEncoder, Embedder, LexicalIndex, RagError, RankedList, Result,
    RetrievalConfig, VectorIndex,
};

use crate::dense::DenseRetriever;
use crate::fusion::fuse;
use crate::hyde::HydeGenerator;
use crate::rerank::Reranker;
use crate::sparse::SparseRetriever;

/// What happened to one retrieval source during a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SourceOutcome {
    /// The source answered with this many documents.
    Hits { count: usize },
    /// The tenant has nothing indexed in this source.
    EmptyTenant,
    /// The source failed; the request continued without it.
    Failed { message: String },
}

impl SourceOutcome {
    fn is_usable(&self) -> bool {
        matches!(self, Self::Hits { .. })
    }
}

/// Whether the cross-encoder ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankOutcome {
    Applied,
    /// Turned off in configuration or no cross-encoder attached.
    Skipped,
    /// The cross-encoder failed; fused order was kept.
    Failed,
}

/// Result of a retrieval together with per-stage diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalReport {
    /// The literal query.
    pub query: String,

    /// The text that was embedded for dense retrieval.
    pub probe: String,

    /// False when the raw query was embedded because HyDE failed.
    pub used_hypothetical: bool,

    pub dense: SourceOutcome,
    pub sparse: SourceOutcome,

    /// Distinct documents after fusion.
    pub fused_count: usize,

    pub rerank: RerankOutcome,

    /// Final documents, best first.
    pub documents: RankedList,

    /// Wall time in milliseconds.
    pub latency_ms: u64,
}

/// Composes the retrieval stages behind a single `retrieve` call.
///
/// Per-source failures are absorbed: a tenant without a vector collection
/// still gets lexical results and vice versa. Only a failed hypothetical
/// document (without fallback) or the loss of both sources is surfaced.
pub struct RetrievalOrchestrator {
    hyde: HydeGenerator,
    embedder: Arc<dyn Embedder>,
    dense: DenseRetriever,
    sparse: SparseRetriever,
    reranker: Option<Reranker>,
    config: RetrievalConfig,
}

impl RetrievalOrchestrator {
    /// Create an orchestrator without a cross-encoder.
    pub fn new(
        model: Arc<dyn ChatModel>,
        embedder: Arc<dyn Embedder>,
        vectors: Arc<dyn VectorIndex>,
        lexical: Arc<dyn LexicalIndex>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            hyde: HydeGenerator::new(model),
            embedder,
            dense: DenseRetriever::new(vectors),
            sparse: SparseRetriever::new(lexical),
            reranker: None,
            config,
        }
    }

    /// Attach the cross-encoder used when `rerank_enabled` is set.
    pub fn with_reranker(mut self, encoder: Arc<dyn CrossEncoder>) -> Self {
        self.reranker = Some(Reranker::new(encoder));
        self
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Retrieve the final ranked documents for `query` within `tenant`.
    pub async fn retrieve(&self, query: &str, tenant: &str) -> Result<RankedList> {
        Ok(self.retrieve_with_report(query, tenant).await?.documents)
    }

    /// Like [`retrieve`](Self::retrieve), keeping per-stage diagnostics.
    pub async fn retrieve_with_report(&self, query: &str, tenant: &str) -> Result<RetrievalReport> {
        let start = Instant::now();

        info!("Retrieving for tenant {}: {:?}", tenant, query);

        // 1. Hypothetical document
        let (probe, used_hypothetical) = match self.hyde.generate(query).await {
            Ok(passage) => (passage, true),
            Err(e) if self.config.hyde_fallback_to_query => {
                warn!("Hypothetical document failed, embedding the raw query: {}", e);
                (query.to_string(), false)
            }
            Err(e) => {
                return Err(RagError::retrieval(format!(
                    "hypothetical document generation failed: {}",
                    e
                )))
            }
        };

        // 2-3. Embed the probe and search both sources concurrently
        let dense_search = async {
            let embedding = self.embedder.embed(&probe).await?;
            self.dense.search(&embedding, self.config.dense_k, tenant).await
        };
        let sparse_search = self.sparse.search(query, tenant);

        let (dense_results, sparse_results) = tokio::join!(dense_search, sparse_search);

        let (dense_docs, dense) = absorb("dense", tenant, dense_results);
        let (sparse_docs, sparse) = absorb("sparse", tenant, sparse_results);

        if !dense.is_usable() && !sparse.is_usable() {
            return Err(RagError::retrieval(format!(
                "no retrieval source available for tenant {} (dense: {}, sparse: {})",
                tenant,
                describe(&dense),
                describe(&sparse)
            )));
        }

        debug!(
            "Dense search returned {} results, sparse search returned {} results",
            dense_docs.len(),
            sparse_docs.len()
        );

        // 4. Fuse
        let fused = fuse(&[dense_docs, sparse_docs], self.config.rrf_k);
        let fused_count = fused.len();

        debug!("Fused to {} results", fused_count);

        // 5. Rerank the fused head
        let (mut documents, rerank) = self.rerank(fused, query).await;

        // 6. Truncate
        documents.truncate(self.config.final_n);

        let latency_ms = start.elapsed().as_millis() as u64;

        info!(
            "Retrieval completed in {}ms, returned {} documents",
            latency_ms,
            documents.len()
        );

        Ok(RetrievalReport {
            query: query.to_string(),
            probe,
            used_hypothetical,
            dense,
            sparse,
            fused_count,
            rerank,
            documents,
            latency_ms,
        })
    }

    async fn rerank(&self, fused: RankedList, query: &str) -> (RankedList, RerankOutcome) {
        let reranker = match &self.reranker {
            Some(r) if self.config.rerank_enabled => r,
            _ => {
                debug!("Rerank skipped");
                return (fused, RerankOutcome::Skipped);
            }
        };

        let mut shortlist = fused;
        shortlist.truncate(self.config.rerank_window.max(self.config.final_n));

        match reranker
            .rerank(shortlist.clone(), query, self.config.final_n)
            .await
        {
            Ok(reranked) => (reranked, RerankOutcome::Applied),
            Err(e) => {
                warn!("Reranker failed, keeping fused order: {}", e);
                (shortlist, RerankOutcome::Failed)
            }
        }
    }
}

/// Turn a source result into documents plus an outcome, logging degradations.
fn absorb(stage: &str, tenant: &str, result: Result<RankedList>) -> (RankedList, SourceOutcome) {
    match result {
        Ok(docs) => {
            let count = docs.len();
            (docs, SourceOutcome::Hits { count })
        }
        Err(e) if e.is_empty_tenant() => {
            warn!("No {} index for tenant {}, continuing without it", stage, tenant);
            (Vec::new(), SourceOutcome::EmptyTenant)
        }
        Err(e) => {
            warn!("{} retrieval failed for tenant {}: {}", stage, tenant, e);
            (
                Vec::new(),
                SourceOutcome::Failed {
                    message: e.to_string(),
                },
            )
        }
    }
}

fn describe(outcome: &SourceOutcome) -> String {
    match outcome {
        SourceOutcome::Hits { count } => format!("{} hits", count),
        SourceOutcome::EmptyTenant => "nothing indexed".to_string(),
        SourceOutcome::Failed { message } => message.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rag_core::{Document, Prompt};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeModel {
        reply: Option<&'static str>,
    }

    #[async_trait]
    impl ChatModel for FakeModel {
        async fn complete(&self, _prompt: &Prompt) -> Result<String> {
            self.reply
                .map(String::from)
                .ok_or_else(|| RagError::completion("model down"))
        }
    }

    /// Records the last embedded text; the vector is its length.
    #[derive(Default)]
    struct FakeEmbedder {
        last: Mutex<Option<String>>,
    }

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            *self.last.lock().unwrap() = Some(text.to_string());
            Ok(vec![text.len() as f32])
        }

        fn dimension(&self) -> usize {
            1
        }
    }

    /// Per-tenant canned lists; missing tenants are empty indexes.
    #[derive(Default)]
    struct FakeIndex {
        lists: HashMap<String, RankedList>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeIndex {
        fn with(tenant: &str, docs: RankedList) -> Self {
            let mut lists = HashMap::new();
            lists.insert(tenant.to_string(), docs);
            Self {
                lists,
                ..Default::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn lookup(&self, tenant: &str) -> Result<RankedList> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RagError::database("connection refused"));
            }
            self.lists
                .get(tenant)
                .cloned()
                .ok_or_else(|| RagError::empty_tenant(tenant))
        }
    }

    #[async_trait]
    impl VectorIndex for FakeIndex {
        async fn vector_search(&self, _e: &[f32], k: usize, tenant: &str) -> Result<RankedList> {
            let mut docs = self.lookup(tenant)?;
            docs.truncate(k);
            Ok(docs)
        }
    }

    #[async_trait]
    impl LexicalIndex for FakeIndex {
        async fn lexical_search(&self, _q: &str, tenant: &str) -> Result<RankedList> {
            self.lookup(tenant)
        }
    }

    /// Scores documents by the numeric suffix of their source key (higher first).
    struct SuffixEncoder;

    #[async_trait]
    impl CrossEncoder for SuffixEncoder {
        async fn score(&self, _q: &str, docs: &[Document]) -> Result<Vec<f32>> {
            Ok(docs
                .iter()
                .map(|d| d.source_key.trim_start_matches('D').parse::<f32>().unwrap_or(0.0))
                .collect())
        }
    }

    struct BrokenEncoder;

    #[async_trait]
    impl CrossEncoder for BrokenEncoder {
        async fn score(&self, _q: &str, _docs: &[Document]) -> Result<Vec<f32>> {
            Err(RagError::rerank("model not loaded"))
        }
    }

    fn d(name: &str) -> Document {
        Document::new(format!("content of {}", name), name)
    }

    fn keys(list: &[Document]) -> Vec<&str> {
        list.iter().map(|d| d.source_key.as_str()).collect()
    }

    fn no_rerank() -> RetrievalConfig {
        RetrievalConfig {
            rerank_enabled: false,
            ..Default::default()
        }
    }

    fn orchestrator(
        model: FakeModel,
        dense: FakeIndex,
        sparse: FakeIndex,
        config: RetrievalConfig,
    ) -> (RetrievalOrchestrator, Arc<FakeEmbedder>) {
        let embedder = Arc::new(FakeEmbedder::default());
        let orch = RetrievalOrchestrator::new(
            Arc::new(model),
            embedder.clone(),
            Arc::new(dense),
            Arc::new(sparse),
            config,
        );
        (orch, embedder)
    }

    #[tokio::test]
    async fn test_retrieve_fuses_dense_and_sparse() {
        let (orch, embedder) = orchestrator(
            FakeModel { reply: Some("hypothetical passage") },
            FakeIndex::with("alice", vec![d("D1"), d("D2"), d("D3")]),
            FakeIndex::with("alice", vec![d("D3"), d("D1")]),
            no_rerank(),
        );

        let report = orch.retrieve_with_report("q", "alice").await.unwrap();

        assert_eq!(keys(&report.documents), ["D1", "D3", "D2"]);
        assert_eq!(report.dense, SourceOutcome::Hits { count: 3 });
        assert_eq!(report.sparse, SourceOutcome::Hits { count: 2 });
        assert_eq!(report.fused_count, 3);
        assert_eq!(report.rerank, RerankOutcome::Skipped);
        assert!(report.used_hypothetical);

        // The hypothetical document, not the query, is embedded.
        assert_eq!(
            embedder.last.lock().unwrap().as_deref(),
            Some("hypothetical passage")
        );
    }

    #[tokio::test]
    async fn test_retrieve_empty_dense_tenant_degrades_to_sparse() {
        let (orch, _) = orchestrator(
            FakeModel { reply: Some("h") },
            FakeIndex::default(),
            FakeIndex::with("alice", vec![d("S1"), d("S2"), d("S3")]),
            no_rerank(),
        );

        let report = orch.retrieve_with_report("q", "alice").await.unwrap();
        assert_eq!(report.dense, SourceOutcome::EmptyTenant);
        assert_eq!(keys(&report.documents), ["S1", "S2", "S3"]);
    }

    #[tokio::test]
    async fn test_retrieve_failed_sparse_degrades_to_dense() {
        let (orch, _) = orchestrator(
            FakeModel { reply: Some("h") },
            FakeIndex::with("alice", vec![d("D1"), d("D2")]),
            FakeIndex::failing(),
            no_rerank(),
        );

        let report = orch.retrieve_with_report("q", "alice").await.unwrap();
        assert!(matches!(report.sparse, SourceOutcome::Failed { .. }));
        assert_eq!(keys(&report.documents), ["D1", "D2"]);
    }

    #[tokio::test]
    async fn test_retrieve_both_sources_unavailable() {
        let (orch, _) = orchestrator(
            FakeModel { reply: Some("h") },
            FakeIndex::default(),
            FakeIndex::failing(),
            no_rerank(),
        );

        let err = orch.retrieve("q", "alice").await.unwrap_err();
        assert_eq!(err.error_code(), "RETRIEVAL_FAILED");
    }

    #[tokio::test]
    async fn test_retrieve_hyde_failure_aborts() {
        let dense = FakeIndex::with("alice", vec![d("D1")]);
        let (orch, embedder) = orchestrator(
            FakeModel { reply: None },
            dense,
            FakeIndex::with("alice", vec![d("D1")]),
            no_rerank(),
        );

        let err = orch.retrieve("q", "alice").await.unwrap_err();
        assert_eq!(err.error_code(), "RETRIEVAL_FAILED");
        assert!(embedder.last.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_retrieve_hyde_fallback_embeds_query() {
        let config = RetrievalConfig {
            hyde_fallback_to_query: true,
            ..no_rerank()
        };
        let (orch, embedder) = orchestrator(
            FakeModel { reply: None },
            FakeIndex::with("alice", vec![d("D1")]),
            FakeIndex::with("alice", vec![d("D1")]),
            config,
        );

        let report = orch.retrieve_with_report("raw query", "alice").await.unwrap();
        assert!(!report.used_hypothetical);
        assert_eq!(embedder.last.lock().unwrap().as_deref(), Some("raw query"));
        assert_eq!(keys(&report.documents), ["D1"]);
    }

    #[tokio::test]
    async fn test_retrieve_truncates_to_final_n() {
        let config = RetrievalConfig {
            final_n: 2,
            ..no_rerank()
        };
        let (orch, _) = orchestrator(
            FakeModel { reply: Some("h") },
            FakeIndex::with("alice", vec![d("D1"), d("D2"), d("D3")]),
            FakeIndex::with("alice", vec![d("D4")]),
            config,
        );

        let docs = orch.retrieve("q", "alice").await.unwrap();
        assert_eq!(keys(&docs), ["D1", "D4"]);
    }

    #[tokio::test]
    async fn test_retrieve_reranks_window() {
        let config = RetrievalConfig {
            final_n: 2,
            rerank_window: 3,
            ..Default::default()
        };
        let (orch, _) = orchestrator(
            FakeModel { reply: Some("h") },
            FakeIndex::with("alice", vec![d("D1"), d("D2"), d("D3"), d("D9")]),
            FakeIndex::default(),
            config,
        );
        let orch = orch.with_reranker(Arc::new(SuffixEncoder));

        let report = orch.retrieve_with_report("q", "alice").await.unwrap();
        // D9 is outside the rerank window, so D3 is the best the encoder sees.
        assert_eq!(keys(&report.documents), ["D3", "D2"]);
        assert_eq!(report.rerank, RerankOutcome::Applied);
    }

    #[tokio::test]
    async fn test_retrieve_reranker_failure_keeps_fused_order() {
        let config = RetrievalConfig {
            final_n: 2,
            ..Default::default()
        };
        let (orch, _) = orchestrator(
            FakeModel { reply: Some("h") },
            FakeIndex::with("alice", vec![d("D1"), d("D2"), d("D3")]),
            FakeIndex::default(),
            config,
        );
        let orch = orch.with_reranker(Arc::new(BrokenEncoder));

        let report = orch.retrieve_with_report("q", "alice").await.unwrap();
        assert_eq!(report.rerank, RerankOutcome::Failed);
        assert_eq!(keys(&report.documents), ["D1", "D2"]);
    }

    #[tokio::test]
    async fn test_rerank_disabled_ignores_encoder() {
        let (orch, _) = orchestrator(
            FakeModel { reply: Some("h") },
            FakeIndex::with("alice", vec![d("D1"), d("D2")]),
            FakeIndex::default(),
            no_rerank(),
        );
        let orch = orch.with_reranker(Arc::new(SuffixEncoder));

        let report = orch.retrieve_with_report("q", "alice").await.unwrap();
        assert_eq!(report.rerank, RerankOutcome::Skipped);
        assert_eq!(keys(&report.documents), ["D1", "D2"]);
    }

    #[tokio::test]
    async fn test_retrieve_other_tenant_sees_nothing() {
        let (orch, _) = orchestrator(
            FakeModel { reply: Some("h") },
            FakeIndex::with("alice", vec![d("D1")]),
            FakeIndex::with("alice", vec![d("D1")]),
            no_rerank(),
        );

        assert!(orch.retrieve("q", "bob").await.is_err());
    }

    /// Holds each search until both sources have been entered.
    struct RendezvousIndex {
        barrier: Arc<tokio::sync::Barrier>,
        docs: RankedList,
    }

    #[async_trait]
    impl VectorIndex for RendezvousIndex {
        async fn vector_search(&self, _e: &[f32], _k: usize, _t: &str) -> Result<RankedList> {
            self.barrier.wait().await;
            Ok(self.docs.clone())
        }
    }

    #[async_trait]
    impl LexicalIndex for RendezvousIndex {
        async fn lexical_search(&self, _q: &str, _t: &str) -> Result<RankedList> {
            self.barrier.wait().await;
            Ok(self.docs.clone())
        }
    }

    #[tokio::test]
    async fn test_dense_and_sparse_run_concurrently() {
        let barrier = Arc::new(tokio::sync::Barrier::new(2));
        let orch = RetrievalOrchestrator::new(
            Arc::new(FakeModel { reply: Some("passage") }),
            Arc::new(FakeEmbedder::default()),
            Arc::new(RendezvousIndex {
                barrier: barrier.clone(),
                docs: vec![d("D1")],
            }),
            Arc::new(RendezvousIndex {
                barrier,
                docs: vec![d("D2")],
            }),
            no_rerank(),
        );

        // Sequential searches would never get past the barrier.
        let docs = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            orch.retrieve("q", "alice"),
        )
        .await
        .expect("dense and sparse searches did not overlap")
        .unwrap();

        assert_eq!(keys(&docs), ["D1", "D2"]);
    }
}
