//! The Retrieval Pipeline Orchestrator (spec.md §4.9): owns the process-wide
//! corpus/index singletons (spec.md §9) and wires the tokenizer, BM25,
//! embedding client, vector index, fusion ranker, answerability gate,
//! intent classifier, and generator into `initialize`/`query`/`status`.
//! Grounded on `examples/original_source/backend/app/src/table_main.py`'s
//! `initialize_data`/`ask` for the control flow, and on
//! `arclabs561-rank-rank`'s snapshot-handle discipline (readers take a
//! reference at the start of the call; replacement never tears state) for
//! how the corpus/index are held.

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use regex::Regex;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::generator::Generator;
use crate::intent;
use crate::interaction_log::InteractionLog;
use crate::retrieval::corpus::{build_corpus, Corpus};
use crate::retrieval::embeddings::EmbeddingClient;
use crate::retrieval::fusion::{self, FusionParams};
use crate::retrieval::vector_index::VectorIndex;
use crate::retrieval::answerability;
use crate::storage;
use crate::worker_pool::WorkerPool;
use crate::workbook::WorkbookReader;

/// Canonical refusal message for a failed answerability gate, spec.md §4.6.
pub const INSUFFICIENT_EVIDENCE: &str =
    "Insufficient evidence. Please provide more context or initialize data first.";

/// Outcome of `status` (spec.md §6): snippet count of the current corpus
/// and whether an in-memory index handle has been loaded.
pub struct Status {
    pub chunks_loaded: usize,
    pub has_index: bool,
}

/// Outcome of `query`: the snippets selected as evidence (empty on
/// refusal) and the generated (or refusal) answer text.
pub struct QueryOutcome {
    pub snippets: Vec<String>,
    pub answer: String,
}

/// The process-wide service container: current corpus, lazily-loaded index
/// handle, and the external collaborators (workbook reader, embedder,
/// generator) behind trait objects so tests can substitute fakes.
///
/// The generator is guarded by its own mutex (spec.md §5: "the generator is
/// not reentrant ... serialize all generator calls under a single mutual
/// exclusion primitive"), separate from the corpus/index snapshot handles,
/// which are lock-free `ArcSwapOption`s so readers never block on a writer
/// mid-swap.
pub struct Pipeline {
    config: AppConfig,
    index_path: std::path::PathBuf,
    workbook_reader: Arc<dyn WorkbookReader>,
    embedder: Option<Arc<dyn EmbeddingClient>>,
    generator: Arc<tokio::sync::Mutex<Box<dyn Generator>>>,
    interaction_log: Arc<InteractionLog>,
    worker_pool: Arc<WorkerPool>,
    corpus: ArcSwapOption<Corpus>,
    index: ArcSwapOption<VectorIndex>,
}

impl Pipeline {
    pub fn new(
        config: AppConfig,
        workbook_reader: Arc<dyn WorkbookReader>,
        embedder: Option<Arc<dyn EmbeddingClient>>,
        generator: Arc<tokio::sync::Mutex<Box<dyn Generator>>>,
        worker_pool: Arc<WorkerPool>,
    ) -> Self {
        let index_path = storage::resolve_index_path(&config.index_path, config.packaged_mode);
        let interaction_log = Arc::new(InteractionLog::new(config.log_jsonl.clone()));
        Pipeline {
            config,
            index_path,
            workbook_reader,
            embedder,
            generator,
            interaction_log,
            worker_pool,
            corpus: ArcSwapOption::from(None),
            index: ArcSwapOption::from(None),
        }
    }

    /// `initialize(workbook_path)` (spec.md §4.9): read the workbook, build
    /// the corpus, embed every snippet, persist the vector index, and
    /// publish the new corpus atomically. Returns the snippet count.
    pub async fn initialize(&self, workbook_path: &str) -> AppResult<usize> {
        let path = Path::new(workbook_path);
        if !path.exists() {
            return Err(AppError::InvalidInput(format!(
                "workbook path does not exist: {workbook_path}"
            )));
        }

        let reader = self.workbook_reader.clone();
        let owned_path = path.to_path_buf();
        let sheets = self
            .worker_pool
            .run_blocking(move || reader.read(&owned_path))
            .await?;

        let corpus = self.worker_pool.run_blocking(move || build_corpus(&sheets)).await;
        if corpus.is_empty() {
            return Err(AppError::EmptyCorpus);
        }

        if let Some(embedder) = &self.embedder {
            let dim = embedder.dimension();
            let embedder = embedder.clone();
            let texts: Vec<String> = corpus.snippets.iter().map(|s| s.text.clone()).collect();
            let embeddings = self
                .worker_pool
                .run_async(async move {
                    let text_refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
                    embedder.encode_batch(&text_refs).await
                })
                .await?;
            let index = VectorIndex::build(&embeddings, dim)?;

            let index_path = self.index_path.clone();
            let index_for_save = index.clone();
            self.worker_pool
                .run_blocking(move || index_for_save.save(&index_path))
                .await?;

            // invalidate the in-memory handle so the next query reloads
            // the freshly published file, per spec.md §4.10.
            self.index.store(Some(Arc::new(index)));
        } else {
            self.index.store(None);
        }

        let count = corpus.len();
        self.corpus.store(Some(Arc::new(corpus)));
        Ok(count)
    }

    /// `status` (spec.md §6): snippet count of the current corpus and
    /// whether an in-memory index handle is currently loaded.
    pub fn status(&self) -> Status {
        let chunks_loaded = self.corpus.load().as_ref().map(|c| c.len()).unwrap_or(0);
        let has_index = self.index.load().is_some();
        Status {
            chunks_loaded,
            has_index,
        }
    }

    /// `query(question, detailed?, k?, session_id?, extra_snippets?)`
    /// (spec.md §4.9): fuse-rank, gate, build the prompt, generate, and
    /// post-process. A refusal at either gate returns the canonical
    /// message with an empty snippet list rather than an error.
    pub async fn query(
        &self,
        question: &str,
        detailed: bool,
        k: Option<usize>,
        session_id: Option<&str>,
        extra_snippets: &[String],
    ) -> AppResult<QueryOutcome> {
        let corpus = self
            .corpus
            .load_full()
            .ok_or(AppError::NotInitialized)?;

        let index = self.current_index().await;

        let q_emb = match &self.embedder {
            Some(embedder) => {
                let embedder = embedder.clone();
                let question_for_embed = question.to_string();
                let vec = self
                    .worker_pool
                    .run_async(async move { embedder.encode_query(&question_for_embed).await })
                    .await?;
                Some(vec)
            }
            None => None,
        };

        let params = FusionParams {
            k: k.unwrap_or(self.config.k),
            bm25_top_mult: self.config.retrieval.bm25_top_mult,
            w_bm25: self.config.retrieval.weight_bm25,
            w_embed: self.config.retrieval.weight_embed,
            answer_threshold: self.config.answerability_threshold,
        };

        let corpus_ref = corpus.as_ref();
        let question_owned = question.to_string();
        let fused = {
            let index_ref = index.as_deref();
            fusion::retrieve(&question_owned, corpus_ref, index_ref, q_emb.as_deref(), &params)
        };

        if fused.ids.is_empty() {
            return Ok(self.refuse(session_id, detailed).await);
        }

        let snippet_refs: Vec<&str> = fused.texts.iter().map(|s| s.as_str()).collect();
        if !answerability::passes_coverage_gate(question, &snippet_refs, self.config.evidence_overlap_threshold) {
            return Ok(self.refuse(session_id, detailed).await);
        }

        let mut evidence = extra_snippets.to_vec();
        let mut seen: std::collections::HashSet<&str> = evidence.iter().map(|s| s.as_str()).collect();
        for text in &fused.texts {
            if seen.insert(text.as_str()) {
                evidence.push(text.clone());
            }
        }

        let prompt = intent::build_prompt(&evidence, question, detailed, self.config.detailed_word_limit);
        let llm_params = if detailed {
            &self.config.llm_params_detailed
        } else {
            &self.config.llm_params
        };

        let generator = self.generator.clone();
        let prompt_owned = prompt.clone();
        let max_tokens = llm_params.max_tokens;
        let stop = llm_params.stop.clone();
        let raw_answer = self
            .worker_pool
            .run_async(async move {
                let generator = generator.lock().await;
                generator.generate(&prompt_owned, max_tokens, &stop).await
            })
            .await?;
        let answer = post_process(&raw_answer);

        let mode = if detailed { "detailed" } else { "concise" };
        let session = session_id.unwrap_or("").to_string();
        let log = self.interaction_log.clone();
        let question_for_log = question.to_string();
        let snippets_for_log = fused.texts.clone();
        let answer_for_log = answer.clone();
        self.worker_pool
            .run_blocking(move || {
                log.record(&question_for_log, &snippets_for_log, &answer_for_log, &session, mode)
            })
            .await;

        Ok(QueryOutcome {
            snippets: fused.texts,
            answer,
        })
    }

    async fn refuse(&self, session_id: Option<&str>, detailed: bool) -> QueryOutcome {
        let mode = if detailed { "detailed" } else { "concise" };
        let session = session_id.unwrap_or("").to_string();
        let log = self.interaction_log.clone();
        self.worker_pool
            .run_blocking(move || log.record("", &[], INSUFFICIENT_EVIDENCE, &session, mode))
            .await;
        QueryOutcome {
            snippets: Vec::new(),
            answer: INSUFFICIENT_EVIDENCE.to_string(),
        }
    }

    /// Lazy-load the index handle on first query; subsequent queries reuse
    /// it (spec.md §4.10). Absent/unreadable files yield `None` rather than
    /// an error, per spec.md §4.4's propagation policy.
    async fn current_index(&self) -> Option<Arc<VectorIndex>> {
        if let Some(existing) = self.index.load_full() {
            return Some(existing);
        }
        let path = self.index_path.clone();
        let loaded = self.worker_pool.run_blocking(move || VectorIndex::load(&path)).await;
        match loaded {
            Some(index) => {
                let arc = Arc::new(index);
                self.index.store(Some(arc.clone()));
                Some(arc)
            }
            None => None,
        }
    }
}

/// Split the generated text on the first occurrence of `\n?Question:` or
/// `\n?Selected range` and keep the (trimmed) prefix, per spec.md §4.9 —
/// some local models echo the prompt template back after the answer.
fn post_process(text: &str) -> String {
    static SPLIT_RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    let re = SPLIT_RE.get_or_init(|| {
        Regex::new(r"\n?Question:|\n?Selected range").expect("static regex is valid")
    });
    match re.find(text) {
        Some(m) => text[..m.start()].trim().to_string(),
        None => text.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::fakes::FakeGenerator;
    use crate::retrieval::embeddings::fakes::FakeEmbedder;
    use crate::workbook::SheetData;

    struct FixedWorkbookReader(Vec<SheetData>);
    impl WorkbookReader for FixedWorkbookReader {
        fn read(&self, _path: &Path) -> AppResult<Vec<SheetData>> {
            Ok(self.0.clone())
        }
    }

    fn sample_sheets() -> Vec<SheetData> {
        vec![SheetData {
            name: "Sales".to_string(),
            columns: vec!["Product".to_string(), "Revenue".to_string()],
            rows: vec![
                vec!["A".to_string(), "100".to_string()],
                vec!["B".to_string(), "200".to_string()],
            ],
        }]
    }

    fn pipeline_with(sheets: Vec<SheetData>, answer: &str) -> Pipeline {
        let config = AppConfig {
            answerability_threshold: 0.0,
            evidence_overlap_threshold: 0.0,
            log_jsonl: std::env::temp_dir()
                .join(format!("tablerag-test-{}.jsonl", uuid::Uuid::new_v4()))
                .to_string_lossy()
                .to_string(),
            ..AppConfig::default()
        };
        Pipeline::new(
            config,
            Arc::new(FixedWorkbookReader(sheets)),
            Some(Arc::new(FakeEmbedder { dim: 16 })),
            Arc::new(tokio::sync::Mutex::new(Box::new(FakeGenerator {
                response: answer.to_string(),
            }) as Box<dyn Generator>)),
            Arc::new(WorkerPool::new()),
        )
    }

    #[tokio::test]
    async fn query_before_initialize_fails_not_initialized() {
        let pipeline = pipeline_with(sample_sheets(), "100");
        let err = pipeline.query("revenue of A", false, None, None, &[]).await;
        assert!(matches!(err, Err(AppError::NotInitialized)));
    }

    #[tokio::test]
    async fn initialize_then_query_returns_selected_snippets() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("book.xlsx");
        std::fs::write(&file, b"placeholder").unwrap();

        let pipeline = pipeline_with(sample_sheets(), "100");
        let count = pipeline.initialize(file.to_str().unwrap()).await.unwrap();
        assert_eq!(count, 2);

        let status = pipeline.status();
        assert_eq!(status.chunks_loaded, 2);
        assert!(status.has_index);

        let outcome = pipeline
            .query("what is the revenue of A", false, None, Some("s1"), &[])
            .await
            .unwrap();
        assert!(!outcome.snippets.is_empty());
        assert_eq!(outcome.answer, "100");
    }

    #[tokio::test]
    async fn initialize_on_missing_path_is_invalid_input() {
        let pipeline = pipeline_with(sample_sheets(), "100");
        let err = pipeline.initialize("/nonexistent/path.xlsx").await;
        assert!(matches!(err, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn empty_workbook_fails_empty_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("book.xlsx");
        std::fs::write(&file, b"placeholder").unwrap();

        let pipeline = pipeline_with(vec![], "100");
        let err = pipeline.initialize(file.to_str().unwrap()).await;
        assert!(matches!(err, Err(AppError::EmptyCorpus)));
    }

    #[test]
    fn post_process_strips_echoed_question_tail() {
        let text = "The answer is 100.\nQuestion: what about B?";
        assert_eq!(post_process(text), "The answer is 100.");
    }

    #[test]
    fn post_process_strips_echoed_selected_range_tail() {
        let text = "The answer is 100.\nSelected range: A1:B2";
        assert_eq!(post_process(text), "The answer is 100.");
    }

    #[test]
    fn post_process_leaves_plain_answers_untouched() {
        assert_eq!(post_process("  The answer is 100.  "), "The answer is 100.");
    }
}
