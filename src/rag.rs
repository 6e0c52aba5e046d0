//! Orchestrator: one question in, one grounded answer out.
//!
//! # Pipeline
//!
//! ```text
//! question ─► classify domain ─► retrieve ─┬─ no hits ─► fixed reply (fail)
//!                                          └─ hits ─► prompt ─► gateway ─► clean
//!                                                                   │
//!                                  every outcome ─► history log ◄───┘
//! ```
//!
//! The corpus is loaded lazily on first use and shared behind an `Arc`, so
//! concurrent questions read the same immutable snapshot. [`RagService::reload`]
//! builds a new snapshot and swaps the reference; questions already running
//! finish against the old one. The snapshot lock is only held to read or swap
//! the reference, never while a corpus is being built.
//!
//! On the async path, corpus loading and history writes run on the blocking
//! pool so they never stall a runtime worker.

use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::Utc;

use crate::backend::{GenerationBackend, OllamaBackend};
use crate::config::Config;
use crate::domain;
use crate::error::RagError;
use crate::gateway::GenerationGateway;
use crate::history::HistoryLog;
use crate::index::IndexedCorpus;
use crate::models::{
    AnswerSource, AskResponse, LogEntry, Reference, SearchHit, SearchResponse, Status,
};
use crate::prompt::{build_prompt, clean_answer, NO_CONTEXT_ANSWER};
use crate::retrieval;

pub struct RagService {
    config: Arc<Config>,
    current: RwLock<Option<Arc<IndexedCorpus>>>,
    /// Lets one async caller build the first snapshot while others wait.
    loading: tokio::sync::Mutex<()>,
    gateway: GenerationGateway,
    history: Arc<HistoryLog>,
}

impl RagService {
    /// Build a service around an existing gateway.
    pub fn new(config: Config, gateway: GenerationGateway) -> Self {
        let history = HistoryLog::new(&config.history.path, config.history.max_entries);
        Self {
            config: Arc::new(config),
            current: RwLock::new(None),
            loading: tokio::sync::Mutex::new(()),
            gateway,
            history: Arc::new(history),
        }
    }

    /// Build a service backed by the configured Ollama server.
    ///
    /// Spawns the gateway worker, so it must run inside a tokio runtime.
    pub fn from_config(config: Config) -> Result<Self, RagError> {
        let backend: Arc<dyn GenerationBackend> = Arc::new(OllamaBackend::new(&config.generation)?);
        let gateway = GenerationGateway::spawn(
            backend,
            config.generation.queue_capacity,
            config.generation.submit_timeout(),
        );
        Ok(Self::new(config, gateway))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn gateway(&self) -> &GenerationGateway {
        &self.gateway
    }

    /// The current corpus snapshot, loading it on first use.
    ///
    /// Blocking; async callers use [`RagService::load_corpus`].
    pub fn corpus(&self) -> Result<Arc<IndexedCorpus>, RagError> {
        if let Some(corpus) = self.snapshot() {
            return Ok(corpus);
        }
        let corpus = IndexedCorpus::open(&self.config)?;
        Ok(self.install_first(corpus))
    }

    /// The current corpus snapshot, building the first one on the blocking pool.
    pub async fn load_corpus(&self) -> Result<Arc<IndexedCorpus>, RagError> {
        if let Some(corpus) = self.snapshot() {
            return Ok(corpus);
        }
        let _loading = self.loading.lock().await;
        if let Some(corpus) = self.snapshot() {
            return Ok(corpus);
        }
        let config = self.config.clone();
        let corpus = tokio::task::spawn_blocking(move || IndexedCorpus::open(&config))
            .await
            .map_err(|e| RagError::Internal(e.into()))??;
        Ok(self.install_first(corpus))
    }

    fn snapshot(&self) -> Option<Arc<IndexedCorpus>> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Install `corpus` unless a concurrent `reload` already put one in place.
    fn install_first(&self, corpus: IndexedCorpus) -> Arc<IndexedCorpus> {
        let mut slot = self.current.write().unwrap_or_else(|e| e.into_inner());
        slot.get_or_insert_with(|| Arc::new(corpus)).clone()
    }

    /// Re-read the snapshot, rebuild the index and swap it in.
    pub fn reload(&self) -> Result<Arc<IndexedCorpus>, RagError> {
        let corpus = Arc::new(IndexedCorpus::rebuild(&self.config)?);
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(corpus.clone());
        tracing::info!(
            documents = corpus.documents.len(),
            features = corpus.index.features(),
            "corpus reloaded"
        );
        Ok(corpus)
    }

    /// Retrieval only: hits, references and the assembled context.
    pub fn search(&self, query: &str) -> Result<SearchResponse, RagError> {
        let corpus = self.corpus()?;
        let result = retrieval::retrieve(&corpus, query, &self.config.retrieval);
        Ok(SearchResponse {
            hits: result.hits.iter().map(SearchHit::from).collect(),
            references: result.references,
            context: result.context,
        })
    }

    /// Answer `question` from the corpus.
    ///
    /// An empty hit set is a normal `fail` response. Corpus and generation
    /// failures are logged as `fail` entries and then returned as errors.
    pub async fn ask(&self, question: &str) -> Result<AskResponse, RagError> {
        let started = Instant::now();
        let timestamp = Utc::now();
        let question = question.trim();
        let domain = domain::classify(question, &self.config.domains);

        let corpus = match self.load_corpus().await {
            Ok(corpus) => corpus,
            Err(e) => return Err(self.fail(timestamp, question, &domain, Vec::new(), e).await),
        };

        let retrieval = retrieval::retrieve(&corpus, question, &self.config.retrieval);
        if retrieval.is_empty() {
            let response = AskResponse {
                answer: NO_CONTEXT_ANSWER.to_string(),
                main_reference: None,
                references: Vec::new(),
                domain,
                status: Status::Fail,
            };
            self.record(timestamp, question, &response, AnswerSource::NoContext)
                .await;
            finished(started, &response);
            return Ok(response);
        }

        let prompt = build_prompt(&retrieval.context, question);
        let references = retrieval.references;
        let raw = match self.gateway.submit(prompt).await {
            Ok(raw) => raw,
            Err(e) => return Err(self.fail(timestamp, question, &domain, references, e).await),
        };

        let response = AskResponse {
            answer: clean_answer(&raw),
            main_reference: primary_title(&references),
            references,
            domain,
            status: Status::Success,
        };
        self.record(timestamp, question, &response, AnswerSource::Llm)
            .await;
        finished(started, &response);
        Ok(response)
    }

    /// All retained history entries, oldest first.
    pub fn history(&self) -> Vec<LogEntry> {
        self.history.all()
    }

    pub fn last(&self) -> Option<LogEntry> {
        self.history.last()
    }

    async fn record(
        &self,
        timestamp: chrono::DateTime<Utc>,
        question: &str,
        response: &AskResponse,
        answer_source: AnswerSource,
    ) {
        let entry = LogEntry {
            timestamp,
            question: question.to_string(),
            domain: response.domain.clone(),
            main_reference: response.main_reference.clone(),
            references: response.references.clone(),
            answer: response.answer.clone(),
            status: response.status,
            answer_source,
        };
        let history = self.history.clone();
        let written = tokio::task::spawn_blocking(move || history.append(entry))
            .await
            .map_err(anyhow::Error::from)
            .and_then(|appended| appended);
        if let Err(e) = written {
            tracing::warn!(path = %self.history.path().display(), error = %e, "failed to write history");
        }
    }

    /// Log a failed question and hand the error back to the caller.
    async fn fail(
        &self,
        timestamp: chrono::DateTime<Utc>,
        question: &str,
        domain: &str,
        references: Vec<Reference>,
        error: RagError,
    ) -> RagError {
        tracing::warn!(domain, code = error.code(), error = %error, "ask failed");
        let response = AskResponse {
            answer: error.to_string(),
            main_reference: primary_title(&references),
            references,
            domain: domain.to_string(),
            status: Status::Fail,
        };
        self.record(timestamp, question, &response, AnswerSource::Error)
            .await;
        error
    }
}

fn primary_title(references: &[Reference]) -> Option<String> {
    references
        .iter()
        .find(|r| r.is_primary)
        .map(|r| r.title.clone())
}

fn finished(started: Instant, response: &AskResponse) {
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        status = ?response.status,
        domain = %response.domain,
        references = response.references.len(),
        "ask complete"
    );
}
