//! Corpus Index: a fitted vector space plus one weight vector per document.
//!
//! The index is built from each document's `search_text` and cached as JSON
//! at `[index].cache_path`. A cached index is reused only when its row count
//! equals the live document count and its vectors agree with its vocabulary;
//! anything else (missing file, unreadable JSON, out-of-range indices, row
//! mismatch) is logged and rebuilt, and the cache is rewritten.

use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::atomic::write_atomic;
use crate::config::{Config, IndexConfig};
use crate::corpus;
use crate::error::RagError;
use crate::models::Document;
use crate::vectorizer::{cosine_similarity, CharNgramVectorizer, SparseVector};

/// Serializes cache rewrites within the process.
static CACHE_WRITE: Mutex<()> = Mutex::new(());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusIndex {
    vectorizer: CharNgramVectorizer,
    vectors: Vec<SparseVector>,
}

impl CorpusIndex {
    /// Fit a fresh index over `documents`.
    pub fn build(documents: &[Document], config: &IndexConfig) -> Self {
        let texts: Vec<&str> = documents.iter().map(|d| d.search_text.as_str()).collect();
        let vectorizer = CharNgramVectorizer::fit(
            &texts,
            config.ngram_min,
            config.ngram_max,
            config.max_features,
        );
        let vectors = texts.iter().map(|t| vectorizer.transform(t)).collect();

        let index = Self {
            vectorizer,
            vectors,
        };
        tracing::info!(
            documents = documents.len(),
            features = index.features(),
            "built corpus index"
        );
        index
    }

    /// Reuse the cached index when valid, otherwise rebuild and overwrite it.
    pub fn load(documents: &[Document], config: &IndexConfig) -> Self {
        if let Some(cached) = read_cache(&config.cache_path) {
            if cached.rows() == documents.len() {
                tracing::info!(
                    documents = documents.len(),
                    features = cached.features(),
                    "loaded corpus index from cache"
                );
                return cached;
            }
            tracing::warn!(
                cached_rows = cached.rows(),
                documents = documents.len(),
                "index cache row count mismatch, rebuilding"
            );
        }

        let index = Self::build(documents, config);
        index.persist(&config.cache_path);
        index
    }

    /// Write the index to the cache path. Failures are logged, not returned:
    /// the in-memory index stays usable and the next load rebuilds.
    pub fn persist(&self, path: &Path) {
        if let Err(e) = write_cache(path, self) {
            tracing::warn!(path = %path.display(), error = %e, "failed to write index cache");
        }
    }

    pub fn rows(&self) -> usize {
        self.vectors.len()
    }

    pub fn features(&self) -> usize {
        self.vectorizer.features()
    }

    /// Every stored vector lives in the vectorizer's space.
    fn is_consistent(&self) -> bool {
        self.vectorizer.is_consistent()
            && self
                .vectors
                .iter()
                .all(|v| v.fits_within(self.vectorizer.features()))
    }

    /// Cosine similarity of `query` against every document, in corpus order.
    pub fn score(&self, query: &str) -> Vec<f64> {
        let q = self.vectorizer.transform(query);
        self.vectors
            .iter()
            .map(|v| cosine_similarity(&q, v))
            .collect()
    }

    /// Score arbitrary texts (e.g. sub-windows) in the same vector space.
    pub fn score_texts(&self, query: &str, texts: &[&str]) -> Vec<f64> {
        let q = self.vectorizer.transform(query);
        texts
            .iter()
            .map(|t| cosine_similarity(&q, &self.vectorizer.transform(t)))
            .collect()
    }
}

fn read_cache(path: &Path) -> Option<CorpusIndex> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no index cache, building");
            return None;
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable index cache, rebuilding");
            return None;
        }
    };
    match serde_json::from_slice::<CorpusIndex>(&raw) {
        Ok(index) if index.is_consistent() => Some(index),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "inconsistent index cache, rebuilding");
            None
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "corrupt index cache, rebuilding");
            None
        }
    }
}

fn write_cache(path: &Path, index: &CorpusIndex) -> Result<()> {
    let bytes = serde_json::to_vec(index)?;
    let _guard = CACHE_WRITE.lock().unwrap_or_else(|e| e.into_inner());
    write_atomic(path, &bytes)
}

/// Documents and their index, shared read-only between requests.
#[derive(Debug)]
pub struct IndexedCorpus {
    pub documents: Vec<Document>,
    pub index: CorpusIndex,
}

impl IndexedCorpus {
    /// Load the snapshot and its index, reusing a valid cache.
    pub fn open(config: &Config) -> Result<Self, RagError> {
        let documents = corpus::load_documents(&config.corpus.path)?;
        let index = CorpusIndex::load(&documents, &config.index);
        Ok(Self { documents, index })
    }

    /// Load the snapshot and force a fresh index, overwriting the cache.
    pub fn rebuild(config: &Config) -> Result<Self, RagError> {
        let documents = corpus::load_documents(&config.corpus.path)?;
        let index = CorpusIndex::build(&documents, &config.index);
        index.persist(&config.index.cache_path);
        Ok(Self { documents, index })
    }
}
