//! Core data models used throughout the pipeline.
//!
//! These types represent the documents, retrieval hits, references and
//! history records that flow through a question/answer cycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A corpus document, immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Ruling letter number, or empty when none could be found.
    pub id: String,
    pub title: String,
    /// Normalized body used for display and window splitting.
    pub content: String,
    /// Title plus salient fields, used only for whole-document ranking.
    pub search_text: String,
}

impl Document {
    /// Label used in the assembled context: `"<id>: <title>"` or just the title.
    pub fn label(&self) -> String {
        if self.id.is_empty() {
            self.title.clone()
        } else {
            format!("{}: {}", self.id, self.title)
        }
    }
}

/// A retrieved document together with its best-matching window.
#[derive(Debug, Clone)]
pub struct Hit<'a> {
    pub document: &'a Document,
    pub score: f64,
    pub segment: String,
    /// Character offset of `segment` within `document.content`.
    pub segment_start: usize,
    pub segment_score: f64,
}

/// A document reference returned alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Document score rounded to 4 decimals.
    pub score: f64,
    pub is_primary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Fail,
}

/// Where the returned answer text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// Generated by the backend from retrieved context.
    Llm,
    /// Fixed reply used when nothing cleared the similarity threshold.
    NoContext,
    /// The request failed; the answer holds the error message.
    Error,
}

/// One question/answer record in the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub domain: String,
    #[serde(default)]
    pub main_reference: Option<String>,
    #[serde(default)]
    pub references: Vec<Reference>,
    pub answer: String,
    pub status: Status,
    pub answer_source: AnswerSource,
}

/// Response envelope for a single `ask`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_reference: Option<String>,
    pub references: Vec<Reference>,
    pub domain: String,
    pub status: Status,
}

/// An owned retrieval hit, for callers that outlive the corpus borrow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub label: String,
    pub score: f64,
    pub segment_start: usize,
    pub segment_score: f64,
    pub segment: String,
}

impl From<&Hit<'_>> for SearchHit {
    fn from(hit: &Hit<'_>) -> Self {
        Self {
            label: hit.document.label(),
            score: hit.score,
            segment_start: hit.segment_start,
            segment_score: hit.segment_score,
            segment: hit.segment.clone(),
        }
    }
}

/// Retrieval output without generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub references: Vec<Reference>,
    pub context: String,
}
