//! Two-stage retrieval with overlapping-window refinement.
//!
//! # Algorithm
//!
//! 1. Score every document's `search_text` against the query (cosine in the
//!    corpus TF-IDF space).
//! 2. Stable-sort by score (desc), so ties keep corpus order.
//! 3. Keep the top `top_k` documents scoring `>= min_similarity`. An empty
//!    result is a normal outcome.
//! 4. Split each survivor's `content` into overlapping windows and score
//!    them in the same space; the best window becomes the passage.
//! 5. Concatenate `--- <label> ---` sections in rank order and cut the
//!    whole string at `max_context_chars` characters. The cut is applied to
//!    the concatenation, so lower-ranked sections may be truncated or
//!    dropped entirely.

use crate::chunk::split_windows;
use crate::config::RetrievalConfig;
use crate::index::IndexedCorpus;
use crate::models::{Hit, Reference};

/// Hits plus the context and references derived from them.
#[derive(Debug, Clone)]
pub struct Retrieval<'a> {
    pub hits: Vec<Hit<'a>>,
    pub context: String,
    pub references: Vec<Reference>,
}

impl Retrieval<'_> {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// Run both ranking stages and assemble the context.
pub fn retrieve<'a>(
    corpus: &'a IndexedCorpus,
    query: &str,
    params: &RetrievalConfig,
) -> Retrieval<'a> {
    let hits = rank(corpus, query, params);
    let (context, references) = build_context(&hits, params.max_context_chars);
    Retrieval {
        hits,
        context,
        references,
    }
}

/// Document-level ranking followed by per-document window refinement.
pub fn rank<'a>(corpus: &'a IndexedCorpus, query: &str, params: &RetrievalConfig) -> Vec<Hit<'a>> {
    if query.trim().is_empty() {
        return Vec::new();
    }

    let ranked = rank_documents(&corpus.index.score(query), params);

    let hits: Vec<Hit<'a>> = ranked
        .into_iter()
        .map(|(position, score)| {
            let document = &corpus.documents[position];
            let (segment_start, segment, segment_score) =
                best_segment(corpus, query, &document.content, params);
            Hit {
                document,
                score,
                segment,
                segment_start,
                segment_score,
            }
        })
        .collect();

    tracing::debug!(
        hits = hits.len(),
        top_score = hits.first().map(|h| h.score).unwrap_or(0.0),
        "retrieval complete"
    );

    hits
}

/// Positions and scores of the documents that survive the cut, best first.
pub fn rank_documents(scores: &[f64], params: &RetrievalConfig) -> Vec<(usize, f64)> {
    let mut ranked: Vec<(usize, f64)> = scores.iter().copied().enumerate().collect();
    // sort_by is stable: equal scores keep corpus order.
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(params.top_k);
    ranked.retain(|(_, score)| *score >= params.min_similarity);
    ranked
}

/// The highest-scoring window of `content`: `(start, text, score)`.
/// The first window wins ties.
pub fn best_segment(
    corpus: &IndexedCorpus,
    query: &str,
    content: &str,
    params: &RetrievalConfig,
) -> (usize, String, f64) {
    // split_windows always yields at least one segment.
    let mut segments = split_windows(content, params.window_chars, params.overlap_chars);
    let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
    let scores = corpus.index.score_texts(query, &texts);

    let mut best = 0;
    for (i, score) in scores.iter().enumerate() {
        if *score > scores[best] {
            best = i;
        }
    }

    let segment = segments.swap_remove(best);
    (segment.start, segment.text, scores[best])
}

/// Assemble the labelled context and the reference list.
pub fn build_context(hits: &[Hit<'_>], max_chars: usize) -> (String, Vec<Reference>) {
    let mut context = String::new();
    let mut references = Vec::with_capacity(hits.len());

    for (i, hit) in hits.iter().enumerate() {
        context.push_str(&format!("\n--- {} ---\n{}\n", hit.document.label(), hit.segment));
        references.push(Reference {
            title: hit.document.title.clone(),
            id: Some(hit.document.id.clone()).filter(|id| !id.is_empty()),
            score: round4(hit.score),
            is_primary: i == 0,
        });
    }

    (truncate_chars(&context, max_chars), references)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_end, _)) => text[..byte_end].to_string(),
        None => text.to_string(),
    }
}

fn round4(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}
