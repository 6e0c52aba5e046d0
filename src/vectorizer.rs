//! Character n-gram TF-IDF vector space.
//!
//! Thai text has no spaces between words, so word tokenization is a poor
//! fit; instead each whitespace-delimited run is padded with one space on
//! each side and cut into character n-grams (`n` in `[ngram_min, ngram_max]`).
//! A run shorter than `n` contributes itself once.
//!
//! # Weighting
//!
//! ```text
//! idf(t)  = ln((1 + N) / (1 + df(t))) + 1
//! w(t, d) = count(t, d) × idf(t), then L2-normalized per document
//! ```
//!
//! The vocabulary keeps the `max_features` most frequent n-grams across the
//! fitted corpus (ties broken alphabetically) and is indexed in
//! alphabetical order, so fitting the same corpus twice yields identical
//! vectors.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A sparse weight vector with strictly increasing `indices`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0f64;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] as f64 * other.values[j] as f64;
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// True when `indices` and `values` pair up and every index is below `dims`.
    pub fn fits_within(&self, dims: usize) -> bool {
        self.indices.len() == self.values.len()
            && self.indices.iter().all(|&i| (i as usize) < dims)
    }

    pub fn norm(&self) -> f64 {
        self.values
            .iter()
            .map(|v| (*v as f64) * (*v as f64))
            .sum::<f64>()
            .sqrt()
    }
}

/// Cosine similarity between two sparse vectors.
///
/// Returns `0.0` when either vector is empty or has zero norm.
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
    let denom = a.norm() * b.norm();
    if denom < f64::EPSILON {
        return 0.0;
    }
    a.dot(b) / denom
}

/// A fitted character n-gram TF-IDF model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharNgramVectorizer {
    ngram_min: usize,
    ngram_max: usize,
    vocabulary: HashMap<String, u32>,
    idf: Vec<f32>,
}

impl CharNgramVectorizer {
    /// Fit the vocabulary and IDF weights over `texts`.
    pub fn fit(texts: &[&str], ngram_min: usize, ngram_max: usize, max_features: usize) -> Self {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let mut total_freq: HashMap<String, usize> = HashMap::new();

        for text in texts {
            let counts = count_ngrams(text, ngram_min, ngram_max);
            for (gram, count) in counts {
                *total_freq.entry(gram.clone()).or_insert(0) += count;
                *doc_freq.entry(gram).or_insert(0) += 1;
            }
        }

        let mut terms: Vec<(String, usize)> = total_freq.into_iter().collect();
        if terms.len() > max_features {
            terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            terms.truncate(max_features);
        }
        terms.sort_by(|a, b| a.0.cmp(&b.0));

        let n_docs = texts.len() as f64;
        let mut vocabulary = HashMap::with_capacity(terms.len());
        let mut idf = Vec::with_capacity(terms.len());
        for (index, (term, _)) in terms.into_iter().enumerate() {
            let df = doc_freq.get(&term).copied().unwrap_or(0) as f64;
            idf.push((((1.0 + n_docs) / (1.0 + df)).ln() + 1.0) as f32);
            vocabulary.insert(term, index as u32);
        }

        Self {
            ngram_min,
            ngram_max,
            vocabulary,
            idf,
        }
    }

    /// Project `text` into the fitted space. Unknown n-grams are ignored.
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut weights: Vec<(u32, f32)> = count_ngrams(text, self.ngram_min, self.ngram_max)
            .into_iter()
            .filter_map(|(gram, count)| {
                let index = *self.vocabulary.get(&gram)?;
                Some((index, count as f32 * self.idf[index as usize]))
            })
            .collect();

        let norm = weights.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for (_, w) in &mut weights {
                *w /= norm;
            }
        }

        weights.sort_by_key(|(index, _)| *index);
        SparseVector {
            indices: weights.iter().map(|(i, _)| *i).collect(),
            values: weights.iter().map(|(_, w)| *w).collect(),
        }
    }

    pub fn features(&self) -> usize {
        self.vocabulary.len()
    }

    /// Check a deserialized model before use: one IDF weight per vocabulary
    /// entry, every vocabulary index in range, and a usable n-gram range.
    pub fn is_consistent(&self) -> bool {
        self.ngram_min >= 1
            && self.ngram_min <= self.ngram_max
            && self.idf.len() == self.vocabulary.len()
            && self
                .vocabulary
                .values()
                .all(|&index| (index as usize) < self.idf.len())
    }
}

fn count_ngrams(text: &str, ngram_min: usize, ngram_max: usize) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for gram in char_wb_ngrams(text, ngram_min, ngram_max) {
        *counts.entry(gram).or_insert(0) += 1;
    }
    counts
}

/// Word-bounded character n-grams of the lowercased `text`.
pub fn char_wb_ngrams(text: &str, ngram_min: usize, ngram_max: usize) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut grams = Vec::new();

    for word in lowered.split_whitespace() {
        let mut padded: Vec<char> = Vec::with_capacity(word.len() + 2);
        padded.push(' ');
        padded.extend(word.chars());
        padded.push(' ');

        for n in ngram_min..=ngram_max {
            if padded.len() <= n {
                // Short run: counted once, longer n would repeat it.
                grams.push(padded.iter().collect());
                break;
            }
            for window in padded.windows(n) {
                grams.push(window.iter().collect());
            }
        }
    }

    grams
}
