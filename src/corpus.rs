//! Corpus snapshot loading.
//!
//! The scraper writes one JSON snapshot in one of two shapes:
//!
//! - month groups: `[{"year": .., "month": .., "documents": [{..}, ..]}, ..]`
//!   where each document carries the ruling fields (`title`, `เรื่อง`,
//!   `ข้อกฎหมาย`, `ข้อหารือ`, `แนววินิจฉัย`, `เลขที่หนังสือ`);
//! - a flat list of `{"title", "content", "id" | "no"}` records.
//!
//! Records are heterogeneous, so every field goes through
//! [`RawRecord::from_value`], which tolerates missing or oddly typed values.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::error::RagError;
use crate::models::Document;

const FIELD_SUBJECT: &str = "เรื่อง";
const FIELD_LAW: &str = "ข้อกฎหมาย";
const FIELD_INQUIRY: &str = "ข้อหารือ";
const FIELD_RULING: &str = "แนววินิจฉัย";
const FIELD_LETTER_NO: &str = "เลขที่หนังสือ";

/// A scraped record with every field optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub law: Option<String>,
    pub inquiry: Option<String>,
    pub ruling: Option<String>,
    pub letter_no: Option<String>,
    pub no: Option<String>,
    pub id: Option<String>,
    pub content: Option<String>,
}

impl RawRecord {
    pub fn from_value(value: &Value) -> Self {
        Self {
            title: text_field(value, "title"),
            subject: text_field(value, FIELD_SUBJECT),
            law: text_field(value, FIELD_LAW),
            inquiry: text_field(value, FIELD_INQUIRY),
            ruling: text_field(value, FIELD_RULING),
            letter_no: text_field(value, FIELD_LETTER_NO),
            no: text_field(value, "no"),
            id: text_field(value, "id"),
            content: text_field(value, "content"),
        }
    }

    fn title_or_subject(&self) -> String {
        self.title
            .clone()
            .or_else(|| self.subject.clone())
            .unwrap_or_default()
    }
}

/// Extract a non-empty text value. Numbers are rendered as text; other
/// types count as absent.
fn text_field(value: &Value, key: &str) -> Option<String> {
    let text = match value.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Read and parse the snapshot at `path`.
pub fn load_documents(path: &Path) -> Result<Vec<Document>, RagError> {
    if !path.exists() {
        return Err(RagError::CorpusNotFound(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| RagError::CorpusInvalid(format!("{}: {}", path.display(), e)))?;
    parse_snapshot(&raw)
}

pub fn parse_snapshot(raw: &str) -> Result<Vec<Document>, RagError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| RagError::CorpusInvalid(e.to_string()))?;
    let entries = value
        .as_array()
        .ok_or_else(|| RagError::CorpusInvalid("top-level value must be an array".into()))?;

    let month_shaped = entries
        .first()
        .map(|first| first.get("month").is_some())
        .unwrap_or(false);

    let documents = if month_shaped {
        entries
            .iter()
            .filter_map(|month| month.get("documents").and_then(Value::as_array))
            .flatten()
            .map(|doc| ruling_document(&RawRecord::from_value(doc)))
            .collect()
    } else {
        entries
            .iter()
            .map(|doc| flat_document(&RawRecord::from_value(doc)))
            .collect()
    };

    Ok(documents)
}

fn ruling_document(record: &RawRecord) -> Document {
    let title = normalize_text(&record.title_or_subject());
    let inquiry = record.inquiry.as_deref().unwrap_or_default();
    let ruling = record.ruling.as_deref().unwrap_or_default();

    Document {
        id: extract_id(record, &title),
        search_text: normalize_text(&format!("{} {} {}", title, inquiry, ruling)),
        content: normalize_text(&format!(
            "{}: {}\n{}: {}",
            FIELD_INQUIRY, inquiry, FIELD_RULING, ruling
        )),
        title,
    }
}

fn flat_document(record: &RawRecord) -> Document {
    let title = normalize_text(&record.title_or_subject());
    let content = normalize_text(record.content.as_deref().unwrap_or_default());

    Document {
        id: extract_id(record, &title),
        search_text: normalize_text(&format!("{} {}", title, content)),
        content,
        title,
    }
}

/// Find the document identifier: structured fields first, then a letter
/// number pattern in the title, else empty.
pub fn extract_id(record: &RawRecord, title: &str) -> String {
    let structured = [&record.letter_no, &record.no, &record.id];
    if let Some(found) = structured.into_iter().flatten().next() {
        return collapse_spaces(found);
    }

    letter_no_pattern()
        .find(title)
        .map(|m| collapse_spaces(m.as_str()))
        .unwrap_or_default()
}

/// Revenue Department letter numbers, e.g. `กค 0702/1234` or `กค 0811/พ./5678`.
fn letter_no_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"กค\s*\.?\s*\d{4}(?:\s*/\s*[ก-ฮ]+\.?)?\s*/\s*\d+")
            .expect("letter number pattern is valid")
    })
}

fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize scraped text: unify line endings, collapse horizontal
/// whitespace, trim lines and squeeze blank-line runs to one.
pub fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(unified.len());
    let mut blank_run = false;

    for line in unified.split('\n') {
        let line = line
            .split(|c: char| c.is_whitespace())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if line.is_empty() {
            if !out.is_empty() {
                blank_run = true;
            }
            continue;
        }

        if !out.is_empty() {
            out.push('\n');
            if blank_run {
                out.push('\n');
            }
        }
        blank_run = false;
        out.push_str(&line);
    }

    out
}
