//! Overlapping fixed-size window splitter.
//!
//! Splits a document's content into windows of `window` characters where
//! consecutive windows share `overlap` characters, so a relevant phrase
//! that straddles one boundary lies wholly inside the next window.
//!
//! Offsets and lengths are in `char`s, not bytes: the corpus is Thai and
//! byte slicing would cut through multi-byte characters.
//!
//! # Example
//!
//! ```rust
//! use ruling_rag::chunk::split_windows;
//!
//! let text = "a".repeat(1200);
//! let windows = split_windows(&text, 600, 100);
//! let starts: Vec<usize> = windows.iter().map(|w| w.start).collect();
//! assert_eq!(starts, vec![0, 500, 1000]);
//! ```

/// A window of document content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Character offset of the window within the content.
    pub start: usize,
    pub text: String,
}

impl Segment {
    /// Length in characters.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Whether the character offset `offset` falls inside this window.
    pub fn contains_offset(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.start + self.len()
    }
}

/// Split `text` into overlapping windows.
///
/// # Guarantees
///
/// - At least one segment is returned (the whole text when it is no
///   longer than `window`, including empty text).
/// - Every character belongs to at least one segment.
/// - The last segment ends at the end of the text.
///
/// `overlap` is clamped below `window` so the step is always positive.
pub fn split_windows(text: &str, window: usize, overlap: usize) -> Vec<Segment> {
    let chars: Vec<char> = text.chars().collect();
    let window = window.max(1);

    if chars.len() <= window {
        return vec![Segment {
            start: 0,
            text: text.to_string(),
        }];
    }

    let step = window - overlap.min(window - 1);
    let mut segments = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + window).min(chars.len());
        segments.push(Segment {
            start,
            text: chars[start..end].iter().collect(),
        });
        if end == chars.len() {
            break;
        }
        start += step;
    }

    segments
}
