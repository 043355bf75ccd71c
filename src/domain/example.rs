// ============================================================
// Layer 3 — Text, Token and Example Types
// ============================================================
// The three shapes a tweet passes through:
//
//   RawText        — what the loader read: text + optional label
//   TokenSequence  — what the tokenizer produced: parallel lists
//                    of original tokens, corrected tokens and tags
//   Example        — what gets persisted: corrected tokens, tags,
//                    token count and integer class label
//
// ClassIndex maps the dataset's string labels to those
// integer ids (sorted, so the mapping is stable).
//
// Example:
//   raw:        "Loving it :)"
//   normalized: "loving it <smile>"
//   original:   ["loving", "it", "<smile>"]
//   corrected:  ["loving", "it", "<smile>"]
//   tags:       ["VBG", "PRP", "SYM"]
//
// Reference: Rust Book §5 (Structs)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ─── RawText ──────────────────────────────────────────────────────────────────
/// One loaded row before any normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawText {
    pub text:  String,
    pub label: Option<String>,
}

impl RawText {
    pub fn new(text: impl Into<String>, label: Option<String>) -> Self {
        Self { text: text.into(), label }
    }

    pub fn unlabelled(text: impl Into<String>) -> Self {
        Self::new(text, None)
    }
}

// ─── TokenSequence ────────────────────────────────────────────────────────────
/// Output of `Tokenizer::tokenize`.
///
/// The three lists are parallel: position `i` of each describes the same
/// token. `corrected` is what gets indexed; `original` keeps the surface
/// form for inspection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSequence {
    pub original:  Vec<String>,
    pub corrected: Vec<String>,
    pub tags:      Vec<String>,
}

impl TokenSequence {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            original:  Vec::with_capacity(n),
            corrected: Vec::with_capacity(n),
            tags:      Vec::with_capacity(n),
        }
    }

    /// Append one token with its corrected form and tag.
    pub fn push(&mut self, original: String, corrected: String, tag: String) {
        self.original.push(original);
        self.corrected.push(corrected);
        self.tags.push(tag);
    }

    pub fn num_tokens(&self) -> usize {
        self.corrected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corrected.is_empty()
    }

    /// True when all three lists have the same length.
    pub fn is_aligned(&self) -> bool {
        self.original.len() == self.corrected.len() && self.corrected.len() == self.tags.len()
    }
}

// ─── Example ──────────────────────────────────────────────────────────────────
/// One persisted record. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    /// Corrected tokens, the strings that get indexed.
    pub tokens: Vec<String>,

    /// One POS tag per token.
    pub tags: Vec<String>,

    /// Always equal to `tokens.len()`, and at least 1 for anything written.
    pub num_tokens: usize,

    /// Class id from `classes.json`.
    pub label: usize,

    /// Surface tokens before correction. Only kept for inspection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub original_tokens: Vec<String>,
}

impl Example {
    /// Build an example from a tokenized row.
    pub fn from_sequence(seq: TokenSequence, label: usize) -> Self {
        Self {
            num_tokens:      seq.corrected.len(),
            tokens:          seq.corrected,
            tags:            seq.tags,
            label,
            original_tokens: seq.original,
        }
    }

    /// Check the structural invariants a reader relies on.
    ///
    /// Returns a human-readable reason on failure so the record reader can
    /// report it with a line number.
    pub fn validate(&self) -> Result<(), String> {
        if self.tokens.len() != self.tags.len() {
            return Err(format!(
                "{} tokens but {} tags",
                self.tokens.len(),
                self.tags.len()
            ));
        }
        if self.num_tokens != self.tokens.len() {
            return Err(format!(
                "num_tokens is {} but there are {} tokens",
                self.num_tokens,
                self.tokens.len()
            ));
        }
        if self.num_tokens == 0 {
            return Err("example has no tokens".to_string());
        }
        Ok(())
    }
}

// ─── ClassIndex ───────────────────────────────────────────────────────────────
/// Label → class id, persisted as `classes.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassIndex {
    ids: BTreeMap<String, usize>,
}

impl ClassIndex {
    /// Distinct labels, sorted, numbered from 0.
    pub fn from_labels<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut names: Vec<&str> = labels.into_iter().collect();
        names.sort_unstable();
        names.dedup();
        let ids = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();
        Self { ids }
    }

    pub fn id(&self, label: &str) -> Option<usize> {
        self.ids.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Label names in id order.
    pub fn names(&self) -> Vec<&str> {
        let mut pairs: Vec<(&str, usize)> = self.ids.iter().map(|(k, &v)| (k.as_str(), v)).collect();
        pairs.sort_by_key(|&(_, id)| id);
        pairs.into_iter().map(|(k, _)| k).collect()
    }
}
