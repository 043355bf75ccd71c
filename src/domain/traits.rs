// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The pipeline leans on three outside capabilities that are
// easy to swap:
//
//   - a row source              (SemEval TSVs, Sentiment140 CSV)
//   - a linguistic tokenizer    (split + POS tag + lemma)
//   - a word segmenter          (only used to split hashtags)
//
// plus one internal seam: a correction strategy, so the OOV
// correction policy is an ordered list of small strategies
// that can be tested one at a time.
//
// Everything here is object safe so the application layer
// can hold `Box<dyn ...>` / `Arc<dyn ...>` and not care which
// concrete type is behind it.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)
//            Rust Book §17 (Trait Objects)

use crate::domain::error::{PipelineResult, SkipReason};
use crate::domain::example::RawText;

// ─── RowSource ────────────────────────────────────────────────────────────────
/// Rows read from a dataset, plus the rows that could not be used.
#[derive(Debug, Default)]
pub struct LoadedRows {
    pub rows:    Vec<RawText>,
    /// (1-based row number, reason)
    pub skipped: Vec<(usize, SkipReason)>,
}

/// Any component that can load labelled raw text.
///
/// Implementations:
///   - SemEvalLoader  → directory of `id \t class \t text` TSV files
///   - Sent140Loader  → six-column Sentiment140 CSV
pub trait RowSource {
    /// Load every usable row. Unusable rows are reported, not fatal;
    /// only I/O or configuration problems return `Err`.
    fn load_rows(&self) -> PipelineResult<LoadedRows>;
}

// ─── LinguisticTokenizer ──────────────────────────────────────────────────────
/// One token and its part-of-speech tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedToken {
    pub text: String,
    pub tag:  String,
}

impl TaggedToken {
    pub fn new(text: impl Into<String>, tag: impl Into<String>) -> Self {
        Self { text: text.into(), tag: tag.into() }
    }
}

/// Splits normalized text into tagged tokens.
///
/// Must be deterministic: the same input always yields the same tokens
/// and tags. A text the implementation cannot handle is reported with a
/// `SkipReason` so the caller can drop just that row.
pub trait LinguisticTokenizer: Send + Sync {
    fn tag(&self, text: &str) -> Result<Vec<TaggedToken>, SkipReason>;

    /// Dictionary form of a word, if the implementation knows one.
    fn lemma(&self, word: &str, tag: &str) -> Option<String>;

    /// Every tag this tokenizer can emit, in a fixed order.
    /// The tag index is built from this list.
    fn tag_set(&self) -> &[&'static str];
}

// ─── WordSegmenter ────────────────────────────────────────────────────────────
/// Splits a run-on string ("iloveyou") into words ("i love you").
pub trait WordSegmenter: Send + Sync {
    /// Input is lowercase ASCII alphanumerics. Output words concatenate
    /// back to the input.
    fn segment(&self, text: &str) -> Vec<String>;
}

// ─── CorrectionStrategy ───────────────────────────────────────────────────────
/// What a strategy proposes for an out-of-vocabulary token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correction {
    /// Replace unconditionally (pattern canonicalization).
    Canonical(String),
    /// Replace with the first candidate found in the vocabulary.
    Candidates(Vec<String>),
    /// This strategy has nothing to offer.
    Pass,
}

/// One step of the OOV-correction chain.
pub trait CorrectionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn propose(&self, token: &TaggedToken) -> Correction;
}
