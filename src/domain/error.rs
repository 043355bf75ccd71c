// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Two kinds of failure flow through the pipeline:
//
//   PipelineError — aborts the run. Bad configuration, a
//                   missing artifact, a corrupt file.
//
//   SkipReason    — affects a single row only. The row is
//                   dropped, the reason is counted, and the
//                   batch keeps going.
//
// Out-of-vocabulary tokens are neither: they resolve to the
// reserved OOV id and are only counted for diagnostics.
//
// Reference: Rust Book §9 (Recoverable Errors with Result)
//            thiserror crate documentation

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for library-level pipeline code.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

// ─── PipelineError ────────────────────────────────────────────────────────────
/// Fatal errors. Any of these stops a preprocessing run or an encode request
/// before it produces partial output.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid setting detected at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A required artifact is not on disk.
    #[error("Missing {kind} at '{}'", .path.display())]
    ResourceMissing { kind: &'static str, path: PathBuf },

    /// A file exists but its contents cannot be parsed.
    #[error("Malformed file '{}' (line {line}): {reason}", .path.display())]
    Format {
        path:   PathBuf,
        line:   usize,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl PipelineError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        PipelineError::Configuration(msg.into())
    }

    /// Create a missing-resource error naming the artifact kind and path.
    pub fn missing(kind: &'static str, path: impl AsRef<Path>) -> Self {
        PipelineError::ResourceMissing { kind, path: path.as_ref().to_path_buf() }
    }

    /// Create a format error at a 1-based line number.
    pub fn format(path: impl AsRef<Path>, line: usize, reason: impl Into<String>) -> Self {
        PipelineError::Format {
            path:   path.as_ref().to_path_buf(),
            line,
            reason: reason.into(),
        }
    }
}

// ─── SkipReason ───────────────────────────────────────────────────────────────
/// Why one input row was left out of a fit or write pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The row had no value for a required column.
    MissingField(&'static str),
    /// The text column was present but blank.
    EmptyText,
    /// The reader could not split the row into columns.
    MalformedRow(String),
    /// The linguistic tokenizer rejected the text.
    TokenizerFailure(String),
    /// Tokenization produced nothing to write.
    NoTokens,
    /// More tokens than the configured ceiling.
    TooLong { num_tokens: usize, max_tokens: usize },
    /// The same text already appeared earlier in the dataset.
    Duplicate,
}

impl SkipReason {
    /// Stable key used in the skip histogram and the skip log.
    pub fn kind(&self) -> &'static str {
        match self {
            SkipReason::MissingField(_)     => "missing_field",
            SkipReason::EmptyText           => "empty_text",
            SkipReason::MalformedRow(_)     => "malformed_row",
            SkipReason::TokenizerFailure(_) => "tokenizer_failure",
            SkipReason::NoTokens            => "no_tokens",
            SkipReason::TooLong { .. }      => "too_long",
            SkipReason::Duplicate           => "duplicate",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingField(field) => write!(f, "missing field '{field}'"),
            SkipReason::EmptyText           => write!(f, "empty text"),
            SkipReason::MalformedRow(why)   => write!(f, "malformed row: {why}"),
            SkipReason::TokenizerFailure(e) => write!(f, "tokenizer failure: {e}"),
            SkipReason::NoTokens            => write!(f, "no tokens"),
            SkipReason::TooLong { num_tokens, max_tokens } => {
                write!(f, "{num_tokens} tokens exceeds ceiling of {max_tokens}")
            }
            SkipReason::Duplicate           => write!(f, "duplicate text"),
        }
    }
}

// ─── SkipStats ────────────────────────────────────────────────────────────────
/// Histogram of skip reasons, keyed by `SkipReason::kind`.
///
/// Serialised into `meta.json` so every dropped row is accounted for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipStats {
    pub counts: BTreeMap<String, usize>,
}

impl SkipStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, reason: &SkipReason) {
        *self.counts.entry(reason.kind().to_string()).or_insert(0) += 1;
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn get(&self, kind: &str) -> usize {
        self.counts.get(kind).copied().unwrap_or(0)
    }

    /// Fold another histogram into this one (used when merging shards).
    pub fn merge(&mut self, other: &SkipStats) {
        for (kind, n) in &other.counts {
            *self.counts.entry(kind.clone()).or_insert(0) += n;
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_stats_histogram() {
        let mut stats = SkipStats::new();
        stats.record(&SkipReason::EmptyText);
        stats.record(&SkipReason::EmptyText);
        stats.record(&SkipReason::TooLong { num_tokens: 60, max_tokens: 50 });

        assert_eq!(stats.get("empty_text"), 2);
        assert_eq!(stats.get("too_long"),   1);
        assert_eq!(stats.get("no_tokens"),  0);
        assert_eq!(stats.total(), 3);
    }

    #[test]
    fn test_skip_stats_merge() {
        let mut a = SkipStats::new();
        a.record(&SkipReason::MissingField("text"));
        let mut b = SkipStats::new();
        b.record(&SkipReason::MissingField("class"));
        b.record(&SkipReason::NoTokens);

        a.merge(&b);
        assert_eq!(a.get("missing_field"), 2);
        assert_eq!(a.get("no_tokens"),     1);
    }

    #[test]
    fn test_missing_error_names_path() {
        let err = PipelineError::missing("word index", "out/word_index.json");
        let msg = err.to_string();
        assert!(msg.contains("word index"));
        assert!(msg.contains("out/word_index.json"));
    }
}
