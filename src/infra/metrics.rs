// ============================================================
// Layer 6 — Run Metrics & Skip Log
// ============================================================
// Two records of what a preprocessing run did:
//
//   meta.json     RunMetrics, one object per run: example
//                 counts, vocabulary sizes, embedding misses
//                 and the skip histogram. The encode path reads
//                 it back to report its parameters.
//
//   skipped.csv   one row per dropped input row, appended as
//                 the run goes, so no skip is silent:
//
//                   stage,row,reason,detail
//                   load,17,missing_field,missing field 'text'
//                   tokenize,230,no_tokens,no tokens
//                   write,0,too_long,61 tokens exceeds ceiling of 50
//
// The CSV is written with the csv crate so a detail string
// containing commas or quotes stays a single field.
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::error::{PipelineResult, SkipReason, SkipStats};

pub const SKIP_LOG_FILE: &str = "skipped.csv";

// ─── RunMetrics ───────────────────────────────────────────────────────────────
/// Summary of one preprocessing run, persisted as `meta.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub num_train:           usize,
    pub num_val:             usize,
    pub num_classes:         usize,
    pub num_tags:            usize,
    pub num_words:           usize,
    pub num_chars:           usize,
    pub num_frequency_words: usize,
    pub num_trainable:       usize,
    pub embedding_misses:    usize,
    pub word_dim:            usize,
    pub char_dim:            usize,
    pub max_tokens:          usize,
    pub char_limit:          usize,
    /// Rows dropped anywhere in the run, by reason.
    pub skipped:             SkipStats,
    /// The writer stopped early on a shutdown request.
    #[serde(default)]
    pub interrupted:         bool,
}

impl RunMetrics {
    /// Examples that made it into a record file.
    pub fn num_examples(&self) -> usize {
        self.num_train + self.num_val
    }

    /// Share of frequency words that had a pretrained vector.
    pub fn embedding_coverage(&self) -> f64 {
        if self.num_frequency_words == 0 {
            return 1.0;
        }
        1.0 - self.embedding_misses as f64 / self.num_frequency_words as f64
    }
}

// ─── SkipLog ──────────────────────────────────────────────────────────────────
#[derive(Debug, Serialize)]
struct SkipRow<'a> {
    stage:  &'a str,
    row:    usize,
    reason: &'a str,
    detail: String,
}

/// Appends skipped rows to `skipped.csv`.
pub struct SkipLog {
    csv_path: PathBuf,
}

impl SkipLog {
    /// Start a fresh log in `dir`, replacing one from an earlier run.
    pub fn create(dir: impl AsRef<Path>) -> PipelineResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let csv_path = dir.join(SKIP_LOG_FILE);

        let mut writer = csv::Writer::from_path(&csv_path)?;
        writer.write_record(["stage", "row", "reason", "detail"])?;
        writer.flush()?;

        tracing::debug!("Created skip log: '{}'", csv_path.display());
        Ok(Self { csv_path })
    }

    /// Append one row per skip. `row` is 1-based within its stage;
    /// 0 means the row number is not known.
    pub fn log(&self, stage: &str, skips: &[(usize, SkipReason)]) -> PipelineResult<()> {
        if skips.is_empty() {
            return Ok(());
        }
        let file = OpenOptions::new().append(true).open(&self.csv_path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        for (row, reason) in skips {
            writer.serialize(SkipRow {
                stage,
                row:    *row,
                reason: reason.kind(),
                detail: reason.to_string(),
            })?;
        }
        writer.flush()?;

        tracing::warn!("{} rows skipped during {}", skips.len(), stage);
        for (row, reason) in skips.iter().take(5) {
            tracing::debug!("  {} row {}: {}", stage, row, reason);
        }
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_log_rows() {
        let dir = tempfile::tempdir().unwrap();
        let log = SkipLog::create(dir.path()).unwrap();
        log.log("load", &[(3, SkipReason::MissingField("text"))]).unwrap();
        log.log("tokenize", &[(7, SkipReason::MalformedRow("a, b".into()))]).unwrap();
        log.log("write", &[]).unwrap();

        let body = std::fs::read_to_string(log.csv_path()).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines[0], "stage,row,reason,detail");
        assert_eq!(lines[1], "load,3,missing_field,missing field 'text'");
        assert_eq!(lines[2], "tokenize,7,malformed_row,\"malformed row: a, b\"");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_create_truncates_previous_log() {
        let dir = tempfile::tempdir().unwrap();
        SkipLog::create(dir.path()).unwrap().log("load", &[(1, SkipReason::EmptyText)]).unwrap();
        let log  = SkipLog::create(dir.path()).unwrap();
        let body = std::fs::read_to_string(log.csv_path()).unwrap();
        assert_eq!(body.lines().count(), 1);
    }

    #[test]
    fn test_run_metrics_json() {
        let mut skipped = SkipStats::new();
        skipped.record(&SkipReason::NoTokens);
        let meta = RunMetrics {
            num_train:           8,
            num_val:             2,
            num_frequency_words: 10,
            embedding_misses:    4,
            skipped,
            ..RunMetrics::default()
        };
        assert_eq!(meta.num_examples(), 10);
        assert!((meta.embedding_coverage() - 0.6).abs() < 1e-9);

        let json = serde_json::to_string(&meta).unwrap();
        let back: RunMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
