// ============================================================
// Layer 4 — Dataset Loaders
// ============================================================
// Reads labelled tweets from the two supported corpora and
// hands back RawText rows. Both are read with the csv crate.
//
//   sem_eval   a directory of SemEval TSV files, one per
//              challenge year, with no header:
//
//                id \t class \t text [\t ...]
//
//              Files are read in name order. Text is trimmed
//              and a text seen in an earlier row is skipped,
//              so the first occurrence wins.
//
//   sent_140   the Sentiment140 CSV, no header, six columns:
//
//                class, id, date, query, user, text
//
//              Classes are numeric (0, 2, 4) and map to
//              negative / neutral / positive. The file is
//              mostly latin-1, so any field that is not valid
//              UTF-8 is decoded byte-per-char.
//
// A row that cannot be used is reported with its row number
// and a SkipReason. Only a missing path or an I/O failure
// aborts the load.
//
// Reference: csv crate documentation
//            Rust Book §8 (Collections)
//            Rust Book §9 (Error Handling)

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::error::{PipelineError, PipelineResult, SkipReason};
use crate::domain::example::RawText;
use crate::domain::traits::{LoadedRows, RowSource};

// ─── DatasetKind ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    SemEval,
    #[serde(rename = "sent_140")]
    Sent140,
}

impl DatasetKind {
    /// Parse a dataset key; anything unknown is a configuration error.
    pub fn parse(key: &str) -> PipelineResult<Self> {
        match key.trim().to_lowercase().as_str() {
            "sem_eval" | "semeval"             => Ok(DatasetKind::SemEval),
            "sent_140" | "sent140" | "sentiment140" => Ok(DatasetKind::Sent140),
            other => Err(PipelineError::config(format!(
                "Unknown dataset '{other}', expected 'sem_eval' or 'sent_140'"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DatasetKind::SemEval => "sem_eval",
            DatasetKind::Sent140 => "sent_140",
        }
    }
}

/// Loader for `kind` reading from `path`.
pub fn row_source(kind: DatasetKind, path: impl Into<PathBuf>) -> Box<dyn RowSource> {
    match kind {
        DatasetKind::SemEval => Box::new(SemEvalLoader::new(path)),
        DatasetKind::Sent140 => Box::new(Sent140Loader::new(path)),
    }
}

// ─── SemEvalLoader ────────────────────────────────────────────────────────────
pub struct SemEvalLoader {
    /// A directory of `.tsv` files, or a single file.
    path: PathBuf,
}

impl SemEvalLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn files(&self) -> PipelineResult<Vec<PathBuf>> {
        if !self.path.exists() {
            return Err(PipelineError::missing("SemEval data", &self.path));
        }
        if self.path.is_file() {
            return Ok(vec![self.path.clone()]);
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("tsv") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

impl RowSource for SemEvalLoader {
    fn load_rows(&self) -> PipelineResult<LoadedRows> {
        let files = self.files()?;
        if files.is_empty() {
            tracing::warn!("No .tsv files found in '{}'", self.path.display());
        }

        let mut loaded = LoadedRows::default();
        let mut seen   = HashSet::new();
        let mut row_no = 0usize;

        for file in &files {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(false)
                .delimiter(b'\t')
                .quoting(false)
                .flexible(true)
                .from_path(file)?;

            for record in reader.records() {
                row_no += 1;
                let record = match record {
                    Ok(r)  => r,
                    Err(e) => {
                        loaded.skipped.push((row_no, SkipReason::MalformedRow(e.to_string())));
                        continue;
                    }
                };

                let class = record.get(1).map(str::trim).filter(|c| !c.is_empty());
                let text  = record.get(2).map(str::trim);
                match (class, text) {
                    (None, _)                        => loaded.skipped.push((row_no, SkipReason::MissingField("class"))),
                    (_, None)                        => loaded.skipped.push((row_no, SkipReason::MissingField("text"))),
                    (_, Some(t)) if t.is_empty()     => loaded.skipped.push((row_no, SkipReason::EmptyText)),
                    (_, Some(t)) if !seen.insert(t.to_string()) => {
                        loaded.skipped.push((row_no, SkipReason::Duplicate))
                    }
                    (Some(c), Some(t)) => loaded.rows.push(RawText::new(t, Some(c.to_string()))),
                }
            }
            tracing::debug!("Read SemEval file '{}'", file.display());
        }

        tracing::info!(
            "Loaded {} SemEval rows from {} files ({} skipped)",
            loaded.rows.len(),
            files.len(),
            loaded.skipped.len()
        );
        Ok(loaded)
    }
}

// ─── Sent140Loader ────────────────────────────────────────────────────────────
pub struct Sent140Loader {
    path: PathBuf,
}

impl Sent140Loader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// Sentiment140 polarity → class label.
fn sent140_class(raw: &str) -> String {
    match raw {
        "0" => "negative".to_string(),
        "2" => "neutral".to_string(),
        "4" => "positive".to_string(),
        other => other.to_string(),
    }
}

/// UTF-8 when valid, otherwise latin-1.
fn decode_field(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s)  => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

impl RowSource for Sent140Loader {
    fn load_rows(&self) -> PipelineResult<LoadedRows> {
        if !self.path.is_file() {
            return Err(PipelineError::missing("Sentiment140 CSV", &self.path));
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;

        let mut loaded = LoadedRows::default();
        for (i, record) in reader.byte_records().enumerate() {
            let row_no = i + 1;
            let record = match record {
                Ok(r)  => r,
                Err(e) => {
                    loaded.skipped.push((row_no, SkipReason::MalformedRow(e.to_string())));
                    continue;
                }
            };
            if record.len() < 6 {
                loaded.skipped.push((
                    row_no,
                    SkipReason::MalformedRow(format!("expected 6 columns, found {}", record.len())),
                ));
                continue;
            }

            let class = decode_field(&record[0]);
            let text  = decode_field(&record[5]);
            let class = class.trim();
            if class.is_empty() {
                loaded.skipped.push((row_no, SkipReason::MissingField("class")));
                continue;
            }
            if text.trim().is_empty() {
                loaded.skipped.push((row_no, SkipReason::EmptyText));
                continue;
            }
            loaded.rows.push(RawText::new(text, Some(sent140_class(class))));
        }

        tracing::info!(
            "Loaded {} Sentiment140 rows from '{}' ({} skipped)",
            loaded.rows.len(),
            self.path.display(),
            loaded.skipped.len()
        );
        Ok(loaded)
    }
}

/// Load every row from `kind` at `path`.
pub fn load_dataset(kind: DatasetKind, path: &Path) -> PipelineResult<LoadedRows> {
    row_source(kind, path).load_rows()
}
