// ============================================================
// Layer 4 — Record Writer / Reader
// ============================================================
// Persists finalized examples as JSON Lines, one
// self-describing record per line:
//
//   {"tokens":["i","love","it"],"tags":["PRP","VBP","PRP"],"num_tokens":3,"label":2}
//
// Write path:
//   1. full shuffle of every example (not a streaming buffer)
//   2. optionally drop examples longer than `max_tokens`
//   3. serialize and append, one line each, without the
//      surface tokens
//
// A shutdown request is only honoured between records, and
// the buffer is flushed before returning, so the file never
// ends in a half-written line.
//
// Reference: JSON Lines (https://jsonlines.org)
//            Rust Book §16 (Shared-State Concurrency)

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::domain::error::{PipelineError, PipelineResult, SkipReason, SkipStats};
use crate::domain::example::Example;

// ─── ShutdownSignal ───────────────────────────────────────────────────────────
/// Cooperative stop flag, set from the Ctrl-C handler.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ─── RecordWriter ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default)]
pub struct RecordWriter {
    /// Drop examples with more tokens than this.
    pub max_tokens: Option<usize>,
    pub seed:       Option<u64>,
}

/// What one `write` call did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteSummary {
    pub written:     usize,
    pub dropped:     usize,
    pub skipped:     SkipStats,
    pub interrupted: bool,
}

impl RecordWriter {
    pub fn new(max_tokens: Option<usize>, seed: Option<u64>) -> Self {
        Self { max_tokens, seed }
    }

    pub fn write(
        &self,
        path:         impl AsRef<Path>,
        mut examples: Vec<Example>,
        shutdown:     &ShutdownSignal,
    ) -> PipelineResult<WriteSummary> {
        let path = path.as_ref();

        // ── Step 1: Full shuffle ─────────────────────────────────────────────
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None       => StdRng::from_entropy(),
        };
        examples.shuffle(&mut rng);

        // ── Step 2: Filter and append ────────────────────────────────────────
        let mut out     = BufWriter::new(File::create(path)?);
        let mut summary = WriteSummary::default();

        for mut example in examples {
            if shutdown.is_requested() {
                summary.interrupted = true;
                tracing::warn!("Shutdown requested, stopping after {} records", summary.written);
                break;
            }
            if example.num_tokens == 0 {
                summary.skipped.record(&SkipReason::NoTokens);
                continue;
            }
            if let Some(max) = self.max_tokens {
                if example.num_tokens > max {
                    summary.dropped += 1;
                    summary.skipped.record(&SkipReason::TooLong {
                        num_tokens: example.num_tokens,
                        max_tokens: max,
                    });
                    continue;
                }
            }
            // Surface tokens stay in examples.json only.
            example.original_tokens.clear();
            serde_json::to_writer(&mut out, &example)?;
            out.write_all(b"\n")?;
            summary.written += 1;
        }
        out.flush()?;

        tracing::info!(
            "Wrote {} records to '{}' ({} over length ceiling)",
            summary.written,
            path.display(),
            summary.dropped
        );
        Ok(summary)
    }
}

/// Read every record back, checking each one's invariants.
pub fn read_records(path: impl AsRef<Path>) -> PipelineResult<Vec<Example>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PipelineError::missing("record file", path));
    }
    let reader = BufReader::new(File::open(path)?);
    let mut examples = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let example: Example = serde_json::from_str(&line)
            .map_err(|e| PipelineError::format(path, i + 1, e.to_string()))?;
        example
            .validate()
            .map_err(|reason| PipelineError::format(path, i + 1, reason))?;
        examples.push(example);
    }
    Ok(examples)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::example::TokenSequence;

    fn example(n: usize, label: usize) -> Example {
        let mut seq = TokenSequence::with_capacity(n);
        for i in 0..n {
            seq.push(format!("w{i}"), format!("w{i}"), "NN".to_string());
        }
        Example::from_sequence(seq, label)
    }

    fn sorted(mut v: Vec<Example>) -> Vec<Example> {
        v.sort_by(|a, b| (a.num_tokens, a.label).cmp(&(b.num_tokens, b.label)));
        v
    }

    #[test]
    fn test_written_records_read_back_exactly() {
        let dir      = tempfile::tempdir().unwrap();
        let path     = dir.path().join("train.jsonl");
        let examples: Vec<Example> = (1..=20).map(|n| example(n, n % 3)).collect();

        let summary = RecordWriter::new(None, Some(3))
            .write(&path, examples.clone(), &ShutdownSignal::new())
            .unwrap();
        assert_eq!(summary.written, 20);
        assert!(!summary.interrupted);

        let expected: Vec<Example> = examples
            .into_iter()
            .map(|mut e| {
                e.original_tokens.clear();
                e
            })
            .collect();
        let back = read_records(&path).unwrap();
        assert_eq!(sorted(back), sorted(expected));
    }

    #[test]
    fn test_records_hold_only_persisted_fields() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.jsonl");
        RecordWriter::new(None, None)
            .write(&path, vec![example(2, 1)], &ShutdownSignal::new())
            .unwrap();

        let line = std::fs::read_to_string(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
        let mut keys: Vec<&str> = json.as_object().unwrap().keys().map(|k| k.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["label", "num_tokens", "tags", "tokens"]);
    }

    #[test]
    fn test_length_ceiling_drops_long_examples() {
        let dir      = tempfile::tempdir().unwrap();
        let path     = dir.path().join("train.jsonl");
        let examples: Vec<Example> = (1..=10).map(|n| example(n, 0)).collect();

        let summary = RecordWriter::new(Some(6), Some(0))
            .write(&path, examples, &ShutdownSignal::new())
            .unwrap();
        assert_eq!(summary.written, 6);
        assert_eq!(summary.dropped, 4);
        assert_eq!(summary.skipped.get("too_long"), 4);

        let back = read_records(&path).unwrap();
        assert_eq!(back.len(), 6);
        assert!(back.iter().all(|e| e.num_tokens <= 6));
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let dir = tempfile::tempdir().unwrap();
        let a   = dir.path().join("a.jsonl");
        let b   = dir.path().join("b.jsonl");
        let examples: Vec<Example> = (1..=15).map(|n| example(n, 0)).collect();
        let writer = RecordWriter::new(None, Some(11));
        writer.write(&a, examples.clone(), &ShutdownSignal::new()).unwrap();
        writer.write(&b, examples,         &ShutdownSignal::new()).unwrap();
        assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
    }

    #[test]
    fn test_shutdown_leaves_whole_records() {
        let dir      = tempfile::tempdir().unwrap();
        let path     = dir.path().join("train.jsonl");
        let shutdown = ShutdownSignal::new();
        shutdown.request();

        let summary = RecordWriter::new(None, None)
            .write(&path, vec![example(2, 0)], &shutdown)
            .unwrap();
        assert!(summary.interrupted);
        assert_eq!(summary.written, 0);
        assert!(read_records(&path).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_line_reports_line_number() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(
            &path,
            "{\"tokens\":[\"a\"],\"tags\":[\"NN\"],\"num_tokens\":1,\"label\":0}\n{\"tokens\":[\"a\"]\n",
        )
        .unwrap();
        match read_records(&path) {
            Err(PipelineError::Format { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected format error, got {other:?}"),
        }
    }

    #[test]
    fn test_misaligned_record_is_rejected() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"tokens\":[\"a\",\"b\"],\"tags\":[\"NN\"],\"num_tokens\":2,\"label\":0}\n").unwrap();
        assert!(matches!(read_records(&path), Err(PipelineError::Format { line: 1, .. })));
    }

    #[test]
    fn test_missing_record_file() {
        assert!(matches!(
            read_records("/no/such/train.jsonl"),
            Err(PipelineError::ResourceMissing { .. })
        ));
    }
}
