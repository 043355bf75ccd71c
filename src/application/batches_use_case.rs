// ============================================================
// Layer 2 — BatchesUseCase
// ============================================================
// Runs the BatchPipeline over a persisted record file and
// reports what a training driver would receive:
//
//   Step 1: Open the artifacts and read meta.json
//   Step 2: Load the tokenizer snapshot
//   Step 3: Load the record file as a Burn Dataset
//   Step 4: Build the BatchPipeline from meta + batch knobs
//   Step 5: Drain one epoch (train) or one pass (eval)
//   Step 6: Summarise per bucket
//
// With `to_tensors` each batch is also moved onto the NdArray
// backend, so the tensor shapes are checked end to end.
//
// Reference: Burn Book §4 (Datasets and Batchers)

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use burn::backend::NdArray;
use burn::data::dataset::Dataset;
use serde::Serialize;

use crate::data::batcher::TweetBatch;
use crate::data::dataset::RecordDataset;
use crate::data::pipeline::{BatchMode, BatchPipeline, Bucketing, PadTo, PaddedBatch, PipelineConfig};
use crate::infra::artifact_store::{ArtifactStore, TRAIN_FILE};

// ─── Configuration ────────────────────────────────────────────────────────────
/// Batch knobs for one inspection run. Lengths, char limit and class
/// count come from the run's meta.json.
#[derive(Debug, Clone)]
pub struct BatchesConfig {
    pub artifact_dir:       String,
    /// File name inside `artifact_dir`.
    pub records:            String,
    pub mode:               BatchMode,
    pub batch_size:         usize,
    pub pad_to:             PadTo,
    pub bucketing:          Bucketing,
    pub bucket_batch_sizes: Option<Vec<usize>>,
    pub shuffle_seed:       Option<u64>,
    pub drop_remainder:     bool,
    pub max_prefetch:       usize,
    pub num_workers:        usize,
    pub to_tensors:         bool,
}

impl Default for BatchesConfig {
    fn default() -> Self {
        let pipeline = PipelineConfig::default();
        Self {
            artifact_dir:       "artifacts".to_string(),
            records:            TRAIN_FILE.to_string(),
            mode:               BatchMode::Eval,
            batch_size:         pipeline.batch_size,
            pad_to:             pipeline.pad_to,
            bucketing:          pipeline.bucketing,
            bucket_batch_sizes: None,
            shuffle_seed:       None,
            drop_remainder:     false,
            max_prefetch:       pipeline.max_prefetch,
            num_workers:        pipeline.num_workers,
            to_tensors:         false,
        }
    }
}

// ─── Report ───────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BucketReport {
    pub bucket:     usize,
    /// `(start, end)`; only the last bucket includes `end`.
    pub lengths:    (usize, usize),
    pub batches:    usize,
    pub examples:   usize,
    /// Distinct `[batch, seq_len]` shapes, with how often each occurred.
    pub shapes:     BTreeMap<String, usize>,
    pub efficiency: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub num_records:    usize,
    pub num_examples:   usize,
    pub num_batches:    usize,
    pub tensor_batches: usize,
    pub efficiency:     f64,
    pub buckets:        Vec<BucketReport>,
}

// ─── BatchesUseCase ───────────────────────────────────────────────────────────
pub struct BatchesUseCase {
    config: BatchesConfig,
}

impl BatchesUseCase {
    pub fn new(config: BatchesConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<BatchReport> {
        let cfg = &self.config;

        // ── Step 1: Artifacts and metadata ───────────────────────────────────
        let store = ArtifactStore::open(&cfg.artifact_dir)
            .with_context(|| format!("Cannot open artifacts in '{}'", cfg.artifact_dir))?;
        let meta = store.load_meta()?;

        // ── Step 2: Snapshot ─────────────────────────────────────────────────
        let (frozen, _) = store.tokenizer_store().load()?;

        // ── Step 3: Records ──────────────────────────────────────────────────
        let path: PathBuf = store.path(&cfg.records);
        let dataset = RecordDataset::from_file(&path)
            .with_context(|| format!("Cannot read records from '{}'", path.display()))?;
        dataset.validate_labels(meta.num_classes)?;
        tracing::info!("Loaded {} records from '{}'", dataset.len(), path.display());

        // ── Step 4: Pipeline ─────────────────────────────────────────────────
        let pipeline_config = PipelineConfig {
            batch_size:         cfg.batch_size,
            pad_to:             cfg.pad_to.clone(),
            char_limit:         meta.char_limit,
            bucketing:          cfg.bucketing.clone(),
            max_length:         meta.max_tokens,
            bucket_batch_sizes: cfg.bucket_batch_sizes.clone(),
            shuffle_seed:       cfg.shuffle_seed,
            drop_remainder:     cfg.drop_remainder,
            max_prefetch:       cfg.max_prefetch,
            num_workers:        cfg.num_workers,
            num_classes:        meta.num_classes,
        };
        let pipeline = BatchPipeline::new(pipeline_config, Arc::new(frozen))?;

        // ── Step 5: Drain ────────────────────────────────────────────────────
        let mut buckets: Vec<BucketReport> = (0..pipeline.buckets().len())
            .map(|b| BucketReport {
                bucket:  b,
                lengths: pipeline.buckets().range(b),
                ..BucketReport::default()
            })
            .collect();
        let mut real   = vec![0usize; buckets.len()];
        let mut cells  = vec![0usize; buckets.len()];
        let mut report = BatchReport { num_records: dataset.len(), ..BatchReport::default() };
        let device     = Default::default();

        for batch in pipeline.iter(&dataset, cfg.mode) {
            if cfg.to_tensors {
                check_tensors(&batch, &device)?;
                report.tensor_batches += 1;
            }
            let entry = &mut buckets[batch.bucket];
            entry.batches  += 1;
            entry.examples += batch.batch_size;
            *entry.shapes.entry(format!("{}x{}", batch.batch_size, batch.seq_len)).or_insert(0) += 1;

            real[batch.bucket]  += batch.num_tokens.iter().sum::<i64>() as usize;
            cells[batch.bucket] += batch.batch_size * batch.seq_len;
            report.num_batches  += 1;
            report.num_examples += batch.batch_size;
        }

        // ── Step 6: Summary ──────────────────────────────────────────────────
        for (b, entry) in buckets.iter_mut().enumerate() {
            entry.efficiency = ratio(real[b], cells[b]);
        }
        report.efficiency = ratio(real.iter().sum(), cells.iter().sum());
        report.buckets    = buckets;

        tracing::info!(
            "{} batches over {} of {} records ({:?}), padding efficiency {:.3}",
            report.num_batches,
            report.num_examples,
            report.num_records,
            cfg.mode,
            report.efficiency
        );
        Ok(report)
    }
}

/// Move a batch onto the CPU backend and confirm every tensor shape.
fn check_tensors(batch: &PaddedBatch, device: &<NdArray as burn::tensor::backend::Backend>::Device) -> Result<()> {
    let tensors = TweetBatch::<NdArray>::from_padded(batch, device);
    let (n, l)  = (batch.batch_size, batch.seq_len);
    let ok = tensors.word_ids.dims() == [n, l]
        && tensors.char_ids.dims() == [n, l, batch.char_limit]
        && tensors.tags.dims() == [n, l, batch.num_tags]
        && tensors.num_tokens.dims() == [n]
        && tensors.labels.dims() == [n, batch.num_classes];
    if !ok {
        anyhow::bail!("Batch of bucket {} has inconsistent tensor shapes", batch.bucket);
    }
    Ok(())
}

fn ratio(real: usize, cells: usize) -> f64 {
    if cells == 0 {
        1.0
    } else {
        real as f64 / cells as f64
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::preprocess_use_case::{PreprocessConfig, PreprocessUseCase};
    use crate::data::record_writer::ShutdownSignal;

    fn artifacts(dir: &tempfile::TempDir) -> String {
        let words = ["good", "bad", "day", "night", "movie", "song", "food", "trip"];
        let mut tsv = String::new();
        for i in 0..12 {
            let len   = 1 + i % 6;
            let text  = (0..len).map(|k| words[(i + k) % words.len()]).collect::<Vec<_>>().join(" ");
            let label = ["negative", "neutral", "positive"][i % 3];
            tsv.push_str(&format!("{i}\t{label}\t{text} {i}x\n"));
        }
        let data = dir.path().join("rows.tsv");
        std::fs::write(&data, tsv).unwrap();

        let out = dir.path().join("out");
        let cfg = PreprocessConfig {
            input_path:     data.display().to_string(),
            output_dir:     out.display().to_string(),
            embed_dim:      2,
            char_dim:       2,
            max_tokens:     10,
            char_limit:     4,
            train_fraction: 1.0,
            seed:           Some(3),
            ..PreprocessConfig::default()
        };
        PreprocessUseCase::new(cfg).execute(&ShutdownSignal::new()).unwrap();
        out.display().to_string()
    }

    #[test]
    fn test_eval_pass_covers_every_record() {
        let dir    = tempfile::tempdir().unwrap();
        let config = BatchesConfig {
            artifact_dir: artifacts(&dir),
            batch_size:   5,
            to_tensors:   true,
            ..BatchesConfig::default()
        };
        let report = BatchesUseCase::new(config).execute().unwrap();

        assert_eq!(report.num_records,  12);
        assert_eq!(report.num_examples, 12);
        assert_eq!(report.num_batches,  3);
        assert_eq!(report.tensor_batches, 3);
        assert!(report.efficiency > 0.0 && report.efficiency <= 1.0);
    }

    #[test]
    fn test_buckets_are_reported_separately() {
        let dir    = tempfile::tempdir().unwrap();
        let config = BatchesConfig {
            artifact_dir: artifacts(&dir),
            batch_size:   4,
            bucketing:    Bucketing::Boundaries(vec![0, 4]),
            ..BatchesConfig::default()
        };
        let report = BatchesUseCase::new(config).execute().unwrap();

        assert_eq!(report.buckets.len(), 2);
        assert_eq!(report.buckets[0].lengths, (0, 4));
        assert_eq!(report.buckets[1].lengths, (4, 10));
        let total: usize = report.buckets.iter().map(|b| b.examples).sum();
        assert_eq!(total, 12);
    }

    #[test]
    fn test_train_mode_drops_remainder() {
        let dir    = tempfile::tempdir().unwrap();
        let config = BatchesConfig {
            artifact_dir:   artifacts(&dir),
            mode:           BatchMode::Train,
            batch_size:     5,
            shuffle_seed:   Some(9),
            drop_remainder: true,
            ..BatchesConfig::default()
        };
        let report = BatchesUseCase::new(config).execute().unwrap();
        assert_eq!(report.num_batches,  2);
        assert_eq!(report.num_examples, 10);
    }

    #[test]
    fn test_missing_record_file() {
        let dir    = tempfile::tempdir().unwrap();
        let config = BatchesConfig {
            artifact_dir: artifacts(&dir),
            records:      "nope.jsonl".into(),
            ..BatchesConfig::default()
        };
        assert!(BatchesUseCase::new(config).execute().is_err());
    }
}
