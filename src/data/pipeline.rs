// ============================================================
// Layer 4 — Batch Pipeline
// ============================================================
// Reads persisted examples and turns them into padded,
// rectangular batches of ids:
//
//   Example {tokens, tags, num_tokens, label}
//       │  word / char / tag lookup (never fails, OOV fallback)
//       ▼
//   PaddedBatch
//     word_ids   [b, L]        0 = pad
//     char_ids   [b, L, C]     left-aligned, 0 = pad
//     tags       [b, L, T]     one-hot, all-zero row = pad
//     num_tokens [b]
//     labels     [b, classes]  one-hot
//
// Length bucketing (optional) groups examples by length
// first, so padding waste is bounded by the bucket width
// rather than the longest example in the dataset:
//
//   boundaries [0, 10, 20], max_length 50
//     bucket 0: [0, 10)   → padded to 10
//     bucket 1: [10, 20)  → padded to 20
//     bucket 2: [20, 50]  → padded to 50
//
// Training order is shuffled (examples, then batches).
// Evaluation order is deterministic and visits every example
// exactly once.
//
// Batches are materialised on a rayon pool, at most
// `max_prefetch` at a time, and handed out in plan order.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            rayon crate documentation

use std::collections::VecDeque;
use std::sync::Arc;

use burn::data::dataset::Dataset;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::example::Example;
use crate::ml::tokenizer::char_ids;
use crate::ml::vocab_index::FrozenIndices;

// ─── Configuration ────────────────────────────────────────────────────────────
/// Where each per-example field is padded to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadTo {
    /// Without bucketing: this length. With bucketing: the bucket's bound.
    Fixed(usize),
    /// The longest example in the batch.
    BatchMax,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucketing {
    None,
    /// Explicit lower bounds; must start at 0 and increase.
    Boundaries(Vec<usize>),
    /// Evenly spaced buckets of this width up to `max_length`.
    Width(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub batch_size:         usize,
    pub pad_to:             PadTo,
    pub char_limit:         usize,
    pub bucketing:          Bucketing,
    /// Longest sequence kept; anything longer is truncated.
    pub max_length:         usize,
    /// One batch size per bucket, overriding `batch_size`.
    pub bucket_batch_sizes: Option<Vec<usize>>,
    pub shuffle_seed:       Option<u64>,
    /// Drop each bucket's final short batch in training mode.
    pub drop_remainder:     bool,
    /// Upper bound on batches materialised ahead of the consumer.
    pub max_prefetch:       usize,
    /// rayon threads; 0 means one per core.
    pub num_workers:        usize,
    pub num_classes:        usize,
}

impl PipelineConfig {
    pub fn new(num_classes: usize) -> Self {
        Self {
            batch_size:         64,
            pad_to:             PadTo::BatchMax,
            char_limit:         16,
            bucketing:          Bucketing::None,
            max_length:         50,
            bucket_batch_sizes: None,
            shuffle_seed:       None,
            drop_remainder:     false,
            max_prefetch:       4,
            num_workers:        0,
            num_classes,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

// ─── Buckets ──────────────────────────────────────────────────────────────────
/// Contiguous length ranges covering `[0, max_length]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buckets {
    bounds:     Vec<usize>,
    max_length: usize,
}

impl Buckets {
    /// A single bucket `[0, max_length]`.
    pub fn single(max_length: usize) -> Self {
        Self { bounds: vec![0], max_length }
    }

    pub fn from_boundaries(bounds: Vec<usize>, max_length: usize) -> PipelineResult<Self> {
        if bounds.first() != Some(&0) {
            return Err(PipelineError::config("Bucket boundaries must start at 0"));
        }
        if bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PipelineError::config(format!(
                "Bucket boundaries must be strictly increasing, got {bounds:?}"
            )));
        }
        if bounds.last().map_or(false, |&last| last >= max_length) {
            return Err(PipelineError::config(format!(
                "Bucket boundaries {bounds:?} must lie below max_length {max_length}"
            )));
        }
        Ok(Self { bounds, max_length })
    }

    pub fn evenly(width: usize, max_length: usize) -> PipelineResult<Self> {
        if width == 0 {
            return Err(PipelineError::config("Bucket width must be at least 1"));
        }
        let bounds = (0..max_length.max(1)).step_by(width).collect();
        Self::from_boundaries(bounds, max_length.max(1))
    }

    pub fn from_config(config: &PipelineConfig) -> PipelineResult<Self> {
        if config.max_length == 0 {
            return Err(PipelineError::config("max_length must be at least 1"));
        }
        match &config.bucketing {
            Bucketing::None          => Ok(Self::single(config.max_length)),
            Bucketing::Boundaries(b) => Self::from_boundaries(b.clone(), config.max_length),
            Bucketing::Width(w)      => Self::evenly(*w, config.max_length),
        }
    }

    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Bucket holding a sequence of `len` tokens. Over-long sequences go
    /// to the last bucket and are truncated there.
    pub fn bucket_of(&self, len: usize) -> usize {
        self.bounds.partition_point(|&b| b <= len).saturating_sub(1)
    }

    /// `(start, end)`; every bucket but the last excludes `end`.
    pub fn range(&self, bucket: usize) -> (usize, usize) {
        (self.bounds[bucket], self.pad_length(bucket))
    }

    /// Length every example in `bucket` is padded to.
    pub fn pad_length(&self, bucket: usize) -> usize {
        self.bounds.get(bucket + 1).copied().unwrap_or(self.max_length)
    }
}

// ─── PaddedBatch ──────────────────────────────────────────────────────────────
/// Flat, row-major arrays for one batch. Shapes are in the field docs.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedBatch {
    pub batch_size: usize,
    pub seq_len:    usize,
    pub char_limit: usize,
    pub num_tags:   usize,
    pub num_classes: usize,
    /// `[batch_size, seq_len]`
    pub word_ids:   Vec<i64>,
    /// `[batch_size, seq_len, char_limit]`
    pub char_ids:   Vec<i64>,
    /// `[batch_size, seq_len, num_tags]`, column `tag_id − 1`
    pub tags:       Vec<f32>,
    /// `[batch_size]`, after truncation
    pub num_tokens: Vec<i64>,
    /// `[batch_size, num_classes]`
    pub labels:     Vec<f32>,
    /// `[batch_size]`
    pub label_ids:  Vec<i64>,
    pub bucket:     usize,
}

impl PaddedBatch {
    pub fn from_examples(
        examples:    &[Example],
        frozen:      &FrozenIndices,
        seq_len:     usize,
        char_limit:  usize,
        num_classes: usize,
        bucket:      usize,
    ) -> Self {
        let b        = examples.len();
        let num_tags = frozen.tags.len();

        let mut word_ids   = vec![0i64; b * seq_len];
        let mut chars      = vec![0i64; b * seq_len * char_limit];
        let mut tags       = vec![0f32; b * seq_len * num_tags];
        let mut num_tokens = Vec::with_capacity(b);
        let mut labels     = vec![0f32; b * num_classes];
        let mut label_ids  = Vec::with_capacity(b);

        for (row, ex) in examples.iter().enumerate() {
            let kept = ex.num_tokens.min(seq_len);
            for (pos, (token, tag)) in ex.tokens.iter().zip(&ex.tags).take(kept).enumerate() {
                let at = row * seq_len + pos;
                word_ids[at] = frozen.words.word_id(token) as i64;

                let char_at = at * char_limit;
                for (k, id) in char_ids(frozen, token, char_limit).into_iter().enumerate() {
                    chars[char_at + k] = id as i64;
                }

                let tag_id = frozen.tags.id_or_oov(tag);
                tags[at * num_tags + tag_id - 1] = 1.0;
            }
            num_tokens.push(kept as i64);
            if ex.label < num_classes {
                labels[row * num_classes + ex.label] = 1.0;
            }
            label_ids.push(ex.label as i64);
        }

        Self {
            batch_size: b,
            seq_len,
            char_limit,
            num_tags,
            num_classes,
            word_ids,
            char_ids: chars,
            tags,
            num_tokens,
            labels,
            label_ids,
            bucket,
        }
    }

    /// Share of word positions holding a real token.
    pub fn padding_efficiency(&self) -> f64 {
        let cells = self.batch_size * self.seq_len;
        if cells == 0 {
            return 1.0;
        }
        self.num_tokens.iter().sum::<i64>() as f64 / cells as f64
    }

    /// Every flat array matches the declared shape.
    pub fn is_rectangular(&self) -> bool {
        let cells = self.batch_size * self.seq_len;
        self.word_ids.len() == cells
            && self.char_ids.len() == cells * self.char_limit
            && self.tags.len() == cells * self.num_tags
            && self.num_tokens.len() == self.batch_size
            && self.labels.len() == self.batch_size * self.num_classes
            && self.label_ids.len() == self.batch_size
    }
}

// ─── Planning ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    Train,
    Eval,
}

/// Example indices for one batch, plus the bucket they came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedBatch {
    pub bucket:  usize,
    pub indices: Vec<usize>,
}

// ─── BatchPipeline ────────────────────────────────────────────────────────────
pub struct BatchPipeline {
    config:  PipelineConfig,
    buckets: Buckets,
    frozen:  Arc<FrozenIndices>,
    pool:    rayon::ThreadPool,
}

impl BatchPipeline {
    pub fn new(config: PipelineConfig, frozen: Arc<FrozenIndices>) -> PipelineResult<Self> {
        // ── Step 1: Validate settings ────────────────────────────────────────
        if config.batch_size == 0 {
            return Err(PipelineError::config("batch_size must be at least 1"));
        }
        if config.char_limit == 0 {
            return Err(PipelineError::config("char_limit must be at least 1"));
        }
        if config.max_prefetch == 0 {
            return Err(PipelineError::config("max_prefetch must be at least 1"));
        }
        if config.num_classes == 0 {
            return Err(PipelineError::config("num_classes must be at least 1"));
        }
        if config.pad_to == PadTo::Fixed(0) {
            return Err(PipelineError::config("Fixed padding length must be at least 1"));
        }
        let buckets = Buckets::from_config(&config)?;
        if let Some(sizes) = &config.bucket_batch_sizes {
            if sizes.len() != buckets.len() || sizes.contains(&0) {
                return Err(PipelineError::config(format!(
                    "bucket_batch_sizes needs {} non-zero entries, got {sizes:?}",
                    buckets.len()
                )));
            }
        }

        // ── Step 2: Worker pool ──────────────────────────────────────────────
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.num_workers)
            .build()
            .map_err(|e| PipelineError::config(format!("Cannot build worker pool: {e}")))?;

        Ok(Self { config, buckets, frozen, pool })
    }

    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn batch_size_for(&self, bucket: usize) -> usize {
        self.config
            .bucket_batch_sizes
            .as_ref()
            .and_then(|s| s.get(bucket).copied())
            .unwrap_or(self.config.batch_size)
    }

    /// Group example indices into batches.
    pub fn plan(&self, lengths: &[usize], mode: BatchMode) -> Vec<PlannedBatch> {
        let mut rng = match self.config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None       => StdRng::from_entropy(),
        };

        let mut order: Vec<usize> = (0..lengths.len()).collect();
        if mode == BatchMode::Train {
            order.shuffle(&mut rng);
        }

        let mut per_bucket: Vec<Vec<usize>> = vec![Vec::new(); self.buckets.len()];
        for i in order {
            per_bucket[self.buckets.bucket_of(lengths[i])].push(i);
        }

        let mut batches = Vec::new();
        for (bucket, members) in per_bucket.into_iter().enumerate() {
            let size = self.batch_size_for(bucket);
            for chunk in members.chunks(size) {
                if mode == BatchMode::Train && self.config.drop_remainder && chunk.len() < size {
                    continue;
                }
                batches.push(PlannedBatch { bucket, indices: chunk.to_vec() });
            }
        }

        if mode == BatchMode::Train {
            batches.shuffle(&mut rng);
        }
        batches
    }

    /// Pad length for a batch whose longest member has `batch_max` tokens.
    pub fn pad_target(&self, bucket: usize, batch_max: usize) -> usize {
        let bucketed = self.config.bucketing != Bucketing::None;
        let target = match (&self.config.pad_to, bucketed) {
            (PadTo::Fixed(_), true)  => self.buckets.pad_length(bucket),
            (PadTo::Fixed(n), false) => *n,
            (PadTo::BatchMax, _)     => batch_max.min(self.buckets.pad_length(bucket)),
        };
        target.max(1)
    }

    fn materialize<D: Dataset<Example>>(&self, dataset: &D, planned: &PlannedBatch) -> PaddedBatch {
        let examples: Vec<Example> = planned.indices.iter().filter_map(|&i| dataset.get(i)).collect();
        let batch_max = examples.iter().map(|e| e.num_tokens).max().unwrap_or(0);
        let seq_len   = self.pad_target(planned.bucket, batch_max);
        PaddedBatch::from_examples(
            &examples,
            &self.frozen,
            seq_len,
            self.config.char_limit,
            self.config.num_classes,
            planned.bucket,
        )
    }

    pub fn iter<'a, D: Dataset<Example>>(&'a self, dataset: &'a D, mode: BatchMode) -> BatchIter<'a, D> {
        let lengths: Vec<usize> = (0..dataset.len())
            .map(|i| dataset.get(i).map_or(0, |e| e.num_tokens))
            .collect();
        let plan = self.plan(&lengths, mode);
        tracing::debug!("Planned {} batches over {} examples ({:?})", plan.len(), lengths.len(), mode);
        BatchIter {
            pipeline: self,
            dataset,
            plan:  plan.into(),
            ready: VecDeque::new(),
        }
    }

    /// Shuffled batches for one training epoch.
    pub fn train<'a, D: Dataset<Example>>(&'a self, dataset: &'a D) -> BatchIter<'a, D> {
        self.iter(dataset, BatchMode::Train)
    }

    /// Every example once, in a fixed order.
    pub fn eval<'a, D: Dataset<Example>>(&'a self, dataset: &'a D) -> BatchIter<'a, D> {
        self.iter(dataset, BatchMode::Eval)
    }
}

// ─── BatchIter ────────────────────────────────────────────────────────────────
/// Yields padded batches, prefetching up to `max_prefetch` at a time.
pub struct BatchIter<'a, D: Dataset<Example>> {
    pipeline: &'a BatchPipeline,
    dataset:  &'a D,
    plan:     VecDeque<PlannedBatch>,
    ready:    VecDeque<PaddedBatch>,
}

impl<'a, D: Dataset<Example>> BatchIter<'a, D> {
    fn refill(&mut self) {
        let take = self.pipeline.config.max_prefetch.min(self.plan.len());
        let wave: Vec<PlannedBatch> = self.plan.drain(..take).collect();
        let pipeline = self.pipeline;
        let dataset  = self.dataset;
        let batches: Vec<PaddedBatch> = pipeline
            .pool
            .install(|| wave.par_iter().map(|p| pipeline.materialize(dataset, p)).collect());
        self.ready.extend(batches);
    }

    /// Batches not yet handed out.
    pub fn remaining(&self) -> usize {
        self.plan.len() + self.ready.len()
    }
}

impl<'a, D: Dataset<Example>> Iterator for BatchIter<'a, D> {
    type Item = PaddedBatch;

    fn next(&mut self) -> Option<PaddedBatch> {
        if self.ready.is_empty() && !self.plan.is_empty() {
            self.refill();
        }
        self.ready.pop_front()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::RecordDataset;
    use crate::domain::example::TokenSequence;
    use crate::ml::tokenizer::{TokenCounts, TokenizerConfig, VocabularyMode};
    use crate::ml::vocab_index::IndexBuilder;

    fn frozen() -> Arc<FrozenIndices> {
        let mut counts = TokenCounts::default();
        counts.words.insert("hello".into(), 5);
        counts.words.insert("world".into(), 3);
        for c in "helowrd".chars() {
            counts.chars.insert(c, 1);
        }
        let config = TokenizerConfig::default();
        Arc::new(IndexBuilder::new(&config, &VocabularyMode::Open, &["NN", "VB"]).build(&counts))
    }

    fn example(n: usize, label: usize) -> Example {
        let mut seq = TokenSequence::with_capacity(n);
        for i in 0..n {
            let w = if i % 2 == 0 { "hello" } else { "world" };
            seq.push(w.into(), w.into(), "NN".into());
        }
        Example::from_sequence(seq, label)
    }

    fn config() -> PipelineConfig {
        PipelineConfig {
            batch_size:   4,
            shuffle_seed: Some(5),
            num_workers:  2,
            max_length:   30,
            ..PipelineConfig::new(3)
        }
    }

    #[test]
    fn test_bucket_boundaries_validation() {
        assert!(Buckets::from_boundaries(vec![0, 10, 20], 30).is_ok());
        assert!(Buckets::from_boundaries(vec![5, 10], 30).is_err());
        assert!(Buckets::from_boundaries(vec![0, 10, 10], 30).is_err());
        assert!(Buckets::from_boundaries(vec![0, 40], 30).is_err());
        assert!(Buckets::from_boundaries(vec![], 30).is_err());
        assert!(Buckets::evenly(0, 30).is_err());
        assert_eq!(Buckets::evenly(10, 50).unwrap().len(), 5);
    }

    #[test]
    fn test_bucket_ranges_cover_everything() {
        let b = Buckets::from_boundaries(vec![0, 10, 20], 30).unwrap();
        assert_eq!(b.bucket_of(0),  0);
        assert_eq!(b.bucket_of(9),  0);
        assert_eq!(b.bucket_of(10), 1);
        assert_eq!(b.bucket_of(30), 2);
        assert_eq!(b.bucket_of(99), 2);
        assert_eq!(b.range(0), (0, 10));
        assert_eq!(b.range(2), (20, 30));
    }

    #[test]
    fn test_seven_tokens_pad_to_bucket_bound() {
        let cfg = PipelineConfig {
            bucketing: Bucketing::Boundaries(vec![0, 10, 20]),
            pad_to:    PadTo::Fixed(30),
            ..config()
        };
        let pipeline = BatchPipeline::new(cfg, frozen()).unwrap();
        let dataset  = RecordDataset::new(vec![example(7, 0), example(25, 1)]);

        let batches: Vec<PaddedBatch> = pipeline.eval(&dataset).collect();
        let small = batches.iter().find(|b| b.num_tokens == vec![7]).unwrap();
        assert_eq!(small.bucket,  0);
        assert_eq!(small.seq_len, 10);
        let large = batches.iter().find(|b| b.num_tokens == vec![25]).unwrap();
        assert_eq!(large.seq_len, 30);
    }

    #[test]
    fn test_padding_sentinels_and_one_hot() {
        let pipeline = BatchPipeline::new(config(), frozen()).unwrap();
        let dataset  = RecordDataset::new(vec![example(2, 1), example(4, 2)]);
        let batch    = pipeline.eval(&dataset).next().unwrap();

        assert!(batch.is_rectangular());
        assert_eq!(batch.seq_len, 4);
        // first row: two real tokens then padding
        assert_eq!(&batch.word_ids[..4], &[1, 2, 0, 0]);
        // pad positions have an all-zero tag row
        let t = batch.num_tags;
        assert!(batch.tags[2 * t..4 * t].iter().all(|v| *v == 0.0));
        assert_eq!(batch.tags[0], 1.0);
        // "hello" chars, left-aligned then zero
        let c = batch.char_limit;
        assert!(batch.char_ids[..5].iter().all(|id| *id > 0));
        assert!(batch.char_ids[5..c].iter().all(|id| *id == 0));
        assert_eq!(batch.labels, vec![0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(batch.label_ids, vec![1, 2]);
    }

    #[test]
    fn test_eval_is_exhaustive_and_deterministic() {
        let cfg = PipelineConfig { bucketing: Bucketing::Width(10), max_prefetch: 1, ..config() };
        let pipeline = BatchPipeline::new(cfg, frozen()).unwrap();
        let dataset  = RecordDataset::new((1..=23).map(|n| example(n, n % 3)).collect());

        let first: Vec<PaddedBatch>  = pipeline.eval(&dataset).collect();
        let second: Vec<PaddedBatch> = pipeline.eval(&dataset).collect();
        assert_eq!(first, second);

        let mut seen: Vec<i64> = first.iter().flat_map(|b| b.num_tokens.clone()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (1..=23).collect::<Vec<i64>>());
        assert!(first.iter().all(|b| b.num_tokens.iter().all(|&n| n as usize <= b.seq_len)));
    }

    #[test]
    fn test_training_shuffle_is_seeded_and_complete() {
        let pipeline = BatchPipeline::new(config(), frozen()).unwrap();
        let lengths: Vec<usize> = (1..=10).collect();

        let a = pipeline.plan(&lengths, BatchMode::Train);
        let b = pipeline.plan(&lengths, BatchMode::Train);
        assert_eq!(a, b);

        let mut all: Vec<usize> = a.iter().flat_map(|p| p.indices.clone()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_drop_remainder_only_in_training() {
        let cfg      = PipelineConfig { drop_remainder: true, ..config() };
        let pipeline = BatchPipeline::new(cfg, frozen()).unwrap();
        let lengths  = vec![3; 10];
        assert_eq!(pipeline.plan(&lengths, BatchMode::Train).len(), 2);
        assert_eq!(pipeline.plan(&lengths, BatchMode::Eval).len(),  3);
    }

    #[test]
    fn test_per_bucket_batch_sizes() {
        let cfg = PipelineConfig {
            bucketing:          Bucketing::Boundaries(vec![0, 10]),
            bucket_batch_sizes: Some(vec![2, 5]),
            ..config()
        };
        let pipeline = BatchPipeline::new(cfg, frozen()).unwrap();
        let lengths  = vec![1, 2, 3, 11, 12, 13];
        let plan     = pipeline.plan(&lengths, BatchMode::Eval);
        let sizes: Vec<(usize, usize)> = plan.iter().map(|p| (p.bucket, p.indices.len())).collect();
        assert_eq!(sizes, vec![(0, 2), (0, 1), (1, 3)]);
    }

    #[test]
    fn test_invalid_settings_fail_fast() {
        let bad = [
            PipelineConfig { batch_size: 0, ..config() },
            PipelineConfig { pad_to: PadTo::Fixed(0), ..config() },
            PipelineConfig { bucketing: Bucketing::Boundaries(vec![0, 50]), ..config() },
            PipelineConfig { bucket_batch_sizes: Some(vec![1, 2]), ..config() },
        ];
        for cfg in bad {
            assert!(matches!(
                BatchPipeline::new(cfg, frozen()),
                Err(PipelineError::Configuration(_))
            ));
        }
    }

    #[test]
    fn test_fixed_padding_truncates() {
        let cfg      = PipelineConfig { pad_to: PadTo::Fixed(3), ..config() };
        let pipeline = BatchPipeline::new(cfg, frozen()).unwrap();
        let dataset  = RecordDataset::new(vec![example(5, 0)]);
        let batch    = pipeline.eval(&dataset).next().unwrap();
        assert_eq!(batch.seq_len, 3);
        assert_eq!(batch.num_tokens, vec![3]);
        assert!((batch.padding_efficiency() - 1.0).abs() < 1e-9);
    }
}
