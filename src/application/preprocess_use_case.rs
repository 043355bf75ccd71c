// ============================================================
// Layer 2 — PreprocessUseCase
// ============================================================
// Orchestrates one full preprocessing run in order:
//
//   Step 1:  Create the output directory     (Layer 6 - infra)
//   Step 2:  Load labelled rows              (Layer 4 - data)
//   Step 3:  Build the class index           (Layer 3 - domain)
//   Step 4:  Normalize every text            (Layer 4 - data)
//   Step 5:  Read pretrained vectors         (Layer 5 - ml)
//   Step 6:  Fit the tokenizer in shards     (Layer 5 - ml)
//   Step 7:  Freeze the indices              (Layer 5 - ml)
//   Step 8:  Build examples                  (Layer 3 - domain)
//   Step 9:  Build embedding matrices        (Layer 5 - ml)
//   Step 10: Train / validation split        (Layer 4 - data)
//   Step 11: Write record files              (Layer 4 - data)
//   Step 12: Save snapshot and metadata      (Layer 6 - infra)
//
// Every dropped row is counted in the skip histogram and
// written to skipped.csv with the stage that dropped it.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            rayon crate documentation

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::{
    loader::{row_source, DatasetKind},
    normalizer::Normalizer,
    record_writer::{RecordWriter, ShutdownSignal},
    segmenter::UnigramSegmenter,
    splitter::split_train_val,
    tagger::{RuleTagger, TagScheme},
};
use crate::domain::error::{PipelineError, PipelineResult, SkipReason, SkipStats};
use crate::domain::example::{ClassIndex, Example};
use crate::domain::traits::{LinguisticTokenizer, WordSegmenter};
use crate::infra::{
    artifact_store::{ArtifactStore, TRAIN_FILE, VAL_FILE},
    metrics::{RunMetrics, SkipLog},
};
use crate::ml::{
    embeddings::{EmbeddingMatrixBuilder, EmbeddingSource},
    tokenizer::{FitOutcome, TokenCounts, Tokenizer, TokenizerConfig, VocabularyMode, DEFAULT_FILTERS},
};

// ─── Preprocess Configuration ────────────────────────────────────────────────
// Every knob of a run. Serialisable so it can be saved next to the
// artifacts and reloaded by the encode path. Missing keys in a config
// file take their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    pub dataset:             DatasetKind,
    pub input_path:          String,
    pub output_dir:          String,
    pub embeddings_path:     Option<String>,
    /// Word list for hashtag segmentation, most frequent first.
    pub segmenter_path:      Option<String>,
    pub embed_dim:           usize,
    pub char_dim:            usize,
    pub max_tokens:          usize,
    pub char_limit:          usize,
    pub max_words:           usize,
    pub max_chars:           usize,
    pub min_word_occurrence: usize,
    pub min_char_occurrence: usize,
    pub oov_token:           String,
    pub trainable_words:     Vec<String>,
    /// Defaults to closed when an embeddings file is given.
    pub closed_vocabulary:   Option<bool>,
    pub filters:             String,
    pub tag_scheme:          String,
    pub train_fraction:      f64,
    pub seed:                Option<u64>,
    pub num_shards:          usize,
    pub sample_size:         usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            dataset:             DatasetKind::SemEval,
            input_path:          "data/sem_eval".to_string(),
            output_dir:          "artifacts".to_string(),
            embeddings_path:     None,
            segmenter_path:      None,
            embed_dim:           200,
            char_dim:            200,
            max_tokens:          50,
            char_limit:          16,
            max_words:           25_000,
            max_chars:           2_500,
            min_word_occurrence: 0,
            min_char_occurrence: 0,
            oov_token:           "<oov>".to_string(),
            trainable_words:     vec!["<oov>".to_string()],
            closed_vocabulary:   None,
            filters:             DEFAULT_FILTERS.to_string(),
            tag_scheme:          "penn".to_string(),
            train_fraction:      0.8,
            seed:                None,
            num_shards:          1,
            sample_size:         1000,
        }
    }
}

impl PreprocessConfig {
    pub fn is_closed_vocabulary(&self) -> bool {
        self.closed_vocabulary.unwrap_or(self.embeddings_path.is_some())
    }

    pub fn tokenizer_config(&self) -> TokenizerConfig {
        TokenizerConfig {
            max_words:           self.max_words,
            max_chars:           self.max_chars,
            min_word_occurrence: self.min_word_occurrence,
            min_char_occurrence: self.min_char_occurrence,
            oov_token:           self.oov_token.clone(),
            trainable_words:     self.trainable_words.clone(),
            filters:             TokenizerConfig::filters_from(&self.filters),
        }
    }

    /// Reject bad settings before any work starts.
    pub fn validate(&self) -> PipelineResult<()> {
        let positive = [
            ("embed_dim",  self.embed_dim),
            ("char_dim",   self.char_dim),
            ("max_tokens", self.max_tokens),
            ("char_limit", self.char_limit),
            ("num_shards", self.num_shards),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(PipelineError::config(format!("{name} must be at least 1")));
        }
        if !(0.0..=1.0).contains(&self.train_fraction) {
            return Err(PipelineError::config(format!(
                "train_fraction must lie in [0, 1], got {}",
                self.train_fraction
            )));
        }
        if self.oov_token.trim().is_empty() {
            return Err(PipelineError::config("oov_token must not be blank"));
        }
        if self.closed_vocabulary == Some(true) && self.embeddings_path.is_none() {
            return Err(PipelineError::config(
                "A closed vocabulary needs an embeddings file to define it",
            ));
        }
        TagScheme::parse(&self.tag_scheme)?;
        Ok(())
    }

    pub fn normalizer(&self) -> PipelineResult<Normalizer> {
        let segmenter: Arc<dyn WordSegmenter> = match &self.segmenter_path {
            Some(path) => Arc::new(UnigramSegmenter::from_file(path)?),
            None       => Arc::new(UnigramSegmenter::builtin()),
        };
        Ok(Normalizer::new(segmenter))
    }

    pub fn tagger(&self) -> PipelineResult<Arc<dyn LinguisticTokenizer>> {
        let scheme = TagScheme::parse(&self.tag_scheme)?;
        Ok(Arc::new(RuleTagger::new(scheme)))
    }
}

// ─── PreprocessUseCase ────────────────────────────────────────────────────────
pub struct PreprocessUseCase {
    config: PreprocessConfig,
}

impl PreprocessUseCase {
    pub fn new(config: PreprocessConfig) -> Self {
        Self { config }
    }

    /// Run the whole pipeline. A shutdown request stops the record
    /// writers between records; metadata is still saved.
    pub fn execute(&self, shutdown: &ShutdownSignal) -> Result<RunMetrics> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 1: Output directory and skip log ────────────────────────────
        let store = ArtifactStore::create(&cfg.output_dir)
            .with_context(|| format!("Cannot create output directory '{}'", cfg.output_dir))?;
        let skip_log    = SkipLog::create(store.dir())?;
        let mut skipped = SkipStats::new();

        // ── Step 2: Load rows ────────────────────────────────────────────────
        tracing::info!("Loading {} data from '{}'", cfg.dataset.as_str(), cfg.input_path);
        let loaded = row_source(cfg.dataset, &cfg.input_path)
            .load_rows()
            .with_context(|| format!("Cannot load dataset from '{}'", cfg.input_path))?;
        record_skips(&skip_log, &mut skipped, "load", &loaded.skipped)?;

        // ── Step 3: Class index ──────────────────────────────────────────────
        let mut rows: Vec<(String, String)> = Vec::with_capacity(loaded.rows.len());
        let mut unlabelled = Vec::new();
        for (i, row) in loaded.rows.into_iter().enumerate() {
            match row.label {
                Some(label) => rows.push((row.text, label)),
                None        => unlabelled.push((i + 1, SkipReason::MissingField("class"))),
            }
        }
        record_skips(&skip_log, &mut skipped, "label", &unlabelled)?;

        let classes = ClassIndex::from_labels(rows.iter().map(|(_, label)| label.as_str()));
        if classes.is_empty() {
            bail!("No labelled rows found in '{}'", cfg.input_path);
        }
        tracing::info!("{} rows across {} classes: {:?}", rows.len(), classes.len(), classes.names());

        // ── Step 4: Normalize ────────────────────────────────────────────────
        let normalizer = cfg.normalizer()?;
        let texts: Vec<String> = rows.iter().map(|(text, _)| text.clone()).collect();
        let normalized = normalizer.normalize_all(&texts);

        // ── Step 5: Pretrained vectors and vocabulary mode ───────────────────
        let source = match &cfg.embeddings_path {
            Some(path) => EmbeddingSource::read(path, cfg.embed_dim)
                .with_context(|| format!("Cannot read embeddings from '{path}'"))?,
            None => EmbeddingSource::empty(cfg.embed_dim),
        };
        let vocabulary = if cfg.is_closed_vocabulary() {
            VocabularyMode::Closed(source.keys().map(str::to_string).collect())
        } else {
            VocabularyMode::Open
        };

        // ── Step 6: Fit in shards ────────────────────────────────────────────
        let mut tokenizer = Tokenizer::new(cfg.tokenizer_config(), vocabulary, cfg.tagger()?);
        let outcome = fit_in_shards(&mut tokenizer, &normalized, cfg.num_shards);

        // ── Step 7: Freeze ───────────────────────────────────────────────────
        let frozen = tokenizer.finalize();

        // ── Step 8: Examples ─────────────────────────────────────────────────
        let mut examples    = Vec::with_capacity(rows.len());
        let mut token_skips = Vec::new();
        for (i, (result, (_, label))) in outcome.sequences.into_iter().zip(&rows).enumerate() {
            match (result, classes.id(label)) {
                (Ok(seq), Some(id)) => examples.push(Example::from_sequence(seq, id)),
                (Ok(_), None)       => token_skips.push((i + 1, SkipReason::MissingField("class"))),
                (Err(reason), _)    => token_skips.push((i + 1, reason)),
            }
        }
        record_skips(&skip_log, &mut skipped, "tokenize", &token_skips)?;
        tracing::info!("Built {} examples", examples.len());

        // ── Step 9: Embedding matrices ───────────────────────────────────────
        let matrices = EmbeddingMatrixBuilder::new(cfg.embed_dim, cfg.char_dim)
            .with_seed(cfg.seed)
            .build(&frozen, &source)?;
        store.save_matrices(&matrices)?;

        // ── Step 10: Split and sample ────────────────────────────────────────
        let (train, val) = split_train_val(examples, cfg.train_fraction, cfg.seed);
        store.save_examples(&sample_examples(&train, cfg.sample_size, cfg.seed))?;

        // ── Step 11: Record files ────────────────────────────────────────────
        let writer    = RecordWriter::new(Some(cfg.max_tokens), cfg.seed);
        let train_out = writer
            .write(store.path(TRAIN_FILE), train, shutdown)
            .with_context(|| "Cannot write training records")?;
        let val_out = writer
            .write(store.path(VAL_FILE), val, shutdown)
            .with_context(|| "Cannot write validation records")?;
        skipped.merge(&train_out.skipped);
        skipped.merge(&val_out.skipped);

        // ── Step 12: Snapshot and metadata ───────────────────────────────────
        store.tokenizer_store().save(&frozen, &cfg.oov_token)?;
        store.save_classes(&classes)?;
        store.save_config(cfg)?;

        let meta = RunMetrics {
            num_train:           train_out.written,
            num_val:             val_out.written,
            num_classes:         classes.len(),
            num_tags:            frozen.tags.len(),
            num_words:           frozen.words.len(),
            num_chars:           frozen.chars.len(),
            num_frequency_words: frozen.num_frequency_words,
            num_trainable:       frozen.trainable.len(),
            embedding_misses:    matrices.misses,
            word_dim:            cfg.embed_dim,
            char_dim:            cfg.char_dim,
            max_tokens:          cfg.max_tokens,
            char_limit:          cfg.char_limit,
            skipped,
            interrupted:         train_out.interrupted || val_out.interrupted,
        };
        store.save_meta(&meta)?;

        tracing::info!(
            "Preprocessing complete: {} train, {} val, {} skipped → '{}'",
            meta.num_train,
            meta.num_val,
            meta.skipped.total(),
            store.dir().display()
        );
        Ok(meta)
    }
}

/// Log skips and fold them into the run histogram.
fn record_skips(
    log:     &SkipLog,
    stats:   &mut SkipStats,
    stage:   &str,
    skips:   &[(usize, SkipReason)],
) -> Result<()> {
    for (_, reason) in skips {
        stats.record(reason);
    }
    log.log(stage, skips)
        .with_context(|| format!("Cannot append to '{}'", log.csv_path().display()))
}

/// Fit one fork per shard in parallel, then merge the counts in shard
/// order. The result does not depend on the number of shards.
pub fn fit_in_shards(tokenizer: &mut Tokenizer, texts: &[String], num_shards: usize) -> FitOutcome {
    let shard_len = texts.len().div_ceil(num_shards.max(1)).max(1);
    let template  = &*tokenizer;

    let shards: Vec<(FitOutcome, TokenCounts)> = texts
        .par_chunks(shard_len)
        .map(|chunk| {
            let mut fork = template.fork();
            let outcome  = fork.fit_on_texts(chunk);
            (outcome, fork.counts().clone())
        })
        .collect();
    tracing::debug!("Fitted {} shards of up to {} texts", shards.len(), shard_len);

    let mut merged = FitOutcome::default();
    for (outcome, counts) in shards {
        tokenizer.merge_counts(&counts);
        merged.sequences.extend(outcome.sequences);
        merged.skipped.merge(&outcome.skipped);
    }
    merged
}

fn sample_examples(train: &[Example], n: usize, seed: Option<u64>) -> Vec<Example> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None       => StdRng::from_entropy(),
    };
    train.choose_multiple(&mut rng, n).cloned().collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record_writer::read_records;
    use crate::infra::artifact_store::{CHAR_EMBEDDINGS_FILE, WORD_EMBEDDINGS_FILE};

    const TSV: &str = "1\tpositive\tI love this so much :)\n\
                       2\tnegative\tThis is awful :(\n\
                       3\tneutral\tJust landed in #NewYork\n\
                       4\tpositive\tBest day EVER!!!\n\
                       5\tnegative\tworst service, never again\n\
                       6\tpositive\tI love this so much :)\n\
                       7\tneutral\t\n";

    fn config(dir: &tempfile::TempDir) -> PreprocessConfig {
        let data = dir.path().join("data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("2016.tsv"), TSV).unwrap();
        PreprocessConfig {
            input_path:  data.display().to_string(),
            output_dir:  dir.path().join("out").display().to_string(),
            embed_dim:   4,
            char_dim:    3,
            seed:        Some(7),
            sample_size: 2,
            ..PreprocessConfig::default()
        }
    }

    #[test]
    fn test_full_run_writes_every_artifact() {
        let dir  = tempfile::tempdir().unwrap();
        let cfg  = config(&dir);
        let meta = PreprocessUseCase::new(cfg.clone()).execute(&ShutdownSignal::new()).unwrap();

        assert_eq!(meta.num_train, 4);
        assert_eq!(meta.num_val,   1);
        assert_eq!(meta.num_classes, 3);
        assert_eq!(meta.skipped.get("duplicate"),  1);
        assert_eq!(meta.skipped.get("empty_text"), 1);
        assert!(!meta.interrupted);

        let store = ArtifactStore::open(&cfg.output_dir).unwrap();
        assert_eq!(store.load_meta().unwrap(), meta);
        assert_eq!(store.load_config().unwrap(), cfg);
        assert_eq!(store.load_classes().unwrap().names(), vec!["negative", "neutral", "positive"]);

        let train = read_records(store.path(TRAIN_FILE)).unwrap();
        assert_eq!(train.len(), 4);
        assert!(train.iter().all(|e| e.label < 3 && e.num_tokens > 0));

        let (frozen, _) = store.tokenizer_store().load().unwrap();
        assert_eq!(frozen.words.len(), meta.num_words);
        let words = store.load_matrix(WORD_EMBEDDINGS_FILE).unwrap();
        assert_eq!(words.dim(), (meta.num_words + 1, 4));
        let chars = store.load_matrix(CHAR_EMBEDDINGS_FILE).unwrap();
        assert_eq!(chars.dim(), (meta.num_chars + 1, 3));
        assert!(store.path("skipped.csv").exists());
        assert!(store.path("examples.json").exists());
    }

    #[test]
    fn test_closed_vocabulary_from_embeddings() {
        let dir = tempfile::tempdir().unwrap();
        let emb = dir.path().join("vectors.txt");
        std::fs::write(&emb, "love 0.1 0.2 0.3 0.4\nthis 0.5 0.6 0.7 0.8\n").unwrap();
        let cfg = PreprocessConfig {
            embeddings_path: Some(emb.display().to_string()),
            ..config(&dir)
        };

        let meta = PreprocessUseCase::new(cfg).execute(&ShutdownSignal::new()).unwrap();
        assert_eq!(meta.num_frequency_words, 2);
        assert_eq!(meta.embedding_misses,    0);
    }

    #[test]
    fn test_shutdown_still_saves_metadata() {
        let dir      = tempfile::tempdir().unwrap();
        let cfg      = config(&dir);
        let shutdown = ShutdownSignal::new();
        shutdown.request();

        let meta = PreprocessUseCase::new(cfg.clone()).execute(&shutdown).unwrap();
        assert!(meta.interrupted);
        assert_eq!(meta.num_train, 0);
        assert!(ArtifactStore::open(&cfg.output_dir).unwrap().load_meta().is_ok());
    }

    #[test]
    fn test_missing_input_is_typed() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = PreprocessConfig {
            input_path: dir.path().join("absent").display().to_string(),
            ..config(&dir)
        };
        let err = PreprocessUseCase::new(cfg).execute(&ShutdownSignal::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::ResourceMissing { .. })
        ));
    }

    #[test]
    fn test_invalid_settings_fail_fast() {
        let bad = [
            PreprocessConfig { num_shards: 0, ..PreprocessConfig::default() },
            PreprocessConfig { train_fraction: 1.5, ..PreprocessConfig::default() },
            PreprocessConfig { tag_scheme: "ud".into(), ..PreprocessConfig::default() },
            PreprocessConfig { closed_vocabulary: Some(true), ..PreprocessConfig::default() },
        ];
        for cfg in bad {
            assert!(matches!(cfg.validate(), Err(PipelineError::Configuration(_))));
        }
    }

    #[test]
    fn test_shard_count_does_not_change_counts() {
        let texts: Vec<String> = ["good day", "bad day", "good good", "meh", "ok then"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let cfg = PreprocessConfig::default();

        let mut single = Tokenizer::new(cfg.tokenizer_config(), VocabularyMode::Open, cfg.tagger().unwrap());
        let mut many   = Tokenizer::new(cfg.tokenizer_config(), VocabularyMode::Open, cfg.tagger().unwrap());
        let a = fit_in_shards(&mut single, &texts, 1);
        let b = fit_in_shards(&mut many,   &texts, 3);

        assert_eq!(single.counts(), many.counts());
        assert_eq!(a.sequences, b.sequences);
        assert_eq!(single.finalize(), many.finalize());
    }

    #[test]
    fn test_config_file_defaults_missing_keys() {
        let cfg: PreprocessConfig = serde_json::from_str(r#"{"dataset": "sent_140", "max_tokens": 30}"#).unwrap();
        assert_eq!(cfg.dataset,    DatasetKind::Sent140);
        assert_eq!(cfg.max_tokens, 30);
        assert_eq!(cfg.char_limit, 16);
        assert!(!cfg.is_closed_vocabulary());
    }
}
