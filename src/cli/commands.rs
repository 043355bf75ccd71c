// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the four subcommands and all their flags:
//
//   preprocess  raw dataset → indices, matrices, records
//   normalize   print normalized text
//   encode      map requests to ids with a saved snapshot
//   batches     run the batch pipeline over saved records
//
// clap's derive macros generate help text, missing-argument
// errors and the string → number conversions.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};

use crate::application::batches_use_case::BatchesConfig;
use crate::application::preprocess_use_case::PreprocessConfig;
use crate::data::loader::DatasetKind;
use crate::data::pipeline::{BatchMode, Bucketing, PadTo};
use crate::infra::artifact_store::TRAIN_FILE;
use crate::ml::tokenizer::DEFAULT_FILTERS;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build indices, embedding matrices and record files from a dataset
    Preprocess(PreprocessArgs),

    /// Normalize text from --text or stdin, one line at a time
    Normalize(NormalizeArgs),

    /// Encode requests against a saved tokenizer snapshot
    Encode(EncodeArgs),

    /// Batch a saved record file and report shapes and padding
    Batches(BatchesArgs),
}

fn parse_dataset(s: &str) -> Result<DatasetKind, String> {
    DatasetKind::parse(s).map_err(|e| e.to_string())
}

/// All arguments for the `preprocess` command.
#[derive(Args, Debug)]
pub struct PreprocessArgs {
    /// JSON config file; when given, every other flag is ignored
    #[arg(long)]
    pub config: Option<String>,

    /// Dataset layout: sem_eval or sent_140
    #[arg(long, default_value = "sem_eval", value_parser = parse_dataset)]
    pub dataset: DatasetKind,

    /// Directory of .tsv files (sem_eval) or a .csv file (sent_140)
    #[arg(long, default_value = "data/sem_eval")]
    pub input: String,

    #[arg(long, default_value = "artifacts")]
    pub output_dir: String,

    /// GloVe-style text file of pretrained vectors
    #[arg(long)]
    pub embeddings: Option<String>,

    /// Ranked word list for hashtag segmentation
    #[arg(long)]
    pub segmenter: Option<String>,

    #[arg(long, default_value_t = 200)]
    pub embed_dim: usize,

    #[arg(long, default_value_t = 200)]
    pub char_dim: usize,

    /// Longer examples are left out of the record files
    #[arg(long, default_value_t = 50)]
    pub max_tokens: usize,

    /// Characters kept per token
    #[arg(long, default_value_t = 16)]
    pub char_limit: usize,

    #[arg(long, default_value_t = 25_000)]
    pub max_words: usize,

    #[arg(long, default_value_t = 2_500)]
    pub max_chars: usize,

    /// A word is kept when seen more often than this
    #[arg(long, default_value_t = 0)]
    pub min_word_occurrence: usize,

    #[arg(long, default_value_t = 0)]
    pub min_char_occurrence: usize,

    #[arg(long, default_value = "<oov>")]
    pub oov_token: String,

    /// Words that get their own trainable vectors, comma separated
    #[arg(long, value_delimiter = ',', default_value = "<oov>")]
    pub trainable_words: Vec<String>,

    /// Defaults to true when --embeddings is given
    #[arg(long)]
    pub closed_vocabulary: Option<bool>,

    /// Characters dropped when they form a whole token
    #[arg(long, default_value = DEFAULT_FILTERS)]
    pub filters: String,

    #[arg(long, default_value = "penn")]
    pub tag_scheme: String,

    #[arg(long, default_value_t = 0.8)]
    pub train_fraction: f64,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Parallel shards for vocabulary fitting
    #[arg(long, default_value_t = 1)]
    pub num_shards: usize,

    /// Training examples copied to examples.json
    #[arg(long, default_value_t = 1000)]
    pub sample_size: usize,
}

/// Convert CLI PreprocessArgs into the application-layer config.
/// The application layer never sees clap types.
impl From<PreprocessArgs> for PreprocessConfig {
    fn from(a: PreprocessArgs) -> Self {
        PreprocessConfig {
            dataset:             a.dataset,
            input_path:          a.input,
            output_dir:          a.output_dir,
            embeddings_path:     a.embeddings,
            segmenter_path:      a.segmenter,
            embed_dim:           a.embed_dim,
            char_dim:            a.char_dim,
            max_tokens:          a.max_tokens,
            char_limit:          a.char_limit,
            max_words:           a.max_words,
            max_chars:           a.max_chars,
            min_word_occurrence: a.min_word_occurrence,
            min_char_occurrence: a.min_char_occurrence,
            oov_token:           a.oov_token,
            trainable_words:     a.trainable_words,
            closed_vocabulary:   a.closed_vocabulary,
            filters:             a.filters,
            tag_scheme:          a.tag_scheme,
            train_fraction:      a.train_fraction,
            seed:                a.seed,
            num_shards:          a.num_shards,
            sample_size:         a.sample_size,
        }
    }
}

#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// Text to normalize; stdin is read line by line when absent
    #[arg(long)]
    pub text: Option<String>,

    #[arg(long)]
    pub segmenter: Option<String>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Output directory of a preprocess run
    #[arg(long, default_value = "artifacts")]
    pub artifact_dir: String,

    /// Encode this text
    #[arg(long, conflicts_with_all = ["tokens", "body"])]
    pub text: Option<String>,

    /// Encode these already-normalized tokens, comma separated
    #[arg(long, value_delimiter = ',', conflicts_with = "body")]
    pub tokens: Vec<String>,

    /// Raw JSON request body; stdin is read as one body per line when
    /// no input flag is given
    #[arg(long)]
    pub body: Option<String>,
}

impl EncodeArgs {
    /// The single request body described by the flags, if any.
    pub fn request_body(&self) -> Option<String> {
        if let Some(body) = &self.body {
            return Some(body.clone());
        }
        if let Some(text) = &self.text {
            return Some(serde_json::json!({ "text": text }).to_string());
        }
        if !self.tokens.is_empty() {
            return Some(serde_json::json!({ "tokens": self.tokens }).to_string());
        }
        None
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    /// Shuffled, one epoch
    Train,
    /// Every record once, in order
    Eval,
}

impl From<ModeArg> for BatchMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Train => BatchMode::Train,
            ModeArg::Eval  => BatchMode::Eval,
        }
    }
}

#[derive(Args, Debug)]
pub struct BatchesArgs {
    #[arg(long, default_value = "artifacts")]
    pub artifact_dir: String,

    /// Record file inside the artifact directory
    #[arg(long, default_value = TRAIN_FILE)]
    pub records: String,

    #[arg(long, value_enum, default_value_t = ModeArg::Eval)]
    pub mode: ModeArg,

    #[arg(long, default_value_t = 64)]
    pub batch_size: usize,

    /// Pad to this length (or to each bucket's bound when bucketing);
    /// pads to the longest example in the batch when absent
    #[arg(long)]
    pub pad_to: Option<usize>,

    /// Bucket lower bounds, comma separated, starting at 0
    #[arg(long, value_delimiter = ',', conflicts_with = "bucket_width")]
    pub boundaries: Vec<usize>,

    /// Evenly spaced buckets of this width
    #[arg(long)]
    pub bucket_width: Option<usize>,

    /// One batch size per bucket, comma separated
    #[arg(long, value_delimiter = ',')]
    pub bucket_batch_sizes: Vec<usize>,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Drop each bucket's last short batch (train mode)
    #[arg(long)]
    pub drop_remainder: bool,

    #[arg(long, default_value_t = 4)]
    pub max_prefetch: usize,

    /// Worker threads; 0 uses one per core
    #[arg(long, default_value_t = 0)]
    pub num_workers: usize,

    /// Also build Burn tensors for every batch
    #[arg(long)]
    pub tensors: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl From<BatchesArgs> for BatchesConfig {
    fn from(a: BatchesArgs) -> Self {
        let bucketing = match (a.boundaries.is_empty(), a.bucket_width) {
            (false, _)       => Bucketing::Boundaries(a.boundaries),
            (true, Some(w))  => Bucketing::Width(w),
            (true, None)     => Bucketing::None,
        };
        BatchesConfig {
            artifact_dir:       a.artifact_dir,
            records:            a.records,
            mode:               a.mode.into(),
            batch_size:         a.batch_size,
            pad_to:             a.pad_to.map_or(PadTo::BatchMax, PadTo::Fixed),
            bucketing,
            bucket_batch_sizes: (!a.bucket_batch_sizes.is_empty()).then_some(a.bucket_batch_sizes),
            shuffle_seed:       a.seed,
            drop_remainder:     a.drop_remainder,
            max_prefetch:       a.max_prefetch,
            num_workers:        a.num_workers,
            to_tensors:         a.tensors,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    #[test]
    fn test_preprocess_defaults_match_config_defaults() {
        let cli = Cli::try_parse_from(["tweet-prepro", "preprocess"]).unwrap();
        let Commands::Preprocess(args) = cli.command else { panic!("wrong command") };
        assert_eq!(PreprocessConfig::from(args), PreprocessConfig::default());
    }

    #[test]
    fn test_preprocess_flags() {
        let cli = Cli::try_parse_from([
            "tweet-prepro", "preprocess",
            "--dataset", "sentiment140",
            "--trainable-words", "<oov>,brexit",
            "--seed", "5",
        ])
        .unwrap();
        let Commands::Preprocess(args) = cli.command else { panic!("wrong command") };
        let cfg = PreprocessConfig::from(args);
        assert_eq!(cfg.dataset, DatasetKind::Sent140);
        assert_eq!(cfg.trainable_words, vec!["<oov>", "brexit"]);
        assert_eq!(cfg.seed, Some(5));
    }

    #[test]
    fn test_unknown_dataset_is_rejected() {
        assert!(Cli::try_parse_from(["tweet-prepro", "preprocess", "--dataset", "imdb"]).is_err());
    }

    #[test]
    fn test_batches_bucketing_flags() {
        let cli = Cli::try_parse_from([
            "tweet-prepro", "batches",
            "--boundaries", "0,10,20",
            "--pad-to", "30",
            "--mode", "train",
        ])
        .unwrap();
        let Commands::Batches(args) = cli.command else { panic!("wrong command") };
        let cfg = BatchesConfig::from(args);
        assert_eq!(cfg.bucketing, Bucketing::Boundaries(vec![0, 10, 20]));
        assert_eq!(cfg.pad_to, PadTo::Fixed(30));
        assert_eq!(cfg.mode, BatchMode::Train);
        assert_eq!(cfg.bucket_batch_sizes, None);
    }

    #[test]
    fn test_encode_request_body() {
        let cli = Cli::try_parse_from(["tweet-prepro", "encode", "--tokens", "a,b"]).unwrap();
        let Commands::Encode(args) = cli.command else { panic!("wrong command") };
        assert_eq!(args.request_body().unwrap(), r#"{"tokens":["a","b"]}"#);
    }
}
