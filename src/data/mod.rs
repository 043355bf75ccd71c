// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from raw tweets on disk all
// the way to padded tensor batches.
//
// The pipeline flows in this order:
//
//   SemEval TSVs / Sentiment140 CSV
//       │
//       ▼
//   loader          → reads rows, reports unusable ones
//       │
//       ▼
//   normalizer      → markers for urls, emoticons, hashtags …
//       │
//       ▼
//   tagger          → whitespace split + POS tags + lemmas
//       │                (fed into ml::tokenizer)
//       ▼
//   splitter        → seeded train / validation split
//       │
//       ▼
//   record_writer   → shuffled JSON Lines record files
//       │
//       ▼
//   dataset         → implements Burn's Dataset trait
//       │
//       ▼
//   pipeline        → bucketing, padding, prefetching
//       │
//       ▼
//   batcher         → Burn Batcher, tensors on a device
//
// Each module is responsible for exactly one step.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// SemEval and Sentiment140 row sources
pub mod loader;

/// The closed set of marker tokens and span splicing helpers
pub mod markers;

/// Hashtag word segmentation
pub mod segmenter;

/// Tweet text normalization
pub mod normalizer;

/// Rule-based POS tagger and lemmatizer
pub mod tagger;

/// Shuffles and splits data into train/validation sets
pub mod splitter;

/// JSON Lines record files
pub mod record_writer;

/// Implements Burn's Dataset trait for persisted examples
pub mod dataset;

/// Length bucketing, padding and prefetching
pub mod pipeline;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
