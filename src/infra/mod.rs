// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Handles all cross-cutting persistence concerns that don't
// belong in any specific business layer:
//
//   artifact_store.rs  — The output directory of a run
//                        config, metadata, classes, example
//                        sample and the embedding matrices,
//                        each under a fixed file name.
//
//   tokenizer_store.rs — Frozen tokenizer snapshots
//                        Writes the word / char / tag /
//                        trainable indices and reads them back
//                        with full consistency checks, so the
//                        encode path sees the exact vocabulary
//                        the records were built with.
//
//   npy.rs             — NumPy .npy matrix files
//
//   metrics.rs         — meta.json and skipped.csv
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling)

/// Output directory layout and JSON artifacts
pub mod artifact_store;

/// Frozen index persistence
pub mod tokenizer_store;

/// NumPy v1.0 matrix reader/writer
pub mod npy;

/// Run metadata and the skipped-row log
pub mod metrics;
