// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, enums and traits that define the core
// concepts of the pipeline.
//
// Rules for this layer:
//   - NO burn types
//   - NO file I/O
//   - Only plain data, error types and traits
//
// Think of this layer as the "dictionary" of the system:
// it defines what a raw row, a token sequence and a persisted
// example ARE, not how they are produced.
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Raw rows, token sequences and persisted examples
pub mod example;

// Fatal errors and per-row skip reasons
pub mod error;

// Seams implemented by the data and ml layers
pub mod traits;
