// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one goal per command (preprocess, encode, inspect batches).
//
// Rules for this layer:
//   - No text rules or index math here
//   - No printing here (that's Layer 1)
//   - No direct file formats (that's Layer 4 and 6)
//   - Only workflow coordination, with anyhow context
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The full preprocessing run
pub mod preprocess_use_case;

// Request validation and response shapes of the encode path
pub mod request;

// Encoding single requests against a frozen snapshot
pub mod encode_use_case;

// Running the batch pipeline over persisted records
pub mod batches_use_case;
