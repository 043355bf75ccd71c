// ============================================================
// Layer 5 — Vocabulary & Embedding Layer
// ============================================================
// Everything that turns token strings into ids and ids into
// vectors:
//
//   tokenizer.rs    — The stateful Tokenizer
//                     Unfit → Fitting → Frozen. Owns its own
//                     word / char / tag counters so shards can
//                     be fitted in parallel and merged.
//
//   correction.rs   — OOV correction strategies
//                     number, url, email, casing, lemma; tried
//                     in order against the closed vocabulary
//
//   vocab_index.rs  — Frozen string → id indices
//                     id 0 is padding, ids 1..=K are ranked by
//                     frequency, then the trainable words, then
//                     OOV
//
//   embeddings.rs   — Pretrained / trainable / char matrices
//                     row 0 zero, known rows copied, the rest
//                     drawn from a seeded normal distribution
//
// Reference: Mikolov et al. (2013) word2vec
//            Pennington et al. (2014) GloVe
//            rand_distr crate documentation

/// Tokenizer lifecycle, counting and encoding
pub mod tokenizer;

/// Ordered OOV correction strategies
pub mod correction;

/// Frozen word, char and tag indices
pub mod vocab_index;

/// Embedding matrix construction
pub mod embeddings;
