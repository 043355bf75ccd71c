// ============================================================
// Layer 2 — EncodeUseCase
// ============================================================
// Maps a single request to ids with the exact vocabulary a
// preprocessing run froze. Loading is done once:
//
//   Step 1: Open the artifact directory
//   Step 2: Read config.json and meta.json
//   Step 3: Load the tokenizer snapshot
//   Step 4: Rebuild the normalizer, tagger and a frozen Tokenizer
//
// After that every request is:
//
//   body → parse_request → normalize (text only) → tokenize
//        → truncate to max_tokens → word / char / tag ids
//
// Reference: Rust Book §9 (Error Handling)
//            serde crate documentation (untagged enums)

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::application::preprocess_use_case::PreprocessConfig;
use crate::application::request::{parse_request, EncodeRequest, EncodeResponse, ErrorResponse, RequestError};
use crate::data::normalizer::Normalizer;
use crate::domain::error::SkipReason;
use crate::domain::example::TokenSequence;
use crate::infra::artifact_store::ArtifactStore;
use crate::infra::metrics::RunMetrics;
use crate::ml::tokenizer::Tokenizer;

/// Either response shape, serialised without a wrapper key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EncodeOutcome {
    Ok(EncodeResponse),
    Err(ErrorResponse),
}

pub struct EncodeUseCase {
    config:     PreprocessConfig,
    meta:       RunMetrics,
    normalizer: Normalizer,
    tokenizer:  Tokenizer,
}

impl EncodeUseCase {
    pub fn load(artifact_dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = artifact_dir.into();

        // ── Step 1: Artifact directory ───────────────────────────────────────
        let store = ArtifactStore::open(&dir)
            .with_context(|| format!("Cannot open artifacts in '{}'", dir.display()))?;

        // ── Step 2: Settings of the run ──────────────────────────────────────
        let config = store.load_config()?;
        let meta   = store.load_meta()?;

        // ── Step 3: Snapshot ─────────────────────────────────────────────────
        let (frozen, manifest) = store
            .tokenizer_store()
            .load()
            .with_context(|| format!("Cannot load tokenizer snapshot from '{}'", dir.display()))?;
        if manifest.oov_token != config.oov_token {
            anyhow::bail!(
                "Snapshot OOV token '{}' does not match config.json ('{}')",
                manifest.oov_token,
                config.oov_token
            );
        }

        // ── Step 4: Frozen tokenizer ─────────────────────────────────────────
        let normalizer = config.normalizer()?;
        let tokenizer  = Tokenizer::from_frozen(
            frozen.into(),
            config.tokenizer_config(),
            config.is_closed_vocabulary(),
            config.tagger()?,
        );

        tracing::info!(
            "Encoder ready: {} words, {} chars, max {} tokens",
            meta.num_words,
            meta.num_chars,
            meta.max_tokens
        );
        Ok(Self { config, meta, normalizer, tokenizer })
    }

    pub fn meta(&self) -> &RunMetrics {
        &self.meta
    }

    /// Ids for one validated request. Sequences longer than the run's
    /// `max_tokens` are cut to that length.
    pub fn encode(
        &mut self,
        request:    &EncodeRequest,
        parameters: Map<String, Value>,
    ) -> Result<EncodeResponse, RequestError> {
        let text = match request {
            EncodeRequest::Text(text)     => self.normalizer.normalize(text),
            EncodeRequest::Tokens(tokens) => tokens.join(" "),
        };

        let mut seq = self.tokenizer.tokenize(&text).map_err(|reason| match reason {
            SkipReason::TokenizerFailure(msg) => RequestError::InvalidField(msg),
            _                                 => RequestError::invalid_text(),
        })?;
        truncate(&mut seq, self.config.max_tokens);

        let encoded = self.tokenizer.encode(&seq, self.config.char_limit);
        tracing::debug!("Encoded {} tokens", seq.num_tokens());

        Ok(EncodeResponse {
            num_tokens: seq.num_tokens(),
            tokens:     seq.corrected,
            word_ids:   encoded.word_ids,
            char_ids:   encoded.char_ids,
            tag_ids:    encoded.tag_ids,
            parameters,
        })
    }

    /// Full request/response cycle over a raw JSON body.
    pub fn handle(&mut self, body: &str) -> EncodeOutcome {
        let (request, parameters) = match parse_request(body) {
            Ok(parsed) => parsed,
            Err(err)   => return EncodeOutcome::Err(err.to_response(echo_body(body))),
        };
        match self.encode(&request, parameters.clone()) {
            Ok(response) => EncodeOutcome::Ok(response),
            Err(err)     => {
                tracing::warn!("Rejected request: {}", err);
                EncodeOutcome::Err(err.to_response(parameters))
            }
        }
    }
}

fn truncate(seq: &mut TokenSequence, max_tokens: usize) {
    seq.original.truncate(max_tokens);
    seq.corrected.truncate(max_tokens);
    seq.tags.truncate(max_tokens);
}

/// Parameters to echo when the body did not validate.
fn echo_body(body: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => crate::application::request::echo_parameters(&map),
        _                      => Map::new(),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::preprocess_use_case::PreprocessUseCase;
    use crate::application::request::INVALID_TEXT_MESSAGE;
    use crate::data::pipeline::PaddedBatch;
    use crate::data::record_writer::{read_records, ShutdownSignal};
    use crate::infra::artifact_store::TRAIN_FILE;

    const TSV: &str = "1\tpositive\tI love this so much :)\n\
                       2\tnegative\tThis is awful :(\n\
                       3\tneutral\tJust landed in the city\n\
                       4\tpositive\tlove love love it\n";

    fn build(dir: &tempfile::TempDir, max_tokens: usize, embeddings: Option<String>) -> PathBuf {
        let data = dir.path().join("2016.tsv");
        std::fs::write(&data, TSV).unwrap();
        let out = dir.path().join("out");
        let cfg = PreprocessConfig {
            input_path:      data.display().to_string(),
            output_dir:      out.display().to_string(),
            embeddings_path: embeddings,
            embed_dim:       4,
            char_dim:        4,
            max_tokens,
            char_limit:      5,
            seed:            Some(1),
            ..PreprocessConfig::default()
        };
        PreprocessUseCase::new(cfg).execute(&ShutdownSignal::new()).unwrap();
        out
    }

    fn artifacts(dir: &tempfile::TempDir, max_tokens: usize) -> PathBuf {
        build(dir, max_tokens, None)
    }

    /// Closed-vocabulary run: only words with vectors enter the index.
    fn closed_artifacts(dir: &tempfile::TempDir) -> PathBuf {
        let emb = dir.path().join("vectors.txt");
        std::fs::write(
            &emb,
            "love 0.1 0.2 0.3 0.4\nthis 0.5 0.6 0.7 0.8\nland 0.1 0.1 0.1 0.1\nCity 0.2 0.2 0.2 0.2\n",
        )
        .unwrap();
        build(dir, 50, Some(emb.display().to_string()))
    }

    /// Serving ids must equal the ids the batch pipeline gives the same
    /// record tokens.
    fn assert_records_encode_like_batches(out: PathBuf) {
        let store   = ArtifactStore::open(&out).unwrap();
        let records = read_records(store.path(TRAIN_FILE)).unwrap();
        let (frozen, _) = store.tokenizer_store().load().unwrap();
        let mut encoder = EncodeUseCase::load(&out).unwrap();
        assert!(!records.is_empty());

        for ex in &records {
            let seq_len = ex.num_tokens;
            let batch   = PaddedBatch::from_examples(std::slice::from_ref(ex), &frozen, seq_len, 5, 3, 0);
            let resp    = encoder
                .encode(&EncodeRequest::Tokens(ex.tokens.clone()), Map::new())
                .unwrap();
            let served: Vec<i64> = resp.word_ids.iter().map(|&id| id as i64).collect();
            assert_eq!(served, batch.word_ids, "tokens {:?}", ex.tokens);
        }
    }

    #[test]
    fn test_text_request_uses_frozen_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = EncodeUseCase::load(artifacts(&dir, 50)).unwrap();

        let (req, params) = parse_request(r#"{"text": "I love this"}"#).unwrap();
        let resp = encoder.encode(&req, params).unwrap();

        assert_eq!(resp.tokens, vec!["i", "love", "this"]);
        assert_eq!(resp.num_tokens, 3);
        assert_eq!(resp.word_ids.len(), 3);
        // "love" is the most frequent word in the fixture.
        assert_eq!(resp.word_ids[1], 1);
        assert!(resp.char_ids.iter().all(|row| row.len() == 5));
        assert_eq!(resp.tag_ids.len(), 3);
        assert_eq!(resp.parameters["text"], "I love this");
    }

    #[test]
    fn test_unknown_words_map_to_oov() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = EncodeUseCase::load(artifacts(&dir, 50)).unwrap();
        let oov = encoder.meta().num_words;

        let resp = encoder
            .encode(&EncodeRequest::Tokens(vec!["zyzzyva".into()]), Map::new())
            .unwrap();
        assert_eq!(resp.word_ids, vec![oov]);
    }

    #[test]
    fn test_long_input_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = EncodeUseCase::load(artifacts(&dir, 3)).unwrap();

        let outcome = encoder.handle(r#"{"tokens": ["love", "this", "city", "so", "much"]}"#);
        match outcome {
            EncodeOutcome::Ok(resp) => {
                assert_eq!(resp.num_tokens, 3);
                assert_eq!(resp.tokens, vec!["love", "this", "city"]);
            }
            EncodeOutcome::Err(err) => panic!("unexpected error {err:?}"),
        }
    }

    #[test]
    fn test_blank_text_gets_error_response() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = EncodeUseCase::load(artifacts(&dir, 50)).unwrap();

        let json = serde_json::to_value(encoder.handle(r#"{"text": "   "}"#)).unwrap();
        assert_eq!(json["errorCode"], 0);
        assert_eq!(json["errorMessage"], INVALID_TEXT_MESSAGE);
        assert_eq!(json["parameters"]["text"], "   ");

        let json = serde_json::to_value(encoder.handle("{}")).unwrap();
        assert_eq!(json["errorMessage"], "Text key missing from body of POST request.");
    }

    #[test]
    fn test_serving_matches_batch_ids_open_run() {
        let dir = tempfile::tempdir().unwrap();
        assert_records_encode_like_batches(artifacts(&dir, 50));
    }

    #[test]
    fn test_serving_matches_batch_ids_closed_run() {
        let dir = tempfile::tempdir().unwrap();
        assert_records_encode_like_batches(closed_artifacts(&dir));
    }

    #[test]
    fn test_open_run_does_not_lemmatize_at_serving() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = EncodeUseCase::load(artifacts(&dir, 50)).unwrap();
        let oov = encoder.meta().num_words;

        // "landed" is in the index, "lands" is not and stays OOV.
        let resp = encoder
            .encode(&EncodeRequest::Tokens(vec!["lands".into()]), Map::new())
            .unwrap();
        assert_eq!(resp.tokens, vec!["lands"]);
        assert_eq!(resp.word_ids, vec![oov]);
    }

    #[test]
    fn test_non_ascii_tokens_in_closed_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = EncodeUseCase::load(closed_artifacts(&dir)).unwrap();
        let oov = encoder.meta().num_words;

        match encoder.handle("{\"tokens\": [\"ab\u{2082}ing\", \"\u{e9}\u{e9}ed\", \"love\"]}") {
            EncodeOutcome::Ok(resp) => {
                assert_eq!(resp.num_tokens, 3);
                assert_eq!(resp.word_ids[0], oov);
                assert_eq!(resp.word_ids[1], oov);
                assert_ne!(resp.word_ids[2], oov);
            }
            EncodeOutcome::Err(err) => panic!("unexpected error {err:?}"),
        }
        // The encoder keeps serving after the odd request.
        assert!(matches!(encoder.handle(r#"{"text": "love this"}"#), EncodeOutcome::Ok(_)));
    }

    #[test]
    fn test_load_without_artifacts_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(EncodeUseCase::load(dir.path().join("missing")).is_err());
        assert!(EncodeUseCase::load(dir.path()).is_err());
    }
}
