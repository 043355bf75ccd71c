// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Saves a frozen tokenizer snapshot and loads it back for the
// encode and batches commands.
//
// Files written to the artifact directory:
//
//   word_index.json       {"the": 1, "cat": 2, …, "<oov>": K+T}
//   char_index.json       {"e": 1, "t": 2, …}
//   tag_index.json        {"CC": 1, "CD": 2, …}
//   trainable_index.json  {"<oov>": 1, "brexit": 2}   (row = id − K)
//   tokenizer.json        {"oov_token", "num_frequency_words",
//                          "trainable_words"}
//
// The first four are plain JSON objects so external trainers
// can read them. tokenizer.json carries what is needed to
// rebuild the trainable range exactly.
//
// On load every index is checked: ids must be 1..=n with no
// gaps, the OOV token must be present, and the trainable
// words must sit at ids K+1..=K+T. A snapshot that fails any
// check is a format error, never silently repaired.
//
// Reference: serde_json crate documentation

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::error::{PipelineError, PipelineResult};
use crate::ml::vocab_index::{FrozenIndices, VocabIndex};

pub const WORD_INDEX_FILE:      &str = "word_index.json";
pub const CHAR_INDEX_FILE:      &str = "char_index.json";
pub const TAG_INDEX_FILE:       &str = "tag_index.json";
pub const TRAINABLE_INDEX_FILE: &str = "trainable_index.json";
pub const MANIFEST_FILE:        &str = "tokenizer.json";

/// Small sidecar describing the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerManifest {
    pub oov_token:           String,
    pub num_frequency_words: usize,
    /// In id order.
    pub trainable_words:     Vec<String>,
}

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn exists(&self) -> bool {
        self.dir.join(MANIFEST_FILE).exists()
    }

    /// Write all four indices and the manifest.
    pub fn save(&self, frozen: &FrozenIndices, oov_token: &str) -> PipelineResult<()> {
        fs::create_dir_all(&self.dir)?;

        write_json(&self.dir.join(WORD_INDEX_FILE),      &frozen.words.to_map())?;
        write_json(&self.dir.join(CHAR_INDEX_FILE),      &frozen.chars.to_map())?;
        write_json(&self.dir.join(TAG_INDEX_FILE),       &frozen.tags.to_map())?;
        write_json(&self.dir.join(TRAINABLE_INDEX_FILE), &frozen.trainable_index())?;

        let manifest = TokenizerManifest {
            oov_token:           oov_token.to_string(),
            num_frequency_words: frozen.num_frequency_words,
            trainable_words:     frozen.trainable.clone(),
        };
        write_json(&self.dir.join(MANIFEST_FILE), &manifest)?;

        tracing::info!(
            "Saved tokenizer snapshot to '{}' ({} words)",
            self.dir.display(),
            frozen.words.len()
        );
        Ok(())
    }

    /// Rebuild the frozen indices from disk.
    pub fn load(&self) -> PipelineResult<(FrozenIndices, TokenizerManifest)> {
        let manifest: TokenizerManifest = read_json(&self.dir.join(MANIFEST_FILE), "tokenizer manifest")?;
        let oov = manifest.oov_token.as_str();

        let words = load_index(&self.dir.join(WORD_INDEX_FILE), "word index", oov)?;
        let chars = load_index(&self.dir.join(CHAR_INDEX_FILE), "char index", oov)?;
        let tags  = load_index(&self.dir.join(TAG_INDEX_FILE),  "tag index",  oov)?;

        // ── Trainable words must sit right above the frequency range ─────────
        let k = manifest.num_frequency_words;
        for (i, word) in manifest.trainable_words.iter().enumerate() {
            if words.lookup(word) != Some(k + i + 1) {
                return Err(PipelineError::format(
                    self.dir.join(WORD_INDEX_FILE),
                    1,
                    format!("trainable word '{word}' is not at id {}", k + i + 1),
                ));
            }
        }

        let frozen = FrozenIndices {
            words,
            chars,
            tags,
            trainable:           manifest.trainable_words.clone(),
            num_frequency_words: k,
        };
        tracing::info!("Loaded tokenizer snapshot from '{}'", self.dir.display());
        Ok((frozen, manifest))
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> PipelineResult<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path, kind: &'static str) -> PipelineResult<T> {
    if !path.exists() {
        return Err(PipelineError::missing(kind, path));
    }
    let body = fs::read_to_string(path)?;
    serde_json::from_str(&body).map_err(|e| PipelineError::format(path, e.line(), e.to_string()))
}

fn load_index(path: &Path, kind: &'static str, oov: &str) -> PipelineResult<VocabIndex> {
    let map: HashMap<String, usize> = read_json(path, kind)?;
    VocabIndex::from_map(map, oov, path)
}
