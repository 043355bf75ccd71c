// ============================================================
// Layer 6 — Artifact Store
// ============================================================
// Everything one preprocessing run leaves on disk lives in a
// single output directory:
//
//   out/
//     config.json                 effective PreprocessConfig
//     meta.json                   RunMetrics
//     classes.json                label → class id
//     examples.json               sample of training examples
//     train.jsonl, val.jsonl      record files
//     word_embeddings.npy         [W+1, d]
//     trainable_embeddings.npy    [T+1, d]
//     char_embeddings.npy         [C+1, cd]
//     word_index.json …           (TokenizerStore)
//     skipped.csv                 (SkipLog)
//
// Why save the config?
//   The encode path must normalize and tokenize exactly like
//   the run that built the indices. Reading config.json back
//   gives it the same filters, OOV token and char limit.
//
// Reference: serde_json crate documentation
//            Rust Book §9 (Error Handling)

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::application::preprocess_use_case::PreprocessConfig;
use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::example::{ClassIndex, Example};
use crate::infra::metrics::RunMetrics;
use crate::infra::npy;
use crate::infra::tokenizer_store::TokenizerStore;
use crate::ml::embeddings::EmbeddingMatrices;

pub const CONFIG_FILE:               &str = "config.json";
pub const META_FILE:                 &str = "meta.json";
pub const CLASSES_FILE:              &str = "classes.json";
pub const EXAMPLES_FILE:             &str = "examples.json";
pub const TRAIN_FILE:                &str = "train.jsonl";
pub const VAL_FILE:                  &str = "val.jsonl";
pub const WORD_EMBEDDINGS_FILE:      &str = "word_embeddings.npy";
pub const TRAINABLE_EMBEDDINGS_FILE: &str = "trainable_embeddings.npy";
pub const CHAR_EMBEDDINGS_FILE:      &str = "char_embeddings.npy";

/// Reads and writes the artifacts of one run.
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Create (or reuse) an output directory.
    pub fn create(dir: impl Into<PathBuf>) -> PipelineResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Open an existing output directory for reading.
    pub fn open(dir: impl Into<PathBuf>) -> PipelineResult<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(PipelineError::missing("artifact directory", &dir));
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn tokenizer_store(&self) -> TokenizerStore {
        TokenizerStore::new(&self.dir)
    }

    // ─── JSON ─────────────────────────────────────────────────────────────────
    pub fn save_json<T: Serialize>(&self, name: &str, value: &T) -> PipelineResult<()> {
        let path = self.path(name);
        fs::write(&path, serde_json::to_string_pretty(value)?)?;
        tracing::debug!("Wrote '{}'", path.display());
        Ok(())
    }

    pub fn load_json<T: DeserializeOwned>(&self, name: &str, kind: &'static str) -> PipelineResult<T> {
        let path = self.path(name);
        if !path.exists() {
            return Err(PipelineError::missing(kind, &path));
        }
        let body = fs::read_to_string(&path)?;
        serde_json::from_str(&body).map_err(|e| PipelineError::format(&path, e.line(), e.to_string()))
    }

    pub fn save_config(&self, config: &PreprocessConfig) -> PipelineResult<()> {
        self.save_json(CONFIG_FILE, config)
    }

    pub fn load_config(&self) -> PipelineResult<PreprocessConfig> {
        self.load_json(CONFIG_FILE, "preprocess config")
    }

    pub fn save_meta(&self, meta: &RunMetrics) -> PipelineResult<()> {
        self.save_json(META_FILE, meta)
    }

    pub fn load_meta(&self) -> PipelineResult<RunMetrics> {
        self.load_json(META_FILE, "run metadata")
    }

    pub fn save_classes(&self, classes: &ClassIndex) -> PipelineResult<()> {
        self.save_json(CLASSES_FILE, classes)
    }

    pub fn load_classes(&self) -> PipelineResult<ClassIndex> {
        self.load_json(CLASSES_FILE, "class index")
    }

    /// Sample of examples, original and corrected tokens side by side.
    pub fn save_examples(&self, sample: &[Example]) -> PipelineResult<()> {
        self.save_json(EXAMPLES_FILE, &sample)
    }

    // ─── Matrices ─────────────────────────────────────────────────────────────
    pub fn save_matrices(&self, matrices: &EmbeddingMatrices) -> PipelineResult<()> {
        npy::write_f32(self.path(WORD_EMBEDDINGS_FILE),      &matrices.pretrained)?;
        npy::write_f32(self.path(TRAINABLE_EMBEDDINGS_FILE), &matrices.trainable)?;
        npy::write_f32(self.path(CHAR_EMBEDDINGS_FILE),      &matrices.chars)?;
        tracing::info!(
            "Saved embedding matrices: words {:?}, trainable {:?}, chars {:?}",
            matrices.pretrained.dim(),
            matrices.trainable.dim(),
            matrices.chars.dim()
        );
        Ok(())
    }

    pub fn load_matrix(&self, name: &str) -> PipelineResult<Array2<f32>> {
        npy::read_f32(self.path(name))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_and_classes_survive_disk() {
        let dir   = tempfile::tempdir().unwrap();
        let store = ArtifactStore::create(dir.path().join("out")).unwrap();

        let config = PreprocessConfig { max_tokens: 42, ..PreprocessConfig::default() };
        store.save_config(&config).unwrap();
        assert_eq!(store.load_config().unwrap(), config);

        let classes = ClassIndex::from_labels(["negative", "positive"]);
        store.save_classes(&classes).unwrap();
        assert_eq!(store.load_classes().unwrap(), classes);
    }

    #[test]
    fn test_matrices_are_written_under_fixed_names() {
        let dir   = tempfile::tempdir().unwrap();
        let store = ArtifactStore::create(dir.path()).unwrap();
        let matrices = EmbeddingMatrices {
            pretrained: Array2::zeros((4, 3)),
            trainable:  Array2::zeros((2, 3)),
            chars:      Array2::zeros((5, 2)),
            misses:     0,
        };
        store.save_matrices(&matrices).unwrap();
        assert_eq!(store.load_matrix(TRAINABLE_EMBEDDINGS_FILE).unwrap().dim(), (2, 3));
        assert_eq!(store.load_matrix(CHAR_EMBEDDINGS_FILE).unwrap().dim(),      (5, 2));
    }

    #[test]
    fn test_open_requires_existing_directory() {
        assert!(matches!(
            ArtifactStore::open("/no/such/artifacts"),
            Err(PipelineError::ResourceMissing { .. })
        ));
    }

    #[test]
    fn test_corrupt_json_is_a_format_error() {
        let dir   = tempfile::tempdir().unwrap();
        let store = ArtifactStore::create(dir.path()).unwrap();
        fs::write(store.path(META_FILE), "{\n  \"num_train\": \n").unwrap();
        assert!(matches!(store.load_meta(), Err(PipelineError::Format { .. })));
    }
}
