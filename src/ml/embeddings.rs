// ============================================================
// Layer 5 — Embedding Matrices
// ============================================================
// Builds three dense matrices from the frozen indices and a
// GloVe / FastText style text file:
//
//   pretrained  [W+1, d]   row id = word id, copied from the file
//   trainable   [T+1, d]   row = id − K, freshly sampled
//   chars       [C+1, cd]  row id = char id, freshly sampled
//
// Row 0 of every matrix is the zero pad vector. Trainable ids
// get a zero row in `pretrained`, so a trainer can freeze that
// matrix and only train the small one:
//
//   id:         0    1 … K        K+1 … K+T       (K+T+1)
//   pretrained  pad  file vectors  zero            OOV row
//   trainable   pad  ─            sampled rows 1..T
//
// A word missing from the file keeps a zero row and bumps the
// miss counter. A vector of the wrong length is a fatal
// configuration error, never reshaped.
//
// Reference: Pennington et al. (2014) GloVe

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::domain::error::{PipelineError, PipelineResult};
use crate::ml::vocab_index::{FrozenIndices, TrainableLayout};

/// Standard deviation for sampled rows.
pub const DEFAULT_SCALE: f32 = 0.1;

// ─── EmbeddingSource ──────────────────────────────────────────────────────────
/// Pretrained vectors keyed by token.
pub struct EmbeddingSource {
    vectors: HashMap<String, Vec<f32>>,
    dim:     usize,
}

impl EmbeddingSource {
    /// No vectors at all. Every frequency word becomes a miss.
    pub fn empty(dim: usize) -> Self {
        Self { vectors: HashMap::new(), dim }
    }

    /// Read `key v1 v2 … vd` lines. A leading `count dim` header is
    /// skipped after checking its dimension.
    pub fn read(path: impl AsRef<Path>, dim: usize) -> PipelineResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::missing("embeddings file", path));
        }
        let reader = BufReader::new(File::open(path)?);
        let mut vectors: HashMap<String, Vec<f32>> = HashMap::new();

        for (i, line) in reader.lines().enumerate() {
            let line   = line?;
            let lineno = i + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }

            if i == 0 && fields.len() == 2 {
                if let (Ok(_count), Ok(header_dim)) =
                    (fields[0].parse::<usize>(), fields[1].parse::<usize>())
                {
                    if header_dim != dim {
                        return Err(PipelineError::config(format!(
                            "Embedding file '{}' declares dimension {header_dim}, configured {dim}",
                            path.display()
                        )));
                    }
                    continue;
                }
            }

            if fields.len() != dim + 1 {
                return Err(PipelineError::config(format!(
                    "Embedding file '{}' line {lineno} has {} values, configured dimension is {dim}",
                    path.display(),
                    fields.len().saturating_sub(1)
                )));
            }

            let vector = fields[1..]
                .iter()
                .map(|v| v.parse::<f32>())
                .collect::<Result<Vec<f32>, _>>()
                .map_err(|e| PipelineError::format(path, lineno, e.to_string()))?;

            vectors.entry(fields[0].to_string()).or_insert(vector);
        }

        tracing::info!("Loaded {} embedding vectors (dim={}) from '{}'", vectors.len(), dim, path.display());
        Ok(Self { vectors, dim })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&[f32]> {
        self.vectors.get(key).map(Vec::as_slice)
    }

    /// Every key, for use as a closed vocabulary.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.vectors.keys().map(String::as_str)
    }
}

// ─── EmbeddingRow ─────────────────────────────────────────────────────────────
/// Which matrix, and which row of it, backs a word id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingRow {
    Pad,
    /// Row `id` of the pretrained matrix.
    Frozen(usize),
    /// Row `id − K` of the trainable matrix.
    Trainable(usize),
}

impl EmbeddingRow {
    pub fn classify(id: usize, layout: TrainableLayout) -> Self {
        let k = layout.frequency_words;
        if id == 0 {
            EmbeddingRow::Pad
        } else if id > k && id <= k + layout.trainable {
            EmbeddingRow::Trainable(id - k)
        } else {
            EmbeddingRow::Frozen(id)
        }
    }
}

// ─── EmbeddingMatrixBuilder ───────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct EmbeddingMatrixBuilder {
    pub word_dim: usize,
    pub char_dim: usize,
    pub scale:    f32,
    pub seed:     Option<u64>,
}

/// Output of `EmbeddingMatrixBuilder::build`.
#[derive(Debug, Clone)]
pub struct EmbeddingMatrices {
    pub pretrained: Array2<f32>,
    pub trainable:  Array2<f32>,
    pub chars:      Array2<f32>,
    /// Frequency words with no vector in the source.
    pub misses:     usize,
}

impl EmbeddingMatrixBuilder {
    pub fn new(word_dim: usize, char_dim: usize) -> Self {
        Self { word_dim, char_dim, scale: DEFAULT_SCALE, seed: None }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn build(
        &self,
        frozen: &FrozenIndices,
        source: &EmbeddingSource,
    ) -> PipelineResult<EmbeddingMatrices> {
        if source.dim() != self.word_dim {
            return Err(PipelineError::config(format!(
                "Embedding source has dimension {}, configured {}",
                source.dim(),
                self.word_dim
            )));
        }
        let normal = Normal::new(0.0f32, self.scale)
            .map_err(|e| PipelineError::config(format!("Invalid embedding scale: {e}")))?;
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None       => StdRng::from_entropy(),
        };

        let layout = frozen.layout();
        let mut pretrained = Array2::<f32>::zeros((frozen.words.len() + 1, self.word_dim));
        let mut trainable  = Array2::<f32>::zeros((layout.trainable + 1, self.word_dim));
        let mut chars      = Array2::<f32>::zeros((frozen.chars.len() + 1, self.char_dim));
        let mut misses     = 0usize;

        // ── Step 1: Word rows, in id order so a seed reproduces the matrices ─
        for (i, word) in frozen.words.tokens_by_id().into_iter().enumerate() {
            let id = i + 1;
            match EmbeddingRow::classify(id, layout) {
                EmbeddingRow::Pad => {}
                EmbeddingRow::Frozen(row) => match source.get(word) {
                    Some(vector) => {
                        for (dst, src) in pretrained.row_mut(row).iter_mut().zip(vector) {
                            *dst = *src;
                        }
                    }
                    None => misses += 1,
                },
                EmbeddingRow::Trainable(row) => {
                    for dst in trainable.row_mut(row).iter_mut() {
                        *dst = normal.sample(&mut rng);
                    }
                }
            }
        }

        // ── Step 2: Char rows, all sampled ───────────────────────────────────
        for row in 1..chars.nrows() {
            for dst in chars.row_mut(row).iter_mut() {
                *dst = normal.sample(&mut rng);
            }
        }

        if misses > 0 {
            tracing::warn!("{} of {} words have no pretrained vector", misses, frozen.words.len());
        }
        Ok(EmbeddingMatrices { pretrained, trainable, chars, misses })
    }
}
