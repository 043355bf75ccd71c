// ============================================================
// Layer 5 — Frozen Indices and the Index Builder
// ============================================================
// Turns frequency counts into immutable string → id maps.
//
// Word id layout (K frequency words, T trainable words):
//
//   0            pad, never assigned
//   1 ..= K      frequency-ranked words (count desc, then word asc)
//   K+1 ..= K+T  trainable words, in configured order
//   K+T+1        OOV, unless the OOV token is itself trainable
//
// Example with trainable = ["<oov>", "brexit"]:
//
//   the → 1, cat → 2, ..., <oov> → K+1, brexit → K+2
//
// The char index uses the same rules without the trainable
// range. The tag index follows the tagger's tag-set order.
//
// Once built, indices are read-only. Training and serving
// both load the same snapshot from disk.
//
// Reference: Rust Book §8.3 (Hash Maps)

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use crate::domain::error::{PipelineError, PipelineResult};

use crate::ml::tokenizer::{TokenCounts, TokenizerConfig, VocabularyMode};

// ─── VocabIndex ───────────────────────────────────────────────────────────────
/// One frozen string → id mapping with a reserved OOV id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabIndex {
    ids:    HashMap<String, usize>,
    oov_id: usize,
}

impl VocabIndex {
    /// Rebuild an index read from `source`.
    ///
    /// Ids must be exactly `1..=len` with no gaps or repeats, and the
    /// OOV token must be present.
    pub fn from_map(
        map:       HashMap<String, usize>,
        oov_token: &str,
        source:    impl AsRef<Path>,
    ) -> PipelineResult<Self> {
        let source = source.as_ref();
        let n = map.len();
        let mut seen = vec![false; n + 1];
        for (token, &id) in &map {
            if id == 0 || id > n {
                return Err(PipelineError::format(source, 1, format!("id {id} for '{token}' is outside 1..={n}")));
            }
            if seen[id] {
                return Err(PipelineError::format(source, 1, format!("id {id} is assigned twice")));
            }
            seen[id] = true;
        }
        let oov_id = *map
            .get(oov_token)
            .ok_or_else(|| PipelineError::format(source, 1, format!("OOV token '{oov_token}' is missing")))?;
        Ok(Self { ids: map, oov_id })
    }

    /// Exact lookup, no fallback.
    pub fn lookup(&self, token: &str) -> Option<usize> {
        self.ids.get(token).copied()
    }

    /// Exact, then lower, Capitalized and UPPER.
    pub fn find_word(&self, token: &str) -> Option<usize> {
        self.lookup(token)
            .or_else(|| casing_variants(token).iter().find_map(|v| self.lookup(v)))
    }

    /// Total lookup: `find_word`, then OOV.
    pub fn word_id(&self, token: &str) -> usize {
        self.find_word(token).unwrap_or(self.oov_id)
    }

    /// Total lookup for one character: exact, then lower, then upper.
    pub fn char_id(&self, c: char) -> usize {
        let exact = c.to_string();
        self.lookup(&exact)
            .or_else(|| self.lookup(&c.to_lowercase().collect::<String>()))
            .or_else(|| self.lookup(&c.to_uppercase().collect::<String>()))
            .unwrap_or(self.oov_id)
    }

    /// Exact lookup falling straight back to OOV (used for tags).
    pub fn id_or_oov(&self, token: &str) -> usize {
        self.lookup(token).unwrap_or(self.oov_id)
    }

    pub fn oov_id(&self) -> usize {
        self.oov_id
    }

    /// Number of assigned ids, which is also the largest id.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.ids.contains_key(token)
    }

    /// Sorted copy for stable JSON output.
    pub fn to_map(&self) -> BTreeMap<String, usize> {
        self.ids.iter().map(|(k, &v)| (k.clone(), v)).collect()
    }

    /// Tokens ordered by id.
    pub fn tokens_by_id(&self) -> Vec<&str> {
        let mut pairs: Vec<(&str, usize)> = self.ids.iter().map(|(k, &v)| (k.as_str(), v)).collect();
        pairs.sort_by_key(|&(_, id)| id);
        pairs.into_iter().map(|(k, _)| k).collect()
    }

    fn from_ordered(tokens: Vec<String>, oov_token: &str) -> Self {
        let mut ids: HashMap<String, usize> = HashMap::with_capacity(tokens.len() + 1);
        for token in tokens {
            let next = ids.len() + 1;
            ids.entry(token).or_insert(next);
        }
        let oov_id = match ids.get(oov_token) {
            Some(&id) => id,
            None => {
                let id = ids.len() + 1;
                ids.insert(oov_token.to_string(), id);
                id
            }
        };
        Self { ids, oov_id }
    }
}

/// lower, Capitalized, UPPER, skipping any equal to the input.
pub fn casing_variants(token: &str) -> Vec<String> {
    let lower = token.to_lowercase();
    let mut chars = lower.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None        => String::new(),
    };
    let upper = token.to_uppercase();

    let mut out: Vec<String> = Vec::with_capacity(3);
    for v in [lower, capitalized, upper] {
        if v != token && !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

// ─── TrainableLayout ──────────────────────────────────────────────────────────
/// Where the trainable range sits inside the word id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainableLayout {
    /// K: ids `1..=K` are frequency-ranked words.
    pub frequency_words: usize,
    /// T: ids `K+1..=K+T` are trainable words.
    pub trainable: usize,
}

// ─── FrozenIndices ────────────────────────────────────────────────────────────
/// The complete frozen snapshot produced by `Tokenizer::finalize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrozenIndices {
    pub words:               VocabIndex,
    pub chars:               VocabIndex,
    pub tags:                VocabIndex,
    /// Trainable words in id order.
    pub trainable:           Vec<String>,
    pub num_frequency_words: usize,
}

impl FrozenIndices {
    pub fn layout(&self) -> TrainableLayout {
        TrainableLayout {
            frequency_words: self.num_frequency_words,
            trainable:       self.trainable.len(),
        }
    }

    /// word → row in the trainable matrix (`id − K`, so rows start at 1).
    pub fn trainable_index(&self) -> BTreeMap<String, usize> {
        self.trainable
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i + 1))
            .collect()
    }
}

// ─── IndexBuilder ─────────────────────────────────────────────────────────────
/// Builds `FrozenIndices` from accumulated counts. Pure: the same counts
/// and settings always give the same indices.
pub struct IndexBuilder<'a> {
    config:     &'a TokenizerConfig,
    vocabulary: &'a VocabularyMode,
    tag_set:    &'a [&'static str],
}

impl<'a> IndexBuilder<'a> {
    pub fn new(
        config:     &'a TokenizerConfig,
        vocabulary: &'a VocabularyMode,
        tag_set:    &'a [&'static str],
    ) -> Self {
        Self { config, vocabulary, tag_set }
    }

    pub fn build(&self, counts: &TokenCounts) -> FrozenIndices {
        let cfg = self.config;

        // ── Step 1: Trainable words, deduplicated, configured order ──────────
        let mut trainable: Vec<String> = Vec::with_capacity(cfg.trainable_words.len());
        for w in &cfg.trainable_words {
            if !trainable.contains(w) {
                trainable.push(w.clone());
            }
        }
        let trainable_set: HashSet<&str> = trainable.iter().map(String::as_str).collect();

        // ── Step 2: Frequency pool ───────────────────────────────────────────
        let pool: Vec<(&str, usize)> = counts
            .words
            .iter()
            .map(|(w, &n)| (w.as_str(), n))
            .filter(|&(w, n)| {
                n > cfg.min_word_occurrence
                    && self.vocabulary.contains(w)
                    && !cfg.is_filtered(w)
                    && !trainable_set.contains(w)
                    && w != cfg.oov_token
            })
            .collect();
        let ranked = top_by_count(pool, cfg.max_words);
        let num_frequency_words = ranked.len();

        // ── Step 3: Word ids: frequency, trainable, OOV ──────────────────────
        let mut ordered = ranked;
        ordered.extend(trainable.iter().cloned());
        let words = VocabIndex::from_ordered(ordered, &cfg.oov_token);

        // ── Step 4: Char ids ─────────────────────────────────────────────────
        let char_keys: Vec<(String, usize)> = counts
            .chars
            .iter()
            .map(|(c, &n)| (c.to_string(), n))
            .filter(|(c, n)| *n > cfg.min_char_occurrence && !cfg.is_filtered(c))
            .collect();
        let char_pool = char_keys.iter().map(|(c, n)| (c.as_str(), *n)).collect();
        let chars     = VocabIndex::from_ordered(top_by_count(char_pool, cfg.max_chars), &cfg.oov_token);

        // ── Step 5: Tag ids in tag-set order ─────────────────────────────────
        let tags = VocabIndex::from_ordered(
            self.tag_set.iter().map(|t| t.to_string()).collect(),
            &cfg.oov_token,
        );

        tracing::debug!(
            "Built indices: {} words ({} frequency + {} trainable), {} chars, {} tags",
            words.len(),
            num_frequency_words,
            trainable.len(),
            chars.len(),
            tags.len()
        );

        FrozenIndices { words, chars, tags, trainable, num_frequency_words }
    }
}

/// Highest counts first; equal counts in code-point order.
fn top_by_count(mut pool: Vec<(&str, usize)>, limit: usize) -> Vec<String> {
    pool.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    pool.truncate(limit);
    pool.into_iter().map(|(w, _)| w.to_string()).collect()
}
