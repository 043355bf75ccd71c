// ============================================================
// Layer 5 — Stateful Tokenizer
// ============================================================
// Splits normalized text into tagged tokens, counts word /
// char / tag frequencies, and once finalized maps tokens to
// stable integer ids.
//
// Lifecycle:
//
//   UNFIT ──fit_on_texts──▶ FITTING ──finalize──▶ FROZEN
//                              ▲                     │
//                              └────fit_on_texts─────┘
//
// Fitting again after freezing discards the frozen snapshot;
// the next `frozen()` call rebuilds it from the new counts.
//
// Counts are owned by each Tokenizer value. To fit shards in
// parallel, `fork()` one tokenizer per shard, fit each, then
// `merge_counts()` them into one before finalizing:
//
//   let mut shards: Vec<Tokenizer> = (0..n).map(|_| base.fork()).collect();
//   shards.par_iter_mut().zip(chunks).for_each(|(t, c)| { t.fit_on_texts(c); });
//   for s in &shards { base.merge_counts(s.counts()); }
//   let frozen = base.finalize();
//
// Reference: Rust Book §17.3 (State Pattern)

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::data::markers::is_marker;
use crate::domain::error::{SkipReason, SkipStats};
use crate::domain::example::TokenSequence;
use crate::domain::traits::{LinguisticTokenizer, TaggedToken};
use crate::ml::correction::CorrectionChain;
use crate::ml::vocab_index::{FrozenIndices, IndexBuilder};

/// ASCII punctuation. A token equal to one of these characters is dropped.
pub const DEFAULT_FILTERS: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

// ─── Configuration ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizerConfig {
    pub max_words:           usize,
    pub max_chars:           usize,
    /// A word enters the index only if its count is strictly greater.
    pub min_word_occurrence: usize,
    pub min_char_occurrence: usize,
    pub oov_token:           String,
    pub trainable_words:     Vec<String>,
    pub filters:             HashSet<String>,
}

impl TokenizerConfig {
    /// Build a filter set from a string of single characters.
    pub fn filters_from(chars: &str) -> HashSet<String> {
        chars.chars().map(|c| c.to_string()).collect()
    }

    pub fn is_filtered(&self, token: &str) -> bool {
        self.filters.contains(token)
    }
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            max_words:           25_000,
            max_chars:           2_500,
            min_word_occurrence: 0,
            min_char_occurrence: 0,
            oov_token:           "<oov>".to_string(),
            trainable_words:     vec!["<oov>".to_string()],
            filters:             Self::filters_from(DEFAULT_FILTERS),
        }
    }
}

/// Which words may enter the word index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VocabularyMode {
    /// Only words in this reference set (e.g. words with embeddings).
    /// Enables OOV correction.
    Closed(HashSet<String>),
    /// Every observed word.
    Open,
}

impl VocabularyMode {
    pub fn contains(&self, word: &str) -> bool {
        match self {
            VocabularyMode::Closed(v) => v.contains(word),
            VocabularyMode::Open      => true,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, VocabularyMode::Closed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerState {
    Unfit,
    Fitting,
    Frozen,
}

// ─── TokenCounts ──────────────────────────────────────────────────────────────
/// Frequency counters owned by one tokenizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenCounts {
    pub words: HashMap<String, usize>,
    pub chars: HashMap<char, usize>,
    pub tags:  HashMap<String, usize>,
}

impl TokenCounts {
    pub fn record(&mut self, seq: &TokenSequence) {
        for (token, tag) in seq.corrected.iter().zip(&seq.tags) {
            *self.words.entry(token.clone()).or_insert(0) += 1;
            *self.tags.entry(tag.clone()).or_insert(0) += 1;
            for c in token.chars() {
                *self.chars.entry(c).or_insert(0) += 1;
            }
        }
    }

    /// Sum another shard's counts into this one.
    pub fn merge(&mut self, other: &TokenCounts) {
        for (w, n) in &other.words {
            *self.words.entry(w.clone()).or_insert(0) += n;
        }
        for (c, n) in &other.chars {
            *self.chars.entry(*c).or_insert(0) += n;
        }
        for (t, n) in &other.tags {
            *self.tags.entry(t.clone()).or_insert(0) += n;
        }
    }
}

/// Per-row results of one `fit_on_texts` call, in input order.
#[derive(Debug, Default)]
pub struct FitOutcome {
    pub sequences: Vec<Result<TokenSequence, SkipReason>>,
    pub skipped:   SkipStats,
}

// ─── Tokenizer ────────────────────────────────────────────────────────────────
pub struct Tokenizer {
    config:      TokenizerConfig,
    vocabulary:  VocabularyMode,
    tagger:      Arc<dyn LinguisticTokenizer>,
    corrections: Arc<CorrectionChain>,
    counts:      TokenCounts,
    state:       TokenizerState,
    frozen:      Option<Arc<FrozenIndices>>,
}

impl Tokenizer {
    /// A closed vocabulary always includes the trainable words.
    pub fn new(
        config:     TokenizerConfig,
        vocabulary: VocabularyMode,
        tagger:     Arc<dyn LinguisticTokenizer>,
    ) -> Self {
        let vocabulary = match vocabulary {
            VocabularyMode::Closed(mut v) => {
                v.extend(config.trainable_words.iter().cloned());
                VocabularyMode::Closed(v)
            }
            open => open,
        };
        let corrections = Arc::new(CorrectionChain::standard(tagger.clone()));
        Self {
            config,
            vocabulary,
            tagger,
            corrections,
            counts: TokenCounts::default(),
            state:  TokenizerState::Unfit,
            frozen: None,
        }
    }

    /// Rebuild a frozen tokenizer from a snapshot loaded from disk.
    ///
    /// `closed` must be the mode of the run that froze the snapshot. A closed
    /// run corrects against the word index keys; an open run never corrects.
    pub fn from_frozen(
        frozen: Arc<FrozenIndices>,
        config: TokenizerConfig,
        closed: bool,
        tagger: Arc<dyn LinguisticTokenizer>,
    ) -> Self {
        let vocabulary = if closed {
            VocabularyMode::Closed(frozen.words.to_map().into_keys().collect())
        } else {
            VocabularyMode::Open
        };
        let mut tok  = Self::new(config, vocabulary, tagger);
        tok.state    = TokenizerState::Frozen;
        tok.frozen   = Some(frozen);
        tok
    }

    /// Empty-count copy sharing configuration, vocabulary and tagger.
    pub fn fork(&self) -> Self {
        Self {
            config:      self.config.clone(),
            vocabulary:  self.vocabulary.clone(),
            tagger:      self.tagger.clone(),
            corrections: self.corrections.clone(),
            counts:      TokenCounts::default(),
            state:       TokenizerState::Unfit,
            frozen:      None,
        }
    }

    pub fn state(&self) -> TokenizerState {
        self.state
    }

    pub fn counts(&self) -> &TokenCounts {
        &self.counts
    }

    pub fn config(&self) -> &TokenizerConfig {
        &self.config
    }

    pub fn tagger(&self) -> &Arc<dyn LinguisticTokenizer> {
        &self.tagger
    }

    /// Split, tag and (in closed mode) correct one normalized text.
    ///
    /// Filtered punctuation is dropped together with its tag, so the three
    /// lists stay aligned.
    pub fn tokenize(&self, text: &str) -> Result<TokenSequence, SkipReason> {
        let tagged  = self.tagger.tag(text)?;
        let mut seq = TokenSequence::with_capacity(tagged.len());

        for token in tagged {
            let corrected = self.correct(&token);
            if corrected.is_empty() || self.config.is_filtered(&corrected) {
                continue;
            }
            seq.push(token.text, corrected, token.tag);
        }

        if seq.is_empty() {
            return Err(SkipReason::NoTokens);
        }
        Ok(seq)
    }

    fn correct(&self, token: &TaggedToken) -> String {
        match &self.vocabulary {
            VocabularyMode::Closed(vocab)
                if !is_marker(&token.text) && !vocab.contains(&token.text) =>
            {
                self.corrections
                    .correct(token, |w| vocab.contains(w))
                    .unwrap_or_else(|| token.text.clone())
            }
            _ => token.text.clone(),
        }
    }

    /// Tokenize every text and add its tokens to the counters.
    ///
    /// A row the tagger rejects is reported in the outcome; the rest of the
    /// batch is still counted.
    pub fn fit_on_texts(&mut self, texts: &[String]) -> FitOutcome {
        let mut outcome = FitOutcome {
            sequences: Vec::with_capacity(texts.len()),
            skipped:   SkipStats::new(),
        };

        for text in texts {
            let result = self.tokenize(text);
            match &result {
                Ok(seq)     => self.counts.record(seq),
                Err(reason) => outcome.skipped.record(reason),
            }
            outcome.sequences.push(result);
        }

        self.state  = TokenizerState::Fitting;
        self.frozen = None;
        outcome
    }

    /// Fold a shard's counters into this tokenizer.
    pub fn merge_counts(&mut self, other: &TokenCounts) {
        self.counts.merge(other);
        self.state  = TokenizerState::Fitting;
        self.frozen = None;
    }

    /// Build the frozen indices from the current counts.
    pub fn finalize(&mut self) -> Arc<FrozenIndices> {
        let frozen = Arc::new(
            IndexBuilder::new(&self.config, &self.vocabulary, self.tagger.tag_set())
                .build(&self.counts),
        );
        tracing::info!(
            "Tokenizer frozen: {} words, {} chars, {} tags",
            frozen.words.len(),
            frozen.chars.len(),
            frozen.tags.len()
        );
        self.frozen = Some(frozen.clone());
        self.state  = TokenizerState::Frozen;
        frozen
    }

    /// The frozen snapshot, finalizing first if needed.
    pub fn frozen(&mut self) -> Arc<FrozenIndices> {
        match (&self.frozen, self.state) {
            (Some(frozen), TokenizerState::Frozen) => frozen.clone(),
            _ => self.finalize(),
        }
    }

    /// Word id of an already corrected token. Same lookup as the batch
    /// pipeline: casing variants, then OOV.
    pub fn word_id(&mut self, token: &str) -> usize {
        self.frozen().words.word_id(token)
    }

    /// Word, char and tag ids for one sequence.
    pub fn encode(&mut self, seq: &TokenSequence, char_limit: usize) -> EncodedSequence {
        let frozen = self.frozen();
        let word_ids = seq.corrected.iter().map(|token| frozen.words.word_id(token)).collect();
        let char_ids = seq
            .corrected
            .iter()
            .map(|token| char_ids(&frozen, token, char_limit))
            .collect();
        let tag_ids = seq.tags.iter().map(|t| frozen.tags.id_or_oov(t)).collect();
        EncodedSequence { word_ids, char_ids, tag_ids }
    }
}

/// Integer view of one token sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSequence {
    pub word_ids: Vec<usize>,
    /// One row of exactly `char_limit` ids per token.
    pub char_ids: Vec<Vec<usize>>,
    pub tag_ids:  Vec<usize>,
}

/// Left-aligned char ids, truncated to `limit` and zero-padded after.
pub fn char_ids(frozen: &FrozenIndices, token: &str, limit: usize) -> Vec<usize> {
    let mut ids: Vec<usize> = token.chars().take(limit).map(|c| frozen.chars.char_id(c)).collect();
    ids.resize(limit, 0);
    ids
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::normalizer::Normalizer;
    use crate::data::tagger::RuleTagger;
    use crate::ml::vocab_index::VocabIndex;

    fn tagger() -> Arc<dyn LinguisticTokenizer> {
        Arc::new(RuleTagger::default())
    }

    fn open_tokenizer() -> Tokenizer {
        Tokenizer::new(TokenizerConfig::default(), VocabularyMode::Open, tagger())
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tokenize_is_aligned_and_drops_punctuation() {
        let seq = open_tokenizer().tokenize("hello , world ! <repeat>").unwrap();
        assert_eq!(seq.corrected, vec!["hello", "world", "<repeat>"]);
        assert!(seq.is_aligned());
    }

    #[test]
    fn test_tokenize_is_deterministic() {
        let tok = open_tokenizer();
        let a   = tok.tokenize("i am running to the <url>").unwrap();
        let b   = tok.tokenize("i am running to the <url>").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_marker_gives_one_token() {
        let normalized = Normalizer::default().normalize("   \t  ");
        let seq = open_tokenizer().tokenize(&normalized).unwrap();
        assert_eq!(seq.num_tokens(), 1);
        assert_eq!(seq.corrected, vec!["<empty>"]);
    }

    #[test]
    fn test_only_punctuation_is_no_tokens() {
        let err = open_tokenizer().tokenize(". ,").unwrap_err();
        assert_eq!(err, SkipReason::NoTokens);
    }

    #[test]
    fn test_closed_vocab_corrects_but_never_touches_markers() {
        let vocab: HashSet<String> = ["Steve", "<number>"].iter().map(|s| s.to_string()).collect();
        let tok = Tokenizer::new(TokenizerConfig::default(), VocabularyMode::Closed(vocab), tagger());
        let seq = tok.tokenize("steve paid 42 <url>").unwrap();
        assert_eq!(seq.original,  vec!["steve", "paid", "42", "<url>"]);
        assert_eq!(seq.corrected, vec!["Steve", "paid", "<number>", "<url>"]);
    }

    #[test]
    fn test_lifecycle_states() {
        let mut tok = open_tokenizer();
        assert_eq!(tok.state(), TokenizerState::Unfit);

        tok.fit_on_texts(&texts(&["a b"]));
        assert_eq!(tok.state(), TokenizerState::Fitting);

        let first = tok.frozen();
        assert_eq!(tok.state(), TokenizerState::Frozen);

        // refitting forces a rebuild
        tok.fit_on_texts(&texts(&["c c c"]));
        assert_eq!(tok.state(), TokenizerState::Fitting);
        let second = tok.frozen();
        assert_ne!(first.words.len(), second.words.len());
        assert_eq!(second.words.lookup("c"), Some(1));
    }

    #[test]
    fn test_fit_reports_skips_without_aborting() {
        let mut tok = Tokenizer::new(
            TokenizerConfig::default(),
            VocabularyMode::Open,
            Arc::new(RuleTagger::default().with_max_input(8)),
        );
        let out = tok.fit_on_texts(&texts(&["ok", "this one is far too long", "fine"]));
        assert_eq!(out.sequences.len(), 3);
        assert!(out.sequences[1].is_err());
        assert_eq!(out.skipped.get("tokenizer_failure"), 1);
        assert_eq!(tok.counts().words.get("ok"),   Some(&1));
        assert_eq!(tok.counts().words.get("fine"), Some(&1));
    }

    #[test]
    fn test_sharded_fit_matches_single_fit() {
        let all = texts(&["the cat sat", "the dog ran", "a cat ran", "the end"]);

        let mut single = open_tokenizer();
        single.fit_on_texts(&all);

        let mut base   = open_tokenizer();
        let mut shards = vec![base.fork(), base.fork()];
        shards[0].fit_on_texts(&all[..2]);
        shards[1].fit_on_texts(&all[2..]);
        for s in &shards {
            base.merge_counts(s.counts());
        }

        assert_eq!(base.counts(), single.counts());
        assert_eq!(*base.finalize(), *single.finalize());
    }

    #[test]
    fn test_unknown_word_maps_to_oov() {
        let words: HashMap<String, usize> = [("the", 1), ("cat", 2), ("<oov>", 3)]
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect();
        let chars: HashMap<String, usize> =
            [("t".to_string(), 1), ("<oov>".to_string(), 2)].into_iter().collect();
        let tags: HashMap<String, usize> =
            [("DT".to_string(), 1), ("NN".to_string(), 2), ("<oov>".to_string(), 3)]
                .into_iter()
                .collect();
        let frozen = FrozenIndices {
            words:               VocabIndex::from_map(words, "<oov>", "words.json").unwrap(),
            chars:               VocabIndex::from_map(chars, "<oov>", "chars.json").unwrap(),
            tags:                VocabIndex::from_map(tags, "<oov>", "tags.json").unwrap(),
            trainable:           vec!["<oov>".into()],
            num_frequency_words: 2,
        };

        let mut tok = Tokenizer::from_frozen(Arc::new(frozen), TokenizerConfig::default(), true, tagger());
        assert_eq!(tok.state(), TokenizerState::Frozen);

        let seq     = tok.tokenize("the dog").unwrap();
        let encoded = tok.encode(&seq, 3);
        assert_eq!(encoded.word_ids, vec![1, 3]);
        assert_eq!(encoded.tag_ids,  vec![1, 2]);
        assert_eq!(encoded.char_ids[0], vec![1, 2, 2]);
    }

    #[test]
    fn test_word_id_uses_casing_then_oov() {
        let mut tok = open_tokenizer();
        tok.fit_on_texts(&texts(&["run"]));
        assert_eq!(tok.word_id("RUN"), 1);
        let oov = tok.frozen().words.oov_id();
        assert_eq!(tok.word_id("running"), oov);
        assert_eq!(tok.word_id("zebra"), oov);
    }

    #[test]
    fn test_frozen_open_run_never_corrects() {
        let mut fitted = open_tokenizer();
        fitted.fit_on_texts(&texts(&["run fast"]));
        let frozen = fitted.frozen();

        let mut open = Tokenizer::from_frozen(frozen.clone(), TokenizerConfig::default(), false, tagger());
        let seq = open.tokenize("running").unwrap();
        assert_eq!(seq.corrected, vec!["running"]);
        assert_eq!(open.encode(&seq, 4).word_ids, vec![frozen.words.oov_id()]);

        let closed = Tokenizer::from_frozen(frozen, TokenizerConfig::default(), true, tagger());
        assert_eq!(closed.tokenize("running").unwrap().corrected, vec!["run"]);
    }

    #[test]
    fn test_char_ids_truncate_and_pad() {
        let mut tok = open_tokenizer();
        tok.fit_on_texts(&texts(&["ab"]));
        let frozen = tok.frozen();
        assert_eq!(char_ids(&frozen, "ab", 4),    vec![1, 2, 0, 0]);
        assert_eq!(char_ids(&frozen, "abba", 2),  vec![1, 2]);
    }
}
