// ============================================================
// Layer 5 — OOV Correction Chain
// ============================================================
// When a closed reference vocabulary is configured (e.g. the
// keys of a GloVe file), a token missing from it gets one
// chance to be rescued before it becomes OOV:
//
//   1. NumberPattern   "3.14"           → <number>
//   2. UrlPattern      "https://t.co/x" → <url>
//   3. EmailPattern    "a@b.com"        → <email>
//   4. CasingVariants  "steve"          → "Steve" (if in vocab)
//   5. Lemma           "cats"           → "cat"   (if in vocab)
//
// First match wins, not best match. The first three always
// fire when their pattern matches. The last two only fire
// if one of their candidates is in the vocabulary.
//
// Each step is a `CorrectionStrategy`, so the policy is just
// an ordered Vec and every step can be tested on its own.
//
// Reference: Rust Book §17.2 (Trait Objects)

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::traits::{Correction, CorrectionStrategy, LinguisticTokenizer, TaggedToken};
use crate::ml::vocab_index::casing_variants;

pub const NUMBER_TOKEN: &str = "<number>";
pub const URL_TOKEN:    &str = "<url>";
pub const EMAIL_TOKEN:  &str = "<email>";

static NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-+]?\d+(?:[.,:]\d+)*$").expect("number regex"));
static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:https?://|www\.)\S+$").expect("url regex"));
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\w.+\-]+@[\w\-]+(?:\.[\w\-]+)*\.[A-Za-z]{2,}$").expect("email regex")
});

// ─── Pattern strategies ───────────────────────────────────────────────────────

pub struct NumberPattern;

impl CorrectionStrategy for NumberPattern {
    fn name(&self) -> &'static str {
        "number"
    }

    fn propose(&self, token: &TaggedToken) -> Correction {
        if NUMBER.is_match(&token.text) {
            Correction::Canonical(NUMBER_TOKEN.to_string())
        } else {
            Correction::Pass
        }
    }
}

pub struct UrlPattern;

impl CorrectionStrategy for UrlPattern {
    fn name(&self) -> &'static str {
        "url"
    }

    fn propose(&self, token: &TaggedToken) -> Correction {
        if URL.is_match(&token.text) {
            Correction::Canonical(URL_TOKEN.to_string())
        } else {
            Correction::Pass
        }
    }
}

pub struct EmailPattern;

impl CorrectionStrategy for EmailPattern {
    fn name(&self) -> &'static str {
        "email"
    }

    fn propose(&self, token: &TaggedToken) -> Correction {
        if EMAIL.is_match(&token.text) {
            Correction::Canonical(EMAIL_TOKEN.to_string())
        } else {
            Correction::Pass
        }
    }
}

// ─── Vocabulary strategies ────────────────────────────────────────────────────

/// lower, Capitalized, UPPER.
pub struct CasingVariants;

impl CorrectionStrategy for CasingVariants {
    fn name(&self) -> &'static str {
        "casing"
    }

    fn propose(&self, token: &TaggedToken) -> Correction {
        let variants = casing_variants(&token.text);
        if variants.is_empty() {
            Correction::Pass
        } else {
            Correction::Candidates(variants)
        }
    }
}

/// Dictionary form from the linguistic tokenizer.
pub struct Lemma {
    tagger: Arc<dyn LinguisticTokenizer>,
}

impl Lemma {
    pub fn new(tagger: Arc<dyn LinguisticTokenizer>) -> Self {
        Self { tagger }
    }
}

impl CorrectionStrategy for Lemma {
    fn name(&self) -> &'static str {
        "lemma"
    }

    fn propose(&self, token: &TaggedToken) -> Correction {
        match self.tagger.lemma(&token.text, &token.tag) {
            Some(lemma) => Correction::Candidates(vec![lemma]),
            None        => Correction::Pass,
        }
    }
}

// ─── CorrectionChain ──────────────────────────────────────────────────────────
/// Ordered strategies; the first one that produces a replacement wins.
pub struct CorrectionChain {
    strategies: Vec<Box<dyn CorrectionStrategy>>,
}

impl CorrectionChain {
    pub fn new(strategies: Vec<Box<dyn CorrectionStrategy>>) -> Self {
        Self { strategies }
    }

    /// number → url → email → casing → lemma.
    pub fn standard(tagger: Arc<dyn LinguisticTokenizer>) -> Self {
        Self::new(vec![
            Box::new(NumberPattern),
            Box::new(UrlPattern),
            Box::new(EmailPattern),
            Box::new(CasingVariants),
            Box::new(Lemma::new(tagger)),
        ])
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Replacement for an out-of-vocabulary token, or `None` to keep the
    /// surface form (which will then map to OOV).
    pub fn correct<F>(&self, token: &TaggedToken, in_vocab: F) -> Option<String>
    where
        F: Fn(&str) -> bool,
    {
        for strategy in &self.strategies {
            match strategy.propose(token) {
                Correction::Canonical(replacement) => return Some(replacement),
                Correction::Candidates(candidates) => {
                    if let Some(hit) = candidates.into_iter().find(|c| in_vocab(c)) {
                        return Some(hit);
                    }
                }
                Correction::Pass => {}
            }
        }
        None
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tagger::RuleTagger;
    use std::collections::HashSet;

    fn chain() -> CorrectionChain {
        CorrectionChain::standard(Arc::new(RuleTagger::default()))
    }

    fn vocab(words: &[&str]) -> HashSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_patterns_canonicalize() {
        let c = chain();
        let none = |_: &str| false;
        assert_eq!(c.correct(&TaggedToken::new("3.14", "CD"), none),  Some("<number>".into()));
        assert_eq!(c.correct(&TaggedToken::new("-12", "CD"), none),   Some("<number>".into()));
        assert_eq!(c.correct(&TaggedToken::new("http://x.co", "NN"), none), Some("<url>".into()));
        assert_eq!(c.correct(&TaggedToken::new("a.b@c.org", "NN"), none),   Some("<email>".into()));
    }

    #[test]
    fn test_casing_before_lemma() {
        let v = vocab(&["Steve", "cat", "Cats"]);
        let c = chain();
        let in_vocab = |w: &str| v.contains(w);
        assert_eq!(c.correct(&TaggedToken::new("steve", "NN"), in_vocab), Some("Steve".into()));
        // "Cats" (capitalized) wins over the lemma "cat": first match, not best
        assert_eq!(c.correct(&TaggedToken::new("cats", "NNS"), in_vocab), Some("Cats".into()));
    }

    #[test]
    fn test_lemma_fallback() {
        let v = vocab(&["run"]);
        let c = chain();
        assert_eq!(
            c.correct(&TaggedToken::new("running", "VBG"), |w| v.contains(w)),
            Some("run".into())
        );
    }

    #[test]
    fn test_no_hit_keeps_surface_form() {
        let v = vocab(&["dog"]);
        assert_eq!(chain().correct(&TaggedToken::new("zzz", "NN"), |w| v.contains(w)), None);
    }

    #[test]
    fn test_standard_order() {
        assert_eq!(chain().names(), vec!["number", "url", "email", "casing", "lemma"]);
    }

    #[test]
    fn test_strategies_individually() {
        let t = TaggedToken::new("Hello", "UH");
        assert_eq!(NumberPattern.propose(&t), Correction::Pass);
        assert_eq!(
            CasingVariants.propose(&t),
            Correction::Candidates(vec!["hello".into(), "HELLO".into()])
        );
    }
}
