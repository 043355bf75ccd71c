// ============================================================
// Layer 4 — Rule-Based POS Tagger
// ============================================================
// The default `LinguisticTokenizer`. Splits normalized text
// with the tokenizers crate's whitespace pre-tokenizer, then
// assigns a Penn Treebank tag to each token:
//
//   "i am running to the <url> !"
//     → PRP VBP VBG TO DT SYM .
//
// Tagging order, first hit wins:
//   1. markers          → SYM
//   2. numbers          → CD
//   3. punctuation      → . , : ( ) '' $ # SYM
//   4. closed-class lexicon (determiners, pronouns, ...)
//   5. after TO / MD    → VB
//   6. suffix rules     (-ing, -ed, -ly, -est, -s, ...)
//   7. fallback         → NN
//
// Normalized tweets are already lower-cased and split, so a
// small lexicon plus suffix rules is enough for the tag
// feature. Anything smarter can sit behind the same trait.
//
// Reference: Marcus et al. (1993) Penn Treebank tag set

use std::collections::HashMap;

use once_cell::sync::Lazy;
use tokenizers::pre_tokenizers::whitespace::WhitespaceSplit;
use tokenizers::{OffsetReferential, OffsetType, PreTokenizedString, PreTokenizer};

use crate::data::markers::is_marker;
use crate::domain::error::{PipelineError, PipelineResult, SkipReason};
use crate::domain::traits::{LinguisticTokenizer, TaggedToken};

/// Every tag `RuleTagger` can emit. The tag index is numbered in this order.
pub const PENN_TAGS: &[&str] = &[
    "CC", "CD", "DT", "EX", "FW", "IN", "JJ", "JJR", "JJS", "LS", "MD",
    "NN", "NNS", "NNP", "NNPS", "PDT", "POS", "PRP", "PRP$", "RB", "RBR",
    "RBS", "RP", "SYM", "TO", "UH", "VB", "VBD", "VBG", "VBN", "VBP",
    "VBZ", "WDT", "WP", "WP$", "WRB", "$", "#", "''", "``", "(", ")",
    ",", ".", ":",
];

/// Longest text accepted by default, in bytes.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 8192;

// ─── TagScheme ────────────────────────────────────────────────────────────────
/// Which tag set the tagger produces. Only Penn Treebank for now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagScheme {
    Penn,
}

impl TagScheme {
    pub fn parse(name: &str) -> PipelineResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "penn" | "ptb" => Ok(TagScheme::Penn),
            other => Err(PipelineError::config(format!(
                "Unknown tag scheme '{other}' (expected 'penn')"
            ))),
        }
    }
}

// ─── Lexicon ──────────────────────────────────────────────────────────────────
static LEXICON: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let groups: &[(&str, &[&str])] = &[
        ("DT",   &["the", "a", "an", "this", "that", "these", "those", "every", "each",
                   "some", "any", "no", "all", "both", "another", "either", "neither"]),
        ("PRP",  &["i", "you", "he", "she", "it", "we", "they", "me", "him", "us",
                   "them", "myself", "yourself", "himself", "herself", "itself",
                   "ourselves", "themselves", "u", "ya"]),
        ("PRP$", &["my", "your", "his", "her", "its", "our", "their", "ur"]),
        ("IN",   &["of", "in", "on", "at", "by", "for", "with", "from", "about", "into",
                   "over", "after", "before", "under", "between", "through", "during",
                   "without", "since", "until", "than", "because", "while", "if", "as",
                   "upon", "via", "like", "off", "around", "against", "across"]),
        ("CC",   &["and", "or", "but", "nor", "yet", "plus"]),
        ("MD",   &["can", "could", "will", "would", "shall", "should", "may", "might",
                   "must", "gonna", "wanna", "gotta"]),
        ("TO",   &["to"]),
        ("WP",   &["who", "whom", "what"]),
        ("WP$",  &["whose"]),
        ("WDT",  &["which"]),
        ("WRB",  &["when", "where", "why", "how"]),
        ("UH",   &["lol", "oh", "ok", "okay", "yes", "yeah", "yay", "hey", "hi", "hello",
                   "wow", "omg", "haha", "hahaha", "lmao", "please", "thanks", "ugh", "yo"]),
        ("VBZ",  &["is", "has", "does"]),
        ("VBP",  &["am", "are", "have", "do"]),
        ("VBD",  &["was", "were", "had", "did", "went", "got", "made", "said", "saw",
                   "came", "took", "knew", "thought", "felt", "left"]),
        ("VBN",  &["been", "done", "gone", "seen", "taken", "known", "gotten"]),
        ("VBG",  &["being", "having", "doing"]),
        ("VB",   &["be"]),
        ("RB",   &["not", "never", "very", "too", "really", "just", "also", "still",
                   "always", "already", "now", "then", "here", "there", "again", "so",
                   "even", "ever", "only", "well", "soon", "today", "tonight",
                   "tomorrow", "yesterday", "away", "back"]),
        ("JJ",   &["good", "bad", "great", "new", "old", "happy", "sad", "big", "little",
                   "nice", "cool", "awesome", "amazing", "free", "sure", "real", "last",
                   "next", "first", "own"]),
        ("JJR",  &["better", "worse", "more", "less"]),
        ("JJS",  &["best", "worst", "most", "least"]),
    ];
    let mut map = HashMap::new();
    for (tag, words) in groups {
        for w in *words {
            map.entry(*w).or_insert(*tag);
        }
    }
    map
});

static IRREGULAR_LEMMAS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("am", "be"), ("is", "be"), ("are", "be"), ("was", "be"), ("were", "be"),
        ("been", "be"), ("being", "be"), ("has", "have"), ("had", "have"),
        ("having", "have"), ("does", "do"), ("did", "do"), ("done", "do"),
        ("doing", "do"), ("went", "go"), ("gone", "go"), ("got", "get"),
        ("gotten", "get"), ("made", "make"), ("said", "say"), ("saw", "see"),
        ("seen", "see"), ("came", "come"), ("took", "take"), ("taken", "take"),
        ("knew", "know"), ("known", "know"), ("thought", "think"), ("felt", "feel"),
        ("left", "leave"), ("children", "child"), ("men", "man"), ("women", "woman"),
        ("people", "person"), ("better", "good"), ("best", "good"),
        ("worse", "bad"), ("worst", "bad"),
    ]
    .into_iter()
    .collect()
});

// ─── RuleTagger ───────────────────────────────────────────────────────────────
pub struct RuleTagger {
    splitter:        WhitespaceSplit,
    max_input_bytes: usize,
}

impl RuleTagger {
    pub fn new(scheme: TagScheme) -> Self {
        match scheme {
            TagScheme::Penn => Self {
                splitter:        WhitespaceSplit,
                max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            },
        }
    }

    /// Reject texts longer than `bytes` with a tokenizer failure.
    pub fn with_max_input(mut self, bytes: usize) -> Self {
        self.max_input_bytes = bytes;
        self
    }

    fn split(&self, text: &str) -> Result<Vec<String>, SkipReason> {
        let mut pre = PreTokenizedString::from(text);
        self.splitter
            .pre_tokenize(&mut pre)
            .map_err(|e| SkipReason::TokenizerFailure(e.to_string()))?;
        Ok(pre
            .get_splits(OffsetReferential::Original, OffsetType::Byte)
            .into_iter()
            .map(|(piece, _, _)| piece.to_string())
            .collect())
    }

    fn tag_word(word: &str, prev: Option<&str>) -> &'static str {
        if is_marker(word) {
            return "SYM";
        }
        if is_number(word) {
            return "CD";
        }
        if !word.chars().any(|c| c.is_alphanumeric()) {
            return punctuation_tag(word);
        }
        if word == "'s" {
            return "POS";
        }

        let lower = word.to_lowercase();
        if let Some(tag) = LEXICON.get(lower.as_str()) {
            return *tag;
        }
        if matches!(prev, Some("TO") | Some("MD")) {
            return "VB";
        }
        suffix_tag(&lower)
    }
}

impl Default for RuleTagger {
    fn default() -> Self {
        Self::new(TagScheme::Penn)
    }
}

impl LinguisticTokenizer for RuleTagger {
    fn tag(&self, text: &str) -> Result<Vec<TaggedToken>, SkipReason> {
        if text.len() > self.max_input_bytes {
            return Err(SkipReason::TokenizerFailure(format!(
                "input of {} bytes exceeds limit of {}",
                text.len(),
                self.max_input_bytes
            )));
        }

        let words  = self.split(text)?;
        let mut out: Vec<TaggedToken> = Vec::with_capacity(words.len());
        for word in words {
            let prev = out.last().map(|t| t.tag.as_str());
            let tag  = Self::tag_word(&word, prev);
            out.push(TaggedToken::new(word, tag));
        }
        Ok(out)
    }

    fn lemma(&self, word: &str, tag: &str) -> Option<String> {
        let lower = word.to_lowercase();
        if let Some(l) = IRREGULAR_LEMMAS.get(lower.as_str()) {
            return Some(l.to_string());
        }
        let stem = match tag {
            "NNS" | "VBZ"  => strip_plural(&lower),
            "VBG"          => strip_verb_suffix(&lower, "ing"),
            "VBD" | "VBN"  => strip_past(&lower),
            "JJR"          => strip_verb_suffix(&lower, "er"),
            "JJS"          => strip_verb_suffix(&lower, "est"),
            _              => None,
        }?;
        (stem != lower).then_some(stem)
    }

    fn tag_set(&self) -> &[&'static str] {
        PENN_TAGS
    }
}

// ─── Rule helpers ─────────────────────────────────────────────────────────────

fn is_number(word: &str) -> bool {
    word.chars().next().map_or(false, |c| c.is_ascii_digit())
        && word.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ',')
}

fn punctuation_tag(word: &str) -> &'static str {
    match word {
        "." | "!" | "?"             => ".",
        ","                         => ",",
        ":" | ";" | "..."           => ":",
        "(" | "[" | "{"             => "(",
        ")" | "]" | "}"             => ")",
        "'" | "\"" | "''"           => "''",
        "`" | "``"                  => "``",
        "$"                         => "$",
        "#"                         => "#",
        _                           => "SYM",
    }
}

fn suffix_tag(word: &str) -> &'static str {
    let n = word.len();
    if n > 4 && word.ends_with("ing") {
        "VBG"
    } else if n > 3 && word.ends_with("ed") {
        "VBD"
    } else if n > 3 && word.ends_with("ly") {
        "RB"
    } else if n > 4 && word.ends_with("est") {
        "JJS"
    } else if ["ful", "ous", "ive", "able", "ible", "ish", "less", "ical"]
        .iter()
        .any(|s| n > s.len() + 2 && word.ends_with(s))
    {
        "JJ"
    } else if n > 3
        && word.ends_with('s')
        && !["ss", "us", "is"].iter().any(|s| word.ends_with(s))
    {
        "NNS"
    } else {
        "NN"
    }
}

fn strip_plural(word: &str) -> Option<String> {
    if word.len() > 4 && word.ends_with("ies") {
        return Some(format!("{}y", &word[..word.len() - 3]));
    }
    for es in ["sses", "xes", "ches", "shes"] {
        if word.ends_with(es) {
            return Some(word[..word.len() - 2].to_string());
        }
    }
    if word.len() > 3 && word.ends_with('s') && !word.ends_with("ss") {
        return Some(word[..word.len() - 1].to_string());
    }
    None
}

fn strip_past(word: &str) -> Option<String> {
    if word.len() > 4 && word.ends_with("ied") {
        return Some(format!("{}y", &word[..word.len() - 3]));
    }
    strip_verb_suffix(word, "ed")
}

/// Strip `suffix` and undo a doubled final consonant ("running" → "run").
fn strip_verb_suffix(word: &str, suffix: &str) -> Option<String> {
    let stem = word.strip_suffix(suffix)?;
    if stem.chars().count() < 2 {
        return None;
    }
    // Undoubling only applies to ASCII consonants.
    let mut tail = stem.chars().rev();
    let doubled = match (tail.next(), tail.next(), tail.next()) {
        (Some(last), Some(prev), Some(_)) => {
            last == prev
                && last.is_ascii_alphabetic()
                && !matches!(last, 'l' | 's' | 'z' | 'e' | 'o')
        }
        _ => false,
    };
    if doubled {
        Some(stem[..stem.len() - 1].to_string())
    } else {
        Some(stem.to_string())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn tags(text: &str) -> Vec<String> {
        RuleTagger::default()
            .tag(text)
            .unwrap()
            .into_iter()
            .map(|t| t.tag)
            .collect()
    }

    #[test]
    fn test_tags_sentence() {
        assert_eq!(
            tags("i am running to the <url> !"),
            vec!["PRP", "VBP", "VBG", "TO", "DT", "SYM", "."]
        );
    }

    #[test]
    fn test_tags_numbers_suffixes_and_possessive() {
        assert_eq!(tags("5 cats"),            vec!["CD", "NNS"]);
        assert_eq!(tags("john 's cat"),       vec!["NN", "POS", "NN"]);
        assert_eq!(tags("happily"),           vec!["RB"]);
        assert_eq!(tags("we will dance"),     vec!["PRP", "MD", "VB"]);
    }

    #[test]
    fn test_splits_on_any_whitespace() {
        let out = RuleTagger::default().tag("a\tb  c\n").unwrap();
        let words: Vec<&str> = out.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(words, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_every_emitted_tag_is_in_tag_set() {
        let tagger = RuleTagger::default();
        let text   = "omg <hashtag> best day ever </hashtag> ! ! ( 50 ) $ # & who's \
                      which whose running jumped quickly biggest careful boxes";
        for t in tagger.tag(text).unwrap() {
            assert!(tagger.tag_set().contains(&t.tag.as_str()), "{} not in tag set", t.tag);
        }
    }

    #[test]
    fn test_overlong_input_is_tokenizer_failure() {
        let tagger = RuleTagger::default().with_max_input(10);
        let err    = tagger.tag("this text is far too long").unwrap_err();
        assert_eq!(err.kind(), "tokenizer_failure");
    }

    #[test]
    fn test_lemmas() {
        let t = RuleTagger::default();
        assert_eq!(t.lemma("running", "VBG"), Some("run".to_string()));
        assert_eq!(t.lemma("cats",    "NNS"), Some("cat".to_string()));
        assert_eq!(t.lemma("parties", "NNS"), Some("party".to_string()));
        assert_eq!(t.lemma("was",     "VBD"), Some("be".to_string()));
        assert_eq!(t.lemma("jumped",  "VBD"), Some("jump".to_string()));
        assert_eq!(t.lemma("cat",     "NN"),  None);
    }

    #[test]
    fn test_lemma_of_non_ascii_stem() {
        let t = RuleTagger::default();
        assert_eq!(t.lemma("ab\u{2082}ing", "VBG"), Some("ab\u{2082}".to_string()));
        assert_eq!(t.lemma("\u{2082}\u{2082}\u{2082}ed", "VBD"), Some("\u{2082}\u{2082}\u{2082}".to_string()));
        assert_eq!(t.lemma("caf\u{e9}\u{e9}ing", "VBG"), Some("caf\u{e9}\u{e9}".to_string()));
    }

    #[test]
    fn test_tag_scheme_parse() {
        assert_eq!(TagScheme::parse("Penn").unwrap(), TagScheme::Penn);
        assert!(TagScheme::parse("universal").is_err());
    }
}
