// ============================================================
// Layer 4 — Tweet Normalizer
// ============================================================
// Turns raw, noisy social-media text into cleaned, annotated
// text that tokenizes the same way every time.
//
//   "check out http://example.com NOW!!! :)"
//     → "check out <url> now <allcaps> ! <repeat> <smile>"
//
// Stages (applied in order, the order matters):
//   1. Unicode repair and folding to ASCII
//   2. Strip control characters and marker delimiters (< >)
//   3. Entities: ip, url, email, @user, date, time, currency,
//      percent, score
//   4. Contractions and ordinals ("can't" → "can not")
//   5. Emoticons (smile / lolface / sad / neutral / kisses)
//   6. Hashtags, with dictionary word segmentation
//   7. Punctuation splitting, repeats, elongation, allcaps
//   8. Apostrophe suffixes ("john's" → "john 's")
//   9. Whitespace collapse, <empty> for nothing left
//
// normalize(normalize(x)) == normalize(x). Every stage only
// sees plain text between markers, and its output never
// contains anything an earlier stage would match again.
//
// Reference: Rust Book §8 (Strings in Rust)
//            regex / fancy-regex crate documentation

use std::sync::Arc;

use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::{Captures, Regex};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::data::markers::{lift_markers, rewrite_text, splice, Marker, Piece};
use crate::data::segmenter::UnigramSegmenter;
use crate::domain::traits::WordSegmenter;

// ─── Stage 3 patterns ─────────────────────────────────────────────────────────
// Any pattern that allows whitespace between parts also allows
// - / \ because stage 7 turns those into whitespace.
const MONTH: &str = r"(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sept?(?:ember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";
const DAY:   &str = r"\d{1,2}(?:st|nd|rd|th)?";
const SEP:   &str = r"[\s/\\\-]+";
const YEAR:  &str = r"(?:,?[\s/\\\-]+\d{4})?";

static ENTITY_RULES: Lazy<Vec<(Regex, Marker)>> = Lazy::new(|| {
    let rules: Vec<(String, Marker)> = vec![
        (r"\b\d{1,3}(?:\.\d{1,3}){3}\b".into(), Marker::Ip),
        (r#"(?i)\b(?:https?://|www\.)[^\s<>"]*[^\s<>".,!?;:'")\]]"#.into(), Marker::Url),
        (r"\b[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}\b".into(), Marker::Email),
        (r"(?:^|[^A-Za-z0-9_])(?P<m>@[A-Za-z0-9_]+)".into(), Marker::User),
        (r"\b\d{1,2}[/\-.]\d{1,2}[/\-.](?:\d{4}|\d{2})\b".into(), Marker::Date),
        (r"\b\d{4}[/\-.]\d{1,2}[/\-.]\d{1,2}\b".into(), Marker::Date),
        (format!(r"(?i)\b{MONTH}\.?{SEP}{DAY}{YEAR}\b"), Marker::Date),
        (format!(r"(?i)\b{DAY}{SEP}(?:of{SEP})?{MONTH}{YEAR}\b"), Marker::Date),
        (r"(?i)\b\d{1,2}:\d{2}(?::\d{2})?(?:[\s/\\\-]*[ap]m)?\b".into(), Marker::Time),
        (r"(?i)\b\d{1,2}[\s/\\\-]*[ap]m\b".into(), Marker::Time),
        (r"(?i)\$\d+(?:[.,]\d+)*(?:bn|[kmb])?\b".into(), Marker::Currency),
        (r"\b\d+(?:[.,]\d+)?%".into(), Marker::Percent),
        (r"\b\d+\s*-\s*\d+\b".into(), Marker::Score),
    ];
    rules
        .into_iter()
        .map(|(pattern, marker)| (Regex::new(&pattern).expect("entity regex"), marker))
        .collect()
});

// ─── Stage 4 tables ───────────────────────────────────────────────────────────
// The captured stem keeps its case so stage 7 can still see ALL-CAPS.
static CONTRACTIONS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)\b(can)'t\b",         "$1 not"),
        (r"(?i)\b(w)on't\b",         "${1}ill not"),
        (r"(?i)\b(sh)an't\b",        "${1}all not"),
        (r"(?i)\bain't\b",           "is not"),
        (r"(?i)\b([a-z]+)n't\b",     "$1 not"),
        (r"(?i)\b(i)'m\b",           "$1 am"),
        (r"(?i)\b(let)'s\b",         "$1 us"),
        (r"(?i)\b(y)'all\b",         "${1}ou all"),
        (r"(?i)\b(c)'mon\b",         "${1}ome on"),
        (r"(?i)\b([a-z]+)'re\b",     "$1 are"),
        (r"(?i)\b([a-z]+)'ve\b",     "$1 have"),
        (r"(?i)\b([a-z]+)'ll\b",     "$1 will"),
        (r"(?i)\bw/o\b",             "without"),
        (r"(?i)\bw/",                "with "),
        (r"(?i)\bhrs\b",             "hours"),
        (r"(?i)\bmins\b",            "minutes"),
        (r"(?i)\b(?:pls|plz)\b",     "please"),
    ]
    .into_iter()
    .map(|(p, r)| (Regex::new(p).expect("contraction regex"), r))
    .collect()
});

static ORDINAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:1st|2nd|3rd|4th|5th|6th|7th|8th|9th|10th)\b").expect("ordinal regex")
});

fn ordinal_word(token: &str) -> &'static str {
    match token.to_ascii_lowercase().as_str() {
        "1st" => "first",
        "2nd" => "second",
        "3rd" => "third",
        "4th" => "fourth",
        "5th" => "fifth",
        "6th" => "sixth",
        "7th" => "seventh",
        "8th" => "eighth",
        "9th" => "ninth",
        _     => "tenth",
    }
}

// ─── Stage 5 patterns ─────────────────────────────────────────────────────────
// Anchored to whitespace (or a marker) on the left and to
// whitespace / end / light punctuation on the right, so "hi:)"
// or "(8)" are left alone.
const NOSE: &str = r"['`\-oO^]?";
const PRE:  &str = r"(?<!\S)";
const POST: &str = r"(?=$|[\s.,!?])";

static EMOTICON_RULES: Lazy<Vec<(fancy_regex::Regex, Marker)>> = Lazy::new(|| {
    let rules: Vec<(String, Marker)> = vec![
        (format!(r"{PRE}(?:[:=;8xX]{NOSE}[)\]D]+|[(\[]+{NOSE}[:=;8]){POST}"), Marker::Smile),
        (format!(r"{PRE}(?:[:=;]{NOSE}[pPbB]+|[xX]{NOSE}P+){POST}"),          Marker::LolFace),
        (format!(r"{PRE}(?:[:=;8]{NOSE}[(\[]+|[)\]]+{NOSE}[:=;8]){POST}"),    Marker::SadFace),
        (format!(r"{PRE}[:=;]{NOSE}[/\\|]+{POST}"),                           Marker::NeutralFace),
        (format!(r"{PRE}[:=;]{NOSE}\*+{POST}"),                               Marker::Kisses),
        (r"(?i)\b(?:xo)+x?\b|\bx{2,}\b".to_string(),                          Marker::Kisses),
    ];
    rules
        .into_iter()
        .map(|(pattern, marker)| {
            (fancy_regex::Regex::new(&pattern).expect("emoticon regex"), marker)
        })
        .collect()
});

// ─── Stage 6 pattern ──────────────────────────────────────────────────────────
static HASHTAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9_])(?P<m>#(?P<body>[A-Za-z0-9_]+))").expect("hashtag regex")
});

// ─── Normalizer ───────────────────────────────────────────────────────────────
/// Stateless text normalizer. Cheap to share across threads.
pub struct Normalizer {
    segmenter: Arc<dyn WordSegmenter>,
}

impl Normalizer {
    /// Create a normalizer that splits hashtags with `segmenter`.
    pub fn new(segmenter: Arc<dyn WordSegmenter>) -> Self {
        Self { segmenter }
    }

    /// Normalize one text. Total and deterministic.
    pub fn normalize(&self, text: &str) -> String {

        // ── Step 1: Unicode repair ───────────────────────────────────────────
        let text = repair_unicode(text);

        // ── Step 2: Existing markers, <3, control chars and delimiters ────────
        let pieces = lift_markers(&text);
        let pieces = rewrite_text(pieces, strip_delimiters);

        // ── Steps 3–5: Entities, contractions, emoticons ─────────────────────
        let pieces = annotate_inline(pieces);

        // ── Step 6: Hashtags ─────────────────────────────────────────────────
        let pieces = rewrite_text(pieces, |t| self.expand_hashtags(t));

        // ── Steps 7–9: Token cleanup and final join ──────────────────────────
        let mut tokens: Vec<String> = Vec::new();
        for piece in pieces {
            match piece {
                Piece::Mark(m)    => tokens.push(m.as_str().to_string()),
                Piece::Text(text) => scan_text(&text, &mut tokens),
            }
        }

        if tokens.is_empty() {
            Marker::Empty.as_str().to_string()
        } else {
            tokens.join(" ")
        }
    }

    /// Normalize many texts in parallel, keeping input order.
    pub fn normalize_all(&self, texts: &[String]) -> Vec<String> {
        texts.par_iter().map(|t| self.normalize(t)).collect()
    }

    fn expand_hashtags(&self, text: &str) -> Vec<Piece> {
        let spans = HASHTAG
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.name("m")?;
                let body  = caps.name("body")?.as_str();
                self.hashtag_pieces(body)
                    .map(|pieces| (whole.start(), whole.end(), pieces))
            })
            .collect();
        splice(text, spans)
    }

    /// `#USA` → `<hashtag> usa <allcaps>`,
    /// `#LoveWins` → `<hashtag> love wins </hashtag>`.
    fn hashtag_pieces(&self, body: &str) -> Option<Vec<Piece>> {
        let has_letters = body.chars().any(|c| c.is_ascii_alphabetic());
        let all_upper   = has_letters && !body.chars().any(|c| c.is_ascii_lowercase());

        if all_upper {
            let mut out = vec![Piece::Mark(Marker::Hashtag)];
            out.extend(annotate_inline(vec![Piece::Text(body.to_ascii_lowercase())]));
            out.push(Piece::Mark(Marker::AllCaps));
            return Some(out);
        }

        let words = hashtag_words(body, self.segmenter.as_ref());
        if words.is_empty() {
            return None;
        }
        let mut out = vec![Piece::Mark(Marker::Hashtag)];
        out.extend(annotate_inline(vec![Piece::Text(words.join(" "))]));
        out.push(Piece::Mark(Marker::HashtagEnd));
        Some(out)
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(Arc::new(UnigramSegmenter::builtin()))
    }
}

// ─── Stage helpers ────────────────────────────────────────────────────────────

/// Compatibility forms folded, accents stripped, typographic punctuation
/// mapped to ASCII. Any other non-ASCII character becomes a space.
fn repair_unicode(text: &str) -> String {
    let composed: String = text
        .nfkc()
        .map(|c| match c {
            '€' | '£' | '¥' | '¢' | '₹' | '₩'      => '$',
            '\u{2018}' | '\u{2019}' | '\u{2032}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{2033}' => '"',
            '\u{2010}'..='\u{2015}'              => '-',
            c => c,
        })
        .collect();
    composed
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c.is_ascii() { c } else { ' ' })
        .collect()
}

/// `<3` becomes a heart; control characters and stray `<` `>` become spaces.
fn strip_delimiters(text: &str) -> Vec<Piece> {
    let mut out = Vec::new();
    for (i, part) in text.split("<3").enumerate() {
        if i > 0 {
            out.push(Piece::Mark(Marker::Heart));
        }
        let cleaned: String = part
            .chars()
            .map(|c| if c.is_control() || c == '<' || c == '>' { ' ' } else { c })
            .collect();
        out.push(Piece::Text(cleaned));
    }
    out
}

/// Stages 3–5. Also applied to hashtag bodies after splitting.
fn annotate_inline(pieces: Vec<Piece>) -> Vec<Piece> {
    let mut pieces = pieces;
    for (re, marker) in ENTITY_RULES.iter() {
        pieces = mark_regex(pieces, re, *marker);
    }

    pieces = rewrite_text(pieces, |text| {
        let mut out = text.to_string();
        for (re, replacement) in CONTRACTIONS.iter() {
            out = re.replace_all(&out, *replacement).into_owned();
        }
        let out = ORDINAL.replace_all(&out, |caps: &Captures| ordinal_word(&caps[0]).to_string());
        vec![Piece::Text(out.into_owned())]
    });

    for (re, marker) in EMOTICON_RULES.iter() {
        pieces = mark_fancy(pieces, re, *marker);
    }
    pieces
}

/// Replace every match (or its `m` group) with `marker`.
fn mark_regex(pieces: Vec<Piece>, re: &Regex, marker: Marker) -> Vec<Piece> {
    rewrite_text(pieces, |text| {
        let spans = re
            .captures_iter(text)
            .filter_map(|caps| caps.name("m").or_else(|| caps.get(0)))
            .filter(|m| m.start() < m.end())
            .map(|m| (m.start(), m.end(), vec![Piece::Mark(marker)]))
            .collect();
        splice(text, spans)
    })
}

/// Same as `mark_regex` for lookaround patterns. A backtracking-limit
/// error just ends the scan for that piece.
fn mark_fancy(pieces: Vec<Piece>, re: &fancy_regex::Regex, marker: Marker) -> Vec<Piece> {
    rewrite_text(pieces, |text| {
        let spans = re
            .find_iter(text)
            .map_while(Result::ok)
            .filter(|m| m.start() < m.end())
            .map(|m| (m.start(), m.end(), vec![Piece::Mark(marker)]))
            .collect();
        splice(text, spans)
    })
}

/// Split a mixed-case hashtag body into lowercase words.
fn hashtag_words(body: &str, segmenter: &dyn WordSegmenter) -> Vec<String> {
    body.split('_')
        .filter(|part| !part.is_empty())
        .flat_map(split_camel_case)
        .map(|chunk| chunk.to_ascii_lowercase())
        .flat_map(|chunk| {
            if chunk.chars().all(|c| c.is_ascii_alphabetic()) {
                segmenter.segment(&chunk)
            } else {
                vec![chunk]
            }
        })
        .collect()
}

/// "LoveIsLove" → ["Love", "Is", "Love"], "HTMLParser" → ["HTML", "Parser"].
fn split_camel_case(s: &str) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    let mut parts   = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_ascii_uppercase() {
            let prev       = chars[i - 1];
            let next_lower = chars.get(i + 1).map_or(false, |n| n.is_ascii_lowercase());
            let boundary   = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_lower);
            if boundary && !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

// ─── Stages 7–8: token scanner ────────────────────────────────────────────────

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '\''
}

fn scan_text(text: &str, out: &mut Vec<String>) {
    for chunk in text.split_whitespace() {
        let chars: Vec<char> = chunk.chars().collect();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];

            if is_word_char(c) {
                let start = i;
                i += 1;
                while i < chars.len() {
                    let d = chars[i];
                    let numeric_sep = (d == '.' || d == ',')
                        && chars[i - 1].is_ascii_digit()
                        && chars.get(i + 1).map_or(false, |n| n.is_ascii_digit());
                    if is_word_char(d) || numeric_sep {
                        i += 1;
                    } else {
                        break;
                    }
                }
                let word: String = chars[start..i].iter().collect();
                push_word(&word, out);
            } else if matches!(c, '!' | '?' | '.') {
                let start = i;
                while i < chars.len() && matches!(chars[i], '!' | '?' | '.') {
                    i += 1;
                }
                out.push(chars[i - 1].to_string());
                if i - start > 1 {
                    out.push(Marker::Repeat.as_str().to_string());
                }
            } else {
                i += 1;
                match c {
                    '-' | '/' | '\\' => {}
                    '&' => out.push("and".to_string()),
                    '@' => out.push("at".to_string()),
                    _   => out.push(c.to_string()),
                }
            }
        }
    }
}

/// Lower-case one word run, flagging ALL-CAPS and elongation.
fn push_word(word: &str, out: &mut Vec<String>) {
    let letters = word.chars().filter(|c| c.is_ascii_alphabetic()).count();
    let allcaps = letters >= 2 && !word.chars().any(|c| c.is_ascii_lowercase());

    let lower                 = word.to_ascii_lowercase();
    let (collapsed, elongated) = collapse_elongation(&lower);

    split_apostrophes(&collapsed, out);
    if allcaps {
        out.push(Marker::AllCaps.as_str().to_string());
    }
    if elongated {
        out.push(Marker::Elong.as_str().to_string());
    }
}

/// "sooooo" → ("soo", true). Only letters are collapsed.
fn collapse_elongation(word: &str) -> (String, bool) {
    let mut out       = String::with_capacity(word.len());
    let mut elongated = false;
    let mut prev: Option<char> = None;
    let mut run = 0usize;

    for c in word.chars() {
        if Some(c) == prev {
            run += 1;
        } else {
            prev = Some(c);
            run  = 1;
        }
        if run <= 2 || !c.is_ascii_alphabetic() {
            out.push(c);
        } else {
            elongated = true;
        }
    }
    (out, elongated)
}

/// "john's" → ["john", "'s"], "'quoted'" → ["'quoted", "'"].
fn split_apostrophes(word: &str, out: &mut Vec<String>) {
    let mut current = String::new();
    for c in word.chars() {
        if c == '\'' {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            current.push('\'');
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
}
