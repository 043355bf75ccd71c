// ============================================================
// Layer 4 — Annotation Markers
// ============================================================
// The normalizer replaces whole classes of noisy text with
// canonical inline markers, e.g.
//
//   "http://t.co/xyz"  → <url>
//   "@someone"         → <user>
//   ":-)"              → <smile>
//   "NOW"              → now <allcaps>
//
// Once a marker is emitted it is never split, lower-cased,
// re-annotated or corrected again. To make that hold, text in
// flight is kept as a list of `Piece`s: either a marker or a
// run of plain text. Every rewrite stage only ever looks at
// the plain-text pieces.
//
// Reference: Rust Book §6 (Enums and Pattern Matching)

use once_cell::sync::Lazy;
use regex::Regex;

// ─── Marker ───────────────────────────────────────────────────────────────────
/// Every marker the normalizer can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Url,
    Email,
    User,
    Ip,
    Date,
    Time,
    Currency,
    Percent,
    Score,
    Smile,
    LolFace,
    SadFace,
    NeutralFace,
    Kisses,
    Heart,
    Hashtag,
    HashtagEnd,
    AllCaps,
    Repeat,
    Elong,
    Empty,
}

impl Marker {
    pub const ALL: [Marker; 21] = [
        Marker::Url,
        Marker::Email,
        Marker::User,
        Marker::Ip,
        Marker::Date,
        Marker::Time,
        Marker::Currency,
        Marker::Percent,
        Marker::Score,
        Marker::Smile,
        Marker::LolFace,
        Marker::SadFace,
        Marker::NeutralFace,
        Marker::Kisses,
        Marker::Heart,
        Marker::Hashtag,
        Marker::HashtagEnd,
        Marker::AllCaps,
        Marker::Repeat,
        Marker::Elong,
        Marker::Empty,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Marker::Url         => "<url>",
            Marker::Email       => "<email>",
            Marker::User        => "<user>",
            Marker::Ip          => "<ip>",
            Marker::Date        => "<date>",
            Marker::Time        => "<time>",
            Marker::Currency    => "<currency>",
            Marker::Percent     => "<percent>",
            Marker::Score       => "<score>",
            Marker::Smile       => "<smile>",
            Marker::LolFace     => "<lolface>",
            Marker::SadFace     => "<sadface>",
            Marker::NeutralFace => "<neutralface>",
            Marker::Kisses      => "<kisses>",
            Marker::Heart       => "<heart>",
            Marker::Hashtag     => "<hashtag>",
            Marker::HashtagEnd  => "</hashtag>",
            Marker::AllCaps     => "<allcaps>",
            Marker::Repeat      => "<repeat>",
            Marker::Elong       => "<elong>",
            Marker::Empty       => "<empty>",
        }
    }

    /// Parse a marker from its exact textual form.
    pub fn parse(s: &str) -> Option<Marker> {
        Marker::ALL.iter().copied().find(|m| m.as_str() == s)
    }
}

/// True when `token` is exactly one of the normalizer's markers.
pub fn is_marker(token: &str) -> bool {
    token.starts_with('<') && Marker::parse(token).is_some()
}

// ─── Piece ────────────────────────────────────────────────────────────────────
/// A unit of text in flight through the normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Text(String),
    Mark(Marker),
}

/// Apply `f` to every text piece, leaving markers untouched.
///
/// `f` returns the pieces that replace the text it was given, so a
/// stage can both rewrite text and cut markers out of it.
pub fn rewrite_text<F>(pieces: Vec<Piece>, mut f: F) -> Vec<Piece>
where
    F: FnMut(&str) -> Vec<Piece>,
{
    let mut out = Vec::with_capacity(pieces.len());
    for piece in pieces {
        match piece {
            Piece::Text(text) if !text.is_empty() => out.extend(f(&text)),
            Piece::Text(_) => {}
            mark => out.push(mark),
        }
    }
    out
}

/// Cut `spans` out of `text`, replacing each with the pieces given.
///
/// Spans must be sorted and non-overlapping (as produced by a regex
/// match iterator).
pub fn splice(text: &str, spans: Vec<(usize, usize, Vec<Piece>)>) -> Vec<Piece> {
    if spans.is_empty() {
        return vec![Piece::Text(text.to_string())];
    }
    let mut out  = Vec::with_capacity(spans.len() * 2 + 1);
    let mut last = 0;
    for (start, end, replacement) in spans {
        if start > last {
            out.push(Piece::Text(text[last..start].to_string()));
        }
        out.extend(replacement);
        last = end;
    }
    if last < text.len() {
        out.push(Piece::Text(text[last..].to_string()));
    }
    out
}

// Anything shaped like a marker. Only real markers are kept.
static MARKER_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</?[a-z]+>").expect("marker shape regex"));

/// Split raw text into pieces, lifting out markers that are already
/// present (e.g. when re-normalizing normalized text).
pub fn lift_markers(text: &str) -> Vec<Piece> {
    let spans = MARKER_SHAPE
        .find_iter(text)
        .filter_map(|m| Marker::parse(m.as_str()).map(|mk| (m.start(), m.end(), vec![Piece::Mark(mk)])))
        .collect();
    splice(text, spans)
}
