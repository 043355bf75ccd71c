// ============================================================
// Layer 4 — Hashtag Word Segmenter
// ============================================================
// Splits run-on hashtag bodies into words:
//
//   "iloveyou"     → ["i", "love", "you"]
//   "goodmorning"  → ["good", "morning"]
//   "covfefe"      → ["covfefe"]         (unknown, kept whole)
//
// Dynamic programming over split points. Each dictionary
// word costs log((rank + 1) * log N), the usual Zipf estimate,
// so frequent words are cheap. Unknown stretches cost a large
// constant plus a little per character, so one long unknown
// piece always beats several short ones.
//
// Two states per position: the last piece is a dictionary
// word (at most `max_word_chars` long), or the last piece is
// an unknown run, which grows one char at a time. Work is
// O(n * longest word) instead of O(n^2).
//
// Reference: Rust Book §8 (Strings), §13 (Iterators)

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::domain::error::{PipelineError, PipelineResult};
use crate::domain::traits::WordSegmenter;

const UNKNOWN_BASE:     f64 = 20.0;
const UNKNOWN_PER_CHAR: f64 = 0.5;

// Frequency-ordered, most common first.
const BUILTIN_WORDS: &str = "
the i to a and is in it you of for on my that at with me do have just this be
so are not no can up but what was all out like get if your go now day love we
new one good know don't time about today see back how got he lol will from
people more when am they there great too happy really think an some by want
night would work still need as had one or need home make much well last right
life u off going been over come then her them here his why yes thanks very
best should school tomorrow only oh fun game into never even weekend morning
hope way next year could feel him first things say always look better let
miss thank sleep ever little week another nice our things tonight watch free
again said show first man something birthday world news live friend friends
family music video team win big old real help because way hate sad bad
before after night everyone any take down where who did thing many keep
made via god girl boy call done end stop start wait hear long play post
watching watching follow word words sure tweet tweets twitter facebook
christmas summer winter spring fall party movie food love song songs tv
star stars wars war peace heart hearts sun moon city state vote election
president trump obama brexit country nation america england london
football soccer match goal goals final finals cup league season fans fan
happy sunday monday tuesday wednesday thursday friday saturday
january february march april may june july august september october november
december black white red blue green yellow pink gold silver
throw throwback thursday follow friday motivation monday selfie
no more never again together forever family first all lives matter
me too time up stay home safe strong proud free speech fake news
this is why we cant have nice things just do it make america great again
";

// ─── UnigramSegmenter ─────────────────────────────────────────────────────────
/// Frequency-ranked dictionary segmenter.
pub struct UnigramSegmenter {
    costs:          HashMap<String, f64>,
    max_word_chars: usize,
}

impl UnigramSegmenter {
    /// Build from words ordered most-frequent first. Repeats keep their
    /// first (best) rank.
    pub fn from_ranked<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ranked: Vec<String> = Vec::new();
        let mut seen:   HashSet<String> = HashSet::new();
        for w in words {
            let w = w.as_ref().trim().to_lowercase();
            if w.is_empty() || !w.chars().all(|c| c.is_ascii_alphanumeric()) {
                continue;
            }
            if seen.insert(w.clone()) {
                ranked.push(w);
            }
        }

        let max_word_chars = ranked.iter().map(|w| w.len()).max().unwrap_or(0);
        let n     = ranked.len().max(2) as f64;
        let log_n = n.ln();
        let costs = ranked
            .into_iter()
            .enumerate()
            .map(|(rank, w)| (w, ((rank as f64 + 1.0) * log_n).ln()))
            .collect();

        Self { costs, max_word_chars }
    }

    /// Small built-in dictionary of common social-media vocabulary.
    pub fn builtin() -> Self {
        Self::from_ranked(BUILTIN_WORDS.split_whitespace())
    }

    /// Load a word-per-line list, most frequent first.
    pub fn from_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PipelineError::missing("segmentation word list", path));
        }
        let text = fs::read_to_string(path)?;
        let seg  = Self::from_ranked(text.lines());
        if seg.costs.is_empty() {
            return Err(PipelineError::format(path, 1, "word list is empty"));
        }
        tracing::debug!("Loaded {} segmentation words from '{}'", seg.costs.len(), path.display());
        Ok(seg)
    }

    pub fn len(&self) -> usize {
        self.costs.len()
    }

}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Last {
    Word,
    Unknown,
}

/// Best split of a prefix: its cost, where its last piece starts, and
/// which state the text before that piece ended in.
#[derive(Debug, Clone, Copy)]
struct Cell {
    cost:  f64,
    start: usize,
    from:  Last,
}

impl Cell {
    const UNREACHED: Cell = Cell { cost: f64::INFINITY, start: 0, from: Last::Word };
}

impl WordSegmenter for UnigramSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        // Byte offset of every char boundary, so slicing stays valid.
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let n = bounds.len() - 1;
        if n == 0 {
            return Vec::new();
        }

        // word[i] / unknown[i]: best split of text[..i] whose last piece is
        // a dictionary word / an unknown run.
        let mut word    = vec![Cell::UNREACHED; n + 1];
        let mut unknown = vec![Cell::UNREACHED; n + 1];
        word[0].cost = 0.0;

        for end in 1..=n {
            for start in end.saturating_sub(self.max_word_chars)..end {
                let Some(&piece_cost) = self.costs.get(&text[bounds[start]..bounds[end]]) else {
                    continue;
                };
                let (before, from) = if word[start].cost <= unknown[start].cost {
                    (word[start].cost, Last::Word)
                } else {
                    (unknown[start].cost, Last::Unknown)
                };
                if before + piece_cost < word[end].cost {
                    word[end] = Cell { cost: before + piece_cost, start, from };
                }
            }

            let extend = unknown[end - 1].cost + UNKNOWN_PER_CHAR;
            let open   = word[end - 1].cost + UNKNOWN_BASE + UNKNOWN_PER_CHAR;
            unknown[end] = if extend < open {
                Cell { cost: extend, ..unknown[end - 1] }
            } else {
                Cell { cost: open, start: end - 1, from: Last::Word }
            };
        }

        let mut words = Vec::new();
        let mut end   = n;
        let mut state = if word[n].cost <= unknown[n].cost { Last::Word } else { Last::Unknown };
        while end > 0 {
            let cell = match state {
                Last::Word    => word[end],
                Last::Unknown => unknown[end],
            };
            words.push(text[bounds[cell.start]..bounds[end]].to_string());
            end   = cell.start;
            state = cell.from;
        }
        words.reverse();
        words
    }
}
