//! Splitting raw input around special-token triggers.
//!
//! Triggers are literal strings like `<|endoftext|>` that map straight to a
//! reserved id without going through BPE. The splitter carves them out of
//! the input, leaving the surrounding text untouched, so the encoder can
//! interleave reserved ids with ordinary BPE output.

use aho_corasick::{AhoCorasick, BuildError, MatchKind};

/// Policy for resolving triggers that match at the same position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpecialMatching {
    /// Triggers compete in the order they were supplied; the first listed
    /// alternative wins, mirroring the reference tokenizer's alternation
    /// regex. When triggers come out of a hash map, that order is
    /// unspecified, so overlapping trigger sets behave nondeterministically
    /// under this mode.
    #[default]
    Parity,
    /// The longest trigger wins; equal lengths resolve lexicographically.
    Longest,
}

/// One span of the input, tagged by how the encoder must treat it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Ordinary text, headed for the piece splitter and BPE.
    Text(&'a str),
    /// An exact trigger occurrence, headed for the special-token map.
    Special(&'a str),
}

/// Compiled trigger automaton.
///
/// Leftmost-first match semantics reproduce the reference's alternation
/// regex: of the triggers matching at the earliest position, the one listed
/// first wins. [`SpecialMatching::Longest`] is realized by ordering the
/// trigger list by descending byte length before the automaton is built.
#[derive(Debug)]
pub struct SpecialSplitter {
    matcher: AhoCorasick,
}

impl SpecialSplitter {
    /// Compile the trigger set. Returns `None` for an empty set, in which
    /// case callers treat the whole input as one text segment.
    pub fn new(
        mut triggers: Vec<String>,
        matching: SpecialMatching,
    ) -> Result<Option<Self>, BuildError> {
        if triggers.is_empty() {
            return Ok(None);
        }
        if matching == SpecialMatching::Longest {
            triggers.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        }
        let matcher = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostFirst)
            .build(&triggers)?;
        Ok(Some(Self { matcher }))
    }

    /// Split `text` into an ordered interleaving of text and special
    /// segments. Empty text between adjacent triggers is dropped; the
    /// concatenation of all segments equals `text`.
    pub fn split<'a>(&self, text: &'a str) -> Vec<Segment<'a>> {
        let mut segments = Vec::new();
        let mut last = 0;
        for m in self.matcher.find_iter(text.as_bytes()) {
            if m.start() > last {
                segments.push(Segment::Text(&text[last..m.start()]));
            }
            // Triggers are valid UTF-8 and UTF-8 is self-synchronizing, so
            // the match bounds always fall on character boundaries.
            segments.push(Segment::Special(&text[m.start()..m.end()]));
            last = m.end();
        }
        if last < text.len() {
            segments.push(Segment::Text(&text[last..]));
        }
        segments
    }
}
