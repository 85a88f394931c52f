//! The tokenizer façade: construction-time validation, encoding, decoding.
//!
//! Encoding runs the input through the special-token splitter, then splits
//! each text segment into pieces with the encoding's regex, then BPE-encodes
//! each piece against the rank table. Decoding inverts the maps and renders
//! the byte stream as UTF-8 with replacement characters for invalid
//! sequences.
//!
//! A constructed tokenizer is immutable: every operation takes `&self`, and
//! the value is freely shareable across threads without synchronization.

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

#[cfg(feature = "pcre2")]
use pcre2::bytes::Regex as Pcre2Regex;

use super::bpe::{byte_pair_encode, MissingRank, Rank};
use super::special::{Segment, SpecialMatching, SpecialSplitter};
use super::vocab::{build_decoder, VocabError};

/// Everything that can go wrong constructing or using a [`Tokenizer`].
#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("invalid piece pattern: {0}")]
    InvalidPattern(#[from] Box<fancy_regex::Error>),
    #[cfg(feature = "pcre2")]
    #[error("invalid piece pattern (PCRE2): {0}")]
    InvalidPatternPcre2(#[from] pcre2::Error),
    #[error("invalid mergeable ranks: {0}")]
    InvalidRanks(String),
    #[error("invalid special tokens: {0}")]
    InvalidSpecialTokens(String),
    #[error("invalid special token pattern: {0}")]
    InvalidSpecialRegex(#[from] aho_corasick::BuildError),
    #[error("unknown special token {0:?}")]
    UnknownSpecialToken(String),
    #[error(transparent)]
    MissingRank(#[from] MissingRank),
    #[error("unknown token id {0}")]
    UnknownTokenId(Rank),
    #[error("unknown encoding {0:?}")]
    UnknownEncoding(String),
    #[error("unknown model {0:?}")]
    UnknownModel(String),
    #[error("vocabulary error: {0}")]
    Vocab(#[from] VocabError),
}

/// Piece-splitting regex, selectable at runtime.
///
/// fancy-regex is the default: it covers the Unicode property classes,
/// inline case-insensitive groups, and the `\s+(?!\S)` lookahead the
/// reference patterns need. The optional PCRE2 backend trades a native
/// dependency for JIT-compiled matching.
#[derive(Debug)]
enum RegexBackend {
    Fancy(Box<fancy_regex::Regex>),
    #[cfg(feature = "pcre2")]
    Pcre2(Pcre2Regex),
}

impl RegexBackend {
    fn fancy(pattern: &str) -> Result<Self, TokenizerError> {
        let regex = fancy_regex::Regex::new(pattern).map_err(Box::new)?;
        Ok(RegexBackend::Fancy(Box::new(regex)))
    }

    #[cfg(feature = "pcre2")]
    fn pcre2(pattern: &str) -> Result<Self, TokenizerError> {
        let mut builder = pcre2::bytes::RegexBuilder::new();
        builder.jit_if_available(true);
        builder.utf(true);
        builder.ucp(true);
        Ok(RegexBackend::Pcre2(builder.build(pattern)?))
    }

    /// All matches in `text` as (start, end) byte offsets.
    fn find_iter(&self, text: &str) -> Vec<(usize, usize)> {
        match self {
            RegexBackend::Fancy(regex) => regex
                .find_iter(text)
                .filter_map(|m| m.ok())
                .map(|m| (m.start(), m.end()))
                .collect(),
            #[cfg(feature = "pcre2")]
            RegexBackend::Pcre2(regex) => regex
                .find_iter(text.as_bytes())
                .filter_map(|m| m.ok())
                .map(|m| (m.start(), m.end()))
                .collect(),
        }
    }
}

/// A byte-pair-encoding tokenizer compatible with the OpenAI reference.
#[derive(Debug)]
pub struct Tokenizer {
    encoder: FxHashMap<Vec<u8>, Rank>,
    decoder: FxHashMap<Rank, Vec<u8>>,
    special_tokens: FxHashMap<String, Rank>,
    special_tokens_decoder: FxHashMap<Rank, String>,
    special_splitter: Option<SpecialSplitter>,
    special_matching: SpecialMatching,
    regex: RegexBackend,
    pattern: String,
}

impl Tokenizer {
    /// Create a tokenizer with the default (parity) trigger matching.
    ///
    /// # Arguments
    /// * `encoder` - rank table: byte sequence → token id
    /// * `special_tokens` - trigger string → token id
    /// * `pattern` - piece-splitting regex
    pub fn new(
        encoder: FxHashMap<Vec<u8>, Rank>,
        special_tokens: FxHashMap<String, Rank>,
        pattern: &str,
    ) -> Result<Self, TokenizerError> {
        Self::with_matching(encoder, special_tokens, pattern, SpecialMatching::default())
    }

    /// Create a tokenizer with an explicit trigger matching mode.
    pub fn with_matching(
        encoder: FxHashMap<Vec<u8>, Rank>,
        special_tokens: FxHashMap<String, Rank>,
        pattern: &str,
        special_matching: SpecialMatching,
    ) -> Result<Self, TokenizerError> {
        validate_ranks(&encoder)?;
        validate_special_tokens(&special_tokens)?;

        let regex = RegexBackend::fancy(pattern)?;
        let decoder = build_decoder(&encoder);
        let special_tokens_decoder: FxHashMap<Rank, String> = special_tokens
            .iter()
            .map(|(trigger, &id)| (id, trigger.clone()))
            .collect();
        let special_splitter =
            SpecialSplitter::new(special_tokens.keys().cloned().collect(), special_matching)?;

        Ok(Self {
            encoder,
            decoder,
            special_tokens,
            special_tokens_decoder,
            special_splitter,
            special_matching,
            regex,
            pattern: pattern.to_string(),
        })
    }

    /// Switch the piece splitter to the PCRE2 backend.
    #[cfg(feature = "pcre2")]
    pub fn pcre2(mut self) -> Result<Self, TokenizerError> {
        self.regex = RegexBackend::pcre2(&self.pattern)?;
        Ok(self)
    }

    /// Encode text to token ids, mapping special-token triggers to their
    /// reserved ids.
    pub fn encode(&self, text: &str) -> Result<Vec<Rank>, TokenizerError> {
        let Some(splitter) = &self.special_splitter else {
            return self.encode_ordinary(text);
        };
        let mut ids = Vec::new();
        for segment in splitter.split(text) {
            match segment {
                Segment::Special(trigger) => {
                    let &id = self.special_tokens.get(trigger).ok_or_else(|| {
                        TokenizerError::UnknownSpecialToken(trigger.to_string())
                    })?;
                    ids.push(id);
                }
                Segment::Text(chunk) => self.encode_text(chunk, &mut ids)?,
            }
        }
        Ok(ids)
    }

    /// Encode text to token ids with special handling disabled: trigger
    /// byte sequences pass through the piece splitter and BPE like any
    /// other bytes.
    pub fn encode_ordinary(&self, text: &str) -> Result<Vec<Rank>, TokenizerError> {
        let mut ids = Vec::new();
        self.encode_text(text, &mut ids)?;
        Ok(ids)
    }

    fn encode_text(&self, text: &str, ids: &mut Vec<Rank>) -> Result<(), TokenizerError> {
        let bytes = text.as_bytes();
        for (start, end) in self.regex.find_iter(text) {
            let piece = &bytes[start..end];
            // Fast path: the whole piece is a known token.
            if let Some(&id) = self.encoder.get(piece) {
                ids.push(id);
                continue;
            }
            ids.extend(byte_pair_encode(piece, &self.encoder)?);
        }
        Ok(())
    }

    /// Encode a batch of texts in parallel.
    pub fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<Rank>>, TokenizerError> {
        texts.par_iter().map(|text| self.encode(text)).collect()
    }

    /// Encode a batch of texts in parallel with special handling disabled.
    pub fn encode_ordinary_batch(
        &self,
        texts: &[String],
    ) -> Result<Vec<Vec<Rank>>, TokenizerError> {
        texts
            .par_iter()
            .map(|text| self.encode_ordinary(text))
            .collect()
    }

    /// Decode token ids to the byte sequence they were encoded from.
    ///
    /// Fails on the first id that is neither a special token nor a rank, and
    /// yields no partial output.
    pub fn decode_bytes(&self, ids: &[Rank]) -> Result<Vec<u8>, TokenizerError> {
        let mut bytes = Vec::with_capacity(ids.len() * 4);
        for &id in ids {
            if let Some(trigger) = self.special_tokens_decoder.get(&id) {
                bytes.extend_from_slice(trigger.as_bytes());
            } else if let Some(token) = self.decoder.get(&id) {
                bytes.extend_from_slice(token);
            } else {
                return Err(TokenizerError::UnknownTokenId(id));
            }
        }
        Ok(bytes)
    }

    /// Decode token ids to a string, replacing invalid UTF-8 sequences with
    /// U+FFFD. Lossy by design when ids split a codepoint across token
    /// boundaries.
    pub fn decode(&self, ids: &[Rank]) -> Result<String, TokenizerError> {
        let bytes = self.decode_bytes(ids)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Decode a batch of id sequences in parallel.
    pub fn decode_batch(&self, batches: &[Vec<Rank>]) -> Result<Vec<String>, TokenizerError> {
        batches.par_iter().map(|ids| self.decode(ids)).collect()
    }

    /// The piece-splitting regex source.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The trigger matching mode this tokenizer was built with.
    pub fn special_matching(&self) -> SpecialMatching {
        self.special_matching
    }

    /// The rank table (byte sequence → token id).
    pub fn encoder(&self) -> &FxHashMap<Vec<u8>, Rank> {
        &self.encoder
    }

    /// The decoder map (token id → byte sequence).
    pub fn decoder(&self) -> &FxHashMap<Rank, Vec<u8>> {
        &self.decoder
    }

    /// The special token map (trigger → token id).
    pub fn special_tokens(&self) -> &FxHashMap<String, Rank> {
        &self.special_tokens
    }

    /// The special token decoder map (token id → trigger).
    pub fn special_tokens_decoder(&self) -> &FxHashMap<Rank, String> {
        &self.special_tokens_decoder
    }

    /// Total vocabulary span: highest token id plus one, counting special
    /// tokens.
    pub fn vocab_size(&self) -> usize {
        let max_rank = self.decoder.keys().max().copied().unwrap_or(0);
        let max_special = self.special_tokens.values().max().copied().unwrap_or(0);
        (max_rank.max(max_special) + 1) as usize
    }
}

/// Rank-table shape checks: non-empty keys, pairwise-distinct ids, and an
/// entry for every single byte so BPE terminates on any input.
fn validate_ranks(encoder: &FxHashMap<Vec<u8>, Rank>) -> Result<(), TokenizerError> {
    if encoder.keys().any(|bytes| bytes.is_empty()) {
        return Err(TokenizerError::InvalidRanks(
            "empty byte sequence".to_string(),
        ));
    }
    let mut seen = FxHashSet::default();
    for &id in encoder.values() {
        if !seen.insert(id) {
            return Err(TokenizerError::InvalidRanks(format!("duplicate id {id}")));
        }
    }
    for b in 0u8..=255 {
        if !encoder.contains_key([b].as_slice()) {
            return Err(TokenizerError::InvalidRanks(format!(
                "missing entry for byte {b:#04x}"
            )));
        }
    }
    Ok(())
}

/// Special-token shape checks: triggers non-empty, ids pairwise distinct.
fn validate_special_tokens(special_tokens: &FxHashMap<String, Rank>) -> Result<(), TokenizerError> {
    if special_tokens.keys().any(|trigger| trigger.is_empty()) {
        return Err(TokenizerError::InvalidSpecialTokens(
            "empty trigger".to_string(),
        ));
    }
    let mut seen = FxHashSet::default();
    for &id in special_tokens.values() {
        if !seen.insert(id) {
            return Err(TokenizerError::InvalidSpecialTokens(format!(
                "duplicate id {id}"
            )));
        }
    }
    Ok(())
}
