//! kerf - byte pair encoding compatible with the OpenAI reference tokenizer
//!
//! Encodes text to token ids and decodes ids back to text for the
//! `cl100k_base`, `p50k_base`, `r50k_base`, and `o200k_base` encodings:
//! - reference-exact piece splitting, including contraction handling and
//!   Unicode category classes (fancy-regex by default, PCRE2 behind the
//!   `pcre2` feature)
//! - linear-scan BPE for short pieces, a versioned min-heap for long ones
//! - special-token triggers via Aho-Corasick, with parity or
//!   longest-match resolution of overlapping triggers
//! - rank tables in the tiktoken file format, resolved via `KERF_VOCAB_DIR`
//! - Rayon-parallel batch encode/decode
//!
//! ```no_run
//! # fn main() -> Result<(), kerf::TokenizerError> {
//! let tokenizer = kerf::get_encoding("cl100k_base")?;
//! let ids = tokenizer.encode("Hello world")?;
//! assert_eq!(tokenizer.decode(&ids)?, "Hello world");
//! # Ok(())
//! # }
//! ```

pub mod core;

pub use crate::core::{
    byte_pair_encode, byte_pair_split, encoding_for_model, from_encoding, from_encoding_name,
    get_encoding, EncodingKind, MissingRank, Rank, Segment, SpecialMatching, Tokenizer,
    TokenizerError, VocabError, CL100K_BASE_PATTERN, O200K_BASE_PATTERN, P50K_BASE_PATTERN,
    VOCAB_DIR_ENV,
};
