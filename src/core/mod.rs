//! Core tokenization engine.
//!
//! The pipeline has three stages, orchestrated by [`Tokenizer`]:
//!
//! - [`special`]: carve special-token triggers out of the raw input,
//!   yielding an interleaving of text and special segments
//! - the piece splitter: the encoding's Unicode regex applied to each text
//!   segment, yielding byte-string pieces
//! - [`bpe`]: the byte-pair merge loop turning one piece into token ids
//!
//! [`vocab`] loads tiktoken-format rank files and [`encodings`] wires up the
//! four named OpenAI encodings (`cl100k_base`, `p50k_base`, `r50k_base`,
//! `o200k_base`) with their patterns and special-token tables.

pub mod bpe;
pub mod encodings;
pub mod special;
pub mod tokenizer;
pub mod vocab;

pub use bpe::{byte_pair_encode, byte_pair_split, MissingRank, Rank};
pub use encodings::{
    encoding_for_model, from_encoding, from_encoding_name, get_encoding, EncodingKind,
    CL100K_BASE_PATTERN, O200K_BASE_PATTERN, P50K_BASE_PATTERN, VOCAB_DIR_ENV,
};
pub use special::{Segment, SpecialMatching, SpecialSplitter};
pub use tokenizer::{Tokenizer, TokenizerError};
pub use vocab::{build_decoder, load_rank_file, parse_rank_file, VocabError};
