//! The named OpenAI encodings: piece patterns, special-token tables, model
//! resolution, and vocabulary discovery.
//!
//! Rank files are not bundled. They are looked up as
//! `$KERF_VOCAB_DIR/<encoding>.tiktoken`, the standard files published for
//! each encoding (`cl100k_base.tiktoken` is ~1.6 MB, `o200k_base.tiktoken`
//! ~2.4 MB).

use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use rustc_hash::FxHashMap;

use super::bpe::Rank;
use super::tokenizer::{Tokenizer, TokenizerError};
use super::vocab::{load_rank_file, VocabError};

/// Piece-splitting pattern for `cl100k_base` (GPT-4, GPT-3.5-turbo).
pub const CL100K_BASE_PATTERN: &str = r"(?i:'s|'t|'re|'ve|'m|'ll|'d)|[^\r\n\p{L}\p{N}]?\p{L}+|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n]*|\s*[\r\n]+|\s+(?!\S)|\s+";

/// Piece-splitting pattern for `p50k_base` and `r50k_base` (GPT-3 era).
pub const P50K_BASE_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

/// Piece-splitting pattern for `o200k_base` (GPT-4o). Two letter-cluster
/// alternatives distinguish upper/title-case-led and lower-case-led runs.
pub const O200K_BASE_PATTERN: &str = r"[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]*[\p{Ll}\p{Lm}\p{Lo}\p{M}]+(?i:'s|'t|'re|'ve|'m|'ll|'d)?|[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]+[\p{Ll}\p{Lm}\p{Lo}\p{M}]*(?i:'s|'t|'re|'ve|'m|'ll|'d)?|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n]*|\s*[\r\n]+|\s+(?!\S)|\s+";

pub const ENDOFTEXT: &str = "<|endoftext|>";
pub const FIM_PREFIX: &str = "<|fim_prefix|>";
pub const FIM_MIDDLE: &str = "<|fim_middle|>";
pub const FIM_SUFFIX: &str = "<|fim_suffix|>";
pub const ENDOFPROMPT: &str = "<|endofprompt|>";

/// Environment variable naming the directory that holds
/// `<encoding>.tiktoken` rank files.
pub const VOCAB_DIR_ENV: &str = "KERF_VOCAB_DIR";

/// The supported encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodingKind {
    /// GPT-4, GPT-3.5-turbo, text-embedding-ada-002, text-embedding-3-*.
    Cl100kBase,
    /// text-davinci-003/002 and Codex models.
    P50kBase,
    /// GPT-3 base models (davinci, curie, babbage, ada); also known as gpt2.
    R50kBase,
    /// GPT-4o.
    O200kBase,
}

impl EncodingKind {
    /// Every supported encoding.
    pub fn all() -> &'static [EncodingKind] {
        &[
            EncodingKind::Cl100kBase,
            EncodingKind::P50kBase,
            EncodingKind::R50kBase,
            EncodingKind::O200kBase,
        ]
    }

    /// Resolve an encoding name.
    pub fn from_name(name: &str) -> Result<Self, TokenizerError> {
        match name {
            "cl100k_base" => Ok(EncodingKind::Cl100kBase),
            "p50k_base" => Ok(EncodingKind::P50kBase),
            "r50k_base" => Ok(EncodingKind::R50kBase),
            "o200k_base" => Ok(EncodingKind::O200kBase),
            _ => Err(TokenizerError::UnknownEncoding(name.to_string())),
        }
    }

    /// The encoding's canonical name.
    pub fn name(self) -> &'static str {
        match self {
            EncodingKind::Cl100kBase => "cl100k_base",
            EncodingKind::P50kBase => "p50k_base",
            EncodingKind::R50kBase => "r50k_base",
            EncodingKind::O200kBase => "o200k_base",
        }
    }

    /// The encoding's piece-splitting pattern, verbatim from the reference.
    pub fn pattern(self) -> &'static str {
        match self {
            EncodingKind::Cl100kBase => CL100K_BASE_PATTERN,
            EncodingKind::P50kBase | EncodingKind::R50kBase => P50K_BASE_PATTERN,
            EncodingKind::O200kBase => O200K_BASE_PATTERN,
        }
    }

    /// The encoding's special-token table.
    pub fn special_tokens(self) -> FxHashMap<String, Rank> {
        let entries: &[(&str, Rank)] = match self {
            EncodingKind::Cl100kBase => &[
                (ENDOFTEXT, 100257),
                (FIM_PREFIX, 100258),
                (FIM_MIDDLE, 100259),
                (FIM_SUFFIX, 100260),
                (ENDOFPROMPT, 100276),
            ],
            EncodingKind::P50kBase | EncodingKind::R50kBase => &[(ENDOFTEXT, 50256)],
            // The published o200k set is larger; only <|endoftext|> is
            // carried until the rest is verified against the reference.
            EncodingKind::O200kBase => &[(ENDOFTEXT, 199999)],
        };
        entries
            .iter()
            .map(|&(trigger, id)| (trigger.to_string(), id))
            .collect()
    }

    /// Resolve the encoding used by an OpenAI model name.
    pub fn for_model(model: &str) -> Result<Self, TokenizerError> {
        const EXACT: &[(&str, EncodingKind)] = &[
            ("text-embedding-ada-002", EncodingKind::Cl100kBase),
            ("text-davinci-003", EncodingKind::P50kBase),
            ("text-davinci-002", EncodingKind::P50kBase),
            ("text-davinci-001", EncodingKind::R50kBase),
            ("davinci", EncodingKind::R50kBase),
            ("curie", EncodingKind::R50kBase),
            ("babbage", EncodingKind::R50kBase),
            ("ada", EncodingKind::R50kBase),
        ];
        // Longer prefixes first: gpt-4o must win over gpt-4.
        const PREFIX: &[(&str, EncodingKind)] = &[
            ("gpt-4o", EncodingKind::O200kBase),
            ("gpt-4", EncodingKind::Cl100kBase),
            ("gpt-3.5-turbo", EncodingKind::Cl100kBase),
            ("text-embedding-3-", EncodingKind::Cl100kBase),
            ("code-", EncodingKind::P50kBase),
        ];
        if let Some(&(_, kind)) = EXACT.iter().find(|&&(name, _)| name == model) {
            return Ok(kind);
        }
        if let Some(&(_, kind)) = PREFIX.iter().find(|&&(prefix, _)| model.starts_with(prefix)) {
            return Ok(kind);
        }
        Err(TokenizerError::UnknownModel(model.to_string()))
    }
}

fn vocab_path(kind: EncodingKind) -> Result<PathBuf, VocabError> {
    let dir = std::env::var_os(VOCAB_DIR_ENV).ok_or_else(|| {
        VocabError::NotFound(format!(
            "{}.tiktoken ({VOCAB_DIR_ENV} is not set)",
            kind.name()
        ))
    })?;
    Ok(PathBuf::from(dir).join(format!("{}.tiktoken", kind.name())))
}

/// Construct a tokenizer for a named encoding from its on-disk rank file.
pub fn from_encoding(kind: EncodingKind) -> Result<Tokenizer, TokenizerError> {
    let path = vocab_path(kind)?;
    log::debug!("loading {} ranks from {}", kind.name(), path.display());
    let encoder = load_rank_file(&path)?;
    Tokenizer::new(encoder, kind.special_tokens(), kind.pattern())
}

/// [`from_encoding`] by name.
pub fn from_encoding_name(name: &str) -> Result<Tokenizer, TokenizerError> {
    from_encoding(EncodingKind::from_name(name)?)
}

static ENCODINGS: OnceLock<Mutex<FxHashMap<EncodingKind, Arc<Tokenizer>>>> = OnceLock::new();

/// Fetch a shared tokenizer for a named encoding, constructing and caching
/// it on first use. Subsequent calls for the same encoding are map lookups.
pub fn get_encoding(name: &str) -> Result<Arc<Tokenizer>, TokenizerError> {
    let kind = EncodingKind::from_name(name)?;
    let cache = ENCODINGS.get_or_init(|| Mutex::new(FxHashMap::default()));
    let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(tokenizer) = cache.get(&kind) {
        return Ok(Arc::clone(tokenizer));
    }
    let tokenizer = Arc::new(from_encoding(kind)?);
    cache.insert(kind, Arc::clone(&tokenizer));
    Ok(tokenizer)
}

/// Fetch a shared tokenizer for an OpenAI model name.
pub fn encoding_for_model(model: &str) -> Result<Arc<Tokenizer>, TokenizerError> {
    get_encoding(EncodingKind::for_model(model)?.name())
}
