//! Rank-table loading for the tiktoken vocabulary format.
//!
//! A rank file is UTF-8 text with one entry per `\n`-separated line, each
//! entry being a base64-encoded byte sequence, exactly one space, and a
//! base-10 rank:
//!
//! ```text
//! SGVsbG8= 0
//! V29ybGQ= 1
//! IQ== 2
//! ```
//!
//! Lower ranks merge first during BPE encoding, and the rank doubles as the
//! token id of the decoded byte sequence.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rustc_hash::FxHashMap;
use thiserror::Error;

use super::bpe::Rank;

/// Errors from locating or reading a rank file. Malformed lines are not
/// errors; see [`parse_rank_file`].
#[derive(Error, Debug)]
pub enum VocabError {
    #[error("vocabulary file not found: {0}")]
    NotFound(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse rank-file contents into a rank table.
///
/// Lines that do not parse (missing separator, invalid base64, invalid
/// rank) are skipped with a debug log. Duplicate byte sequences resolve
/// last-wins. A trailing newline and `\r` line endings are tolerated.
pub fn parse_rank_file(data: &[u8]) -> FxHashMap<Vec<u8>, Rank> {
    let mut ranks = FxHashMap::default();
    for (lineno, line) in data.split(|&b| b == b'\n').enumerate() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            continue;
        }
        let Some((token, rank)) = parse_line(line) else {
            log::debug!("skipping malformed rank entry on line {}", lineno + 1);
            continue;
        };
        ranks.insert(token, rank);
    }
    ranks
}

fn parse_line(line: &[u8]) -> Option<(Vec<u8>, Rank)> {
    let space = line.iter().position(|&b| b == b' ')?;
    let token = STANDARD.decode(&line[..space]).ok()?;
    let rank = std::str::from_utf8(&line[space + 1..]).ok()?.parse().ok()?;
    Some((token, rank))
}

/// Read and parse a rank file from disk.
pub fn load_rank_file(path: impl AsRef<Path>) -> Result<FxHashMap<Vec<u8>, Rank>, VocabError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(VocabError::NotFound(path.display().to_string()));
    }
    let data = std::fs::read(path)?;
    Ok(parse_rank_file(&data))
}

/// Build the decoder map (id → bytes) from a rank table (bytes → id).
///
/// Total inverse whenever the table's ids are pairwise distinct, which
/// tokenizer construction validates.
pub fn build_decoder(ranks: &FxHashMap<Vec<u8>, Rank>) -> FxHashMap<Rank, Vec<u8>> {
    ranks.iter().map(|(bytes, &id)| (id, bytes.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entries() {
        // "Hello" and "World" in base64.
        let ranks = parse_rank_file(b"SGVsbG8= 0\nV29ybGQ= 1\n");
        assert_eq!(ranks.get(b"Hello".as_slice()), Some(&0));
        assert_eq!(ranks.get(b"World".as_slice()), Some(&1));
        assert_eq!(ranks.len(), 2);
    }

    #[test]
    fn tolerates_crlf_and_missing_trailing_newline() {
        let ranks = parse_rank_file(b"SGVsbG8= 0\r\nV29ybGQ= 1");
        assert_eq!(ranks.len(), 2);
        assert_eq!(ranks.get(b"World".as_slice()), Some(&1));
    }

    #[test]
    fn skips_malformed_lines() {
        let data = b"SGVsbG8= 0\nnot-base64!! 1\nmissing-rank\nV29ybGQ= x\nIQ== 2\n";
        let ranks = parse_rank_file(data);
        assert_eq!(ranks.len(), 2);
        assert_eq!(ranks.get(b"Hello".as_slice()), Some(&0));
        assert_eq!(ranks.get(b"!".as_slice()), Some(&2));
    }

    #[test]
    fn duplicate_keys_resolve_last_wins() {
        let ranks = parse_rank_file(b"SGVsbG8= 0\nSGVsbG8= 9\n");
        assert_eq!(ranks.get(b"Hello".as_slice()), Some(&9));
        assert_eq!(ranks.len(), 1);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = load_rank_file("/nonexistent/vocab.tiktoken").unwrap_err();
        assert!(matches!(err, VocabError::NotFound(_)));
    }

    #[test]
    fn decoder_inverts_ranks() {
        let mut ranks = FxHashMap::default();
        ranks.insert(b"Hello".to_vec(), 0);
        ranks.insert(b"World".to_vec(), 1);
        let decoder = build_decoder(&ranks);
        assert_eq!(decoder.get(&0), Some(&b"Hello".to_vec()));
        assert_eq!(decoder.get(&1), Some(&b"World".to_vec()));
    }
}
