//! Byte-pair encoding over a rank table.
//!
//! A piece (one regex match, as raw bytes) starts out as one part per byte.
//! The merge loop repeatedly finds the adjacent pair whose concatenation has
//! the lowest rank and fuses it, until no adjacent pair is rankable. The
//! surviving parts are all keys of the rank table, and their ids are the
//! output.
//!
//! Two interchangeable merge strategies back the same semantics:
//!
//! - a linear scan over a parts vector, quadratic in the worst case but
//!   cache-friendly and fastest for the short pieces the split regexes
//!   produce in practice;
//! - a min-heap over versioned slots in a doubly linked list, used for long
//!   pieces (think base64 blobs or digit runs) where the quadratic scan
//!   would degrade.
//!
//! Ties at equal rank always resolve to the leftmost pair in both variants.

use rustc_hash::FxHashMap;
use thiserror::Error;

/// Token id; doubles as the merge rank of its byte sequence.
pub type Rank = u32;

/// Pieces at or below this byte length take the linear-scan path.
const LINEAR_LIMIT: usize = 128;

/// A merge produced a byte sequence with no entry in the rank table.
///
/// Cannot happen when the table contains every single-byte sequence, which
/// [`Tokenizer`](super::tokenizer::Tokenizer) construction enforces.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("no rank for byte sequence {0:?}")]
pub struct MissingRank(pub Vec<u8>);

/// Encode one piece into token ids.
///
/// If the whole piece is a key of `ranks` its single id is returned without
/// running the merge loop.
pub fn byte_pair_encode(
    piece: &[u8],
    ranks: &FxHashMap<Vec<u8>, Rank>,
) -> Result<Vec<Rank>, MissingRank> {
    if piece.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(&rank) = ranks.get(piece) {
        return Ok(vec![rank]);
    }
    if piece.len() <= LINEAR_LIMIT {
        merge_linear(piece, ranks)
    } else {
        merge_heap(piece, ranks)
    }
}

/// Encode one piece into the byte slices of its surviving parts.
///
/// Same merge as [`byte_pair_encode`], returned as slices of `piece` rather
/// than ids. Their concatenation is always exactly `piece`.
pub fn byte_pair_split<'a>(piece: &'a [u8], ranks: &FxHashMap<Vec<u8>, Rank>) -> Vec<&'a [u8]> {
    if piece.is_empty() {
        return Vec::new();
    }
    if ranks.contains_key(piece) {
        return vec![piece];
    }
    let boundaries = if piece.len() <= LINEAR_LIMIT {
        linear_boundaries(piece, ranks)
    } else {
        heap_boundaries(piece, ranks)
    };
    boundaries.windows(2).map(|w| &piece[w[0]..w[1]]).collect()
}

fn merge_linear(piece: &[u8], ranks: &FxHashMap<Vec<u8>, Rank>) -> Result<Vec<Rank>, MissingRank> {
    emit(piece, ranks, &linear_boundaries(piece, ranks))
}

fn merge_heap(piece: &[u8], ranks: &FxHashMap<Vec<u8>, Rank>) -> Result<Vec<Rank>, MissingRank> {
    emit(piece, ranks, &heap_boundaries(piece, ranks))
}

/// Map the surviving part boundaries to ids.
fn emit(
    piece: &[u8],
    ranks: &FxHashMap<Vec<u8>, Rank>,
    boundaries: &[usize],
) -> Result<Vec<Rank>, MissingRank> {
    boundaries
        .windows(2)
        .map(|w| {
            let part = &piece[w[0]..w[1]];
            ranks
                .get(part)
                .copied()
                .ok_or_else(|| MissingRank(part.to_vec()))
        })
        .collect()
}

/// Linear-scan merge. Returns the byte offsets of the surviving part
/// boundaries, `[0, .., piece.len()]`.
///
/// `parts[i]` is `(start, rank)` where `rank` is the rank of merging the part
/// starting at `start` with its successor; the final entry's rank is never
/// read. Ranks are computed once up front and patched locally after each
/// merge, so each pass costs one scan plus two map lookups.
fn linear_boundaries(piece: &[u8], ranks: &FxHashMap<Vec<u8>, Rank>) -> Vec<usize> {
    let mut parts: Vec<(usize, Rank)> = (0..=piece.len()).map(|i| (i, Rank::MAX)).collect();

    let pair_rank = |parts: &[(usize, Rank)], i: usize, skip: usize| -> Rank {
        if i + skip + 2 < parts.len() {
            ranks
                .get(&piece[parts[i].0..parts[i + skip + 2].0])
                .copied()
                .unwrap_or(Rank::MAX)
        } else {
            Rank::MAX
        }
    };

    for i in 0..parts.len().saturating_sub(2) {
        parts[i].1 = pair_rank(&parts, i, 0);
    }

    loop {
        // Strict less-than keeps the leftmost pair on rank ties.
        let mut min: (Rank, usize) = (Rank::MAX, 0);
        for (i, &(_, rank)) in parts[..parts.len() - 1].iter().enumerate() {
            if rank < min.0 {
                min = (rank, i);
            }
        }
        if min.0 == Rank::MAX {
            break;
        }
        let i = min.1;

        // Patch the two affected pair ranks before removing the absorbed
        // part; `skip = 1` reads past it.
        parts[i].1 = pair_rank(&parts, i, 1);
        if i > 0 {
            parts[i - 1].1 = pair_rank(&parts, i - 1, 1);
        }
        parts.remove(i + 1);
    }

    parts.into_iter().map(|(start, _)| start).collect()
}

/// Candidate merge in the heap variant.
///
/// Ordered by `(rank, seq)`: `seq` is a monotonic insertion counter, so of
/// two equal-rank candidates the earlier-inserted one wins. Initial pairs
/// are inserted left to right, and a pair created by a merge spans positions
/// at or right of the pair that produced it, so this reproduces the linear
/// scan's leftmost tie-break.
#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    rank: Rank,
    seq: u64,
    left: usize,
    right: usize,
    left_version: u32,
    right_version: u32,
}

const NONE: usize = usize::MAX;

/// Heap-driven merge. Returns the same boundary list as
/// [`linear_boundaries`] for any input.
///
/// Slots are stable: a merge grows the left slot and tombstones the right
/// one instead of compacting. Stale heap entries are detected on pop by
/// re-checking adjacency, liveness, and the version stamps taken when the
/// entry was pushed; each merge invalidates at most two queued entries.
fn heap_boundaries(piece: &[u8], ranks: &FxHashMap<Vec<u8>, Rank>) -> Vec<usize> {
    use std::cmp::Reverse;
    use std::collections::BinaryHeap;

    let n = piece.len();
    let mut start: Vec<usize> = (0..n).collect();
    let mut end: Vec<usize> = (1..=n).collect();
    let mut next: Vec<usize> = (0..n).map(|i| if i + 1 < n { i + 1 } else { NONE }).collect();
    let mut prev: Vec<usize> = (0..n).map(|i| if i > 0 { i - 1 } else { NONE }).collect();
    let mut version: Vec<u32> = vec![0; n];
    let mut alive: Vec<bool> = vec![true; n];

    let mut seq: u64 = 0;
    let mut heap: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(n);
    let mut push = |heap: &mut BinaryHeap<Reverse<Candidate>>,
                    rank: Rank,
                    left: usize,
                    right: usize,
                    left_version: u32,
                    right_version: u32| {
        heap.push(Reverse(Candidate {
            rank,
            seq,
            left,
            right,
            left_version,
            right_version,
        }));
        seq += 1;
    };

    for i in 0..n.saturating_sub(1) {
        if let Some(&rank) = ranks.get(&piece[start[i]..end[i + 1]]) {
            push(&mut heap, rank, i, i + 1, 0, 0);
        }
    }

    while let Some(Reverse(c)) = heap.pop() {
        let (l, r) = (c.left, c.right);
        if !alive[l]
            || !alive[r]
            || next[l] != r
            || version[l] != c.left_version
            || version[r] != c.right_version
        {
            continue;
        }

        end[l] = end[r];
        version[l] += 1;
        alive[r] = false;
        next[l] = next[r];
        if next[r] != NONE {
            prev[next[r]] = l;
        }

        if prev[l] != NONE {
            let p = prev[l];
            if let Some(&rank) = ranks.get(&piece[start[p]..end[l]]) {
                push(&mut heap, rank, p, l, version[p], version[l]);
            }
        }
        if next[l] != NONE {
            let nx = next[l];
            if let Some(&rank) = ranks.get(&piece[start[l]..end[nx]]) {
                push(&mut heap, rank, l, nx, version[l], version[nx]);
            }
        }
    }

    // Slot 0 survives every merge (the right slot is always the one
    // tombstoned), so it is the list head.
    let mut boundaries = Vec::new();
    let mut cur = 0;
    loop {
        boundaries.push(start[cur]);
        if next[cur] == NONE {
            boundaries.push(end[cur]);
            break;
        }
        cur = next[cur];
    }
    boundaries
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rank table with every single byte plus the given merged entries.
    /// Single bytes rank above 1000 so merge entries can use small ranks.
    fn table(extra: &[(&[u8], Rank)]) -> FxHashMap<Vec<u8>, Rank> {
        let mut ranks = FxHashMap::default();
        for b in 0u8..=255 {
            ranks.insert(vec![b], 1000 + b as Rank);
        }
        for &(bytes, rank) in extra {
            ranks.insert(bytes.to_vec(), rank);
        }
        ranks
    }

    #[test]
    fn whole_piece_short_circuits() {
        let ranks = table(&[(b"hello", 7)]);
        assert_eq!(byte_pair_encode(b"hello", &ranks).unwrap(), vec![7]);
        assert_eq!(byte_pair_split(b"hello", &ranks), vec![b"hello".as_slice()]);
    }

    #[test]
    fn single_byte_piece() {
        let ranks = table(&[]);
        assert_eq!(byte_pair_encode(b"q", &ranks).unwrap(), vec![1000 + b'q' as Rank]);
    }

    #[test]
    fn empty_piece() {
        let ranks = table(&[]);
        assert!(byte_pair_encode(b"", &ranks).unwrap().is_empty());
    }

    #[test]
    fn merges_lowest_rank_first() {
        // "bc" outranks "ab", so "abc" must become ["a", "bc"].
        let ranks = table(&[(b"ab", 5), (b"bc", 2)]);
        assert_eq!(
            byte_pair_encode(b"abc", &ranks).unwrap(),
            vec![1000 + b'a' as Rank, 2]
        );
    }

    #[test]
    fn cascading_merges_complete() {
        let ranks = table(&[(b"ab", 7), (b"bc", 8), (b"abc", 3)]);
        assert_eq!(merge_linear(b"abc", &ranks).unwrap(), vec![3]);
        assert_eq!(merge_heap(b"abc", &ranks).unwrap(), vec![3]);
    }

    #[test]
    fn equal_ranks_resolve_leftmost() {
        // Both pairs have rank 7; the left one must win, leaving ["ab", "c"].
        let ranks = table(&[(b"ab", 7), (b"bc", 7)]);
        let expected = vec![7, 1000 + b'c' as Rank];
        assert_eq!(merge_linear(b"abc", &ranks).unwrap(), expected);
        assert_eq!(merge_heap(b"abc", &ranks).unwrap(), expected);
    }

    #[test]
    fn repeated_byte_runs() {
        let ranks = table(&[(b"aa", 0)]);
        let expected = vec![0, 0];
        assert_eq!(merge_linear(b"aaaa", &ranks).unwrap(), expected);
        assert_eq!(merge_heap(b"aaaa", &ranks).unwrap(), expected);
        // Odd length leaves a trailing single byte.
        let expected = vec![0, 0, 1000 + b'a' as Rank];
        assert_eq!(merge_linear(b"aaaaa", &ranks).unwrap(), expected);
        assert_eq!(merge_heap(b"aaaaa", &ranks).unwrap(), expected);
    }

    #[test]
    fn split_concatenates_to_piece() {
        let ranks = table(&[(b"ab", 1), (b"abab", 0)]);
        let parts = byte_pair_split(b"ababa", &ranks);
        let rejoined: Vec<u8> = parts.concat();
        assert_eq!(rejoined, b"ababa");
        for part in parts {
            assert!(ranks.contains_key(part));
        }
    }

    #[test]
    fn missing_single_byte_rank_is_an_error() {
        let mut ranks = table(&[]);
        ranks.remove(b"z".as_slice());
        let err = byte_pair_encode(b"az", &ranks).unwrap_err();
        assert_eq!(err, MissingRank(b"z".to_vec()));
    }

    #[test]
    fn variants_agree_on_long_pieces() {
        // Enough merge entries to force deep cascades, over a piece well past
        // the linear limit so the public entry point takes the heap path.
        let ranks = table(&[
            (b"ab", 0),
            (b"abab", 1),
            (b"abababab", 2),
            (b"ba", 3),
            (b"cd", 4),
            (b"abc", 5),
            (b"dd", 6),
        ]);
        let mut piece = Vec::new();
        for i in 0..60 {
            piece.extend_from_slice(match i % 4 {
                0 => b"abab".as_slice(),
                1 => b"abcd",
                2 => b"ddda",
                _ => b"bacd",
            });
        }
        assert!(piece.len() > LINEAR_LIMIT);
        let linear = merge_linear(&piece, &ranks).unwrap();
        let heap = merge_heap(&piece, &ranks).unwrap();
        assert_eq!(linear, heap);
        assert_eq!(byte_pair_encode(&piece, &ranks).unwrap(), linear);
    }

    #[test]
    fn variants_agree_on_rank_ties() {
        let ranks = table(&[(b"ab", 9), (b"bc", 9), (b"ca", 9), (b"abc", 20)]);
        for piece in [&b"abcabcabc"[..], b"aabbccabca", b"cabcabcab"] {
            assert_eq!(
                merge_linear(piece, &ranks).unwrap(),
                merge_heap(piece, &ranks).unwrap(),
                "variants diverged on {piece:?}"
            );
        }
    }

    #[test]
    fn every_output_id_maps_back_into_the_piece() {
        let ranks = table(&[(b"in", 0), (b"ing", 1), (b"str", 2)]);
        let piece = b"stringing";
        let ids = byte_pair_encode(piece, &ranks).unwrap();
        let decoder: FxHashMap<Rank, Vec<u8>> =
            ranks.iter().map(|(k, v)| (*v, k.clone())).collect();
        let mut rejoined = Vec::new();
        for id in ids {
            rejoined.extend_from_slice(&decoder[&id]);
        }
        assert_eq!(rejoined, piece);
    }
}
