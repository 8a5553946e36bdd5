//! Deterministic recursive text chunker with character overlap.
//!
//! Splits text on a priority-ordered separator list: if the pieces produced
//! by the first separator are still larger than `chunk_size`, each oversized
//! piece recurses into the remaining, lower-priority separators. The final
//! empty-string separator guarantees termination by falling back to raw
//! character slicing. Adjacent pieces are then greedily merged back up to
//! `chunk_size`, and each chunk after the first is prefixed with the
//! trailing `overlap` characters of the previous chunk.
//!
//! Separators are kept attached to their pieces (`split_inclusive`), so
//! merging is pure concatenation and the same text with the same parameters
//! always yields the same chunk sequence. Sizes are measured in characters,
//! not bytes, so multi-byte separators (e.g. CJK punctuation) are safe.

use crate::config::ChunkingConfig;
use crate::models::DocumentChunk;

/// Split `text` into overlapping chunks attributed to `source_name`.
///
/// Text no longer than `chunk_size` yields exactly one chunk with no
/// overlap applied; empty text yields an empty sequence.
pub fn split(text: &str, source_name: &str, cfg: &ChunkingConfig) -> Vec<DocumentChunk> {
    if text.is_empty() {
        return Vec::new();
    }

    let texts = if char_count(text) <= cfg.chunk_size {
        vec![text.to_string()]
    } else {
        let separators: Vec<&str> = cfg.separators.iter().map(String::as_str).collect();
        let pieces = split_recursive(text, cfg.chunk_size, &separators);
        let merged = merge_pieces(pieces, cfg.chunk_size);
        apply_overlap(merged, cfg.overlap)
    };

    texts
        .into_iter()
        .enumerate()
        .map(|(i, t)| DocumentChunk::new(t, source_name, i))
        .collect()
}

/// Split on the first separator; recurse into oversized pieces with the
/// remaining separators. Every returned piece is at most `max_chars` long.
fn split_recursive(text: &str, max_chars: usize, separators: &[&str]) -> Vec<String> {
    let Some((sep, rest)) = separators.split_first() else {
        return slice_chars(text, max_chars);
    };
    if sep.is_empty() {
        return slice_chars(text, max_chars);
    }

    let mut out = Vec::new();
    for piece in text.split_inclusive(*sep) {
        if char_count(piece) > max_chars {
            out.extend(split_recursive(piece, max_chars, rest));
        } else {
            out.push(piece.to_string());
        }
    }
    out
}

/// Greedily concatenate adjacent pieces while staying within `max_chars`.
fn merge_pieces(pieces: Vec<String>, max_chars: usize) -> Vec<String> {
    let mut merged = Vec::new();
    let mut buf = String::new();
    let mut buf_chars = 0;

    for piece in pieces {
        let n = char_count(&piece);
        if buf_chars > 0 && buf_chars + n > max_chars {
            merged.push(std::mem::take(&mut buf));
            buf_chars = 0;
        }
        buf.push_str(&piece);
        buf_chars += n;
    }
    if !buf.is_empty() {
        merged.push(buf);
    }
    merged
}

/// Prefix each chunk after the first with the trailing `overlap` characters
/// of the previous (already prefixed) chunk, truncated at the boundary.
fn apply_overlap(mut chunks: Vec<String>, overlap: usize) -> Vec<String> {
    if overlap == 0 || chunks.len() < 2 {
        return chunks;
    }
    for i in 1..chunks.len() {
        let tail = last_chars(&chunks[i - 1], overlap).to_string();
        chunks[i] = format!("{tail}{}", chunks[i]);
    }
    chunks
}

/// Hard fallback: slice into runs of at most `max_chars` characters.
fn slice_chars(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

fn char_count(s: &str) -> usize {
    s.chars().count()
}

/// The last `n` characters of `s`, or all of `s` if it is shorter.
fn last_chars(s: &str, n: usize) -> &str {
    let total = char_count(s);
    if total <= n {
        return s;
    }
    let skip = total - n;
    match s.char_indices().nth(skip) {
        Some((byte, _)) => &s[byte..],
        None => s,
    }
}
