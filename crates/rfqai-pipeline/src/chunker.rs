//! Character-window text chunking with overlap.
//!
//! Splits prefer natural boundaries inside the window (blank line, then
//! newline, then space) and fall back to a hard cut. Each chunk carries a
//! content digest over kind, ids, ordinal, and text; the vector store's
//! uniqueness constraint is keyed on it.

use sha2::{Digest, Sha256};

use rfqai_core::{Chunk, TextDoc};

/// Chunking parameters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkParams {
    pub size: usize,
    pub overlap: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            size: rfqai_core::defaults::CHUNK_SIZE,
            overlap: rfqai_core::defaults::CHUNK_OVERLAP,
        }
    }
}

/// Split text into windows of at most `size` chars, consecutive windows
/// sharing `overlap` chars. Boundary preference inside the tail third of a
/// window: blank line, newline, space.
pub fn split_text(text: &str, params: ChunkParams) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    if chars.len() <= params.size {
        let t = text.trim();
        return if t.is_empty() { Vec::new() } else { vec![t.to_string()] };
    }

    let mut pieces = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let hard_end = (start + params.size).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            pick_break(&chars, start, hard_end)
        };

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }

        if end == chars.len() {
            break;
        }
        // Overlap backs the next window up; forward progress is guaranteed.
        start = end.saturating_sub(params.overlap).max(start + 1);
    }

    pieces
}

/// Choose a break position in `(start, hard_end]`, scanning backwards over
/// the tail third for a natural boundary.
fn pick_break(chars: &[char], start: usize, hard_end: usize) -> usize {
    let window = hard_end - start;
    let floor = start + window - window / 3;

    // Blank line: a newline whose predecessor is also a newline.
    for i in (floor..hard_end).rev() {
        if chars[i] == '\n' && i > start && chars[i - 1] == '\n' {
            return i + 1;
        }
    }
    for i in (floor..hard_end).rev() {
        if chars[i] == '\n' {
            return i + 1;
        }
    }
    for i in (floor..hard_end).rev() {
        if chars[i] == ' ' {
            return i + 1;
        }
    }
    hard_end
}

/// Content digest for one chunk: kind, ids, title, ordinal, text.
pub fn chunk_sha(doc: &TextDoc, idx: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(
        format!(
            "{}|{}|{}|{}|{}|{}|{}",
            doc.doc_kind,
            doc.rfq_id,
            doc.product_id.as_deref().unwrap_or(""),
            doc.query_id.as_deref().unwrap_or(""),
            doc.title,
            idx,
            text
        )
        .as_bytes(),
    );
    hex::encode(hasher.finalize())
}

/// Chunk one document into embedding-ready pieces (embeddings unset).
pub fn chunk_doc(doc: &TextDoc, params: ChunkParams) -> Vec<Chunk> {
    split_text(&doc.text, params)
        .into_iter()
        .enumerate()
        .map(|(idx, text)| Chunk {
            rfq_id: doc.rfq_id.clone(),
            doc_kind: doc.doc_kind,
            chunk_idx: idx as i32,
            content_sha: chunk_sha(doc, idx, &text),
            content_text: text,
            embedding: None,
            product_id: doc.product_id.clone(),
            query_id: doc.query_id.clone(),
            file_id: doc.file_id.clone(),
            page_num: None,
            meta: doc.meta.clone(),
        })
        .collect()
}
