//! Overlapping fixed-size text windows.
//!
//! Lengths and offsets are counted in Unicode scalar values. With chunk
//! length `L` and overlap `O`, windows start at `0, L-O, 2(L-O), ...` and
//! the sequence stops after the first window that reaches the end of the
//! text, so consecutive chunks share exactly `O` characters.

use qagent_shared::{ChunkingConfig, Result};

/// One window of a document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position in the sequence, from 0.
    pub index: usize,
    /// Character offset of the first character.
    pub offset: usize,
    pub text: String,
}

/// Split `text` into overlapping chunks.
///
/// Empty input yields no chunks. Fails when the configuration does not
/// satisfy `0 < chunk_overlap < chunk_size`.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Result<Vec<TextChunk>> {
    config.validate()?;

    let chars: Vec<char> = text.chars().collect();
    let step = config.chunk_size - config.chunk_overlap;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + config.chunk_size).min(chars.len());
        chunks.push(TextChunk {
            index: chunks.len(),
            offset: start,
            text: chars[start..end].iter().collect(),
        });
        if end == chars.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

/// Rebuild the original text from chunks produced with `overlap`.
pub fn reassemble(chunks: &[TextChunk], overlap: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(&chunk.text);
        } else {
            out.extend(chunk.text.chars().skip(overlap));
        }
    }
    out
}
