//! Document chunking.
//!
//! [`RecursiveChunker`] splits text at the coarsest natural boundary that
//! keeps pieces within `chunk_size` (paragraph, line, sentence, word, and
//! finally single characters), then greedily merges those pieces back into
//! chunks, carrying up to `chunk_overlap` trailing characters into the next
//! chunk. All sizes and offsets are measured in characters, not bytes.

use crate::config::RagConfig;
use crate::document::{CHUNK_INDEX_KEY, Chunk, Document, START_INDEX_KEY};
use crate::error::{RagError, Result};

/// Boundaries tried in order before falling back to single characters.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks, in document order.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits text hierarchically and re-merges it into overlapping chunks.
///
/// Guarantees, for a non-empty document of `L` characters:
/// - every chunk has at most `chunk_size` characters;
/// - the chunks cover `[0, L)` with no gap;
/// - `start_index` is strictly increasing;
/// - a document of at most `chunk_size` characters is returned as a single
///   chunk equal to its full text.
///
/// Chunk IDs are `{document_id}_{chunk_index}`. Each chunk inherits the parent
/// document's metadata plus `start_index` and `chunk_index`.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{Chunker, RecursiveChunker};
///
/// let chunker = RecursiveChunker::new(1000, 200)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ChunkingError`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::ChunkingError("chunk_size must be greater than zero".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::ChunkingError(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Create a chunker from the sizes in a [`RagConfig`].
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Maximum number of characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Target overlap between consecutive chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Character spans `(start, len)` of the chunks for `text`.
    fn spans(&self, text: &str) -> Vec<Span> {
        let mut atoms = Vec::new();
        split_into_atoms(text, 0, self.chunk_size, SEPARATORS, &mut atoms);
        merge_atoms(&atoms, self.chunk_size, self.chunk_overlap)
    }
}

/// A run of characters: `start` and `len` are character counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: usize,
    len: usize,
}

impl Span {
    fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Break `text` (beginning at character `offset` of the document) into
/// contiguous atoms no longer than `chunk_size`, using the first separator
/// present and recursing with the finer ones.
fn split_into_atoms(
    text: &str,
    offset: usize,
    chunk_size: usize,
    separators: &[&str],
    atoms: &mut Vec<Span>,
) {
    let len = text.chars().count();
    if len == 0 {
        return;
    }
    if len <= chunk_size {
        atoms.push(Span { start: offset, len });
        return;
    }

    match separators.iter().position(|separator| text.contains(separator)) {
        Some(i) => {
            let finer = &separators[i + 1..];
            let mut cursor = offset;
            for segment in split_keeping_separator(text, separators[i]) {
                split_into_atoms(segment, cursor, chunk_size, finer, atoms);
                cursor += segment.chars().count();
            }
        }
        // No boundary left: every character stands alone.
        None => atoms.extend((0..len).map(|i| Span { start: offset + i, len: 1 })),
    }
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// Greedily merge contiguous atoms into chunks of at most `chunk_size`
/// characters. Each following chunk restarts at the earliest atom whose tail
/// through the end of the previous chunk fits within `chunk_overlap` and
/// still leaves room for the next unseen atom.
fn merge_atoms(atoms: &[Span], chunk_size: usize, chunk_overlap: usize) -> Vec<Span> {
    let mut chunks = Vec::new();
    if atoms.is_empty() {
        return chunks;
    }

    let mut first = 0;
    loop {
        let start = atoms[first].start;
        let mut last = first;
        while last + 1 < atoms.len() && atoms[last + 1].end() - start <= chunk_size {
            last += 1;
        }
        chunks.push(Span { start, len: atoms[last].end() - start });

        if last + 1 == atoms.len() {
            break;
        }

        let previous_end = atoms[last].end();
        let next_end = atoms[last + 1].end();
        let mut next = first + 1;
        while next <= last
            && (previous_end - atoms[next].start > chunk_overlap
                || next_end - atoms[next].start > chunk_size)
        {
            next += 1;
        }
        first = next;
    }

    chunks
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        if document.text.is_empty() {
            return Vec::new();
        }

        let text = &document.text;
        // Byte offset of every character boundary, including the end of text.
        let boundaries: Vec<usize> =
            text.char_indices().map(|(byte, _)| byte).chain(std::iter::once(text.len())).collect();

        self.spans(text)
            .into_iter()
            .enumerate()
            .map(|(i, span)| {
                let chunk_text = &text[boundaries[span.start]..boundaries[span.end()]];
                let mut metadata = document.metadata.clone();
                metadata.insert(START_INDEX_KEY.to_string(), span.start.to_string());
                metadata.insert(CHUNK_INDEX_KEY.to_string(), i.to_string());
                Chunk {
                    id: format!("{}_{i}", document.id),
                    text: chunk_text.to_string(),
                    start_index: span.start,
                    metadata,
                    document_id: document.id.clone(),
                }
            })
            .collect()
    }
}
