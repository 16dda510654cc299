//! Recursive text splitter.
//!
//! Splits text by trying progressively smaller separators until every
//! passage fits within the size limit, then merges neighbouring pieces
//! back up to that limit with a trailing overlap.

use std::collections::VecDeque;

use rag_core::{ChunkingConfig, RagError, Result};

/// Separators tried in order: paragraphs, lines, words, characters.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Character-budget splitter with overlap between consecutive passages.
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(RagError::config(format!(
                "invalid chunking: size {} with overlap {}",
                chunk_size, chunk_overlap
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split `text` into trimmed, non-empty passages of at most `chunk_size` chars.
    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
            .into_iter()
            .map(|chunk| chunk.trim().to_string())
            .filter(|chunk| !chunk.is_empty())
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // First separator present in the text; "" always matches
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let parts: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator)
                .filter(|part| !part.trim().is_empty())
                .collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for part in parts {
            if char_len(part) <= self.chunk_size {
                fitting.push(part);
                continue;
            }

            // Part too big: flush what fits, recurse with finer separators
            chunks.extend(self.merge(&fitting, separator));
            fitting.clear();
            if remaining.is_empty() {
                chunks.push(part.to_string());
            } else {
                chunks.extend(self.split_recursive(part, remaining));
            }
        }
        chunks.extend(self.merge(&fitting, separator));

        chunks
    }

    /// Join small pieces into passages up to `chunk_size`, carrying up to
    /// `chunk_overlap` characters of the previous passage into the next.
    fn merge(&self, parts: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for part in parts {
            let len = char_len(part);
            let joiner = if window.is_empty() { 0 } else { sep_len };

            if !window.is_empty() && total + joiner + len > self.chunk_size {
                chunks.push(join(&window, separator));

                while total > self.chunk_overlap
                    || (total > 0 && total + sep_len + len > self.chunk_size)
                {
                    let Some(first) = window.pop_front() else {
                        break;
                    };
                    total -= char_len(first) + if window.is_empty() { 0 } else { sep_len };
                }
            }

            total += len + if window.is_empty() { 0 } else { sep_len };
            window.push_back(part);
        }

        if !window.is_empty() {
            chunks.push(join(&window, separator));
        }
        chunks
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn join(window: &VecDeque<&str>, separator: &str) -> String {
    window.iter().copied().collect::<Vec<_>>().join(separator)
}
