//! Character-window chunking with overlap.
//!
//! Windows are measured in `char`s so CJK corpora chunk the same way as
//! Latin ones. A window prefers to end right after a paragraph break or a
//! sentence terminator found in its back half; otherwise it is cut hard.
use crate::config::ChunkingSettings;
use crate::error::{Error, Result};
use crate::traits::Chunker;

const BOUNDARIES: &[char] = &['\n', '。', '！', '？', '.', '!', '?', '；', ';'];

#[derive(Debug, Clone, Default)]
pub struct WindowChunker {
    config: ChunkingSettings,
}

impl WindowChunker {
    pub fn new(config: ChunkingSettings) -> Result<Self> {
        if config.chunk_size == 0 || config.chunk_overlap >= config.chunk_size {
            return Err(Error::Configuration(format!(
                "invalid chunk window: size={} overlap={}",
                config.chunk_size, config.chunk_overlap
            )));
        }
        Ok(Self { config })
    }

    fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let mut start = 0usize;
        while start < len {
            let hard_end = (start + size).min(len);
            let end = if hard_end < len {
                Self::soft_break(&chars[start..hard_end]).map_or(hard_end, |b| start + b)
            } else {
                hard_end
            };
            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                chunks.push(piece.to_string());
            }
            if end >= len {
                break;
            }
            let next = end.saturating_sub(overlap);
            start = if next > start { next } else { end };
        }
        chunks
    }

    /// Offset just past the last boundary in the back half of `window`.
    fn soft_break(window: &[char]) -> Option<usize> {
        let half = window.len() / 2;
        window
            .iter()
            .enumerate()
            .skip(half)
            .filter(|(_, c)| BOUNDARIES.contains(c))
            .map(|(i, _)| i + 1)
            .last()
    }
}

impl Chunker for WindowChunker {
    fn chunk(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.split(text))
    }
}
