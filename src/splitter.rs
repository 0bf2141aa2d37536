use anyhow::{bail, Result};
use text_splitter::{ChunkConfig, TextSplitter};

/// Chunk sizes are counted in characters, not bytes or tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

impl ChunkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk_size must be greater than zero");
        }
        if self.chunk_overlap >= self.chunk_size {
            bail!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        Ok(())
    }
}

/// Splits document text into overlapping chunks.
///
/// Line breaks are the preferred split points; a line longer than `chunk_size`
/// is broken at sentence, then word, then character boundaries. Chunks are
/// trimmed of surrounding whitespace.
pub struct Chunker {
    splitter: TextSplitter<text_splitter::Characters>,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        let chunk_config = ChunkConfig::new(config.chunk_size)
            .with_overlap(config.chunk_overlap)?
            .with_trim(true);
        Ok(Self {
            splitter: TextSplitter::new(chunk_config),
        })
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.splitter.chunks(text).map(|s| s.to_string()).collect()
    }
}
