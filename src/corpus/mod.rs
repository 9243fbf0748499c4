
use std::path::Path;

use tracing::{debug, info};

use crate::{RagError, Result};

/// Name of the column holding chunk text, in both the corpus source and the chunk table
pub const CONTENT_COLUMN: &str = "content";

/// One retrievable unit of knowledge-base text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the corpus; also the chunk's position in the vector index
    pub index: usize,
    pub content: String,
}

impl Chunk {
    #[inline]
    pub fn new(index: usize, content: impl Into<String>) -> Self {
        Self {
            index,
            content: content.into(),
        }
    }

    /// Short single-line excerpt for log lines
    #[inline]
    pub fn preview(&self, max_chars: usize) -> String {
        let flat = self.content.split_whitespace().collect::<Vec<_>>().join(" ");
        if flat.chars().count() <= max_chars {
            flat
        } else {
            let cut: String = flat.chars().take(max_chars).collect();
            format!("{}...", cut)
        }
    }
}

/// Load the ordered chunk sequence from a CSV file with a `content` column.
///
/// Blank cells are skipped; accepted rows get consecutive positions from 0.
#[inline]
pub fn load(path: &Path) -> Result<Vec<Chunk>> {
    if !path.exists() {
        return Err(RagError::CorpusMissing(path.to_path_buf()));
    }

    debug!("Loading corpus from {}", path.display());

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| {
            RagError::Corpus(format!("Failed to open {}: {}", path.display(), e))
        })?;

    let headers = reader
        .headers()
        .map_err(|e| RagError::Corpus(format!("Failed to read CSV header: {}", e)))?
        .clone();
    let content_idx = headers
        .iter()
        .position(|h| h.trim() == CONTENT_COLUMN)
        .ok_or_else(|| {
            RagError::Corpus(format!(
                "{} has no '{}' column",
                path.display(),
                CONTENT_COLUMN
            ))
        })?;

    let mut chunks = Vec::new();
    let mut skipped = 0_usize;
    for (row_num, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| RagError::Corpus(format!("Failed to read CSV row {}: {}", row_num + 1, e)))?;

        match record.get(content_idx) {
            Some(content) if !content.trim().is_empty() => {
                chunks.push(Chunk::new(chunks.len(), content));
            }
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!("Skipped {} blank corpus rows", skipped);
    }
    info!("Loaded {} chunks from {}", chunks.len(), path.display());

    Ok(chunks)
}

/// Write chunks as a single-column CSV table, row order = position
#[inline]
pub fn write_table(path: &Path, chunks: &[Chunk]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| {
        RagError::Corpus(format!("Failed to create {}: {}", path.display(), e))
    })?;

    writer
        .write_record([CONTENT_COLUMN])
        .map_err(|e| RagError::Corpus(format!("Failed to write CSV header: {}", e)))?;
    for chunk in chunks {
        writer
            .write_record([chunk.content.as_str()])
            .map_err(|e| RagError::Corpus(format!("Failed to write chunk {}: {}", chunk.index, e)))?;
    }
    writer.flush()?;

    debug!("Wrote {} chunks to {}", chunks.len(), path.display());
    Ok(())
}
