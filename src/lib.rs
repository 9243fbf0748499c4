use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corpus file not found: {}", .0.display())]
    CorpusMissing(PathBuf),

    #[error("Corpus error: {0}")]
    Corpus(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error("Invalid vector: {0}")]
    InvalidVector(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod advice;
pub mod builder;
pub mod commands;
pub mod config;
pub mod corpus;
pub mod embeddings;
pub mod engine;
pub mod index;
pub mod openai;
pub mod retriever;
pub mod synthesizer;

#[cfg(test)]
mod testing;
