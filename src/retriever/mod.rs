
use tracing::{debug, info};

use crate::builder::KnowledgeBase;
use crate::corpus::Chunk;
use crate::embeddings::EmbeddingGateway;
use crate::{RagError, Result};

pub const DEFAULT_TOP_K: usize = 3;

/// A retrieved chunk with its cosine similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Embeds queries and resolves index hits back to chunks
#[derive(Clone)]
pub struct Retriever {
    gateway: EmbeddingGateway,
}

impl Retriever {
    #[inline]
    pub fn new(gateway: EmbeddingGateway) -> Self {
        Self { gateway }
    }

    /// Top-`k` chunks for `query`, best first.
    ///
    /// An empty knowledge base yields an empty result without calling upstream.
    #[inline]
    pub async fn search(
        &self,
        knowledge: &KnowledgeBase,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>> {
        if knowledge.is_empty() {
            debug!("Knowledge base is empty, skipping search for '{}'", query);
            return Ok(Vec::new());
        }

        info!("Searching knowledge base for '{}'", query);

        let query_vector = self.gateway.embed_query(query).await?;
        let hits = knowledge.index().search(&query_vector, k)?;

        let mut results = Vec::with_capacity(hits.len());
        for (rank, hit) in hits.into_iter().enumerate() {
            let chunk = knowledge.chunk(hit.position).ok_or_else(|| {
                RagError::CorruptIndex(format!(
                    "index position {} has no chunk ({} chunks)",
                    hit.position,
                    knowledge.len()
                ))
            })?;
            info!(
                "Result {} (score: {:.3}): {}",
                rank + 1,
                hit.score,
                chunk.preview(100)
            );
            results.push(ScoredChunk {
                chunk: chunk.clone(),
                score: hit.score,
            });
        }

        info!("{} chunks found for '{}'", results.len(), query);
        Ok(results)
    }
}
