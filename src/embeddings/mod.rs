// Embeddings module
// Batching, pacing and validation in front of a remote embedding API


use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::OpenAiConfig;
use crate::index::normalize;
use crate::{RagError, Result};

/// A remote embedding API: one request per call, output aligned with input
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Settings for [`EmbeddingGateway`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewaySettings {
    pub dimension: usize,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub request_timeout: Duration,
}

impl GatewaySettings {
    #[inline]
    pub fn from_config(config: &OpenAiConfig) -> Self {
        Self {
            dimension: config.embedding_dimension as usize,
            batch_size: config.batch_size as usize,
            batch_delay: config.batch_delay(),
            request_timeout: config.timeout(),
        }
    }
}

/// Wraps an [`EmbeddingProvider`] with batching, pacing between batches, a per-call
/// timeout, dimension checks and L2 normalization.
#[derive(Clone)]
pub struct EmbeddingGateway {
    provider: Arc<dyn EmbeddingProvider>,
    settings: GatewaySettings,
}

impl EmbeddingGateway {
    #[inline]
    pub fn new(provider: Arc<dyn EmbeddingProvider>, settings: GatewaySettings) -> Self {
        Self {
            provider,
            settings: GatewaySettings {
                batch_size: settings.batch_size.max(1),
                ..settings
            },
        }
    }

    #[inline]
    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Embed `texts`, returning unit vectors in input order.
    ///
    /// Batches of at most `batch_size` are sent sequentially with `batch_delay` between
    /// consecutive batches. Any failed batch fails the whole call.
    #[inline]
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let total_batches = texts.len().div_ceil(self.settings.batch_size);
        let mut vectors = Vec::with_capacity(texts.len());

        for (batch_number, batch) in texts.chunks(self.settings.batch_size).enumerate() {
            if batch_number > 0 && !self.settings.batch_delay.is_zero() {
                tokio::time::sleep(self.settings.batch_delay).await;
            }

            let batch_vectors = self.embed_one_batch(batch).await.map_err(|e| {
                RagError::Upstream(format!(
                    "batch {}/{} ({} texts): {}",
                    batch_number + 1,
                    total_batches,
                    batch.len(),
                    e
                ))
            })?;
            vectors.extend(batch_vectors);

            if total_batches > 1 {
                info!("Embeddings created: {}/{}", vectors.len(), texts.len());
            }
        }

        Ok(vectors)
    }

    /// Embed a single query text, unbatched and undelayed
    #[inline]
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_one_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::Upstream("empty embedding response".to_string()))
    }

    async fn embed_one_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        debug!("Embedding batch of {} texts", batch.len());

        let mut vectors = tokio::time::timeout(
            self.settings.request_timeout,
            self.provider.embed_batch(batch),
        )
        .await
        .map_err(|_| {
            RagError::Upstream(format!(
                "embedding request timed out after {:?}",
                self.settings.request_timeout
            ))
        })??;

        if vectors.len() != batch.len() {
            return Err(RagError::Upstream(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                vectors.len()
            )));
        }

        for vector in &mut vectors {
            if vector.len() != self.settings.dimension {
                return Err(RagError::Upstream(format!(
                    "embedding has dimension {}, expected {}",
                    vector.len(),
                    self.settings.dimension
                )));
            }
            normalize(vector).map_err(|e| RagError::Upstream(e.to_string()))?;
        }

        Ok(vectors)
    }
}
