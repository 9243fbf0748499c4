// Index builder
// Loads persisted artifacts or builds them from the corpus in one pass


use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::corpus::{self, Chunk};
use crate::embeddings::EmbeddingGateway;
use crate::index::{VectorIndex, format};
use crate::{RagError, Result};

/// Chunks paired with the index over their embeddings; position `i` in the index is
/// `chunks[i]`
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeBase {
    chunks: Vec<Chunk>,
    index: VectorIndex,
}

impl KnowledgeBase {
    #[inline]
    pub fn new(chunks: Vec<Chunk>, index: VectorIndex) -> Result<Self> {
        if chunks.len() != index.len() {
            return Err(RagError::CorruptIndex(format!(
                "{} chunks but {} indexed vectors",
                chunks.len(),
                index.len()
            )));
        }
        Ok(Self { chunks, index })
    }

    /// The degraded-mode knowledge base: no chunks, every search is empty
    #[inline]
    pub fn empty(dimension: usize) -> Self {
        Self {
            chunks: Vec::new(),
            index: VectorIndex::new(dimension),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[inline]
    pub fn chunk(&self, position: usize) -> Option<&Chunk> {
        self.chunks.get(position)
    }

    #[inline]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

/// Result of one builder run
#[derive(Debug)]
pub enum BuildOutcome {
    /// Artifacts were loaded or freshly built
    Loaded(KnowledgeBase),
    /// No usable corpus; the engine answers with empty retrievals
    Degraded,
    /// Building was attempted and aborted; nothing was persisted
    Failed(RagError),
}

/// Where the corpus source and the three persisted artifacts live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    pub corpus_source: PathBuf,
    pub chunk_table: PathBuf,
    pub embeddings: PathBuf,
    pub index: PathBuf,
}

impl ArtifactLayout {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            corpus_source: config.corpus_path(),
            chunk_table: config.chunk_table_path(),
            embeddings: config.embeddings_path(),
            index: config.index_path(),
        }
    }

    #[inline]
    pub fn artifacts(&self) -> [&Path; 3] {
        [&self.chunk_table, &self.embeddings, &self.index]
    }

    /// True only when all three artifacts exist
    #[inline]
    pub fn artifacts_present(&self) -> bool {
        self.artifacts().iter().all(|path| path.exists())
    }

    #[inline]
    pub fn corpus_present(&self) -> bool {
        self.corpus_source.exists()
    }

    fn remove_artifacts(&self) -> Result<()> {
        for path in self.artifacts() {
            if path == self.corpus_source {
                continue;
            }
            for candidate in [path.to_path_buf(), format::temp_path(path)] {
                if candidate.exists() {
                    debug!("Removing stale artifact {}", candidate.display());
                    fs::remove_file(&candidate)?;
                }
            }
        }
        Ok(())
    }
}

pub struct IndexBuilder {
    layout: ArtifactLayout,
    gateway: EmbeddingGateway,
    dimension: usize,
}

impl IndexBuilder {
    #[inline]
    pub fn new(layout: ArtifactLayout, gateway: EmbeddingGateway) -> Self {
        let dimension = gateway.settings().dimension;
        Self {
            layout,
            gateway,
            dimension,
        }
    }

    #[inline]
    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Load persisted artifacts when all three are present and valid, else build
    #[inline]
    pub async fn ensure(&self) -> BuildOutcome {
        if self.layout.artifacts_present() {
            info!("Loading existing index artifacts");
            match self.load_existing() {
                Ok(knowledge) => {
                    info!("Index loaded: {} chunks", knowledge.len());
                    return BuildOutcome::Loaded(knowledge);
                }
                Err(e) => {
                    warn!("Persisted index is unusable, rebuilding: {}", e);
                }
            }
        } else {
            info!("Index artifacts missing, building from corpus");
        }

        self.rebuild().await
    }

    /// Build from the corpus source and persist, ignoring existing artifacts.
    ///
    /// A degraded outcome also removes the persisted artifacts.
    #[inline]
    pub async fn rebuild(&self) -> BuildOutcome {
        let chunks = match corpus::load(&self.layout.corpus_source) {
            Ok(chunks) => chunks,
            Err(RagError::CorpusMissing(path)) => {
                warn!(
                    "Corpus not found at {}, running without knowledge base",
                    path.display()
                );
                return self.degrade();
            }
            Err(e) => {
                error!("Failed to read corpus: {}", e);
                return BuildOutcome::Failed(e);
            }
        };

        if chunks.is_empty() {
            warn!(
                "Corpus at {} has no usable rows, running without knowledge base",
                self.layout.corpus_source.display()
            );
            return self.degrade();
        }

        match self.build_from_chunks(chunks).await {
            Ok(knowledge) => {
                info!("Index built and saved: {} chunks", knowledge.len());
                BuildOutcome::Loaded(knowledge)
            }
            Err(e) => {
                error!("Index build aborted: {}", e);
                BuildOutcome::Failed(e)
            }
        }
    }

    fn degrade(&self) -> BuildOutcome {
        match self.layout.remove_artifacts() {
            Ok(()) => BuildOutcome::Degraded,
            Err(e) => {
                error!("Failed to remove stale artifacts: {}", e);
                BuildOutcome::Failed(e)
            }
        }
    }

    async fn build_from_chunks(&self, chunks: Vec<Chunk>) -> Result<KnowledgeBase> {
        info!("Creating embeddings for {} chunks", chunks.len());

        self.layout.remove_artifacts()?;

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = self.gateway.embed(&texts).await?;

        let mut index = VectorIndex::new(self.dimension);
        index.add(&vectors)?;
        let knowledge = KnowledgeBase::new(chunks, index)?;

        self.persist(&knowledge)?;
        Ok(knowledge)
    }

    /// Write the three artifacts; the chunk table is renamed into place last
    fn persist(&self, knowledge: &KnowledgeBase) -> Result<()> {
        if let Some(parent) = self.layout.index.parent() {
            fs::create_dir_all(parent)?;
        }

        let embeddings = format::encode(
            format::EMBEDDINGS_MAGIC,
            self.dimension,
            knowledge.index().as_rows(),
        )?;
        format::write_atomic(&self.layout.embeddings, &embeddings)?;
        knowledge.index().persist(&self.layout.index)?;

        let table_tmp = format::temp_path(&self.layout.chunk_table);
        corpus::write_table(&table_tmp, knowledge.chunks())?;
        fs::rename(&table_tmp, &self.layout.chunk_table)?;

        debug!(
            "Persisted {}, {} and {}",
            self.layout.chunk_table.display(),
            self.layout.embeddings.display(),
            self.layout.index.display()
        );
        Ok(())
    }

    fn load_existing(&self) -> Result<KnowledgeBase> {
        let chunks = corpus::load(&self.layout.chunk_table)?;
        let index = VectorIndex::load(&self.layout.index, self.dimension)?;

        let embeddings = format::decode(format::EMBEDDINGS_MAGIC, &fs::read(&self.layout.embeddings)?)?;
        if embeddings.dimension != self.dimension || embeddings.count != chunks.len() {
            return Err(RagError::CorruptIndex(format!(
                "embedding array is {} x {}, expected {} x {}",
                embeddings.count,
                embeddings.dimension,
                chunks.len(),
                self.dimension
            )));
        }

        KnowledgeBase::new(chunks, index)
    }
}
