//! Engine handle
//!
//! Owns the knowledge base state and wires the builder, retriever and synthesizer
//! together. One engine is constructed at startup and shared as `Arc<Engine>`; the
//! knowledge base is built lazily on first access and at most once per transition.


use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::advice::{AdviceRequest, PoolProfile};
use crate::builder::{ArtifactLayout, BuildOutcome, IndexBuilder, KnowledgeBase};
use crate::config::Config;
use crate::embeddings::{EmbeddingGateway, EmbeddingProvider, GatewaySettings};
use crate::openai::OpenAiClient;
use crate::retriever::{Retriever, ScoredChunk};
use crate::synthesizer::{
    AnswerSynthesizer, CompletionProvider, SynthesisSettings, TECHNICAL_DIFFICULTY_MESSAGE,
};
use crate::{RagError, Result};

/// Observable state of the knowledge base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    NotBuilt,
    Loaded { chunks: usize },
    Degraded,
}

impl fmt::Display for EngineStatus {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotBuilt => write!(f, "not built"),
            Self::Loaded { chunks } => write!(f, "loaded ({} chunks)", chunks),
            Self::Degraded => write!(f, "degraded (no knowledge base)"),
        }
    }
}

enum EngineState {
    NotBuilt,
    /// An empty knowledge base here means degraded mode
    Ready(Arc<KnowledgeBase>),
}

impl EngineState {
    fn status(&self) -> EngineStatus {
        match self {
            Self::NotBuilt => EngineStatus::NotBuilt,
            Self::Ready(knowledge) if knowledge.is_empty() => EngineStatus::Degraded,
            Self::Ready(knowledge) => EngineStatus::Loaded {
                chunks: knowledge.len(),
            },
        }
    }
}

pub struct Engine {
    builder: IndexBuilder,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    top_k: usize,
    dimension: usize,
    state: Mutex<EngineState>,
}

impl Engine {
    /// Engine backed by the OpenAI-compatible API named in `config`.
    ///
    /// A missing API key or an unusable endpoint is a configuration error.
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        config
            .validate()
            .map_err(|e| RagError::Config(e.to_string()))?;
        let client = Arc::new(
            OpenAiClient::new(&config.openai).map_err(|e| RagError::Config(format!("{:#}", e)))?,
        );

        let embedder: Arc<dyn EmbeddingProvider> = Arc::<OpenAiClient>::clone(&client);
        let generator: Arc<dyn CompletionProvider> = client;
        Ok(Self::new(config, embedder, generator))
    }

    #[inline]
    pub fn new(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn CompletionProvider>,
    ) -> Self {
        let gateway = EmbeddingGateway::new(embedder, GatewaySettings::from_config(&config.openai));
        Self {
            builder: IndexBuilder::new(ArtifactLayout::from_config(config), gateway.clone()),
            retriever: Retriever::new(gateway),
            synthesizer: AnswerSynthesizer::new(generator, SynthesisSettings::from_config(config)),
            top_k: config.retrieval.top_k,
            dimension: config.embedding_dimension(),
            state: Mutex::new(EngineState::NotBuilt),
        }
    }

    /// Load or build the knowledge base if that has not happened yet
    #[inline]
    pub async fn initialize(&self) -> EngineStatus {
        let mut state = self.state.lock().await;
        self.ensure_built(&mut state).await;
        state.status()
    }

    /// Current state, without triggering a build
    #[inline]
    pub async fn status(&self) -> EngineStatus {
        self.state.lock().await.status()
    }

    /// Rebuild from the corpus source, replacing the persisted artifacts.
    ///
    /// Without a corpus source nothing is touched: the current state and the artifacts
    /// on disk are kept and `CorpusMissing` is returned.
    #[inline]
    pub async fn rebuild(&self) -> Result<EngineStatus> {
        let mut state = self.state.lock().await;
        let layout = self.builder.layout();
        if !layout.corpus_present() {
            warn!(
                "Refusing to rebuild without a corpus at {}",
                layout.corpus_source.display()
            );
            return Err(RagError::CorpusMissing(layout.corpus_source.clone()));
        }

        match self.builder.rebuild().await {
            BuildOutcome::Failed(e) => {
                *state = EngineState::NotBuilt;
                Err(e)
            }
            outcome => {
                self.apply(&mut state, outcome);
                Ok(state.status())
            }
        }
    }

    /// Top-`k` chunks for `query`, best first.
    ///
    /// Never fails: a missing knowledge base or an upstream error yields no results.
    #[inline]
    pub async fn search(&self, query: &str, k: usize) -> Vec<ScoredChunk> {
        let knowledge = self.knowledge().await;
        self.search_in(knowledge.as_deref(), query, k).await
    }

    /// Answer a customer question; always returns a presentable string
    #[inline]
    pub async fn answer(&self, question: &str) -> String {
        self.answer_for(question, &PoolProfile::default()).await
    }

    /// Answer with the customer's pool profile folded into the question
    #[inline]
    pub async fn answer_for(&self, question: &str, profile: &PoolProfile) -> String {
        let knowledge = self.knowledge().await;
        self.respond(knowledge.as_deref(), &profile.enrich(question))
            .await
    }

    /// Like [`answer_for`](Self::answer_for), giving up after `deadline`.
    ///
    /// The deadline covers retrieval and generation only. A pending first build always
    /// runs to completion, so an impatient caller cannot leave the engine unbuilt.
    #[inline]
    pub async fn answer_within(
        &self,
        question: &str,
        profile: &PoolProfile,
        deadline: Duration,
    ) -> String {
        let knowledge = self.knowledge().await;
        let question = profile.enrich(question);

        match tokio::time::timeout(deadline, self.respond(knowledge.as_deref(), &question)).await
        {
            Ok(answer) => answer,
            Err(_) => {
                warn!("Answer for '{}' exceeded {:?}", question, deadline);
                TECHNICAL_DIFFICULTY_MESSAGE.to_string()
            }
        }
    }

    #[inline]
    pub async fn advise(&self, request: &AdviceRequest, profile: &PoolProfile) -> String {
        let question = request.question(profile);
        info!("Handling {} request", request);

        let answer = match request {
            // the profile is already part of the maintenance question
            AdviceRequest::Maintenance => self.answer(&question).await,
            _ => self.answer_for(&question, profile).await,
        };
        request.finish(answer)
    }

    async fn knowledge(&self) -> Option<Arc<KnowledgeBase>> {
        let mut state = self.state.lock().await;
        self.ensure_built(&mut state).await;
        match &*state {
            EngineState::Ready(knowledge) => Some(Arc::clone(knowledge)),
            EngineState::NotBuilt => None,
        }
    }

    async fn search_in(
        &self,
        knowledge: Option<&KnowledgeBase>,
        query: &str,
        k: usize,
    ) -> Vec<ScoredChunk> {
        let Some(knowledge) = knowledge else {
            warn!("Knowledge base unavailable, no results for '{}'", query);
            return Vec::new();
        };

        match self.retriever.search(knowledge, query, k).await {
            Ok(results) => results,
            Err(e) => {
                error!("Search failed for '{}': {}", query, e);
                Vec::new()
            }
        }
    }

    async fn respond(&self, knowledge: Option<&KnowledgeBase>, question: &str) -> String {
        info!("Answering '{}'", question);
        let results = self.search_in(knowledge, question, self.top_k).await;
        self.synthesizer.answer(question, &results).await
    }

    async fn ensure_built(&self, state: &mut EngineState) {
        let needs_build = match state {
            EngineState::NotBuilt => true,
            EngineState::Ready(knowledge) => {
                knowledge.is_empty() && self.builder.layout().corpus_present()
            }
        };
        if !needs_build {
            return;
        }

        match self.builder.ensure().await {
            BuildOutcome::Failed(e) => {
                error!("Knowledge base unavailable, will retry on next access: {}", e);
            }
            outcome => self.apply(state, outcome),
        }
    }

    fn apply(&self, state: &mut EngineState, outcome: BuildOutcome) {
        match outcome {
            BuildOutcome::Loaded(knowledge) => {
                info!("Engine ready with {} chunks", knowledge.len());
                *state = EngineState::Ready(Arc::new(knowledge));
            }
            BuildOutcome::Degraded => {
                warn!("Engine running in degraded mode");
                *state = EngineState::Ready(Arc::new(KnowledgeBase::empty(self.dimension)));
            }
            BuildOutcome::Failed(e) => {
                error!("Build failed: {}", e);
            }
        }
    }
}
