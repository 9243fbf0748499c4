
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::retriever::ScoredChunk;
use crate::{RagError, Result};

/// Returned when retrieval yields nothing at all; no generation call is made
pub const NO_INFORMATION_MESSAGE: &str =
    "Je n'ai pas trouvé d'information spécifique sur ce sujet dans ma base de connaissances.";

/// Returned for any upstream failure while answering
pub const TECHNICAL_DIFFICULTY_MESSAGE: &str = "Je rencontre un problème technique pour accéder à ma base de connaissances. Pouvez-vous reformuler votre question ?";

pub const SYSTEM_PROMPT: &str = "Tu es l'expert technique d'un spécialiste de l'entretien de piscines. \
Réponds uniquement à partir du contexte fourni, sans rien inventer. \
Sois bref et concret : 2 à 3 conseils pratiques au maximum, pas de longs paragraphes. \
Si le contexte ne contient pas l'information, dis-le en une phrase.";

/// One constrained generation call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A remote text-generation API
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisSettings {
    pub score_threshold: f32,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl SynthesisSettings {
    #[inline]
    pub fn from_config(config: &Config) -> Self {
        Self {
            score_threshold: config.retrieval.score_threshold,
            temperature: config.generation.temperature,
            max_tokens: config.generation.max_tokens,
            request_timeout: config.openai.timeout(),
        }
    }
}

/// Chunks scoring strictly above `threshold`, in ranked order.
///
/// When none clears the threshold the top-ranked chunk is kept anyway, so a non-empty
/// result always yields some context.
#[inline]
pub fn select_context(results: &[ScoredChunk], threshold: f32) -> Vec<&ScoredChunk> {
    let mut selected = Vec::with_capacity(results.len());
    for result in results {
        if result.score > threshold {
            info!(
                "Chunk {} kept (score: {:.3})",
                result.chunk.index, result.score
            );
            selected.push(result);
        } else {
            info!(
                "Chunk {} rejected (score: {:.3}, threshold {:.3})",
                result.chunk.index, result.score, threshold
            );
        }
    }

    if selected.is_empty() {
        if let Some(best) = results.first() {
            warn!(
                "No chunk above threshold {:.3}, falling back to best match (score: {:.3})",
                threshold, best.score
            );
            selected.push(best);
        }
    }

    selected
}

/// Selected chunk texts joined by a blank line
#[inline]
pub fn build_context(selected: &[&ScoredChunk]) -> String {
    selected
        .iter()
        .map(|result| result.chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[inline]
pub fn build_user_prompt(context: &str, question: &str) -> String {
    format!(
        "Contexte technique :\n{}\n\nQuestion client : {}\n\nRéponse courte et pratique :",
        context, question
    )
}

pub struct AnswerSynthesizer {
    generator: Arc<dyn CompletionProvider>,
    settings: SynthesisSettings,
}

impl AnswerSynthesizer {
    #[inline]
    pub fn new(generator: Arc<dyn CompletionProvider>, settings: SynthesisSettings) -> Self {
        Self {
            generator,
            settings,
        }
    }

    #[inline]
    pub fn settings(&self) -> &SynthesisSettings {
        &self.settings
    }

    /// The generation request for `question` grounded in `results`, or `None` when
    /// there is nothing to ground it in
    #[inline]
    pub fn prepare(&self, question: &str, results: &[ScoredChunk]) -> Option<CompletionRequest> {
        let selected = select_context(results, self.settings.score_threshold);
        if selected.is_empty() {
            return None;
        }

        let context = build_context(&selected);
        debug!("Context built from {} chunks", selected.len());

        Some(CompletionRequest {
            system_prompt: SYSTEM_PROMPT.to_string(),
            user_prompt: build_user_prompt(&context, question),
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        })
    }

    /// Generate the answer text; `Ok(None)` when `results` is empty
    #[inline]
    pub async fn compose(&self, question: &str, results: &[ScoredChunk]) -> Result<Option<String>> {
        let Some(request) = self.prepare(question, results) else {
            return Ok(None);
        };

        let answer = tokio::time::timeout(
            self.settings.request_timeout,
            self.generator.complete(&request),
        )
        .await
        .map_err(|_| {
            RagError::Upstream(format!(
                "generation timed out after {:?}",
                self.settings.request_timeout
            ))
        })??;

        info!("Generated answer: {}", answer);
        Ok(Some(answer))
    }

    /// Like [`compose`](Self::compose) but always yields a presentable string
    #[inline]
    pub async fn answer(&self, question: &str, results: &[ScoredChunk]) -> String {
        match self.compose(question, results).await {
            Ok(Some(answer)) if !answer.trim().is_empty() => answer,
            Ok(Some(_)) => {
                warn!("Generation returned a blank answer for '{}'", question);
                TECHNICAL_DIFFICULTY_MESSAGE.to_string()
            }
            Ok(None) => {
                warn!("No chunk retrieved for '{}'", question);
                NO_INFORMATION_MESSAGE.to_string()
            }
            Err(e) => {
                warn!("Answer generation failed for '{}': {}", question, e);
                TECHNICAL_DIFFICULTY_MESSAGE.to_string()
            }
        }
    }
}
