//! In-process stand-ins for the upstream APIs, used by unit tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::embeddings::EmbeddingProvider;
use crate::synthesizer::{CompletionProvider, CompletionRequest};
use crate::{RagError, Result};

/// Embeds text as a bag of keywords: axis `i` counts occurrences of `keywords[i]`,
/// plus a constant last axis so no text maps to the zero vector.
pub struct KeywordEmbedder {
    keywords: Vec<&'static str>,
    calls: AtomicUsize,
    texts_embedded: AtomicUsize,
    failing: bool,
    delay: Duration,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&'static str]) -> Self {
        Self {
            keywords: keywords.to_vec(),
            calls: AtomicUsize::new(0),
            texts_embedded: AtomicUsize::new(0),
            failing: false,
            delay: Duration::ZERO,
        }
    }

    pub fn failing(keywords: &[&'static str]) -> Self {
        Self {
            failing: true,
            ..Self::new(keywords)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn dimension(&self) -> usize {
        self.keywords.len() + 1
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = self
            .keywords
            .iter()
            .map(|keyword| lower.matches(keyword).count() as f32)
            .collect();
        vector.push(0.1);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing {
            return Err(RagError::Upstream("embedding API unavailable".to_string()));
        }
        self.texts_embedded.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|text| self.vector_for(text)).collect())
    }
}

/// Echoes the context section of the user prompt, or fails on demand
pub struct EchoGenerator {
    requests: Mutex<Vec<CompletionRequest>>,
    reply: Option<String>,
    failing: bool,
}

impl EchoGenerator {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            reply: None,
            failing: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new()
        }
    }

    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            ..Self::new()
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl CompletionProvider for EchoGenerator {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.requests
            .lock()
            .expect("lock poisoned")
            .push(request.clone());
        if self.failing {
            return Err(RagError::Upstream("generation API unavailable".to_string()));
        }
        if let Some(reply) = &self.reply {
            return Ok(reply.clone());
        }

        let context = request
            .user_prompt
            .split("\n\nQuestion client")
            .next()
            .unwrap_or_default()
            .trim_start_matches("Contexte technique :\n");
        Ok(format!("D'après la base : {}", context))
    }
}
