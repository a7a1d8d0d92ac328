//! Boundary to the external multimodal model.
//!
//! The pipeline only needs "send a prompt plus images, get text back". The
//! [`VisionModel`] trait captures that, [`RetryingModel`] adds bounded
//! exponential backoff for transient failures, and [`TokenUsage`] is the
//! per-run accounting value returned alongside stage results.

use crate::core::config::RetryPolicy;
use crate::core::errors::PipelineResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Token accounting for one or more model calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of completed calls.
    pub requests: u64,
    /// Prompt tokens.
    pub input_tokens: u64,
    /// Completion tokens.
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Usage of a single call.
    pub fn single(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            requests: 1,
            input_tokens,
            output_tokens,
        }
    }

    /// Adds the usage of one call.
    pub fn record(&mut self, input_tokens: u64, output_tokens: u64) {
        self.requests += 1;
        self.input_tokens += input_tokens;
        self.output_tokens += output_tokens;
    }

    /// Folds another accumulator into this one.
    pub fn merge(&mut self, other: &TokenUsage) {
        self.requests += other.requests;
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }

    /// Input plus output tokens.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// A prompt with attached images.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub images: Vec<PathBuf>,
    pub temperature: f32,
}

impl GenerationRequest {
    /// A request with one image and no system prompt.
    pub fn new(prompt: impl Into<String>, image: impl Into<PathBuf>, temperature: f32) -> Self {
        Self {
            prompt: prompt.into(),
            system_prompt: None,
            images: vec![image.into()],
            temperature,
        }
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

/// Text returned by the model together with its usage.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub usage: TokenUsage,
}

/// An external multimodal text generator.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Provider name used in logs and errors.
    fn provider(&self) -> &str;

    /// Sends one request and returns the generated text.
    async fn generate(&self, request: GenerationRequest) -> PipelineResult<Generation>;
}

/// Wraps a model and retries transient failures with exponential backoff.
///
/// Only errors for which [`crate::PipelineError::is_transient`] holds are
/// retried; everything else is returned on the first occurrence.
#[derive(Debug, Clone)]
pub struct RetryingModel<M> {
    inner: M,
    policy: RetryPolicy,
}

impl<M: VisionModel> RetryingModel<M> {
    pub fn new(inner: M, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }
}

#[async_trait]
impl<M: VisionModel> VisionModel for RetryingModel<M> {
    fn provider(&self) -> &str {
        self.inner.provider()
    }

    async fn generate(&self, request: GenerationRequest) -> PipelineResult<Generation> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.inner.generate(request.clone()).await {
                Ok(generation) => return Ok(generation),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.policy.backoff_for(attempt);
                    warn!(
                        provider = self.inner.provider(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient model failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{ScriptedModel, transient};
    use super::*;
    use crate::core::errors::PipelineError;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_token_usage_accumulates() {
        let mut usage = TokenUsage::default();
        usage.record(100, 20);
        usage.record(50, 5);
        let mut total = TokenUsage::single(1, 1);
        total.merge(&usage);
        assert_eq!(total.requests, 3);
        assert_eq!(total.total_tokens(), 177);
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_errors() {
        let model = ScriptedModel::new("ok")
            .then(Err(transient()))
            .then(Err(transient()));
        let retrying = RetryingModel::new(model, fast_policy(3));
        let generation = retrying
            .generate(GenerationRequest::new("hi", "a.png", 0.1))
            .await
            .unwrap();
        assert_eq!(generation.text, "ok");
        assert_eq!(retrying.inner().call_count(), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let model = ScriptedModel::new("ok")
            .then(Err(transient()))
            .then(Err(transient()));
        let retrying = RetryingModel::new(model, fast_policy(2));
        let err = retrying
            .generate(GenerationRequest::new("hi", "a.png", 0.1))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(retrying.inner().call_count(), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let model = ScriptedModel::new("ok")
            .then(Err(PipelineError::model_error("scripted", "bad request", false)));
        let retrying = RetryingModel::new(model, fast_policy(5));
        assert!(
            retrying
                .generate(GenerationRequest::new("hi", "a.png", 0.1))
                .await
                .is_err()
        );
        assert_eq!(retrying.inner().call_count(), 1);
    }
}
