//! Generative text: screenshot transcription and quiz generation.
//!
//! The service only relays requests to an existing model through
//! `edgequake-llm`; prompts live in [`crate::prompts`]. [`TextGenerator`] is
//! the seam: [`LlmGenerator`] talks to a real provider, tests plug in fakes.
//!
//! ## Retry Strategy
//!
//! HTTP 429 / 503 from LLM APIs are transient. Exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`) with a 500 ms base and 3 retries waits
//! 500 ms → 1 s → 2 s before giving up.

pub mod quiz;

use crate::config::GenerationSettings;
use crate::error::RelayError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// One prompt, optionally with an image attached.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
    pub image: Option<ImageData>,
}

impl GenerationRequest {
    pub fn text(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: ImageData) -> Self {
        self.image = Some(image);
        self
    }
}

/// A model answer plus its token accounting.
#[derive(Debug, Clone, Default)]
pub struct Generated {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub retries: u32,
    pub duration_ms: u64,
}

/// Produces text for a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<Generated, RelayError>;

    /// Provider/model label for logs.
    fn describe(&self) -> String;
}

/// [`TextGenerator`] backed by an `edgequake-llm` provider.
pub struct LlmGenerator {
    provider: Arc<dyn LLMProvider>,
    settings: GenerationSettings,
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, settings: GenerationSettings) -> Self {
        Self { provider, settings }
    }

    /// Resolve a provider from settings and the environment.
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self, RelayError> {
        let provider = resolve_provider(settings)?;
        Ok(Self::new(provider, settings.clone()))
    }
}

#[async_trait]
impl TextGenerator for LlmGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<Generated, RelayError> {
        let start = Instant::now();
        let messages = build_messages(&request);
        let options = build_options(&self.settings);
        let timeout = Duration::from_secs(self.settings.api_timeout_secs.max(1));
        let max_retries = self.settings.max_retries;

        let mut last_err: Option<String> = None;
        for attempt in 0..=max_retries {
            if attempt > 0 {
                let backoff = self
                    .settings
                    .retry_backoff_ms
                    .saturating_mul(2u64.saturating_pow(attempt - 1));
                warn!("LLM retry {}/{} after {}ms", attempt, max_retries, backoff);
                sleep(Duration::from_millis(backoff)).await;
            }

            match tokio::time::timeout(timeout, self.provider.chat(&messages, Some(&options))).await {
                Ok(Ok(response)) => {
                    let duration = start.elapsed();
                    debug!(
                        "LLM call: {} input tokens, {} output tokens, {:?}",
                        response.prompt_tokens, response.completion_tokens, duration
                    );
                    return Ok(Generated {
                        text: response.content,
                        input_tokens: response.prompt_tokens,
                        output_tokens: response.completion_tokens,
                        retries: attempt,
                        duration_ms: duration.as_millis() as u64,
                    });
                }
                Ok(Err(e)) => {
                    warn!("LLM attempt {} failed: {}", attempt + 1, e);
                    last_err = Some(e.to_string());
                }
                Err(_) => {
                    warn!("LLM attempt {} timed out after {:?}", attempt + 1, timeout);
                    last_err = Some(format!("timed out after {}s", timeout.as_secs()));
                }
            }
        }

        Err(RelayError::GenerationFailed {
            retries: max_retries,
            detail: last_err.unwrap_or_else(|| "Unknown error".to_string()),
        })
    }

    fn describe(&self) -> String {
        format!(
            "{}/{}",
            self.settings.provider_name.as_deref().unwrap_or("auto"),
            self.settings.model.as_deref().unwrap_or("default")
        )
    }
}

/// System message, then the user prompt (with the image when present).
fn build_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    let user = match &request.image {
        Some(image) => ChatMessage::user_with_images(request.prompt.as_str(), vec![image.clone()]),
        None => ChatMessage::user(request.prompt.as_str()),
    };
    vec![ChatMessage::system(request.system.as_str()), user]
}

fn build_options(settings: &GenerationSettings) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(settings.temperature),
        max_tokens: Some(settings.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, RelayError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        RelayError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Named provider + model** (`settings.provider_name`)
/// 2. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`)
/// 3. **OpenAI** when `OPENAI_API_KEY` is set
/// 4. **Full auto-detection** (`ProviderFactory::from_env`)
pub fn resolve_provider(settings: &GenerationSettings) -> Result<Arc<dyn LLMProvider>, RelayError> {
    if let Some(ref name) = settings.provider_name {
        let model = settings.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = settings.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| RelayError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;
    info!("LLM provider auto-detected from environment");

    Ok(llm_provider)
}
