//! Answer generators.

use anyhow::Result;
use hybrag_core::config::LlmConfig;
use tracing::debug;

/// Everything a generator may use to produce an answer.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    pub query: &'a str,
    pub context: &'a str,
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Produces an answer from a prepared request.
pub trait Generator: Send + Sync {
    /// Model or generator name for stats and logs.
    fn name(&self) -> &str;

    /// Whether this generator calls a language model.
    fn is_llm(&self) -> bool {
        true
    }

    /// # Errors
    ///
    /// Implementation-specific (network, quota, malformed response).
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String>;
}

/// Echoes the retrieved context; used when no model is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackGenerator;

impl Generator for FallbackGenerator {
    fn name(&self) -> &str {
        "context-echo"
    }

    fn is_llm(&self) -> bool {
        false
    }

    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        Ok(fallback_answer(request.query, request.context))
    }
}

/// Answer returned when no language model is configured.
#[must_use]
pub fn fallback_answer(query: &str, context: &str) -> String {
    format!(
        "{}\n\n[Note: no language model API key configured. This is a fallback response.]",
        echo_preamble(query, context)
    )
}

/// Answer returned when the configured model fails.
#[must_use]
pub fn error_answer(query: &str, context: &str, error: &anyhow::Error) -> String {
    format!(
        "{}\n\n[Error generating LLM response: {error:#}]",
        echo_preamble(query, context)
    )
}

fn echo_preamble(query: &str, context: &str) -> String {
    format!("Based on the retrieved documents, here's what I found about '{query}':\n\n{context}")
}

/// Pick a generator for `config`: the chat model when a key is available and
/// the `openai` feature is built, the context echo otherwise.
#[must_use]
pub fn generator_from_config(config: &LlmConfig, api_key: Option<String>) -> Box<dyn Generator> {
    let Some(api_key) = api_key else {
        debug!("no LLM API key configured, answers echo the retrieved context");
        return Box::new(FallbackGenerator);
    };
    remote_generator(config, api_key)
}

#[cfg(feature = "openai")]
fn remote_generator(config: &LlmConfig, api_key: String) -> Box<dyn Generator> {
    Box::new(openai::OpenAiChatGenerator::new(api_key, config.model.clone()))
}

#[cfg(not(feature = "openai"))]
fn remote_generator(config: &LlmConfig, _api_key: String) -> Box<dyn Generator> {
    tracing::warn!(
        model = %config.model,
        "LLM API key set but built without the `openai` feature; answers echo the retrieved context"
    );
    Box::new(FallbackGenerator)
}

#[cfg(feature = "openai")]
pub mod openai {
    //! OpenAI-compatible chat completions over HTTP.

    use anyhow::{Context, Result};
    use serde::Deserialize;
    use std::time::Duration;

    use super::{GenerationRequest, Generator};

    const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    #[derive(Debug, Deserialize)]
    struct ChatResponse {
        choices: Vec<ChatChoice>,
    }

    #[derive(Debug, Deserialize)]
    struct ChatChoice {
        message: ChatMessage,
    }

    #[derive(Debug, Deserialize)]
    struct ChatMessage {
        #[serde(default)]
        content: Option<String>,
    }

    pub struct OpenAiChatGenerator {
        agent: ureq::Agent,
        api_key: String,
        model: String,
        base_url: String,
    }

    impl OpenAiChatGenerator {
        #[must_use]
        pub fn new(api_key: String, model: String) -> Self {
            Self {
                agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
                api_key,
                model,
                base_url: std::env::var("HYBRAG_OPENAI_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            }
        }
    }

    impl Generator for OpenAiChatGenerator {
        fn name(&self) -> &str {
            &self.model
        }

        fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
            let body = serde_json::json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": request.system_prompt },
                    { "role": "user", "content": request.user_prompt },
                ],
                "temperature": request.temperature,
                "max_tokens": request.max_tokens,
            });

            let response = self
                .agent
                .post(&format!("{}/chat/completions", self.base_url))
                .set("Authorization", &format!("Bearer {}", self.api_key))
                .set("Content-Type", "application/json")
                .send_string(&body.to_string())
                .context("chat completion request failed")?
                .into_string()
                .context("read chat completion response")?;

            let parsed: ChatResponse =
                serde_json::from_str(&response).context("decode chat completion response")?;
            let content = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .context("chat completion returned no content")?;
            Ok(content.trim().to_string())
        }
    }
}
