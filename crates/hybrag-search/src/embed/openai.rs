//! OpenAI-compatible embeddings over HTTP.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::time::Duration;

use super::Embedder;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

pub struct OpenAiEmbedder {
    agent: ureq::Agent,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
}

impl OpenAiEmbedder {
    #[must_use]
    pub fn new(api_key: String, model: String, dimension: usize) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build();
        Self {
            agent,
            api_key,
            model,
            dimension,
            base_url: std::env::var("HYBRAG_OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        }
    }

    fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({ "model": self.model, "input": texts });
        let response = self
            .agent
            .post(&format!("{}/embeddings", self.base_url))
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .set("Content-Type", "application/json")
            .send_string(&body.to_string())
            .context("embeddings request failed")?
            .into_string()
            .context("read embeddings response")?;

        let mut parsed: EmbeddingResponse =
            serde_json::from_str(&response).context("decode embeddings response")?;
        if parsed.data.len() != texts.len() {
            bail!(
                "embeddings response has {} vectors for {} inputs",
                parsed.data.len(),
                texts.len()
            );
        }
        parsed.data.sort_by_key(|datum| datum.index);

        let mut out = Vec::with_capacity(parsed.data.len());
        for datum in parsed.data {
            if datum.embedding.len() != self.dimension {
                bail!(
                    "model {} returned dimension {}, configured {}",
                    self.model,
                    datum.embedding.len(),
                    self.dimension
                );
            }
            out.push(datum.embedding);
        }
        Ok(out)
    }
}

impl Embedder for OpenAiEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.request(&[text])?
            .pop()
            .context("embeddings response was empty")
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts)
    }
}
