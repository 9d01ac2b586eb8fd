//! Gemini-style advisory client returning a trade decision.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, info};

use super::types::{Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, Part};
use super::{DecisionOracle, RetryPolicy};
use crate::models::Decision;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_HEADER: &str = "x-goog-api-key";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the advisory prompt around a market summary.
pub fn build_prompt(summary: &str) -> String {
    format!(
        "Analyze the following cryptocurrency chart data and provide a trading recommendation for a scalping strategy.\n\
         Your options are: BUY, SELL, SKIP, or CLOSE_ALL.\n\
         Return only the decision as a single word.\n\n\
         Chart Data:\n{}\n",
        summary
    )
}

/// Client for the generative-language `generateContent` endpoint.
pub struct AdvisorClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl AdvisorClient {
    /// Create a new advisor client.
    pub fn new(api_key: String, model: Option<String>, retry: RetryPolicy) -> Result<Self> {
        Self::with_base_url(GEMINI_API_BASE.to_string(), api_key, model, retry)
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(
        base_url: String,
        api_key: String,
        model: Option<String>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            retry,
        })
    }

    /// Send one prompt and return the raw text answer.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: 0.2,
                max_output_tokens: 16,
            }),
        };

        debug!(model = %self.model, "Requesting trade decision");

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to reach advisory service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Advisory request failed: {} - {}", status, body);
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse advisory response")?;

        debug!(finish_reason = ?parsed.finish_reason(), "Advisory response received");
        parsed.text().context("Advisory response contained no text")
    }

    /// Ask for a decision, retrying transport errors and invalid answers.
    pub async fn request_decision(&self, summary: &str) -> Result<Decision> {
        let prompt = build_prompt(summary);
        let prompt = prompt.as_str();

        self.retry
            .run("trade decision", move || async move {
                let text = self.generate(prompt).await?;
                text.parse::<Decision>()
            })
            .await
    }
}

#[async_trait]
impl DecisionOracle for AdvisorClient {
    async fn decide(&self, summary: &str) -> Decision {
        match self.request_decision(summary).await {
            Ok(decision) => {
                info!(decision = %decision, "Advisor decision received");
                decision
            }
            Err(e) => {
                error!(error = %e, "No valid decision from advisor, defaulting to SKIP");
                Decision::Skip
            }
        }
    }
}
