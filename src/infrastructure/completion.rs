//! Blocking HTTP client for a Messages-style text-completion API.
//!
//! This is the only place that talks to the generative service. Retries on
//! rate limits, server errors and transport errors with exponential backoff.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::CompletionSettings;
use crate::infrastructure::prompts::PromptCatalog;
use crate::infrastructure::traits::{CompletionError, PromptName, TextCompletion};

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl MessagesResponse {
    /// Text of the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// [`TextCompletion`] backed by a Messages endpoint.
pub struct MessagesCompletion {
    client: Client,
    settings: CompletionSettings,
    api_key: String,
    prompts: PromptCatalog,
}

impl MessagesCompletion {
    /// Reads the API key from the environment variable named in `settings`.
    pub fn new(settings: CompletionSettings, prompts: PromptCatalog) -> Result<Self, CompletionError> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| CompletionError::MissingApiKey(settings.api_key_env.clone()))?;
        Self::with_api_key(settings, prompts, api_key)
    }

    pub fn with_api_key(
        settings: CompletionSettings,
        prompts: PromptCatalog,
        api_key: String,
    ) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            settings,
            api_key,
            prompts,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/messages", self.settings.base_url.trim_end_matches('/'))
    }

    /// Whole-tree rewrites produce long responses and get the longer timeout.
    pub fn timeout_for(&self, prompt: PromptName) -> Duration {
        match prompt {
            PromptName::TaxonomyRefine => Duration::from_secs(self.settings.refine_timeout_secs),
            _ => Duration::from_secs(self.settings.timeout_secs),
        }
    }

    fn send(&self, body: &MessagesRequest<'_>, timeout: Duration) -> Result<String, CompletionError> {
        let attempts = self.settings.max_retries.saturating_add(1);
        let mut last_error: Option<CompletionError> = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                warn!(
                    "completion attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                std::thread::sleep(delay);
            }

            let response = self
                .client
                .post(self.endpoint())
                .timeout(timeout)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", &self.settings.api_version)
                .header("content-type", "application/json")
                .json(body)
                .send();

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(CompletionError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().unwrap_or_default();
                warn!("completion API returned {}: {}", status, body);
                last_error = Some(CompletionError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().unwrap_or_default();
                let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(CompletionError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let parsed: MessagesResponse = serde_json::from_str(&response.text()?)?;
            if let Some(usage) = &parsed.usage {
                debug!(
                    "completion succeeded: input_tokens={}, output_tokens={}",
                    usage.input_tokens, usage.output_tokens
                );
            }
            return parsed
                .text()
                .map(str::to_string)
                .ok_or(CompletionError::EmptyContent);
        }

        Err(CompletionError::RetriesExhausted {
            attempts,
            last: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt made".to_string()),
        })
    }
}

impl TextCompletion for MessagesCompletion {
    #[instrument(level = "debug", skip(self, text, auxiliary), fields(model = %self.settings.model))]
    fn complete(
        &self,
        prompt: PromptName,
        text: &str,
        auxiliary: Option<&str>,
    ) -> Result<String, CompletionError> {
        let rendered = self.prompts.render(prompt, text, auxiliary);
        debug!("'{}' prompt: {} bytes", prompt, rendered.len());

        let body = MessagesRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            messages: vec![Message {
                role: "user",
                content: &rendered,
            }],
        };
        let result = self.send(&body, self.timeout_for(prompt))?;
        debug!("'{}' response: {} bytes", prompt, result.len());
        Ok(result)
    }
}

/// Delay before retry number `attempt` (1-based): 1s, 2s, 4s, ...
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(1000 * (1u64 << (attempt.saturating_sub(1)).min(6)))
}
