//! AI gateway client for receipt item extraction
//!
//! Sends the uploaded receipt image to an OpenAI-compatible chat
//! completions endpoint and returns the raw assistant text. The caller
//! runs the tolerant normalizer over the result; this module never
//! interprets the item payload itself.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use ssb_common::config::GatewayConfig;

use super::ExtractionError;

/// System prompt fixing the output contract for the vision model
const SYSTEM_PROMPT: &str = "You are a bill/receipt parser. Extract all items, their prices, and quantities from the bill image. Return a JSON array of items with format: [{name: string, price: number, quantity: number}]. Only return valid JSON, no other text.";

/// Per-request user instruction accompanying the image
const USER_PROMPT: &str = "Extract all items from this bill/receipt with their names, prices, and quantities. Return only a JSON array of items.";

/// Client for the AI gateway chat completions endpoint
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl GatewayClient {
    /// Create a new gateway client from resolved configuration
    pub fn new(config: &GatewayConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        }
    }

    /// Whether an API key has been configured
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Request item extraction for an image, returning the raw model text
    ///
    /// `image_url` is a data URL carrying the uploaded image inline.
    /// Gateway-level outcomes map to typed errors: 429 means rate
    /// limited, 402 means out of credits, any other non-2xx is a generic
    /// gateway failure. A 2xx whose body is not a chat completion at all
    /// is a parse error; a completion with no content yields the empty
    /// array text so the normalizer produces zero items.
    pub async fn extract_items(&self, image_url: &str) -> Result<String, ExtractionError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            ExtractionError::Config("gateway API key is not configured".to_string())
        })?;

        debug!("Requesting item extraction from {} ({})", self.endpoint, self.model);

        let body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": SYSTEM_PROMPT,
                },
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": USER_PROMPT },
                        { "type": "image_url", "image_url": { "url": image_url } },
                    ],
                },
            ],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExtractionError::Network("gateway request timed out".to_string())
                } else {
                    ExtractionError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            warn!("Gateway returned {}: {}", status, body_text);
            return Err(match status.as_u16() {
                429 => ExtractionError::RateLimited,
                402 => ExtractionError::QuotaExceeded,
                code => ExtractionError::Api(code),
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ExtractionError::Parse(format!("invalid gateway response: {}", e)))?;

        Ok(completion.into_content())
    }
}

/// Chat completions response (the subset this service reads)
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl ChatCompletionResponse {
    /// First choice's message content, or the empty-array text
    fn into_content(self) -> String {
        self.choices
            .and_then(|mut choices| {
                if choices.is_empty() {
                    None
                } else {
                    choices.remove(0).message
                }
            })
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty())
            .unwrap_or_else(|| "[]".to_string())
    }
}
