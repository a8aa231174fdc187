//! Vision API client for image analysis
//!
//! Talks to an OpenAI-compatible chat completions endpoint (Groq by default)
//! with a single user turn holding the prompt text and an embedded image

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::EncodedImage;
use crate::config::GROQ_BASE_URL;
use crate::pipeline::ImageAnalyzer;
use crate::{Error, Result};

/// Vision client for image analysis
pub struct VisionClient {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
}

/// Chat completion request
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

/// A message in the request
#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

/// Content part (text or image)
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ContentPart<'a> {
    #[serde(rename = "text")]
    Text { text: &'a str },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl VisionClient {
    /// Create a new vision client
    ///
    /// A missing key is only reported when a request is made.
    #[must_use]
    pub fn new(client: reqwest::Client, api_key: Option<SecretString>) -> Self {
        Self {
            client,
            api_key,
            base_url: GROQ_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different API base URL
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Ask the model about an image
    ///
    /// # Arguments
    ///
    /// * `prompt` - Text part of the user message
    /// * `model` - Model identifier
    /// * `image` - Encoded image embedded as a data URI
    ///
    /// # Errors
    ///
    /// Returns error if the key is missing, the request fails, or the
    /// response carries no completion text
    pub async fn analyze(&self, prompt: &str, model: &str, image: &EncodedImage) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::Config("GROQ_API_KEY not set".to_string()))?;

        let request = ChatCompletionRequest {
            model,
            messages: vec![Message {
                role: "user",
                content: vec![
                    ContentPart::Text { text: prompt },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.data_uri(),
                        },
                    },
                ],
            }],
        };

        tracing::debug!(
            model,
            mime_type = image.mime_type,
            prompt_chars = prompt.len(),
            "sending vision request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Vision(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "vision API error");
            return Err(Error::Vision(format!("API error {status}: {body}")));
        }

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Vision(format!("Parse error: {e}")))?;

        let reply = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Vision("Empty response from vision API".to_string()))?;

        tracing::debug!(reply = %reply, "image analyzed");
        Ok(reply)
    }
}

#[async_trait]
impl ImageAnalyzer for VisionClient {
    async fn analyze(&self, prompt: &str, model: &str, image: &EncodedImage) -> Result<String> {
        Self::analyze(self, prompt, model, image).await
    }
}
