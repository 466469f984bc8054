//! Anthropic Messages API client

use super::classify::classify_finish_reason;
use super::client::{Failure, FailureKind, InferenceClient, InferenceOutcome, ResponseScreen};
use super::http::send_once;
use super::provider::{http_client, ProviderSettings};
use crate::encoding::EncodedImage;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Claude models over the Messages API
pub struct AnthropicClient {
    settings: ProviderSettings,
    api_key: String,
    client: Client,
    screen: ResponseScreen,
}

impl AnthropicClient {
    pub fn new(settings: ProviderSettings, api_key: String, screen: ResponseScreen) -> crate::Result<Self> {
        let client = http_client(&settings)?;
        Ok(Self {
            settings,
            api_key,
            client,
            screen,
        })
    }

    /// Request body: image blocks first, prompt text last
    pub fn build_request_body(
        &self,
        prompt: &str,
        images: &[EncodedImage],
        temperature: f64,
    ) -> serde_json::Value {
        let mut content: Vec<serde_json::Value> = images
            .iter()
            .map(|image| {
                serde_json::json!({
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": image.media_type(),
                        "data": image.to_base64()
                    }
                })
            })
            .collect();
        content.push(serde_json::json!({ "type": "text", "text": prompt }));

        serde_json::json!({
            "model": self.settings.model,
            "max_tokens": self.settings.max_tokens,
            "temperature": temperature,
            "messages": [{
                "role": "user",
                "content": content
            }]
        })
    }
}

/// Concatenated text blocks of a Messages API response
pub(crate) fn extract_text(body: &str) -> Result<String, Failure> {
    let response: MessagesResponse = serde_json::from_str(body).map_err(|e| {
        Failure::new(FailureKind::Unknown, format!("unexpected response shape: {}", e))
    })?;

    if let Some(kind) = response.stop_reason.as_deref().and_then(classify_finish_reason) {
        return Err(Failure::new(kind, "stop_reason: refusal"));
    }

    Ok(response
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .map(|block| block.text.as_str())
        .collect::<Vec<_>>()
        .join(""))
}

#[async_trait]
impl InferenceClient for AnthropicClient {
    fn name(&self) -> &str {
        &self.settings.label
    }

    async fn invoke(&self, prompt: &str, images: &[EncodedImage], temperature: f64) -> InferenceOutcome {
        let body = self.build_request_body(prompt, images, temperature);

        let timed = match send_once(
            &self.client,
            |c| {
                c.post(&self.settings.endpoint)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .header("content-type", "application/json")
                    .json(&body)
            },
            "Anthropic Messages",
        )
        .await
        {
            Ok(t) => t,
            Err(failure) => return failure.into(),
        };

        match extract_text(&timed.body) {
            Ok(text) => self.screen.check(text, timed.elapsed),
            Err(failure) => failure.into(),
        }
    }
}
