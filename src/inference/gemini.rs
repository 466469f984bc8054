//! Gemini generateContent client

use super::classify::classify_finish_reason;
use super::client::{Failure, FailureKind, InferenceClient, InferenceOutcome, ResponseScreen};
use super::http::send_once;
use super::provider::{http_client, ProviderSettings};
use crate::encoding::EncodedImage;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

pub struct GeminiClient {
    settings: ProviderSettings,
    api_key: String,
    client: Client,
    screen: ResponseScreen,
}

impl GeminiClient {
    pub fn new(settings: ProviderSettings, api_key: String, screen: ResponseScreen) -> crate::Result<Self> {
        let client = http_client(&settings)?;
        Ok(Self {
            settings,
            api_key,
            client,
            screen,
        })
    }

    /// `{endpoint}/{model}:generateContent`
    pub fn url(&self) -> String {
        let model = self.settings.model.trim_start_matches("models/");
        format!(
            "{}/{}:generateContent",
            self.settings.endpoint.trim_end_matches('/'),
            model
        )
    }

    pub fn build_request_body(
        &self,
        prompt: &str,
        images: &[EncodedImage],
        temperature: f64,
    ) -> serde_json::Value {
        let mut parts = vec![serde_json::json!({ "text": prompt })];
        parts.extend(images.iter().map(|image| {
            serde_json::json!({
                "inline_data": {
                    "mime_type": image.media_type(),
                    "data": image.to_base64()
                }
            })
        }));

        serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": parts
            }],
            "generationConfig": {
                "temperature": temperature,
                "maxOutputTokens": self.settings.max_tokens
            }
        })
    }
}

pub(crate) fn extract_text(body: &str) -> Result<String, Failure> {
    let response: GenerateResponse = serde_json::from_str(body).map_err(|e| {
        Failure::new(FailureKind::Unknown, format!("unexpected response shape: {}", e))
    })?;

    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(Failure::new(
            FailureKind::ContentRejected,
            format!("prompt blocked: {}", reason),
        ));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| Failure::new(FailureKind::DegenerateResponse, "response has no candidates"))?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if let Some(kind) = classify_finish_reason(reason) {
            return Err(Failure::new(kind, format!("finishReason: {}", reason)));
        }
    }

    Ok(candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default())
}

#[async_trait]
impl InferenceClient for GeminiClient {
    fn name(&self) -> &str {
        &self.settings.label
    }

    async fn invoke(&self, prompt: &str, images: &[EncodedImage], temperature: f64) -> InferenceOutcome {
        let body = self.build_request_body(prompt, images, temperature);
        let url = self.url();

        let timed = match send_once(
            &self.client,
            |c| c.post(&url).header("x-goog-api-key", &self.api_key).json(&body),
            "Gemini generateContent",
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
