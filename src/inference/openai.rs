//! OpenAI Chat Completions client (GPT-4V / GPT-4o)

use super::classify::classify_finish_reason;
use super::client::{Failure, FailureKind, InferenceClient, InferenceOutcome, ResponseScreen};
use super::http::send_once;
use super::provider::{http_client, ProviderSettings};
use crate::encoding::EncodedImage;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

pub struct OpenAiClient {
    settings: ProviderSettings,
    api_key: String,
    client: Client,
    screen: ResponseScreen,
}

impl OpenAiClient {
    pub fn new(settings: ProviderSettings, api_key: String, screen: ResponseScreen) -> crate::Result<Self> {
        let client = http_client(&settings)?;
        Ok(Self {
            settings,
            api_key,
            client,
            screen,
        })
    }

    /// Request body: prompt text first, then one `image_url` part per image
    pub fn build_request_body(
        &self,
        prompt: &str,
        images: &[EncodedImage],
        temperature: f64,
    ) -> serde_json::Value {
        let mut content = vec![serde_json::json!({ "type": "text", "text": prompt })];
        content.extend(images.iter().map(|image| {
            serde_json::json!({
                "type": "image_url",
                "image_url": { "url": image.to_data_url() }
            })
        }));

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

pub(crate) fn extract_text(body: &str) -> Result<String, Failure> {
    let response: ChatResponse = serde_json::from_str(body).map_err(|e| {
        Failure::new(FailureKind::Unknown, format!("unexpected response shape: {}", e))
    })?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| Failure::new(FailureKind::DegenerateResponse, "response has no choices"))?;

    if let Some(refusal) = choice.message.refusal.filter(|r| !r.trim().is_empty()) {
        return Err(Failure::new(FailureKind::ContentRejected, refusal));
    }
    if let Some(kind) = choice.finish_reason.as_deref().and_then(classify_finish_reason) {
        return Err(Failure::new(kind, "finish_reason: content_filter"));
    }

    Ok(choice.message.content.unwrap_or_default())
}

#[async_trait]
impl InferenceClient for OpenAiClient {
    fn name(&self) -> &str {
        &self.settings.label
    }

    async fn invoke(&self, prompt: &str, images: &[EncodedImage], temperature: f64) -> InferenceOutcome {
        let body = self.build_request_body(prompt, images, temperature);

        let timed = match send_once(
            &self.client,
            |c| c.post(&self.settings.endpoint).bearer_auth(&self.api_key).json(&body),
            "OpenAI chat completion",
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::ImageFormat;
    use crate::inference::provider::ProvidersConfig;

    #[test]
    fn test_build_request_body_uses_data_urls() {
        let client = OpenAiClient::new(
            ProvidersConfig::default().openai,
            "sk-test".to_string(),
            ResponseScreen::default(),
        )
        .unwrap();
        let image = EncodedImage {
            bytes: vec![1, 2, 3],
            format: ImageFormat::Jpeg,
            width: 300,
            height: 300,
        };

        let body = client.build_request_body("Describe", &[image.clone(), image], 0.5);
        let content = body["messages"][0]["content"].as_array().unwrap();
        assert_eq!(content.len(), 3);
        assert_eq!(content[0]["text"], "Describe");
        assert_eq!(content[1]["image_url"]["url"], "data:image/jpeg;base64,AQID");
        assert_eq!(body["temperature"], 0.5);
    }

    #[test]
    fn test_extract_text_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"answer\":\"4\"}"},"finish_reason":"stop"}]}"#;
        assert_eq!(extract_text(body).unwrap(), r#"{"answer":"4"}"#);
    }

    #[test]
    fn test_extract_text_content_filter() {
        let body = r#"{"choices":[{"message":{"content":null},"finish_reason":"content_filter"}]}"#;
        assert_eq!(extract_text(body).unwrap_err().kind, FailureKind::ContentRejected);
    }

    #[test]
    fn test_extract_text_refusal_field() {
        let body = r#"{"choices":[{"message":{"content":null,"refusal":"I can't help with that."},"finish_reason":"stop"}]}"#;
        assert_eq!(extract_text(body).unwrap_err().kind, FailureKind::ContentRejected);
    }

    #[test]
    fn test_extract_text_no_choices_is_degenerate() {
        assert_eq!(
            extract_text(r#"{"choices":[]}"#).unwrap_err().kind,
            FailureKind::DegenerateResponse
        );
    }
}
