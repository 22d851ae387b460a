//! Arabic OCR through the OpenAI chat completions vision API

use super::{ServiceError, ServiceResult, TextRecognizer};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_TOKENS: u32 = 300;
const OCR_PROMPT: &str = "You are an expert OCR engine for Arabic script. Extract all Arabic text \
from this image. Only return the extracted text, nothing else. If there is no Arabic text, \
return an empty string.";

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

pub struct OpenAiRecognizer {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiRecognizer {
    pub fn new(api_key: String, model: String) -> ServiceResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            model,
        })
    }
}

/// Chat completion request carrying the prompt and the image as a data URL
fn build_request(model: &str, image: &[u8], content_type: &str) -> Value {
    let mime = if content_type.starts_with("image/") {
        content_type
    } else {
        "image/png"
    };
    let image_url = format!("data:{};base64,{}", mime, STANDARD.encode(image));

    json!({
        "model": model,
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": OCR_PROMPT },
                { "type": "image_url", "image_url": { "url": image_url } },
            ],
        }],
        "max_tokens": MAX_TOKENS,
    })
}

#[async_trait]
impl TextRecognizer for OpenAiRecognizer {
    async fn recognize_arabic(&self, image: &[u8], content_type: &str) -> ServiceResult<String> {
        let request = build_request(&self.model, image, content_type);

        let response = self
            .http_client
            .post(COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api(status.as_u16(), error_text));
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;

        Ok(body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}
