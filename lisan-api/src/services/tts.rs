//! Google Cloud Text-to-Speech client
//!
//! Uses the REST `text:synthesize` endpoint with an API key. Requests carry
//! a NEUTRAL voice and MP3 encoding; the response audio is base64.

use super::{ServiceError, ServiceResult, SpeechSynthesizer, VoiceLanguage};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const TTS_ENDPOINT: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";
const USER_AGENT: &str = concat!("lisan-api/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    ssml_gender: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

/// Google TTS client
pub struct GoogleTts {
    http_client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl GoogleTts {
    pub fn new(api_key: String, endpoint: Option<String>) -> ServiceResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            endpoint: endpoint.unwrap_or_else(|| TTS_ENDPOINT.to_string()),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, text: &str, language: VoiceLanguage) -> ServiceResult<Vec<u8>> {
        let request = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: language.code(),
                ssml_gender: "NEUTRAL",
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
            },
        };

        tracing::debug!(
            language = language.code(),
            bytes = text.len(),
            "Requesting speech synthesis"
        );

        let response = self
            .http_client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api(status.as_u16(), error_text));
        }

        let body: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))?;

        STANDARD
            .decode(body.audio_content)
            .map_err(|e| ServiceError::Parse(format!("audioContent is not base64: {}", e)))
    }
}

/// Split `text` into pieces of at most `max_bytes` bytes
///
/// Prefers to cut after sentence punctuation or a newline, then at
/// whitespace, and only cuts inside a word when neither exists in the
/// window. Never splits a UTF-8 character.
pub fn split_text(text: &str, max_bytes: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        if rest.len() <= max_bytes {
            chunks.push(rest.to_string());
            break;
        }

        let mut window_end = max_bytes;
        while !rest.is_char_boundary(window_end) {
            window_end -= 1;
        }
        if window_end == 0 {
            // A single character wider than the limit
            window_end = rest.chars().next().map(char::len_utf8).unwrap_or(rest.len());
        }

        let window = &rest[..window_end];
        let cut = window
            .char_indices()
            .filter(|(_, c)| matches!(c, '.' | '!' | '?' | '؟' | '\n'))
            .last()
            .map(|(i, c)| i + c.len_utf8())
            .or_else(|| window.rfind(char::is_whitespace).filter(|&i| i > 0))
            .unwrap_or(window_end);

        let chunk = rest[..cut].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        rest = rest[cut..].trim_start();
    }

    chunks
}
