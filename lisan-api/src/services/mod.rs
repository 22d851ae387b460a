//! External collaborators
//!
//! Each provider sits behind a trait so handlers and the audio job queue
//! never depend on a concrete HTTP client, and tests substitute fakes.

pub mod audio_jobs;
pub mod media_store;
pub mod ocr;
pub mod stitcher;
pub mod tts;

pub use audio_jobs::{AudioJob, AudioJobOutcome, AudioJobSink, LessonAudioQueue, LessonAudioRecorder};
pub use media_store::CloudinaryStore;
pub use ocr::OpenAiRecognizer;
pub use stitcher::FfmpegStitcher;
pub use tts::{split_text, GoogleTts};

use async_trait::async_trait;
use lisan_common::config::TomlConfig;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// External service errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ffmpeg failed: {0}")]
    Ffmpeg(String),

    #[error("Audio job queue is closed")]
    QueueClosed,
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Voice used for synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceLanguage {
    Arabic,
    Indonesian,
}

impl VoiceLanguage {
    pub fn code(&self) -> &'static str {
        match self {
            VoiceLanguage::Arabic => "ar-XA",
            VoiceLanguage::Indonesian => "id-ID",
        }
    }
}

/// Text-to-speech provider returning MP3 bytes
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language: VoiceLanguage) -> ServiceResult<Vec<u8>>;
}

/// Public object storage for generated audio
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Upload MP3 bytes, returning the public URL
    async fn upload_audio(&self, audio: Vec<u8>) -> ServiceResult<String>;

    /// Remove a previously uploaded file by its public URL
    async fn delete_audio(&self, url: &str) -> ServiceResult<()>;
}

/// Arabic OCR
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize_arabic(&self, image: &[u8], content_type: &str) -> ServiceResult<String>;
}

/// Concatenates MP3 chunks into one file
#[async_trait]
pub trait AudioStitcher: Send + Sync {
    async fn stitch(&self, chunks: Vec<Vec<u8>>) -> ServiceResult<Vec<u8>>;
}

/// Stand-in for a provider whose credentials are absent
///
/// Every call fails with [`ServiceError::NotConfigured`], so the service
/// still starts and only the affected routes fail with a 500.
#[derive(Debug, Clone, Copy)]
pub struct Unconfigured(pub &'static str);

#[async_trait]
impl SpeechSynthesizer for Unconfigured {
    async fn synthesize(&self, _text: &str, _language: VoiceLanguage) -> ServiceResult<Vec<u8>> {
        Err(ServiceError::NotConfigured(self.0))
    }
}

#[async_trait]
impl MediaStore for Unconfigured {
    async fn upload_audio(&self, _audio: Vec<u8>) -> ServiceResult<String> {
        Err(ServiceError::NotConfigured(self.0))
    }

    async fn delete_audio(&self, _url: &str) -> ServiceResult<()> {
        Err(ServiceError::NotConfigured(self.0))
    }
}

#[async_trait]
impl TextRecognizer for Unconfigured {
    async fn recognize_arabic(&self, _image: &[u8], _content_type: &str) -> ServiceResult<String> {
        Err(ServiceError::NotConfigured(self.0))
    }
}

/// The set of collaborators injected into [`crate::AppState`]
#[derive(Clone)]
pub struct Services {
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub media: Arc<dyn MediaStore>,
    pub ocr: Arc<dyn TextRecognizer>,
    pub stitcher: Arc<dyn AudioStitcher>,
}

impl Services {
    /// Real providers for every configured credential set; the rest are
    /// [`Unconfigured`]
    pub fn from_config(config: &TomlConfig) -> ServiceResult<Self> {
        let speech: Arc<dyn SpeechSynthesizer> = match &config.tts.api_key {
            Some(key) => Arc::new(GoogleTts::new(key.clone(), config.tts.endpoint.clone())?),
            None => {
                warn!("Text-to-speech API key not configured");
                Arc::new(Unconfigured("text-to-speech"))
            }
        };

        let storage = &config.storage;
        let media: Arc<dyn MediaStore> = match (&storage.cloud_name, &storage.api_key, &storage.api_secret) {
            (Some(cloud), Some(key), Some(secret)) => {
                Arc::new(CloudinaryStore::new(cloud.clone(), key.clone(), secret.clone())?)
            }
            _ => {
                warn!("Media storage credentials not configured");
                Arc::new(Unconfigured("media storage"))
            }
        };

        let ocr: Arc<dyn TextRecognizer> = match &config.ocr.api_key {
            Some(key) => Arc::new(OpenAiRecognizer::new(key.clone(), config.ocr.model.clone())?),
            None => {
                warn!("OCR API key not configured");
                Arc::new(Unconfigured("OCR"))
            }
        };

        Ok(Self {
            speech,
            media,
            ocr,
            stitcher: Arc::new(FfmpegStitcher::new(config.audio.ffmpeg_path.clone())),
        })
    }
}

/// Synthesize `text` and upload the result, returning its public URL
pub async fn synthesize_and_upload(
    speech: &dyn SpeechSynthesizer,
    media: &dyn MediaStore,
    text: &str,
    language: VoiceLanguage,
) -> ServiceResult<String> {
    let audio = speech.synthesize(text, language).await?;
    let url = media.upload_audio(audio).await?;
    info!(language = language.code(), url = %url, "Generated audio");
    Ok(url)
}

/// Delete an uploaded file, logging instead of failing
pub async fn delete_audio_best_effort(media: &dyn MediaStore, url: Option<&str>) {
    let Some(url) = url.filter(|u| !u.is_empty()) else {
        return;
    };

    match media.delete_audio(url).await {
        Ok(()) => info!(url = %url, "Deleted audio"),
        Err(e) => warn!(url = %url, error = %e, "Failed to delete audio"),
    }
}
