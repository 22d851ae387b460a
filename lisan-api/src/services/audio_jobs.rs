//! Lesson audio job queue
//!
//! Lesson content above the synchronous TTS limit is narrated in the
//! background. A handler stores the job id on the lesson as
//! `audio_operation_id` with status `PROCESSING`, then enqueues the job. A
//! single worker task chunks the text, synthesizes each chunk, stitches the
//! MP3s, uploads the result and hands the outcome to an [`AudioJobSink`].

use super::{
    delete_audio_best_effort, split_text, AudioStitcher, MediaStore, ServiceError, ServiceResult,
    Services, SpeechSynthesizer, VoiceLanguage,
};
use crate::db::lessons;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Pending jobs before `enqueue` waits for the worker
const QUEUE_CAPACITY: usize = 100;

/// Narrate one lesson
#[derive(Debug, Clone)]
pub struct AudioJob {
    pub id: Uuid,
    pub lesson_id: i64,
    pub text: String,
}

impl AudioJob {
    pub fn new(lesson_id: i64, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            lesson_id,
            text: text.into(),
        }
    }
}

/// Result of a finished job: the uploaded URL or the failure message
#[derive(Debug, Clone)]
pub struct AudioJobOutcome {
    pub job_id: Uuid,
    pub lesson_id: i64,
    pub result: Result<String, String>,
}

/// Receives every finished job
#[async_trait]
pub trait AudioJobSink: Send + Sync {
    async fn complete(&self, outcome: AudioJobOutcome);
}

struct AudioWorker {
    speech: Arc<dyn SpeechSynthesizer>,
    stitcher: Arc<dyn AudioStitcher>,
    media: Arc<dyn MediaStore>,
    chunk_bytes: usize,
}

impl AudioWorker {
    async fn render(&self, text: &str) -> ServiceResult<String> {
        let pieces = split_text(text, self.chunk_bytes);

        let mut chunks = Vec::with_capacity(pieces.len());
        for piece in &pieces {
            chunks.push(self.speech.synthesize(piece, VoiceLanguage::Arabic).await?);
        }

        let audio = self.stitcher.stitch(chunks).await?;
        self.media.upload_audio(audio).await
    }
}

/// Handle for submitting jobs to the background worker
#[derive(Clone)]
pub struct LessonAudioQueue {
    sender: mpsc::Sender<AudioJob>,
}

impl LessonAudioQueue {
    /// Spawn the worker task and return the submitting handle
    ///
    /// The worker exits once every handle has been dropped.
    pub fn start(services: &Services, sink: Arc<dyn AudioJobSink>, chunk_bytes: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<AudioJob>(QUEUE_CAPACITY);
        let worker = AudioWorker {
            speech: services.speech.clone(),
            stitcher: services.stitcher.clone(),
            media: services.media.clone(),
            chunk_bytes,
        };

        tokio::spawn(async move {
            info!("Lesson audio worker started");

            while let Some(job) = receiver.recv().await {
                info!(
                    job_id = %job.id,
                    lesson_id = job.lesson_id,
                    bytes = job.text.len(),
                    "Processing lesson audio job"
                );

                let result = worker.render(&job.text).await.map_err(|e| e.to_string());
                if let Err(e) = &result {
                    warn!(job_id = %job.id, lesson_id = job.lesson_id, error = %e, "Lesson audio job failed");
                }

                sink.complete(AudioJobOutcome {
                    job_id: job.id,
                    lesson_id: job.lesson_id,
                    result,
                })
                .await;
            }

            info!("Lesson audio worker stopped");
        });

        Self { sender }
    }

    /// Submit a job, returning its id
    pub async fn enqueue(&self, job: AudioJob) -> ServiceResult<Uuid> {
        let id = job.id;
        self.sender
            .send(job)
            .await
            .map_err(|_| ServiceError::QueueClosed)?;
        Ok(id)
    }
}

/// Writes job outcomes to the `lessons` table
///
/// The update only applies while the lesson still carries the job's id. A
/// stale job's upload is deleted instead of overwriting newer audio.
pub struct LessonAudioRecorder {
    db: SqlitePool,
    media: Arc<dyn MediaStore>,
}

impl LessonAudioRecorder {
    pub fn new(db: SqlitePool, media: Arc<dyn MediaStore>) -> Self {
        Self { db, media }
    }
}

#[async_trait]
impl AudioJobSink for LessonAudioRecorder {
    async fn complete(&self, outcome: AudioJobOutcome) {
        let operation_id = outcome.job_id.to_string();
        let voice_path = outcome.result.as_ref().ok().map(String::as_str);

        match lessons::finish_audio_job(&self.db, outcome.lesson_id, &operation_id, voice_path).await {
            Ok(true) => info!(
                lesson_id = outcome.lesson_id,
                job_id = %outcome.job_id,
                succeeded = voice_path.is_some(),
                "Recorded lesson audio job outcome"
            ),
            Ok(false) => {
                info!(
                    lesson_id = outcome.lesson_id,
                    job_id = %outcome.job_id,
                    "Lesson no longer waits for this job, discarding result"
                );
                delete_audio_best_effort(self.media.as_ref(), voice_path).await;
            }
            Err(e) => warn!(
                lesson_id = outcome.lesson_id,
                job_id = %outcome.job_id,
                error = %e,
                "Failed to record lesson audio job outcome"
            ),
        }
    }
}
