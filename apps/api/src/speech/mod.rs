//! Speech collaborators: answer transcription and question synthesis.
//!
//! The engine only sees the `Transcriber` and `Synthesizer` traits. Audio
//! bytes never live in the database; they go to object storage and the
//! object key is recorded as the turn's `audio_reference`.

use async_trait::async_trait;
use bytes::Bytes;
#[cfg(test)]
use mockall::automock;
use serde::Serialize;
use thiserror::Error;

use crate::errors::AppError;

pub mod audio_store;
pub mod openai;

pub use audio_store::AudioStore;
pub use openai::OpenAiSpeechClient;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Speech API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Audio storage error: {0}")]
    Storage(String),
}

impl From<SpeechError> for AppError {
    fn from(error: SpeechError) -> Self {
        match error {
            SpeechError::Storage(msg) => AppError::Storage(msg),
            other => AppError::Speech(other.to_string()),
        }
    }
}

/// A recorded answer as uploaded by the candidate.
#[derive(Debug, Clone)]
pub struct AnswerAudio {
    pub bytes: Bytes,
    pub file_name: String,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcription {
    pub text: String,
    /// 0.0–1.0 when the service reports it.
    pub confidence: Option<f32>,
    /// Storage key of the original recording, if it was archived.
    pub audio_reference: Option<String>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &AnswerAudio) -> Result<Transcription, SpeechError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Renders `text` to audio and returns its storage key. `None` means the
    /// synthesizer produced nothing to store.
    async fn synthesize(&self, text: &str) -> Result<Option<String>, SpeechError>;
}
