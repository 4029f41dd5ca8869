//! OpenAI speech endpoints: Whisper transcription and TTS synthesis.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::speech::audio_store::{extension_for, AudioStore};
use crate::speech::{AnswerAudio, SpeechError, Synthesizer, Transcriber, Transcription};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const TRANSCRIPTION_MODEL: &str = "whisper-1";
const TTS_MODEL: &str = "tts-1";
const TTS_VOICE: &str = "alloy";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    avg_logprob: f64,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

/// Speech-to-text and text-to-speech over the OpenAI audio API. Audio on
/// both sides is archived in the `AudioStore`.
#[derive(Clone)]
pub struct OpenAiSpeechClient {
    client: Client,
    api_key: String,
    audio: AudioStore,
}

impl OpenAiSpeechClient {
    pub fn new(api_key: String, audio: AudioStore) -> Result<Self, SpeechError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            api_key,
            audio,
        })
    }
}

/// Returns the response untouched on success, otherwise the API's error message.
async fn check_status(response: Response) -> Result<Response, SpeechError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<OpenAiError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    Err(SpeechError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Mean segment log-probability mapped onto 0–1.
fn confidence_from_segments(segments: &[WhisperSegment]) -> Option<f32> {
    if segments.is_empty() {
        return None;
    }
    let mean = segments.iter().map(|s| s.avg_logprob).sum::<f64>() / segments.len() as f64;
    Some(mean.exp().clamp(0.0, 1.0) as f32)
}

#[async_trait]
impl Transcriber for OpenAiSpeechClient {
    async fn transcribe(&self, audio: &AnswerAudio) -> Result<Transcription, SpeechError> {
        let file = Part::bytes(audio.bytes.to_vec())
            .file_name(audio.file_name.clone())
            .mime_str(&audio.content_type)?;
        let form = Form::new()
            .text("model", TRANSCRIPTION_MODEL)
            .text("response_format", "verbose_json")
            .part("file", file);

        let response = self
            .client
            .post(format!("{OPENAI_API_BASE}/audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let whisper: WhisperResponse = check_status(response).await?.json().await?;

        // The transcript is what matters; a lost recording is tolerated.
        let extension = extension_for(&audio.file_name, &audio.content_type);
        let audio_reference = match self
            .audio
            .put(audio.bytes.clone(), &extension, &audio.content_type)
            .await
        {
            Ok(key) => Some(key),
            Err(e) => {
                warn!("Answer audio not archived: {e}");
                None
            }
        };

        debug!(
            "Transcribed {} bytes into {} chars",
            audio.bytes.len(),
            whisper.text.len()
        );

        Ok(Transcription {
            text: whisper.text.trim().to_string(),
            confidence: confidence_from_segments(&whisper.segments),
            audio_reference,
        })
    }
}

#[async_trait]
impl Synthesizer for OpenAiSpeechClient {
    async fn synthesize(&self, text: &str) -> Result<Option<String>, SpeechError> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let response = self
            .client
            .post(format!("{OPENAI_API_BASE}/audio/speech"))
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest {
                model: TTS_MODEL,
                input: text,
                voice: TTS_VOICE,
                response_format: "mp3",
            })
            .send()
            .await?;
        let bytes = check_status(response).await?.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }

        let key = self.audio.put(bytes, "mp3", "audio/mpeg").await?;
        Ok(Some(key))
    }
}
