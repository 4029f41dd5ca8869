use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::speech::SpeechError;

const KEY_PREFIX: &str = "interview-audio";

/// Object storage for question and answer audio.
#[derive(Clone)]
pub struct AudioStore {
    s3: S3Client,
    bucket: String,
}

impl AudioStore {
    pub fn new(s3: S3Client, bucket: String) -> Self {
        Self { s3, bucket }
    }

    /// Uploads `bytes` under a fresh key and returns the key.
    pub async fn put(
        &self,
        bytes: Bytes,
        extension: &str,
        content_type: &str,
    ) -> Result<String, SpeechError> {
        let key = object_key(extension);
        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| SpeechError::Storage(format!("S3 upload failed: {e}")))?;

        info!("Uploaded audio to s3://{}/{}", self.bucket, key);
        Ok(key)
    }
}

fn object_key(extension: &str) -> String {
    let extension = extension.trim_start_matches('.');
    let extension = if extension.is_empty() { "bin" } else { extension };
    format!("{KEY_PREFIX}/{}.{}", Uuid::new_v4(), extension.to_ascii_lowercase())
}

/// File extension of an uploaded recording, from its name or content type.
pub fn extension_for(file_name: &str, content_type: &str) -> String {
    if let Some((_, ext)) = file_name.rsplit_once('.') {
        if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return ext.to_ascii_lowercase();
        }
    }
    match content_type {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/webm" => "webm",
        "audio/ogg" => "ogg",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        _ => "bin",
    }
    .to_string()
}
