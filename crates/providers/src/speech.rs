//! OpenAI audio endpoints: transcription and text-to-speech.

use crate::openai_compat::status_error;
use async_trait::async_trait;
use folio_config::SpeechConfig;
use folio_core::error::ProviderError;
use folio_core::speech::SpeechBackend;
use serde::Deserialize;
use tracing::{debug, warn};

pub struct OpenAiSpeech {
    base_url: String,
    api_key: String,
    transcription_model: String,
    speech_model: String,
    voice: String,
    client: reqwest::Client,
}

impl OpenAiSpeech {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::from_config(&SpeechConfig {
            api_key: Some(api_key.into()),
            ..SpeechConfig::default()
        })
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: config
                .api_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".into())
                .trim_end_matches('/')
                .to_string(),
            api_key: config.api_key.clone().unwrap_or_default(),
            transcription_model: config.transcription_model.clone(),
            speech_model: config.speech_model.clone(),
            voice: config.voice.clone(),
            client,
        }
    }

    fn ensure_key(&self) -> Result<(), ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured("OPENAI_API_KEY missing".into()));
        }
        Ok(())
    }
}

/// File extension the transcription endpoint expects for a MIME type.
fn extension_for(mime_type: &str) -> &'static str {
    match mime_type.split(';').next().unwrap_or("").trim() {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/ogg" => "ogg",
        "audio/mp4" | "audio/m4a" => "m4a",
        _ => "webm",
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl SpeechBackend for OpenAiSpeech {
    fn name(&self) -> &str {
        "openai"
    }

    async fn transcribe(
        &self,
        audio: Vec<u8>,
        mime_type: &str,
    ) -> std::result::Result<String, ProviderError> {
        self.ensure_key()?;
        let url = format!("{}/audio/transcriptions", self.base_url);
        let file_name = format!("audio.{}", extension_for(mime_type));

        let part = reqwest::multipart::Part::bytes(audio)
            .file_name(file_name)
            .mime_str(mime_type)
            .map_err(|e| ProviderError::ApiError {
                status_code: 400,
                message: format!("Invalid audio type '{mime_type}': {e}"),
            })?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.transcription_model.clone())
            .part("file", part);

        debug!(model = %self.transcription_model, "Sending transcription request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Transcription failed");
            return Err(status_error(status, &body));
        }

        let parsed: TranscriptionResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: status,
                message: format!("Failed to parse transcription: {e}"),
            })?;
        Ok(parsed.text)
    }

    async fn synthesize(&self, text: &str) -> std::result::Result<Vec<u8>, ProviderError> {
        self.ensure_key()?;
        let url = format!("{}/audio/speech", self.base_url);
        let body = serde_json::json!({
            "model": self.speech_model,
            "voice": self.voice,
            "input": text,
            "response_format": "mp3",
        });

        debug!(model = %self.speech_model, chars = text.chars().count(), "Sending speech request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Speech synthesis failed");
            return Err(status_error(status, &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
