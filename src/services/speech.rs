use std::time::Duration as StdDuration;

use reqwest::{multipart, Client};
use serde::{Deserialize, Serialize};

use crate::config::SpeechConfig;
use crate::error::{AppError, AppResult};

/// Upstream limit on text-to-speech input, in characters.
pub const MAX_TTS_INPUT_CHARS: usize = 4096;

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TranscriptionResponse {
    pub text: String,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
}

/// Synthesized audio returned by the speech API.
#[derive(Debug)]
pub struct SynthesizedAudio {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Client for an OpenAI-compatible speech API (transcription + synthesis).
#[derive(Debug, Clone)]
pub struct SpeechService {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    stt_model: String,
    tts_model: String,
    tts_voice: String,
}

impl SpeechService {
    pub fn new(config: &SpeechConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            stt_model: config.stt_model.clone(),
            tts_model: config.tts_model.clone(),
            tts_voice: config.tts_voice.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> AppResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| AppError::NotConfigured(crate::i18n::t("not_configured.speech")))
    }

    /// Transcribe an audio recording to text.
    pub async fn transcribe(&self, audio: Vec<u8>, content_type: &str) -> AppResult<String> {
        let api_key = self.api_key()?;

        if audio.is_empty() {
            return Err(AppError::BadRequest(crate::i18n::t("bad_request.empty_body")));
        }

        let part = multipart::Part::bytes(audio)
            .file_name(format!("audio.{}", extension_for(content_type)))
            .mime_str(content_type)
            .map_err(|e| AppError::BadRequest(format!("Invalid audio content type: {}", e)))?;

        let form = multipart::Form::new()
            .text("model", self.stt_model.clone())
            .part("file", part);

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.api_url))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!("Transcription failed with {}: {}", status, error_text);
            return Err(AppError::Upstream(crate::i18n::t_with(
                "upstream.speech",
                &[("status", status.as_str())],
            )));
        }

        let body: TranscriptionResponse = response.json().await.map_err(|e| {
            AppError::Upstream(format!("Failed to parse transcription response: {}", e))
        })?;

        Ok(body.text)
    }

    /// Synthesize speech. Input beyond `MAX_TTS_INPUT_CHARS` is cut off
    /// before it is sent upstream.
    pub async fn synthesize(&self, text: &str, voice: Option<&str>) -> AppResult<SynthesizedAudio> {
        let api_key = self.api_key()?;

        if text.trim().is_empty() {
            return Err(AppError::Validation(crate::i18n::t("validation.text_empty")));
        }

        let input = truncate_tts_input(text);
        if input.len() < text.len() {
            tracing::debug!(
                "Truncated TTS input from {} to {} characters",
                text.chars().count(),
                MAX_TTS_INPUT_CHARS
            );
        }

        let request = SpeechRequest {
            model: &self.tts_model,
            input,
            voice: voice.filter(|v| !v.is_empty()).unwrap_or(self.tts_voice.as_str()),
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.api_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::warn!("Speech synthesis failed with {}: {}", status, error_text);
            return Err(AppError::Upstream(crate::i18n::t_with(
                "upstream.speech",
                &[("status", status.as_str())],
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/mpeg")
            .to_string();
        let bytes = response.bytes().await?.to_vec();

        Ok(SynthesizedAudio {
            content_type,
            bytes,
        })
    }
}

/// First `MAX_TTS_INPUT_CHARS` characters of `text` (Unicode scalar values).
pub fn truncate_tts_input(text: &str) -> &str {
    match text.char_indices().nth(MAX_TTS_INPUT_CHARS) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    match essence {
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/ogg" => "ogg",
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        _ => "webm",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    use axum::{routing::post, Json, Router};

    #[test]
    fn truncates_to_exactly_the_limit() {
        let long = "a".repeat(5000);
        assert_eq!(truncate_tts_input(&long).chars().count(), MAX_TTS_INPUT_CHARS);

        let exact = "b".repeat(MAX_TTS_INPUT_CHARS);
        assert_eq!(truncate_tts_input(&exact), exact.as_str());

        assert_eq!(truncate_tts_input("short"), "short");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let long = "ç".repeat(MAX_TTS_INPUT_CHARS + 10);
        let cut = truncate_tts_input(&long);
        assert_eq!(cut.chars().count(), MAX_TTS_INPUT_CHARS);
        assert_eq!(cut.len(), MAX_TTS_INPUT_CHARS * 2);
    }

    #[test]
    fn extension_follows_content_type() {
        assert_eq!(extension_for("audio/webm;codecs=opus"), "webm");
        assert_eq!(extension_for("audio/mpeg"), "mp3");
        assert_eq!(extension_for("audio/wav"), "wav");
    }

    fn config(api_url: String, api_key: Option<&str>) -> SpeechConfig {
        SpeechConfig {
            api_url,
            api_key: api_key.map(str::to_string),
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            timeout_seconds: 5,
        }
    }

    #[tokio::test]
    async fn missing_api_key_is_reported_as_not_configured() {
        let service = SpeechService::new(&config("http://127.0.0.1:9".to_string(), None)).unwrap();
        assert!(!service.is_configured());

        let err = service.synthesize("olá", None).await.unwrap_err();
        assert!(matches!(err, AppError::NotConfigured(_)));

        let err = service.transcribe(vec![1, 2, 3], "audio/webm").await.unwrap_err();
        assert!(matches!(err, AppError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn synthesize_sends_truncated_input_upstream() {
        let received: Arc<Mutex<Option<serde_json::Value>>> = Arc::new(Mutex::new(None));
        let sink = received.clone();

        let upstream = Router::new().route(
            "/audio/speech",
            post(move |Json(body): Json<serde_json::Value>| {
                let sink = sink.clone();
                async move {
                    *sink.lock().unwrap() = Some(body);
                    ([(http::header::CONTENT_TYPE, "audio/mpeg")], vec![0u8, 1, 2])
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, upstream).await.unwrap();
        });

        let service =
            SpeechService::new(&config(format!("http://{}", addr), Some("sk-test"))).unwrap();
        let text = "x".repeat(MAX_TTS_INPUT_CHARS + 500);
        let audio = service.synthesize(&text, Some("nova")).await.unwrap();

        assert_eq!(audio.content_type, "audio/mpeg");
        assert_eq!(audio.bytes, vec![0u8, 1, 2]);

        let body = received.lock().unwrap().clone().unwrap();
        assert_eq!(
            body["input"].as_str().unwrap().chars().count(),
            MAX_TTS_INPUT_CHARS
        );
        assert_eq!(body["voice"], "nova");
        assert_eq!(body["model"], "tts-1");
    }

    #[tokio::test]
    async fn upstream_failure_maps_to_upstream_error() {
        let upstream = Router::new().route(
            "/audio/speech",
            post(|| async { (http::StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, upstream).await.unwrap();
        });

        let service =
            SpeechService::new(&config(format!("http://{}", addr), Some("sk-test"))).unwrap();
        let err = service.synthesize("olá", None).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
    }
}
