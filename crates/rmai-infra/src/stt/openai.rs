//! OpenAI-compatible `/audio/transcriptions` backend.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use rmai_core::transcript::SttBackend;
use rmai_types::config::TranscriptionConfig;
use rmai_types::error::TranscriptionError;
use rmai_types::transcript::TranscriptSegment;

use super::wav::encode_wav;

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<ApiSegment>,
}

#[derive(Debug, Deserialize)]
struct ApiSegment {
    start: f64,
    end: f64,
    text: String,
}

pub struct OpenAiSttBackend {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    model: String,
    language: Option<String>,
}

impl OpenAiSttBackend {
    pub fn new(config: &TranscriptionConfig, api_key: SecretString) -> Result<Self, TranscriptionError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.stt_timeout_secs.max(1)))
            .build()
            .map_err(|e| TranscriptionError::Stt(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            base_url: config.stt_base_url.trim_end_matches('/').to_string(),
            model: config.stt_model.clone(),
            language: config.language.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url)
    }
}

/// Segments from a verbose_json body.
///
/// Falls back to a single segment spanning `duration` when the server only
/// returned plain text.
pub(crate) fn into_segments(body: &str, duration: f64) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
    let parsed: VerboseTranscription = serde_json::from_str(body)
        .map_err(|e| TranscriptionError::Stt(format!("unexpected response: {e}")))?;

    if parsed.segments.is_empty() {
        let text = parsed.text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        return Ok(vec![TranscriptSegment::new(0.0, duration, text)]);
    }

    Ok(parsed
        .segments
        .into_iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| TranscriptSegment::new(s.start, s.end, s.text.trim()))
        .collect())
}

impl SttBackend for OpenAiSttBackend {
    #[tracing::instrument(name = "stt_transcribe", skip(self, samples), fields(samples = samples.len()))]
    async fn transcribe(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<Vec<TranscriptSegment>, TranscriptionError> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }
        let wav = encode_wav(samples, sample_rate)?;
        let duration = samples.len() as f64 / sample_rate.max(1) as f64;

        let file = Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscriptionError::Stt(e.to_string()))?;
        let mut form = Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json")
            .text("temperature", "0");
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::Stt(format!("request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranscriptionError::Stt(format!("body read failed: {e}")))?;
        if !status.is_success() {
            return Err(TranscriptionError::Stt(format!("HTTP {status}: {body}")));
        }
        into_segments(&body, duration)
    }
}
