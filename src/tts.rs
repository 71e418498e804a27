use crate::config::{AudioContainer, AudioEncodingSpec, TtsConfig};
use crate::consts::GOOGLE_CLOUD_PLATFORM_SCOPE;
use crate::error::SynthesisError;
use crate::google_types::{
    AudioConfig, GoogleErrorResponse, SynthesisInput, SynthesizeSpeechRequest,
    SynthesizeSpeechResponse, VoiceSelectionParams,
};
use crate::utils::{b64_decode_to_buf, GoogleAuth};

use async_trait::async_trait;
use http::StatusCode;
use std::sync::Arc;
use tracing::{debug, error};

/// Renders text as audio in a fixed output format.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// On success the payload is complete and non-empty; anything else is an error.
    async fn synthesize(
        &self,
        text: &str,
        format: &AudioEncodingSpec,
    ) -> Result<Vec<u8>, SynthesisError>;
}

pub struct GoogleTts {
    http_client: reqwest::Client,
    auth: Arc<GoogleAuth>,
    config: TtsConfig,
}

impl GoogleTts {
    pub fn new(http_client: reqwest::Client, auth: Arc<GoogleAuth>, config: TtsConfig) -> Self {
        Self {
            http_client,
            auth,
            config,
        }
    }

    fn speech_request(&self, text: &str, format: &AudioEncodingSpec) -> SynthesizeSpeechRequest {
        SynthesizeSpeechRequest {
            input: SynthesisInput {
                text: text.to_string(),
            },
            voice: VoiceSelectionParams {
                language_code: self.config.language_code.clone(),
                name: Some(self.config.voice_name.clone()),
            },
            audio_config: AudioConfig {
                audio_encoding: format.container.google_name().to_string(),
                sample_rate_hertz: Some(format.sample_rate_hertz),
            },
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(
        &self,
        text: &str,
        format: &AudioEncodingSpec,
    ) -> Result<Vec<u8>, SynthesisError> {
        let token = self
            .auth
            .bearer_token(&[GOOGLE_CLOUD_PLATFORM_SCOPE])
            .await
            .map_err(|reason| {
                error!(error=%reason, "failed to get google token for tts");
                SynthesisError::EngineCanceled { reason }
            })?;
        let url = format!(
            "{}/v1/text:synthesize",
            self.config.base_url.trim_end_matches('/')
        );
        let resp = self
            .http_client
            .post(url)
            .bearer_auth(token)
            .json(&self.speech_request(text, format))
            .send()
            .await
            .map_err(|e| {
                error!(error=%e, "failed to send request to google tts");
                SynthesisError::EngineCanceled {
                    reason: e.to_string(),
                }
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            error!(error=%e, "failed to read google tts response body");
            SynthesisError::EngineCanceled {
                reason: e.to_string(),
            }
        })?;
        if !status.is_success() {
            let e = error_from_status(status, &body);
            error!(error=%e, reason_code=e.reason_code(), "google tts refused request");
            return Err(e);
        }
        audio_from_body(&body, format)
    }
}

/// Map a failed synthesis response onto the two cancellation kinds.
pub fn error_from_status(status: StatusCode, body: &str) -> SynthesisError {
    let message = serde_json::from_str::<GoogleErrorResponse>(body)
        .map(|e| {
            let kind = e.error.status.unwrap_or_default();
            format!("{} {kind}: {}", e.error.code, e.error.message)
        })
        .unwrap_or_else(|_| format!("{status}"));
    if status == StatusCode::BAD_REQUEST {
        SynthesisError::InputRejected { reason: message }
    } else {
        SynthesisError::EngineCanceled { reason: message }
    }
}

/// Decode the audio out of a successful synthesis response and make sure it is usable.
pub fn audio_from_body(body: &str, format: &AudioEncodingSpec) -> Result<Vec<u8>, SynthesisError> {
    let resp = serde_json::from_str::<SynthesizeSpeechResponse>(body).map_err(|e| {
        error!(error=%e, "failed to deserialize google tts response");
        SynthesisError::EngineCanceled {
            reason: format!("malformed response: {e}"),
        }
    })?;
    let encoded = resp.audio_content.ok_or(SynthesisError::EmptyAudio)?;
    let mut audio = Vec::new();
    b64_decode_to_buf(&encoded, &mut audio).map_err(|e| SynthesisError::EngineCanceled {
        reason: format!("undecodable audio content: {e}"),
    })?;
    if audio.is_empty() {
        return Err(SynthesisError::EmptyAudio);
    }
    if !looks_like(format.container, &audio) {
        return Err(SynthesisError::EngineCanceled {
            reason: format!(
                "payload is not {} audio",
                format.container.google_name()
            ),
        });
    }
    debug!(bytes = audio.len(), "decoded google tts audio");
    Ok(audio)
}

fn looks_like(container: AudioContainer, audio: &[u8]) -> bool {
    match container {
        // Either an ID3 tag or an MPEG frame sync.
        AudioContainer::Mp3 => {
            audio.starts_with(b"ID3") || (audio.len() > 1 && audio[0] == 0xFF && audio[1] & 0xE0 == 0xE0)
        }
        AudioContainer::Linear16 | AudioContainer::Mulaw => audio.starts_with(b"RIFF"),
    }
}
