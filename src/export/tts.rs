use std::time::Duration;

use serde::Serialize;

use super::ExportError;

pub const DEFAULT_TTS_URL: &str = "https://api.elevenlabs.io/v1";
pub const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";
const TTS_MODEL: &str = "eleven_multilingual_v2";

/// Text-to-speech client for narrated reports.
///
/// Without an API key the client is disabled and `synthesize` yields
/// `Ok(None)`.
pub struct TtsClient {
    base_url: String,
    voice_id: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Serialize)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
    style: f32,
    use_speaker_boost: bool,
}

impl TtsClient {
    pub fn new(
        base_url: &str,
        voice_id: &str,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, ExportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ExportError::HttpClient(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            voice_id: voice_id.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Synthesize `text` to MPEG audio bytes.
    pub fn synthesize(&self, text: &str) -> Result<Option<Vec<u8>>, ExportError> {
        let Some(api_key) = &self.api_key else {
            return Ok(None);
        };

        let url = format!("{}/text-to-speech/{}", self.base_url, self.voice_id);
        let body = SpeechRequest {
            text,
            model_id: TTS_MODEL,
            voice_settings: VoiceSettings {
                stability: 0.5,
                similarity_boost: 0.75,
                style: 0.0,
                use_speaker_boost: true,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("Accept", "audio/mpeg")
            .header("xi-api-key", api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    ExportError::TtsConnection(self.base_url.clone())
                } else {
                    ExportError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExportError::TtsProvider {
                status: status.as_u16(),
                body,
            });
        }

        let audio = response
            .bytes()
            .map_err(|e| ExportError::HttpClient(e.to_string()))?;
        tracing::debug!(bytes = audio.len(), "Synthesized narration");
        Ok(Some(audio.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_key() {
        let client = TtsClient::new(DEFAULT_TTS_URL, DEFAULT_VOICE_ID, None, 5).unwrap();
        assert!(!client.is_enabled());
        assert!(client.synthesize("hello").unwrap().is_none());
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let client =
            TtsClient::new(DEFAULT_TTS_URL, DEFAULT_VOICE_ID, Some("  ".into()), 5).unwrap();
        assert!(!client.is_enabled());
    }

    #[test]
    fn test_unreachable_provider_is_error() {
        let client =
            TtsClient::new("http://127.0.0.1:9", DEFAULT_VOICE_ID, Some("key".into()), 2).unwrap();
        assert!(client.synthesize("hello").is_err());
    }
}
