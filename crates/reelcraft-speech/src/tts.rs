//! Text-to-Speech client.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::GoogleAuth;
use crate::config::SpeechConfig;
use crate::error::{SpeechError, SpeechResult};
use crate::http::GoogleHttp;

/// Turns narration text into encoded audio.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text`, returning MP3 bytes.
    async fn synthesize(&self, text: &str) -> SpeechResult<Vec<u8>>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
    speaking_rate: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: String,
}

/// Google Cloud Text-to-Speech over REST.
#[derive(Debug, Clone)]
pub struct TextToSpeechClient {
    http: GoogleHttp,
    config: SpeechConfig,
}

impl TextToSpeechClient {
    pub fn new(config: SpeechConfig, auth: GoogleAuth) -> SpeechResult<Self> {
        let http = GoogleHttp::new(auth, config.timeout, config.max_retries)?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub async fn from_env() -> SpeechResult<Self> {
        let config = SpeechConfig::from_env();
        let auth = GoogleAuth::from_config(&config).await?;
        Self::new(config, auth)
    }
}

#[async_trait]
impl SpeechSynthesizer for TextToSpeechClient {
    async fn synthesize(&self, text: &str) -> SpeechResult<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(SpeechError::EmptyInput("narration text is empty".into()));
        }

        let request = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &self.config.language_code,
                name: &self.config.voice_name,
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
                speaking_rate: self.config.speaking_rate,
            },
        };

        let url = format!("{}/text:synthesize", self.config.tts_url);
        let response: SynthesizeResponse = self.http.post_json(&url, &request).await?;
        if response.audio_content.is_empty() {
            return Err(SpeechError::invalid_response("no audioContent in synthesis reply"));
        }

        let audio = base64::engine::general_purpose::STANDARD
            .decode(response.audio_content.as_bytes())
            .map_err(|e| SpeechError::invalid_response(format!("bad audioContent: {e}")))?;

        info!(
            chars = text.len(),
            bytes = audio.len(),
            voice = %self.config.voice_name,
            "Synthesized narration"
        );
        Ok(audio)
    }
}
