//! Speech client configuration.

use std::time::Duration;

/// Configuration for the Google speech clients.
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// API key sent as `?key=`; application default credentials when unset
    pub api_key: Option<String>,
    /// Text-to-Speech base URL (without trailing slash)
    pub tts_url: String,
    /// Speech-to-Text base URL (without trailing slash)
    pub stt_url: String,
    pub language_code: String,
    pub voice_name: String,
    pub speaking_rate: f64,
    /// Sample rate declared for recognition of MP3 narration
    pub sample_rate_hertz: u32,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries on retryable failures
    pub max_retries: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            tts_url: "https://texttospeech.googleapis.com/v1".to_string(),
            stt_url: "https://speech.googleapis.com/v1".to_string(),
            language_code: "en-US".to_string(),
            voice_name: "en-US-Neural2-J".to_string(),
            speaking_rate: 1.2,
            sample_rate_hertz: 44_100,
            timeout: Duration::from_secs(120),
            max_retries: 0,
        }
    }
}

impl SpeechConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var("GOOGLE_API_KEY").ok().filter(|k| !k.is_empty()),
            tts_url: std::env::var("GOOGLE_TTS_URL").unwrap_or(defaults.tts_url),
            stt_url: std::env::var("GOOGLE_STT_URL").unwrap_or(defaults.stt_url),
            language_code: std::env::var("SPEECH_LANGUAGE_CODE").unwrap_or(defaults.language_code),
            voice_name: std::env::var("TTS_VOICE_NAME").unwrap_or(defaults.voice_name),
            speaking_rate: std::env::var("TTS_SPEAKING_RATE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.speaking_rate),
            sample_rate_hertz: std::env::var("STT_SAMPLE_RATE_HERTZ")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sample_rate_hertz),
            timeout: Duration::from_secs(
                std::env::var("SPEECH_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            max_retries: std::env::var("SPEECH_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
        }
    }
}
