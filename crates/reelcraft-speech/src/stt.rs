//! Speech-to-Text client with word time offsets.

use async_trait::async_trait;
use base64::Engine;
use reelcraft_models::WordTiming;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::GoogleAuth;
use crate::config::SpeechConfig;
use crate::error::{SpeechError, SpeechResult};
use crate::http::GoogleHttp;

/// Recognizes speech and reports when each word was said.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe MP3 `audio` into timed words.
    async fn transcribe(&self, audio: &[u8]) -> SpeechResult<Vec<WordTiming>>;
}

#[derive(Debug, Serialize)]
struct RecognizeRequest {
    config: RecognitionConfig,
    audio: RecognitionAudio,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig {
    encoding: &'static str,
    sample_rate_hertz: u32,
    language_code: String,
    enable_word_time_offsets: bool,
}

#[derive(Debug, Serialize)]
struct RecognitionAudio {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    words: Vec<WordInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WordInfo {
    word: String,
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    end_time: Option<String>,
}

/// Parse a protobuf JSON duration such as `"1.200s"`.
pub fn parse_duration_secs(value: &str) -> Option<f64> {
    value.trim().strip_suffix('s')?.parse().ok()
}

/// Google Cloud Speech-to-Text over REST.
#[derive(Debug, Clone)]
pub struct SpeechToTextClient {
    http: GoogleHttp,
    config: SpeechConfig,
}

impl SpeechToTextClient {
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

/// Timed words from the first alternative of every result.
fn collect_words(response: RecognizeResponse) -> SpeechResult<Vec<WordTiming>> {
    let mut words = Vec::new();
    for result in response.results {
        let Some(best) = result.alternatives.into_iter().next() else {
            continue;
        };
        for info in best.words {
            let start = info.start_time.as_deref().map_or(Some(0.0), parse_duration_secs);
            let end = info.end_time.as_deref().map_or(Some(0.0), parse_duration_secs);
            match (start, end) {
                (Some(start), Some(end)) => words.push(WordTiming::new(info.word, start, end.max(start))),
                _ => {
                    return Err(SpeechError::invalid_response(format!(
                        "bad time offset for word '{}'",
                        info.word
                    )))
                }
            }
        }
    }
    Ok(words)
}

#[async_trait]
impl Transcriber for SpeechToTextClient {
    async fn transcribe(&self, audio: &[u8]) -> SpeechResult<Vec<WordTiming>> {
        if audio.is_empty() {
            return Err(SpeechError::EmptyInput("audio is empty".into()));
        }

        let request = RecognizeRequest {
            config: RecognitionConfig {
                encoding: "MP3",
                sample_rate_hertz: self.config.sample_rate_hertz,
                language_code: self.config.language_code.clone(),
                enable_word_time_offsets: true,
            },
            audio: RecognitionAudio {
                content: base64::engine::general_purpose::STANDARD.encode(audio),
            },
        };

        let url = format!("{}/speech:recognize", self.config.stt_url);
        let response: RecognizeResponse = self.http.post_json(&url, &request).await?;
        let words = collect_words(response)?;

        if words.is_empty() {
            warn!(bytes = audio.len(), "Transcription returned no words");
        }
        info!(words = words.len(), "Transcribed narration");
        Ok(words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SpeechToTextClient {
        let config = SpeechConfig {
            stt_url: server.uri(),
            ..SpeechConfig::default()
        };
        SpeechToTextClient::new(config, GoogleAuth::ApiKey("k".into())).unwrap()
    }

    #[test]
    fn test_parse_duration_secs() {
        assert_eq!(parse_duration_secs("1.200s"), Some(1.2));
        assert_eq!(parse_duration_secs("3s"), Some(3.0));
        assert_eq!(parse_duration_secs("3"), None);
    }

    #[tokio::test]
    async fn test_transcribe_flattens_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/speech:recognize"))
            .and(body_partial_json(serde_json::json!({
                "config": {
                    "encoding": "MP3",
                    "sampleRateHertz": 44100,
                    "languageCode": "en-US",
                    "enableWordTimeOffsets": true
                },
                "audio": {"content": "SUQz"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"alternatives": [
                        {"transcript": "hello world", "words": [
                            {"word": "hello", "endTime": "0.500s"},
                            {"word": "world", "startTime": "0.500s", "endTime": "0.900s"}
                        ]},
                        {"transcript": "yellow world", "words": [
                            {"word": "yellow", "startTime": "0s", "endTime": "0.5s"}
                        ]}
                    ]},
                    {"alternatives": []},
                    {"alternatives": [
                        {"words": [{"word": "test", "startTime": "0.900s", "endTime": "1.300s"}]}
                    ]}
                ]
            })))
            .mount(&server)
            .await;

        let words = client(&server).transcribe(b"ID3").await.unwrap();
        assert_eq!(
            words,
            vec![
                WordTiming::new("hello", 0.0, 0.5),
                WordTiming::new("world", 0.5, 0.9),
                WordTiming::new("test", 0.9, 1.3),
            ]
        );
    }

    #[tokio::test]
    async fn test_no_speech_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        assert!(client(&server).transcribe(b"ID3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).transcribe(b"ID3").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
