//! Narration and transcription for reels.
//!
//! - Google Cloud Text-to-Speech and Speech-to-Text REST clients
//! - API key or application-default credential auth with a token cache
//! - Greedy alignment of a transcript against the script it was read from

pub mod alignment;
pub mod auth;
pub mod config;
pub mod error;
mod http;
pub mod stt;
pub mod tts;

pub use alignment::align_transcript;
pub use auth::{GoogleAuth, TokenCache};
pub use config::SpeechConfig;
pub use error::{SpeechError, SpeechResult};
pub use stt::{SpeechToTextClient, Transcriber};
pub use tts::{SpeechSynthesizer, TextToSpeechClient};
