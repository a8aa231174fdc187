//! AI Doctor - voice and vision consultation gateway
//!
//! A patient describes a symptom out loud and shows a photo; the gateway
//! transcribes the question, asks a vision model about the photo in a
//! doctor's voice, and speaks the answer back.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                        │
//! │        HTTP API + demo UI   │   doctor CLI           │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    Pipeline                          │
//! │   Transcriber  │  ImageAnalyzer  │  Synthesizer      │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │     Groq (Whisper, vision)  │  ElevenLabs / gTTS    │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod attachments;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod voice;

pub use attachments::{EncodedImage, VisionClient, encode_image};
pub use config::Config;
pub use error::{Error, Result};
pub use pipeline::{Consultation, ImageAnalyzer, Pipeline, Synthesizer, Transcriber};
pub use voice::{SpeechToText, TextToSpeech};
