//! Voice processing module
//!
//! Handles microphone recording, speech-to-text, text-to-speech and playback
//! of spoken replies.

mod capture;
mod playback;
mod stt;
mod tts;

pub use capture::{
    AudioCapture, RecordOptions, SAMPLE_RATE, record_to_file, rms_energy, samples_to_wav,
    speech_threshold, trim_to_phrase,
};
pub use playback::{
    AudioPlayer, DevicePlayer, FfplayPlayer, NullPlayer, player_for, spawn_playback,
};
pub use stt::{SpeechToText, TRANSCRIPTION_FAILED};
pub use tts::TextToSpeech;
