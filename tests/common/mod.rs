//! Shared test utilities

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ai_doctor::{EncodedImage, Error, ImageAnalyzer, Pipeline, Result, Synthesizer, Transcriber};
use async_trait::async_trait;

pub const PERSONA: &str = "You are a doctor.";
pub const MODEL: &str = "test-vision-model";

/// Transcriber returning a fixed transcript and counting calls
pub struct FakeTranscriber {
    pub transcript: String,
    pub calls: Mutex<Vec<PathBuf>>,
}

impl FakeTranscriber {
    pub fn new(transcript: &str) -> Arc<Self> {
        Arc::new(Self {
            transcript: transcript.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, audio: &Path) -> String {
        self.calls.lock().unwrap().push(audio.to_path_buf());
        self.transcript.clone()
    }
}

/// Analyzer answering with a fixed reply, or failing
pub struct FakeAnalyzer {
    pub reply: std::result::Result<String, String>,
    pub prompts: Mutex<Vec<(String, String, EncodedImage)>>,
}

impl FakeAnalyzer {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl ImageAnalyzer for FakeAnalyzer {
    async fn analyze(&self, prompt: &str, model: &str, image: &EncodedImage) -> Result<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), model.to_string(), image.clone()));
        self.reply.clone().map_err(Error::Vision)
    }
}

/// Synthesizer writing a tiny MP3 stand-in and recording what it spoke
#[derive(Default)]
pub struct FakeSynthesizer {
    pub spoken: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeSynthesizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn call_count(&self) -> usize {
        self.spoken.lock().unwrap().len()
    }
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, text: &str, output_path: &Path) -> Result<()> {
        tokio::fs::write(output_path, b"ID3fake").await?;
        self.spoken
            .lock()
            .unwrap()
            .push((text.to_string(), output_path.to_path_buf()));
        Ok(())
    }
}

/// Build a pipeline over the given fakes
pub fn pipeline(
    transcriber: Arc<FakeTranscriber>,
    analyzer: Arc<FakeAnalyzer>,
    synthesizer: Arc<FakeSynthesizer>,
    output_dir: &Path,
) -> Pipeline {
    Pipeline::new(transcriber, analyzer, synthesizer, PERSONA, MODEL, output_dir)
}

/// Write a small JPEG-looking file and return its path
pub fn write_image(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F']).unwrap();
    path
}

/// Write a placeholder recording and return its path
pub fn write_audio(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"ID3question").unwrap();
    path
}
