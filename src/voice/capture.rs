//! Audio capture from microphone

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Lowest energy that can ever count as speech
const MIN_ENERGY_THRESHOLD: f32 = 0.03;

/// Multiple of the ambient level that counts as speech
const AMBIENT_MULTIPLIER: f32 = 2.5;

/// Trailing silence that ends a phrase (1 second)
const END_OF_PHRASE_SAMPLES: usize = SAMPLE_RATE as usize;

/// Window used when trimming silence (20ms)
const TRIM_WINDOW: usize = 320;

/// Silence kept around a trimmed phrase (200ms)
const TRIM_PADDING: usize = 3200;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Captures audio from the default input device
pub struct AudioCapture {
    config: StreamConfig,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Create a new audio capture instance
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = SAMPLE_RATE,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Start capturing audio
    ///
    /// # Errors
    ///
    /// Returns error if capture fails
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device".to_string()))?;

        let stream = device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Get captured audio buffer and clear it
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Get captured audio buffer without clearing
    #[must_use]
    pub fn peek_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }
}

/// How a question gets recorded from the microphone
#[derive(Debug, Clone)]
pub struct RecordOptions {
    /// Longest wait for speech to begin
    pub timeout: Duration,
    /// Longest phrase once speech has begun
    pub phrase_time_limit: Option<Duration>,
    /// Time spent measuring background noise before listening
    pub ambient_calibration: Duration,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            phrase_time_limit: None,
            ambient_calibration: Duration::from_secs(1),
        }
    }
}

/// Record one spoken phrase from the default microphone into a WAV file
///
/// Blocks the calling thread until the phrase ends.
///
/// # Errors
///
/// Returns error if the device fails, no speech starts before the timeout,
/// or the file can't be written
pub fn record_to_file(path: &Path, options: &RecordOptions) -> Result<()> {
    let mut capture = AudioCapture::new()?;
    capture.start()?;

    tracing::info!("adjusting for ambient noise...");
    std::thread::sleep(options.ambient_calibration);
    let threshold = speech_threshold(rms_energy(&capture.take_buffer()));

    tracing::info!(threshold, "start speaking now...");
    let listening_since = Instant::now();
    let mut speech_started: Option<Instant> = None;
    let mut recorded = Vec::new();
    let mut trailing_silence = 0usize;

    loop {
        std::thread::sleep(POLL_INTERVAL);
        let chunk = capture.take_buffer();
        let is_speech = rms_energy(&chunk) > threshold;

        let Some(started) = speech_started else {
            if is_speech {
                speech_started = Some(Instant::now());
                recorded.extend_from_slice(&chunk);
            } else if listening_since.elapsed() > options.timeout {
                capture.stop();
                return Err(Error::Audio(format!(
                    "no speech detected within {}s",
                    options.timeout.as_secs()
                )));
            }
            continue;
        };

        recorded.extend_from_slice(&chunk);
        trailing_silence = if is_speech {
            0
        } else {
            trailing_silence + chunk.len()
        };

        if trailing_silence >= END_OF_PHRASE_SAMPLES {
            break;
        }
        if options
            .phrase_time_limit
            .is_some_and(|limit| started.elapsed() >= limit)
        {
            tracing::debug!("phrase time limit reached");
            break;
        }
    }

    capture.stop();
    tracing::info!("recording complete");

    let phrase = trim_to_phrase(&recorded, threshold);
    let wav = samples_to_wav(phrase, SAMPLE_RATE)?;
    std::fs::write(path, wav)?;

    tracing::info!(path = %path.display(), samples = phrase.len(), "audio saved");
    Ok(())
}

/// Root-mean-square energy of a block of samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Energy level above which audio counts as speech, given the ambient level
#[must_use]
pub fn speech_threshold(ambient_rms: f32) -> f32 {
    (ambient_rms * AMBIENT_MULTIPLIER).max(MIN_ENERGY_THRESHOLD)
}

/// Cut leading and trailing silence, keeping a little padding
///
/// Returns an empty slice when nothing rises above the threshold.
#[must_use]
pub fn trim_to_phrase(samples: &[f32], threshold: f32) -> &[f32] {
    let loud = |window: &[f32]| rms_energy(window) > threshold;
    let windows: Vec<&[f32]> = samples.chunks(TRIM_WINDOW).collect();

    let Some(first) = windows.iter().position(|w| loud(w)) else {
        return &[];
    };
    let last = windows.iter().rposition(|w| loud(w)).unwrap_or(first);

    let start = (first * TRIM_WINDOW).saturating_sub(TRIM_PADDING);
    let end = ((last + 1) * TRIM_WINDOW + TRIM_PADDING).min(samples.len());
    &samples[start..end]
}

/// Convert f32 samples to WAV bytes for STT APIs
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
