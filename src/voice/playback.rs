//! Playback of synthesized replies
//!
//! Replies are handed to an [`AudioPlayer`] in a background task so a slow or
//! hanging player never holds up a consultation.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use cpal::SampleRate;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::config::PlaybackKind;
use crate::{Error, Result};

/// Sample rate assumed when a file has no decodable frames
const FALLBACK_SAMPLE_RATE: u32 = 24000;

/// Something that can play an audio file
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Play the file, returning once playback ends
    ///
    /// # Errors
    ///
    /// Returns error if the player can't be started or fails
    async fn play(&self, path: &Path) -> Result<()>;

    /// Player name for logging
    fn name(&self) -> &'static str;
}

/// Discards every file
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPlayer;

#[async_trait]
impl AudioPlayer for NullPlayer {
    async fn play(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Plays files with `ffplay -nodisp -autoexit`
#[derive(Debug, Clone)]
pub struct FfplayPlayer {
    program: PathBuf,
}

impl FfplayPlayer {
    /// Locate `ffplay` on `PATH`
    ///
    /// # Errors
    ///
    /// Returns error if `ffplay` is not installed
    pub fn new() -> Result<Self> {
        let program = which::which("ffplay")
            .map_err(|e| Error::Audio(format!("ffplay not found: {e}")))?;
        Ok(Self { program })
    }

    /// Use an explicit player binary that accepts ffplay's arguments
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl AudioPlayer for FfplayPlayer {
    async fn play(&self, path: &Path) -> Result<()> {
        let status = tokio::process::Command::new(&self.program)
            .arg("-nodisp")
            .arg("-autoexit")
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| Error::Audio(format!("failed to start ffplay: {e}")))?;

        if !status.success() {
            return Err(Error::Audio(format!("ffplay exited with {status}")));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "ffplay"
    }
}

/// Decodes MP3 replies and plays them on the default output device
#[derive(Debug, Default, Clone, Copy)]
pub struct DevicePlayer;

#[async_trait]
impl AudioPlayer for DevicePlayer {
    async fn play(&self, path: &Path) -> Result<()> {
        let mp3_data = tokio::fs::read(path).await?;

        // cpal streams aren't Send, so the whole playback lives on one blocking thread
        tokio::task::spawn_blocking(move || {
            let (samples, sample_rate) = decode_mp3(&mp3_data)?;
            play_samples_blocking(samples, sample_rate)
        })
        .await
        .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?
    }

    fn name(&self) -> &'static str {
        "device"
    }
}

/// Build the player selected in configuration
///
/// Falls back to [`NullPlayer`] when `ffplay` is requested but not installed.
#[must_use]
pub fn player_for(kind: PlaybackKind) -> Arc<dyn AudioPlayer> {
    match kind {
        PlaybackKind::None => Arc::new(NullPlayer),
        PlaybackKind::Device => Arc::new(DevicePlayer),
        PlaybackKind::Ffplay => match FfplayPlayer::new() {
            Ok(player) => Arc::new(player),
            Err(e) => {
                tracing::warn!(error = %e, "falling back to no playback");
                Arc::new(NullPlayer)
            }
        },
    }
}

/// Play a file in the background, logging failures
pub fn spawn_playback(player: Arc<dyn AudioPlayer>, path: PathBuf) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!(player = player.name(), path = %path.display(), "starting playback");
        match player.play(&path).await {
            Ok(()) => tracing::debug!(player = player.name(), "playback complete"),
            Err(e) => tracing::warn!(player = player.name(), error = %e, "error playing audio"),
        }
    })
}

/// Play mono f32 samples on the default output device
fn play_samples_blocking(samples: Vec<f32>, sample_rate: u32) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let rate = SampleRate(sample_rate);
    let supported_config = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| c.channels() == 1 && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .or_else(|| {
            // Fallback: try stereo
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == 2 && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
            })
        })
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

    let config = supported_config.with_sample_rate(rate).config();
    let channels = usize::from(config.channels);

    let sample_count = samples.len();
    let position = Arc::new(Mutex::new(0usize));
    let finished = Arc::new(Mutex::new(false));
    let position_clone = Arc::clone(&position);
    let finished_clone = Arc::clone(&finished);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let Ok(mut pos) = position_clone.lock() else {
                    return;
                };

                for frame in data.chunks_mut(channels) {
                    let sample = samples.get(*pos).copied().unwrap_or_else(|| {
                        if let Ok(mut done) = finished_clone.lock() {
                            *done = true;
                        }
                        0.0
                    });

                    for out in frame.iter_mut() {
                        *out = sample;
                    }

                    if *pos < samples.len() {
                        *pos += 1;
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let duration_ms = (sample_count as u64 * 1000) / u64::from(sample_rate.max(1));
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_millis(duration_ms + 500);

    while !finished.lock().map_or(true, |done| *done) {
        if start.elapsed() > timeout {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    }

    // Let the device drain its last buffer
    std::thread::sleep(std::time::Duration::from_millis(100));

    drop(stream);
    tracing::debug!(samples = sample_count, sample_rate, "device playback complete");

    Ok(())
}

/// Decode MP3 bytes to mono f32 samples and their sample rate
fn decode_mp3(mp3_data: &[u8]) -> Result<(Vec<f32>, u32)> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                let rate = u32::try_from(frame.sample_rate).unwrap_or(FALLBACK_SAMPLE_RATE);
                sample_rate.get_or_insert(rate);

                if frame.channels == 2 {
                    // Stereo: average channels
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok((samples, sample_rate.unwrap_or(FALLBACK_SAMPLE_RATE)))
}
