//! Audio capture from microphone
//!
//! One bounded utterance per call: wait for speech onset, accumulate until
//! trailing silence or the phrase limit, hand back the samples.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::controller::Recorder;
use crate::{Error, Result};

/// Sample rate for audio capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16000;

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Trailing silence that ends an utterance (in samples at 16kHz)
const TRAILING_SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

/// Poll interval while draining the capture buffer
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A captured mono utterance
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    /// Utterance length in seconds
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Streams the default input device into a shared buffer
pub struct AudioCapture {
    #[allow(dead_code)]
    device: Device,
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
            .ok_or_else(|| Error::Device("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Device(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Device("no suitable capture config found".to_string()))?;

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
            device,
            config,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Start streaming into the buffer
    ///
    /// # Errors
    ///
    /// Returns error if the input stream cannot be built or started
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let buffer = Arc::clone(&self.buffer);
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Device("no input device".to_string()))?;

        let config = self.config.clone();

        let stream = device
            .build_input_stream(
                &config,
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
            .map_err(|e| Error::Device(e.to_string()))?;

        stream.play().map_err(|e| Error::Device(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Take the samples captured since the last call
    #[must_use]
    pub fn take_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Peek at the buffer without clearing it
    #[must_use]
    pub fn peek_buffer(&self) -> Vec<f32> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    /// Clear the buffer
    pub fn clear_buffer(&self) {
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }

    /// Get the sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

/// Where the gate is in the life of one utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// No speech heard yet
    WaitingForSpeech,
    /// Speech started, accumulating
    Capturing,
    /// Trailing silence or phrase limit reached
    Complete,
}

/// Energy-gated accumulator for a single utterance
///
/// Pure sample-in/state-out logic so capture decisions are testable without
/// hardware.
pub struct UtteranceGate {
    phrase_limit_samples: usize,
    collected: Vec<f32>,
    silence_run: usize,
    started: bool,
}

impl UtteranceGate {
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn new(phrase_limit: Duration) -> Self {
        let phrase_limit_samples = (phrase_limit.as_secs_f64() * f64::from(SAMPLE_RATE)) as usize;
        Self {
            phrase_limit_samples,
            collected: Vec::new(),
            silence_run: 0,
            started: false,
        }
    }

    /// Feed a chunk of samples, returning the gate's new state
    pub fn push(&mut self, samples: &[f32]) -> GateState {
        let speaking = rms(samples) > ENERGY_THRESHOLD;

        if !self.started {
            if !speaking {
                return GateState::WaitingForSpeech;
            }
            self.started = true;
            tracing::trace!(samples = samples.len(), "speech onset");
        }

        self.collected.extend_from_slice(samples);

        if speaking {
            self.silence_run = 0;
        } else {
            self.silence_run += samples.len();
        }

        if self.collected.len() >= self.phrase_limit_samples {
            self.collected.truncate(self.phrase_limit_samples);
            tracing::debug!(samples = self.collected.len(), "phrase limit reached");
            return GateState::Complete;
        }

        if self.silence_run >= TRAILING_SILENCE_SAMPLES {
            tracing::debug!(samples = self.collected.len(), "utterance complete");
            return GateState::Complete;
        }

        GateState::Capturing
    }

    /// Whether speech onset has been heard
    #[must_use]
    pub const fn started(&self) -> bool {
        self.started
    }

    /// Take the accumulated utterance, clearing the gate
    pub fn take_clip(&mut self) -> AudioClip {
        AudioClip {
            samples: std::mem::take(&mut self.collected),
            sample_rate: SAMPLE_RATE,
        }
    }
}

/// Records one utterance per `record` call from the default microphone
pub struct MicRecorder;

#[async_trait::async_trait]
impl Recorder for MicRecorder {
    async fn record(&self, listen_timeout: Duration, phrase_limit: Duration) -> Result<AudioClip> {
        // cpal streams are not Send, so the whole capture lives on one
        // blocking thread.
        tokio::task::spawn_blocking(move || record_blocking(listen_timeout, phrase_limit))
            .await
            .map_err(|e| Error::Device(e.to_string()))?
    }
}

/// Blocking one-shot utterance capture
///
/// # Errors
///
/// `CaptureTimeout` if no speech onset within `listen_timeout`; `Device` on
/// stream failures.
pub fn record_blocking(listen_timeout: Duration, phrase_limit: Duration) -> Result<AudioClip> {
    let mut capture = AudioCapture::new()?;
    capture.start()?;

    let onset_deadline = Instant::now() + listen_timeout;
    let mut gate = UtteranceGate::new(phrase_limit);

    loop {
        std::thread::sleep(POLL_INTERVAL);
        let chunk = capture.take_buffer();

        match gate.push(&chunk) {
            GateState::WaitingForSpeech => {
                if Instant::now() >= onset_deadline {
                    capture.stop();
                    return Err(Error::CaptureTimeout);
                }
            }
            GateState::Capturing => {}
            GateState::Complete => break,
        }
    }

    capture.stop();
    let clip = gate.take_clip();
    tracing::debug!(
        samples = clip.samples.len(),
        duration_secs = clip.duration_secs(),
        "utterance captured"
    );
    Ok(clip)
}

/// RMS energy of a chunk of samples
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
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
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Device(e.to_string()))?;

        for &sample in samples {
            // Convert f32 [-1.0, 1.0] to i16
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Device(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Device(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(duration_secs: f32, amplitude: f32) -> Vec<f32> {
        #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
        #[allow(clippy::cast_possible_truncation)]
        let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
        (0..num_samples)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let t = i as f32 / SAMPLE_RATE as f32;
                amplitude * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
            })
            .collect()
    }

    fn silence(duration_secs: f32) -> Vec<f32> {
        #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
        #[allow(clippy::cast_possible_truncation)]
        let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
        vec![0.0; num_samples]
    }

    #[test]
    fn rms_distinguishes_silence_from_speech() {
        assert!(rms(&silence(0.1)) < 0.001);
        assert!(rms(&sine(0.1, 0.5)) > 0.3);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn gate_waits_for_onset() {
        let mut gate = UtteranceGate::new(Duration::from_secs(5));

        assert_eq!(gate.push(&silence(0.1)), GateState::WaitingForSpeech);
        assert_eq!(gate.push(&silence(0.1)), GateState::WaitingForSpeech);
        assert!(!gate.started());

        assert_eq!(gate.push(&sine(0.1, 0.3)), GateState::Capturing);
        assert!(gate.started());
    }

    #[test]
    fn gate_completes_on_trailing_silence() {
        let mut gate = UtteranceGate::new(Duration::from_secs(5));

        gate.push(&sine(0.5, 0.3));
        assert_eq!(gate.push(&sine(0.3, 0.3)), GateState::Capturing);

        // 0.6s of silence crosses the 0.5s trailing-silence window
        assert_eq!(gate.push(&silence(0.6)), GateState::Complete);

        let clip = gate.take_clip();
        assert_eq!(clip.sample_rate, SAMPLE_RATE);
        assert!(!clip.samples.is_empty());
    }

    #[test]
    fn gate_truncates_at_phrase_limit() {
        let mut gate = UtteranceGate::new(Duration::from_secs(1));

        // 2 seconds of continuous speech against a 1 second limit
        assert_eq!(gate.push(&sine(2.0, 0.3)), GateState::Complete);

        let clip = gate.take_clip();
        assert_eq!(clip.samples.len(), SAMPLE_RATE as usize);
    }

    #[test]
    fn samples_to_wav_writes_header() {
        let wav = samples_to_wav(&sine(0.1, 0.5), SAMPLE_RATE).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert!(wav.len() > 44);
    }
}
