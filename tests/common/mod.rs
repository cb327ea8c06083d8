//! Shared test utilities
//!
//! Deterministic stand-ins for the microphone, the recognizer, the
//! completion endpoint, and the speaker, so turn sequencing runs without
//! hardware or network.

use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use parley::config::VoiceConfig;
use parley::voice::AudioClip;
use parley::{
    Completer, ConversationController, Error, Recorder, Result, Speaker, StatusBoard, Transcriber,
};

/// A short clip of non-silence
#[must_use]
pub fn test_clip() -> AudioClip {
    AudioClip {
        samples: vec![0.1; 1600],
        sample_rate: 16000,
    }
}

#[must_use]
pub fn test_voice_config() -> VoiceConfig {
    VoiceConfig {
        stt_provider: parley::config::SttProviderKind::Whisper,
        stt_model: "whisper-1".to_string(),
        tts_provider: parley::config::TtsProviderKind::Openai,
        tts_model: "tts-1".to_string(),
        tts_voice: "alloy".to_string(),
        tts_speed: 1.0,
        listen_timeout: Duration::from_secs(5),
        phrase_limit: Duration::from_secs(5),
    }
}

/// Scripted microphone
pub struct FakeRecorder {
    pub delay: Duration,
    pub outcome: fn() -> Result<AudioClip>,
}

impl FakeRecorder {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            delay: Duration::ZERO,
            outcome: || Ok(test_clip()),
        }
    }

    #[must_use]
    pub fn failing(outcome: fn() -> Result<AudioClip>) -> Self {
        Self {
            delay: Duration::ZERO,
            outcome,
        }
    }
}

#[async_trait::async_trait]
impl Recorder for FakeRecorder {
    async fn record(&self, _listen_timeout: Duration, _phrase_limit: Duration) -> Result<AudioClip> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        (self.outcome)()
    }
}

/// Scripted recognizer
pub struct FakeTranscriber(pub fn() -> Result<String>);

#[async_trait::async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _clip: &AudioClip) -> Result<String> {
        (self.0)()
    }
}

/// Scripted completion endpoint
pub struct FakeCompleter(pub fn() -> Result<String>);

#[async_trait::async_trait]
impl Completer for FakeCompleter {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        (self.0)()
    }
}

/// Speaker that records what it was asked to do
#[derive(Default)]
pub struct RecordingSpeaker {
    pub spoken: Mutex<Vec<String>>,
    pub cancels: AtomicUsize,
    pub fail_speak: bool,
}

impl RecordingSpeaker {
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_speak: true,
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
impl Speaker for RecordingSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        if self.fail_speak {
            return Err(Error::Tts("synthesis backend down".to_string()));
        }
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(())
    }

    fn cancel(&self) {
        self.cancels
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

/// Wire fakes into a controller
pub fn controller_with(
    recorder: FakeRecorder,
    transcriber: FakeTranscriber,
    completer: FakeCompleter,
    speaker: Arc<RecordingSpeaker>,
) -> (Arc<ConversationController>, Arc<StatusBoard>) {
    let status = Arc::new(StatusBoard::new());
    let controller = Arc::new(ConversationController::new(
        Arc::new(recorder),
        Arc::new(transcriber),
        Arc::new(completer),
        speaker,
        Arc::clone(&status),
        &test_voice_config(),
    ));
    (controller, status)
}

/// A controller whose every stage succeeds
pub fn happy_controller(
    speaker: Arc<RecordingSpeaker>,
) -> (Arc<ConversationController>, Arc<StatusBoard>) {
    controller_with(
        FakeRecorder::ok(),
        FakeTranscriber(|| Ok("what time is it".to_string())),
        FakeCompleter(|| Ok("I don't have real-time access".to_string())),
        speaker,
    )
}
