//! Conversation turn sequencing
//!
//! Drives one Listen → Transcribe → Infer → Speak cycle at a time, keeps the
//! transcript and the visible status in step, and exposes the cancellation
//! path for in-progress playback. The four external capabilities sit behind
//! traits so the sequencing is testable without a microphone, a recognizer,
//! a completion endpoint, or a speaker.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;

use crate::config::VoiceConfig;
use crate::transcript::{Role, Transcript, Turn};
use crate::voice::capture::AudioClip;
use crate::{Error, Result};

/// Records one bounded utterance per call
#[async_trait::async_trait]
pub trait Recorder: Send + Sync {
    /// Capture a single utterance
    ///
    /// # Errors
    ///
    /// `CaptureTimeout` when no speech starts within `listen_timeout`;
    /// `Device` on hardware failures
    async fn record(&self, listen_timeout: Duration, phrase_limit: Duration) -> Result<AudioClip>;
}

/// Converts a captured utterance to text
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the clip
    ///
    /// # Errors
    ///
    /// `Unrecognized` when nothing intelligible was said; `Stt` on backend
    /// failures
    async fn transcribe(&self, clip: &AudioClip) -> Result<String>;
}

/// Produces a reply for a prompt
#[async_trait::async_trait]
pub trait Completer: Send + Sync {
    /// Complete the prompt
    ///
    /// # Errors
    ///
    /// `Unauthorized`, `InferenceTimeout`, or `Inference` per the endpoint
    /// contract
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Speaks text aloud, interruptibly
#[async_trait::async_trait]
pub trait Speaker: Send + Sync {
    /// Launch playback of `text`; returns once playback is underway
    ///
    /// # Errors
    ///
    /// `Tts` or `Playback` when the utterance cannot be launched
    async fn speak(&self, text: &str) -> Result<()>;

    /// Stop any audible output immediately; no-op when idle
    fn cancel(&self);
}

/// What the view shows while a turn progresses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum Status {
    /// Nothing in progress
    Clear,
    /// Waiting for the user to speak
    Listening,
    /// Recognizing the captured utterance
    Transcribing,
    /// Waiting on the completion endpoint
    Processing,
    /// The last cycle failed
    Error { message: String },
}

/// Shared, latest-wins status display state
#[derive(Debug, Default)]
pub struct StatusBoard {
    inner: RwLock<Option<Status>>,
}

impl StatusBoard {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, status: Status) {
        if let Ok(mut inner) = self.inner.write() {
            *inner = Some(status);
        }
    }

    pub fn clear(&self) {
        self.set(Status::Clear);
    }

    /// Publish a failure as a human-readable message
    pub fn report(&self, error: &Error) {
        self.set(Status::Error {
            message: error.to_string(),
        });
    }

    #[must_use]
    pub fn current(&self) -> Status {
        self.inner
            .read()
            .ok()
            .and_then(|inner| inner.clone())
            .unwrap_or(Status::Clear)
    }
}

/// Both texts of a completed cycle
#[derive(Debug, Clone, Serialize)]
pub struct CompletedTurn {
    pub user: String,
    pub assistant: String,
}

/// Sequences conversation turns over the four external capabilities
pub struct ConversationController {
    recorder: Arc<dyn Recorder>,
    transcriber: Arc<dyn Transcriber>,
    completer: Arc<dyn Completer>,
    speaker: Arc<dyn Speaker>,
    status: Arc<StatusBoard>,
    transcript: RwLock<Transcript>,
    in_flight: tokio::sync::Mutex<()>,
    listen_timeout: Duration,
    phrase_limit: Duration,
}

impl ConversationController {
    #[must_use]
    pub fn new(
        recorder: Arc<dyn Recorder>,
        transcriber: Arc<dyn Transcriber>,
        completer: Arc<dyn Completer>,
        speaker: Arc<dyn Speaker>,
        status: Arc<StatusBoard>,
        voice: &VoiceConfig,
    ) -> Self {
        Self {
            recorder,
            transcriber,
            completer,
            speaker,
            status,
            transcript: RwLock::new(Transcript::new()),
            in_flight: tokio::sync::Mutex::new(()),
            listen_timeout: voice.listen_timeout,
            phrase_limit: voice.phrase_limit,
        }
    }

    /// Run one full turn: capture, transcribe, infer, then launch playback
    ///
    /// Only one turn may be in flight; concurrent invocations are rejected
    /// because capture and transcription are not reentrant-safe.
    ///
    /// # Errors
    ///
    /// `Busy` when a turn is already running; otherwise the failing stage's
    /// error, which is also published to the status board
    pub async fn start_turn(&self) -> Result<CompletedTurn> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::warn!("turn requested while another is in flight");
            return Err(Error::Busy);
        };

        let result = self.run_cycle().await;
        if let Err(ref e) = result {
            tracing::warn!(error = %e, "turn aborted");
            self.status.report(e);
        }
        result
    }

    async fn run_cycle(&self) -> Result<CompletedTurn> {
        self.status.set(Status::Listening);
        let clip = self
            .recorder
            .record(self.listen_timeout, self.phrase_limit)
            .await?;

        self.status.set(Status::Transcribing);
        let user_text = self.transcriber.transcribe(&clip).await?;
        tracing::info!(text = %user_text, "utterance transcribed");

        // The user's side of the turn is on the record from here on, even
        // if inference fails below.
        self.append(Role::User, &user_text);

        self.status.set(Status::Processing);
        let reply = self.completer.complete(&user_text).await?;
        tracing::info!(chars = reply.len(), "reply received");

        self.append(Role::Assistant, &reply);
        self.status.clear();

        // Fire-and-forget: the cycle is complete whether or not the reply
        // can be spoken.
        if let Err(e) = self.speaker.speak(&reply).await {
            tracing::error!(error = %e, "failed to speak reply");
            self.status.report(&e);
        }

        Ok(CompletedTurn {
            user: user_text,
            assistant: reply,
        })
    }

    /// Stop spoken playback, whatever else is going on
    ///
    /// Never touches the transcript or an in-flight cycle.
    pub fn stop_turn(&self) {
        self.speaker.cancel();
    }

    /// Snapshot of all turns so far
    #[must_use]
    pub fn turns(&self) -> Vec<Turn> {
        self.transcript
            .read()
            .map(|t| t.turns().to_vec())
            .unwrap_or_default()
    }

    /// Current view status
    #[must_use]
    pub fn status(&self) -> Status {
        self.status.current()
    }

    fn append(&self, role: Role, text: &str) {
        if let Ok(mut transcript) = self.transcript.write() {
            transcript.push(role, text);
        }
    }
}
