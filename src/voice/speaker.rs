//! Spoken reply delivery
//!
//! One playback slot: a newer utterance supersedes an unplayed older one,
//! and cancellation always wins. Synthesized audio lives in a temp file for
//! exactly as long as its playback.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::controller::{Speaker, StatusBoard};
use crate::voice::playback::AudioPlayback;
use crate::voice::tts::TextToSpeech;
use crate::{Error, Result};

/// Produces playable audio bytes for text
///
/// Seam over the external synthesis engine so utterance handling can be
/// exercised without it.
#[async_trait::async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` to MP3 bytes
    ///
    /// # Errors
    ///
    /// `Tts` when the engine fails
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

#[async_trait::async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        TextToSpeech::synthesize(self, text).await
    }
}

/// The single-capacity playback slot
///
/// `epoch` orders speak/cancel events: a synthesis only starts playback if
/// no newer event happened while it was in flight.
#[derive(Default)]
struct PlaybackSlot {
    epoch: u64,
    cancel: Option<Arc<AtomicBool>>,
}

impl PlaybackSlot {
    /// Supersede whatever the slot holds; returns the new epoch
    fn preempt(&mut self) -> u64 {
        self.epoch += 1;
        if let Some(flag) = self.cancel.take() {
            flag.store(true, Ordering::SeqCst);
        }
        self.epoch
    }

    /// Claim the slot for playback, unless a newer event preempted `epoch`
    fn arm(&mut self, epoch: u64) -> Option<Arc<AtomicBool>> {
        if epoch != self.epoch {
            return None;
        }
        let flag = Arc::new(AtomicBool::new(false));
        self.cancel = Some(Arc::clone(&flag));
        Some(flag)
    }

    /// Release the slot after natural completion of `epoch`'s playback
    fn finish(&mut self, epoch: u64) {
        if epoch == self.epoch {
            self.cancel = None;
        }
    }
}

/// Speaks replies through an external TTS engine and the default output
/// device
pub struct TtsSpeaker {
    synth: Arc<dyn Synthesizer>,
    status: Arc<StatusBoard>,
    slot: Arc<Mutex<PlaybackSlot>>,
}

impl TtsSpeaker {
    #[must_use]
    pub fn new(tts: TextToSpeech, status: Arc<StatusBoard>) -> Self {
        Self::with_synthesizer(Arc::new(tts), status)
    }

    #[must_use]
    pub fn with_synthesizer(synth: Arc<dyn Synthesizer>, status: Arc<StatusBoard>) -> Self {
        Self {
            synth,
            status,
            slot: Arc::new(Mutex::new(PlaybackSlot::default())),
        }
    }
}

#[async_trait::async_trait]
impl Speaker for TtsSpeaker {
    async fn speak(&self, text: &str) -> Result<()> {
        let spoken = strip_punctuation(text);
        if spoken.trim().is_empty() {
            tracing::debug!("nothing speakable after punctuation strip");
            return Ok(());
        }

        let epoch = lock_slot(&self.slot)?.preempt();

        let audio = self.synth.synthesize(&spoken).await?;

        // Transient buffer for this utterance; removed when the playback
        // task drops it
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(&audio)?;

        let Some(cancel) = lock_slot(&self.slot)?.arm(epoch) else {
            // Cancelled or superseded while synthesizing: written, never
            // audible
            tracing::debug!("utterance superseded before playback");
            return Ok(());
        };

        let status = Arc::clone(&self.status);
        let slot = Arc::clone(&self.slot);
        tokio::task::spawn_blocking(move || {
            let result = AudioPlayback::new()
                .and_then(|playback| playback.play_mp3_blocking(&audio, &cancel));

            if let Err(e) = result {
                tracing::error!(error = %e, "playback failed");
                status.report(&e);
            }

            if let Ok(mut slot) = slot.lock() {
                slot.finish(epoch);
            }

            drop(file);
        });

        Ok(())
    }

    fn cancel(&self) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.preempt();
        }
        tracing::debug!("playback cancel requested");
    }
}

fn lock_slot(slot: &Arc<Mutex<PlaybackSlot>>) -> Result<std::sync::MutexGuard<'_, PlaybackSlot>> {
    slot.lock()
        .map_err(|_| Error::Playback("playback slot poisoned".to_string()))
}

/// Drop punctuation the synthesis engine may read aloud
///
/// Hyphenated words stay intact; everything else in the ASCII punctuation
/// range goes.
#[must_use]
pub fn strip_punctuation(text: &str) -> String {
    text.chars()
        .filter(|&c| c == '-' || !c.is_ascii_punctuation())
        .collect()
}
