//! Voice processing module
//!
//! Audio capture, speech recognition, synthesis, and interruptible playback.

pub mod capture;
pub mod playback;
pub mod speaker;
pub mod stt;
pub mod tts;

pub use capture::{AudioCapture, AudioClip, MicRecorder, SAMPLE_RATE, samples_to_wav};
pub use playback::AudioPlayback;
pub use speaker::{TtsSpeaker, strip_punctuation};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;
