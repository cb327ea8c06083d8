//! Parley - push-to-talk voice front end for chat-completion models
//!
//! One button press runs one conversation turn:
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 Browser view                     │
//! │        Speak │ Stop │ status │ transcript        │
//! └───────────────────────┬──────────────────────────┘
//!                         │ HTTP
//! ┌───────────────────────▼──────────────────────────┐
//! │            ConversationController                │
//! │     Listen → Transcribe → Infer → Speak          │
//! └───────────────────────┬──────────────────────────┘
//!                         │
//! ┌───────────────────────▼──────────────────────────┐
//! │  microphone │ STT API │ chat API │ TTS + speaker │
//! └──────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod inference;
pub mod transcript;
pub mod voice;

pub use config::Config;
pub use controller::{
    Completer, CompletedTurn, ConversationController, Recorder, Speaker, Status, StatusBoard,
    Transcriber,
};
pub use error::{Error, Result};
pub use inference::InferenceClient;
pub use transcript::{Role, Transcript, Turn};
