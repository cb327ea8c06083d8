//! Configuration management for Parley
//!
//! Layered sources, highest priority first: environment variables, the
//! optional TOML file at `~/.config/parley/config.toml`, built-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::Result;

/// Default HTTP port for the web view
pub const DEFAULT_PORT: u16 = 4150;

/// Default chat-completion endpoint base
const DEFAULT_LLM_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default chat model identifier
const DEFAULT_LLM_MODEL: &str = "meta-llama/llama-3.3-70b-instruct:free";

/// Parley configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Inference endpoint configuration
    pub llm: LlmConfig,

    /// Voice capture/synthesis configuration
    pub voice: VoiceConfig,

    /// Web server port
    pub port: u16,

    /// API keys for external services
    pub api_keys: ApiKeys,
}

/// Inference endpoint configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Chat-completions base URL
    pub base_url: String,

    /// Model identifier sent with every request
    pub model: String,

    /// `HTTP-Referer` tag identifying this app to the endpoint
    pub referer: String,

    /// `X-Title` tag identifying this app to the endpoint
    pub title: String,

    /// Per-request deadline
    pub timeout: Duration,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT backend
    pub stt_provider: SttProviderKind,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    /// TTS backend
    pub tts_provider: TtsProviderKind,

    /// TTS model (e.g. "tts-1", "eleven_monolingual_v1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,

    /// How long to wait for speech onset before giving up
    pub listen_timeout: Duration,

    /// Maximum captured utterance length
    pub phrase_limit: Duration,
}

/// Speech-to-text backend selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SttProviderKind {
    #[default]
    Whisper,
    Deepgram,
}

/// Text-to-speech backend selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsProviderKind {
    #[default]
    Openai,
    Elevenlabs,
}

/// API keys for external services
///
/// `SecretString` keeps key material out of Debug output and logs.
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenRouter` API key (chat completions)
    pub openrouter: Option<SecretString>,

    /// `OpenAI` API key (Whisper STT and TTS)
    pub openai: Option<SecretString>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<SecretString>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<SecretString>,
}

/// Top-level TOML configuration file schema
///
/// All fields are optional — the file is a partial overlay on top of
/// defaults.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    llm: LlmFileConfig,

    #[serde(default)]
    voice: VoiceFileConfig,

    #[serde(default)]
    server: ServerFileConfig,

    #[serde(default)]
    api_keys: ApiKeysFileConfig,
}

#[derive(Debug, Default, Deserialize)]
struct LlmFileConfig {
    base_url: Option<String>,
    model: Option<String>,
    referer: Option<String>,
    title: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct VoiceFileConfig {
    stt_provider: Option<SttProviderKind>,
    stt_model: Option<String>,
    tts_provider: Option<TtsProviderKind>,
    tts_model: Option<String>,
    tts_voice: Option<String>,
    tts_speed: Option<f64>,
    listen_timeout_secs: Option<u64>,
    phrase_limit_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerFileConfig {
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiKeysFileConfig {
    openrouter: Option<String>,
    openai: Option<String>,
    deepgram: Option<String>,
    elevenlabs: Option<String>,
}

impl Config {
    /// Load configuration from env, the standard TOML file, and defaults
    ///
    /// # Errors
    ///
    /// Returns error if an env override has an invalid value
    pub fn load() -> Result<Self> {
        Self::from_overlay(load_config_file())
    }

    fn from_overlay(fc: ConfigFile) -> Result<Self> {
        let llm = LlmConfig {
            base_url: env_or("PARLEY_LLM_BASE_URL", fc.llm.base_url)
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            model: env_or("PARLEY_LLM_MODEL", fc.llm.model)
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            referer: env_or("PARLEY_REFERER", fc.llm.referer)
                .unwrap_or_else(|| format!("http://localhost:{DEFAULT_PORT}")),
            title: env_or("PARLEY_TITLE", fc.llm.title).unwrap_or_else(|| "Parley".to_string()),
            timeout: Duration::from_secs(fc.llm.timeout_secs.unwrap_or(10)),
        };

        let voice = VoiceConfig {
            stt_provider: parse_env("PARLEY_STT_PROVIDER")?
                .or(fc.voice.stt_provider)
                .unwrap_or_default(),
            stt_model: env_or("PARLEY_STT_MODEL", fc.voice.stt_model)
                .unwrap_or_else(|| "whisper-1".to_string()),
            tts_provider: parse_env("PARLEY_TTS_PROVIDER")?
                .or(fc.voice.tts_provider)
                .unwrap_or_default(),
            tts_model: env_or("PARLEY_TTS_MODEL", fc.voice.tts_model)
                .unwrap_or_else(|| "tts-1".to_string()),
            tts_voice: env_or("PARLEY_TTS_VOICE", fc.voice.tts_voice)
                .unwrap_or_else(|| "alloy".to_string()),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0),
            listen_timeout: Duration::from_secs(fc.voice.listen_timeout_secs.unwrap_or(5)),
            phrase_limit: Duration::from_secs(fc.voice.phrase_limit_secs.unwrap_or(5)),
        };

        let port = match std::env::var("PARLEY_PORT") {
            Ok(v) => v
                .parse()
                .map_err(|_| crate::Error::Config(format!("invalid PARLEY_PORT: {v}")))?,
            Err(_) => fc.server.port.unwrap_or(DEFAULT_PORT),
        };

        let api_keys = ApiKeys {
            openrouter: secret_env_or("OPENROUTER_API_KEY", fc.api_keys.openrouter),
            openai: secret_env_or("OPENAI_API_KEY", fc.api_keys.openai),
            deepgram: secret_env_or("DEEPGRAM_API_KEY", fc.api_keys.deepgram),
            elevenlabs: secret_env_or("ELEVENLABS_API_KEY", fc.api_keys.elevenlabs),
        };

        Ok(Self {
            llm,
            voice,
            port,
            api_keys,
        })
    }
}

/// Env var if set, otherwise the file value
fn env_or(key: &str, file_value: Option<String>) -> Option<String> {
    std::env::var(key).ok().or(file_value)
}

/// Env var if set, otherwise the file value, wrapped as a secret
fn secret_env_or(key: &str, file_value: Option<String>) -> Option<SecretString> {
    env_or(key, file_value)
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
}

/// Parse a provider selector from an env var
fn parse_env<T: serde::de::DeserializeOwned>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(v) => serde_json::from_value(serde_json::Value::String(v.clone()))
            .map(Some)
            .map_err(|_| crate::Error::Config(format!("invalid {key}: {v}"))),
        Err(_) => Ok(None),
    }
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be
/// parsed.
fn load_config_file() -> ConfigFile {
    let Some(path) = config_file_path() else {
        return ConfigFile::default();
    };

    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/parley/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("parley").join("config.toml"))
}
