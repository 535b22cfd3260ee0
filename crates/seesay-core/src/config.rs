//! Configuration types for the SeeSay engine

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// HuggingFace repository of the VQA model
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Use an already-downloaded model directory instead of the hub
    #[serde(default)]
    pub model_dir: Option<PathBuf>,

    /// Cache directory for downloaded models
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    /// Root of the statically served files; audio lands in `<static_dir>/audio`
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,

    /// Upper bound on generated answer tokens
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: usize,

    /// Number of answer audio files kept on disk (0 keeps everything)
    #[serde(default = "default_audio_retain")]
    pub audio_retain: usize,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub speech: SpeechConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model_id: default_model_id(),
            model_dir: None,
            models_dir: default_models_dir(),
            static_dir: default_static_dir(),
            max_new_tokens: default_max_new_tokens(),
            audio_retain: default_audio_retain(),
            bridge: BridgeConfig::default(),
            speech: SpeechConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Directory answer audio is written to
    pub fn audio_dir(&self) -> PathBuf {
        self.static_dir.join("audio")
    }
}

fn default_model_id() -> String {
    "Salesforce/blip-vqa-base".to_string()
}

fn default_models_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("seesay")
        .join("models")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_max_new_tokens() -> usize {
    20
}

fn default_audio_retain() -> usize {
    64
}

/// Settings for the Python model daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_python_cmd")]
    pub python_cmd: String,

    #[serde(default = "default_script_path")]
    pub script_path: PathBuf,

    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Seconds to wait for the daemon to load the model
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            python_cmd: default_python_cmd(),
            script_path: default_script_path(),
            socket_path: default_socket_path(),
            startup_timeout_secs: default_startup_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_python_cmd() -> String {
    "python3".to_string()
}

fn default_script_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("scripts")
        .join("blip_vqa_daemon.py")
}

fn default_socket_path() -> PathBuf {
    PathBuf::from("/tmp/seesay_blip_vqa_daemon.sock")
}

fn default_startup_timeout_secs() -> u64 {
    120
}

fn default_request_timeout_secs() -> u64 {
    300
}

/// Google Translate TTS settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// IETF language tag of the spoken answer
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Top-level domain of the Google Translate host, selects the accent
    #[serde(default = "default_tld")]
    pub tld: String,

    #[serde(default)]
    pub slow: bool,

    #[serde(default = "default_speech_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            lang: default_lang(),
            tld: default_tld(),
            slow: false,
            timeout_secs: default_speech_timeout_secs(),
        }
    }
}

fn default_lang() -> String {
    "en".to_string()
}

fn default_tld() -> String {
    "com".to_string()
}

fn default_speech_timeout_secs() -> u64 {
    30
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_enabled")]
    pub cors_enabled: bool,

    /// Maximum accepted request body for uploads
    #[serde(default = "default_upload_limit_bytes")]
    pub upload_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: default_cors_enabled(),
            upload_limit_bytes: default_upload_limit_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_cors_enabled() -> bool {
    true
}

fn default_upload_limit_bytes() -> usize {
    20 * 1024 * 1024
}
