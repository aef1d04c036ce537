use crate::error::ConfigError;
use crate::types::SpeechMode;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub meter: MeterConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub keywords: KeywordConfig,

    #[serde(default)]
    pub partial: PartialConfig,

    #[serde(default)]
    pub transcript: TranscriptConfig,

    #[serde(default)]
    pub debug: DebugConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Control-thread tick period.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Input device name. `"default"` selects the host default input; an
    /// empty name picks the first listed device.
    #[serde(default = "default_device_name")]
    pub device_name: String,

    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    #[serde(default = "default_chunk_frames")]
    pub chunk_frames: u32,

    #[serde(default = "default_ring_seconds")]
    pub ring_seconds: u32,

    #[serde(default = "default_max_chunks_per_poll")]
    pub max_chunks_per_poll: u32,

    /// Queued audio beyond this duration is dropped instead of enqueued.
    #[serde(default = "default_max_buffered_seconds")]
    pub max_buffered_seconds: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_name: default_device_name(),
            sample_rate: default_sample_rate(),
            chunk_frames: default_chunk_frames(),
            ring_seconds: default_ring_seconds(),
            max_chunks_per_poll: default_max_chunks_per_poll(),
            max_buffered_seconds: default_max_buffered_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct MeterConfig {
    #[serde(default = "default_meter_window")]
    pub sample_window: usize,

    #[serde(default = "default_meter_gain")]
    pub gain: f32,

    #[serde(default = "default_meter_interval")]
    pub update_interval: f32,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            sample_window: default_meter_window(),
            gain: default_meter_gain(),
            update_interval: default_meter_interval(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EngineConfig {
    #[serde(default = "default_engine")]
    pub name: String,

    #[serde(default = "default_model_path")]
    pub model_path: String,

    /// Ask the engine for per-word confidences in final results.
    #[serde(default)]
    pub word_details: bool,

    /// Seconds of audio between partial result requests.
    #[serde(default = "default_partial_interval")]
    pub partial_interval: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: default_engine(),
            model_path: default_model_path(),
            word_details: false,
            partial_interval: default_partial_interval(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct KeywordConfig {
    #[serde(default)]
    pub mode: SpeechMode,

    #[serde(default)]
    pub words: Vec<String>,

    #[serde(default = "default_true")]
    pub use_grammar: bool,

    #[serde(default = "default_true")]
    pub include_unknown: bool,

    /// Emit only the single best keyword per utterance instead of every match.
    #[serde(default = "default_true")]
    pub best_match_only: bool,

    #[serde(default = "default_min_word_confidence")]
    pub min_word_confidence: f32,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            mode: SpeechMode::default(),
            words: Vec::new(),
            use_grammar: default_true(),
            include_unknown: default_true(),
            best_match_only: default_true(),
            min_word_confidence: default_min_word_confidence(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PartialConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_stability_frames")]
    pub stability_frames: u32,
}

impl Default for PartialConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            stability_frames: default_stability_frames(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct TranscriptConfig {
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct DebugConfig {
    #[serde(default)]
    pub log_final_text: bool,

    #[serde(default)]
    pub log_rejected: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tick_interval_ms() -> u64 {
    16
}

fn default_device_name() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_chunk_frames() -> u32 {
    128
}

fn default_ring_seconds() -> u32 {
    10
}

fn default_max_chunks_per_poll() -> u32 {
    12
}

fn default_max_buffered_seconds() -> f32 {
    0.25
}

fn default_meter_window() -> usize {
    1024
}

fn default_meter_gain() -> f32 {
    1.0
}

fn default_meter_interval() -> f32 {
    0.06
}

fn default_engine() -> String {
    "vosk".to_string()
}

fn default_model_path() -> String {
    "models/vosk-model-small-en-us-0.15".to_string()
}

fn default_partial_interval() -> f32 {
    0.12
}

fn default_true() -> bool {
    true
}

fn default_min_word_confidence() -> f32 {
    0.85
}

fn default_stability_frames() -> u32 {
    2
}

/// Interpolate `${VAR}` patterns with environment variable values.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is valid");
    let mut result = input.to_string();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
        }
    }

    Ok(result)
}

impl AppConfig {
    /// Load configuration from a TOML file, with environment variable interpolation.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(s)?;
        let config: AppConfig = toml::from_str(&interpolated)?;
        Ok(config)
    }
}
