use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("environment variable not found: {0}")]
    EnvVarNotFound(String),
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    #[error("failed to enumerate devices: {0}")]
    DeviceEnumeration(String),

    #[error("failed to query device config: {0}")]
    DeviceConfig(String),

    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to build stream: {0}")]
    StreamBuild(String),

    #[error("failed to start stream: {0}")]
    StreamPlay(String),
}

#[derive(Debug, Error)]
pub enum AsrError {
    #[error("model directory not found: {0}")]
    ModelNotFound(String),

    #[error("failed to load model: {0}")]
    ModelLoad(String),

    #[error("failed to create recognizer: {0}")]
    RecognizerInit(String),

    #[error("ASR engine not found: {0}")]
    EngineNotFound(String),

    #[error("ASR processing failed: {0}")]
    ProcessingFailed(String),
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to open sink: {0}")]
    Open(String),

    #[error("failed to write to sink: {0}")]
    Write(String),
}
