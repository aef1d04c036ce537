pub mod channels;
pub mod config;
pub mod config_diff;
pub mod error;
pub mod grammar;
pub mod payload;
pub mod pool;
pub mod text;
pub mod types;

pub use channels::{Mailbox, PcmQueue, WakeSignal};
pub use config::AppConfig;
pub use config_diff::ConfigDiff;
pub use error::{AsrError, AudioError, ConfigError, SinkError};
pub use grammar::build_grammar;
pub use payload::{EnginePayload, WordEntry};
pub use pool::BufferPool;
pub use text::{normalize, MatchPolicy, Vocabulary, WordHit, UNKNOWN_TOKEN};
pub use types::{AudioChunk, KeywordEvent, ResultPacket, SpeechMode};
