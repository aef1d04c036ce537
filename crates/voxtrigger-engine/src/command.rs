use crate::engine_trait::SpeechModel;
use std::fmt;
use std::sync::Arc;

/// Upper bound on chunks between partial-result polls.
pub const MAX_PARTIAL_STRIDE: u32 = 12;

/// Everything the worker needs to build a fresh recognizer.
#[derive(Clone)]
pub struct RecognizerConfig {
    pub model: Option<Arc<dyn SpeechModel>>,
    pub sample_rate: u32,
    /// JSON string array, or `None` for free-form recognition.
    pub grammar: Option<String>,
    pub partial_enabled: bool,
    pub word_details: bool,
    pub partial_stride: u32,
}

impl fmt::Debug for RecognizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecognizerConfig")
            .field("model", &self.model.as_ref().map(|m| m.name().to_string()))
            .field("sample_rate", &self.sample_rate)
            .field("grammar", &self.grammar)
            .field("partial_enabled", &self.partial_enabled)
            .field("word_details", &self.word_details)
            .field("partial_stride", &self.partial_stride)
            .finish()
    }
}

/// Control thread → worker.
#[derive(Debug, Clone)]
pub enum WorkerCommand {
    /// Drop the current recognizer and build a new one.
    Configure(RecognizerConfig),
    /// Clear the recognizer's utterance state in place.
    Reset,
    Stop,
}

/// Number of chunks between partial polls so that partials arrive roughly
/// every `partial_interval` seconds.
pub fn partial_stride(partial_interval: f32, chunk_seconds: f32) -> u32 {
    if chunk_seconds <= 0.0 {
        return 1;
    }
    let stride = (partial_interval / chunk_seconds).round();
    if stride.is_nan() {
        return 1;
    }
    (stride as u32).clamp(1, MAX_PARTIAL_STRIDE)
}
