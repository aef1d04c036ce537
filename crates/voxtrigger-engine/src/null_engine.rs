use crate::engine_trait::{Recognizer, SpeechModel};
use voxtrigger_core::AsrError;

/// Model that never recognizes anything. Lets the pipeline run without a
/// model on disk.
pub struct NullModel;

impl NullModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SpeechModel for NullModel {
    fn name(&self) -> &str {
        "null"
    }

    fn create_recognizer(
        &self,
        sample_rate: u32,
        _grammar: Option<&str>,
    ) -> Result<Box<dyn Recognizer>, AsrError> {
        tracing::debug!(sample_rate, "NullModel recognizer created");
        Ok(Box::new(NullRecognizer::default()))
    }
}

#[derive(Default)]
pub struct NullRecognizer {
    bytes_fed: usize,
}

impl NullRecognizer {
    pub fn bytes_fed(&self) -> usize {
        self.bytes_fed
    }
}

impl Recognizer for NullRecognizer {
    fn set_words(&mut self, _enabled: bool) {}

    fn accept_waveform(&mut self, pcm: &[u8]) -> Result<bool, AsrError> {
        self.bytes_fed += pcm.len();
        tracing::trace!("NullRecognizer fed {} bytes", pcm.len());
        Ok(false)
    }

    fn partial_result(&mut self) -> String {
        r#"{"partial" : ""}"#.to_string()
    }

    fn final_result(&mut self) -> String {
        r#"{"text" : ""}"#.to_string()
    }

    fn reset(&mut self) {
        self.bytes_fed = 0;
    }
}
