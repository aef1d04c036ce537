use voxtrigger_core::AsrError;

/// A loaded acoustic model. Shared read-only between the control thread and
/// the recognition worker.
pub trait SpeechModel: Send + Sync {
    fn name(&self) -> &str;

    /// Build a recognizer bound to `sample_rate`. `grammar` is a JSON string
    /// array restricting the vocabulary; `None` means free-form recognition.
    fn create_recognizer(
        &self,
        sample_rate: u32,
        grammar: Option<&str>,
    ) -> Result<Box<dyn Recognizer>, AsrError>;
}

/// Stateful streaming decoder. Owned by the worker thread.
///
/// Result methods return raw engine JSON in the shapes `{"text": ..}`,
/// `{"partial": ..}` and `{"result": [{"word": .., "conf": ..}], "text": ..}`.
pub trait Recognizer: Send {
    fn set_words(&mut self, enabled: bool);

    /// Feed 16-bit little-endian mono PCM. Returns `true` once an utterance
    /// has been finalized.
    fn accept_waveform(&mut self, pcm: &[u8]) -> Result<bool, AsrError>;

    fn partial_result(&mut self) -> String;

    fn final_result(&mut self) -> String;

    fn reset(&mut self);
}
