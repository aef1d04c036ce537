use crate::engine_trait::{Recognizer, SpeechModel};
use serde_json::json;
use std::path::Path;
use vosk::{CompleteResult, DecodingState, Model};
use voxtrigger_core::AsrError;

pub struct VoskModel {
    model: Model,
    path: String,
}

impl VoskModel {
    pub fn load(path: &Path) -> Result<Self, AsrError> {
        if !path.is_dir() {
            return Err(AsrError::ModelNotFound(path.display().to_string()));
        }
        let path_str = path.to_string_lossy().into_owned();
        let model = Model::new(path_str.as_str())
            .ok_or_else(|| AsrError::ModelLoad(path_str.clone()))?;
        tracing::info!(path = %path_str, "vosk model loaded");
        Ok(Self {
            model,
            path: path_str,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl SpeechModel for VoskModel {
    fn name(&self) -> &str {
        "vosk"
    }

    fn create_recognizer(
        &self,
        sample_rate: u32,
        grammar: Option<&str>,
    ) -> Result<Box<dyn Recognizer>, AsrError> {
        let rate = sample_rate as f32;
        let inner = match grammar {
            Some(grammar) => {
                let phrases: Vec<String> = serde_json::from_str(grammar)
                    .map_err(|e| AsrError::RecognizerInit(format!("invalid grammar: {e}")))?;
                vosk::Recognizer::new_with_grammar(&self.model, rate, &phrases)
            }
            None => vosk::Recognizer::new(&self.model, rate),
        }
        .ok_or_else(|| AsrError::RecognizerInit(format!("vosk rejected rate {sample_rate}")))?;

        let mut rec = VoskRecognizer {
            inner,
            samples: Vec::new(),
        };
        rec.inner.set_max_alternatives(0);
        Ok(Box::new(rec))
    }
}

pub struct VoskRecognizer {
    inner: vosk::Recognizer,
    samples: Vec<i16>,
}

impl Recognizer for VoskRecognizer {
    fn set_words(&mut self, enabled: bool) {
        self.inner.set_words(enabled);
    }

    fn accept_waveform(&mut self, pcm: &[u8]) -> Result<bool, AsrError> {
        self.samples.clear();
        self.samples.extend(
            pcm.chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]])),
        );
        match self.inner.accept_waveform(&self.samples) {
            Ok(DecodingState::Finalized) => Ok(true),
            Ok(DecodingState::Running) => Ok(false),
            Ok(DecodingState::Failed) => Err(AsrError::ProcessingFailed(
                "vosk decoding failed".to_string(),
            )),
            Err(e) => Err(AsrError::ProcessingFailed(e.to_string())),
        }
    }

    fn partial_result(&mut self) -> String {
        let partial = self.inner.partial_result();
        json!({ "partial": partial.partial }).to_string()
    }

    fn final_result(&mut self) -> String {
        match self.inner.final_result() {
            CompleteResult::Single(single) => {
                let words: Vec<_> = single
                    .result
                    .iter()
                    .map(|w| json!({ "word": w.word, "conf": w.conf }))
                    .collect();
                json!({ "text": single.text, "result": words }).to_string()
            }
            CompleteResult::Multiple(multi) => {
                let text = multi.alternatives.first().map(|a| a.text).unwrap_or("");
                json!({ "text": text }).to_string()
            }
        }
    }

    fn reset(&mut self) {
        self.inner.reset();
    }
}
