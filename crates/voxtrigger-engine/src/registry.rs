use crate::engine_trait::SpeechModel;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use voxtrigger_core::AsrError;

pub type ModelLoader = fn(&Path) -> Result<Arc<dyn SpeechModel>, AsrError>;

/// Model loaders keyed by engine name.
pub struct ModelRegistry {
    loaders: HashMap<String, ModelLoader>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            loaders: HashMap::new(),
        };
        registry.register("null", |_| Ok(Arc::new(crate::null_engine::NullModel::new())));
        #[cfg(feature = "vosk")]
        registry.register("vosk", |path| {
            Ok(Arc::new(crate::vosk_engine::VoskModel::load(path)?))
        });
        registry
    }

    pub fn register(&mut self, name: &str, loader: ModelLoader) {
        self.loaders.insert(name.to_string(), loader);
    }

    pub fn load(&self, name: &str, model_path: &Path) -> Result<Arc<dyn SpeechModel>, AsrError> {
        let loader = self
            .loaders
            .get(name)
            .ok_or_else(|| AsrError::EngineNotFound(name.to_string()))?;
        loader(model_path)
    }

    pub fn list_engines(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.loaders.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}
