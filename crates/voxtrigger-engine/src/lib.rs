pub mod command;
pub mod engine_trait;
pub mod null_engine;
pub mod registry;
#[cfg(feature = "vosk")]
pub mod vosk_engine;
pub mod worker;

pub use command::{partial_stride, RecognizerConfig, WorkerCommand};
pub use engine_trait::{Recognizer, SpeechModel};
pub use null_engine::{NullModel, NullRecognizer};
pub use registry::{ModelLoader, ModelRegistry};
#[cfg(feature = "vosk")]
pub use vosk_engine::{VoskModel, VoskRecognizer};
pub use worker::{RecognitionWorker, WorkerHandle, WorkerShared};
