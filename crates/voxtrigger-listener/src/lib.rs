pub mod events;
pub mod gate;
pub mod listener;
pub mod transcript;

pub use events::EventBus;
pub use gate::PartialGate;
pub use listener::{
    KeywordListener, ListenerSettings, ListenerStatus, ModelSource, TEXT_MATCH_CONFIDENCE,
};
pub use transcript::TranscriptFile;
