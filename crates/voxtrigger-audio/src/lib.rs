pub mod capture;
pub mod chunker;
pub mod clip;
pub mod device;
pub mod meter;

pub use capture::{CaptureBackend, ClipInfo, CpalCapture};
pub use chunker::{downmix_to_pcm16le, ChunkSink, Chunker, ChunkerSettings, PollStats};
pub use clip::ClipRing;
pub use device::{DeviceManager, DEFAULT_DEVICE};
pub use meter::{rms_level, LevelMeter, MeterSettings};
