use serde::Deserialize;

/// A block of 16-bit little-endian mono PCM handed from capture to the worker.
///
/// The backing buffer is rented from a [`BufferPool`](crate::BufferPool) and
/// travels by move; `len` is the number of valid bytes in `data`.
#[derive(Debug)]
pub struct AudioChunk {
    pub data: Vec<u8>,
    pub len: usize,
}

impl AudioChunk {
    /// The valid PCM bytes, or `None` when the length field is inconsistent.
    pub fn pcm(&self) -> Option<&[u8]> {
        if self.len == 0 || self.len > self.data.len() {
            return None;
        }
        Some(&self.data[..self.len])
    }
}

/// A raw engine result travelling from the worker back to the control thread.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPacket {
    pub is_final: bool,
    pub payload: String,
}

/// A keyword detection delivered to `on_keyword` observers.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordEvent {
    pub keyword: String,
    pub confidence: f32,
    pub is_partial: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechMode {
    /// Grammar-constrained recognition, single best match per utterance.
    #[default]
    Keyword,
    /// Free speech; any vocabulary occurrence in the transcript may trigger.
    Dictation,
}
