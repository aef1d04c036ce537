use crate::capture::{CaptureBackend, ClipInfo};
use voxtrigger_core::{AudioChunk, BufferPool, PcmQueue, WakeSignal};

pub const MIN_SAMPLE_RATE: u32 = 8000;
pub const MAX_SAMPLE_RATE: u32 = 48000;
pub const MIN_CHUNK_FRAMES: usize = 128;
pub const MAX_CHUNK_FRAMES: usize = 8192;
pub const MIN_RING_SECONDS: u32 = 1;
pub const MAX_RING_SECONDS: u32 = 60;
pub const MAX_CHUNKS_PER_POLL: usize = 64;
const MIN_BUFFERED_CHUNKS: usize = 2;
const MAX_BUFFERED_CHUNKS: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct ChunkerSettings {
    pub chunk_frames: usize,
    pub max_chunks_per_poll: usize,
    pub max_buffered_seconds: f32,
}

impl Default for ChunkerSettings {
    fn default() -> Self {
        Self {
            chunk_frames: 128,
            max_chunks_per_poll: 12,
            max_buffered_seconds: 0.25,
        }
    }
}

/// Where finished chunks go.
pub struct ChunkSink<'a> {
    pub queue: &'a PcmQueue,
    pub pool: &'a BufferPool,
    pub wake: &'a WakeSignal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub enqueued: usize,
    pub dropped_frames: usize,
}

/// Slices newly recorded audio into fixed-size PCM chunks.
///
/// Tracks its own read cursor into the capture clip. When the worker falls
/// behind, unread audio is skipped rather than queued, so recognition
/// latency stays bounded at the cost of completeness.
pub struct Chunker {
    clip: ClipInfo,
    chunk_frames: usize,
    max_chunks_per_poll: usize,
    max_buffered_chunks: usize,
    read_pos: usize,
    interleaved: Vec<f32>,
}

impl Chunker {
    pub fn new(clip: ClipInfo, settings: &ChunkerSettings) -> Self {
        let chunk_frames = settings
            .chunk_frames
            .clamp(MIN_CHUNK_FRAMES, MAX_CHUNK_FRAMES)
            .min(clip.frames.max(1));
        let rate = clip.sample_rate.max(MIN_SAMPLE_RATE);
        let chunk_seconds = chunk_frames as f32 / rate as f32;
        let max_buffered_chunks = ((settings.max_buffered_seconds / chunk_seconds.max(0.01))
            as usize)
            .clamp(MIN_BUFFERED_CHUNKS, MAX_BUFFERED_CHUNKS);

        Self {
            clip,
            chunk_frames,
            max_chunks_per_poll: settings.max_chunks_per_poll.clamp(1, MAX_CHUNKS_PER_POLL),
            max_buffered_chunks,
            read_pos: 0,
            interleaved: vec![0.0; chunk_frames * usize::from(clip.channels.max(1))],
        }
    }

    pub fn clip(&self) -> ClipInfo {
        self.clip
    }

    pub fn chunk_frames(&self) -> usize {
        self.chunk_frames
    }

    /// Size of one mono 16-bit chunk.
    pub fn chunk_bytes(&self) -> usize {
        self.chunk_frames * 2
    }

    pub fn chunk_seconds(&self) -> f32 {
        self.chunk_frames as f32 / self.clip.sample_rate.max(MIN_SAMPLE_RATE) as f32
    }

    pub fn max_buffered_chunks(&self) -> usize {
        self.max_buffered_chunks
    }

    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    /// Frames recorded since the read cursor, accounting for wraparound.
    pub fn available_frames(&self, write_pos: usize) -> usize {
        if write_pos >= self.read_pos {
            write_pos - self.read_pos
        } else {
            write_pos + self.clip.frames - self.read_pos
        }
    }

    fn advance(&mut self, frames: usize) {
        self.read_pos = (self.read_pos + frames) % self.clip.frames.max(1);
    }

    /// Move whole chunks from the capture clip into the queue. Never blocks.
    pub fn poll<B>(&mut self, source: &mut B, sink: &ChunkSink<'_>) -> PollStats
    where
        B: CaptureBackend + ?Sized,
    {
        let mut stats = PollStats::default();
        let Some(write_pos) = source.position() else {
            return stats;
        };

        let mut available = self.available_frames(write_pos);
        if available < self.chunk_frames {
            return stats;
        }

        let queued = sink.queue.queued();
        if queued >= self.max_buffered_chunks {
            let overflow = queued - self.max_buffered_chunks + 1;
            let drop_frames = (overflow * self.chunk_frames).min(available);
            self.advance(drop_frames);
            stats.dropped_frames = drop_frames;
            tracing::trace!(queued, drop_frames, "worker behind, dropping audio");
            return stats;
        }

        let chunk_bytes = self.chunk_bytes();
        let channels = usize::from(self.clip.channels.max(1));

        while available >= self.chunk_frames
            && stats.enqueued < self.max_chunks_per_poll
            && sink.queue.queued() < self.max_buffered_chunks
        {
            source.read(self.read_pos, &mut self.interleaved);

            let mut data = sink.pool.rent();
            data.resize(chunk_bytes, 0);
            downmix_to_pcm16le(&self.interleaved, channels, &mut data);

            sink.queue.push(AudioChunk {
                data,
                len: chunk_bytes,
            });
            sink.wake.signal();

            self.advance(self.chunk_frames);
            available -= self.chunk_frames;
            stats.enqueued += 1;
        }

        stats
    }
}

/// Average interleaved float frames to mono and write them as clamped
/// 16-bit little-endian PCM into `dst` (two bytes per frame).
pub fn downmix_to_pcm16le(interleaved: &[f32], channels: usize, dst: &mut [u8]) {
    let channels = channels.max(1);
    let inv = 1.0 / channels as f32;
    for (frame, out) in interleaved
        .chunks_exact(channels)
        .zip(dst.chunks_exact_mut(2))
    {
        let mixed = if channels == 1 {
            frame[0]
        } else {
            frame.iter().sum::<f32>() * inv
        };
        let sample = (mixed.clamp(-1.0, 1.0) * 32767.0).round() as i16;
        out.copy_from_slice(&sample.to_le_bytes());
    }
}
