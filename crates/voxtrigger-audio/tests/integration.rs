use std::time::{Duration, Instant};
use voxtrigger_audio::{
    CaptureBackend, ChunkSink, Chunker, ChunkerSettings, ClipInfo, ClipRing, LevelMeter,
    MeterSettings,
};
use voxtrigger_core::{AudioError, BufferPool, PcmQueue, WakeSignal};

/// Capture backend recording into a real `ClipRing`, fed by the test.
struct SimulatedMic {
    clip: Option<ClipRing>,
    rate: u32,
    channels: u16,
}

impl SimulatedMic {
    fn new(channels: u16) -> Self {
        Self {
            clip: None,
            rate: 16000,
            channels,
        }
    }

    fn record(&mut self, samples: &[f32]) {
        if let Some(clip) = self.clip.as_mut() {
            clip.write(samples);
        }
    }
}

impl CaptureBackend for SimulatedMic {
    fn input_devices(&self) -> Result<Vec<String>, AudioError> {
        Ok(vec!["Simulated Mic".to_string()])
    }

    fn start(&mut self, _: &str, ring_seconds: u32, sample_rate: u32) -> Result<ClipInfo, AudioError> {
        self.rate = sample_rate;
        let frames = (sample_rate * ring_seconds) as usize;
        self.clip = Some(ClipRing::new(frames, self.channels));
        Ok(ClipInfo {
            sample_rate,
            channels: self.channels,
            frames,
        })
    }

    fn stop(&mut self) {
        self.clip = None;
    }

    fn is_recording(&self) -> bool {
        self.clip.is_some()
    }

    fn position(&mut self) -> Option<usize> {
        self.clip.as_ref().map(|c| c.position())
    }

    fn read(&self, start_frame: usize, out: &mut [f32]) {
        match self.clip.as_ref() {
            Some(clip) => clip.read(start_frame, out),
            None => out.fill(0.0),
        }
    }
}

fn tone(frames: usize, channels: usize, amplitude: f32) -> Vec<f32> {
    (0..frames)
        .flat_map(|i| {
            let s = amplitude * (i as f32 * 0.05).sin();
            std::iter::repeat(s).take(channels)
        })
        .collect()
}

fn pcm_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

#[test]
fn test_stereo_capture_to_mono_pcm_chunks() {
    let mut mic = SimulatedMic::new(2);
    let info = mic.start("Simulated Mic", 1, 16000).unwrap();
    let mut chunker = Chunker::new(info, &ChunkerSettings::default());

    let queue = PcmQueue::new();
    let pool = BufferPool::new(chunker.chunk_bytes());
    let wake = WakeSignal::new();
    let sink = ChunkSink {
        queue: &queue,
        pool: &pool,
        wake: &wake,
    };

    let signal = tone(512, 2, 0.5);
    mic.record(&signal);
    let stats = chunker.poll(&mut mic, &sink);
    assert_eq!(stats.enqueued, 4);

    let mut decoded = Vec::new();
    while let Some(chunk) = queue.try_pop() {
        assert_eq!(chunk.len, pool.chunk_bytes());
        decoded.extend(pcm_samples(chunk.pcm().unwrap()));
        assert!(pool.give_back(chunk.data));
    }
    assert_eq!(decoded.len(), 512);
    for (i, &s) in decoded.iter().enumerate() {
        let expected = (signal[i * 2] * 32767.0).round() as i16;
        assert_eq!(s, expected, "frame {i}");
    }
    assert_eq!(pool.idle(), 4);
}

#[test]
fn test_slow_consumer_keeps_queue_bounded() {
    let mut mic = SimulatedMic::new(1);
    let info = mic.start("Simulated Mic", 10, 16000).unwrap();
    let mut chunker = Chunker::new(info, &ChunkerSettings::default());
    let limit = chunker.max_buffered_chunks();

    let queue = PcmQueue::new();
    let pool = BufferPool::new(chunker.chunk_bytes());
    let wake = WakeSignal::new();
    let sink = ChunkSink {
        queue: &queue,
        pool: &pool,
        wake: &wake,
    };

    let mut dropped = 0;
    for tick in 0..200 {
        // Two chunks recorded per tick, one consumed every other tick
        mic.record(&tone(256, 1, 0.1));
        dropped += chunker.poll(&mut mic, &sink).dropped_frames;
        assert!(queue.queued() <= limit);
        if tick % 2 == 0 {
            if let Some(chunk) = queue.try_pop() {
                pool.give_back(chunk.data);
            }
        }
    }
    assert!(dropped > 0);
}

#[test]
fn test_fast_consumer_never_drops() {
    let mut mic = SimulatedMic::new(1);
    let info = mic.start("Simulated Mic", 1, 16000).unwrap();
    let mut chunker = Chunker::new(info, &ChunkerSettings::default());

    let queue = PcmQueue::new();
    let pool = BufferPool::new(chunker.chunk_bytes());
    let wake = WakeSignal::new();
    let sink = ChunkSink {
        queue: &queue,
        pool: &pool,
        wake: &wake,
    };

    let mut total = 0;
    // Several passes around the one-second ring
    for _ in 0..150 {
        mic.record(&tone(256, 1, 0.1));
        let stats = chunker.poll(&mut mic, &sink);
        assert_eq!(stats.dropped_frames, 0);
        total += stats.enqueued;
        queue.drain_into(&pool);
    }
    assert_eq!(total, 300);
    assert!(wake.wait(Duration::from_millis(1)));
}

#[test]
fn test_meter_tracks_recording_then_decays() {
    let mut mic = SimulatedMic::new(1);
    let info = mic.start("Simulated Mic", 1, 16000).unwrap();
    mic.record(&vec![0.25; 4096]);

    let mut meter = LevelMeter::new(&MeterSettings::default());
    let t0 = Instant::now();
    meter.update(&mut mic, Some(info), t0);
    assert!((meter.level() - 0.25).abs() < 1e-4);

    mic.stop();
    meter.update(&mut mic, None, t0 + Duration::from_millis(50));
    assert_eq!(meter.level(), 0.0);
}
