use crate::capture::{CaptureBackend, ClipInfo};
use std::time::{Duration, Instant};

pub const MIN_METER_WINDOW: usize = 256;
pub const MAX_METER_WINDOW: usize = 8192;

/// Falls from full scale to silence in 100 ms once recording stops.
const DECAY_PER_SECOND: f32 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct MeterSettings {
    pub sample_window: usize,
    pub gain: f32,
    pub update_interval: f32,
}

impl Default for MeterSettings {
    fn default() -> Self {
        Self {
            sample_window: 1024,
            gain: 1.0,
            update_interval: 0.06,
        }
    }
}

/// Throttled microphone level in `[0, 1]`.
pub struct LevelMeter {
    window: usize,
    gain: f32,
    interval: Duration,
    next_update: Option<Instant>,
    last_tick: Option<Instant>,
    level: f32,
    scratch: Vec<f32>,
}

impl LevelMeter {
    pub fn new(settings: &MeterSettings) -> Self {
        let mut meter = Self {
            window: MIN_METER_WINDOW,
            gain: 1.0,
            interval: Duration::ZERO,
            next_update: None,
            last_tick: None,
            level: 0.0,
            scratch: Vec::new(),
        };
        meter.configure(settings);
        meter
    }

    pub fn configure(&mut self, settings: &MeterSettings) {
        self.window = settings.sample_window.clamp(MIN_METER_WINDOW, MAX_METER_WINDOW);
        self.gain = settings.gain.clamp(0.1, 10.0);
        self.interval = Duration::from_secs_f32(settings.update_interval.clamp(0.02, 0.25));
        self.next_update = None;
        self.scratch.clear();
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
        self.next_update = None;
        self.last_tick = None;
    }

    /// Advance the meter. `clip` is `None` while not recording, in which
    /// case the level decays towards zero.
    pub fn update<B>(&mut self, source: &mut B, clip: Option<ClipInfo>, now: Instant)
    where
        B: CaptureBackend + ?Sized,
    {
        let dt = self
            .last_tick
            .map(|t| now.saturating_duration_since(t).as_secs_f32())
            .unwrap_or(0.0);
        self.last_tick = Some(now);

        let Some(clip) = clip.filter(|_| source.is_recording()) else {
            self.level = (self.level - dt * DECAY_PER_SECOND).max(0.0);
            return;
        };

        if self.next_update.is_some_and(|next| now < next) {
            return;
        }
        self.next_update = Some(now + self.interval);

        let pos = match source.position() {
            Some(pos) if pos > 0 => pos,
            _ => return,
        };

        let window = self.window.min(clip.frames);
        let start = (pos + clip.frames - window) % clip.frames;
        let channels = usize::from(clip.channels.max(1));
        self.scratch.resize(window * channels, 0.0);
        source.read(start, &mut self.scratch);

        self.level = (rms_level(&self.scratch, channels) * self.gain).clamp(0.0, 1.0);
    }
}

/// RMS of interleaved samples after averaging channels.
pub fn rms_level(interleaved: &[f32], channels: usize) -> f32 {
    let channels = channels.max(1);
    let frames = interleaved.len() / channels;
    if frames == 0 {
        return 0.0;
    }
    let sum: f64 = interleaved
        .chunks_exact(channels)
        .map(|frame| {
            let m = frame.iter().map(|&s| f64::from(s)).sum::<f64>() / channels as f64;
            m * m
        })
        .sum();
    (sum / frames as f64).sqrt() as f32
}
