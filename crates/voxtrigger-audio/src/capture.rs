use crate::clip::ClipRing;
use crate::device::DeviceManager;
use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use voxtrigger_core::AudioError;

/// Shape of an active recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipInfo {
    pub sample_rate: u32,
    pub channels: u16,
    /// Ring length in frames.
    pub frames: usize,
}

/// A microphone recording continuously into a looping clip.
///
/// The control thread polls [`position`](Self::position) for the write
/// cursor and copies windows out with [`read`](Self::read). Only one
/// recording is active at a time.
pub trait CaptureBackend {
    fn input_devices(&self) -> Result<Vec<String>, AudioError>;
    fn start(&mut self, device: &str, ring_seconds: u32, sample_rate: u32)
        -> Result<ClipInfo, AudioError>;
    fn stop(&mut self);
    fn is_recording(&self) -> bool;
    /// Current write cursor in frames, or `None` when not recording.
    fn position(&mut self) -> Option<usize>;
    /// Fill `out` with interleaved samples starting at `start_frame`.
    fn read(&self, start_frame: usize, out: &mut [f32]);
}

// ── CpalCapture ───────────────────────────────────────────────

struct ActiveCapture {
    _stream: Stream,
    consumer: HeapCons<f32>,
    clip: ClipRing,
    failed: Arc<AtomicBool>,
    transfer: Vec<f32>,
}

impl ActiveCapture {
    /// Move everything the audio callback produced into the clip.
    fn pump(&mut self) {
        loop {
            let n = self.consumer.pop_slice(&mut self.transfer);
            if n == 0 {
                break;
            }
            self.clip.write(&self.transfer[..n]);
        }
    }
}

/// [`CaptureBackend`] on top of a cpal input stream.
///
/// The stream callback only pushes samples into a lock-free ring; the clip
/// itself is filled on the control thread when the cursor is polled.
pub struct CpalCapture {
    devices: DeviceManager,
    active: Option<ActiveCapture>,
}

impl CpalCapture {
    pub fn new() -> Self {
        Self {
            devices: DeviceManager::new(),
            active: None,
        }
    }
}

impl Default for CpalCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for CpalCapture {
    fn input_devices(&self) -> Result<Vec<String>, AudioError> {
        self.devices.input_device_names()
    }

    fn start(
        &mut self,
        device_name: &str,
        ring_seconds: u32,
        sample_rate: u32,
    ) -> Result<ClipInfo, AudioError> {
        self.stop();

        let device = self.devices.resolve_input(device_name)?;
        let (config, format) = select_input_config(&device, sample_rate)?;
        let rate = config.sample_rate.0;
        let channels = config.channels;

        // Callback → control thread hand-off; one second of headroom.
        let transfer_len = rate as usize * usize::from(channels);
        let (producer, consumer) = HeapRb::<f32>::new(transfer_len).split();
        let failed = Arc::new(AtomicBool::new(false));

        let stream = match format {
            SampleFormat::F32 => build_stream::<f32, _>(&device, &config, producer, &failed, |s| s),
            SampleFormat::I16 => {
                build_stream::<i16, _>(&device, &config, producer, &failed, |s| s as f32 / 32768.0)
            }
            SampleFormat::U16 => build_stream::<u16, _>(&device, &config, producer, &failed, |s| {
                (s as f32 - 32768.0) / 32768.0
            }),
            other => return Err(AudioError::UnsupportedFormat(format!("{other:?}"))),
        }?;
        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        let frames = rate as usize * ring_seconds.max(1) as usize;
        tracing::info!(
            device = %device_name,
            sample_rate = rate,
            channels,
            ring_frames = frames,
            "capture started"
        );

        self.active = Some(ActiveCapture {
            _stream: stream,
            consumer,
            clip: ClipRing::new(frames, channels),
            failed,
            transfer: vec![0.0; 4096],
        });

        Ok(ClipInfo {
            sample_rate: rate,
            channels,
            frames,
        })
    }

    fn stop(&mut self) {
        if self.active.take().is_some() {
            tracing::info!("capture stopped");
        }
    }

    fn is_recording(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| !a.failed.load(Ordering::Relaxed))
    }

    fn position(&mut self) -> Option<usize> {
        let active = self.active.as_mut()?;
        active.pump();
        Some(active.clip.position())
    }

    fn read(&self, start_frame: usize, out: &mut [f32]) {
        match self.active.as_ref() {
            Some(active) => active.clip.read(start_frame, out),
            None => out.fill(0.0),
        }
    }
}

/// Prefer the requested rate at the device's default format and channel
/// count; fall back to the device default.
fn select_input_config(
    device: &Device,
    sample_rate: u32,
) -> Result<(StreamConfig, SampleFormat), AudioError> {
    let default = device
        .default_input_config()
        .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;

    if let Ok(ranges) = device.supported_input_configs() {
        for range in ranges {
            if range.sample_format() == default.sample_format()
                && range.channels() == default.channels()
                && range.min_sample_rate().0 <= sample_rate
                && sample_rate <= range.max_sample_rate().0
            {
                let supported = range.with_sample_rate(SampleRate(sample_rate));
                return Ok((supported.config(), supported.sample_format()));
            }
        }
    }

    tracing::warn!(
        requested = sample_rate,
        using = default.sample_rate().0,
        "requested sample rate unsupported, using device default"
    );
    Ok((default.config(), default.sample_format()))
}

fn build_stream<T, F>(
    device: &Device,
    config: &StreamConfig,
    mut producer: HeapProd<f32>,
    failed: &Arc<AtomicBool>,
    convert: F,
) -> Result<Stream, AudioError>
where
    T: SizedSample,
    F: Fn(T) -> f32 + Send + 'static,
{
    let status_flag = Arc::clone(failed);
    let err_callback = move |err: cpal::StreamError| {
        tracing::error!("capture stream error: {}", err);
        status_flag.store(true, Ordering::Relaxed);
    };

    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                scratch.clear();
                scratch.extend(data.iter().map(|s| convert(*s)));
                // Overflow is dropped; the control thread is far behind anyway.
                producer.push_slice(&scratch);
            },
            err_callback,
            None,
        )
        .map_err(|e| AudioError::StreamBuild(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpal_capture_idle_state() {
        let mut capture = CpalCapture::new();
        assert!(!capture.is_recording());
        assert_eq!(capture.position(), None);

        let mut out = [1.0f32; 4];
        capture.read(0, &mut out);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn test_cpal_capture_stop_when_idle_is_noop() {
        let mut capture = CpalCapture::new();
        capture.stop();
        assert!(!capture.is_recording());
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_cpal_capture_records_default_device() {
        let mut capture = CpalCapture::new();
        let info = capture.start("default", 2, 16000).unwrap();
        assert!(info.frames > 0);
        std::thread::sleep(std::time::Duration::from_millis(200));
        assert!(capture.is_recording());
        assert!(capture.position().unwrap() > 0);
        capture.stop();
        assert!(!capture.is_recording());
    }
}
