/// Circular interleaved recording buffer with a frame-granular write cursor.
///
/// Mirrors a looping recording clip: writes wrap at the end and the cursor
/// reports where the next frame will land.
pub struct ClipRing {
    samples: Vec<f32>,
    channels: usize,
    write_sample: usize,
}

impl ClipRing {
    pub fn new(frames: usize, channels: u16) -> Self {
        let channels = usize::from(channels.max(1));
        Self {
            samples: vec![0.0; frames.max(1) * channels],
            channels,
            write_sample: 0,
        }
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Frame index the next write starts at.
    pub fn position(&self) -> usize {
        self.write_sample / self.channels
    }

    pub fn write(&mut self, data: &[f32]) {
        let len = self.samples.len();
        // Only the newest `len` samples can survive a single write.
        let data = if data.len() > len {
            let skip = data.len() - len;
            self.write_sample = (self.write_sample + skip) % len;
            &data[skip..]
        } else {
            data
        };

        let first = (len - self.write_sample).min(data.len());
        self.samples[self.write_sample..self.write_sample + first].copy_from_slice(&data[..first]);
        let rest = data.len() - first;
        if rest > 0 {
            self.samples[..rest].copy_from_slice(&data[first..]);
        }
        self.write_sample = (self.write_sample + data.len()) % len;
    }

    /// Copy `out.len()` interleaved samples starting at `start_frame`,
    /// wrapping around the end of the ring.
    pub fn read(&self, start_frame: usize, out: &mut [f32]) {
        let len = self.samples.len();
        let mut idx = (start_frame % self.frames()) * self.channels;
        for slot in out.iter_mut() {
            *slot = self.samples[idx];
            idx += 1;
            if idx == len {
                idx = 0;
            }
        }
    }
}
