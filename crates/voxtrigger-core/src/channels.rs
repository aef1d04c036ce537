//! One-way queues between the control thread and the recognition worker.
//!
//! Every queue is FIFO and never blocks the producer. There is no ordering
//! between queues: a command posted after some audio is only seen once the
//! worker finishes its current batch.

use crate::pool::BufferPool;
use crate::types::AudioChunk;
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// ── Mailbox ───────────────────────────────────────────────────

/// Unbounded FIFO holding both ends, so either thread can post or take.
pub struct Mailbox<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub fn post(&self, item: T) {
        // Both ends live in `self`, so the channel cannot be disconnected.
        let _ = self.tx.send(item);
    }

    pub fn try_take(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ── PcmQueue ──────────────────────────────────────────────────

/// Capture → worker audio queue with a cheap queued-chunk counter used for
/// backpressure decisions.
pub struct PcmQueue {
    chunks: Mailbox<AudioChunk>,
    queued: AtomicUsize,
}

impl PcmQueue {
    pub fn new() -> Self {
        Self {
            chunks: Mailbox::new(),
            queued: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, chunk: AudioChunk) {
        self.queued.fetch_add(1, Ordering::AcqRel);
        self.chunks.post(chunk);
    }

    pub fn try_pop(&self) -> Option<AudioChunk> {
        let chunk = self.chunks.try_take()?;
        self.queued.fetch_sub(1, Ordering::AcqRel);
        Some(chunk)
    }

    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Discard all queued audio, returning the buffers to `pool`.
    pub fn drain_into(&self, pool: &BufferPool) -> usize {
        let mut drained = 0;
        while let Some(chunk) = self.try_pop() {
            pool.give_back(chunk.data);
            drained += 1;
        }
        drained
    }
}

impl Default for PcmQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ── WakeSignal ────────────────────────────────────────────────

/// Auto-reset wake-up for the worker. Signals coalesce: any number of
/// `signal()` calls before a `wait()` release exactly one waiter.
pub struct WakeSignal {
    tx: Sender<()>,
    rx: Receiver<()>,
}

impl WakeSignal {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self { tx, rx }
    }

    pub fn signal(&self) {
        // Full means a wake-up is already pending.
        let _ = self.tx.try_send(());
    }

    /// Block until signalled or `timeout` elapses. Returns `true` if signalled.
    pub fn wait(&self, timeout: Duration) -> bool {
        self.rx.recv_timeout(timeout).is_ok()
    }
}

impl Default for WakeSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    fn chunk(tag: u8, pool: &BufferPool) -> AudioChunk {
        let mut data = pool.rent();
        data[0] = tag;
        let len = data.len();
        AudioChunk { data, len }
    }

    #[test]
    fn test_mailbox_preserves_fifo_order() {
        let mailbox = Mailbox::new();
        for i in 0..5 {
            mailbox.post(i);
        }
        let taken: Vec<_> = std::iter::from_fn(|| mailbox.try_take()).collect();
        assert_eq!(taken, vec![0, 1, 2, 3, 4]);
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_pcm_queue_counts_chunks() {
        let pool = BufferPool::new(8);
        let queue = PcmQueue::new();
        queue.push(chunk(1, &pool));
        queue.push(chunk(2, &pool));
        assert_eq!(queue.queued(), 2);

        let first = queue.try_pop().unwrap();
        assert_eq!(first.data[0], 1);
        assert_eq!(queue.queued(), 1);
    }

    #[test]
    fn test_pcm_queue_drain_returns_buffers() {
        let pool = BufferPool::new(8);
        let queue = PcmQueue::new();
        for i in 0..4 {
            queue.push(chunk(i, &pool));
        }
        assert_eq!(queue.drain_into(&pool), 4);
        assert_eq!(queue.queued(), 0);
        assert_eq!(pool.idle(), 4);
    }

    #[test]
    fn test_pcm_queue_cross_thread_order() {
        let pool = Arc::new(BufferPool::new(8));
        let queue = Arc::new(PcmQueue::new());
        let producer_queue = Arc::clone(&queue);
        let producer_pool = Arc::clone(&pool);

        std::thread::spawn(move || {
            for i in 0..32u8 {
                producer_queue.push(chunk(i, &producer_pool));
            }
        })
        .join()
        .unwrap();

        let tags: Vec<u8> = std::iter::from_fn(|| queue.try_pop())
            .map(|c| c.data[0])
            .collect();
        assert_eq!(tags, (0..32u8).collect::<Vec<_>>());
    }

    #[test]
    fn test_wake_signal_times_out_when_idle() {
        let wake = WakeSignal::new();
        let start = Instant::now();
        assert!(!wake.wait(Duration::from_millis(10)));
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_wake_signal_coalesces() {
        let wake = WakeSignal::new();
        wake.signal();
        wake.signal();
        wake.signal();
        assert!(wake.wait(Duration::from_millis(10)));
        assert!(!wake.wait(Duration::from_millis(5)));
    }

    #[test]
    fn test_wake_signal_releases_waiter_on_other_thread() {
        let wake = Arc::new(WakeSignal::new());
        let waiter = Arc::clone(&wake);
        let handle = std::thread::spawn(move || waiter.wait(Duration::from_secs(2)));
        std::thread::sleep(Duration::from_millis(20));
        wake.signal();
        assert!(handle.join().unwrap());
    }
}
