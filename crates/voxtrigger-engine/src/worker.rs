use crate::command::{RecognizerConfig, WorkerCommand};
use crate::engine_trait::Recognizer;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use voxtrigger_core::{AudioChunk, BufferPool, Mailbox, PcmQueue, ResultPacket, WakeSignal};

/// Chunks fed per loop iteration before commands are looked at again.
pub const MAX_CHUNKS_PER_ITERATION: usize = 64;
const IDLE_WAIT: Duration = Duration::from_millis(10);
const READY_WAIT: Duration = Duration::from_millis(5);
pub const STOP_TIMEOUT: Duration = Duration::from_millis(500);

// ── WorkerShared ───────────────────────────────────────────────

/// State shared between the control thread and the recognition worker.
pub struct WorkerShared {
    pub commands: Mailbox<WorkerCommand>,
    pub results: Mailbox<ResultPacket>,
    pub audio: PcmQueue,
    pub wake: WakeSignal,
    pub pool: BufferPool,
    ready: AtomicBool,
    running: AtomicBool,
}

impl WorkerShared {
    pub fn new(chunk_bytes: usize) -> Self {
        Self {
            commands: Mailbox::new(),
            results: Mailbox::new(),
            audio: PcmQueue::new(),
            wake: WakeSignal::new(),
            pool: BufferPool::new(chunk_bytes),
            ready: AtomicBool::new(false),
            running: AtomicBool::new(false),
        }
    }

    /// A recognizer exists and is accepting audio.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn drain_audio(&self) -> usize {
        self.audio.drain_into(&self.pool)
    }
}

// ── RecognitionWorker ──────────────────────────────────────────

struct ActiveRecognizer {
    recognizer: Box<dyn Recognizer>,
    partial_enabled: bool,
    partial_stride: u32,
    partial_counter: u32,
}

/// Background loop owning the recognizer.
pub struct RecognitionWorker {
    shared: Arc<WorkerShared>,
    active: Option<ActiveRecognizer>,
}

impl RecognitionWorker {
    pub fn new(shared: Arc<WorkerShared>) -> Self {
        Self {
            shared,
            active: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.active.is_some()
    }

    /// Apply every pending command. Returns `(did_something, keep_running)`.
    pub fn process_commands(&mut self) -> (bool, bool) {
        let mut did_something = false;
        while let Some(cmd) = self.shared.commands.try_take() {
            did_something = true;
            match cmd {
                WorkerCommand::Stop => return (true, false),
                WorkerCommand::Reset => {
                    if let Some(active) = self.active.as_mut() {
                        active.recognizer.reset();
                        tracing::debug!("recognizer reset");
                    }
                }
                WorkerCommand::Configure(config) => self.configure(config),
            }
        }
        (did_something, true)
    }

    fn configure(&mut self, config: RecognizerConfig) {
        self.shared.ready.store(false, Ordering::Release);
        let drained = self.shared.drain_audio();
        if drained > 0 {
            tracing::debug!(drained, "discarded queued audio on reconfigure");
        }
        self.active = None;

        let Some(model) = config.model.as_ref() else {
            return;
        };
        if config.sample_rate == 0 {
            return;
        }

        match model.create_recognizer(config.sample_rate, config.grammar.as_deref()) {
            Ok(mut recognizer) => {
                recognizer.set_words(config.word_details);
                self.active = Some(ActiveRecognizer {
                    recognizer,
                    partial_enabled: config.partial_enabled,
                    partial_stride: config.partial_stride.max(1),
                    partial_counter: 0,
                });
                self.shared.ready.store(true, Ordering::Release);
                tracing::info!(
                    engine = model.name(),
                    sample_rate = config.sample_rate,
                    grammar = config.grammar.is_some(),
                    "recognizer ready"
                );
            }
            Err(e) => {
                tracing::error!("failed to create recognizer: {}", e);
            }
        }
    }

    /// Feed up to [`MAX_CHUNKS_PER_ITERATION`] queued chunks. Returns how
    /// many were taken off the queue.
    pub fn process_audio(&mut self) -> usize {
        let Some(active) = self.active.as_mut() else {
            return 0;
        };

        let mut processed = 0;
        while processed < MAX_CHUNKS_PER_ITERATION {
            let Some(chunk) = self.shared.audio.try_pop() else {
                break;
            };
            feed_chunk(active, &chunk, &self.shared.results);
            self.shared.pool.give_back(chunk.data);
            processed += 1;
        }
        processed
    }

    /// Run until a `Stop` command arrives or the running flag is cleared.
    pub fn run(&mut self) {
        while self.shared.is_running() {
            let (mut did_something, keep_running) = self.process_commands();
            if !keep_running {
                break;
            }

            if self.active.is_none() {
                if !did_something {
                    self.shared.wake.wait(IDLE_WAIT);
                }
                continue;
            }

            did_something |= self.process_audio() > 0;
            if !did_something {
                self.shared.wake.wait(READY_WAIT);
            }
        }

        self.active = None;
        self.shared.ready.store(false, Ordering::Release);
        self.shared.running.store(false, Ordering::Release);
        self.shared.drain_audio();
        tracing::debug!("recognition worker exited");
    }

    /// Spawn the worker on a dedicated thread.
    pub fn start(mut self) -> std::io::Result<WorkerHandle> {
        let shared = Arc::clone(&self.shared);
        shared.running.store(true, Ordering::Release);
        // Dropped when the thread exits, which disconnects `done`.
        let (done_tx, done) = crossbeam_channel::bounded::<()>(1);
        let spawned = std::thread::Builder::new()
            .name("recognizer".into())
            .spawn(move || {
                let _done_tx = done_tx;
                self.run();
            });
        match spawned {
            Ok(thread) => Ok(WorkerHandle {
                shared,
                thread: Some(thread),
                done,
            }),
            Err(e) => {
                shared.running.store(false, Ordering::Release);
                Err(e)
            }
        }
    }
}

fn feed_chunk(active: &mut ActiveRecognizer, chunk: &AudioChunk, results: &Mailbox<ResultPacket>) {
    let Some(pcm) = chunk.pcm() else {
        tracing::trace!(len = chunk.len, "skipping malformed chunk");
        return;
    };

    let finalized = match active.recognizer.accept_waveform(pcm) {
        Ok(finalized) => finalized,
        Err(e) => {
            tracing::warn!("dropping chunk: {}", e);
            return;
        }
    };

    if finalized {
        post_if_present(results, true, active.recognizer.final_result());
    } else if active.partial_enabled {
        active.partial_counter += 1;
        if active.partial_counter >= active.partial_stride {
            active.partial_counter = 0;
            post_if_present(results, false, active.recognizer.partial_result());
        }
    }
}

fn post_if_present(results: &Mailbox<ResultPacket>, is_final: bool, payload: String) {
    if payload.trim().is_empty() {
        return;
    }
    results.post(ResultPacket { is_final, payload });
}

// ── WorkerHandle ───────────────────────────────────────────────

pub struct WorkerHandle {
    shared: Arc<WorkerShared>,
    thread: Option<JoinHandle<()>>,
    done: Receiver<()>,
}

impl WorkerHandle {
    pub fn shared(&self) -> &Arc<WorkerShared> {
        &self.shared
    }

    pub fn post(&self, cmd: WorkerCommand) {
        self.shared.commands.post(cmd);
        self.shared.wake.signal();
    }

    pub fn configure(&self, config: RecognizerConfig) {
        self.post(WorkerCommand::Configure(config));
    }

    pub fn reset(&self) {
        self.post(WorkerCommand::Reset);
    }

    pub fn try_result(&self) -> Option<ResultPacket> {
        self.shared.results.try_take()
    }

    pub fn is_ready(&self) -> bool {
        self.shared.is_ready()
    }

    /// Ask the worker to exit and wait up to [`STOP_TIMEOUT`] for it.
    /// Returns `false` if the thread was left running detached.
    pub fn stop(mut self) -> bool {
        self.shutdown(STOP_TIMEOUT)
    }

    fn shutdown(&mut self, timeout: Duration) -> bool {
        let Some(thread) = self.thread.take() else {
            return true;
        };
        self.shared.commands.post(WorkerCommand::Stop);
        self.shared.running.store(false, Ordering::Release);
        self.shared.wake.signal();

        if let Err(RecvTimeoutError::Timeout) = self.done.recv_timeout(timeout) {
            tracing::warn!("recognition worker did not stop within {:?}, detaching", timeout);
            self.shared.ready.store(false, Ordering::Release);
            return false;
        }
        if thread.join().is_err() {
            tracing::error!("recognition worker panicked");
        }
        true
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.shutdown(STOP_TIMEOUT);
    }
}
