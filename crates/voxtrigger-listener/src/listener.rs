use crate::events::EventBus;
use crate::gate::PartialGate;
use std::sync::Arc;
use std::time::Instant;
use voxtrigger_audio::chunker::{
    MAX_CHUNK_FRAMES, MAX_RING_SECONDS, MAX_SAMPLE_RATE, MIN_CHUNK_FRAMES, MIN_RING_SECONDS,
    MIN_SAMPLE_RATE,
};
use voxtrigger_audio::{
    CaptureBackend, ChunkSink, Chunker, ChunkerSettings, ClipInfo, LevelMeter, MeterSettings,
};
use voxtrigger_core::{
    build_grammar, normalize, AppConfig, AsrError, ConfigDiff, EnginePayload, KeywordEvent,
    MatchPolicy, SpeechMode, Vocabulary, UNKNOWN_TOKEN,
};
use voxtrigger_engine::{
    partial_stride, RecognitionWorker, RecognizerConfig, SpeechModel, WorkerHandle, WorkerShared,
};

/// Confidence reported for keywords picked from transcript text rather than
/// engine word details.
pub const TEXT_MATCH_CONFIDENCE: f32 = 0.99;

/// Produces the speech model on demand. Called again on later ticks until
/// it succeeds.
pub type ModelSource = Box<dyn FnMut() -> Result<Arc<dyn SpeechModel>, AsrError>>;

#[derive(Debug, Clone, PartialEq)]
pub struct ListenerSettings {
    pub sample_rate: u32,
    pub ring_seconds: u32,
    pub chunker: ChunkerSettings,
    pub meter: MeterSettings,
    pub mode: SpeechMode,
    pub use_grammar: bool,
    pub include_unknown: bool,
    pub best_match_only: bool,
    pub min_word_confidence: f32,
    pub match_policy: MatchPolicy,
    pub word_details: bool,
    pub partial_enabled: bool,
    pub partial_interval: f32,
    pub stability_frames: u32,
    pub log_final_text: bool,
    pub log_rejected: bool,
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl ListenerSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            sample_rate: config.capture.sample_rate,
            ring_seconds: config.capture.ring_seconds,
            chunker: ChunkerSettings {
                chunk_frames: config.capture.chunk_frames as usize,
                max_chunks_per_poll: config.capture.max_chunks_per_poll as usize,
                max_buffered_seconds: config.capture.max_buffered_seconds,
            },
            meter: MeterSettings {
                sample_window: config.meter.sample_window,
                gain: config.meter.gain,
                update_interval: config.meter.update_interval,
            },
            mode: config.keywords.mode,
            use_grammar: config.keywords.use_grammar,
            include_unknown: config.keywords.include_unknown,
            best_match_only: config.keywords.best_match_only,
            min_word_confidence: config.keywords.min_word_confidence,
            match_policy: MatchPolicy::default(),
            word_details: config.engine.word_details,
            partial_enabled: config.partial.enabled,
            partial_interval: config.engine.partial_interval,
            stability_frames: config.partial.stability_frames,
            log_final_text: config.debug.log_final_text,
            log_rejected: config.debug.log_rejected,
        }
    }

    fn grammar_enabled(&self) -> bool {
        self.mode == SpeechMode::Keyword && self.use_grammar
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListenerStatus {
    pub listening: bool,
    pub model_loaded: bool,
    pub recognizer_ready: bool,
    pub device: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
    pub chunk_frames: usize,
    pub grammar_enabled: bool,
    pub queued_chunks: usize,
    pub last_error: Option<String>,
}

/// Continuously listening keyword spotter.
///
/// Everything here runs on the caller's (control) thread: [`tick`](Self::tick)
/// moves captured audio to the recognition worker and turns its results into
/// `on_keyword` / `on_final_text` callbacks. Only the recognizer itself lives
/// on the worker thread.
pub struct KeywordListener<B: CaptureBackend> {
    capture: B,
    settings: ListenerSettings,
    model_source: ModelSource,
    model: Option<Arc<dyn SpeechModel>>,
    worker: Option<WorkerHandle>,
    device: Option<String>,
    clip: Option<ClipInfo>,
    chunker: Option<Chunker>,
    meter: LevelMeter,
    vocabulary: Vocabulary,
    gate: PartialGate,
    events: EventBus,
    listening_requested: bool,
    last_error: Option<String>,
}

impl<B: CaptureBackend> KeywordListener<B> {
    pub fn new(
        capture: B,
        settings: ListenerSettings,
        model_source: impl FnMut() -> Result<Arc<dyn SpeechModel>, AsrError> + 'static,
    ) -> Self {
        Self {
            capture,
            meter: LevelMeter::new(&settings.meter),
            gate: PartialGate::new(settings.stability_frames),
            settings,
            model_source: Box::new(model_source),
            model: None,
            worker: None,
            device: None,
            clip: None,
            chunker: None,
            vocabulary: Vocabulary::new(),
            events: EventBus::new(),
            listening_requested: false,
            last_error: None,
        }
    }

    pub fn capture(&self) -> &B {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut B {
        &mut self.capture
    }

    pub fn settings(&self) -> &ListenerSettings {
        &self.settings
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    // ── Public operations ──────────────────────────────────────

    pub fn start_listening(&mut self) {
        self.listening_requested = true;

        if self.device.is_none() {
            self.device = self.input_devices().into_iter().next();
            if let Some(device) = &self.device {
                tracing::info!(device = %device, "no input device selected, using first available");
            }
        }

        self.ensure_model();
        self.start_worker_if_needed();
        self.start_mic();
        self.request_rebuild();
    }

    /// Stop feeding the recognizer. The microphone keeps running so the
    /// level meter stays live.
    pub fn stop_listening(&mut self) {
        self.listening_requested = false;
        self.gate.reset();
        self.reset_recognizer();
    }

    pub fn reset_recognizer(&mut self) {
        if let Some(worker) = &self.worker {
            worker.reset();
        }
    }

    pub fn set_mic_device(&mut self, device: Option<&str>) {
        self.device = device
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        self.gate.reset();

        self.stop_mic();
        if self.listening_requested {
            self.start_mic();
            self.request_rebuild();
        }
    }

    pub fn input_devices(&self) -> Vec<String> {
        match self.capture.input_devices() {
            Ok(devices) => devices,
            Err(e) => {
                tracing::warn!("failed to list input devices: {}", e);
                Vec::new()
            }
        }
    }

    pub fn set_speech_mode(&mut self, mode: SpeechMode) {
        self.settings.mode = mode;
        self.request_rebuild();
    }

    pub fn set_keywords<I, S>(&mut self, keywords: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.vocabulary = Vocabulary::from_keywords(keywords);
        tracing::debug!(count = self.vocabulary.len(), "vocabulary updated");
        self.request_rebuild();
    }

    /// Apply new tuning. Capture shape (rate, chunk size, ring length) takes
    /// effect the next time the microphone starts.
    pub fn update_settings(&mut self, settings: ListenerSettings) {
        self.meter.configure(&settings.meter);
        if settings.stability_frames != self.gate.threshold() {
            self.gate.set_threshold(settings.stability_frames);
        }
        self.settings = settings;
        self.request_rebuild();
    }

    /// Apply the runtime-reloadable part of a config change, reconfiguring
    /// the recognizer once.
    pub fn apply_config_diff(&mut self, diff: &ConfigDiff, config: &AppConfig) {
        for reason in &diff.non_reloadable {
            tracing::warn!("{}", reason);
        }

        if diff.tuning_changed || diff.mode.is_some() {
            let mut settings = ListenerSettings::from_config(config);
            settings.sample_rate = self.settings.sample_rate;
            settings.ring_seconds = self.settings.ring_seconds;
            settings.chunker.chunk_frames = self.settings.chunker.chunk_frames;
            settings.match_policy = self.settings.match_policy;
            self.meter.configure(&settings.meter);
            if settings.stability_frames != self.gate.threshold() {
                self.gate.set_threshold(settings.stability_frames);
            }
            self.settings = settings;
        }
        if let Some(words) = &diff.keywords {
            self.vocabulary = Vocabulary::from_keywords(words);
        }

        match &diff.device {
            Some(device) => self.set_mic_device(Some(device)),
            None if !diff.is_empty() => self.request_rebuild(),
            None => {}
        }
    }

    /// One control-thread step: meter, capture hand-off, result dispatch.
    /// Never blocks.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    pub fn tick_at(&mut self, now: Instant) {
        let clip = self.clip.filter(|_| self.capture.is_recording());
        self.meter.update(&mut self.capture, clip, now);
        self.capture_to_worker();
        self.drain_results();
    }

    pub fn status(&self) -> ListenerStatus {
        let recognizer_ready = self.worker.as_ref().is_some_and(|w| w.is_ready());
        ListenerStatus {
            listening: self.listening_requested
                && self.chunker.is_some()
                && self.device.is_some()
                && self.capture.is_recording()
                && recognizer_ready,
            model_loaded: self.model.is_some(),
            recognizer_ready,
            device: self.device.clone(),
            sample_rate: self.clip.map(|c| c.sample_rate).unwrap_or(0),
            channels: self.clip.map(|c| c.channels).unwrap_or(0),
            chunk_frames: self.chunker.as_ref().map(Chunker::chunk_frames).unwrap_or(0),
            grammar_enabled: self.settings.grammar_enabled(),
            queued_chunks: self
                .worker
                .as_ref()
                .map(|w| w.shared().audio.queued())
                .unwrap_or(0),
            last_error: self.last_error.clone(),
        }
    }

    pub fn mic_level(&self) -> f32 {
        self.meter.level()
    }

    pub fn on_keyword(&mut self, observer: impl FnMut(&KeywordEvent) + 'static) {
        self.events.on_keyword(observer);
    }

    pub fn on_final_text(&mut self, observer: impl FnMut(&str) + 'static) {
        self.events.on_final_text(observer);
    }

    pub fn shutdown(&mut self) {
        self.listening_requested = false;
        if let Some(worker) = self.worker.take() {
            if !worker.stop() {
                tracing::warn!("recognition worker abandoned during shutdown");
            }
        }
        self.model = None;
        self.stop_mic();
    }

    // ── Model, worker and microphone lifecycle ─────────────────

    fn ensure_model(&mut self) {
        if self.model.is_some() {
            return;
        }
        match (self.model_source)() {
            Ok(model) => {
                tracing::info!(engine = model.name(), "speech model loaded");
                self.model = Some(model);
                self.last_error = None;
            }
            Err(e) => {
                let message = e.to_string();
                // Retried every tick; only log when the reason changes.
                if self.last_error.as_deref() != Some(message.as_str()) {
                    tracing::warn!("speech model unavailable: {}", message);
                }
                self.last_error = Some(message);
            }
        }
    }

    fn start_worker_if_needed(&mut self) {
        if self.worker.is_some() {
            return;
        }
        let chunk_frames = self
            .settings
            .chunker
            .chunk_frames
            .clamp(MIN_CHUNK_FRAMES, MAX_CHUNK_FRAMES);
        let shared = Arc::new(WorkerShared::new(chunk_frames * 2));
        match RecognitionWorker::new(shared).start() {
            Ok(handle) => self.worker = Some(handle),
            Err(e) => {
                tracing::error!("failed to spawn recognition worker: {}", e);
                self.last_error = Some(e.to_string());
            }
        }
    }

    fn start_mic(&mut self) {
        if !self.listening_requested {
            return;
        }
        let Some(device) = self.device.clone() else {
            return;
        };
        if self.chunker.is_some() && self.capture.is_recording() {
            return;
        }

        let ring_seconds = self
            .settings
            .ring_seconds
            .clamp(MIN_RING_SECONDS, MAX_RING_SECONDS);
        let sample_rate = self
            .settings
            .sample_rate
            .clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE);

        match self.capture.start(&device, ring_seconds, sample_rate) {
            Ok(info) => {
                let chunker = Chunker::new(info, &self.settings.chunker);
                if let Some(worker) = &self.worker {
                    worker.shared().pool.reconfigure(chunker.chunk_bytes());
                }
                tracing::debug!(
                    chunk_frames = chunker.chunk_frames(),
                    max_buffered = chunker.max_buffered_chunks(),
                    "chunker ready"
                );
                self.chunker = Some(chunker);
                self.clip = Some(info);
                self.meter.reset();
            }
            Err(e) => {
                tracing::warn!(device = %device, "failed to start capture: {}", e);
                self.last_error = Some(e.to_string());
                self.chunker = None;
                self.clip = None;
            }
        }
    }

    fn stop_mic(&mut self) {
        self.capture.stop();
        self.chunker = None;
        self.clip = None;
        self.meter.reset();
    }

    fn request_rebuild(&mut self) {
        if !self.listening_requested {
            return;
        }
        self.ensure_model();
        let Some(model) = self.model.clone() else {
            return;
        };
        if self.chunker.is_none() {
            self.start_mic();
        }
        let (Some(chunker), Some(worker)) = (self.chunker.as_ref(), self.worker.as_ref()) else {
            return;
        };

        let grammar = if self.settings.grammar_enabled() {
            build_grammar(self.vocabulary.iter(), self.settings.include_unknown)
        } else {
            None
        };

        let config = RecognizerConfig {
            model: Some(model),
            sample_rate: chunker.clip().sample_rate,
            grammar,
            partial_enabled: self.settings.partial_enabled,
            word_details: self.settings.word_details,
            partial_stride: partial_stride(self.settings.partial_interval, chunker.chunk_seconds()),
        };
        tracing::debug!(?config, "reconfiguring recognizer");
        worker.configure(config);
    }

    // ── Capture → worker ───────────────────────────────────────

    fn capture_to_worker(&mut self) {
        if !self.listening_requested {
            return;
        }
        if self.model.is_none() {
            self.ensure_model();
            if self.model.is_none() {
                return;
            }
            self.request_rebuild();
        }
        if self.chunker.is_none() || self.device.is_none() {
            return;
        }

        if !self.capture.is_recording() {
            tracing::warn!("capture stopped unexpectedly, restarting");
            let previous = self.clip;
            self.chunker = None;
            self.start_mic();
            if self.clip.is_some() && self.clip != previous {
                self.request_rebuild();
            }
            return;
        }

        let (Some(chunker), Some(worker)) = (self.chunker.as_mut(), self.worker.as_ref()) else {
            return;
        };
        let shared: &WorkerShared = worker.shared();
        let sink = ChunkSink {
            queue: &shared.audio,
            pool: &shared.pool,
            wake: &shared.wake,
        };
        let stats = chunker.poll(&mut self.capture, &sink);
        if stats.dropped_frames > 0 {
            tracing::debug!(frames = stats.dropped_frames, "recognizer behind, audio dropped");
        }
    }

    // ── Worker → observers ─────────────────────────────────────

    fn drain_results(&mut self) {
        let Some(worker) = self.worker.as_ref() else {
            return;
        };
        let packets: Vec<_> = std::iter::from_fn(|| worker.try_result()).collect();
        for packet in packets {
            if packet.is_final {
                self.handle_final(&packet.payload);
            } else {
                self.handle_partial(&packet.payload);
            }
        }
    }

    fn handle_partial(&mut self, json: &str) {
        if !self.settings.partial_enabled {
            return;
        }
        let Some(payload) = EnginePayload::parse(json) else {
            return;
        };
        let Some(text) = payload.partial_text() else {
            return;
        };

        let picked = self
            .vocabulary
            .best_match(text, self.settings.match_policy)
            .map(str::to_string);
        if let Some(keyword) = self.gate.observe(picked.as_deref()) {
            self.emit_keyword(&keyword, TEXT_MATCH_CONFIDENCE, true);
        }
    }

    fn handle_final(&mut self, json: &str) {
        self.gate.reset();
        let Some(payload) = EnginePayload::parse(json) else {
            return;
        };

        if self.settings.log_final_text {
            tracing::info!(payload = %json, "final result");
        } else {
            tracing::debug!(payload = %json, "final result");
        }

        if let Some(text) = payload.final_text() {
            self.events.emit_final_text(text);
        }

        let emitted = match self.settings.mode {
            SpeechMode::Keyword => self.keyword_final(&payload),
            SpeechMode::Dictation => self.dictation_final(&payload),
        };
        if emitted == 0 {
            if self.settings.log_rejected {
                tracing::info!(text = ?payload.final_text(), "rejected: no keyword");
            } else {
                tracing::debug!(text = ?payload.final_text(), "rejected: no keyword");
            }
        }
    }

    fn keyword_final(&mut self, payload: &EnginePayload) -> usize {
        let min_conf = self.settings.min_word_confidence;
        let policy = self.settings.match_policy;

        if !self.settings.best_match_only {
            if let Some(text) = payload.final_text() {
                return self.emit_all_matches(text);
            }
            // Blank text: word details are the only source left.
            if !self.settings.word_details {
                return 0;
            }
            return self
                .vocabulary
                .qualifying_hits(&payload.result, min_conf)
                .into_iter()
                .filter(|hit| self.emit_keyword(&hit.word, hit.confidence, false))
                .count();
        }

        let mut best = if self.settings.word_details {
            self.vocabulary
                .best_hit(&payload.result, min_conf)
                .map(|hit| (hit.word, hit.confidence))
        } else {
            None
        };

        let picked = payload
            .final_text()
            .and_then(|text| self.vocabulary.best_match(text, policy))
            .map(str::to_string);
        if let Some(picked) = picked {
            let replace = match &best {
                None => true,
                Some((word, _)) => policy.prefers(&picked, word),
            };
            if replace {
                best = Some((picked, TEXT_MATCH_CONFIDENCE));
            }
        }

        match best {
            Some((word, confidence)) => usize::from(self.emit_keyword(&word, confidence, false)),
            None => 0,
        }
    }

    fn dictation_final(&mut self, payload: &EnginePayload) -> usize {
        let Some(text) = payload.final_text() else {
            return 0;
        };
        if !self.settings.best_match_only {
            return self.emit_all_matches(text);
        }
        let picked = self
            .vocabulary
            .best_match(text, self.settings.match_policy)
            .map(str::to_string);
        match picked {
            Some(word) => usize::from(self.emit_keyword(&word, TEXT_MATCH_CONFIDENCE, false)),
            None => 0,
        }
    }

    fn emit_all_matches(&mut self, text: &str) -> usize {
        let matches: Vec<String> = self
            .vocabulary
            .all_matches(text)
            .into_iter()
            .map(str::to_string)
            .collect();
        matches
            .iter()
            .filter(|word| self.emit_keyword(word, TEXT_MATCH_CONFIDENCE, false))
            .count()
    }

    fn emit_keyword(&mut self, word: &str, confidence: f32, is_partial: bool) -> bool {
        let keyword = normalize(word);
        if keyword.is_empty() || keyword == UNKNOWN_TOKEN || !self.vocabulary.contains(&keyword) {
            return false;
        }
        tracing::debug!(keyword = %keyword, confidence, is_partial, "keyword detected");
        self.events.emit_keyword(&KeywordEvent {
            keyword,
            confidence,
            is_partial,
        });
        true
    }
}

impl<B: CaptureBackend> Drop for KeywordListener<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
