use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use voxtrigger_audio::{CaptureBackend, ClipInfo, ClipRing};
use voxtrigger_core::{AsrError, AudioError, KeywordEvent, SpeechMode};
use voxtrigger_engine::{Recognizer, SpeechModel};
use voxtrigger_listener::{KeywordListener, ListenerSettings, TranscriptFile};

// ── Test doubles ───────────────────────────────────────────────

struct SimulatedMic {
    clip: Option<ClipRing>,
}

impl SimulatedMic {
    fn new() -> Self {
        Self { clip: None }
    }

    /// Record `frames` of low-level noise.
    fn speak(&mut self, frames: usize) {
        if let Some(clip) = self.clip.as_mut() {
            let samples: Vec<f32> = (0..frames).map(|i| 0.1 * (i as f32 * 0.3).sin()).collect();
            clip.write(&samples);
        }
    }
}

impl CaptureBackend for SimulatedMic {
    fn input_devices(&self) -> Result<Vec<String>, AudioError> {
        Ok(vec!["Simulated Mic".to_string()])
    }

    fn start(&mut self, _: &str, ring_seconds: u32, sample_rate: u32) -> Result<ClipInfo, AudioError> {
        let frames = (ring_seconds * sample_rate) as usize;
        self.clip = Some(ClipRing::new(frames, 1));
        Ok(ClipInfo {
            sample_rate,
            channels: 1,
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
        if let Some(clip) = self.clip.as_ref() {
            clip.read(start_frame, out);
        }
    }
}

/// Emits `partial` after every chunk and `final_json` once `utterance`
/// chunks have been fed.
struct ScriptedRecognizer {
    fed: usize,
    utterance: usize,
    partial: String,
    final_json: String,
}

impl Recognizer for ScriptedRecognizer {
    fn set_words(&mut self, _: bool) {}

    fn accept_waveform(&mut self, _: &[u8]) -> Result<bool, AsrError> {
        self.fed += 1;
        Ok(self.fed == self.utterance)
    }

    fn partial_result(&mut self) -> String {
        format!(r#"{{"partial":"{}"}}"#, self.partial)
    }

    fn final_result(&mut self) -> String {
        self.final_json.clone()
    }

    fn reset(&mut self) {
        self.fed = 0;
    }
}

#[derive(Clone)]
struct ScriptedModel {
    utterance: usize,
    partial: String,
    final_json: String,
    grammars: Arc<Mutex<Vec<Option<String>>>>,
}

impl ScriptedModel {
    fn new(utterance: usize, partial: &str, final_json: &str) -> Self {
        Self {
            utterance,
            partial: partial.to_string(),
            final_json: final_json.to_string(),
            grammars: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl SpeechModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    fn create_recognizer(
        &self,
        _sample_rate: u32,
        grammar: Option<&str>,
    ) -> Result<Box<dyn Recognizer>, AsrError> {
        self.grammars.lock().unwrap().push(grammar.map(str::to_string));
        Ok(Box::new(ScriptedRecognizer {
            fed: 0,
            utterance: self.utterance,
            partial: self.partial.clone(),
            final_json: self.final_json.clone(),
        }))
    }
}

type Events = Rc<RefCell<Vec<KeywordEvent>>>;

fn build(model: ScriptedModel, settings: ListenerSettings, keywords: &[&str]) -> (KeywordListener<SimulatedMic>, Events) {
    let mut listener = KeywordListener::new(SimulatedMic::new(), settings, move || {
        Ok(Arc::new(model.clone()) as Arc<dyn SpeechModel>)
    });
    listener.set_keywords(keywords);
    let events: Events = Rc::default();
    let sink = Rc::clone(&events);
    listener.on_keyword(move |e| sink.borrow_mut().push(e.clone()));
    (listener, events)
}

/// Wait for the recognizer, then keep speaking and ticking until `done`.
fn run_until(
    listener: &mut KeywordListener<SimulatedMic>,
    mut done: impl FnMut() -> bool,
) -> bool {
    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline {
        if listener.status().recognizer_ready {
            listener.capture_mut().speak(256);
        }
        listener.tick();
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

fn no_partials() -> ListenerSettings {
    ListenerSettings {
        partial_enabled: false,
        ..ListenerSettings::default()
    }
}

// ── Scenarios ──────────────────────────────────────────────────

#[test]
fn test_keyword_mode_lights_on() {
    let model = ScriptedModel::new(6, "", r#"{"text":"turn the lights on please"}"#);
    let grammars = Arc::clone(&model.grammars);
    let (mut listener, events) = build(model, no_partials(), &["lights on"]);

    listener.start_listening();
    assert!(run_until(&mut listener, || !events.borrow().is_empty()));

    assert_eq!(
        grammars.lock().unwrap().last().cloned().flatten().as_deref(),
        Some(r#"["[unk]","lights on"]"#)
    );
    let first = events.borrow()[0].clone();
    assert_eq!(first.keyword, "lights on");
    assert_eq!(first.confidence, 0.99);
    assert!(!first.is_partial);

    let status = listener.status();
    assert!(status.listening);
    assert!(status.grammar_enabled);
    listener.shutdown();
}

#[test]
fn test_dictation_multi_trigger_yes_or_no() {
    let model = ScriptedModel::new(4, "", r#"{"text":"yes or no"}"#);
    let grammars = Arc::clone(&model.grammars);
    let settings = ListenerSettings {
        mode: SpeechMode::Dictation,
        best_match_only: false,
        ..no_partials()
    };
    let (mut listener, events) = build(model, settings, &["yes", "no"]);

    listener.start_listening();
    assert!(run_until(&mut listener, || events.borrow().len() >= 2));

    let words: Vec<String> = events.borrow()[..2].iter().map(|e| e.keyword.clone()).collect();
    assert_eq!(words, vec!["yes", "no"]);
    // Free speech: no grammar restriction
    assert_eq!(grammars.lock().unwrap().last().cloned(), Some(None));
    listener.shutdown();
}

#[test]
fn test_stable_partial_promoted_before_final() {
    // The utterance never finalizes within the test window.
    let model = ScriptedModel::new(usize::MAX, "open the door", r#"{"text":""}"#);
    let settings = ListenerSettings {
        stability_frames: 3,
        partial_interval: 0.0,
        ..ListenerSettings::default()
    };
    let (mut listener, events) = build(model, settings, &["open the door"]);

    listener.start_listening();
    assert!(run_until(&mut listener, || !events.borrow().is_empty()));

    let first = events.borrow()[0].clone();
    assert_eq!(first.keyword, "open the door");
    assert!(first.is_partial);
    assert_eq!(first.confidence, 0.99);
    listener.shutdown();
}

#[test]
fn test_final_text_reaches_transcript_file() {
    let dir = std::env::temp_dir().join("voxtrigger_listener_test");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("transcript.txt");
    let _ = std::fs::remove_file(&path);

    let model = ScriptedModel::new(4, "", r#"{"text":"lights on"}"#);
    let (mut listener, events) = build(model, no_partials(), &["lights on"]);

    let transcript = Rc::new(RefCell::new(TranscriptFile::open(&path).unwrap()));
    let sink = Rc::clone(&transcript);
    listener.on_final_text(move |text| sink.borrow_mut().write_final_text(text).unwrap());
    let sink = Rc::clone(&transcript);
    listener.on_keyword(move |e| sink.borrow_mut().write_keyword(e).unwrap());

    listener.start_listening();
    assert!(run_until(&mut listener, || !events.borrow().is_empty()));
    listener.shutdown();

    let content = std::fs::read_to_string(&path).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("text\tlights on"));
    assert_eq!(lines.next(), Some("keyword\tlights on\t0.99"));
}

#[test]
fn test_stop_listening_stops_events() {
    let model = ScriptedModel::new(2, "", r#"{"text":"lights on"}"#);
    let (mut listener, events) = build(model, no_partials(), &["lights on"]);

    listener.start_listening();
    assert!(run_until(&mut listener, || !events.borrow().is_empty()));

    listener.stop_listening();
    assert!(!listener.status().listening);
    // Drain anything already in flight, then confirm silence.
    for _ in 0..20 {
        listener.tick();
        std::thread::sleep(Duration::from_millis(2));
    }
    let settled = events.borrow().len();
    for _ in 0..20 {
        listener.capture_mut().speak(256);
        listener.tick();
        std::thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(events.borrow().len(), settled);
    listener.shutdown();
}

#[test]
fn test_mic_level_follows_capture() {
    let model = ScriptedModel::new(usize::MAX, "", "");
    let (mut listener, _) = build(model, no_partials(), &["yes"]);
    listener.start_listening();
    listener.capture_mut().speak(4096);
    listener.tick();
    assert!(listener.mic_level() > 0.0);

    listener.shutdown();
    assert_eq!(listener.mic_level(), 0.0);
}
