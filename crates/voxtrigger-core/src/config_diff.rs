use crate::config::AppConfig;
use crate::types::SpeechMode;

/// Describes runtime-safe changes between two configs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDiff {
    pub keywords: Option<Vec<String>>,
    pub mode: Option<SpeechMode>,
    pub device: Option<String>,
    /// Matching, partial or engine-output flags changed; the listener must
    /// take the new settings and reconfigure the worker.
    pub tuning_changed: bool,
    pub non_reloadable: Vec<String>,
}

impl ConfigDiff {
    /// Compare two configs and return the diff.
    /// Reloadable: keyword list, mode, input device, matching/partial flags.
    /// Non-reloadable: engine, model path, sample rate, chunk size, ring length.
    pub fn diff(old: &AppConfig, new: &AppConfig) -> Self {
        let mut result = Self::default();

        if old.keywords.words != new.keywords.words {
            result.keywords = Some(new.keywords.words.clone());
        }
        if old.keywords.mode != new.keywords.mode {
            result.mode = Some(new.keywords.mode);
        }
        if old.capture.device_name != new.capture.device_name {
            result.device = Some(new.capture.device_name.clone());
        }

        let (ok, nk) = (&old.keywords, &new.keywords);
        result.tuning_changed = ok.use_grammar != nk.use_grammar
            || ok.include_unknown != nk.include_unknown
            || ok.best_match_only != nk.best_match_only
            || (ok.min_word_confidence - nk.min_word_confidence).abs() > f32::EPSILON
            || old.partial != new.partial
            || old.engine.word_details != new.engine.word_details
            || (old.engine.partial_interval - new.engine.partial_interval).abs() > f32::EPSILON
            || old.debug != new.debug
            || old.meter != new.meter;

        if old.engine.name != new.engine.name {
            result.non_reloadable.push(format!(
                "engine changed ('{}' → '{}'), requires restart",
                old.engine.name, new.engine.name
            ));
        }
        if old.engine.model_path != new.engine.model_path {
            result.non_reloadable.push(format!(
                "model_path changed ('{}' → '{}'), requires restart",
                old.engine.model_path, new.engine.model_path
            ));
        }
        if old.capture.sample_rate != new.capture.sample_rate {
            result.non_reloadable.push(format!(
                "sample_rate changed ({} → {}), requires restart",
                old.capture.sample_rate, new.capture.sample_rate
            ));
        }
        if old.capture.chunk_frames != new.capture.chunk_frames {
            result.non_reloadable.push(format!(
                "chunk_frames changed ({} → {}), requires restart",
                old.capture.chunk_frames, new.capture.chunk_frames
            ));
        }
        if old.capture.ring_seconds != new.capture.ring_seconds {
            result.non_reloadable.push(format!(
                "ring_seconds changed ({} → {}), requires restart",
                old.capture.ring_seconds, new.capture.ring_seconds
            ));
        }
        if old.general.log_level != new.general.log_level {
            result.non_reloadable.push(format!(
                "log_level changed ('{}' → '{}'), requires restart",
                old.general.log_level, new.general.log_level
            ));
        }

        result
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_none()
            && self.mode.is_none()
            && self.device.is_none()
            && !self.tuning_changed
            && self.non_reloadable.is_empty()
    }
}
