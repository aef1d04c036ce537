use serde::Deserialize;

/// One `{word, conf}` entry of a detailed engine result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WordEntry {
    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub conf: f32,
}

/// The subset of the engine's result JSON the pipeline reads.
///
/// Final results carry `text` (and `result` when word details are on),
/// partial results carry `partial`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EnginePayload {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub partial: Option<String>,
    #[serde(default)]
    pub result: Vec<WordEntry>,
}

impl EnginePayload {
    /// Parse an engine result. Malformed or blank payloads yield `None`.
    pub fn parse(json: &str) -> Option<Self> {
        if json.trim().is_empty() {
            return None;
        }
        match serde_json::from_str(json) {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::debug!("dropping malformed engine payload: {e}");
                None
            }
        }
    }

    /// Final transcript, if present and not blank.
    pub fn final_text(&self) -> Option<&str> {
        non_blank(self.text.as_deref())
    }

    /// In-progress transcript, if present and not blank.
    pub fn partial_text(&self) -> Option<&str> {
        non_blank(self.partial.as_deref())
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|t| !t.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_final_text() {
        let p = EnginePayload::parse(r#"{"text" : "turn the lights on"}"#).unwrap();
        assert_eq!(p.final_text(), Some("turn the lights on"));
        assert_eq!(p.partial_text(), None);
        assert!(p.result.is_empty());
    }

    #[test]
    fn test_parse_partial_text() {
        let p = EnginePayload::parse(r#"{"partial" : "turn the"}"#).unwrap();
        assert_eq!(p.partial_text(), Some("turn the"));
        assert_eq!(p.final_text(), None);
    }

    #[test]
    fn test_parse_word_details() {
        let json = r#"{
            "result" : [
                {"conf" : 1.0, "end" : 1.02, "start" : 0.6, "word" : "lights"},
                {"conf" : 0.87, "end" : 1.3, "start" : 1.02, "word" : "on"}
            ],
            "text" : "lights on"
        }"#;
        let p = EnginePayload::parse(json).unwrap();
        assert_eq!(p.result.len(), 2);
        assert_eq!(p.result[1].word, "on");
        assert!((p.result[1].conf - 0.87).abs() < 1e-6);
    }

    #[test]
    fn test_blank_text_is_none() {
        let p = EnginePayload::parse(r#"{"text" : ""}"#).unwrap();
        assert_eq!(p.final_text(), None);
        let p = EnginePayload::parse(r#"{"partial" : "   "}"#).unwrap();
        assert_eq!(p.partial_text(), None);
    }

    #[test]
    fn test_malformed_payload_dropped() {
        assert!(EnginePayload::parse("").is_none());
        assert!(EnginePayload::parse("   ").is_none());
        assert!(EnginePayload::parse("{not json").is_none());
        assert!(EnginePayload::parse(r#"{"text": 5}"#).is_none());
    }
}
