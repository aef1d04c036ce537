//! Text normalization and keyword matching.
//!
//! Recognizer output and stored keywords go through the same [`normalize`]
//! so that matching reduces to exact whole-word span comparison.

use crate::payload::WordEntry;
use std::collections::BTreeSet;

/// Reserved grammar token the engine emits for out-of-vocabulary speech.
pub const UNKNOWN_TOKEN: &str = "[unk]";

/// Lowercase, map every non letter/digit to a space, collapse runs of spaces
/// and trim. Idempotent.
pub fn normalize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_space = false;
    for c in input.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        } else {
            pending_space = true;
        }
    }
    out
}

pub fn token_count(keyword: &str) -> usize {
    if keyword.is_empty() {
        return 0;
    }
    keyword.bytes().filter(|b| *b == b' ').count() + 1
}

/// Byte offset of the first occurrence of `keyword` in `text` bounded by the
/// string edges or a space on both sides. Both inputs must be normalized.
pub fn find_whole_keyword(text: &str, keyword: &str) -> Option<usize> {
    if text.is_empty() || keyword.is_empty() {
        return None;
    }
    let bytes = text.as_bytes();
    let mut start = 0;
    while let Some(offset) = text[start..].find(keyword) {
        let idx = start + offset;
        let end = idx + keyword.len();
        let left_ok = idx == 0 || bytes[idx - 1] == b' ';
        let right_ok = end == text.len() || bytes[end] == b' ';
        if left_ok && right_ok {
            return Some(idx);
        }
        // Overlapping search: a rejected hit may hide a valid one inside it.
        start = idx + text[idx..].chars().next().map_or(1, char::len_utf8);
        if start >= text.len() {
            return None;
        }
    }
    None
}

pub fn contains_whole_keyword(text: &str, keyword: &str) -> bool {
    find_whole_keyword(text, keyword).is_some()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// More tokens first, then more characters.
    #[default]
    TokensThenLength,
    /// More characters first, then more tokens.
    LengthThenTokens,
}

impl MatchPolicy {
    pub fn prefers(self, candidate: &str, incumbent: &str) -> bool {
        let c = (token_count(candidate), candidate.len());
        let i = (token_count(incumbent), incumbent.len());
        match self {
            MatchPolicy::TokensThenLength => c > i,
            MatchPolicy::LengthThenTokens => (c.1, c.0) > (i.1, i.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordHit {
    pub word: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vocabulary {
    words: BTreeSet<String>,
}

impl Vocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = keywords
            .into_iter()
            .filter(|k| !k.as_ref().trim().eq_ignore_ascii_case(UNKNOWN_TOKEN))
            .map(|k| normalize(k.as_ref()))
            .filter(|k| !k.is_empty())
            .collect();
        Self { words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.words.contains(keyword)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    pub fn best_match(&self, text: &str, policy: MatchPolicy) -> Option<&str> {
        if self.words.is_empty() {
            return None;
        }
        let normalized = normalize(text);
        if normalized.is_empty() {
            return None;
        }

        let mut best: Option<&str> = None;
        for kw in self.iter() {
            if !contains_whole_keyword(&normalized, kw) {
                continue;
            }
            match best {
                Some(current) if !policy.prefers(kw, current) => {}
                _ => best = Some(kw),
            }
        }
        best
    }

    /// Every keyword occurring in `text`, ordered left to right by first
    /// occurrence; at the same offset the longer keyword comes first.
    pub fn all_matches(&self, text: &str) -> Vec<&str> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<(usize, &str)> = self
            .iter()
            .filter_map(|kw| find_whole_keyword(&normalized, kw).map(|pos| (pos, kw)))
            .collect();
        hits.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.len().cmp(&a.1.len())));
        hits.into_iter().map(|(_, kw)| kw).collect()
    }

    pub fn qualifying_hits(&self, entries: &[WordEntry], min_confidence: f32) -> Vec<WordHit> {
        entries
            .iter()
            .filter_map(|entry| {
                let word = normalize(&entry.word);
                if word.is_empty() || !self.contains(&word) {
                    return None;
                }
                if entry.conf < min_confidence {
                    tracing::debug!(word = %word, conf = entry.conf, "word below confidence threshold");
                    return None;
                }
                Some(WordHit {
                    word,
                    confidence: entry.conf,
                })
            })
            .collect()
    }

    /// The highest-confidence qualifying entry; the earliest wins ties.
    pub fn best_hit(&self, entries: &[WordEntry], min_confidence: f32) -> Option<WordHit> {
        self.qualifying_hits(entries, min_confidence)
            .into_iter()
            .fold(None, |best: Option<WordHit>, hit| match best {
                Some(b) if b.confidence >= hit.confidence => Some(b),
                _ => Some(hit),
            })
    }
}
