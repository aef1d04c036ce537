use crate::text::{normalize, UNKNOWN_TOKEN};

/// Build the engine grammar for a keyword set.
///
/// Keywords are normalized, deduplicated and ordinally sorted (with the
/// unknown marker when `add_unknown` is set) and serialized as a compact JSON
/// string array. `None` means "no grammar constraint".
pub fn build_grammar<I, S>(keywords: I, add_unknown: bool) -> Option<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut words: Vec<String> = keywords
        .into_iter()
        .map(|k| normalize(k.as_ref()))
        .filter(|k| !k.is_empty())
        .collect();
    if add_unknown {
        words.push(UNKNOWN_TOKEN.to_string());
    }
    words.sort();
    words.dedup();

    if words.is_empty() {
        return None;
    }
    serde_json::to_string(&words).ok()
}
