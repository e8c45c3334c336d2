//! Pulling JSON out of model replies.
//!
//! Models wrap JSON in ```json fences, bare ``` fences, or prose. Try the
//! fences first, then fall back to the outermost `{ ... }` span.

use serde::de::DeserializeOwned;

pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(inner) = fenced(text, "```json") {
        return Some(inner);
    }
    if let Some(inner) = fenced(text, "```") {
        return Some(inner);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn fenced<'a>(text: &'a str, open: &str) -> Option<&'a str> {
    let after = &text[text.find(open)? + open.len()..];
    let close = after.find("```")?;
    let inner = after[..close].trim();
    (!inner.is_empty()).then_some(inner)
}

/// Extract and deserialize; the error string is meant for logs.
pub fn parse_reply<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let json = extract_json(text).ok_or_else(|| format!("no JSON object in reply: {}", preview(text)))?;
    serde_json::from_str(json).map_err(|e| format!("{e} in {}", preview(json)))
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    match text.char_indices().nth(MAX) {
        Some((i, _)) => format!("{}...", &text[..i]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Sample {
        a: u32,
    }

    #[test]
    fn json_fence() {
        let reply = "Here you go:\n```json\n{\"a\": 1}\n```\nThanks";
        assert_eq!(extract_json(reply), Some("{\"a\": 1}"));
    }

    #[test]
    fn bare_fence() {
        assert_eq!(extract_json("```\n{\"a\": 2}\n```"), Some("{\"a\": 2}"));
    }

    #[test]
    fn prose_wrapped_object() {
        let reply = "Sure! {\"a\": {\"nested\": true}} Hope that helps.";
        assert_eq!(extract_json(reply), Some("{\"a\": {\"nested\": true}}"));
    }

    #[test]
    fn no_object() {
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn parse_reports_errors() {
        assert_eq!(parse_reply::<Sample>("```json\n{\"a\": 7}\n```").unwrap(), Sample { a: 7 });
        assert!(parse_reply::<Sample>("{\"b\": 1}").unwrap_err().contains("missing field"));
        assert!(parse_reply::<Sample>("nothing").is_err());
    }
}
