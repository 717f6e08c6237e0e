use anyhow::Context;
use serde::de::DeserializeOwned;

pub fn extract_json_array(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        // Markdown fence, possibly on one line: ```json [..]``` or ```\n[..]\n```.
        let mut inner = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    // Best-effort extraction: first '[' to last ']', unless the text opens an object first.
    let start = trimmed.find('[')?;
    if trimmed[..start].contains('{') {
        return None;
    }
    let end = trimmed.rfind(']')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

/// Decodes a model response as a JSON array of `T`. One bad element rejects the whole array.
pub fn parse_array<T: DeserializeOwned>(text: &str) -> anyhow::Result<Vec<T>> {
    let json_str = extract_json_array(text).unwrap_or_else(|| text.trim().to_string());
    serde_json::from_str::<Vec<T>>(&json_str)
        .with_context(|| format!("model output is not a JSON array of the requested shape: {json_str}"))
}
