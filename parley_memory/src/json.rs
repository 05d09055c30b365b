use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

static CODE_FENCE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").ok());

/// Parse the first JSON object in model output, looking inside a Markdown
/// code fence when there is one.
pub fn first_json_object<T: DeserializeOwned>(text: &str) -> Option<T> {
    let body = CODE_FENCE
        .as_ref()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map_or(text, |m| m.as_str());

    let start = body.find('{')?;
    let value = serde_json::Deserializer::from_str(&body[start..])
        .into_iter::<Value>()
        .next()?
        .ok()?;
    serde_json::from_value(value).ok()
}
