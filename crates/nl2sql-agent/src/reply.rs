use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// Parse a model reply that is supposed to be a JSON object. Models often wrap
/// the object in a markdown fence or add a sentence around it, so only the
/// span from the first `{` to the last `}` is parsed.
pub fn parse_json<T: DeserializeOwned>(reply: &str) -> Result<T> {
    let body = extract_object(reply).context("model reply contains no JSON object")?;
    serde_json::from_str(body).with_context(|| format!("model reply is not the expected JSON: {body}"))
}

fn extract_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (start < end).then(|| &reply[start..=end])
}
