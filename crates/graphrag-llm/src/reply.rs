//! Pulling structured JSON out of free-form model replies.
use serde::de::DeserializeOwned;

use graphrag_core::error::{Error, Result};

/// Returns the outermost `{...}` object in `raw`, ignoring code fences and
/// any prose around it.
pub fn json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

pub fn parse_json_reply<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let body = json_object(raw).ok_or_else(|| Error::ExternalService("model reply contains no JSON object".to_string()))?;
    serde_json::from_str(body).map_err(|e| Error::ExternalService(format!("model reply is not valid JSON: {e}")))
}
