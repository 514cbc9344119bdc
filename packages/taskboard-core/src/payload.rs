/// Caller payloads that may arrive either as JSON text or as an already
/// structured value. They are resolved once, at the boundary, into a typed
/// value before any engine logic sees them.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Encoded(String),
    Structured(serde_json::Value),
}

impl Payload {
    /// Size of the payload in characters, measured on its JSON text.
    pub fn char_len(&self) -> usize {
        match self {
            Payload::Encoded(text) => text.chars().count(),
            Payload::Structured(value) => value.to_string().chars().count(),
        }
    }

    /// Decode into `T`, rejecting payloads longer than `max_chars`.
    pub fn resolve<T: DeserializeOwned>(&self, what: &str, max_chars: usize) -> Result<T> {
        let len = self.char_len();
        if len > max_chars {
            return Err(EngineError::validation(format!(
                "{} payload is {} characters, limit is {}",
                what, len, max_chars
            )));
        }

        let parsed = match self {
            Payload::Encoded(text) => serde_json::from_str(text),
            Payload::Structured(value) => T::deserialize(value),
        };
        parsed.map_err(|e| EngineError::validation(format!("Invalid {} payload: {}", what, e)))
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Structured(value)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Encoded(text.to_string())
    }
}
