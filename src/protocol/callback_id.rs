//! Correlation token pairing a `send` with its eventual `receive`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Opaque correlation token carried in the `callbackID` wire field.
///
/// Each endpoint issues its own tokens from a private counter, so two
/// endpoints may legitimately issue equal tokens. A token is only ever
/// resolved against the pending registry of the endpoint that issued it.
///
/// # Wire Format
///
/// Always serialized as a string. Decoding also accepts a JSON integer and
/// normalizes it to its decimal text, so peers that number their calls
/// natively still round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CallbackId(String);

impl CallbackId {
    /// Create a CallbackId from arbitrary token text.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Create the token for the n-th call issued by a local endpoint.
    #[inline]
    pub fn from_sequence(seq: u64) -> Self {
        Self(seq.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallbackId {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl From<String> for CallbackId {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl<'de> Deserialize<'de> for CallbackId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => Self(text),
            RawId::Number(number) => Self(number.to_string()),
        })
    }
}
