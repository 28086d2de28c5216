//! JSON codec for cached values.
//!
//! Unknown fields are ignored on decode (serde's default), so a value written
//! by an older or newer schema still reads back as long as the fields it
//! needs are there.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;

pub fn encode<T: Serialize>(value: &T) -> Result<String, CodecError> {
    serde_json::to_string(value).map_err(CodecError::Encode)
}

/// `Ok(None)` for blank text or a JSON `null`; both count as an empty entry.
pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<Option<T>, CodecError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str::<Option<T>>(raw).map_err(CodecError::Decode)
}
