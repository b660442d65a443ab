//! Canonical binary encoding for stored consensus values.
//!
//! Values persisted by the trusted store are bincode-serialized with a
//! 32-bit big-endian length prefix. bincode's fixed-width integer
//! representation makes the encoding deterministic, and the prefix lets a
//! reader reject truncated or over-long values before deserializing.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Error, Result};

/// Encode `value` as length-prefixed canonical binary.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let body = bincode::serialize(value).map_err(|e| Error::Codec(e.to_string()))?;
    let mut bytes = Vec::with_capacity(4 + body.len());
    bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Decode a value previously produced by [`encode`].
///
/// The length prefix must account for the remaining bytes exactly.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.len() < 4 {
        return Err(Error::Codec(format!(
            "value too short for length prefix: {} bytes",
            bytes.len()
        )));
    }
    let (prefix, body) = bytes.split_at(4);
    let declared = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    if declared != body.len() {
        return Err(Error::Codec(format!(
            "length prefix {declared} does not match body length {}",
            body.len()
        )));
    }
    bincode::deserialize(body).map_err(|e| Error::Codec(e.to_string()))
}
