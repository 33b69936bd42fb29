//! Identifier byte layout and base64 codec
//!
//! An identifier is `base ++ timestamp(8, big-endian millis) ++ counter(2) ++
//! random(2)` encoded with the standard base64 alphabet, padding included.
//! The base length is not stored in the identifier, so decoding needs it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::errors::{ModelXError, Result};

pub const TIMESTAMP_LEN: usize = 8;
pub const COUNTER_LEN: usize = 2;
pub const RANDOM_LEN: usize = 2;

/// Bytes following the base prefix
pub const PAYLOAD_LEN: usize = TIMESTAMP_LEN + COUNTER_LEN + RANDOM_LEN;

/// Structured view of an identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedId {
    pub base: Vec<u8>,
    pub timestamp_ms: u64,
    pub counter: u16,
    pub random: u16,
}

impl DecodedId {
    /// Lay the parts out in wire order
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.base.len() + PAYLOAD_LEN);
        bytes.extend_from_slice(&self.base);
        bytes.extend_from_slice(&self.timestamp_ms.to_be_bytes());
        bytes.extend_from_slice(&self.counter.to_be_bytes());
        bytes.extend_from_slice(&self.random.to_be_bytes());
        bytes
    }

    /// `(timestamp, counter)` pair used to order identifiers
    pub fn sequence_key(&self) -> (u64, u16) {
        (self.timestamp_ms, self.counter)
    }
}

/// Encode raw identifier bytes
pub fn encode_bytes(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode raw identifier bytes
///
/// # Errors
///
/// Returns `IdDecode` on invalid characters, wrong padding, or a
/// non-canonical trailing symbol.
pub fn decode_bytes(input: &str) -> Result<Vec<u8>> {
    STANDARD.decode(input).map_err(|e| ModelXError::IdDecode {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

/// Encode a structured identifier
pub fn encode(id: &DecodedId) -> String {
    encode_bytes(&id.to_bytes())
}

/// Decode an identifier whose base prefix is `base_len` bytes long
///
/// # Errors
///
/// Returns `IdDecode` if the input is not valid base64 or does not hold
/// exactly `base_len + 12` bytes.
pub fn decode(input: &str, base_len: usize) -> Result<DecodedId> {
    let bytes = decode_bytes(input)?;
    let expected = base_len + PAYLOAD_LEN;
    if bytes.len() != expected {
        return Err(ModelXError::IdDecode {
            input: input.to_string(),
            reason: format!("expected {} bytes, found {}", expected, bytes.len()),
        });
    }

    let (base, payload) = bytes.split_at(base_len);
    let (ts, rest) = payload.split_at(TIMESTAMP_LEN);
    let (counter, random) = rest.split_at(COUNTER_LEN);

    let mut ts_bytes = [0u8; TIMESTAMP_LEN];
    ts_bytes.copy_from_slice(ts);

    Ok(DecodedId {
        base: base.to_vec(),
        timestamp_ms: u64::from_be_bytes(ts_bytes),
        counter: u16::from_be_bytes([counter[0], counter[1]]),
        random: u16::from_be_bytes([random[0], random[1]]),
    })
}
