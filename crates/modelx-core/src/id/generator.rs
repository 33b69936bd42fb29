use chrono::Utc;
use uuid::Uuid;

use super::codec::{self, DecodedId};
use crate::errors::{ModelXError, Result};
use crate::ElementId;

/// Produces unique, time-ordered element identifiers
///
/// Each identifier carries the configured base prefix, the current time in
/// milliseconds, a rolling counter, and two random bytes. The counter
/// advances on every call, so two identifiers minted within the same
/// millisecond still differ. The timestamp never moves backwards even if
/// the wall clock does.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    base: Vec<u8>,
    base_hex: String,
    counter: u16,
    last_timestamp_ms: u64,
}

impl IdGenerator {
    /// Create a generator with an empty base prefix
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a generator with the given hex base prefix
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdBase` if `base_hex` is not an even-length hex string.
    pub fn with_base(base_hex: &str) -> Result<Self> {
        let mut generator = Self::new();
        generator.set_base(base_hex)?;
        Ok(generator)
    }

    /// Replace the base prefix with the bytes of a hex string
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdBase` if `base_hex` is not an even-length hex string.
    pub fn set_base(&mut self, base_hex: &str) -> Result<()> {
        let bytes = hex::decode(base_hex).map_err(|e| ModelXError::InvalidIdBase {
            base: base_hex.to_string(),
            reason: e.to_string(),
        })?;
        self.base = bytes;
        self.base_hex = base_hex.to_ascii_lowercase();
        Ok(())
    }

    /// Replace the base prefix with a number, normalized to 8 hex digits
    pub fn set_base_numeric(&mut self, base: u32) {
        let normalized = format!("{:08x}", base);
        self.base = base.to_be_bytes().to_vec();
        self.base_hex = normalized;
    }

    /// Current base prefix as lowercase hex
    pub fn base_hex(&self) -> &str {
        &self.base_hex
    }

    /// Mint the next identifier
    pub fn generate(&mut self) -> ElementId {
        let now = now_ms();
        if now > self.last_timestamp_ms {
            self.last_timestamp_ms = now;
        }
        self.counter = self.counter.wrapping_add(1);

        let random = Uuid::new_v4();
        let random = random.as_bytes();

        let parts = DecodedId {
            base: self.base.clone(),
            timestamp_ms: self.last_timestamp_ms,
            counter: self.counter,
            random: u16::from_be_bytes([random[0], random[1]]),
        };
        ElementId::from_string(codec::encode(&parts))
    }

    /// Decode an identifier minted with this generator's base length
    ///
    /// # Errors
    ///
    /// Returns `IdDecode` if the identifier is malformed or has a different
    /// base length.
    pub fn decode(&self, id: &ElementId) -> Result<DecodedId> {
        codec::decode(id.as_str(), self.base.len())
    }
}

fn now_ms() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}
