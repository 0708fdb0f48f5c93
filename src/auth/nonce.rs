//! 24-byte big-endian nonce arithmetic.
//!
//! Nonces double as replay counters: a peer must always present a value
//! strictly greater than the last one the lock accepted.  "Greater" is
//! plain lexicographic comparison with the most significant byte first,
//! so the byte array compares the same way the 192-bit integer it encodes
//! would.
//!
//! Incrementing wraps: a nonce of all `0xFF` becomes all zero.  The wrap
//! is deliberate and covered by tests — after a wrap every comparison
//! fails until a credential with a larger high-water-mark is provisioned,
//! which is the correct failure mode for a replay counter that has been
//! exhausted (2^192 exchanges away in practice).

use serde::{Deserialize, Serialize};

use crate::app::ports::NONCE_LEN;

/// A 24-byte big-endian counter nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Nonce(pub [u8; NONCE_LEN]);

impl Nonce {
    /// The all-zero nonce, used as the base of a fresh session.
    pub const ZERO: Self = Self([0; NONCE_LEN]);

    /// Borrow a nonce out of the leading bytes of a protocol message.
    ///
    /// Returns `None` if `bytes` is shorter than [`NONCE_LEN`].
    pub fn from_prefix(bytes: &[u8]) -> Option<Self> {
        let head: &[u8; NONCE_LEN] = bytes.get(..NONCE_LEN)?.try_into().ok()?;
        Some(Self(*head))
    }

    /// Increment by one with big-endian carry.  All-`0xFF` wraps to zero.
    pub fn increment(&mut self) {
        for byte in self.0.iter_mut().rev() {
            let (next, carry) = byte.overflowing_add(1);
            *byte = next;
            if !carry {
                return;
            }
        }
    }

    /// Strict lexicographic greater-than, most significant byte first.
    /// Equal nonces are not greater (a replay of the last accepted value
    /// is rejected).
    pub fn is_greater_than(&self, other: &Self) -> bool {
        self.0 > other.0
    }

    pub const fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}
