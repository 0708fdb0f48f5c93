//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ auth engine / FSM (domain)
//! ```
//!
//! Driven adapters (cipher, motor, battery comparator, NVS) implement these
//! traits.  The auth engine consumes them via generics, so the domain core
//! never touches hardware or a concrete crypto library directly.
//!
//! ## Security notes
//!
//! - **CipherPort** failures are deliberately undifferentiated: a caller
//!   cannot distinguish a bad tag from a bad length, so neither can a log
//!   reader or a radio peer.
//! - **StoragePort** writes MUST be atomic per key — the credential store
//!   builds its torn-write protection on top of that guarantee.

use crate::app::events::AppEvent;

/// Symmetric key length in bytes.
pub const KEY_LEN: usize = 32;
/// Nonce length in bytes.
pub const NONCE_LEN: usize = 24;
/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

// ───────────────────────────────────────────────────────────────
// Cipher port (driven adapter: domain → AEAD implementation)
// ───────────────────────────────────────────────────────────────

/// Authenticated encryption seam.
///
/// Sealed messages are laid out tag-first: `tag(16) ‖ ciphertext`, with the
/// ciphertext the same length as the plaintext.
pub trait CipherPort {
    /// Seal `plaintext` into `out`, which must be `plaintext.len() + TAG_LEN`
    /// bytes long.
    fn seal(
        &self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        plaintext: &[u8],
        out: &mut [u8],
    ) -> Result<(), CipherError>;

    /// Open `sealed` (`tag ‖ ciphertext`) into `out`, which must hold
    /// `sealed.len() - TAG_LEN` bytes.  Returns the plaintext length.
    fn open(
        &self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        sealed: &[u8],
        out: &mut [u8],
    ) -> Result<usize, CipherError>;
}

/// Single opaque cipher failure.  No detail escapes the crypto boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherError;

impl core::fmt::Display for CipherError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "cipher operation failed")
    }
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → motor hardware)
// ───────────────────────────────────────────────────────────────

/// Outcome of a blocking rotation.
///
/// A jam or timeout is reported here for telemetry only; the protocol
/// response still carries the commanded direction's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotateOutcome {
    /// The bolt reached its end stop.
    Completed,
    /// The rotation hit the hard time cap without a clean stop.
    TimedOut,
}

/// Write-side port: the domain calls this to turn the bolt.
///
/// Both calls block for the duration of the rotation.
pub trait ActuatorPort {
    /// Rotate the bolt clockwise (locking direction).
    fn rotate_clockwise(&mut self) -> RotateOutcome;

    /// Rotate the bolt counter-clockwise (unlocking direction).
    fn rotate_counter_clockwise(&mut self) -> RotateOutcome;
}

// ───────────────────────────────────────────────────────────────
// Battery port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Battery comparator readout.
pub trait BatteryPort {
    /// Whether the supply has dropped below the low-battery threshold.
    fn is_low(&mut self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`]s through this port.
/// Adapters decide where they go (serial log, debug UART, nothing).
pub trait EventSink {
    fn emit(&mut self, event: &AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for the master credential record.
///
/// # Security
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic per key — no partial value visible
///   after power loss.  The ESP-IDF NVS API guarantees this natively;
///   in-memory simulation achieves it trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Stored value failed deserialization.
    Corrupted,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// A write was refused because it would violate a store invariant
    /// (e.g. a non-monotonic high-water-mark).
    InvalidWrite,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Corrupted => write!(f, "record corrupted"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::InvalidWrite => write!(f, "invalid write refused"),
        }
    }
}
