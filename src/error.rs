//! Unified error types for the deadbolt firmware.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! top-level control loop's error handling uniform.  All variants are `Copy`
//! so they can be cheaply passed through the FSM and the main loop without
//! allocation.
//!
//! Fault policy (enforced by `Error::is_fatal`):
//! - Link faults (timeout, partial frame, receive overflow) and protocol
//!   faults (unrecognised packet) mean the co-processor conversation is
//!   desynchronised.  The only safe recovery is a soft reset.
//! - Auth faults are per-exchange rejections: the connection stays up, the
//!   message buffer is cleared, and nothing is sent on the wire.

use core::fmt;

use crate::app::ports::StorageError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The serial link to the radio co-processor failed.
    Link(LinkError),
    /// The radio sent something we cannot interpret.
    Protocol(ProtocolError),
    /// An authenticated exchange was rejected.
    Auth(AuthError),
    /// The credential store could not be read or written.
    Storage(StorageError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl Error {
    /// Whether the fault requires a soft reset to recover.
    ///
    /// Auth rejections are the only recoverable category; everything else
    /// leaves the link, the store, or the boot sequence in an unknown state.
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::Auth(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Auth(e) => write!(f, "auth: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Serial link errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// No byte arrived before the deadline, or the co-processor never
    /// asserted clear-to-send for a transmit.
    Timeout,
    /// A frame started arriving but stalled before its declared length.
    Partial,
    /// The ISR-side receive ring filled up; bytes were lost.
    Overflow,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "serial timeout"),
            Self::Partial => write!(f, "partial frame"),
            Self::Overflow => write!(f, "receive ring overflow"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Wire protocol errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// The (class, id) pair is not one of the messages this firmware
    /// consumes.  An unknown message means we have lost frame alignment
    /// or the co-processor firmware changed underneath us.
    UnknownMessage { class: u8, id: u8 },
    /// The payload is shorter than the message layout requires.
    Truncated,
    /// The declared payload length exceeds the frame limit.
    Oversize,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMessage { class, id } => {
                write!(f, "unknown message class={class:#04x} id={id:#04x}")
            }
            Self::Truncated => write!(f, "truncated payload"),
            Self::Oversize => write!(f, "oversize payload"),
        }
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Authentication errors
// ---------------------------------------------------------------------------

/// Per-exchange rejection reasons.
///
/// These never appear on the wire: a rejected exchange is simply not
/// answered.  The numeric codes exist for logs and the event sink only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthError {
    /// The presented nonce is not strictly greater than the stored
    /// high-water-mark (replayed or reordered message).
    StaleNonce = 1,
    /// Ciphertext failed authentication or decryption.
    DecryptFailed = 2,
    /// The response could not be sealed.
    EncryptFailed = 3,
}

impl AuthError {
    /// Diagnostic code, stable across firmware versions.
    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StaleNonce => write!(f, "stale nonce"),
            Self::DecryptFailed => write!(f, "decrypt failed"),
            Self::EncryptFailed => write!(f, "encrypt failed"),
        }
    }
}

impl From<AuthError> for Error {
    fn from(e: AuthError) -> Self {
        Self::Auth(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
