//! Outbound response chunking.
//!
//! The 41-byte authenticated response does not fit a single attribute
//! write, so it goes out in three pieces:
//!
//! ```text
//! chunk 0: bytes [ 0..20)   released by begin()
//! chunk 1: bytes [20..40)   released by acknowledge() of chunk 0
//! chunk 2: bytes [40..41)   released by acknowledge() of chunk 1
//! ```
//!
//! Each chunk is handed out only after the radio confirms the previous
//! attribute write.  A failed write aborts the whole sequence; the peer
//! simply never sees a complete response.

use crate::auth::engine::RESPONSE_LEN;

/// Attribute write capacity per chunk.
pub const CHUNK_LEN: usize = 20;

/// Ack-gated splitter for one in-flight response.
#[derive(Debug)]
pub struct ResponseChunker {
    data: [u8; RESPONSE_LEN],
    offset: usize,
    active: bool,
}

impl ResponseChunker {
    pub const fn new() -> Self {
        Self {
            data: [0; RESPONSE_LEN],
            offset: 0,
            active: false,
        }
    }

    /// Load a response and return the first chunk.  Any sequence still in
    /// flight is discarded.
    pub fn begin(&mut self, response: &[u8; RESPONSE_LEN]) -> &[u8] {
        self.data = *response;
        self.offset = 0;
        self.active = true;
        &self.data[..CHUNK_LEN]
    }

    /// Confirm the in-flight chunk and release the next one.
    /// Returns `None` once the final chunk has been confirmed (or when no
    /// sequence is active).
    pub fn acknowledge(&mut self) -> Option<&[u8]> {
        if !self.active {
            return None;
        }
        self.offset += self.chunk_len();
        if self.offset >= RESPONSE_LEN {
            self.active = false;
            return None;
        }
        let end = self.offset + self.chunk_len();
        Some(&self.data[self.offset..end])
    }

    /// Drop the sequence after a failed write confirmation.
    pub fn abort(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn chunk_len(&self) -> usize {
        CHUNK_LEN.min(RESPONSE_LEN - self.offset)
    }
}

impl Default for ResponseChunker {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────
