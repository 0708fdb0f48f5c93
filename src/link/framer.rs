//! Deadline-based serial framing.
//!
//! The framer owns the byte-level conversation with the radio over a
//! [`SerialLink`]:
//!
//! - **Transmit**: a leading length byte (the radio's packet-mode framing),
//!   then header and payload, waiting for clear-to-send before every byte.
//!   A co-processor that never asserts CTS within the deadline produces
//!   [`LinkError::Timeout`].
//! - **Receive**: the ready-to-receive line is asserted only while the
//!   framer is actually draining, per-byte deadlines are computed from a
//!   monotonic [`Clock`] (no hardware-timer polling), and a frame that
//!   starts but stalls yields [`LinkError::Partial`].
//!
//! An idle link — zero bytes by the header deadline — is not an error;
//! `poll_frame` returns `Ok(None)` and the main loop carries on.

use crate::error::{Error, LinkError};
use crate::link::wire::{FramePayload, HEADER_LEN, PacketHeader};

/// Byte-level serial access, implemented by the UART adapter on hardware
/// and by scripted fakes in tests.
pub trait SerialLink {
    /// Non-blocking read of the next received byte.
    fn poll_byte(&mut self) -> Result<Option<u8>, LinkError>;

    /// Attempt to transmit one byte.  Returns `Ok(false)` when the
    /// co-processor is not clear-to-send; the framer retries until its
    /// deadline.
    fn try_write_byte(&mut self, byte: u8) -> Result<bool, LinkError>;

    /// Drive the ready-to-receive flow-control output.
    fn set_ready_to_receive(&mut self, ready: bool);
}

/// Monotonic millisecond clock.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

/// Frames packets over a [`SerialLink`] with per-byte deadlines.
pub struct Framer<L: SerialLink, C: Clock> {
    link: L,
    clock: C,
    timeout_ms: u64,
}

impl<L: SerialLink, C: Clock> Framer<L, C> {
    pub fn new(link: L, clock: C, timeout_ms: u32) -> Self {
        Self {
            link,
            clock,
            timeout_ms: u64::from(timeout_ms),
        }
    }

    /// Access the underlying link; the UART adapter needs servicing
    /// between polls.
    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    /// Send one packet: length byte, header, payload.
    pub fn send(&mut self, header: &PacketHeader, payload: &[u8]) -> Result<(), LinkError> {
        self.send_byte((HEADER_LEN + payload.len()) as u8)?;
        for byte in header.to_bytes() {
            self.send_byte(byte)?;
        }
        for &byte in payload {
            self.send_byte(byte)?;
        }
        Ok(())
    }

    /// Poll for one complete packet.
    ///
    /// `Ok(None)` means the link was idle.  A header that starts arriving
    /// but stalls, or a payload that stalls at any point, is a fatal
    /// [`LinkError::Partial`].
    pub fn poll_frame(&mut self) -> Result<Option<(PacketHeader, FramePayload)>, Error> {
        self.link.set_ready_to_receive(true);
        let result = self.poll_frame_inner();
        self.link.set_ready_to_receive(false);
        result
    }

    fn poll_frame_inner(&mut self) -> Result<Option<(PacketHeader, FramePayload)>, Error> {
        let mut header_buf = [0u8; HEADER_LEN];
        match self.read_exact(&mut header_buf) {
            Ok(()) => {}
            Err(LinkError::Timeout) => return Ok(None), // idle link
            Err(e) => return Err(e.into()),
        }
        let header = PacketHeader::from_bytes(&header_buf)?;

        let mut payload = FramePayload::new();
        // capacity is MAX_PAYLOAD_LEN and the header parse bounds payload_len
        let _ = payload.resize_default(header.payload_len as usize);
        match self.read_exact(&mut payload) {
            Ok(()) => Ok(Some((header, payload))),
            // once a frame has started, even a clean stall is a partial frame
            Err(LinkError::Timeout | LinkError::Partial) => Err(LinkError::Partial.into()),
            Err(e) => Err(e.into()),
        }
    }

    fn send_byte(&mut self, byte: u8) -> Result<(), LinkError> {
        let deadline = self.clock.now_ms() + self.timeout_ms;
        loop {
            if self.link.try_write_byte(byte)? {
                return Ok(());
            }
            if self.clock.now_ms() >= deadline {
                return Err(LinkError::Timeout);
            }
        }
    }

    /// Fill `buf`, restarting the deadline on every received byte.
    ///
    /// Errors: [`LinkError::Timeout`] if nothing at all arrived,
    /// [`LinkError::Partial`] if the stream stalled mid-buffer.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), LinkError> {
        let mut received = 0;
        let mut deadline = self.clock.now_ms() + self.timeout_ms;
        while received < buf.len() {
            match self.link.poll_byte()? {
                Some(byte) => {
                    buf[received] = byte;
                    received += 1;
                    deadline = self.clock.now_ms() + self.timeout_ms;
                }
                None => {
                    if self.clock.now_ms() >= deadline {
                        return Err(if received == 0 {
                            LinkError::Timeout
                        } else {
                            LinkError::Partial
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
