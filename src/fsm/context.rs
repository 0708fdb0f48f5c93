//! Shared FSM blackboard.
//!
//! State handlers are plain `fn` pointers, so everything they read or
//! write lives here: radio acknowledgement flags set by message dispatch,
//! the incoming message buffer, the outbound command queue, the volatile
//! session, and the outcome slot the main loop fills after running an
//! authenticated exchange.

use log::{debug, warn};

use crate::auth::engine::{REQUEST_LEN, Session, TICKET_LEN};
use crate::config::SystemConfig;
use crate::error::AuthError;
use crate::link::chunker::ResponseChunker;
use crate::link::wire::{
    HANDLE_LOCK_RECEIVE, HANDLE_LOCK_TRANSMIT, MAX_COMMAND_DATA, RadioCommand, RadioMessage,
    connection_established,
};

// ---------------------------------------------------------------------------
// Radio acknowledgement flags
// ---------------------------------------------------------------------------

/// Latched radio responses and events, consumed once by state handlers.
#[derive(Debug, Default)]
pub struct RadioFlags {
    boot: bool,
    adv_params_acked: bool,
    adv_data_acked: bool,
    mode_acked: bool,
    connected: bool,
    disconnected: bool,
    /// The radio's public address, kept for the scan response payload.
    pub address: Option<[u8; 6]>,
}

impl RadioFlags {
    pub fn take_boot(&mut self) -> bool {
        core::mem::take(&mut self.boot)
    }
    pub fn take_adv_params_acked(&mut self) -> bool {
        core::mem::take(&mut self.adv_params_acked)
    }
    pub fn take_adv_data_acked(&mut self) -> bool {
        core::mem::take(&mut self.adv_data_acked)
    }
    pub fn take_mode_acked(&mut self) -> bool {
        core::mem::take(&mut self.mode_acked)
    }
    pub fn take_connected(&mut self) -> bool {
        core::mem::take(&mut self.connected)
    }
    pub fn take_disconnected(&mut self) -> bool {
        core::mem::take(&mut self.disconnected)
    }
}

// ---------------------------------------------------------------------------
// Incoming message buffer
// ---------------------------------------------------------------------------

/// Accumulates attribute-write fragments until a complete ticket or
/// request is present.  Processing is gated on the *exact* lengths, so a
/// short or overlong write never reaches the auth engine.
#[derive(Debug)]
pub struct MessageBuffer {
    data: [u8; TICKET_LEN],
    len: usize,
}

impl MessageBuffer {
    pub const fn new() -> Self {
        Self {
            data: [0; TICKET_LEN],
            len: 0,
        }
    }

    /// Append a fragment.  Anything past the ticket length is dropped —
    /// the length gate would reject the message anyway.
    pub fn push_fragment(&mut self, fragment: &[u8]) {
        let room = TICKET_LEN - self.len;
        if fragment.len() > room {
            warn!("message buffer overrun, dropping {} bytes", fragment.len());
            return;
        }
        self.data[self.len..self.len + fragment.len()].copy_from_slice(fragment);
        self.len += fragment.len();
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// The buffer holds exactly one complete ticket.
    pub fn as_ticket(&self) -> Option<&[u8; TICKET_LEN]> {
        (self.len == TICKET_LEN).then_some(&self.data)
    }

    /// The buffer holds exactly one complete request.
    pub fn as_request(&self) -> Option<&[u8; REQUEST_LEN]> {
        if self.len != REQUEST_LEN {
            return None;
        }
        self.data[..REQUEST_LEN].try_into().ok()
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Outbound commands
// ---------------------------------------------------------------------------

/// Commands queued by state handlers, flushed by the main loop each tick.
#[derive(Debug, Default)]
pub struct LockCommands {
    pub radio: heapless::Vec<RadioCommand, 8>,
    /// Advertising is live; the main loop may enter light sleep.
    pub power_down: bool,
}

impl LockCommands {
    pub fn push_radio(&mut self, command: RadioCommand) {
        if self.radio.push(command).is_err() {
            // the queue is flushed every tick, so this is a handler bug
            warn!("radio command queue full, command dropped");
        }
    }
}

// ---------------------------------------------------------------------------
// Exchange plumbing between FSM and main loop
// ---------------------------------------------------------------------------

/// Which exchange the current state wants the main loop to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingExchange {
    Ticket,
    Request,
}

// ---------------------------------------------------------------------------
// The context itself
// ---------------------------------------------------------------------------

pub struct LockContext {
    pub config: SystemConfig,
    pub session: Session,
    pub msg_buf: MessageBuffer,
    pub chunker: ResponseChunker,
    pub radio: RadioFlags,
    pub commands: LockCommands,
    /// Set by `TicketReceived`/`RequestReceived` on entry; taken by the
    /// main loop, which runs the engine and fills `exchange_outcome`.
    pub pending_exchange: Option<PendingExchange>,
    pub exchange_outcome: Option<Result<(), AuthError>>,
    /// Ticks since the current state was entered (maintained by the engine).
    pub ticks_in_state: u64,
    pub total_ticks: u64,
}

impl LockContext {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            config,
            session: Session::new(),
            msg_buf: MessageBuffer::new(),
            chunker: ResponseChunker::new(),
            radio: RadioFlags::default(),
            commands: LockCommands::default(),
            pending_exchange: None,
            exchange_outcome: None,
            ticks_in_state: 0,
            total_ticks: 0,
        }
    }

    /// Fold one decoded radio message into the context.
    ///
    /// This is the single dispatch point: acknowledgements latch flags for
    /// the state handlers, attribute writes accumulate in the message
    /// buffer, and write confirmations drive the response chunker.
    pub fn apply(&mut self, message: &RadioMessage) {
        match message {
            RadioMessage::BootEvent => self.radio.boot = true,
            RadioMessage::AddressResponse { address } => {
                self.radio.address = Some(*address);
            }
            RadioMessage::AdvParametersResponse { result } => {
                warn_nonzero("set adv parameters", *result);
                self.radio.adv_params_acked = true;
            }
            RadioMessage::AdvDataResponse { result } => {
                warn_nonzero("set adv data", *result);
                self.radio.adv_data_acked = true;
            }
            RadioMessage::ModeResponse { result } => {
                warn_nonzero("set mode", *result);
                self.radio.mode_acked = true;
            }
            RadioMessage::WriteAttributeResponse { result } => {
                if *result == 0 {
                    if let Some(chunk) = self.chunker.acknowledge() {
                        if let Ok(data) = heapless::Vec::<u8, MAX_COMMAND_DATA>::from_slice(chunk) {
                            self.commands.push_radio(RadioCommand::WriteAttribute {
                                handle: HANDLE_LOCK_TRANSMIT,
                                offset: 0,
                                data,
                            });
                        }
                    }
                } else {
                    warn!("attribute write failed ({result:#06x}), dropping response");
                    self.chunker.abort();
                }
            }
            RadioMessage::ConnectionStatusEvent { flags } => {
                if connection_established(*flags) {
                    self.radio.connected = true;
                } else {
                    debug!("connection status flags {flags:#04x}, not yet established");
                }
            }
            RadioMessage::DisconnectedEvent { reason } => {
                debug!("peer disconnected (reason {reason:#06x})");
                self.radio.disconnected = true;
            }
            RadioMessage::AttributeValueEvent { handle, data } => {
                if *handle == HANDLE_LOCK_RECEIVE {
                    self.msg_buf.push_fragment(data);
                } else {
                    debug!("ignoring write to handle {handle:#06x}");
                }
            }
        }
    }
}

fn warn_nonzero(what: &str, result: u16) {
    if result != 0 {
        warn!("{what} returned {result:#06x}");
    }
}
