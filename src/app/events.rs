//! Outbound application events.
//!
//! The auth engine and the main loop emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them — log to serial, feed a debug UART, or drop
//! them entirely on a release build.

use crate::app::ports::RotateOutcome;
use crate::fsm::StateId;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The radio finished its boot sequence and reported its address.
    RadioReady { address: [u8; 6] },

    /// Advertising is live and the MCU may power down between events.
    AdvertisingStarted,

    /// An encrypted connection was established.
    PeerConnected,

    /// The peer disconnected (radio reason code attached).
    PeerDisconnected { reason: u16 },

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// A ticket was accepted and a session established.
    TicketAccepted { low_battery: bool },

    /// A request completed and the bolt was driven.
    RequestCompleted { clockwise: bool, outcome: RotateOutcome },

    /// An exchange was rejected locally; nothing was sent on the wire.
    ExchangeRejected { code: u8 },

    /// A physical button drove the bolt, bypassing the radio protocol.
    ManualRotate { clockwise: bool, outcome: RotateOutcome },
}
