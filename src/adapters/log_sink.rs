//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to the debug UART in production).

use log::info;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::RadioReady { address } => {
                info!(
                    "RADIO | ready, address={:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
                    address[5], address[4], address[3], address[2], address[1], address[0],
                );
            }
            AppEvent::AdvertisingStarted => {
                info!("RADIO | advertising");
            }
            AppEvent::PeerConnected => {
                info!("PEER  | connected (encrypted)");
            }
            AppEvent::PeerDisconnected { reason } => {
                info!("PEER  | disconnected, reason={reason:#06x}");
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::TicketAccepted { low_battery } => {
                info!("AUTH  | ticket accepted, low_battery={low_battery}");
            }
            AppEvent::RequestCompleted { clockwise, outcome } => {
                info!(
                    "AUTH  | request {} ({:?})",
                    if *clockwise { "lock" } else { "unlock" },
                    outcome,
                );
            }
            AppEvent::ExchangeRejected { code } => {
                info!("AUTH  | exchange rejected, code={code}");
            }
            AppEvent::ManualRotate { clockwise, outcome } => {
                info!(
                    "LOCAL | button {} ({:?})",
                    if *clockwise { "lock" } else { "unlock" },
                    outcome,
                );
            }
        }
    }
}
