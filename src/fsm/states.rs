//! Concrete state handler functions and table builder.
//!
//! Each state is defined by three plain `fn` pointers — no closures, no
//! dynamic dispatch, no heap.  Bring-up states queue one radio command on
//! entry and wait for its acknowledgement flag; an established-connection
//! event short-circuits any bring-up state straight to `Connected`, and a
//! disconnect drops any connected state to `Disconnected`.

use log::{info, warn};

use super::context::{LockContext, PendingExchange};
use super::{StateDescriptor, StateId};
use crate::link::wire::{
    ADV_DATA, GAP_CONNECT_UNDIRECTED, GAP_DISCOVER_GENERAL, RadioCommand, scan_response_payload,
};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0 — Booting
        StateDescriptor {
            id: StateId::Booting,
            name: "Booting",
            on_enter: Some(booting_enter),
            on_exit: None,
            on_update: booting_update,
        },
        // Index 1 — AddressQuery
        StateDescriptor {
            id: StateId::AddressQuery,
            name: "AddressQuery",
            on_enter: Some(address_query_enter),
            on_exit: None,
            on_update: address_query_update,
        },
        // Index 2 — AdvertiseParamSet
        StateDescriptor {
            id: StateId::AdvertiseParamSet,
            name: "AdvertiseParamSet",
            on_enter: Some(adv_params_enter),
            on_exit: None,
            on_update: adv_params_update,
        },
        // Index 3 — AdvertiseDataSet
        StateDescriptor {
            id: StateId::AdvertiseDataSet,
            name: "AdvertiseDataSet",
            on_enter: Some(adv_data_enter),
            on_exit: None,
            on_update: adv_data_update,
        },
        // Index 4 — ScanResponseSet
        StateDescriptor {
            id: StateId::ScanResponseSet,
            name: "ScanResponseSet",
            on_enter: Some(scan_response_enter),
            on_exit: None,
            on_update: scan_response_update,
        },
        // Index 5 — Advertising
        StateDescriptor {
            id: StateId::Advertising,
            name: "Advertising",
            on_enter: Some(advertising_enter),
            on_exit: None,
            on_update: advertising_update,
        },
        // Index 6 — Connected
        StateDescriptor {
            id: StateId::Connected,
            name: "Connected",
            on_enter: Some(connected_enter),
            on_exit: None,
            on_update: connected_update,
        },
        // Index 7 — TicketReceived
        StateDescriptor {
            id: StateId::TicketReceived,
            name: "TicketReceived",
            on_enter: Some(ticket_received_enter),
            on_exit: None,
            on_update: ticket_received_update,
        },
        // Index 8 — AwaitingRequest
        StateDescriptor {
            id: StateId::AwaitingRequest,
            name: "AwaitingRequest",
            on_enter: Some(awaiting_request_enter),
            on_exit: None,
            on_update: awaiting_request_update,
        },
        // Index 9 — RequestReceived
        StateDescriptor {
            id: StateId::RequestReceived,
            name: "RequestReceived",
            on_enter: Some(request_received_enter),
            on_exit: None,
            on_update: request_received_update,
        },
        // Index 10 — Disconnected
        StateDescriptor {
            id: StateId::Disconnected,
            name: "Disconnected",
            on_enter: Some(disconnected_enter),
            on_exit: None,
            on_update: disconnected_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Shared guards
// ═══════════════════════════════════════════════════════════════════════════

/// Bring-up states: a peer may connect at any point once advertising
/// parameters from a previous cycle are live.
fn connect_guard(ctx: &mut LockContext) -> Option<StateId> {
    ctx.radio.take_connected().then_some(StateId::Connected)
}

/// Connected states: a disconnect at any point abandons the session.
fn disconnect_guard(ctx: &mut LockContext) -> Option<StateId> {
    ctx.radio
        .take_disconnected()
        .then_some(StateId::Disconnected)
}

// ═══════════════════════════════════════════════════════════════════════════
//  Bring-up states
// ═══════════════════════════════════════════════════════════════════════════

fn booting_enter(_ctx: &mut LockContext) {
    info!("BOOTING: waiting for radio boot event");
}

fn booting_update(ctx: &mut LockContext) -> Option<StateId> {
    ctx.radio.take_boot().then_some(StateId::AddressQuery)
}

fn address_query_enter(ctx: &mut LockContext) {
    ctx.commands.push_radio(RadioCommand::GetAddress);
}

fn address_query_update(ctx: &mut LockContext) -> Option<StateId> {
    if let Some(next) = connect_guard(ctx) {
        return Some(next);
    }
    ctx.radio
        .address
        .is_some()
        .then_some(StateId::AdvertiseParamSet)
}

fn adv_params_enter(ctx: &mut LockContext) {
    ctx.commands.push_radio(RadioCommand::SetAdvParameters {
        interval_min: ctx.config.adv_interval_min,
        interval_max: ctx.config.adv_interval_max,
        channels: ctx.config.adv_channels,
    });
}

fn adv_params_update(ctx: &mut LockContext) -> Option<StateId> {
    if let Some(next) = connect_guard(ctx) {
        return Some(next);
    }
    ctx.radio
        .take_adv_params_acked()
        .then_some(StateId::AdvertiseDataSet)
}

fn adv_data_enter(ctx: &mut LockContext) {
    let data = heapless::Vec::from_slice(&ADV_DATA).unwrap_or_default();
    ctx.commands.push_radio(RadioCommand::SetAdvData {
        scan_response: false,
        data,
    });
}

fn adv_data_update(ctx: &mut LockContext) -> Option<StateId> {
    if let Some(next) = connect_guard(ctx) {
        return Some(next);
    }
    ctx.radio
        .take_adv_data_acked()
        .then_some(StateId::ScanResponseSet)
}

fn scan_response_enter(ctx: &mut LockContext) {
    let Some(address) = ctx.radio.address else {
        // AddressQuery always precedes this state on a fresh boot, and the
        // address survives re-advertising cycles.
        warn!("scan response without a radio address");
        return;
    };
    ctx.commands.push_radio(RadioCommand::SetAdvData {
        scan_response: true,
        data: scan_response_payload(&address),
    });
}

fn scan_response_update(ctx: &mut LockContext) -> Option<StateId> {
    if let Some(next) = connect_guard(ctx) {
        return Some(next);
    }
    ctx.radio
        .take_adv_data_acked()
        .then_some(StateId::Advertising)
}

fn advertising_enter(ctx: &mut LockContext) {
    ctx.commands.push_radio(RadioCommand::SetMode {
        discoverable: GAP_DISCOVER_GENERAL,
        connectable: GAP_CONNECT_UNDIRECTED,
    });
}

fn advertising_update(ctx: &mut LockContext) -> Option<StateId> {
    if let Some(next) = connect_guard(ctx) {
        return Some(next);
    }
    if ctx.radio.take_mode_acked() {
        info!("ADVERTISING: mode set, requesting power down");
        ctx.commands.power_down = true;
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  Connected states
// ═══════════════════════════════════════════════════════════════════════════

fn connected_enter(ctx: &mut LockContext) {
    // Also the fall-back point after a rejected ticket.
    ctx.msg_buf.clear();
    // Sleep is scoped to advertising; a live connection must keep the
    // main loop polling.
    ctx.commands.power_down = false;
    info!("CONNECTED: awaiting ticket");
}

fn connected_update(ctx: &mut LockContext) -> Option<StateId> {
    if let Some(next) = disconnect_guard(ctx) {
        return Some(next);
    }
    ctx.msg_buf
        .as_ticket()
        .is_some()
        .then_some(StateId::TicketReceived)
}

fn ticket_received_enter(ctx: &mut LockContext) {
    ctx.exchange_outcome = None;
    ctx.pending_exchange = Some(PendingExchange::Ticket);
}

fn ticket_received_update(ctx: &mut LockContext) -> Option<StateId> {
    if let Some(next) = disconnect_guard(ctx) {
        return Some(next);
    }
    match ctx.exchange_outcome.take() {
        Some(Ok(())) => Some(StateId::AwaitingRequest),
        Some(Err(e)) => {
            warn!("ticket rejected (code {})", e.code());
            Some(StateId::Connected)
        }
        None => None, // engine still pending
    }
}

fn awaiting_request_enter(ctx: &mut LockContext) {
    ctx.msg_buf.clear();
}

fn awaiting_request_update(ctx: &mut LockContext) -> Option<StateId> {
    if let Some(next) = disconnect_guard(ctx) {
        return Some(next);
    }
    ctx.msg_buf
        .as_request()
        .is_some()
        .then_some(StateId::RequestReceived)
}

fn request_received_enter(ctx: &mut LockContext) {
    ctx.exchange_outcome = None;
    ctx.pending_exchange = Some(PendingExchange::Request);
}

fn request_received_update(ctx: &mut LockContext) -> Option<StateId> {
    if let Some(next) = disconnect_guard(ctx) {
        return Some(next);
    }
    match ctx.exchange_outcome.take() {
        // Success or rejection, the session stays up for further requests.
        Some(Ok(())) => Some(StateId::AwaitingRequest),
        Some(Err(e)) => {
            warn!("request rejected (code {})", e.code());
            Some(StateId::AwaitingRequest)
        }
        None => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Disconnected
// ═══════════════════════════════════════════════════════════════════════════

fn disconnected_enter(ctx: &mut LockContext) {
    ctx.session.clear();
    ctx.msg_buf.clear();
    ctx.chunker.abort();
    ctx.pending_exchange = None;
    ctx.exchange_outcome = None;
    // Stays withdrawn until the next advertising cycle re-requests it.
    ctx.commands.power_down = false;
    info!("DISCONNECTED: session discarded, restarting advertising");
}

fn disconnected_update(_ctx: &mut LockContext) -> Option<StateId> {
    Some(StateId::AdvertiseParamSet)
}
