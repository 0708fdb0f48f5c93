//! Integration tests: the full radio conversation driven through
//! `LockService`, from boot to authenticated rotations.
//!
//! The harness plays the radio co-processor: it feeds decoded messages in,
//! collects queued commands, and acknowledges attribute writes the way the
//! real radio does — which is what releases the chunked responses.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use deadbolt::Error;
use deadbolt::adapters::mem::MemStorage;
use deadbolt::app::events::AppEvent;
use deadbolt::app::ports::{
    ActuatorPort, BatteryPort, CipherPort, EventSink, KEY_LEN, NONCE_LEN, RotateOutcome,
    StorageError, StoragePort,
};
use deadbolt::auth::engine::{REQUEST_LEN, RESPONSE_LEN, ResponseStatus, TICKET_LEN};
use deadbolt::auth::nonce::Nonce;
use deadbolt::app::service::LockService;
use deadbolt::config::SystemConfig;
use deadbolt::crypto::SecretboxCipher;
use deadbolt::events::Event;
use deadbolt::fsm::StateId;
use deadbolt::fsm::context::LockContext;
use deadbolt::link::wire::{HANDLE_LOCK_RECEIVE, HANDLE_LOCK_TRANSMIT, RadioCommand, RadioMessage};
use deadbolt::store::CredentialStore;

const MASTER_KEY: [u8; KEY_LEN] = [0x42; KEY_LEN];
const SESSION_KEY: [u8; KEY_LEN] = [0x77; KEY_LEN];

// ── Test doubles ──────────────────────────────────────────────

#[derive(Clone, Default)]
struct SpyActuator {
    clockwise: Rc<Cell<u32>>,
    counter_clockwise: Rc<Cell<u32>>,
}

impl ActuatorPort for SpyActuator {
    fn rotate_clockwise(&mut self) -> RotateOutcome {
        self.clockwise.set(self.clockwise.get() + 1);
        RotateOutcome::Completed
    }
    fn rotate_counter_clockwise(&mut self) -> RotateOutcome {
        self.counter_clockwise.set(self.counter_clockwise.get() + 1);
        RotateOutcome::Completed
    }
}

struct FixedBattery(bool);

impl BatteryPort for FixedBattery {
    fn is_low(&mut self) -> bool {
        self.0
    }
}

#[derive(Clone, Default)]
struct RecordingSink(Rc<RefCell<Vec<AppEvent>>>);

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.0.borrow_mut().push(event.clone());
    }
}

/// Storage that can be told to start failing writes, to exercise the
/// fatal path when the nonce spend cannot be persisted.
#[derive(Clone)]
struct FlakyStorage {
    inner: MemStorage,
    fail_writes: Rc<Cell<bool>>,
}

impl StoragePort for FlakyStorage {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.inner.read(namespace, key, buf)
    }
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes.get() {
            return Err(StorageError::IoError);
        }
        self.inner.write(namespace, key, data)
    }
    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.inner.exists(namespace, key)
    }
}

// ── Sealing helpers (the peer's side of the protocol) ─────────

fn nonce(last: u8) -> Nonce {
    let mut n = Nonce::ZERO;
    n.0[NONCE_LEN - 1] = last;
    n
}

fn seal_ticket(nonce: &Nonce) -> [u8; TICKET_LEN] {
    let cipher = SecretboxCipher::new();
    let mut ticket = [0u8; TICKET_LEN];
    ticket[..NONCE_LEN].copy_from_slice(nonce.as_bytes());
    cipher
        .seal(
            &MASTER_KEY,
            nonce.as_bytes(),
            &SESSION_KEY,
            &mut ticket[NONCE_LEN..],
        )
        .unwrap();
    ticket
}

fn seal_request(nonce: &Nonce, action: u8) -> [u8; REQUEST_LEN] {
    let cipher = SecretboxCipher::new();
    let mut request = [0u8; REQUEST_LEN];
    request[..NONCE_LEN].copy_from_slice(nonce.as_bytes());
    cipher
        .seal(
            &SESSION_KEY,
            nonce.as_bytes(),
            &[action],
            &mut request[NONCE_LEN..],
        )
        .unwrap();
    request
}

fn open_response(response: &[u8; RESPONSE_LEN]) -> (Nonce, u8) {
    let cipher = SecretboxCipher::new();
    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&response[..NONCE_LEN]);
    let mut status = [0u8; 1];
    cipher
        .open(
            &SESSION_KEY,
            &nonce_bytes,
            &response[NONCE_LEN..],
            &mut status,
        )
        .unwrap();
    (Nonce(nonce_bytes), status[0])
}

// ── Harness ───────────────────────────────────────────────────

struct Harness {
    service: LockService<SecretboxCipher, SpyActuator, FixedBattery, FlakyStorage, RecordingSink>,
    ctx: LockContext,
    actuator: SpyActuator,
    events: RecordingSink,
    fail_writes: Rc<Cell<bool>>,
}

impl Harness {
    fn new(low_battery: bool) -> Self {
        let fail_writes = Rc::new(Cell::new(false));
        let storage = FlakyStorage {
            inner: MemStorage::new(),
            fail_writes: fail_writes.clone(),
        };
        let store = CredentialStore::provision(storage, MASTER_KEY).unwrap();
        let actuator = SpyActuator::default();
        let events = RecordingSink::default();
        let mut ctx = LockContext::new(SystemConfig::default());
        let mut service = LockService::new(
            SecretboxCipher::new(),
            actuator.clone(),
            FixedBattery(low_battery),
            store,
            events.clone(),
        );
        service.start(&mut ctx);
        Self {
            service,
            ctx,
            actuator,
            events,
            fail_writes,
        }
    }

    fn msg(&mut self, message: RadioMessage) {
        self.service.handle_message(&mut self.ctx, &message);
    }

    fn tick(&mut self) {
        self.service.tick(&mut self.ctx).unwrap();
    }

    fn state(&self) -> StateId {
        self.service.state()
    }

    /// Walk the whole radio bring-up conversation to `Advertising`.
    fn bring_up(&mut self) {
        self.msg(RadioMessage::BootEvent);
        self.tick();
        self.msg(RadioMessage::AddressResponse {
            address: [0xEF, 0xBE, 0xAD, 0xDE, 0x34, 0x12],
        });
        self.tick();
        self.msg(RadioMessage::AdvParametersResponse { result: 0 });
        self.tick();
        self.msg(RadioMessage::AdvDataResponse { result: 0 });
        self.tick();
        self.msg(RadioMessage::AdvDataResponse { result: 0 });
        self.tick();
        assert_eq!(self.state(), StateId::Advertising);
        self.msg(RadioMessage::ModeResponse { result: 0 });
        self.tick();
        self.ctx.commands.radio.clear();
    }

    fn connect(&mut self) {
        self.msg(RadioMessage::ConnectionStatusEvent { flags: 0x05 });
        self.tick();
        assert_eq!(self.state(), StateId::Connected);
    }

    /// Deliver a message over the lock-receive characteristic in the
    /// 20-byte fragments a BLE write produces.
    fn write_fragments(&mut self, bytes: &[u8]) {
        for chunk in bytes.chunks(20) {
            let data = heapless::Vec::from_slice(chunk).unwrap();
            self.msg(RadioMessage::AttributeValueEvent {
                handle: HANDLE_LOCK_RECEIVE,
                data,
            });
        }
    }

    /// Collect a chunked response, acknowledging each attribute write the
    /// way the radio does.  Panics if nothing was queued.
    fn collect_response(&mut self) -> [u8; RESPONSE_LEN] {
        let mut out = Vec::new();
        loop {
            let commands: Vec<RadioCommand> = self.ctx.commands.radio.iter().cloned().collect();
            self.ctx.commands.radio.clear();
            let mut wrote = false;
            for command in commands {
                if let RadioCommand::WriteAttribute { handle, data, .. } = command {
                    assert_eq!(handle, HANDLE_LOCK_TRANSMIT);
                    out.extend_from_slice(&data);
                    wrote = true;
                }
            }
            if !wrote {
                break;
            }
            self.msg(RadioMessage::WriteAttributeResponse { result: 0 });
        }
        out.as_slice().try_into().expect("response is 41 bytes")
    }

    fn queued_writes(&self) -> usize {
        self.ctx
            .commands
            .radio
            .iter()
            .filter(|c| matches!(c, RadioCommand::WriteAttribute { .. }))
            .count()
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[test]
fn full_session_establishes_and_unlocks() {
    let mut h = Harness::new(false);
    h.bring_up();
    h.connect();

    // Ticket arrives as 20+20+20+12 fragments.
    h.write_fragments(&seal_ticket(&nonce(1)));
    h.tick(); // Connected -> TicketReceived
    h.tick(); // engine runs, response queued, -> AwaitingRequest
    assert_eq!(h.state(), StateId::AwaitingRequest);

    let (response_nonce, status) = open_response(&h.collect_response());
    assert_eq!(status, ResponseStatus::TicketSuccess as u8);
    assert_eq!(response_nonce, nonce(1)); // session counter 0 -> 1

    // Unlock request: nonce must beat the response counter.
    h.write_fragments(&seal_request(&nonce(2), 0));
    h.tick(); // AwaitingRequest -> RequestReceived
    h.tick(); // engine runs, -> AwaitingRequest
    assert_eq!(h.state(), StateId::AwaitingRequest);
    assert_eq!(h.actuator.counter_clockwise.get(), 1);
    assert_eq!(h.actuator.clockwise.get(), 0);

    let (response_nonce, status) = open_response(&h.collect_response());
    assert_eq!(status, ResponseStatus::Unlocked as u8);
    assert_eq!(response_nonce, nonce(3)); // spent 2, incremented for reply

    // A lock request on the same session keeps the conversation going.
    h.write_fragments(&seal_request(&nonce(4), 1));
    h.tick();
    h.tick();
    assert_eq!(h.actuator.clockwise.get(), 1);
    let (_, status) = open_response(&h.collect_response());
    assert_eq!(status, ResponseStatus::Locked as u8);
}

#[test]
fn low_battery_is_reported_in_the_ticket_response() {
    let mut h = Harness::new(true);
    h.bring_up();
    h.connect();

    h.write_fragments(&seal_ticket(&nonce(1)));
    h.tick();
    h.tick();

    let (_, status) = open_response(&h.collect_response());
    assert_eq!(status, ResponseStatus::TicketSuccessLowBattery as u8);
}

#[test]
fn replayed_ticket_after_reconnect_is_answered_with_nothing() {
    let mut h = Harness::new(false);
    h.bring_up();
    h.connect();

    let ticket = seal_ticket(&nonce(9));
    h.write_fragments(&ticket);
    h.tick();
    h.tick();
    let _ = h.collect_response();

    // Peer drops; the lock restarts its advertising bring-up.
    h.msg(RadioMessage::DisconnectedEvent { reason: 0x0213 });
    h.tick();
    assert_eq!(h.state(), StateId::Disconnected);
    h.tick();
    assert_eq!(h.state(), StateId::AdvertiseParamSet);
    h.ctx.commands.radio.clear();

    // Attacker replays the sniffed ticket on a fresh connection.
    h.connect();
    h.write_fragments(&ticket);
    h.tick(); // -> TicketReceived
    h.tick(); // rejected -> Connected
    assert_eq!(h.state(), StateId::Connected);

    // Nothing goes on the air, and the rejection is visible to telemetry.
    assert_eq!(h.queued_writes(), 0);
    assert!(
        h.events
            .0
            .borrow()
            .iter()
            .any(|e| matches!(e, AppEvent::ExchangeRejected { code: 1 }))
    );
}

#[test]
fn request_on_a_dead_session_is_ignored() {
    let mut h = Harness::new(false);
    h.bring_up();
    h.connect();

    // No ticket was presented; a request-length write sits in the buffer
    // but Connected only gates on the ticket length.
    h.write_fragments(&seal_request(&nonce(1), 0));
    h.tick();
    assert_eq!(h.state(), StateId::Connected);
    assert_eq!(h.actuator.counter_clockwise.get(), 0);
    assert_eq!(h.queued_writes(), 0);
}

#[test]
fn disconnect_mid_session_clears_everything() {
    let mut h = Harness::new(false);
    h.bring_up();
    h.connect();
    h.write_fragments(&seal_ticket(&nonce(1)));
    h.tick();
    h.tick();
    // Response chunks still in flight when the peer vanishes.
    h.msg(RadioMessage::DisconnectedEvent { reason: 0x0208 });
    h.tick();

    assert_eq!(h.state(), StateId::Disconnected);
    assert!(!h.ctx.session.is_established());
    assert!(h.ctx.msg_buf.is_empty());
    assert!(!h.ctx.chunker.is_active());
}

#[test]
fn buttons_rotate_without_any_session() {
    let mut h = Harness::new(false);
    h.bring_up();

    h.service.handle_local_event(Event::ButtonLock);
    h.service.handle_local_event(Event::ButtonUnlock);
    h.service.handle_local_event(Event::ButtonUnlock);

    assert_eq!(h.actuator.clockwise.get(), 1);
    assert_eq!(h.actuator.counter_clockwise.get(), 2);
    // No protocol traffic and no session state resulted.
    assert_eq!(h.queued_writes(), 0);
    assert!(!h.ctx.session.is_established());
    assert!(
        h.events
            .0
            .borrow()
            .iter()
            .any(|e| matches!(e, AppEvent::ManualRotate { clockwise: true, .. }))
    );
}

#[test]
fn storage_fault_during_nonce_spend_is_fatal() {
    let mut h = Harness::new(false);
    h.bring_up();
    h.connect();

    h.fail_writes.set(true);
    h.write_fragments(&seal_ticket(&nonce(1)));
    h.tick(); // -> TicketReceived

    let err = h.service.tick(&mut h.ctx).unwrap_err();
    assert_eq!(err, Error::Storage(StorageError::IoError));
    assert!(err.is_fatal());
    // The session must not exist if the spend never became durable.
    assert!(!h.ctx.session.is_established());
}

#[test]
fn connection_during_bring_up_skips_straight_to_connected() {
    let mut h = Harness::new(false);
    h.msg(RadioMessage::BootEvent);
    h.tick();
    assert_eq!(h.state(), StateId::AddressQuery);

    h.msg(RadioMessage::ConnectionStatusEvent { flags: 0x05 });
    h.tick();
    assert_eq!(h.state(), StateId::Connected);

    // A ticket works even though advertising setup never finished.
    h.write_fragments(&seal_ticket(&nonce(1)));
    h.tick();
    h.tick();
    assert_eq!(h.state(), StateId::AwaitingRequest);
}
