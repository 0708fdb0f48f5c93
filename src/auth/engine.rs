//! Ticket and request exchange processing.
//!
//! Two authenticated message types arrive over the lock-receive
//! characteristic, both laid out `nonce(24) ‖ tag(16) ‖ ciphertext`:
//!
//! - **Ticket** (72 bytes): sealed under the long-lived master key,
//!   carrying a fresh 32-byte session key.  Its nonce is checked against
//!   the *persisted* high-water-mark and spent before any decryption.
//! - **Request** (41 bytes): sealed under the session key, carrying a
//!   one-byte rotation action.  Its nonce is checked against the volatile
//!   session counter.
//!
//! Every accepted exchange answers with a 41-byte response sealed under
//! the session key.  A rejected exchange answers with *nothing* — the
//! rejection reason exists only in logs and the event sink, so the wire
//! carries no oracle for an attacker probing with forged ciphertexts.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{
    ActuatorPort, BatteryPort, CipherPort, EventSink, KEY_LEN, NONCE_LEN, StoragePort, TAG_LEN,
};
use crate::auth::nonce::Nonce;
use crate::error::{AuthError, Error};
use crate::store::CredentialStore;

/// Ticket message length: nonce + tag + sealed session key.
pub const TICKET_LEN: usize = NONCE_LEN + TAG_LEN + KEY_LEN;
/// Request message length: nonce + tag + sealed action byte.
pub const REQUEST_LEN: usize = NONCE_LEN + TAG_LEN + 1;
/// Response message length: nonce + tag + sealed status byte.
pub const RESPONSE_LEN: usize = NONCE_LEN + TAG_LEN + 1;

/// Status byte sealed into a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseStatus {
    /// Bolt driven counter-clockwise (open).
    Unlocked = 0,
    /// Bolt driven clockwise (secured).
    Locked = 1,
    /// Session established.
    TicketSuccess = 4,
    // 5 is the wire protocol's ticket-failure code; rejections here are
    // silent, so no response ever carries it.
    /// Session established, but the battery is below threshold.
    TicketSuccessLowBattery = 6,
    /// Authenticated request with an unrecognised action byte.
    InvalidRequest = 255,
}

/// Action byte carried in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestAction {
    RotateCounterClockwise = 0,
    RotateClockwise = 1,
}

impl TryFrom<u8> for RequestAction {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(Self::RotateCounterClockwise),
            1 => Ok(Self::RotateClockwise),
            other => Err(other),
        }
    }
}

/// Volatile session state.  Lives in RAM only; a disconnect or reset
/// discards it, and the next peer must present a fresh ticket.
#[derive(Debug, Clone)]
pub struct Session {
    key: [u8; KEY_LEN],
    /// Doubles as the request high-water-mark and the response counter.
    nonce: Nonce,
    established: bool,
}

impl Session {
    pub const fn new() -> Self {
        Self {
            key: [0; KEY_LEN],
            nonce: Nonce::ZERO,
            established: false,
        }
    }

    pub fn establish(&mut self, key: [u8; KEY_LEN]) {
        self.key = key;
        self.nonce = Nonce::ZERO;
        self.established = true;
    }

    pub fn clear(&mut self) {
        self.key = [0; KEY_LEN];
        self.nonce = Nonce::ZERO;
        self.established = false;
    }

    pub fn is_established(&self) -> bool {
        self.established
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Process a 72-byte ticket and establish a session.
///
/// Ordering is load-bearing: the master nonce is persisted *before* the
/// ciphertext is touched, so a ticket observed on the air can never be
/// replayed — even across a power cut between acceptance and response.
pub fn process_ticket<C, S, B, E>(
    ticket: &[u8; TICKET_LEN],
    session: &mut Session,
    cipher: &C,
    store: &mut CredentialStore<S>,
    battery: &mut B,
    events: &mut E,
) -> Result<[u8; RESPONSE_LEN], Error>
where
    C: CipherPort,
    S: StoragePort,
    B: BatteryPort,
    E: EventSink,
{
    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&ticket[..NONCE_LEN]);
    let nonce = Nonce(nonce_bytes);

    if !nonce.is_greater_than(store.nonce_hwm()) {
        warn!("ticket rejected: stale master nonce");
        events.emit(&AppEvent::ExchangeRejected {
            code: AuthError::StaleNonce.code(),
        });
        return Err(AuthError::StaleNonce.into());
    }

    // Spend before verify.
    store.commit_nonce(&nonce)?;

    let mut session_key = [0u8; KEY_LEN];
    let opened = cipher.open(
        store.master_key(),
        nonce.as_bytes(),
        &ticket[NONCE_LEN..],
        &mut session_key,
    );
    if opened != Ok(KEY_LEN) {
        warn!("ticket rejected: decrypt failed");
        events.emit(&AppEvent::ExchangeRejected {
            code: AuthError::DecryptFailed.code(),
        });
        return Err(AuthError::DecryptFailed.into());
    }

    session.establish(session_key);

    let low_battery = battery.is_low();
    let status = if low_battery {
        ResponseStatus::TicketSuccessLowBattery
    } else {
        ResponseStatus::TicketSuccess
    };
    let response = seal_status(session, cipher, status, events)?;

    info!("session established (low_battery={low_battery})");
    events.emit(&AppEvent::TicketAccepted { low_battery });
    Ok(response)
}

/// Process a 41-byte request against the established session.
pub fn process_request<C, A, E>(
    request: &[u8; REQUEST_LEN],
    session: &mut Session,
    cipher: &C,
    actuator: &mut A,
    events: &mut E,
) -> Result<[u8; RESPONSE_LEN], Error>
where
    C: CipherPort,
    A: ActuatorPort,
    E: EventSink,
{
    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&request[..NONCE_LEN]);
    let nonce = Nonce(nonce_bytes);

    if !session.is_established() || !nonce.is_greater_than(&session.nonce) {
        warn!("request rejected: stale session nonce");
        events.emit(&AppEvent::ExchangeRejected {
            code: AuthError::StaleNonce.code(),
        });
        return Err(AuthError::StaleNonce.into());
    }

    // Spend: volatile, but the session dies with the connection anyway.
    session.nonce = nonce;

    let mut action_buf = [0u8; 1];
    let opened = cipher.open(
        &session.key,
        nonce.as_bytes(),
        &request[NONCE_LEN..],
        &mut action_buf,
    );
    if opened != Ok(1) {
        warn!("request rejected: decrypt failed");
        events.emit(&AppEvent::ExchangeRejected {
            code: AuthError::DecryptFailed.code(),
        });
        return Err(AuthError::DecryptFailed.into());
    }

    let status = match RequestAction::try_from(action_buf[0]) {
        Ok(RequestAction::RotateCounterClockwise) => {
            let outcome = actuator.rotate_counter_clockwise();
            info!("request: unlock ({outcome:?})");
            events.emit(&AppEvent::RequestCompleted {
                clockwise: false,
                outcome,
            });
            ResponseStatus::Unlocked
        }
        Ok(RequestAction::RotateClockwise) => {
            let outcome = actuator.rotate_clockwise();
            info!("request: lock ({outcome:?})");
            events.emit(&AppEvent::RequestCompleted {
                clockwise: true,
                outcome,
            });
            ResponseStatus::Locked
        }
        Err(other) => {
            // Authenticated but meaningless: answer, don't actuate.
            warn!("request carries unknown action {other}");
            ResponseStatus::InvalidRequest
        }
    };

    seal_status(session, cipher, status, events).map_err(Error::from)
}

/// Advance the session counter and seal a one-byte status response.
fn seal_status<C: CipherPort, E: EventSink>(
    session: &mut Session,
    cipher: &C,
    status: ResponseStatus,
    events: &mut E,
) -> Result<[u8; RESPONSE_LEN], AuthError> {
    session.nonce.increment();

    let mut response = [0u8; RESPONSE_LEN];
    response[..NONCE_LEN].copy_from_slice(session.nonce.as_bytes());
    let sealed = cipher.seal(
        &session.key,
        session.nonce.as_bytes(),
        &[status as u8],
        &mut response[NONCE_LEN..],
    );
    if sealed.is_err() {
        warn!("response seal failed");
        events.emit(&AppEvent::ExchangeRejected {
            code: AuthError::EncryptFailed.code(),
        });
        return Err(AuthError::EncryptFailed);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mem::MemStorage;
    use crate::app::ports::RotateOutcome;
    use crate::crypto::SecretboxCipher;

    const MASTER_KEY: [u8; KEY_LEN] = [0x11; KEY_LEN];
    const SESSION_KEY: [u8; KEY_LEN] = [0x22; KEY_LEN];

    #[derive(Default)]
    struct SpyActuator {
        clockwise: u32,
        counter_clockwise: u32,
    }

    impl ActuatorPort for SpyActuator {
        fn rotate_clockwise(&mut self) -> RotateOutcome {
            self.clockwise += 1;
            RotateOutcome::Completed
        }
        fn rotate_counter_clockwise(&mut self) -> RotateOutcome {
            self.counter_clockwise += 1;
            RotateOutcome::Completed
        }
    }

    struct FixedBattery(bool);

    impl BatteryPort for FixedBattery {
        fn is_low(&mut self) -> bool {
            self.0
        }
    }

    #[derive(Default)]
    struct RecordingSink(Vec<AppEvent>);

    impl EventSink for RecordingSink {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(event.clone());
        }
    }

    fn nonce(last: u8) -> Nonce {
        let mut n = Nonce::ZERO;
        n.0[NONCE_LEN - 1] = last;
        n
    }

    fn seal_ticket(nonce: &Nonce, session_key: &[u8; KEY_LEN]) -> [u8; TICKET_LEN] {
        let cipher = SecretboxCipher::new();
        let mut ticket = [0u8; TICKET_LEN];
        ticket[..NONCE_LEN].copy_from_slice(nonce.as_bytes());
        cipher
            .seal(
                &MASTER_KEY,
                nonce.as_bytes(),
                session_key,
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
            .open(&SESSION_KEY, &nonce_bytes, &response[NONCE_LEN..], &mut status)
            .unwrap();
        (Nonce(nonce_bytes), status[0])
    }

    fn store() -> CredentialStore<MemStorage> {
        CredentialStore::provision(MemStorage::new(), MASTER_KEY).unwrap()
    }

    fn establish() -> Session {
        let mut session = Session::new();
        session.establish(SESSION_KEY);
        session
    }

    #[test]
    fn status_bytes_match_the_wire_codes() {
        assert_eq!(ResponseStatus::Unlocked as u8, 0);
        assert_eq!(ResponseStatus::Locked as u8, 1);
        assert_eq!(ResponseStatus::TicketSuccess as u8, 4);
        assert_eq!(ResponseStatus::TicketSuccessLowBattery as u8, 6);
        assert_eq!(ResponseStatus::InvalidRequest as u8, 255);
    }

    #[test]
    fn valid_ticket_establishes_session_and_answers_success() {
        let cipher = SecretboxCipher::new();
        let mut session = Session::new();
        let mut store = store();
        let mut sink = RecordingSink::default();
        let ticket = seal_ticket(&nonce(1), &SESSION_KEY);

        let response = process_ticket(
            &ticket,
            &mut session,
            &cipher,
            &mut store,
            &mut FixedBattery(false),
            &mut sink,
        )
        .unwrap();

        assert!(session.is_established());
        assert_eq!(store.nonce_hwm(), &nonce(1));

        let (response_nonce, status) = open_response(&response);
        assert_eq!(response_nonce, nonce(1)); // session counter 0 → 1
        assert_eq!(status, ResponseStatus::TicketSuccess as u8);
    }

    #[test]
    fn low_battery_changes_the_ticket_status() {
        let cipher = SecretboxCipher::new();
        let mut session = Session::new();
        let mut store = store();
        let mut sink = RecordingSink::default();
        let ticket = seal_ticket(&nonce(1), &SESSION_KEY);

        let response = process_ticket(
            &ticket,
            &mut session,
            &cipher,
            &mut store,
            &mut FixedBattery(true),
            &mut sink,
        )
        .unwrap();

        let (_, status) = open_response(&response);
        assert_eq!(status, ResponseStatus::TicketSuccessLowBattery as u8);
        assert!(matches!(
            sink.0.last(),
            Some(AppEvent::TicketAccepted { low_battery: true })
        ));
    }

    #[test]
    fn replayed_ticket_is_rejected_without_touching_the_mark() {
        let cipher = SecretboxCipher::new();
        let mut session = Session::new();
        let mut store = store();
        let mut sink = RecordingSink::default();
        let ticket = seal_ticket(&nonce(3), &SESSION_KEY);

        process_ticket(
            &ticket,
            &mut session,
            &cipher,
            &mut store,
            &mut FixedBattery(false),
            &mut sink,
        )
        .unwrap();

        // identical bytes again — equal nonce is not greater
        let err = process_ticket(
            &ticket,
            &mut session,
            &cipher,
            &mut store,
            &mut FixedBattery(false),
            &mut sink,
        )
        .unwrap_err();
        assert_eq!(err, Error::Auth(AuthError::StaleNonce));
        assert_eq!(store.nonce_hwm(), &nonce(3));
    }

    #[test]
    fn garbage_ticket_still_spends_its_nonce() {
        let cipher = SecretboxCipher::new();
        let mut session = Session::new();
        let mut store = store();
        let mut sink = RecordingSink::default();

        let mut ticket = seal_ticket(&nonce(5), &SESSION_KEY);
        ticket[40] ^= 0xFF; // corrupt the sealed portion

        let err = process_ticket(
            &ticket,
            &mut session,
            &cipher,
            &mut store,
            &mut FixedBattery(false),
            &mut sink,
        )
        .unwrap_err();
        assert_eq!(err, Error::Auth(AuthError::DecryptFailed));
        assert!(!session.is_established());
        // spend-before-verify: the mark advanced even though decrypt failed
        assert_eq!(store.nonce_hwm(), &nonce(5));

        // the pristine ticket can no longer be replayed
        let pristine = seal_ticket(&nonce(5), &SESSION_KEY);
        let err = process_ticket(
            &pristine,
            &mut session,
            &cipher,
            &mut store,
            &mut FixedBattery(false),
            &mut sink,
        )
        .unwrap_err();
        assert_eq!(err, Error::Auth(AuthError::StaleNonce));
    }

    #[test]
    fn unlock_request_drives_counter_clockwise() {
        let cipher = SecretboxCipher::new();
        let mut session = establish();
        let mut actuator = SpyActuator::default();
        let mut sink = RecordingSink::default();
        let request = seal_request(&nonce(1), 0);

        let response =
            process_request(&request, &mut session, &cipher, &mut actuator, &mut sink).unwrap();

        assert_eq!(actuator.counter_clockwise, 1);
        assert_eq!(actuator.clockwise, 0);
        let (response_nonce, status) = open_response(&response);
        assert_eq!(status, ResponseStatus::Unlocked as u8);
        assert_eq!(response_nonce, nonce(2)); // spent 1, incremented for reply
    }

    #[test]
    fn lock_request_drives_clockwise() {
        let cipher = SecretboxCipher::new();
        let mut session = establish();
        let mut actuator = SpyActuator::default();
        let mut sink = RecordingSink::default();
        let request = seal_request(&nonce(1), 1);

        let response =
            process_request(&request, &mut session, &cipher, &mut actuator, &mut sink).unwrap();

        assert_eq!(actuator.clockwise, 1);
        let (_, status) = open_response(&response);
        assert_eq!(status, ResponseStatus::Locked as u8);
    }

    #[test]
    fn unknown_action_answers_invalid_without_actuation() {
        let cipher = SecretboxCipher::new();
        let mut session = establish();
        let mut actuator = SpyActuator::default();
        let mut sink = RecordingSink::default();
        let request = seal_request(&nonce(1), 9);

        let response =
            process_request(&request, &mut session, &cipher, &mut actuator, &mut sink).unwrap();

        assert_eq!(actuator.clockwise, 0);
        assert_eq!(actuator.counter_clockwise, 0);
        let (_, status) = open_response(&response);
        assert_eq!(status, ResponseStatus::InvalidRequest as u8);
    }

    #[test]
    fn replayed_request_is_rejected() {
        let cipher = SecretboxCipher::new();
        let mut session = establish();
        let mut actuator = SpyActuator::default();
        let mut sink = RecordingSink::default();
        let request = seal_request(&nonce(1), 1);

        process_request(&request, &mut session, &cipher, &mut actuator, &mut sink).unwrap();
        let err = process_request(&request, &mut session, &cipher, &mut actuator, &mut sink)
            .unwrap_err();

        assert_eq!(err, Error::Auth(AuthError::StaleNonce));
        assert_eq!(actuator.clockwise, 1); // only the first request actuated
    }

    #[test]
    fn request_without_a_session_is_rejected() {
        let cipher = SecretboxCipher::new();
        let mut session = Session::new();
        let mut actuator = SpyActuator::default();
        let mut sink = RecordingSink::default();
        let request = seal_request(&nonce(1), 1);

        let err = process_request(&request, &mut session, &cipher, &mut actuator, &mut sink)
            .unwrap_err();
        assert_eq!(err, Error::Auth(AuthError::StaleNonce));
    }

    #[test]
    fn failed_request_decrypt_still_spends_the_session_nonce() {
        let cipher = SecretboxCipher::new();
        let mut session = establish();
        let mut actuator = SpyActuator::default();
        let mut sink = RecordingSink::default();

        let mut request = seal_request(&nonce(4), 1);
        request[30] ^= 0x01;

        let err = process_request(&request, &mut session, &cipher, &mut actuator, &mut sink)
            .unwrap_err();
        assert_eq!(err, Error::Auth(AuthError::DecryptFailed));

        // the pristine request is now stale
        let pristine = seal_request(&nonce(4), 1);
        let err = process_request(&pristine, &mut session, &cipher, &mut actuator, &mut sink)
            .unwrap_err();
        assert_eq!(err, Error::Auth(AuthError::StaleNonce));
        assert_eq!(actuator.clockwise, 0);
    }
}
