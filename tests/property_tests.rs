//! Property tests for the protocol's data structures and replay logic.
//!
//! Runs on host (x86_64) only — proptest is not available for ESP32
//! targets.

#![cfg(not(target_os = "espidf"))]

use deadbolt::Error;
use deadbolt::adapters::mem::MemStorage;
use deadbolt::app::events::AppEvent;
use deadbolt::app::ports::{BatteryPort, EventSink, KEY_LEN, NONCE_LEN};
use deadbolt::auth::engine::{self, RESPONSE_LEN, Session, TICKET_LEN};
use deadbolt::auth::nonce::Nonce;
use deadbolt::crypto::SecretboxCipher;
use deadbolt::fsm::context::MessageBuffer;
use deadbolt::link::chunker::{CHUNK_LEN, ResponseChunker};
use deadbolt::store::CredentialStore;
use proptest::prelude::*;

struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: &AppEvent) {}
}

struct GoodBattery;

impl BatteryPort for GoodBattery {
    fn is_low(&mut self) -> bool {
        false
    }
}

fn arb_nonce() -> impl Strategy<Value = Nonce> {
    proptest::array::uniform24(any::<u8>()).prop_map(Nonce)
}

// ── Nonce arithmetic ──────────────────────────────────────────

proptest! {
    /// Incrementing any nonce except all-0xFF yields a strictly greater
    /// value; the counter can therefore always be spent forward.
    #[test]
    fn increment_is_strictly_greater(n in arb_nonce()) {
        prop_assume!(n != Nonce([0xFF; NONCE_LEN]));
        let mut next = n;
        next.increment();
        prop_assert!(next.is_greater_than(&n));
        prop_assert!(!n.is_greater_than(&next));
    }

    /// Byte-wise comparison agrees with the integer the nonce encodes.
    #[test]
    fn comparison_matches_the_encoded_integer(a in any::<u128>(), b in any::<u128>()) {
        let embed = |v: u128| {
            let mut n = Nonce::ZERO;
            n.0[NONCE_LEN - 16..].copy_from_slice(&v.to_be_bytes());
            n
        };
        prop_assert_eq!(embed(a).is_greater_than(&embed(b)), a > b);
    }
}

// ── Response chunking ─────────────────────────────────────────

proptest! {
    /// Any response reassembles exactly from its ack-gated chunks, each at
    /// most one attribute write long.
    #[test]
    fn chunks_reassemble_any_response(response in proptest::array::uniform32(any::<u8>())) {
        let mut full = [0u8; RESPONSE_LEN];
        full[..32].copy_from_slice(&response);

        let mut chunker = ResponseChunker::new();
        let mut assembled = chunker.begin(&full).to_vec();
        while let Some(chunk) = chunker.acknowledge() {
            prop_assert!(chunk.len() <= CHUNK_LEN);
            assembled.extend_from_slice(chunk);
        }
        prop_assert_eq!(assembled.as_slice(), &full[..]);
        prop_assert!(!chunker.is_active());
    }
}

// ── Message length gating ─────────────────────────────────────

proptest! {
    /// The buffer yields a ticket only at exactly the ticket length,
    /// whatever fragmentation the radio produced.
    #[test]
    fn only_exact_lengths_gate(
        sizes in proptest::collection::vec(1usize..=20, 0..=6)
            .prop_filter("fits the buffer", |s| s.iter().sum::<usize>() <= TICKET_LEN),
    ) {
        let mut buf = MessageBuffer::new();
        for size in &sizes {
            buf.push_fragment(&vec![0xAB; *size]);
        }
        let total: usize = sizes.iter().sum();
        prop_assert_eq!(buf.as_ticket().is_some(), total == TICKET_LEN);
        prop_assert_eq!(buf.as_request().is_some(), total == engine::REQUEST_LEN);
    }
}

// ── Replay protection ─────────────────────────────────────────

proptest! {
    /// A ticket whose nonce does not beat the high-water-mark is rejected
    /// before anything is touched: no decryption, no state change.
    #[test]
    fn stale_ticket_never_mutates_state(
        a in arb_nonce(),
        b in arb_nonce(),
        sealed in proptest::collection::vec(any::<u8>(), TICKET_LEN - NONCE_LEN),
    ) {
        let (hwm, stale) = if a.is_greater_than(&b) { (a, b) } else { (b, a) };
        prop_assume!(hwm != Nonce::ZERO);

        let mut store = CredentialStore::provision(MemStorage::new(), [0x11; KEY_LEN]).unwrap();
        store.commit_nonce(&hwm).unwrap();

        let mut ticket = [0u8; TICKET_LEN];
        ticket[..NONCE_LEN].copy_from_slice(stale.as_bytes());
        ticket[NONCE_LEN..].copy_from_slice(&sealed);

        let mut session = Session::new();
        let result = engine::process_ticket(
            &ticket,
            &mut session,
            &SecretboxCipher::new(),
            &mut store,
            &mut GoodBattery,
            &mut NullSink,
        );

        prop_assert!(matches!(result, Err(Error::Auth(_))));
        prop_assert_eq!(store.nonce_hwm(), &hwm);
        prop_assert!(!session.is_established());
    }

    /// A forged ticket with a fresh nonce spends that nonce but never
    /// establishes a session.
    #[test]
    fn forged_ticket_spends_without_establishing(
        sealed in proptest::collection::vec(any::<u8>(), TICKET_LEN - NONCE_LEN),
        last in 1u8..,
    ) {
        let mut store = CredentialStore::provision(MemStorage::new(), [0x11; KEY_LEN]).unwrap();

        let mut fresh = Nonce::ZERO;
        fresh.0[NONCE_LEN - 1] = last;
        let mut ticket = [0u8; TICKET_LEN];
        ticket[..NONCE_LEN].copy_from_slice(fresh.as_bytes());
        ticket[NONCE_LEN..].copy_from_slice(&sealed);

        let mut session = Session::new();
        let result = engine::process_ticket(
            &ticket,
            &mut session,
            &SecretboxCipher::new(),
            &mut store,
            &mut GoodBattery,
            &mut NullSink,
        );

        prop_assert!(result.is_err());
        prop_assert!(!session.is_established());
        // spend-before-verify: the forged nonce is burned
        prop_assert_eq!(store.nonce_hwm(), &fresh);
    }
}
