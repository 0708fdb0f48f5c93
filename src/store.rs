//! Master credential persistence.
//!
//! The lock's long-lived secret — the 32-byte master key plus the 24-byte
//! anti-replay high-water-mark — lives in a postcard-encoded record behind
//! the [`StoragePort`].  Because the high-water-mark is rewritten on every
//! accepted ticket, the record is kept in **two slots** with a monotonically
//! increasing sequence number:
//!
//! ```text
//!   cred/slot_a   { seq: 41, key, nonce_hwm }   ◀─ live
//!   cred/slot_b   { seq: 40, key, nonce_hwm }
//! ```
//!
//! Each commit writes the *other* slot with `seq + 1`.  A power cut mid-write
//! can tear at most the slot being written; the reader picks the
//! highest-sequence slot that still decodes, so the previous mark survives.
//! The ticket whose nonce was being spent becomes replayable exactly once in
//! that window — the alternative, losing the credential outright, would
//! permanently brick an offline lock.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{KEY_LEN, StorageError, StoragePort};
use crate::auth::nonce::Nonce;

/// Namespace holding both credential slots.
pub const CRED_NAMESPACE: &str = "cred";

const SLOT_KEYS: [&str; 2] = ["slot_a", "slot_b"];

/// Upper bound on the postcard encoding of a [`CredentialRecord`]
/// (varint seq ≤ 10 bytes + 32-byte key + 24-byte nonce).
const RECORD_BUF_LEN: usize = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct CredentialRecord {
    seq: u64,
    master_key: [u8; KEY_LEN],
    nonce_hwm: Nonce,
}

/// Dual-slot credential store over a raw [`StoragePort`].
pub struct CredentialStore<S: StoragePort> {
    storage: S,
    record: CredentialRecord,
    /// Index into [`SLOT_KEYS`] of the slot the cached record came from.
    live_slot: usize,
}

impl<S: StoragePort> CredentialStore<S> {
    /// Load the credential from storage, picking the highest-sequence slot
    /// that decodes.
    ///
    /// Returns [`StorageError::NotFound`] when neither slot exists (first
    /// boot) and [`StorageError::Corrupted`] when slots exist but none
    /// decodes.
    pub fn open(storage: S) -> Result<Self, StorageError> {
        let mut best: Option<(usize, CredentialRecord)> = None;
        let mut any_present = false;

        for (idx, key) in SLOT_KEYS.iter().enumerate() {
            if !storage.exists(CRED_NAMESPACE, key) {
                continue;
            }
            any_present = true;
            match read_slot(&storage, key) {
                Ok(record) => {
                    let replace = best.as_ref().is_none_or(|(_, b)| record.seq > b.seq);
                    if replace {
                        best = Some((idx, record));
                    }
                }
                Err(e) => warn!("credential slot {key} unreadable: {e}"),
            }
        }

        match best {
            Some((live_slot, record)) => {
                debug!(
                    "credential loaded from {} (seq {})",
                    SLOT_KEYS[live_slot], record.seq
                );
                Ok(Self {
                    storage,
                    record,
                    live_slot,
                })
            }
            None if any_present => Err(StorageError::Corrupted),
            None => Err(StorageError::NotFound),
        }
    }

    /// First-boot provisioning: write a fresh record with a zero
    /// high-water-mark into slot A.
    pub fn provision(mut storage: S, master_key: [u8; KEY_LEN]) -> Result<Self, StorageError> {
        let record = CredentialRecord {
            seq: 1,
            master_key,
            nonce_hwm: Nonce::ZERO,
        };
        write_slot(&mut storage, SLOT_KEYS[0], &record)?;
        Ok(Self {
            storage,
            record,
            live_slot: 0,
        })
    }

    pub fn master_key(&self) -> &[u8; KEY_LEN] {
        &self.record.master_key
    }

    pub fn nonce_hwm(&self) -> &Nonce {
        &self.record.nonce_hwm
    }

    /// Persist a new high-water-mark into the standby slot, then adopt it.
    ///
    /// The value must be strictly greater than the current mark; the engine
    /// checks staleness first, and this refusal keeps the mark monotonic
    /// even if a caller skips that check.
    pub fn commit_nonce(&mut self, nonce: &Nonce) -> Result<(), StorageError> {
        if !nonce.is_greater_than(&self.record.nonce_hwm) {
            warn!("refusing non-monotonic high-water-mark commit");
            return Err(StorageError::InvalidWrite);
        }

        let standby = 1 - self.live_slot;
        let next = CredentialRecord {
            seq: self.record.seq + 1,
            master_key: self.record.master_key,
            nonce_hwm: *nonce,
        };
        write_slot(&mut self.storage, SLOT_KEYS[standby], &next)?;

        // Only adopt the new record once it is durably on the standby slot.
        self.record = next;
        self.live_slot = standby;
        Ok(())
    }
}

fn read_slot<S: StoragePort>(storage: &S, key: &str) -> Result<CredentialRecord, StorageError> {
    let mut buf = [0u8; RECORD_BUF_LEN];
    let len = storage.read(CRED_NAMESPACE, key, &mut buf)?;
    postcard::from_bytes(&buf[..len]).map_err(|_| StorageError::Corrupted)
}

fn write_slot<S: StoragePort>(
    storage: &mut S,
    key: &str,
    record: &CredentialRecord,
) -> Result<(), StorageError> {
    let mut buf = [0u8; RECORD_BUF_LEN];
    let encoded = postcard::to_slice(record, &mut buf).map_err(|_| StorageError::IoError)?;
    storage.write(CRED_NAMESPACE, key, encoded)
}
