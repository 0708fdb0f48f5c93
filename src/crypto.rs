//! Secretbox AEAD adapter.
//!
//! Implements [`CipherPort`] with XSalsa20Poly1305 via the detached-tag
//! API, producing the classic secretbox wire layout: 16-byte Poly1305 tag
//! first, ciphertext after.  The combined-mode helpers in the `aead` crate
//! append the tag instead, which is why this adapter assembles the buffer
//! by hand.

use crypto_secretbox::aead::{AeadInPlace, KeyInit};
use crypto_secretbox::{Key, Tag, XSalsa20Poly1305};

use crate::app::ports::{CipherError, CipherPort, KEY_LEN, NONCE_LEN, TAG_LEN};

/// Production cipher backed by `crypto_secretbox`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SecretboxCipher;

impl SecretboxCipher {
    pub const fn new() -> Self {
        Self
    }
}

impl CipherPort for SecretboxCipher {
    fn seal(
        &self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        plaintext: &[u8],
        out: &mut [u8],
    ) -> Result<(), CipherError> {
        if out.len() != plaintext.len() + TAG_LEN {
            return Err(CipherError);
        }
        let cipher = XSalsa20Poly1305::new(Key::from_slice(key));
        let (tag_out, ct_out) = out.split_at_mut(TAG_LEN);
        ct_out.copy_from_slice(plaintext);
        let tag = cipher
            .encrypt_in_place_detached(nonce.into(), b"", ct_out)
            .map_err(|_| CipherError)?;
        tag_out.copy_from_slice(&tag);
        Ok(())
    }

    fn open(
        &self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        sealed: &[u8],
        out: &mut [u8],
    ) -> Result<usize, CipherError> {
        if sealed.len() < TAG_LEN || out.len() < sealed.len() - TAG_LEN {
            return Err(CipherError);
        }
        let cipher = XSalsa20Poly1305::new(Key::from_slice(key));
        let (tag, ciphertext) = sealed.split_at(TAG_LEN);
        let plain = &mut out[..ciphertext.len()];
        plain.copy_from_slice(ciphertext);
        cipher
            .decrypt_in_place_detached(nonce.into(), b"", plain, Tag::from_slice(tag))
            .map_err(|_| CipherError)?;
        Ok(ciphertext.len())
    }
}
