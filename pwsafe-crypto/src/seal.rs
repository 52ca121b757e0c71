//! In-memory sealing of secrets.
//!
//! Passwords and the container passphrase are kept encrypted under a
//! process-local [`SealKey`] that has nothing to do with the user's
//! passphrase. The only way to look at a [`Secret`] is a scoped view:
//!
//! ```text
//! secret.with_plaintext(|bytes| ...)
//!          │
//!          ├─ decrypt into a zeroizing buffer
//!          ├─ run the closure on the borrowed plaintext
//!          └─ wipe the buffer before returning
//! ```
//!
//! Each container generates its own `SealKey` when it is constructed.

use std::sync::Arc;

use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::block::{BlockPrimitive, PwsTwofish};
use crate::bytes::block_length;
use crate::cbc::{CbcDecryptor, CbcEncryptor};
use crate::error::CryptoResult;

const SEAL_KEY_LEN: usize = 32;

/// Random key used to seal secrets held in memory.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SealKey([u8; SEAL_KEY_LEN]);

impl SealKey {
    /// Generates a fresh key from the operating system RNG.
    #[must_use]
    pub fn generate() -> Arc<Self> {
        let mut bytes = [0u8; SEAL_KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Arc::new(Self(bytes))
    }

    fn cipher(&self) -> CryptoResult<PwsTwofish> {
        PwsTwofish::new(&self.0)
    }
}

impl std::fmt::Debug for SealKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SealKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// A sealed secret.
///
/// Cloning copies the ciphertext, never the plaintext.
#[derive(Clone)]
pub struct Secret {
    key: Arc<SealKey>,
    iv: [u8; PwsTwofish::BLOCK_SIZE],
    sealed: Vec<u8>,
    len: usize,
}

impl Secret {
    /// Seals `plaintext` and wipes the caller's buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the sealing cipher cannot be keyed.
    pub fn seal(key: &Arc<SealKey>, plaintext: &mut [u8]) -> CryptoResult<Self> {
        let mut iv = [0u8; PwsTwofish::BLOCK_SIZE];
        OsRng.fill_bytes(&mut iv);
        let mut cipher = CbcEncryptor::new(key.cipher()?, &iv)?;

        let len = plaintext.len();
        let mut sealed = Zeroizing::new(vec![0u8; block_length(len, PwsTwofish::BLOCK_SIZE)]);
        sealed[..len].copy_from_slice(plaintext);
        plaintext.zeroize();
        cipher.encrypt(&mut sealed)?;

        Ok(Self {
            key: Arc::clone(key),
            iv,
            sealed: std::mem::take(&mut *sealed),
            len,
        })
    }

    /// Seals an owned buffer, wiping it afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the sealing cipher cannot be keyed.
    pub fn seal_vec(key: &Arc<SealKey>, plaintext: Vec<u8>) -> CryptoResult<Self> {
        let mut plaintext = Zeroizing::new(plaintext);
        Self::seal(key, &mut plaintext)
    }

    /// Runs `f` over the plaintext; the decrypted copy is wiped when `f`
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the sealing cipher cannot be keyed.
    pub fn with_plaintext<R>(&self, f: impl FnOnce(&[u8]) -> R) -> CryptoResult<R> {
        let mut buf = Zeroizing::new(self.sealed.clone());
        CbcDecryptor::new(self.key.cipher()?, &self.iv)?.decrypt(&mut buf)?;
        Ok(f(&buf[..self.len]))
    }

    /// Length of the plaintext in bytes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the plaintext is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Constant-time comparison of two secrets' plaintexts.
    ///
    /// # Errors
    ///
    /// Returns an error if either secret cannot be unsealed.
    pub fn ct_eq(&self, other: &Self) -> CryptoResult<bool> {
        let mine = self.with_plaintext(|p| Zeroizing::new(p.to_vec()))?;
        other.with_plaintext(|theirs| bool::from(mine.as_slice().ct_eq(theirs)))
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.sealed.zeroize();
        self.iv.zeroize();
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("len", &self.len)
            .field("value", &"[REDACTED]")
            .finish()
    }
}
