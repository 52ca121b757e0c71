//! HMAC-SHA-256 integrity tag for V3 containers.
//!
//! The tag covers the plaintext payload of every field, in stream order, and
//! is stored right after the end-of-file marker.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::digest::SHA256_LEN;
use crate::error::{CryptoError, CryptoResult};

type HmacSha256 = Hmac<Sha256>;

/// Running HMAC over field payloads.
#[derive(Clone)]
pub struct FieldMac {
    mac: HmacSha256,
}

impl FieldMac {
    /// Starts a MAC keyed with the container's HMAC key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if the HMAC implementation
    /// rejects the key.
    pub fn new(key: &[u8]) -> CryptoResult<Self> {
        let mac = <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| {
            CryptoError::InvalidKeyLength {
                cipher: "hmac-sha256",
                len: key.len(),
            }
        })?;
        Ok(Self { mac })
    }

    /// Feeds one field payload.
    pub fn update(&mut self, payload: &[u8]) {
        self.mac.update(payload);
    }

    /// Produces the tag.
    #[must_use]
    pub fn finalize(self) -> [u8; SHA256_LEN] {
        let mut tag = [0u8; SHA256_LEN];
        tag.copy_from_slice(&self.mac.finalize().into_bytes());
        tag
    }

    /// Compares against a stored tag in constant time.
    #[must_use]
    pub fn verify(self, tag: &[u8]) -> bool {
        self.mac.verify_slice(tag).is_ok()
    }
}

impl std::fmt::Debug for FieldMac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldMac")
            .field("key", &"[REDACTED]")
            .finish()
    }
}
