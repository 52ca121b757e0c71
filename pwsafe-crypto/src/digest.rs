//! SHA-1 and SHA-256 helpers, including V3 passphrase stretching.

use sha1::Sha1;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Length of a SHA-1 digest in bytes.
pub const SHA1_LEN: usize = 20;

/// Length of a SHA-256 digest in bytes.
pub const SHA256_LEN: usize = 32;

/// SHA-1 over the concatenation of `parts`.
#[must_use]
pub fn sha1(parts: &[&[u8]]) -> [u8; SHA1_LEN] {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; SHA1_LEN];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// SHA-256 over the concatenation of `parts`.
#[must_use]
pub fn sha256(parts: &[&[u8]]) -> [u8; SHA256_LEN] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; SHA256_LEN];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Stretches a passphrase into the V3 key-encryption key.
///
/// `X0 = SHA256(passphrase ‖ salt)`, then `X(i+1) = SHA256(X(i))` for
/// `iterations` rounds. Every intermediate value is wiped.
#[must_use]
pub fn stretch_passphrase(
    passphrase: &[u8],
    salt: &[u8],
    iterations: u32,
) -> Zeroizing<[u8; SHA256_LEN]> {
    let mut stretched = Zeroizing::new(sha256(&[passphrase, salt]));
    for _ in 0..iterations {
        let next = Zeroizing::new(sha256(&[stretched.as_slice()]));
        stretched.copy_from_slice(next.as_slice());
    }
    stretched
}
