//! Passphrase verification and key derivation.
//!
//! V1 and V2 check the passphrase with a Blowfish-based hash of some random
//! bytes and derive the file key with a single SHA-1. V3 stretches the
//! passphrase with iterated SHA-256 and uses it to unwrap two random keys:
//!
//! ```text
//! passphrase ─┬─ SHA256(pw ‖ salt) ─► SHA256 × iterations ─► stretched
//!             │                                                  │
//!             │               SHA256(stretched) == password_hash ◄┤
//!             │                                                  │
//!             │   Twofish-ECB⁻¹(stretched, b1 ‖ b2) = record key ◄┤
//!             └   Twofish-ECB⁻¹(stretched, b3 ‖ b4) = HMAC key   ◄┘
//! ```
//!
//! All of these are reproduced bit for bit; none of them are strengthened.

use pwsafe_crypto::bytes::{clone_padded, swap_words};
use pwsafe_crypto::digest::{sha1, sha256, stretch_passphrase, SHA256_LEN};
use pwsafe_crypto::{BlockPrimitive, CbcDecryptor, CbcEncryptor, FieldMac, PwsBlowfish, PwsTwofish};
use rand::RngCore;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::PwsResult;
use crate::format::{
    RAND_HASH_LEN, RAND_HASH_ROUNDS, RAND_STUFF_LEN, V3_IV_LEN, V3_KEY_BLOCK_LEN, V3_SALT_LEN,
};
use crate::header::{LegacyHeader, V3Header};

// =============================================================================
// V1 / V2
// =============================================================================

/// Computes the V1/V2 passphrase check value for `rand_stuff`.
///
/// # Errors
///
/// Returns an error if the Blowfish engine rejects the derived key.
pub fn gen_rand_hash(
    passphrase: &[u8],
    rand_stuff: &[u8; RAND_STUFF_LEN],
) -> PwsResult<[u8; RAND_HASH_LEN]> {
    let stuff = Zeroizing::new(clone_padded(rand_stuff, RAND_STUFF_LEN + 2));
    let digest = Zeroizing::new(sha1(&[stuff.as_slice(), passphrase]));
    let engine = PwsBlowfish::new(digest.as_slice())?;

    let mut block = Zeroizing::new(*rand_stuff);
    swap_words(block.as_mut_slice())?;
    for _ in 0..RAND_HASH_ROUNDS {
        engine.encrypt_block(block.as_mut_slice());
    }
    swap_words(block.as_mut_slice())?;

    let tmp = Zeroizing::new(clone_padded(block.as_slice(), RAND_STUFF_LEN + 2));
    Ok(sha1(&[tmp.as_slice()]))
}

/// Whether `passphrase` (already encoded) opens a file with this header.
///
/// # Errors
///
/// Returns an error if the Blowfish engine rejects the derived key.
pub fn verify_legacy(header: &LegacyHeader, passphrase: &[u8]) -> PwsResult<bool> {
    let computed = gen_rand_hash(passphrase, &header.rand_stuff)?;
    Ok(computed.ct_eq(&header.rand_hash).into())
}

/// Builds a header with fresh random values for `passphrase`.
///
/// # Errors
///
/// Returns an error if the Blowfish engine rejects the derived key.
pub fn new_legacy_header(passphrase: &[u8], rng: &mut dyn RngCore) -> PwsResult<LegacyHeader> {
    let mut rand_stuff = [0u8; RAND_STUFF_LEN];
    rng.fill_bytes(&mut rand_stuff);
    let rand_hash = gen_rand_hash(passphrase, &rand_stuff)?;
    let mut header = LegacyHeader {
        rand_stuff,
        rand_hash,
        salt: Default::default(),
        ip_thing: Default::default(),
    };
    rng.fill_bytes(&mut header.salt);
    rng.fill_bytes(&mut header.ip_thing);
    Ok(header)
}

/// Blowfish keyed with `SHA1(passphrase ‖ salt)`.
fn legacy_engine(passphrase: &[u8], header: &LegacyHeader) -> PwsResult<PwsBlowfish> {
    let key = Zeroizing::new(sha1(&[passphrase, &header.salt]));
    Ok(PwsBlowfish::new(key.as_slice())?)
}

/// Blowfish-CBC over the records of a file being written.
///
/// # Errors
///
/// Returns an error if the cipher cannot be keyed.
pub fn legacy_encryptor(
    passphrase: &[u8],
    header: &LegacyHeader,
) -> PwsResult<CbcEncryptor<PwsBlowfish>> {
    Ok(CbcEncryptor::new(legacy_engine(passphrase, header)?, &header.ip_thing)?)
}

/// Blowfish-CBC over the records of a file being read.
///
/// # Errors
///
/// Returns an error if the cipher cannot be keyed.
pub fn legacy_decryptor(
    passphrase: &[u8],
    header: &LegacyHeader,
) -> PwsResult<CbcDecryptor<PwsBlowfish>> {
    Ok(CbcDecryptor::new(legacy_engine(passphrase, header)?, &header.ip_thing)?)
}

// =============================================================================
// V3
// =============================================================================

/// The two keys unwrapped from a V3 header.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct V3Keys {
    record_key: [u8; 2 * V3_KEY_BLOCK_LEN],
    hmac_key: [u8; 2 * V3_KEY_BLOCK_LEN],
}

impl V3Keys {
    /// Stretches `passphrase` with the header's salt and iteration count and
    /// returns the stretched key if it matches the stored hash.
    #[must_use]
    pub fn check_passphrase(
        header: &V3Header,
        passphrase: &[u8],
    ) -> Option<Zeroizing<[u8; SHA256_LEN]>> {
        let stretched = stretch_passphrase(passphrase, &header.salt, header.iterations);
        let hash = sha256(&[stretched.as_slice()]);
        bool::from(hash.ct_eq(&header.password_hash)).then_some(stretched)
    }

    /// Unwraps the record and HMAC keys with a verified stretched key.
    ///
    /// # Errors
    ///
    /// Returns an error if the Twofish engine rejects the stretched key.
    pub fn unwrap(header: &V3Header, stretched: &[u8; SHA256_LEN]) -> PwsResult<Self> {
        let engine = PwsTwofish::new(stretched)?;
        let mut keys = Self {
            record_key: [0u8; 2 * V3_KEY_BLOCK_LEN],
            hmac_key: [0u8; 2 * V3_KEY_BLOCK_LEN],
        };
        let [b1, b2, b3, b4] = &header.key_blocks;
        keys.record_key[..V3_KEY_BLOCK_LEN].copy_from_slice(b1);
        keys.record_key[V3_KEY_BLOCK_LEN..].copy_from_slice(b2);
        keys.hmac_key[..V3_KEY_BLOCK_LEN].copy_from_slice(b3);
        keys.hmac_key[V3_KEY_BLOCK_LEN..].copy_from_slice(b4);
        engine.decrypt_ecb(&mut keys.record_key)?;
        engine.decrypt_ecb(&mut keys.hmac_key)?;
        Ok(keys)
    }

    /// Creates a header and key pair for a save: fresh salt and IV, fresh
    /// random keys wrapped under the newly stretched passphrase.
    ///
    /// # Errors
    ///
    /// Returns an error if the Twofish engine rejects the stretched key.
    pub fn generate(
        passphrase: &[u8],
        iterations: u32,
        rng: &mut dyn RngCore,
    ) -> PwsResult<(V3Header, Self)> {
        let salt: [u8; V3_SALT_LEN] = hashed_random(rng);
        let iv: [u8; V3_IV_LEN] = hashed_random(rng);

        let stretched = stretch_passphrase(passphrase, &salt, iterations);
        let password_hash = sha256(&[stretched.as_slice()]);

        let mut keys = Self {
            record_key: [0u8; 2 * V3_KEY_BLOCK_LEN],
            hmac_key: [0u8; 2 * V3_KEY_BLOCK_LEN],
        };
        rng.fill_bytes(&mut keys.record_key);
        rng.fill_bytes(&mut keys.hmac_key);

        let engine = PwsTwofish::new(stretched.as_slice())?;
        let mut wrapped = Zeroizing::new([0u8; 4 * V3_KEY_BLOCK_LEN]);
        wrapped[..2 * V3_KEY_BLOCK_LEN].copy_from_slice(&keys.record_key);
        wrapped[2 * V3_KEY_BLOCK_LEN..].copy_from_slice(&keys.hmac_key);
        engine.encrypt_ecb(wrapped.as_mut_slice())?;

        let mut key_blocks = [[0u8; V3_KEY_BLOCK_LEN]; 4];
        for (block, chunk) in key_blocks
            .iter_mut()
            .zip(wrapped.chunks_exact(V3_KEY_BLOCK_LEN))
        {
            block.copy_from_slice(chunk);
        }

        let header = V3Header {
            salt,
            iterations,
            password_hash,
            key_blocks,
            iv,
        };
        Ok((header, keys))
    }

    /// Twofish-CBC for writing records.
    ///
    /// # Errors
    ///
    /// Returns an error if the cipher cannot be keyed.
    pub fn record_encryptor(&self, iv: &[u8]) -> PwsResult<CbcEncryptor<PwsTwofish>> {
        Ok(CbcEncryptor::new(PwsTwofish::new(&self.record_key)?, iv)?)
    }

    /// Twofish-CBC for reading records.
    ///
    /// # Errors
    ///
    /// Returns an error if the cipher cannot be keyed.
    pub fn record_decryptor(&self, iv: &[u8]) -> PwsResult<CbcDecryptor<PwsTwofish>> {
        Ok(CbcDecryptor::new(PwsTwofish::new(&self.record_key)?, iv)?)
    }

    /// A fresh HMAC over field payloads.
    ///
    /// # Errors
    ///
    /// Returns an error if the HMAC cannot be keyed.
    pub fn field_mac(&self) -> PwsResult<FieldMac> {
        Ok(FieldMac::new(&self.hmac_key)?)
    }
}

impl std::fmt::Debug for V3Keys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("V3Keys")
            .field("record_key", &"[REDACTED]")
            .field("hmac_key", &"[REDACTED]")
            .finish()
    }
}

/// `N` random bytes run through SHA-256 and truncated, so that raw RNG
/// output is never written to the file.
fn hashed_random<const N: usize>(rng: &mut dyn RngCore) -> [u8; N] {
    let mut out = [0u8; N];
    rng.fill_bytes(&mut out);
    let digest = sha256(&[&out]);
    out.copy_from_slice(&digest[..N]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_rand_hash_depends_on_passphrase_and_stuff() {
        let stuff = [1, 2, 3, 4, 5, 6, 7, 8];
        let a = gen_rand_hash(b"secret", &stuff).unwrap();
        assert_eq!(a, gen_rand_hash(b"secret", &stuff).unwrap());
        assert_ne!(a, gen_rand_hash(b"secreT", &stuff).unwrap());
        assert_ne!(a, gen_rand_hash(b"secret", &[0; 8]).unwrap());
    }

    #[test]
    fn test_rand_hash_known_answer() {
        let hash = gen_rand_hash(b"password", &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(hex::encode(hash), "ebe00cda58c16437baa55fc02842e290fd100cf6");
    }

    #[test]
    fn test_v3_known_answer() {
        let block = |h: &str| -> [u8; V3_KEY_BLOCK_LEN] {
            hex::decode(h).unwrap().try_into().unwrap()
        };
        let header = V3Header {
            salt: core::array::from_fn(|i| u8::try_from(i).unwrap()),
            iterations: 2048,
            password_hash: hex::decode(
                "dc599f9b989008540fb4d8a04baee3377c4060792852ac816ec8f9094a1fa991",
            )
            .unwrap()
            .try_into()
            .unwrap(),
            key_blocks: [
                block("d83c4f65ec05b316f3ed5a92c301911b"),
                block("d83c4f65ec05b316f3ed5a92c301911b"),
                block("66492ad43276c95de5cd1c111be84113"),
                block("66492ad43276c95de5cd1c111be84113"),
            ],
            iv: [0u8; V3_IV_LEN],
        };

        let stretched = V3Keys::check_passphrase(&header, b"password").unwrap();
        assert_eq!(
            hex::encode(stretched.as_slice()),
            "e2a1ac6ea5863efa74420c9000318aa3d94b66b6c75fb5ac929e9d35bbd31326"
        );
        let keys = V3Keys::unwrap(&header, &stretched).unwrap();
        assert_eq!(keys.record_key, [0x11; 32]);
        assert_eq!(keys.hmac_key, [0x22; 32]);
    }

    #[test]
    fn test_legacy_header_verifies() {
        let mut rng = StdRng::seed_from_u64(11);
        let header = new_legacy_header(b"secret", &mut rng).unwrap();
        assert!(verify_legacy(&header, b"secret").unwrap());
        assert!(!verify_legacy(&header, b"Secret").unwrap());
    }

    #[test]
    fn test_legacy_cipher_is_keyed_by_salt() {
        let mut rng = StdRng::seed_from_u64(12);
        let header = new_legacy_header(b"secret", &mut rng).unwrap();
        let mut other = header.clone();
        other.salt[0] ^= 1;

        let mut a = [0u8; 8];
        let mut b = [0u8; 8];
        legacy_encryptor(b"secret", &header).unwrap().encrypt(&mut a).unwrap();
        legacy_encryptor(b"secret", &other).unwrap().encrypt(&mut b).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_v3_generate_then_unwrap() {
        let mut rng = StdRng::seed_from_u64(13);
        let (header, keys) = V3Keys::generate(b"s3cr3t!", 2048, &mut rng).unwrap();
        assert_eq!(header.iterations, 2048);

        let stretched = V3Keys::check_passphrase(&header, b"s3cr3t!").unwrap();
        assert!(V3Keys::check_passphrase(&header, b"s3cr3t?").is_none());

        let unwrapped = V3Keys::unwrap(&header, &stretched).unwrap();
        assert_eq!(unwrapped.record_key, keys.record_key);
        assert_eq!(unwrapped.hmac_key, keys.hmac_key);
        assert_ne!(keys.record_key, keys.hmac_key);
    }

    #[test]
    fn test_v3_generate_is_deterministic_for_seeded_rng() {
        let (a, _) = V3Keys::generate(b"pw", 2048, &mut StdRng::seed_from_u64(5)).unwrap();
        let (b, _) = V3Keys::generate(b"pw", 2048, &mut StdRng::seed_from_u64(5)).unwrap();
        let (c, _) = V3Keys::generate(b"pw", 2048, &mut StdRng::seed_from_u64(6)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.salt, c.salt);
    }

    #[test]
    fn test_debug_is_redacted() {
        let (_, keys) = V3Keys::generate(b"pw", 2048, &mut StdRng::seed_from_u64(7)).unwrap();
        assert!(format!("{keys:?}").contains("REDACTED"));
    }
}
