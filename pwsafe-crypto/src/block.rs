//! Single-block cipher primitives.
//!
//! Both container generations use a 64-bit or 128-bit block cipher driven
//! one block at a time:
//!
//! | Generation | Cipher   | Block | Key                         |
//! |------------|----------|-------|-----------------------------|
//! | V1 / V2    | Blowfish | 8     | 20-byte SHA-1 digest        |
//! | V3         | Twofish  | 16    | 32-byte stretched/derived   |
//!
//! Password Safe's Blowfish is the textbook cipher applied to 32-bit words
//! stored little-endian, which is the `blowfish` crate's `Blowfish<LE>`.

use blowfish::Blowfish;
use byteorder::LE;
use cipher::{generic_array::GenericArray, BlockCipher, BlockDecrypt, BlockEncrypt, KeyInit};
use twofish::Twofish;

use crate::error::{CryptoError, CryptoResult};

/// A keyed block cipher that transforms exactly one block in place.
///
/// Callers guarantee `block.len() == Self::BLOCK_SIZE`. Chaining is left to
/// the `cbc` crate, which drives the [`BlockPrimitive::Engine`] directly.
pub trait BlockPrimitive {
    /// Cipher block size in bytes.
    const BLOCK_SIZE: usize;

    /// The RustCrypto cipher behind this primitive.
    type Engine: BlockCipher + BlockEncrypt + BlockDecrypt;

    /// Hands the keyed engine over to a block mode.
    fn into_engine(self) -> Self::Engine;

    /// Encrypts one block in place.
    fn encrypt_block(&self, block: &mut [u8]);

    /// Decrypts one block in place.
    fn decrypt_block(&self, block: &mut [u8]);

    /// Encrypts a whole number of blocks independently (ECB).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnalignedBuffer`] if `buf` is empty or not a
    /// multiple of [`Self::BLOCK_SIZE`].
    fn encrypt_ecb(&self, buf: &mut [u8]) -> CryptoResult<()> {
        check_aligned(buf.len(), Self::BLOCK_SIZE)?;
        buf.chunks_exact_mut(Self::BLOCK_SIZE)
            .for_each(|block| self.encrypt_block(block));
        Ok(())
    }

    /// Decrypts a whole number of blocks independently (ECB).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnalignedBuffer`] if `buf` is empty or not a
    /// multiple of [`Self::BLOCK_SIZE`].
    fn decrypt_ecb(&self, buf: &mut [u8]) -> CryptoResult<()> {
        check_aligned(buf.len(), Self::BLOCK_SIZE)?;
        buf.chunks_exact_mut(Self::BLOCK_SIZE)
            .for_each(|block| self.decrypt_block(block));
        Ok(())
    }
}

/// Rejects empty buffers and buffers that are not whole blocks.
pub(crate) const fn check_aligned(len: usize, block_size: usize) -> CryptoResult<()> {
    if len == 0 || len % block_size != 0 {
        return Err(CryptoError::UnalignedBuffer { block_size, len });
    }
    Ok(())
}

// =============================================================================
// Blowfish (V1 / V2)
// =============================================================================

/// Blowfish in Password Safe word order.
#[derive(Clone)]
pub struct PwsBlowfish {
    cipher: Blowfish<LE>,
}

impl PwsBlowfish {
    /// Keys a new engine.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] unless the key is 4..=56
    /// bytes long.
    pub fn new(key: &[u8]) -> CryptoResult<Self> {
        let cipher = <Blowfish<LE> as KeyInit>::new_from_slice(key).map_err(|_| {
            CryptoError::InvalidKeyLength {
                cipher: "blowfish",
                len: key.len(),
            }
        })?;
        Ok(Self { cipher })
    }
}

impl BlockPrimitive for PwsBlowfish {
    const BLOCK_SIZE: usize = 8;
    type Engine = Blowfish<LE>;

    fn into_engine(self) -> Self::Engine {
        self.cipher
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        self.cipher
            .encrypt_block(GenericArray::from_mut_slice(block));
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        self.cipher
            .decrypt_block(GenericArray::from_mut_slice(block));
    }
}

impl std::fmt::Debug for PwsBlowfish {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PwsBlowfish")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Twofish (V3)
// =============================================================================

/// Twofish with a 256-bit key.
#[derive(Clone)]
pub struct PwsTwofish {
    cipher: Twofish,
}

impl PwsTwofish {
    /// Keys a new engine.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if the `twofish` crate
    /// rejects the key length.
    pub fn new(key: &[u8]) -> CryptoResult<Self> {
        let cipher = <Twofish as KeyInit>::new_from_slice(key).map_err(|_| {
            CryptoError::InvalidKeyLength {
                cipher: "twofish",
                len: key.len(),
            }
        })?;
        Ok(Self { cipher })
    }
}

impl BlockPrimitive for PwsTwofish {
    const BLOCK_SIZE: usize = 16;
    type Engine = Twofish;

    fn into_engine(self) -> Self::Engine {
        self.cipher
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        self.cipher
            .encrypt_block(GenericArray::from_mut_slice(block));
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        self.cipher
            .decrypt_block(GenericArray::from_mut_slice(block));
    }
}

impl std::fmt::Debug for PwsTwofish {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PwsTwofish")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_twofish_known_answer() {
        // Twofish paper, 256-bit key, all-zero key and plaintext.
        let cipher = PwsTwofish::new(&[0u8; 32]).unwrap();
        let mut block = [0u8; 16];
        cipher.encrypt_block(&mut block);
        assert_eq!(hex::encode(block), "57ff739d4dc92c1bd7fc01700cc8216f");
        cipher.decrypt_block(&mut block);
        assert_eq!(block, [0u8; 16]);
    }

    #[test]
    fn test_blowfish_word_order() {
        // Eric Young's vector: key 00.., plaintext 00.. -> 4EF997456198DD78.
        // Little-endian words give the same bytes, each word reversed.
        let cipher = PwsBlowfish::new(&[0u8; 8]).unwrap();
        let mut block = [0u8; 8];
        cipher.encrypt_block(&mut block);
        assert_eq!(hex::encode(block), "4597f94e78dd9861");
        cipher.decrypt_block(&mut block);
        assert_eq!(block, [0u8; 8]);
    }

    #[test]
    fn test_invalid_keys() {
        assert!(matches!(
            PwsBlowfish::new(&[1, 2, 3]),
            Err(CryptoError::InvalidKeyLength { cipher: "blowfish", len: 3 })
        ));
        assert!(matches!(
            PwsTwofish::new(&[0u8; 5]),
            Err(CryptoError::InvalidKeyLength { cipher: "twofish", .. })
        ));
    }

    #[test]
    fn test_ecb_alignment() {
        let cipher = PwsTwofish::new(&[7u8; 32]).unwrap();
        let mut buf = [0u8; 20];
        assert!(cipher.encrypt_ecb(&mut buf).is_err());

        let mut buf = [9u8; 32];
        cipher.encrypt_ecb(&mut buf).unwrap();
        assert_eq!(buf[..16], buf[16..]);
        cipher.decrypt_ecb(&mut buf).unwrap();
        assert_eq!(buf, [9u8; 32]);
    }
}
