//! Cipher-block chaining over a [`BlockPrimitive`].
//!
//! Containers are read and written block by block across many calls, so the
//! chaining value lives in the stream object rather than being reset per
//! buffer. [`CbcEncryptor`] and [`CbcDecryptor`] wrap the `cbc` crate's
//! stateful modes and only add block slicing and this crate's errors.

use cipher::generic_array::GenericArray;
use cipher::{BlockDecryptMut, BlockEncryptMut, InnerIvInit};

use crate::block::{check_aligned, BlockPrimitive};
use crate::error::{CryptoError, CryptoResult};

const fn bad_iv<P: BlockPrimitive>(len: usize) -> CryptoError {
    CryptoError::UnalignedBuffer {
        block_size: P::BLOCK_SIZE,
        len,
    }
}

/// Stateful CBC encryptor.
pub struct CbcEncryptor<P: BlockPrimitive> {
    mode: ::cbc::Encryptor<P::Engine>,
}

impl<P: BlockPrimitive> CbcEncryptor<P> {
    /// Starts a chain with the given initialization vector.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnalignedBuffer`] if `iv` is not exactly one
    /// block long.
    pub fn new(primitive: P, iv: &[u8]) -> CryptoResult<Self> {
        let mode = ::cbc::Encryptor::inner_iv_slice_init(primitive.into_engine(), iv)
            .map_err(|_| bad_iv::<P>(iv.len()))?;
        Ok(Self { mode })
    }

    /// Encrypts whole blocks in place, continuing the chain.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnalignedBuffer`] for partial blocks.
    pub fn encrypt(&mut self, buf: &mut [u8]) -> CryptoResult<()> {
        check_aligned(buf.len(), P::BLOCK_SIZE)?;
        for block in buf.chunks_exact_mut(P::BLOCK_SIZE) {
            self.mode
                .encrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        Ok(())
    }
}

/// Stateful CBC decryptor.
pub struct CbcDecryptor<P: BlockPrimitive> {
    mode: ::cbc::Decryptor<P::Engine>,
}

impl<P: BlockPrimitive> CbcDecryptor<P> {
    /// Starts a chain with the given initialization vector.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnalignedBuffer`] if `iv` is not exactly one
    /// block long.
    pub fn new(primitive: P, iv: &[u8]) -> CryptoResult<Self> {
        let mode = ::cbc::Decryptor::inner_iv_slice_init(primitive.into_engine(), iv)
            .map_err(|_| bad_iv::<P>(iv.len()))?;
        Ok(Self { mode })
    }

    /// Decrypts whole blocks in place, continuing the chain.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::UnalignedBuffer`] for partial blocks.
    pub fn decrypt(&mut self, buf: &mut [u8]) -> CryptoResult<()> {
        check_aligned(buf.len(), P::BLOCK_SIZE)?;
        for block in buf.chunks_exact_mut(P::BLOCK_SIZE) {
            self.mode
                .decrypt_block_mut(GenericArray::from_mut_slice(block));
        }
        Ok(())
    }
}

impl<P: BlockPrimitive> std::fmt::Debug for CbcEncryptor<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CbcEncryptor")
            .field("block_size", &P::BLOCK_SIZE)
            .finish_non_exhaustive()
    }
}

impl<P: BlockPrimitive> std::fmt::Debug for CbcDecryptor<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CbcDecryptor")
            .field("block_size", &P::BLOCK_SIZE)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{PwsBlowfish, PwsTwofish};

    fn twofish_enc(iv: &[u8]) -> CbcEncryptor<PwsTwofish> {
        CbcEncryptor::new(PwsTwofish::new(&[1u8; 32]).unwrap(), iv).unwrap()
    }

    fn twofish_dec(iv: &[u8]) -> CbcDecryptor<PwsTwofish> {
        CbcDecryptor::new(PwsTwofish::new(&[1u8; 32]).unwrap(), iv).unwrap()
    }

    #[test]
    fn test_cbc_chains_across_calls() {
        let iv = [0x42u8; 16];
        let plaintext = [0x11u8; 48];

        let mut whole = plaintext;
        twofish_enc(&iv).encrypt(&mut whole).unwrap();

        // Same chain fed one block at a time must produce the same bytes.
        let mut pieces = plaintext;
        let mut enc = twofish_enc(&iv);
        for block in pieces.chunks_exact_mut(16) {
            enc.encrypt(block).unwrap();
        }
        assert_eq!(whole, pieces);

        // Identical plaintext blocks must not repeat under CBC.
        assert_ne!(whole[..16], whole[16..32]);

        let mut dec = twofish_dec(&iv);
        dec.decrypt(&mut whole[..16]).unwrap();
        dec.decrypt(&mut whole[16..]).unwrap();
        assert_eq!(whole, plaintext);
    }

    #[test]
    fn test_first_block_is_iv_xor_then_encrypt() {
        let iv = [0x5Au8; 16];
        let mut chained = [0u8; 16];
        twofish_enc(&iv).encrypt(&mut chained).unwrap();

        let mut direct = iv;
        PwsTwofish::new(&[1u8; 32])
            .unwrap()
            .encrypt_block(&mut direct);
        assert_eq!(chained, direct);
    }

    #[test]
    fn test_blowfish_cbc_roundtrip() {
        let iv = [9u8; 8];
        let mut buf = *b"sixteen byte msg";
        let mut enc = CbcEncryptor::new(PwsBlowfish::new(&[3u8; 20]).unwrap(), &iv).unwrap();
        enc.encrypt(&mut buf).unwrap();
        assert_ne!(&buf, b"sixteen byte msg");

        let mut dec = CbcDecryptor::new(PwsBlowfish::new(&[3u8; 20]).unwrap(), &iv).unwrap();
        dec.decrypt(&mut buf).unwrap();
        assert_eq!(&buf, b"sixteen byte msg");
    }

    #[test]
    fn test_cbc_rejects_partial_blocks() {
        let mut enc = CbcEncryptor::new(PwsBlowfish::new(&[3u8; 20]).unwrap(), &[0u8; 8]).unwrap();
        let mut buf = [0u8; 12];
        assert!(matches!(
            enc.encrypt(&mut buf),
            Err(CryptoError::UnalignedBuffer { block_size: 8, len: 12 })
        ));
        assert!(matches!(
            CbcDecryptor::new(PwsTwofish::new(&[0u8; 32]).unwrap(), &[0u8; 8]),
            Err(CryptoError::UnalignedBuffer { block_size: 16, len: 8 })
        ));
    }
}
