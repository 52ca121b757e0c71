//! Binary primitives shared by the cipher engines and the record codec.
//!
//! Every integer in a Password Safe container is little-endian. The V1/V2
//! passphrase check also flips the random bytes into 32-bit words before
//! and after its Blowfish rounds, which is what [`swap_words`] is for.

use crate::error::{CryptoError, CryptoResult};

/// Reverses the byte order of every 32-bit word in `buf`, in place.
///
/// # Errors
///
/// Returns [`CryptoError::UnalignedBuffer`] if `buf` is empty or its length
/// is not a multiple of four.
pub fn swap_words(buf: &mut [u8]) -> CryptoResult<()> {
    if buf.is_empty() || buf.len() % 4 != 0 {
        return Err(CryptoError::UnalignedBuffer {
            block_size: 4,
            len: buf.len(),
        });
    }
    for word in buf.chunks_exact_mut(4) {
        word.reverse();
    }
    Ok(())
}

/// Reads a little-endian `u32` at `offset`, or `None` if out of range.
#[must_use]
pub fn read_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Reads a little-endian `u16` at `offset`, or `None` if out of range.
#[must_use]
pub fn read_u16_le(buf: &[u8], offset: usize) -> Option<u16> {
    let bytes = buf.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Writes `value` little-endian into `buf[offset..offset + 4]`.
///
/// # Errors
///
/// Returns [`CryptoError::UnalignedBuffer`] if the slot does not fit in `buf`.
pub fn put_u32_le(buf: &mut [u8], offset: usize, value: u32) -> CryptoResult<()> {
    let len = buf.len();
    let slot = offset
        .checked_add(4)
        .and_then(|end| buf.get_mut(offset..end))
        .ok_or(CryptoError::UnalignedBuffer { block_size: 4, len })?;
    slot.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// Copies `src` into a new buffer of exactly `len` bytes, truncating or
/// zero-extending as needed.
#[must_use]
pub fn clone_padded(src: &[u8], len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    let n = src.len().min(len);
    out[..n].copy_from_slice(&src[..n]);
    out
}

/// Number of bytes `len` occupies once padded to whole `block_size` blocks.
///
/// A zero length still occupies one block on disk.
#[must_use]
pub const fn block_length(len: usize, block_size: usize) -> usize {
    if len == 0 {
        return block_size;
    }
    len.div_ceil(block_size) * block_size
}
