//! Block-aligned reading and writing over a CBC stream.
//!
//! The reader walks a borrowed file image: the plaintext header is consumed
//! with [`BlockReader::read_raw`], everything after it with
//! [`BlockReader::read_decrypted`], which keeps the CBC chain running across
//! calls. The writer mirrors this for saves.

use pwsafe_crypto::{BlockPrimitive, CbcDecryptor, CbcEncryptor};
use zeroize::Zeroizing;

use crate::error::{PwsError, PwsResult};

pub(crate) struct BlockReader<'a, P: BlockPrimitive> {
    data: &'a [u8],
    pos: usize,
    cbc: CbcDecryptor<P>,
}

impl<'a, P: BlockPrimitive> BlockReader<'a, P> {
    /// Starts reading ciphertext at `pos`.
    pub(crate) const fn new(data: &'a [u8], pos: usize, cbc: CbcDecryptor<P>) -> Self {
        Self { data, pos, cbc }
    }

    pub(crate) const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub(crate) const fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) const fn position(&self) -> usize {
        self.pos
    }

    /// The next `len` bytes without consuming them.
    pub(crate) fn peek_raw(&self, len: usize) -> Option<&'a [u8]> {
        self.data.get(self.pos..self.pos.checked_add(len)?)
    }

    /// Consumes `len` bytes as stored.
    pub(crate) fn read_raw(&mut self, len: usize, context: &str) -> PwsResult<&'a [u8]> {
        let bytes = self
            .peek_raw(len)
            .ok_or_else(|| PwsError::eof(context))?;
        self.pos += len;
        Ok(bytes)
    }

    /// Consumes and decrypts `len` bytes, which must be whole blocks.
    pub(crate) fn read_decrypted(
        &mut self,
        len: usize,
        context: &str,
    ) -> PwsResult<Zeroizing<Vec<u8>>> {
        let mut buf = Zeroizing::new(self.read_raw(len, context)?.to_vec());
        self.cbc.decrypt(&mut buf)?;
        Ok(buf)
    }
}

pub(crate) struct BlockWriter<P: BlockPrimitive> {
    out: Vec<u8>,
    cbc: CbcEncryptor<P>,
}

impl<P: BlockPrimitive> BlockWriter<P> {
    /// Appends ciphertext to `out`, which already holds the plaintext header.
    pub(crate) const fn new(out: Vec<u8>, cbc: CbcEncryptor<P>) -> Self {
        Self { out, cbc }
    }

    /// Encrypts `buf` in place and appends it.
    pub(crate) fn write_encrypted(&mut self, buf: &mut [u8]) -> PwsResult<()> {
        self.cbc.encrypt(buf)?;
        self.out.extend_from_slice(buf);
        Ok(())
    }

    /// Appends bytes that are stored as-is.
    pub(crate) fn write_raw(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
    }

    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pwsafe_crypto::PwsTwofish;

    fn encryptor() -> CbcEncryptor<PwsTwofish> {
        CbcEncryptor::new(PwsTwofish::new(&[3u8; 32]).unwrap(), &[9u8; 16]).unwrap()
    }

    fn decryptor() -> CbcDecryptor<PwsTwofish> {
        CbcDecryptor::new(PwsTwofish::new(&[3u8; 32]).unwrap(), &[9u8; 16]).unwrap()
    }

    #[test]
    fn test_writer_then_reader() {
        let mut writer = BlockWriter::new(b"HDR".to_vec(), encryptor());
        let mut first = [1u8; 16];
        let mut second = [2u8; 32];
        writer.write_encrypted(&mut first).unwrap();
        writer.write_encrypted(&mut second).unwrap();
        writer.write_raw(b"TAIL");
        let image = writer.into_inner();
        assert_eq!(image.len(), 3 + 48 + 4);

        let mut reader = BlockReader::new(&image, 0, decryptor());
        assert_eq!(reader.read_raw(3, "header").unwrap(), b"HDR");
        assert_eq!(reader.read_decrypted(16, "a").unwrap().as_slice(), &[1u8; 16]);
        assert_eq!(reader.read_decrypted(32, "b").unwrap().as_slice(), &[2u8; 32]);
        assert_eq!(reader.position(), 51);
        assert_eq!(reader.peek_raw(4), Some(&b"TAIL"[..]));
        assert!(matches!(
            reader.read_raw(5, "tail"),
            Err(PwsError::EndOfFile { .. })
        ));
        assert_eq!(reader.read_raw(4, "tail").unwrap(), b"TAIL");
        assert!(reader.is_at_end());
    }
}
