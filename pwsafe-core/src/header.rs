//! Plaintext file headers.
//!
//! Both headers are fixed-size and stored unencrypted in front of the record
//! stream. They only carry layout here; deriving and checking keys from them
//! lives in [`crate::keys`].
//!
//! # V1 / V2 Binary Layout
//!
//! | Offset | Size | Field        |
//! |--------|------|--------------|
//! | 0      | 8    | `rand_stuff` |
//! | 8      | 20   | `rand_hash`  |
//! | 28     | 20   | `salt`       |
//! | 48     | 8    | `ip_thing`   |
//!
//! # V3 Binary Layout
//!
//! | Offset | Size | Field           |
//! |--------|------|-----------------|
//! | 0      | 4    | `PWS3`          |
//! | 4      | 32   | `salt`          |
//! | 36     | 4    | iterations (LE) |
//! | 40     | 32   | `password_hash` |
//! | 72     | 16   | `b1`            |
//! | 88     | 16   | `b2`            |
//! | 104    | 16   | `b3`            |
//! | 120    | 16   | `b4`            |
//! | 136    | 16   | `iv`            |

use crate::error::{PwsError, PwsResult};
use crate::format::{
    IP_THING_LEN, LEGACY_HEADER_SIZE, LEGACY_SALT_LEN, RAND_HASH_LEN, RAND_STUFF_LEN,
    V3_HASH_LEN, V3_HEADER_SIZE, V3_IV_LEN, V3_KEY_BLOCK_LEN, V3_SALT_LEN, V3_TAG,
};

/// Sequential fixed-width reads from a header slice.
struct Cursor<'a> {
    bytes: &'a [u8],
}

impl Cursor<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        let (head, rest) = self.bytes.split_at(N);
        out.copy_from_slice(head);
        self.bytes = rest;
        out
    }
}

fn header_slice<'a>(bytes: &'a [u8], size: usize, what: &str) -> PwsResult<Cursor<'a>> {
    bytes
        .get(..size)
        .map(|bytes| Cursor { bytes })
        .ok_or_else(|| PwsError::eof(format!("{what} header needs {size} bytes, got {}", bytes.len())))
}

// =============================================================================
// V1 / V2
// =============================================================================

/// Header shared by V1 and V2 files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyHeader {
    /// Random bytes hashed with the passphrase to produce `rand_hash`.
    pub rand_stuff: [u8; RAND_STUFF_LEN],
    /// Passphrase check value.
    pub rand_hash: [u8; RAND_HASH_LEN],
    /// Salt for the file key.
    pub salt: [u8; LEGACY_SALT_LEN],
    /// CBC initial vector.
    pub ip_thing: [u8; IP_THING_LEN],
}

impl LegacyHeader {
    /// Parses the first [`LEGACY_HEADER_SIZE`] bytes of a file.
    ///
    /// # Errors
    ///
    /// Returns [`PwsError::EndOfFile`] if `bytes` is too short.
    pub fn decode(bytes: &[u8]) -> PwsResult<Self> {
        let mut c = header_slice(bytes, LEGACY_HEADER_SIZE, "V1/V2")?;
        Ok(Self {
            rand_stuff: c.take(),
            rand_hash: c.take(),
            salt: c.take(),
            ip_thing: c.take(),
        })
    }

    /// Serializes the header.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(LEGACY_HEADER_SIZE);
        out.extend_from_slice(&self.rand_stuff);
        out.extend_from_slice(&self.rand_hash);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.ip_thing);
        out
    }
}

// =============================================================================
// V3
// =============================================================================

/// Header of a V3 file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V3Header {
    /// Salt for passphrase stretching.
    pub salt: [u8; V3_SALT_LEN],
    /// Number of stretching iterations.
    pub iterations: u32,
    /// SHA-256 of the stretched passphrase.
    pub password_hash: [u8; V3_HASH_LEN],
    /// Wrapped key blocks: record key (`b1`, `b2`) and HMAC key (`b3`, `b4`).
    pub key_blocks: [[u8; V3_KEY_BLOCK_LEN]; 4],
    /// CBC initial vector for the record stream.
    pub iv: [u8; V3_IV_LEN],
}

impl V3Header {
    /// Parses the first [`V3_HEADER_SIZE`] bytes of a file.
    ///
    /// # Errors
    ///
    /// Returns [`PwsError::UnsupportedFileVersion`] if the tag is not
    /// `PWS3`, or [`PwsError::EndOfFile`] if `bytes` is too short.
    pub fn decode(bytes: &[u8]) -> PwsResult<Self> {
        if !bytes.starts_with(V3_TAG) {
            return Err(PwsError::UnsupportedFileVersion {
                reason: "missing PWS3 tag".to_owned(),
            });
        }
        let mut c = header_slice(bytes, V3_HEADER_SIZE, "V3")?;
        let _tag: [u8; 4] = c.take();
        Ok(Self {
            salt: c.take(),
            iterations: u32::from_le_bytes(c.take()),
            password_hash: c.take(),
            key_blocks: [c.take(), c.take(), c.take(), c.take()],
            iv: c.take(),
        })
    }

    /// Serializes the header.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(V3_HEADER_SIZE);
        out.extend_from_slice(V3_TAG);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.iterations.to_le_bytes());
        out.extend_from_slice(&self.password_hash);
        for block in &self.key_blocks {
            out.extend_from_slice(block);
        }
        out.extend_from_slice(&self.iv);
        out
    }
}
