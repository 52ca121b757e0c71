//! Error types for container operations.
//!
//! The variants are split so that callers can tell "wrong passphrase" from
//! "corrupt or tampered file" from "storage problem": each one calls for a
//! different reaction in the UI.

use pwsafe_crypto::CryptoError;
use thiserror::Error;
use uuid::Uuid;

use crate::version::FormatVersion;

/// Result type for container operations.
pub type PwsResult<T> = Result<T, PwsError>;

/// Errors raised while opening, mutating or saving a container.
#[derive(Debug, Error)]
pub enum PwsError {
    /// No supported encoding of the passphrase verifies against the header.
    #[error("invalid passphrase")]
    InvalidPassphrase,

    /// The leading bytes or the header record describe a format this crate
    /// does not handle.
    #[error("unsupported file version: {reason}")]
    UnsupportedFileVersion {
        /// What was found instead.
        reason: String,
    },

    /// The data ended in the middle of a structure.
    #[error("unexpected end of file: {context}")]
    EndOfFile {
        /// What was being read.
        context: String,
    },

    /// The V3 HMAC tag does not match the decrypted fields.
    #[error("integrity check failed: the file is corrupt or has been tampered with")]
    IntegrityFailure,

    /// The storage changed after this container last observed it.
    #[error("storage was modified externally since it was opened")]
    ConcurrentModification,

    /// A save was attempted on a read-only container.
    #[error("container is read-only")]
    ReadOnlyViolation,

    /// Reading from storage failed.
    #[error("I/O error during {context}: {source}")]
    Io {
        /// Operation that failed.
        context: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The storage adapter reported that the save did not happen.
    #[error("saving to {identifier} failed")]
    SaveFailed {
        /// Identifier of the storage that refused the write.
        identifier: String,
    },

    /// Decrypted data does not have the expected structure.
    #[error("corrupted data: {context}")]
    CorruptedData {
        /// Description of the problem.
        context: String,
    },

    /// A V1/V2 record contains a field type that format does not define.
    #[error("unknown field type {tag} in a {version} record")]
    UnknownFieldType {
        /// Format of the record.
        version: FormatVersion,
        /// Offending type tag.
        tag: u8,
    },

    /// A field was rejected by the record's field table.
    #[error("field {tag} is not valid in a {version} record: {reason}")]
    InvalidField {
        /// Format of the record.
        version: FormatVersion,
        /// Offending type tag.
        tag: u8,
        /// Why the field was rejected.
        reason: String,
    },

    /// A record with the same UUID is already in the container.
    #[error("a record with UUID {uuid} already exists")]
    DuplicateRecord {
        /// The duplicated UUID.
        uuid: Uuid,
    },

    /// A record index is out of range.
    #[error("record index {index} out of range for {len} records")]
    NoSuchRecord {
        /// Requested index.
        index: usize,
        /// Number of records in the container.
        len: usize,
    },

    /// A record of one format was handed to a container of another.
    #[error("cannot store a {found} record in a {expected} container")]
    VersionMismatch {
        /// Format of the container.
        expected: FormatVersion,
        /// Format of the record.
        found: FormatVersion,
    },

    /// `save` was called on a container with no storage attached.
    #[error("container has no storage attached")]
    NoStorage,

    /// The container was disposed and its key material wiped.
    #[error("container has been disposed")]
    Disposed,

    /// A cipher engine failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl PwsError {
    /// Shorthand for [`PwsError::EndOfFile`].
    pub fn eof<S: Into<String>>(context: S) -> Self {
        Self::EndOfFile {
            context: context.into(),
        }
    }

    /// Shorthand for [`PwsError::CorruptedData`].
    pub fn corrupted<S: Into<String>>(context: S) -> Self {
        Self::CorruptedData {
            context: context.into(),
        }
    }

    /// Shorthand for [`PwsError::Io`].
    pub fn io<S: Into<String>>(context: S, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the error means the file content itself is damaged, as
    /// opposed to a wrong passphrase or a storage problem.
    #[must_use]
    pub const fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::EndOfFile { .. }
                | Self::IntegrityFailure
                | Self::CorruptedData { .. }
                | Self::UnknownFieldType { .. }
        )
    }
}
