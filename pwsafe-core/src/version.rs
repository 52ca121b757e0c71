//! Container format generations.

use std::fmt;

use crate::encoding::PassphraseEncoding;
use crate::format::{LEGACY_BLOCK_SIZE, V2_EXTENSION, V3_BLOCK_SIZE, V3_EXTENSION};
use crate::record::table::{FieldTable, V1_FIELDS, V2_FIELDS, V3_FIELDS};

/// On-disk format generation of a container.
///
/// The version is fixed when a container is created or opened and selects
/// every version-specific strategy: cipher block size, field table and key
/// derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatVersion {
    /// Original format: three fixed fields per record, Blowfish-CBC.
    V1,
    /// Typed fields with an end-of-record marker, Blowfish-CBC.
    V2,
    /// Stretched passphrase, Twofish-CBC and an HMAC trailer.
    V3,
}

impl FormatVersion {
    /// Major version number.
    #[must_use]
    pub const fn major(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }

    /// Cipher block size in bytes.
    #[must_use]
    pub const fn block_size(self) -> usize {
        match self {
            Self::V1 | Self::V2 => LEGACY_BLOCK_SIZE,
            Self::V3 => V3_BLOCK_SIZE,
        }
    }

    /// Field table for user records of this version.
    #[must_use]
    pub const fn field_table(self) -> &'static FieldTable {
        match self {
            Self::V1 => &V1_FIELDS,
            Self::V2 => &V2_FIELDS,
            Self::V3 => &V3_FIELDS,
        }
    }

    /// Conventional file extension, without the dot. V1 has none of its own.
    #[must_use]
    pub const fn file_extension(self) -> Option<&'static str> {
        match self {
            Self::V1 => None,
            Self::V2 => Some(V2_EXTENSION),
            Self::V3 => Some(V3_EXTENSION),
        }
    }

    /// Encoding used for the passphrase of a newly created container.
    #[must_use]
    pub const fn default_encoding(self) -> PassphraseEncoding {
        match self {
            Self::V1 | Self::V2 => PassphraseEncoding::Windows1252,
            Self::V3 => PassphraseEncoding::PLATFORM_DEFAULT,
        }
    }

    /// Whether records of this version are identified by a UUID.
    #[must_use]
    pub const fn has_uuids(self) -> bool {
        !matches!(self, Self::V1)
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.major())
    }
}
