//! Typed record fields.
//!
//! A field is a type tag plus a value. The tag is the on-disk byte; the
//! variant is picked by looking the tag up in the record's field table. Any
//! payload that does not fit its declared kind (wrong length, bad UTF-8) is
//! kept as [`Field::Unknown`] so that it survives a save byte for byte.
//!
//! # Payload Encodings
//!
//! | Kind      | Bytes                                  |
//! |-----------|----------------------------------------|
//! | `Text`    | ISO-8859-1                             |
//! | `Unicode` | UTF-8                                  |
//! | `Uuid`    | 16 raw bytes                           |
//! | `Time`    | u32 LE (or u64 LE) epoch seconds       |
//! | `Integer` | u32 LE                                 |
//! | `Short`   | u16 LE                                 |
//! | `Byte`    | u8                                     |
//! | `Version` | `[minor, major]`                       |
//! | password  | sealed; Latin-1 (V1/V2) or UTF-8 (V3)  |

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pwsafe_crypto::{SealKey, Secret};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::encoding::{latin1_decode, latin1_encode};
use crate::error::PwsResult;

/// The declared kind of a field tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// ISO-8859-1 string.
    Text,
    /// UTF-8 string.
    Unicode,
    /// 16-byte UUID.
    Uuid,
    /// Timestamp in seconds.
    Time,
    /// 32-bit integer.
    Integer,
    /// 16-bit integer.
    Short,
    /// Single byte.
    Byte,
    /// Database format version.
    Version,
    /// Sealed password in the given charset.
    Password(Charset),
}

/// Charset of a password payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// ISO-8859-1, used by V1 and V2.
    Latin1,
    /// UTF-8, used by V3.
    Utf8,
}

impl Charset {
    fn encode(self, text: &str) -> Zeroizing<Vec<u8>> {
        match self {
            Self::Latin1 => Zeroizing::new(latin1_encode(text)),
            Self::Utf8 => Zeroizing::new(text.as_bytes().to_vec()),
        }
    }

    fn decode(self, bytes: &[u8]) -> Zeroizing<String> {
        match self {
            Self::Latin1 => Zeroizing::new(latin1_decode(bytes)),
            Self::Utf8 => Zeroizing::new(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

/// One field of a record.
#[derive(Clone)]
pub enum Field {
    /// Latin-1 string.
    Text {
        /// Type tag.
        tag: u8,
        /// Value.
        value: String,
    },
    /// UTF-8 string.
    Unicode {
        /// Type tag.
        tag: u8,
        /// Value.
        value: String,
    },
    /// Record or database UUID.
    Uuid {
        /// Type tag.
        tag: u8,
        /// Value.
        value: Uuid,
    },
    /// Timestamp with second precision.
    Time {
        /// Type tag.
        tag: u8,
        /// Seconds since the Unix epoch.
        seconds: u64,
        /// Stored as 8 bytes rather than 4.
        wide: bool,
    },
    /// 32-bit integer.
    Integer {
        /// Type tag.
        tag: u8,
        /// Value.
        value: u32,
    },
    /// 16-bit integer.
    Short {
        /// Type tag.
        tag: u8,
        /// Value.
        value: u16,
    },
    /// Single byte.
    Byte {
        /// Type tag.
        tag: u8,
        /// Value.
        value: u8,
    },
    /// Database format version.
    Version {
        /// Type tag.
        tag: u8,
        /// Major version.
        major: u8,
        /// Minor version.
        minor: u8,
    },
    /// Password, sealed in memory.
    Password {
        /// Type tag.
        tag: u8,
        /// Sealed value.
        secret: Secret,
        /// Charset used on disk.
        charset: Charset,
    },
    /// Raw bytes of a field whose tag or payload is not understood.
    Unknown {
        /// Type tag.
        tag: u8,
        /// Payload as read.
        bytes: Vec<u8>,
    },
}

impl Field {
    /// Decodes `payload` as `kind`, falling back to [`Field::Unknown`] when
    /// the payload does not fit.
    ///
    /// # Errors
    ///
    /// Returns an error only if sealing a password fails.
    pub fn decode(
        kind: FieldKind,
        tag: u8,
        payload: &[u8],
        seal: &Arc<SealKey>,
    ) -> PwsResult<Self> {
        let field = match kind {
            FieldKind::Text => Some(Self::Text {
                tag,
                value: latin1_decode(payload),
            }),
            FieldKind::Unicode => std::str::from_utf8(payload).ok().map(|s| Self::Unicode {
                tag,
                value: s.to_owned(),
            }),
            FieldKind::Uuid => Uuid::from_slice(payload)
                .ok()
                .map(|value| Self::Uuid { tag, value }),
            FieldKind::Time => match payload.len() {
                4 => <[u8; 4]>::try_from(payload).ok().map(|b| Self::Time {
                    tag,
                    seconds: u64::from(u32::from_le_bytes(b)),
                    wide: false,
                }),
                8 => <[u8; 8]>::try_from(payload).ok().map(|b| Self::Time {
                    tag,
                    seconds: u64::from_le_bytes(b),
                    wide: true,
                }),
                _ => None,
            },
            FieldKind::Integer => <[u8; 4]>::try_from(payload).ok().map(|b| Self::Integer {
                tag,
                value: u32::from_le_bytes(b),
            }),
            FieldKind::Short => <[u8; 2]>::try_from(payload).ok().map(|b| Self::Short {
                tag,
                value: u16::from_le_bytes(b),
            }),
            FieldKind::Byte => match payload {
                [value] => Some(Self::Byte { tag, value: *value }),
                _ => None,
            },
            FieldKind::Version => match payload {
                [minor, major] => Some(Self::Version {
                    tag,
                    major: *major,
                    minor: *minor,
                }),
                _ => None,
            },
            FieldKind::Password(charset) => Some(Self::Password {
                tag,
                secret: Secret::seal_vec(seal, payload.to_vec())?,
                charset,
            }),
        };
        Ok(field.unwrap_or_else(|| Self::Unknown {
            tag,
            bytes: payload.to_vec(),
        }))
    }

    /// Builds a password field from text, sealing it immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if sealing fails.
    pub fn password(
        tag: u8,
        charset: Charset,
        text: &str,
        seal: &Arc<SealKey>,
    ) -> PwsResult<Self> {
        let mut bytes = charset.encode(text);
        Ok(Self::Password {
            tag,
            secret: Secret::seal(seal, &mut bytes)?,
            charset,
        })
    }

    /// Builds a 4-byte time field, clamping to the representable range.
    #[must_use]
    pub fn time(tag: u8, at: SystemTime) -> Self {
        let seconds = at
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs().min(u64::from(u32::MAX)));
        Self::Time {
            tag,
            seconds,
            wide: false,
        }
    }

    /// The on-disk type tag.
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::Text { tag, .. }
            | Self::Unicode { tag, .. }
            | Self::Uuid { tag, .. }
            | Self::Time { tag, .. }
            | Self::Integer { tag, .. }
            | Self::Short { tag, .. }
            | Self::Byte { tag, .. }
            | Self::Version { tag, .. }
            | Self::Password { tag, .. }
            | Self::Unknown { tag, .. } => *tag,
        }
    }

    /// The kind of this value, or `None` for [`Field::Unknown`].
    #[must_use]
    pub const fn kind(&self) -> Option<FieldKind> {
        Some(match self {
            Self::Text { .. } => FieldKind::Text,
            Self::Unicode { .. } => FieldKind::Unicode,
            Self::Uuid { .. } => FieldKind::Uuid,
            Self::Time { .. } => FieldKind::Time,
            Self::Integer { .. } => FieldKind::Integer,
            Self::Short { .. } => FieldKind::Short,
            Self::Byte { .. } => FieldKind::Byte,
            Self::Version { .. } => FieldKind::Version,
            Self::Password { charset, .. } => FieldKind::Password(*charset),
            Self::Unknown { .. } => return None,
        })
    }

    /// Serializes the value to its on-disk payload.
    ///
    /// # Errors
    ///
    /// Returns an error if a sealed password cannot be opened.
    pub fn encode(&self) -> PwsResult<Zeroizing<Vec<u8>>> {
        let bytes = match self {
            Self::Text { value, .. } => latin1_encode(value),
            Self::Unicode { value, .. } => value.as_bytes().to_vec(),
            Self::Uuid { value, .. } => value.as_bytes().to_vec(),
            Self::Time {
                seconds,
                wide: true,
                ..
            } => seconds.to_le_bytes().to_vec(),
            Self::Time { seconds, .. } => u32::try_from(*seconds)
                .unwrap_or(u32::MAX)
                .to_le_bytes()
                .to_vec(),
            Self::Integer { value, .. } => value.to_le_bytes().to_vec(),
            Self::Short { value, .. } => value.to_le_bytes().to_vec(),
            Self::Byte { value, .. } => vec![*value],
            Self::Version { major, minor, .. } => vec![*minor, *major],
            Self::Password { secret, .. } => {
                return Ok(secret.with_plaintext(|p| Zeroizing::new(p.to_vec()))?)
            }
            Self::Unknown { bytes, .. } => bytes.clone(),
        };
        Ok(Zeroizing::new(bytes))
    }

    /// String value of a text field.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text { value, .. } | Self::Unicode { value, .. } => Some(value),
            _ => None,
        }
    }

    /// UUID value.
    #[must_use]
    pub const fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Timestamp value.
    #[must_use]
    pub fn as_time(&self) -> Option<SystemTime> {
        match self {
            Self::Time { seconds, .. } => UNIX_EPOCH.checked_add(Duration::from_secs(*seconds)),
            _ => None,
        }
    }

    /// Runs `f` over a password's text. Returns `Ok(None)` for any other
    /// kind of field.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret cannot be unsealed.
    pub fn with_password<R>(&self, f: impl FnOnce(&str) -> R) -> PwsResult<Option<R>> {
        match self {
            Self::Password {
                secret, charset, ..
            } => {
                let text = secret.with_plaintext(|p| charset.decode(p))?;
                Ok(Some(f(&text)))
            }
            _ => Ok(None),
        }
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Password {
                    tag: a,
                    secret: sa,
                    charset: ca,
                },
                Self::Password {
                    tag: b,
                    secret: sb,
                    charset: cb,
                },
            ) => a == b && ca == cb && sa.ct_eq(sb).unwrap_or(false),
            (Self::Password { .. }, _) | (_, Self::Password { .. }) => false,
            _ => {
                self.tag() == other.tag()
                    && self.kind() == other.kind()
                    && matches!((self.encode(), other.encode()), (Ok(a), Ok(b)) if a == b)
            }
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text { tag, value } | Self::Unicode { tag, value } => {
                write!(f, "{tag}: {value:?}")
            }
            Self::Uuid { tag, value } => write!(f, "{tag}: {value}"),
            Self::Time { tag, seconds, .. } => write!(f, "{tag}: t={seconds}"),
            Self::Integer { tag, value } => write!(f, "{tag}: {value}"),
            Self::Short { tag, value } => write!(f, "{tag}: {value}"),
            Self::Byte { tag, value } => write!(f, "{tag}: {value:#04x}"),
            Self::Version { tag, major, minor } => write!(f, "{tag}: v{major}.{minor:02x}"),
            Self::Password { tag, secret, .. } => {
                write!(f, "{tag}: [REDACTED; {}]", secret.len())
            }
            Self::Unknown { tag, bytes } => write!(f, "{tag}: 0x{}", hex::encode(bytes)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(FieldKind::Time, &[1, 2, 3] ; "short time")]
    #[test_case(FieldKind::Integer, &[1, 2, 3, 4, 5] ; "long integer")]
    #[test_case(FieldKind::Uuid, &[0; 15] ; "short uuid")]
    #[test_case(FieldKind::Unicode, &[0xC3, 0x28] ; "bad utf8")]
    #[test_case(FieldKind::Version, &[3] ; "short version")]
    fn test_misfit_payload_is_unknown(kind: FieldKind, payload: &[u8]) {
        let seal = SealKey::generate();
        let field = Field::decode(kind, 9, payload, &seal).unwrap();
        assert!(field.kind().is_none());
        assert_eq!(field.encode().unwrap().as_slice(), payload);
    }

    #[test]
    fn test_typed_decode() {
        let seal = SealKey::generate();
        let time = Field::decode(FieldKind::Time, 7, &[0x10, 0, 0, 0], &seal).unwrap();
        assert_eq!(
            time.as_time(),
            Some(UNIX_EPOCH + Duration::from_secs(16))
        );

        let version = Field::decode(FieldKind::Version, 0, &[0x0D, 0x03], &seal).unwrap();
        assert!(matches!(
            version,
            Field::Version {
                major: 3,
                minor: 0x0D,
                ..
            }
        ));
        assert_eq!(version.encode().unwrap().as_slice(), &[0x0D, 0x03]);

        let text = Field::decode(FieldKind::Text, 3, b"caf\xe9", &seal).unwrap();
        assert_eq!(text.as_str(), Some("caf\u{e9}"));
    }

    #[test]
    fn test_password_is_sealed_and_redacted() {
        let seal = SealKey::generate();
        let field = Field::password(6, Charset::Utf8, "s3cr3t!", &seal).unwrap();

        assert!(!format!("{field:?}").contains("s3cr3t!"));
        assert_eq!(
            field.with_password(str::to_owned).unwrap().as_deref(),
            Some("s3cr3t!")
        );
        assert_eq!(field.encode().unwrap().as_slice(), b"s3cr3t!");

        let same = Field::password(6, Charset::Utf8, "s3cr3t!", &seal).unwrap();
        let other = Field::password(6, Charset::Utf8, "other", &seal).unwrap();
        assert_eq!(field, same);
        assert_ne!(field, other);
    }

    #[test]
    fn test_latin1_password() {
        let seal = SealKey::generate();
        let field = Field::password(6, Charset::Latin1, "p\u{e4}ss", &seal).unwrap();
        assert_eq!(field.encode().unwrap().as_slice(), b"p\xe4ss");
    }

    #[test]
    fn test_time_clamps() {
        assert!(matches!(
            Field::time(7, UNIX_EPOCH - Duration::from_secs(5)),
            Field::Time { seconds: 0, .. }
        ));
        assert!(matches!(
            Field::time(7, UNIX_EPOCH + Duration::from_secs(1 << 40)),
            Field::Time {
                seconds: 0xFFFF_FFFF,
                wide: false,
                ..
            }
        ));
    }

    #[test]
    fn test_wide_time_keeps_its_width() {
        let seal = SealKey::generate();
        let payload = 1_700_000_000u64.to_le_bytes();
        let field = Field::decode(FieldKind::Time, 7, &payload, &seal).unwrap();
        assert_eq!(
            field.as_time(),
            Some(UNIX_EPOCH + Duration::from_secs(1_700_000_000))
        );
        assert_eq!(field.encode().unwrap().as_slice(), &payload);

        let narrow = Field::decode(FieldKind::Time, 7, &payload[..4], &seal).unwrap();
        assert_eq!(narrow.encode().unwrap().len(), 4);
        assert_ne!(field, narrow);
    }

    #[test]
    fn test_unknown_debug_is_hex() {
        let field = Field::Unknown {
            tag: 99,
            bytes: vec![0xDE, 0xAD],
        };
        assert_eq!(format!("{field:?}"), "99: 0xdead");
    }
}
