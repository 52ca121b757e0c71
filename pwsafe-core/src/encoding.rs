//! Passphrase and legacy string encodings.
//!
//! Older clients turned the passphrase into bytes with whatever charset the
//! platform happened to use, so opening a file means trying the passphrase
//! under several encodings until one verifies. Characters an encoding cannot
//! represent become `?`, matching what those clients wrote.

use std::fmt;

use encoding_rs::{Encoding, ISO_8859_2, WINDOWS_1250, WINDOWS_1252};
use zeroize::Zeroizing;

/// A character encoding a passphrase may have been written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassphraseEncoding {
    /// UTF-8.
    Utf8,
    /// Windows code page 1252.
    Windows1252,
    /// 7-bit ASCII.
    UsAscii,
    /// ISO-8859-1 (Latin-1).
    Iso8859_1,
    /// ISO-8859-2 (Latin-2).
    Iso8859_2,
    /// Windows code page 1250.
    Windows1250,
    /// UTF-16, big-endian with a byte-order mark.
    Utf16,
}

/// Encodings tried, in order, when opening a file.
pub const DEFAULT_ATTEMPTS: [PassphraseEncoding; 7] = [
    PassphraseEncoding::PLATFORM_DEFAULT,
    PassphraseEncoding::Windows1252,
    PassphraseEncoding::UsAscii,
    PassphraseEncoding::Iso8859_1,
    PassphraseEncoding::Iso8859_2,
    PassphraseEncoding::Windows1250,
    PassphraseEncoding::Utf16,
];

impl PassphraseEncoding {
    /// Encoding used when nothing else is known.
    pub const PLATFORM_DEFAULT: Self = Self::Utf8;

    /// Canonical label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Windows1252 => "windows-1252",
            Self::UsAscii => "US-ASCII",
            Self::Iso8859_1 => "ISO-8859-1",
            Self::Iso8859_2 => "ISO-8859-2",
            Self::Windows1250 => "windows-1250",
            Self::Utf16 => "UTF-16",
        }
    }

    /// Looks an encoding up by label, ignoring case.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        DEFAULT_ATTEMPTS
            .into_iter()
            .find(|e| e.label().eq_ignore_ascii_case(label.trim()))
    }

    /// Encodes `text`, replacing unmappable characters with `?`.
    #[must_use]
    pub fn encode(self, text: &str) -> Zeroizing<Vec<u8>> {
        let mut out = Zeroizing::new(Vec::with_capacity(text.len() * 2 + 2));
        match self {
            Self::Utf8 => out.extend_from_slice(text.as_bytes()),
            Self::UsAscii => out.extend(text.chars().map(|c| narrow(c, 0x7F))),
            Self::Iso8859_1 => out.extend(text.chars().map(|c| narrow(c, 0xFF))),
            Self::Utf16 => {
                out.extend_from_slice(&[0xFE, 0xFF]);
                for unit in text.encode_utf16() {
                    out.extend_from_slice(&unit.to_be_bytes());
                }
            }
            Self::Windows1252 => encode_code_page(WINDOWS_1252, text, &mut out),
            Self::Iso8859_2 => encode_code_page(ISO_8859_2, text, &mut out),
            Self::Windows1250 => encode_code_page(WINDOWS_1250, text, &mut out),
        }
        out
    }
}

impl fmt::Display for PassphraseEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Builds the attempt order: `hint` first, then `list`, skipping repeats.
#[must_use]
pub fn attempt_order(
    hint: Option<PassphraseEncoding>,
    list: &[PassphraseEncoding],
) -> Vec<PassphraseEncoding> {
    let mut order = Vec::with_capacity(list.len() + 1);
    for encoding in hint.into_iter().chain(list.iter().copied()) {
        if !order.contains(&encoding) {
            order.push(encoding);
        }
    }
    order
}

/// The passphrase encoded under each encoding of [`attempt_order`], keeping
/// only the first encoding to produce a given byte string. Each candidate
/// costs a full key stretch, so identical bytes are tried once.
#[must_use]
pub fn passphrase_candidates(
    passphrase: &str,
    hint: Option<PassphraseEncoding>,
    list: &[PassphraseEncoding],
) -> Vec<(PassphraseEncoding, Zeroizing<Vec<u8>>)> {
    let mut candidates: Vec<(PassphraseEncoding, Zeroizing<Vec<u8>>)> = Vec::new();
    for encoding in attempt_order(hint, list) {
        let bytes = encoding.encode(passphrase);
        if candidates.iter().any(|(_, seen)| *seen == bytes) {
            log::trace!("{encoding} encodes the passphrase like an earlier attempt");
            continue;
        }
        candidates.push((encoding, bytes));
    }
    candidates
}

/// Decodes ISO-8859-1 bytes. Every byte maps to the code point of the same
/// value, so this never fails.
#[must_use]
pub fn latin1_decode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Encodes text as ISO-8859-1, the charset of V1/V2 string fields.
#[must_use]
pub fn latin1_encode(text: &str) -> Vec<u8> {
    text.chars().map(|c| narrow(c, 0xFF)).collect()
}

fn narrow(c: char, max: u32) -> u8 {
    u8::try_from(u32::from(c))
        .ok()
        .filter(|&b| u32::from(b) <= max)
        .unwrap_or(b'?')
}

/// Single-byte code pages go through `encoding_rs` one character at a time
/// so that an unmappable character yields `?` rather than an HTML entity.
fn encode_code_page(encoding: &'static Encoding, text: &str, out: &mut Vec<u8>) {
    let mut buf = [0u8; 4];
    for c in text.chars() {
        let (bytes, _, unmappable) = encoding.encode(c.encode_utf8(&mut buf));
        if unmappable {
            out.push(b'?');
        } else {
            out.extend_from_slice(&bytes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(PassphraseEncoding::Utf8, "pässword", &[0x70, 0xC3, 0xA4, 0x73] ; "utf8 two byte")]
    #[test_case(PassphraseEncoding::Windows1252, "p€", &[0x70, 0x80] ; "cp1252 euro")]
    #[test_case(PassphraseEncoding::Iso8859_1, "p€ä", &[0x70, b'?', 0xE4] ; "latin1 unmappable")]
    #[test_case(PassphraseEncoding::UsAscii, "pä", &[0x70, b'?'] ; "ascii unmappable")]
    #[test_case(PassphraseEncoding::Iso8859_2, "ł", &[0xB3] ; "latin2")]
    #[test_case(PassphraseEncoding::Windows1250, "ł", &[0xB3] ; "cp1250")]
    #[test_case(PassphraseEncoding::Utf16, "pa", &[0xFE, 0xFF, 0x00, 0x70, 0x00, 0x61] ; "utf16 with bom")]
    fn test_encode_prefix(encoding: PassphraseEncoding, text: &str, expected: &[u8]) {
        let bytes = encoding.encode(text);
        assert_eq!(&bytes[..expected.len()], expected);
    }

    #[test]
    fn test_attempt_order_skips_duplicates() {
        let order = attempt_order(Some(PassphraseEncoding::Iso8859_1), &DEFAULT_ATTEMPTS);
        assert_eq!(order.len(), DEFAULT_ATTEMPTS.len());
        assert_eq!(order[0], PassphraseEncoding::Iso8859_1);
        assert_eq!(order[1], PassphraseEncoding::Utf8);
        assert_eq!(
            order.iter().filter(|&&e| e == PassphraseEncoding::Iso8859_1).count(),
            1
        );
    }

    #[test]
    fn test_ascii_passphrase_has_two_distinct_candidates() {
        let candidates = passphrase_candidates("hunter2", None, &DEFAULT_ATTEMPTS);
        let encodings: Vec<_> = candidates.iter().map(|(e, _)| *e).collect();
        assert_eq!(
            encodings,
            [PassphraseEncoding::PLATFORM_DEFAULT, PassphraseEncoding::Utf16]
        );
        assert_eq!(candidates[0].1.as_slice(), b"hunter2");
    }

    #[test]
    fn test_candidates_keep_distinct_byte_strings() {
        let candidates = passphrase_candidates("p\u{e4}\u{142}", None, &DEFAULT_ATTEMPTS);
        for (i, (_, bytes)) in candidates.iter().enumerate() {
            assert!(candidates[..i].iter().all(|(_, earlier)| earlier != bytes));
        }
        // cp1252 and Latin-1 both give "p\xE4?"; Latin-2 and cp1250 both
        // give "p\xE4\xB3".
        assert_eq!(candidates.len(), DEFAULT_ATTEMPTS.len() - 2);
        assert!(!candidates
            .iter()
            .any(|(e, _)| matches!(e, PassphraseEncoding::Iso8859_1 | PassphraseEncoding::Windows1250)));

        let hinted =
            passphrase_candidates("hunter2", Some(PassphraseEncoding::UsAscii), &DEFAULT_ATTEMPTS);
        assert_eq!(hinted[0].0, PassphraseEncoding::UsAscii);
        assert_eq!(hinted.len(), 2);
    }

    #[test]
    fn test_label_lookup() {
        assert_eq!(
            PassphraseEncoding::from_label("WINDOWS-1252"),
            Some(PassphraseEncoding::Windows1252)
        );
        assert_eq!(PassphraseEncoding::from_label("ebcdic"), None);
    }

    #[test]
    fn test_latin1_roundtrip() {
        let text = "caf\u{e9} \u{ad}";
        assert_eq!(latin1_decode(&latin1_encode(text)), text);
        assert_eq!(latin1_encode("\u{263a}"), b"?");
    }
}
