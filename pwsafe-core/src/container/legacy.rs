//! V1 and V2 envelopes.
//!
//! Both share the 56-byte header and Blowfish-CBC. They are told apart only
//! after decryption: a V2 file starts with a V1-shaped record whose title is
//! the V2 marker string.

use std::sync::Arc;

use pwsafe_crypto::SealKey;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::encoding::{passphrase_candidates, PassphraseEncoding};
use crate::error::{PwsError, PwsResult};
use crate::factory::OpenOptions;
use crate::format::{LEGACY_HEADER_SIZE, V2_ID_STRING};
use crate::header::LegacyHeader;
use crate::keys::{legacy_decryptor, legacy_encryptor, new_legacy_header, verify_legacy};
use crate::record::codec::{
    read_v1_record, read_v2_record, write_v1_record, write_v2_marker, write_v2_record,
};
use crate::record::Record;
use crate::stream::{BlockReader, BlockWriter};
use crate::version::FormatVersion;

use super::Decoded;

/// Finds the first encoding under which `passphrase` verifies.
fn find_encoding(
    header: &LegacyHeader,
    passphrase: &str,
    options: &OpenOptions,
) -> PwsResult<(PassphraseEncoding, Zeroizing<Vec<u8>>)> {
    for (encoding, candidate) in
        passphrase_candidates(passphrase, options.encoding_hint, &options.encodings)
    {
        if verify_legacy(header, &candidate)? {
            return Ok((encoding, candidate));
        }
        log::debug!("passphrase does not verify as {encoding}");
    }
    Err(PwsError::InvalidPassphrase)
}

pub(super) fn decode(
    bytes: &[u8],
    passphrase: &str,
    options: &OpenOptions,
    seal: &Arc<SealKey>,
) -> PwsResult<Decoded> {
    let header = LegacyHeader::decode(bytes)?;
    let (encoding, key) = find_encoding(&header, passphrase, options)?;

    let mut reader = BlockReader::new(bytes, LEGACY_HEADER_SIZE, legacy_decryptor(&key, &header)?);
    let first = read_v1_record(&mut reader, seal)?;
    let is_v2 = first
        .as_ref()
        .is_some_and(|r| r.title() == Some(V2_ID_STRING));

    let mut records = Vec::new();
    let version = if is_v2 {
        while let Some(record) = read_v2_record(&mut reader, seal)? {
            if record.is_valid() {
                records.push(record);
            } else {
                log::debug!("skipping duplicate V2 marker record");
            }
        }
        FormatVersion::V2
    } else {
        // The first record was real data; start over from it.
        let mut reader =
            BlockReader::new(bytes, LEGACY_HEADER_SIZE, legacy_decryptor(&key, &header)?);
        while let Some(record) = read_v1_record(&mut reader, seal)? {
            records.push(record);
        }
        FormatVersion::V1
    };

    Ok(Decoded {
        version,
        encoding,
        records,
        v3: None,
    })
}

pub(super) fn encode(
    version: FormatVersion,
    passphrase: &[u8],
    records: &[Record],
    rng: &mut dyn RngCore,
) -> PwsResult<Vec<u8>> {
    let header = new_legacy_header(passphrase, rng)?;
    let mut writer = BlockWriter::new(header.encode(), legacy_encryptor(passphrase, &header)?);
    if version == FormatVersion::V2 {
        write_v2_marker(&mut writer)?;
    }
    for record in records {
        match version {
            FormatVersion::V1 => write_v1_record(&mut writer, record)?,
            _ => write_v2_record(&mut writer, record)?,
        }
    }
    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn test_empty_files_detect_version() {
        let seal = SealKey::generate();
        let options = OpenOptions::default();
        let mut rng = StdRng::seed_from_u64(21);

        let v1 = encode(FormatVersion::V1, b"pw", &[], &mut rng).unwrap();
        assert_eq!(v1.len(), LEGACY_HEADER_SIZE);
        let decoded = decode(&v1, "pw", &options, &seal).unwrap();
        assert_eq!(decoded.version, FormatVersion::V1);

        let v2 = encode(FormatVersion::V2, b"pw", &[], &mut rng).unwrap();
        let decoded = decode(&v2, "pw", &options, &seal).unwrap();
        assert_eq!(decoded.version, FormatVersion::V2);
        assert!(decoded.records.is_empty());
    }

    #[test]
    fn test_wrong_passphrase() {
        let seal = SealKey::generate();
        let mut rng = StdRng::seed_from_u64(22);
        let bytes = encode(FormatVersion::V2, b"pw", &[], &mut rng).unwrap();
        assert!(matches!(
            decode(&bytes, "pW", &OpenOptions::default(), &seal),
            Err(PwsError::InvalidPassphrase)
        ));
    }

    #[test]
    fn test_encoding_is_discovered() {
        let seal = SealKey::generate();
        let mut rng = StdRng::seed_from_u64(23);
        let latin = PassphraseEncoding::Windows1252.encode("p\u{e4}ss");
        let bytes = encode(FormatVersion::V1, &latin, &[], &mut rng).unwrap();

        let decoded = decode(&bytes, "p\u{e4}ss", &OpenOptions::default(), &seal).unwrap();
        assert_eq!(decoded.encoding, PassphraseEncoding::Windows1252);

        let options = OpenOptions::default().encodings(vec![PassphraseEncoding::Utf8]);
        assert!(matches!(
            decode(&bytes, "p\u{e4}ss", &options, &seal),
            Err(PwsError::InvalidPassphrase)
        ));
    }
}
