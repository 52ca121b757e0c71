//! V3 envelope: stretched-key header, header record, HMAC trailer.

use std::sync::Arc;

use pwsafe_crypto::digest::SHA256_LEN;
use pwsafe_crypto::SealKey;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::encoding::{passphrase_candidates, PassphraseEncoding};
use crate::error::{PwsError, PwsResult};
use crate::factory::OpenOptions;
use crate::field::Field;
use crate::format::{V3_DB_FORMAT, V3_EOF_MARKER, V3_HEADER_SIZE, V3_HMAC_LEN};
use crate::header::V3Header;
use crate::keys::V3Keys;
use crate::record::codec::{read_v3_record, write_v3_record};
use crate::record::table::{V3_FIELDS, V3_HEADER_FIELDS};
use crate::record::Record;
use crate::stream::{BlockReader, BlockWriter};
use crate::version::FormatVersion;

use super::{Decoded, V3Envelope};

/// Tries each distinct encoding of the passphrase, then the platform default
/// if its bytes were not among them.
fn find_encoding(
    header: &V3Header,
    passphrase: &str,
    options: &OpenOptions,
) -> PwsResult<(PassphraseEncoding, Zeroizing<[u8; SHA256_LEN]>)> {
    let candidates = passphrase_candidates(passphrase, options.encoding_hint, &options.encodings);
    for (encoding, candidate) in &candidates {
        if let Some(stretched) = V3Keys::check_passphrase(header, candidate) {
            return Ok((*encoding, stretched));
        }
        log::debug!("passphrase does not verify as {encoding}");
    }

    // Older writers sometimes stored the passphrase re-encoded with the
    // platform default regardless of the configured list.
    let fallback = PassphraseEncoding::PLATFORM_DEFAULT;
    let bytes = fallback.encode(passphrase);
    if candidates.iter().any(|(_, tried)| *tried == bytes) {
        return Err(PwsError::InvalidPassphrase);
    }
    if let Some(stretched) = V3Keys::check_passphrase(header, &bytes) {
        log::warn!("passphrase accepted through the {fallback} compatibility fallback");
        return Ok((fallback, stretched));
    }
    Err(PwsError::InvalidPassphrase)
}

pub(super) fn decode(
    bytes: &[u8],
    passphrase: &str,
    options: &OpenOptions,
    seal: &Arc<SealKey>,
) -> PwsResult<Decoded> {
    let header = V3Header::decode(bytes)?;
    let (encoding, stretched) = find_encoding(&header, passphrase, options)?;
    // The keys live only for the duration of the decode.
    let keys = V3Keys::unwrap(&header, &stretched)?;
    drop(stretched);

    let mut reader = BlockReader::new(bytes, V3_HEADER_SIZE, keys.record_decryptor(&header.iv)?);
    let mut mac = keys.field_mac()?;

    let mut header_record = read_v3_record(&mut reader, &mut mac, &V3_HEADER_FIELDS, seal)?
        .ok_or_else(|| PwsError::eof("V3 header record"))?;
    header_record.mark_header();

    let mut records = Vec::new();
    while let Some(record) = read_v3_record(&mut reader, &mut mac, &V3_FIELDS, seal)? {
        if record.is_valid() {
            records.push(record);
        } else {
            log::debug!("skipping record that carries a header version field");
        }
    }

    let tag = reader.read_raw(V3_HMAC_LEN, "HMAC tag")?;
    if !mac.verify(tag) {
        log::error!("HMAC mismatch: file is corrupt or has been tampered with");
        return Err(PwsError::IntegrityFailure);
    }
    if !reader.is_at_end() {
        log::warn!(
            "ignoring {} bytes after the HMAC tag at offset {}",
            reader.remaining(),
            reader.position()
        );
    }

    if let Some((major, minor)) = header_record.db_format() {
        if major != V3_DB_FORMAT[1] {
            return Err(PwsError::UnsupportedFileVersion {
                reason: format!("database format {major}.{minor:02x}"),
            });
        }
    }

    let unknown = records
        .iter()
        .flat_map(Record::fields)
        .filter(|f| matches!(f, Field::Unknown { .. }))
        .count();
    if unknown > 0 {
        log::warn!("keeping {unknown} unrecognized fields as raw bytes");
    }

    Ok(Decoded {
        version: FormatVersion::V3,
        encoding,
        records,
        v3: Some(V3Envelope {
            iterations: header.iterations,
            header: Some(header),
            header_record,
        }),
    })
}

/// Serializes the container with a freshly generated header and keys. The
/// caller keeps the returned header only if the write succeeds.
pub(super) fn encode(
    passphrase: &[u8],
    envelope: &V3Envelope,
    records: &[Record],
    rng: &mut dyn RngCore,
) -> PwsResult<(Vec<u8>, V3Header)> {
    let (header, keys) = V3Keys::generate(passphrase, envelope.iterations, rng)?;
    let mut writer = BlockWriter::new(header.encode(), keys.record_encryptor(&header.iv)?);
    let mut mac = keys.field_mac()?;

    write_v3_record(&mut writer, &mut mac, rng, &envelope.header_record)?;
    for record in records {
        write_v3_record(&mut writer, &mut mac, rng, record)?;
    }
    writer.write_raw(V3_EOF_MARKER);
    writer.write_raw(&mac.finalize());
    Ok((writer.into_inner(), header))
}
