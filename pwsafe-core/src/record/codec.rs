//! Record serialization for each format generation.
//!
//! # V1 / V2 Field Layout
//!
//! ```text
//! ┌───────────────┬──────────────┬─────────────────────────────┐
//! │ length u32 LE │ type u32 LE  │ data, zero-padded to 8·n    │
//! └───────────────┴──────────────┴─────────────────────────────┘
//!   one 8-byte block               at least one block
//! ```
//!
//! A V1 record is always three fields of type 0: title (with the username
//! folded in), password, notes. A V2 record is any number of typed fields
//! followed by an end-of-record field.
//!
//! # V3 Field Layout
//!
//! ```text
//! ┌───────────────┬─────────┬──────────────────┐┌──────────────────────┐
//! │ length u32 LE │ type u8 │ first 11 data    ││ remaining data …     │
//! └───────────────┴─────────┴──────────────────┘└──────────────────────┘
//!   first 16-byte block                           random-padded to 16·n
//! ```
//!
//! Every V3 field payload, including those of the header record, is fed to
//! the HMAC in stream order.

use std::sync::Arc;

use pwsafe_crypto::bytes::{block_length, clone_padded, read_u32_le};
use pwsafe_crypto::{FieldMac, PwsBlowfish, PwsTwofish, SealKey};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::encoding::{latin1_decode, latin1_encode};
use crate::error::{PwsError, PwsResult};
use crate::field::{Charset, Field, FieldKind};
use crate::format::{
    END_OF_RECORD, LEGACY_BLOCK_SIZE, V1_DEFAULT_USER_CHAR, V1_SPLIT_CHAR, V1_SPLIT_STRING,
    V2_ID_PASSWORD, V2_ID_STRING, V3_BLOCK_SIZE, V3_EOF_MARKER, V3_FIRST_BLOCK_DATA,
};
use crate::record::table::{tags, FieldTable};
use crate::record::Record;
use crate::stream::{BlockReader, BlockWriter};
use crate::version::FormatVersion;

/// A raw field as stored: type tag plus plaintext payload.
pub(crate) struct Item {
    pub(crate) tag: u8,
    pub(crate) payload: Zeroizing<Vec<u8>>,
}

fn item_length(head: &[u8]) -> PwsResult<usize> {
    read_u32_le(head, 0)
        .and_then(|len| usize::try_from(len).ok())
        .ok_or_else(|| PwsError::corrupted("field length"))
}

fn stored_length(payload: &[u8]) -> PwsResult<[u8; 4]> {
    u32::try_from(payload.len())
        .map(u32::to_le_bytes)
        .map_err(|_| PwsError::corrupted("field longer than 4 GiB"))
}

// =============================================================================
// V1 / V2
// =============================================================================

/// Reads one field. Returns `None` if the stream ends cleanly before it.
pub(crate) fn read_legacy_item(r: &mut BlockReader<'_, PwsBlowfish>) -> PwsResult<Option<Item>> {
    if r.is_at_end() {
        return Ok(None);
    }
    let head = r.read_decrypted(LEGACY_BLOCK_SIZE, "field header")?;
    let len = item_length(&head)?;
    let tag = head[4];

    let padded = block_length(len, LEGACY_BLOCK_SIZE);
    if padded > r.remaining() {
        return Err(PwsError::eof(format!("field {tag} declares {len} bytes")));
    }
    let mut payload = r.read_decrypted(padded, "field data")?;
    payload.truncate(len);
    Ok(Some(Item { tag, payload }))
}

pub(crate) fn write_legacy_item(
    w: &mut BlockWriter<PwsBlowfish>,
    tag: u8,
    payload: &[u8],
) -> PwsResult<()> {
    let mut head = [0u8; LEGACY_BLOCK_SIZE];
    head[..4].copy_from_slice(&stored_length(payload)?);
    head[4] = tag;
    w.write_encrypted(&mut head)?;

    let mut body = Zeroizing::new(clone_padded(
        payload,
        block_length(payload.len(), LEGACY_BLOCK_SIZE),
    ));
    w.write_encrypted(&mut body)
}

/// Trims the way the legacy clients did: every character up to and
/// including space counts as whitespace.
fn legacy_trim(s: &str) -> &str {
    s.trim_matches(|c: char| c <= ' ')
}

/// Splits a V1 title field into title and username.
pub(crate) fn split_v1_title(raw: &str) -> (String, String) {
    if let Some((title, username)) = raw.split_once(V1_SPLIT_CHAR) {
        (legacy_trim(title).to_owned(), legacy_trim(username).to_owned())
    } else if let Some((title, _)) = raw.split_once(V1_DEFAULT_USER_CHAR) {
        (title.to_owned(), String::new())
    } else {
        (raw.to_owned(), String::new())
    }
}

/// Folds the username into the title the way V1 stores it.
pub(crate) fn join_v1_title(title: &str, username: &str) -> String {
    if legacy_trim(username).is_empty() {
        title.to_owned()
    } else {
        format!("{title}{V1_SPLIT_STRING}{username}")
    }
}

/// Reads a V1-shaped record. Returns `None` at a clean end of stream.
pub(crate) fn read_v1_record(
    r: &mut BlockReader<'_, PwsBlowfish>,
    seal: &Arc<SealKey>,
) -> PwsResult<Option<Record>> {
    let Some(title) = read_legacy_item(r)? else {
        return Ok(None);
    };
    let password = read_legacy_item(r)?.ok_or_else(|| PwsError::eof("V1 record password"))?;
    let notes = read_legacy_item(r)?.ok_or_else(|| PwsError::eof("V1 record notes"))?;

    let (title, username) = split_v1_title(&latin1_decode(&title.payload));
    let mut record = Record::empty(FormatVersion::V1, seal);
    record.insert(Field::Text {
        tag: tags::TITLE,
        value: title,
    });
    record.insert(Field::Text {
        tag: tags::USERNAME,
        value: username,
    });
    record.insert(Field::decode(
        FieldKind::Password(Charset::Latin1),
        tags::PASSWORD,
        &password.payload,
        seal,
    )?);
    record.insert(Field::Text {
        tag: tags::NOTES,
        value: latin1_decode(&notes.payload),
    });
    Ok(Some(record))
}

fn write_v1_items(
    w: &mut BlockWriter<PwsBlowfish>,
    title: &str,
    password: &[u8],
    notes: &str,
) -> PwsResult<()> {
    write_legacy_item(w, 0, &latin1_encode(title))?;
    write_legacy_item(w, 0, password)?;
    write_legacy_item(w, 0, &latin1_encode(notes))
}

pub(crate) fn write_v1_record(w: &mut BlockWriter<PwsBlowfish>, record: &Record) -> PwsResult<()> {
    let title = join_v1_title(
        record.title().unwrap_or_default(),
        record.username().unwrap_or_default(),
    );
    let password = match record.field(tags::PASSWORD) {
        Some(field) => field.encode()?,
        None => Zeroizing::new(Vec::new()),
    };
    write_v1_items(w, &title, &password, record.notes().unwrap_or_default())
}

/// Writes the V1-shaped record that marks a file as V2.
pub(crate) fn write_v2_marker(w: &mut BlockWriter<PwsBlowfish>) -> PwsResult<()> {
    write_v1_items(w, V2_ID_STRING, V2_ID_PASSWORD.as_bytes(), "")
}

/// Reads a V2 record. Returns `None` at a clean end of stream.
///
/// # Errors
///
/// Returns [`PwsError::UnknownFieldType`] for a tag outside the V2 table and
/// [`PwsError::EndOfFile`] if the stream ends inside the record.
pub(crate) fn read_v2_record(
    r: &mut BlockReader<'_, PwsBlowfish>,
    seal: &Arc<SealKey>,
) -> PwsResult<Option<Record>> {
    let table = FormatVersion::V2.field_table();
    let mut record = Record::empty(FormatVersion::V2, seal);
    loop {
        let Some(item) = read_legacy_item(r)? else {
            if record.is_empty() {
                return Ok(None);
            }
            return Err(PwsError::eof("V2 record without end marker"));
        };
        if item.tag == END_OF_RECORD {
            return Ok(Some(record));
        }
        let spec = table
            .lookup(item.tag)
            .ok_or(PwsError::UnknownFieldType {
                version: FormatVersion::V2,
                tag: item.tag,
            })?;
        record.insert(Field::decode(spec.kind, item.tag, &item.payload, seal)?);
    }
}

pub(crate) fn write_v2_record(w: &mut BlockWriter<PwsBlowfish>, record: &Record) -> PwsResult<()> {
    for field in record.fields() {
        write_legacy_item(w, field.tag(), &field.encode()?)?;
    }
    write_legacy_item(w, END_OF_RECORD, &[])
}

// =============================================================================
// V3
// =============================================================================

/// Reads one field. Returns `None` after consuming the end-of-file marker.
pub(crate) fn read_v3_item(r: &mut BlockReader<'_, PwsTwofish>) -> PwsResult<Option<Item>> {
    match r.peek_raw(V3_BLOCK_SIZE) {
        None => return Err(PwsError::eof("missing end-of-file marker")),
        Some(block) if block == V3_EOF_MARKER => {
            r.read_raw(V3_BLOCK_SIZE, "end-of-file marker")?;
            return Ok(None);
        }
        Some(_) => {}
    }

    let first = r.read_decrypted(V3_BLOCK_SIZE, "field header")?;
    let len = item_length(&first)?;
    let tag = first[4];

    let in_first = len.min(V3_FIRST_BLOCK_DATA);
    let mut payload = Zeroizing::new(first[5..5 + in_first].to_vec());
    if len > in_first {
        let padded = block_length(len - in_first, V3_BLOCK_SIZE);
        if padded > r.remaining() {
            return Err(PwsError::eof(format!("field {tag} declares {len} bytes")));
        }
        payload.reserve(padded);
        for _ in 0..padded / V3_BLOCK_SIZE {
            if r.peek_raw(V3_BLOCK_SIZE) == Some(&V3_EOF_MARKER[..]) {
                return Err(PwsError::eof(format!("end-of-file marker inside field {tag}")));
            }
            payload.extend_from_slice(&r.read_decrypted(V3_BLOCK_SIZE, "field data")?);
        }
        payload.truncate(len);
    }
    Ok(Some(Item { tag, payload }))
}

pub(crate) fn write_v3_item(
    w: &mut BlockWriter<PwsTwofish>,
    tag: u8,
    payload: &[u8],
    rng: &mut dyn RngCore,
) -> PwsResult<()> {
    let total = block_length(5 + payload.len(), V3_BLOCK_SIZE);
    let mut buf = Zeroizing::new(Vec::with_capacity(total));
    buf.extend_from_slice(&stored_length(payload)?);
    buf.push(tag);
    buf.extend_from_slice(payload);
    let used = buf.len();
    buf.resize(total, 0);
    rng.fill_bytes(&mut buf[used..]);
    w.write_encrypted(&mut buf)
}

/// Reads a V3 record, feeding every payload to `mac`. Returns `None` after
/// the end-of-file marker when it appears at a record boundary.
pub(crate) fn read_v3_record(
    r: &mut BlockReader<'_, PwsTwofish>,
    mac: &mut FieldMac,
    table: &FieldTable,
    seal: &Arc<SealKey>,
) -> PwsResult<Option<Record>> {
    let mut record = Record::empty(FormatVersion::V3, seal);
    loop {
        let Some(item) = read_v3_item(r)? else {
            if record.is_empty() {
                return Ok(None);
            }
            return Err(PwsError::eof("V3 record without end marker"));
        };
        mac.update(&item.payload);
        if item.tag == END_OF_RECORD {
            return Ok(Some(record));
        }
        let field = match table.lookup(item.tag) {
            Some(spec) => Field::decode(spec.kind, item.tag, &item.payload, seal)?,
            None => Field::Unknown {
                tag: item.tag,
                bytes: item.payload.to_vec(),
            },
        };
        record.insert(field);
    }
}

pub(crate) fn write_v3_record(
    w: &mut BlockWriter<PwsTwofish>,
    mac: &mut FieldMac,
    rng: &mut dyn RngCore,
    record: &Record,
) -> PwsResult<()> {
    for field in record.fields() {
        let payload = field.encode()?;
        mac.update(&payload);
        write_v3_item(w, field.tag(), &payload, rng)?;
    }
    mac.update(&[]);
    write_v3_item(w, END_OF_RECORD, &[], rng)
}
