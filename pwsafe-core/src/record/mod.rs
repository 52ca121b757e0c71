//! Vault records.
//!
//! A [`Record`] is an ordered map from type tag to [`Field`]. Writes through
//! the public setters are checked against the version's field table; fields
//! read from disk bypass the check so that nothing in a file is lost.
//!
//! V3 files also carry a header pseudo-record holding the database version
//! and UUID. It is parsed with the same machinery, flagged with
//! [`Record::is_header`] and never appears in the container's record list.

pub(crate) mod codec;
pub mod table;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use pwsafe_crypto::SealKey;
use uuid::Uuid;

use crate::error::{PwsError, PwsResult};
use crate::field::{Charset, Field, FieldKind};
use crate::format::{V2_ID_STRING, V3_DB_FORMAT};
use crate::version::FormatVersion;

use table::{tags, FieldTable, V3_HEADER_FIELDS};

/// A single vault entry.
#[derive(Clone)]
pub struct Record {
    version: FormatVersion,
    header: bool,
    fields: BTreeMap<u8, Field>,
    modified: bool,
    seal: Arc<SealKey>,
}

impl Record {
    /// A record with no fields, as the codec starts one.
    pub(crate) fn empty(version: FormatVersion, seal: &Arc<SealKey>) -> Self {
        Self {
            version,
            header: false,
            fields: BTreeMap::new(),
            modified: false,
            seal: Arc::clone(seal),
        }
    }

    /// A record with the defaults a new entry gets: an empty title and
    /// password everywhere, empty username and notes for V1, a fresh UUID for
    /// V2/V3 and the creation time for V3.
    pub(crate) fn with_defaults(version: FormatVersion, seal: &Arc<SealKey>) -> PwsResult<Self> {
        let mut record = Self::empty(version, seal);
        record.set_title("")?;
        record.set_password("")?;
        match version {
            FormatVersion::V1 => {
                record.set_username("")?;
                record.set_notes("")?;
            }
            FormatVersion::V2 | FormatVersion::V3 => {
                record.set_field(Field::Uuid {
                    tag: tags::UUID,
                    value: Uuid::new_v4(),
                })?;
            }
        }
        if version == FormatVersion::V3 {
            record.set_time(tags::CREATION_TIME, SystemTime::now())?;
        }
        Ok(record)
    }

    /// A fresh V3 header record with the current database format and a new
    /// database UUID.
    pub(crate) fn new_v3_header(seal: &Arc<SealKey>) -> Self {
        let mut record = Self::empty(FormatVersion::V3, seal);
        record.header = true;
        record.insert(Field::Version {
            tag: tags::HEADER_VERSION,
            major: V3_DB_FORMAT[1],
            minor: V3_DB_FORMAT[0],
        });
        record.insert(Field::Uuid {
            tag: tags::HEADER_UUID,
            value: Uuid::new_v4(),
        });
        record
    }

    pub(crate) fn mark_header(&mut self) {
        self.header = true;
    }

    /// Inserts a decoded field without validation or change tracking.
    pub(crate) fn insert(&mut self, field: Field) {
        self.fields.insert(field.tag(), field);
    }

    /// Format generation of the record.
    #[must_use]
    pub const fn version(&self) -> FormatVersion {
        self.version
    }

    /// Whether this is the V3 header pseudo-record.
    #[must_use]
    pub const fn is_header(&self) -> bool {
        self.header
    }

    /// The table this record's fields are checked against.
    #[must_use]
    pub const fn field_table(&self) -> &'static FieldTable {
        if self.header {
            &V3_HEADER_FIELDS
        } else {
            self.version.field_table()
        }
    }

    /// Whether the record holds user data. Header and version-marker records
    /// are not kept in the visible record list.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        if self.header {
            return false;
        }
        match self.version {
            FormatVersion::V1 => true,
            FormatVersion::V2 => self.title() != Some(V2_ID_STRING),
            FormatVersion::V3 => !self.fields.contains_key(&tags::ID_STRING),
        }
    }

    /// Whether the record changed since it was loaded or last saved.
    #[must_use]
    pub const fn is_modified(&self) -> bool {
        self.modified
    }

    pub(crate) fn clear_modified(&mut self) {
        self.modified = false;
    }

    /// Field for `tag`, if present.
    #[must_use]
    pub fn field(&self, tag: u8) -> Option<&Field> {
        self.fields.get(&tag)
    }

    /// All fields in ascending tag order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.values()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Stores `field`, replacing any field with the same tag.
    ///
    /// # Errors
    ///
    /// Returns [`PwsError::InvalidField`] if the tag is not in the record's
    /// table (unless the table accepts unknown tags) or if the value's kind
    /// does not match the declared one.
    pub fn set_field(&mut self, field: Field) -> PwsResult<()> {
        self.check(&field)?;
        self.fields.insert(field.tag(), field);
        self.modified = true;
        Ok(())
    }

    /// Removes the field for `tag`.
    pub fn remove_field(&mut self, tag: u8) -> Option<Field> {
        let removed = self.fields.remove(&tag);
        if removed.is_some() {
            self.modified = true;
        }
        removed
    }

    fn check(&self, field: &Field) -> PwsResult<()> {
        let tag = field.tag();
        let invalid = |reason: String| PwsError::InvalidField {
            version: self.version,
            tag,
            reason,
        };
        let table = self.field_table();
        match (table.lookup(tag), field.kind()) {
            (Some(spec), Some(kind)) if spec.kind == kind => Ok(()),
            (Some(spec), Some(kind)) => Err(invalid(format!(
                "{} holds {:?}, not {kind:?}",
                spec.name, spec.kind
            ))),
            (Some(spec), None) => Err(invalid(format!("{} needs a typed value", spec.name))),
            (None, _) if table.accepts_unknown() && tag != tags::END_OF_RECORD => Ok(()),
            (None, _) => Err(invalid("not defined for this version".to_owned())),
        }
    }

    // ===== Typed accessors =====

    /// Text of a string field.
    #[must_use]
    pub fn text(&self, tag: u8) -> Option<&str> {
        self.field(tag).and_then(Field::as_str)
    }

    /// Sets a string field, picking the charset the version stores it in.
    ///
    /// # Errors
    ///
    /// Returns [`PwsError::InvalidField`] if `tag` is not a string field of
    /// this version.
    pub fn set_text(&mut self, tag: u8, value: &str) -> PwsResult<()> {
        let value = value.to_owned();
        let field = match self.field_table().lookup(tag).map(|s| s.kind) {
            Some(FieldKind::Text) => Field::Text { tag, value },
            None if self.version != FormatVersion::V3 => Field::Text { tag, value },
            _ => Field::Unicode { tag, value },
        };
        self.set_field(field)
    }

    /// Timestamp field.
    #[must_use]
    pub fn time(&self, tag: u8) -> Option<SystemTime> {
        self.field(tag).and_then(Field::as_time)
    }

    /// Sets a timestamp field.
    ///
    /// # Errors
    ///
    /// Returns [`PwsError::InvalidField`] if `tag` is not a time field of
    /// this version.
    pub fn set_time(&mut self, tag: u8, at: SystemTime) -> PwsResult<()> {
        self.set_field(Field::time(tag, at))
    }

    /// Record UUID. Always `None` for V1.
    #[must_use]
    pub fn uuid(&self) -> Option<Uuid> {
        let tag = if self.header { tags::HEADER_UUID } else { tags::UUID };
        self.field(tag).and_then(Field::as_uuid)
    }

    /// Database format `(major, minor)` of a V3 header record.
    #[must_use]
    pub fn db_format(&self) -> Option<(u8, u8)> {
        match self.field(tags::HEADER_VERSION) {
            Some(Field::Version { major, minor, .. }) if self.header => Some((*major, *minor)),
            _ => None,
        }
    }

    /// Title.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.text(tags::TITLE)
    }

    /// Username.
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.text(tags::USERNAME)
    }

    /// Notes.
    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.text(tags::NOTES)
    }

    /// Group path (V2/V3).
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.text(tags::GROUP)
    }

    /// URL (V3).
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.text(tags::URL)
    }

    /// Email (V3).
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.text(tags::EMAIL)
    }

    /// Sets the title.
    ///
    /// # Errors
    ///
    /// See [`Record::set_text`].
    pub fn set_title(&mut self, value: &str) -> PwsResult<()> {
        self.set_text(tags::TITLE, value)
    }

    /// Sets the username.
    ///
    /// # Errors
    ///
    /// See [`Record::set_text`].
    pub fn set_username(&mut self, value: &str) -> PwsResult<()> {
        self.set_text(tags::USERNAME, value)
    }

    /// Sets the notes.
    ///
    /// # Errors
    ///
    /// See [`Record::set_text`].
    pub fn set_notes(&mut self, value: &str) -> PwsResult<()> {
        self.set_text(tags::NOTES, value)
    }

    /// Sets the password, sealing it immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the version has no password field or sealing
    /// fails.
    pub fn set_password(&mut self, value: &str) -> PwsResult<()> {
        let charset = match self.version {
            FormatVersion::V1 | FormatVersion::V2 => Charset::Latin1,
            FormatVersion::V3 => Charset::Utf8,
        };
        let field = Field::password(tags::PASSWORD, charset, value, &self.seal)?;
        self.set_field(field)
    }

    /// Runs `f` over the password. Returns `Ok(None)` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the sealed password cannot be opened.
    pub fn with_password<R>(&self, f: impl FnOnce(&str) -> R) -> PwsResult<Option<R>> {
        match self.field(tags::PASSWORD) {
            Some(field) => field.with_password(f),
            None => Ok(None),
        }
    }

    /// Re-seals every password under `seal`. Used when a record moves
    /// between containers.
    pub(crate) fn reseal(&mut self, seal: &Arc<SealKey>) -> PwsResult<()> {
        if Arc::ptr_eq(&self.seal, seal) {
            return Ok(());
        }
        for field in self.fields.values_mut() {
            if let Field::Password { tag, charset, .. } = *field {
                let payload = field.encode()?;
                *field = Field::decode(FieldKind::Password(charset), tag, &payload, seal)?;
            }
        }
        self.seal = Arc::clone(seal);
        Ok(())
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version && self.header == other.header && self.fields == other.fields
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.field_table();
        let mut map = f.debug_map();
        for field in self.fields.values() {
            map.entry(&table.name(field.tag()), field);
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_per_version() {
        let seal = SealKey::generate();

        let v1 = Record::with_defaults(FormatVersion::V1, &seal).unwrap();
        assert_eq!(v1.title(), Some(""));
        assert!(v1.uuid().is_none());
        assert_eq!(v1.len(), 4);

        let v3 = Record::with_defaults(FormatVersion::V3, &seal).unwrap();
        assert!(v3.uuid().is_some());
        assert!(v3.time(tags::CREATION_TIME).is_some());
        assert!(matches!(v3.field(tags::TITLE), Some(Field::Unicode { .. })));
        assert!(v3.is_valid());
    }

    #[test]
    fn test_set_field_checks_table() {
        let seal = SealKey::generate();
        let mut v2 = Record::with_defaults(FormatVersion::V2, &seal).unwrap();

        assert!(matches!(
            v2.set_text(tags::URL, "https://example.com"),
            Err(PwsError::InvalidField { tag: tags::URL, .. })
        ));
        assert!(matches!(
            v2.set_field(Field::Integer {
                tag: tags::TITLE,
                value: 1
            }),
            Err(PwsError::InvalidField { .. })
        ));

        let mut v3 = Record::with_defaults(FormatVersion::V3, &seal).unwrap();
        v3.set_field(Field::Unknown {
            tag: 0x60,
            bytes: vec![1, 2, 3],
        })
        .unwrap();
        assert!(v3
            .set_field(Field::Unknown {
                tag: tags::END_OF_RECORD,
                bytes: vec![]
            })
            .is_err());
    }

    #[test]
    fn test_validity() {
        let seal = SealKey::generate();
        let mut v2 = Record::with_defaults(FormatVersion::V2, &seal).unwrap();
        assert!(v2.is_valid());
        v2.set_title(V2_ID_STRING).unwrap();
        assert!(!v2.is_valid());

        let mut v3 = Record::empty(FormatVersion::V3, &seal);
        assert!(v3.is_valid());
        v3.insert(Field::Version {
            tag: tags::ID_STRING,
            major: 3,
            minor: 0x0D,
        });
        assert!(!v3.is_valid());

        let header = Record::new_v3_header(&seal);
        assert!(header.is_header());
        assert!(!header.is_valid());
        assert_eq!(header.db_format(), Some((3, 0x0D)));
        assert!(header.uuid().is_some());
    }

    #[test]
    fn test_modification_tracking() {
        let seal = SealKey::generate();
        let mut record = Record::empty(FormatVersion::V3, &seal);
        record.insert(Field::Unicode {
            tag: tags::TITLE,
            value: "Bank".to_owned(),
        });
        assert!(!record.is_modified());
        assert!(record.remove_field(tags::URL).is_none());
        assert!(!record.is_modified());
        record.set_username("alice").unwrap();
        assert!(record.is_modified());
        record.clear_modified();
        assert!(!record.is_modified());
    }

    #[test]
    fn test_reseal_keeps_password() {
        let seal = SealKey::generate();
        let other = SealKey::generate();
        let mut record = Record::with_defaults(FormatVersion::V3, &seal).unwrap();
        record.set_password("s3cr3t!").unwrap();
        record.reseal(&other).unwrap();
        assert_eq!(
            record.with_password(str::to_owned).unwrap().as_deref(),
            Some("s3cr3t!")
        );
    }

    #[test]
    fn test_debug_names_fields_and_hides_password() {
        let seal = SealKey::generate();
        let mut record = Record::with_defaults(FormatVersion::V3, &seal).unwrap();
        record.set_title("Bank").unwrap();
        record.set_password("s3cr3t!").unwrap();
        let rendered = format!("{record:?}");
        assert!(rendered.contains("\"title\": 3: \"Bank\""));
        assert!(!rendered.contains("s3cr3t!"));
    }
}
