//! The container engine.
//!
//! A [`Container`] owns the decrypted records of one vault, the passphrase
//! (sealed) and, for V3, the key envelope read from the file. It is created
//! either empty with [`Container::new`] or by [`crate::open`], and it moves
//! through a small state machine:
//!
//! ```text
//!            save()               save() ok / err
//!   Open ──────────────▶ Saving ──────────────────▶ Open
//!     │
//!     │ dispose()
//!     ▼
//!   Disposed   (passphrase wiped; every mutation fails)
//! ```
//!
//! A failed open never produces a container; the error is returned instead.
//!
//! Every save re-derives the keys from the passphrase with fresh random salt
//! and IV, serializes all records through the record codec and hands the
//! complete image to the [`Storage`] in one call.

mod legacy;
mod v3;

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use pwsafe_crypto::{SealKey, Secret};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::encoding::PassphraseEncoding;
use crate::error::{PwsError, PwsResult};
use crate::factory::OpenOptions;
use crate::format::V3_DEFAULT_ITERATIONS;
use crate::header::V3Header;
use crate::record::table::tags;
use crate::record::Record;
use crate::storage::Storage;
use crate::version::FormatVersion;

// =============================================================================
// Decoding results
// =============================================================================

/// V3-only state carried between open and save.
pub(crate) struct V3Envelope {
    /// Header as read from the file or written by the last save.
    header: Option<V3Header>,
    header_record: Record,
    iterations: u32,
}

impl V3Envelope {
    fn new(seal: &Arc<SealKey>) -> Self {
        Self {
            header: None,
            header_record: Record::new_v3_header(seal),
            iterations: V3_DEFAULT_ITERATIONS,
        }
    }
}

/// Output of a version-specific decoder.
pub(crate) struct Decoded {
    pub(crate) version: FormatVersion,
    pub(crate) encoding: PassphraseEncoding,
    pub(crate) records: Vec<Record>,
    pub(crate) v3: Option<V3Envelope>,
}

impl Decoded {
    /// Runs the decoder for `version` over `bytes`.
    pub(crate) fn decode(
        version: FormatVersion,
        bytes: &[u8],
        passphrase: &str,
        options: &OpenOptions,
        seal: &Arc<SealKey>,
    ) -> PwsResult<Self> {
        match version {
            FormatVersion::V3 => v3::decode(bytes, passphrase, options, seal),
            FormatVersion::V1 | FormatVersion::V2 => {
                legacy::decode(bytes, passphrase, options, seal)
            }
        }
    }
}

// =============================================================================
// Container
// =============================================================================

/// Lifecycle state of a [`Container`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    /// Usable.
    Open,
    /// A save is in progress.
    Saving,
    /// Key material has been wiped.
    Disposed,
}

/// An open vault.
pub struct Container {
    version: FormatVersion,
    state: ContainerState,
    storage: Option<Box<dyn Storage>>,
    passphrase: Option<Secret>,
    encoding: PassphraseEncoding,
    records: Vec<Record>,
    v3: Option<V3Envelope>,
    modified: bool,
    read_only: bool,
    observed: Option<SystemTime>,
    seal: Arc<SealKey>,
    rng: Box<dyn RngCore + Send>,
}

impl Container {
    /// Creates an empty container of `version` with no storage attached.
    ///
    /// # Errors
    ///
    /// Returns an error if the passphrase cannot be sealed.
    pub fn new(version: FormatVersion, passphrase: &SecretString) -> PwsResult<Self> {
        let seal = SealKey::generate();
        let decoded = Decoded {
            version,
            encoding: version.default_encoding(),
            records: Vec::new(),
            v3: (version == FormatVersion::V3).then(|| V3Envelope::new(&seal)),
        };
        Self::from_decoded(decoded, None, passphrase, false, seal)
    }

    pub(crate) fn from_decoded(
        decoded: Decoded,
        storage: Option<Box<dyn Storage>>,
        passphrase: &SecretString,
        read_only: bool,
        seal: Arc<SealKey>,
    ) -> PwsResult<Self> {
        let sealed = seal_passphrase(&seal, passphrase)?;
        let observed = storage.as_ref().and_then(|s| s.last_modified());
        Ok(Self {
            version: decoded.version,
            state: ContainerState::Open,
            storage,
            passphrase: Some(sealed),
            encoding: decoded.encoding,
            records: decoded.records,
            v3: decoded.v3,
            modified: false,
            read_only,
            observed,
            seal,
            rng: Box::new(StdRng::from_entropy()),
        })
    }

    fn ensure_open(&self) -> PwsResult<()> {
        match self.state {
            ContainerState::Disposed => Err(PwsError::Disposed),
            ContainerState::Open | ContainerState::Saving => Ok(()),
        }
    }

    // -------------------------------------------------------------------------
    // Configuration
    // -------------------------------------------------------------------------

    /// Format generation of the container.
    #[must_use]
    pub const fn version(&self) -> FormatVersion {
        self.version
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ContainerState {
        self.state
    }

    /// Encoding the passphrase verified under; saves encode with it too.
    #[must_use]
    pub const fn encoding(&self) -> PassphraseEncoding {
        self.encoding
    }

    /// Attaches (or replaces) the storage saves go to. The storage's current
    /// modification time becomes the reference for the concurrent-edit check.
    pub fn set_storage<S: Storage + 'static>(&mut self, storage: S) {
        self.observed = storage.last_modified();
        self.storage = Some(Box::new(storage));
    }

    /// Identifier of the attached storage.
    #[must_use]
    pub fn storage_identifier(&self) -> Option<String> {
        self.storage.as_ref().map(|s| s.identifier())
    }

    /// Replaces the random source used for salts, IVs, keys and padding.
    pub fn set_rng<R: RngCore + Send + 'static>(&mut self, rng: R) {
        self.rng = Box::new(rng);
    }

    /// Whether saves are refused.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Marks the container read-only or writable.
    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    /// Changes the passphrase. The file is re-keyed on the next save.
    ///
    /// # Errors
    ///
    /// Returns [`PwsError::Disposed`] after [`Container::dispose`].
    pub fn set_passphrase(&mut self, passphrase: &SecretString) -> PwsResult<()> {
        self.ensure_open()?;
        self.passphrase = Some(seal_passphrase(&self.seal, passphrase)?);
        self.modified = true;
        log::debug!("passphrase changed; keys are regenerated on save");
        Ok(())
    }

    /// V3 key-stretching iteration count used by the next save.
    #[must_use]
    pub fn iterations(&self) -> Option<u32> {
        self.v3.as_ref().map(|env| env.iterations)
    }

    /// Sets the V3 iteration count. Values below the default are raised to it.
    ///
    /// # Errors
    ///
    /// Returns [`PwsError::VersionMismatch`] for V1/V2 containers.
    pub fn set_iterations(&mut self, iterations: u32) -> PwsResult<()> {
        self.ensure_open()?;
        let env = self.v3.as_mut().ok_or(PwsError::VersionMismatch {
            expected: FormatVersion::V3,
            found: self.version,
        })?;
        let iterations = iterations.max(V3_DEFAULT_ITERATIONS);
        if env.iterations != iterations {
            env.iterations = iterations;
            self.modified = true;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Records
    // -------------------------------------------------------------------------

    /// The visible records in file order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Number of visible records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the container holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record at `index`.
    #[must_use]
    pub fn record(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    /// Mutable record at `index`. Changes made through the record's setters
    /// mark it modified. Edits that make the record a duplicate or a format
    /// marker are rejected by [`Container::save`].
    pub fn record_mut(&mut self, index: usize) -> Option<&mut Record> {
        self.records.get_mut(index)
    }

    /// Position of the record with `uuid`.
    #[must_use]
    pub fn find_by_uuid(&self, uuid: Uuid) -> Option<usize> {
        self.records.iter().position(|r| r.uuid() == Some(uuid))
    }

    /// A new, unattached record with the defaults of this container's version.
    ///
    /// # Errors
    ///
    /// Returns [`PwsError::Disposed`] after [`Container::dispose`].
    pub fn new_record(&self) -> PwsResult<Record> {
        self.ensure_open()?;
        Record::with_defaults(self.version, &self.seal)
    }

    /// Appends `record`.
    ///
    /// # Errors
    ///
    /// * [`PwsError::VersionMismatch`] if the record is of another format.
    /// * [`PwsError::InvalidField`] if it is a header or format-marker record.
    /// * [`PwsError::DuplicateRecord`] if its UUID is already present.
    pub fn add_record(&mut self, record: Record) -> PwsResult<()> {
        self.ensure_open()?;
        let record = self.admit(record, None)?;
        self.records.push(record);
        self.modified = true;
        Ok(())
    }

    /// Replaces the record at `index`.
    ///
    /// # Errors
    ///
    /// As [`Container::add_record`], plus [`PwsError::NoSuchRecord`].
    pub fn set_record(&mut self, index: usize, record: Record) -> PwsResult<()> {
        self.ensure_open()?;
        if index >= self.records.len() {
            return Err(self.no_such(index));
        }
        let record = self.admit(record, Some(index))?;
        self.records[index] = record;
        self.modified = true;
        Ok(())
    }

    /// Removes and returns the record at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`PwsError::NoSuchRecord`] if `index` is out of range.
    pub fn remove_record(&mut self, index: usize) -> PwsResult<Record> {
        self.ensure_open()?;
        if index >= self.records.len() {
            return Err(self.no_such(index));
        }
        self.modified = true;
        Ok(self.records.remove(index))
    }

    /// Keeps only the records for which `keep` returns `true`. Returns the
    /// number removed.
    ///
    /// # Errors
    ///
    /// Returns [`PwsError::Disposed`] after [`Container::dispose`].
    pub fn retain_records<F>(&mut self, keep: F) -> PwsResult<usize>
    where
        F: FnMut(&Record) -> bool,
    {
        self.ensure_open()?;
        let before = self.records.len();
        self.records.retain(keep);
        let removed = before - self.records.len();
        if removed > 0 {
            self.modified = true;
        }
        Ok(removed)
    }

    fn no_such(&self, index: usize) -> PwsError {
        PwsError::NoSuchRecord {
            index,
            len: self.records.len(),
        }
    }

    /// Checks that `record` may be stored at `slot` (or appended) and moves
    /// its secrets under this container's seal key.
    fn admit(&self, mut record: Record, slot: Option<usize>) -> PwsResult<Record> {
        if record.version() != self.version {
            return Err(PwsError::VersionMismatch {
                expected: self.version,
                found: record.version(),
            });
        }
        if !record.is_valid() {
            return Err(not_user_data(self.version));
        }
        if let Some(uuid) = record.uuid() {
            let taken = self
                .records
                .iter()
                .enumerate()
                .any(|(i, r)| Some(i) != slot && r.uuid() == Some(uuid));
            if taken {
                return Err(PwsError::DuplicateRecord { uuid });
            }
        }
        record.reseal(&self.seal)?;
        Ok(record)
    }

    /// Re-checks what [`Container::record_mut`] lets callers change after
    /// admission.
    fn check_records(&self) -> PwsResult<()> {
        let mut seen = HashSet::with_capacity(self.records.len());
        for record in &self.records {
            if !record.is_valid() {
                return Err(not_user_data(self.version));
            }
            if let Some(uuid) = record.uuid() {
                if !seen.insert(uuid) {
                    return Err(PwsError::DuplicateRecord { uuid });
                }
            }
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // V3 header record
    // -------------------------------------------------------------------------

    /// The V3 header pseudo-record.
    #[must_use]
    pub fn header_record(&self) -> Option<&Record> {
        self.v3.as_ref().map(|env| &env.header_record)
    }

    /// Mutable V3 header pseudo-record.
    pub fn header_record_mut(&mut self) -> Option<&mut Record> {
        self.v3.as_mut().map(|env| &mut env.header_record)
    }

    /// The V3 file header as last read or written. `None` for new containers
    /// that were never saved.
    #[must_use]
    pub fn v3_header(&self) -> Option<&V3Header> {
        self.v3.as_ref().and_then(|env| env.header.as_ref())
    }

    /// Database UUID from the V3 header record.
    #[must_use]
    pub fn database_uuid(&self) -> Option<Uuid> {
        self.header_record().and_then(Record::uuid)
    }

    /// Database format `(major, minor)` from the V3 header record.
    #[must_use]
    pub fn db_format(&self) -> Option<(u8, u8)> {
        self.header_record().and_then(Record::db_format)
    }

    // -------------------------------------------------------------------------
    // Persistence
    // -------------------------------------------------------------------------

    /// Whether anything changed since the container was opened or saved.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
            || self.records.iter().any(Record::is_modified)
            || self.header_record().is_some_and(Record::is_modified)
    }

    /// Serializes every record and writes the image to storage.
    ///
    /// # Errors
    ///
    /// * [`PwsError::Disposed`] after [`Container::dispose`].
    /// * [`PwsError::ReadOnlyViolation`] for read-only containers.
    /// * [`PwsError::NoStorage`] if no storage is attached.
    /// * [`PwsError::ConcurrentModification`] if the storage changed since it
    ///   was last observed.
    /// * [`PwsError::DuplicateRecord`] or [`PwsError::InvalidField`] if an
    ///   edited record now clashes with another or would not survive a reopen.
    ///   Nothing is written.
    /// * [`PwsError::SaveFailed`] if the storage did not write the image.
    pub fn save(&mut self) -> PwsResult<()> {
        self.ensure_open()?;
        if self.read_only {
            return Err(PwsError::ReadOnlyViolation);
        }
        let storage = self.storage.as_ref().ok_or(PwsError::NoStorage)?;
        if let (Some(observed), Some(current)) = (self.observed, storage.last_modified()) {
            if current > observed {
                log::warn!("{} changed on disk since it was read", storage.identifier());
                return Err(PwsError::ConcurrentModification);
            }
        }
        self.check_records()?;

        self.state = ContainerState::Saving;
        let result = self.write_image();
        self.state = ContainerState::Open;
        result
    }

    fn write_image(&mut self) -> PwsResult<()> {
        let passphrase = self.encoded_passphrase()?;
        let (image, rekeyed) = match self.v3.as_ref() {
            Some(env) => {
                let (image, header) =
                    v3::encode(&passphrase, env, &self.records, self.rng.as_mut())?;
                (image, Some(header))
            }
            None => (
                legacy::encode(self.version, &passphrase, &self.records, self.rng.as_mut())?,
                None,
            ),
        };
        drop(passphrase);

        let storage = self.storage.as_ref().ok_or(PwsError::NoStorage)?;
        if !storage.save(&image) {
            return Err(PwsError::SaveFailed {
                identifier: storage.identifier(),
            });
        }
        self.observed = storage.last_modified();
        log::info!(
            "saved {} records to {} ({} bytes)",
            self.records.len(),
            storage.identifier(),
            image.len()
        );

        if let (Some(env), Some(header)) = (self.v3.as_mut(), rekeyed) {
            env.header = Some(header);
            env.header_record.clear_modified();
        }
        self.records.iter_mut().for_each(Record::clear_modified);
        self.modified = false;
        Ok(())
    }

    fn encoded_passphrase(&self) -> PwsResult<Zeroizing<Vec<u8>>> {
        let sealed = self.passphrase.as_ref().ok_or(PwsError::Disposed)?;
        let encoding = self.encoding;
        sealed
            .with_plaintext(|bytes| std::str::from_utf8(bytes).map(|text| encoding.encode(text)))?
            .map_err(|_| PwsError::corrupted("sealed passphrase is not valid UTF-8"))
    }

    /// Wipes the passphrase and forgets the file header. Records stay readable through
    /// their own sealed fields; saving is no longer possible. Idempotent.
    pub fn dispose(&mut self) {
        if self.state == ContainerState::Disposed {
            return;
        }
        self.passphrase = None;
        if let Some(env) = self.v3.as_mut() {
            env.header = None;
        }
        self.state = ContainerState::Disposed;
        log::debug!("container disposed");
    }
}

fn seal_passphrase(seal: &Arc<SealKey>, passphrase: &SecretString) -> PwsResult<Secret> {
    let bytes = passphrase.expose_secret().as_bytes().to_vec();
    Ok(Secret::seal_vec(seal, bytes)?)
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("version", &self.version)
            .field("state", &self.state)
            .field("storage", &self.storage_identifier())
            .field("encoding", &self.encoding)
            .field("records", &self.records.len())
            .field("modified", &self.is_modified())
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn not_user_data(version: FormatVersion) -> PwsError {
    PwsError::InvalidField {
        version,
        tag: tags::ID_STRING,
        reason: "header and format-marker records are not user data".to_owned(),
    }
}
