//! Opening containers: version sniffing and open-time options.

use secrecy::{ExposeSecret, SecretString};

use pwsafe_crypto::SealKey;

use crate::container::{Container, Decoded};
use crate::encoding::{PassphraseEncoding, DEFAULT_ATTEMPTS};
use crate::error::{PwsError, PwsResult};
use crate::format::V3_TAG;
use crate::storage::Storage;
use crate::version::FormatVersion;

/// Options for [`open_with`].
///
/// ```rust
/// use pwsafe_core::{OpenOptions, PassphraseEncoding};
///
/// let options = OpenOptions::default()
///     .read_only(true)
///     .encoding_hint(PassphraseEncoding::Windows1252);
/// assert!(options.is_read_only());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    pub(crate) read_only: bool,
    pub(crate) encodings: Vec<PassphraseEncoding>,
    pub(crate) encoding_hint: Option<PassphraseEncoding>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            read_only: false,
            encodings: DEFAULT_ATTEMPTS.to_vec(),
            encoding_hint: None,
        }
    }
}

impl OpenOptions {
    /// Opens the container read-only; [`Container::save`] will refuse.
    #[must_use]
    pub const fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Encodings tried, in order, when verifying the passphrase.
    #[must_use]
    pub fn encodings(mut self, encodings: Vec<PassphraseEncoding>) -> Self {
        self.encodings = encodings;
        self
    }

    /// Encoding tried before the list.
    #[must_use]
    pub const fn encoding_hint(mut self, hint: PassphraseEncoding) -> Self {
        self.encoding_hint = Some(hint);
        self
    }

    /// Whether containers are opened read-only.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// Identifies the format of a container image from its first bytes.
///
/// V1 and V2 share a header, so anything not starting with `PWS3` reports
/// [`FormatVersion::V1`] here; the two are told apart after decryption.
///
/// # Errors
///
/// Returns [`PwsError::EndOfFile`] if fewer than four bytes are available.
pub fn sniff(bytes: &[u8]) -> PwsResult<FormatVersion> {
    let tag = bytes
        .get(..V3_TAG.len())
        .ok_or_else(|| PwsError::eof("file tag"))?;
    if tag == V3_TAG {
        Ok(FormatVersion::V3)
    } else {
        Ok(FormatVersion::V1)
    }
}

/// Opens the container in `storage` with default options.
///
/// # Errors
///
/// See [`open_with`].
pub fn open<S: Storage + 'static>(storage: S, passphrase: &SecretString) -> PwsResult<Container> {
    open_with(storage, passphrase, &OpenOptions::default())
}

/// Loads, verifies and decrypts the container in `storage`.
///
/// # Errors
///
/// * [`PwsError::Io`] if the storage cannot be read.
/// * [`PwsError::EndOfFile`] for empty or truncated images.
/// * [`PwsError::InvalidPassphrase`] if no encoding of the passphrase verifies.
/// * [`PwsError::UnsupportedFileVersion`] for foreign V3 database formats.
/// * [`PwsError::IntegrityFailure`] if the V3 HMAC does not match.
pub fn open_with<S: Storage + 'static>(
    storage: S,
    passphrase: &SecretString,
    options: &OpenOptions,
) -> PwsResult<Container> {
    let bytes = storage.load()?;
    let version = sniff(&bytes)?;
    let seal = SealKey::generate();
    let decoded = Decoded::decode(version, &bytes, passphrase.expose_secret(), options, &seal)?;
    log::info!(
        "opened {} container {} with {} records",
        decoded.version,
        storage.identifier(),
        decoded.records.len()
    );
    Container::from_decoded(
        decoded,
        Some(Box::new(storage)),
        passphrase,
        options.read_only,
        seal,
    )
}
