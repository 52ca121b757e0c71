//! Reader and writer for Password Safe vault containers.
//!
//! Three on-disk generations are supported:
//!
//! * **V1**: Blowfish-CBC, three-item records, username folded into the title.
//! * **V2**: the V1 envelope with typed, tag-terminated records and UUIDs.
//! * **V3** (`.psafe3`): stretched-key Twofish envelope, a header record and
//!   an HMAC-SHA-256 tag over every field.
//!
//! ```rust,no_run
//! use pwsafe_core::{open, FileStorage, SecretString};
//!
//! # fn main() -> pwsafe_core::PwsResult<()> {
//! let passphrase = SecretString::from("correct horse".to_owned());
//! let mut container = open(FileStorage::new("vault.psafe3"), &passphrase)?;
//! for record in container.records() {
//!     println!("{}", record.title().unwrap_or_default());
//! }
//! let mut record = container.new_record()?;
//! record.set_title("Bank")?;
//! record.set_password("s3cr3t!")?;
//! container.add_record(record)?;
//! container.save()?;
//! # Ok(())
//! # }
//! ```
//!
//! Passwords and the passphrase are sealed in memory and only exposed through
//! scoped closures such as [`Record::with_password`]. Library code logs through
//! the `log` facade; see [`logger`] for forwarding records to a host.

pub mod container;
pub mod encoding;
pub mod error;
pub mod factory;
pub mod field;
pub mod format;
pub mod header;
pub mod keys;
pub mod logger;
pub mod record;
pub mod storage;
pub mod version;

mod stream;

pub use container::{Container, ContainerState};
pub use encoding::PassphraseEncoding;
pub use error::{PwsError, PwsResult};
pub use factory::{open, open_with, sniff, OpenOptions};
pub use field::{Charset, Field, FieldKind};
pub use record::table::tags;
pub use record::Record;
pub use secrecy::SecretString;
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use version::FormatVersion;
