//! Where container bytes live.
//!
//! A container never touches the filesystem itself; it hands the fully
//! serialized image to a [`Storage`] and asks it for the modification time
//! when checking for concurrent edits.

mod file;
mod memory;

use std::time::SystemTime;

use crate::error::PwsResult;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Backing store for one container image.
///
/// # Implementation Notes
///
/// ## Atomic Saves
///
/// `save` must leave the previous image intact unless the new one was
/// written completely. For files this means write-to-temp, `fsync`, then
/// rename over the target.
///
/// ## Modification Times
///
/// `last_modified` is compared against the value observed at open or at the
/// previous save. A later value means someone else wrote the image and the
/// container refuses to overwrite it. Implementations that cannot tell
/// return `None`, which disables the check.
pub trait Storage: Send + Sync {
    /// Reads the whole image.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PwsError::Io`] if the image cannot be read.
    fn load(&self) -> PwsResult<Vec<u8>>;

    /// Replaces the image. Returns `false` if nothing was written; the
    /// adapter logs the cause.
    fn save(&self, bytes: &[u8]) -> bool;

    /// Human-readable name for messages, such as a path.
    fn identifier(&self) -> String;

    /// Time of the last change to the image, if known.
    fn last_modified(&self) -> Option<SystemTime>;
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn load(&self) -> PwsResult<Vec<u8>> {
        (**self).load()
    }

    fn save(&self, bytes: &[u8]) -> bool {
        (**self).save(bytes)
    }

    fn identifier(&self) -> String {
        (**self).identifier()
    }

    fn last_modified(&self) -> Option<SystemTime> {
        (**self).last_modified()
    }
}
