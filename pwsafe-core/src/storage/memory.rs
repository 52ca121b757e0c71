//! In-memory storage.
//!
//! Useful for tests and for callers that manage persistence themselves.
//! Modification times come from a logical clock so that concurrent-edit
//! checks are deterministic.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{PwsError, PwsResult};

use super::Storage;

#[derive(Debug, Default)]
struct State {
    bytes: Option<Vec<u8>>,
    clock: u64,
    fail_saves: bool,
    saves: usize,
}

/// A container image held in memory.
///
/// Clones share the same image, so a test can keep a handle while the
/// container owns another.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    name: String,
    state: Arc<Mutex<State>>,
}

impl MemoryStorage {
    /// Empty storage.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            state: Arc::default(),
        }
    }

    /// Storage preloaded with `bytes`.
    #[must_use]
    pub fn with_bytes(name: &str, bytes: Vec<u8>) -> Self {
        let storage = Self::new(name);
        {
            let mut state = storage.lock();
            state.bytes = Some(bytes);
            state.clock = 1;
        }
        storage
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current image, if any.
    #[must_use]
    pub fn bytes(&self) -> Option<Vec<u8>> {
        self.lock().bytes.clone()
    }

    /// Replaces the image out of band, as another writer would.
    pub fn overwrite(&self, bytes: Vec<u8>) {
        let mut state = self.lock();
        state.bytes = Some(bytes);
        state.clock += 1;
    }

    /// Advances the modification time without changing the image.
    pub fn touch(&self) {
        self.lock().clock += 1;
    }

    /// Makes subsequent saves fail.
    pub fn set_fail_saves(&self, fail: bool) {
        self.lock().fail_saves = fail;
    }

    /// Number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> PwsResult<Vec<u8>> {
        self.lock().bytes.clone().ok_or_else(|| {
            PwsError::io(
                format!("reading {}", self.name),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            )
        })
    }

    fn save(&self, bytes: &[u8]) -> bool {
        let mut state = self.lock();
        if state.fail_saves {
            log::error!("saving {} failed: storage rejects writes", self.name);
            return false;
        }
        state.bytes = Some(bytes.to_vec());
        state.clock += 1;
        state.saves += 1;
        true
    }

    fn identifier(&self) -> String {
        self.name.clone()
    }

    fn last_modified(&self) -> Option<SystemTime> {
        let state = self.lock();
        state
            .bytes
            .as_ref()
            .map(|_| UNIX_EPOCH + Duration::from_secs(state.clock))
    }
}
