// SPDX-License-Identifier: Apache-2.0

//! Durable, per-key serialized storage of read positions.
//!
//! Each logical log owns one [`FilePointer`]. A scan takes a [`PointerLease`]
//! for its log, which holds the key's in-flight slot until it is committed or
//! dropped: no two scans of the same logical log ever overlap, while leases
//! for different keys proceed in parallel. Every mutation is written to disk
//! (atomic replace, fsynced) before the call returns; a failed write leaves
//! the previous pointer in place.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard};

use tracing::{debug, info};

use super::json_file::{atomic_write, read_json};
use super::schema::{FilePointer, PERSISTED_STATE_VERSION, PersistedStateV1};
use crate::monitor::error::{Error, Result};

pub struct PositionStore {
    /// Backing file, `None` for an in-memory store
    path: Option<PathBuf>,
    state: Mutex<PersistedStateV1>,
    /// Logical keys with a lease currently held
    in_flight: Mutex<HashSet<String>>,
    released: Condvar,
}

impl PositionStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let state = match read_json::<PersistedStateV1>(&path)? {
            Some(state) => {
                if state.version != PERSISTED_STATE_VERSION {
                    return Err(Error::StoreUnavailable(format!(
                        "{:?} has unsupported schema version {}",
                        path, state.version
                    )));
                }
                debug!(
                    path = ?path,
                    pointers = state.pointers.len(),
                    "Loaded persisted file pointers"
                );
                state
            }
            None => {
                debug!(path = ?path, "No persisted file pointers found, starting fresh");
                PersistedStateV1::default()
            }
        };

        Ok(Self::with_state(Some(path), state))
    }

    /// Create an in-memory store (useful for testing)
    pub fn open_memory() -> Self {
        Self::with_state(None, PersistedStateV1::default())
    }

    fn with_state(path: Option<PathBuf>, state: PersistedStateV1) -> Self {
        Self {
            path,
            state: Mutex::new(state),
            in_flight: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of logical logs with a stored pointer
    pub fn len(&self) -> usize {
        self.lock_state().map(|s| s.pointers.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the stored pointer without creating one or taking the key lock
    pub fn peek(&self, key: &str) -> Option<FilePointer> {
        self.lock_state()
            .ok()
            .and_then(|s| s.pointers.get(key).cloned())
    }

    /// Take exclusive ownership of a logical log's pointer for the length of
    /// a scan. Blocks while another lease for the same key is held.
    ///
    /// When the key has never been seen a `{current_path, 0}` pointer is
    /// created and persisted first.
    ///
    /// Taking a second lease for a key on the thread that already holds one
    /// deadlocks.
    pub fn lease(&self, key: &str, current_path: &str) -> Result<PointerLease<'_>> {
        let guard = self.lock_key(key)?;

        let existing = self.lock_state()?.pointers.get(key).cloned();
        let pointer = match existing {
            Some(pointer) => pointer,
            None => {
                let pointer = FilePointer::new(current_path, 0);
                self.write_pointer(key, pointer.clone())?;
                pointer
            }
        };

        Ok(PointerLease {
            store: self,
            _guard: guard,
            key: key.to_string(),
            pointer,
        })
    }

    /// Return the stored pointer for `key`, creating and persisting a fresh
    /// one at offset 0 if none exists.
    pub fn get_pointer(&self, key: &str, current_path: &str) -> Result<FilePointer> {
        self.lease(key, current_path)
            .map(|lease| lease.pointer().clone())
    }

    /// Replace the stored filename and offset for `key` and persist it
    pub fn update_pointer(&self, key: &str, filename: &str, offset: u64) -> Result<()> {
        let _guard = self.lock_key(key)?;
        self.write_pointer(key, FilePointer::new(filename, offset))
    }

    /// Drop pointers whose key no longer belongs to a configured log.
    /// Returns the number of removed pointers.
    pub fn retain<F>(&self, mut keep: F) -> Result<usize>
    where
        F: FnMut(&str) -> bool,
    {
        let mut state = self.lock_state()?;
        let before = state.pointers.clone();
        state.pointers.retain(|key, _| keep(key.as_str()));

        let removed = before.len() - state.pointers.len();
        if removed == 0 {
            return Ok(0);
        }

        if let Err(e) = self.persist(&state) {
            state.pointers = before;
            return Err(e);
        }

        info!(removed, "Removed file pointers for logs no longer configured");
        Ok(removed)
    }

    fn write_pointer(&self, key: &str, pointer: FilePointer) -> Result<()> {
        let mut state = self.lock_state()?;
        let previous = state.pointers.insert(key.to_string(), pointer);

        if let Err(e) = self.persist(&state) {
            match previous {
                Some(previous) => state.pointers.insert(key.to_string(), previous),
                None => state.pointers.remove(key),
            };
            return Err(e);
        }

        Ok(())
    }

    fn persist(&self, state: &PersistedStateV1) -> Result<()> {
        match &self.path {
            Some(path) => atomic_write(path, state),
            None => Ok(()),
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, PersistedStateV1>> {
        self.state
            .lock()
            .map_err(|e| Error::StoreUnavailable(format!("state lock poisoned: {}", e)))
    }

    fn lock_key(&self, key: &str) -> Result<KeyGuard<'_>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|e| Error::StoreUnavailable(format!("key lock poisoned: {}", e)))?;

        while in_flight.contains(key) {
            in_flight = self
                .released
                .wait(in_flight)
                .map_err(|e| Error::StoreUnavailable(format!("key lock poisoned: {}", e)))?;
        }
        in_flight.insert(key.to_string());

        Ok(KeyGuard {
            store: self,
            key: key.to_string(),
        })
    }
}

/// Releases a key's in-flight slot on drop
struct KeyGuard<'a> {
    store: &'a PositionStore,
    key: String,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = match self.store.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        in_flight.remove(&self.key);
        self.store.released.notify_all();
    }
}

/// Exclusive access to one logical log's pointer.
///
/// Dropping the lease without committing leaves the stored pointer as it was.
pub struct PointerLease<'a> {
    store: &'a PositionStore,
    _guard: KeyGuard<'a>,
    key: String,
    pointer: FilePointer,
}

impl PointerLease<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The pointer as stored when the lease was taken
    pub fn pointer(&self) -> &FilePointer {
        &self.pointer
    }

    /// Persist the new position and release the key
    pub fn commit(self, filename: &str, offset: u64) -> Result<()> {
        self.store
            .write_pointer(&self.key, FilePointer::new(filename, offset))
    }
}
