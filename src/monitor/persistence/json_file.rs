// SPDX-License-Identifier: Apache-2.0

//! JSON file storage with atomic writes.
//!
//! Writes go to a temp file in the same directory, are fsynced, and are then
//! renamed over the target, so a reader only ever sees a complete document.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::monitor::error::{Error, Result};

/// Read a JSON document, returning `None` when the file does not exist.
/// A file that exists but does not parse is an error, never an empty state.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path).map_err(|e| {
        Error::StoreUnavailable(format!("failed to open {:?}: {}", path, e))
    })?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map(Some).map_err(|e| {
        Error::StoreUnavailable(format!(
            "{:?} is corrupted and cannot be loaded: {}. \
             To start fresh, delete the file and restart.",
            path, e
        ))
    })
}

/// Write a JSON document atomically (write to temp, fsync, rename)
pub fn atomic_write<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::StoreUnavailable(format!("failed to create parent directory: {}", e))
            })?;
        }
    }

    // Process id plus a counter keeps concurrent writers off each other's temp files
    let unique_id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let temp_path = path.with_extension(format!("tmp.{}.{}", std::process::id(), unique_id));

    let result = write_temp(&temp_path, value).and_then(|()| {
        fs::rename(&temp_path, path)
            .map_err(|e| Error::StoreUnavailable(format!("failed to rename state file: {}", e)))
    });

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
        return result;
    }

    sync_parent_dir(path);
    Ok(())
}

fn write_temp<T: Serialize>(temp_path: &Path, value: &T) -> Result<()> {
    let file = File::create(temp_path)
        .map_err(|e| Error::StoreUnavailable(format!("failed to create temp file: {}", e)))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| Error::StoreUnavailable(format!("failed to write state: {}", e)))?;
    writer
        .flush()
        .map_err(|e| Error::StoreUnavailable(format!("failed to flush state: {}", e)))?;

    let file = writer
        .into_inner()
        .map_err(|e| Error::StoreUnavailable(format!("failed to flush state: {}", e)))?;
    file.sync_all()
        .map_err(|e| Error::StoreUnavailable(format!("failed to sync state: {}", e)))
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    // Makes the rename itself durable
    if let Some(parent) = path.parent() {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}
