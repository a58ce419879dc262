// SPDX-License-Identifier: Apache-2.0

//! Persistence schema for read positions.
//!
//! v1 layout:
//! `{"version": 1, "pointers": {"<logical key>": {"filename": "...", "offset": N}}}`

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Current schema version for persisted state
pub const PERSISTED_STATE_VERSION: u8 = 1;

/// Persisted pointers for all logical logs (v1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedStateV1 {
    /// Schema version (always 1 for this format)
    pub version: u8,
    /// Map from logical log key to its pointer. Sorted so rewrites of the
    /// file are stable and diffable.
    #[serde(default)]
    pub pointers: BTreeMap<String, FilePointer>,
}

impl Default for PersistedStateV1 {
    fn default() -> Self {
        Self {
            version: PERSISTED_STATE_VERSION,
            pointers: BTreeMap::new(),
        }
    }
}

/// Where the last scan of a logical log stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePointer {
    /// Resolved file the offset belongs to
    pub filename: String,
    /// Byte offset immediately after the last line read
    pub offset: u64,
}

impl FilePointer {
    pub fn new(filename: impl Into<String>, offset: u64) -> Self {
        Self {
            filename: filename.into(),
            offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persisted_state_v1_default() {
        let state = PersistedStateV1::default();
        assert_eq!(state.version, PERSISTED_STATE_VERSION);
        assert!(state.pointers.is_empty());
    }

    #[test]
    fn test_reads_document_without_pointers() {
        let state: PersistedStateV1 = serde_json::from_str(r#"{"version": 1}"#).unwrap();
        assert!(state.pointers.is_empty());
    }

    #[test]
    fn test_human_readable_layout() {
        let mut state = PersistedStateV1::default();
        state.pointers.insert(
            "/var/log/app*.log".to_string(),
            FilePointer::new("/var/log/app-2.log", 120),
        );

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(
            json["pointers"]["/var/log/app*.log"]["filename"],
            "/var/log/app-2.log"
        );
        assert_eq!(json["pointers"]["/var/log/app*.log"]["offset"], 120);
    }
}
