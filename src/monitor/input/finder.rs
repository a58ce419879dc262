// SPDX-License-Identifier: Apache-2.0

use glob::{MatchOptions, Pattern};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

use crate::monitor::config::LogTarget;
use crate::monitor::error::{Error, Result};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// LogFileFinder resolves a directory plus wildcard file name to the file a
/// logical log currently lives in
#[derive(Debug, Clone)]
pub struct LogFileFinder {
    directory: PathBuf,
    pattern: String,
}

impl LogFileFinder {
    /// Create a new LogFileFinder for the given directory and wildcard
    pub fn new(directory: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            pattern: pattern.into(),
        }
    }

    pub fn for_target(target: &LogTarget) -> Self {
        Self::new(target.resolved_directory(), target.log_name.clone())
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Find all regular files in the directory whose name matches the
    /// wildcard, sorted by file name
    pub fn find_files(&self) -> Result<Vec<PathBuf>> {
        if !self.directory.is_dir() {
            return Err(Error::DirectoryNotFound(self.directory.clone()));
        }

        let pattern = Pattern::new(&self.pattern).map_err(|e| {
            Error::InvalidGlob(format!("{:?}: {}", self.pattern, e))
        })?;

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.directory)? {
            let entry = entry?;

            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !pattern.matches_with(name, MATCH_OPTIONS) {
                continue;
            }

            // Skip directories, follow symlinks to files
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            paths.push(path);
        }

        paths.sort();
        Ok(paths)
    }

    /// Find the most recently modified matching file.
    /// Ties go to the first file in name order.
    pub fn find_latest(&self) -> Result<PathBuf> {
        let mut latest: Option<(PathBuf, SystemTime)> = None;

        for path in self.find_files()? {
            let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    debug!(path = ?path, error = %e, "Unable to read modification time, skipping");
                    continue;
                }
            };

            let newer = match &latest {
                Some((_, latest_modified)) => modified > *latest_modified,
                None => true,
            };
            if newer {
                latest = Some((path, modified));
            }
        }

        latest.map(|(path, _)| path).ok_or_else(|| Error::FileNotFound {
            dir: self.directory.clone(),
            pattern: self.pattern.clone(),
        })
    }
}
