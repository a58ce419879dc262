// SPDX-License-Identifier: Apache-2.0

//! Configuration for the log monitor.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Json};
use serde::Deserialize;

use crate::monitor::error::{Error, Result};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "LOGMON_";

/// A single search string to look for in a log
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SearchStringConfig {
    /// Name used as the metric path segment for this pattern
    pub display_name: String,
    /// Regular expression to search for
    pub pattern: String,
    /// Match case exactly. When false the pattern is compiled case-insensitive
    /// and distinct matches are title-cased.
    #[serde(default)]
    pub case_sensitive: bool,
    /// Only match the pattern as a whole word
    #[serde(default)]
    pub match_exact_string: bool,
    /// Emit a separate counter for every distinct matched value
    #[serde(default = "default_print_matched_string")]
    pub print_matched_string: bool,
}

fn default_print_matched_string() -> bool {
    true
}

/// A logical log: a directory plus a wildcard file name
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LogTarget {
    /// Name used as the root of this log's metric paths
    #[serde(default)]
    pub display_name: Option<String>,
    /// Directory that holds the log and its rotated siblings
    pub log_directory: PathBuf,
    /// Wildcard file name, e.g. `app*.log`
    pub log_name: String,
    /// Patterns to count, in reporting order
    #[serde(default)]
    pub search_strings: Vec<SearchStringConfig>,
}

impl LogTarget {
    /// Name at the root of every metric emitted for this log.
    /// Falls back to the wildcard file name when no display name is set.
    pub fn metric_root(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.log_name,
        }
    }

    /// The log directory with `~/` and relative paths resolved
    pub fn resolved_directory(&self) -> PathBuf {
        resolve_path(&self.log_directory)
    }

    /// Key identifying this logical log in the position store.
    /// Uses the wildcard, not the file it currently resolves to.
    pub fn logical_key(&self) -> String {
        self.resolved_directory()
            .join(&self.log_name)
            .display()
            .to_string()
    }
}

/// An ordered text replacement applied to matched values
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Replacer {
    /// Regular expression to replace
    pub replace: String,
    /// Replacement text (`$1` style group references are allowed)
    #[serde(default)]
    pub replace_with: String,
}

/// Controller connection and event parameters for match notifications
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CustomEventsConfig {
    pub controller_host: String,
    #[serde(default = "default_controller_port")]
    pub controller_port: u16,
    pub application_id: String,
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default = "default_custom_event_type")]
    pub custom_event_type: String,
}

fn default_controller_port() -> u16 {
    8090
}

fn default_severity() -> String {
    "INFO".to_string()
}

fn default_custom_event_type() -> String {
    "LogMonitor".to_string()
}

/// Configuration for the log monitor
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Logical logs to monitor
    pub logs: Vec<LogTarget>,
    /// Replacement rules for matched values, applied in order
    pub metric_character_replacers: Vec<Replacer>,
    /// Prefix prepended to every metric name when reporting
    pub metric_prefix: String,
    /// Path of the persisted read positions
    pub file_pointer_path: PathBuf,
    /// Seconds between monitoring cycles
    pub interval_secs: u64,
    /// Maximum number of logs scanned at the same time
    pub max_concurrent_logs: usize,
    /// Optional controller events for matches
    pub custom_events: Option<CustomEventsConfig>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            logs: Vec::new(),
            metric_character_replacers: Vec::new(),
            metric_prefix: "Custom Metrics/Log Monitor".to_string(),
            file_pointer_path: PathBuf::from("/var/lib/logmon/filepointers.json"),
            interval_secs: 60,
            max_concurrent_logs: 4,
            custom_events: None,
        }
    }
}

impl MonitorConfig {
    /// Load the configuration from a JSON file, with `LOGMON_` environment
    /// variables layered on top (nested keys separated by `__`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::Config(format!(
                "configuration file {:?} does not exist",
                path
            )));
        }

        Figment::new()
            .merge(Json::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| Error::Config(format!("failed to load {:?}: {}", path, e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.logs.is_empty() {
            return Err("At least one log must be configured".to_string());
        }

        // Logs sharing a key would share one stored position
        let mut keys = HashSet::new();
        for log in &self.logs {
            if log.log_name.trim().is_empty() {
                return Err(format!(
                    "log in directory {:?} has an empty log_name",
                    log.log_directory
                ));
            }
            if log.log_directory.as_os_str().is_empty() {
                return Err(format!("log {:?} has an empty log_directory", log.log_name));
            }
            let key = log.logical_key();
            if !keys.insert(key.clone()) {
                return Err(format!("log {:?} is configured more than once", key));
            }
            for search in &log.search_strings {
                if search.display_name.trim().is_empty() {
                    return Err(format!(
                        "search string {:?} in log {:?} has an empty display_name",
                        search.pattern,
                        log.metric_root()
                    ));
                }
            }
        }

        if self.interval_secs == 0 {
            return Err("interval_secs must be greater than zero".to_string());
        }

        if self.max_concurrent_logs == 0 {
            return Err("max_concurrent_logs must be greater than zero".to_string());
        }

        Ok(())
    }
}

/// Expand a leading `~/` and make relative paths absolute against the
/// working directory.
pub fn resolve_path(path: &Path) -> PathBuf {
    let expanded = match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    };

    if expanded.is_absolute() {
        return expanded;
    }

    match std::env::current_dir() {
        Ok(cwd) => cwd.join(expanded),
        Err(_) => expanded,
    }
}
