// SPDX-License-Identifier: Apache-2.0

use clap::{Args, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;

use crate::monitor::config::MonitorConfig;

/// How collected metrics are written out
#[derive(Copy, Clone, Debug, Default, ValueEnum, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Log each metric through the process logger
    #[default]
    Text,
    /// Write one JSON object per metric to stdout
    Json,
}

impl OutputFormat {
    /// Whether process logs must go to stderr to keep stdout free for metrics
    pub fn logs_to_stderr(&self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

#[derive(Debug, Args, Clone)]
pub struct MonitorRun {
    /// Path to the JSON configuration file
    #[arg(long, env = "LOGMON_CONFIG")]
    pub config: PathBuf,

    /// File the read positions are persisted to (overrides the config file)
    #[arg(long, env = "LOGMON_FILE_POINTER_PATH")]
    pub file_pointer_path: Option<PathBuf>,

    /// Seconds between monitoring cycles (overrides the config file)
    #[arg(long, env = "LOGMON_INTERVAL_SECS")]
    pub interval_secs: Option<u64>,

    /// Maximum number of logs scanned at the same time (overrides the config file)
    #[arg(long, env = "LOGMON_MAX_CONCURRENT_LOGS")]
    pub max_concurrent_logs: Option<usize>,

    /// Metric output format
    #[arg(value_enum, long, env = "LOGMON_OUTPUT", default_value = "text")]
    pub output: OutputFormat,

    /// Run a single cycle and exit
    #[arg(long, env = "LOGMON_ONCE", default_value = "false")]
    pub once: bool,
}

impl MonitorRun {
    /// Apply command line overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut MonitorConfig) {
        if let Some(path) = &self.file_pointer_path {
            config.file_pointer_path = path.clone();
        }
        if let Some(secs) = self.interval_secs {
            config.interval_secs = secs;
        }
        if let Some(max) = self.max_concurrent_logs {
            config.max_concurrent_logs = max;
        }
    }
}
