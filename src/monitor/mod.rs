// SPDX-License-Identifier: Apache-2.0

//! Log monitor engine.
//!
//! Each configured log is a directory plus a wildcard file name. On every
//! pass the monitor:
//!
//! 1. resolves the wildcard to the most recently modified file,
//! 2. loads the stored read position for the log and resets it when the
//!    file was rotated or truncated,
//! 3. scans the new lines, counting regex matches per search string and per
//!    distinct normalized matched value,
//! 4. reports the counts together with the current file size, and
//! 5. persists the new position so the next pass resumes after it.
//!
//! Positions are stored in a single JSON document written atomically, so a
//! crash between steps leaves either the old or the new position on disk.

pub mod config;
pub mod error;
pub mod events;
pub mod input;
pub mod metrics;
pub mod normalize;
pub mod pattern;
pub mod persistence;
pub mod reporter;
pub mod rotation;
pub mod scheduler;
pub mod task;

pub use config::{LogTarget, MonitorConfig, Replacer, SearchStringConfig};
pub use error::{Error, Result};
pub use metrics::LogMetrics;
pub use persistence::PositionStore;
pub use scheduler::{CycleSummary, MonitorScheduler};
pub use task::LogMonitorTask;
