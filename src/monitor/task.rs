// SPDX-License-Identifier: Apache-2.0

//! One monitoring pass over one logical log.
//!
//! resolve file -> lease pointer -> measure -> rotation check ->
//! scan + aggregate -> file size metric -> commit pointer -> deliver events
//!
//! Any failure ends the pass without metrics, without events and without
//! touching the stored pointer, so the next pass starts from the same place.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::monitor::config::LogTarget;
use crate::monitor::error::{Error, Result};
use crate::monitor::events::EventSink;
use crate::monitor::input::{LineScanner, LogFileFinder};
use crate::monitor::metrics::{LogMetrics, MetricAggregator, file_size_metric};
use crate::monitor::normalize::TextNormalizer;
use crate::monitor::pattern::compile_patterns;
use crate::monitor::persistence::PositionStore;
use crate::monitor::rotation;

pub struct LogMonitorTask {
    target: Arc<LogTarget>,
    store: Arc<PositionStore>,
    normalizer: Arc<TextNormalizer>,
    events: Option<Arc<dyn EventSink>>,
}

impl LogMonitorTask {
    pub fn new(
        target: Arc<LogTarget>,
        store: Arc<PositionStore>,
        normalizer: Arc<TextNormalizer>,
    ) -> Self {
        Self {
            target,
            store,
            normalizer,
            events: None,
        }
    }

    /// Send distinct matched values to `events` after each committed pass
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn target(&self) -> &LogTarget {
        &self.target
    }

    /// Scan new lines of the log and return this pass's metrics
    pub fn run(&self) -> Result<LogMetrics> {
        let root = self.target.metric_root();
        let patterns = compile_patterns(&self.target.search_strings)?;

        let finder = LogFileFinder::for_target(&self.target);
        debug!(log = %root, directory = ?finder.directory(), "Log monitor task started");

        let path = finder.find_latest()?;
        let filename = path.display().to_string();

        // Measure the file under the lease so a pass that waited on another
        // one sees the offset that pass committed
        let lease = self.store.lease(&self.target.logical_key(), &filename)?;
        let scanner = LineScanner::open(&path)?;
        let file_size = scanner.len()?;

        let stored = lease.pointer();
        let decision = rotation::decide(&stored.filename, &filename, file_size, stored.offset);
        if decision.is_reset() {
            debug!(
                log = %root,
                previous_file = %stored.filename,
                previous_offset = stored.offset,
                file_size,
                "Filename has either changed or rotated, resetting position to 0"
            );
        }
        let start_offset = decision.offset();

        info!(path = ?path, start_offset, "Processing log file");
        for pattern in &patterns {
            debug!(pattern = pattern.regex().as_str(), "Searching for pattern");
        }

        let mut aggregator = MetricAggregator::new(root, &patterns, &self.normalizer);
        if self.events.is_some() {
            aggregator = aggregator.with_events();
        }

        let end_offset = match scanner.scan_from(start_offset, |line| {
            aggregator.consume_line(line);
            Ok(())
        }) {
            Ok(summary) => {
                debug!(lines = summary.lines, end_offset = summary.end_offset, "Scan complete");
                summary.end_offset
            }
            Err(Error::OffsetBeyondEnd { offset, len }) => {
                // File shrank after it was measured; the next pass resets it
                warn!(
                    path = ?path,
                    offset,
                    len,
                    "Start offset is past end of file, treating as no new lines"
                );
                start_offset
            }
            Err(e) => return Err(e),
        };

        let (mut metrics, events) = aggregator.into_parts();
        if metrics.iter().all(|(_, value)| value == 0) {
            debug!(log = %root, "No matches found");
        }
        metrics.add(file_size_metric(root), file_size);

        lease.commit(&filename, end_offset)?;

        if let Some(sink) = &self.events {
            for event in &events {
                sink.on_match(&event.property_name, &event.property_value);
            }
        }

        info!(path = ?path, end_offset, "Successfully processed log file");
        Ok(metrics)
    }
}
