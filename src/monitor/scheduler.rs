// SPDX-License-Identifier: Apache-2.0

//! Runs one monitoring pass per configured log on a fixed interval.
//!
//! Passes do blocking file I/O, so each one runs on the blocking pool. A
//! semaphore bounds how many logs are scanned at once. Passes for the same
//! logical log never overlap: cycles are sequential, and the position store
//! serializes pointer access per key on top of that.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::select;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::monitor::config::LogTarget;
use crate::monitor::error::Result;
use crate::monitor::events::EventSink;
use crate::monitor::normalize::TextNormalizer;
use crate::monitor::persistence::PositionStore;
use crate::monitor::reporter::MetricsReporter;
use crate::monitor::task::LogMonitorTask;

/// Outcome counts of one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct MonitorScheduler {
    targets: Vec<Arc<LogTarget>>,
    store: Arc<PositionStore>,
    normalizer: Arc<TextNormalizer>,
    reporter: Arc<dyn MetricsReporter>,
    events: Option<Arc<dyn EventSink>>,
    max_concurrent_logs: usize,
}

impl MonitorScheduler {
    pub fn new(
        targets: Vec<LogTarget>,
        store: Arc<PositionStore>,
        normalizer: Arc<TextNormalizer>,
        reporter: Arc<dyn MetricsReporter>,
        max_concurrent_logs: usize,
    ) -> Self {
        Self {
            targets: targets.into_iter().map(Arc::new).collect(),
            store,
            normalizer,
            reporter,
            events: None,
            max_concurrent_logs: max_concurrent_logs.max(1),
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Drop stored pointers of logs that are no longer configured
    pub fn prune_positions(&self) -> Result<usize> {
        let keys: HashSet<String> = self.targets.iter().map(|t| t.logical_key()).collect();
        self.store.retain(|key| keys.contains(key))
    }

    /// Run every configured log once and report the metrics of each
    /// successful pass. A failing log never stops the others.
    pub async fn run_cycle(&self) -> CycleSummary {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_logs));
        let mut tasks = JoinSet::new();
        let mut summary = CycleSummary::default();

        for target in &self.targets {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!(error = %e, "Worker pool closed, skipping remaining logs");
                    break;
                }
            };

            let mut task =
                LogMonitorTask::new(target.clone(), self.store.clone(), self.normalizer.clone());
            if let Some(events) = &self.events {
                task = task.with_events(events.clone());
            }

            debug!(log = %target.metric_root(), "Spawning log monitor task");
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let name = task.target().metric_root().to_string();
                (name, task.run())
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(metrics))) => match self.reporter.report(&metrics) {
                    Ok(()) => summary.succeeded += 1,
                    Err(e) => {
                        error!(error = %e, "Failed to report metrics");
                        summary.failed += 1;
                    }
                },
                Ok((name, Err(e))) => {
                    error!(log = %name, error = %e, "Error in log monitor task");
                    summary.failed += 1;
                }
                Err(e) => {
                    error!(error = %e, "Log monitor task panicked");
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    /// Run cycles every `interval` until `cancel` fires. `after_cycle` sees
    /// each cycle's summary once all of its passes have finished.
    pub async fn run<F>(&self, interval: Duration, cancel: CancellationToken, mut after_cycle: F)
    where
        F: FnMut(&CycleSummary),
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Monitor scheduler cancelled");
                    break;
                }

                _ = ticker.tick() => {
                    let summary = self.run_cycle().await;
                    info!(
                        succeeded = summary.succeeded,
                        failed = summary.failed,
                        "Monitoring cycle complete"
                    );
                    after_cycle(&summary);
                }
            }
        }
    }
}
