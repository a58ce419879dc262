// SPDX-License-Identifier: Apache-2.0

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::init::args::{MonitorRun, OutputFormat};
use crate::monitor::config::{MonitorConfig, resolve_path};
use crate::monitor::events::EventQueue;
use crate::monitor::normalize::TextNormalizer;
use crate::monitor::persistence::PositionStore;
use crate::monitor::reporter::{JsonLinesReporter, MetricsReporter, TracingReporter};
use crate::monitor::scheduler::MonitorScheduler;

pub struct Agent {
    args: Box<MonitorRun>,
}

impl Agent {
    pub fn new(args: Box<MonitorRun>) -> Self {
        Self { args }
    }

    /// Load the config file, apply command line overrides and validate
    pub fn load_config(&self) -> Result<MonitorConfig, Box<dyn Error + Send + Sync>> {
        let mut config = MonitorConfig::load(&self.args.config)?;
        self.args.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub async fn run(
        self,
        agent_cancel: CancellationToken,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let config = self.load_config()?;

        info!(
            logs = config.logs.len(),
            interval_secs = config.interval_secs,
            "Starting log monitor."
        );

        let store_path = resolve_path(&config.file_pointer_path);
        let store = Arc::new(PositionStore::open(&store_path)?);
        debug!(path = ?store_path, pointers = store.len(), "Opened file pointer store");

        let normalizer = Arc::new(TextNormalizer::new(&config.metric_character_replacers)?);

        let reporter: Arc<dyn MetricsReporter> = match self.args.output {
            OutputFormat::Text => Arc::new(TracingReporter::new(config.metric_prefix.clone())),
            OutputFormat::Json => Arc::new(JsonLinesReporter::new(
                config.metric_prefix.clone(),
                std::io::stdout(),
            )),
        };

        let events = config
            .custom_events
            .clone()
            .map(|c| Arc::new(EventQueue::new(c)));

        let mut scheduler = MonitorScheduler::new(
            config.logs.clone(),
            store,
            normalizer,
            reporter,
            config.max_concurrent_logs,
        );
        if let Some(queue) = &events {
            scheduler = scheduler.with_events(queue.clone());
        }

        scheduler.prune_positions()?;

        if self.args.once {
            let summary = scheduler.run_cycle().await;
            drain_events(events.as_deref());
            info!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Monitoring cycle complete"
            );
            if summary.failed > 0 {
                return Err(format!(
                    "{} of {} logs failed",
                    summary.failed,
                    summary.failed + summary.succeeded
                )
                .into());
            }
            return Ok(());
        }

        scheduler
            .run(
                Duration::from_secs(config.interval_secs),
                agent_cancel,
                |_| drain_events(events.as_deref()),
            )
            .await;

        info!("Log monitor stopped.");
        Ok(())
    }
}

// Posting events is up to an external transport, so they are only logged here
fn drain_events(queue: Option<&EventQueue>) {
    let Some(queue) = queue else {
        return;
    };

    for url in queue.drain() {
        info!(url = %url, "Custom event");
    }
}
