// SPDX-License-Identifier: Apache-2.0

//! Destinations for the metrics produced by each monitoring pass.

use std::io::Write;
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::info;

use crate::monitor::error::{Error, Result};
use crate::monitor::metrics::{LogMetrics, METRIC_PATH_SEPARATOR};

/// Accepts the metrics of one successful invocation
pub trait MetricsReporter: Send + Sync {
    fn report(&self, metrics: &LogMetrics) -> Result<()>;
}

fn full_name(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        return name.to_string();
    }
    format!(
        "{}{}{}",
        prefix.trim_end_matches(METRIC_PATH_SEPARATOR),
        METRIC_PATH_SEPARATOR,
        name
    )
}

/// Logs every metric as an `info` event
pub struct TracingReporter {
    prefix: String,
}

impl TracingReporter {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl MetricsReporter for TracingReporter {
    fn report(&self, metrics: &LogMetrics) -> Result<()> {
        for (name, value) in metrics.iter() {
            info!(metric = %full_name(&self.prefix, name), value, "Metric");
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct MetricLine<'a> {
    timestamp: &'a str,
    name: String,
    value: u64,
}

/// Writes one JSON object per metric and line
pub struct JsonLinesReporter<W> {
    prefix: String,
    out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesReporter<W> {
    pub fn new(prefix: impl Into<String>, out: W) -> Self {
        Self {
            prefix: prefix.into(),
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> MetricsReporter for JsonLinesReporter<W> {
    fn report(&self, metrics: &LogMetrics) -> Result<()> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut out = self
            .out
            .lock()
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;

        for (name, value) in metrics.iter() {
            let line = MetricLine {
                timestamp: &timestamp,
                name: full_name(&self.prefix, name),
                value,
            };
            serde_json::to_writer(&mut *out, &line)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }
}
