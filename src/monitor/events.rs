// SPDX-License-Identifier: Apache-2.0

//! Custom controller events raised when a search pattern matches.
//!
//! The aggregator only collects [`MatchEvent`]s. A monitoring pass hands them
//! to an [`EventSink`] once its read position is committed, so a failed pass
//! emits nothing. [`EventQueue`] turns them into controller event URLs and
//! holds them until the caller drains the queue and hands them to whatever
//! transport posts them.

use std::sync::Mutex;

use tracing::warn;
use url::Url;

use crate::monitor::config::CustomEventsConfig;
use crate::monitor::error::{Error, Result};

/// Controller REST path up to the application id
pub const CONTROLLER_EVENTS_ENDPOINT: &str = "/controller/rest/applications/";

/// Event type posted for every match
pub const EVENT_TYPE: &str = "CUSTOM";

/// A distinct matched value of one search string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEvent {
    pub property_name: String,
    pub property_value: String,
}

impl MatchEvent {
    pub fn new(property_name: impl Into<String>, property_value: impl Into<String>) -> Self {
        Self {
            property_name: property_name.into(),
            property_value: property_value.into(),
        }
    }
}

/// Receives one notification per distinct matched value
pub trait EventSink: Send + Sync {
    fn on_match(&self, property_name: &str, property_value: &str);
}

/// Build the controller URL for a match event
pub fn event_url(
    config: &CustomEventsConfig,
    property_name: &str,
    property_value: &str,
) -> Result<Url> {
    let base = format!(
        "http://{}:{}{}{}/events",
        config.controller_host,
        config.controller_port,
        CONTROLLER_EVENTS_ENDPOINT,
        config.application_id
    );

    let mut url = Url::parse(&base)
        .map_err(|e| Error::Config(format!("invalid controller url {:?}: {}", base, e)))?;
    url.query_pairs_mut()
        .append_pair("severity", &config.severity)
        .append_pair(
            "summary",
            &format!("Match Found in {} : {}", property_name, property_value),
        )
        .append_pair("eventtype", EVENT_TYPE)
        .append_pair("customeventtype", &config.custom_event_type);

    Ok(url)
}

/// Pending event URLs, owned by the caller of the monitor
pub struct EventQueue {
    config: CustomEventsConfig,
    pending: Mutex<Vec<Url>>,
}

impl EventQueue {
    pub fn new(config: CustomEventsConfig) -> Self {
        Self {
            config,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Take every queued event, leaving the queue empty
    pub fn drain(&self) -> Vec<Url> {
        match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for EventQueue {
    fn on_match(&self, property_name: &str, property_value: &str) {
        let url = match event_url(&self.config, property_name, property_value) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Failed to build custom event");
                return;
            }
        };

        match self.pending.lock() {
            Ok(mut pending) => pending.push(url),
            Err(poisoned) => poisoned.into_inner().push(url),
        }
    }
}
