// SPDX-License-Identifier: Apache-2.0

//! Metric naming and per-invocation match aggregation.
//!
//! Metric names are `/`-joined paths rooted at the log's display name:
//!
//! - `<log>/File size (Bytes)`
//! - `<log>/Search String/<pattern>/Global Seed Count`
//! - `<log>/Search String/<pattern>/Matches/<normalized value>`

use std::collections::{HashMap, HashSet};

use crate::monitor::events::MatchEvent;
use crate::monitor::normalize::TextNormalizer;
use crate::monitor::pattern::SearchPattern;

pub const METRIC_PATH_SEPARATOR: &str = "/";
pub const SEARCH_STRING: &str = "Search String";
pub const GLOBAL_SEED_COUNT: &str = "Global Seed Count";
pub const MATCHES: &str = "Matches";
pub const FILESIZE_METRIC_NAME: &str = "File size (Bytes)";

/// Ordered metric name to value mapping produced by one invocation.
///
/// Keys keep their first insertion position; writing an existing key
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogMetrics {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl LogMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a metric, overwriting any earlier value for the same name
    pub fn add(&mut self, name: impl Into<String>, value: u64) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, value));
            }
        }
    }

    /// Add one to a counter, starting it at 1 if it does not exist yet
    pub fn increment(&mut self, name: &str) {
        let current = self.get(name).unwrap_or(0);
        self.add(name, current.saturating_add(1));
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.index.get(name).map(|&i| self.entries[i].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Metrics in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

/// `<root>/`
pub fn log_prefix(root: &str) -> String {
    format!("{}{}", root, METRIC_PATH_SEPARATOR)
}

/// `<root>/File size (Bytes)`
pub fn file_size_metric(root: &str) -> String {
    format!("{}{}", log_prefix(root), FILESIZE_METRIC_NAME)
}

/// `<root>/Search String/<pattern>/`
fn pattern_prefix(root: &str, pattern: &str) -> String {
    format!(
        "{}{}{sep}{}{sep}",
        log_prefix(root),
        SEARCH_STRING,
        pattern,
        sep = METRIC_PATH_SEPARATOR
    )
}

/// Accumulates match counts for one log over one invocation.
pub struct MetricAggregator<'a> {
    patterns: &'a [SearchPattern],
    normalizer: &'a TextNormalizer,
    /// Distinct matched values, collected only when events are enabled
    events: Option<Vec<MatchEvent>>,
    /// `Global Seed Count` key per pattern, in pattern order
    seed_count_keys: Vec<String>,
    /// `.../Matches/` prefix per pattern, in pattern order
    matches_prefixes: Vec<String>,
    /// (pattern index, value) pairs already collected as events
    notified: HashSet<(usize, String)>,
    metrics: LogMetrics,
}

impl<'a> MetricAggregator<'a> {
    /// Create an aggregator whose `Global Seed Count` counters all start at
    /// zero, so every pattern is reported even without a match.
    pub fn new(root: &str, patterns: &'a [SearchPattern], normalizer: &'a TextNormalizer) -> Self {
        let mut metrics = LogMetrics::new();
        let mut seed_count_keys = Vec::with_capacity(patterns.len());
        let mut matches_prefixes = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            let prefix = pattern_prefix(root, pattern.display_name());
            let seed_key = format!("{}{}", prefix, GLOBAL_SEED_COUNT);
            if !metrics.contains(&seed_key) {
                metrics.add(seed_key.clone(), 0);
            }
            seed_count_keys.push(seed_key);
            matches_prefixes.push(format!("{}{}{}", prefix, MATCHES, METRIC_PATH_SEPARATOR));
        }

        Self {
            patterns,
            normalizer,
            events: None,
            seed_count_keys,
            matches_prefixes,
            notified: HashSet::new(),
            metrics,
        }
    }

    /// Collect each distinct matched value as a [`MatchEvent`]
    pub fn with_events(mut self) -> Self {
        self.events = Some(Vec::new());
        self
    }

    /// Count every match of every pattern in one line
    pub fn consume_line(&mut self, line: &str) {
        for (i, pattern) in self.patterns.iter().enumerate() {
            for matched in pattern.find_iter(line) {
                self.metrics.increment(&self.seed_count_keys[i]);

                if !pattern.print_matched_string() && self.events.is_none() {
                    continue;
                }

                let value = self
                    .normalizer
                    .normalize(matched, pattern.is_case_sensitive());

                if pattern.print_matched_string() {
                    let key = format!("{}{}", self.matches_prefixes[i], value);
                    self.metrics.increment(&key);
                }

                if let Some(events) = self.events.as_mut() {
                    if self.notified.insert((i, value.clone())) {
                        events.push(MatchEvent::new(pattern.display_name(), value));
                    }
                }
            }
        }
    }

    /// Metrics gathered so far
    pub fn metrics(&self) -> &LogMetrics {
        &self.metrics
    }

    pub fn finish(self) -> LogMetrics {
        self.metrics
    }

    /// Metrics plus the pending events, which the caller delivers only once
    /// the pass has been committed
    pub fn into_parts(self) -> (LogMetrics, Vec<MatchEvent>) {
        (self.metrics, self.events.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::config::{Replacer, SearchStringConfig};
    use crate::monitor::pattern::compile_patterns;

    fn search(name: &str, pattern: &str, case_sensitive: bool, print: bool) -> SearchStringConfig {
        SearchStringConfig {
            display_name: name.to_string(),
            pattern: pattern.to_string(),
            case_sensitive,
            match_exact_string: false,
            print_matched_string: print,
        }
    }

    #[test]
    fn test_log_metrics_overwrite_keeps_position() {
        let mut metrics = LogMetrics::new();
        metrics.add("a", 1);
        metrics.add("b", 2);
        metrics.add("a", 3);
        metrics.increment("c");
        metrics.increment("c");

        let entries: Vec<_> = metrics.iter().collect();
        assert_eq!(entries, vec![("a", 3), ("b", 2), ("c", 2)]);
        assert_eq!(metrics.len(), 3);
    }

    #[test]
    fn test_case_sensitive_counting() {
        let patterns = compile_patterns(&[search("ERROR", "ERROR", true, true)]).unwrap();
        let normalizer = TextNormalizer::default();
        let mut aggregator = MetricAggregator::new("app", &patterns, &normalizer);

        for line in ["INFO ok", "ERROR disk full", "ERROR disk full", "error ignored"] {
            aggregator.consume_line(line);
        }

        let metrics = aggregator.finish();
        assert_eq!(
            metrics.get("app/Search String/ERROR/Global Seed Count"),
            Some(2)
        );
        assert_eq!(metrics.get("app/Search String/ERROR/Matches/ERROR"), Some(2));
        assert!(!metrics.contains("app/Search String/ERROR/Matches/error"));
        assert_eq!(metrics.len(), 2);
    }

    #[test]
    fn test_zero_counter_without_matches() {
        let patterns = compile_patterns(&[
            search("Errors", "ERROR", true, true),
            search("Panics", "panic", false, true),
        ])
        .unwrap();
        let normalizer = TextNormalizer::default();
        let aggregator = MetricAggregator::new("app", &patterns, &normalizer);

        let metrics = aggregator.finish();
        let entries: Vec<_> = metrics.iter().collect();
        assert_eq!(
            entries,
            vec![
                ("app/Search String/Errors/Global Seed Count", 0),
                ("app/Search String/Panics/Global Seed Count", 0),
            ]
        );
    }

    #[test]
    fn test_normalized_and_title_cased_matches() {
        let patterns = compile_patterns(&[search("Disk", "disk \\w+", false, true)]).unwrap();
        let normalizer = TextNormalizer::new(&[Replacer {
            replace: "Disk".to_string(),
            replace_with: "Storage".to_string(),
        }])
        .unwrap();
        let mut aggregator = MetricAggregator::new("app", &patterns, &normalizer);

        aggregator.consume_line("WARN Disk Full on sda");
        aggregator.consume_line("WARN disk full on sdb");

        let metrics = aggregator.finish();
        // Replacers are case-sensitive, so only the first match is rewritten
        assert_eq!(
            metrics.get("app/Search String/Disk/Matches/Storage Full"),
            Some(1)
        );
        assert_eq!(
            metrics.get("app/Search String/Disk/Matches/Disk Full"),
            Some(1)
        );
        assert_eq!(
            metrics.get("app/Search String/Disk/Global Seed Count"),
            Some(2)
        );
    }

    #[test]
    fn test_multiple_matches_per_line() {
        let patterns = compile_patterns(&[search("Codes", r"E\d+", true, true)]).unwrap();
        let normalizer = TextNormalizer::default();
        let mut aggregator = MetricAggregator::new("app", &patterns, &normalizer);

        aggregator.consume_line("E1 E2 E1");

        let metrics = aggregator.metrics();
        assert_eq!(metrics.get("app/Search String/Codes/Global Seed Count"), Some(3));
        assert_eq!(metrics.get("app/Search String/Codes/Matches/E1"), Some(2));
        assert_eq!(metrics.get("app/Search String/Codes/Matches/E2"), Some(1));
    }

    #[test]
    fn test_print_matched_string_disabled() {
        let patterns = compile_patterns(&[search("Errors", "ERROR", true, false)]).unwrap();
        let normalizer = TextNormalizer::default();
        let mut aggregator = MetricAggregator::new("app", &patterns, &normalizer);

        aggregator.consume_line("ERROR ERROR");

        let metrics = aggregator.finish();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics.get("app/Search String/Errors/Global Seed Count"), Some(2));
    }

    #[test]
    fn test_empty_match_produces_degenerate_metric() {
        let patterns = compile_patterns(&[search("Spaces", r"\s+", true, true)]).unwrap();
        let normalizer = TextNormalizer::default();
        let mut aggregator = MetricAggregator::new("app", &patterns, &normalizer);

        aggregator.consume_line("a b");

        let metrics = aggregator.finish();
        assert_eq!(metrics.get("app/Search String/Spaces/Matches/"), Some(1));
    }

    #[test]
    fn test_events_collected_once_per_distinct_value() {
        let patterns = compile_patterns(&[search("Errors", "error", false, false)]).unwrap();
        let normalizer = TextNormalizer::default();
        let mut aggregator = MetricAggregator::new("app", &patterns, &normalizer).with_events();

        aggregator.consume_line("ERROR one");
        aggregator.consume_line("error two");
        aggregator.consume_line("Error three");

        let (metrics, events) = aggregator.into_parts();
        assert_eq!(metrics.get("app/Search String/Errors/Global Seed Count"), Some(3));
        assert_eq!(events, vec![MatchEvent::new("Errors", "Error")]);
    }

    #[test]
    fn test_no_events_collected_when_disabled() {
        let patterns = compile_patterns(&[search("Errors", "ERROR", true, true)]).unwrap();
        let normalizer = TextNormalizer::default();
        let mut aggregator = MetricAggregator::new("app", &patterns, &normalizer);

        aggregator.consume_line("ERROR one");

        let (_, events) = aggregator.into_parts();
        assert!(events.is_empty());
    }

    #[test]
    fn test_metric_names() {
        assert_eq!(file_size_metric("app"), "app/File size (Bytes)");
        assert_eq!(log_prefix("app"), "app/");
    }
}
