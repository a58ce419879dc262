// SPDX-License-Identifier: Apache-2.0

use regex::{Regex, RegexBuilder};

use crate::monitor::config::SearchStringConfig;
use crate::monitor::error::{Error, Result};

/// A compiled search string ready to run against log lines.
#[derive(Debug, Clone)]
pub struct SearchPattern {
    regex: Regex,
    display_name: String,
    case_sensitive: bool,
    print_matched_string: bool,
}

impl SearchPattern {
    /// Compile a single search string.
    ///
    /// Case-insensitive patterns use the regex case-folding flag instead of
    /// lower-casing the input, so matched text keeps its original casing.
    pub fn compile(config: &SearchStringConfig) -> Result<Self> {
        let source = if config.match_exact_string {
            format!(r"\b(?:{})\b", config.pattern)
        } else {
            config.pattern.clone()
        };

        let regex = RegexBuilder::new(&source)
            .case_insensitive(!config.case_sensitive)
            .build()
            .map_err(|e| {
                Error::Config(format!(
                    "invalid regex pattern {:?} for {:?}: {}",
                    config.pattern, config.display_name, e
                ))
            })?;

        Ok(Self {
            regex,
            display_name: config.display_name.clone(),
            case_sensitive: config.case_sensitive,
            print_matched_string: config.print_matched_string,
        })
    }

    /// Get a reference to the underlying regex
    pub fn regex(&self) -> &Regex {
        &self.regex
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    pub fn print_matched_string(&self) -> bool {
        self.print_matched_string
    }

    /// Leftmost, non-overlapping matches within a line
    pub fn find_iter<'l>(&'l self, line: &'l str) -> impl Iterator<Item = &'l str> + 'l {
        self.regex.find_iter(line).map(|m| m.as_str())
    }
}

/// Compile search strings in configuration order.
/// The first pattern that fails to compile fails the whole list.
pub fn compile_patterns(configs: &[SearchStringConfig]) -> Result<Vec<SearchPattern>> {
    configs.iter().map(SearchPattern::compile).collect()
}
