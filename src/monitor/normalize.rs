// SPDX-License-Identifier: Apache-2.0

//! Normalization of matched text before it becomes a metric path segment.

use regex::Regex;

use crate::monitor::config::Replacer;
use crate::monitor::error::{Error, Result};

/// Ordered replacement rules applied to matched values.
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    rules: Vec<(Regex, String)>,
}

impl TextNormalizer {
    /// Compile replacement rules, keeping their configured order
    pub fn new(replacers: &[Replacer]) -> Result<Self> {
        let rules = replacers
            .iter()
            .map(|r| {
                Regex::new(&r.replace)
                    .map(|regex| (regex, r.replace_with.clone()))
                    .map_err(|e| {
                        Error::Config(format!("invalid replacer pattern {:?}: {}", r.replace, e))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every replacement rule in order, each to the output of the last
    pub fn apply_replacers(&self, text: &str) -> String {
        let mut out = text.to_string();
        for (regex, replacement) in &self.rules {
            out = regex.replace_all(&out, replacement.as_str()).into_owned();
        }
        out
    }

    /// Produce the metric segment for a matched value: trim, replace, and
    /// title-case unless the pattern is case-sensitive.
    pub fn normalize(&self, matched: &str, case_sensitive: bool) -> String {
        let replaced = self.apply_replacers(matched.trim());
        if case_sensitive {
            replaced
        } else {
            title_case(&replaced)
        }
    }
}

/// Lower-case everything, then upper-case the first character of every
/// whitespace separated word.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut word_start = true;

    for c in text.chars() {
        if c.is_whitespace() {
            word_start = true;
            out.push(c);
        } else if word_start {
            word_start = false;
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replacer(replace: &str, replace_with: &str) -> Replacer {
        Replacer {
            replace: replace.to_string(),
            replace_with: replace_with.to_string(),
        }
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("disk FULL"), "Disk Full");
        assert_eq!(title_case("  two  spaces"), "  Two  Spaces");
        assert_eq!(title_case(""), "");
        assert_eq!(title_case("o'NEIL-smith"), "O'neil-smith");
    }

    #[test]
    fn test_replacement_then_title_case() {
        let normalizer = TextNormalizer::new(&[replacer("Disk", "Storage")]).unwrap();
        assert_eq!(normalizer.normalize("Disk Full", false), "Storage Full");
    }

    #[test]
    fn test_case_sensitive_skips_title_case() {
        let normalizer = TextNormalizer::new(&[replacer("Disk", "Storage")]).unwrap();
        assert_eq!(normalizer.normalize(" Disk FULL ", true), "Storage FULL");
    }

    #[test]
    fn test_rules_apply_in_order() {
        let normalizer =
            TextNormalizer::new(&[replacer("a", "b"), replacer("b", "c"), replacer(r"\|", "-")])
                .unwrap();
        assert_eq!(normalizer.apply_replacers("a|b"), "c-c");
        assert_eq!(normalizer.len(), 3);
    }

    #[test]
    fn test_group_references_in_replacement() {
        let normalizer = TextNormalizer::new(&[replacer(r"user=(\w+)", "user:$1")]).unwrap();
        assert_eq!(normalizer.apply_replacers("user=bob"), "user:bob");
    }

    #[test]
    fn test_empty_match_still_normalizes() {
        let normalizer = TextNormalizer::default();
        assert!(normalizer.is_empty());
        assert_eq!(normalizer.normalize("   ", false), "");
    }

    #[test]
    fn test_invalid_replacer() {
        let err = TextNormalizer::new(&[replacer("(", "x")]).unwrap_err();
        assert!(err.is_configuration());
    }
}
