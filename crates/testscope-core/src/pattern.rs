//! Impacted test titles → one title filter.
//!
//! Runtime test identifiers are hierarchical ("suite > nested > title") and
//! only the trailing title is recorded verbatim, so the pattern is anchored
//! at the end only. An identifier that ends in a longer string whose suffix
//! is an impacted title also matches; that over-selection is accepted.

use std::collections::BTreeSet;
use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::error::Result;

/// Compiled-size budget per byte of pattern source. The regex default
/// (10 MiB total) is kept as the floor.
const SIZE_LIMIT_PER_BYTE: usize = 512;
const MIN_SIZE_LIMIT: usize = 10 * (1 << 20);
const MIN_DFA_SIZE_LIMIT: usize = 2 * (1 << 20);

/// End-anchored alternation of escaped test titles.
#[derive(Debug, Clone)]
pub struct TitlePattern {
    regex: Regex,
}

impl TitlePattern {
    /// Compile `titles` into a filter.
    ///
    /// Returns `Ok(None)` when there is nothing to select. That means "no
    /// impact", never "match everything". Empty titles are skipped since
    /// they would turn the alternation into a wildcard.
    pub fn compile<I, S>(titles: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let escaped: BTreeSet<String> = titles
            .into_iter()
            .filter(|t| !t.as_ref().is_empty())
            .map(|t| regex::escape(t.as_ref()))
            .collect();

        if escaped.is_empty() {
            return Ok(None);
        }

        let alternation = escaped.into_iter().collect::<Vec<_>>().join("|");
        let source = format!("(?:{alternation})$");
        let budget = source.len().saturating_mul(SIZE_LIMIT_PER_BYTE);
        let regex = RegexBuilder::new(&source)
            .size_limit(budget.max(MIN_SIZE_LIMIT))
            .dfa_size_limit(budget.max(MIN_DFA_SIZE_LIMIT))
            .build()?;
        Ok(Some(TitlePattern { regex }))
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Whether a runtime test identifier is selected.
    pub fn is_match(&self, identifier: &str) -> bool {
        self.regex.is_match(identifier)
    }

    pub fn as_regex(&self) -> &Regex {
        &self.regex
    }
}

impl fmt::Display for TitlePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(titles: &[&str]) -> TitlePattern {
        TitlePattern::compile(titles.iter().copied())
            .unwrap()
            .expect("non-empty titles compile to a pattern")
    }

    #[test]
    fn empty_input_means_no_selection() {
        assert!(TitlePattern::compile(Vec::<String>::new()).unwrap().is_none());
        assert!(TitlePattern::compile([""]).unwrap().is_none());
    }

    #[test]
    fn matches_hierarchical_identifier_suffix() {
        let pattern = compile(&["renders"]);
        assert!(pattern.is_match("Component > renders"));
        assert!(pattern.is_match("renders"));
        assert!(!pattern.is_match("Component > does not render"));
        assert!(!pattern.is_match("renders > nested child"));
    }

    #[test]
    fn metacharacters_are_literal() {
        let title = "handles (a|b) [x] {1,2} ^start$ a.b*c+d? \\path";
        let pattern = compile(&[title]);
        assert!(pattern.is_match(&format!("Suite > {title}")));
        assert!(!pattern.is_match("Suite > handles a"));
        assert!(!pattern.is_match("Suite > aXb"));
    }

    #[test]
    fn alternation_selects_each_title() {
        let pattern = compile(&["adds items", "removes items"]);
        assert!(pattern.is_match("Cart > adds items"));
        assert!(pattern.is_match("Cart > removes items"));
        assert!(!pattern.is_match("Cart > clears items"));
    }

    #[test]
    fn pattern_text_is_sorted_and_deduplicated() {
        let pattern = compile(&["b", "a", "b"]);
        assert_eq!(pattern.as_str(), "(?:a|b)$");
        assert_eq!(pattern.to_string(), "(?:a|b)$");
    }

    #[test]
    fn suffix_overlap_is_an_accepted_approximation() {
        let pattern = compile(&["renders"]);
        assert!(pattern.is_match("Component > also renders"));
    }

    #[test]
    fn large_impact_sets_still_compile() {
        let titles: Vec<String> = (0..10_000)
            .map(|i| {
                format!("Checkout flow > step {i} > shows the localized summary ünïcödé wörds {i}")
            })
            .collect();
        let pattern = TitlePattern::compile(&titles)
            .unwrap()
            .expect("non-empty titles compile to a pattern");

        assert!(pattern.is_match(&format!("Suite > {}", titles[0])));
        assert!(pattern.is_match(&titles[9_999]));
        assert!(!pattern.is_match("Checkout flow > step 10000 > shows the localized summary"));
    }

    #[test]
    fn empty_titles_do_not_widen_the_pattern() {
        let pattern = compile(&["", "renders"]);
        assert!(!pattern.is_match("anything else"));
    }
}
