//! Wildcard name filter
//!
//! Only `*` and `?` are special. Several patterns may be given separated by
//! `:`; a name passes when any of them matches the whole name.

use crate::error::EngineError;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

#[derive(Debug, Clone)]
pub struct WildcardFilter {
    pattern: String,
    case_sensitive: bool,
    set: GlobSet,
}

impl WildcardFilter {
    pub fn new(pattern: &str, case_sensitive: bool) -> Result<Self, EngineError> {
        let mut builder = GlobSetBuilder::new();
        for part in pattern.split(':').map(str::trim).filter(|p| !p.is_empty()) {
            let glob = GlobBuilder::new(&to_glob(part))
                .case_insensitive(!case_sensitive)
                .literal_separator(false)
                .backslash_escape(false)
                .build()
                .map_err(|e| EngineError::InvalidFilter(format!("{}: {}", part, e)))?;
            builder.add(glob);
        }
        let set = builder
            .build()
            .map_err(|e| EngineError::InvalidFilter(e.to_string()))?;

        Ok(Self {
            pattern: pattern.to_string(),
            case_sensitive,
            set,
        })
    }

    /// An empty pattern list matches everything
    pub fn matches(&self, name: &str) -> bool {
        self.set.is_empty() || self.set.is_match(name)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }
}

impl PartialEq for WildcardFilter {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.case_sensitive == other.case_sensitive
    }
}

/// Escape everything globset treats specially except `*` and `?`
fn to_glob(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '*' | '?' => out.push(c),
            '[' | ']' | '{' | '}' => {
                out.push('[');
                out.push(c);
                out.push(']');
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_and_question() {
        let f = WildcardFilter::new("*.txt", false).unwrap();
        assert!(f.matches("A.txt"));
        assert!(f.matches("c.TXT"));
        assert!(!f.matches("B"));
        assert!(!f.matches("a.txt.bak"));

        let q = WildcardFilter::new("file?.rs", true).unwrap();
        assert!(q.matches("file1.rs"));
        assert!(!q.matches("file10.rs"));
        assert!(!q.matches("FILE1.rs"));
    }

    #[test]
    fn test_multiple_patterns() {
        let f = WildcardFilter::new("*.jpg : *.png", false).unwrap();
        assert!(f.matches("cat.JPG"));
        assert!(f.matches("dog.png"));
        assert!(!f.matches("notes.txt"));
    }

    #[test]
    fn test_brackets_are_literal() {
        let f = WildcardFilter::new("[draft]*", false).unwrap();
        assert!(f.matches("[draft] plan.md"));
        assert!(!f.matches("d plan.md"));
    }

    #[test]
    fn test_empty_matches_all() {
        let f = WildcardFilter::new(" : ", false).unwrap();
        assert!(f.matches("anything"));
    }
}
