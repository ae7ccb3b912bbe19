//! Pattern types for expect operations.
//!
//! Patterns are matched against raw terminal bytes, unanchored: the first
//! occurrence anywhere in the haystack wins.

use std::fmt;

use memchr::memmem;
use regex::bytes::Regex;

use crate::error::{HarnessError, Result};
use crate::types::Span;

/// A pattern that can be matched against terminal output.
#[derive(Clone)]
pub enum Pattern {
    /// Match an exact string.
    Literal(String),

    /// Match a regular expression.
    Regex(CompiledRegex),
}

impl Pattern {
    /// Create a literal pattern.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidPattern`] for an empty string.
    pub fn exact(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        if s.is_empty() {
            return Err(HarnessError::invalid_pattern("literal pattern is empty"));
        }
        Ok(Self::Literal(s))
    }

    /// Create a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::InvalidPattern`] for an empty pattern and
    /// [`HarnessError::Regex`] if it does not compile.
    pub fn regex(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(HarnessError::invalid_pattern("regex pattern is empty"));
        }
        Ok(Self::Regex(CompiledRegex::new(pattern)?))
    }

    /// Create the pattern used to recognise a shell prompt.
    ///
    /// Same rules as [`Pattern::regex`].
    pub fn prompt(pattern: &str) -> Result<Self> {
        Self::regex(pattern)
    }

    /// Get the pattern as a string for display purposes.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) => s,
            Self::Regex(r) => r.pattern(),
        }
    }

    /// Find the first occurrence of this pattern in `haystack`.
    #[must_use]
    pub fn matches(&self, haystack: &[u8]) -> Option<PatternMatch> {
        match self {
            Self::Literal(s) => memmem::find(haystack, s.as_bytes()).map(|start| PatternMatch {
                span: Span::new(start, start + s.len()),
                captures: Vec::new(),
            }),
            Self::Regex(r) => r.find(haystack),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "Literal({s:?})"),
            Self::Regex(r) => write!(f, "Regex({:?})", r.pattern()),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A compiled regular expression with its source pattern.
#[derive(Clone)]
pub struct CompiledRegex {
    pattern: String,
    regex: Regex,
}

impl CompiledRegex {
    /// Compile `pattern`.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            pattern: pattern.to_string(),
            regex: Regex::new(pattern)?,
        })
    }

    /// Get the source pattern.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Find the first match along with its capture groups.
    #[must_use]
    pub fn find(&self, haystack: &[u8]) -> Option<PatternMatch> {
        let caps = self.regex.captures(haystack)?;
        let whole = caps.get(0)?;
        let captures = caps
            .iter()
            .skip(1)
            .map(|m| m.map_or_else(String::new, |m| String::from_utf8_lossy(m.as_bytes()).into_owned()))
            .collect();
        Some(PatternMatch {
            span: Span::new(whole.start(), whole.end()),
            captures,
        })
    }
}

/// Result of a successful pattern match against a haystack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    /// Where the match sits in the haystack.
    pub span: Span,
    /// Capture groups (regex patterns only).
    pub captures: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_pattern_matches() {
        let pattern = Pattern::exact("hello").unwrap();
        let m = pattern.matches(b"say hello world").unwrap();
        assert_eq!(m.span, Span::new(4, 9));
    }

    #[test]
    fn literal_first_occurrence_wins() {
        let pattern = Pattern::exact("cd-test-d").unwrap();
        let m = pattern
            .matches(b"mkdir cd-test-d\r\n/tmp/cd-test-d\r\n")
            .unwrap();
        assert_eq!(m.span.start, 6);
    }

    #[test]
    fn regex_pattern_matches_unanchored() {
        let pattern = Pattern::regex(r"\d+ history").unwrap();
        let m = pattern.matches(b"   1 sleep 1\r\n   2 history\r\n").unwrap();
        assert_eq!(m.span, Span::new(17, 26));
    }

    #[test]
    fn regex_pattern_captures() {
        let pattern = Pattern::regex(r"(\w+)@(\w+)?x?").unwrap();
        let m = pattern.matches(b"email: user@ here").unwrap();
        assert_eq!(m.captures, vec!["user".to_string(), String::new()]);
    }

    #[test]
    fn empty_patterns_are_rejected() {
        assert!(matches!(
            Pattern::exact(""),
            Err(HarnessError::InvalidPattern { .. })
        ));
        assert!(matches!(
            Pattern::regex(""),
            Err(HarnessError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn bad_regex_is_rejected() {
        assert!(matches!(Pattern::regex("("), Err(HarnessError::Regex(_))));
    }

    #[test]
    fn default_prompt_pattern() {
        let prompt = Pattern::prompt("[$#>%] ").unwrap();
        assert!(prompt.matches(b"test-shell> ").is_some());
        assert!(prompt.matches(b"user@host:~$ ").is_some());
        assert!(prompt.matches(b"no prompt here\r\n").is_none());
    }

    #[test]
    fn literal_on_short_haystack() {
        let pattern = Pattern::exact("longer").unwrap();
        assert!(pattern.matches(b"short").is_none());
    }

    #[test]
    fn literal_found_at_the_end_of_a_large_buffer() {
        let mut haystack = vec![b'a'; 1024 * 1024];
        haystack.extend_from_slice(b"aab");
        let pattern = Pattern::exact("aab").unwrap();
        let m = pattern.matches(&haystack).unwrap();
        assert_eq!(m.span, Span::new(1024 * 1024, 1024 * 1024 + 3));
    }

    #[test]
    fn literal_search_is_bytewise() {
        let pattern = Pattern::exact("☃").unwrap();
        let m = pattern.matches("x☃y".as_bytes()).unwrap();
        assert_eq!(m.span, Span::new(1, 4));
    }
}
