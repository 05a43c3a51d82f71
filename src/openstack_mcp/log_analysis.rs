//! Console log error-pattern extraction.
//!
//! The extractor scans a log blob line by line for failure keywords and returns every match
//! together with a small window of surrounding lines. Its output is the structured input to the
//! LLM-assisted analysis tools in [`crate::tools::openstack`].
//!
//! # Example
//!
//! ```rust
//! use openstack_mcp::log_analysis::extract_error_patterns;
//!
//! let scan = extract_error_patterns("line1\nconnection refused\nline3\nline4\nline5");
//! assert!(scan.has_errors);
//! assert_eq!(scan.error_count, 1);
//! assert_eq!(scan.error_lines[0].line_number, 2);
//! assert_eq!(scan.error_lines[0].context_before, vec!["line1"]);
//! assert_eq!(scan.error_lines[0].context_after, vec!["line3", "line4"]);
//! ```

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Failure and severity indicators flagged by default.
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "error",
    "fail",
    "panic",
    "critical",
    "fatal",
    "emergency",
    "alert",
    "warning",
    "exception",
    "segfault",
    "oops",
    "bug",
    "cannot",
    "unable",
    "timeout",
    "refused",
    "denied",
];

/// Maximum number of [`MatchRecord`]s kept in a [`ScanResult`].
pub const DEFAULT_MAX_RECORDS: usize = 15;

/// Number of lines captured on each side of a match.
pub const DEFAULT_CONTEXT_LINES: usize = 2;

lazy_static! {
    static ref DEFAULT_KEYWORD_SET: KeywordSet = KeywordSet::new(DEFAULT_KEYWORDS.iter().copied())
        .expect("default keyword patterns are valid regular expressions");
}

/// How keywords are matched against a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// A keyword anywhere in the line matches, including inside larger tokens
    /// (`"failover"` matches `fail`).
    #[default]
    Substring,
    /// Keywords must start and end on word boundaries.
    WholeWord,
}

/// A compiled, case-insensitive set of failure patterns.
///
/// Patterns are regular-expression fragments joined by alternation, so plain words behave as
/// substrings. Use [`KeywordSet::from_literals`] when the keywords may contain regex
/// metacharacters.
#[derive(Debug, Clone)]
pub struct KeywordSet {
    patterns: Vec<String>,
    mode: MatchMode,
    matcher: Option<Regex>,
}

impl KeywordSet {
    /// Compile a keyword set from regex fragments using [`MatchMode::Substring`].
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        Self::compile(patterns, MatchMode::Substring)
    }

    /// Compile a keyword set from literal strings, escaping any regex metacharacters.
    pub fn from_literals<I, S>(literals: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(literals.into_iter().map(|s| regex::escape(s.as_ref())))
    }

    /// Recompile the same patterns with a different [`MatchMode`].
    pub fn with_mode(self, mode: MatchMode) -> Result<Self, regex::Error> {
        Self::compile(self.patterns, mode)
    }

    /// Add more patterns to the set.
    pub fn extend<I, S>(self, patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mode = self.mode;
        let mut all = self.patterns;
        all.extend(patterns.into_iter().map(Into::into));
        Self::compile(all, mode)
    }

    /// The source patterns, in the order they were supplied.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// The active match mode.
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Returns `true` if any pattern occurs in `line`, ignoring case.
    ///
    /// An empty keyword set never matches.
    pub fn is_match(&self, line: &str) -> bool {
        self.matcher
            .as_ref()
            .map(|re| re.is_match(line))
            .unwrap_or(false)
    }

    fn compile(patterns: Vec<String>, mode: MatchMode) -> Result<Self, regex::Error> {
        let matcher = if patterns.is_empty() {
            None
        } else {
            let alternation = patterns
                .iter()
                .map(|p| format!("(?:{})", p))
                .collect::<Vec<_>>()
                .join("|");
            let expression = match mode {
                MatchMode::Substring => alternation,
                MatchMode::WholeWord => format!(r"\b(?:{})\b", alternation),
            };
            Some(
                RegexBuilder::new(&expression)
                    .case_insensitive(true)
                    .build()?,
            )
        };

        Ok(Self {
            patterns,
            mode,
            matcher,
        })
    }
}

impl Default for KeywordSet {
    fn default() -> Self {
        DEFAULT_KEYWORD_SET.clone()
    }
}

/// One flagged line plus its immediate textual context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// 1-based position of the line in the log.
    pub line_number: usize,
    /// The matching line, trimmed.
    pub content: String,
    /// Up to `context_lines` trimmed, non-empty lines preceding the match.
    pub context_before: Vec<String>,
    /// Up to `context_lines` trimmed, non-empty lines following the match.
    pub context_after: Vec<String>,
}

/// Structured outcome of scanning one log blob.
///
/// `error_count` always reports the true number of matching lines, even when `error_lines` has
/// been truncated.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScanResult {
    pub has_errors: bool,
    pub error_count: usize,
    pub error_lines: Vec<MatchRecord>,
    pub total_lines: usize,
}

impl ScanResult {
    /// The result for an empty log: no errors and zero lines.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Contents of the first `limit` flagged lines.
    pub fn sample_errors(&self, limit: usize) -> Vec<String> {
        self.error_lines
            .iter()
            .take(limit)
            .map(|record| record.content.clone())
            .collect()
    }
}

/// Scans log text for failure keywords.
///
/// The extractor is immutable once built and holds no per-call state, so a single instance can
/// be shared across tasks.
#[derive(Debug, Clone)]
pub struct ErrorPatternExtractor {
    keywords: KeywordSet,
    max_records: usize,
    context_lines: usize,
}

impl ErrorPatternExtractor {
    /// Build an extractor over `keywords` with the default record cap and context window.
    pub fn new(keywords: KeywordSet) -> Self {
        Self {
            keywords,
            max_records: DEFAULT_MAX_RECORDS,
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }

    /// Cap the number of records retained in [`ScanResult::error_lines`].
    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    /// Set how many lines are captured on each side of a match.
    pub fn with_context_lines(mut self, context_lines: usize) -> Self {
        self.context_lines = context_lines;
        self
    }

    pub fn keywords(&self) -> &KeywordSet {
        &self.keywords
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    pub fn context_lines(&self) -> usize {
        self.context_lines
    }

    /// Scan `log_text` and collect every flagged line.
    ///
    /// Never fails. Empty input yields [`ScanResult::empty`].
    pub fn extract(&self, log_text: &str) -> ScanResult {
        if log_text.is_empty() {
            return ScanResult::empty();
        }

        let lines: Vec<&str> = log_text.split('\n').collect();
        let mut error_count = 0;
        let mut error_lines = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            if !self.keywords.is_match(line) {
                continue;
            }
            error_count += 1;
            if error_lines.len() < self.max_records {
                error_lines.push(self.record_at(&lines, index));
            }
        }

        ScanResult {
            has_errors: error_count > 0,
            error_count,
            error_lines,
            total_lines: lines.len(),
        }
    }

    fn record_at(&self, lines: &[&str], index: usize) -> MatchRecord {
        let before_start = index.saturating_sub(self.context_lines);
        let after_end = lines
            .len()
            .min(index.saturating_add(1).saturating_add(self.context_lines));

        MatchRecord {
            line_number: index + 1,
            content: lines[index].trim().to_string(),
            context_before: non_blank_trimmed(&lines[before_start..index]),
            context_after: non_blank_trimmed(&lines[index + 1..after_end]),
        }
    }
}

impl Default for ErrorPatternExtractor {
    fn default() -> Self {
        Self::new(KeywordSet::default())
    }
}

fn non_blank_trimmed(lines: &[&str]) -> Vec<String> {
    lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Scan `log_text` with the default keyword set and limits.
pub fn extract_error_patterns(log_text: &str) -> ScanResult {
    ErrorPatternExtractor::default().extract(log_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keywords_are_case_insensitive() {
        let keywords = KeywordSet::default();
        assert!(keywords.is_match("ERROR occurred"));
        assert!(keywords.is_match("error occurred"));
        assert!(keywords.is_match("Kernel PANIC - not syncing"));
        assert!(!keywords.is_match("boot ok"));
    }

    #[test]
    fn test_substring_matching_is_permissive() {
        let keywords = KeywordSet::default();
        assert!(keywords.is_match("promoting failover node"));
        assert!(keywords.is_match("Cannotable widget"));
        assert!(keywords.is_match("debugfs mounted"));
    }

    #[test]
    fn test_whole_word_mode_rejects_embedded_keywords() {
        let keywords = KeywordSet::default()
            .with_mode(MatchMode::WholeWord)
            .unwrap();
        assert_eq!(keywords.mode(), MatchMode::WholeWord);
        assert!(!keywords.is_match("promoting failover node"));
        assert!(keywords.is_match("disk fail detected"));
        assert!(keywords.is_match("Error: disk full"));
    }

    #[test]
    fn test_empty_keyword_set_never_matches() {
        let keywords = KeywordSet::new(Vec::<String>::new()).unwrap();
        assert!(!keywords.is_match("fatal error"));
        let scan = ErrorPatternExtractor::new(keywords).extract("fatal error\nanother");
        assert!(!scan.has_errors);
        assert_eq!(scan.total_lines, 2);
    }

    #[test]
    fn test_literals_are_escaped() {
        let keywords = KeywordSet::from_literals(["[ERR]", "a.b"]).unwrap();
        assert!(keywords.is_match("something [err] happened"));
        assert!(!keywords.is_match("axb"));
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        assert!(KeywordSet::new(["(unclosed"]).is_err());
    }

    #[test]
    fn test_extend_keeps_defaults() {
        let keywords = KeywordSet::default().extend(["oom-killer"]).unwrap();
        assert_eq!(keywords.patterns().len(), DEFAULT_KEYWORDS.len() + 1);
        assert!(keywords.is_match("invoked OOM-KILLER"));
        assert!(keywords.is_match("fatal"));
    }

    #[test]
    fn test_line_matching_several_keywords_counts_once() {
        let scan = extract_error_patterns("fatal error: permission denied");
        assert_eq!(scan.error_count, 1);
        assert_eq!(scan.error_lines.len(), 1);
    }

    #[test]
    fn test_context_clamped_at_document_edges() {
        let scan = extract_error_patterns("error at start\nmiddle\nerror at end");
        assert_eq!(scan.error_count, 2);
        assert!(scan.error_lines[0].context_before.is_empty());
        assert_eq!(
            scan.error_lines[0].context_after,
            vec!["middle", "error at end"]
        );
        assert_eq!(
            scan.error_lines[1].context_before,
            vec!["error at start", "middle"]
        );
        assert!(scan.error_lines[1].context_after.is_empty());
    }

    #[test]
    fn test_custom_limits() {
        let log = (0..8)
            .map(|i| format!("timeout {}", i))
            .collect::<Vec<_>>()
            .join("\n");
        let extractor = ErrorPatternExtractor::default()
            .with_max_records(3)
            .with_context_lines(1);
        let scan = extractor.extract(&log);
        assert_eq!(scan.error_count, 8);
        assert_eq!(scan.error_lines.len(), 3);
        assert_eq!(scan.error_lines[1].context_before, vec!["timeout 0"]);
        assert_eq!(scan.error_lines[1].context_after, vec!["timeout 2"]);
    }

    #[test]
    fn test_huge_context_window_is_clamped() {
        let scan = ErrorPatternExtractor::default()
            .with_context_lines(usize::MAX)
            .extract("a\nerror\nb");
        assert_eq!(scan.error_count, 1);
        assert_eq!(scan.error_lines[0].context_before, vec!["a"]);
        assert_eq!(scan.error_lines[0].context_after, vec!["b"]);
    }

    #[test]
    fn test_blank_context_lines_are_dropped() {
        let scan = extract_error_patterns("a\n\nb\nerror here\n\nc");
        assert_eq!(scan.total_lines, 6);
        assert_eq!(scan.error_lines[0].line_number, 4);
        assert_eq!(scan.error_lines[0].context_before, vec!["b"]);
        assert_eq!(scan.error_lines[0].context_after, vec!["c"]);
    }

    #[test]
    fn test_whitespace_only_context_lines_are_dropped() {
        let scan = extract_error_patterns("x\n   \nfatal\n   \ny\nz");
        let record = &scan.error_lines[0];
        assert_eq!(record.context_before, vec!["x"]);
        assert_eq!(record.context_after, vec!["y"]);
        assert!(record.context_before.len() <= 2);
        assert!(record.context_after.len() <= 2);
    }

    #[test]
    fn test_crlf_lines_are_trimmed() {
        let scan = extract_error_patterns("ok\r\nsegfault at 0\r\nnext\r\n");
        assert_eq!(scan.total_lines, 4);
        assert_eq!(scan.error_lines[0].content, "segfault at 0");
        assert_eq!(scan.error_lines[0].context_before, vec!["ok"]);
        assert_eq!(scan.error_lines[0].context_after, vec!["next"]);
    }

    #[test]
    fn test_sample_errors() {
        let scan = extract_error_patterns("fail a\nfail b\nfail c\nfail d");
        assert_eq!(scan.sample_errors(3), vec!["fail a", "fail b", "fail c"]);
    }
}
