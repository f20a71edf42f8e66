//! Permission-request detection.
//!
//! The external tool pauses mid-stream when it wants confirmation before
//! acting ("Would you like me to edit this file? (y/n)"). Detection is a
//! pluggable predicate so the regex set can be swapped or unit-tested
//! without any subprocess plumbing.

use once_cell::sync::Lazy;
use regex::Regex;

/// Decides whether a transcript tail is a permission request awaiting
/// input, and if so which line carries the question.
pub trait PermissionHeuristic: Send + Sync {
    /// Returns the question-bearing line if the tail looks blocked on a
    /// permission request.
    fn detect(&self, tail: &str) -> Option<String>;
}

static PERMISSION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)would you like me to",
        r"(?i)do you want (?:me )?to",
        r"(?i)proceed with",
        r"(?i)\[y/n\]",
        r"(?i)\(y/n\)",
        r"(?i)shall i ",
        r"(?i)continue\?",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("permission regex"))
    .collect()
});

/// How many trailing lines of the transcript are scanned per chunk. The
/// question the tool is blocked on is always at the very end of its
/// output; older lines must not re-trigger detection.
const SCAN_BACK_LINES: usize = 4;

/// The default heuristic: a fixed regex set over the last few lines,
/// plus a trailing question mark on the final non-empty line.
pub struct RegexPermissionHeuristic;

impl PermissionHeuristic for RegexPermissionHeuristic {
    fn detect(&self, tail: &str) -> Option<String> {
        let lines: Vec<&str> = tail
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            return None;
        }

        let scan_from = lines.len().saturating_sub(SCAN_BACK_LINES);
        for line in lines[scan_from..].iter().rev() {
            if PERMISSION_PATTERNS.iter().any(|p| p.is_match(line)) {
                return Some((*line).to_string());
            }
        }

        let last = lines[lines.len() - 1];
        if last.ends_with('?') {
            return Some(last.to_string());
        }

        None
    }
}
