// Diagnostics for the Lode compiler
// Stable numeric codes, byte-offset spans, and the target source map

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod registry;
pub mod span_map;

pub use registry::{contains, domain_of, Domain};
pub use span_map::{SpanMap, SpanMapEntry};

/// Source location as a byte-offset range within a named file.
///
/// File names are stored project-relative with forward slashes so that
/// compiler output never depends on where the project root happens to live.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub file: String,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(file: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            file: normalize_path(&file.into()),
            start,
            end,
        }
    }

    /// Compute the 1-based line and column of `start` against the file's text.
    pub fn line_col(&self, source: &str) -> (usize, usize) {
        offset_to_line_col(source, self.start)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.start, self.end)
    }
}

/// Normalize a path for output: forward slashes, no leading `./`.
pub fn normalize_path(path: &str) -> String {
    let s = path.replace('\\', "/");
    s.strip_prefix("./").unwrap_or(&s).to_string()
}

/// Convert a byte offset to a 1-based (line, column) pair.
pub fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.bytes().filter(|&b| b == b'\n').count() + 1;
    let column = before.rfind('\n').map_or(offset + 1, |pos| offset - pos);
    (line, column)
}

/// A user-visible rejection with a stable catalog code.
///
/// Every error the compiler reports to a user is one of these; raw error
/// types never cross a public boundary outside the registry module.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct CompileError {
    pub code: &'static str,
    pub message: String,
    pub span: Option<Span>,
}

impl CompileError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        debug_assert!(registry::contains(code), "unregistered code {code}");
        Self {
            code,
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        debug_assert!(registry::contains(code), "unregistered code {code}");
        Self {
            code,
            message: message.into(),
            span: Some(span),
        }
    }

    /// Attach a span to a spanless error; an existing span wins.
    pub fn at(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    /// One-line rendering: `<file>:<line>:<col>: <code>: <message>`.
    ///
    /// `source` is the text of the file the span points into; spanless
    /// errors render without the location prefix.
    pub fn render(&self, source: &str) -> String {
        match &self.span {
            Some(span) => {
                let (line, col) = span.line_col(source);
                format!(
                    "{}:{}:{}: {}: {}",
                    span.file, line, col, self.code, self.message
                )
            }
            None => format!("{}: {}", self.code, self.message),
        }
    }

    /// Colored variant of [`render`](Self::render) for terminal output.
    pub fn render_colored(&self, source: &str) -> String {
        match &self.span {
            Some(span) => {
                let (line, col) = span.line_col(source);
                format!(
                    "{}:{}:{}: {}: {}",
                    span.file.bold(),
                    line,
                    col,
                    self.code.red().bold(),
                    self.message
                )
            }
            None => format!("{}: {}", self.code.red().bold(), self.message),
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

/// Fuzzy matching for "did you mean?" suggestions
pub mod fuzzy {
    use strsim::jaro_winkler;

    /// Return up to `max_suggestions` candidates with similarity above
    /// `threshold`, best first.
    pub fn find_similar_names(
        target: &str,
        candidates: &[String],
        threshold: f64,
        max_suggestions: usize,
    ) -> Vec<String> {
        let mut scored: Vec<(String, f64)> = candidates
            .iter()
            .map(|candidate| (candidate.clone(), jaro_winkler(target, candidate)))
            .filter(|(_, score)| *score > threshold)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(max_suggestions)
            .map(|(name, _)| name)
            .collect()
    }

    /// Append a `did you mean` tail to a message when candidates are close.
    pub fn suggestion_suffix(target: &str, candidates: &[String]) -> String {
        let similar = find_similar_names(target, candidates, 0.7, 3);
        if similar.is_empty() {
            String::new()
        } else {
            format!("; did you mean `{}`?", similar.join("`, `"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_col() {
        let source = "abc\ndef\nghi";
        assert_eq!(offset_to_line_col(source, 0), (1, 1));
        assert_eq!(offset_to_line_col(source, 4), (2, 1));
        assert_eq!(offset_to_line_col(source, 6), (2, 3));
        assert_eq!(offset_to_line_col(source, 8), (3, 1));
    }

    #[test]
    fn test_render_one_line() {
        let source = "export function main(): void {\n  oops;\n}\n";
        let err = CompileError::with_span(
            registry::codes::UNSUPPORTED_EXPRESSION,
            "unsupported expression",
            Span::new("src/main.ls", 33, 37),
        );
        assert_eq!(
            err.render(source),
            "src/main.ls:2:3: LO1004: unsupported expression"
        );
    }

    #[test]
    fn test_path_normalization() {
        assert_eq!(normalize_path("./src\\util.ls"), "src/util.ls");
        let span = Span::new("a\\b\\c.ls", 0, 1);
        assert_eq!(span.file, "a/b/c.ls");
    }

    #[test]
    fn test_fuzzy_suggestions() {
        let candidates = vec!["radius".to_string(), "side".to_string()];
        let s = fuzzy::suggestion_suffix("radis", &candidates);
        assert!(s.contains("radius"));
        assert_eq!(fuzzy::suggestion_suffix("zzz", &candidates), "");
    }
}
