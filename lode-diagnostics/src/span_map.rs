//! Target source map.
//!
//! The writer drops a `// lode-span: <file>:<start>:<end>` comment line
//! immediately before every statement that carries a span. Scanning the
//! final target text recovers an ordered map from target line to source
//! location, which is what lets a downstream build diagnostic be reported
//! against the file the user actually wrote.

use serde::{Deserialize, Serialize};

use crate::normalize_path;

/// Comment marker the writer emits and the scanner looks for.
pub const SPAN_COMMENT_PREFIX: &str = "// lode-span: ";

/// One mapping: a target line (1-based) back to a source byte range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanMapEntry {
    pub target_line: usize,
    pub target_column: usize,
    pub source_file: String,
    pub source_start: usize,
    pub source_end: usize,
}

/// Ordered span map over a generated target file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanMap {
    entries: Vec<SpanMapEntry>,
}

/// On-disk shape of the map file (`main.rs.map`).
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpanMapFile {
    schema: u32,
    kind: String,
    entries: Vec<SpanMapEntry>,
}

impl SpanMap {
    /// Scan generated target text for span comments.
    ///
    /// Each comment locates the statement on the following line, so the
    /// recorded target line is the comment's line plus one. Entries come
    /// back in target-line order because the scan is top to bottom.
    pub fn scan(target_text: &str) -> Self {
        let mut entries = Vec::new();
        for (idx, line) in target_text.lines().enumerate() {
            let trimmed = line.trim_start();
            let Some(rest) = trimmed.strip_prefix(SPAN_COMMENT_PREFIX) else {
                continue;
            };
            if let Some(entry) = parse_span_comment(rest, idx + 2) {
                entries.push(entry);
            }
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[SpanMapEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest entry whose target line is at or before `line`.
    pub fn lookup(&self, line: usize) -> Option<&SpanMapEntry> {
        self.entries
            .iter()
            .take_while(|e| e.target_line <= line)
            .last()
    }

    /// Serialize to the `target-source-map` JSON file format.
    pub fn to_json(&self) -> String {
        let file = SpanMapFile {
            schema: 1,
            kind: "target-source-map".to_string(),
            entries: self.entries.clone(),
        };
        // Serialization of a plain struct with string/usize fields cannot fail.
        serde_json::to_string_pretty(&file).unwrap_or_default()
    }
}

/// Parse `<file>:<start>:<end>` from the tail of a span comment.
///
/// File names may themselves contain `:` on exotic setups, so the two
/// numeric fields are taken from the right.
fn parse_span_comment(rest: &str, target_line: usize) -> Option<SpanMapEntry> {
    let rest = rest.trim();
    let (head, end) = rest.rsplit_once(':')?;
    let (file, start) = head.rsplit_once(':')?;
    let source_start = start.parse().ok()?;
    let source_end = end.parse().ok()?;
    if file.is_empty() {
        return None;
    }
    Some(SpanMapEntry {
        target_line,
        target_column: 1,
        source_file: normalize_path(file),
        source_start,
        source_end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "\
fn main() {
  // lode-span: src/main.ls:31:40
  let x = 1;
  // lode-span: src/main.ls:44:53
  return;
}
";

    #[test]
    fn test_scan_finds_entries_in_order() {
        let map = SpanMap::scan(TARGET);
        assert_eq!(map.entries().len(), 2);
        assert_eq!(map.entries()[0].target_line, 3);
        assert_eq!(map.entries()[0].source_start, 31);
        assert_eq!(map.entries()[1].target_line, 5);
        assert_eq!(map.entries()[1].source_end, 53);
        assert!(map.entries().iter().all(|e| e.target_column == 1));
    }

    #[test]
    fn test_lookup_floor_semantics() {
        let map = SpanMap::scan(TARGET);
        assert!(map.lookup(1).is_none());
        assert_eq!(map.lookup(3).map(|e| e.target_line), Some(3));
        assert_eq!(map.lookup(4).map(|e| e.target_line), Some(3));
        assert_eq!(map.lookup(100).map(|e| e.target_line), Some(5));
    }

    #[test]
    fn test_json_shape() {
        let map = SpanMap::scan(TARGET);
        let json = map.to_json();
        assert!(json.contains("\"schema\": 1"));
        assert!(json.contains("\"kind\": \"target-source-map\""));
        assert!(json.contains("\"targetLine\": 3"));
        assert!(json.contains("\"sourceFile\": \"src/main.ls\""));
    }

    #[test]
    fn test_malformed_comment_is_skipped() {
        let map = SpanMap::scan("// lode-span: nonsense\nlet x = 1;\n");
        assert!(map.is_empty());
    }
}
