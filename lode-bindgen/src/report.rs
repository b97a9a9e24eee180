// Binding generation report - what the lenient scan could not expose.

use serde::{Deserialize, Serialize};

/// `{ schema: 1, skipped: [...] }`, written next to the facade package.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationReport {
    pub schema: u32,
    pub skipped: Vec<Skipped>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skipped {
    pub kind: SkipKind,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipKind {
    Type,
    Generic,
    Enum,
    Trait,
    TraitMethod,
    Impl,
    Param,
    Reexport,
}

impl GenerationReport {
    pub fn new() -> Self {
        Self {
            schema: 1,
            skipped: Vec::new(),
        }
    }

    pub fn skip(&mut self, kind: SkipKind, reason: impl Into<String>, snippet: Option<String>) {
        self.skipped.push(Skipped {
            kind,
            reason: reason.into(),
            snippet,
        });
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_serializes_kebab_case() {
        let mut report = GenerationReport::new();
        report.skip(
            SkipKind::TraitMethod,
            "optional parameter",
            Some("fn f(x: Option<i32>)".to_string()),
        );
        let json = report.to_json();
        assert!(json.contains("\"trait-method\""));
        assert!(json.contains("\"schema\": 1"));
    }
}
