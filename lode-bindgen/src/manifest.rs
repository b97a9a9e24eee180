// Bindings manifest - lode.bindings.json

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// File name of the on-disk contract between the binding extractor and
/// the import resolver.
pub const BINDINGS_MANIFEST_NAME: &str = "lode.bindings.json";

/// Schema 1, kind "crate". `modules` maps import specifiers as written in
/// source to dotted native module paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingsManifest {
    pub schema: u32,
    pub kind: String,

    #[serde(rename = "crate")]
    pub crate_: CrateDescriptor,

    /// BTreeMap so serialization order is stable across runs.
    pub modules: BTreeMap<String, String>,
}

/// Native crate coordinates. Exactly one of `version` and `path` is
/// present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrateDescriptor {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl BindingsManifest {
    pub fn new(crate_: CrateDescriptor) -> Self {
        Self {
            schema: 1,
            kind: "crate".to_string(),
            crate_,
            modules: BTreeMap::new(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.as_ref().display()))?;
        let manifest: BindingsManifest =
            serde_json::from_str(&content).context("Failed to parse lode.bindings.json")?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.validate()?;
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize bindings manifest")?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.as_ref().display()))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.schema != 1 {
            anyhow::bail!("Unsupported bindings manifest schema {}", self.schema);
        }
        if self.kind != "crate" {
            anyhow::bail!("Unsupported bindings manifest kind {:?}", self.kind);
        }
        if self.crate_.name.is_empty() {
            anyhow::bail!("Crate name cannot be empty");
        }
        match (&self.crate_.version, &self.crate_.path) {
            (Some(_), Some(_)) => {
                anyhow::bail!("Crate descriptor has both `version` and `path`")
            }
            (None, None) => anyhow::bail!("Crate descriptor has neither `version` nor `path`"),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> CrateDescriptor {
        CrateDescriptor {
            name: "geo".to_string(),
            package: None,
            version: Some("0.4.2".to_string()),
            path: None,
            features: vec!["serde".to_string()],
        }
    }

    #[test]
    fn test_round_trip() {
        let mut manifest = BindingsManifest::new(descriptor());
        manifest
            .modules
            .insert("geo/index.ls".to_string(), "geo".to_string());
        manifest
            .modules
            .insert("geo/math.ls".to_string(), "geo.math".to_string());

        let json = serde_json::to_string_pretty(&manifest).unwrap();
        assert!(json.contains("\"schema\": 1"));
        assert!(json.contains("\"kind\": \"crate\""));
        assert!(json.contains("\"crate\""));

        let back: BindingsManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.modules.len(), 2);
        assert_eq!(back.modules["geo/math.ls"], "geo.math");
    }

    #[test]
    fn test_version_and_path_are_exclusive() {
        let mut manifest = BindingsManifest::new(descriptor());
        manifest.crate_.path = Some("./crate".to_string());
        assert!(manifest.validate().is_err());

        manifest.crate_.version = None;
        assert!(manifest.validate().is_ok());

        manifest.crate_.path = None;
        assert!(manifest.validate().is_err());
    }
}
