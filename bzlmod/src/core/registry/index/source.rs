use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::integrity::Integrity;

/// The `modules/<name>/<version>/source.json` file of an index registry:
/// where the module's sources come from and how to verify them.
///
/// Serialisation round-trips bit-exact modulo key order; unknown `type`
/// values are carried through untouched.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SourceJson {
    /// Source kind; absent means `archive`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity: Option<Integrity>,

    /// For `local_path` sources: path relative to the registry's
    /// `module_base_path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip_prefix: Option<String>,

    /// Patch file name (under `patches/`) to its integrity.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub patches: IndexMap<String, Integrity>,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub patch_strip: u32,
}

impl SourceJson {
    pub fn is_archive(&self) -> bool {
        match self.source_type.as_deref() {
            None | Some("archive") => true,
            Some(_) => false,
        }
    }

    pub fn is_local_path(&self) -> bool {
        self.source_type.as_deref() == Some("local_path")
    }
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

#[cfg(test)]
mod tests {
    use super::SourceJson;
    use crate::core::Integrity;

    const EXAMPLE: &str = r#"{"url":"https://example.com/rules_x-1.0.tar.gz","integrity":"sha256-uVriNKZimfMvM5gGD9U+WeHZxxdTRyVWLmvkTldeygk=","strip_prefix":"rules_x-1.0","patches":{"fix-build.patch":"sha256-uVriNKZimfMvM5gGD9U+WeHZxxdTRyVWLmvkTldeygk="},"patch_strip":1}"#;

    #[test]
    fn roundtrip_is_identity() {
        let source: SourceJson = serde_json::from_str(EXAMPLE).unwrap();
        assert_eq!(serde_json::to_string(&source).unwrap(), EXAMPLE);
    }

    #[test]
    fn parses_fields() {
        let source: SourceJson = serde_json::from_str(EXAMPLE).unwrap();
        assert!(source.is_archive());
        assert_eq!(source.url.as_deref(), Some("https://example.com/rules_x-1.0.tar.gz"));
        assert_eq!(source.strip_prefix.as_deref(), Some("rules_x-1.0"));
        assert_eq!(source.patch_strip, 1);
        assert_eq!(
            source.patches["fix-build.patch"],
            Integrity::parse("sha256-uVriNKZimfMvM5gGD9U+WeHZxxdTRyVWLmvkTldeygk=").unwrap()
        );
    }

    #[test]
    fn minimal_source_omits_defaults() {
        let source: SourceJson = serde_json::from_str(r#"{"url":"https://example.com/a.zip"}"#).unwrap();
        assert_eq!(
            serde_json::to_string(&source).unwrap(),
            r#"{"url":"https://example.com/a.zip"}"#
        );
    }

    #[test]
    fn unknown_source_type_is_tolerated() {
        let source: SourceJson =
            serde_json::from_str(r#"{"type":"git_repository","url":"https://example.com/r.git"}"#)
                .unwrap();
        assert!(!source.is_archive());
        assert!(!source.is_local_path());
        assert_eq!(source.source_type.as_deref(), Some("git_repository"));
    }
}
