use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// The recipe for materialising one repo: a repository rule class and its
/// attribute values.
///
/// The resolver only produces these; executing them is the fetcher's
/// business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoSpec {
    pub rule_class: SmolStr,
    pub attributes: IndexMap<SmolStr, serde_json::Value>,
}

impl RepoSpec {
    pub const HTTP_ARCHIVE: &'static str = "http_archive";
    pub const GIT_REPOSITORY: &'static str = "git_repository";
    pub const LOCAL_REPOSITORY: &'static str = "local_repository";

    pub fn new(rule_class: impl Into<SmolStr>) -> Self {
        Self {
            rule_class: rule_class.into(),
            attributes: IndexMap::new(),
        }
    }

    pub fn attr(mut self, name: impl Into<SmolStr>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    /// Appends override-supplied patches to the spec's `patches` attribute
    /// and replaces `patch_args` with `["-p<strip>"]`.
    pub fn append_patches(&mut self, patches: &[String], patch_strip: u32) {
        if patches.is_empty() {
            return;
        }
        let entry = self
            .attributes
            .entry(SmolStr::new("patches"))
            .or_insert_with(|| serde_json::Value::Array(Vec::new()));
        if let serde_json::Value::Array(existing) = entry {
            existing.extend(patches.iter().map(|p| serde_json::Value::String(p.clone())));
        }
        self.attributes.insert(
            SmolStr::new("patch_args"),
            serde_json::json!([format!("-p{patch_strip}")]),
        );
    }
}
