use indexmap::IndexMap;
use serde::Serialize;
use smol_str::SmolStr;

use crate::core::module::repo_name::RepoName;
use crate::core::module_file::Location;
use crate::internal::bimap::BiMap;

/// One `use_extension` in a module file, together with the tags and repo
/// imports attached to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtensionUsage {
    /// Label of the `.bzl` file defining the extension.
    pub extension_bzl_file: String,
    /// Name of the extension symbol exported by that file.
    pub extension_name: SmolStr,
    pub location: Location,
    /// Repos imported from this extension: local repo name to the name the
    /// extension exports the repo under. Injective in both directions.
    pub imports: BiMap<RepoName, SmolStr>,
    /// Tags attached through the usage proxy, in source order.
    pub tags: Vec<Tag>,
    /// Whether this usage was declared with `dev_dependency = True`.
    pub dev_dependency: bool,
}

/// One tag attached to an extension usage: `proxy.<tag_name>(**attrs)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub tag_name: SmolStr,
    /// Attribute values as passed in the module file, in source order.
    pub attrs: IndexMap<SmolStr, serde_json::Value>,
    pub location: Location,
}
