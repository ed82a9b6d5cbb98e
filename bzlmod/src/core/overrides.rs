use camino::Utf8PathBuf;
use indexmap::IndexMap;
use url::Url;

use crate::core::integrity::Integrity;
use crate::core::module::name::ModuleName;
use crate::core::version::Version;

/// Overrides declared by the root module, keyed by module name, in
/// declaration order. Immutable once the root module file is built.
pub type OverrideMap = IndexMap<ModuleName, Override>;

/// A root-module directive altering how one dependency is fetched or which
/// of its versions participates in selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Override {
    SingleVersion(SingleVersionOverride),
    MultipleVersion(MultipleVersionOverride),
    Archive(ArchiveOverride),
    Git(GitOverride),
    LocalPath(LocalPathOverride),
}

/// Pins a dependency to one version, and optionally to one registry, with
/// optional additional patches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SingleVersionOverride {
    /// When set, every dep on this module is rewritten to this version
    /// before selection.
    pub version: Option<Version>,
    pub registry: Option<Url>,
    pub patches: Vec<String>,
    pub patch_strip: u32,
}

/// Allows several versions of one module to coexist in the resolved graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipleVersionOverride {
    /// The allowed versions, in declaration order. Must contain at least
    /// two entries; enforced where the directive is recorded.
    pub versions: Vec<Version>,
    pub registry: Option<Url>,
}

/// Fetches a module from an archive URL instead of a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOverride {
    pub urls: Vec<Url>,
    pub integrity: Option<Integrity>,
    pub strip_prefix: Option<String>,
    pub patches: Vec<String>,
    pub patch_strip: u32,
}

/// Fetches a module from a git commit instead of a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOverride {
    pub remote: String,
    pub commit: String,
    pub patches: Vec<String>,
    pub patch_strip: u32,
}

/// Backs a module with a local directory instead of a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPathOverride {
    pub path: Utf8PathBuf,
}

impl Override {
    /// Whether this override bypasses registries entirely. Modules under
    /// such an override are assigned the empty version.
    pub fn is_non_registry(&self) -> bool {
        matches!(
            self,
            Override::Archive(_) | Override::Git(_) | Override::LocalPath(_)
        )
    }

    /// The registry pinned by this override, if any.
    pub fn registry(&self) -> Option<&Url> {
        match self {
            Override::SingleVersion(o) => o.registry.as_ref(),
            Override::MultipleVersion(o) => o.registry.as_ref(),
            _ => None,
        }
    }

    /// The authoritative override-to-version mapping applied to dep keys
    /// during discovery.
    pub fn rewrite_dep_version(&self, version: &Version) -> Version {
        match self {
            Override::Archive(_) | Override::Git(_) | Override::LocalPath(_) => Version::EMPTY,
            Override::SingleVersion(SingleVersionOverride {
                version: Some(pinned),
                ..
            }) => pinned.clone(),
            _ => version.clone(),
        }
    }

    /// The directive name this override was declared with, for error
    /// messages.
    pub fn directive(&self) -> &'static str {
        match self {
            Override::SingleVersion(_) => "single_version_override",
            Override::MultipleVersion(_) => "multiple_version_override",
            Override::Archive(_) => "archive_override",
            Override::Git(_) => "git_override",
            Override::LocalPath(_) => "local_path_override",
        }
    }
}
