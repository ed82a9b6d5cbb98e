use itertools::Itertools;
use thiserror::Error;

use crate::core::module::key::ModuleKey;
use crate::core::module::name::ModuleName;
use crate::core::module::repo_name::RepoName;
use crate::core::module_file::Location;
use crate::core::version::{Version, VersionParseError};

/// Any failure surfaced by module resolution.
///
/// Registry I/O failures are transient and may be retried by the host
/// evaluator; every other variant is persistent. No partial resolution
/// result exists alongside an error.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("error in module file at {location}: {message}")]
    InvalidModuleFile { location: Location, message: String },

    #[error(transparent)]
    VersionParse(#[from] VersionParseError),

    #[error("at {location}: repo name `{repo_name}` is used by both {first} and {second}")]
    RepoNameCollision {
        repo_name: RepoName,
        /// Description of the directive that claimed the name first.
        first: String,
        /// Description of the colliding directive.
        second: String,
        location: Location,
    },

    #[error("at {location}: invalid override for module `{module}`: {message}")]
    BadOverride {
        module: ModuleName,
        location: Location,
        message: String,
    },

    #[error("failed to read from registry: {source}")]
    RegistryIo {
        #[source]
        source: anyhow::Error,
    },

    #[error("module not found in registries: {key}, as requested by {parent}")]
    MissingModule { key: ModuleKey, parent: ModuleKey },

    #[error(transparent)]
    VersionResolution(#[from] VersionResolutionError),
}

impl ResolveError {
    /// Whether the host evaluator may retry the failed step.
    pub fn is_transient(&self) -> bool {
        matches!(self, ResolveError::RegistryIo { .. })
    }
}

/// A structural failure of minimal version selection.
#[derive(Debug, Error)]
pub enum VersionResolutionError {
    #[error(
        "multiple_version_override for module `{module}` allows version {version}, \
         but no module in the dependency graph has that version"
    )]
    AllowedVersionMissing { module: ModuleName, version: Version },

    #[error(
        "module {key}, as depended on by {dependant}, is not allowed by the \
         multiple_version_override on `{}`; allowed versions: [{}]",
        .key.name,
        format_versions(.allowed)
    )]
    NotAllowed {
        key: ModuleKey,
        dependant: ModuleKey,
        allowed: Vec<Version>,
    },

    #[error(
        "module `{name}` is referenced at two incompatible compatibility levels: \
         {first} (compatibility level {first_level}), depended on by {first_dependant}, \
         and {second} (compatibility level {second_level}), depended on by {second_dependant}"
    )]
    CompatibilityConflict {
        name: ModuleName,
        first: ModuleKey,
        first_level: u32,
        first_dependant: ModuleKey,
        second: ModuleKey,
        second_level: u32,
        second_dependant: ModuleKey,
    },

    #[error(
        "module {module} depends on {key} more than once, as `{first_repo}` and `{second_repo}`; \
         add a multiple_version_override for `{}` if several versions should coexist",
        .key.name
    )]
    DuplicateDepKey {
        module: ModuleKey,
        key: ModuleKey,
        first_repo: RepoName,
        second_repo: RepoName,
    },
}

fn format_versions(versions: &[Version]) -> String {
    versions.iter().map(ToString::to_string).join(", ")
}
