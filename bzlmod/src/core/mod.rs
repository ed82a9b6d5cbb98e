//! Core datastructures describing modules, module files, overrides and
//! registries.
//!
//! For the resolution pipeline built on top of these, see
//! [`crate::resolver`].

pub use crate::internal::bimap::{BiMap, Collision};
pub use config::ResolutionConfig;
pub use errors::{ResolveError, VersionResolutionError};
pub use integrity::{Algorithm, Integrity};
pub use module::{Module, ModuleKey, ModuleName, RepoName};
pub use module_file::{
    DepSpec, ExtensionProxy, ExtensionUsage, Location, ModuleDecl, ModuleFile, ModuleFileBuilder,
    ModuleFileParser, Tag,
};
pub use overrides::{
    ArchiveOverride, GitOverride, LocalPathOverride, MultipleVersionOverride, Override,
    OverrideMap, SingleVersionOverride,
};
pub use repo_spec::RepoSpec;
pub use version::{Version, VersionParseError};

pub(crate) mod config;
pub mod errors;
pub(crate) mod integrity;
pub(crate) mod module;
pub(crate) mod module_file;
pub(crate) mod overrides;
pub mod registry;
pub(crate) mod repo_spec;
pub(crate) mod version;
