use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use indexmap::IndexMap;
use typed_builder::TypedBuilder;
use url::Url;

use crate::core::module_file::ExtensionUsage;
use crate::core::version::Version;

pub use key::ModuleKey;
pub use name::ModuleName;
pub use repo_name::RepoName;

pub(crate) mod key;
pub(crate) mod name;
pub(crate) mod repo_name;

/// One node of the dependency graph: a module at one version, with its deps
/// resolved to concrete keys.
///
/// Values are immutable; selection rewrites deps by producing a new record
/// through [`Module::with_deps`]. See [`ModuleInner`] for public fields
/// reference.
#[derive(Clone, PartialEq)]
pub struct Module(Arc<ModuleInner>);

#[derive(TypedBuilder, Clone, PartialEq)]
#[builder(builder_type(name = ModuleBuilder))]
#[builder(builder_method(vis = ""))]
#[builder(build_method(into = Module))]
pub struct ModuleInner {
    pub key: ModuleKey,
    /// The version the module file declares. Equal to `key.version` except
    /// for modules under a non-registry override, whose key carries the
    /// empty version.
    #[builder(default = Version::EMPTY)]
    pub version: Version,
    #[builder(default)]
    pub compatibility_level: u32,
    /// Local repo name to the dep key currently selected for it, in source
    /// order. Rewritten during resolution.
    #[builder(default)]
    pub deps: IndexMap<RepoName, ModuleKey>,
    /// The same mapping as first discovered; never rewritten.
    #[builder(default)]
    pub original_deps: IndexMap<RepoName, ModuleKey>,
    /// The registry that served this module's file; `None` for the root
    /// and for modules under a non-registry override.
    #[builder(default)]
    pub registry: Option<Url>,
    #[builder(default)]
    pub extension_usages: Vec<ExtensionUsage>,
    #[builder(default)]
    pub execution_platforms_to_register: Vec<String>,
    #[builder(default)]
    pub toolchains_to_register: Vec<String>,
}

impl Deref for Module {
    type Target = ModuleInner;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

#[doc(hidden)]
impl From<ModuleInner> for Module {
    fn from(data: ModuleInner) -> Self {
        Self(Arc::new(data))
    }
}

impl Module {
    pub fn builder() -> ModuleBuilder {
        ModuleInner::builder()
    }

    pub fn name(&self) -> &ModuleName {
        &self.key.name
    }

    /// A copy of this module with `deps` structurally replaced;
    /// `original_deps` is untouched.
    pub fn with_deps(&self, deps: IndexMap<RepoName, ModuleKey>) -> Module {
        let mut inner = (*self.0).clone();
        inner.deps = deps;
        inner.into()
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.key, f)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("key", &self.key)
            .field("deps", &self.deps)
            .finish_non_exhaustive()
    }
}
