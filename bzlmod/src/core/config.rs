use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use typed_builder::TypedBuilder;

use crate::core::module::name::ModuleName;

/// Host-supplied knobs consumed by resolution.
///
/// The registry list itself is passed separately (as constructed registry
/// objects, in precedence order); this struct carries everything else.
#[derive(Debug, Clone, TypedBuilder)]
pub struct ResolutionConfig {
    /// Drop `dev_dependency` deps and extension usages of the root module
    /// as well. (Non-root dev dependencies are always dropped.)
    #[builder(default)]
    pub ignore_dev_dependencies: bool,

    /// Built-in modules shipped with the host install, injected as
    /// implicit deps of every module other than themselves, each governed
    /// by an implicit local-path override.
    #[builder(default)]
    pub builtin_modules: IndexMap<ModuleName, Utf8PathBuf>,
}

impl ResolutionConfig {
    /// The conventional built-in module set of a host install: core tools
    /// and the platform definitions.
    pub fn with_builtin_modules_from(install_base: &Utf8Path) -> Self {
        let builtin_modules = [
            (ModuleName::new("bazel_tools"), install_base.join("embedded_tools")),
            (ModuleName::new("platforms"), install_base.join("platforms")),
        ]
        .into_iter()
        .collect();
        Self::builder().builtin_modules(builtin_modules).build()
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}
