use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use smol_str::SmolStr;

use crate::core::errors::ResolveError;
use crate::core::module::name::ModuleName;
use crate::core::module::repo_name::RepoName;
use crate::core::overrides::{MultipleVersionOverride, Override, OverrideMap};
use crate::core::version::Version;
use crate::internal::bimap::Collision;

pub use extension::{ExtensionUsage, Tag};

mod extension;

/// A source location (`file:line:column`) carried by parsed directives for
/// error attribution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Location {
    pub file: SmolStr,
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn new(file: impl Into<SmolStr>, line: u32, column: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column,
        }
    }

    /// The location of directives synthesized by the resolver itself, such
    /// as implicit built-in module deps.
    pub fn builtin() -> Self {
        Self::new("<builtin>", 0, 0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

impl Serialize for Location {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// The `module()` directive of a module file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDecl {
    pub name: ModuleName,
    pub version: Version,
    pub compatibility_level: u32,
    /// Absolute target patterns (starting with `//` or `@`).
    pub execution_platforms_to_register: Vec<String>,
    /// Absolute target patterns (starting with `//` or `@`).
    pub toolchains_to_register: Vec<String>,
    pub location: Location,
}

/// One `bazel_dep()` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepSpec {
    pub name: ModuleName,
    pub version: Version,
    /// The local repo name the dep is visible under; defaults to the dep's
    /// module name.
    pub repo_name: RepoName,
    pub dev_dependency: bool,
    pub location: Location,
}

impl DepSpec {
    pub fn key(&self) -> crate::core::ModuleKey {
        crate::core::ModuleKey::new(self.name.clone(), self.version.clone())
    }
}

/// The parsed form of a `MODULE.bazel` file, as produced by the host's
/// Starlark-like evaluator through [`ModuleFileBuilder`].
///
/// This type records directives; it knows nothing of registries or
/// resolution. Dev dependencies are retained here and filtered during
/// discovery.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModuleFile {
    /// The `module()` declaration; may be absent only for a terminal root
    /// module file.
    pub module: Option<ModuleDecl>,
    pub deps: Vec<DepSpec>,
    /// Overrides declared in this file. Only the root module file may
    /// declare any; enforced during discovery.
    pub overrides: OverrideMap,
    pub extension_usages: Vec<ExtensionUsage>,
}

impl ModuleFile {
    pub fn builder() -> ModuleFileBuilder {
        ModuleFileBuilder::default()
    }

    /// The declared name, or the reserved root name when `module()` was
    /// not called.
    pub fn declared_name(&self) -> ModuleName {
        self.module
            .as_ref()
            .map(|m| m.name.clone())
            .unwrap_or(ModuleName::ROOT)
    }

    /// The declared version, or the empty version when `module()` was not
    /// called.
    pub fn declared_version(&self) -> Version {
        self.module
            .as_ref()
            .map(|m| m.version.clone())
            .unwrap_or(Version::EMPTY)
    }

    pub fn compatibility_level(&self) -> u32 {
        self.module.as_ref().map(|m| m.compatibility_level).unwrap_or(0)
    }
}

/// The seam to the host's Starlark-like evaluator: turns raw module file
/// bytes into the parsed form.
///
/// Registries hand every fetched `MODULE.bazel` to this; interpreting the
/// file is out of the resolver's scope.
pub trait ModuleFileParser: Send + Sync {
    /// Parse module file content. `file` is the display name used in
    /// directive [`Location`]s.
    fn parse(&self, content: &[u8], file: &str) -> anyhow::Result<ModuleFile>;
}

/// Records module file directives, in source order, with the directive
/// semantics of the module file format: `module()` at most once, unique
/// repo names, root-only override rules, injective extension imports.
///
/// This is the seam between the out-of-scope Starlark evaluator and the
/// resolver: the evaluator calls one method per directive it encounters.
#[derive(Debug, Default)]
pub struct ModuleFileBuilder {
    module: Option<ModuleDecl>,
    deps: Vec<DepSpec>,
    overrides: OverrideMap,
    usages: Vec<ExtensionUsage>,
    // Tracks every claimed local repo name with a description of its first
    // user, for collision messages.
    repo_names: IndexMap<RepoName, String>,
}

/// Handle to one `use_extension()` result; passed back to
/// [`ModuleFileBuilder::tag`] and [`ModuleFileBuilder::use_repo`].
#[derive(Debug, Clone, Copy)]
pub struct ExtensionProxy(usize);

impl ModuleFileBuilder {
    /// The `module()` directive. May be called at most once.
    pub fn module(
        &mut self,
        name: ModuleName,
        version: Version,
        compatibility_level: u32,
        execution_platforms_to_register: Vec<String>,
        toolchains_to_register: Vec<String>,
        location: Location,
    ) -> Result<(), ResolveError> {
        if let Some(existing) = &self.module {
            return Err(ResolveError::InvalidModuleFile {
                location,
                message: format!(
                    "the module() directive can only be called once, first called at {}",
                    existing.location
                ),
            });
        }
        for pattern in execution_platforms_to_register
            .iter()
            .chain(toolchains_to_register.iter())
        {
            if !(pattern.starts_with("//") || pattern.starts_with('@')) {
                return Err(ResolveError::InvalidModuleFile {
                    location,
                    message: format!(
                        "target pattern `{pattern}` must be absolute, starting with `//` or `@`"
                    ),
                });
            }
        }
        self.module = Some(ModuleDecl {
            name,
            version,
            compatibility_level,
            execution_platforms_to_register,
            toolchains_to_register,
            location,
        });
        Ok(())
    }

    /// The `bazel_dep()` directive. Pass the dep's module name as
    /// `repo_name` when the directive did not rename it.
    pub fn bazel_dep(
        &mut self,
        name: ModuleName,
        version: Version,
        repo_name: RepoName,
        dev_dependency: bool,
        location: Location,
    ) -> Result<(), ResolveError> {
        let dep = DepSpec {
            name,
            version,
            repo_name: repo_name.clone(),
            dev_dependency,
            location,
        };
        self.claim_repo_name(repo_name, format!("bazel_dep on {}", dep.key()), &dep.location)?;
        self.deps.push(dep);
        Ok(())
    }

    /// The `use_extension()` directive. Tags and imports are attached to
    /// the returned proxy through [`ModuleFileBuilder::tag`] and
    /// [`ModuleFileBuilder::use_repo`].
    pub fn use_extension(
        &mut self,
        extension_bzl_file: impl Into<String>,
        extension_name: impl Into<SmolStr>,
        dev_dependency: bool,
        location: Location,
    ) -> ExtensionProxy {
        self.usages.push(ExtensionUsage {
            extension_bzl_file: extension_bzl_file.into(),
            extension_name: extension_name.into(),
            location,
            imports: Default::default(),
            tags: Vec::new(),
            dev_dependency,
        });
        ExtensionProxy(self.usages.len() - 1)
    }

    /// A `proxy.<tag_name>(**attrs)` call.
    pub fn tag(
        &mut self,
        proxy: ExtensionProxy,
        tag_name: impl Into<SmolStr>,
        attrs: IndexMap<SmolStr, serde_json::Value>,
        location: Location,
    ) {
        self.usages[proxy.0].tags.push(Tag {
            tag_name: tag_name.into(),
            attrs,
            location,
        });
    }

    /// The `use_repo()` directive. Positional arguments of the source form
    /// are passed as pairs importing an exported name under itself.
    pub fn use_repo(
        &mut self,
        proxy: ExtensionProxy,
        imports: impl IntoIterator<Item = (RepoName, SmolStr)>,
        location: Location,
    ) -> Result<(), ResolveError> {
        for (local_name, exported_name) in imports {
            let usage = &self.usages[proxy.0];
            if usage.imports.contains_value(&exported_name) {
                return Err(ResolveError::InvalidModuleFile {
                    location,
                    message: format!(
                        "extension `{}` repo `{exported_name}` is imported more than once",
                        usage.extension_name
                    ),
                });
            }
            let description = format!("use_repo of extension `{}`", usage.extension_name);
            self.claim_repo_name(local_name.clone(), description, &location)?;
            match self.usages[proxy.0].imports.try_insert(local_name, exported_name) {
                Ok(()) => {}
                // Key collisions are caught by the claim above; value
                // collisions by the check before it.
                Err(Collision::Key | Collision::Value) => unreachable!(),
            }
        }
        Ok(())
    }

    /// The `single_version_override()`, `multiple_version_override()`,
    /// `archive_override()`, `git_override()` and `local_path_override()`
    /// directives.
    pub fn add_override(
        &mut self,
        module_name: ModuleName,
        value: Override,
        location: Location,
    ) -> Result<(), ResolveError> {
        if let Override::MultipleVersion(MultipleVersionOverride { versions, .. }) = &value {
            if versions.len() < 2 {
                return Err(ResolveError::BadOverride {
                    module: module_name,
                    location,
                    message: "multiple_version_override must name at least 2 versions".into(),
                });
            }
            for (ix, version) in versions.iter().enumerate() {
                if versions[..ix].contains(version) {
                    return Err(ResolveError::BadOverride {
                        module: module_name,
                        location,
                        message: format!(
                            "multiple_version_override lists version {version} more than once"
                        ),
                    });
                }
            }
        }
        if let Some(existing) = self.overrides.get(&module_name) {
            return Err(ResolveError::BadOverride {
                module: module_name.clone(),
                location,
                message: format!(
                    "module already has a {} override; only one override per module is allowed",
                    existing.directive()
                ),
            });
        }
        self.overrides.insert(module_name, value);
        Ok(())
    }

    pub fn build(self) -> ModuleFile {
        ModuleFile {
            module: self.module,
            deps: self.deps,
            overrides: self.overrides,
            extension_usages: self.usages,
        }
    }

    fn claim_repo_name(
        &mut self,
        repo_name: RepoName,
        description: String,
        location: &Location,
    ) -> Result<(), ResolveError> {
        if let Some(first) = self.repo_names.get(&repo_name) {
            return Err(ResolveError::RepoNameCollision {
                repo_name,
                first: first.clone(),
                second: description,
                location: location.clone(),
            });
        }
        self.repo_names.insert(repo_name, description);
        Ok(())
    }
}
