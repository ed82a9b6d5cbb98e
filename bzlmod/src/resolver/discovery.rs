use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::core::registry::dispatch::{FetchedModuleFile, OverrideDispatch};
use crate::core::registry::RegistryResource;
use crate::core::{
    DepSpec, LocalPathOverride, Location, Module, ModuleFile, ModuleKey, ModuleName, Override,
    OverrideMap, RepoName, ResolutionConfig, ResolveError,
};
use crate::resolver::graph::DepGraph;

/// The raw dependency graph plus the effective overrides table (root
/// overrides and implicit built-in module overrides).
#[derive(Debug)]
pub struct DiscoveryOutput {
    /// Every reachable module, keyed by module key, in BFS discovery
    /// order starting at the root.
    pub graph: DepGraph,
    pub overrides: OverrideMap,
}

/// Result of one [`Discovery::advance`] call.
pub enum Advance {
    Done(DiscoveryOutput),
    /// Module files for these keys are needed before discovery can make
    /// progress. Fetch them (in any order, in parallel) and call
    /// [`Discovery::advance`] again with the results.
    Pending(Vec<ModuleKey>),
}

struct PendingFetch {
    /// The module whose dep first requested this key, for error
    /// attribution.
    parent: ModuleKey,
    /// Placeholder filled by a later [`Discovery::advance`] call.
    result: Option<FetchedModuleFile>,
}

/// Breadth-first expansion of the module graph from the root.
///
/// The engine is an explicit restartable state machine: it never fetches
/// anything itself. Each [`Discovery::advance`] call integrates previously
/// requested module files, expands the frontier, and either finishes or
/// reports the next batch of keys to fetch. All state survives between
/// calls, so a host evaluator can suspend on [`Advance::Pending`] and
/// resume with more values later; dropping the value is cancellation.
///
/// [`discover`] is the plain async driver over this machine.
pub struct Discovery {
    config: ResolutionConfig,
    overrides: OverrideMap,
    root_name: ModuleName,
    graph: DepGraph,
    /// Keys of modules inserted since the last frontier expansion.
    frontier: Vec<ModuleKey>,
    /// Requested keys, in request order; insertion order of fetched
    /// modules follows this, keeping the graph deterministic regardless
    /// of fetch completion order.
    pending: IndexMap<ModuleKey, PendingFetch>,
}

impl Discovery {
    /// Seeds discovery with the parsed root module file.
    pub fn new(mut root: ModuleFile, config: ResolutionConfig) -> Result<Self, ResolveError> {
        let mut overrides = std::mem::take(&mut root.overrides);
        let root_name = root.declared_name();

        if let Some(declared) = overrides.get(&root_name) {
            return Err(ResolveError::BadOverride {
                module: root_name.clone(),
                location: root
                    .module
                    .as_ref()
                    .map(|m| m.location.clone())
                    .unwrap_or_else(Location::builtin),
                message: format!(
                    "the root module cannot be overridden ({} declared for it)",
                    declared.directive()
                ),
            });
        }

        // Built-in modules are governed by an implicit local-path
        // override; an explicit root override for the same name wins.
        for (name, path) in &config.builtin_modules {
            if !overrides.contains_key(name) {
                overrides.insert(
                    name.clone(),
                    Override::LocalPath(LocalPathOverride { path: path.clone() }),
                );
            }
        }

        let mut discovery = Self {
            config,
            overrides,
            root_name,
            graph: DepGraph::new(),
            frontier: vec![ModuleKey::ROOT],
            pending: IndexMap::new(),
        };

        let root_module = discovery.make_module(ModuleKey::ROOT, &root, None, true)?;
        discovery.graph.insert(root_module);
        Ok(discovery)
    }

    /// The override in effect for a module name, including implicit
    /// built-in overrides.
    pub fn override_for(&self, name: &ModuleName) -> Option<&Override> {
        self.overrides.get(name)
    }

    /// The module whose dep first requested a currently pending key.
    pub fn requesting_parent(&self, key: &ModuleKey) -> Option<&ModuleKey> {
        self.pending.get(key).map(|p| &p.parent)
    }

    /// Integrates fetched module files and advances the BFS.
    ///
    /// Returns [`Advance::Pending`] with the keys still outstanding when
    /// any requested module file has not been supplied yet; the engine
    /// stores what it received and waits for the rest.
    pub fn advance(
        &mut self,
        results: Vec<(ModuleKey, FetchedModuleFile)>,
    ) -> Result<Advance, ResolveError> {
        for (key, fetched) in results {
            if let Some(pending) = self.pending.get_mut(&key) {
                pending.result = Some(fetched);
            }
        }

        let outstanding: Vec<ModuleKey> = self
            .pending
            .iter()
            .filter(|(_, p)| p.result.is_none())
            .map(|(key, _)| key.clone())
            .collect();
        if !outstanding.is_empty() {
            return Ok(Advance::Pending(outstanding));
        }

        // The whole batch is in; integrate it in request order.
        for (key, pending) in std::mem::take(&mut self.pending) {
            let fetched = pending.result.expect("all pending fetches were checked complete");
            let module = self.integrate(&key, fetched)?;
            self.graph.insert(module);
            self.frontier.push(key);
        }

        // Expand the frontier into the next request batch.
        for key in std::mem::take(&mut self.frontier) {
            let deps: Vec<ModuleKey> = self.graph[&key].deps.values().cloned().collect();
            for dep_key in deps {
                if !self.graph.contains(&dep_key) && !self.pending.contains_key(&dep_key) {
                    trace!(key = %dep_key, parent = %key, "discovered module");
                    self.pending.insert(
                        dep_key,
                        PendingFetch {
                            parent: key.clone(),
                            result: None,
                        },
                    );
                }
            }
        }

        if self.pending.is_empty() {
            Ok(Advance::Done(DiscoveryOutput {
                graph: self.graph.clone(),
                overrides: self.overrides.clone(),
            }))
        } else {
            Ok(Advance::Pending(self.pending.keys().cloned().collect()))
        }
    }

    /// Validates a fetched module file against the key it was requested
    /// for and turns it into a graph node.
    fn integrate(
        &self,
        key: &ModuleKey,
        fetched: FetchedModuleFile,
    ) -> Result<Module, ResolveError> {
        let file = &fetched.module_file;
        let location = file
            .module
            .as_ref()
            .map(|m| m.location.clone())
            .unwrap_or_else(Location::builtin);

        if !file.overrides.is_empty() {
            return Err(ResolveError::BadOverride {
                module: key.name.clone(),
                location,
                message: "only the root module may use overrides".into(),
            });
        }

        let declared_name = file.declared_name();
        if declared_name != key.name {
            return Err(ResolveError::InvalidModuleFile {
                location,
                message: format!(
                    "module file was requested for `{}` but declares module `{declared_name}`",
                    key.name
                ),
            });
        }

        // Modules under a non-registry override carry the empty key
        // version; their declared version is informational.
        let declared_version = file.declared_version();
        if !key.version.is_empty() && declared_version != key.version {
            return Err(ResolveError::InvalidModuleFile {
                location,
                message: format!(
                    "module file was requested for {key} but declares version {declared_version}"
                ),
            });
        }

        self.make_module(key.clone(), file, fetched.registry, false)
    }

    fn make_module(
        &self,
        key: ModuleKey,
        file: &ModuleFile,
        registry: Option<url::Url>,
        is_root: bool,
    ) -> Result<Module, ResolveError> {
        let keep_dev = is_root && !self.config.ignore_dev_dependencies;

        let mut original_deps: IndexMap<RepoName, ModuleKey> = IndexMap::new();
        let mut deps: IndexMap<RepoName, ModuleKey> = IndexMap::new();
        for dep in &file.deps {
            if dep.dev_dependency && !keep_dev {
                continue;
            }
            original_deps.insert(dep.repo_name.clone(), dep.key());
            deps.insert(dep.repo_name.clone(), self.rewrite_dep(dep));
        }

        for builtin in self.config.builtin_modules.keys() {
            if *builtin == key.name {
                continue;
            }
            // An explicit dep on the built-in module takes precedence
            // over injection.
            if file.deps.iter().any(|dep| &dep.name == builtin) {
                continue;
            }
            let repo_name = RepoName::new(builtin.as_str());
            let builtin_key = ModuleKey::new(builtin.clone(), crate::core::Version::EMPTY);
            original_deps.insert(repo_name.clone(), builtin_key.clone());
            deps.insert(repo_name, builtin_key);
        }

        let extension_usages = file
            .extension_usages
            .iter()
            .filter(|usage| !usage.dev_dependency || keep_dev)
            .cloned()
            .collect();

        let (execution_platforms, toolchains) = file
            .module
            .as_ref()
            .map(|decl| {
                (
                    decl.execution_platforms_to_register.clone(),
                    decl.toolchains_to_register.clone(),
                )
            })
            .unwrap_or_default();

        Ok(Module::builder()
            .key(key)
            .version(file.declared_version())
            .compatibility_level(file.compatibility_level())
            .deps(deps)
            .original_deps(original_deps)
            .registry(registry)
            .extension_usages(extension_usages)
            .execution_platforms_to_register(execution_platforms)
            .toolchains_to_register(toolchains)
            .build())
    }

    /// The override rewriting applied to every dep key: deps on the root
    /// module's name collapse onto the root key, non-registry overrides
    /// force the empty version, pinned single-version overrides force the
    /// pinned version.
    fn rewrite_dep(&self, dep: &DepSpec) -> ModuleKey {
        if !self.root_name.is_root() && dep.name == self.root_name {
            return ModuleKey::ROOT;
        }
        match self.overrides.get(&dep.name) {
            Some(declared) => {
                ModuleKey::new(dep.name.clone(), declared.rewrite_dep_version(&dep.version))
            }
            None => dep.key(),
        }
    }
}

/// Drives [`Discovery`] to completion against an [`OverrideDispatch`],
/// fetching every batch concurrently.
#[tracing::instrument(level = "trace", skip_all)]
pub async fn discover(
    root: ModuleFile,
    dispatch: &OverrideDispatch,
    config: ResolutionConfig,
) -> Result<DiscoveryOutput, ResolveError> {
    let mut discovery = Discovery::new(root, config)?;
    let mut results = Vec::new();
    loop {
        match discovery.advance(std::mem::take(&mut results))? {
            Advance::Done(output) => {
                debug!(modules = output.graph.len(), "discovery complete");
                return Ok(output);
            }
            Advance::Pending(keys) => {
                trace!(batch = keys.len(), "fetching module files");
                let discovery = &discovery;
                let fetches = keys.into_iter().map(|key| async move {
                    let declared = discovery.override_for(&key.name);
                    match dispatch.get_module_file(&key, declared).await {
                        Err(source) => Err(ResolveError::RegistryIo { source }),
                        Ok(RegistryResource::NotFound) => Err(ResolveError::MissingModule {
                            parent: discovery
                                .requesting_parent(&key)
                                .cloned()
                                .unwrap_or(ModuleKey::ROOT),
                            key,
                        }),
                        Ok(RegistryResource::Found(fetched)) => Ok((key, fetched)),
                    }
                });
                results = futures::future::try_join_all(fetches).await?;
            }
        }
    }
}
