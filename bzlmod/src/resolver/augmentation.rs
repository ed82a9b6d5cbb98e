use std::collections::BTreeSet;

use indexmap::IndexMap;
use petgraph::graph::{Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;

use crate::core::{ModuleKey, ModuleName, Override, OverrideMap, RepoName, Version};
use crate::internal::bimap::BiMap;
use crate::resolver::graph::DepGraph;

/// Why a module's dep resolved to the key it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionReason {
    /// The dep resolved to exactly the key the module file asked for.
    Original,
    MinimalVersionSelection,
    SingleVersionOverride,
    MultipleVersionOverride,
    ArchiveOverride,
    GitOverride,
    LocalPathOverride,
}

impl From<&Override> for ResolutionReason {
    fn from(declared: &Override) -> Self {
        match declared {
            Override::SingleVersion(_) => ResolutionReason::SingleVersionOverride,
            Override::MultipleVersion(_) => ResolutionReason::MultipleVersionOverride,
            Override::Archive(_) => ResolutionReason::ArchiveOverride,
            Override::Git(_) => ResolutionReason::GitOverride,
            Override::LocalPath(_) => ResolutionReason::LocalPathOverride,
        }
    }
}

/// A module as seen by diagnostic tooling: both directions of every dep
/// relation, before and after resolution, and the reason each dep landed
/// where it did.
///
/// Entries exist for modules that were never fetched as well (a dep
/// rewritten away by an override before discovery could request it);
/// those carry `loaded == false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AugmentedModule {
    pub key: ModuleKey,
    pub name: ModuleName,
    pub version: Version,
    /// Whether this module's file was actually fetched.
    pub loaded: bool,
    /// Modules whose resolved deps point at this one.
    pub dependants: BTreeSet<ModuleKey>,
    /// Modules whose module files asked for this exact key, including
    /// modules later pruned.
    pub original_dependants: BTreeSet<ModuleKey>,
    /// Resolved deps: local repo name to selected key.
    pub deps: BiMap<RepoName, ModuleKey>,
    /// Original dep keys that did not survive into the resolved graph.
    pub unused_deps: BiMap<RepoName, ModuleKey>,
    pub dep_reasons: IndexMap<RepoName, ResolutionReason>,
}

impl AugmentedModule {
    /// Whether anything in the resolved graph still depends on this
    /// module. The root is always used.
    pub fn is_used(&self) -> bool {
        self.key.is_root() || !self.dependants.is_empty()
    }
}

/// The inspection model: every module of the unpruned graph (plus
/// never-fetched phantom keys), augmented with dependants and resolution
/// reasons, with a secondary index by module name.
#[derive(Debug)]
pub struct AugmentedGraph {
    modules: IndexMap<ModuleKey, AugmentedModule>,
    by_name: IndexMap<ModuleName, BTreeSet<ModuleKey>>,
}

impl AugmentedGraph {
    /// Joins the three resolution graphs into the inspection model.
    pub fn new(
        raw: &DepGraph,
        unpruned: &DepGraph,
        resolved: &DepGraph,
        overrides: &OverrideMap,
    ) -> Self {
        // The dep relations as an arena graph: an edge per dep, tagged
        // with whether it is an original or a resolved relation. Both
        // dependant directions fall out of one pass over the edges.
        let mut arena: Graph<ModuleKey, EdgeKind> = Graph::new();
        let mut nodes: IndexMap<ModuleKey, NodeIndex> = IndexMap::new();
        let mut node = |arena: &mut Graph<ModuleKey, EdgeKind>, key: &ModuleKey| -> NodeIndex {
            *nodes
                .entry(key.clone())
                .or_insert_with(|| arena.add_node(key.clone()))
        };

        for (key, _) in unpruned {
            node(&mut arena, key);
        }
        for (key, module) in raw {
            let from = node(&mut arena, key);
            for original_key in module.original_deps.values() {
                let to = node(&mut arena, original_key);
                arena.add_edge(from, to, EdgeKind::Original);
            }
        }
        for (key, module) in resolved {
            let from = node(&mut arena, key);
            for dep_key in module.deps.values() {
                let to = node(&mut arena, dep_key);
                arena.add_edge(from, to, EdgeKind::Resolved);
            }
        }

        let mut modules: IndexMap<ModuleKey, AugmentedModule> = IndexMap::new();
        for (key, index) in &nodes {
            let mut dependants = BTreeSet::new();
            let mut original_dependants = BTreeSet::new();
            for edge in arena.edges_directed(*index, Direction::Incoming) {
                let dependant = arena[edge.source()].clone();
                match edge.weight() {
                    EdgeKind::Original => original_dependants.insert(dependant),
                    EdgeKind::Resolved => dependants.insert(dependant),
                };
            }

            let augmented = match unpruned.get(key) {
                Some(module) => {
                    let mut deps = BiMap::new();
                    let mut unused_deps = BiMap::new();
                    let mut dep_reasons = IndexMap::new();
                    for (repo, resolved_key) in &module.deps {
                        // First entry wins if an unchecked unused module
                        // maps two repos onto one winner.
                        let _ = deps.try_insert(repo.clone(), resolved_key.clone());
                        let original_key = &module.original_deps[repo];
                        let reason = if resolved_key == original_key {
                            ResolutionReason::Original
                        } else if let Some(declared) = overrides.get(&original_key.name) {
                            ResolutionReason::from(declared)
                        } else {
                            ResolutionReason::MinimalVersionSelection
                        };
                        dep_reasons.insert(repo.clone(), reason);
                        if resolved_key != original_key {
                            let _ = unused_deps.try_insert(repo.clone(), original_key.clone());
                        }
                    }
                    AugmentedModule {
                        key: key.clone(),
                        name: key.name.clone(),
                        version: module.version.clone(),
                        loaded: true,
                        dependants,
                        original_dependants,
                        deps,
                        unused_deps,
                        dep_reasons,
                    }
                }
                // A phantom: some module file asked for this key, but an
                // override rewrote the dep before it was ever fetched.
                None => AugmentedModule {
                    key: key.clone(),
                    name: key.name.clone(),
                    version: key.version.clone(),
                    loaded: false,
                    dependants,
                    original_dependants,
                    deps: BiMap::new(),
                    unused_deps: BiMap::new(),
                    dep_reasons: IndexMap::new(),
                },
            };
            modules.insert(key.clone(), augmented);
        }

        let mut by_name: IndexMap<ModuleName, BTreeSet<ModuleKey>> = IndexMap::new();
        for key in modules.keys() {
            by_name.entry(key.name.clone()).or_default().insert(key.clone());
        }

        Self { modules, by_name }
    }

    pub fn get(&self, key: &ModuleKey) -> Option<&AugmentedModule> {
        self.modules.get(key)
    }

    /// Every augmented module, unpruned-graph order first, phantom keys
    /// after.
    pub fn modules(&self) -> impl Iterator<Item = &AugmentedModule> {
        self.modules.values()
    }

    /// All keys ever seen for a module name.
    pub fn keys_with_name(&self, name: &ModuleName) -> impl Iterator<Item = &ModuleKey> {
        self.by_name.get(name).into_iter().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EdgeKind {
    Original,
    Resolved,
}
