use std::collections::{BTreeSet, HashMap, VecDeque};

use indexmap::IndexMap;
use tracing::trace;

use crate::core::{
    ModuleKey, ModuleName, MultipleVersionOverride, Override, OverrideMap, RepoName, ResolveError,
    Version, VersionResolutionError,
};
use crate::resolver::graph::DepGraph;

/// The two graphs produced by selection.
pub struct SelectionResult {
    /// Reachable winners only, iterated in BFS order from the root.
    pub resolved: DepGraph,
    /// Every raw module with deps rewritten to winners, iterated in raw
    /// insertion order. Retains losing nodes.
    pub unpruned: DepGraph,
}

/// The unit over which minimal version selection takes the maximum.
///
/// Modules not under a multiple-version override carry the EMPTY ceiling,
/// so one group spans all versions of a name at one compatibility level.
/// Under a multiple-version override, the ceiling is the least allowed
/// version at or above the module's own version within its compatibility
/// level, splitting the name into one group per allowed version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SelectionGroup {
    name: ModuleName,
    compatibility_level: u32,
    target_allowed_version: Version,
}

/// Runs minimal version selection over the raw discovery graph: picks one
/// winner per selection group, rewrites every dep onto winners, prunes to
/// what the root can reach and validates the result.
///
/// Pure and synchronous; the input graphs are not modified.
#[tracing::instrument(level = "trace", skip_all)]
pub fn select(graph: &DepGraph, overrides: &OverrideMap) -> Result<SelectionResult, ResolveError> {
    // Every allowed version of a multiple_version_override must exist in
    // the discovered graph; this also guarantees each selection group's
    // winner is exactly its allowed ceiling.
    for (name, mvo) in multiple_version_overrides(overrides) {
        for version in &mvo.versions {
            let key = ModuleKey::new(name.clone(), version.clone());
            if !graph.contains(&key) {
                return Err(VersionResolutionError::AllowedVersionMissing {
                    module: name.clone(),
                    version: version.clone(),
                }
                .into());
            }
        }
    }

    // Allowed versions per (name, compatibility level). The EMPTY ceiling
    // sentinel is implicit: a module above every allowed version of its
    // level falls back to it.
    let mut allowed_by_level: HashMap<(ModuleName, u32), BTreeSet<Version>> = HashMap::new();
    for (name, mvo) in multiple_version_overrides(overrides) {
        for version in &mvo.versions {
            let level = graph[&ModuleKey::new(name.clone(), version.clone())].compatibility_level;
            allowed_by_level
                .entry((name.clone(), level))
                .or_default()
                .insert(version.clone());
        }
    }

    let group_of = |key: &ModuleKey| -> SelectionGroup {
        let module = &graph[key];
        let target_allowed_version = if multiple_version_overrides(overrides)
            .any(|(name, _)| name == &key.name)
        {
            allowed_by_level
                .get(&(key.name.clone(), module.compatibility_level))
                .and_then(|allowed| allowed.range(key.version.clone()..).next().cloned())
                .unwrap_or(Version::EMPTY)
        } else {
            Version::EMPTY
        };
        SelectionGroup {
            name: key.name.clone(),
            compatibility_level: module.compatibility_level,
            target_allowed_version,
        }
    };

    let groups: IndexMap<ModuleKey, SelectionGroup> =
        graph.keys().map(|key| (key.clone(), group_of(key))).collect();

    // Minimal version selection: the winner of each group is the maximum
    // version present in the graph.
    let mut winners: HashMap<&SelectionGroup, &Version> = HashMap::new();
    for (key, group) in &groups {
        winners
            .entry(group)
            .and_modify(|winner| {
                if key.version > **winner {
                    *winner = &key.version;
                }
            })
            .or_insert(&key.version);
    }

    let rewrite = |dep_key: &ModuleKey| -> ModuleKey {
        let group = groups
            .get(dep_key)
            .expect("dep keys always reference modules present in the raw graph");
        ModuleKey::new(dep_key.name.clone(), (*winners[group]).clone())
    };

    let mut unpruned = DepGraph::new();
    for (_, module) in graph {
        let deps = module
            .deps
            .iter()
            .map(|(repo, dep_key)| (repo.clone(), rewrite(dep_key)))
            .collect();
        unpruned.insert(module.with_deps(deps));
    }

    // Walk the winners reachable from the root, in BFS order. Everything
    // else is dropped, including winners whose only path ran through a
    // loser. The walk order is the resolved graph's iteration order.
    let mut resolved = DepGraph::new();
    let mut reached_names: HashMap<ModuleName, (ModuleKey, u32, ModuleKey)> = HashMap::new();
    let mut queue: VecDeque<ModuleKey> = VecDeque::new();

    resolved.insert(unpruned[&ModuleKey::ROOT].clone());
    reached(graph, overrides, &groups, &mut reached_names, &ModuleKey::ROOT, &ModuleKey::ROOT)?;
    queue.push_back(ModuleKey::ROOT);

    while let Some(key) = queue.pop_front() {
        let module = unpruned[&key].clone();

        let mut dep_repos: HashMap<ModuleKey, RepoName> = HashMap::new();
        for (repo, dep_key) in &module.deps {
            if let Some(first_repo) = dep_repos.get(dep_key) {
                return Err(VersionResolutionError::DuplicateDepKey {
                    module: key.clone(),
                    key: dep_key.clone(),
                    first_repo: first_repo.clone(),
                    second_repo: repo.clone(),
                }
                .into());
            }
            dep_repos.insert(dep_key.clone(), repo.clone());

            if !resolved.contains(dep_key) {
                trace!(key = %dep_key, dependant = %key, "selected module");
                resolved.insert(unpruned[dep_key].clone());
                reached(graph, overrides, &groups, &mut reached_names, dep_key, &key)?;
                queue.push_back(dep_key.clone());
            }
        }
    }

    Ok(SelectionResult { resolved, unpruned })
}

/// Validation applied to every module the pruning walk reaches: the
/// multiple-version ceiling check and the compatibility level conflict
/// check.
fn reached(
    graph: &DepGraph,
    overrides: &OverrideMap,
    groups: &IndexMap<ModuleKey, SelectionGroup>,
    reached_names: &mut HashMap<ModuleName, (ModuleKey, u32, ModuleKey)>,
    key: &ModuleKey,
    dependant: &ModuleKey,
) -> Result<(), VersionResolutionError> {
    let group = &groups[key];

    match overrides.get(&key.name) {
        Some(Override::MultipleVersion(mvo)) => {
            // The root can never be subject to a multiple-version
            // override, so a dependant always exists here.
            if group.target_allowed_version.is_empty() {
                return Err(VersionResolutionError::NotAllowed {
                    key: key.clone(),
                    dependant: dependant.clone(),
                    allowed: mvo.versions.clone(),
                });
            }
        }
        _ => {
            // Several versions of one name may survive selection only
            // under a multiple-version override; otherwise reaching a
            // second compatibility level is a conflict (a second version
            // at the same level cannot happen, it would have lost its
            // selection group).
            let level = graph[key].compatibility_level;
            match reached_names.get(&key.name) {
                None => {
                    reached_names
                        .insert(key.name.clone(), (key.clone(), level, dependant.clone()));
                }
                Some((first, first_level, first_dependant)) => {
                    if *first_level != level {
                        return Err(VersionResolutionError::CompatibilityConflict {
                            name: key.name.clone(),
                            first: first.clone(),
                            first_level: *first_level,
                            first_dependant: first_dependant.clone(),
                            second: key.clone(),
                            second_level: level,
                            second_dependant: dependant.clone(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

fn multiple_version_overrides(
    overrides: &OverrideMap,
) -> impl Iterator<Item = (&ModuleName, &MultipleVersionOverride)> {
    overrides.iter().filter_map(|(name, declared)| match declared {
        Override::MultipleVersion(mvo) => Some((name, mvo)),
        _ => None,
    })
}
