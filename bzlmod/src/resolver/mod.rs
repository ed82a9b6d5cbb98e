use tracing::instrument;

use crate::core::registry::dispatch::OverrideDispatch;
use crate::core::{ModuleFile, OverrideMap, ResolutionConfig, ResolveError};

pub use augmentation::{AugmentedGraph, AugmentedModule, ResolutionReason};
pub use discovery::{discover, Advance, Discovery, DiscoveryOutput};
pub use graph::DepGraph;
pub use selection::{select, SelectionResult};

mod augmentation;
mod discovery;
mod graph;
mod selection;

/// The result of a complete module resolution.
///
/// All three graph stages are retained so diagnostic tooling can answer
/// "why" questions through [`Resolution::inspect`]; build execution only
/// needs [`Resolution::resolved`].
pub struct Resolution {
    /// Discovery output before selection, in BFS discovery order.
    pub raw: DepGraph,
    /// Deps rewritten to winners, losing nodes retained, in raw insertion
    /// order.
    pub unpruned: DepGraph,
    /// The final graph: winners reachable from the root, in BFS order.
    pub resolved: DepGraph,
    /// The effective overrides table (root declarations plus implicit
    /// built-in module overrides).
    pub overrides: OverrideMap,
}

impl Resolution {
    /// Builds the augmented bidirectional graph for diagnostic queries.
    pub fn inspect(&self) -> AugmentedGraph {
        AugmentedGraph::new(&self.raw, &self.unpruned, &self.resolved, &self.overrides)
    }
}

/// Resolves the full module dependency graph of a root module file.
///
/// # Arguments
///
/// * `root` - the parsed root module file. This is the only module file
///   allowed to carry overrides; they steer the whole resolution.
///
/// * `dispatch` - access to module files: the configured registries (in
///   precedence order) plus the host's non-registry fetcher. Expected to
///   be idempotent over the lifetime of one resolution.
///
/// * `config` - the remaining host knobs (dev dependency policy, built-in
///   module set).
///
/// On failure no partial result is returned; transient registry failures
/// are distinguished by [`ResolveError::is_transient`].
#[instrument(level = "trace", skip_all)]
pub async fn resolve(
    root: ModuleFile,
    dispatch: &OverrideDispatch,
    config: ResolutionConfig,
) -> Result<Resolution, ResolveError> {
    let DiscoveryOutput { graph: raw, overrides } = discovery::discover(root, dispatch, config).await?;
    let SelectionResult { resolved, unpruned } = selection::select(&raw, &overrides)?;
    Ok(Resolution {
        raw,
        unpruned,
        resolved,
        overrides,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use camino::Utf8PathBuf;
    use similar_asserts::assert_serde_eq;

    use super::{ResolutionReason, Resolution};
    use crate::core::registry::dispatch::OverrideDispatch;
    use crate::core::registry::mock::{deps, keys, registry, LocalOverrideFiles, MockRegistry};
    use crate::core::registry::RegistryChain;
    use crate::core::{
        DepSpec, LocalPathOverride, Location, ModuleDecl, ModuleFile, ModuleKey, ModuleName,
        MultipleVersionOverride, Override, RepoName, ResolutionConfig, ResolveError,
        SingleVersionOverride, Version,
    };

    fn key(display: &str) -> ModuleKey {
        ModuleKey::from_display_str(display).unwrap()
    }

    fn version(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    fn module_file(name: &str, version_text: &str, deps: Vec<DepSpec>) -> ModuleFile {
        ModuleFile {
            module: Some(ModuleDecl {
                name: ModuleName::new(name),
                version: version(version_text),
                compatibility_level: 0,
                execution_platforms_to_register: vec![],
                toolchains_to_register: vec![],
                location: Location::builtin(),
            }),
            deps,
            ..Default::default()
        }
    }

    fn root_file(deps: Vec<DepSpec>) -> ModuleFile {
        module_file("a", "0.1", deps)
    }

    fn root_with_overrides(
        deps: Vec<DepSpec>,
        overrides: Vec<(&str, Override)>,
    ) -> ModuleFile {
        let mut file = root_file(deps);
        for (name, declared) in overrides {
            file.overrides.insert(ModuleName::new(name), declared);
        }
        file
    }

    fn multiple_versions(versions: &[&str]) -> Override {
        Override::MultipleVersion(MultipleVersionOverride {
            versions: versions.iter().map(|v| version(v)).collect(),
            registry: None,
        })
    }

    fn run(registry: MockRegistry, root: ModuleFile) -> Result<Resolution, ResolveError> {
        run_with_fetcher(registry, root, LocalOverrideFiles::new())
    }

    fn run_with_fetcher(
        registry: MockRegistry,
        root: ModuleFile,
        fetcher: LocalOverrideFiles,
    ) -> Result<Resolution, ResolveError> {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let dispatch = OverrideDispatch::new(
            RegistryChain::new(vec![Arc::new(registry)]),
            Box::new(fetcher),
        );
        runtime.block_on(super::resolve(root, &dispatch, ResolutionConfig::default()))
    }

    fn check(registry: MockRegistry, root: ModuleFile, expected: Result<Vec<ModuleKey>, &str>) {
        check_with_fetcher(registry, root, LocalOverrideFiles::new(), expected)
    }

    fn check_with_fetcher(
        registry: MockRegistry,
        root: ModuleFile,
        fetcher: LocalOverrideFiles,
        expected: Result<Vec<ModuleKey>, &str>,
    ) {
        let actual = run_with_fetcher(registry, root, fetcher)
            .map(|resolution| resolution.resolved.keys().cloned().collect::<Vec<_>>())
            .map_err(|e| e.to_string());
        let expected = expected.map_err(str::to_string);
        assert_serde_eq!(expected, actual);
    }

    #[test]
    fn no_deps() {
        check(registry![], root_file(deps![]), Ok(keys!["<root>"]));
    }

    #[test]
    fn single_dep_chain() {
        check(
            registry![("b@1.0", [("c", "1.0")]), ("c@1.0", [])],
            root_file(deps![("b", "1.0")]),
            Ok(keys!["<root>", "b@1.0", "c@1.0"]),
        );
    }

    #[test]
    fn simple_diamond() {
        check(
            registry![
                ("b@1.0", [("d", "1.0")]),
                ("c@2.0", [("d", "2.0")]),
                ("d@1.0", 1, []),
                ("d@2.0", 1, []),
            ],
            root_file(deps![("b", "1.0"), ("c", "2.0")]),
            Ok(keys!["<root>", "b@1.0", "c@2.0", "d@2.0"]),
        );
    }

    #[test]
    fn simple_diamond_rewrites_the_losing_dep() {
        let resolution = run(
            registry![
                ("b@1.0", [("d", "1.0")]),
                ("c@2.0", [("d", "2.0")]),
                ("d@1.0", 1, []),
                ("d@2.0", 1, []),
            ],
            root_file(deps![("b", "1.0"), ("c", "2.0")]),
        )
        .unwrap();

        let b = &resolution.resolved[&key("b@1.0")];
        assert_eq!(b.deps[&RepoName::new("d")], key("d@2.0"));
        assert_eq!(b.original_deps[&RepoName::new("d")], key("d@1.0"));

        // The unpruned graph retains the loser, also rewritten, in raw
        // insertion order.
        let unpruned: Vec<_> = resolution.unpruned.keys().cloned().collect();
        let raw: Vec<_> = resolution.raw.keys().cloned().collect();
        assert_serde_eq!(unpruned, raw);
        assert!(resolution.unpruned.contains(&key("d@1.0")));
    }

    #[test]
    fn further_removal() {
        // E's only path runs through the losing D; it is dropped even
        // though it won its own (singleton) selection group.
        check(
            registry![
                ("b@1.0", [("d", "1.0")]),
                ("c@2.0", [("d", "2.0")]),
                ("d@1.0", 1, [("e", "1.0")]),
                ("d@2.0", 1, []),
                ("e@1.0", []),
            ],
            root_file(deps![("b", "1.0"), ("c", "2.0")]),
            Ok(keys!["<root>", "b@1.0", "c@2.0", "d@2.0"]),
        );
    }

    #[test]
    fn cycle_introduced_by_selection() {
        check(
            registry![
                ("b@1.0", [("c", "2.0")]),
                ("c@2.0", [("b", "1.0-pre")]),
                ("b@1.0-pre", [("d", "1.0")]),
                ("d@1.0", []),
            ],
            root_file(deps![("b", "1.0")]),
            Ok(keys!["<root>", "b@1.0", "c@2.0"]),
        );
    }

    #[test]
    fn cycle_introduced_by_selection_rewrites_the_backedge() {
        let resolution = run(
            registry![
                ("b@1.0", [("c", "2.0")]),
                ("c@2.0", [("b", "1.0-pre")]),
                ("b@1.0-pre", [("d", "1.0")]),
                ("d@1.0", []),
            ],
            root_file(deps![("b", "1.0")]),
        )
        .unwrap();

        let c = &resolution.resolved[&key("c@2.0")];
        assert_eq!(c.deps[&RepoName::new("b")], key("b@1.0"));
        assert!(!resolution.resolved.contains(&key("d@1.0")));
    }

    #[test]
    fn compatibility_conflict() {
        check(
            registry![
                ("b@1.0", [("d", "1.0")]),
                ("c@2.0", [("d", "2.0")]),
                ("d@1.0", 1, []),
                ("d@2.0", 2, []),
            ],
            root_file(deps![("b", "1.0"), ("c", "2.0")]),
            Err("module `d` is referenced at two incompatible compatibility levels: \
                 d@1.0 (compatibility level 1), depended on by b@1.0, \
                 and d@2.0 (compatibility level 2), depended on by c@2.0"),
        );
    }

    #[test]
    fn multiple_version_override_snapping() {
        let registry = registry![
            ("m1@1.0", [("c", "1.0")]),
            ("m2@1.0", [("c", "1.3")]),
            ("m3@1.0", [("c", "1.5")]),
            ("m4@1.0", [("c", "1.7")]),
            ("m5@1.0", [("c", "2.0")]),
            ("c@1.0", []),
            ("c@1.3", []),
            ("c@1.5", []),
            ("c@1.7", []),
            ("c@2.0", []),
        ];
        let root = root_with_overrides(
            deps![("m1", "1.0"), ("m2", "1.0"), ("m3", "1.0"), ("m4", "1.0"), ("m5", "1.0")],
            vec![("c", multiple_versions(&["1.3", "1.7", "2.0"]))],
        );

        check(
            registry,
            root.clone(),
            Ok(keys![
                "<root>", "m1@1.0", "m2@1.0", "m3@1.0", "m4@1.0", "m5@1.0", "c@1.3", "c@1.7",
                "c@2.0",
            ]),
        );

        let registry = registry![
            ("m1@1.0", [("c", "1.0")]),
            ("m2@1.0", [("c", "1.3")]),
            ("m3@1.0", [("c", "1.5")]),
            ("m4@1.0", [("c", "1.7")]),
            ("m5@1.0", [("c", "2.0")]),
            ("c@1.0", []),
            ("c@1.3", []),
            ("c@1.5", []),
            ("c@1.7", []),
            ("c@2.0", []),
        ];
        let resolution = run(registry, root).unwrap();
        let dep_of = |m: &str| resolution.resolved[&key(m)].deps[&RepoName::new("c")].clone();
        assert_eq!(dep_of("m1@1.0"), key("c@1.3"));
        assert_eq!(dep_of("m2@1.0"), key("c@1.3"));
        assert_eq!(dep_of("m3@1.0"), key("c@1.7"));
        assert_eq!(dep_of("m4@1.0"), key("c@1.7"));
        assert_eq!(dep_of("m5@1.0"), key("c@2.0"));
    }

    #[test]
    fn version_not_allowed_by_multiple_version_override() {
        check(
            registry![
                ("m1@1.0", [("c", "1.3")]),
                ("m2@1.0", [("c", "2.0")]),
                ("m3@1.0", [("c", "3.0")]),
                ("c@1.3", []),
                ("c@2.0", []),
                ("c@3.0", []),
            ],
            root_with_overrides(
                deps![("m1", "1.0"), ("m2", "1.0"), ("m3", "1.0")],
                vec![("c", multiple_versions(&["1.3", "2.0"]))],
            ),
            Err("module c@3.0, as depended on by m3@1.0, is not allowed by the \
                 multiple_version_override on `c`; allowed versions: [1.3, 2.0]"),
        );
    }

    #[test]
    fn allowed_version_absent_from_the_graph() {
        check(
            registry![("m1@1.0", [("c", "1.3")]), ("c@1.3", [])],
            root_with_overrides(
                deps![("m1", "1.0")],
                vec![("c", multiple_versions(&["1.3", "2.0"]))],
            ),
            Err("multiple_version_override for module `c` allows version 2.0, \
                 but no module in the dependency graph has that version"),
        );
    }

    #[test]
    fn two_repo_names_for_one_resolved_key() {
        check(
            registry![("d@1.0", []), ("d@2.0", [])],
            root_file(deps![("d", "1.0", "dep1"), ("d", "2.0", "dep2")]),
            Err("module <root> depends on d@2.0 more than once, as `dep1` and `dep2`; \
                 add a multiple_version_override for `d` if several versions should coexist"),
        );
    }

    #[test]
    fn single_version_override_pins_the_version() {
        let resolution = run(
            registry![("b@1.0", [("c", "1.0")]), ("c@2.0", [])],
            root_with_overrides(
                deps![("b", "1.0")],
                vec![(
                    "c",
                    Override::SingleVersion(SingleVersionOverride {
                        version: Some(version("2.0")),
                        ..Default::default()
                    }),
                )],
            ),
        )
        .unwrap();

        let resolved: Vec<_> = resolution.resolved.keys().cloned().collect();
        assert_serde_eq!(resolved, keys!["<root>", "b@1.0", "c@2.0"]);
        // c@1.0 was rewritten away before it was ever requested.
        assert!(!resolution.raw.contains(&key("c@1.0")));
    }

    #[test]
    fn local_path_override() {
        let mut fetcher = LocalOverrideFiles::new();
        fetcher.put(ModuleName::new("c"), module_file("c", "1.0", deps![]));

        let registry = registry![("b@0.1", [("c", "1.0")])];
        let root = root_with_overrides(
            deps![("b", "0.1")],
            vec![(
                "c",
                Override::LocalPath(LocalPathOverride {
                    path: Utf8PathBuf::from("third_party/c"),
                }),
            )],
        );

        check_with_fetcher(
            registry,
            root.clone(),
            fetcher,
            Ok(keys!["<root>", "b@0.1", "c@_"]),
        );

        let mut fetcher = LocalOverrideFiles::new();
        fetcher.put(ModuleName::new("c"), module_file("c", "1.0", deps![]));
        let resolution =
            run_with_fetcher(registry![("b@0.1", [("c", "1.0")])], root, fetcher).unwrap();

        let c = &resolution.resolved[&key("c@_")];
        // The key carries the empty version; the declared version comes
        // from the local module file.
        assert_eq!(c.version, version("1.0"));
        assert_eq!(c.registry, None);
        let b = &resolution.resolved[&key("b@0.1")];
        assert_eq!(b.deps[&RepoName::new("c")], key("c@_"));
    }

    #[test]
    fn graphs_are_keyed_by_module_keys() {
        let resolution = run(
            registry![
                ("b@1.0", [("d", "1.0")]),
                ("c@2.0", [("d", "2.0")]),
                ("d@1.0", 1, []),
                ("d@2.0", 1, []),
            ],
            root_file(deps![("b", "1.0"), ("c", "2.0")]),
        )
        .unwrap();

        for graph in [&resolution.raw, &resolution.unpruned, &resolution.resolved] {
            for (key, module) in graph {
                assert_eq!(&module.key, key);
                for dep_key in module.deps.values() {
                    assert!(graph.contains(dep_key), "{key} references {dep_key} outside its graph");
                }
            }
        }
        // The resolved graph never exceeds the unpruned one.
        for key in resolution.resolved.keys() {
            assert!(resolution.unpruned.contains(key));
        }
    }

    #[test]
    fn repeat_runs_are_identical() {
        let build = || {
            run(
                registry![
                    ("b@1.0", [("d", "1.0"), ("e", "1.0")]),
                    ("c@2.0", [("d", "2.0")]),
                    ("d@1.0", 1, []),
                    ("d@2.0", 1, []),
                    ("e@1.0", []),
                ],
                root_file(deps![("b", "1.0"), ("c", "2.0")]),
            )
            .unwrap()
        };

        let first = build();
        let second = build();
        let order = |r: &Resolution| {
            (
                r.raw.keys().cloned().collect::<Vec<_>>(),
                r.unpruned.keys().cloned().collect::<Vec<_>>(),
                r.resolved.keys().cloned().collect::<Vec<_>>(),
            )
        };
        assert_serde_eq!(order(&first), order(&second));
    }

    #[test]
    fn inspection_of_the_diamond() {
        let resolution = run(
            registry![
                ("b@1.0", [("d", "1.0")]),
                ("c@2.0", [("d", "2.0")]),
                ("d@1.0", 1, []),
                ("d@2.0", 1, []),
            ],
            root_file(deps![("b", "1.0"), ("c", "2.0")]),
        )
        .unwrap();
        let augmented = resolution.inspect();

        let winner = augmented.get(&key("d@2.0")).unwrap();
        assert!(winner.loaded);
        assert!(winner.is_used());
        assert_serde_eq!(
            winner.dependants.iter().cloned().collect::<Vec<_>>(),
            keys!["b@1.0", "c@2.0"]
        );
        // Only C asked for d@2.0 verbatim.
        assert_serde_eq!(
            winner.original_dependants.iter().cloned().collect::<Vec<_>>(),
            keys!["c@2.0"]
        );

        let loser = augmented.get(&key("d@1.0")).unwrap();
        assert!(loser.loaded);
        assert!(!loser.is_used());
        assert_serde_eq!(
            loser.original_dependants.iter().cloned().collect::<Vec<_>>(),
            keys!["b@1.0"]
        );

        let b = augmented.get(&key("b@1.0")).unwrap();
        assert_eq!(
            b.dep_reasons[&RepoName::new("d")],
            ResolutionReason::MinimalVersionSelection
        );
        assert_eq!(b.unused_deps.get(&RepoName::new("d")), Some(&key("d@1.0")));
        assert_eq!(b.deps.get(&RepoName::new("d")), Some(&key("d@2.0")));
        assert_eq!(b.deps.get_by_value(&key("d@2.0")), Some(&RepoName::new("d")));

        let root = augmented.get(&ModuleKey::ROOT).unwrap();
        assert!(root.is_used());
        assert_eq!(root.dep_reasons[&RepoName::new("b")], ResolutionReason::Original);

        let d_keys: Vec<_> = augmented
            .keys_with_name(&ModuleName::new("d"))
            .cloned()
            .collect();
        assert_serde_eq!(d_keys, keys!["d@1.0", "d@2.0"]);
    }

    #[test]
    fn inspection_of_override_phantoms() {
        let mut fetcher = LocalOverrideFiles::new();
        fetcher.put(ModuleName::new("c"), module_file("c", "1.0", deps![]));
        let resolution = run_with_fetcher(
            registry![("b@0.1", [("c", "1.0")])],
            root_with_overrides(
                deps![("b", "0.1")],
                vec![(
                    "c",
                    Override::LocalPath(LocalPathOverride {
                        path: Utf8PathBuf::from("third_party/c"),
                    }),
                )],
            ),
            fetcher,
        )
        .unwrap();
        let augmented = resolution.inspect();

        let b = augmented.get(&key("b@0.1")).unwrap();
        assert_eq!(
            b.dep_reasons[&RepoName::new("c")],
            ResolutionReason::LocalPathOverride
        );
        assert_eq!(b.unused_deps.get(&RepoName::new("c")), Some(&key("c@1.0")));

        // The version B asked for was never fetched; it exists in the
        // augmented graph as an unloaded phantom.
        let phantom = augmented.get(&key("c@1.0")).unwrap();
        assert!(!phantom.loaded);
        assert!(!phantom.is_used());
        assert_serde_eq!(
            phantom.original_dependants.iter().cloned().collect::<Vec<_>>(),
            keys!["b@0.1"]
        );

        let chosen = augmented.get(&key("c@_")).unwrap();
        assert!(chosen.loaded);
        assert_serde_eq!(
            chosen.dependants.iter().cloned().collect::<Vec<_>>(),
            keys!["b@0.1"]
        );
    }
}
