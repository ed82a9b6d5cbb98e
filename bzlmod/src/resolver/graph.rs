use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::core::{Module, ModuleKey};

/// An ordered module graph, keyed by module key.
///
/// Iteration strictly follows insertion order; the stage producing a graph
/// defines what that order means (BFS discovery order for the raw and
/// resolved graphs, raw insertion order for the unpruned graph). Entries
/// are keyed by the module's own key, so `graph[k].key == k` holds by
/// construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepGraph {
    modules: IndexMap<ModuleKey, Module>,
}

impl DepGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a module under its own key, replacing any previous entry.
    pub fn insert(&mut self, module: Module) -> Option<Module> {
        self.modules.insert(module.key.clone(), module)
    }

    pub fn get(&self, key: &ModuleKey) -> Option<&Module> {
        self.modules.get(key)
    }

    pub fn contains(&self, key: &ModuleKey) -> bool {
        self.modules.contains_key(key)
    }

    pub fn root(&self) -> Option<&Module> {
        self.get(&ModuleKey::ROOT)
    }

    pub fn keys(&self) -> impl Iterator<Item = &ModuleKey> {
        self.modules.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ModuleKey, &Module)> {
        self.modules.iter()
    }

    pub fn modules(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl FromIterator<Module> for DepGraph {
    fn from_iter<I: IntoIterator<Item = Module>>(iter: I) -> Self {
        let mut graph = Self::new();
        for module in iter {
            graph.insert(module);
        }
        graph
    }
}

impl<'a> IntoIterator for &'a DepGraph {
    type Item = (&'a ModuleKey, &'a Module);
    type IntoIter = indexmap::map::Iter<'a, ModuleKey, Module>;

    fn into_iter(self) -> Self::IntoIter {
        self.modules.iter()
    }
}

impl std::ops::Index<&ModuleKey> for DepGraph {
    type Output = Module;

    fn index(&self, key: &ModuleKey) -> &Module {
        &self.modules[key]
    }
}

/// Serialises as a map from module key to its dep mapping, which is the
/// shape graph assertions in tests compare against.
impl Serialize for DepGraph {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        let mut map = s.serialize_map(Some(self.modules.len()))?;
        for (key, module) in &self.modules {
            map.serialize_entry(key, &module.deps)?;
        }
        map.end()
    }
}
