use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::module::name::ModuleName;
use crate::core::module::repo_name::RepoName;
use crate::core::version::Version;

/// Uniquely identifies one version of a module in the dependency graph.
///
/// A distinguished [`ModuleKey::ROOT`] (empty name, empty version)
/// identifies the root module. Modules governed by a non-registry override
/// carry the empty version.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleKey {
    pub name: ModuleName,
    pub version: Version,
}

impl ModuleKey {
    /// The key of the root module.
    pub const ROOT: Self = Self {
        name: ModuleName::ROOT,
        version: Version::EMPTY,
    };

    pub fn new(name: ModuleName, version: Version) -> Self {
        Self { name, version }
    }

    pub fn is_root(&self) -> bool {
        self.name.is_root()
    }

    /// The canonical repo name of the repo backing this module.
    ///
    /// The format is an internal implementation detail subject to change;
    /// callers must pass it through unchanged and never parse it.
    pub fn canonical_repo_name(&self) -> String {
        format!("{}.{}", self.name.as_str(), self.version.as_str())
    }

    /// The canonical repo name of a repo generated by an extension this
    /// module uses.
    ///
    /// Same caveats as [`ModuleKey::canonical_repo_name`].
    pub fn extension_repo_name(&self, extension_name: &str, repo_name: &RepoName) -> String {
        format!(
            "{}.{}.{}.{}",
            self.name.as_str(),
            self.version.as_str(),
            extension_name,
            repo_name
        )
    }

    #[cfg(test)]
    pub(crate) fn from_display_str(string: &str) -> anyhow::Result<Self> {
        use anyhow::Context;

        if string == "<root>" {
            return Ok(Self::ROOT);
        }
        let (name, version) = string
            .split_once('@')
            .with_context(|| format!("invalid displayed ModuleKey: `{string}`"))?;
        let name = ModuleName::try_new(name).context("invalid displayed ModuleKey")?;
        let version = if version == "_" {
            Version::EMPTY
        } else {
            Version::parse(version).context("invalid displayed ModuleKey")?
        };
        Ok(Self { name, version })
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "<root>")
        } else if self.version.is_empty() {
            write!(f, "{}@_", self.name)
        } else {
            write!(f, "{}@{}", self.name, self.version)
        }
    }
}

impl fmt::Debug for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleKey({self})")
    }
}

impl Serialize for ModuleKey {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ModuleKey {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<ModuleKey, D::Error> {
        use serde::de::Error;

        let string = String::deserialize(d)?;
        if string == "<root>" {
            return Ok(Self::ROOT);
        }
        let Some((name, version)) = string.split_once('@') else {
            return Err(Error::custom(format_args!(
                "invalid serialized ModuleKey: `{string}`"
            )));
        };
        let name = ModuleName::try_new(name)
            .map_err(|err| Error::custom(format_args!("invalid serialized ModuleKey: {err}")))?;
        let version = if version == "_" {
            Version::EMPTY
        } else {
            Version::parse(version)
                .map_err(|err| Error::custom(format_args!("invalid serialized ModuleKey: {err}")))?
        };
        Ok(Self { name, version })
    }
}
