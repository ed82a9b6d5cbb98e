use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// The local name under which a module makes one of its dependencies (or an
/// extension-generated repo) visible to itself.
///
/// Repo names follow looser rules than [`ModuleName`]: letters of either
/// case, digits, dots, hyphens and underscores are allowed, and the first
/// character must be a letter or an underscore.
///
/// [`ModuleName`]: crate::core::ModuleName
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(into = "SmolStr", try_from = "SmolStr")]
pub struct RepoName(SmolStr);

impl RepoName {
    /// Constructs and validates new [`RepoName`].
    ///
    /// Panics if the name does not conform to repo naming rules.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self::try_new(name).unwrap()
    }

    /// Constructs and validates new [`RepoName`].
    pub fn try_new(name: impl AsRef<str>) -> Result<Self> {
        Self::try_new_impl(name.as_ref().into())
    }

    fn try_new_impl(name: SmolStr) -> Result<Self> {
        if name.is_empty() {
            bail!("empty string cannot be used as repo name");
        }

        let first = name.chars().next().unwrap();
        if !(first.is_ascii_alphabetic() || first == '_') {
            bail!(
                "invalid repo name: `{name}`, \
                names must begin with a letter or underscore"
            );
        }

        for ch in name.chars() {
            if !(ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_')) {
                bail!(
                    "invalid character `{ch}` in repo name: `{name}`, \
                    allowed characters are letters, digits, dots, hyphens and underscores"
                );
            }
        }

        Ok(Self(name))
    }

    #[inline(always)]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for RepoName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for RepoName {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl From<RepoName> for SmolStr {
    fn from(value: RepoName) -> Self {
        value.0
    }
}

impl TryFrom<&str> for RepoName {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self> {
        RepoName::try_new(value)
    }
}

impl TryFrom<SmolStr> for RepoName {
    type Error = anyhow::Error;

    fn try_from(value: SmolStr) -> Result<Self> {
        RepoName::try_new(value.as_str())
    }
}

impl FromStr for RepoName {
    type Err = anyhow::Error;

    fn from_str(name: &str) -> Result<Self> {
        RepoName::try_new(name)
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RepoName({self})")
    }
}
