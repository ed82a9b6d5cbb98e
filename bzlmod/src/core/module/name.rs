use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A [`String`]-like type representing a module name.
///
/// * Instances are validated upon construction to comply with the module
///   naming rules: only lowercase letters, digits, dots, hyphens and
///   underscores, beginning with a lowercase letter and ending with a
///   lowercase letter or digit.
/// * The empty name is reserved for the root module and cannot be
///   constructed through the public constructors.
/// * Values are immutable; [`Clone`] is `O(1)`; short names are
///   stack-allocated.
#[derive(Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(into = "SmolStr", try_from = "SmolStr")]
pub struct ModuleName(SmolStr);

impl ModuleName {
    /// Constructs and validates new [`ModuleName`].
    ///
    /// Panics if the name does not conform to module naming rules.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self::try_new(name).unwrap()
    }

    /// Constructs and validates new [`ModuleName`].
    pub fn try_new(name: impl AsRef<str>) -> Result<Self> {
        Self::try_new_impl(name.as_ref().into())
    }

    fn try_new_impl(name: SmolStr) -> Result<Self> {
        if name.is_empty() {
            bail!("empty string cannot be used as module name, it is reserved for the root module");
        }

        let first = name.chars().next().unwrap();
        if !first.is_ascii_lowercase() {
            bail!(
                "invalid module name: `{name}`, \
                names must begin with a lowercase letter"
            );
        }

        for ch in name.chars() {
            if !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '.' | '-' | '_')) {
                bail!(
                    "invalid character `{ch}` in module name: `{name}`, \
                    allowed characters are lowercase letters, digits, dots, hyphens and underscores"
                );
            }
        }

        let last = name.chars().next_back().unwrap();
        if !(last.is_ascii_lowercase() || last.is_ascii_digit()) {
            bail!(
                "invalid module name: `{name}`, \
                names must end with a lowercase letter or digit"
            );
        }

        Ok(Self(name))
    }

    /// The reserved name of the root module.
    pub(crate) const ROOT: Self = Self(SmolStr::new_inline(""));

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[inline(always)]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for ModuleName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Borrow<str> for ModuleName {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl From<ModuleName> for SmolStr {
    fn from(value: ModuleName) -> Self {
        value.0
    }
}

impl TryFrom<&str> for ModuleName {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self> {
        ModuleName::try_new(value)
    }
}

impl TryFrom<String> for ModuleName {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        ModuleName::try_new(value)
    }
}

impl TryFrom<SmolStr> for ModuleName {
    type Error = anyhow::Error;

    fn try_from(value: SmolStr) -> Result<Self> {
        ModuleName::try_new(value.as_str())
    }
}

impl FromStr for ModuleName {
    type Err = anyhow::Error;

    fn from_str(name: &str) -> Result<Self> {
        ModuleName::try_new(name)
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "<root>")
        } else {
            fmt::Display::fmt(&self.0, f)
        }
    }
}

impl fmt::Debug for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModuleName({self})")
    }
}
