use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::version::Version;

/// The `modules/<name>/metadata.json` file of an index registry.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RegistryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<Maintainer>,

    /// Every version ever published for this module, in publication order.
    #[serde(default)]
    pub versions: Vec<Version>,

    /// Version to the reason it was yanked. Informational: whether yanked
    /// versions are errors, warnings or ignored is caller policy.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub yanked_versions: IndexMap<Version, String>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Maintainer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
