use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use url::Url;

use crate::core::module::key::ModuleKey;
use crate::core::module::name::ModuleName;
use crate::core::module_file::ModuleFile;
use crate::core::repo_spec::RepoSpec;

pub use client::{RegistryClient, RegistryResource};
pub use index::{IndexRegistry, Maintainer, RegistryConfig, RegistryMetadata, SourceJson};

pub mod client;
pub mod dispatch;
pub mod index;

/// One registry serving module metadata and source recipes.
///
/// Implementations are expected to be idempotent: the same query returns
/// the same result for the lifetime of a resolution. Caching of fetched
/// module files is the host evaluator's concern.
#[async_trait(?Send)]
pub trait Registry {
    /// The registry's identity, used for dep attribution and for pinning
    /// by overrides.
    fn url(&self) -> &Url;

    /// Fetch and parse the module file of one module version.
    async fn get_module_file(&self, key: &ModuleKey) -> Result<RegistryResource<ModuleFile>>;

    /// Build the repo spec materialising the repo for one module version.
    ///
    /// `canonical_name` is passed through into the spec unchanged.
    async fn get_repo_spec(
        &self,
        key: &ModuleKey,
        canonical_name: &str,
    ) -> Result<RegistryResource<RepoSpec>>;

    /// Fetch the per-module registry metadata.
    async fn get_metadata(&self, name: &ModuleName) -> Result<RegistryResource<RegistryMetadata>>;
}

/// An ordered list of registries; the first one containing a module wins.
///
/// I/O errors are not masked by later registries: a failing registry fails
/// the lookup so the host can retry it.
pub struct RegistryChain {
    registries: Vec<Arc<dyn Registry>>,
}

impl RegistryChain {
    pub fn new(registries: Vec<Arc<dyn Registry>>) -> Self {
        Self { registries }
    }

    pub fn registries(&self) -> &[Arc<dyn Registry>] {
        &self.registries
    }

    /// The registries to consult: the whole chain in order, or only the
    /// override-pinned one.
    fn candidates(&self, pinned: Option<&Url>) -> Result<Vec<&Arc<dyn Registry>>> {
        match pinned {
            None => Ok(self.registries.iter().collect()),
            Some(url) => {
                let Some(registry) = self.registries.iter().find(|r| r.url() == url) else {
                    bail!("override pins registry {url}, which is not in the configured registry list");
                };
                Ok(vec![registry])
            }
        }
    }

    pub async fn get_module_file(
        &self,
        key: &ModuleKey,
        pinned: Option<&Url>,
    ) -> Result<RegistryResource<(ModuleFile, Url)>> {
        for registry in self.candidates(pinned)? {
            if let RegistryResource::Found(file) = registry.get_module_file(key).await? {
                return Ok(RegistryResource::Found((file, registry.url().clone())));
            }
        }
        Ok(RegistryResource::NotFound)
    }

    pub async fn get_repo_spec(
        &self,
        key: &ModuleKey,
        canonical_name: &str,
        pinned: Option<&Url>,
    ) -> Result<RegistryResource<RepoSpec>> {
        for registry in self.candidates(pinned)? {
            if let RegistryResource::Found(spec) =
                registry.get_repo_spec(key, canonical_name).await?
            {
                return Ok(RegistryResource::Found(spec));
            }
        }
        Ok(RegistryResource::NotFound)
    }
}
