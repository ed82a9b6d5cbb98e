use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::sync::OnceCell;
use url::Url;

use crate::core::module::key::ModuleKey;
use crate::core::module::name::ModuleName;
use crate::core::module_file::{ModuleFile, ModuleFileParser};
use crate::core::registry::client::{RegistryClient, RegistryResource};
use crate::core::registry::Registry;
use crate::core::repo_spec::RepoSpec;

pub use config::RegistryConfig;
pub use metadata::{Maintainer, RegistryMetadata};
pub use source::SourceJson;

mod config;
mod metadata;
mod source;

/// A registry in the index format: a directory (local or HTTP) publishing
/// `bazel_registry.json`, per-module `metadata.json` and per-version
/// `MODULE.bazel` + `source.json` files.
pub struct IndexRegistry {
    url: Url,
    client: Box<dyn RegistryClient>,
    parser: Arc<dyn ModuleFileParser>,
    config: OnceCell<RegistryConfig>,
}

impl IndexRegistry {
    pub fn new(url: Url, client: Box<dyn RegistryClient>, parser: Arc<dyn ModuleFileParser>) -> Self {
        Self {
            url,
            client,
            parser,
            config: OnceCell::new(),
        }
    }

    /// The registry config, fetched lazily and at most once. A missing
    /// `bazel_registry.json` means an all-defaults config.
    async fn config(&self) -> Result<&RegistryConfig> {
        self.config
            .get_or_try_init(|| async {
                match self.client.fetch(crate::REGISTRY_CONFIG_FILE_NAME).await? {
                    RegistryResource::NotFound => Ok(RegistryConfig::default()),
                    RegistryResource::Found(content) => serde_json::from_slice(&content)
                        .with_context(|| {
                            format!("malformed {} in {}", crate::REGISTRY_CONFIG_FILE_NAME, self.url)
                        }),
                }
            })
            .await
    }

    fn module_dir(key: &ModuleKey) -> String {
        format!("modules/{}/{}", key.name.as_str(), key.version.as_str())
    }

    fn build_archive_spec(
        &self,
        key: &ModuleKey,
        canonical_name: &str,
        source: &SourceJson,
        config: &RegistryConfig,
    ) -> Result<RepoSpec> {
        let Some(url) = &source.url else {
            bail!("source.json for {key} has no url");
        };

        let mut urls = Vec::new();
        if let Some(remainder) = url.split_once("://").map(|(_, remainder)| remainder) {
            for mirror in &config.mirrors {
                urls.push(format!("{}/{remainder}", mirror.trim_end_matches('/')));
            }
        }
        urls.push(url.clone());

        let patch_dir = format!("{}/{}/patches", self.url, Self::module_dir(key));
        let patches: Vec<String> = source
            .patches
            .keys()
            .map(|file| format!("{patch_dir}/{file}"))
            .collect();

        let mut spec = RepoSpec::new(RepoSpec::HTTP_ARCHIVE)
            .attr("name", canonical_name)
            .attr("urls", serde_json::json!(urls));
        if let Some(integrity) = &source.integrity {
            spec = spec.attr("integrity", integrity.to_string());
        }
        if let Some(strip_prefix) = &source.strip_prefix {
            spec = spec.attr("strip_prefix", strip_prefix.clone());
        }
        if !patches.is_empty() {
            spec = spec
                .attr("patches", serde_json::json!(patches))
                .attr("patch_args", serde_json::json!([format!("-p{}", source.patch_strip)]));
        }
        Ok(spec)
    }

    fn build_local_path_spec(
        &self,
        key: &ModuleKey,
        canonical_name: &str,
        source: &SourceJson,
        config: &RegistryConfig,
    ) -> Result<RepoSpec> {
        let Some(path) = &source.path else {
            bail!("local_path source.json for {key} has no path");
        };
        let base = config
            .module_base_path
            .as_deref()
            .with_context(|| format!("registry {} serves local_path sources but its config has no module_base_path", self.url))?;
        Ok(RepoSpec::new(RepoSpec::LOCAL_REPOSITORY)
            .attr("name", canonical_name)
            .attr("path", format!("{}/{path}", base.trim_end_matches('/'))))
    }
}

#[async_trait(?Send)]
impl Registry for IndexRegistry {
    fn url(&self) -> &Url {
        &self.url
    }

    #[tracing::instrument(level = "trace", skip_all, fields(key = %key, registry = %self.url))]
    async fn get_module_file(&self, key: &ModuleKey) -> Result<RegistryResource<ModuleFile>> {
        let path = format!("{}/{}", Self::module_dir(key), crate::MODULE_FILE_NAME);
        let file_label = format!("{}/{path}", self.url);
        self.client
            .fetch(&path)
            .await?
            .try_map(|content| self.parser.parse(&content, &file_label))
    }

    async fn get_repo_spec(
        &self,
        key: &ModuleKey,
        canonical_name: &str,
    ) -> Result<RegistryResource<RepoSpec>> {
        let path = format!("{}/{}", Self::module_dir(key), crate::SOURCE_FILE_NAME);
        let source = match self.client.fetch(&path).await? {
            RegistryResource::NotFound => return Ok(RegistryResource::NotFound),
            RegistryResource::Found(content) => {
                serde_json::from_slice::<SourceJson>(&content)
                    .with_context(|| format!("malformed source.json for {key} in {}", self.url))?
            }
        };

        let config = self.config().await?;
        let spec = if source.is_local_path() {
            self.build_local_path_spec(key, canonical_name, &source, config)?
        } else if source.is_archive() {
            self.build_archive_spec(key, canonical_name, &source, config)?
        } else {
            bail!(
                "unsupported source type `{}` for {key} in {}",
                source.source_type.as_deref().unwrap_or_default(),
                self.url
            );
        };
        Ok(RegistryResource::Found(spec))
    }

    async fn get_metadata(&self, name: &ModuleName) -> Result<RegistryResource<RegistryMetadata>> {
        let path = format!("modules/{}/{}", name.as_str(), crate::METADATA_FILE_NAME);
        self.client.fetch(&path).await?.try_map(|content| {
            serde_json::from_slice(&content)
                .with_context(|| format!("malformed metadata.json for `{name}` in {}", self.url))
        })
    }
}
