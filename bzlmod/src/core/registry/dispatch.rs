use anyhow::{bail, Result};
use async_trait::async_trait;
use url::Url;

use crate::core::module::key::ModuleKey;
use crate::core::module::name::ModuleName;
use crate::core::module_file::ModuleFile;
use crate::core::overrides::{ArchiveOverride, GitOverride, LocalPathOverride, Override};
use crate::core::registry::{RegistryChain, RegistryResource};
use crate::core::repo_spec::RepoSpec;

/// Materialises module files for modules governed by a non-registry
/// override.
///
/// Fetching archives, checking out git commits and reading local paths are
/// out of the resolver's scope; the host supplies this.
#[async_trait(?Send)]
pub trait NonRegistryFetcher {
    async fn get_module_file(
        &self,
        name: &ModuleName,
        declared: &Override,
    ) -> Result<ModuleFile>;
}

/// A [`NonRegistryFetcher`] for hosts that do not support non-registry
/// overrides; every request fails.
pub struct UnsupportedNonRegistryFetcher;

#[async_trait(?Send)]
impl NonRegistryFetcher for UnsupportedNonRegistryFetcher {
    async fn get_module_file(
        &self,
        name: &ModuleName,
        declared: &Override,
    ) -> Result<ModuleFile> {
        bail!(
            "module `{name}` uses a {}, but the host provides no non-registry fetcher",
            declared.directive()
        );
    }
}

/// Routes module file and repo spec requests to the right place, honoring
/// the override declared for the module (if any): the registry chain, an
/// override-pinned registry, or the non-registry fetcher.
pub struct OverrideDispatch {
    chain: RegistryChain,
    fetcher: Box<dyn NonRegistryFetcher>,
}

/// A module file together with the registry that served it (`None` for
/// non-registry-overridden modules).
#[derive(Debug)]
pub struct FetchedModuleFile {
    pub module_file: ModuleFile,
    pub registry: Option<Url>,
}

impl OverrideDispatch {
    pub fn new(chain: RegistryChain, fetcher: Box<dyn NonRegistryFetcher>) -> Self {
        Self { chain, fetcher }
    }

    pub fn registry_only(chain: RegistryChain) -> Self {
        Self::new(chain, Box::new(UnsupportedNonRegistryFetcher))
    }

    pub async fn get_module_file(
        &self,
        key: &ModuleKey,
        declared: Option<&Override>,
    ) -> Result<RegistryResource<FetchedModuleFile>> {
        match declared {
            Some(declared) if declared.is_non_registry() => {
                let module_file = self.fetcher.get_module_file(&key.name, declared).await?;
                Ok(RegistryResource::Found(FetchedModuleFile {
                    module_file,
                    registry: None,
                }))
            }
            _ => {
                let pinned = declared.and_then(|o| o.registry());
                Ok(self.chain.get_module_file(key, pinned).await?.map(
                    |(module_file, registry)| FetchedModuleFile {
                        module_file,
                        registry: Some(registry),
                    },
                ))
            }
        }
    }

    /// The repo spec for a module: synthesized from a non-registry
    /// override, or served by the registry with any single-version
    /// override patches appended.
    pub async fn get_repo_spec(
        &self,
        key: &ModuleKey,
        declared: Option<&Override>,
    ) -> Result<RegistryResource<RepoSpec>> {
        let canonical_name = key.canonical_repo_name();
        match declared {
            Some(Override::Archive(archive)) => Ok(RegistryResource::Found(
                Self::archive_override_spec(&canonical_name, archive),
            )),
            Some(Override::Git(git)) => Ok(RegistryResource::Found(Self::git_override_spec(
                &canonical_name,
                git,
            ))),
            Some(Override::LocalPath(LocalPathOverride { path })) => Ok(RegistryResource::Found(
                RepoSpec::new(RepoSpec::LOCAL_REPOSITORY)
                    .attr("name", canonical_name.as_str())
                    .attr("path", path.as_str()),
            )),
            declared => {
                let pinned = declared.and_then(|o| o.registry());
                let spec = self.chain.get_repo_spec(key, &canonical_name, pinned).await?;
                Ok(spec.map(|mut spec| {
                    if let Some(Override::SingleVersion(sv)) = declared {
                        spec.append_patches(&sv.patches, sv.patch_strip);
                    }
                    spec
                }))
            }
        }
    }

    fn archive_override_spec(canonical_name: &str, archive: &ArchiveOverride) -> RepoSpec {
        let urls: Vec<String> = archive.urls.iter().map(|url| url.to_string()).collect();
        let mut spec = RepoSpec::new(RepoSpec::HTTP_ARCHIVE)
            .attr("name", canonical_name)
            .attr("urls", serde_json::json!(urls));
        if let Some(integrity) = &archive.integrity {
            spec = spec.attr("integrity", integrity.to_string());
        }
        if let Some(strip_prefix) = &archive.strip_prefix {
            spec = spec.attr("strip_prefix", strip_prefix.clone());
        }
        spec.append_patches(&archive.patches, archive.patch_strip);
        spec
    }

    fn git_override_spec(canonical_name: &str, git: &GitOverride) -> RepoSpec {
        let mut spec = RepoSpec::new(RepoSpec::GIT_REPOSITORY)
            .attr("name", canonical_name)
            .attr("remote", git.remote.clone())
            .attr("commit", git.commit.clone());
        spec.append_patches(&git.patches, git.patch_strip);
        spec
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use camino::Utf8PathBuf;
    use url::Url;

    use super::OverrideDispatch;
    use crate::core::registry::mock::registry;
    use crate::core::registry::{RegistryChain, RegistryResource};
    use crate::core::{
        ArchiveOverride, LocalPathOverride, ModuleKey, Override, RepoSpec, SingleVersionOverride,
    };

    fn dispatch(registry: crate::core::registry::mock::MockRegistry) -> OverrideDispatch {
        OverrideDispatch::registry_only(RegistryChain::new(vec![Arc::new(registry)]))
    }

    #[tokio::test]
    async fn local_path_override_synthesizes_local_repository() {
        let dispatch = dispatch(registry![]);
        let declared = Override::LocalPath(LocalPathOverride {
            path: Utf8PathBuf::from("third_party/foo"),
        });

        let spec = dispatch
            .get_repo_spec(&ModuleKey::from_display_str("foo@_").unwrap(), Some(&declared))
            .await
            .unwrap()
            .found()
            .unwrap();

        assert_eq!(spec.rule_class, RepoSpec::LOCAL_REPOSITORY);
        assert_eq!(spec.get("name").unwrap(), &serde_json::json!("foo."));
        assert_eq!(spec.get("path").unwrap(), &serde_json::json!("third_party/foo"));
    }

    #[tokio::test]
    async fn archive_override_synthesizes_http_archive_with_patches() {
        let dispatch = dispatch(registry![]);
        let declared = Override::Archive(ArchiveOverride {
            urls: vec![Url::parse("https://example.com/foo-2.0.zip").unwrap()],
            integrity: None,
            strip_prefix: Some("foo-2.0".into()),
            patches: vec!["my.patch".into()],
            patch_strip: 2,
        });

        let spec = dispatch
            .get_repo_spec(&ModuleKey::from_display_str("foo@_").unwrap(), Some(&declared))
            .await
            .unwrap()
            .found()
            .unwrap();

        assert_eq!(spec.rule_class, RepoSpec::HTTP_ARCHIVE);
        assert_eq!(
            spec.get("urls").unwrap(),
            &serde_json::json!(["https://example.com/foo-2.0.zip"])
        );
        assert_eq!(spec.get("patches").unwrap(), &serde_json::json!(["my.patch"]));
        assert_eq!(spec.get("patch_args").unwrap(), &serde_json::json!(["-p2"]));
    }

    #[tokio::test]
    async fn single_version_override_appends_patches_to_registry_spec() {
        let dispatch = dispatch(registry![("foo@1.0", [])]);
        let declared = Override::SingleVersion(SingleVersionOverride {
            patches: vec!["local.patch".into()],
            patch_strip: 1,
            ..Default::default()
        });

        let spec = dispatch
            .get_repo_spec(&ModuleKey::from_display_str("foo@1.0").unwrap(), Some(&declared))
            .await
            .unwrap()
            .found()
            .unwrap();

        assert_eq!(spec.rule_class, RepoSpec::HTTP_ARCHIVE);
        assert_eq!(spec.get("patches").unwrap(), &serde_json::json!(["local.patch"]));
        assert_eq!(spec.get("patch_args").unwrap(), &serde_json::json!(["-p1"]));
    }

    #[tokio::test]
    async fn unsupported_fetcher_reports_the_directive() {
        let dispatch = dispatch(registry![]);
        let declared = Override::LocalPath(LocalPathOverride {
            path: Utf8PathBuf::from("x"),
        });

        let err = dispatch
            .get_module_file(&ModuleKey::from_display_str("foo@_").unwrap(), Some(&declared))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("local_path_override"));
    }

    #[tokio::test]
    async fn module_files_come_from_the_first_registry_containing_the_module() {
        let first = registry![("foo@1.0", [("bar", "1.0")])];
        let second = registry![("baz@1.0", [])];
        let chain = RegistryChain::new(vec![Arc::new(first), Arc::new(second)]);
        let dispatch = OverrideDispatch::registry_only(chain);

        let fetched = dispatch
            .get_module_file(&ModuleKey::from_display_str("baz@1.0").unwrap(), None)
            .await
            .unwrap()
            .found()
            .unwrap();
        assert_eq!(fetched.registry, Some(Url::parse("mock://registry").unwrap()));

        let missing = dispatch
            .get_module_file(&ModuleKey::from_display_str("nope@1.0").unwrap(), None)
            .await
            .unwrap();
        assert!(matches!(missing, RegistryResource::NotFound));
    }
}
