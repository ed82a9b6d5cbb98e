use std::io;

use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use camino::Utf8PathBuf;
use tokio::task::spawn_blocking;
use tracing::trace;

use crate::core::registry::client::{RegistryClient, RegistryResource};

/// An index registry that lives on the local filesystem.
///
/// ## Filesystem hierarchy
///
/// ```text
/// [registry root]/
/// ├── bazel_registry.json
/// └── modules/
///    ├── rules_x/
///    │  ├── metadata.json
///    │  ├── 1.0/
///    │  │  ├── MODULE.bazel
///    │  │  ├── source.json
///    │  │  └── patches/
///    │  │     └── fix-build.patch
///    │  └── 1.1/
///    │     └── ...
///    └── rules_y/
///       └── ...
/// ```
pub struct LocalRegistryClient {
    root: Utf8PathBuf,
}

impl LocalRegistryClient {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Result<Self> {
        let root = root.into();
        ensure!(
            root.is_dir(),
            "local registry path is not a directory: {root}"
        );
        Ok(Self { root })
    }
}

#[async_trait]
impl RegistryClient for LocalRegistryClient {
    #[tracing::instrument(level = "trace", skip_all)]
    async fn fetch(&self, path: &str) -> Result<RegistryResource<Vec<u8>>> {
        trace!(?path);

        let full_path = self.root.join(path);
        spawn_blocking(move || match std::fs::read(&full_path) {
            Ok(content) => Ok(RegistryResource::Found(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(RegistryResource::NotFound),
            Err(e) => {
                Err(e).with_context(|| format!("failed to read registry file: {full_path}"))
            }
        })
        .await?
    }
}

#[cfg(test)]
mod tests {
    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use camino::Utf8PathBuf;

    use super::LocalRegistryClient;
    use crate::core::registry::client::{RegistryClient, RegistryResource};

    #[tokio::test]
    async fn fetches_existing_files_and_reports_missing_ones() {
        let t = TempDir::new().unwrap();
        t.child("modules/rules_x/metadata.json")
            .write_str(r#"{"versions":["1.0"]}"#)
            .unwrap();
        let root = Utf8PathBuf::from_path_buf(t.path().to_path_buf()).unwrap();

        let client = LocalRegistryClient::new(root).unwrap();

        let found = client.fetch("modules/rules_x/metadata.json").await.unwrap();
        assert_eq!(
            found,
            RegistryResource::Found(br#"{"versions":["1.0"]}"#.to_vec())
        );

        let missing = client.fetch("modules/rules_y/metadata.json").await.unwrap();
        assert_eq!(missing, RegistryResource::NotFound);
    }

    #[test]
    fn rejects_nonexistent_root() {
        assert!(LocalRegistryClient::new("/nonexistent/registry/road").is_err());
    }
}
