use std::fs;

use anyhow::{Context, Result};
use assert_fs::TempDir;
use camino::Utf8PathBuf;
use url::Url;

use bzlmod::core::Integrity;

/// An index registry fixture on the local filesystem, built module by
/// module.
///
/// The directory follows the index registry layout (`bazel_registry.json`,
/// `modules/<name>/metadata.json`, `modules/<name>/<version>/MODULE.bazel`
/// + `source.json`). Archive URLs point at a fake host and integrities are
/// computed over the module file content; the resolver never downloads
/// archives, so fixtures only need to be structurally right.
pub struct LocalRegistry {
    t: TempDir,
    pub root: Utf8PathBuf,
    pub url: Url,
}

impl LocalRegistry {
    pub fn create() -> Self {
        let t = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(t.path().to_path_buf()).unwrap();
        let url = Url::from_directory_path(&root).unwrap();
        Self { t, root, url }
    }

    /// Writes `bazel_registry.json`.
    pub fn config(&mut self, json: &str) -> &mut Self {
        fs::write(self.root.join("bazel_registry.json"), json).unwrap();
        self
    }

    /// Publishes one module version: its module file, a `source.json`
    /// pointing at a fake archive, and an updated `metadata.json`.
    pub fn publish(&mut self, name: &str, version: &str, module_bazel: &str) -> &mut Self {
        self.try_publish(name, version, module_bazel).unwrap();
        self
    }

    fn try_publish(&mut self, name: &str, version: &str, module_bazel: &str) -> Result<()> {
        let version_dir = self.root.join(format!("modules/{name}/{version}"));
        fs::create_dir_all(&version_dir)
            .with_context(|| format!("failed to create {version_dir}"))?;

        fs::write(version_dir.join("MODULE.bazel"), module_bazel)?;

        let source = serde_json::json!({
            "url": format!("https://archives.example.com/{name}-{version}.tar.gz"),
            "integrity": Integrity::compute_sha256(module_bazel.as_bytes()).to_string(),
            "strip_prefix": format!("{name}-{version}"),
        });
        fs::write(
            version_dir.join("source.json"),
            serde_json::to_string_pretty(&source)?,
        )?;

        self.edit_metadata(name, |metadata| {
            let versions = metadata["versions"].as_array_mut().unwrap();
            versions.push(serde_json::json!(version));
        })
    }

    /// Marks one published version yanked in `metadata.json`.
    pub fn yank(&mut self, name: &str, version: &str, reason: &str) -> &mut Self {
        self.edit_metadata(name, |metadata| {
            metadata["yanked_versions"][version] = serde_json::json!(reason);
        })
        .unwrap();
        self
    }

    fn edit_metadata(
        &mut self,
        name: &str,
        edit: impl FnOnce(&mut serde_json::Value),
    ) -> Result<()> {
        let metadata_path = self.root.join(format!("modules/{name}/metadata.json"));
        let mut metadata = match fs::read(&metadata_path) {
            Ok(content) => serde_json::from_slice(&content)?,
            Err(_) => serde_json::json!({"versions": [], "yanked_versions": {}}),
        };
        edit(&mut metadata);
        fs::create_dir_all(metadata_path.parent().unwrap())?;
        fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)?;
        Ok(())
    }

    /// Keeps the backing temp directory alive for the test's duration.
    pub fn keep(self) -> TempDir {
        self.t
    }
}
