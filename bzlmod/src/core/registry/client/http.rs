use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::trace;
use url::Url;

use crate::core::registry::client::{RegistryClient, RegistryResource};

/// An index registry served over HTTP(S).
///
/// Files are fetched by joining the file path onto the registry base URL.
/// `404` and `410` responses map to [`RegistryResource::NotFound`]; every
/// other failure is a transport error the caller treats as retryable.
pub struct HttpRegistryClient {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpRegistryClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn file_url(&self, path: &str) -> Result<Url> {
        // Ensure a trailing slash so `Url::join` appends instead of
        // replacing the last path segment.
        let base = if self.base_url.path().ends_with('/') {
            self.base_url.clone()
        } else {
            let mut base = self.base_url.clone();
            base.set_path(&format!("{}/", base.path()));
            base
        };
        base.join(path)
            .with_context(|| format!("cannot build registry file URL for `{path}`"))
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    #[tracing::instrument(level = "trace", skip_all)]
    async fn fetch(&self, path: &str) -> Result<RegistryResource<Vec<u8>>> {
        let url = self.file_url(path)?;
        trace!(%url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("failed to fetch registry file: {url}"))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::GONE => Ok(RegistryResource::NotFound),
            status if status.is_success() => {
                let content = response
                    .bytes()
                    .await
                    .with_context(|| format!("failed to read registry response body: {url}"))?;
                Ok(RegistryResource::Found(content.to_vec()))
            }
            status => bail!("registry responded with HTTP {status} for {url}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::HttpRegistryClient;

    #[test]
    fn joins_file_paths_onto_base_url() {
        let client = HttpRegistryClient::new(Url::parse("https://bcr.example.com/registry").unwrap());
        assert_eq!(
            client.file_url("modules/rules_x/metadata.json").unwrap().as_str(),
            "https://bcr.example.com/registry/modules/rules_x/metadata.json"
        );
    }
}
