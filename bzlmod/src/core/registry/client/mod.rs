use anyhow::Result;
use async_trait::async_trait;

pub mod http;
pub mod local;

/// Result from loading a resource from a registry.
///
/// Missing resources are data, not errors: a chain of registries probes
/// each in turn, and discovery attributes a final [`NotFound`] to the
/// module that requested the fetch.
///
/// [`NotFound`]: RegistryResource::NotFound
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryResource<T> {
    /// The requested resource is not present in this registry.
    NotFound,
    Found(T),
}

impl<T> RegistryResource<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> RegistryResource<U> {
        match self {
            RegistryResource::NotFound => RegistryResource::NotFound,
            RegistryResource::Found(value) => RegistryResource::Found(f(value)),
        }
    }

    pub fn try_map<U, E>(
        self,
        f: impl FnOnce(T) -> Result<U, E>,
    ) -> Result<RegistryResource<U>, E> {
        match self {
            RegistryResource::NotFound => Ok(RegistryResource::NotFound),
            RegistryResource::Found(value) => Ok(RegistryResource::Found(f(value)?)),
        }
    }

    pub fn found(self) -> Option<T> {
        match self {
            RegistryResource::NotFound => None,
            RegistryResource::Found(value) => Some(value),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, RegistryResource::Found(_))
    }
}

/// Transport-level access to the files of one index registry.
///
/// Clients are dumb byte fetchers; parsing and caching live above them
/// (caching of module files is the host evaluator's concern).
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Fetch the raw contents of a file, given its path relative to the
    /// registry root.
    async fn fetch(&self, path: &str) -> Result<RegistryResource<Vec<u8>>>;
}
