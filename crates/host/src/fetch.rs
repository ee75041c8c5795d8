//! Resource retrieval by location.

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::LocalBoxFuture;
use glasm_common::ResourceLocation;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to read {location}: {source}")]
    Io {
        location: ResourceLocation,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} not found")]
    NotFound(ResourceLocation),
    #[error("{location} is not valid UTF-8")]
    NotUtf8 {
        location: ResourceLocation,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Retrieves raw bytes for a resource location.
///
/// Futures are not required to be `Send`; the host polls them all on one
/// thread.
pub trait ResourceFetcher {
    fn fetch<'a>(
        &'a self,
        location: &'a ResourceLocation,
    ) -> LocalBoxFuture<'a, Result<Vec<u8>, FetchError>>;
}

/// Reads locations as paths relative to a root directory.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolve(&self, location: &ResourceLocation) -> PathBuf {
        self.root.join(location.as_str())
    }
}

impl ResourceFetcher for FileFetcher {
    /// Each read runs on its own thread from the moment of the call, so
    /// fetches overlap under any executor.
    fn fetch<'a>(
        &'a self,
        location: &'a ResourceLocation,
    ) -> LocalBoxFuture<'a, Result<Vec<u8>, FetchError>> {
        let path = self.resolve(location);
        tracing::debug!(path = %path.display(), "fetching resource");
        let (tx, rx) = oneshot::channel();
        let spawned = std::thread::Builder::new()
            .name("glasm-fetch".to_owned())
            .spawn(move || {
                // The receiver may be gone if the load was abandoned.
                let _ = tx.send(std::fs::read(&path));
            });
        async move {
            let io_error = |source: std::io::Error| match source.kind() {
                std::io::ErrorKind::NotFound => FetchError::NotFound(location.clone()),
                _ => FetchError::Io {
                    location: location.clone(),
                    source,
                },
            };
            spawned.map_err(io_error)?;
            let read = rx.await.map_err(|_| {
                io_error(std::io::Error::other("fetch thread exited before replying"))
            })?;
            read.map_err(io_error)
        }
        .boxed_local()
    }
}

/// In-memory fetcher that remembers every request.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    entries: HashMap<String, Vec<u8>>,
    requests: RefCell<Vec<ResourceLocation>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, location: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(location, bytes);
        self
    }

    pub fn insert(&mut self, location: &str, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(location.to_owned(), bytes.into());
    }

    /// Locations requested so far, in request order.
    pub fn requests(&self) -> Vec<ResourceLocation> {
        self.requests.borrow().clone()
    }
}

impl ResourceFetcher for StaticFetcher {
    fn fetch<'a>(
        &'a self,
        location: &'a ResourceLocation,
    ) -> LocalBoxFuture<'a, Result<Vec<u8>, FetchError>> {
        self.requests.borrow_mut().push(location.clone());
        let result = self
            .entries
            .get(location.as_str())
            .cloned()
            .ok_or_else(|| FetchError::NotFound(location.clone()));
        futures::future::ready(result).boxed_local()
    }
}
