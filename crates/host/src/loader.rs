//! Concurrent fetch of the module and every unique shader source.

use crate::fetch::{FetchError, ResourceFetcher};
use crate::module::{GuestModule, ModuleError};
use futures::future::join_all;
use glasm_common::{ResourceLocation, ShaderPair};
use glasm_shim::ShimConfig;
use std::collections::{HashMap, HashSet};

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Module(#[from] ModuleError),
}

/// One resource that did not load.
#[derive(Debug)]
pub struct ResourceFailure {
    pub location: ResourceLocation,
    pub error: ResourceError,
}

/// Every failure from one load attempt.
#[derive(Debug, thiserror::Error)]
#[error("{} of {} resources failed to load", .failures.len(), .total)]
pub struct LoadError {
    pub failures: Vec<ResourceFailure>,
    pub total: usize,
}

/// The module location plus shader locations, each listed once in
/// first-seen order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceSet {
    module: ResourceLocation,
    shaders: Vec<ResourceLocation>,
}

impl ResourceSet {
    pub fn new(module: ResourceLocation, pairs: &[ShaderPair]) -> Self {
        let mut seen = HashSet::new();
        let shaders = pairs
            .iter()
            .flat_map(|p| [&p.vertex, &p.fragment])
            .filter(|loc| seen.insert(*loc))
            .cloned()
            .collect();
        Self { module, shaders }
    }

    pub fn module(&self) -> &ResourceLocation {
        &self.module
    }

    pub fn shaders(&self) -> &[ResourceLocation] {
        &self.shaders
    }

    /// Total fetches a load issues.
    pub fn request_count(&self) -> usize {
        1 + self.shaders.len()
    }

    /// Fetch everything at once; resolves when all requests have settled.
    ///
    /// The module is instantiated as soon as its bytes arrive. A failure of
    /// any resource fails the load, and the error lists all of them.
    pub async fn load<M: GuestModule>(
        &self,
        fetcher: &dyn ResourceFetcher,
        shim: &ShimConfig,
    ) -> Result<LoadedResources<M>, LoadError> {
        tracing::debug!(
            module = %self.module,
            shaders = self.shaders.len(),
            "fetching resources"
        );

        let module = async {
            let bytes = fetcher.fetch(&self.module).await?;
            Ok::<M, ResourceError>(M::instantiate(&bytes, shim)?)
        };
        let shaders = join_all(self.shaders.iter().map(|location| async move {
            let bytes = fetcher.fetch(location).await?;
            String::from_utf8(bytes).map_err(|source| {
                ResourceError::Fetch(FetchError::NotUtf8 {
                    location: location.clone(),
                    source,
                })
            })
        }));
        let (module, shaders) = futures::join!(module, shaders);

        let mut failures = Vec::new();
        let module = match module {
            Ok(module) => Some(module),
            Err(error) => {
                failures.push(ResourceFailure {
                    location: self.module.clone(),
                    error,
                });
                None
            }
        };
        let mut sources = HashMap::with_capacity(shaders.len());
        for (location, result) in self.shaders.iter().zip(shaders) {
            match result {
                Ok(text) => {
                    sources.insert(location.clone(), text);
                }
                Err(error) => failures.push(ResourceFailure {
                    location: location.clone(),
                    error,
                }),
            }
        }

        match module {
            Some(module) if failures.is_empty() => {
                tracing::info!(resources = self.request_count(), "all resources loaded");
                Ok(LoadedResources { module, sources })
            }
            _ => {
                for failure in &failures {
                    tracing::error!(location = %failure.location, "{}", failure.error);
                }
                Err(LoadError {
                    failures,
                    total: self.request_count(),
                })
            }
        }
    }
}

/// The instantiated module and decoded shader sources.
pub struct LoadedResources<M> {
    pub module: M,
    sources: HashMap<ResourceLocation, String>,
}

impl<M> LoadedResources<M> {
    pub fn source(&self, location: &ResourceLocation) -> Option<&str> {
        self.sources.get(location).map(String::as_str)
    }
}
