//! Host configuration: the manifest on disk and the validated runtime form.

use crate::manager::Manager;
use glasm_common::{ClearColor, ResourceLocation, ShaderPair};
use glasm_shim::ShimConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Printed alongside validation errors.
pub const EXAMPLE_MANIFEST: &str = r#"{
  "module": "main.wasm",
  "shader_pairs": [
    { "vertex": "points.vert.wgsl", "fragment": "points.frag.wgsl" }
  ]
}"#;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    MissingFields(Vec<String>),
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON manifest: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// One shader pair entry as written in a manifest. Either half may be
/// absent; validation reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShaderPairEntry {
    #[serde(alias = "vert", default)]
    pub vertex: Option<String>,
    #[serde(alias = "frag", default)]
    pub fragment: Option<String>,
}

/// Manifest naming the module and shader sources to load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostManifest {
    #[serde(alias = "wasm")]
    pub module: Option<String>,
    #[serde(alias = "shaders")]
    pub shader_pairs: Option<Vec<ShaderPairEntry>>,
    pub clear_color: ClearColor,
    pub strict_descriptors: bool,
}

impl HostManifest {
    /// Load from a `.json`, `.yaml`, or `.yml` file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml(&text),
            _ => Self::from_json(&text),
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }
}

/// Everything the host needs to boot, before validation.
///
/// `G` is the graphics context draws go to.
pub struct HostConfig<G> {
    pub module: Option<ResourceLocation>,
    pub shader_pairs: Option<Vec<ShaderPair>>,
    pub surface: Option<G>,
    pub manager: Option<Box<dyn Manager>>,
    pub clear_color: ClearColor,
    pub shim: ShimConfig,
}

impl<G> Default for HostConfig<G> {
    fn default() -> Self {
        Self {
            module: None,
            shader_pairs: None,
            surface: None,
            manager: None,
            clear_color: ClearColor::default(),
            shim: ShimConfig::default(),
        }
    }
}

impl<G> HostConfig<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resource and shim settings from a manifest. The surface and manager
    /// still have to be supplied.
    pub fn from_manifest(manifest: &HostManifest) -> Self {
        let shader_pairs = manifest.shader_pairs.as_ref().map(|entries| {
            entries
                .iter()
                .map(|e| {
                    ShaderPair::new(
                        e.vertex.clone().unwrap_or_default(),
                        e.fragment.clone().unwrap_or_default(),
                    )
                })
                .collect()
        });
        Self {
            module: manifest.module.as_deref().map(ResourceLocation::new),
            shader_pairs,
            clear_color: manifest.clear_color,
            shim: ShimConfig {
                strict_descriptors: manifest.strict_descriptors,
                ..ShimConfig::default()
            },
            ..Self::default()
        }
    }

    pub fn with_module(mut self, location: impl Into<ResourceLocation>) -> Self {
        self.module = Some(location.into());
        self
    }

    pub fn with_shader_pair(mut self, pair: ShaderPair) -> Self {
        self.shader_pairs.get_or_insert_with(Vec::new).push(pair);
        self
    }

    pub fn with_surface(mut self, surface: G) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn with_manager(mut self, manager: impl Manager + 'static) -> Self {
        self.manager = Some(Box::new(manager));
        self
    }

    pub fn with_clear_color(mut self, color: ClearColor) -> Self {
        self.clear_color = color;
        self
    }

    pub fn with_shim(mut self, shim: ShimConfig) -> Self {
        self.shim = shim;
        self
    }

    /// Names of every required field that is absent or blank.
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.module.as_ref().is_none_or(ResourceLocation::is_blank) {
            missing.push("module".to_owned());
        }
        match &self.shader_pairs {
            None => missing.push("shader_pairs".to_owned()),
            Some(pairs) if pairs.is_empty() => missing.push("shader_pairs".to_owned()),
            Some(pairs) => {
                for (i, pair) in pairs.iter().enumerate() {
                    if pair.vertex.is_blank() {
                        missing.push(format!("shader_pairs[{i}].vertex"));
                    }
                    if pair.fragment.is_blank() {
                        missing.push(format!("shader_pairs[{i}].fragment"));
                    }
                }
            }
        }
        if self.surface.is_none() {
            missing.push("surface".to_owned());
        }
        if self.manager.is_none() {
            missing.push("manager".to_owned());
        }
        missing
    }

    pub(crate) fn validate(self) -> Result<ValidatedConfig<G>, ConfigError> {
        let missing = self.missing_fields();
        match (self.module, self.shader_pairs, self.surface, self.manager) {
            (Some(module), Some(shader_pairs), Some(surface), Some(manager))
                if missing.is_empty() =>
            {
                Ok(ValidatedConfig {
                    module,
                    shader_pairs,
                    surface,
                    manager,
                    clear_color: self.clear_color,
                    shim: self.shim,
                })
            }
            _ => Err(ConfigError::MissingFields(missing)),
        }
    }
}

pub(crate) struct ValidatedConfig<G> {
    pub module: ResourceLocation,
    pub shader_pairs: Vec<ShaderPair>,
    pub surface: G,
    pub manager: Box<dyn Manager>,
    pub clear_color: ClearColor,
    pub shim: ShimConfig,
}
