use serde::{Deserialize, Serialize};
use std::fmt;

/// Location of a resource the host fetches during bootstrap.
///
/// Interpreted by the active fetcher: a path relative to the manifest
/// directory for file fetching, or a plain key for in-memory fetching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceLocation(pub String);

impl ResourceLocation {
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank locations are treated as missing by config validation.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for ResourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceLocation {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One vertex + fragment source pair, compiled into a single program.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShaderPair {
    pub vertex: ResourceLocation,
    pub fragment: ResourceLocation,
}

impl ShaderPair {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: ResourceLocation::new(vertex),
            fragment: ResourceLocation::new(fragment),
        }
    }

    /// Label used for GPU objects and log lines.
    pub fn label(&self) -> String {
        format!("{}+{}", self.vertex, self.fragment)
    }
}

/// RGBA clear color, components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct ClearColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl ClearColor {
    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for ClearColor {
    /// Deep purple.
    fn default() -> Self {
        Self::new(0.15, 0.0, 0.20, 1.0)
    }
}

impl From<[f64; 4]> for ClearColor {
    fn from([r, g, b, a]: [f64; 4]) -> Self {
        Self { r, g, b, a }
    }
}

impl From<ClearColor> for [f64; 4] {
    fn from(c: ClearColor) -> Self {
        [c.r, c.g, c.b, c.a]
    }
}
