use glasm_common::ClearColor;
use std::fmt;

/// Pipeline stage a shader source is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// Opaque handle to a compiled shader stage owned by a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderHandle(pub u32);

/// Opaque handle to a linked program owned by a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u32);

/// Errors from compiling or linking shaders. Carries the backend's
/// diagnostic text verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShaderError {
    #[error("could not compile {stage} shader {label}:\n\n{log}")]
    Compile {
        stage: ShaderStage,
        label: String,
        log: String,
    },
    #[error("could not link program {label}:\n\n{log}")]
    Link { label: String, log: String },
    #[error("unknown shader handle {0:?}")]
    UnknownShader(ShaderHandle),
}

/// Backend-agnostic graphics context. All backends implement this trait.
///
/// Mirrors the small slice of a GL-style API the host needs: two-stage
/// compile + link, and a one-time clear of the rendering surface.
pub trait GraphicsContext {
    /// Short backend name for logs.
    fn backend_name(&self) -> &str;

    /// Compile one stage from source text.
    fn create_shader(
        &mut self,
        stage: ShaderStage,
        label: &str,
        source: &str,
    ) -> Result<ShaderHandle, ShaderError>;

    /// Link a vertex and a fragment stage into a program.
    fn link_program(
        &mut self,
        label: &str,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, ShaderError>;

    fn set_clear_color(&mut self, color: ClearColor);

    /// Clear the rendering surface to the current clear color.
    fn clear(&mut self);
}

impl<G: GraphicsContext + ?Sized> GraphicsContext for Box<G> {
    fn backend_name(&self) -> &str {
        (**self).backend_name()
    }

    fn create_shader(
        &mut self,
        stage: ShaderStage,
        label: &str,
        source: &str,
    ) -> Result<ShaderHandle, ShaderError> {
        (**self).create_shader(stage, label, source)
    }

    fn link_program(
        &mut self,
        label: &str,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramHandle, ShaderError> {
        (**self).link_program(label, vertex, fragment)
    }

    fn set_clear_color(&mut self, color: ClearColor) {
        (**self).set_clear_color(color)
    }

    fn clear(&mut self) {
        (**self).clear()
    }
}
