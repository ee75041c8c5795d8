//! Rendering adapter: backend-agnostic graphics context and shader programs.
//!
//! # Invariants
//! - A [`ShaderProgram`] is linked exactly once and never recompiled.
//! - A failed compile or link leaves no program behind.
//! - Graphics objects live as long as the context; there is no release call.
//!
//! Two backends implement [`GraphicsContext`]: the GPU one in
//! `glasm-render-wgpu`, and [`HeadlessGraphics`] here, which validates WGSL
//! with naga and records the commands it receives. The trait is stable; swap
//! backends without changing consumers.

mod context;
mod headless;
mod points;
mod program;

pub use context::{GraphicsContext, ProgramHandle, ShaderError, ShaderHandle, ShaderStage};
pub use headless::{GraphicsCommand, HeadlessGraphics};
pub use points::{PointBounds, point_bounds};
pub use program::ShaderProgram;

pub fn crate_info() -> &'static str {
    "glasm-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
