//! wgpu backend for the glasm graphics context.
//!
//! Shader stages become `wgpu::ShaderModule`s and programs become render
//! pipelines with automatic layouts. Compile and link failures are caught
//! through validation error scopes and returned as
//! [`glasm_render::ShaderError`] instead of hitting the device's uncaptured
//! error handler.
//!
//! # Invariants
//! - Pipelines are never rebuilt; resizing only reconfigures the target.
//! - The clear color is applied on every [`GraphicsContext::clear`] call.
//!
//! [`GraphicsContext::clear`]: glasm_render::GraphicsContext::clear

mod gpu;

pub use gpu::{GpuError, WgpuGraphics};
