//! Host-side hooks that run after the module each frame.

use crate::timer::FrameTimer;
use glasm_memory::{LinearMemoryView, MemoryError, TimingRecord};
use glasm_render::{GraphicsContext, ShaderProgram};

/// What a [`Manager`] sees during one hook call.
///
/// Borrows linear memory for the duration of the call only, so the vertex
/// slice always reflects the module's latest writes.
pub struct HostRef<'a> {
    pub(crate) frame: u64,
    pub(crate) timing: TimingRecord,
    pub(crate) memory: &'a [u8],
    pub(crate) view: LinearMemoryView,
    pub(crate) programs: &'a [ShaderProgram],
    pub(crate) graphics: &'a mut dyn GraphicsContext,
    pub(crate) stats: &'a FrameTimer,
}

impl<'a> HostRef<'a> {
    /// Frames completed before this one; frame zero runs during bootstrap.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn timing(&self) -> TimingRecord {
        self.timing
    }

    pub fn view(&self) -> LinearMemoryView {
        self.view
    }

    pub fn vertex_count(&self) -> Result<u32, MemoryError> {
        self.view.vertex_count(self.memory)
    }

    pub fn vertices(&self) -> Result<&'a [f32], MemoryError> {
        self.view.vertices(self.memory)
    }

    /// Text the module published as a NUL-terminated string at `ptr`.
    pub fn string(&self, ptr: u32) -> Result<&'a str, MemoryError> {
        self.view.read_c_string(self.memory, ptr)
    }

    pub fn memory(&self) -> &'a [u8] {
        self.memory
    }

    /// Compiled programs, in configuration order.
    pub fn programs(&self) -> &'a [ShaderProgram] {
        self.programs
    }

    pub fn graphics(&mut self) -> &mut dyn GraphicsContext {
        &mut *self.graphics
    }

    pub fn stats(&self) -> &FrameTimer {
        self.stats
    }
}

/// External collaborator driven alongside the module.
pub trait Manager {
    /// Called once after the module's `init`, before frame zero.
    fn init(&mut self, host: &mut HostRef<'_>);

    /// Called every frame after the module's `tick`. `now` is the frame
    /// timestamp in milliseconds.
    fn tick(&mut self, host: &mut HostRef<'_>, now: f64);
}

/// Manager that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopManager;

impl Manager for NoopManager {
    fn init(&mut self, _host: &mut HostRef<'_>) {}

    fn tick(&mut self, _host: &mut HostRef<'_>, _now: f64) {}
}
