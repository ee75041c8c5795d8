//! Shared memory protocol between the host and the guest module.
//!
//! The guest's `init` export returns a pointer `P` into its linear memory.
//! Starting at `P` the guest keeps a fixed header followed (elsewhere in the
//! same memory) by a variable-length `f32` array:
//!
//! ```text
//! P + 0   f64  start time   (ms, written once by the guest)
//! P + 8   f64  current time (ms, written by the host every frame)
//! P + 16  f64  delta time   (ms, written by the host every frame)
//! P + 24  u32  vertex count (written by the guest)
//! P + 28  u32  dynamic ptr  (written by the guest; byte offset of the f32 array)
//! ```
//!
//! All values are little-endian, matching the wasm32 memory model.
//!
//! # Invariants
//! - The view stores only the base pointer. Every accessor recomputes its
//!   offsets against the memory slice it is handed, so growth of the linear
//!   memory and guest updates to the count or pointer are always observed.
//! - Vertex slices borrow the memory, which keeps them from outliving the
//!   next guest call.

mod view;

pub use view::{
    DELTA_TIME_OFFSET, DYNAMIC_POINTER_OFFSET, HEADER_SIZE, LinearMemoryView, MemoryError,
    CURRENT_TIME_OFFSET, START_TIME_OFFSET, TimingRecord, VERTEX_COUNT_OFFSET,
};

pub fn crate_info() -> &'static str {
    "glasm-memory v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("memory"));
    }
}
