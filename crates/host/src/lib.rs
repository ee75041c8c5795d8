//! Host bootstrap and frame loop for a WebAssembly render module.
//!
//! The host fetches one compiled module and a set of shader pairs
//! concurrently, compiles the shaders, instantiates the module against the
//! WASI shim, and then drives the module and an external [`Manager`] once
//! per display refresh.
//!
//! ```text
//! Host::new(config)            validate, no I/O
//!   └─ Host::load(fetcher)     fetch module + unique shaders (concurrent)
//!        ├─ compile pairs      request order, first failure aborts
//!        ├─ clear surface
//!        ├─ module.init(t0)    -> shared header pointer
//!        ├─ manager.init
//!        └─ frame zero         module.tick, manager.tick
//! FrameLoop::tick / run        Idle -> Running -> Stopped
//! ```
//!
//! # Invariants
//! - No fetch is issued for an invalid configuration.
//! - Any failed resource fails the whole bootstrap; every failure is reported.
//! - The module tick always runs before the manager tick.
//! - The host writes only the current/delta timing fields; `start` belongs
//!   to the module.
//! - Everything runs on one thread. Host views of linear memory never
//!   outlive a module call.

pub mod clock;
pub mod config;
pub mod fetch;
pub mod frame_loop;
pub mod host;
pub mod loader;
pub mod manager;
pub mod module;
pub mod timer;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ConfigError, EXAMPLE_MANIFEST, HostConfig, HostManifest, ShaderPairEntry};
pub use fetch::{FetchError, FileFetcher, ResourceFetcher, StaticFetcher};
pub use frame_loop::{
    CancelToken, FixedRateScheduler, FrameError, FrameLoop, LoopState, MAX_REFRESH_INTERVAL,
    RefreshScheduler,
};
pub use host::{BootstrapError, Host};
pub use loader::{LoadError, LoadedResources, ResourceError, ResourceFailure, ResourceSet};
pub use manager::{HostRef, Manager, NoopManager};
pub use module::{GuestModule, ModuleError, WasmModule};
pub use timer::FrameTimer;

pub fn crate_info() -> &'static str {
    "glasm-host v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("host"));
    }
}
