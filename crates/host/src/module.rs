//! The compiled render module and its two exports.

use glasm_shim::{ShimConfig, ShimError, ShimState};
use wasmtime::{Engine, Instance, Linker, Memory, Module, Store, TypedFunc};

pub const INIT_EXPORT: &str = "init";
pub const TICK_EXPORT: &str = "tick";
pub const MEMORY_EXPORT: &str = "memory";
/// Reactor constructor some toolchains emit; called once if present.
pub const INITIALIZE_EXPORT: &str = "_initialize";

#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("failed to compile module: {0}")]
    Compile(String),
    #[error(transparent)]
    Shim(#[from] ShimError),
    #[error("failed to instantiate module: {0}")]
    Instantiate(String),
    #[error("module export `{name}` is missing or has the wrong type: {reason}")]
    Export { name: &'static str, reason: String },
    #[error("module `{export}` trapped: {reason}")]
    Trap { export: &'static str, reason: String },
}

/// A module exporting `init(f64) -> i32`, `tick()`, and its linear memory.
///
/// `memory` must be re-read after every `init`/`tick`; the guest may grow
/// its memory during either call.
pub trait GuestModule: Sized {
    fn instantiate(bytes: &[u8], shim: &ShimConfig) -> Result<Self, ModuleError>;

    /// Hand the start time to the module; returns the shared header pointer.
    fn init(&mut self, start_time: f64) -> Result<u32, ModuleError>;

    fn tick(&mut self) -> Result<(), ModuleError>;

    fn memory(&self) -> &[u8];

    fn memory_mut(&mut self) -> &mut [u8];
}

/// [`GuestModule`] backed by wasmtime.
pub struct WasmModule {
    store: Store<ShimState>,
    memory: Memory,
    init: TypedFunc<f64, i32>,
    tick: TypedFunc<(), ()>,
}

impl WasmModule {
    /// State of the shim for this instance.
    pub fn shim(&self) -> &ShimState {
        self.store.data()
    }

    /// Exit code passed to `proc_exit`, if the guest called it.
    pub fn exit_code(&self) -> Option<i32> {
        self.store.data().exit_code()
    }

    fn export_error(name: &'static str) -> impl FnOnce(wasmtime::Error) -> ModuleError {
        move |e| ModuleError::Export {
            name,
            reason: format!("{e:#}"),
        }
    }

    fn trap(export: &'static str) -> impl FnOnce(wasmtime::Error) -> ModuleError {
        move |e| ModuleError::Trap {
            export,
            reason: format!("{e:#}"),
        }
    }
}

impl GuestModule for WasmModule {
    fn instantiate(bytes: &[u8], shim: &ShimConfig) -> Result<Self, ModuleError> {
        let _span = tracing::debug_span!("instantiate_module", bytes = bytes.len()).entered();

        let engine = Engine::default();
        let module =
            Module::new(&engine, bytes).map_err(|e| ModuleError::Compile(format!("{e:#}")))?;

        let mut linker = Linker::new(&engine);
        glasm_shim::add_to_linker(&mut linker)?;

        let mut store = Store::new(&engine, ShimState::new(shim.clone()));
        let instance: Instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| ModuleError::Instantiate(format!("{e:#}")))?;

        let memory = instance
            .get_memory(&mut store, MEMORY_EXPORT)
            .ok_or_else(|| ModuleError::Export {
                name: MEMORY_EXPORT,
                reason: "no exported memory".into(),
            })?;
        let init = instance
            .get_typed_func::<f64, i32>(&mut store, INIT_EXPORT)
            .map_err(Self::export_error(INIT_EXPORT))?;
        let tick = instance
            .get_typed_func::<(), ()>(&mut store, TICK_EXPORT)
            .map_err(Self::export_error(TICK_EXPORT))?;

        if let Ok(initialize) = instance.get_typed_func::<(), ()>(&mut store, INITIALIZE_EXPORT) {
            tracing::debug!("running reactor constructor");
            initialize
                .call(&mut store, ())
                .map_err(Self::trap(INITIALIZE_EXPORT))?;
        }

        tracing::info!(
            memory_bytes = memory.data_size(&store),
            "module instantiated"
        );
        Ok(Self {
            store,
            memory,
            init,
            tick,
        })
    }

    fn init(&mut self, start_time: f64) -> Result<u32, ModuleError> {
        let ptr = self
            .init
            .call(&mut self.store, start_time)
            .map_err(Self::trap(INIT_EXPORT))?;
        Ok(ptr as u32)
    }

    fn tick(&mut self) -> Result<(), ModuleError> {
        self.tick
            .call(&mut self.store, ())
            .map_err(Self::trap(TICK_EXPORT))
    }

    fn memory(&self) -> &[u8] {
        self.memory.data(&self.store)
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        self.memory.data_mut(&mut self.store)
    }
}
