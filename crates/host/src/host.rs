use crate::clock::Clock;
use crate::config::{ConfigError, EXAMPLE_MANIFEST, HostConfig, ValidatedConfig};
use crate::fetch::ResourceFetcher;
use crate::frame_loop::{FrameError, FrameLoop};
use crate::loader::{LoadError, ResourceSet};
use crate::module::{GuestModule, ModuleError};
use glasm_common::ResourceLocation;
use glasm_memory::{LinearMemoryView, MemoryError};
use glasm_render::{GraphicsContext, ShaderError, ShaderProgram};
use tracing::Instrument;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Module(#[from] ModuleError),
    #[error("module returned an unusable header pointer: {0}")]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// A validated host, ready to load.
pub struct Host<G> {
    config: ValidatedConfig<G>,
    resources: ResourceSet,
}

impl<G: GraphicsContext> Host<G> {
    /// Validate `config`. Nothing is fetched here; a rejected config logs
    /// the missing fields with an example manifest.
    pub fn new(config: HostConfig<G>) -> Result<Self, ConfigError> {
        let config = config.validate().inspect_err(|e| {
            tracing::error!("{e}\nexample manifest:\n{EXAMPLE_MANIFEST}");
        })?;
        let resources = ResourceSet::new(config.module.clone(), &config.shader_pairs);
        Ok(Self { config, resources })
    }

    pub fn resources(&self) -> &ResourceSet {
        &self.resources
    }

    pub fn module_location(&self) -> &ResourceLocation {
        &self.config.module
    }

    /// Fetch, compile, and initialise, then run frame zero.
    ///
    /// Returns a running loop. Nothing after a failed step runs: a load
    /// failure compiles no shaders, and a shader failure never calls the
    /// module.
    pub async fn load<M: GuestModule>(
        self,
        fetcher: &dyn ResourceFetcher,
        clock: Box<dyn Clock>,
    ) -> Result<FrameLoop<M, G>, BootstrapError> {
        let span = tracing::info_span!("bootstrap", module = %self.config.module);
        self.load_inner(fetcher, clock).instrument(span).await
    }

    async fn load_inner<M: GuestModule>(
        self,
        fetcher: &dyn ResourceFetcher,
        clock: Box<dyn Clock>,
    ) -> Result<FrameLoop<M, G>, BootstrapError> {
        let Self { config, resources } = self;
        let loaded = resources.load::<M>(fetcher, &config.shim).await?;
        let mut surface = config.surface;

        let mut programs = Vec::with_capacity(config.shader_pairs.len());
        for pair in &config.shader_pairs {
            // Every location was fetched and decoded or the load failed.
            let vertex = loaded.source(&pair.vertex).unwrap_or_default();
            let fragment = loaded.source(&pair.fragment).unwrap_or_default();
            programs.push(ShaderProgram::compile(&mut surface, pair, vertex, fragment)?);
        }
        tracing::info!(programs = programs.len(), "shader programs linked");
        let mut module = loaded.module;

        surface.set_clear_color(config.clear_color);
        surface.clear();

        let start_time = clock.now();
        let ptr = module.init(start_time)?;
        let view = LinearMemoryView::new(ptr, module.memory())?;
        tracing::info!(start_time, "module initialised, header at {ptr:#x}");

        let mut frame_loop = FrameLoop::new(
            module,
            surface,
            config.manager,
            view,
            programs,
            clock,
        );
        frame_loop.start(start_time)?;
        Ok(frame_loop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::fetch::StaticFetcher;
    use crate::manager::{HostRef, Manager, NoopManager};
    use glasm_common::ShaderPair;
    use glasm_memory::VERTEX_COUNT_OFFSET;
    use glasm_render::{GraphicsCommand, HeadlessGraphics};
    use glasm_shim::ShimConfig;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    const VERT: &str = "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec4<f32>(0.0); }";
    const FRAG: &str = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";
    const BASE: u32 = 32;

    thread_local! {
        static INIT_CALLS: Cell<u32> = const { Cell::new(0) };
    }

    /// Module stand-in: writes `start` and three vertices on init.
    struct StubModule {
        memory: Vec<u8>,
    }

    impl GuestModule for StubModule {
        fn instantiate(_bytes: &[u8], _shim: &ShimConfig) -> Result<Self, ModuleError> {
            Ok(Self {
                memory: vec![0; 256],
            })
        }
        fn init(&mut self, start_time: f64) -> Result<u32, ModuleError> {
            INIT_CALLS.with(|c| c.set(c.get() + 1));
            let base = BASE as usize;
            self.memory[base..base + 8].copy_from_slice(&start_time.to_le_bytes());
            let at = base + VERTEX_COUNT_OFFSET;
            self.memory[at..at + 4].copy_from_slice(&3u32.to_le_bytes());
            self.memory[at + 4..at + 8].copy_from_slice(&128u32.to_le_bytes());
            for (i, v) in [0.5f32, -0.5, 1.0].iter().enumerate() {
                let p = 128 + i * 4;
                self.memory[p..p + 4].copy_from_slice(&v.to_le_bytes());
            }
            Ok(BASE)
        }
        fn tick(&mut self) -> Result<(), ModuleError> {
            Ok(())
        }
        fn memory(&self) -> &[u8] {
            &self.memory
        }
        fn memory_mut(&mut self) -> &mut [u8] {
            &mut self.memory
        }
    }

    struct Observer {
        seen: Rc<RefCell<Vec<String>>>,
    }

    impl Manager for Observer {
        fn init(&mut self, host: &mut HostRef<'_>) {
            let programs: Vec<_> = host.programs().iter().map(|p| p.pair().label()).collect();
            self.seen.borrow_mut().push(format!("init {}", programs.join(",")));
        }
        fn tick(&mut self, host: &mut HostRef<'_>, now: f64) {
            let vertices = host.vertices().unwrap();
            self.seen
                .borrow_mut()
                .push(format!("tick {now} {vertices:?} start={}", host.timing().start));
        }
    }

    fn fetcher() -> StaticFetcher {
        StaticFetcher::new()
            .with("main.wasm", b"\0asm".to_vec())
            .with("a.vert", VERT)
            .with("a.frag", FRAG)
            .with("b.frag", FRAG)
    }

    fn config(manager: impl Manager + 'static) -> HostConfig<HeadlessGraphics> {
        HostConfig::new()
            .with_module("main.wasm")
            .with_shader_pair(ShaderPair::new("a.vert", "a.frag"))
            .with_shader_pair(ShaderPair::new("a.vert", "b.frag"))
            .with_surface(HeadlessGraphics::new())
            .with_manager(manager)
    }

    fn boot(
        config: HostConfig<HeadlessGraphics>,
        fetcher: &StaticFetcher,
    ) -> Result<FrameLoop<StubModule, HeadlessGraphics>, BootstrapError> {
        let host = Host::new(config)?;
        pollster::block_on(host.load(fetcher, Box::new(ManualClock::new(500.0))))
    }

    #[test]
    fn bootstrap_runs_every_step_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let fetcher = fetcher();
        let frame_loop = boot(config(Observer { seen: seen.clone() }), &fetcher)
            .ok()
            .unwrap();

        // a.vert is shared, so three shader fetches plus the module.
        assert_eq!(fetcher.requests().len(), 4);
        assert_eq!(frame_loop.programs().len(), 2);
        assert_eq!(
            *seen.borrow(),
            [
                "init a.vert+a.frag,a.vert+b.frag",
                "tick 500 [0.5, -0.5, 1.0] start=500",
            ]
        );

        let commands = frame_loop.graphics().commands();
        let tail = &commands[commands.len() - 2..];
        assert_eq!(
            tail,
            [
                GraphicsCommand::SetClearColor(Default::default()),
                GraphicsCommand::Clear
            ]
        );
        let t = frame_loop.timing().unwrap();
        assert_eq!((t.start, t.current, t.delta), (500.0, 500.0, 0.0));
    }

    /// Log sink shared between a test subscriber and the test body.
    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl CapturedLog {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'w> MakeWriter<'w> for CapturedLog {
        type Writer = CapturedLog;

        fn make_writer(&'w self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn rejected_config_is_logged_with_an_example() {
        let log = CapturedLog::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(log.clone())
            .with_ansi(false)
            .finish();
        let mut cfg = config(NoopManager);
        cfg.manager = None;

        let result = tracing::subscriber::with_default(subscriber, || Host::new(cfg));
        assert!(result.is_err());

        let text = log.contents();
        assert!(text.contains("ERROR"), "{text}");
        assert!(text.contains("missing required configuration: manager"), "{text}");
        assert!(text.contains("example manifest"), "{text}");
    }

    #[test]
    fn missing_manager_fails_before_any_fetch() {
        let mut cfg = config(NoopManager);
        cfg.manager = None;
        let fetcher = fetcher();

        let err = boot(cfg, &fetcher).err().unwrap();
        assert!(matches!(
            err,
            BootstrapError::Config(ConfigError::MissingFields(ref f)) if f == &["manager"]
        ));
        assert!(fetcher.requests().is_empty());
    }

    #[test]
    fn shader_failure_never_calls_the_module() {
        let fetcher = fetcher().with("b.frag", "@fragment fn broken( {");
        INIT_CALLS.with(|c| c.set(0));

        let err = boot(config(NoopManager), &fetcher).err().unwrap();
        assert!(matches!(err, BootstrapError::Shader(ShaderError::Compile { .. })));
        assert_eq!(INIT_CALLS.with(Cell::get), 0);
    }

    #[test]
    fn missing_resource_fails_the_load() {
        let fetcher = StaticFetcher::new()
            .with("main.wasm", b"\0asm".to_vec())
            .with("a.vert", VERT);

        let err = boot(config(NoopManager), &fetcher).err().unwrap();
        match err {
            BootstrapError::Load(load) => {
                let failed: Vec<_> = load.failures.iter().map(|f| f.location.as_str()).collect();
                assert_eq!(failed, ["a.frag", "b.frag"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_pair_list_fails_before_any_fetch() {
        let mut cfg = config(NoopManager);
        cfg.shader_pairs = Some(Vec::new());
        let fetcher = fetcher();

        let err = boot(cfg, &fetcher).err().unwrap();
        assert!(matches!(
            err,
            BootstrapError::Config(ConfigError::MissingFields(ref f)) if f == &["shader_pairs"]
        ));
        assert!(fetcher.requests().is_empty());
    }
}
