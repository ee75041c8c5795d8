//! Per-refresh driver for the module and manager.
//!
//! # Invariants
//! - Each frame runs the module tick, then the manager tick, on one thread.
//! - `current - previous current == delta` for every frame after frame zero;
//!   frame zero carries `delta == 0`.
//! - Once stopped, no further frames run.

use crate::clock::Clock;
use crate::manager::{HostRef, Manager};
use crate::module::{GuestModule, ModuleError};
use crate::timer::FrameTimer;
use glasm_memory::{LinearMemoryView, MemoryError, TimingRecord};
use glasm_render::{GraphicsContext, ShaderProgram};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error(transparent)]
    Module(#[from] ModuleError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error("frame loop has not started")]
    NotStarted,
    #[error("frame loop is already {0}")]
    AlreadyStarted(LoopState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Stopped,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
        })
    }
}

/// Shared stop flag, checked before every frame.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Source of display refresh signals.
pub trait RefreshScheduler {
    /// Block until the next refresh. `false` means no more refreshes will
    /// come.
    fn wait_for_refresh(&mut self) -> bool;
}

/// Refreshes at a fixed rate, optionally for a limited number of frames.
#[derive(Debug, Clone)]
pub struct FixedRateScheduler {
    interval: Duration,
    remaining: Option<u64>,
    next: Option<Instant>,
}

/// Slowest pacing a [`FixedRateScheduler`] accepts; lower rates clamp to it.
pub const MAX_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

impl FixedRateScheduler {
    /// Pace at `fps` refreshes per second. Zero, negative, or NaN rates
    /// are unpaced.
    pub fn new(fps: f64) -> Self {
        let interval = if fps > 0.0 {
            Duration::try_from_secs_f64(fps.recip())
                .map_or(MAX_REFRESH_INTERVAL, |d| d.min(MAX_REFRESH_INTERVAL))
        } else {
            Duration::ZERO
        };
        Self {
            interval,
            remaining: None,
            next: None,
        }
    }

    /// No pacing; every wait returns immediately.
    pub fn unpaced() -> Self {
        Self::new(0.0)
    }

    pub fn with_frame_limit(mut self, frames: u64) -> Self {
        self.remaining = Some(frames);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl RefreshScheduler for FixedRateScheduler {
    fn wait_for_refresh(&mut self) -> bool {
        if let Some(remaining) = &mut self.remaining {
            if *remaining == 0 {
                return false;
            }
            *remaining -= 1;
        }
        if self.interval.is_zero() {
            return true;
        }
        let now = Instant::now();
        let deadline = self.next.unwrap_or(now);
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        // Re-anchor after a stall instead of bursting to catch up.
        self.next = Some(deadline.max(now) + self.interval);
        true
    }
}

/// Drives a running module, its manager, and the graphics context.
pub struct FrameLoop<M, G> {
    module: M,
    graphics: G,
    manager: Box<dyn Manager>,
    view: LinearMemoryView,
    programs: Vec<ShaderProgram>,
    clock: Box<dyn Clock>,
    state: LoopState,
    cancel: CancelToken,
    previous: f64,
    frame: u64,
    stats: FrameTimer,
}

impl<M: GuestModule, G: GraphicsContext> FrameLoop<M, G> {
    /// Assemble an idle loop around an initialised module.
    pub fn new(
        module: M,
        graphics: G,
        manager: Box<dyn Manager>,
        view: LinearMemoryView,
        programs: Vec<ShaderProgram>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            module,
            graphics,
            manager,
            view,
            programs,
            clock,
            state: LoopState::Idle,
            cancel: CancelToken::new(),
            previous: 0.0,
            frame: 0,
            stats: FrameTimer::default(),
        }
    }

    /// Run the manager's `init` and frame zero at `start_time`, then start
    /// running. Only valid while idle.
    pub fn start(&mut self, start_time: f64) -> Result<(), FrameError> {
        if self.state != LoopState::Idle {
            return Err(FrameError::AlreadyStarted(self.state));
        }
        let _span = tracing::debug_span!("frame_zero", start_time).entered();

        self.write_timing(start_time, 0.0)?;
        self.previous = start_time;
        self.with_host(|manager, host| manager.init(host))?;

        if let Err(e) = self.run_frame(start_time) {
            self.state = LoopState::Stopped;
            return Err(e);
        }
        self.state = LoopState::Running;
        tracing::info!(start_time, "frame loop running");
        Ok(())
    }

    /// Run one frame at the clock's current time.
    ///
    /// Returns the state after the frame. A failing frame stops the loop.
    pub fn tick(&mut self) -> Result<LoopState, FrameError> {
        match self.state {
            LoopState::Idle => return Err(FrameError::NotStarted),
            LoopState::Stopped => return Ok(LoopState::Stopped),
            LoopState::Running => {}
        }
        if self.cancel.is_cancelled() {
            self.stop();
            return Ok(self.state);
        }

        let now = self.clock.now();
        let delta = now - self.previous;
        let result = self
            .write_timing(now, delta)
            .map_err(FrameError::from)
            .and_then(|()| self.run_frame(now));
        if let Err(e) = result {
            tracing::error!(frame = self.frame, "frame failed: {e}");
            self.state = LoopState::Stopped;
            return Err(e);
        }

        self.previous = now;
        self.stats.record(delta);
        tracing::trace!(frame = self.frame, now, delta, "frame complete");
        Ok(self.state)
    }

    /// Tick on every refresh until stopped, cancelled, or the scheduler
    /// runs dry. Returns the number of frames run.
    pub fn run(&mut self, scheduler: &mut dyn RefreshScheduler) -> Result<u64, FrameError> {
        let first = self.frame;
        while self.state == LoopState::Running {
            if self.cancel.is_cancelled() {
                self.stop();
                break;
            }
            if !scheduler.wait_for_refresh() {
                self.stop();
                break;
            }
            self.tick()?;
        }
        Ok(self.frame - first)
    }

    pub fn stop(&mut self) {
        if self.state != LoopState::Stopped {
            tracing::info!(frames = self.frame, "frame loop stopped");
            self.state = LoopState::Stopped;
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Frames completed, including frame zero.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn stats(&self) -> &FrameTimer {
        &self.stats
    }

    pub fn timing(&self) -> Result<TimingRecord, MemoryError> {
        self.view.timing(self.module.memory())
    }

    pub fn view(&self) -> LinearMemoryView {
        self.view
    }

    pub fn programs(&self) -> &[ShaderProgram] {
        &self.programs
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    pub fn graphics(&self) -> &G {
        &self.graphics
    }

    pub fn graphics_mut(&mut self) -> &mut G {
        &mut self.graphics
    }

    fn write_timing(&mut self, now: f64, delta: f64) -> Result<(), MemoryError> {
        let memory = self.module.memory_mut();
        self.view.set_current_time(memory, now)?;
        self.view.set_delta_time(memory, delta)
    }

    fn run_frame(&mut self, now: f64) -> Result<(), FrameError> {
        self.module.tick()?;
        self.with_host(|manager, host| manager.tick(host, now))?;
        self.frame += 1;
        Ok(())
    }

    fn with_host(
        &mut self,
        f: impl FnOnce(&mut dyn Manager, &mut HostRef<'_>),
    ) -> Result<(), MemoryError> {
        let memory = self.module.memory();
        let mut host = HostRef {
            frame: self.frame,
            timing: self.view.timing(memory)?,
            memory,
            view: self.view,
            programs: &self.programs,
            graphics: &mut self.graphics,
            stats: &self.stats,
        };
        f(self.manager.as_mut(), &mut host);
        Ok(())
    }
}
