//! Host functions for guest modules built against WASI preview1 but run
//! without an operating system.
//!
//! Only the handful of imports a freestanding C/C++ module pulls in for
//! `printf` are provided. They are registered under both the
//! `wasi_snapshot_preview1` and `env` import modules.
//!
//! | import              | behaviour                                          |
//! |---------------------|----------------------------------------------------|
//! | `proc_exit`         | records the exit code, otherwise a no-op           |
//! | `args_sizes_get`    | reports zero arguments                             |
//! | `environ_sizes_get` | reports an empty environment                       |
//! | `args_get`          | no-op                                              |
//! | `environ_get`       | no-op                                              |
//! | `fd_close`          | no-op                                              |
//! | `fd_seek`           | no-op                                              |
//! | `fd_write`          | gathers iovecs; stdout/stderr go to a [`StdioSink`]|
//!
//! # Invariants
//! - Every call returns [`Errno::Success`] unless a guest pointer falls
//!   outside linear memory ([`Errno::Fault`]) or strict descriptors are
//!   enabled and the descriptor is not stdout/stderr ([`Errno::Badf`]).
//! - No real file, argument, or environment state is ever exposed.

mod linker;
mod sink;
mod wasi;

pub use linker::{ENV_MODULE, ShimError, WASI_MODULE, add_to_linker};
pub use sink::{BufferedSink, StdStream, StdioSink, TracingSink};
pub use wasi::{Errno, IOVEC_SIZE, ShimConfig, ShimState, fd_write, gather_iovecs};

pub fn crate_info() -> &'static str {
    "glasm-shim v0.1.0"
}
