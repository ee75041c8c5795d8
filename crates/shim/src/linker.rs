use crate::wasi::{self, Errno, ShimState};
use wasmtime::{Caller, Extern, Linker, Memory};

pub const WASI_MODULE: &str = "wasi_snapshot_preview1";
/// Some toolchains import the same functions from `env`.
pub const ENV_MODULE: &str = "env";

#[derive(Debug, thiserror::Error)]
pub enum ShimError {
    #[error("failed to define {module}.{name}: {reason}")]
    Define {
        module: &'static str,
        name: &'static str,
        reason: String,
    },
}

/// Register every shim function under both import modules.
pub fn add_to_linker(linker: &mut Linker<ShimState>) -> Result<(), ShimError> {
    for module in [WASI_MODULE, ENV_MODULE] {
        define_module(linker, module)?;
    }
    tracing::debug!("registered wasi shim imports");
    Ok(())
}

fn define_module(linker: &mut Linker<ShimState>, module: &'static str) -> Result<(), ShimError> {
    let fail = move |name: &'static str| {
        move |e: wasmtime::Error| ShimError::Define {
            module,
            name,
            reason: format!("{e:#}"),
        }
    };

    linker
        .func_wrap(
            module,
            "proc_exit",
            |mut caller: Caller<'_, ShimState>, code: i32| {
                tracing::debug!(code, "guest called proc_exit");
                caller.data_mut().record_exit(code);
            },
        )
        .map_err(fail("proc_exit"))?;

    for name in ["args_sizes_get", "environ_sizes_get"] {
        linker
            .func_wrap(
                module,
                name,
                |mut caller: Caller<'_, ShimState>, count_ptr: i32, size_ptr: i32| -> i32 {
                    let Some(memory) = guest_memory(&mut caller) else {
                        return Errno::Fault.code();
                    };
                    wasi::zero_sizes(memory.data_mut(&mut caller), count_ptr as u32, size_ptr as u32)
                        .code()
                },
            )
            .map_err(fail(name))?;
    }

    for name in ["args_get", "environ_get"] {
        linker
            .func_wrap(module, name, |_ptrs: i32, _buf: i32| -> i32 {
                Errno::Success.code()
            })
            .map_err(fail(name))?;
    }

    linker
        .func_wrap(module, "fd_close", |_fd: i32| -> i32 {
            Errno::Success.code()
        })
        .map_err(fail("fd_close"))?;

    linker
        .func_wrap(
            module,
            "fd_seek",
            |_fd: i32, _offset: i64, _whence: i32, _new_offset: i32| -> i32 {
                Errno::Success.code()
            },
        )
        .map_err(fail("fd_seek"))?;

    linker
        .func_wrap(
            module,
            "fd_write",
            |mut caller: Caller<'_, ShimState>,
             fd: i32,
             iovs: i32,
             iovs_len: i32,
             nwritten: i32|
             -> i32 {
                let Some(memory) = guest_memory(&mut caller) else {
                    return Errno::Fault.code();
                };
                let (data, state) = memory.data_and_store_mut(&mut caller);
                wasi::fd_write(
                    data,
                    state,
                    fd as u32,
                    iovs as u32,
                    iovs_len as u32,
                    nwritten as u32,
                )
                .code()
            },
        )
        .map_err(fail("fd_write"))?;

    Ok(())
}

fn guest_memory(caller: &mut Caller<'_, ShimState>) -> Option<Memory> {
    caller.get_export("memory").and_then(Extern::into_memory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{BufferedSink, StdStream};
    use crate::wasi::ShimConfig;
    use wasmtime::{Engine, Module, Store};

    const HELLO_WAT: &str = r#"
        (module
          (import "wasi_snapshot_preview1" "fd_write"
            (func $fd_write (param i32 i32 i32 i32) (result i32)))
          (import "env" "proc_exit" (func $proc_exit (param i32)))
          (import "wasi_snapshot_preview1" "args_sizes_get"
            (func $args_sizes_get (param i32 i32) (result i32)))
          (memory (export "memory") 1)
          (data (i32.const 16) "He")
          (data (i32.const 32) "llo")
          (func (export "hello") (result i32)
            (i32.store (i32.const 64) (i32.const 16))
            (i32.store (i32.const 68) (i32.const 2))
            (i32.store (i32.const 72) (i32.const 32))
            (i32.store (i32.const 76) (i32.const 3))
            (call $fd_write (i32.const 1) (i32.const 64) (i32.const 2) (i32.const 96)))
          (func (export "sizes") (result i32)
            (i32.store (i32.const 200) (i32.const -1))
            (i32.store (i32.const 204) (i32.const -1))
            (call $args_sizes_get (i32.const 200) (i32.const 204)))
          (func (export "quit")
            (call $proc_exit (i32.const 3))))
    "#;

    fn instantiate(sink: BufferedSink) -> (Store<ShimState>, wasmtime::Instance) {
        let engine = Engine::default();
        let module = Module::new(&engine, HELLO_WAT).unwrap();
        let mut linker = Linker::new(&engine);
        add_to_linker(&mut linker).unwrap();
        let mut store = Store::new(&engine, ShimState::new(ShimConfig::with_sink(sink)));
        let instance = linker.instantiate(&mut store, &module).unwrap();
        (store, instance)
    }

    #[test]
    fn guest_printf_reaches_the_sink() {
        let sink = BufferedSink::new();
        let (mut store, instance) = instantiate(sink.clone());
        let hello = instance
            .get_typed_func::<(), i32>(&mut store, "hello")
            .unwrap();

        assert_eq!(hello.call(&mut store, ()).unwrap(), 0);

        let memory = instance.get_memory(&mut store, "memory").unwrap();
        let written = &memory.data(&store)[96..100];
        assert_eq!(u32::from_le_bytes(written.try_into().unwrap()), 5);
        assert_eq!(sink.lines(), vec![(StdStream::Stdout, "Hello".to_string())]);
        assert_eq!(store.data().bytes_written(), 5);
    }

    #[test]
    fn size_queries_report_nothing() {
        let (mut store, instance) = instantiate(BufferedSink::new());
        let sizes = instance
            .get_typed_func::<(), i32>(&mut store, "sizes")
            .unwrap();
        assert_eq!(sizes.call(&mut store, ()).unwrap(), 0);

        let memory = instance.get_memory(&mut store, "memory").unwrap();
        assert_eq!(&memory.data(&store)[200..208], &[0u8; 8]);
    }

    #[test]
    fn proc_exit_is_recorded_without_trapping() {
        let (mut store, instance) = instantiate(BufferedSink::new());
        let quit = instance.get_typed_func::<(), ()>(&mut store, "quit").unwrap();
        quit.call(&mut store, ()).unwrap();
        assert_eq!(store.data().exit_code(), Some(3));
    }
}
