use crate::sink::{StdStream, StdioSink, TracingSink};
use std::fmt;
use std::sync::Arc;

/// Size of one `(buf_ptr: u32, buf_len: u32)` iovec entry.
pub const IOVEC_SIZE: usize = 8;

/// WASI preview1 status codes returned to the guest.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    Success = 0,
    Badf = 8,
    Fault = 21,
}

impl Errno {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Host-side policy for the shim.
#[derive(Clone)]
pub struct ShimConfig {
    /// Reject writes to descriptors other than stdout/stderr with `Badf`.
    pub strict_descriptors: bool,
    pub sink: Arc<dyn StdioSink>,
}

impl ShimConfig {
    pub fn with_sink(sink: impl StdioSink + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
            ..Self::default()
        }
    }
}

impl Default for ShimConfig {
    fn default() -> Self {
        Self {
            strict_descriptors: false,
            sink: Arc::new(TracingSink),
        }
    }
}

impl fmt::Debug for ShimConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShimConfig")
            .field("strict_descriptors", &self.strict_descriptors)
            .finish_non_exhaustive()
    }
}

/// Per-store state the host functions read and update.
#[derive(Debug, Default)]
pub struct ShimState {
    config: ShimConfig,
    exit_code: Option<i32>,
    bytes_written: u64,
}

impl ShimState {
    pub fn new(config: ShimConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ShimConfig {
        &self.config
    }

    /// Code passed to the most recent `proc_exit`, if any.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    /// Total bytes accepted by `fd_write` over the store's lifetime.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub(crate) fn record_exit(&mut self, code: i32) {
        self.exit_code = Some(code);
    }
}

/// Concatenate the buffers described by `iovs_len` iovecs at `iovs`.
pub fn gather_iovecs(memory: &[u8], iovs: u32, iovs_len: u32) -> Result<Vec<u8>, Errno> {
    let mut out = Vec::new();
    for i in 0..iovs_len as usize {
        let entry = (iovs as usize)
            .checked_add(i * IOVEC_SIZE)
            .ok_or(Errno::Fault)?;
        let buf = read_u32(memory, entry)? as usize;
        let len = read_u32(memory, entry + 4)? as usize;
        let end = buf.checked_add(len).ok_or(Errno::Fault)?;
        out.extend_from_slice(memory.get(buf..end).ok_or(Errno::Fault)?);
    }
    Ok(out)
}

/// `fd_write(fd, iovs, iovs_len, nwritten) -> errno`.
///
/// Stores the total byte count at `nwritten` and hands stdout/stderr text to
/// the configured sink as one decoded string per call.
pub fn fd_write(
    memory: &mut [u8],
    state: &mut ShimState,
    fd: u32,
    iovs: u32,
    iovs_len: u32,
    nwritten: u32,
) -> Errno {
    let stream = StdStream::from_fd(fd);
    if stream.is_none() && state.config.strict_descriptors {
        tracing::debug!(fd, "rejecting write to unknown descriptor");
        return Errno::Badf;
    }

    let bytes = match gather_iovecs(memory, iovs, iovs_len) {
        Ok(bytes) => bytes,
        Err(errno) => {
            tracing::warn!(fd, iovs, iovs_len, "guest iovecs fall outside linear memory");
            return errno;
        }
    };
    if let Err(errno) = write_u32(memory, nwritten as usize, bytes.len() as u32) {
        return errno;
    }
    state.bytes_written += bytes.len() as u64;

    match stream {
        Some(stream) => {
            let text = String::from_utf8_lossy(&bytes);
            state.config.sink.write(stream, &text);
        }
        None => tracing::trace!(fd, len = bytes.len(), "discarding write"),
    }
    Errno::Success
}

/// Report zero entries and zero buffer bytes for an args/environ size query.
pub(crate) fn zero_sizes(memory: &mut [u8], count_ptr: u32, size_ptr: u32) -> Errno {
    match write_u32(memory, count_ptr as usize, 0)
        .and_then(|()| write_u32(memory, size_ptr as usize, 0))
    {
        Ok(()) => Errno::Success,
        Err(errno) => errno,
    }
}

fn read_u32(memory: &[u8], at: usize) -> Result<u32, Errno> {
    let end = at.checked_add(4).ok_or(Errno::Fault)?;
    let bytes = memory.get(at..end).ok_or(Errno::Fault)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn write_u32(memory: &mut [u8], at: usize, value: u32) -> Result<(), Errno> {
    let end = at.checked_add(4).ok_or(Errno::Fault)?;
    memory
        .get_mut(at..end)
        .ok_or(Errno::Fault)?
        .copy_from_slice(&value.to_le_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::BufferedSink;

    fn memory_with(buffers: &[(u32, &[u8])], iovs: u32) -> Vec<u8> {
        let mut memory = vec![0u8; 256];
        for (i, (ptr, bytes)) in buffers.iter().enumerate() {
            let p = *ptr as usize;
            memory[p..p + bytes.len()].copy_from_slice(bytes);
            let entry = iovs as usize + i * IOVEC_SIZE;
            memory[entry..entry + 4].copy_from_slice(&ptr.to_le_bytes());
            memory[entry + 4..entry + 8].copy_from_slice(&(bytes.len() as u32).to_le_bytes());
        }
        memory
    }

    #[test]
    fn stdout_write_is_concatenated_and_logged_once() {
        let sink = BufferedSink::new();
        let mut state = ShimState::new(ShimConfig::with_sink(sink.clone()));
        let mut memory = memory_with(&[(16, b"He"), (32, b"llo")], 64);

        let errno = fd_write(&mut memory, &mut state, 1, 64, 2, 128);

        assert_eq!(errno, Errno::Success);
        assert_eq!(sink.lines(), vec![(StdStream::Stdout, "Hello".to_string())]);
        assert_eq!(read_u32(&memory, 128), Ok(5));
        assert_eq!(state.bytes_written(), 5);
    }

    #[test]
    fn stderr_is_forwarded_separately() {
        let sink = BufferedSink::new();
        let mut state = ShimState::new(ShimConfig::with_sink(sink.clone()));
        let mut memory = memory_with(&[(16, b"oops\n")], 64);

        assert_eq!(fd_write(&mut memory, &mut state, 2, 64, 1, 128), Errno::Success);
        assert_eq!(sink.stream(StdStream::Stderr), vec!["oops\n"]);
        assert!(sink.stream(StdStream::Stdout).is_empty());
    }

    #[test]
    fn other_descriptors_count_bytes_but_log_nothing() {
        let sink = BufferedSink::new();
        let mut state = ShimState::new(ShimConfig::with_sink(sink.clone()));
        let mut memory = memory_with(&[(16, b"data")], 64);

        assert_eq!(fd_write(&mut memory, &mut state, 7, 64, 1, 128), Errno::Success);
        assert_eq!(read_u32(&memory, 128), Ok(4));
        assert!(sink.lines().is_empty());
    }

    #[test]
    fn strict_descriptors_reject_unknown_fds() {
        let mut config = ShimConfig::with_sink(BufferedSink::new());
        config.strict_descriptors = true;
        let mut state = ShimState::new(config);
        let mut memory = memory_with(&[(16, b"data")], 64);

        assert_eq!(fd_write(&mut memory, &mut state, 7, 64, 1, 128), Errno::Badf);
        assert_eq!(read_u32(&memory, 128), Ok(0));
        assert_eq!(fd_write(&mut memory, &mut state, 1, 64, 1, 128), Errno::Success);
    }

    #[test]
    fn out_of_bounds_buffers_fault() {
        let mut state = ShimState::new(ShimConfig::with_sink(BufferedSink::new()));
        let mut memory = memory_with(&[(16, b"ok")], 64);
        // Second iovec points past the end of memory.
        memory[72..76].copy_from_slice(&250u32.to_le_bytes());
        memory[76..80].copy_from_slice(&16u32.to_le_bytes());

        assert_eq!(fd_write(&mut memory, &mut state, 1, 64, 2, 128), Errno::Fault);
        assert_eq!(fd_write(&mut memory, &mut state, 1, 64, 1, 254), Errno::Fault);
        assert_eq!(state.bytes_written(), 0);
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let sink = BufferedSink::new();
        let mut state = ShimState::new(ShimConfig::with_sink(sink.clone()));
        let mut memory = memory_with(&[(16, &[b'h', 0xff, b'i'])], 64);

        fd_write(&mut memory, &mut state, 1, 64, 1, 128);
        assert_eq!(sink.stream(StdStream::Stdout), vec!["h\u{fffd}i"]);
    }

    #[test]
    fn zero_sizes_writes_both_counts() {
        let mut memory = vec![0xffu8; 16];
        assert_eq!(zero_sizes(&mut memory, 0, 4), Errno::Success);
        assert_eq!(&memory[..8], &[0u8; 8]);
        assert_eq!(zero_sizes(&mut memory, 0, 14), Errno::Fault);
    }
}
