use std::sync::{Arc, Mutex};

/// Standard stream a guest write was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StdStream {
    Stdout,
    Stderr,
}

impl StdStream {
    pub fn from_fd(fd: u32) -> Option<Self> {
        match fd {
            1 => Some(Self::Stdout),
            2 => Some(Self::Stderr),
            _ => None,
        }
    }
}

/// Receives decoded text from guest `fd_write` calls, one call per write.
pub trait StdioSink: Send + Sync {
    fn write(&self, stream: StdStream, text: &str);
}

/// Forwards guest output to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StdioSink for TracingSink {
    fn write(&self, stream: StdStream, text: &str) {
        // printf-style output carries its own newline; the subscriber adds one.
        let line = text.strip_suffix('\n').unwrap_or(text);
        match stream {
            StdStream::Stdout => tracing::info!(target: "glasm::stdout", "{line}"),
            StdStream::Stderr => tracing::warn!(target: "glasm::stderr", "{line}"),
        }
    }
}

/// Captures guest output in memory.
#[derive(Debug, Default, Clone)]
pub struct BufferedSink {
    lines: Arc<Mutex<Vec<(StdStream, String)>>>,
}

impl BufferedSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, in order.
    pub fn lines(&self) -> Vec<(StdStream, String)> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Text written to one stream, in order.
    pub fn stream(&self, stream: StdStream) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(s, _)| *s == stream)
            .map(|(_, text)| text)
            .collect()
    }
}

impl StdioSink for BufferedSink {
    fn write(&self, stream: StdStream, text: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((stream, text.to_owned()));
    }
}
