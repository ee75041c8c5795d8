use bytemuck::{Pod, Zeroable};
use std::ops::Range;

pub const START_TIME_OFFSET: usize = 0;
pub const CURRENT_TIME_OFFSET: usize = 8;
pub const DELTA_TIME_OFFSET: usize = 16;
pub const VERTEX_COUNT_OFFSET: usize = 24;
pub const DYNAMIC_POINTER_OFFSET: usize = 28;
/// Bytes from the base pointer to the end of the dynamic pointer field.
pub const HEADER_SIZE: usize = 32;

/// The three timing fields at the start of the shared header.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TimingRecord {
    pub start: f64,
    pub current: f64,
    pub delta: f64,
}

/// Errors from reading or writing the shared region.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryError {
    #[error("shared header at {base:#x} (32 bytes) exceeds linear memory of {len} bytes")]
    HeaderOutOfBounds { base: u32, len: usize },
    #[error("vertex array at {ptr:#x} with {count} floats exceeds linear memory of {len} bytes")]
    VerticesOutOfBounds { ptr: u32, count: u32, len: usize },
    #[error("vertex array at {ptr:#x} is not 4-byte aligned")]
    MisalignedVertices { ptr: u32 },
    #[error("string at {ptr:#x} starts past linear memory of {len} bytes")]
    StringOutOfBounds { ptr: u32, len: usize },
    #[error("string at {ptr:#x} is not valid UTF-8")]
    InvalidUtf8 { ptr: u32 },
}

/// Accessor over the shared header rooted at a guest pointer.
///
/// Holds no reference to the memory itself: callers pass the current
/// linear-memory slice on every access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearMemoryView {
    base: u32,
}

impl LinearMemoryView {
    /// Attach to the header at `base`. Only the header is checked; the
    /// vertex array may be empty or not yet published.
    pub fn new(base: u32, memory: &[u8]) -> Result<Self, MemoryError> {
        let view = Self { base };
        view.header(memory.len())?;
        tracing::debug!("attached shared memory view at {base:#x}");
        Ok(view)
    }

    /// Guest pointer this view is rooted at.
    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn timing(&self, memory: &[u8]) -> Result<TimingRecord, MemoryError> {
        let header = self.header(memory.len())?;
        let start = header.start + START_TIME_OFFSET;
        let end = start + std::mem::size_of::<TimingRecord>();
        Ok(bytemuck::pod_read_unaligned(&memory[start..end]))
    }

    pub fn start_time(&self, memory: &[u8]) -> Result<f64, MemoryError> {
        self.read_f64(memory, START_TIME_OFFSET)
    }

    pub fn set_start_time(&self, memory: &mut [u8], t: f64) -> Result<(), MemoryError> {
        self.write_f64(memory, START_TIME_OFFSET, t)
    }

    pub fn current_time(&self, memory: &[u8]) -> Result<f64, MemoryError> {
        self.read_f64(memory, CURRENT_TIME_OFFSET)
    }

    pub fn set_current_time(&self, memory: &mut [u8], t: f64) -> Result<(), MemoryError> {
        self.write_f64(memory, CURRENT_TIME_OFFSET, t)
    }

    pub fn delta_time(&self, memory: &[u8]) -> Result<f64, MemoryError> {
        self.read_f64(memory, DELTA_TIME_OFFSET)
    }

    pub fn set_delta_time(&self, memory: &mut [u8], t: f64) -> Result<(), MemoryError> {
        self.write_f64(memory, DELTA_TIME_OFFSET, t)
    }

    /// Number of `f32` elements the guest has published.
    pub fn vertex_count(&self, memory: &[u8]) -> Result<u32, MemoryError> {
        self.read_u32(memory, VERTEX_COUNT_OFFSET)
    }

    /// Byte offset of the vertex array inside linear memory.
    pub fn dynamic_pointer(&self, memory: &[u8]) -> Result<u32, MemoryError> {
        self.read_u32(memory, DYNAMIC_POINTER_OFFSET)
    }

    /// Live view of the vertex array, rebuilt from the current count and
    /// pointer fields.
    pub fn vertices<'m>(&self, memory: &'m [u8]) -> Result<&'m [f32], MemoryError> {
        let range = self.vertex_range(memory)?;
        if range.is_empty() {
            return Ok(&[]);
        }
        bytemuck::try_cast_slice(&memory[range]).map_err(|_| MemoryError::MisalignedVertices {
            ptr: self.dynamic_pointer(memory).unwrap_or_default(),
        })
    }

    /// Owned copy of the vertex array. Works for unaligned pointers too.
    pub fn vertices_snapshot(&self, memory: &[u8]) -> Result<Vec<f32>, MemoryError> {
        let range = self.vertex_range(memory)?;
        Ok(bytemuck::pod_collect_to_vec(&memory[range]))
    }

    /// NUL-terminated UTF-8 string at `ptr`. Without a terminator the
    /// string runs to the end of linear memory.
    pub fn read_c_string<'m>(&self, memory: &'m [u8], ptr: u32) -> Result<&'m str, MemoryError> {
        let tail = memory
            .get(ptr as usize..)
            .ok_or(MemoryError::StringOutOfBounds {
                ptr,
                len: memory.len(),
            })?;
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        std::str::from_utf8(&tail[..end]).map_err(|_| MemoryError::InvalidUtf8 { ptr })
    }

    fn vertex_range(&self, memory: &[u8]) -> Result<Range<usize>, MemoryError> {
        let count = self.vertex_count(memory)?;
        if count == 0 {
            return Ok(0..0);
        }
        let ptr = self.dynamic_pointer(memory)?;
        let out_of_bounds = MemoryError::VerticesOutOfBounds {
            ptr,
            count,
            len: memory.len(),
        };
        let start = ptr as usize;
        let end = (count as usize)
            .checked_mul(std::mem::size_of::<f32>())
            .and_then(|bytes| start.checked_add(bytes))
            .ok_or_else(|| out_of_bounds.clone())?;
        if end > memory.len() {
            return Err(out_of_bounds);
        }
        Ok(start..end)
    }

    fn header(&self, len: usize) -> Result<Range<usize>, MemoryError> {
        let start = self.base as usize;
        match start.checked_add(HEADER_SIZE) {
            Some(end) if end <= len => Ok(start..end),
            _ => Err(MemoryError::HeaderOutOfBounds {
                base: self.base,
                len,
            }),
        }
    }

    fn read_f64(&self, memory: &[u8], offset: usize) -> Result<f64, MemoryError> {
        let at = self.header(memory.len())?.start + offset;
        Ok(f64::from_le_bytes(field_bytes(&memory[at..at + 8])))
    }

    fn write_f64(&self, memory: &mut [u8], offset: usize, value: f64) -> Result<(), MemoryError> {
        let at = self.header(memory.len())?.start + offset;
        memory[at..at + 8].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    fn read_u32(&self, memory: &[u8], offset: usize) -> Result<u32, MemoryError> {
        let at = self.header(memory.len())?.start + offset;
        Ok(u32::from_le_bytes(field_bytes(&memory[at..at + 4])))
    }
}

fn field_bytes<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}
