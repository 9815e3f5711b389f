//! GPU buffer resources.

use std::fmt;
use std::sync::Arc;

use ash::vk;

use crate::backend::{AllocatedBuffer, GpuBackend, MemoryLocation};
use crate::error::{RhiError, RhiResult};
use crate::types::BufferUsage;

/// A GPU buffer and its memory.
pub struct Buffer {
    backend: Arc<dyn GpuBackend>,
    /// `None` only while being dropped.
    inner: Option<AllocatedBuffer>,
    usage: BufferUsage,
    label: String,
}

impl Buffer {
    pub(crate) fn new(
        backend: &Arc<dyn GpuBackend>,
        size: u64,
        usage: BufferUsage,
        location: MemoryLocation,
        label: &str,
    ) -> RhiResult<Self> {
        assert!(size > 0, "buffer {:?} must not be empty", label);
        let info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let inner = backend.create_buffer(&info, location, label)?;
        log::debug!(
            "Created buffer {:?} ({} bytes, {:?}, {:?})",
            label,
            size,
            usage,
            location
        );
        Ok(Self {
            backend: Arc::clone(backend),
            inner: Some(inner),
            usage,
            label: label.to_string(),
        })
    }

    fn inner(&self) -> &AllocatedBuffer {
        self.inner
            .as_ref()
            .unwrap_or_else(|| unreachable!("buffer used after drop"))
    }

    pub fn handle(&self) -> vk::Buffer {
        self.inner().handle
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.inner().size
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    pub fn location(&self) -> MemoryLocation {
        self.inner().location
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether `offset..offset + range` lies inside the buffer.
    pub fn contains_range(&self, offset: u64, range: u64) -> bool {
        offset < self.size()
            && offset
                .checked_add(range)
                .is_some_and(|end| end <= self.size())
    }

    /// Write `data` at `offset` through the host mapping.
    ///
    /// Fails for GPU-only memory.
    pub fn write(&mut self, offset: u64, data: &[u8]) -> RhiResult<()> {
        if !self.contains_range(offset, data.len() as u64) {
            return Err(RhiError::Internal(format!(
                "write of {} bytes at {} exceeds buffer {:?} of {} bytes",
                data.len(),
                offset,
                self.label,
                self.size()
            )));
        }
        let inner = self
            .inner
            .as_mut()
            .unwrap_or_else(|| unreachable!("buffer used after drop"));
        self.backend.write_buffer(inner, offset, data)
    }

    /// Read `size` bytes at `offset` through the host mapping.
    pub fn read(&self, offset: u64, size: u64) -> RhiResult<Vec<u8>> {
        if !self.contains_range(offset, size) {
            return Err(RhiError::Internal(format!(
                "read of {} bytes at {} exceeds buffer {:?} of {} bytes",
                size,
                offset,
                self.label,
                self.size()
            )));
        }
        self.backend.read_buffer(self.inner(), offset, size)
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            self.backend.destroy_buffer(inner);
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("label", &self.label)
            .field("size", &self.size())
            .field("usage", &self.usage)
            .field("location", &self.location())
            .finish()
    }
}

static_assertions::assert_impl_all!(Buffer: Send, Sync);

/// A buffer of fixed-stride vertices.
#[derive(Debug)]
pub struct VertexBuffer {
    buffer: Buffer,
    stride: u32,
}

impl VertexBuffer {
    pub(crate) fn new(buffer: Buffer, stride: u32) -> Self {
        assert!(stride > 0, "vertex stride must be non-zero");
        Self { buffer, stride }
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Number of whole vertices that fit.
    pub fn capacity(&self) -> u32 {
        (self.buffer.size() / u64::from(self.stride)) as u32
    }
}

/// Width of the indices in an [`IndexBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    pub fn size(self) -> u32 {
        match self {
            Self::U16 => 2,
            Self::U32 => 4,
        }
    }

    pub fn to_vk(self) -> vk::IndexType {
        match self {
            Self::U16 => vk::IndexType::UINT16,
            Self::U32 => vk::IndexType::UINT32,
        }
    }
}

/// A buffer of 16- or 32-bit indices.
#[derive(Debug)]
pub struct IndexBuffer {
    buffer: Buffer,
    index_type: IndexType,
}

impl IndexBuffer {
    pub(crate) fn new(buffer: Buffer, index_type: IndexType) -> Self {
        Self { buffer, index_type }
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut Buffer {
        &mut self.buffer
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }

    /// Number of indices that fit.
    pub fn capacity(&self) -> u32 {
        (self.buffer.size() / u64::from(self.index_type.size())) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::DummyBackend;

    fn backend() -> Arc<dyn GpuBackend> {
        Arc::new(DummyBackend::new())
    }

    #[test]
    fn test_range_check() {
        let buffer = Buffer::new(
            &backend(),
            256,
            BufferUsage::UNIFORM,
            MemoryLocation::CpuToGpu,
            "ubo",
        )
        .unwrap();
        assert!(buffer.contains_range(0, 256));
        assert!(buffer.contains_range(128, 128));
        assert!(!buffer.contains_range(128, 129));
        assert!(!buffer.contains_range(256, 0));
        assert!(!buffer.contains_range(8, u64::MAX));
    }

    #[test]
    fn test_host_write_and_read() {
        let mut buffer = Buffer::new(
            &backend(),
            16,
            BufferUsage::TRANSFER_SRC,
            MemoryLocation::CpuToGpu,
            "staging",
        )
        .unwrap();
        buffer.write(4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(buffer.read(2, 6).unwrap(), vec![0, 0, 1, 2, 3, 4]);
        assert!(buffer.write(14, &[0; 4]).is_err());
    }

    #[test]
    fn test_gpu_only_memory_is_not_mapped() {
        let mut buffer = Buffer::new(
            &backend(),
            16,
            BufferUsage::STORAGE,
            MemoryLocation::GpuOnly,
            "storage",
        )
        .unwrap();
        assert!(buffer.write(0, &[1]).is_err());
    }

    #[test]
    fn test_capacities() {
        let backend = backend();
        let vertices = VertexBuffer::new(
            Buffer::new(
                &backend,
                100,
                BufferUsage::VERTEX,
                MemoryLocation::GpuOnly,
                "vb",
            )
            .unwrap(),
            12,
        );
        assert_eq!(vertices.capacity(), 8);

        let indices = IndexBuffer::new(
            Buffer::new(
                &backend,
                100,
                BufferUsage::INDEX,
                MemoryLocation::GpuOnly,
                "ib",
            )
            .unwrap(),
            IndexType::U16,
        );
        assert_eq!(indices.capacity(), 50);
        assert_eq!(indices.index_type().to_vk(), vk::IndexType::UINT16);
    }
}
