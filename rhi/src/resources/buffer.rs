//! GPU buffer resource.

use std::sync::Arc;

use parking_lot::Mutex;

use super::ResourceId;
use crate::backend::GpuBuffer;
use crate::device::{DeviceId, DeviceRef, GraphicsDevice};
use crate::error::GraphicsError;
use crate::types::{BufferDescriptor, BufferUsage};

/// A GPU buffer resource.
///
/// Buffers are created by [`GraphicsDevice::create_buffer`] and are reference-counted.
/// They hold a weak reference back to their parent device.
///
/// Buffers created with [`BufferUsage::MAP_READ`] or [`BufferUsage::MAP_WRITE`]
/// can be mapped for host access. Mapping follows a strict protocol: a mapped
/// buffer cannot be mapped again, an unmapped buffer cannot be unmapped, and
/// host reads and writes require the buffer to be mapped.
///
/// # Example
///
/// ```ignore
/// let staging = device.create_buffer(
///     &BufferDescriptor::new(1024, BufferUsage::MAP_WRITE | BufferUsage::COPY_SRC),
/// )?;
/// staging.map()?;
/// staging.write(0, &data)?;
/// staging.unmap()?;
/// ```
pub struct Buffer {
    id: ResourceId,
    device: DeviceRef,
    descriptor: BufferDescriptor,
    gpu: GpuBuffer,
    mapped: Mutex<bool>,
}

impl Buffer {
    /// Create a new buffer (called by GraphicsDevice).
    pub(crate) fn new(
        device: DeviceRef,
        descriptor: BufferDescriptor,
        gpu: GpuBuffer,
    ) -> Self {
        Self {
            id: ResourceId::next(),
            device,
            descriptor,
            gpu,
            mapped: Mutex::new(false),
        }
    }

    /// Get the resource id.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Get the parent device, if it still exists.
    pub fn device(&self) -> Option<Arc<GraphicsDevice>> {
        self.device.upgrade()
    }

    pub(crate) fn device_id(&self) -> DeviceId {
        self.device.id()
    }

    /// Get the buffer descriptor.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// Get the usage flags.
    pub fn usage(&self) -> BufferUsage {
        self.descriptor.usage
    }

    /// Get the buffer label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Get the backend buffer.
    pub(crate) fn gpu(&self) -> &GpuBuffer {
        &self.gpu
    }

    /// Returns true while the buffer is mapped.
    pub fn is_mapped(&self) -> bool {
        *self.mapped.lock()
    }

    /// Map the buffer for host access.
    ///
    /// # Errors
    ///
    /// [`GraphicsError::InvalidParameter`] if the buffer is not mappable,
    /// [`GraphicsError::ProtocolViolation`] if it is already mapped.
    pub fn map(&self) -> Result<(), GraphicsError> {
        if !self.descriptor.usage.is_mappable() {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer {:?} was not created with MAP_READ or MAP_WRITE",
                self.descriptor.label
            )));
        }

        let mut mapped = self.mapped.lock();
        if *mapped {
            return Err(GraphicsError::ProtocolViolation(format!(
                "buffer {:?} is already mapped",
                self.descriptor.label
            )));
        }
        *mapped = true;
        log::trace!("Buffer {:?}: mapped", self.id);
        Ok(())
    }

    /// Unmap a mapped buffer.
    ///
    /// # Errors
    ///
    /// [`GraphicsError::ProtocolViolation`] if the buffer is not mapped.
    pub fn unmap(&self) -> Result<(), GraphicsError> {
        let mut mapped = self.mapped.lock();
        if !*mapped {
            return Err(GraphicsError::ProtocolViolation(format!(
                "buffer {:?} is not mapped",
                self.descriptor.label
            )));
        }
        *mapped = false;
        log::trace!("Buffer {:?}: unmapped", self.id);
        Ok(())
    }

    /// Write bytes into the mapped buffer at `offset`.
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<(), GraphicsError> {
        self.check_host_access(offset, data.len() as u64, BufferUsage::MAP_WRITE)?;
        self.gpu.write(offset, data)
    }

    /// Write a slice of plain-old-data values at `offset`.
    pub fn write_pod<T: bytemuck::Pod>(&self, offset: u64, data: &[T]) -> Result<(), GraphicsError> {
        self.write(offset, bytemuck::cast_slice(data))
    }

    /// Read `size` bytes from the mapped buffer at `offset`.
    pub fn read(&self, offset: u64, size: u64) -> Result<Vec<u8>, GraphicsError> {
        self.check_host_access(offset, size, BufferUsage::MAP_READ)?;
        self.gpu.read(offset, size)
    }

    fn check_host_access(
        &self,
        offset: u64,
        size: u64,
        required: BufferUsage,
    ) -> Result<(), GraphicsError> {
        if !self.descriptor.usage.contains(required) {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer {:?} lacks {:?} usage",
                self.descriptor.label, required
            )));
        }
        if !self.is_mapped() {
            return Err(GraphicsError::ProtocolViolation(format!(
                "buffer {:?} must be mapped for host access",
                self.descriptor.label
            )));
        }
        if offset.checked_add(size).is_none_or(|end| end > self.size()) {
            return Err(GraphicsError::InvalidParameter(format!(
                "range {offset}+{size} exceeds buffer size {}",
                self.size()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.id)
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

// Ensure Buffer is Send + Sync
static_assertions::assert_impl_all!(Buffer: Send, Sync);
