//! Vulkan resource wrappers.
//!
//! Each wrapper owns its native handle and, for buffers and textures, the
//! gpu-allocator allocation backing it. Everything is released on drop.

use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::{Allocation, Allocator};
use parking_lot::Mutex;

use crate::error::GraphicsError;
use crate::types::TextureDescriptor;

/// Release an allocation back to the allocator, logging failures.
fn free_allocation(allocator: &Mutex<Allocator>, allocation: Option<Allocation>, kind: &str) {
    if let Some(allocation) = allocation
        && let Err(e) = allocator.lock().free(allocation)
    {
        log::error!("Failed to free {} memory: {}", kind, e);
    }
}

// ============================================================================
// Buffer
// ============================================================================

/// Vulkan buffer with its memory allocation.
pub struct VulkanBuffer {
    device: ash::Device,
    allocator: Arc<Mutex<Allocator>>,
    buffer: vk::Buffer,
    allocation: Mutex<Option<Allocation>>,
    size: u64,
}

impl VulkanBuffer {
    pub(super) fn new(
        device: ash::Device,
        allocator: Arc<Mutex<Allocator>>,
        buffer: vk::Buffer,
        allocation: Allocation,
        size: u64,
    ) -> Self {
        Self {
            device,
            allocator,
            buffer,
            allocation: Mutex::new(Some(allocation)),
            size,
        }
    }

    /// Bind the allocation to the buffer.
    pub(super) fn bind(&self) -> Result<(), GraphicsError> {
        let guard = self.allocation.lock();
        let Some(allocation) = guard.as_ref() else {
            return Err(GraphicsError::ConstructionFailed(
                "buffer has no memory allocation".to_string(),
            ));
        };
        unsafe {
            self.device
                .bind_buffer_memory(self.buffer, allocation.memory(), allocation.offset())
        }
        .map_err(|e| {
            GraphicsError::ConstructionFailed(format!("Failed to bind buffer memory: {:?}", e))
        })
    }

    /// Get the raw Vulkan buffer handle.
    pub fn raw(&self) -> vk::Buffer {
        self.buffer
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Write host data into mapped memory.
    pub(crate) fn write(&self, offset: u64, bytes: &[u8]) -> Result<(), GraphicsError> {
        let mut guard = self.allocation.lock();
        let slice = guard
            .as_mut()
            .and_then(|allocation| allocation.mapped_slice_mut())
            .ok_or_else(|| {
                GraphicsError::ProtocolViolation("buffer memory is not host visible".to_string())
            })?;
        let start = offset as usize;
        slice[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Read host data from mapped memory.
    pub(crate) fn read(&self, offset: u64, size: u64) -> Result<Vec<u8>, GraphicsError> {
        let guard = self.allocation.lock();
        let slice = guard
            .as_ref()
            .and_then(|allocation| allocation.mapped_slice())
            .ok_or_else(|| {
                GraphicsError::ProtocolViolation("buffer memory is not host visible".to_string())
            })?;
        let start = offset as usize;
        Ok(slice[start..start + size as usize].to_vec())
    }
}

impl std::fmt::Debug for VulkanBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanBuffer")
            .field("buffer", &self.buffer)
            .field("size", &self.size)
            .finish()
    }
}

impl Drop for VulkanBuffer {
    fn drop(&mut self) {
        unsafe { self.device.destroy_buffer(self.buffer, None) };
        free_allocation(&self.allocator, self.allocation.lock().take(), "buffer");
    }
}

// ============================================================================
// Texture
// ============================================================================

/// Vulkan image with its memory allocation.
pub struct VulkanTexture {
    device: ash::Device,
    allocator: Arc<Mutex<Allocator>>,
    image: vk::Image,
    allocation: Mutex<Option<Allocation>>,
    format: vk::Format,
    image_type: vk::ImageType,
    aspect_mask: vk::ImageAspectFlags,
}

impl VulkanTexture {
    pub(super) fn new(
        device: ash::Device,
        allocator: Arc<Mutex<Allocator>>,
        image: vk::Image,
        allocation: Allocation,
        format: vk::Format,
        image_type: vk::ImageType,
        aspect_mask: vk::ImageAspectFlags,
    ) -> Self {
        Self {
            device,
            allocator,
            image,
            allocation: Mutex::new(Some(allocation)),
            format,
            image_type,
            aspect_mask,
        }
    }

    /// Bind the allocation to the image.
    pub(super) fn bind(&self) -> Result<(), GraphicsError> {
        let guard = self.allocation.lock();
        let Some(allocation) = guard.as_ref() else {
            return Err(GraphicsError::ConstructionFailed(
                "texture has no memory allocation".to_string(),
            ));
        };
        unsafe {
            self.device
                .bind_image_memory(self.image, allocation.memory(), allocation.offset())
        }
        .map_err(|e| {
            GraphicsError::ConstructionFailed(format!("Failed to bind image memory: {:?}", e))
        })
    }

    /// Get the raw Vulkan image handle.
    pub fn raw(&self) -> vk::Image {
        self.image
    }

    /// Get the Vulkan format.
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Get the image aspects covered by barriers and copies.
    pub fn aspect_mask(&self) -> vk::ImageAspectFlags {
        self.aspect_mask
    }

    /// Create an image view over a mip range.
    pub(crate) fn create_view(
        &self,
        descriptor: &TextureDescriptor,
        base_mip_level: u32,
        mip_level_count: u32,
    ) -> Result<VulkanTextureView, GraphicsError> {
        let view_type = if self.image_type == vk::ImageType::TYPE_3D {
            vk::ImageViewType::TYPE_3D
        } else {
            vk::ImageViewType::TYPE_2D
        };

        let view_info = vk::ImageViewCreateInfo::default()
            .image(self.image)
            .view_type(view_type)
            .format(self.format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: self.aspect_mask,
                base_mip_level,
                level_count: mip_level_count,
                base_array_layer: 0,
                layer_count: 1,
            });

        let view = unsafe { self.device.create_image_view(&view_info, None) }.map_err(|e| {
            GraphicsError::ConstructionFailed(format!(
                "Failed to create image view for {:?}: {:?}",
                descriptor.label, e
            ))
        })?;

        Ok(VulkanTextureView {
            device: self.device.clone(),
            view,
        })
    }
}

impl std::fmt::Debug for VulkanTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanTexture")
            .field("image", &self.image)
            .field("format", &self.format)
            .finish()
    }
}

impl Drop for VulkanTexture {
    fn drop(&mut self) {
        unsafe { self.device.destroy_image(self.image, None) };
        free_allocation(&self.allocator, self.allocation.lock().take(), "texture");
    }
}

/// Vulkan image view.
pub struct VulkanTextureView {
    device: ash::Device,
    view: vk::ImageView,
}

impl VulkanTextureView {
    /// Get the raw Vulkan image view handle.
    pub fn raw(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for VulkanTextureView {
    fn drop(&mut self) {
        unsafe { self.device.destroy_image_view(self.view, None) };
    }
}

// ============================================================================
// Sampler
// ============================================================================

/// Vulkan sampler.
pub struct VulkanSampler {
    device: ash::Device,
    sampler: vk::Sampler,
}

impl VulkanSampler {
    pub(super) fn new(device: ash::Device, sampler: vk::Sampler) -> Self {
        Self { device, sampler }
    }

    /// Get the raw Vulkan sampler handle.
    pub fn raw(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for VulkanSampler {
    fn drop(&mut self) {
        unsafe { self.device.destroy_sampler(self.sampler, None) };
    }
}
