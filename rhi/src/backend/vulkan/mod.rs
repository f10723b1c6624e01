//! Vulkan backend using ash.
//!
//! The backend is built on a device the caller already created (instance
//! creation, device selection and extension negotiation live outside this
//! crate). It owns a gpu-allocator [`Allocator`] for resource memory and
//! compiles render graphs into `VkRenderPass` objects, delegating pipeline
//! construction to a [`VulkanPipelineBuilder`].
//!
//! Every [`VulkanCommandList`] owns a transient command pool, so encoders on
//! different threads never share pool state.

mod command;
mod conversion;
mod render_graph;
mod resources;

use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::{Allocator, AllocatorCreateDesc};
use parking_lot::Mutex;

use crate::error::GraphicsError;
use crate::graph::{PipelineDescriptor, RenderGraphDescriptor, RenderPassDescriptor};
use crate::types::{BufferDescriptor, BufferUsage, SamplerDescriptor, TextureDescriptor};

pub use command::{VulkanCommandList, VulkanQueue};
pub use render_graph::{VulkanPass, VulkanPipeline, VulkanRenderGraph};
pub use resources::{VulkanBuffer, VulkanSampler, VulkanTexture, VulkanTextureView};

use self::conversion::{
    convert_address_mode, convert_aspect_mask, convert_buffer_usage, convert_filter_mode,
    convert_mipmap_filter_mode, convert_sample_count, convert_texture_format,
    convert_texture_usage,
};
use super::{GpuBuffer, GpuRenderGraph, GpuSampler, GpuTexture};

/// Native objects the Vulkan backend is built on.
///
/// The caller keeps ownership: the backend never destroys the instance or
/// the device, and they must outlive every object created through it.
#[derive(Clone)]
pub struct VulkanDeviceContext {
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub device: ash::Device,
    pub queue: vk::Queue,
    pub queue_family_index: u32,
}

/// Builds native pipelines for the pipeline slots of a render graph.
///
/// Shader loading, descriptor layouts and fixed-function state are the
/// builder's business. The returned pipeline is owned by the render graph
/// and destroyed with it.
pub trait VulkanPipelineBuilder: Send + Sync {
    fn build_pipeline(
        &self,
        device: &ash::Device,
        render_pass: vk::RenderPass,
        pass_index: usize,
        pass: &RenderPassDescriptor,
        pipeline: &PipelineDescriptor,
    ) -> Result<vk::Pipeline, GraphicsError>;
}

/// Vulkan-based GPU backend using ash.
pub struct VulkanBackend {
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    queue: Arc<Mutex<vk::Queue>>,
    queue_family_index: u32,
    allocator: Arc<Mutex<Allocator>>,
    pipeline_builder: Option<Arc<dyn VulkanPipelineBuilder>>,
}

impl std::fmt::Debug for VulkanBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanBackend")
            .field("physical_device", &self.physical_device)
            .field("queue_family_index", &self.queue_family_index)
            .field("pipeline_builder", &self.pipeline_builder.is_some())
            .finish()
    }
}

impl VulkanBackend {
    /// Create the backend on an existing device.
    pub fn new(
        context: VulkanDeviceContext,
        pipeline_builder: Option<Arc<dyn VulkanPipelineBuilder>>,
    ) -> Result<Self, GraphicsError> {
        let allocator = Allocator::new(&AllocatorCreateDesc {
            instance: context.instance.clone(),
            device: context.device.clone(),
            physical_device: context.physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
            allocation_sizes: gpu_allocator::AllocationSizes::default(),
        })
        .map_err(|e| {
            GraphicsError::ConstructionFailed(format!("Failed to create memory allocator: {}", e))
        })?;

        log::info!(
            "Vulkan backend initialized (queue family: {})",
            context.queue_family_index
        );

        Ok(Self {
            device: context.device,
            physical_device: context.physical_device,
            queue: Arc::new(Mutex::new(context.queue)),
            queue_family_index: context.queue_family_index,
            allocator: Arc::new(Mutex::new(allocator)),
            pipeline_builder,
        })
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        "Vulkan Backend (ash)"
    }

    /// Get the Vulkan device.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Create a buffer resource.
    pub fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
        let location = if descriptor.usage.contains(BufferUsage::MAP_READ) {
            gpu_allocator::MemoryLocation::GpuToCpu
        } else if descriptor.usage.contains(BufferUsage::MAP_WRITE) {
            gpu_allocator::MemoryLocation::CpuToGpu
        } else {
            gpu_allocator::MemoryLocation::GpuOnly
        };

        let buffer_info = vk::BufferCreateInfo::default()
            .size(descriptor.size)
            .usage(convert_buffer_usage(descriptor.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&buffer_info, None) }.map_err(|e| {
            GraphicsError::ConstructionFailed(format!("Failed to create buffer: {:?}", e))
        })?;

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let allocation = self
            .allocator
            .lock()
            .allocate(&gpu_allocator::vulkan::AllocationCreateDesc {
                name: descriptor.label.as_deref().unwrap_or("buffer"),
                requirements,
                location,
                linear: true,
                allocation_scheme: gpu_allocator::vulkan::AllocationScheme::GpuAllocatorManaged,
            });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(GraphicsError::ConstructionFailed(format!(
                    "Failed to allocate buffer memory: {}",
                    e
                )));
            }
        };

        // From here on the buffer owns both handles and frees them on drop.
        let vulkan_buffer = VulkanBuffer::new(
            self.device.clone(),
            Arc::clone(&self.allocator),
            buffer,
            allocation,
            descriptor.size,
        );
        vulkan_buffer.bind()?;

        log::trace!(
            "VulkanBackend: created buffer {:?} ({} bytes, {:?})",
            descriptor.label,
            descriptor.size,
            location
        );
        Ok(GpuBuffer::Vulkan(vulkan_buffer))
    }

    /// Create a texture resource.
    pub fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
    ) -> Result<GpuTexture, GraphicsError> {
        let format = convert_texture_format(descriptor.format);
        let (image_type, extent) = if descriptor.size.depth > 1 {
            (
                vk::ImageType::TYPE_3D,
                vk::Extent3D {
                    width: descriptor.size.width,
                    height: descriptor.size.height,
                    depth: descriptor.size.depth,
                },
            )
        } else {
            (
                vk::ImageType::TYPE_2D,
                vk::Extent3D {
                    width: descriptor.size.width,
                    height: descriptor.size.height,
                    depth: 1,
                },
            )
        };

        let image_info = vk::ImageCreateInfo::default()
            .image_type(image_type)
            .format(format)
            .extent(extent)
            .mip_levels(descriptor.mip_level_count)
            .array_layers(1)
            .samples(convert_sample_count(descriptor.sample_count))
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(convert_texture_usage(descriptor.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe { self.device.create_image(&image_info, None) }.map_err(|e| {
            GraphicsError::ConstructionFailed(format!("Failed to create image: {:?}", e))
        })?;

        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        let allocation = self
            .allocator
            .lock()
            .allocate(&gpu_allocator::vulkan::AllocationCreateDesc {
                name: descriptor.label.as_deref().unwrap_or("texture"),
                requirements,
                location: gpu_allocator::MemoryLocation::GpuOnly,
                linear: false,
                allocation_scheme: gpu_allocator::vulkan::AllocationScheme::GpuAllocatorManaged,
            });
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_image(image, None) };
                return Err(GraphicsError::ConstructionFailed(format!(
                    "Failed to allocate texture memory: {}",
                    e
                )));
            }
        };

        let texture = VulkanTexture::new(
            self.device.clone(),
            Arc::clone(&self.allocator),
            image,
            allocation,
            format,
            image_type,
            convert_aspect_mask(descriptor.format),
        );
        texture.bind()?;

        log::trace!(
            "VulkanBackend: created texture {:?} ({}x{}x{}, {:?})",
            descriptor.label,
            extent.width,
            extent.height,
            extent.depth,
            format
        );
        Ok(GpuTexture::Vulkan(texture))
    }

    /// Create a sampler resource.
    pub fn create_sampler(
        &self,
        descriptor: &SamplerDescriptor,
    ) -> Result<GpuSampler, GraphicsError> {
        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(convert_filter_mode(descriptor.mag_filter))
            .min_filter(convert_filter_mode(descriptor.min_filter))
            .mipmap_mode(convert_mipmap_filter_mode(descriptor.mipmap_filter))
            .address_mode_u(convert_address_mode(descriptor.address_mode_u))
            .address_mode_v(convert_address_mode(descriptor.address_mode_v))
            .address_mode_w(convert_address_mode(descriptor.address_mode_w))
            .min_lod(descriptor.lod_min_clamp)
            .max_lod(descriptor.lod_max_clamp)
            .border_color(vk::BorderColor::FLOAT_TRANSPARENT_BLACK)
            .unnormalized_coordinates(false);

        let sampler = unsafe { self.device.create_sampler(&sampler_info, None) }.map_err(|e| {
            GraphicsError::ConstructionFailed(format!("Failed to create sampler: {:?}", e))
        })?;

        Ok(GpuSampler::Vulkan(VulkanSampler::new(
            self.device.clone(),
            sampler,
        )))
    }

    /// Compile render passes and pipelines for a render graph.
    pub fn create_render_graph(
        &self,
        descriptor: &RenderGraphDescriptor,
    ) -> Result<GpuRenderGraph, GraphicsError> {
        let graph = VulkanRenderGraph::compile(
            &self.device,
            descriptor,
            self.pipeline_builder.as_deref(),
        )?;
        Ok(GpuRenderGraph::Vulkan(graph))
    }

    /// Allocate a command list in the recording state.
    pub fn create_command_list(
        &self,
        label: Option<&str>,
    ) -> Result<VulkanCommandList, GraphicsError> {
        VulkanCommandList::new(self.device.clone(), self.queue_family_index, label)
    }

    /// Create the submission queue.
    pub fn create_queue(&self) -> VulkanQueue {
        VulkanQueue::new(self.device.clone(), Arc::clone(&self.queue))
    }
}
