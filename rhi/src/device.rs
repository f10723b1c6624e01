//! Graphics device.
//!
//! The [`GraphicsDevice`] is the factory for every GPU object: buffers,
//! textures, samplers, render graphs and command encoders. It owns the
//! backend and the device's single [`Queue`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::backend::{BackendType, GpuBackend, dummy::DummyBackend};
use crate::command::CommandEncoder;
use crate::error::GraphicsError;
use crate::graph::{RenderGraph, RenderGraphDescriptor};
use crate::queue::Queue;
use crate::resources::{Buffer, Sampler, Texture};
use crate::tracker::HazardPolicy;
use crate::types::{BufferDescriptor, SamplerDescriptor, TextureDescriptor};

#[cfg(feature = "vulkan-backend")]
use crate::backend::vulkan::{VulkanBackend, VulkanDeviceContext, VulkanPipelineBuilder};

/// Process-unique identity of a device.
///
/// Ids are never reused, so a resource outliving its device can't be
/// mistaken for one of a device created later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(u64);

impl DeviceId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Back-reference from an object to the device that created it.
#[derive(Clone)]
pub(crate) struct DeviceRef {
    id: DeviceId,
    device: Weak<GraphicsDevice>,
}

impl DeviceRef {
    /// A reference to no live device, for objects built outside a device.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            id: DeviceId::next(),
            device: Weak::new(),
        }
    }

    pub(crate) fn id(&self) -> DeviceId {
        self.id
    }

    pub(crate) fn upgrade(&self) -> Option<Arc<GraphicsDevice>> {
        self.device.upgrade()
    }
}

/// Limits enforced when creating resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceCapabilities {
    /// Maximum texture dimension.
    pub max_texture_dimension: u32,
    /// Maximum buffer size.
    pub max_buffer_size: u64,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_texture_dimension: 16384,
            max_buffer_size: 1 << 30, // 1 GB
        }
    }
}

/// Parameters for creating a device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceParameters {
    /// Debug label.
    pub label: Option<String>,
    /// Barrier policy for every encoder of the device.
    pub hazard_policy: HazardPolicy,
    /// Resource limits.
    pub capabilities: DeviceCapabilities,
}

impl DeviceParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the hazard policy.
    pub fn with_hazard_policy(mut self, hazard_policy: HazardPolicy) -> Self {
        self.hazard_policy = hazard_policy;
        self
    }

    /// Set the resource limits.
    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// A graphics device for creating GPU objects.
///
/// # Thread Safety
///
/// `GraphicsDevice` is `Send + Sync` and can be shared across threads.
/// Resource creation uses interior mutability where needed.
///
/// # Example
///
/// ```ignore
/// let device = GraphicsDevice::new(DeviceParameters::new())?;
///
/// let buffer = device.create_buffer(&BufferDescriptor::new(1024, BufferUsage::VERTEX))?;
/// let texture = device.create_texture(&TextureDescriptor::new_2d(
///     1920, 1080,
///     TextureFormat::Rgba8Unorm,
///     TextureUsage::COLOR_ATTACHMENT,
/// ))?;
/// ```
pub struct GraphicsDevice {
    id: DeviceId,
    backend: GpuBackend,
    parameters: DeviceParameters,
    queue: Queue,
    // Weak tracking for live counts and cleanup
    buffers: RwLock<Vec<Weak<Buffer>>>,
    textures: RwLock<Vec<Weak<Texture>>>,
    samplers: RwLock<Vec<Weak<Sampler>>>,
    render_graphs: RwLock<Vec<Weak<RenderGraph>>>,
}

impl GraphicsDevice {
    /// Create a device on the dummy backend.
    ///
    /// The dummy backend records native calls for inspection and keeps
    /// buffer contents in host memory.
    pub fn new(parameters: DeviceParameters) -> Result<Arc<Self>, GraphicsError> {
        Ok(Self::with_backend(
            GpuBackend::Dummy(DummyBackend::new()),
            parameters,
        ))
    }

    /// Create a device on an existing Vulkan device.
    ///
    /// `pipeline_builder` compiles the pipelines of render graphs; graphs
    /// that declare pipelines fail to compile without one.
    #[cfg(feature = "vulkan-backend")]
    pub fn with_vulkan(
        parameters: DeviceParameters,
        context: VulkanDeviceContext,
        pipeline_builder: Option<Arc<dyn VulkanPipelineBuilder>>,
    ) -> Result<Arc<Self>, GraphicsError> {
        let backend = VulkanBackend::new(context, pipeline_builder)?;
        Ok(Self::with_backend(
            GpuBackend::Vulkan(Box::new(backend)),
            parameters,
        ))
    }

    fn with_backend(backend: GpuBackend, parameters: DeviceParameters) -> Arc<Self> {
        log::info!(
            "Creating graphics device {:?} on {} (hazard policy: {:?})",
            parameters.label,
            backend.name(),
            parameters.hazard_policy
        );
        let gpu_queue = backend.create_queue();
        let id = DeviceId::next();
        Arc::new_cyclic(|device| Self {
            id,
            backend,
            parameters,
            queue: Queue::new(
                gpu_queue,
                DeviceRef {
                    id,
                    device: device.clone(),
                },
            ),
            buffers: RwLock::new(Vec::new()),
            textures: RwLock::new(Vec::new()),
            samplers: RwLock::new(Vec::new()),
            render_graphs: RwLock::new(Vec::new()),
        })
    }

    /// Get the device id.
    pub fn id(&self) -> DeviceId {
        self.id
    }

    pub(crate) fn handle(self: &Arc<Self>) -> DeviceRef {
        DeviceRef {
            id: self.id,
            device: Arc::downgrade(self),
        }
    }

    /// Get the backend type.
    pub fn backend_type(&self) -> BackendType {
        self.backend.backend_type()
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        self.backend.name()
    }

    /// Get the debug label.
    pub fn label(&self) -> Option<&str> {
        self.parameters.label.as_deref()
    }

    /// Get the device capabilities.
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.parameters.capabilities
    }

    /// Get the barrier policy used by this device's encoders.
    pub fn hazard_policy(&self) -> HazardPolicy {
        self.parameters.hazard_policy
    }

    /// Get the device queue.
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Create a GPU buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer size is zero or exceeds device limits,
    /// or if allocation fails.
    pub fn create_buffer(
        self: &Arc<Self>,
        descriptor: &BufferDescriptor,
    ) -> Result<Arc<Buffer>, GraphicsError> {
        let max_size = self.parameters.capabilities.max_buffer_size;
        if descriptor.size > max_size {
            return Err(GraphicsError::InvalidParameter(format!(
                "buffer size {} exceeds maximum {}",
                descriptor.size, max_size
            )));
        }

        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidParameter(
                "buffer size cannot be zero".to_string(),
            ));
        }

        let gpu = self.backend.create_buffer(descriptor)?;
        let buffer = Arc::new(Buffer::new(self.handle(), descriptor.clone(), gpu));

        self.buffers.write().push(Arc::downgrade(&buffer));

        log::trace!(
            "GraphicsDevice: created buffer {:?}, size={}",
            descriptor.label,
            descriptor.size
        );

        Ok(buffer)
    }

    /// Create a GPU texture.
    ///
    /// # Errors
    ///
    /// Returns an error if the texture dimensions are zero or exceed device
    /// limits, the mip or sample count is invalid, or allocation fails.
    pub fn create_texture(
        self: &Arc<Self>,
        descriptor: &TextureDescriptor,
    ) -> Result<Arc<Texture>, GraphicsError> {
        let max_dim = self.parameters.capabilities.max_texture_dimension;
        if descriptor.size.width > max_dim
            || descriptor.size.height > max_dim
            || descriptor.size.depth > max_dim
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture dimension exceeds maximum {max_dim}"
            )));
        }

        if descriptor.size.width == 0 || descriptor.size.height == 0 || descriptor.size.depth == 0
        {
            return Err(GraphicsError::InvalidParameter(
                "texture dimensions cannot be zero".to_string(),
            ));
        }

        let max_mips = 32 - descriptor.size.width.max(descriptor.size.height).leading_zeros();
        if descriptor.mip_level_count == 0 || descriptor.mip_level_count > max_mips {
            return Err(GraphicsError::InvalidParameter(format!(
                "mip level count {} outside 1..={max_mips}",
                descriptor.mip_level_count
            )));
        }

        if !matches!(descriptor.sample_count, 1 | 2 | 4 | 8) {
            return Err(GraphicsError::InvalidParameter(format!(
                "unsupported sample count {}",
                descriptor.sample_count
            )));
        }

        if descriptor.usage.is_empty() {
            return Err(GraphicsError::InvalidParameter(
                "texture usage cannot be empty".to_string(),
            ));
        }

        let gpu = self.backend.create_texture(descriptor)?;
        let texture = Arc::new(Texture::new(self.handle(), descriptor.clone(), gpu));

        self.textures.write().push(Arc::downgrade(&texture));

        log::trace!(
            "GraphicsDevice: created texture {:?}, size={}x{}",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height
        );

        Ok(texture)
    }

    /// Create a texture sampler.
    ///
    /// # Errors
    ///
    /// Returns an error if the LOD range is inverted or creation fails.
    pub fn create_sampler(
        self: &Arc<Self>,
        descriptor: &SamplerDescriptor,
    ) -> Result<Arc<Sampler>, GraphicsError> {
        if descriptor.lod_min_clamp > descriptor.lod_max_clamp {
            return Err(GraphicsError::InvalidParameter(format!(
                "sampler LOD range {}..{} is inverted",
                descriptor.lod_min_clamp, descriptor.lod_max_clamp
            )));
        }

        let gpu = self.backend.create_sampler(descriptor)?;
        let sampler = Arc::new(Sampler::new(self.handle(), descriptor.clone(), gpu));

        self.samplers.write().push(Arc::downgrade(&sampler));

        log::trace!("GraphicsDevice: created sampler {:?}", descriptor.label);

        Ok(sampler)
    }

    /// Compile a render graph.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if a pass is malformed and
    /// [`GraphicsError::ConstructionFailed`] if native compilation fails.
    pub fn create_render_graph(
        self: &Arc<Self>,
        descriptor: &RenderGraphDescriptor,
    ) -> Result<Arc<RenderGraph>, GraphicsError> {
        crate::profile_scope!("GraphicsDevice::create_render_graph");

        descriptor.validate()?;
        let gpu = self.backend.create_render_graph(descriptor)?;
        let graph = Arc::new(RenderGraph::new(
            self.handle(),
            descriptor.clone(),
            gpu,
        ));

        self.render_graphs.write().push(Arc::downgrade(&graph));

        log::debug!(
            "GraphicsDevice: created render graph {:?} with {} passes",
            descriptor.label,
            descriptor.passes.len()
        );

        Ok(graph)
    }

    /// Open a command encoder.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::ConstructionFailed`] if the native command
    /// list cannot be allocated.
    pub fn create_command_encoder(
        self: &Arc<Self>,
        label: Option<&str>,
    ) -> Result<CommandEncoder, GraphicsError> {
        let list = self.backend.create_command_list(label)?;
        Ok(CommandEncoder::new(
            Arc::clone(self),
            label.map(str::to_owned),
            list,
        ))
    }

    /// Get the number of live buffers.
    pub fn buffer_count(&self) -> usize {
        self.buffers
            .read()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Get the number of live textures.
    pub fn texture_count(&self) -> usize {
        self.textures
            .read()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Get the number of live samplers.
    pub fn sampler_count(&self) -> usize {
        self.samplers
            .read()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Get the number of live render graphs.
    pub fn render_graph_count(&self) -> usize {
        self.render_graphs
            .read()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Drop tracking entries of destroyed objects.
    pub fn cleanup_dead_resources(&self) {
        self.buffers.write().retain(|w| w.strong_count() > 0);
        self.textures.write().retain(|w| w.strong_count() > 0);
        self.samplers.write().retain(|w| w.strong_count() > 0);
        self.render_graphs.write().retain(|w| w.strong_count() > 0);
    }
}

impl Drop for GraphicsDevice {
    fn drop(&mut self) {
        if self.queue.in_flight_count() > 0
            && let Err(e) = self.queue.wait_idle()
        {
            log::error!("Failed to wait for in-flight work on device drop: {}", e);
        }
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("backend", &self.backend)
            .field("parameters", &self.parameters)
            .field("buffers", &self.buffer_count())
            .field("textures", &self.texture_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(GraphicsDevice: Send, Sync);
