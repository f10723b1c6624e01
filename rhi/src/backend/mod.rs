//! GPU backend abstraction layer.
//!
//! Backends form a closed set: every backend object is an enum with one
//! variant per backend, and dispatch is a `match`.
//!
//! # Available Backends
//!
//! - `dummy` (always available): records native commands into inspectable
//!   lists and keeps buffer contents in host memory
//! - `vulkan-backend`: native Vulkan backend using ash and gpu-allocator,
//!   built on a device created by the caller

#[cfg(feature = "vulkan-backend")]
pub mod vulkan;

pub mod dummy;

use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::GraphicsError;
use crate::graph::{RenderGraph, RenderGraphDescriptor};
use crate::resources::TextureView;
use crate::state::BufferInfo;
use crate::tracker::{BarrierSink, BufferBarrier, TextureBarrier};
use crate::types::{
    BufferDescriptor, IndexFormat, SamplerDescriptor, TextureDescriptor,
};

use self::dummy::{DummyBackend, DummyCommandList, DummyQueue};

#[cfg(feature = "vulkan-backend")]
use self::vulkan::{
    VulkanBackend, VulkanBuffer, VulkanCommandList, VulkanQueue, VulkanRenderGraph,
    VulkanSampler, VulkanTexture, VulkanTextureView,
};

/// Which backend a device runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendType {
    Dummy,
    Vulkan,
}

/// The backend a device runs on.
pub enum GpuBackend {
    Dummy(DummyBackend),
    #[cfg(feature = "vulkan-backend")]
    Vulkan(Box<VulkanBackend>),
}

impl GpuBackend {
    /// Get the backend type.
    pub fn backend_type(&self) -> BackendType {
        match self {
            Self::Dummy(_) => BackendType::Dummy,
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(_) => BackendType::Vulkan,
        }
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Dummy(backend) => backend.name(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(backend) => backend.name(),
        }
    }

    pub fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
        match self {
            Self::Dummy(backend) => backend.create_buffer(descriptor),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(backend) => backend.create_buffer(descriptor),
        }
    }

    pub fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
    ) -> Result<GpuTexture, GraphicsError> {
        match self {
            Self::Dummy(backend) => backend.create_texture(descriptor),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(backend) => backend.create_texture(descriptor),
        }
    }

    pub fn create_sampler(
        &self,
        descriptor: &SamplerDescriptor,
    ) -> Result<GpuSampler, GraphicsError> {
        match self {
            Self::Dummy(backend) => backend.create_sampler(descriptor),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(backend) => backend.create_sampler(descriptor),
        }
    }

    pub fn create_render_graph(
        &self,
        descriptor: &RenderGraphDescriptor,
    ) -> Result<GpuRenderGraph, GraphicsError> {
        match self {
            Self::Dummy(backend) => backend.create_render_graph(descriptor),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(backend) => backend.create_render_graph(descriptor),
        }
    }

    /// Allocate a native command list in the recording state.
    pub fn create_command_list(&self, label: Option<&str>) -> Result<GpuCommandList, GraphicsError> {
        match self {
            Self::Dummy(backend) => Ok(GpuCommandList::Dummy(backend.create_command_list(label))),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(backend) => backend
                .create_command_list(label)
                .map(GpuCommandList::Vulkan),
        }
    }

    pub fn create_queue(&self) -> GpuQueue {
        match self {
            Self::Dummy(backend) => GpuQueue::Dummy(backend.create_queue()),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(backend) => GpuQueue::Vulkan(backend.create_queue()),
        }
    }
}

impl std::fmt::Debug for GpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy(backend) => f.debug_tuple("GpuBackend::Dummy").field(backend).finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(backend) => f.debug_tuple("GpuBackend::Vulkan").field(backend).finish(),
        }
    }
}

// ============================================================================
// Resources
// ============================================================================

/// Handle to a GPU buffer resource.
pub enum GpuBuffer {
    /// Dummy backend buffer backed by host memory.
    Dummy { data: Mutex<Vec<u8>> },
    /// Vulkan backend buffer.
    #[cfg(feature = "vulkan-backend")]
    Vulkan(VulkanBuffer),
}

impl GpuBuffer {
    pub(crate) fn dummy(size: u64) -> Self {
        Self::Dummy {
            data: Mutex::new(vec![0; size as usize]),
        }
    }

    /// Write host data at `offset`. The range is validated by the caller.
    pub(crate) fn write(&self, offset: u64, bytes: &[u8]) -> Result<(), GraphicsError> {
        match self {
            Self::Dummy { data } => {
                let start = offset as usize;
                data.lock()[start..start + bytes.len()].copy_from_slice(bytes);
                Ok(())
            }
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(buffer) => buffer.write(offset, bytes),
        }
    }

    /// Read host data at `offset`. The range is validated by the caller.
    pub(crate) fn read(&self, offset: u64, size: u64) -> Result<Vec<u8>, GraphicsError> {
        match self {
            Self::Dummy { data } => {
                let start = offset as usize;
                Ok(data.lock()[start..start + size as usize].to_vec())
            }
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(buffer) => buffer.read(offset, size),
        }
    }
}

impl std::fmt::Debug for GpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy { data } => f
                .debug_struct("GpuBuffer::Dummy")
                .field("size", &data.lock().len())
                .finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(buffer) => f.debug_tuple("GpuBuffer::Vulkan").field(buffer).finish(),
        }
    }
}

/// Handle to a GPU texture resource.
pub enum GpuTexture {
    /// Dummy backend (no GPU allocation)
    Dummy,
    /// Vulkan backend texture
    #[cfg(feature = "vulkan-backend")]
    Vulkan(VulkanTexture),
}

impl GpuTexture {
    #[cfg_attr(not(feature = "vulkan-backend"), allow(unused_variables))]
    pub(crate) fn create_view(
        &self,
        descriptor: &TextureDescriptor,
        base_mip_level: u32,
        mip_level_count: u32,
    ) -> Result<GpuTextureView, GraphicsError> {
        match self {
            Self::Dummy => Ok(GpuTextureView::Dummy),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(texture) => texture
                .create_view(descriptor, base_mip_level, mip_level_count)
                .map(GpuTextureView::Vulkan),
        }
    }
}

impl std::fmt::Debug for GpuTexture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy => write!(f, "GpuTexture::Dummy"),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(texture) => f.debug_tuple("GpuTexture::Vulkan").field(texture).finish(),
        }
    }
}

/// Handle to a GPU texture view.
pub enum GpuTextureView {
    Dummy,
    #[cfg(feature = "vulkan-backend")]
    Vulkan(VulkanTextureView),
}

/// Handle to a GPU sampler.
pub enum GpuSampler {
    Dummy,
    #[cfg(feature = "vulkan-backend")]
    Vulkan(VulkanSampler),
}

/// Backend objects compiled from a render graph.
pub enum GpuRenderGraph {
    Dummy,
    #[cfg(feature = "vulkan-backend")]
    Vulkan(VulkanRenderGraph),
}

// ============================================================================
// Command lists
// ============================================================================

/// A native command list being recorded.
pub enum GpuCommandList {
    Dummy(DummyCommandList),
    #[cfg(feature = "vulkan-backend")]
    Vulkan(VulkanCommandList),
}

impl GpuCommandList {
    /// Get the dummy command list, if this is one.
    pub fn as_dummy(&self) -> Option<&DummyCommandList> {
        match self {
            Self::Dummy(list) => Some(list),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(_) => None,
        }
    }

    pub(crate) fn begin_render_pass(
        &mut self,
        graph: &Arc<RenderGraph>,
        pass_index: usize,
        color_views: &[Arc<TextureView>],
        depth_stencil_view: Option<&Arc<TextureView>>,
    ) -> Result<(), GraphicsError> {
        match self {
            Self::Dummy(list) => {
                list.begin_render_pass(graph, pass_index, color_views, depth_stencil_view)
            }
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(list) => {
                list.begin_render_pass(graph, pass_index, color_views, depth_stencil_view)
            }
        }
    }

    pub(crate) fn end_render_pass(&mut self) {
        match self {
            Self::Dummy(list) => list.end_render_pass(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(list) => list.end_render_pass(),
        }
    }

    pub(crate) fn bind_pipeline(
        &mut self,
        graph: &Arc<RenderGraph>,
        pass_index: usize,
        pipeline_index: usize,
    ) -> Result<(), GraphicsError> {
        match self {
            Self::Dummy(list) => list.bind_pipeline(graph, pass_index, pipeline_index),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(list) => list.bind_pipeline(graph, pass_index, pipeline_index),
        }
    }

    pub(crate) fn fill_buffer(&mut self, buffer: &BufferInfo, value: u32) {
        match self {
            Self::Dummy(list) => list.fill_buffer(buffer, value),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(list) => list.fill_buffer(buffer, value),
        }
    }

    pub(crate) fn copy_buffer_to_buffer(&mut self, src: &BufferInfo, dst: &BufferInfo) {
        match self {
            Self::Dummy(list) => list.copy_buffer_to_buffer(src, dst),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(list) => list.copy_buffer_to_buffer(src, dst),
        }
    }

    pub(crate) fn copy_buffer_to_texture(&mut self, src: &BufferInfo, dst: &Arc<TextureView>) {
        match self {
            Self::Dummy(list) => list.copy_buffer_to_texture(src, dst),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(list) => list.copy_buffer_to_texture(src, dst),
        }
    }

    pub(crate) fn copy_texture_to_buffer(&mut self, src: &Arc<TextureView>, dst: &BufferInfo) {
        match self {
            Self::Dummy(list) => list.copy_texture_to_buffer(src, dst),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(list) => list.copy_texture_to_buffer(src, dst),
        }
    }

    pub(crate) fn copy_texture_to_texture(
        &mut self,
        src: &Arc<TextureView>,
        dst: &Arc<TextureView>,
    ) {
        match self {
            Self::Dummy(list) => list.copy_texture_to_texture(src, dst),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(list) => list.copy_texture_to_texture(src, dst),
        }
    }

    pub(crate) fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        match self {
            Self::Dummy(list) => list.dispatch(x, y, z),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(list) => list.dispatch(x, y, z),
        }
    }

    pub(crate) fn draw(
        &mut self,
        vertex_buffers: &[BufferInfo],
        vertices: Range<u32>,
        instances: Range<u32>,
    ) {
        match self {
            Self::Dummy(list) => list.draw(vertex_buffers, vertices, instances),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(list) => list.draw(vertex_buffers, vertices, instances),
        }
    }

    pub(crate) fn draw_indexed(
        &mut self,
        index_buffer: &BufferInfo,
        index_format: IndexFormat,
        vertex_buffers: &[BufferInfo],
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    ) {
        match self {
            Self::Dummy(list) => list.draw_indexed(
                index_buffer,
                index_format,
                vertex_buffers,
                indices,
                base_vertex,
                instances,
            ),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(list) => list.draw_indexed(
                index_buffer,
                index_format,
                vertex_buffers,
                indices,
                base_vertex,
                instances,
            ),
        }
    }

    /// Close the native list for submission.
    pub(crate) fn finish(&mut self) -> Result<(), GraphicsError> {
        match self {
            Self::Dummy(list) => list.finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(list) => list.finish(),
        }
    }
}

impl BarrierSink for GpuCommandList {
    fn buffer_barrier(&mut self, barrier: BufferBarrier) {
        match self {
            Self::Dummy(list) => list.buffer_barrier(barrier),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(list) => list.buffer_barrier(barrier),
        }
    }

    fn texture_barrier(&mut self, barrier: TextureBarrier) {
        match self {
            Self::Dummy(list) => list.texture_barrier(barrier),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(list) => list.texture_barrier(barrier),
        }
    }
}

impl std::fmt::Debug for GpuCommandList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dummy(list) => f.debug_tuple("GpuCommandList::Dummy").field(list).finish(),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(list) => f.debug_tuple("GpuCommandList::Vulkan").field(list).finish(),
        }
    }
}

// ============================================================================
// Queue
// ============================================================================

/// A native submission queue.
pub enum GpuQueue {
    Dummy(DummyQueue),
    #[cfg(feature = "vulkan-backend")]
    Vulkan(VulkanQueue),
}

impl GpuQueue {
    /// Submit finished command lists in order.
    pub(crate) fn submit(&self, lists: &[&GpuCommandList]) -> Result<(), GraphicsError> {
        match self {
            Self::Dummy(queue) => {
                for list in lists {
                    let Some(list) = list.as_dummy() else {
                        return Err(GraphicsError::ProtocolViolation(
                            "command list recorded for another backend".to_string(),
                        ));
                    };
                    queue.submit(list);
                }
                Ok(())
            }
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(queue) => {
                let mut handles = Vec::with_capacity(lists.len());
                for list in lists {
                    let GpuCommandList::Vulkan(list) = list else {
                        return Err(GraphicsError::ProtocolViolation(
                            "command list recorded for another backend".to_string(),
                        ));
                    };
                    handles.push(list.raw());
                }
                queue.submit(&handles)
            }
        }
    }

    /// Block until all submitted work has completed.
    pub(crate) fn wait_idle(&self) -> Result<(), GraphicsError> {
        match self {
            Self::Dummy(_) => Ok(()),
            #[cfg(feature = "vulkan-backend")]
            Self::Vulkan(queue) => queue.wait_idle(),
        }
    }
}
