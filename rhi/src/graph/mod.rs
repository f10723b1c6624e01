//! Render graph interface.
//!
//! A render graph is declared once as a [`RenderGraphDescriptor`] and
//! compiled by [`GraphicsDevice::create_render_graph`] into native pass and
//! pipeline objects. Recording refers to passes and pipelines by index;
//! indices stay valid and resolve to the same objects for the lifetime of
//! the [`RenderGraph`].
//!
//! Translating pipeline state (shaders, vertex layout, blending) is left to
//! the backend's pipeline builder. This module only carries what recording
//! needs: attachment formats, load/store operations, clear values and
//! sample counts.
//!
//! [`GraphicsDevice::create_render_graph`]: crate::GraphicsDevice::create_render_graph

mod descriptor;

use std::sync::Arc;

pub use descriptor::{
    AttachmentDescriptor, PipelineBindPoint, PipelineDescriptor, RenderGraphDescriptor,
    RenderPassDescriptor,
};

use crate::backend::GpuRenderGraph;
use crate::device::{DeviceId, DeviceRef, GraphicsDevice};
use crate::resources::ResourceId;
use crate::types::ClearValue;

/// A compiled render graph.
pub struct RenderGraph {
    id: ResourceId,
    device: DeviceRef,
    descriptor: RenderGraphDescriptor,
    gpu: GpuRenderGraph,
}

impl RenderGraph {
    /// Create a new render graph (called by GraphicsDevice).
    pub(crate) fn new(
        device: DeviceRef,
        descriptor: RenderGraphDescriptor,
        gpu: GpuRenderGraph,
    ) -> Self {
        Self {
            id: ResourceId::next(),
            device,
            descriptor,
            gpu,
        }
    }

    /// Get the graph id.
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

    /// Get the descriptor the graph was compiled from.
    pub fn descriptor(&self) -> &RenderGraphDescriptor {
        &self.descriptor
    }

    /// Get the graph label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Number of passes.
    pub fn pass_count(&self) -> usize {
        self.descriptor.passes.len()
    }

    /// Get the pass at `index`.
    pub fn pass(&self, index: usize) -> Option<&RenderPassDescriptor> {
        self.descriptor.passes.get(index)
    }

    /// Get the pipeline at `pipeline_index` within pass `pass_index`.
    pub fn pipeline(&self, pass_index: usize, pipeline_index: usize) -> Option<&PipelineDescriptor> {
        self.pass(pass_index)?.pipelines.get(pipeline_index)
    }

    /// Clear values for every attachment of pass `index`, colors first.
    pub fn clear_values(&self, index: usize) -> Option<Vec<ClearValue>> {
        self.pass(index).map(RenderPassDescriptor::clear_values)
    }

    pub(crate) fn gpu(&self) -> &GpuRenderGraph {
        &self.gpu
    }
}

impl std::fmt::Debug for RenderGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderGraph")
            .field("id", &self.id)
            .field("label", &self.descriptor.label)
            .field("passes", &self.descriptor.passes.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(RenderGraph: Send, Sync);
