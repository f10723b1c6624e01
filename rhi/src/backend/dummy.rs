//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't talk to a GPU. Command lists record every native
//! call they receive as a [`RecordedCommand`], so tests can observe exactly
//! which barriers, framebuffers and passes recording produced. Buffers keep
//! their contents in host memory and the queue replays fills and
//! buffer-to-buffer copies on submission.

use std::ops::Range;
use std::sync::Arc;

use crate::error::GraphicsError;
use crate::graph::{RenderGraph, RenderGraphDescriptor};
use crate::resolve::{AccessFlags, TextureLayout};
use crate::resources::{Buffer, ResourceId, TextureView};
use crate::state::{BufferInfo, PipelineStage};
use crate::tracker::{BufferBarrier, TextureBarrier};
use crate::types::{BufferDescriptor, IndexFormat, SamplerDescriptor, TextureDescriptor};

use super::{GpuBuffer, GpuRenderGraph, GpuSampler, GpuTexture};

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend;

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    /// Create a buffer resource.
    pub fn create_buffer(&self, descriptor: &BufferDescriptor) -> Result<GpuBuffer, GraphicsError> {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        Ok(GpuBuffer::dummy(descriptor.size))
    }

    /// Create a texture resource.
    pub fn create_texture(
        &self,
        descriptor: &TextureDescriptor,
    ) -> Result<GpuTexture, GraphicsError> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}x{})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth
        );
        Ok(GpuTexture::Dummy)
    }

    /// Create a sampler resource.
    pub fn create_sampler(
        &self,
        descriptor: &SamplerDescriptor,
    ) -> Result<GpuSampler, GraphicsError> {
        log::trace!("DummyBackend: creating sampler {:?}", descriptor.label);
        Ok(GpuSampler::Dummy)
    }

    /// Compile a render graph.
    pub fn create_render_graph(
        &self,
        descriptor: &RenderGraphDescriptor,
    ) -> Result<GpuRenderGraph, GraphicsError> {
        log::trace!(
            "DummyBackend: compiling render graph {:?} with {} passes",
            descriptor.label,
            descriptor.passes.len()
        );
        Ok(GpuRenderGraph::Dummy)
    }

    /// Create a recording command list.
    pub fn create_command_list(&self, label: Option<&str>) -> DummyCommandList {
        DummyCommandList {
            label: label.map(str::to_owned),
            commands: Vec::new(),
            framebuffers: Vec::new(),
            finished: false,
        }
    }

    /// Create the submission queue.
    pub fn create_queue(&self) -> DummyQueue {
        DummyQueue
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Command list
// ============================================================================

/// A native call captured by a [`DummyCommandList`].
#[derive(Debug, Clone)]
pub enum RecordedCommand {
    BufferBarrier {
        buffer: ResourceId,
        offset: u64,
        size: u64,
        src_stage: PipelineStage,
        src_access: AccessFlags,
        dst_stage: PipelineStage,
        dst_access: AccessFlags,
    },
    TextureBarrier {
        texture: ResourceId,
        old_layout: TextureLayout,
        new_layout: TextureLayout,
        src_stage: PipelineStage,
        src_access: AccessFlags,
        dst_stage: PipelineStage,
        dst_access: AccessFlags,
    },
    BeginRenderPass {
        graph: ResourceId,
        pass_index: usize,
        /// Index into [`DummyCommandList::framebuffers`].
        framebuffer: usize,
        clear_value_count: usize,
    },
    EndRenderPass,
    BindPipeline {
        graph: ResourceId,
        pass_index: usize,
        pipeline_index: usize,
    },
    FillBuffer {
        buffer: Arc<Buffer>,
        offset: u64,
        size: u64,
        value: u32,
    },
    CopyBufferToBuffer {
        src: Arc<Buffer>,
        src_offset: u64,
        dst: Arc<Buffer>,
        dst_offset: u64,
        size: u64,
    },
    CopyBufferToTexture {
        buffer: ResourceId,
        texture: ResourceId,
    },
    CopyTextureToBuffer {
        texture: ResourceId,
        buffer: ResourceId,
    },
    CopyTextureToTexture {
        src: ResourceId,
        dst: ResourceId,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    Draw {
        vertex_buffer_count: usize,
        vertices: Range<u32>,
        instances: Range<u32>,
    },
    DrawIndexed {
        index_buffer: ResourceId,
        index_format: IndexFormat,
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    },
}

/// A framebuffer built by a [`DummyCommandList`] when a pass begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DummyFramebuffer {
    pub attachments: Vec<ResourceId>,
    pub width: u32,
    pub height: u32,
}

impl DummyFramebuffer {
    pub fn attachment_count(&self) -> usize {
        self.attachments.len()
    }
}

/// Command list of the dummy backend.
#[derive(Debug)]
pub struct DummyCommandList {
    label: Option<String>,
    commands: Vec<RecordedCommand>,
    framebuffers: Vec<DummyFramebuffer>,
    finished: bool,
}

impl DummyCommandList {
    /// Get the list label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Every recorded native call, in order.
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Framebuffers owned by this list.
    pub fn framebuffers(&self) -> &[DummyFramebuffer] {
        &self.framebuffers
    }

    /// Returns true once the list was closed for submission.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of recorded buffer barriers.
    pub fn buffer_barrier_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, RecordedCommand::BufferBarrier { .. }))
            .count()
    }

    /// Number of recorded texture barriers.
    pub fn texture_barrier_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, RecordedCommand::TextureBarrier { .. }))
            .count()
    }

    pub(crate) fn buffer_barrier(&mut self, barrier: BufferBarrier) {
        self.commands.push(RecordedCommand::BufferBarrier {
            buffer: barrier.buffer.buffer().id(),
            offset: barrier.buffer.offset(),
            size: barrier.buffer.size(),
            src_stage: barrier.src_stage,
            src_access: barrier.src_access_mask(),
            dst_stage: barrier.dst_stage,
            dst_access: barrier.dst_access_mask(),
        });
    }

    pub(crate) fn texture_barrier(&mut self, barrier: TextureBarrier) {
        self.commands.push(RecordedCommand::TextureBarrier {
            texture: barrier.texture.id(),
            old_layout: barrier.old_layout,
            new_layout: barrier.new_layout,
            src_stage: barrier.src_stage,
            src_access: barrier.src_access_mask(),
            dst_stage: barrier.dst_stage,
            dst_access: barrier.dst_access_mask(),
        });
    }

    pub(crate) fn begin_render_pass(
        &mut self,
        graph: &Arc<RenderGraph>,
        pass_index: usize,
        color_views: &[Arc<TextureView>],
        depth_stencil_view: Option<&Arc<TextureView>>,
    ) -> Result<(), GraphicsError> {
        let clear_values = graph.clear_values(pass_index).ok_or_else(|| {
            GraphicsError::ProtocolViolation(format!(
                "render graph has no pass {pass_index}"
            ))
        })?;

        let attachments: Vec<&Arc<TextureView>> =
            color_views.iter().chain(depth_stencil_view).collect();
        let extent = attachments
            .first()
            .map(|view| view.size())
            .unwrap_or_default();
        self.framebuffers.push(DummyFramebuffer {
            attachments: attachments.iter().map(|view| view.id()).collect(),
            width: extent.width,
            height: extent.height,
        });

        log::trace!(
            "DummyCommandList: begin pass {} ({} attachments)",
            pass_index,
            attachments.len()
        );
        self.commands.push(RecordedCommand::BeginRenderPass {
            graph: graph.id(),
            pass_index,
            framebuffer: self.framebuffers.len() - 1,
            clear_value_count: clear_values.len(),
        });
        Ok(())
    }

    pub(crate) fn end_render_pass(&mut self) {
        self.commands.push(RecordedCommand::EndRenderPass);
    }

    pub(crate) fn bind_pipeline(
        &mut self,
        graph: &Arc<RenderGraph>,
        pass_index: usize,
        pipeline_index: usize,
    ) -> Result<(), GraphicsError> {
        if graph.pipeline(pass_index, pipeline_index).is_none() {
            return Err(GraphicsError::ProtocolViolation(format!(
                "render graph has no pipeline {pipeline_index} in pass {pass_index}"
            )));
        }
        self.commands.push(RecordedCommand::BindPipeline {
            graph: graph.id(),
            pass_index,
            pipeline_index,
        });
        Ok(())
    }

    pub(crate) fn fill_buffer(&mut self, buffer: &BufferInfo, value: u32) {
        self.commands.push(RecordedCommand::FillBuffer {
            buffer: Arc::clone(buffer.buffer()),
            offset: buffer.offset(),
            size: buffer.size(),
            value,
        });
    }

    pub(crate) fn copy_buffer_to_buffer(&mut self, src: &BufferInfo, dst: &BufferInfo) {
        self.commands.push(RecordedCommand::CopyBufferToBuffer {
            src: Arc::clone(src.buffer()),
            src_offset: src.offset(),
            dst: Arc::clone(dst.buffer()),
            dst_offset: dst.offset(),
            size: src.size(),
        });
    }

    pub(crate) fn copy_buffer_to_texture(&mut self, src: &BufferInfo, dst: &Arc<TextureView>) {
        self.commands.push(RecordedCommand::CopyBufferToTexture {
            buffer: src.buffer().id(),
            texture: dst.texture().id(),
        });
    }

    pub(crate) fn copy_texture_to_buffer(&mut self, src: &Arc<TextureView>, dst: &BufferInfo) {
        self.commands.push(RecordedCommand::CopyTextureToBuffer {
            texture: src.texture().id(),
            buffer: dst.buffer().id(),
        });
    }

    pub(crate) fn copy_texture_to_texture(
        &mut self,
        src: &Arc<TextureView>,
        dst: &Arc<TextureView>,
    ) {
        self.commands.push(RecordedCommand::CopyTextureToTexture {
            src: src.texture().id(),
            dst: dst.texture().id(),
        });
    }

    pub(crate) fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.commands.push(RecordedCommand::Dispatch { x, y, z });
    }

    pub(crate) fn draw(
        &mut self,
        vertex_buffers: &[BufferInfo],
        vertices: Range<u32>,
        instances: Range<u32>,
    ) {
        self.commands.push(RecordedCommand::Draw {
            vertex_buffer_count: vertex_buffers.len(),
            vertices,
            instances,
        });
    }

    pub(crate) fn draw_indexed(
        &mut self,
        index_buffer: &BufferInfo,
        index_format: IndexFormat,
        _vertex_buffers: &[BufferInfo],
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    ) {
        self.commands.push(RecordedCommand::DrawIndexed {
            index_buffer: index_buffer.buffer().id(),
            index_format,
            indices,
            base_vertex,
            instances,
        });
    }

    pub(crate) fn finish(&mut self) -> Result<(), GraphicsError> {
        self.finished = true;
        log::trace!(
            "DummyCommandList {:?}: finished with {} commands",
            self.label,
            self.commands.len()
        );
        Ok(())
    }
}

// ============================================================================
// Queue
// ============================================================================

/// Submission queue of the dummy backend.
#[derive(Debug)]
pub struct DummyQueue;

impl DummyQueue {
    /// Replay the host-visible effects of a command list.
    pub(crate) fn submit(&self, list: &DummyCommandList) {
        for command in list.commands() {
            match command {
                RecordedCommand::FillBuffer {
                    buffer,
                    offset,
                    size,
                    value,
                } => fill_host_memory(buffer, *offset, *size, *value),
                RecordedCommand::CopyBufferToBuffer {
                    src,
                    src_offset,
                    dst,
                    dst_offset,
                    size,
                } => copy_host_memory(src, *src_offset, dst, *dst_offset, *size),
                _ => {}
            }
        }
    }
}

fn fill_host_memory(buffer: &Buffer, offset: u64, size: u64, value: u32) {
    let GpuBuffer::Dummy { data } = buffer.gpu() else {
        return;
    };
    let mut data = data.lock();
    let range = offset as usize..(offset + size) as usize;
    for chunk in data[range].chunks_mut(4) {
        chunk.copy_from_slice(&value.to_ne_bytes()[..chunk.len()]);
    }
}

fn copy_host_memory(src: &Buffer, src_offset: u64, dst: &Buffer, dst_offset: u64, size: u64) {
    let (GpuBuffer::Dummy { data: src_data }, GpuBuffer::Dummy { data: dst_data }) =
        (src.gpu(), dst.gpu())
    else {
        return;
    };
    let src_range = src_offset as usize..(src_offset + size) as usize;
    if src.id() == dst.id() {
        src_data.lock().copy_within(src_range, dst_offset as usize);
        return;
    }
    let src_data = src_data.lock();
    let mut dst_data = dst_data.lock();
    let dst_start = dst_offset as usize;
    dst_data[dst_start..dst_start + size as usize].copy_from_slice(&src_data[src_range]);
}
