//! Recorded command items.
//!
//! A [`CommandItem`] is an immutable recorded intent. Before it executes,
//! the encoder asks it which buffer ranges and textures it touches and in
//! what state; the tracker turns those declarations into barriers.

use std::ops::Range;
use std::sync::Arc;

use crate::backend::GpuCommandList;
use crate::error::GraphicsError;
use crate::graph::RenderGraph;
use crate::resolve::TextureLayout;
use crate::resources::TextureView;
use crate::state::{
    BufferCommandState, BufferInfo, PipelineStage, ResourceAccess, TextureCommandState,
    TextureState,
};
use crate::tracker::{BarrierSink, TextureBarrier};
use crate::types::{BufferUsage, IndexFormat, TextureUsage};

// ============================================================================
// Payloads
// ============================================================================

/// Begin pass `pass_index` of a render graph.
#[derive(Debug, Clone)]
pub struct BeginRenderPassCommand {
    pub graph: Arc<RenderGraph>,
    pub pass_index: usize,
    pub color_views: Vec<Arc<TextureView>>,
    pub depth_stencil_view: Option<Arc<TextureView>>,
}

impl BeginRenderPassCommand {
    pub fn new(graph: Arc<RenderGraph>, pass_index: usize) -> Self {
        Self {
            graph,
            pass_index,
            color_views: Vec::new(),
            depth_stencil_view: None,
        }
    }

    /// Append a color attachment view.
    pub fn with_color_view(mut self, view: Arc<TextureView>) -> Self {
        self.color_views.push(view);
        self
    }

    /// Set the depth/stencil attachment view.
    pub fn with_depth_stencil_view(mut self, view: Arc<TextureView>) -> Self {
        self.depth_stencil_view = Some(view);
        self
    }

    fn validate(&self) -> Result<(), GraphicsError> {
        let Some(pass) = self.graph.pass(self.pass_index) else {
            return Err(GraphicsError::ProtocolViolation(format!(
                "render pass {} out of range (graph has {} passes)",
                self.pass_index,
                self.graph.pass_count()
            )));
        };

        if pass.color_attachments.len() != self.color_views.len() {
            return Err(GraphicsError::InvalidParameter(format!(
                "pass {} expects {} color attachments, got {}",
                self.pass_index,
                pass.color_attachments.len(),
                self.color_views.len()
            )));
        }
        for (attachment, view) in pass.color_attachments.iter().zip(&self.color_views) {
            if attachment.format != view.format() {
                return Err(GraphicsError::InvalidParameter(format!(
                    "color attachment format mismatch: pass expects {:?}, view is {:?}",
                    attachment.format,
                    view.format()
                )));
            }
            if !view.texture().usage().contains(TextureUsage::COLOR_ATTACHMENT) {
                return Err(GraphicsError::InvalidParameter(
                    "color attachment texture lacks COLOR_ATTACHMENT usage".to_string(),
                ));
            }
        }

        match (&pass.depth_stencil_attachment, &self.depth_stencil_view) {
            (None, None) => {}
            (Some(attachment), Some(view)) => {
                if attachment.format != view.format() {
                    return Err(GraphicsError::InvalidParameter(format!(
                        "depth attachment format mismatch: pass expects {:?}, view is {:?}",
                        attachment.format,
                        view.format()
                    )));
                }
                if !view
                    .texture()
                    .usage()
                    .contains(TextureUsage::DEPTH_STENCIL_ATTACHMENT)
                {
                    return Err(GraphicsError::InvalidParameter(
                        "depth attachment texture lacks DEPTH_STENCIL_ATTACHMENT usage"
                            .to_string(),
                    ));
                }
            }
            (Some(_), None) => {
                return Err(GraphicsError::InvalidParameter(format!(
                    "pass {} expects a depth/stencil attachment",
                    self.pass_index
                )));
            }
            (None, Some(_)) => {
                return Err(GraphicsError::InvalidParameter(format!(
                    "pass {} has no depth/stencil attachment",
                    self.pass_index
                )));
            }
        }

        let mut views = self.color_views.iter().chain(&self.depth_stencil_view);
        if let Some(first) = views.next() {
            let size = first.size();
            if views.any(|view| view.size() != size) {
                return Err(GraphicsError::InvalidParameter(
                    "render pass attachments differ in size".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Bind pipeline `pipeline_index` of pass `pass_index`.
#[derive(Debug, Clone)]
pub struct BindPipelineCommand {
    pub graph: Arc<RenderGraph>,
    pub pass_index: usize,
    pub pipeline_index: usize,
}

/// A compute dispatch with the resources its shader touches.
#[derive(Debug, Clone, Default)]
pub struct DispatchCommand {
    pub groups: [u32; 3],
    pub buffers: Vec<(BufferInfo, ResourceAccess)>,
    pub textures: Vec<(Arc<TextureView>, TextureState, ResourceAccess)>,
}

impl DispatchCommand {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self {
            groups: [x, y, z],
            ..Default::default()
        }
    }

    /// Declare a buffer range the shader accesses.
    pub fn with_buffer(mut self, buffer: BufferInfo, access: ResourceAccess) -> Self {
        self.buffers.push((buffer, access));
        self
    }

    /// Declare a texture the shader accesses.
    pub fn with_texture(
        mut self,
        view: Arc<TextureView>,
        state: TextureState,
        access: ResourceAccess,
    ) -> Self {
        self.textures.push((view, state, access));
        self
    }
}

/// A non-indexed draw.
#[derive(Debug, Clone)]
pub struct DrawCommand {
    pub vertex_buffers: Vec<BufferInfo>,
    pub vertices: Range<u32>,
    pub instances: Range<u32>,
}

impl DrawCommand {
    pub fn new(vertices: Range<u32>) -> Self {
        Self {
            vertex_buffers: Vec::new(),
            vertices,
            instances: 0..1,
        }
    }

    pub fn with_vertex_buffer(mut self, buffer: BufferInfo) -> Self {
        self.vertex_buffers.push(buffer);
        self
    }

    pub fn with_instances(mut self, instances: Range<u32>) -> Self {
        self.instances = instances;
        self
    }
}

/// An indexed draw.
#[derive(Debug, Clone)]
pub struct DrawIndexedCommand {
    pub index_buffer: BufferInfo,
    pub index_format: IndexFormat,
    pub vertex_buffers: Vec<BufferInfo>,
    pub indices: Range<u32>,
    pub base_vertex: i32,
    pub instances: Range<u32>,
}

impl DrawIndexedCommand {
    pub fn new(index_buffer: BufferInfo, index_format: IndexFormat, indices: Range<u32>) -> Self {
        Self {
            index_buffer,
            index_format,
            vertex_buffers: Vec::new(),
            indices,
            base_vertex: 0,
            instances: 0..1,
        }
    }

    pub fn with_vertex_buffer(mut self, buffer: BufferInfo) -> Self {
        self.vertex_buffers.push(buffer);
        self
    }

    pub fn with_base_vertex(mut self, base_vertex: i32) -> Self {
        self.base_vertex = base_vertex;
        self
    }

    pub fn with_instances(mut self, instances: Range<u32>) -> Self {
        self.instances = instances;
        self
    }
}

// ============================================================================
// Command item
// ============================================================================

/// Where an item may be recorded relative to render passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PassScope {
    /// Opens a render pass.
    Begin,
    /// Closes the open render pass.
    End,
    /// Only inside a render pass.
    Inside,
    /// Only outside a render pass.
    Outside,
    /// Anywhere.
    Any,
}

/// A recorded operation.
#[derive(Debug, Clone)]
pub enum CommandItem {
    BeginRenderPass(BeginRenderPassCommand),
    EndRenderPass,
    BindPipeline(BindPipelineCommand),
    FillBuffer {
        buffer: BufferInfo,
        value: u32,
    },
    CopyBufferToBuffer {
        src: BufferInfo,
        dst: BufferInfo,
    },
    CopyBufferToTexture {
        src: BufferInfo,
        dst: Arc<TextureView>,
    },
    CopyTextureToBuffer {
        src: Arc<TextureView>,
        dst: BufferInfo,
    },
    CopyTextureToTexture {
        src: Arc<TextureView>,
        dst: Arc<TextureView>,
    },
    Dispatch(DispatchCommand),
    Draw(DrawCommand),
    DrawIndexed(DrawIndexedCommand),
}

impl CommandItem {
    /// Short name for logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BeginRenderPass(_) => "BeginRenderPass",
            Self::EndRenderPass => "EndRenderPass",
            Self::BindPipeline(_) => "BindPipeline",
            Self::FillBuffer { .. } => "FillBuffer",
            Self::CopyBufferToBuffer { .. } => "CopyBufferToBuffer",
            Self::CopyBufferToTexture { .. } => "CopyBufferToTexture",
            Self::CopyTextureToBuffer { .. } => "CopyTextureToBuffer",
            Self::CopyTextureToTexture { .. } => "CopyTextureToTexture",
            Self::Dispatch(_) => "Dispatch",
            Self::Draw(_) => "Draw",
            Self::DrawIndexed(_) => "DrawIndexed",
        }
    }

    /// Buffer accesses that must be synchronized before the item executes.
    pub fn buffer_states(&self) -> Vec<BufferCommandState> {
        use PipelineStage as Stage;
        use ResourceAccess as Access;

        match self {
            Self::BeginRenderPass(_) | Self::EndRenderPass | Self::BindPipeline(_) => Vec::new(),
            Self::FillBuffer { buffer, .. } => vec![BufferCommandState::new(
                buffer.clone(),
                Stage::TRANSFER,
                Access::WriteOnly,
            )],
            Self::CopyBufferToBuffer { src, dst } => vec![
                BufferCommandState::new(src.clone(), Stage::TRANSFER, Access::ReadOnly),
                BufferCommandState::new(dst.clone(), Stage::TRANSFER, Access::WriteOnly),
            ],
            Self::CopyBufferToTexture { src, .. } => vec![BufferCommandState::new(
                src.clone(),
                Stage::TRANSFER,
                Access::ReadOnly,
            )],
            Self::CopyTextureToBuffer { dst, .. } => vec![BufferCommandState::new(
                dst.clone(),
                Stage::TRANSFER,
                Access::WriteOnly,
            )],
            Self::CopyTextureToTexture { .. } => Vec::new(),
            Self::Dispatch(dispatch) => dispatch
                .buffers
                .iter()
                .map(|(buffer, access)| {
                    BufferCommandState::new(buffer.clone(), Stage::COMPUTE, *access)
                })
                .collect(),
            Self::Draw(draw) => draw
                .vertex_buffers
                .iter()
                .map(|buffer| BufferCommandState::new(buffer.clone(), Stage::VERTEX, Access::ReadOnly))
                .collect(),
            Self::DrawIndexed(draw) => std::iter::once(&draw.index_buffer)
                .chain(&draw.vertex_buffers)
                .map(|buffer| BufferCommandState::new(buffer.clone(), Stage::VERTEX, Access::ReadOnly))
                .collect(),
        }
    }

    /// Texture accesses that must be synchronized before the item executes.
    pub fn texture_states(&self) -> Vec<TextureCommandState> {
        use PipelineStage as Stage;
        use ResourceAccess as Access;
        use TextureState as State;

        match self {
            Self::BeginRenderPass(begin) => begin
                .color_views
                .iter()
                .map(|view| {
                    TextureCommandState::new(
                        Arc::clone(view),
                        State::ColorAttachment,
                        Stage::ATTACHMENT_OUTPUT,
                        Access::WriteOnly,
                    )
                })
                .chain(begin.depth_stencil_view.iter().map(|view| {
                    TextureCommandState::new(
                        Arc::clone(view),
                        State::DepthStencilAttachment,
                        Stage::LATE_FRAGMENT_TEST,
                        Access::WriteOnly,
                    )
                }))
                .collect(),
            Self::CopyBufferToTexture { dst, .. } => vec![TextureCommandState::new(
                Arc::clone(dst),
                State::CopyDst,
                Stage::TRANSFER,
                Access::WriteOnly,
            )],
            Self::CopyTextureToBuffer { src, .. } => vec![TextureCommandState::new(
                Arc::clone(src),
                State::CopySrc,
                Stage::TRANSFER,
                Access::ReadOnly,
            )],
            Self::CopyTextureToTexture { src, dst } => vec![
                TextureCommandState::new(
                    Arc::clone(src),
                    State::CopySrc,
                    Stage::TRANSFER,
                    Access::ReadOnly,
                ),
                TextureCommandState::new(
                    Arc::clone(dst),
                    State::CopyDst,
                    Stage::TRANSFER,
                    Access::WriteOnly,
                ),
            ],
            Self::Dispatch(dispatch) => dispatch
                .textures
                .iter()
                .map(|(view, state, access)| {
                    TextureCommandState::new(Arc::clone(view), *state, Stage::COMPUTE, *access)
                })
                .collect(),
            Self::EndRenderPass
            | Self::BindPipeline(_)
            | Self::FillBuffer { .. }
            | Self::CopyBufferToBuffer { .. }
            | Self::Draw(_)
            | Self::DrawIndexed(_) => Vec::new(),
        }
    }

    /// Bring copy operands into a layout the copy can address them in.
    ///
    /// Layouts picked by the tracker follow texture usage, not the copy's
    /// role: a destination that also has `COPY_SRC` usage sits in the
    /// transfer-source layout, and a texture seen once is still undefined.
    /// Returns the number of transitions emitted.
    pub(crate) fn prepare_copy_layouts(&self, sink: &mut impl BarrierSink) -> usize {
        use ResourceAccess as Access;

        match self {
            Self::CopyBufferToTexture { dst, .. } => usize::from(transition_for_copy(
                sink,
                dst,
                TextureLayout::TransferDst,
                Access::WriteOnly,
            )),
            Self::CopyTextureToBuffer { src, .. } => usize::from(transition_for_copy(
                sink,
                src,
                TextureLayout::TransferSrc,
                Access::ReadOnly,
            )),
            // Source and destination share one tracked layout.
            Self::CopyTextureToTexture { src, dst } if src.texture().id() == dst.texture().id() => {
                usize::from(transition_for_copy(
                    sink,
                    src,
                    TextureLayout::General,
                    Access::ReadWrite,
                ))
            }
            Self::CopyTextureToTexture { src, dst } => {
                usize::from(transition_for_copy(
                    sink,
                    src,
                    TextureLayout::TransferSrc,
                    Access::ReadOnly,
                )) + usize::from(transition_for_copy(
                    sink,
                    dst,
                    TextureLayout::TransferDst,
                    Access::WriteOnly,
                ))
            }
            _ => 0,
        }
    }

    /// The render graph the item refers to, if any.
    pub fn render_graph(&self) -> Option<&Arc<RenderGraph>> {
        match self {
            Self::BeginRenderPass(begin) => Some(&begin.graph),
            Self::BindPipeline(bind) => Some(&bind.graph),
            _ => None,
        }
    }

    pub(crate) fn pass_scope(&self) -> PassScope {
        match self {
            Self::BeginRenderPass(_) => PassScope::Begin,
            Self::EndRenderPass => PassScope::End,
            Self::Draw(_) | Self::DrawIndexed(_) => PassScope::Inside,
            Self::FillBuffer { .. }
            | Self::CopyBufferToBuffer { .. }
            | Self::CopyBufferToTexture { .. }
            | Self::CopyTextureToBuffer { .. }
            | Self::CopyTextureToTexture { .. }
            | Self::Dispatch(_) => PassScope::Outside,
            Self::BindPipeline(_) => PassScope::Any,
        }
    }

    /// Check parameters that do not depend on encoder state.
    pub(crate) fn validate(&self) -> Result<(), GraphicsError> {
        match self {
            Self::BeginRenderPass(begin) => begin.validate(),
            Self::EndRenderPass => Ok(()),
            Self::BindPipeline(bind) => {
                if bind.graph.pipeline(bind.pass_index, bind.pipeline_index).is_none() {
                    return Err(GraphicsError::ProtocolViolation(format!(
                        "pipeline {} of pass {} out of range",
                        bind.pipeline_index, bind.pass_index
                    )));
                }
                Ok(())
            }
            Self::FillBuffer { buffer, .. } => {
                check_range(buffer, BufferUsage::COPY_DST, "fill destination")?;
                if buffer.offset() % 4 != 0 || buffer.size() % 4 != 0 {
                    return Err(GraphicsError::InvalidParameter(format!(
                        "fill range {}+{} is not 4-byte aligned",
                        buffer.offset(),
                        buffer.size()
                    )));
                }
                Ok(())
            }
            Self::CopyBufferToBuffer { src, dst } => {
                check_range(src, BufferUsage::COPY_SRC, "copy source")?;
                check_range(dst, BufferUsage::COPY_DST, "copy destination")?;
                if dst.size() < src.size() {
                    return Err(GraphicsError::InvalidParameter(format!(
                        "copy destination ({} bytes) smaller than source ({} bytes)",
                        dst.size(),
                        src.size()
                    )));
                }
                if src.buffer().id() == dst.buffer().id()
                    && src.offset() < dst.offset() + src.size()
                    && dst.offset() < src.offset() + src.size()
                {
                    return Err(GraphicsError::InvalidParameter(
                        "copy source and destination overlap".to_string(),
                    ));
                }
                Ok(())
            }
            Self::CopyBufferToTexture { src, dst } => {
                check_range(src, BufferUsage::COPY_SRC, "copy source")?;
                check_texture(dst, TextureUsage::COPY_DST, "copy destination")?;
                check_texel_bytes(src, dst)
            }
            Self::CopyTextureToBuffer { src, dst } => {
                check_texture(src, TextureUsage::COPY_SRC, "copy source")?;
                check_range(dst, BufferUsage::COPY_DST, "copy destination")?;
                check_texel_bytes(dst, src)
            }
            Self::CopyTextureToTexture { src, dst } => {
                check_texture(src, TextureUsage::COPY_SRC, "copy source")?;
                check_texture(dst, TextureUsage::COPY_DST, "copy destination")?;
                if src.format() != dst.format() {
                    return Err(GraphicsError::InvalidParameter(format!(
                        "texture copy between formats {:?} and {:?}",
                        src.format(),
                        dst.format()
                    )));
                }
                Ok(())
            }
            Self::Dispatch(dispatch) => {
                for (buffer, _) in &dispatch.buffers {
                    check_range(buffer, BufferUsage::empty(), "dispatch buffer")?;
                    if !buffer
                        .usage()
                        .intersects(BufferUsage::STORAGE | BufferUsage::UNIFORM)
                    {
                        return Err(GraphicsError::InvalidParameter(format!(
                            "dispatch buffer: buffer lacks STORAGE or UNIFORM usage (has {:?})",
                            buffer.usage()
                        )));
                    }
                }
                for (view, state, access) in &dispatch.textures {
                    match state {
                        TextureState::StorageBinding => {
                            check_texture(view, TextureUsage::STORAGE_BINDING, "dispatch texture")?
                        }
                        TextureState::SampledBinding => {
                            check_texture(view, TextureUsage::TEXTURE_BINDING, "dispatch texture")?;
                            if *access != ResourceAccess::ReadOnly {
                                return Err(GraphicsError::InvalidParameter(format!(
                                    "sampled texture declared with {:?} access",
                                    access
                                )));
                            }
                        }
                        other => {
                            return Err(GraphicsError::InvalidParameter(format!(
                                "dispatch cannot bind a texture as {:?}",
                                other
                            )));
                        }
                    }
                }
                Ok(())
            }
            Self::Draw(draw) => {
                for buffer in &draw.vertex_buffers {
                    check_range(buffer, BufferUsage::VERTEX, "vertex buffer")?;
                }
                Ok(())
            }
            Self::DrawIndexed(draw) => {
                check_range(&draw.index_buffer, BufferUsage::INDEX, "index buffer")?;
                for buffer in &draw.vertex_buffers {
                    check_range(buffer, BufferUsage::VERTEX, "vertex buffer")?;
                }
                Ok(())
            }
        }
    }

    /// Run the item against the native command list.
    pub(crate) fn execute(self, list: &mut GpuCommandList) -> Result<(), GraphicsError> {
        match self {
            Self::BeginRenderPass(begin) => {
                list.begin_render_pass(
                    &begin.graph,
                    begin.pass_index,
                    &begin.color_views,
                    begin.depth_stencil_view.as_ref(),
                )?;
                // The native pass leaves its attachments in attachment layout.
                for view in &begin.color_views {
                    view.texture().set_layout(TextureLayout::ColorAttachment);
                }
                if let Some(view) = &begin.depth_stencil_view {
                    view.texture()
                        .set_layout(TextureLayout::DepthStencilAttachment);
                }
            }
            Self::EndRenderPass => list.end_render_pass(),
            Self::BindPipeline(bind) => {
                list.bind_pipeline(&bind.graph, bind.pass_index, bind.pipeline_index)?
            }
            Self::FillBuffer { buffer, value } => list.fill_buffer(&buffer, value),
            Self::CopyBufferToBuffer { src, dst } => list.copy_buffer_to_buffer(&src, &dst),
            Self::CopyBufferToTexture { src, dst } => list.copy_buffer_to_texture(&src, &dst),
            Self::CopyTextureToBuffer { src, dst } => list.copy_texture_to_buffer(&src, &dst),
            Self::CopyTextureToTexture { src, dst } => list.copy_texture_to_texture(&src, &dst),
            Self::Dispatch(dispatch) => {
                let [x, y, z] = dispatch.groups;
                list.dispatch(x, y, z);
            }
            Self::Draw(draw) => list.draw(&draw.vertex_buffers, draw.vertices, draw.instances),
            Self::DrawIndexed(draw) => list.draw_indexed(
                &draw.index_buffer,
                draw.index_format,
                &draw.vertex_buffers,
                draw.indices,
                draw.base_vertex,
                draw.instances,
            ),
        }
        Ok(())
    }
}

fn check_range(buffer: &BufferInfo, usage: BufferUsage, what: &str) -> Result<(), GraphicsError> {
    if buffer.size() == 0 {
        return Err(GraphicsError::InvalidParameter(format!(
            "{what}: empty buffer range"
        )));
    }
    if !buffer.is_in_bounds() {
        return Err(GraphicsError::InvalidParameter(format!(
            "{what}: range {}+{} exceeds buffer size {}",
            buffer.offset(),
            buffer.size(),
            buffer.buffer().size()
        )));
    }
    if !buffer.usage().contains(usage) {
        return Err(GraphicsError::InvalidParameter(format!(
            "{what}: buffer lacks {:?} usage",
            usage
        )));
    }
    Ok(())
}

fn check_texture(view: &TextureView, usage: TextureUsage, what: &str) -> Result<(), GraphicsError> {
    if !view.texture().usage().contains(usage) {
        return Err(GraphicsError::InvalidParameter(format!(
            "{what}: texture lacks {:?} usage",
            usage
        )));
    }
    Ok(())
}

/// Move a copy operand's texture into `target` unless its resident layout
/// already serves the copy. The transition waits on earlier transfers.
fn transition_for_copy(
    sink: &mut impl BarrierSink,
    view: &TextureView,
    target: TextureLayout,
    access: ResourceAccess,
) -> bool {
    let texture = view.texture();
    let current = texture.layout();
    if current == target || current == TextureLayout::General {
        return false;
    }

    log::trace!(
        "Copy layout transition on {:?}: {:?} -> {:?}",
        texture.id(),
        current,
        target
    );
    sink.texture_barrier(TextureBarrier {
        texture: Arc::clone(texture),
        old_layout: current,
        new_layout: target,
        src_stage: PipelineStage::TRANSFER,
        src_access: ResourceAccess::ReadWrite,
        dst_stage: PipelineStage::TRANSFER,
        dst_access: access,
    });
    texture.set_layout(target);
    true
}

/// The buffer range must hold every texel of the view's top mip level.
fn check_texel_bytes(buffer: &BufferInfo, view: &TextureView) -> Result<(), GraphicsError> {
    let required = view.size().texel_count() * u64::from(view.format().block_size());
    if buffer.size() < required {
        return Err(GraphicsError::InvalidParameter(format!(
            "buffer range of {} bytes cannot hold {} bytes of texels",
            buffer.size(),
            required
        )));
    }
    Ok(())
}
