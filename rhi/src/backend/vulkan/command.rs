//! Vulkan command recording and submission.

use std::ops::Range;
use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;

use super::conversion::{
    convert_access_flags, convert_clear_value, convert_extent, convert_index_format,
    convert_pipeline_stage, convert_texture_layout,
};
use crate::backend::{GpuBuffer, GpuRenderGraph, GpuTexture, GpuTextureView};
use crate::error::GraphicsError;
use crate::graph::RenderGraph;
use crate::resources::{Buffer, Texture, TextureView};
use crate::state::BufferInfo;
use crate::tracker::{BufferBarrier, TextureBarrier};
use crate::types::IndexFormat;

/// Create a command pool for short-lived command buffers.
pub fn create_command_pool(
    device: &ash::Device,
    queue_family_index: u32,
) -> Result<vk::CommandPool, GraphicsError> {
    let pool_info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(queue_family_index)
        .flags(vk::CommandPoolCreateFlags::TRANSIENT);

    let pool = unsafe { device.create_command_pool(&pool_info, None) }.map_err(|e| {
        GraphicsError::ConstructionFailed(format!("Failed to create command pool: {:?}", e))
    })?;

    Ok(pool)
}

fn raw_buffer(buffer: &Buffer) -> Option<vk::Buffer> {
    match buffer.gpu() {
        GpuBuffer::Vulkan(buffer) => Some(buffer.raw()),
        _ => None,
    }
}

fn raw_image(texture: &Texture) -> Option<(vk::Image, vk::ImageAspectFlags)> {
    match texture.gpu() {
        GpuTexture::Vulkan(texture) => Some((texture.raw(), texture.aspect_mask())),
        _ => None,
    }
}

fn raw_view(view: &TextureView) -> Option<vk::ImageView> {
    match view.gpu() {
        GpuTextureView::Vulkan(view) => Some(view.raw()),
        _ => None,
    }
}

/// Layout a copy addresses an image in: the one it is resident in.
fn copy_layout(texture: &Texture) -> vk::ImageLayout {
    convert_texture_layout(texture.layout())
}

fn subresource_layers(
    view: &TextureView,
    aspect_mask: vk::ImageAspectFlags,
) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask,
        mip_level: view.base_mip_level(),
        base_array_layer: 0,
        layer_count: 1,
    }
}

// ============================================================================
// Command list
// ============================================================================

/// A primary command buffer with its own transient pool.
///
/// Resources referenced by recorded commands are retained until the list
/// is dropped, so they outlive GPU execution as long as the list does.
pub struct VulkanCommandList {
    device: ash::Device,
    pool: vk::CommandPool,
    command_buffer: vk::CommandBuffer,
    label: Option<String>,
    framebuffers: Vec<vk::Framebuffer>,
    retained_buffers: Vec<Arc<Buffer>>,
    retained_textures: Vec<Arc<Texture>>,
    retained_views: Vec<Arc<TextureView>>,
    retained_graphs: Vec<Arc<RenderGraph>>,
}

impl VulkanCommandList {
    /// Allocate a command buffer and begin recording.
    pub(super) fn new(
        device: ash::Device,
        queue_family_index: u32,
        label: Option<&str>,
    ) -> Result<Self, GraphicsError> {
        let pool = create_command_pool(&device, queue_family_index)?;

        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let command_buffer = match unsafe { device.allocate_command_buffers(&alloc_info) } {
            Ok(buffers) if !buffers.is_empty() => buffers[0],
            Ok(_) => {
                unsafe { device.destroy_command_pool(pool, None) };
                return Err(GraphicsError::ConstructionFailed(
                    "Command buffer allocation returned no buffers".to_string(),
                ));
            }
            Err(e) => {
                unsafe { device.destroy_command_pool(pool, None) };
                return Err(GraphicsError::ConstructionFailed(format!(
                    "Failed to allocate command buffer: {:?}",
                    e
                )));
            }
        };

        let list = Self {
            device,
            pool,
            command_buffer,
            label: label.map(str::to_owned),
            framebuffers: Vec::new(),
            retained_buffers: Vec::new(),
            retained_textures: Vec::new(),
            retained_views: Vec::new(),
            retained_graphs: Vec::new(),
        };

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            list.device
                .begin_command_buffer(list.command_buffer, &begin_info)
        }
        .map_err(|e| {
            GraphicsError::ConstructionFailed(format!("Failed to begin command buffer: {:?}", e))
        })?;

        Ok(list)
    }

    /// Get the raw command buffer handle.
    pub fn raw(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Get the debug label.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    fn retain_buffer(&mut self, buffer: &Arc<Buffer>) {
        self.retained_buffers.push(Arc::clone(buffer));
    }

    fn retain_view(&mut self, view: &Arc<TextureView>) {
        self.retained_views.push(Arc::clone(view));
    }

    pub(crate) fn buffer_barrier(&mut self, barrier: BufferBarrier) {
        let Some(buffer) = raw_buffer(barrier.buffer.buffer()) else {
            log::error!("Buffer barrier on a buffer of another backend");
            return;
        };

        let buffer_barrier = vk::BufferMemoryBarrier::default()
            .src_access_mask(convert_access_flags(barrier.src_access_mask()))
            .dst_access_mask(convert_access_flags(barrier.dst_access_mask()))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .buffer(buffer)
            .offset(barrier.buffer.offset())
            .size(barrier.buffer.size());

        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                convert_pipeline_stage(barrier.src_stage),
                convert_pipeline_stage(barrier.dst_stage),
                vk::DependencyFlags::empty(),
                &[],
                &[buffer_barrier],
                &[],
            );
        }
        self.retain_buffer(barrier.buffer.buffer());
    }

    pub(crate) fn texture_barrier(&mut self, barrier: TextureBarrier) {
        let Some((image, aspect_mask)) = raw_image(&barrier.texture) else {
            log::error!("Texture barrier on a texture of another backend");
            return;
        };

        let image_barrier = vk::ImageMemoryBarrier::default()
            .src_access_mask(convert_access_flags(barrier.src_access_mask()))
            .dst_access_mask(convert_access_flags(barrier.dst_access_mask()))
            .old_layout(convert_texture_layout(barrier.old_layout))
            .new_layout(convert_texture_layout(barrier.new_layout))
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask,
                base_mip_level: 0,
                level_count: vk::REMAINING_MIP_LEVELS,
                base_array_layer: 0,
                layer_count: vk::REMAINING_ARRAY_LAYERS,
            });

        unsafe {
            self.device.cmd_pipeline_barrier(
                self.command_buffer,
                convert_pipeline_stage(barrier.src_stage),
                convert_pipeline_stage(barrier.dst_stage),
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[image_barrier],
            );
        }
        self.retained_textures.push(barrier.texture);
    }

    pub(crate) fn begin_render_pass(
        &mut self,
        graph: &Arc<RenderGraph>,
        pass_index: usize,
        color_views: &[Arc<TextureView>],
        depth_stencil_view: Option<&Arc<TextureView>>,
    ) -> Result<(), GraphicsError> {
        let GpuRenderGraph::Vulkan(native) = graph.gpu() else {
            return Err(GraphicsError::ProtocolViolation(
                "render graph compiled for another backend".to_string(),
            ));
        };
        let pass = native.pass(pass_index).ok_or_else(|| {
            GraphicsError::ProtocolViolation(format!("render pass {} does not exist", pass_index))
        })?;
        let clear_values: Vec<vk::ClearValue> = graph
            .clear_values(pass_index)
            .unwrap_or_default()
            .iter()
            .map(convert_clear_value)
            .collect();

        let views: Vec<&Arc<TextureView>> = color_views.iter().chain(depth_stencil_view).collect();
        let attachments = views
            .iter()
            .map(|view| raw_view(view))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                GraphicsError::ProtocolViolation(
                    "attachment view created on another backend".to_string(),
                )
            })?;
        let size = views.first().map(|view| view.size()).unwrap_or_default();

        let framebuffer_info = vk::FramebufferCreateInfo::default()
            .render_pass(pass.render_pass())
            .attachments(&attachments)
            .width(size.width)
            .height(size.height)
            .layers(1);
        let framebuffer = unsafe { self.device.create_framebuffer(&framebuffer_info, None) }
            .map_err(|e| {
                GraphicsError::ConstructionFailed(format!("Failed to create framebuffer: {:?}", e))
            })?;
        self.framebuffers.push(framebuffer);

        let extent = vk::Extent2D {
            width: size.width,
            height: size.height,
        };
        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(pass.render_pass())
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            })
            .clear_values(&clear_values);

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: size.width as f32,
            height: size.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };

        unsafe {
            self.device.cmd_begin_render_pass(
                self.command_buffer,
                &begin_info,
                vk::SubpassContents::INLINE,
            );
            self.device
                .cmd_set_viewport(self.command_buffer, 0, &[viewport]);
            self.device
                .cmd_set_scissor(self.command_buffer, 0, &[scissor]);
        }

        for view in views {
            self.retain_view(view);
        }
        self.retained_graphs.push(Arc::clone(graph));
        Ok(())
    }

    pub(crate) fn end_render_pass(&mut self) {
        unsafe { self.device.cmd_end_render_pass(self.command_buffer) };
    }

    pub(crate) fn bind_pipeline(
        &mut self,
        graph: &Arc<RenderGraph>,
        pass_index: usize,
        pipeline_index: usize,
    ) -> Result<(), GraphicsError> {
        let GpuRenderGraph::Vulkan(native) = graph.gpu() else {
            return Err(GraphicsError::ProtocolViolation(
                "render graph compiled for another backend".to_string(),
            ));
        };
        let pipeline = native
            .pass(pass_index)
            .and_then(|pass| pass.pipeline(pipeline_index))
            .ok_or_else(|| {
                GraphicsError::ProtocolViolation(format!(
                    "pipeline {} of pass {} does not exist",
                    pipeline_index, pass_index
                ))
            })?;

        unsafe {
            self.device.cmd_bind_pipeline(
                self.command_buffer,
                pipeline.bind_point,
                pipeline.pipeline,
            );
        }
        self.retained_graphs.push(Arc::clone(graph));
        Ok(())
    }

    pub(crate) fn fill_buffer(&mut self, buffer: &BufferInfo, value: u32) {
        let Some(raw) = raw_buffer(buffer.buffer()) else {
            log::error!("Fill of a buffer of another backend");
            return;
        };
        unsafe {
            self.device.cmd_fill_buffer(
                self.command_buffer,
                raw,
                buffer.offset(),
                buffer.size(),
                value,
            );
        }
        self.retain_buffer(buffer.buffer());
    }

    pub(crate) fn copy_buffer_to_buffer(&mut self, src: &BufferInfo, dst: &BufferInfo) {
        let (Some(src_raw), Some(dst_raw)) = (raw_buffer(src.buffer()), raw_buffer(dst.buffer()))
        else {
            log::error!("Copy between buffers of another backend");
            return;
        };
        let region = vk::BufferCopy {
            src_offset: src.offset(),
            dst_offset: dst.offset(),
            size: src.size(),
        };
        unsafe {
            self.device
                .cmd_copy_buffer(self.command_buffer, src_raw, dst_raw, &[region]);
        }
        self.retain_buffer(src.buffer());
        self.retain_buffer(dst.buffer());
    }

    pub(crate) fn copy_buffer_to_texture(&mut self, src: &BufferInfo, dst: &Arc<TextureView>) {
        let (Some(buffer), Some((image, aspect_mask))) =
            (raw_buffer(src.buffer()), raw_image(dst.texture()))
        else {
            log::error!("Buffer to texture copy on resources of another backend");
            return;
        };
        let region = vk::BufferImageCopy {
            buffer_offset: src.offset(),
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: subresource_layers(dst, aspect_mask),
            image_offset: vk::Offset3D::default(),
            image_extent: convert_extent(dst.size()),
        };
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                self.command_buffer,
                buffer,
                image,
                copy_layout(dst.texture()),
                &[region],
            );
        }
        self.retain_buffer(src.buffer());
        self.retain_view(dst);
    }

    pub(crate) fn copy_texture_to_buffer(&mut self, src: &Arc<TextureView>, dst: &BufferInfo) {
        let (Some((image, aspect_mask)), Some(buffer)) =
            (raw_image(src.texture()), raw_buffer(dst.buffer()))
        else {
            log::error!("Texture to buffer copy on resources of another backend");
            return;
        };
        let region = vk::BufferImageCopy {
            buffer_offset: dst.offset(),
            buffer_row_length: 0,
            buffer_image_height: 0,
            image_subresource: subresource_layers(src, aspect_mask),
            image_offset: vk::Offset3D::default(),
            image_extent: convert_extent(src.size()),
        };
        unsafe {
            self.device.cmd_copy_image_to_buffer(
                self.command_buffer,
                image,
                copy_layout(src.texture()),
                buffer,
                &[region],
            );
        }
        self.retain_view(src);
        self.retain_buffer(dst.buffer());
    }

    pub(crate) fn copy_texture_to_texture(
        &mut self,
        src: &Arc<TextureView>,
        dst: &Arc<TextureView>,
    ) {
        let (Some((src_image, src_aspect)), Some((dst_image, dst_aspect))) =
            (raw_image(src.texture()), raw_image(dst.texture()))
        else {
            log::error!("Texture copy on textures of another backend");
            return;
        };
        let src_size = src.size();
        let dst_size = dst.size();
        let region = vk::ImageCopy {
            src_subresource: subresource_layers(src, src_aspect),
            src_offset: vk::Offset3D::default(),
            dst_subresource: subresource_layers(dst, dst_aspect),
            dst_offset: vk::Offset3D::default(),
            extent: vk::Extent3D {
                width: src_size.width.min(dst_size.width),
                height: src_size.height.min(dst_size.height),
                depth: src_size.depth.min(dst_size.depth),
            },
        };
        unsafe {
            self.device.cmd_copy_image(
                self.command_buffer,
                src_image,
                copy_layout(src.texture()),
                dst_image,
                copy_layout(dst.texture()),
                &[region],
            );
        }
        self.retain_view(src);
        self.retain_view(dst);
    }

    pub(crate) fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        unsafe { self.device.cmd_dispatch(self.command_buffer, x, y, z) };
    }

    fn bind_vertex_buffers(&mut self, vertex_buffers: &[BufferInfo]) {
        if vertex_buffers.is_empty() {
            return;
        }
        let mut buffers = Vec::with_capacity(vertex_buffers.len());
        let mut offsets = Vec::with_capacity(vertex_buffers.len());
        for info in vertex_buffers {
            let Some(raw) = raw_buffer(info.buffer()) else {
                log::error!("Vertex buffer of another backend");
                return;
            };
            buffers.push(raw);
            offsets.push(info.offset());
        }
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(self.command_buffer, 0, &buffers, &offsets);
        }
        for info in vertex_buffers {
            self.retain_buffer(info.buffer());
        }
    }

    pub(crate) fn draw(
        &mut self,
        vertex_buffers: &[BufferInfo],
        vertices: Range<u32>,
        instances: Range<u32>,
    ) {
        self.bind_vertex_buffers(vertex_buffers);
        unsafe {
            self.device.cmd_draw(
                self.command_buffer,
                vertices.len() as u32,
                instances.len() as u32,
                vertices.start,
                instances.start,
            );
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
        let Some(raw) = raw_buffer(index_buffer.buffer()) else {
            log::error!("Index buffer of another backend");
            return;
        };
        unsafe {
            self.device.cmd_bind_index_buffer(
                self.command_buffer,
                raw,
                index_buffer.offset(),
                convert_index_format(index_format),
            );
        }
        self.retain_buffer(index_buffer.buffer());
        self.bind_vertex_buffers(vertex_buffers);
        unsafe {
            self.device.cmd_draw_indexed(
                self.command_buffer,
                indices.len() as u32,
                instances.len() as u32,
                indices.start,
                base_vertex,
                instances.start,
            );
        }
    }

    pub(crate) fn finish(&mut self) -> Result<(), GraphicsError> {
        unsafe { self.device.end_command_buffer(self.command_buffer) }.map_err(|e| {
            GraphicsError::ConstructionFailed(format!("Failed to end command buffer: {:?}", e))
        })?;
        log::trace!(
            "VulkanCommandList {:?}: finished ({} framebuffers, {} retained buffers)",
            self.label,
            self.framebuffers.len(),
            self.retained_buffers.len()
        );
        Ok(())
    }
}

impl std::fmt::Debug for VulkanCommandList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanCommandList")
            .field("label", &self.label)
            .field("command_buffer", &self.command_buffer)
            .field("framebuffers", &self.framebuffers.len())
            .field("retained_buffers", &self.retained_buffers.len())
            .field("retained_textures", &self.retained_textures.len())
            .field("retained_views", &self.retained_views.len())
            .field("retained_graphs", &self.retained_graphs.len())
            .finish()
    }
}

impl Drop for VulkanCommandList {
    fn drop(&mut self) {
        unsafe {
            for framebuffer in self.framebuffers.drain(..) {
                self.device.destroy_framebuffer(framebuffer, None);
            }
            // Destroying the pool frees the command buffer.
            self.device.destroy_command_pool(self.pool, None);
        }
    }
}

// ============================================================================
// Queue
// ============================================================================

/// The device queue command lists are submitted to.
pub struct VulkanQueue {
    device: ash::Device,
    queue: Arc<Mutex<vk::Queue>>,
}

impl VulkanQueue {
    pub(super) fn new(device: ash::Device, queue: Arc<Mutex<vk::Queue>>) -> Self {
        Self { device, queue }
    }

    /// Submit finished command buffers in order.
    pub(crate) fn submit(&self, command_buffers: &[vk::CommandBuffer]) -> Result<(), GraphicsError> {
        if command_buffers.is_empty() {
            return Ok(());
        }
        let submit_info = vk::SubmitInfo::default().command_buffers(command_buffers);
        let queue = self.queue.lock();
        unsafe {
            self.device
                .queue_submit(*queue, &[submit_info], vk::Fence::null())
        }
        .map_err(|e| {
            GraphicsError::ConstructionFailed(format!("Failed to submit command buffers: {:?}", e))
        })
    }

    /// Block until the queue is idle.
    pub(crate) fn wait_idle(&self) -> Result<(), GraphicsError> {
        let queue = self.queue.lock();
        unsafe { self.device.queue_wait_idle(*queue) }.map_err(|e| {
            GraphicsError::ConstructionFailed(format!("Failed to wait for queue idle: {:?}", e))
        })
    }
}

impl std::fmt::Debug for VulkanQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanQueue").finish()
    }
}
