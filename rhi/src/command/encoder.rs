//! Command encoder.

use std::sync::Arc;

use super::item::PassScope;
use super::{
    BeginRenderPassCommand, BindPipelineCommand, CommandBuffer, CommandItem, CommandStats,
    DispatchCommand, DrawCommand, DrawIndexedCommand, EncoderState,
};
use crate::backend::GpuCommandList;
use crate::device::GraphicsDevice;
use crate::error::GraphicsError;
use crate::graph::RenderGraph;
use crate::resources::TextureView;
use crate::state::BufferInfo;
use crate::tracker::BarrierTracker;

/// Records command items and turns them into a [`CommandBuffer`].
///
/// Recording only validates and stores items. Barriers are decided and
/// native commands are emitted in a single pass by [`finish`](Self::finish).
/// An encoder is driven by one thread; separate encoders may record
/// concurrently, but hazards between them are not tracked.
///
/// # Example
///
/// ```ignore
/// let mut encoder = device.create_command_encoder(Some("upload"))?;
/// encoder.fill_buffer(BufferInfo::whole(Arc::clone(&staging)), 0)?;
/// encoder.copy_buffer_to_buffer(
///     BufferInfo::whole(staging),
///     BufferInfo::whole(Arc::clone(&vertices)),
/// )?;
/// let commands = encoder.finish()?;
/// device.queue().submit(vec![commands])?;
/// ```
pub struct CommandEncoder {
    device: Arc<GraphicsDevice>,
    label: Option<String>,
    items: Vec<CommandItem>,
    tracker: BarrierTracker,
    list: Option<GpuCommandList>,
    state: EncoderState,
    pass_open: bool,
}

impl CommandEncoder {
    /// Create an encoder (called by GraphicsDevice).
    pub(crate) fn new(
        device: Arc<GraphicsDevice>,
        label: Option<String>,
        list: GpuCommandList,
    ) -> Self {
        let tracker = BarrierTracker::new(device.hazard_policy());
        Self {
            device,
            label,
            items: Vec::new(),
            tracker,
            list: Some(list),
            state: EncoderState::Open,
            pass_open: false,
        }
    }

    /// Get the parent device.
    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// Get the debug label.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EncoderState {
        self.state
    }

    /// Number of items waiting for [`finish`](Self::finish).
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns true while a render pass is open.
    pub fn is_render_pass_open(&self) -> bool {
        self.pass_open
    }

    /// The encoder's barrier tracker.
    ///
    /// The tracker outlives [`finish`](Self::finish), so the states it ended
    /// with stay inspectable.
    pub fn tracker(&self) -> &BarrierTracker {
        &self.tracker
    }

    /// Append a command item.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::ProtocolViolation`] if the encoder is not open, a
    ///   resource belongs to another device, a render pass or pipeline index
    ///   is out of range, or the item is not allowed inside (or outside) a
    ///   render pass
    /// - [`GraphicsError::InvalidParameter`] if ranges, usages or attachment
    ///   formats do not fit the item
    pub fn record(&mut self, item: CommandItem) -> Result<(), GraphicsError> {
        if self.state != EncoderState::Open {
            return Err(GraphicsError::ProtocolViolation(format!(
                "cannot record {} into an encoder in state {:?}",
                item.name(),
                self.state
            )));
        }

        self.check_device(&item)?;
        item.validate()?;

        match (item.pass_scope(), self.pass_open) {
            (PassScope::Begin, true) => {
                return Err(GraphicsError::ProtocolViolation(
                    "render pass begun while another is open".to_string(),
                ));
            }
            (PassScope::End, false) => {
                return Err(GraphicsError::ProtocolViolation(
                    "render pass ended while none is open".to_string(),
                ));
            }
            (PassScope::Inside, false) => {
                return Err(GraphicsError::ProtocolViolation(format!(
                    "{} recorded outside a render pass",
                    item.name()
                )));
            }
            (PassScope::Outside, true) => {
                return Err(GraphicsError::ProtocolViolation(format!(
                    "{} recorded inside a render pass",
                    item.name()
                )));
            }
            (PassScope::Begin, false) => self.pass_open = true,
            (PassScope::End, true) => self.pass_open = false,
            _ => {}
        }

        self.items.push(item);
        Ok(())
    }

    fn check_device(&self, item: &CommandItem) -> Result<(), GraphicsError> {
        let device = self.device.id();
        let foreign = item
            .buffer_states()
            .iter()
            .any(|state| state.buffer.buffer().device_id() != device)
            || item
                .texture_states()
                .iter()
                .any(|state| state.view.texture().device_id() != device)
            || item
                .render_graph()
                .is_some_and(|graph| graph.device_id() != device);

        if foreign {
            return Err(GraphicsError::ProtocolViolation(format!(
                "{} refers to a resource of another device",
                item.name()
            )));
        }
        Ok(())
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    /// Begin pass `pass_index` of `graph` with the given attachments.
    pub fn begin_render_pass(
        &mut self,
        graph: &Arc<RenderGraph>,
        pass_index: usize,
        color_views: &[Arc<TextureView>],
        depth_stencil_view: Option<&Arc<TextureView>>,
    ) -> Result<(), GraphicsError> {
        self.record(CommandItem::BeginRenderPass(BeginRenderPassCommand {
            graph: Arc::clone(graph),
            pass_index,
            color_views: color_views.to_vec(),
            depth_stencil_view: depth_stencil_view.cloned(),
        }))
    }

    /// End the open render pass.
    pub fn end_render_pass(&mut self) -> Result<(), GraphicsError> {
        self.record(CommandItem::EndRenderPass)
    }

    /// Bind pipeline `pipeline_index` of pass `pass_index`.
    pub fn bind_pipeline(
        &mut self,
        graph: &Arc<RenderGraph>,
        pass_index: usize,
        pipeline_index: usize,
    ) -> Result<(), GraphicsError> {
        self.record(CommandItem::BindPipeline(BindPipelineCommand {
            graph: Arc::clone(graph),
            pass_index,
            pipeline_index,
        }))
    }

    /// Fill a buffer range with a repeated 32-bit value.
    pub fn fill_buffer(&mut self, buffer: BufferInfo, value: u32) -> Result<(), GraphicsError> {
        self.record(CommandItem::FillBuffer { buffer, value })
    }

    /// Copy `src` into the start of `dst`.
    pub fn copy_buffer_to_buffer(
        &mut self,
        src: BufferInfo,
        dst: BufferInfo,
    ) -> Result<(), GraphicsError> {
        self.record(CommandItem::CopyBufferToBuffer { src, dst })
    }

    /// Upload tightly packed texels into the view's top mip level.
    pub fn copy_buffer_to_texture(
        &mut self,
        src: BufferInfo,
        dst: &Arc<TextureView>,
    ) -> Result<(), GraphicsError> {
        self.record(CommandItem::CopyBufferToTexture {
            src,
            dst: Arc::clone(dst),
        })
    }

    /// Read back the view's top mip level as tightly packed texels.
    pub fn copy_texture_to_buffer(
        &mut self,
        src: &Arc<TextureView>,
        dst: BufferInfo,
    ) -> Result<(), GraphicsError> {
        self.record(CommandItem::CopyTextureToBuffer {
            src: Arc::clone(src),
            dst,
        })
    }

    pub fn copy_texture_to_texture(
        &mut self,
        src: &Arc<TextureView>,
        dst: &Arc<TextureView>,
    ) -> Result<(), GraphicsError> {
        self.record(CommandItem::CopyTextureToTexture {
            src: Arc::clone(src),
            dst: Arc::clone(dst),
        })
    }

    pub fn dispatch(&mut self, dispatch: DispatchCommand) -> Result<(), GraphicsError> {
        self.record(CommandItem::Dispatch(dispatch))
    }

    pub fn draw(&mut self, draw: DrawCommand) -> Result<(), GraphicsError> {
        self.record(CommandItem::Draw(draw))
    }

    pub fn draw_indexed(&mut self, draw: DrawIndexedCommand) -> Result<(), GraphicsError> {
        self.record(CommandItem::DrawIndexed(draw))
    }

    // ========================================================================
    // Finish
    // ========================================================================

    /// Drain the recorded items into a finished command buffer.
    ///
    /// Items are processed once, in recording order. For each item the
    /// declared buffer accesses and then texture accesses go through the
    /// tracker, which emits barriers straight into the native list; only
    /// then does the item execute. A render pass is synchronized as a
    /// whole: the accesses of every item from `BeginRenderPass` through
    /// `EndRenderPass` are tracked before the pass begins, so no barrier is
    /// recorded inside a native pass. A render pass still open at this point
    /// is closed. Items are consumed; the encoder is left
    /// [`Ended`](EncoderState::Ended) even if a native call fails.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::ProtocolViolation`] if called more than once
    /// - [`GraphicsError::ConstructionFailed`] if a native call fails
    pub fn finish(&mut self) -> Result<CommandBuffer, GraphicsError> {
        crate::profile_scope!("CommandEncoder::finish");

        if self.state != EncoderState::Open {
            return Err(GraphicsError::ProtocolViolation(format!(
                "finish() called on an encoder in state {:?}",
                self.state
            )));
        }
        self.state = EncoderState::Ended;

        let Some(mut list) = self.list.take() else {
            return Err(GraphicsError::ProtocolViolation(
                "encoder has no command list".to_string(),
            ));
        };

        if self.pass_open {
            log::warn!(
                "CommandEncoder {:?}: render pass still open at finish, closing it",
                self.label
            );
            self.items.push(CommandItem::EndRenderPass);
            self.pass_open = false;
        }

        let mut stats = CommandStats::default();
        let mut segment: Vec<CommandItem> = Vec::new();
        for item in std::mem::take(&mut self.items) {
            segment.push(item);
            let pass_pending = matches!(segment.first(), Some(CommandItem::BeginRenderPass(_)))
                && !matches!(segment.last(), Some(CommandItem::EndRenderPass));
            if pass_pending {
                continue;
            }

            for item in &segment {
                self.synchronize(&mut list, item, &mut stats);
            }
            for item in segment.drain(..) {
                stats.layout_transitions += item.prepare_copy_layouts(&mut list);
                item.execute(&mut list)?;
                stats.items_executed += 1;
            }
        }

        list.finish()?;

        log::debug!(
            "CommandEncoder {:?}: finished {} items, {} buffer barriers, {} texture barriers, \
             {} copy layout transitions",
            self.label,
            stats.items_executed,
            stats.buffer_barriers,
            stats.texture_barriers,
            stats.layout_transitions
        );

        Ok(CommandBuffer::new(
            list,
            stats,
            self.device.handle(),
            self.label.clone(),
        ))
    }

    /// Run an item's declared accesses through the tracker.
    fn synchronize(
        &mut self,
        list: &mut GpuCommandList,
        item: &CommandItem,
        stats: &mut CommandStats,
    ) {
        for state in item.buffer_states() {
            if self
                .tracker
                .record_buffer_barrier(list, &state.buffer, state.stage, state.access)
            {
                stats.buffer_barriers += 1;
            }
        }
        for state in item.texture_states() {
            if self.tracker.record_texture_barrier(
                list,
                &state.view,
                state.state,
                state.stage,
                state.access,
            ) {
                stats.texture_barriers += 1;
            }
        }
    }
}

impl std::fmt::Debug for CommandEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEncoder")
            .field("label", &self.label)
            .field("state", &self.state)
            .field("items", &self.items.len())
            .field("tracker", &self.tracker)
            .finish()
    }
}

static_assertions::assert_impl_all!(CommandEncoder: Send);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceParameters;
    use crate::state::{PipelineStage, ResourceAccess};
    use crate::types::{BufferDescriptor, BufferUsage};

    fn test_encoder() -> (Arc<GraphicsDevice>, CommandEncoder) {
        let device = GraphicsDevice::new(DeviceParameters::new()).unwrap();
        let encoder = device.create_command_encoder(Some("test")).unwrap();
        (device, encoder)
    }

    fn test_range(device: &Arc<GraphicsDevice>) -> BufferInfo {
        BufferInfo::whole(
            device
                .create_buffer(&BufferDescriptor::new(
                    64,
                    BufferUsage::COPY_SRC | BufferUsage::COPY_DST,
                ))
                .unwrap(),
        )
    }

    #[test]
    fn test_items_wait_for_finish() {
        let (device, mut encoder) = test_encoder();
        let range = test_range(&device);

        encoder.fill_buffer(range.clone(), 1).unwrap();
        encoder.fill_buffer(range, 2).unwrap();

        assert_eq!(encoder.item_count(), 2);
        assert_eq!(encoder.tracker().buffer_state_count(), 0);
    }

    #[test]
    fn test_finish_tracks_and_counts() {
        let (device, mut encoder) = test_encoder();
        let range = test_range(&device);

        encoder.fill_buffer(range.clone(), 1).unwrap();
        encoder.fill_buffer(range, 2).unwrap();
        let commands = encoder.finish().unwrap();

        assert_eq!(encoder.state(), EncoderState::Ended);
        assert_eq!(encoder.item_count(), 0);
        assert_eq!(commands.state(), EncoderState::Ended);
        assert_eq!(
            commands.stats(),
            CommandStats {
                items_executed: 2,
                buffer_barriers: 1,
                texture_barriers: 0,
                layout_transitions: 0,
            }
        );
        let tracked = &encoder.tracker().buffer_states()[0];
        assert_eq!(tracked.stage, PipelineStage::TRANSFER);
        assert_eq!(tracked.access, ResourceAccess::WriteOnly);
    }

    #[test]
    fn test_second_finish_is_violation() {
        let (_device, mut encoder) = test_encoder();
        encoder.finish().unwrap();
        assert!(matches!(
            encoder.finish(),
            Err(GraphicsError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_record_after_finish_is_violation() {
        let (device, mut encoder) = test_encoder();
        encoder.finish().unwrap();
        assert!(matches!(
            encoder.fill_buffer(test_range(&device), 0),
            Err(GraphicsError::ProtocolViolation(_))
        ));
    }

    #[test]
    fn test_end_without_begin_is_violation() {
        let (_device, mut encoder) = test_encoder();
        assert!(matches!(
            encoder.end_render_pass(),
            Err(GraphicsError::ProtocolViolation(_))
        ));
        assert_eq!(encoder.item_count(), 0);
    }

    #[test]
    fn test_foreign_buffer_is_violation() {
        let (_device, mut encoder) = test_encoder();
        let other = GraphicsDevice::new(DeviceParameters::new()).unwrap();

        assert!(matches!(
            encoder.fill_buffer(test_range(&other), 0),
            Err(GraphicsError::ProtocolViolation(_))
        ));
    }
}
