//! Finished command buffers.

use super::EncoderState;
use crate::backend::GpuCommandList;
use crate::backend::dummy::{DummyCommandList, RecordedCommand};
use crate::device::{DeviceId, DeviceRef};

/// Counters collected while an encoder finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CommandStats {
    /// Command items executed.
    pub items_executed: usize,
    /// Buffer barriers emitted by the tracker.
    pub buffer_barriers: usize,
    /// Texture barriers emitted by the tracker.
    pub texture_barriers: usize,
    /// Layout transitions emitted to make a texture addressable by a copy.
    pub layout_transitions: usize,
}

impl CommandStats {
    /// Total barriers emitted by the tracker.
    pub fn barriers(&self) -> usize {
        self.buffer_barriers + self.texture_barriers
    }
}

/// A finished native command list, ready for submission.
///
/// Only [`CommandEncoder::finish`](super::CommandEncoder::finish) creates
/// command buffers, so every command buffer starts out
/// [`EncoderState::Ended`].
pub struct CommandBuffer {
    list: GpuCommandList,
    stats: CommandStats,
    state: EncoderState,
    device: DeviceRef,
    label: Option<String>,
}

impl CommandBuffer {
    pub(crate) fn new(
        list: GpuCommandList,
        stats: CommandStats,
        device: DeviceRef,
        label: Option<String>,
    ) -> Self {
        Self {
            list,
            stats,
            state: EncoderState::Ended,
            device,
            label,
        }
    }

    /// Counters collected while finishing.
    pub fn stats(&self) -> CommandStats {
        self.stats
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EncoderState {
        self.state
    }

    /// Get the debug label.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The dummy command list, if recorded on the dummy backend.
    pub fn as_dummy(&self) -> Option<&DummyCommandList> {
        self.list.as_dummy()
    }

    /// Native calls recorded on the dummy backend, in order.
    pub fn recorded_commands(&self) -> Option<&[RecordedCommand]> {
        self.as_dummy().map(DummyCommandList::commands)
    }

    pub(crate) fn list(&self) -> &GpuCommandList {
        &self.list
    }

    pub(crate) fn device_id(&self) -> DeviceId {
        self.device.id()
    }

    pub(crate) fn mark_submitted(&mut self) {
        self.state = EncoderState::Submitted;
    }
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("label", &self.label)
            .field("state", &self.state)
            .field("stats", &self.stats)
            .finish()
    }
}

static_assertions::assert_impl_all!(CommandBuffer: Send, Sync);
