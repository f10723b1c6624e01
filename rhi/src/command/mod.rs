//! Command recording.
//!
//! Work is recorded into a [`CommandEncoder`] as a list of [`CommandItem`]s.
//! Nothing touches the native command list until [`CommandEncoder::finish`],
//! which walks the items once in recording order. For every item it first
//! feeds the declared buffer and texture accesses to the encoder's
//! [`BarrierTracker`](crate::BarrierTracker), then executes the item. The
//! result is a [`CommandBuffer`] ready for [`Queue::submit`](crate::Queue::submit).
//!
//! ```text
//! Open --finish()--> Ended --Queue::submit--> Submitted
//! ```

mod command_buffer;
mod encoder;
mod item;

pub use command_buffer::{CommandBuffer, CommandStats};
pub use encoder::CommandEncoder;
pub use item::{
    BeginRenderPassCommand, BindPipelineCommand, CommandItem, DispatchCommand, DrawCommand,
    DrawIndexedCommand,
};

/// Lifecycle state of recorded work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncoderState {
    /// Accepting command items.
    Open,
    /// Finished; the command buffer can be submitted.
    Ended,
    /// Handed to a queue.
    Submitted,
}
