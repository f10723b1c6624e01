//! Submission queue.

use parking_lot::Mutex;

use crate::backend::GpuQueue;
use crate::command::CommandBuffer;
use crate::device::DeviceRef;
use crate::error::GraphicsError;

/// The single queue of a device.
///
/// Submitted command buffers are kept alive until [`wait_idle`](Self::wait_idle)
/// confirms the GPU is done with them. Ordering between command buffers is
/// native submission order; hazards across command buffers are not tracked.
pub struct Queue {
    gpu: GpuQueue,
    device: DeviceRef,
    in_flight: Mutex<Vec<CommandBuffer>>,
}

impl Queue {
    pub(crate) fn new(gpu: GpuQueue, device: DeviceRef) -> Self {
        Self {
            gpu,
            device,
            in_flight: Mutex::new(Vec::new()),
        }
    }

    /// Submit finished command buffers in order.
    ///
    /// # Errors
    ///
    /// - [`GraphicsError::ProtocolViolation`] if a command buffer was
    ///   recorded on another device; nothing is submitted in that case
    /// - [`GraphicsError::ConstructionFailed`] if the native submission fails
    pub fn submit(&self, mut command_buffers: Vec<CommandBuffer>) -> Result<(), GraphicsError> {
        crate::profile_function!();

        if let Some(foreign) = command_buffers
            .iter()
            .find(|buffer| buffer.device_id() != self.device.id())
        {
            return Err(GraphicsError::ProtocolViolation(format!(
                "command buffer {:?} was recorded on another device",
                foreign.label()
            )));
        }

        let lists: Vec<_> = command_buffers.iter().map(CommandBuffer::list).collect();
        self.gpu.submit(&lists)?;

        log::debug!("Queue: submitted {} command buffers", command_buffers.len());

        for buffer in &mut command_buffers {
            buffer.mark_submitted();
        }
        self.in_flight.lock().extend(command_buffers);
        Ok(())
    }

    /// Block until all submitted work completed, then release it.
    pub fn wait_idle(&self) -> Result<(), GraphicsError> {
        crate::profile_scope!("Queue::wait_idle");

        self.gpu.wait_idle()?;
        let released = std::mem::take(&mut *self.in_flight.lock());
        crate::profile_message!("queue idle");
        log::trace!("Queue: released {} command buffers", released.len());
        Ok(())
    }

    /// Number of submitted command buffers not yet released.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("in_flight", &self.in_flight_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(Queue: Send, Sync);
