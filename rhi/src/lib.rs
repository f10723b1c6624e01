//! # RedLilium RHI
//!
//! Backend-neutral GPU command recording with automatic barrier insertion.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GraphicsDevice`] - Factory for buffers, textures, samplers, render
//!   graphs and command encoders
//! - [`CommandEncoder`] - Records [`CommandItem`]s and drains them into a
//!   [`CommandBuffer`] in one pass
//! - [`BarrierTracker`] - Remembers the last access of every buffer range and
//!   texture and emits the barriers repeated accesses need
//! - [`resolve`] - Deterministic tables from `(stage, access, usage)` to
//!   native access flags and texture layouts
//! - [`RenderGraph`] - Precompiled passes and pipelines addressed by index
//! - Backends: Dummy (records native calls for inspection) and Vulkan
//!   (feature `vulkan-backend`)
//!
//! Callers never place barriers themselves. Every command item declares the
//! accesses it performs; [`CommandEncoder::finish`] feeds those declarations
//! to the tracker right before the item executes.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use redlilium_rhi::{BufferDescriptor, BufferInfo, BufferUsage, DeviceParameters, GraphicsDevice};
//!
//! let device = GraphicsDevice::new(DeviceParameters::new())?;
//! let buffer = device.create_buffer(&BufferDescriptor::new(
//!     256,
//!     BufferUsage::COPY_DST | BufferUsage::STORAGE,
//! ))?;
//!
//! let mut encoder = device.create_command_encoder(Some("clear"))?;
//! encoder.fill_buffer(BufferInfo::whole(Arc::clone(&buffer)), 0)?;
//! encoder.fill_buffer(BufferInfo::whole(buffer), 0)?;
//! let commands = encoder.finish()?;
//! assert_eq!(commands.stats().buffer_barriers, 1);
//!
//! device.queue().submit(vec![commands])?;
//! ```

pub mod backend;
pub mod command;
pub mod device;
pub mod error;
pub mod graph;
pub mod profiling;
pub mod queue;
pub mod resolve;
pub mod resources;
pub mod state;
pub mod tracker;
pub mod types;

// Re-export main types for convenience
pub use backend::BackendType;
pub use backend::dummy::{DummyCommandList, DummyFramebuffer, RecordedCommand};
#[cfg(feature = "vulkan-backend")]
pub use backend::vulkan::{VulkanDeviceContext, VulkanPipelineBuilder};
pub use command::{
    BeginRenderPassCommand, BindPipelineCommand, CommandBuffer, CommandEncoder, CommandItem,
    CommandStats, DispatchCommand, DrawCommand, DrawIndexedCommand, EncoderState,
};
pub use device::{DeviceCapabilities, DeviceId, DeviceParameters, GraphicsDevice};
pub use error::GraphicsError;
pub use graph::{
    AttachmentDescriptor, PipelineBindPoint, PipelineDescriptor, RenderGraph,
    RenderGraphDescriptor, RenderPassDescriptor,
};
pub use queue::Queue;
pub use resolve::{
    AccessFlags, ResourceUsage, TextureLayout, resolve_access, resolve_buffer_access,
    resolve_texture_access, resolve_texture_layout,
};
pub use resources::{Buffer, ResourceId, Sampler, Texture, TextureView};
pub use state::{
    BufferBarrierState, BufferCommandState, BufferInfo, PipelineStage, ResourceAccess,
    TextureBarrierState, TextureCommandState, TextureState,
};
pub use tracker::{
    Barrier, BarrierSink, BarrierTracker, BufferBarrier, HazardPolicy, TextureBarrier,
};
pub use types::{
    AddressMode, BufferDescriptor, BufferUsage, ClearValue, Extent3d, FilterMode, IndexFormat,
    LoadOp, SamplerDescriptor, StoreOp, TextureDescriptor, TextureFormat, TextureUsage,
    TextureViewDescriptor,
};

/// RHI library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_device_is_dummy() {
        let device = GraphicsDevice::new(DeviceParameters::new()).unwrap();
        assert_eq!(device.backend_type(), BackendType::Dummy);
        assert_eq!(device.name(), "Dummy Backend");
    }
}
