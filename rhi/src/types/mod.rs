//! Common types and descriptors for RHI resources.
//!
//! This module contains format enums, usage flags, and descriptor structs
//! consumed by [`GraphicsDevice`](crate::GraphicsDevice) factory methods.

mod buffer;
mod common;
mod sampler;
mod texture;

pub use buffer::{BufferDescriptor, BufferUsage, IndexFormat};
pub use common::{ClearValue, Extent3d, LoadOp, StoreOp};
pub use sampler::{AddressMode, FilterMode, SamplerDescriptor};
pub use texture::{TextureDescriptor, TextureFormat, TextureUsage, TextureViewDescriptor};
