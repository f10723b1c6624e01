//! GPU resources created by a [`GraphicsDevice`](crate::GraphicsDevice).
//!
//! Every resource carries a [`ResourceId`] that identifies it for hazard
//! tracking. Ownership runs one way: a [`TextureView`] holds its
//! [`Texture`], resources hold a weak reference to their device.

mod buffer;
mod sampler;
mod texture;

use std::sync::atomic::{AtomicU64, Ordering};

pub use buffer::Buffer;
pub use sampler::Sampler;
pub use texture::{Texture, TextureView};

/// Process-unique identity of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Allocate a fresh id.
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    pub fn raw(self) -> u64 {
        self.0
    }
}
