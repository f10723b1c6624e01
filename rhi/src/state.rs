//! Resource state descriptors.
//!
//! Plain value types describing "what access, at what pipeline stage, on
//! what resource". Command items declare their requirements with
//! [`BufferCommandState`] and [`TextureCommandState`]; the
//! [`BarrierTracker`](crate::BarrierTracker) remembers the last observed
//! access per hazard domain as [`BufferBarrierState`] and
//! [`TextureBarrierState`].

use std::sync::Arc;

use bitflags::bitflags;

use crate::resources::{Buffer, ResourceId, Texture, TextureView};
use crate::types::BufferUsage;

bitflags! {
    /// Points in the GPU pipeline at which an access happens.
    ///
    /// Several stages may be combined when describing a binding point, but a
    /// recorded access is normally logged against one coarse stage.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStage: u32 {
        /// Vertex input and vertex shading.
        const VERTEX = 1 << 0;
        /// Fragment shading.
        const FRAGMENT = 1 << 1;
        /// Compute shading.
        const COMPUTE = 1 << 2;
        /// Copy, fill and blit operations.
        const TRANSFER = 1 << 3;
        /// Color attachment output.
        const ATTACHMENT_OUTPUT = 1 << 4;
        /// Early depth/stencil tests.
        const EARLY_FRAGMENT_TEST = 1 << 5;
        /// Late depth/stencil tests.
        const LATE_FRAGMENT_TEST = 1 << 6;
        /// Presentation engine.
        const PRESENT = 1 << 7;
    }
}

/// How an operation touches a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceAccess {
    /// The operation only writes.
    WriteOnly,
    /// The operation only reads.
    ReadOnly,
    /// The operation reads and writes.
    ReadWrite,
}

impl ResourceAccess {
    /// Returns true if the access reads.
    pub fn is_read(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    /// Returns true if the access writes.
    pub fn is_write(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }
}

/// Logical state a texture must be in for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureState {
    /// Contents are undefined.
    #[default]
    Undefined,
    /// Bound as a color attachment.
    ColorAttachment,
    /// Bound as a depth/stencil attachment.
    DepthStencilAttachment,
    /// Sampled from a shader.
    SampledBinding,
    /// Bound as a storage texture.
    StorageBinding,
    /// Source of a copy.
    CopySrc,
    /// Destination of a copy.
    CopyDst,
    /// Handed to the presentation engine.
    Present,
}

// ============================================================================
// Buffer ranges
// ============================================================================

/// A byte range of a buffer.
///
/// Two ranges belong to the same hazard domain only if buffer, offset and
/// size are all equal. Overlapping but unequal ranges are distinct domains.
#[derive(Clone)]
pub struct BufferInfo {
    buffer: Arc<Buffer>,
    offset: u64,
    size: u64,
}

impl BufferInfo {
    /// Describe `size` bytes of `buffer` starting at `offset`.
    pub fn new(buffer: Arc<Buffer>, offset: u64, size: u64) -> Self {
        Self {
            buffer,
            offset,
            size,
        }
    }

    /// Describe the whole buffer.
    pub fn whole(buffer: Arc<Buffer>) -> Self {
        let size = buffer.size();
        Self::new(buffer, 0, size)
    }

    /// The owning buffer.
    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }

    /// Byte offset of the range.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Byte size of the range.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Usage flags of the owning buffer.
    pub fn usage(&self) -> BufferUsage {
        self.buffer.usage()
    }

    /// Returns true if the range lies inside the buffer.
    pub fn is_in_bounds(&self) -> bool {
        self.offset
            .checked_add(self.size)
            .is_some_and(|end| end <= self.buffer.size())
    }
}

impl PartialEq for BufferInfo {
    fn eq(&self, other: &Self) -> bool {
        self.buffer.id() == other.buffer.id()
            && self.size == other.size
            && self.offset == other.offset
    }
}

impl Eq for BufferInfo {}

impl std::fmt::Debug for BufferInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferInfo")
            .field("buffer", &self.buffer.id())
            .field("offset", &self.offset)
            .field("size", &self.size)
            .finish()
    }
}

// ============================================================================
// Declared accesses
// ============================================================================

/// A buffer access declared by a command item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferCommandState {
    pub buffer: BufferInfo,
    pub stage: PipelineStage,
    pub access: ResourceAccess,
}

impl BufferCommandState {
    pub fn new(buffer: BufferInfo, stage: PipelineStage, access: ResourceAccess) -> Self {
        Self {
            buffer,
            stage,
            access,
        }
    }
}

/// A texture access declared by a command item.
#[derive(Debug, Clone)]
pub struct TextureCommandState {
    pub view: Arc<TextureView>,
    pub state: TextureState,
    pub stage: PipelineStage,
    pub access: ResourceAccess,
}

impl TextureCommandState {
    pub fn new(
        view: Arc<TextureView>,
        state: TextureState,
        stage: PipelineStage,
        access: ResourceAccess,
    ) -> Self {
        Self {
            view,
            state,
            stage,
            access,
        }
    }
}

// ============================================================================
// Tracked states
// ============================================================================

/// Last observed access of a buffer range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferBarrierState {
    pub buffer: BufferInfo,
    pub stage: PipelineStage,
    pub access: ResourceAccess,
}

/// Last observed access of a texture.
///
/// Keyed by texture identity, never by view.
#[derive(Debug, Clone)]
pub struct TextureBarrierState {
    pub texture: Arc<Texture>,
    pub state: TextureState,
    pub stage: PipelineStage,
    pub access: ResourceAccess,
}

impl TextureBarrierState {
    /// Identity of the tracked texture.
    pub fn texture_id(&self) -> ResourceId {
        self.texture.id()
    }
}
