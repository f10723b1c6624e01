//! Common types shared across the RHI.

// ============================================================================
// Extent3d
// ============================================================================

/// 3D extent for textures and copy regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3d {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Depth in pixels (1 for 2D textures).
    pub depth: u32,
}

impl Extent3d {
    /// Create a new 2D extent.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Create a new 3D extent.
    pub fn new_3d(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Number of texels covered by this extent.
    pub fn texel_count(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth as u64
    }
}

// ============================================================================
// Attachment Operations
// ============================================================================

/// Clear value for render pass attachments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Clear color attachment with RGBA values.
    Color { r: f32, g: f32, b: f32, a: f32 },
    /// Clear depth and stencil attachments.
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    /// Create a color clear value.
    pub fn color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Color { r, g, b, a }
    }

    /// Create a depth clear value with a zero stencil.
    pub fn depth(depth: f32) -> Self {
        Self::DepthStencil { depth, stencil: 0 }
    }

    /// Transparent black.
    pub fn transparent() -> Self {
        Self::color(0.0, 0.0, 0.0, 0.0)
    }
}

/// Operation to perform when loading an attachment at the start of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LoadOp {
    /// Clear the attachment with a specified value.
    Clear(ClearValue),
    /// Load the existing contents of the attachment.
    #[default]
    Load,
    /// Don't care about the existing contents (may be undefined).
    DontCare,
}

impl LoadOp {
    /// Create a clear operation with a color value.
    pub fn clear_color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Clear(ClearValue::color(r, g, b, a))
    }

    /// Create a clear operation with a depth value.
    pub fn clear_depth(depth: f32) -> Self {
        Self::Clear(ClearValue::depth(depth))
    }

    /// The clear value carried by this operation, if any.
    pub fn clear_value(&self) -> Option<ClearValue> {
        match self {
            Self::Clear(value) => Some(*value),
            Self::Load | Self::DontCare => None,
        }
    }
}

/// Operation to perform when storing an attachment at the end of a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreOp {
    /// Store the attachment contents for later use.
    #[default]
    Store,
    /// Don't care about the contents after the pass (may be discarded).
    DontCare,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_texel_count() {
        assert_eq!(Extent3d::new_2d(4, 4).texel_count(), 16);
        assert_eq!(Extent3d::new_3d(2, 2, 2).texel_count(), 8);
    }

    #[test]
    fn test_load_op_clear_value() {
        let op = LoadOp::clear_color(1.0, 0.0, 0.0, 1.0);
        assert_eq!(op.clear_value(), Some(ClearValue::color(1.0, 0.0, 0.0, 1.0)));
        assert_eq!(LoadOp::Load.clear_value(), None);
    }
}
