//! GPU texture resource and texture views.

use std::sync::Arc;

use parking_lot::RwLock;

use super::ResourceId;
use crate::backend::{GpuTexture, GpuTextureView};
use crate::device::{DeviceId, DeviceRef, GraphicsDevice};
use crate::error::GraphicsError;
use crate::resolve::TextureLayout;
use crate::types::{
    Extent3d, TextureDescriptor, TextureFormat, TextureUsage, TextureViewDescriptor,
};

/// A GPU texture resource.
///
/// Besides its descriptor, a texture carries the layout it is currently
/// resident in. The layout starts as [`TextureLayout::Undefined`] and is
/// written by the barrier tracker whenever it transitions the texture.
pub struct Texture {
    id: ResourceId,
    device: DeviceRef,
    descriptor: TextureDescriptor,
    gpu: GpuTexture,
    layout: RwLock<TextureLayout>,
}

impl Texture {
    /// Create a new texture (called by GraphicsDevice).
    pub(crate) fn new(
        device: DeviceRef,
        descriptor: TextureDescriptor,
        gpu: GpuTexture,
    ) -> Self {
        Self {
            id: ResourceId::next(),
            device,
            descriptor,
            gpu,
            layout: RwLock::new(TextureLayout::Undefined),
        }
    }

    /// Get the resource id.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Get the parent device, if it still exists.
    pub fn device(&self) -> Option<Arc<GraphicsDevice>> {
        self.device.upgrade()
    }

    pub(crate) fn device_id(&self) -> DeviceId {
        self.device.id()
    }

    /// Get the texture descriptor.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    /// Get the texture size.
    pub fn size(&self) -> Extent3d {
        self.descriptor.size
    }

    /// Get the texture width.
    pub fn width(&self) -> u32 {
        self.descriptor.size.width
    }

    /// Get the texture height.
    pub fn height(&self) -> u32 {
        self.descriptor.size.height
    }

    /// Get the texture format.
    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    /// Get the usage flags.
    pub fn usage(&self) -> TextureUsage {
        self.descriptor.usage
    }

    /// Get the texture label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }

    /// Get the layout the texture is currently resident in.
    pub fn layout(&self) -> TextureLayout {
        *self.layout.read()
    }

    pub(crate) fn set_layout(&self, layout: TextureLayout) {
        *self.layout.write() = layout;
    }

    pub(crate) fn gpu(&self) -> &GpuTexture {
        &self.gpu
    }

    /// Create a view of this texture.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if the mip range lies
    /// outside the texture.
    pub fn create_view(
        self: &Arc<Self>,
        descriptor: &TextureViewDescriptor,
    ) -> Result<Arc<TextureView>, GraphicsError> {
        let mip_level_count = descriptor
            .mip_level_count
            .unwrap_or(self.descriptor.mip_level_count.saturating_sub(descriptor.base_mip_level));
        if mip_level_count == 0
            || descriptor.base_mip_level + mip_level_count > self.descriptor.mip_level_count
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "mip range {}+{} outside texture with {} levels",
                descriptor.base_mip_level, mip_level_count, self.descriptor.mip_level_count
            )));
        }

        let gpu = self.gpu.create_view(
            &self.descriptor,
            descriptor.base_mip_level,
            mip_level_count,
        )?;

        log::trace!(
            "Texture {:?}: created view {:?} (mips {}+{})",
            self.id,
            descriptor.label,
            descriptor.base_mip_level,
            mip_level_count
        );

        Ok(Arc::new(TextureView {
            id: ResourceId::next(),
            texture: Arc::clone(self),
            label: descriptor.label.clone(),
            base_mip_level: descriptor.base_mip_level,
            mip_level_count,
            gpu,
        }))
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("size", &self.descriptor.size)
            .field("format", &self.descriptor.format)
            .field("usage", &self.descriptor.usage)
            .field("layout", &self.layout())
            .field("label", &self.descriptor.label)
            .finish()
    }
}

/// A view of a [`Texture`].
///
/// Views keep their texture alive. The barrier tracker keys on the texture,
/// so all views of one texture share a hazard domain.
pub struct TextureView {
    id: ResourceId,
    texture: Arc<Texture>,
    label: Option<String>,
    base_mip_level: u32,
    mip_level_count: u32,
    gpu: GpuTextureView,
}

impl TextureView {
    /// Get the view's own id.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Get the viewed texture.
    pub fn texture(&self) -> &Arc<Texture> {
        &self.texture
    }

    /// Get the view label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Get the texture format.
    pub fn format(&self) -> TextureFormat {
        self.texture.format()
    }

    pub fn base_mip_level(&self) -> u32 {
        self.base_mip_level
    }

    pub fn mip_level_count(&self) -> u32 {
        self.mip_level_count
    }

    /// Size of the first visible mip level.
    pub fn size(&self) -> Extent3d {
        let size = self.texture.size();
        Extent3d::new_3d(
            (size.width >> self.base_mip_level).max(1),
            (size.height >> self.base_mip_level).max(1),
            size.depth,
        )
    }

    pub(crate) fn gpu(&self) -> &GpuTextureView {
        &self.gpu
    }
}

impl std::fmt::Debug for TextureView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureView")
            .field("id", &self.id)
            .field("texture", &self.texture.id())
            .field("mips", &(self.base_mip_level..self.base_mip_level + self.mip_level_count))
            .field("label", &self.label)
            .finish()
    }
}

// Ensure Texture and TextureView are Send + Sync
static_assertions::assert_impl_all!(Texture: Send, Sync);
static_assertions::assert_impl_all!(TextureView: Send, Sync);
