//! Texture sampler resource.

use std::sync::Arc;

use super::ResourceId;
use crate::backend::GpuSampler;
use crate::device::{DeviceRef, GraphicsDevice};
use crate::types::SamplerDescriptor;

/// A texture sampler.
///
/// Samplers take no part in hazard tracking.
pub struct Sampler {
    id: ResourceId,
    device: DeviceRef,
    descriptor: SamplerDescriptor,
    #[allow(dead_code)]
    gpu: GpuSampler,
}

impl Sampler {
    /// Create a new sampler (called by GraphicsDevice).
    pub(crate) fn new(
        device: DeviceRef,
        descriptor: SamplerDescriptor,
        gpu: GpuSampler,
    ) -> Self {
        Self {
            id: ResourceId::next(),
            device,
            descriptor,
            gpu,
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

    /// Get the sampler descriptor.
    pub fn descriptor(&self) -> &SamplerDescriptor {
        &self.descriptor
    }

    /// Get the sampler label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("id", &self.id)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

static_assertions::assert_impl_all!(Sampler: Send, Sync);
