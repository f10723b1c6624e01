//! Common utilities for RHI integration tests.
//!
//! Every test runs on the dummy backend, whose command lists record each
//! native call so barrier emission can be asserted on directly.

use std::sync::Arc;

use redlilium_rhi::{
    AttachmentDescriptor, Buffer, BufferDescriptor, BufferInfo, BufferUsage, DeviceParameters,
    GraphicsDevice, HazardPolicy, LoadOp, PipelineDescriptor, RenderGraph, RenderGraphDescriptor,
    RenderPassDescriptor, TextureDescriptor, TextureFormat, TextureUsage, TextureView,
    TextureViewDescriptor,
};

/// Install the test logger once per process.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Shared setup for a single test.
pub struct TestContext {
    pub device: Arc<GraphicsDevice>,
}

#[allow(dead_code)]
impl TestContext {
    /// Create a dummy device with the given hazard policy.
    pub fn new(policy: HazardPolicy) -> Self {
        init_logging();
        let device = GraphicsDevice::new(
            DeviceParameters::new()
                .with_label("rhi-tests")
                .with_hazard_policy(policy),
        )
        .expect("Failed to create dummy device");
        Self { device }
    }

    /// Create a buffer with the given usage.
    pub fn create_buffer(&self, size: u64, usage: BufferUsage) -> Arc<Buffer> {
        self.device
            .create_buffer(&BufferDescriptor::new(size, usage))
            .expect("Failed to create buffer")
    }

    /// Create a buffer usable as copy source and destination and return the
    /// whole range.
    pub fn transfer_range(&self, size: u64) -> BufferInfo {
        BufferInfo::whole(self.create_buffer(size, BufferUsage::COPY_SRC | BufferUsage::COPY_DST))
    }

    /// Create a 2D texture and a view covering all of it.
    pub fn create_view(
        &self,
        width: u32,
        height: u32,
        format: TextureFormat,
        usage: TextureUsage,
    ) -> Arc<TextureView> {
        self.device
            .create_texture(&TextureDescriptor::new_2d(width, height, format, usage))
            .expect("Failed to create texture")
            .create_view(&TextureViewDescriptor::new())
            .expect("Failed to create texture view")
    }

    /// A graph with one pass rendering into a single cleared color target.
    pub fn single_color_graph(&self, format: TextureFormat) -> Arc<RenderGraph> {
        self.device
            .create_render_graph(
                &RenderGraphDescriptor::new().with_label("single-color").with_pass(
                    RenderPassDescriptor::new()
                        .with_label("main")
                        .with_color_attachment(
                            AttachmentDescriptor::new(format)
                                .with_load_op(LoadOp::clear_color(0.0, 0.0, 0.0, 1.0)),
                        )
                        .with_pipeline(PipelineDescriptor::graphics().with_label("solid")),
                ),
            )
            .expect("Failed to create render graph")
    }
}
