//! Barrier tracker and resolution table tests.
//!
//! The tracker is exercised in isolation with a `Vec<Barrier>` sink, so no
//! encoder or native command list is involved.

mod common;

use rstest::rstest;

use common::TestContext;
use redlilium_rhi::{
    AccessFlags, Barrier, BarrierTracker, BufferUsage, HazardPolicy, PipelineStage,
    ResourceAccess, ResourceUsage, TextureFormat, TextureLayout, TextureState, TextureUsage,
    TextureViewDescriptor, resolve_access, resolve_texture_layout,
};

// ============================================================================
// Resolution Tables
// ============================================================================

/// A transfer-stage read resolves to transfer-read whatever the usage.
#[rstest]
#[case::vertex_buffer(ResourceUsage::Buffer(BufferUsage::VERTEX))]
#[case::index_buffer(ResourceUsage::Buffer(BufferUsage::INDEX))]
#[case::uniform_buffer(ResourceUsage::Buffer(BufferUsage::UNIFORM))]
#[case::indirect_buffer(ResourceUsage::Buffer(BufferUsage::INDIRECT))]
#[case::empty_buffer(ResourceUsage::Buffer(BufferUsage::empty()))]
#[case::color_texture(ResourceUsage::Texture(TextureUsage::COLOR_ATTACHMENT))]
#[case::depth_texture(ResourceUsage::Texture(TextureUsage::DEPTH_STENCIL_ATTACHMENT))]
#[case::sampled_texture(ResourceUsage::Texture(TextureUsage::TEXTURE_BINDING))]
fn test_transfer_read_ignores_usage(#[case] usage: ResourceUsage) {
    assert_eq!(
        resolve_access(PipelineStage::TRANSFER, ResourceAccess::ReadOnly, usage),
        AccessFlags::TRANSFER_READ
    );
}

#[rstest]
#[case::uniform_before_shader(
    PipelineStage::FRAGMENT,
    ResourceAccess::ReadOnly,
    ResourceUsage::Buffer(BufferUsage::UNIFORM | BufferUsage::STORAGE),
    AccessFlags::UNIFORM_READ
)]
#[case::vertex_before_uniform(
    PipelineStage::VERTEX,
    ResourceAccess::ReadOnly,
    ResourceUsage::Buffer(BufferUsage::VERTEX | BufferUsage::UNIFORM),
    AccessFlags::VERTEX_ATTRIBUTE_READ
)]
#[case::storage_read_write(
    PipelineStage::COMPUTE,
    ResourceAccess::ReadWrite,
    ResourceUsage::Buffer(BufferUsage::STORAGE),
    AccessFlags::SHADER_READ | AccessFlags::SHADER_WRITE
)]
#[case::color_attachment_write(
    PipelineStage::ATTACHMENT_OUTPUT,
    ResourceAccess::WriteOnly,
    ResourceUsage::Texture(TextureUsage::COLOR_ATTACHMENT),
    AccessFlags::COLOR_ATTACHMENT_WRITE
)]
#[case::depth_attachment_read(
    PipelineStage::LATE_FRAGMENT_TEST,
    ResourceAccess::ReadOnly,
    ResourceUsage::Texture(TextureUsage::DEPTH_STENCIL_ATTACHMENT),
    AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
)]
#[case::attachment_stage_without_usage(
    PipelineStage::ATTACHMENT_OUTPUT,
    ResourceAccess::WriteOnly,
    ResourceUsage::Texture(TextureUsage::TEXTURE_BINDING),
    AccessFlags::MEMORY_WRITE
)]
#[case::present_counts_as_shader_stage(
    PipelineStage::PRESENT,
    ResourceAccess::ReadOnly,
    ResourceUsage::Texture(TextureUsage::COLOR_ATTACHMENT),
    AccessFlags::SHADER_READ
)]
fn test_access_rule_order(
    #[case] stage: PipelineStage,
    #[case] access: ResourceAccess,
    #[case] usage: ResourceUsage,
    #[case] expected: AccessFlags,
) {
    assert_eq!(resolve_access(stage, access, usage), expected);
}

#[rstest]
#[case::copy_src_wins(
    PipelineStage::TRANSFER,
    TextureUsage::COPY_SRC | TextureUsage::COPY_DST,
    TextureLayout::TransferSrc
)]
#[case::copy_dst(PipelineStage::TRANSFER, TextureUsage::COPY_DST, TextureLayout::TransferDst)]
#[case::color(
    PipelineStage::ATTACHMENT_OUTPUT,
    TextureUsage::COLOR_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    TextureLayout::ColorAttachment
)]
#[case::depth(
    PipelineStage::LATE_FRAGMENT_TEST,
    TextureUsage::DEPTH_STENCIL_ATTACHMENT,
    TextureLayout::DepthStencilAttachment
)]
#[case::sampled_before_storage(
    PipelineStage::COMPUTE,
    TextureUsage::TEXTURE_BINDING | TextureUsage::STORAGE_BINDING,
    TextureLayout::ShaderReadOnly
)]
#[case::storage(PipelineStage::COMPUTE, TextureUsage::STORAGE_BINDING, TextureLayout::General)]
#[case::transfer_without_copy_usage(
    PipelineStage::TRANSFER,
    TextureUsage::TEXTURE_BINDING,
    TextureLayout::ShaderReadOnly
)]
fn test_layout_rule_order(
    #[case] stage: PipelineStage,
    #[case] usage: TextureUsage,
    #[case] expected: TextureLayout,
) {
    assert_eq!(resolve_texture_layout(stage, usage), expected);
}

// ============================================================================
// Tracker
// ============================================================================

/// First access registers, second matching access emits and transitions.
#[test]
fn test_texture_layout_changes_only_on_second_access() {
    let ctx = TestContext::new(HazardPolicy::ExactMatch);
    let view = ctx.create_view(
        32,
        32,
        TextureFormat::Rgba8Unorm,
        TextureUsage::TEXTURE_BINDING,
    );
    let mut tracker = BarrierTracker::new(HazardPolicy::ExactMatch);
    let mut barriers: Vec<Barrier> = Vec::new();

    let emitted = tracker.record_texture_barrier(
        &mut barriers,
        &view,
        TextureState::SampledBinding,
        PipelineStage::FRAGMENT,
        ResourceAccess::ReadOnly,
    );
    assert!(!emitted);
    assert!(barriers.is_empty());
    assert_eq!(view.texture().layout(), TextureLayout::Undefined);

    let emitted = tracker.record_texture_barrier(
        &mut barriers,
        &view,
        TextureState::SampledBinding,
        PipelineStage::FRAGMENT,
        ResourceAccess::ReadOnly,
    );
    assert!(emitted);
    assert_eq!(barriers.len(), 1);
    assert_eq!(view.texture().layout(), TextureLayout::ShaderReadOnly);

    let Barrier::Texture(barrier) = &barriers[0] else {
        panic!("expected a texture barrier, got {:?}", barriers[0]);
    };
    assert_eq!(barrier.old_layout, TextureLayout::Undefined);
    assert_eq!(barrier.new_layout, TextureLayout::ShaderReadOnly);
    assert_eq!(barrier.src_access_mask(), AccessFlags::SHADER_READ);
    assert_eq!(barrier.dst_access_mask(), AccessFlags::SHADER_READ);
    assert_eq!(tracker.texture_state_count(), 1);
}

/// Views of one texture share its hazard domain.
#[test]
fn test_views_share_texture_domain() {
    let ctx = TestContext::new(HazardPolicy::ExactMatch);
    let whole = ctx.create_view(
        64,
        64,
        TextureFormat::Rgba8Unorm,
        TextureUsage::STORAGE_BINDING,
    );
    let top_mip = whole
        .texture()
        .create_view(&TextureViewDescriptor::new().with_mip_range(0, 1))
        .unwrap();
    assert_ne!(whole.id(), top_mip.id());

    let mut tracker = BarrierTracker::new(HazardPolicy::ExactMatch);
    let mut barriers: Vec<Barrier> = Vec::new();
    for view in [&whole, &top_mip] {
        tracker.record_texture_barrier(
            &mut barriers,
            view,
            TextureState::StorageBinding,
            PipelineStage::COMPUTE,
            ResourceAccess::WriteOnly,
        );
    }

    assert_eq!(barriers.len(), 1);
    assert_eq!(tracker.texture_state_count(), 1);
}

/// Read-after-read in an unchanged layout is the only repeat the
/// any-prior-access policy lets through.
#[rstest]
#[case::read_after_read(ResourceAccess::ReadOnly, ResourceAccess::ReadOnly, false)]
#[case::read_after_write(ResourceAccess::WriteOnly, ResourceAccess::ReadOnly, true)]
#[case::write_after_read(ResourceAccess::ReadOnly, ResourceAccess::WriteOnly, true)]
#[case::read_write_after_read(ResourceAccess::ReadOnly, ResourceAccess::ReadWrite, true)]
fn test_any_prior_access_buffer_hazards(
    #[case] first: ResourceAccess,
    #[case] second: ResourceAccess,
    #[case] expected: bool,
) {
    let ctx = TestContext::new(HazardPolicy::AnyPriorAccess);
    let range = ctx.transfer_range(128);
    let mut tracker = BarrierTracker::new(HazardPolicy::AnyPriorAccess);
    let mut barriers: Vec<Barrier> = Vec::new();

    assert!(!tracker.record_buffer_barrier(&mut barriers, &range, PipelineStage::COMPUTE, first));
    assert_eq!(
        tracker.record_buffer_barrier(&mut barriers, &range, PipelineStage::VERTEX, second),
        expected
    );
    assert_eq!(barriers.len(), usize::from(expected));
    assert_eq!(tracker.buffer_state_count(), 1);
}

/// A layout change forces a barrier even between two reads.
#[test]
fn test_any_prior_access_layout_change() {
    let ctx = TestContext::new(HazardPolicy::AnyPriorAccess);
    let view = ctx.create_view(
        8,
        8,
        TextureFormat::Rgba8Unorm,
        TextureUsage::COPY_SRC | TextureUsage::TEXTURE_BINDING,
    );
    let mut tracker = BarrierTracker::new(HazardPolicy::AnyPriorAccess);
    let mut barriers: Vec<Barrier> = Vec::new();

    tracker.record_texture_barrier(
        &mut barriers,
        &view,
        TextureState::CopySrc,
        PipelineStage::TRANSFER,
        ResourceAccess::ReadOnly,
    );
    assert!(tracker.record_texture_barrier(
        &mut barriers,
        &view,
        TextureState::SampledBinding,
        PipelineStage::FRAGMENT,
        ResourceAccess::ReadOnly,
    ));
    assert_eq!(view.texture().layout(), TextureLayout::ShaderReadOnly);

    // Same layout, both reads: nothing to do.
    assert!(!tracker.record_texture_barrier(
        &mut barriers,
        &view,
        TextureState::SampledBinding,
        PipelineStage::COMPUTE,
        ResourceAccess::ReadOnly,
    ));
    assert_eq!(barriers.len(), 1);
}

#[test]
fn test_reset_forgets_states() {
    let ctx = TestContext::new(HazardPolicy::ExactMatch);
    let range = ctx.transfer_range(64);
    let mut tracker = BarrierTracker::new(HazardPolicy::ExactMatch);
    let mut barriers: Vec<Barrier> = Vec::new();

    tracker.record_buffer_barrier(
        &mut barriers,
        &range,
        PipelineStage::TRANSFER,
        ResourceAccess::WriteOnly,
    );
    tracker.reset();
    assert_eq!(tracker.buffer_state_count(), 0);

    // After a reset the next access is a first touch again.
    assert!(!tracker.record_buffer_barrier(
        &mut barriers,
        &range,
        PipelineStage::TRANSFER,
        ResourceAccess::WriteOnly,
    ));
    assert!(barriers.is_empty());
}
