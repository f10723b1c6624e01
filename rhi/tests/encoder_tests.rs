//! Command encoder integration tests.
//!
//! These tests drive the full record → finish path on the dummy backend and
//! inspect the native calls it captured.
//!
//! # Test Categories
//!
//! - **Repeated Access Tests**: barrier counts for repeated and changing
//!   accesses under both hazard policies
//! - **Render Pass Tests**: framebuffer and clear-value plumbing
//! - **Protocol Tests**: encoder lifecycle and pass-scope violations

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::TestContext;
use redlilium_rhi::{
    AccessFlags, BufferInfo, BufferUsage, DispatchCommand, DrawCommand, EncoderState,
    GraphicsError, HazardPolicy, PipelineStage, RecordedCommand, ResourceAccess, TextureFormat,
    TextureLayout, TextureState, TextureUsage,
};

/// Variant names of the recorded native calls, in order.
fn command_names(commands: &[RecordedCommand]) -> Vec<&'static str> {
    commands
        .iter()
        .map(|command| match command {
            RecordedCommand::BufferBarrier { .. } => "BufferBarrier",
            RecordedCommand::TextureBarrier { .. } => "TextureBarrier",
            RecordedCommand::BeginRenderPass { .. } => "BeginRenderPass",
            RecordedCommand::EndRenderPass => "EndRenderPass",
            RecordedCommand::BindPipeline { .. } => "BindPipeline",
            RecordedCommand::FillBuffer { .. } => "FillBuffer",
            RecordedCommand::CopyBufferToBuffer { .. } => "CopyBufferToBuffer",
            RecordedCommand::CopyBufferToTexture { .. } => "CopyBufferToTexture",
            RecordedCommand::CopyTextureToBuffer { .. } => "CopyTextureToBuffer",
            RecordedCommand::CopyTextureToTexture { .. } => "CopyTextureToTexture",
            RecordedCommand::Dispatch { .. } => "Dispatch",
            RecordedCommand::Draw { .. } => "Draw",
            RecordedCommand::DrawIndexed { .. } => "DrawIndexed",
        })
        .collect()
}

// ============================================================================
// Repeated Access Tests
// ============================================================================

/// Repeating one (stage, access) on a range emits one barrier per repeat.
#[rstest]
#[case::twice(2)]
#[case::three_times(3)]
#[case::eight_times(8)]
fn test_repeated_fill_emits_one_barrier_per_repeat(
    #[case] repeats: usize,
    #[values(HazardPolicy::ExactMatch, HazardPolicy::AnyPriorAccess)] policy: HazardPolicy,
) {
    let ctx = TestContext::new(policy);
    let range = ctx.transfer_range(256);

    let mut encoder = ctx.device.create_command_encoder(Some("fill")).unwrap();
    for value in 0..repeats {
        encoder.fill_buffer(range.clone(), value as u32).unwrap();
    }
    let commands = encoder.finish().unwrap();

    assert_eq!(commands.stats().buffer_barriers, repeats - 1);
    assert_eq!(commands.stats().items_executed, repeats);
    assert_eq!(encoder.tracker().buffer_state_count(), 1);

    let barriers: Vec<_> = commands
        .recorded_commands()
        .unwrap()
        .iter()
        .filter_map(|command| match command {
            RecordedCommand::BufferBarrier {
                buffer,
                src_stage,
                src_access,
                dst_stage,
                dst_access,
                ..
            } => Some((*buffer, *src_stage, *src_access, *dst_stage, *dst_access)),
            _ => None,
        })
        .collect();
    assert_eq!(barriers.len(), repeats - 1);
    for barrier in barriers {
        assert_eq!(
            barrier,
            (
                range.buffer().id(),
                PipelineStage::TRANSFER,
                AccessFlags::TRANSFER_WRITE,
                PipelineStage::TRANSFER,
                AccessFlags::TRANSFER_WRITE,
            )
        );
    }
}

/// Barriers are emitted right before the item whose access needs them.
#[test]
fn test_barrier_precedes_second_fill() {
    let ctx = TestContext::new(HazardPolicy::ExactMatch);
    let range = ctx.transfer_range(64);

    let mut encoder = ctx.device.create_command_encoder(None).unwrap();
    encoder.fill_buffer(range.clone(), 1).unwrap();
    encoder.fill_buffer(range, 2).unwrap();
    let commands = encoder.finish().unwrap();

    let order: Vec<&str> = commands
        .recorded_commands()
        .unwrap()
        .iter()
        .map(|command| match command {
            RecordedCommand::FillBuffer { .. } => "fill",
            RecordedCommand::BufferBarrier { .. } => "barrier",
            _ => "other",
        })
        .collect();
    assert_eq!(order, ["fill", "barrier", "fill"]);
}

/// A write followed by a read at another stage.
///
/// The exact-match predicate only registers the new access; the
/// any-prior-access policy synchronizes it.
#[rstest]
#[case::exact_match(HazardPolicy::ExactMatch, 0)]
#[case::any_prior_access(HazardPolicy::AnyPriorAccess, 1)]
fn test_write_then_read_at_other_stage(#[case] policy: HazardPolicy, #[case] expected: usize) {
    let ctx = TestContext::new(policy);
    let range = BufferInfo::whole(
        ctx.create_buffer(256, BufferUsage::COPY_DST | BufferUsage::STORAGE),
    );

    let mut encoder = ctx.device.create_command_encoder(None).unwrap();
    encoder.fill_buffer(range.clone(), 0).unwrap();
    encoder
        .dispatch(DispatchCommand::new(4, 1, 1).with_buffer(range.clone(), ResourceAccess::ReadOnly))
        .unwrap();
    let commands = encoder.finish().unwrap();

    assert_eq!(commands.stats().buffer_barriers, expected);

    // Either way the tracker now holds the compute read.
    let states = encoder.tracker().buffer_states();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].buffer, range);
    assert_eq!(states[0].stage, PipelineStage::COMPUTE);
    assert_eq!(states[0].access, ResourceAccess::ReadOnly);
}

/// Copying the same source twice: read-after-read only synchronizes under
/// the exact-match predicate, the destination write-after-write under both.
#[rstest]
#[case::exact_match(HazardPolicy::ExactMatch, 2)]
#[case::any_prior_access(HazardPolicy::AnyPriorAccess, 1)]
fn test_repeated_copy(#[case] policy: HazardPolicy, #[case] expected: usize) {
    let ctx = TestContext::new(policy);
    let src = ctx.transfer_range(128);
    let dst = ctx.transfer_range(128);

    let mut encoder = ctx.device.create_command_encoder(None).unwrap();
    encoder.copy_buffer_to_buffer(src.clone(), dst.clone()).unwrap();
    encoder.copy_buffer_to_buffer(src, dst).unwrap();
    let commands = encoder.finish().unwrap();

    assert_eq!(commands.stats().buffer_barriers, expected);
    assert_eq!(encoder.tracker().buffer_state_count(), 2);
}

/// Overlapping but unequal ranges are separate hazard domains.
#[test]
fn test_unequal_ranges_are_distinct_domains() {
    let ctx = TestContext::new(HazardPolicy::AnyPriorAccess);
    let buffer = ctx.create_buffer(256, BufferUsage::COPY_DST);

    let mut encoder = ctx.device.create_command_encoder(None).unwrap();
    encoder
        .fill_buffer(BufferInfo::new(Arc::clone(&buffer), 0, 128), 0)
        .unwrap();
    encoder
        .fill_buffer(BufferInfo::new(Arc::clone(&buffer), 64, 128), 0)
        .unwrap();
    encoder.fill_buffer(BufferInfo::whole(buffer), 0).unwrap();
    let commands = encoder.finish().unwrap();

    assert_eq!(commands.stats().buffer_barriers, 0);
    assert_eq!(encoder.tracker().buffer_state_count(), 3);
}

/// Walk the recorded native calls and check that every texture barrier
/// starts from the layout the previous one left, and that every upload
/// addresses the texture in a layout a copy destination may use.
fn assert_uploads_match_layouts(commands: &[RecordedCommand]) {
    let mut layout = TextureLayout::Undefined;
    for command in commands {
        match command {
            RecordedCommand::TextureBarrier {
                old_layout,
                new_layout,
                ..
            } => {
                assert_eq!(*old_layout, layout, "barrier starts from a stale layout");
                layout = *new_layout;
            }
            RecordedCommand::CopyBufferToTexture { .. } => {
                assert!(
                    matches!(layout, TextureLayout::TransferDst | TextureLayout::General),
                    "upload recorded while the texture is {:?}",
                    layout
                );
            }
            _ => {}
        }
    }
}

/// Uploading twice into one texture keeps copies and barriers in agreement.
///
/// With `COPY_SRC` usage the tracker moves the texture to the transfer-source
/// layout on the second upload, so the copy moves it back first.
#[rstest]
#[case::copy_dst_only(TextureUsage::COPY_DST, 1)]
#[case::copy_src_and_dst(TextureUsage::COPY_SRC | TextureUsage::COPY_DST, 2)]
fn test_repeated_texture_upload_transitions_layout(
    #[case] usage: TextureUsage,
    #[case] expected_transitions: usize,
    #[values(HazardPolicy::ExactMatch, HazardPolicy::AnyPriorAccess)] policy: HazardPolicy,
) {
    let ctx = TestContext::new(policy);
    let staging = ctx.transfer_range(4 * 4 * 4);
    let view = ctx.create_view(4, 4, TextureFormat::Rgba8Unorm, usage);

    let mut encoder = ctx.device.create_command_encoder(None).unwrap();
    encoder.copy_buffer_to_texture(staging.clone(), &view).unwrap();
    encoder.copy_buffer_to_texture(staging, &view).unwrap();
    let commands = encoder.finish().unwrap();

    assert_eq!(commands.stats().texture_barriers, 1);
    assert_eq!(commands.stats().layout_transitions, expected_transitions);
    assert_eq!(view.texture().layout(), TextureLayout::TransferDst);

    let recorded = commands.recorded_commands().unwrap();
    assert_uploads_match_layouts(recorded);

    // The first upload into a fresh texture leaves the undefined layout.
    let first = recorded.iter().find_map(|command| match command {
        RecordedCommand::TextureBarrier {
            texture,
            old_layout,
            new_layout,
            dst_access,
            ..
        } => Some((*texture, *old_layout, *new_layout, *dst_access)),
        _ => None,
    });
    assert_eq!(
        first,
        Some((
            view.texture().id(),
            TextureLayout::Undefined,
            TextureLayout::TransferDst,
            AccessFlags::TRANSFER_WRITE,
        ))
    );
}

/// Reading back a texture after uploading into it moves it to the
/// transfer-source layout before the copy.
#[test]
fn test_readback_after_upload_uses_source_layout() {
    let ctx = TestContext::new(HazardPolicy::ExactMatch);
    let staging = ctx.transfer_range(8 * 8 * 4);
    let readback = ctx.transfer_range(8 * 8 * 4);
    let view = ctx.create_view(
        8,
        8,
        TextureFormat::Rgba8Unorm,
        TextureUsage::COPY_SRC | TextureUsage::COPY_DST,
    );

    let mut encoder = ctx.device.create_command_encoder(None).unwrap();
    encoder.copy_buffer_to_texture(staging, &view).unwrap();
    encoder.copy_texture_to_buffer(&view, readback).unwrap();
    let commands = encoder.finish().unwrap();

    let order: Vec<_> = commands
        .recorded_commands()
        .unwrap()
        .iter()
        .filter_map(|command| match command {
            RecordedCommand::TextureBarrier {
                old_layout,
                new_layout,
                ..
            } => Some(format!("{:?}->{:?}", old_layout, new_layout)),
            RecordedCommand::CopyBufferToTexture { .. } => Some("upload".to_string()),
            RecordedCommand::CopyTextureToBuffer { .. } => Some("readback".to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(
        order,
        [
            "Undefined->TransferDst",
            "upload",
            "TransferDst->TransferSrc",
            "readback"
        ]
    );
    assert_eq!(view.texture().layout(), TextureLayout::TransferSrc);
}

/// Storage textures written twice by compute go through the general layout.
#[test]
fn test_repeated_storage_write_uses_general_layout() {
    let ctx = TestContext::new(HazardPolicy::ExactMatch);
    let view = ctx.create_view(16, 16, TextureFormat::R32Float, TextureUsage::STORAGE_BINDING);

    let mut encoder = ctx.device.create_command_encoder(None).unwrap();
    for _ in 0..2 {
        encoder
            .dispatch(DispatchCommand::new(2, 2, 1).with_texture(
                Arc::clone(&view),
                TextureState::StorageBinding,
                ResourceAccess::ReadWrite,
            ))
            .unwrap();
    }
    let commands = encoder.finish().unwrap();

    assert_eq!(commands.stats().texture_barriers, 1);
    assert_eq!(view.texture().layout(), TextureLayout::General);
    assert_eq!(encoder.tracker().texture_states()[0].state, TextureState::StorageBinding);
}

// ============================================================================
// Render Pass Tests
// ============================================================================

/// Begin-pass with one color attachment, then finish.
#[test]
fn test_render_pass_round_trip() {
    let ctx = TestContext::new(HazardPolicy::ExactMatch);
    let graph = ctx.single_color_graph(TextureFormat::Rgba8Unorm);
    let target = ctx.create_view(
        64,
        32,
        TextureFormat::Rgba8Unorm,
        TextureUsage::COLOR_ATTACHMENT,
    );

    let mut encoder = ctx.device.create_command_encoder(Some("pass")).unwrap();
    encoder
        .begin_render_pass(&graph, 0, &[Arc::clone(&target)], None)
        .unwrap();
    let commands = encoder.finish().unwrap();

    assert_eq!(commands.stats().buffer_barriers, 0);
    assert_eq!(commands.stats().texture_barriers, 0);

    let list = commands.as_dummy().unwrap();
    assert_eq!(list.framebuffers().len(), 1);
    assert_eq!(list.framebuffers()[0].attachment_count(), 1);
    assert_eq!(list.framebuffers()[0].width, 64);
    assert_eq!(list.framebuffers()[0].height, 32);

    let begin = list.commands().iter().find_map(|command| match command {
        RecordedCommand::BeginRenderPass {
            pass_index,
            framebuffer,
            clear_value_count,
            ..
        } => Some((*pass_index, *framebuffer, *clear_value_count)),
        _ => None,
    });
    assert_eq!(begin, Some((0, 0, 1)));

    // The open pass was closed by finish.
    assert!(matches!(
        list.commands().last(),
        Some(RecordedCommand::EndRenderPass)
    ));
    assert_eq!(target.texture().layout(), TextureLayout::ColorAttachment);
}

/// Drawing twice from one vertex buffer inside a pass.
#[test]
fn test_draw_inside_pass() {
    let ctx = TestContext::new(HazardPolicy::ExactMatch);
    let graph = ctx.single_color_graph(TextureFormat::Bgra8Unorm);
    let target = ctx.create_view(
        16,
        16,
        TextureFormat::Bgra8Unorm,
        TextureUsage::COLOR_ATTACHMENT,
    );
    let vertices = BufferInfo::whole(ctx.create_buffer(3 * 16, BufferUsage::VERTEX));

    let mut encoder = ctx.device.create_command_encoder(None).unwrap();
    encoder.begin_render_pass(&graph, 0, &[target], None).unwrap();
    encoder.bind_pipeline(&graph, 0, 0).unwrap();
    for _ in 0..2 {
        encoder
            .draw(DrawCommand::new(0..3).with_vertex_buffer(vertices.clone()))
            .unwrap();
    }
    encoder.end_render_pass().unwrap();
    let commands = encoder.finish().unwrap();

    assert_eq!(commands.stats().items_executed, 5);
    assert_eq!(commands.stats().buffer_barriers, 1);

    let recorded = commands.recorded_commands().unwrap();
    let barrier_access = recorded.iter().find_map(|command| match command {
        RecordedCommand::BufferBarrier { dst_access, .. } => Some(*dst_access),
        _ => None,
    });
    assert_eq!(barrier_access, Some(AccessFlags::VERTEX_ATTRIBUTE_READ));

    // Barriers of the pass's draws are recorded before the pass begins.
    assert_eq!(
        command_names(recorded),
        [
            "BufferBarrier",
            "BeginRenderPass",
            "BindPipeline",
            "Draw",
            "Draw",
            "EndRenderPass"
        ]
    );
}

/// A vertex buffer filled before the pass is synchronized ahead of it.
#[rstest]
#[case::exact_match(HazardPolicy::ExactMatch, 0)]
#[case::any_prior_access(HazardPolicy::AnyPriorAccess, 1)]
fn test_upload_then_draw_synchronizes_before_pass(
    #[case] policy: HazardPolicy,
    #[case] expected: usize,
) {
    let ctx = TestContext::new(policy);
    let graph = ctx.single_color_graph(TextureFormat::Rgba8Unorm);
    let target = ctx.create_view(
        8,
        8,
        TextureFormat::Rgba8Unorm,
        TextureUsage::COLOR_ATTACHMENT,
    );
    let vertices = BufferInfo::whole(
        ctx.create_buffer(3 * 16, BufferUsage::COPY_DST | BufferUsage::VERTEX),
    );

    let mut encoder = ctx.device.create_command_encoder(None).unwrap();
    encoder.fill_buffer(vertices.clone(), 0).unwrap();
    encoder.begin_render_pass(&graph, 0, &[target], None).unwrap();
    encoder
        .draw(DrawCommand::new(0..3).with_vertex_buffer(vertices))
        .unwrap();
    let commands = encoder.finish().unwrap();

    assert_eq!(commands.stats().buffer_barriers, expected);

    let recorded = commands.recorded_commands().unwrap();
    let names = command_names(recorded);
    let begin = names.iter().position(|name| *name == "BeginRenderPass").unwrap();
    assert!(names[begin..].iter().all(|name| *name != "BufferBarrier"));

    if let Some(RecordedCommand::BufferBarrier {
        src_access,
        dst_access,
        ..
    }) = recorded
        .iter()
        .find(|command| matches!(command, RecordedCommand::BufferBarrier { .. }))
    {
        assert_eq!(*src_access, AccessFlags::TRANSFER_WRITE);
        assert_eq!(*dst_access, AccessFlags::VERTEX_ATTRIBUTE_READ);
    }
}

/// Attachments that do not match the pass are rejected at record time.
#[rstest]
#[case::wrong_format(TextureFormat::Rgba16Float, TextureUsage::COLOR_ATTACHMENT)]
#[case::missing_usage(TextureFormat::Rgba8Unorm, TextureUsage::TEXTURE_BINDING)]
fn test_mismatched_attachment_rejected(
    #[case] format: TextureFormat,
    #[case] usage: TextureUsage,
) {
    let ctx = TestContext::new(HazardPolicy::ExactMatch);
    let graph = ctx.single_color_graph(TextureFormat::Rgba8Unorm);
    let target = ctx.create_view(8, 8, format, usage);

    let mut encoder = ctx.device.create_command_encoder(None).unwrap();
    let result = encoder.begin_render_pass(&graph, 0, &[target], None);

    assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
    assert!(!encoder.is_render_pass_open());
}

// ============================================================================
// Protocol Tests
// ============================================================================

#[test]
fn test_finish_twice_is_protocol_violation() {
    let ctx = TestContext::new(HazardPolicy::ExactMatch);
    let mut encoder = ctx.device.create_command_encoder(None).unwrap();

    assert!(encoder.finish().is_ok());
    assert_eq!(encoder.state(), EncoderState::Ended);
    assert!(matches!(
        encoder.finish(),
        Err(GraphicsError::ProtocolViolation(_))
    ));
}

#[test]
fn test_record_after_finish_is_protocol_violation() {
    let ctx = TestContext::new(HazardPolicy::ExactMatch);
    let range = ctx.transfer_range(64);
    let mut encoder = ctx.device.create_command_encoder(None).unwrap();
    encoder.finish().unwrap();

    assert!(matches!(
        encoder.fill_buffer(range, 0),
        Err(GraphicsError::ProtocolViolation(_))
    ));
    assert_eq!(encoder.item_count(), 0);
}

/// Dispatch buffers need a usage a shader can bind them with.
#[rstest]
#[case::storage(BufferUsage::STORAGE, true)]
#[case::uniform(BufferUsage::UNIFORM, true)]
#[case::copy_only(BufferUsage::COPY_SRC | BufferUsage::COPY_DST, false)]
#[case::vertex(BufferUsage::VERTEX, false)]
fn test_dispatch_buffer_usage(#[case] usage: BufferUsage, #[case] accepted: bool) {
    let ctx = TestContext::new(HazardPolicy::ExactMatch);
    let range = BufferInfo::whole(ctx.create_buffer(64, usage));

    let mut encoder = ctx.device.create_command_encoder(None).unwrap();
    let result = encoder
        .dispatch(DispatchCommand::new(1, 1, 1).with_buffer(range, ResourceAccess::ReadOnly));

    if accepted {
        assert!(result.is_ok());
    } else {
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
        assert_eq!(encoder.item_count(), 0);
    }
}

/// Dispatch textures need the usage matching the state they are bound in.
#[rstest]
#[case::storage(
    TextureUsage::STORAGE_BINDING,
    TextureState::StorageBinding,
    ResourceAccess::ReadWrite,
    true
)]
#[case::sampled(
    TextureUsage::TEXTURE_BINDING,
    TextureState::SampledBinding,
    ResourceAccess::ReadOnly,
    true
)]
#[case::storage_without_usage(
    TextureUsage::TEXTURE_BINDING,
    TextureState::StorageBinding,
    ResourceAccess::WriteOnly,
    false
)]
#[case::sampled_without_usage(
    TextureUsage::STORAGE_BINDING,
    TextureState::SampledBinding,
    ResourceAccess::ReadOnly,
    false
)]
#[case::sampled_write(
    TextureUsage::TEXTURE_BINDING,
    TextureState::SampledBinding,
    ResourceAccess::WriteOnly,
    false
)]
#[case::attachment_state(
    TextureUsage::COLOR_ATTACHMENT | TextureUsage::STORAGE_BINDING,
    TextureState::ColorAttachment,
    ResourceAccess::WriteOnly,
    false
)]
fn test_dispatch_texture_usage(
    #[case] usage: TextureUsage,
    #[case] state: TextureState,
    #[case] access: ResourceAccess,
    #[case] accepted: bool,
) {
    let ctx = TestContext::new(HazardPolicy::ExactMatch);
    let view = ctx.create_view(8, 8, TextureFormat::Rgba8Unorm, usage);

    let mut encoder = ctx.device.create_command_encoder(None).unwrap();
    let result = encoder.dispatch(DispatchCommand::new(1, 1, 1).with_texture(view, state, access));

    if accepted {
        assert!(result.is_ok());
    } else {
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
        assert_eq!(encoder.item_count(), 0);
    }
}

#[test]
fn test_pass_scope_violations() {
    let ctx = TestContext::new(HazardPolicy::ExactMatch);
    let graph = ctx.single_color_graph(TextureFormat::Rgba8Unorm);
    let target = ctx.create_view(
        8,
        8,
        TextureFormat::Rgba8Unorm,
        TextureUsage::COLOR_ATTACHMENT,
    );
    let vertices = BufferInfo::whole(ctx.create_buffer(64, BufferUsage::VERTEX));
    let range = ctx.transfer_range(64);

    let mut encoder = ctx.device.create_command_encoder(None).unwrap();
    assert!(matches!(
        encoder.draw(DrawCommand::new(0..3).with_vertex_buffer(vertices)),
        Err(GraphicsError::ProtocolViolation(_))
    ));
    assert!(matches!(
        encoder.end_render_pass(),
        Err(GraphicsError::ProtocolViolation(_))
    ));

    encoder
        .begin_render_pass(&graph, 0, &[Arc::clone(&target)], None)
        .unwrap();
    assert!(matches!(
        encoder.fill_buffer(range, 0),
        Err(GraphicsError::ProtocolViolation(_))
    ));
    assert!(matches!(
        encoder.begin_render_pass(&graph, 0, &[target], None),
        Err(GraphicsError::ProtocolViolation(_))
    ));
    assert!(matches!(
        encoder.bind_pipeline(&graph, 0, 1),
        Err(GraphicsError::ProtocolViolation(_))
    ));
    assert_eq!(encoder.item_count(), 1);
}

#[test]
fn test_out_of_range_pass_is_protocol_violation() {
    let ctx = TestContext::new(HazardPolicy::ExactMatch);
    let graph = ctx.single_color_graph(TextureFormat::Rgba8Unorm);

    let mut encoder = ctx.device.create_command_encoder(None).unwrap();
    assert!(matches!(
        encoder.begin_render_pass(&graph, 1, &[], None),
        Err(GraphicsError::ProtocolViolation(_))
    ));
}

#[test]
fn test_foreign_resource_is_protocol_violation() {
    let ctx = TestContext::new(HazardPolicy::ExactMatch);
    let other = TestContext::new(HazardPolicy::ExactMatch);
    let foreign = other.transfer_range(64);

    let mut encoder = ctx.device.create_command_encoder(None).unwrap();
    assert!(matches!(
        encoder.fill_buffer(foreign, 0),
        Err(GraphicsError::ProtocolViolation(_))
    ));
}

/// A resource whose device is gone never passes for one of a newer device.
#[test]
fn test_resource_of_dropped_device_is_protocol_violation() {
    let stale = {
        let old = TestContext::new(HazardPolicy::ExactMatch);
        old.transfer_range(64)
    };
    assert!(stale.buffer().device().is_none());

    let ctx = TestContext::new(HazardPolicy::ExactMatch);
    let mut encoder = ctx.device.create_command_encoder(None).unwrap();
    assert!(matches!(
        encoder.fill_buffer(stale, 0),
        Err(GraphicsError::ProtocolViolation(_))
    ));
    assert_eq!(encoder.item_count(), 0);
}
