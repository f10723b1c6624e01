//! Access and layout resolution.
//!
//! Translates a declared `(stage, access, usage)` triple into backend-neutral
//! access flags and, for textures, the layout the texture must be in. Both
//! tables are ordered: the first matching rule wins, and several rules
//! overlap, so the order below is part of the contract. A backend converts
//! the results into its native masks at translation time.

use bitflags::bitflags;

use crate::state::{PipelineStage, ResourceAccess};
use crate::types::{BufferUsage, TextureUsage};

bitflags! {
    /// Backend-neutral memory access flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const INDIRECT_COMMAND_READ = 1 << 0;
        const INDEX_READ = 1 << 1;
        const VERTEX_ATTRIBUTE_READ = 1 << 2;
        const UNIFORM_READ = 1 << 3;
        const SHADER_READ = 1 << 4;
        const SHADER_WRITE = 1 << 5;
        const COLOR_ATTACHMENT_READ = 1 << 6;
        const COLOR_ATTACHMENT_WRITE = 1 << 7;
        const DEPTH_STENCIL_ATTACHMENT_READ = 1 << 8;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 9;
        const TRANSFER_READ = 1 << 10;
        const TRANSFER_WRITE = 1 << 11;
        const MEMORY_READ = 1 << 12;
        const MEMORY_WRITE = 1 << 13;
    }
}

/// Physical arrangement a texture is resident in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureLayout {
    /// Initial state, contents undefined.
    #[default]
    Undefined,
    /// General layout (least optimal but most flexible).
    General,
    /// Optimal for color attachment writes.
    ColorAttachment,
    /// Optimal for depth/stencil attachment writes.
    DepthStencilAttachment,
    /// Optimal for shader sampling.
    ShaderReadOnly,
    /// Optimal for transfer source operations.
    TransferSrc,
    /// Optimal for transfer destination operations.
    TransferDst,
    /// Optimal for presentation.
    PresentSrc,
}

/// Usage flags of the resource an access is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceUsage {
    Buffer(BufferUsage),
    Texture(TextureUsage),
}

/// Pick `read`, `write` or both according to `access`.
fn by_access(access: ResourceAccess, read: AccessFlags, write: AccessFlags) -> AccessFlags {
    match access {
        ResourceAccess::ReadOnly => read,
        ResourceAccess::WriteOnly => write,
        ResourceAccess::ReadWrite => read | write,
    }
}

/// A programmable shader stage: anything that is not transfer,
/// attachment output or late fragment test.
fn is_shader_stage(stage: PipelineStage) -> bool {
    !stage.is_empty()
        && !stage.intersects(
            PipelineStage::TRANSFER
                | PipelineStage::ATTACHMENT_OUTPUT
                | PipelineStage::LATE_FRAGMENT_TEST,
        )
}

/// Resolve the access flags for an access on a resource.
///
/// Rules, first match wins:
/// 1. transfer stage: transfer read/write
/// 2. buffers at the vertex stage: vertex attribute, index or indirect read
///    by usage
/// 3. uniform buffers: uniform read
/// 4. color attachments at the attachment-output stage
/// 5. depth/stencil attachments at the late-fragment-test stage
/// 6. shader stages: shader read/write
/// 7. otherwise: memory read/write
pub fn resolve_access(
    stage: PipelineStage,
    access: ResourceAccess,
    usage: ResourceUsage,
) -> AccessFlags {
    if stage.contains(PipelineStage::TRANSFER) {
        return by_access(access, AccessFlags::TRANSFER_READ, AccessFlags::TRANSFER_WRITE);
    }

    if let ResourceUsage::Buffer(usage) = usage {
        if stage.contains(PipelineStage::VERTEX) {
            if usage.contains(BufferUsage::VERTEX) {
                return AccessFlags::VERTEX_ATTRIBUTE_READ;
            }
            if usage.contains(BufferUsage::INDEX) {
                return AccessFlags::INDEX_READ;
            }
            if usage.contains(BufferUsage::INDIRECT) {
                return AccessFlags::INDIRECT_COMMAND_READ;
            }
        }
        if usage.contains(BufferUsage::UNIFORM) {
            return AccessFlags::UNIFORM_READ;
        }
    }

    if let ResourceUsage::Texture(usage) = usage {
        if stage.contains(PipelineStage::ATTACHMENT_OUTPUT)
            && usage.contains(TextureUsage::COLOR_ATTACHMENT)
        {
            return by_access(
                access,
                AccessFlags::COLOR_ATTACHMENT_READ,
                AccessFlags::COLOR_ATTACHMENT_WRITE,
            );
        }
        if stage.contains(PipelineStage::LATE_FRAGMENT_TEST)
            && usage.contains(TextureUsage::DEPTH_STENCIL_ATTACHMENT)
        {
            return by_access(
                access,
                AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
                AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            );
        }
    }

    if is_shader_stage(stage) {
        return by_access(access, AccessFlags::SHADER_READ, AccessFlags::SHADER_WRITE);
    }

    by_access(access, AccessFlags::MEMORY_READ, AccessFlags::MEMORY_WRITE)
}

/// [`resolve_access`] for a buffer.
pub fn resolve_buffer_access(
    stage: PipelineStage,
    access: ResourceAccess,
    usage: BufferUsage,
) -> AccessFlags {
    resolve_access(stage, access, ResourceUsage::Buffer(usage))
}

/// [`resolve_access`] for a texture.
pub fn resolve_texture_access(
    stage: PipelineStage,
    access: ResourceAccess,
    usage: TextureUsage,
) -> AccessFlags {
    resolve_access(stage, access, ResourceUsage::Texture(usage))
}

/// Resolve the layout a texture must be in for an access at `stage`.
///
/// Rules, first match wins. The sampled and storage rules apply to any
/// stage that fell through the stage-specific rules above them.
pub fn resolve_texture_layout(stage: PipelineStage, usage: TextureUsage) -> TextureLayout {
    let transfer = stage.contains(PipelineStage::TRANSFER);

    if transfer && usage.contains(TextureUsage::COPY_SRC) {
        TextureLayout::TransferSrc
    } else if transfer && usage.contains(TextureUsage::COPY_DST) {
        TextureLayout::TransferDst
    } else if stage.contains(PipelineStage::ATTACHMENT_OUTPUT)
        && usage.contains(TextureUsage::COLOR_ATTACHMENT)
    {
        TextureLayout::ColorAttachment
    } else if stage.contains(PipelineStage::LATE_FRAGMENT_TEST)
        && usage.contains(TextureUsage::DEPTH_STENCIL_ATTACHMENT)
    {
        TextureLayout::DepthStencilAttachment
    } else if usage.contains(TextureUsage::TEXTURE_BINDING) {
        TextureLayout::ShaderReadOnly
    } else {
        // Storage-bound and everything else share the general layout.
        TextureLayout::General
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::buffer_vertex(ResourceUsage::Buffer(BufferUsage::VERTEX))]
    #[case::buffer_uniform(ResourceUsage::Buffer(BufferUsage::UNIFORM))]
    #[case::buffer_empty(ResourceUsage::Buffer(BufferUsage::empty()))]
    #[case::texture_color(ResourceUsage::Texture(TextureUsage::COLOR_ATTACHMENT))]
    #[case::texture_all(ResourceUsage::Texture(TextureUsage::all()))]
    fn test_transfer_read_ignores_usage(#[case] usage: ResourceUsage) {
        assert_eq!(
            resolve_access(PipelineStage::TRANSFER, ResourceAccess::ReadOnly, usage),
            AccessFlags::TRANSFER_READ
        );
    }

    #[test]
    fn test_transfer_read_write() {
        let flags = resolve_buffer_access(
            PipelineStage::TRANSFER,
            ResourceAccess::ReadWrite,
            BufferUsage::STORAGE,
        );
        assert_eq!(flags, AccessFlags::TRANSFER_READ | AccessFlags::TRANSFER_WRITE);
    }

    #[rstest]
    #[case::vertex(BufferUsage::VERTEX, AccessFlags::VERTEX_ATTRIBUTE_READ)]
    #[case::index(BufferUsage::INDEX, AccessFlags::INDEX_READ)]
    #[case::indirect(BufferUsage::INDIRECT, AccessFlags::INDIRECT_COMMAND_READ)]
    #[case::vertex_wins_over_index(
        BufferUsage::VERTEX | BufferUsage::INDEX,
        AccessFlags::VERTEX_ATTRIBUTE_READ
    )]
    #[case::uniform(BufferUsage::UNIFORM, AccessFlags::UNIFORM_READ)]
    #[case::storage(BufferUsage::STORAGE, AccessFlags::SHADER_READ)]
    fn test_vertex_stage_buffer(#[case] usage: BufferUsage, #[case] expected: AccessFlags) {
        assert_eq!(
            resolve_buffer_access(PipelineStage::VERTEX, ResourceAccess::ReadOnly, usage),
            expected
        );
    }

    #[test]
    fn test_uniform_before_shader_rule() {
        let flags = resolve_buffer_access(
            PipelineStage::COMPUTE,
            ResourceAccess::ReadWrite,
            BufferUsage::UNIFORM | BufferUsage::STORAGE,
        );
        assert_eq!(flags, AccessFlags::UNIFORM_READ);
    }

    #[test]
    fn test_texture_ignores_buffer_rules() {
        // Vertex stage on a texture falls through to the shader rule.
        let flags = resolve_texture_access(
            PipelineStage::VERTEX,
            ResourceAccess::ReadOnly,
            TextureUsage::TEXTURE_BINDING,
        );
        assert_eq!(flags, AccessFlags::SHADER_READ);
    }

    #[rstest]
    #[case::read(ResourceAccess::ReadOnly, AccessFlags::COLOR_ATTACHMENT_READ)]
    #[case::write(ResourceAccess::WriteOnly, AccessFlags::COLOR_ATTACHMENT_WRITE)]
    #[case::both(
        ResourceAccess::ReadWrite,
        AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE
    )]
    fn test_color_attachment_access(#[case] access: ResourceAccess, #[case] expected: AccessFlags) {
        assert_eq!(
            resolve_texture_access(
                PipelineStage::ATTACHMENT_OUTPUT,
                access,
                TextureUsage::COLOR_ATTACHMENT
            ),
            expected
        );
    }

    #[test]
    fn test_depth_attachment_access() {
        let flags = resolve_texture_access(
            PipelineStage::LATE_FRAGMENT_TEST,
            ResourceAccess::WriteOnly,
            TextureUsage::DEPTH_STENCIL_ATTACHMENT,
        );
        assert_eq!(flags, AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE);
    }

    #[test]
    fn test_attachment_stage_without_usage_falls_back_to_memory() {
        let flags = resolve_texture_access(
            PipelineStage::ATTACHMENT_OUTPUT,
            ResourceAccess::WriteOnly,
            TextureUsage::TEXTURE_BINDING,
        );
        assert_eq!(flags, AccessFlags::MEMORY_WRITE);
    }

    #[test]
    fn test_empty_stage_falls_back_to_memory() {
        let flags = resolve_buffer_access(
            PipelineStage::empty(),
            ResourceAccess::ReadWrite,
            BufferUsage::STORAGE,
        );
        assert_eq!(flags, AccessFlags::MEMORY_READ | AccessFlags::MEMORY_WRITE);
    }

    #[rstest]
    #[case::copy_src(
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
    #[case::sampled(
        PipelineStage::FRAGMENT,
        TextureUsage::TEXTURE_BINDING | TextureUsage::STORAGE_BINDING,
        TextureLayout::ShaderReadOnly
    )]
    #[case::storage(PipelineStage::COMPUTE, TextureUsage::STORAGE_BINDING, TextureLayout::General)]
    #[case::transfer_without_copy_usage(
        PipelineStage::TRANSFER,
        TextureUsage::TEXTURE_BINDING,
        TextureLayout::ShaderReadOnly
    )]
    #[case::nothing(PipelineStage::FRAGMENT, TextureUsage::empty(), TextureLayout::General)]
    fn test_layout_table(
        #[case] stage: PipelineStage,
        #[case] usage: TextureUsage,
        #[case] expected: TextureLayout,
    ) {
        assert_eq!(resolve_texture_layout(stage, usage), expected);
    }
}
