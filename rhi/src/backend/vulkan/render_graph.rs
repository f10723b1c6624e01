//! Render graph compilation into Vulkan render passes and pipelines.

use ash::vk;

use super::VulkanPipelineBuilder;
use super::conversion::{
    convert_load_op, convert_sample_count, convert_store_op, convert_texture_format,
};
use crate::error::GraphicsError;
use crate::graph::{
    AttachmentDescriptor, PipelineBindPoint, RenderGraphDescriptor, RenderPassDescriptor,
};
use crate::types::LoadOp;

/// A pipeline compiled for one pass.
#[derive(Debug, Clone, Copy)]
pub struct VulkanPipeline {
    pub pipeline: vk::Pipeline,
    pub bind_point: vk::PipelineBindPoint,
}

/// A compiled pass.
///
/// Passes without attachments (compute-only passes) have a null render
/// pass handle.
#[derive(Debug)]
pub struct VulkanPass {
    render_pass: vk::RenderPass,
    pipelines: Vec<VulkanPipeline>,
}

impl VulkanPass {
    /// Get the raw render pass handle.
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Get a compiled pipeline.
    pub fn pipeline(&self, index: usize) -> Option<&VulkanPipeline> {
        self.pipelines.get(index)
    }
}

/// Native objects compiled from a render graph descriptor.
pub struct VulkanRenderGraph {
    device: ash::Device,
    passes: Vec<VulkanPass>,
}

impl VulkanRenderGraph {
    /// Compile every pass and pipeline of the descriptor.
    ///
    /// Objects created before a failure are released when the partially
    /// built graph is dropped.
    pub(super) fn compile(
        device: &ash::Device,
        descriptor: &RenderGraphDescriptor,
        pipeline_builder: Option<&dyn VulkanPipelineBuilder>,
    ) -> Result<Self, GraphicsError> {
        let mut graph = Self {
            device: device.clone(),
            passes: Vec::with_capacity(descriptor.passes.len()),
        };

        for (pass_index, pass) in descriptor.passes.iter().enumerate() {
            let render_pass = if pass.has_attachments() {
                create_render_pass(device, pass)?
            } else {
                vk::RenderPass::null()
            };
            graph.passes.push(VulkanPass {
                render_pass,
                pipelines: Vec::with_capacity(pass.pipelines.len()),
            });

            if pass.pipelines.is_empty() {
                continue;
            }
            let Some(builder) = pipeline_builder else {
                return Err(GraphicsError::ConstructionFailed(format!(
                    "pass {} declares {} pipelines but the device has no pipeline builder",
                    pass_index,
                    pass.pipelines.len()
                )));
            };

            for pipeline in &pass.pipelines {
                let raw =
                    builder.build_pipeline(device, render_pass, pass_index, pass, pipeline)?;
                let bind_point = match pipeline.bind_point {
                    PipelineBindPoint::Graphics => vk::PipelineBindPoint::GRAPHICS,
                    PipelineBindPoint::Compute => vk::PipelineBindPoint::COMPUTE,
                };
                if let Some(compiled) = graph.passes.last_mut() {
                    compiled.pipelines.push(VulkanPipeline {
                        pipeline: raw,
                        bind_point,
                    });
                }
            }
        }

        log::debug!(
            "Compiled render graph {:?}: {} passes",
            descriptor.label,
            graph.passes.len()
        );
        Ok(graph)
    }

    /// Get a compiled pass.
    pub fn pass(&self, index: usize) -> Option<&VulkanPass> {
        self.passes.get(index)
    }
}

impl std::fmt::Debug for VulkanRenderGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanRenderGraph")
            .field("passes", &self.passes)
            .finish()
    }
}

impl Drop for VulkanRenderGraph {
    fn drop(&mut self) {
        for pass in &self.passes {
            for pipeline in &pass.pipelines {
                unsafe { self.device.destroy_pipeline(pipeline.pipeline, None) };
            }
            if pass.render_pass != vk::RenderPass::null() {
                unsafe { self.device.destroy_render_pass(pass.render_pass, None) };
            }
        }
    }
}

/// Describe one attachment of a render pass.
///
/// Loaded attachments are expected in their attachment layout; every other
/// attachment starts undefined. Attachments stay in their attachment layout
/// when the pass ends.
fn attachment_description(
    attachment: &AttachmentDescriptor,
    samples: vk::SampleCountFlags,
    layout: vk::ImageLayout,
) -> vk::AttachmentDescription {
    let load_op = convert_load_op(&attachment.load_op);
    let store_op = convert_store_op(attachment.store_op);
    let initial_layout = if matches!(attachment.load_op, LoadOp::Load) {
        layout
    } else {
        vk::ImageLayout::UNDEFINED
    };
    let (stencil_load_op, stencil_store_op) = if attachment.format.has_stencil() {
        (load_op, store_op)
    } else {
        (
            vk::AttachmentLoadOp::DONT_CARE,
            vk::AttachmentStoreOp::DONT_CARE,
        )
    };

    vk::AttachmentDescription::default()
        .format(convert_texture_format(attachment.format))
        .samples(samples)
        .load_op(load_op)
        .store_op(store_op)
        .stencil_load_op(stencil_load_op)
        .stencil_store_op(stencil_store_op)
        .initial_layout(initial_layout)
        .final_layout(layout)
}

fn create_render_pass(
    device: &ash::Device,
    pass: &RenderPassDescriptor,
) -> Result<vk::RenderPass, GraphicsError> {
    let samples = convert_sample_count(pass.sample_count);

    let mut attachments: Vec<vk::AttachmentDescription> = pass
        .color_attachments
        .iter()
        .map(|attachment| {
            attachment_description(attachment, samples, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
        })
        .collect();
    let color_refs: Vec<vk::AttachmentReference> = (0..pass.color_attachments.len() as u32)
        .map(|attachment| vk::AttachmentReference {
            attachment,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        })
        .collect();

    let depth_ref = pass.depth_stencil_attachment.as_ref().map(|attachment| {
        attachments.push(attachment_description(
            attachment,
            samples,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ));
        vk::AttachmentReference {
            attachment: color_refs.len() as u32,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        }
    });

    let mut subpass = vk::SubpassDescription::default()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(&color_refs);
    if let Some(depth_ref) = &depth_ref {
        subpass = subpass.depth_stencil_attachment(depth_ref);
    }

    let render_pass_info = vk::RenderPassCreateInfo::default()
        .attachments(&attachments)
        .subpasses(std::slice::from_ref(&subpass));

    unsafe { device.create_render_pass(&render_pass_info, None) }.map_err(|e| {
        GraphicsError::ConstructionFailed(format!(
            "Failed to create render pass {:?}: {:?}",
            pass.label, e
        ))
    })
}
