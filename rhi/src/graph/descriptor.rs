//! Declarative render graph description.

use crate::error::GraphicsError;
use crate::types::{ClearValue, LoadOp, StoreOp, TextureFormat};

/// Format and operations of one render pass attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentDescriptor {
    pub format: TextureFormat,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
}

impl AttachmentDescriptor {
    /// Create an attachment that loads and stores its contents.
    pub fn new(format: TextureFormat) -> Self {
        Self {
            format,
            load_op: LoadOp::default(),
            store_op: StoreOp::default(),
        }
    }

    /// Set the load operation.
    pub fn with_load_op(mut self, load_op: LoadOp) -> Self {
        self.load_op = load_op;
        self
    }

    /// Set the store operation.
    pub fn with_store_op(mut self, store_op: StoreOp) -> Self {
        self.store_op = store_op;
        self
    }

    /// Clear value used when beginning the pass.
    ///
    /// Attachments that do not clear still occupy a slot, filled with a
    /// neutral value for their kind.
    pub fn clear_value(&self) -> ClearValue {
        match self.load_op.clear_value() {
            Some(value) => value,
            None if self.format.is_depth_stencil() => ClearValue::depth(1.0),
            None => ClearValue::transparent(),
        }
    }
}

/// Which pipeline kind a pipeline binds as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PipelineBindPoint {
    #[default]
    Graphics,
    Compute,
}

/// An opaque pipeline slot within a pass.
///
/// The backend's pipeline builder decides what the pipeline contains; the
/// RHI only needs to know how to bind it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PipelineDescriptor {
    pub label: Option<String>,
    pub bind_point: PipelineBindPoint,
}

impl PipelineDescriptor {
    /// Describe a graphics pipeline.
    pub fn graphics() -> Self {
        Self::default()
    }

    /// Describe a compute pipeline.
    pub fn compute() -> Self {
        Self {
            label: None,
            bind_point: PipelineBindPoint::Compute,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// One pass of a render graph.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPassDescriptor {
    pub label: Option<String>,
    pub color_attachments: Vec<AttachmentDescriptor>,
    pub depth_stencil_attachment: Option<AttachmentDescriptor>,
    pub sample_count: u32,
    pub pipelines: Vec<PipelineDescriptor>,
}

impl RenderPassDescriptor {
    /// Create a pass with no attachments and no pipelines.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Append a color attachment.
    pub fn with_color_attachment(mut self, attachment: AttachmentDescriptor) -> Self {
        self.color_attachments.push(attachment);
        self
    }

    /// Set the depth/stencil attachment.
    pub fn with_depth_stencil_attachment(mut self, attachment: AttachmentDescriptor) -> Self {
        self.depth_stencil_attachment = Some(attachment);
        self
    }

    /// Set the sample count.
    pub fn with_sample_count(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }

    /// Append a pipeline.
    pub fn with_pipeline(mut self, pipeline: PipelineDescriptor) -> Self {
        self.pipelines.push(pipeline);
        self
    }

    /// Number of attachments, depth included.
    pub fn attachment_count(&self) -> usize {
        self.color_attachments.len() + usize::from(self.depth_stencil_attachment.is_some())
    }

    /// Returns true if the pass renders into attachments.
    pub fn has_attachments(&self) -> bool {
        self.attachment_count() > 0
    }

    /// Clear values for every attachment, colors first.
    pub fn clear_values(&self) -> Vec<ClearValue> {
        self.color_attachments
            .iter()
            .chain(self.depth_stencil_attachment.iter())
            .map(AttachmentDescriptor::clear_value)
            .collect()
    }

    pub(crate) fn validate(&self, index: usize) -> Result<(), GraphicsError> {
        if !matches!(self.sample_count, 1 | 2 | 4 | 8) {
            return Err(GraphicsError::InvalidParameter(format!(
                "pass {index}: unsupported sample count {}",
                self.sample_count
            )));
        }
        if let Some(color) = self
            .color_attachments
            .iter()
            .find(|attachment| attachment.format.is_depth_stencil())
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "pass {index}: color attachment uses depth format {:?}",
                color.format
            )));
        }
        if let Some(depth) = &self.depth_stencil_attachment
            && !depth.format.is_depth_stencil()
        {
            return Err(GraphicsError::InvalidParameter(format!(
                "pass {index}: depth attachment uses color format {:?}",
                depth.format
            )));
        }
        Ok(())
    }
}

impl Default for RenderPassDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            color_attachments: Vec::new(),
            depth_stencil_attachment: None,
            sample_count: 1,
            pipelines: Vec::new(),
        }
    }
}

/// Declarative description of a render graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RenderGraphDescriptor {
    pub label: Option<String>,
    pub passes: Vec<RenderPassDescriptor>,
}

impl RenderGraphDescriptor {
    /// Create an empty graph description.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Append a pass. Its index is the number of passes added before it.
    pub fn with_pass(mut self, pass: RenderPassDescriptor) -> Self {
        self.passes.push(pass);
        self
    }

    pub(crate) fn validate(&self) -> Result<(), GraphicsError> {
        self.passes
            .iter()
            .enumerate()
            .try_for_each(|(index, pass)| pass.validate(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clear_values_follow_attachments() {
        let pass = RenderPassDescriptor::new()
            .with_color_attachment(
                AttachmentDescriptor::new(TextureFormat::Rgba8Unorm)
                    .with_load_op(LoadOp::clear_color(0.1, 0.2, 0.3, 1.0)),
            )
            .with_color_attachment(AttachmentDescriptor::new(TextureFormat::Rgba16Float))
            .with_depth_stencil_attachment(
                AttachmentDescriptor::new(TextureFormat::Depth32Float)
                    .with_load_op(LoadOp::clear_depth(0.0)),
            );

        assert_eq!(pass.attachment_count(), 3);
        assert_eq!(
            pass.clear_values(),
            vec![
                ClearValue::color(0.1, 0.2, 0.3, 1.0),
                ClearValue::transparent(),
                ClearValue::depth(0.0),
            ]
        );
    }

    #[test]
    fn test_validate_rejects_swapped_formats() {
        let graph = RenderGraphDescriptor::new().with_pass(
            RenderPassDescriptor::new()
                .with_color_attachment(AttachmentDescriptor::new(TextureFormat::Depth32Float)),
        );
        assert!(matches!(
            graph.validate(),
            Err(GraphicsError::InvalidParameter(_))
        ));

        let graph = RenderGraphDescriptor::new()
            .with_pass(RenderPassDescriptor::new().with_sample_count(3));
        assert!(graph.validate().is_err());
    }
}
