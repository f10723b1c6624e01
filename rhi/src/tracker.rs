//! Resource state tracking and automatic barrier insertion.
//!
//! A [`BarrierTracker`] lives inside one command encoder and remembers the
//! last observed access of every buffer range and texture touched while the
//! encoder drains its command items. For each newly declared access it
//! decides whether a barrier is needed, emits it into a [`BarrierSink`], and
//! records the access as the resource's current state.
//!
//! # Hazard policy
//!
//! [`HazardPolicy::ExactMatch`] emits a barrier only when the incoming
//! `(stage, access)` equals the tracked one for the same domain. A write
//! followed by a read at another stage is registered without
//! synchronization. [`HazardPolicy::AnyPriorAccess`] synchronizes every
//! repeated access of a domain except read-after-read in an unchanged layout.
//!
//! # Memory
//!
//! At most one entry per hazard domain is kept: a buffer range
//! (buffer, offset, size) or a texture identity. A repeated access updates
//! the existing entry in place.

use std::sync::Arc;

use crate::resolve::{
    AccessFlags, TextureLayout, resolve_buffer_access, resolve_texture_access,
    resolve_texture_layout,
};
use crate::resources::{Texture, TextureView};
use crate::state::{
    BufferBarrierState, BufferInfo, PipelineStage, ResourceAccess, TextureBarrierState,
    TextureState,
};

/// Decides which repeated accesses of a hazard domain are synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HazardPolicy {
    /// Barrier only when the exact `(stage, access)` is already tracked.
    #[default]
    ExactMatch,
    /// Barrier on every repeated access unless both sides only read and the
    /// texture layout stays the same.
    AnyPriorAccess,
}

impl HazardPolicy {
    fn requires_barrier(
        self,
        tracked: (PipelineStage, ResourceAccess),
        incoming: (PipelineStage, ResourceAccess),
        layout_changes: bool,
    ) -> bool {
        match self {
            Self::ExactMatch => tracked == incoming,
            Self::AnyPriorAccess => {
                layout_changes || tracked.1.is_write() || incoming.1.is_write()
            }
        }
    }
}

// ============================================================================
// Emitted barriers
// ============================================================================

/// A memory barrier over one buffer range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferBarrier {
    pub buffer: BufferInfo,
    pub src_stage: PipelineStage,
    pub src_access: ResourceAccess,
    pub dst_stage: PipelineStage,
    pub dst_access: ResourceAccess,
}

impl BufferBarrier {
    /// Resolved access flags of the source side.
    pub fn src_access_mask(&self) -> AccessFlags {
        resolve_buffer_access(self.src_stage, self.src_access, self.buffer.usage())
    }

    /// Resolved access flags of the destination side.
    pub fn dst_access_mask(&self) -> AccessFlags {
        resolve_buffer_access(self.dst_stage, self.dst_access, self.buffer.usage())
    }
}

/// A memory barrier and layout transition over a whole texture.
#[derive(Debug, Clone)]
pub struct TextureBarrier {
    pub texture: Arc<Texture>,
    pub old_layout: TextureLayout,
    pub new_layout: TextureLayout,
    pub src_stage: PipelineStage,
    pub src_access: ResourceAccess,
    pub dst_stage: PipelineStage,
    pub dst_access: ResourceAccess,
}

impl TextureBarrier {
    /// Resolved access flags of the source side.
    pub fn src_access_mask(&self) -> AccessFlags {
        resolve_texture_access(self.src_stage, self.src_access, self.texture.usage())
    }

    /// Resolved access flags of the destination side.
    pub fn dst_access_mask(&self) -> AccessFlags {
        resolve_texture_access(self.dst_stage, self.dst_access, self.texture.usage())
    }
}

/// Either kind of emitted barrier.
#[derive(Debug, Clone)]
pub enum Barrier {
    Buffer(BufferBarrier),
    Texture(TextureBarrier),
}

/// Receiver of emitted barriers, usually a native command list.
pub trait BarrierSink {
    fn buffer_barrier(&mut self, barrier: BufferBarrier);
    fn texture_barrier(&mut self, barrier: TextureBarrier);
}

impl BarrierSink for Vec<Barrier> {
    fn buffer_barrier(&mut self, barrier: BufferBarrier) {
        self.push(Barrier::Buffer(barrier));
    }

    fn texture_barrier(&mut self, barrier: TextureBarrier) {
        self.push(Barrier::Texture(barrier));
    }
}

// ============================================================================
// Tracker
// ============================================================================

/// Per-encoder memory of the last observed access of each resource.
#[derive(Debug, Default)]
pub struct BarrierTracker {
    policy: HazardPolicy,
    buffer_states: Vec<BufferBarrierState>,
    texture_states: Vec<TextureBarrierState>,
}

impl BarrierTracker {
    /// Create an empty tracker.
    pub fn new(policy: HazardPolicy) -> Self {
        Self {
            policy,
            buffer_states: Vec::new(),
            texture_states: Vec::new(),
        }
    }

    /// The hazard policy in effect.
    pub fn policy(&self) -> HazardPolicy {
        self.policy
    }

    /// Record an access of a buffer range.
    ///
    /// Returns true if a barrier was emitted into `sink`.
    pub fn record_buffer_barrier(
        &mut self,
        sink: &mut impl BarrierSink,
        buffer: &BufferInfo,
        stage: PipelineStage,
        access: ResourceAccess,
    ) -> bool {
        crate::profile_scope!("BarrierTracker::record_buffer_barrier");

        let Some(entry) = self
            .buffer_states
            .iter_mut()
            .find(|entry| entry.buffer == *buffer)
        else {
            log::trace!(
                "BarrierTracker: first touch of buffer {:?} range {}+{} at {:?} {:?}",
                buffer.buffer().id(),
                buffer.offset(),
                buffer.size(),
                stage,
                access
            );
            self.buffer_states.push(BufferBarrierState {
                buffer: buffer.clone(),
                stage,
                access,
            });
            return false;
        };

        let emit = self
            .policy
            .requires_barrier((entry.stage, entry.access), (stage, access), false);
        if emit {
            log::trace!(
                "BarrierTracker: buffer barrier on {:?} {:?} {:?} -> {:?} {:?}",
                buffer.buffer().id(),
                entry.stage,
                entry.access,
                stage,
                access
            );
            sink.buffer_barrier(BufferBarrier {
                buffer: buffer.clone(),
                src_stage: entry.stage,
                src_access: entry.access,
                dst_stage: stage,
                dst_access: access,
            });
        }

        entry.stage = stage;
        entry.access = access;
        emit
    }

    /// Record an access of the texture behind `view`.
    ///
    /// On a barrier the texture's resident layout is written through to the
    /// layout resolved for the incoming access. Returns true if a barrier was
    /// emitted into `sink`.
    pub fn record_texture_barrier(
        &mut self,
        sink: &mut impl BarrierSink,
        view: &TextureView,
        state: TextureState,
        stage: PipelineStage,
        access: ResourceAccess,
    ) -> bool {
        crate::profile_scope!("BarrierTracker::record_texture_barrier");

        let texture = view.texture();
        let Some(entry) = self
            .texture_states
            .iter_mut()
            .find(|entry| entry.texture.id() == texture.id())
        else {
            log::trace!(
                "BarrierTracker: first touch of texture {:?} as {:?} at {:?} {:?}",
                texture.id(),
                state,
                stage,
                access
            );
            self.texture_states.push(TextureBarrierState {
                texture: Arc::clone(texture),
                state,
                stage,
                access,
            });
            return false;
        };

        let old_layout = texture.layout();
        let new_layout = resolve_texture_layout(stage, texture.usage());
        let emit = self.policy.requires_barrier(
            (entry.stage, entry.access),
            (stage, access),
            old_layout != new_layout,
        );
        if emit {
            log::trace!(
                "BarrierTracker: texture barrier on {:?} {:?} -> {:?}",
                texture.id(),
                old_layout,
                new_layout
            );
            sink.texture_barrier(TextureBarrier {
                texture: Arc::clone(texture),
                old_layout,
                new_layout,
                src_stage: entry.stage,
                src_access: entry.access,
                dst_stage: stage,
                dst_access: access,
            });
            texture.set_layout(new_layout);
        }

        entry.state = state;
        entry.stage = stage;
        entry.access = access;
        emit
    }

    /// Tracked buffer ranges.
    pub fn buffer_states(&self) -> &[BufferBarrierState] {
        &self.buffer_states
    }

    /// Tracked textures.
    pub fn texture_states(&self) -> &[TextureBarrierState] {
        &self.texture_states
    }

    pub fn buffer_state_count(&self) -> usize {
        self.buffer_states.len()
    }

    pub fn texture_state_count(&self) -> usize {
        self.texture_states.len()
    }

    /// Forget every tracked state.
    pub fn reset(&mut self) {
        self.buffer_states.clear();
        self.texture_states.clear();
    }
}
