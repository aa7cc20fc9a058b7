//! The command tree module: a typed tree of every command an
//! application records into a `VkCommandBuffer`, built in a per-record
//! [`crate::arena::Arena`] and navigable/comparable across re-recordings.

mod commands;
mod matching;
mod record_onto;
mod tree;
mod visitor;

pub use commands::*;
pub use matching::*;
pub use record_onto::record_onto;
pub use tree::*;
pub use visitor::*;

use ash::extensions::{ext, khr};

/// Bundles the extension function tables record-time and hook-build-time
/// code needs to re-emit commands, in the same spirit as
/// a device wrapper's optional extension loaders: a
/// command whose driver entry point comes from an extension degrades
/// gracefully (logged, skipped) when the extension wasn't loaded rather
/// than panicking.
#[derive(Default)]
pub struct DeviceExtensions {
    pub debug_utils: Option<ext::DebugUtils>,
    pub conditional_rendering: Option<ext::ConditionalRendering>,
    pub acceleration_structure: Option<khr::AccelerationStructure>,
    pub ray_tracing_pipeline: Option<khr::RayTracingPipeline>,
    pub mesh_shader: Option<ext::MeshShader>,
    pub push_descriptor: Option<khr::PushDescriptor>,
    pub transform_feedback: Option<ext::TransformFeedback>,
}

/// Everything needed to re-emit a command onto a target command buffer:
/// the raw device dispatch table plus whichever extension tables were
/// loaded.
pub struct RecordContext<'a> {
    pub device: &'a ash::Device,
    pub ext: &'a DeviceExtensions,
    pub cb: ash::vk::CommandBuffer,
}
