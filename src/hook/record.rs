//! Hook records: a one-shot secondary command buffer built to capture data
//! around a single selected command, plus every resource it owns to do so.
//!
//! Built in two phases, same split as [`crate::command::CommandRecordBuilder`]
//! / [`crate::command::CommandRecord`]: a mutable builder while the capture
//! commands and owned resources are being assembled, frozen into a shared
//! `Arc<HookRecord>` once the secondary command buffer is fully recorded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ash::vk;

use crate::command::CommandPath;
use crate::descriptor::DescriptorSnapshotMap;

pub struct HookRecordBuilder {
    command_buffer: vk::CommandBuffer,
    target_path: CommandPath,
    descriptor_snapshot: DescriptorSnapshotMap,
    timestamp_pool: Option<vk::QueryPool>,
    owned_images: Vec<vk::Image>,
    owned_buffers: Vec<vk::Buffer>,
    owned_render_passes: Vec<vk::RenderPass>,
    owned_image_views: Vec<vk::ImageView>,
    owned_descriptor_sets: Vec<(vk::DescriptorPool, vk::DescriptorSet)>,
}

impl HookRecordBuilder {
    pub fn new(command_buffer: vk::CommandBuffer, target_path: CommandPath, descriptor_snapshot: DescriptorSnapshotMap) -> Self {
        HookRecordBuilder {
            command_buffer,
            target_path,
            descriptor_snapshot,
            timestamp_pool: None,
            owned_images: Vec::new(),
            owned_buffers: Vec::new(),
            owned_render_passes: Vec::new(),
            owned_image_views: Vec::new(),
            owned_descriptor_sets: Vec::new(),
        }
    }

    pub fn with_timestamp_pool(mut self, pool: vk::QueryPool) -> Self {
        self.timestamp_pool = Some(pool);
        self
    }

    /// All intermediate resources used as copy destinations are owned by
    /// the hook record and destroyed with it.
    pub fn track_image(&mut self, image: vk::Image) {
        self.owned_images.push(image);
    }

    pub fn track_buffer(&mut self, buffer: vk::Buffer) {
        self.owned_buffers.push(buffer);
    }

    /// Tracks a render pass derived by the splitter (`rp0`/`rp1`/`rp2`) so
    /// it outlives the hook record's command buffer: a `VkRenderPass`
    /// referenced by a command buffer must stay valid until that buffer is
    /// no longer pending, not merely until recording finishes.
    pub fn track_render_pass(&mut self, render_pass: vk::RenderPass) {
        self.owned_render_passes.push(render_pass);
    }

    /// Tracks an image view created to resolve a descriptor-bound image for
    /// capture (the descriptor itself only carries the application's view,
    /// not one this crate owns).
    pub fn track_image_view(&mut self, view: vk::ImageView) {
        self.owned_image_views.push(view);
    }

    /// Tracks a transient descriptor set (and the pool it came from) used to
    /// bind a sampled-copy or buffer-copy compute dispatch.
    pub fn track_descriptor_set(&mut self, pool: vk::DescriptorPool, set: vk::DescriptorSet) {
        self.owned_descriptor_sets.push((pool, set));
    }

    pub fn timestamp_pool(&self) -> Option<vk::QueryPool> {
        self.timestamp_pool
    }

    pub fn descriptor_snapshot(&self) -> &DescriptorSnapshotMap {
        &self.descriptor_snapshot
    }

    pub fn finish(self) -> Arc<HookRecord> {
        Arc::new(HookRecord {
            command_buffer: self.command_buffer,
            target_path: self.target_path,
            descriptor_snapshot: self.descriptor_snapshot,
            timestamp_pool: self.timestamp_pool,
            owned_images: self.owned_images,
            owned_buffers: self.owned_buffers,
            owned_render_passes: self.owned_render_passes,
            owned_image_views: self.owned_image_views,
            owned_descriptor_sets: self.owned_descriptor_sets,
            pending: AtomicBool::new(false),
            invalidated: AtomicBool::new(false),
        })
    }
}

pub struct HookRecord {
    pub command_buffer: vk::CommandBuffer,
    pub target_path: CommandPath,
    pub descriptor_snapshot: DescriptorSnapshotMap,
    pub timestamp_pool: Option<vk::QueryPool>,
    pub owned_images: Vec<vk::Image>,
    pub owned_buffers: Vec<vk::Buffer>,
    pub owned_render_passes: Vec<vk::RenderPass>,
    pub owned_image_views: Vec<vk::ImageView>,
    pub owned_descriptor_sets: Vec<(vk::DescriptorPool, vk::DescriptorSet)>,
    pending: AtomicBool,
    invalidated: AtomicBool,
}

impl HookRecord {
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    pub fn mark_pending(&self) {
        self.pending.store(true, Ordering::Release);
    }

    pub fn mark_completed(&self) {
        self.pending.store(false, Ordering::Release);
    }

    /// Set when `set_ops`/`set_target` changed what this record captures,
    /// or its target path no longer resolves.
    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
    }

    /// Destroys every resource this record owns: the capture destination
    /// images/buffers/views, the transient descriptor sets a sampled-copy
    /// or normalize-vertices dispatch bound, and the derived `rp0`/`rp1`/
    /// `rp2` render passes. Callers must only do this once the record's
    /// command buffer is no longer pending execution (see
    /// [`Self::is_pending`]) — these handles may still be referenced by
    /// work in flight until then.
    pub fn destroy_resources(&self, device: &ash::Device) {
        unsafe {
            for view in &self.owned_image_views {
                device.destroy_image_view(*view, None);
            }
            for image in &self.owned_images {
                device.destroy_image(*image, None);
            }
            for buffer in &self.owned_buffers {
                device.destroy_buffer(*buffer, None);
            }
            for render_pass in &self.owned_render_passes {
                device.destroy_render_pass(*render_pass, None);
            }
            for (pool, set) in &self.owned_descriptor_sets {
                if let Err(e) = device.free_descriptor_sets(*pool, std::slice::from_ref(set)) {
                    log::warn!("failed to free hook record descriptor set: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_record_is_neither_pending_nor_invalidated() {
        let b = HookRecordBuilder::new(vk::CommandBuffer::null(), Vec::new(), DescriptorSnapshotMap::new());
        let r = b.finish();
        assert!(!r.is_pending());
        assert!(!r.is_invalidated());
    }

    #[test]
    fn invalidate_and_completion_transitions() {
        let mut b = HookRecordBuilder::new(vk::CommandBuffer::null(), Vec::new(), DescriptorSnapshotMap::new());
        b.track_image(vk::Image::null());
        b.track_buffer(vk::Buffer::null());
        let r = b.finish();
        r.mark_pending();
        assert!(r.is_pending());
        r.invalidate();
        assert!(r.is_invalidated());
        r.mark_completed();
        assert!(!r.is_pending());
        assert_eq!(r.owned_images.len(), 1);
        assert_eq!(r.owned_buffers.len(), 1);
    }
}
