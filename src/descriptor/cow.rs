//! Copy-on-write descriptor state.
//!
//! A descriptor set's content is shared (via snapshotting, below) whenever
//! something needs to read it as of a point in time without blocking
//! further writes to the live set. Mutating a shared set must not disturb
//! readers that already hold a snapshot, so writes resolve through
//! [`Arc::make_mut`]: if the content is uniquely owned, mutation happens
//! in place; if it's shared, it's cloned first. This is exactly
//! `Arc::make_mut`'s contract, so we build directly on it rather than
//! hand-rolling a refcount check.
//!
//! Two reference disciplines fall out of this for free rather than
//! needing separate types: call [`CowDescriptorSet::snapshot`] to take a
//! cheap `Arc` clone that freezes the content as of now ("ref-on-snapshot"),
//! or keep writing through the same `CowDescriptorSet` without ever
//! snapshotting, in which case every write just mutates in place
//! ("ref-everything" degenerates to plain mutation when nothing else holds
//! a reference).

use std::sync::Arc;

use super::layout::SetLayout;
use super::set::DescriptorSetContents;

pub struct CowDescriptorSet {
    inner: Arc<DescriptorSetContents>,
}

impl CowDescriptorSet {
    pub fn new(layout: Arc<SetLayout>) -> Self {
        CowDescriptorSet {
            inner: Arc::new(DescriptorSetContents::new(layout)),
        }
    }

    /// Takes a cheap, immutable reference to the content as it is right
    /// now. Later writes through `resolve_mut` will not affect it.
    pub fn snapshot(&self) -> Arc<DescriptorSetContents> {
        self.inner.clone()
    }

    /// Returns a mutable view onto the content, cloning it first if a
    /// snapshot (or anything else) is currently sharing it.
    pub fn resolve_mut(&mut self) -> &mut DescriptorSetContents {
        Arc::make_mut(&mut self.inner)
    }

    pub fn contents(&self) -> &DescriptorSetContents {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::set::DescriptorElement;
    use ash::vk;

    fn layout() -> Arc<SetLayout> {
        let raw = [vk::DescriptorSetLayoutBinding {
            binding: 0,
            descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::COMPUTE,
            p_immutable_samplers: std::ptr::null(),
        }];
        Arc::new(SetLayout::from_bindings(&raw))
    }

    #[test]
    fn snapshot_is_unaffected_by_later_writes() {
        let mut set = CowDescriptorSet::new(layout());
        set.resolve_mut()
            .write(
                0,
                0,
                &[DescriptorElement::Buffer {
                    buffer: vk::Buffer::null(),
                    offset: 0,
                    range: 4,
                }],
            )
            .unwrap();
        let snap = set.snapshot();

        set.resolve_mut()
            .write(
                0,
                0,
                &[DescriptorElement::Buffer {
                    buffer: vk::Buffer::null(),
                    offset: 100,
                    range: 4,
                }],
            )
            .unwrap();

        match snap.get(0, 0).unwrap() {
            DescriptorElement::Buffer { offset, .. } => assert_eq!(offset, 0),
            _ => panic!("wrong variant"),
        }
        match set.contents().get(0, 0).unwrap() {
            DescriptorElement::Buffer { offset, .. } => assert_eq!(offset, 100),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn write_without_snapshot_mutates_in_place() {
        let mut set = CowDescriptorSet::new(layout());
        let ptr_before = Arc::as_ptr(&set.inner);
        set.resolve_mut();
        assert_eq!(Arc::as_ptr(&set.inner), ptr_before);
    }
}
