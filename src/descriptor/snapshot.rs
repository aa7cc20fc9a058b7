//! Submission-time descriptor snapshot map: freezes the
//! content of every descriptor set referenced by a command record at the
//! moment it's submitted, so the hook engine and UI can show "what the
//! shaders actually saw" even if the application keeps mutating the set
//! afterward.

use std::collections::HashMap;
use std::sync::Arc;

use ash::vk;

use super::cow::CowDescriptorSet;
use super::set::DescriptorSetContents;

#[derive(Default)]
pub struct DescriptorSnapshotMap {
    sets: HashMap<vk::DescriptorSet, Arc<DescriptorSetContents>>,
}

impl DescriptorSnapshotMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(&mut self, handle: vk::DescriptorSet, set: &CowDescriptorSet) {
        self.sets.insert(handle, set.snapshot());
    }

    pub fn get(&self, handle: vk::DescriptorSet) -> Option<&Arc<DescriptorSetContents>> {
        self.sets.get(&handle)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::layout::SetLayout;
    use ash::vk::Handle as _;

    #[test]
    fn capture_then_get_returns_the_frozen_content() {
        let raw = [vk::DescriptorSetLayoutBinding {
            binding: 0,
            descriptor_type: vk::DescriptorType::SAMPLER,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::FRAGMENT,
            p_immutable_samplers: std::ptr::null(),
        }];
        let layout = Arc::new(SetLayout::from_bindings(&raw));
        let set = CowDescriptorSet::new(layout);
        let handle = vk::DescriptorSet::from_raw(123);

        let mut map = DescriptorSnapshotMap::new();
        assert!(map.is_empty());
        map.capture(handle, &set);
        assert_eq!(map.len(), 1);
        assert!(map.get(handle).is_some());
        assert!(map.get(vk::DescriptorSet::from_raw(999)).is_none());
    }
}
