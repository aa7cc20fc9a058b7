//! Descriptor set layout reflection: computing a packed per-binding byte
//! layout for a `VkDescriptorSetLayout`, used to size and address into a
//! [`super::set::DescriptorSetContents`] block.

use ash::vk;

use super::set::DescriptorCategory;

/// One binding's slot within a set's packed content block.
#[derive(Debug, Clone, Copy)]
pub struct BindingLayout {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub descriptor_count: u32,
    pub stage_flags: vk::ShaderStageFlags,
    pub category: DescriptorCategory,
    /// Index of this binding's first element within the set's flattened
    /// element array (not a byte offset: elements are a uniform
    /// `DescriptorElement` regardless of category, see `set.rs`).
    pub element_offset: usize,
}

/// A descriptor set layout's binding table, ordered by `binding` number
/// (not necessarily contiguous — applications may skip binding numbers).
#[derive(Debug, Clone)]
pub struct SetLayout {
    pub bindings: Vec<BindingLayout>,
    pub total_elements: usize,
}

impl SetLayout {
    /// Builds a layout from the raw bindings list passed to
    /// `vkCreateDescriptorSetLayout`, the same shape the driver
    /// walks when it builds its own binding table at layout-creation time.
    pub fn from_bindings(raw: &[vk::DescriptorSetLayoutBinding]) -> SetLayout {
        let mut bindings: Vec<&vk::DescriptorSetLayoutBinding> = raw.iter().collect();
        bindings.sort_by_key(|b| b.binding);

        let mut out = Vec::with_capacity(bindings.len());
        let mut cursor = 0usize;
        for b in bindings {
            out.push(BindingLayout {
                binding: b.binding,
                descriptor_type: b.descriptor_type,
                descriptor_count: b.descriptor_count,
                stage_flags: b.stage_flags,
                category: DescriptorCategory::of(b.descriptor_type),
                element_offset: cursor,
            });
            cursor += b.descriptor_count as usize;
        }
        SetLayout {
            bindings: out,
            total_elements: cursor,
        }
    }

    pub fn binding(&self, binding: u32) -> Option<&BindingLayout> {
        self.bindings.iter().find(|b| b.binding == binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_bindings_by_ascending_binding_number() {
        let raw = [
            vk::DescriptorSetLayoutBinding {
                binding: 2,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 1,
                stage_flags: vk::ShaderStageFlags::FRAGMENT,
                p_immutable_samplers: std::ptr::null(),
            },
            vk::DescriptorSetLayoutBinding {
                binding: 0,
                descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: 4,
                stage_flags: vk::ShaderStageFlags::FRAGMENT,
                p_immutable_samplers: std::ptr::null(),
            },
        ];
        let layout = SetLayout::from_bindings(&raw);
        assert_eq!(layout.bindings[0].binding, 0);
        assert_eq!(layout.bindings[0].element_offset, 0);
        assert_eq!(layout.bindings[1].binding, 2);
        assert_eq!(layout.bindings[1].element_offset, 4);
        assert_eq!(layout.total_elements, 5);
    }
}
