//! Packed descriptor set content storage: a flattened
//! element array addressed through a [`super::layout::SetLayout`], plus
//! the write/copy operations the descriptor-update commands drive.

use std::sync::Arc;

use ash::vk;

use super::layout::SetLayout;
use crate::error::{Error, Result};

/// Groups `VkDescriptorType` into the handful of storage shapes the
/// registry actually needs to keep alive and re-emit, instead of
/// special-casing all eleven descriptor types everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorCategory {
    Image,
    Buffer,
    Texel,
    InlineUniformBlock,
    AccelerationStructure,
}

impl DescriptorCategory {
    pub fn of(ty: vk::DescriptorType) -> DescriptorCategory {
        use vk::DescriptorType as T;
        match ty {
            T::SAMPLER
            | T::COMBINED_IMAGE_SAMPLER
            | T::SAMPLED_IMAGE
            | T::STORAGE_IMAGE
            | T::INPUT_ATTACHMENT => DescriptorCategory::Image,
            T::UNIFORM_TEXEL_BUFFER | T::STORAGE_TEXEL_BUFFER => DescriptorCategory::Texel,
            T::INLINE_UNIFORM_BLOCK => DescriptorCategory::InlineUniformBlock,
            T::ACCELERATION_STRUCTURE_KHR => DescriptorCategory::AccelerationStructure,
            // UNIFORM_BUFFER, STORAGE_BUFFER, and their DYNAMIC variants.
            _ => DescriptorCategory::Buffer,
        }
    }
}

/// One descriptor slot's contents, uniformly shaped regardless of which
/// `VkDescriptorType` it holds (mirrors a tagged
/// `DescriptorStateCopy` union).
#[derive(Debug, Clone, Copy)]
pub enum DescriptorElement {
    Image {
        sampler: vk::Sampler,
        view: vk::ImageView,
        layout: vk::ImageLayout,
    },
    Buffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    },
    Texel(vk::BufferView),
    AccelerationStructure(vk::AccelerationStructureKHR),
    Empty,
}

/// A descriptor set's content, as a flat array addressed through its
/// layout's per-binding `element_offset`. `Clone` is cheap-ish (a `Vec`
/// copy) and is exactly what [`super::cow::CowDescriptorSet`]'s
/// `Arc::make_mut` needs to implement copy-on-write.
#[derive(Debug, Clone)]
pub struct DescriptorSetContents {
    pub layout: Arc<SetLayout>,
    elements: Vec<DescriptorElement>,
}

impl DescriptorSetContents {
    pub fn new(layout: Arc<SetLayout>) -> Self {
        let len = layout.total_elements;
        DescriptorSetContents {
            layout,
            elements: vec![DescriptorElement::Empty; len],
        }
    }

    /// Resolves `count` consecutive elements starting at
    /// `(binding, first_element)` into flat indices, spilling into
    /// `binding + 1` (at element 0) once the current binding's
    /// `descriptor_count` is exhausted — the standard Vulkan descriptor
    /// write/template overflow rule, which assumes every binding spilled
    /// into shares the same descriptor type as the one the write names.
    fn element_indices(&self, binding: u32, first_element: u32, count: u32) -> Result<Vec<usize>> {
        let mut indices = Vec::with_capacity(count as usize);
        let mut binding = binding;
        let mut element = first_element;
        while (indices.len() as u32) < count {
            let b = self
                .layout
                .binding(binding)
                .ok_or(Error::DescriptorOutOfRange { binding, element })?;
            if element >= b.descriptor_count {
                binding += 1;
                element = 0;
                continue;
            }
            indices.push(b.element_offset + element as usize);
            element += 1;
        }
        Ok(indices)
    }

    fn index_of(&self, binding: u32, element: u32) -> Result<usize> {
        Ok(self.element_indices(binding, element, 1)?[0])
    }

    pub fn get(&self, binding: u32, element: u32) -> Result<DescriptorElement> {
        Ok(self.elements[self.index_of(binding, element)?])
    }

    pub fn write(&mut self, binding: u32, first_element: u32, values: &[DescriptorElement]) -> Result<()> {
        let indices = self.element_indices(binding, first_element, values.len() as u32)?;
        for (idx, value) in indices.into_iter().zip(values) {
            self.elements[idx] = *value;
        }
        Ok(())
    }

    /// Copies `count` elements starting at `(src_binding, src_element)` in
    /// `src` into `(dst_binding, dst_element)` in `self` (backs
    /// `vkCmdCopyDescriptorSets` / `VkCopyDescriptorSet`), spilling across
    /// binding boundaries on both the read and write side.
    pub fn copy_from(
        &mut self,
        src: &DescriptorSetContents,
        src_binding: u32,
        src_element: u32,
        dst_binding: u32,
        dst_element: u32,
        count: u32,
    ) -> Result<()> {
        let src_indices = src.element_indices(src_binding, src_element, count)?;
        let buf: Vec<DescriptorElement> = src_indices.into_iter().map(|i| src.elements[i]).collect();
        self.write(dst_binding, dst_element, &buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle as _;
    use crate::descriptor::layout::SetLayout;

    fn single_binding_layout(count: u32, ty: vk::DescriptorType) -> Arc<SetLayout> {
        let raw = [vk::DescriptorSetLayoutBinding {
            binding: 0,
            descriptor_type: ty,
            descriptor_count: count,
            stage_flags: vk::ShaderStageFlags::ALL,
            p_immutable_samplers: std::ptr::null(),
        }];
        Arc::new(SetLayout::from_bindings(&raw))
    }

    #[test]
    fn write_then_get_round_trips() {
        let layout = single_binding_layout(2, vk::DescriptorType::UNIFORM_BUFFER);
        let mut set = DescriptorSetContents::new(layout);
        set.write(
            0,
            1,
            &[DescriptorElement::Buffer {
                buffer: vk::Buffer::null(),
                offset: 16,
                range: 64,
            }],
        )
        .unwrap();
        match set.get(0, 1).unwrap() {
            DescriptorElement::Buffer { offset, range, .. } => {
                assert_eq!(offset, 16);
                assert_eq!(range, 64);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn out_of_range_element_is_an_error() {
        let layout = single_binding_layout(1, vk::DescriptorType::SAMPLED_IMAGE);
        let set = DescriptorSetContents::new(layout);
        assert!(set.get(0, 5).is_err());
        assert!(set.get(9, 0).is_err());
    }

    fn two_binding_layout() -> Arc<SetLayout> {
        let raw = [
            vk::DescriptorSetLayoutBinding {
                binding: 0,
                descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
                descriptor_count: 2,
                stage_flags: vk::ShaderStageFlags::ALL,
                p_immutable_samplers: std::ptr::null(),
            },
            vk::DescriptorSetLayoutBinding {
                binding: 1,
                descriptor_type: vk::DescriptorType::STORAGE_BUFFER,
                descriptor_count: 2,
                stage_flags: vk::ShaderStageFlags::ALL,
                p_immutable_samplers: std::ptr::null(),
            },
        ];
        Arc::new(SetLayout::from_bindings(&raw))
    }

    #[test]
    fn write_spills_into_the_next_binding_on_overflow() {
        let mut set = DescriptorSetContents::new(two_binding_layout());
        let values = [
            DescriptorElement::Buffer {
                buffer: vk::Buffer::null(),
                offset: 0,
                range: 4,
            },
            DescriptorElement::Buffer {
                buffer: vk::Buffer::null(),
                offset: 1,
                range: 4,
            },
            DescriptorElement::Buffer {
                buffer: vk::Buffer::null(),
                offset: 2,
                range: 4,
            },
        ];
        // binding 0 has only 2 elements; first_element=1 + 3 values overflows
        // into binding 1 at element 0.
        set.write(0, 1, &values).unwrap();
        match set.get(0, 1).unwrap() {
            DescriptorElement::Buffer { offset, .. } => assert_eq!(offset, 0),
            _ => panic!("wrong variant"),
        }
        match set.get(1, 0).unwrap() {
            DescriptorElement::Buffer { offset, .. } => assert_eq!(offset, 1),
            _ => panic!("wrong variant"),
        }
        match set.get(1, 1).unwrap() {
            DescriptorElement::Buffer { offset, .. } => assert_eq!(offset, 2),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn copy_from_transfers_elements_between_sets() {
        let layout = single_binding_layout(2, vk::DescriptorType::STORAGE_TEXEL_BUFFER);
        let mut src = DescriptorSetContents::new(layout.clone());
        src.write(0, 0, &[DescriptorElement::Texel(vk::BufferView::from_raw(5))])
            .unwrap();
        let mut dst = DescriptorSetContents::new(layout);
        dst.copy_from(&src, 0, 0, 0, 1, 1).unwrap();
        match dst.get(0, 1).unwrap() {
            DescriptorElement::Texel(v) => assert_eq!(v, vk::BufferView::from_raw(5)),
            _ => panic!("wrong variant"),
        }
    }
}
