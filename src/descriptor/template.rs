//! Descriptor update template application: decoding the raw
//! byte buffer an application passes to
//! `vkUpdateDescriptorSetWithTemplate` according to its
//! `VkDescriptorUpdateTemplateEntry` list, the same walk
//! a descriptor update template does at template-update time.

use ash::vk;

use super::set::{DescriptorCategory, DescriptorElement, DescriptorSetContents};
use crate::error::{Error, Result};

/// One decoded `VkDescriptorUpdateTemplateEntry`.
#[derive(Debug, Clone, Copy)]
pub struct TemplateEntry {
    pub binding: u32,
    pub dst_array_element: u32,
    pub descriptor_count: u32,
    pub descriptor_type: vk::DescriptorType,
    pub offset: usize,
    pub stride: usize,
}

fn read_at<T: Copy>(data: &[u8], offset: usize) -> Result<T> {
    if offset
        .checked_add(std::mem::size_of::<T>())
        .map(|end| end > data.len())
        .unwrap_or(true)
    {
        return Err(Error::Uncategorized("descriptor update template entry out of bounds"));
    }
    // SAFETY: bounds checked above. Vulkan requires the application's
    // template data buffer to be laid out with the natural alignment of
    // these info structs, same assumption the driver itself makes.
    Ok(unsafe { std::ptr::read_unaligned(data.as_ptr().add(offset) as *const T) })
}

/// Applies raw template `data` onto `set`, one [`TemplateEntry`] at a
/// time: every element of an entry is decoded first, then written in one
/// `write()` call so an entry whose `descriptor_count` overflows its
/// binding spills into the next one exactly like a direct
/// `vkUpdateDescriptorSets` write does.
pub fn apply_template(set: &mut DescriptorSetContents, entries: &[TemplateEntry], data: &[u8]) -> Result<()> {
    for entry in entries {
        let category = DescriptorCategory::of(entry.descriptor_type);
        let mut values = Vec::with_capacity(entry.descriptor_count as usize);
        for i in 0..entry.descriptor_count {
            let byte_offset = entry.offset + i as usize * entry.stride;
            let element = match category {
                DescriptorCategory::Image => {
                    let info: vk::DescriptorImageInfo = read_at(data, byte_offset)?;
                    DescriptorElement::Image {
                        sampler: info.sampler,
                        view: info.image_view,
                        layout: info.image_layout,
                    }
                }
                DescriptorCategory::Buffer => {
                    let info: vk::DescriptorBufferInfo = read_at(data, byte_offset)?;
                    DescriptorElement::Buffer {
                        buffer: info.buffer,
                        offset: info.offset,
                        range: info.range,
                    }
                }
                DescriptorCategory::Texel => {
                    let view: vk::BufferView = read_at(data, byte_offset)?;
                    DescriptorElement::Texel(view)
                }
                DescriptorCategory::AccelerationStructure => {
                    let accel: vk::AccelerationStructureKHR = read_at(data, byte_offset)?;
                    DescriptorElement::AccelerationStructure(accel)
                }
                DescriptorCategory::InlineUniformBlock => DescriptorElement::Empty,
            };
            values.push(element);
        }
        set.write(entry.binding, entry.dst_array_element, &values)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::layout::SetLayout;
    use ash::vk::Handle as _;
    use std::sync::Arc;

    #[test]
    fn decodes_a_buffer_entry_from_raw_bytes() {
        let raw = [vk::DescriptorSetLayoutBinding {
            binding: 0,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::VERTEX,
            p_immutable_samplers: std::ptr::null(),
        }];
        let layout = Arc::new(SetLayout::from_bindings(&raw));
        let mut set = DescriptorSetContents::new(layout);

        let info = vk::DescriptorBufferInfo {
            buffer: vk::Buffer::from_raw(11),
            offset: 4,
            range: 16,
        };
        let bytes = unsafe {
            std::slice::from_raw_parts(
                &info as *const _ as *const u8,
                std::mem::size_of::<vk::DescriptorBufferInfo>(),
            )
        };

        let entries = [TemplateEntry {
            binding: 0,
            dst_array_element: 0,
            descriptor_count: 1,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            offset: 0,
            stride: std::mem::size_of::<vk::DescriptorBufferInfo>(),
        }];

        apply_template(&mut set, &entries, bytes).unwrap();
        match set.get(0, 0).unwrap() {
            DescriptorElement::Buffer { buffer, offset, range } => {
                assert_eq!(buffer, vk::Buffer::from_raw(11));
                assert_eq!(offset, 4);
                assert_eq!(range, 16);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn entry_spanning_descriptor_count_spills_into_next_binding() {
        let raw = [
            vk::DescriptorSetLayoutBinding {
                binding: 0,
                descriptor_type: vk::DescriptorType::STORAGE_TEXEL_BUFFER,
                descriptor_count: 1,
                stage_flags: vk::ShaderStageFlags::COMPUTE,
                p_immutable_samplers: std::ptr::null(),
            },
            vk::DescriptorSetLayoutBinding {
                binding: 1,
                descriptor_type: vk::DescriptorType::STORAGE_TEXEL_BUFFER,
                descriptor_count: 1,
                stage_flags: vk::ShaderStageFlags::COMPUTE,
                p_immutable_samplers: std::ptr::null(),
            },
        ];
        let layout = Arc::new(SetLayout::from_bindings(&raw));
        let mut set = DescriptorSetContents::new(layout);

        let views = [vk::BufferView::from_raw(7), vk::BufferView::from_raw(8)];
        let bytes = unsafe { std::slice::from_raw_parts(views.as_ptr() as *const u8, std::mem::size_of_val(&views)) };

        let entries = [TemplateEntry {
            binding: 0,
            dst_array_element: 0,
            descriptor_count: 2,
            descriptor_type: vk::DescriptorType::STORAGE_TEXEL_BUFFER,
            offset: 0,
            stride: std::mem::size_of::<vk::BufferView>(),
        }];

        apply_template(&mut set, &entries, bytes).unwrap();
        match set.get(0, 0).unwrap() {
            DescriptorElement::Texel(v) => assert_eq!(v, vk::BufferView::from_raw(7)),
            _ => panic!("wrong variant"),
        }
        match set.get(1, 0).unwrap() {
            DescriptorElement::Texel(v) => assert_eq!(v, vk::BufferView::from_raw(8)),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn out_of_bounds_entry_is_an_error() {
        let raw = [vk::DescriptorSetLayoutBinding {
            binding: 0,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: 1,
            stage_flags: vk::ShaderStageFlags::VERTEX,
            p_immutable_samplers: std::ptr::null(),
        }];
        let layout = Arc::new(SetLayout::from_bindings(&raw));
        let mut set = DescriptorSetContents::new(layout);
        let entries = [TemplateEntry {
            binding: 0,
            dst_array_element: 0,
            descriptor_count: 1,
            descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
            offset: 1000,
            stride: 16,
        }];
        assert!(apply_template(&mut set, &entries, &[0u8; 8]).is_err());
    }
}
