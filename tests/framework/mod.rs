//! Headless Vulkan bootstrap for integration tests that need a real
//! device: picks the first physical device exposing a graphics+compute
//! queue family and creates a logical device with no surface/window
//! attached, in the same spirit as a `make_context`-style test harness.
//!
//! Every test using this framework requires a loadable Vulkan ICD
//! (`VK_ICD_FILENAMES` or a system driver) and is `#[ignore]`d by default;
//! run with `cargo test -- --ignored` on a machine with Vulkan available.

use std::ffi::CString;

use anyhow::{anyhow, Result};
use ash::vk;

pub struct Context {
    pub entry: ash::Entry,
    pub instance: ash::Instance,
    pub physical_device: vk::PhysicalDevice,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub device: ash::Device,
    pub queue_family: u32,
    pub queue: vk::Queue,
    pub command_pool: vk::CommandPool,
}

impl Drop for Context {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

fn find_graphics_queue_family(instance: &ash::Instance, phys: vk::PhysicalDevice) -> Option<u32> {
    unsafe { instance.get_physical_device_queue_family_properties(phys) }
        .iter()
        .enumerate()
        .find(|(_, p)| p.queue_flags.contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE))
        .map(|(i, _)| i as u32)
}

/// Creates a headless instance/device pair with one graphics+compute
/// queue. Mirrors the teacher's own `VkInstance`/`Device` construction
/// (application info, no layers/extensions requested beyond the default),
/// minus anything windowing-related.
pub fn make_context() -> Result<Context> {
    let entry = unsafe { ash::Entry::load()? };

    let app_name = CString::new("vil-core test harness")?;
    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app_name)
        .api_version(vk::make_api_version(0, 1, 2, 0));
    let instance_info = vk::InstanceCreateInfo::builder().application_info(&app_info);
    let instance = unsafe { entry.create_instance(&instance_info, None)? };

    let physical_device = unsafe { instance.enumerate_physical_devices() }?
        .into_iter()
        .find(|&pd| find_graphics_queue_family(&instance, pd).is_some())
        .ok_or_else(|| anyhow!("no physical device with a graphics+compute queue family"))?;

    let queue_family = find_graphics_queue_family(&instance, physical_device).unwrap();
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };

    let priorities = [1.0f32];
    let queue_info = vk::DeviceQueueCreateInfo::builder()
        .queue_family_index(queue_family)
        .queue_priorities(&priorities);
    let device_info = vk::DeviceCreateInfo::builder().queue_create_infos(std::slice::from_ref(&queue_info));
    let device = unsafe { instance.create_device(physical_device, &device_info, None)? };
    let queue = unsafe { device.get_device_queue(queue_family, 0) };

    let pool_info = vk::CommandPoolCreateInfo::builder()
        .queue_family_index(queue_family)
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
    let command_pool = unsafe { device.create_command_pool(&pool_info, None)? };

    Ok(Context {
        entry,
        instance,
        physical_device,
        memory_properties,
        device,
        queue_family,
        queue,
        command_pool,
    })
}

impl Context {
    fn memory_type_index(&self, filter: u32, properties: vk::MemoryPropertyFlags) -> Result<u32> {
        (0..self.memory_properties.memory_type_count)
            .find(|&i| {
                filter & (1 << i) != 0 && self.memory_properties.memory_types[i as usize].property_flags.contains(properties)
            })
            .ok_or_else(|| anyhow!("no matching memory type"))
    }

    /// Creates a buffer of `size` bytes with `usage`, backed by freshly
    /// allocated, bound memory with `properties`. No allocator abstraction:
    /// this crate doesn't own one (see `copy.rs`'s doc comment), so tests
    /// allocate directly the same way the splitter's own tests build raw
    /// render passes.
    pub fn create_buffer(&self, size: vk::DeviceSize, usage: vk::BufferUsageFlags, properties: vk::MemoryPropertyFlags) -> Result<(vk::Buffer, vk::DeviceMemory)> {
        let info = vk::BufferCreateInfo::builder().size(size).usage(usage).sharing_mode(vk::SharingMode::EXCLUSIVE);
        let buffer = unsafe { self.device.create_buffer(&info, None) }?;
        let reqs = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let type_index = self.memory_type_index(reqs.memory_type_bits, properties)?;
        let alloc_info = vk::MemoryAllocateInfo::builder().allocation_size(reqs.size).memory_type_index(type_index);
        let memory = unsafe { self.device.allocate_memory(&alloc_info, None) }?;
        unsafe { self.device.bind_buffer_memory(buffer, memory, 0) }?;
        Ok((buffer, memory))
    }

    pub fn create_image_2d(
        &self,
        format: vk::Format,
        extent: vk::Extent2D,
        usage: vk::ImageUsageFlags,
    ) -> Result<(vk::Image, vk::DeviceMemory)> {
        let info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = unsafe { self.device.create_image(&info, None) }?;
        let reqs = unsafe { self.device.get_image_memory_requirements(image) };
        let type_index = self.memory_type_index(reqs.memory_type_bits, vk::MemoryPropertyFlags::DEVICE_LOCAL)?;
        let alloc_info = vk::MemoryAllocateInfo::builder().allocation_size(reqs.size).memory_type_index(type_index);
        let memory = unsafe { self.device.allocate_memory(&alloc_info, None) }?;
        unsafe { self.device.bind_image_memory(image, memory, 0) }?;
        Ok((image, memory))
    }

    /// Allocates one primary command buffer from this context's pool,
    /// begins it with `ONE_TIME_SUBMIT`.
    pub fn begin_one_time_cb(&self) -> Result<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(self.command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let cb = unsafe { self.device.allocate_command_buffers(&alloc_info) }?[0];
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device.begin_command_buffer(cb, &begin_info) }?;
        Ok(cb)
    }

    /// Ends `cb`, submits it, and waits on a fresh fence until it completes.
    pub fn submit_and_wait(&self, cb: vk::CommandBuffer) -> Result<()> {
        unsafe { self.device.end_command_buffer(cb) }?;
        let fence = unsafe { self.device.create_fence(&vk::FenceCreateInfo::default(), None) }?;
        let submit = vk::SubmitInfo::builder().command_buffers(std::slice::from_ref(&cb));
        unsafe {
            self.device.queue_submit(self.queue, std::slice::from_ref(&submit), fence)?;
            self.device.wait_for_fences(std::slice::from_ref(&fence), true, u64::MAX)?;
            self.device.destroy_fence(fence, None);
            self.device.free_command_buffers(self.command_pool, std::slice::from_ref(&cb));
        }
        Ok(())
    }
}
