//! Device bootstrap sanity checks and `DeviceState` construction.
//!
//! Requires a loadable Vulkan driver; `#[ignore]`d by default (see
//! `tests/framework/mod.rs`).

use anyhow::Result;
use ash::vk::Handle;

use vil_core::command::DeviceExtensions;
use vil_core::device::DeviceState;

mod framework;

#[test]
#[ignore]
pub fn can_initialize() -> Result<()> {
    let _context = framework::make_context()?;
    Ok(())
}

#[test]
#[ignore]
pub fn vulkan_loaded() -> Result<()> {
    let context = framework::make_context()?;
    assert_ne!(context.instance.handle().as_raw(), 0, "VkInstance handle should not be zero");
    Ok(())
}

#[test]
#[ignore]
pub fn valid_device() -> Result<()> {
    let context = framework::make_context()?;
    assert_ne!(context.device.handle().as_raw(), 0, "VkDevice handle should not be zero");
    unsafe { context.device.device_wait_idle()? };
    Ok(())
}

#[test]
#[ignore]
pub fn device_state_wraps_a_live_device() -> Result<()> {
    let context = framework::make_context()?;
    // Cloning the ash::Device handle is cheap (it's a dispatch-table Arc
    // internally); DeviceState takes ownership the same way the layer's
    // own vkCreateDevice wrapper would after the driver call succeeds.
    let state = DeviceState::new(context.device.clone(), DeviceExtensions::default());
    assert_eq!(state.current_frame(), 0);
    assert_eq!(state.advance_frame(), 1);
    state.wait_idle()?;
    Ok(())
}

#[test]
#[ignore]
pub fn notify_destroyed_moves_handle_to_zombie_retention() -> Result<()> {
    let context = framework::make_context()?;
    let state = DeviceState::new(context.device.clone(), DeviceExtensions::default());

    let (buffer, memory) = context.create_buffer(
        256,
        ash::vk::BufferUsageFlags::TRANSFER_DST,
        ash::vk::MemoryPropertyFlags::DEVICE_LOCAL,
    )?;
    state.registries.buffers.insert(buffer);
    assert!(state.registries.buffers.lookup(buffer).is_some());

    state.notify_destroyed_buffer(buffer);
    // Still resolvable immediately after destruction (zombie window).
    let entry = state.registries.buffers.lookup(buffer).expect("zombie entry still resolvable");
    assert!(entry.is_destroyed());

    unsafe {
        context.device.destroy_buffer(buffer, None);
        context.device.free_memory(memory, None);
    }
    Ok(())
}
