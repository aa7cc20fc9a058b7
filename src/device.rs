//! Device-wide introspection context. Bundles everything a single logical
//! device's worth of command recording, hooking, and submission tracking
//! needs into one place: a cheap-to-clone `Arc` handed to every other piece
//! of the layer.
//!
//! This is deliberately small: no queue allocation strategy, no
//! extension-requirement negotiation, no generic application-settings
//! parameter. Those concerns belong to whatever Vulkan loader trampoline
//! sits in front of this crate; this type only owns the introspection
//! bookkeeping.

use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ash::vk;

use crate::command::DeviceExtensions;
use crate::copy::CopyPipelineBank;
use crate::env::EnvConfig;
use crate::error::Result;
use crate::hook::HookEngine;
use crate::registry::{HandleKind, Registries};
use crate::submission::SubmissionTracker;

/// Raw `VK_EXT_device_fault` entry point, resolved by hand the same way
/// `DeviceExtensions`' other optional extension tables are; `ash` does not
/// generate a wrapper for this extension.
type PfnGetDeviceFaultInfo = vk::PFN_vkGetDeviceFaultInfoEXT;

/// Device-wide state backing the introspection layer: one per logical
/// device the application creates, shared via `Arc` with every command
/// buffer wrapper, hook record, and GUI-facing query it serves.
pub struct DeviceState {
    pub handle: ash::Device,
    pub ext: DeviceExtensions,
    pub registries: Registries,
    pub hook_engine: HookEngine,
    pub submissions: SubmissionTracker,
    pub copy_pipelines: Option<CopyPipelineBank>,
    pub env: &'static EnvConfig,
    frame_counter: AtomicU64,
    get_device_fault_info: Option<PfnGetDeviceFaultInfo>,
}

impl DeviceState {
    /// Builds the introspection context around an already-created
    /// `VkDevice`. The copy pipeline bank is built eagerly here; if the
    /// `shaderc` feature is disabled, sampled-copy capture degrades (logged,
    /// not fatal — the affected feature degrades instead of propagating an
    /// error up to the application).
    pub fn new(handle: ash::Device, ext: DeviceExtensions) -> Self {
        let env = EnvConfig::get();
        let copy_pipelines = match CopyPipelineBank::new(&handle) {
            Ok(bank) => Some(bank),
            Err(e) => {
                log::warn!("copy pipeline bank unavailable, sampled-copy capture disabled: {e}");
                None
            }
        };
        DeviceState {
            handle,
            ext,
            registries: Registries::default(),
            hook_engine: HookEngine::new(),
            submissions: SubmissionTracker::new(),
            copy_pipelines,
            env,
            frame_counter: AtomicU64::new(0),
            get_device_fault_info: None,
        }
    }

    /// Loads `vkGetDeviceFaultInfoEXT` via `vkGetDeviceProcAddr`. Call once
    /// after device creation if `VIL_DEVICE_FAULT`/`env.device_fault` is
    /// set and `VK_EXT_device_fault` was enabled.
    pub fn load_device_fault_ext(&mut self, instance: &ash::Instance) {
        let name = unsafe { std::ffi::CStr::from_bytes_with_nul_unchecked(b"vkGetDeviceFaultInfoEXT\0") };
        let get_device_proc_addr = instance.fp_v1_0().get_device_proc_addr;
        let proc = unsafe { get_device_proc_addr(self.handle.handle(), name.as_ptr()) };
        self.get_device_fault_info = proc.map(|p| unsafe { std::mem::transmute::<_, PfnGetDeviceFaultInfo>(p) });
    }

    /// Current frame index, advanced once per `advance_frame` call and used
    /// to timestamp zombie handles for GC.
    pub fn current_frame(&self) -> u64 {
        self.frame_counter.load(Ordering::Acquire)
    }

    /// Advances the frame counter and runs a garbage-collection pass over
    /// every handle registry, dropping zombies that have aged past
    /// [`crate::registry::ZOMBIE_TTL_FRAMES`].
    pub fn advance_frame(&self) -> u64 {
        let frame = self.frame_counter.fetch_add(1, Ordering::AcqRel) + 1;
        self.registries.collect_garbage(frame);
        frame
    }

    /// Records a handle's destruction in its registry, moving it to zombie
    /// retention rather than dropping it outright. Generic lookup is
    /// awkward across 20 unrelated `Registry<H>`
    /// fields, so this is a macro-free dispatch over `HandleKind` instead of
    /// a trait method, mirroring how `AnyHandleRef` does its own dispatch.
    pub fn notify_destroyed_buffer(&self, handle: vk::Buffer) {
        self.registries.buffers.notify_destroyed(handle, self.current_frame());
    }

    pub fn notify_destroyed_image(&self, handle: vk::Image) {
        self.registries.images.notify_destroyed(handle, self.current_frame());
    }

    pub fn notify_destroyed_image_view(&self, handle: vk::ImageView) {
        self.registries.image_views.notify_destroyed(handle, self.current_frame());
    }

    pub fn notify_destroyed_descriptor_set(&self, handle: vk::DescriptorSet) {
        self.registries.descriptor_sets.notify_destroyed(handle, self.current_frame());
    }

    pub fn notify_destroyed_pipeline(&self, handle: vk::Pipeline) {
        self.registries.pipelines.notify_destroyed(handle, self.current_frame());
    }

    pub fn notify_destroyed_command_buffer(&self, handle: vk::CommandBuffer) {
        self.registries.command_buffers.notify_destroyed(handle, self.current_frame());
    }

    /// Polls every pending submission's fence, finishing hook states via
    /// `post_process` and logging a device fault if the driver reports one
    /// lost.
    pub fn poll_submissions(&self, post_process: impl FnMut(&crate::submission::PendingSubmission) -> Option<crate::hook::HookState>) {
        let results = self.submissions.poll(&self.handle, &self.hook_engine, post_process);
        for (id, result) in results {
            match result {
                crate::submission::PollResult::DeviceLost => {
                    log::error!("submission {id} observed VK_ERROR_DEVICE_LOST");
                    if let Some(pfn) = self.get_device_fault_info {
                        unsafe { crate::submission::log_device_fault(pfn, self.handle.handle()) };
                    }
                }
                crate::submission::PollResult::Completed(_) | crate::submission::PollResult::Pending => {}
            }
        }
    }

    pub fn wraps(&self, kind: HandleKind) -> bool {
        self.env.wraps(kind)
    }

    /// Waits for the device to go fully idle. Only meant for teardown, per
    /// the usual `wait_idle` caveat: never use this as
    /// a per-frame synchronization primitive.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.handle.device_wait_idle() }.map_err(Into::into)
    }
}

impl Deref for DeviceState {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl Drop for DeviceState {
    fn drop(&mut self) {
        if let Some(bank) = &self.copy_pipelines {
            unsafe { bank.destroy(&self.handle) };
        }
    }
}

/// Shared handle to a [`DeviceState`], the unit every other wrapper in this
/// crate (command buffers, hook records, registries) is threaded through.
pub type Device = Arc<DeviceState>;
