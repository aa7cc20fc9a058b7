//! Submission tracker: per-submission bookkeeping for
//! fences, hook-record completion, and the readback that makes captured
//! data visible to the UI.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use ash::vk;

use crate::command::CommandRecord;
use crate::hook::{HookEngine, HookRecord, HookState};

static NEXT_SUBMISSION_ID: AtomicU64 = AtomicU64::new(1);

/// One in-flight submission: the application's original batch (tracked
/// only by the command records it references, since the actual
/// `VkSubmitInfo` has already gone to the driver by the time we keep this
/// around), the hook submission if the hook engine substituted a command
/// buffer, and whichever fence signals completion.
pub struct PendingSubmission {
    id: u64,
    records: Vec<Arc<CommandRecord>>,
    hook_record: Option<Arc<HookRecord>>,
    fence: vk::Fence,
    /// True when `fence` was created internally (the application didn't
    /// pass one to `vkQueueSubmit`) and therefore must be destroyed by the
    /// tracker rather than left for the application to manage.
    owns_fence: bool,
}

impl PendingSubmission {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn fence(&self) -> vk::Fence {
        self.fence
    }

    pub fn hook_record(&self) -> Option<&Arc<HookRecord>> {
        self.hook_record.as_ref()
    }
}

/// Outcome of [`SubmissionTracker::poll`] for one pending submission.
pub enum PollResult {
    /// Fence not yet signaled; still pending.
    Pending,
    /// Completed normally (or the hook was invalidated and its record was
    /// simply dropped without readback if the hook was invalidated.
    Completed(Option<Arc<HookState>>),
    /// The driver reported `VK_ERROR_DEVICE_LOST`.
    DeviceLost,
}

pub struct SubmissionTracker {
    pending: Mutex<Vec<PendingSubmission>>,
}

impl SubmissionTracker {
    pub fn new() -> Self {
        SubmissionTracker {
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Registers a freshly submitted batch. Each referenced record has its
    /// `writer` reservation set to this submission's id — a record with a
    /// non-null writer is currently pending on a queue and destroying it is
    /// forbidden; the hook record (if any) is
    /// marked pending.
    pub fn register(
        &self,
        records: Vec<Arc<CommandRecord>>,
        hook_record: Option<Arc<HookRecord>>,
        fence: vk::Fence,
        owns_fence: bool,
    ) -> u64 {
        let id = NEXT_SUBMISSION_ID.fetch_add(1, Ordering::Relaxed);
        for r in &records {
            r.set_writer(Some(id));
        }
        if let Some(h) = &hook_record {
            h.mark_pending();
        }
        self.pending.lock().unwrap().push(PendingSubmission {
            id,
            records,
            hook_record,
            fence,
            owns_fence,
        });
        id
    }

    /// Cancellation path: a failed `vkQueueSubmit` must not leak the hook
    /// submission, so this drops a submission that never actually made it
    /// to the queue, releasing every reservation it would have held.
    pub fn cancel(&self, id: u64, device: &ash::Device) {
        let mut pending = self.pending.lock().unwrap();
        if let Some(pos) = pending.iter().position(|p| p.id == id) {
            let sub = pending.remove(pos);
            self.release(&sub, device);
        }
    }

    fn release(&self, sub: &PendingSubmission, device: &ash::Device) {
        for r in &sub.records {
            r.set_writer(None);
        }
        if let Some(h) = &sub.hook_record {
            h.mark_completed();
        }
        if sub.owns_fence && sub.fence != vk::Fence::null() {
            unsafe { device.destroy_fence(sub.fence, None) };
        }
    }

    /// Polls every pending submission's fence once
    /// (`vkGetFenceStatus`; polling rather than blocking lets a GUI thread
    /// interleave progress), finishing and removing the ones that are done.
    ///
    /// `finish` is invoked for each submission that has completed, with
    /// its hook record (if any); its return value becomes the completed
    /// `HookState`, which is both returned here and registered with
    /// `engine`'s completed-hooks FIFO.
    pub fn poll(
        &self,
        device: &ash::Device,
        engine: &HookEngine,
        mut finish: impl FnMut(&PendingSubmission) -> Option<HookState>,
    ) -> Vec<(u64, PollResult)> {
        let mut pending = self.pending.lock().unwrap();
        let mut results = Vec::new();
        let mut i = 0;
        while i < pending.len() {
            let status = if pending[i].fence == vk::Fence::null() {
                Ok(())
            } else {
                unsafe { device.get_fence_status(pending[i].fence) }
            };
            match status {
                Err(vk::Result::NOT_READY) => {
                    i += 1;
                    continue;
                }
                Err(vk::Result::ERROR_DEVICE_LOST) => {
                    let sub = pending.remove(i);
                    self.release(&sub, device);
                    results.push((sub.id, PollResult::DeviceLost));
                    continue;
                }
                _ => {}
            }
            let sub = pending.remove(i);
            let state = if sub.hook_record.as_ref().map(|h| h.is_invalidated()).unwrap_or(false) {
                None
            } else {
                finish(&sub).map(Arc::new)
            };
            if let Some(state) = &state {
                engine.complete(state.clone());
            }
            self.release(&sub, device);
            results.push((sub.id, PollResult::Completed(state)));
        }
        results
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

impl Default for SubmissionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Device-fault capture on device-lost: when
/// `VK_EXT_device_fault` is enabled and a submission completes with
/// `VK_ERROR_DEVICE_LOST`, fetches `vkGetDeviceFaultInfoEXT` and logs the
/// vendor/address fault info. Best-effort: any failure here is itself
/// just logged, never propagated, since we are already on the
/// device-lost error path.
///
/// `get_device_fault_info` is the raw `vkGetDeviceFaultInfoEXT` entry
/// point, loaded via `vkGetDeviceProcAddr` at device-creation time the
/// same way every other optionally-enabled extension entry point in
/// `crate::command::DeviceExtensions` is loaded (`ash`'s generated
/// extension wrappers don't cover `VK_EXT_device_fault`, so this one is
/// resolved by hand).
pub unsafe fn log_device_fault(
    get_device_fault_info: vk::PFN_vkGetDeviceFaultInfoEXT,
    device: vk::Device,
) {
    let mut counts = vk::DeviceFaultCountsEXT::default();
    let probe = get_device_fault_info(device, &mut counts, std::ptr::null_mut());
    if probe != vk::Result::SUCCESS {
        log::warn!("vkGetDeviceFaultInfoEXT (counts probe) failed: {probe:?}");
        return;
    }

    let mut addr_infos = vec![vk::DeviceFaultAddressInfoEXT::default(); counts.address_info_count as usize];
    let mut vendor_infos = vec![vk::DeviceFaultVendorInfoEXT::default(); counts.vendor_info_count as usize];
    let mut vendor_binary = vec![0u8; counts.vendor_binary_size as usize];
    let mut info = vk::DeviceFaultInfoEXT::builder()
        .build();
    info.p_address_infos = addr_infos.as_mut_ptr();
    info.p_vendor_infos = vendor_infos.as_mut_ptr();
    info.p_vendor_binary_data = vendor_binary.as_mut_ptr() as *mut std::ffi::c_void;

    let result = get_device_fault_info(device, &mut counts, &mut info);
    if result == vk::Result::SUCCESS || result == vk::Result::INCOMPLETE {
        log::error!(
            "device fault: {} ({} address infos, {} vendor infos)",
            std::ffi::CStr::from_ptr(info.description.as_ptr()).to_string_lossy(),
            counts.address_info_count,
            counts.vendor_info_count,
        );
    } else {
        log::warn!("vkGetDeviceFaultInfoEXT failed: {result:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandKind, CommandRecordBuilder};

    fn record() -> Arc<CommandRecord> {
        let mut b = CommandRecordBuilder::new(0);
        b.append(CommandKind::SetLineWidth(1.0));
        b.finish()
    }

    #[test]
    fn register_sets_writer_and_cancel_releases_it() {
        let tracker = SubmissionTracker::new();
        let rec = record();
        // No real device available in a unit test; exercise the
        // no-fence (`vk::Fence::null()`) path, which `release` special-cases.
        let id = tracker.register(vec![rec.clone()], None, vk::Fence::null(), false);
        assert_eq!(rec.writer(), Some(id));
        assert_eq!(tracker.pending_count(), 1);
    }
}
