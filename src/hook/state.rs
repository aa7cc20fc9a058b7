//! Completed hook state: a rolling FIFO of the most recent completed hook
//! states, appended to once a hook record's submission finishes and its
//! captured data has been post-processed.

use ash::vk;

use crate::command::CommandPath;

/// Result of post-processing a completed hook record's captured data.
#[derive(Debug, Clone)]
pub struct HookState {
    pub record_id: u64,
    pub target_path: CommandPath,
    /// `end - begin` timestamp delta converted to nanoseconds, if timing
    /// was requested.
    pub gpu_time_ns: Option<u64>,
    /// Readback of the indirect draw count, bounding how much of the
    /// captured indirect argument buffer is meaningful.
    pub indirect_draw_count: Option<u32>,
    pub captured_images: Vec<vk::Image>,
    pub captured_buffers: Vec<vk::Buffer>,
}

impl HookState {
    pub fn new(record_id: u64, target_path: CommandPath) -> Self {
        HookState {
            record_id,
            target_path,
            gpu_time_ns: None,
            indirect_draw_count: None,
            captured_images: Vec::new(),
            captured_buffers: Vec::new(),
        }
    }
}
