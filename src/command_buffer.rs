//! Command-buffer-level usage/begin-info tracking.
//!
//! `CommandRecord`/`CommandRecordBuilder` (`crate::command`) model the tree
//! a single recording produces; they don't know about pools, levels, or
//! `vkBeginCommandBuffer` usage flags, because those are properties of the
//! `VkCommandBuffer` slot the recording happens into, not of the recording
//! itself. This module is where record-time entry points actually route
//! through: the enclosing layer's
//! `vkBeginCommandBuffer` wrapper calls [`CommandBufferState::begin`],
//! every `vkCmd*` wrapper calls [`CommandBufferState::append`], and
//! `vkEndCommandBuffer` calls [`CommandBufferState::end`].

use std::sync::{Arc, Mutex};

use ash::vk;

use crate::command::{CommandKind, CommandRecord, CommandRecordBuilder};
use crate::error::{Error, Result};
use crate::registry::AnyHandleRef;

/// A command pool, tracked only so destroying it can reset/free every
/// command buffer allocated from it; this layer does not manage the
/// underlying `VkCommandPool`'s memory itself, that's the driver's job.
pub struct CommandPoolState {
    pub queue_family: u32,
    buffers: Mutex<Vec<vk::CommandBuffer>>,
}

impl CommandPoolState {
    pub fn new(queue_family: u32) -> Self {
        CommandPoolState {
            queue_family,
            buffers: Mutex::new(Vec::new()),
        }
    }

    pub fn track(&self, cb: vk::CommandBuffer) {
        self.buffers.lock().unwrap().push(cb);
    }

    pub fn untrack(&self, cb: vk::CommandBuffer) {
        self.buffers.lock().unwrap().retain(|&b| b != cb);
    }

    /// Every command buffer this pool currently owns, e.g. for
    /// `vkResetCommandPool`/`vkDestroyCommandPool` to act on.
    pub fn command_buffers(&self) -> Vec<vk::CommandBuffer> {
        self.buffers.lock().unwrap().clone()
    }
}

/// Either actively recording into a [`CommandRecordBuilder`], or holding a
/// finished, immutable [`CommandRecord`] ready to be submitted (and
/// possibly hooked). A `vkResetCommandBuffer`/re-`vkBeginCommandBuffer`
/// moves this back to `Recording`, discarding the old finished record (its
/// `Arc` may still be kept alive elsewhere, e.g. a pending submission or
/// the hook engine's reuse cache).
enum State {
    Initial,
    Recording(CommandRecordBuilder),
    Executable(Arc<CommandRecord>),
}

/// Everything the layer needs to know about one `VkCommandBuffer` slot
/// between `vkAllocateCommandBuffers` and `vkFreeCommandBuffers`.
pub struct CommandBufferState {
    pub handle: vk::CommandBuffer,
    pub level: vk::CommandBufferLevel,
    pub usage: vk::CommandBufferUsageFlags,
    state: Mutex<State>,
}

impl CommandBufferState {
    pub fn new(handle: vk::CommandBuffer, level: vk::CommandBufferLevel) -> Self {
        CommandBufferState {
            handle,
            level,
            usage: vk::CommandBufferUsageFlags::empty(),
            state: Mutex::new(State::Initial),
        }
    }

    /// `vkBeginCommandBuffer`: starts a new recording, replacing whatever
    /// record this slot previously held.
    pub fn begin(&mut self, queue_family: u32, usage: vk::CommandBufferUsageFlags) {
        self.usage = usage;
        *self.state.lock().unwrap() = State::Recording(CommandRecordBuilder::new(queue_family));
    }

    /// Routes one intercepted `vkCmd*` call into the arena-backed command
    /// tree.
    pub fn append(&self, kind: CommandKind) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            State::Recording(builder) => {
                builder.append(kind);
                Ok(())
            }
            _ => Err(Error::Uncategorized("append called on a command buffer that is not recording")),
        }
    }

    /// Keeps a registry handle alive for the lifetime of the record
    /// currently being built. Also the hook for `ExecuteCommandsChild`: a
    /// secondary command buffer's
    /// finished record is tracked this way so the parent's reference list
    /// keeps it alive for at least as long as the parent itself is live.
    pub fn keep_alive(&self, handle: AnyHandleRef) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match &mut *state {
            State::Recording(builder) => {
                builder.keep_alive(handle);
                Ok(())
            }
            _ => Err(Error::Uncategorized("keep_alive called on a command buffer that is not recording")),
        }
    }

    /// `vkCmdExecuteCommands`: links each secondary's finished record and
    /// its registry handle into this (primary) buffer's reference list
    /// (the same `keep_alive` treatment any other referenced handle gets),
    /// and appends the `ExecuteCommandsChild`/`ExecuteCommands` pair
    /// describing it.
    pub fn execute_commands(
        &self,
        secondaries: &[(Arc<CommandRecord>, vk::CommandBuffer, AnyHandleRef)],
    ) -> Result<()> {
        for (secondary, command_buffer, handle_ref) in secondaries {
            self.keep_alive(handle_ref.clone())?;
            self.append(CommandKind::ExecuteCommandsChild {
                record_id: secondary.id(),
                command_buffer: *command_buffer,
            })?;
        }
        self.append(CommandKind::ExecuteCommands)
    }

    /// `vkEndCommandBuffer`: freezes the current recording into a shared,
    /// immutable [`CommandRecord`] and returns it so the caller can attach
    /// it to whatever submission-time bookkeeping it wants (e.g. handing it
    /// straight to the hook engine).
    pub fn end(&self) -> Result<Arc<CommandRecord>> {
        let mut state = self.state.lock().unwrap();
        let builder = match std::mem::replace(&mut *state, State::Initial) {
            State::Recording(b) => b,
            other => {
                *state = other;
                return Err(Error::Uncategorized("end called on a command buffer that is not recording"));
            }
        };
        let record = builder.finish();
        *state = State::Executable(record.clone());
        Ok(record)
    }

    /// The finished record ready for submission, if any (a command buffer
    /// that was allocated but never began/ended, or is mid-recording, has
    /// none).
    pub fn record(&self) -> Option<Arc<CommandRecord>> {
        match &*self.state.lock().unwrap() {
            State::Executable(r) => Some(r.clone()),
            _ => None,
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(&*self.state.lock().unwrap(), State::Recording(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_append_end_produces_a_record_with_the_appended_command() {
        let mut cbs = CommandBufferState::new(vk::CommandBuffer::null(), vk::CommandBufferLevel::PRIMARY);
        cbs.begin(0, vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        assert!(cbs.is_recording());
        cbs.append(CommandKind::SetLineWidth(2.0)).unwrap();
        let record = cbs.end().unwrap();
        assert_eq!(record.stats().total_commands, 1);
        assert!(!cbs.is_recording());
        assert!(Arc::ptr_eq(&record, &cbs.record().unwrap()));
    }

    #[test]
    fn append_before_begin_is_an_error() {
        let cbs = CommandBufferState::new(vk::CommandBuffer::null(), vk::CommandBufferLevel::PRIMARY);
        assert!(cbs.append(CommandKind::SetLineWidth(1.0)).is_err());
    }

    #[test]
    fn pool_tracks_and_untracks_allocated_buffers() {
        let pool = CommandPoolState::new(0);
        let cb = vk::CommandBuffer::from_raw(7);
        pool.track(cb);
        assert_eq!(pool.command_buffers(), vec![cb]);
        pool.untrack(cb);
        assert!(pool.command_buffers().is_empty());
    }
}
