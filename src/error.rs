//! Exposes the crate's error type.

use ash::vk;
use thiserror::Error;

/// Error type returned by fallible entry points of the introspection core.
///
/// Recording-path and submission-path callers generally do not propagate
/// these to the application; they are logged and the
/// affected feature degrades instead. The type still exists so internal
/// plumbing can use `?` freely and callers that *do* want to observe a
/// failure (tests, the hook engine's own bookkeeping) have something
/// concrete to match on.
#[derive(Error, Debug)]
pub enum Error {
    /// The arena's backing allocator failed. This is fatal: the
    /// record can no longer be used for anything.
    #[error("Arena backing allocation failed")]
    ArenaOutOfMemory,
    /// A closed command-variant downcast did not match the expected kind.
    /// This indicates an internal bug (the hook engine looked at a command
    /// it shouldn't have) rather than anything the application did.
    #[error("Invalid command downcast: expected `{expected}`, found `{found}`")]
    InvalidDowncast {
        expected: &'static str,
        found: &'static str,
    },
    /// The device was lost. Propagated from the driver.
    #[error("Vulkan device lost")]
    DeviceLost,
    /// A render pass could not be split at the requested subpass.
    #[error("Render pass not splittable at subpass {subpass}: {reason}")]
    RenderPassNotSplittable { subpass: u32, reason: &'static str },
    /// The `CommandRecord` a hook or GUI consumer was holding a path into
    /// has been invalidated (a referenced handle was destroyed).
    #[error("Command record invalidated")]
    RecordInvalidated,
    /// A handle looked up in the resource registry no longer exists there.
    #[error("Handle of kind `{0:?}` no longer present in the resource registry")]
    HandleDestroyed(crate::registry::HandleKind),
    /// Timing queries are not supported on the queue family the command
    /// was recorded for.
    #[error("Timestamp queries unavailable on this queue family")]
    TimingUnavailable,
    /// A descriptor binding/element index was out of the range the
    /// descriptor set layout describes.
    #[error("Descriptor index out of range: binding {binding}, element {element}")]
    DescriptorOutOfRange { binding: u32, element: u32 },
    /// No hook record could be produced because the target path no longer
    /// resolves in the live command tree.
    #[error("Target command path no longer resolves")]
    TargetNotFound,
    /// Generic Vulkan error passthrough.
    #[error("Vulkan error: `{0}`")]
    Vk(vk::Result),
    /// Uncategorized error, used sparingly for leaf conditions that don't
    /// warrant their own variant yet.
    #[error("{0}")]
    Uncategorized(&'static str),
}

impl From<vk::Result> for Error {
    fn from(value: vk::Result) -> Self {
        Error::Vk(value)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
