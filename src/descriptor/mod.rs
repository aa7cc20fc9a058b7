//! Descriptor state tracking: a per-binding packed content layout,
//! copy-on-write snapshotting, submission-time snapshot capture, and
//! descriptor-update-template decoding.

pub mod cow;
pub mod layout;
pub mod set;
pub mod snapshot;
pub mod template;

pub use cow::CowDescriptorSet;
pub use layout::{BindingLayout, SetLayout};
pub use set::{DescriptorCategory, DescriptorElement, DescriptorSetContents};
pub use snapshot::DescriptorSnapshotMap;
pub use template::{apply_template, TemplateEntry};
