//! Render pass splitting around a target subpass.

mod splitter;

pub use splitter::{is_splittable, split, SplitRenderPasses};
