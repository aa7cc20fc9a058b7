//! Command introspection and replay core for a Vulkan validation/debugging
//! layer.
//!
//! This crate is the engine behind a `VK_LAYER_*` implementation's
//! "inspect any command, on any frame, without the application changing a
//! line of code" feature: every `vkCmd*` call recorded by the application
//! is captured into a lightweight, arena-allocated tree
//! ([`command::CommandRecord`]); descriptor set contents are snapshotted
//! with copy-on-write semantics ([`descriptor::CowDescriptorSet`]); and a
//! hook engine ([`hook::HookEngine`]) decides, submission by submission,
//! whether to transparently splice in extra commands that capture timing,
//! attachments, descriptor bindings, or buffer contents around a command
//! the user selected.
//!
//! ```
//! use vil_core::command::{CommandKind, CommandRecordBuilder};
//!
//! let mut builder = CommandRecordBuilder::new(0);
//! builder.append(CommandKind::SetLineWidth(2.0));
//! let record = builder.finish();
//! assert_eq!(record.stats().total_commands, 1);
//! ```
//!
//! # Modules
//! - [`arena`] bump allocator backing every command record's tree.
//! - [`command`] the command tree, its matcher, and command re-emission.
//! - [`command_buffer`] command-buffer-level recording state (level, usage
//!   flags, the active [`command::CommandRecordBuilder`]).
//! - [`descriptor`] descriptor layouts, copy-on-write sets, snapshots, and
//!   update-template decoding.
//! - [`render_pass`] splitting one render pass into up to three around a
//!   target subpass.
//! - [`hook`] the hook engine, capture primitives, and hook records/state.
//! - [`copy`] the copy/readback library, including the sampled-copy
//!   compute pipeline bank.
//! - [`submission`] per-submission fence/hook-completion bookkeeping.
//! - [`registry`] reference-counted driver handle tracking with zombie
//!   retention.
//! - [`device`] the device-wide context tying all of the above together.
//! - [`env`] process-wide `VIL_*` environment configuration.
//! - [`error`] the crate's error type.

#[macro_use]
extern crate log;

pub mod arena;
pub mod command;
pub mod command_buffer;
pub mod copy;
pub mod descriptor;
pub mod device;
pub mod env;
pub mod error;
pub mod hook;
pub mod registry;
pub mod render_pass;
pub mod submission;

pub use error::{Error, Result};
