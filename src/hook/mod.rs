//! Hook engine: on each submission, decides whether to
//! replace the application's command buffer with an instrumented one that
//! captures the data the user asked for around a selected command, reusing
//! a previous hook record when the target command hasn't moved and nothing
//! it captures has changed.

pub mod build;
pub mod capture;
pub mod record;
pub mod state;

pub use build::{build_hook_commands, HookResourceFactory, SubpassTable};
pub use capture::{AttachmentKind, AttachmentSelector, DescriptorBindingSelector, HookOps};
pub use record::{HookRecord, HookRecordBuilder};
pub use state::HookState;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::command::{resolve_path, CommandPath, CommandRecord};
use crate::descriptor::DescriptorSnapshotMap;

/// Bound on the completed-hooks FIFO; a high watermark is logged rather
/// than grown unbounded.
const COMPLETED_CAP: usize = 64;

struct Target {
    record_id: u64,
    path: CommandPath,
    #[allow(dead_code)]
    retained_descriptor_snapshot: DescriptorSnapshotMap,
}

struct Inner {
    target: Option<Target>,
    hook_all: bool,
    ops: HookOps,
    /// Hook records already built for a given command record, keyed by
    /// that record's id, kept around across submissions for reuse.
    records: HashMap<u64, Vec<Arc<HookRecord>>>,
    completed: VecDeque<Arc<HookState>>,
}

/// What the caller should do with a command record about to be submitted.
pub enum HookDecision {
    /// Not a target: submit the application's own command buffer unchanged.
    Unchanged,
    /// An existing, non-pending hook record still resolves to the same
    /// target command; reuse it instead of rebuilding.
    Reuse(Arc<HookRecord>),
    /// No reusable record; the caller should re-walk `record` (see
    /// [`crate::command::walk_record`]) and build a new hook record for
    /// `path`, then call [`HookEngine::register`].
    Build { path: CommandPath, ops: HookOps },
}

pub struct HookEngine {
    inner: Mutex<Inner>,
}

impl HookEngine {
    pub fn new() -> Self {
        HookEngine {
            inner: Mutex::new(Inner {
                target: None,
                hook_all: false,
                ops: HookOps::default(),
                records: HashMap::new(),
                completed: VecDeque::new(),
            }),
        }
    }

    /// Declares the command the user wants to inspect and the descriptor
    /// sets to retain a snapshot of while it's selected.
    pub fn set_target(&self, record: &CommandRecord, path: CommandPath, descriptor_snapshot: DescriptorSnapshotMap, invalidate: bool) {
        let mut inner = self.inner.lock().unwrap();
        inner.target = Some(Target {
            record_id: record.id(),
            path,
            retained_descriptor_snapshot: descriptor_snapshot,
        });
        if invalidate {
            for records in inner.records.values() {
                for r in records {
                    r.invalidate();
                }
            }
        }
    }

    pub fn clear_target(&self) {
        self.inner.lock().unwrap().target = None;
    }

    /// "Hook all of this command buffer" mode.
    pub fn set_hook_all(&self, hook_all: bool) {
        self.inner.lock().unwrap().hook_all = hook_all;
    }

    /// Changing ops invalidates every outstanding hook
    /// record so their captured layouts match current needs.
    pub fn set_ops(&self, ops: HookOps) {
        let mut inner = self.inner.lock().unwrap();
        inner.ops = ops;
        for records in inner.records.values() {
            for r in records {
                r.invalidate();
            }
        }
    }

    pub fn ops(&self) -> HookOps {
        self.inner.lock().unwrap().ops.clone()
    }

    fn is_target(inner: &Inner, record: &CommandRecord) -> bool {
        inner.hook_all
            || inner.ops.accel_struct_builds
            || inner
                .target
                .as_ref()
                .map(|t| t.record_id == record.id())
                .unwrap_or(false)
    }

    /// The reuse/rebuild decision for `record`. Actually allocating the
    /// command pool the new secondary command buffer comes from is the
    /// caller's job, not this engine's — it needs a device-wide context
    /// this engine doesn't hold; [`HookDecision::Build`] hands back
    /// everything the caller needs to build one (see
    /// [`build::build_hook_commands`]), and the result is
    /// registered back via [`Self::register`].
    pub fn hook(&self, record: &Arc<CommandRecord>) -> HookDecision {
        let inner = self.inner.lock().unwrap();
        if !Self::is_target(&inner, record) {
            return HookDecision::Unchanged;
        }
        let Some(target) = &inner.target else {
            return HookDecision::Unchanged;
        };
        let target_path = target.path.clone();

        if let Some(existing) = inner.records.get(&record.id()).and_then(|rs| {
            rs.iter().find(|r| {
                !r.is_pending() && !r.is_invalidated() && r.target_path == target_path && resolve_path(record, &target_path).is_some()
            })
        }) {
            return HookDecision::Reuse(existing.clone());
        }

        if resolve_path(record, &target_path).is_none() {
            return HookDecision::Unchanged;
        }

        HookDecision::Build {
            path: target_path,
            ops: inner.ops.clone(),
        }
    }

    /// Registers a freshly built hook record as `record_id`'s current
    /// writer candidate.
    pub fn register(&self, record_id: u64, hook_record: Arc<HookRecord>) {
        self.inner.lock().unwrap().records.entry(record_id).or_default().push(hook_record);
    }

    /// Appends a finished hook state to the bounded FIFO, dropping the
    /// oldest entry once full.
    pub fn complete(&self, state: Arc<HookState>) {
        let mut inner = self.inner.lock().unwrap();
        if inner.completed.len() >= COMPLETED_CAP {
            inner.completed.pop_front();
            log::warn!("hook engine completed-states FIFO at capacity ({COMPLETED_CAP}); dropping oldest entry");
        }
        inner.completed.push_back(state);
    }

    pub fn completed(&self) -> Vec<Arc<HookState>> {
        self.inner.lock().unwrap().completed.iter().cloned().collect()
    }

    /// Drops every non-pending record attached to `record_id` once its
    /// hook has been invalidated or retired.
    pub fn retire(&self, record_id: u64) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(records) = inner.records.get_mut(&record_id) {
            records.retain(|r| r.is_pending());
        }
    }
}

impl Default for HookEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandKind, CommandRecordBuilder};

    fn record_with_one_command() -> Arc<CommandRecord> {
        let mut b = CommandRecordBuilder::new(0);
        b.append(CommandKind::SetLineWidth(1.0));
        b.finish()
    }

    #[test]
    fn untargeted_record_is_unchanged() {
        let engine = HookEngine::new();
        let rec = record_with_one_command();
        assert!(matches!(engine.hook(&rec), HookDecision::Unchanged));
    }

    #[test]
    fn targeted_record_with_no_existing_hook_asks_to_build() {
        let engine = HookEngine::new();
        let rec = record_with_one_command();
        let target = rec.children().next().unwrap();
        let path = crate::command::command_path(&rec, target).unwrap();
        engine.set_target(&rec, path, DescriptorSnapshotMap::new(), false);
        match engine.hook(&rec) {
            HookDecision::Build { .. } => {}
            _ => panic!("expected a build decision"),
        }
    }

    #[test]
    fn registered_non_pending_record_is_reused() {
        let engine = HookEngine::new();
        let rec = record_with_one_command();
        let target = rec.children().next().unwrap();
        let path = crate::command::command_path(&rec, target).unwrap();
        engine.set_target(&rec, path.clone(), DescriptorSnapshotMap::new(), false);

        let hook_record = HookRecordBuilder::new(ash::vk::CommandBuffer::null(), path, DescriptorSnapshotMap::new()).finish();
        engine.register(rec.id(), hook_record);

        assert!(matches!(engine.hook(&rec), HookDecision::Reuse(_)));
    }

    #[test]
    fn changing_ops_invalidates_registered_records() {
        let engine = HookEngine::new();
        let rec = record_with_one_command();
        let target = rec.children().next().unwrap();
        let path = crate::command::command_path(&rec, target).unwrap();
        engine.set_target(&rec, path.clone(), DescriptorSnapshotMap::new(), false);

        let hook_record = HookRecordBuilder::new(ash::vk::CommandBuffer::null(), path, DescriptorSnapshotMap::new()).finish();
        engine.register(rec.id(), hook_record.clone());

        engine.set_ops(HookOps {
            timing: true,
            ..Default::default()
        });
        assert!(hook_record.is_invalidated());
        match engine.hook(&rec) {
            HookDecision::Build { .. } => {}
            _ => panic!("invalidated record must not be reused"),
        }
    }

    #[test]
    fn completed_fifo_is_bounded() {
        let engine = HookEngine::new();
        for i in 0..(COMPLETED_CAP + 10) {
            engine.complete(Arc::new(HookState::new(i as u64, Vec::new())));
        }
        assert_eq!(engine.completed().len(), COMPLETED_CAP);
    }
}
