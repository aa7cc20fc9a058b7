//! `CommandRecord`/`Command` tree construction.

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use ash::vk;

use crate::arena::{Arena, ArenaRef};
use crate::command::{CommandCategory, CommandKind};
use crate::registry::AnyHandleRef;

/// How many recently-bound pipelines a section remembers. Kept small:
/// this feeds the matcher, not a full history.
pub const RECENT_PIPELINES_CAP: usize = 4;

/// Aggregated statistics for a section, rolled up recursively over its
/// entire subtree (used by the matcher to compare sections
/// across re-recordings without walking every leaf command).
#[derive(Debug, Clone)]
pub struct SectionStats {
    category_counts: [u32; 12],
    pub total_commands: u32,
    pub nested_sections: u32,
    recent_pipelines: [Option<vk::Pipeline>; RECENT_PIPELINES_CAP],
    next_pipeline_slot: usize,
}

impl Default for SectionStats {
    fn default() -> Self {
        SectionStats {
            category_counts: [0; 12],
            total_commands: 0,
            nested_sections: 0,
            recent_pipelines: [None; RECENT_PIPELINES_CAP],
            next_pipeline_slot: 0,
        }
    }
}

fn category_index(cat: CommandCategory) -> usize {
    use CommandCategory::*;
    match cat {
        Bind => 0,
        Sync => 1,
        Draw => 2,
        Dispatch => 3,
        Transfer => 4,
        End => 5,
        Query => 6,
        TraceRays => 7,
        BuildAccelStruct => 8,
        BeginRenderPass => 9,
        RenderSection => 10,
        Other => 11,
    }
}

impl SectionStats {
    pub fn count(&self, cat: CommandCategory) -> u32 {
        self.category_counts[category_index(cat)]
    }

    pub fn draws(&self) -> u32 {
        self.count(CommandCategory::Draw)
    }

    pub fn dispatches(&self) -> u32 {
        self.count(CommandCategory::Dispatch)
    }

    pub fn sync_ops(&self) -> u32 {
        self.count(CommandCategory::Sync)
    }

    pub fn recent_pipelines(&self) -> impl Iterator<Item = vk::Pipeline> + '_ {
        self.recent_pipelines.iter().filter_map(|p| *p)
    }

    fn record(&mut self, cat: CommandCategory) {
        self.category_counts[category_index(cat)] += 1;
        self.total_commands += 1;
    }

    fn record_pipeline(&mut self, pipeline: vk::Pipeline) {
        self.recent_pipelines[self.next_pipeline_slot] = Some(pipeline);
        self.next_pipeline_slot = (self.next_pipeline_slot + 1) % RECENT_PIPELINES_CAP;
    }
}

/// Bookkeeping attached to every section/parent command (and to the
/// synthetic root, held directly by `CommandRecord`).
pub struct Section {
    children_head: Cell<Option<ArenaRef<Command>>>,
    children_tail: Cell<Option<ArenaRef<Command>>>,
    first_child_parent: Cell<Option<ArenaRef<Command>>>,
    last_child_parent: Cell<Option<ArenaRef<Command>>>,
    pub stats: RefCell<SectionStats>,
}

impl Default for Section {
    fn default() -> Self {
        Section {
            children_head: Cell::new(None),
            children_tail: Cell::new(None),
            first_child_parent: Cell::new(None),
            last_child_parent: Cell::new(None),
            stats: RefCell::new(SectionStats::default()),
        }
    }
}

/// One node in a command record's tree. Stores only data (`CommandKind` is
/// `Copy`, `Section`'s `Cell`/`RefCell` fields are the only interior
/// mutability needed during recording) so bump-freeing the arena is sound
/// with no destructor to run.
pub struct Command {
    pub kind: CommandKind,
    section: Option<Section>,
    next: Cell<Option<ArenaRef<Command>>>,
}

impl Command {
    pub fn name(&self) -> String {
        self.kind.name()
    }

    pub fn category(&self) -> CommandCategory {
        self.kind.category()
    }

    pub fn is_parent(&self) -> bool {
        self.section.is_some()
    }

    pub fn children(&self) -> ChildIter<'_> {
        ChildIter {
            cur: self.section.as_ref().and_then(|s| s.children_head.get()),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn first_child_parent(&self) -> Option<ArenaRef<Command>> {
        self.section.as_ref().and_then(|s| s.first_child_parent.get())
    }

    pub fn stats(&self) -> Option<std::cell::Ref<'_, SectionStats>> {
        self.section.as_ref().map(|s| s.stats.borrow())
    }

    pub fn next(&self) -> Option<ArenaRef<Command>> {
        self.next.get()
    }
}

pub struct ChildIter<'a> {
    cur: Option<ArenaRef<Command>>,
    _marker: std::marker::PhantomData<&'a Command>,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = ArenaRef<Command>;
    fn next(&mut self) -> Option<ArenaRef<Command>> {
        let cur = self.cur?;
        self.cur = cur.next();
        Some(cur)
    }
}

static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);

/// Builder-side view of a `CommandRecord`: exclusive-borrowed while the
/// owning `CommandBuffer` is recording, matching the
/// in-progress/finished split used for the
/// same "can't touch this after it's done" shape.
pub struct CommandRecordBuilder {
    arena: Arena,
    root: Section,
    queue_family: u32,
    resource_refs: Vec<AnyHandleRef>,
    section_stack: Vec<ArenaRef<Command>>,
    id: u64,
}

impl CommandRecordBuilder {
    pub fn new(queue_family: u32) -> Self {
        CommandRecordBuilder {
            arena: Arena::new(),
            root: Section::default(),
            queue_family,
            resource_refs: Vec::new(),
            section_stack: Vec::new(),
            id: NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn arena(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// Keeps a registry handle alive for at least the record's lifetime
    /// (the record's resource reference list).
    pub fn keep_alive(&mut self, handle: AnyHandleRef) {
        self.resource_refs.push(handle);
    }

    fn current_section(&self) -> Option<ArenaRef<Command>> {
        self.section_stack.last().copied()
    }

    fn stats_chain(&self) -> impl Iterator<Item = ArenaRef<Command>> + '_ {
        self.section_stack.iter().copied()
    }

    fn link_child(&mut self, node: ArenaRef<Command>) {
        match self.current_section() {
            Some(parent) => {
                let section = parent.section.as_ref().expect("pushed node must be a section");
                match section.children_tail.get() {
                    Some(tail) => tail.next.set(Some(node)),
                    None => section.children_head.set(Some(node)),
                }
                section.children_tail.set(Some(node));
                if node.is_parent() {
                    if section.first_child_parent.get().is_none() {
                        section.first_child_parent.set(Some(node));
                    }
                    section.last_child_parent.set(Some(node));
                }
            }
            None => {
                match self.root.children_tail.get() {
                    Some(tail) => tail.next.set(Some(node)),
                    None => self.root.children_head.set(Some(node)),
                }
                self.root.children_tail.set(Some(node));
                if node.is_parent() {
                    if self.root.first_child_parent.get().is_none() {
                        self.root.first_child_parent.set(Some(node));
                    }
                    self.root.last_child_parent.set(Some(node));
                }
            }
        }
    }

    fn bump_stats(&mut self, kind: &CommandKind) {
        let cat = kind.category();
        let is_section = kind.is_section();
        let pipeline = match kind {
            CommandKind::BindPipeline { pipeline, .. } => Some(*pipeline),
            _ => None,
        };

        self.root.stats.borrow_mut().record(cat);
        if is_section {
            self.root.stats.borrow_mut().nested_sections += 1;
        }
        if let Some(p) = pipeline {
            self.root.stats.borrow_mut().record_pipeline(p);
        }

        for ancestor in self.stats_chain().collect::<Vec<_>>() {
            let section = ancestor.section.as_ref().expect("ancestors are sections");
            section.stats.borrow_mut().record(cat);
            if let Some(p) = pipeline {
                section.stats.borrow_mut().record_pipeline(p);
            }
        }
        // `nested_sections` only increments on the *immediate* parent, not
        // every ancestor: it counts direct child sections.
        if is_section {
            if let Some(immediate) = self.current_section() {
                immediate
                    .section
                    .as_ref()
                    .unwrap()
                    .stats
                    .borrow_mut()
                    .nested_sections += 1;
            }
        }
    }

    /// Records one command: allocates it in the arena, links it as the
    /// last child of whatever section is currently open, updates every
    /// open ancestor's statistics, and opens/closes sections as needed.
    ///
    /// Subpass markers (`FirstSubpass`/`NextSubpass`) replace whatever
    /// subpass marker is currently open rather than nesting under it (they
    /// are siblings within the render pass). `EndRenderPass`
    /// closes an open subpass marker first, then the render pass itself.
    pub fn append(&mut self, kind: CommandKind) -> ArenaRef<Command> {
        let closes_subpass_before = matches!(kind, CommandKind::NextSubpass { .. })
            || matches!(kind, CommandKind::EndRenderPass);
        if closes_subpass_before {
            if let Some(top) = self.current_section() {
                if matches!(
                    top.kind,
                    CommandKind::FirstSubpass { .. } | CommandKind::NextSubpass { .. }
                ) {
                    self.section_stack.pop();
                }
            }
        }

        self.bump_stats(&kind);
        let is_section = kind.is_section();
        let closes_immediately = matches!(
            kind,
            CommandKind::EndRenderPass
                | CommandKind::EndDebugUtilsLabel
                | CommandKind::EndConditionalRendering
                | CommandKind::EndRendering
        );
        let node = self.arena.alloc(Command {
            kind,
            section: if is_section { Some(Section::default()) } else { None },
            next: Cell::new(None),
        });
        self.link_child(node);

        if is_section {
            self.section_stack.push(node);
        }
        if closes_immediately {
            self.section_stack.pop();
        }

        node
    }

    /// Freezes the record: no more commands can be appended afterward.
    /// Returns a shared, reference-counted, read-only record.
    pub fn finish(self) -> std::sync::Arc<CommandRecord> {
        std::sync::Arc::new(CommandRecord {
            arena: self.arena,
            root: self.root,
            queue_family: self.queue_family,
            resource_refs: self.resource_refs,
            invalidated: AtomicBool::new(false),
            hook_records: Mutex::new(Vec::new()),
            writer: Mutex::new(None),
            id: self.id,
        })
    }
}

/// A built, frozen command record: owns the arena the whole tree lives in,
/// a resource-reference list keeping referenced handle wrappers alive, and
/// the set of hook records derived from it.
pub struct CommandRecord {
    #[allow(dead_code)]
    arena: Arena,
    root: Section,
    pub queue_family: u32,
    resource_refs: Vec<AnyHandleRef>,
    invalidated: AtomicBool,
    hook_records: Mutex<Vec<std::sync::Arc<crate::hook::HookRecord>>>,
    /// Non-`None` while a submission is pending on this record: a record
    /// with a non-null writer is currently pending on a queue and
    /// destroying it is forbidden, enforced here by
    /// `Arc` refcounting: the submission tracker holds a clone of the
    /// `Arc<CommandRecord>` for as long as `writer` is set).
    writer: Mutex<Option<u64>>,
    id: u64,
}

impl CommandRecord {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn children(&self) -> ChildIter<'_> {
        ChildIter {
            cur: self.root.children_head.get(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn first_child_parent(&self) -> Option<ArenaRef<Command>> {
        self.root.first_child_parent.get()
    }

    pub fn stats(&self) -> std::cell::Ref<'_, SectionStats> {
        self.root.stats.borrow()
    }

    pub fn resource_refs(&self) -> &[AnyHandleRef] {
        &self.resource_refs
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
    }

    pub fn set_writer(&self, submission: Option<u64>) {
        *self.writer.lock().unwrap() = submission;
    }

    pub fn writer(&self) -> Option<u64> {
        *self.writer.lock().unwrap()
    }

    pub fn hook_records(&self) -> std::sync::MutexGuard<'_, Vec<std::sync::Arc<crate::hook::HookRecord>>> {
        self.hook_records.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(kind: CommandKind) -> CommandKind {
        kind
    }

    #[test]
    fn simple_linear_record_links_siblings_in_order() {
        let mut b = CommandRecordBuilder::new(0);
        b.append(leaf(CommandKind::SetLineWidth(1.0)));
        b.append(leaf(CommandKind::SetLineWidth(2.0)));
        b.append(leaf(CommandKind::SetLineWidth(3.0)));
        let rec = b.finish();
        let widths: Vec<f32> = rec
            .children()
            .map(|c| match c.kind {
                CommandKind::SetLineWidth(w) => w,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(widths, vec![1.0, 2.0, 3.0]);
        assert_eq!(rec.stats().total_commands, 3);
    }

    #[test]
    fn render_pass_nests_subpasses_and_rolls_up_stats() {
        use crate::command::{AttachmentInfo, BeginRenderPassCmd};
        let mut b = CommandRecordBuilder::new(0);
        let rp = b.append(CommandKind::BeginRenderPass(BeginRenderPassCmd {
            render_pass: vk::RenderPass::null(),
            framebuffer: vk::Framebuffer::null(),
            render_area: vk::Rect2D::default(),
            clear_values: Default::default(),
            attachments: Default::default(),
            subpass_count: 2,
            multiview: false,
            contents: vk::SubpassContents::INLINE,
        }));
        b.append(CommandKind::FirstSubpass {
            contents: vk::SubpassContents::INLINE,
        });
        b.append(CommandKind::Draw {
            vertex_count: 3,
            instance_count: 1,
            first_vertex: 0,
            first_instance: 0,
            state: b.arena().alloc(crate::command::GraphicsState {
                pipeline: vk::Pipeline::null(),
                pipeline_layout: vk::PipelineLayout::null(),
                vertex_buffers: Default::default(),
                index_buffer: None,
                descriptor_sets: Default::default(),
                dynamic: Default::default(),
                push_constants: Default::default(),
            }),
        });
        b.append(CommandKind::NextSubpass {
            contents: vk::SubpassContents::INLINE,
            subpass_index: 1,
        });
        b.append(CommandKind::EndRenderPass);

        let rec = b.finish();
        let rp_node = rec.children().next().unwrap();
        assert_eq!(rp_node.kind.name(), "BeginRenderPass(subpasses=2)");
        // first subpass, draw nested under it, next subpass, end render pass
        // => children of the render pass section: FirstSubpass, NextSubpass,
        // EndRenderPass (3 direct children; Draw is nested under FirstSubpass)
        let direct_children: Vec<_> = rp_node.children().collect();
        assert_eq!(direct_children.len(), 3);
        assert_eq!(rp_node.stats().unwrap().draws(), 1);
        assert_eq!(rec.stats().draws(), 1);
        let _ = rp;
    }
}
