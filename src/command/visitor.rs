//! Category-based command visitation, over the uniform capability set every
//! `CommandKind` exposes (`category`, `name`, `record_onto`, `match_score`,
//! and optionally `children`/`visit`) without needing a v-table per
//! command.
//!
//! Implementors override only the categories they care about; every other
//! category falls back to [`CommandVisitor::visit_other`] by default, so a
//! visitor interested only in, say, draws doesn't have to enumerate the
//! other eleven categories.

use crate::arena::ArenaRef;
use crate::command::{Command, CommandCategory};

pub trait CommandVisitor {
    fn visit_bind(&mut self, cmd: ArenaRef<Command>) {
        self.visit_other(cmd);
    }
    fn visit_sync(&mut self, cmd: ArenaRef<Command>) {
        self.visit_other(cmd);
    }
    fn visit_draw(&mut self, cmd: ArenaRef<Command>) {
        self.visit_other(cmd);
    }
    fn visit_dispatch(&mut self, cmd: ArenaRef<Command>) {
        self.visit_other(cmd);
    }
    fn visit_transfer(&mut self, cmd: ArenaRef<Command>) {
        self.visit_other(cmd);
    }
    fn visit_end(&mut self, cmd: ArenaRef<Command>) {
        self.visit_other(cmd);
    }
    fn visit_query(&mut self, cmd: ArenaRef<Command>) {
        self.visit_other(cmd);
    }
    fn visit_trace_rays(&mut self, cmd: ArenaRef<Command>) {
        self.visit_other(cmd);
    }
    fn visit_build_accel_struct(&mut self, cmd: ArenaRef<Command>) {
        self.visit_other(cmd);
    }
    fn visit_begin_render_pass(&mut self, cmd: ArenaRef<Command>) {
        self.visit_other(cmd);
    }
    fn visit_render_section(&mut self, cmd: ArenaRef<Command>) {
        self.visit_other(cmd);
    }
    /// Catch-all: the default implementation of every other `visit_*`
    /// method, and the target for the `Other` category itself.
    fn visit_other(&mut self, cmd: ArenaRef<Command>) {
        let _ = cmd;
    }

    /// Dispatches to the category-specific method for `cmd` alone (does
    /// not descend into children; see [`walk`] for a recursive traversal).
    fn visit(&mut self, cmd: ArenaRef<Command>) {
        match cmd.category() {
            CommandCategory::Bind => self.visit_bind(cmd),
            CommandCategory::Sync => self.visit_sync(cmd),
            CommandCategory::Draw => self.visit_draw(cmd),
            CommandCategory::Dispatch => self.visit_dispatch(cmd),
            CommandCategory::Transfer => self.visit_transfer(cmd),
            CommandCategory::End => self.visit_end(cmd),
            CommandCategory::Query => self.visit_query(cmd),
            CommandCategory::TraceRays => self.visit_trace_rays(cmd),
            CommandCategory::BuildAccelStruct => self.visit_build_accel_struct(cmd),
            CommandCategory::BeginRenderPass => self.visit_begin_render_pass(cmd),
            CommandCategory::RenderSection => self.visit_render_section(cmd),
            CommandCategory::Other => self.visit_other(cmd),
        }
    }
}

/// Recursively visits `cmd` and its whole subtree, depth-first, parent
/// before children.
pub fn walk(visitor: &mut impl CommandVisitor, cmd: ArenaRef<Command>) {
    visitor.visit(cmd);
    for child in cmd.children() {
        walk(visitor, child);
    }
}

/// Recursively visits every top-level command in a record and its
/// subtree.
pub fn walk_record(visitor: &mut impl CommandVisitor, record: &crate::command::CommandRecord) {
    for child in record.children() {
        walk(visitor, child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandKind, CommandRecordBuilder};

    struct CountDraws(u32);
    impl CommandVisitor for CountDraws {
        fn visit_draw(&mut self, _cmd: ArenaRef<Command>) {
            self.0 += 1;
        }
    }

    #[test]
    fn walk_visits_nested_draws() {
        let mut b = CommandRecordBuilder::new(0);
        b.append(CommandKind::BeginDebugUtilsLabel {
            name: b.arena().copy_str("pass"),
            color: [0.0; 4],
        });
        let state = b.arena().alloc(crate::command::GraphicsState {
            pipeline: ash::vk::Pipeline::null(),
            pipeline_layout: ash::vk::PipelineLayout::null(),
            vertex_buffers: Default::default(),
            index_buffer: None,
            descriptor_sets: Default::default(),
            dynamic: Default::default(),
            push_constants: Default::default(),
        });
        b.append(CommandKind::Draw {
            vertex_count: 3,
            instance_count: 1,
            first_vertex: 0,
            first_instance: 0,
            state,
        });
        b.append(CommandKind::EndDebugUtilsLabel);

        let rec = b.finish();
        let mut counter = CountDraws(0);
        walk_record(&mut counter, &rec);
        assert_eq!(counter.0, 1);
    }
}
