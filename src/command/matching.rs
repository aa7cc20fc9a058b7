//! Command and section matching: deciding whether a command
//! in a freshly-recorded tree is "the same" command the hook engine already
//! built a hook record for in a previous recording, so that hook records
//! can be reused instead of rebuilt every frame.

use std::collections::HashMap;

use crate::arena::ArenaRef;
use crate::command::{Command, CommandCategory, CommandRecord};

/// Score in `[0, 1]` estimating how likely `candidate` is the same logical
/// command as `reference`, across two different recordings of what the
/// application considers "the same" command buffer. `1.0` only when
/// category, exact variant, and display name all agree.
pub fn match_score(reference: &Command, candidate: &Command) -> f32 {
    if reference.category() != candidate.category() {
        return 0.0;
    }
    let mut score = 0.4;
    if std::mem::discriminant(&reference.kind) == std::mem::discriminant(&candidate.kind) {
        score += 0.3;
    }
    if reference.name() == candidate.name() {
        score += 0.3;
    }
    score.min(1.0)
}

/// Compares two sections' aggregated statistics rather than walking their
/// subtrees command-by-command: cheap enough to run on every candidate
/// section in a re-recorded tree. Exact equality of every counter yields
/// `1.0`; each mismatching counter reduces the score, floored at `0.0`.
pub fn section_stats_score(reference: &Command, candidate: &Command) -> f32 {
    let (Some(a), Some(b)) = (reference.stats(), candidate.stats()) else {
        return match_score(reference, candidate);
    };
    let checks: [(u32, u32); 5] = [
        (a.draws(), b.draws()),
        (a.dispatches(), b.dispatches()),
        (a.sync_ops(), b.sync_ops()),
        (a.total_commands, b.total_commands),
        (a.nested_sections, b.nested_sections),
    ];
    let matches = checks.iter().filter(|(x, y)| x == y).count();
    0.5 * match_score(reference, candidate) + 0.5 * (matches as f32 / checks.len() as f32)
}

/// One step identifying a command by its position among same-named
/// siblings under its parent (`sibling_index` disambiguates e.g. the third
/// `Draw` under a given section from the first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathElement {
    pub name: String,
    pub category: CommandCategory,
    pub sibling_index: u32,
}

/// A structural path from a record's root down to one command, stable
/// across re-recordings as long as the command sequence doesn't change
/// shape above it.
pub type CommandPath = Vec<PathElement>;

fn find_in(
    children: impl Iterator<Item = ArenaRef<Command>>,
    target: *const Command,
    path: &mut CommandPath,
) -> bool {
    let mut seen: HashMap<String, u32> = HashMap::new();
    for child in children {
        let name = child.name();
        let idx = *seen
            .entry(name.clone())
            .and_modify(|c| *c += 1)
            .or_insert(0);
        if std::ptr::eq(&*child, target) {
            path.push(PathElement {
                name,
                category: child.category(),
                sibling_index: idx,
            });
            return true;
        }
        if child.is_parent() {
            path.push(PathElement {
                name: name.clone(),
                category: child.category(),
                sibling_index: idx,
            });
            if find_in(child.children(), target, path) {
                return true;
            }
            path.pop();
        }
    }
    false
}

/// Builds the hierarchy path from `record`'s root down to `target`.
/// Returns `None` if `target` isn't part of `record`'s tree.
pub fn command_path(record: &CommandRecord, target: ArenaRef<Command>) -> Option<CommandPath> {
    let mut path = Vec::new();
    let target_ptr: *const Command = &*target;
    if find_in(record.children(), target_ptr, &mut path) {
        Some(path)
    } else {
        None
    }
}

/// Walks `path` down a (possibly differently-shaped) record, matching each
/// step by name and sibling index. Stops and returns `None` as soon as a
/// step can't be resolved, rather than guessing.
pub fn resolve_path(record: &CommandRecord, path: &[PathElement]) -> Option<ArenaRef<Command>> {
    let mut current: Option<ArenaRef<Command>> = None;
    for elem in path {
        let children: Vec<ArenaRef<Command>> = match &current {
            None => record.children().collect(),
            Some(c) => c.children().collect(),
        };
        let mut count = 0u32;
        let mut found = None;
        for child in children {
            if child.name() == elem.name {
                if count == elem.sibling_index {
                    found = Some(child);
                    break;
                }
                count += 1;
            }
        }
        current = found;
        current.as_ref()?;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandKind, CommandRecordBuilder};

    #[test]
    fn identical_commands_score_maximally() {
        let mut b = CommandRecordBuilder::new(0);
        b.append(CommandKind::SetLineWidth(1.0));
        let rec = b.finish();
        let c = rec.children().next().unwrap();
        assert_eq!(match_score(&c, &c), 1.0);
    }

    #[test]
    fn different_categories_score_zero() {
        let mut b = CommandRecordBuilder::new(0);
        b.append(CommandKind::SetLineWidth(1.0));
        b.append(CommandKind::EndRenderPass);
        let rec = b.finish();
        let mut it = rec.children();
        let a = it.next().unwrap();
        let c = it.next().unwrap();
        assert_eq!(match_score(&a, &c), 0.0);
    }

    #[test]
    fn path_round_trips_through_a_nested_section() {
        use crate::command::BeginRenderPassCmd;
        let mut b = CommandRecordBuilder::new(0);
        b.append(CommandKind::BeginRenderPass(BeginRenderPassCmd {
            render_pass: ash::vk::RenderPass::null(),
            framebuffer: ash::vk::Framebuffer::null(),
            render_area: ash::vk::Rect2D::default(),
            clear_values: Default::default(),
            attachments: Default::default(),
            subpass_count: 1,
            multiview: false,
            contents: ash::vk::SubpassContents::INLINE,
        }));
        b.append(CommandKind::FirstSubpass {
            contents: ash::vk::SubpassContents::INLINE,
        });
        b.append(CommandKind::SetLineWidth(2.0));
        b.append(CommandKind::EndRenderPass);
        let rec = b.finish();

        let rp = rec.children().next().unwrap();
        let subpass = rp.children().next().unwrap();
        let line_width = subpass.children().next().unwrap();

        let path = command_path(&rec, line_width).expect("target is in the tree");
        assert_eq!(path.len(), 3);
        let resolved = resolve_path(&rec, &path).expect("path resolves back");
        assert!(std::ptr::eq(&*resolved, &*line_width));
    }
}
