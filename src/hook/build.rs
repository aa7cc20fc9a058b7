//! Building a hook record: walks a command record's tree re-emitting every
//! command onto a fresh secondary command buffer, splitting the render
//! pass around the target subpass when it contains the selected command,
//! and interleaving the capture primitives the active [`HookOps`] ask for.
//!
//! Everything outside the selected command's immediate neighborhood is
//! re-emitted byte-for-byte via [`record_onto`]; only the target itself
//! gets capture commands wrapped around it.

use std::collections::HashMap;

use ash::vk;

use super::capture::{self, AttachmentKind, HookOps, TransferTarget};
use super::record::HookRecordBuilder;
use crate::arena::{ArenaRef, ArenaSlice};
use crate::command::{
    record_onto, AccelStructGeometryData, AttachmentInfo, BeginRenderPassCmd, Command, CommandKind, CommandPath, CommandRecord, PathElement,
    RecordContext,
};
use crate::copy::{self, CopyPipelineBank, ScalarKind};
use crate::descriptor::{DescriptorElement, DescriptorSnapshotMap};
use crate::error::{Error, Result};
use crate::render_pass;

/// The exact `VkSubpassDescription` array each splittable render pass was
/// created with, keyed by its handle. `CommandRecord` only stores the
/// per-attachment summaries the splitter needs to patch load/store ops
/// ([`AttachmentInfo`]), not the subpass/dependency structure of the
/// original `VkRenderPassCreateInfo` — that lives in the layer's own
/// render pass registry, outside this crate, and is handed in here.
pub type SubpassTable<'a> = HashMap<vk::RenderPass, &'a [vk::SubpassDescription]>;

/// Default capacity of a capture destination buffer when the true size of
/// the region being copied isn't known up front (indirect argument words,
/// bound vertex/index buffers). Captures are truncated to this bound
/// rather than sized exactly, trading completeness on unusually large
/// buffers for not having to inspect buffer creation info this crate
/// doesn't track.
pub const CAPTURE_BUFFER_CAP: vk::DeviceSize = 64 * 1024;

/// An image view descriptor binding resolved back to the image it views,
/// the way the enclosing layer's image-view registry tracks it — this
/// crate's own `DescriptorElement::Image` only carries the view handle
/// `vkUpdateDescriptorSets` was called with, not its parent image.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedImageView {
    pub image: vk::Image,
    pub format: vk::Format,
    pub aspect_mask: vk::ImageAspectFlags,
    pub extent: vk::Extent3D,
}

/// Creates the buffers and images a hook record copies captured data into,
/// and resolves the handle-only metadata this crate doesn't track itself
/// (image formats/extents, device addresses, transient descriptor sets).
/// This crate has no allocator of its own (see `copy.rs`); the device-wide
/// context that does own one implements this to hand back freshly bound
/// resources.
pub trait HookResourceFactory {
    fn create_capture_buffer(&mut self, size: vk::DeviceSize) -> Result<vk::Buffer>;
    fn create_capture_image(&mut self, format: vk::Format, extent: vk::Extent3D) -> Result<vk::Image>;

    /// Looks up the format of an already-created image this crate doesn't
    /// itself track (a transfer command's source/destination), needed to
    /// size a same-format capture destination image.
    fn image_format(&self, image: vk::Image) -> Option<vk::Format>;

    /// Resolves a descriptor-bound image view back to its parent image and
    /// format/extent, needed to capture a sampled/storage image descriptor.
    fn resolve_image_view(&self, view: vk::ImageView) -> Option<ResolvedImageView>;

    /// Resolves a buffer device address back to the buffer it was queried
    /// from, plus the address's offset within that buffer. Needed to
    /// capture acceleration-structure build geometry, which Vulkan
    /// addresses by `VkDeviceAddress` rather than `VkBuffer` handle.
    fn resolve_device_address(&self, address: vk::DeviceAddress) -> Option<(vk::Buffer, vk::DeviceSize)>;

    /// Allocates a transient descriptor set matching `layout` (one of
    /// `CopyPipelineBank`'s two set layouts), from a pool created with
    /// `VK_DESCRIPTOR_POOL_CREATE_FREE_DESCRIPTOR_SET_BIT` so the hook
    /// record can free it individually once retired.
    fn create_transient_descriptor_set(&mut self, layout: vk::DescriptorSetLayout) -> Result<(vk::DescriptorPool, vk::DescriptorSet)>;
}

struct BuildCtx<'a> {
    record_ctx: &'a RecordContext<'a>,
    ops: HookOps,
    subpasses: &'a SubpassTable<'a>,
    resources: &'a mut dyn HookResourceFactory,
    /// The sampled-copy/normalize-vertices compute pipeline bank, unset
    /// when the `shaderc` feature was unavailable at device creation time
    /// (see `DeviceState::new`); descriptor-image-as-buffer and
    /// acceleration-structure vertex-normalization captures degrade to a
    /// logged skip rather than an error when this is `None`.
    pipelines: Option<&'a CopyPipelineBank>,
    target_cmd: ArenaRef<Command>,
    builder: HookRecordBuilder,
    /// Set while inside a render pass segment where capture primitives
    /// that need a transfer/compute command (i.e. everything but
    /// `vkCmdWriteTimestamp`) cannot legally be recorded.
    skip_buffer_captures: bool,
    /// The attachment list and render area of the render pass currently (or
    /// just) enclosing the target, used by attachment captures once
    /// outside it.
    current_attachments: Option<(Vec<AttachmentInfo>, vk::Extent2D)>,
    /// Set between `begin_transform_feedback_capture` and the matching end
    /// call bracketing the target draw.
    xfb_active: bool,
}

const QUERY_BEGIN: u32 = 0;
const QUERY_END: u32 = 1;

/// Builds a hook record that re-emits `record` onto a freshly allocated
/// secondary command buffer, capturing the data `ops` asks for around the
/// command at `target`.
///
/// `subpasses` supplies the original subpass description array for any
/// render pass the splitter may need to split; a render pass missing from
/// the table is treated as unsplittable (its data is re-emitted whole,
/// with mid-render-pass captures skipped and a diagnostic logged).
pub fn build_hook_commands(
    record: &CommandRecord,
    record_ctx: &RecordContext,
    target: &CommandPath,
    ops: &HookOps,
    descriptor_snapshot: DescriptorSnapshotMap,
    timestamp_pool: Option<vk::QueryPool>,
    subpasses: &SubpassTable,
    resources: &mut dyn HookResourceFactory,
    pipelines: Option<&CopyPipelineBank>,
) -> Result<HookRecordBuilder> {
    let chain = resolve_chain(record, target).ok_or(Error::TargetNotFound)?;
    let target_cmd = *chain.last().ok_or(Error::TargetNotFound)?;

    let mut builder = HookRecordBuilder::new(record_ctx.cb, target.clone(), descriptor_snapshot);
    if let Some(pool) = timestamp_pool {
        builder = builder.with_timestamp_pool(pool);
    }

    let mut bctx = BuildCtx {
        record_ctx,
        ops: ops.clone(),
        subpasses,
        resources,
        pipelines,
        target_cmd,
        builder,
        skip_buffer_captures: false,
        current_attachments: None,
        xfb_active: false,
    };

    emit_siblings(&mut bctx, record.children(), &chain)?;
    Ok(bctx.builder)
}

/// Same matching rule [`crate::command::resolve_path`] uses (name + sibling
/// index per level), but collects every intermediate node instead of only
/// the final one, so the walk below can tell an ancestor of the target
/// apart from an unrelated sibling at each level.
fn resolve_chain(record: &CommandRecord, path: &[PathElement]) -> Option<Vec<ArenaRef<Command>>> {
    let mut chain = Vec::with_capacity(path.len());
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
        let found = found?;
        chain.push(found);
        current = Some(found);
    }
    Some(chain)
}

fn ptr_eq(a: ArenaRef<Command>, b: ArenaRef<Command>) -> bool {
    std::ptr::eq(&*a, &*b)
}

/// Walks one level of siblings, re-emitting everything unmodified except
/// along `chain`: the element of `chain` that belongs to this level is
/// either the target itself (chain exhausted), a render pass to descend
/// into with a subpass split, or a plain container to re-emit and recurse
/// into.
fn emit_siblings(bctx: &mut BuildCtx, children: impl Iterator<Item = ArenaRef<Command>>, chain: &[ArenaRef<Command>]) -> Result<()> {
    let Some((&next, rest)) = chain.split_first() else {
        for child in children {
            emit_subtree(bctx, child)?;
        }
        return Ok(());
    };

    for child in children {
        if ptr_eq(child, next) {
            if rest.is_empty() {
                emit_target(bctx, child)?;
            } else if matches!(child.kind, CommandKind::BeginRenderPass(_)) {
                emit_render_pass(bctx, child, rest)?;
            } else {
                record_onto(&child, bctx.record_ctx)?;
                emit_siblings(bctx, child.children(), rest)?;
            }
        } else {
            emit_subtree(bctx, child)?;
        }
    }
    Ok(())
}

/// Re-emits `cmd` and its whole subtree unmodified.
fn emit_subtree(bctx: &mut BuildCtx, cmd: ArenaRef<Command>) -> Result<()> {
    record_onto(&cmd, bctx.record_ctx)?;
    if cmd.is_parent() {
        for child in cmd.children() {
            emit_subtree(bctx, child)?;
        }
    }
    Ok(())
}

/// Emits the selected command itself, bracketed by whichever capture
/// primitives `ops` asks for that are legal at this point (outside any
/// active render pass unless `skip_buffer_captures` already says
/// otherwise).
fn emit_target(bctx: &mut BuildCtx, cmd: ArenaRef<Command>) -> Result<()> {
    if bctx.ops.timing {
        if let Some(pool) = bctx.builder_timestamp_pool() {
            capture::write_timestamp(bctx.record_ctx, pool, QUERY_BEGIN);
        }
    }
    if !bctx.skip_buffer_captures {
        capture_buffer_ops(bctx)?;
    } else {
        log::debug!("skipping buffer-based hook captures: target sits inside an unsplittable render pass");
    }

    record_onto(&cmd, bctx.record_ctx)?;
    if cmd.is_parent() {
        for child in cmd.children() {
            emit_subtree(bctx, child)?;
        }
    }

    if bctx.xfb_active {
        if let Some(xfb) = bctx.record_ctx.ext.transform_feedback.as_ref() {
            capture::end_transform_feedback_capture(bctx.record_ctx, xfb);
        }
        bctx.xfb_active = false;
    }

    if bctx.ops.timing {
        if let Some(pool) = bctx.builder_timestamp_pool() {
            capture::write_timestamp(bctx.record_ctx, pool, QUERY_END);
        }
    }
    if !bctx.skip_buffer_captures {
        capture_transfer_dst_ops(bctx)?;
        capture_attachment_ops(bctx)?;
    }
    Ok(())
}

impl<'a> BuildCtx<'a> {
    fn builder_timestamp_pool(&self) -> Option<vk::QueryPool> {
        // Stored on the builder rather than duplicated on BuildCtx; peeked
        // through a private accessor since HookRecordBuilder's field is
        // private to its own module.
        self.builder.timestamp_pool()
    }
}

fn subpass_index(marker: ArenaRef<Command>) -> u32 {
    match marker.kind {
        CommandKind::FirstSubpass { .. } => 0,
        CommandKind::NextSubpass { subpass_index, .. } => subpass_index,
        _ => 0,
    }
}

fn begin_render_pass_with(ctx: &RecordContext, render_pass: vk::RenderPass, rp: &BeginRenderPassCmd, contents: vk::SubpassContents) {
    let info = vk::RenderPassBeginInfo::builder()
        .render_pass(render_pass)
        .framebuffer(rp.framebuffer)
        .render_area(rp.render_area)
        .clear_values(&rp.clear_values);
    unsafe { ctx.device.cmd_begin_render_pass(ctx.cb, &info, contents) };
}

fn end_render_pass(ctx: &RecordContext) {
    unsafe { ctx.device.cmd_end_render_pass(ctx.cb) };
}

/// Handles a `BeginRenderPass` ancestor on the target's path: splits the
/// render pass around the target subpass when possible, re-emitting each
/// segment under its own derived render pass and interleaving captures in
/// the gaps between segments (the only points a transfer/compute capture
/// command can legally be recorded). Falls back to re-emitting the whole
/// render pass unmodified, with buffer-based captures skipped, when the
/// subpass table has no entry for it or the splitter rejects it.
fn emit_render_pass(bctx: &mut BuildCtx, begin: ArenaRef<Command>, rest: &[ArenaRef<Command>]) -> Result<()> {
    let rp = match begin.kind {
        CommandKind::BeginRenderPass(rp) => rp,
        _ => unreachable!("emit_render_pass called on a non-BeginRenderPass command"),
    };
    let marker = rest[0];
    let target_subpass = subpass_index(marker);

    let children: Vec<ArenaRef<Command>> = begin.children().collect();
    let marker_idx = children
        .iter()
        .position(|c| ptr_eq(*c, marker))
        .expect("target subpass marker must be a direct child of its BeginRenderPass");

    let split = bctx
        .subpasses
        .get(&rp.render_pass)
        .and_then(|descs| render_pass::split(bctx.record_ctx.device, &rp, target_subpass, descs).ok());

    let Some(split) = split else {
        log::debug!(
            "render pass {:?} not splittable at subpass {target_subpass}; re-emitting it unmodified and skipping mid-pass hook captures",
            rp.render_pass
        );
        begin_render_pass_with(bctx.record_ctx, rp.render_pass, &rp, rp.contents);
        bctx.skip_buffer_captures = true;
        emit_siblings(bctx, children.into_iter(), rest)?;
        bctx.skip_buffer_captures = false;
        end_render_pass(bctx.record_ctx);
        return Ok(());
    };

    if let Some(rp0) = split.rp0 {
        bctx.builder.track_render_pass(rp0);
    }
    bctx.builder.track_render_pass(split.rp1);
    if let Some(rp2) = split.rp2 {
        bctx.builder.track_render_pass(rp2);
    }

    if let Some(rp0) = split.rp0 {
        begin_render_pass_with(bctx.record_ctx, rp0, &rp, vk::SubpassContents::INLINE);
        for child in &children[..marker_idx] {
            emit_subtree(bctx, *child)?;
        }
        end_render_pass(bctx.record_ctx);
    }

    // Between rp0 and rp1: state as it will be fed into the target command,
    // captured while no render pass is active.
    if !bctx.ops.is_empty() {
        capture_buffer_ops(bctx)?;
    }

    begin_render_pass_with(bctx.record_ctx, split.rp1, &rp, marker_contents(marker));
    bctx.current_attachments = Some((rp.attachments.to_vec(), rp.render_area.extent));
    bctx.skip_buffer_captures = true;
    emit_siblings(bctx, marker.children(), &rest[1..])?;
    bctx.skip_buffer_captures = false;
    end_render_pass(bctx.record_ctx);

    // Between rp1 and rp2: attachments are in GENERAL layout here, the only
    // point their post-draw content can be copied out.
    if !bctx.ops.attachments.is_empty() {
        capture_attachment_ops(bctx)?;
    }
    bctx.current_attachments = None;

    if let Some(rp2) = split.rp2 {
        begin_render_pass_with(bctx.record_ctx, rp2, &rp, vk::SubpassContents::INLINE);
        // children[marker_idx + 1..] ends with the original EndRenderPass,
        // which we replace with our own end_render_pass() call below.
        for child in &children[marker_idx + 1..children.len() - 1] {
            emit_subtree(bctx, *child)?;
        }
        end_render_pass(bctx.record_ctx);
    }

    Ok(())
}

fn marker_contents(marker: ArenaRef<Command>) -> vk::SubpassContents {
    match marker.kind {
        CommandKind::FirstSubpass { contents } | CommandKind::NextSubpass { contents, .. } => contents,
        _ => vk::SubpassContents::INLINE,
    }
}

fn state_descriptor_sets(cmd: &Command) -> Option<ArenaSlice<crate::command::BoundDescriptorSet>> {
    match &cmd.kind {
        CommandKind::Draw { state, .. } | CommandKind::DrawIndexed { state, .. } | CommandKind::DrawIndirect { state, .. } | CommandKind::DrawIndirectCount { state, .. } => {
            Some(state.descriptor_sets)
        }
        CommandKind::Dispatch { state, .. } | CommandKind::DispatchIndirect { state, .. } | CommandKind::DispatchBase { state, .. } => Some(state.descriptor_sets),
        _ => None,
    }
}

fn state_vertex_buffers(cmd: &Command) -> Option<ArenaSlice<crate::command::BoundVertexBuffer>> {
    match &cmd.kind {
        CommandKind::Draw { state, .. } | CommandKind::DrawIndexed { state, .. } | CommandKind::DrawIndirect { state, .. } | CommandKind::DrawIndirectCount { state, .. } => {
            Some(state.vertex_buffers)
        }
        _ => None,
    }
}

fn state_index_buffer(cmd: &Command) -> Option<crate::command::BoundIndexBuffer> {
    match &cmd.kind {
        CommandKind::Draw { state, .. } | CommandKind::DrawIndexed { state, .. } | CommandKind::DrawIndirect { state, .. } | CommandKind::DrawIndirectCount { state, .. } => {
            state.index_buffer
        }
        _ => None,
    }
}

fn indirect_args(cmd: &Command) -> Option<(vk::Buffer, vk::DeviceSize)> {
    match cmd.kind {
        CommandKind::DrawIndirect { buffer, offset, .. } => Some((buffer, offset)),
        CommandKind::DrawIndirectCount { buffer, offset, .. } => Some((buffer, offset)),
        CommandKind::DispatchIndirect { buffer, offset, .. } => Some((buffer, offset)),
        _ => None,
    }
}

fn indirect_count_args(cmd: &Command) -> Option<(vk::Buffer, vk::DeviceSize)> {
    match cmd.kind {
        CommandKind::DrawIndirectCount {
            count_buffer,
            count_buffer_offset,
            ..
        } => Some((count_buffer, count_buffer_offset)),
        _ => None,
    }
}

fn is_draw_command(cmd: &Command) -> bool {
    matches!(
        cmd.kind,
        CommandKind::Draw { .. } | CommandKind::DrawIndexed { .. } | CommandKind::DrawIndirect { .. } | CommandKind::DrawIndirectCount { .. }
    )
}

/// The source side of a transfer command's region at `region_idx`,
/// derived straight from the command's own parameters. `None` either when
/// `cmd` isn't a transfer command or `region_idx` is out of range for it —
/// both logged by the caller, not treated as a hard error, since a stale
/// `transferIdx` shouldn't abort the whole hook record build.
fn transfer_src_target(cmd: &Command, region_idx: u32) -> Option<TransferTarget> {
    let idx = region_idx as usize;
    match &cmd.kind {
        CommandKind::CopyBuffer { src, regions, .. } => {
            let r = regions.get(idx)?;
            Some(TransferTarget::Buffer {
                buffer: *src,
                offset: r.src_offset,
                size: r.size,
            })
        }
        CommandKind::CopyImage { src, src_layout, regions, .. } => {
            let r = regions.get(idx)?;
            Some(TransferTarget::Image {
                image: *src,
                layout: *src_layout,
                subresource: r.src_subresource,
                offset: r.src_offset,
                extent: r.extent,
            })
        }
        CommandKind::CopyBufferToImage { src, regions, .. } => {
            let r = regions.get(idx)?;
            // Exact byte count depends on the image format, which a buffer
            // handle alone doesn't carry; capped rather than computed
            // precisely, same budget decision as vertex/index capture.
            Some(TransferTarget::Buffer {
                buffer: *src,
                offset: r.buffer_offset,
                size: CAPTURE_BUFFER_CAP,
            })
        }
        CommandKind::CopyImageToBuffer { src, src_layout, regions, .. } => {
            let r = regions.get(idx)?;
            Some(TransferTarget::Image {
                image: *src,
                layout: *src_layout,
                subresource: r.image_subresource,
                offset: r.image_offset,
                extent: r.image_extent,
            })
        }
        CommandKind::BlitImage { src, src_layout, regions, .. } => {
            let r = regions.get(idx)?;
            Some(TransferTarget::Image {
                image: *src,
                layout: *src_layout,
                subresource: r.src_subresource,
                offset: r.src_offsets[0],
                extent: blit_extent(r.src_offsets),
            })
        }
        CommandKind::ResolveImage { src, src_layout, regions, .. } => {
            let r = regions.get(idx)?;
            Some(TransferTarget::Image {
                image: *src,
                layout: *src_layout,
                subresource: r.src_subresource,
                offset: r.src_offset,
                extent: r.extent,
            })
        }
        CommandKind::UpdateBuffer { buffer, offset, data } => Some(TransferTarget::Buffer {
            buffer: *buffer,
            offset: *offset,
            size: data.len() as vk::DeviceSize,
        }),
        CommandKind::FillBuffer { buffer, offset, size, .. } => Some(TransferTarget::Buffer {
            buffer: *buffer,
            offset: *offset,
            size: *size,
        }),
        _ => None,
    }
}

/// The destination side of a transfer command's region at `region_idx`.
/// `UpdateBuffer`/`FillBuffer` have no separate destination: their target
/// buffer is captured once, on the source side.
fn transfer_dst_target(cmd: &Command, region_idx: u32) -> Option<TransferTarget> {
    let idx = region_idx as usize;
    match &cmd.kind {
        CommandKind::CopyBuffer { dst, regions, .. } => {
            let r = regions.get(idx)?;
            Some(TransferTarget::Buffer {
                buffer: *dst,
                offset: r.dst_offset,
                size: r.size,
            })
        }
        CommandKind::CopyImage { dst, dst_layout, regions, .. } => {
            let r = regions.get(idx)?;
            Some(TransferTarget::Image {
                image: *dst,
                layout: *dst_layout,
                subresource: r.dst_subresource,
                offset: r.dst_offset,
                extent: r.extent,
            })
        }
        CommandKind::CopyBufferToImage { dst, dst_layout, regions, .. } => {
            let r = regions.get(idx)?;
            Some(TransferTarget::Image {
                image: *dst,
                layout: *dst_layout,
                subresource: r.image_subresource,
                offset: r.image_offset,
                extent: r.image_extent,
            })
        }
        CommandKind::CopyImageToBuffer { dst, regions, .. } => {
            let r = regions.get(idx)?;
            Some(TransferTarget::Buffer {
                buffer: *dst,
                offset: r.buffer_offset,
                size: CAPTURE_BUFFER_CAP,
            })
        }
        CommandKind::BlitImage { dst, dst_layout, regions, .. } => {
            let r = regions.get(idx)?;
            Some(TransferTarget::Image {
                image: *dst,
                layout: *dst_layout,
                subresource: r.dst_subresource,
                offset: r.dst_offsets[0],
                extent: blit_extent(r.dst_offsets),
            })
        }
        CommandKind::ResolveImage { dst, dst_layout, regions, .. } => {
            let r = regions.get(idx)?;
            Some(TransferTarget::Image {
                image: *dst,
                layout: *dst_layout,
                subresource: r.dst_subresource,
                offset: r.dst_offset,
                extent: r.extent,
            })
        }
        _ => None,
    }
}

fn blit_extent(offsets: [vk::Offset3D; 2]) -> vk::Extent3D {
    vk::Extent3D {
        width: (offsets[1].x - offsets[0].x).unsigned_abs(),
        height: (offsets[1].y - offsets[0].y).unsigned_abs(),
        depth: (offsets[1].z - offsets[0].z).unsigned_abs().max(1),
    }
}

/// Records a single capture for `target`, creating the capture
/// buffer/image destination through `bctx.resources` and tracking it for
/// teardown. Image targets need `HookResourceFactory::image_format` since
/// the command's own parameters don't carry the image's format.
fn capture_transfer_target(bctx: &mut BuildCtx, target: TransferTarget) -> Result<()> {
    match target {
        TransferTarget::Buffer { buffer, offset, size } => {
            let size = size.min(CAPTURE_BUFFER_CAP).max(1);
            let dst = bctx.resources.create_capture_buffer(size)?;
            bctx.builder.track_buffer(dst);
            capture::capture_transfer_buffer(bctx.record_ctx, buffer, offset, size, dst);
        }
        TransferTarget::Image {
            image,
            layout,
            subresource,
            offset,
            extent,
        } => {
            let Some(format) = bctx.resources.image_format(image) else {
                log::debug!("transfer capture target {:?} has no resolvable format; skipping", image);
                return Ok(());
            };
            let dst = bctx.resources.create_capture_image(format, extent)?;
            bctx.builder.track_image(dst);
            capture::capture_transfer_image(bctx.record_ctx, image, layout, subresource, offset, extent, dst);
        }
    }
    Ok(())
}

/// Captures the destination side of a transfer command after it executes
/// (`transfer_dst`), mirroring `transfer_src`'s capture before it in
/// `capture_buffer_ops`. Valid at the same point attachment captures are:
/// outside any active render pass.
fn capture_transfer_dst_ops(bctx: &mut BuildCtx) -> Result<()> {
    if !bctx.ops.transfer_dst {
        return Ok(());
    }
    let cmd = bctx.target_cmd;
    match transfer_dst_target(&cmd, bctx.ops.transfer_region_index) {
        Some(target) => capture_transfer_target(bctx, target),
        None => {
            log::debug!(
                "transfer-destination capture requested for {:?} region {} but it has no capturable destination",
                cmd.name(),
                bctx.ops.transfer_region_index
            );
            Ok(())
        }
    }
}

/// Captures indirect arguments, the indirect draw count, bound vertex/index
/// buffers, buffer-typed and image-typed descriptor bindings, the transfer
/// source side of a transfer command, acceleration-structure build
/// geometry, and opens the transform-feedback capture scope around a draw —
/// everything that either is a `vkCmdCopyBuffer`/compute dispatch (which
/// Vulkan forbids inside an active render pass instance) or, for transform
/// feedback, must bracket the target command itself.
fn capture_buffer_ops(bctx: &mut BuildCtx) -> Result<()> {
    let cmd = bctx.target_cmd;

    if bctx.ops.transfer_src {
        match transfer_src_target(&cmd, bctx.ops.transfer_region_index) {
            Some(target) => capture_transfer_target(bctx, target)?,
            None => log::debug!(
                "transfer-source capture requested for {:?} region {} but it has no capturable source",
                cmd.name(),
                bctx.ops.transfer_region_index
            ),
        }
    }

    if bctx.ops.transform_feedback && is_draw_command(&cmd) {
        match bctx.record_ctx.ext.transform_feedback.as_ref() {
            Some(xfb) => {
                let dst = bctx.resources.create_capture_buffer(CAPTURE_BUFFER_CAP)?;
                bctx.builder.track_buffer(dst);
                capture::begin_transform_feedback_capture(bctx.record_ctx, xfb, dst, CAPTURE_BUFFER_CAP);
                bctx.xfb_active = true;
            }
            None => log::debug!("transform-feedback capture requested but VK_EXT_transform_feedback wasn't loaded"),
        }
    }

    if bctx.ops.accel_struct_builds {
        capture_accel_struct_build(bctx)?;
    }

    if bctx.ops.indirect_command {
        if let Some((buffer, offset)) = indirect_args(&cmd) {
            let dst = bctx.resources.create_capture_buffer(CAPTURE_BUFFER_CAP)?;
            bctx.builder.track_buffer(dst);
            capture::capture_buffer_region(bctx.record_ctx, buffer, offset, dst, CAPTURE_BUFFER_CAP);
        }
        if let Some((count_buffer, count_offset)) = indirect_count_args(&cmd) {
            let dst = bctx.resources.create_capture_buffer(4)?;
            bctx.builder.track_buffer(dst);
            capture::capture_indirect_count(bctx.record_ctx, count_buffer, count_offset, dst);
        }
    }

    if bctx.ops.vertex_buffers {
        if let Some(buffers) = state_vertex_buffers(&cmd) {
            for vb in buffers.iter() {
                let dst = bctx.resources.create_capture_buffer(CAPTURE_BUFFER_CAP)?;
                bctx.builder.track_buffer(dst);
                capture::capture_bound_buffer(bctx.record_ctx, vb.buffer, vb.offset, dst, CAPTURE_BUFFER_CAP)?;
            }
        }
    }

    if bctx.ops.index_buffer {
        if let Some(ib) = state_index_buffer(&cmd) {
            let dst = bctx.resources.create_capture_buffer(CAPTURE_BUFFER_CAP)?;
            bctx.builder.track_buffer(dst);
            capture::capture_bound_buffer(bctx.record_ctx, ib.buffer, ib.offset, dst, CAPTURE_BUFFER_CAP)?;
        }
    }

    for sel in bctx.ops.descriptor_bindings.clone() {
        let Some(sets) = state_descriptor_sets(&cmd) else { continue };
        let Some(bound) = sets.get(sel.set as usize) else { continue };
        let Some(contents) = bctx.builder.descriptor_snapshot().get(bound.set) else {
            continue;
        };
        let Ok(element) = contents.get(sel.binding, sel.element) else {
            continue;
        };
        match element {
            DescriptorElement::Buffer { buffer, offset, range } => {
                let size = if range == vk::WHOLE_SIZE { CAPTURE_BUFFER_CAP } else { range.min(CAPTURE_BUFFER_CAP) };
                let dst = bctx.resources.create_capture_buffer(size)?;
                bctx.builder.track_buffer(dst);
                capture::capture_buffer_region(bctx.record_ctx, buffer, offset, dst, size);
            }
            DescriptorElement::Image { sampler, view, layout } if sel.image_as_buffer => {
                let Some(bank) = bctx.pipelines else {
                    log::debug!("descriptor binding {:?} needs the sampled-copy pipeline bank, unavailable on this build", sel);
                    continue;
                };
                let Some(resolved) = bctx.resources.resolve_image_view(view) else {
                    log::debug!("descriptor binding {:?}'s image view doesn't resolve to a known image; skipping", sel);
                    continue;
                };
                let extent = vk::Extent2D {
                    width: resolved.extent.width,
                    height: resolved.extent.height,
                };
                let size = (resolved.extent.width as vk::DeviceSize) * (resolved.extent.height as vk::DeviceSize) * 16;
                let dst = bctx.resources.create_capture_buffer(size.min(CAPTURE_BUFFER_CAP).max(1))?;
                bctx.builder.track_buffer(dst);
                let set_layout = bank.for_kind(ScalarKind::of(resolved.format)).set_layout;
                let (pool, set) = bctx.resources.create_transient_descriptor_set(set_layout)?;
                bctx.builder.track_descriptor_set(pool, set);
                capture::capture_descriptor_image_sampled(bctx.record_ctx, bank, sampler, view, layout, resolved.format, extent, set, dst);
            }
            DescriptorElement::Image { view, layout, .. } => {
                let Some(resolved) = bctx.resources.resolve_image_view(view) else {
                    log::debug!("descriptor binding {:?}'s image view doesn't resolve to a known image; skipping", sel);
                    continue;
                };
                let dst = bctx.resources.create_capture_image(resolved.format, resolved.extent)?;
                bctx.builder.track_image(dst);
                capture::capture_attachment_direct(bctx.record_ctx, resolved.image, layout, dst, vk::ImageLayout::GENERAL, resolved.aspect_mask, resolved.extent);
            }
            _ => {
                log::debug!("descriptor binding {:?} isn't a buffer- or image-backed resource; skipping capture", sel);
            }
        }
    }

    Ok(())
}

/// Captures each `Triangles`/`Aabbs`/`Instances` geometry of a
/// `BuildAccelStructs`/`BuildAccelStructsIndirect` command: triangle vertex
/// streams are normalized into a plain `vec3` layout via the
/// vertex-normalization compute pass (the build's own vertex format may be
/// packed/quantized), AABB and non-pointer-table instance data are copied
/// through directly since they're already a fixed, well-known layout.
fn capture_accel_struct_build(bctx: &mut BuildCtx) -> Result<()> {
    let cmd = bctx.target_cmd;
    let infos: ArenaSlice<crate::command::AccelStructBuildInfo> = match &cmd.kind {
        CommandKind::BuildAccelStructs { infos } => *infos,
        CommandKind::BuildAccelStructsIndirect { infos, .. } => *infos,
        _ => return Ok(()),
    };

    for info in infos.iter() {
        for (geometry, range) in info.geometries.iter().zip(info.ranges.iter()) {
            match geometry.data {
                AccelStructGeometryData::Triangles(tri) => {
                    capture_triangle_geometry(bctx, &tri, range)?;
                }
                AccelStructGeometryData::Aabbs(aabbs) => {
                    capture_device_address_buffer(bctx, aabbs.data, range.primitive_count as vk::DeviceSize * aabbs.stride)?;
                }
                AccelStructGeometryData::Instances(inst) => {
                    if inst.array_of_pointers {
                        log::debug!("acceleration structure instance geometry uses an array of pointers; not dereferenced for capture");
                        continue;
                    }
                    capture_device_address_buffer(bctx, inst.data, range.primitive_count as vk::DeviceSize * 64)?;
                }
            }
        }
    }
    Ok(())
}

fn capture_triangle_geometry(bctx: &mut BuildCtx, tri: &crate::command::TrianglesGeometry, range: &vk::AccelerationStructureBuildRangeInfoKHR) -> Result<()> {
    let Some(bank) = bctx.pipelines else {
        log::debug!("triangle geometry capture needs the sampled-copy pipeline bank, unavailable on this build");
        return Ok(());
    };
    let address = unsafe { tri.vertex_data.device_address } + range.primitive_offset as vk::DeviceSize;
    let Some((src_buffer, src_base_offset)) = bctx.resources.resolve_device_address(address) else {
        log::debug!("triangle geometry vertex address doesn't resolve to a known buffer; skipping capture");
        return Ok(());
    };
    let vertex_count = (tri.max_vertex + 1).min((CAPTURE_BUFFER_CAP / 16) as u32);
    let dst = bctx.resources.create_capture_buffer(vertex_count as vk::DeviceSize * 16)?;
    bctx.builder.track_buffer(dst);
    let set_layout = bank.normalize_vertices.set_layout;
    let (pool, set) = bctx.resources.create_transient_descriptor_set(set_layout)?;
    bctx.builder.track_descriptor_set(pool, set);
    copy::normalize_triangle_geometry(
        bctx.record_ctx.device,
        bctx.record_ctx.cb,
        bank,
        set,
        src_buffer,
        src_base_offset,
        dst,
        tri.vertex_format,
        tri.vertex_stride,
        vertex_count,
    );
    Ok(())
}

fn capture_device_address_buffer(bctx: &mut BuildCtx, address: vk::DeviceOrHostAddressConstKHR, size: vk::DeviceSize) -> Result<()> {
    let raw = unsafe { address.device_address };
    let Some((buffer, base_offset)) = bctx.resources.resolve_device_address(raw) else {
        log::debug!("acceleration structure geometry address doesn't resolve to a known buffer; skipping capture");
        return Ok(());
    };
    let size = size.min(CAPTURE_BUFFER_CAP).max(1);
    let dst = bctx.resources.create_capture_buffer(size)?;
    bctx.builder.track_buffer(dst);
    capture::capture_buffer_region(bctx.record_ctx, buffer, base_offset, dst, size);
    Ok(())
}

/// Captures the requested attachments by direct image copy, valid only
/// while the attachment sits in `GENERAL` layout between the split render
/// pass segments.
fn capture_attachment_ops(bctx: &mut BuildCtx) -> Result<()> {
    let Some((attachments, render_extent)) = bctx.current_attachments.clone() else {
        if !bctx.ops.attachments.is_empty() {
            log::debug!("attachment captures requested but the target isn't inside a render pass; skipping");
        }
        return Ok(());
    };
    let extent = vk::Extent3D {
        width: render_extent.width,
        height: render_extent.height,
        depth: 1,
    };

    for sel in bctx.ops.attachments.clone() {
        let candidates: Vec<&AttachmentInfo> = attachments
            .iter()
            .filter(|a| {
                let is_depth_stencil = !(a.aspect_mask & (vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL)).is_empty();
                match sel.kind {
                    AttachmentKind::DepthStencil => is_depth_stencil,
                    // Color and input attachments aren't structurally distinguishable
                    // from AttachmentInfo alone (no per-subpass role tag); both draw
                    // from the same non-depth-stencil pool. See DESIGN.md.
                    AttachmentKind::Color | AttachmentKind::Input => !is_depth_stencil,
                }
            })
            .collect();
        let Some(att) = candidates.get(sel.id as usize) else {
            log::debug!("attachment selector {:?} has no matching attachment", sel);
            continue;
        };
        let dst = bctx.resources.create_capture_image(att.format, extent)?;
        bctx.builder.track_image(dst);
        capture::capture_attachment_direct(
            bctx.record_ctx,
            att.image,
            vk::ImageLayout::GENERAL,
            dst,
            vk::ImageLayout::GENERAL,
            att.aspect_mask,
            extent,
        );
    }
    Ok(())
}
