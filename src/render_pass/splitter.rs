//! Render pass splitter: derives up to three render passes
//! (`rp0`, `rp1`, `rp2`) around a target subpass so the hook engine can
//! insert a capture between subpasses of a render pass the application
//! recorded as one `vkCmdBeginRenderPass`/...`vkCmdEndRenderPass` block.
//!
//! `rp0` covers every subpass strictly before the target, `rp1` is the
//! target subpass alone, `rp2` covers every subpass strictly after. `rp0`
//! and `rp2` are absent when the target is the first or last subpass,
//! respectively. Attachments crossing a split boundary get their load/store
//! ops patched to `LOAD`/`STORE` so content survives the `vkCmdEndRenderPass`
//! / `vkCmdBeginRenderPass` pair we insert between them.

use ash::vk;

use crate::command::{AttachmentInfo, BeginRenderPassCmd};
use crate::error::{Error, Result};

/// Whether `rp`'s target subpass can be split out at all. A render pass
/// using multiview can't (subpass dependencies cross views in ways a
/// simple split would break), and a resolve attachment read or written by
/// a subpass after the target would see stale content if we forced an
/// early store.
pub fn is_splittable(rp: &BeginRenderPassCmd, target_subpass: u32) -> Result<()> {
    if rp.multiview {
        return Err(Error::RenderPassNotSplittable {
            subpass: target_subpass,
            reason: "render pass uses multiview",
        });
    }
    if target_subpass >= rp.subpass_count {
        return Err(Error::RenderPassNotSplittable {
            subpass: target_subpass,
            reason: "subpass index out of range",
        });
    }
    if rp.attachments.iter().any(|a| a.read_or_written_after) {
        return Err(Error::RenderPassNotSplittable {
            subpass: target_subpass,
            reason: "a resolve attachment is read or written by a later subpass",
        });
    }
    Ok(())
}

fn attachment_description(
    a: &AttachmentInfo,
    load_op: vk::AttachmentLoadOp,
    store_op: vk::AttachmentStoreOp,
    initial_layout: vk::ImageLayout,
    final_layout: vk::ImageLayout,
) -> vk::AttachmentDescription {
    vk::AttachmentDescription::builder()
        .format(a.format)
        .samples(a.samples)
        .load_op(load_op)
        .store_op(store_op)
        .stencil_load_op(a.stencil_load_op)
        .stencil_store_op(a.stencil_store_op)
        .initial_layout(initial_layout)
        .final_layout(final_layout)
        .build()
}

/// Which segment of the split a render pass half is: governs whether its
/// boundary layouts are the original `initial`/`final_layout` or the
/// `GENERAL` layout the other segments hand off through: rp0 ends each
/// attachment it touches in `GENERAL` layout with a forced store, rp1
/// begins with attachments in `GENERAL`/load and (unless it's also the
/// last segment) ends in `GENERAL`/store, rp2 begins with attachments in
/// `GENERAL`/load and restores the original final layouts.
struct SegmentLayouts {
    force_load: bool,
    force_store: bool,
    initial_is_general: bool,
    final_is_general: bool,
}

fn build_segment(
    device: &ash::Device,
    attachments: &[AttachmentInfo],
    subpasses: &[vk::SubpassDescription],
    layouts: SegmentLayouts,
) -> Result<vk::RenderPass> {
    let descs: Vec<vk::AttachmentDescription> = attachments
        .iter()
        .map(|a| {
            let load_op = if layouts.force_load { vk::AttachmentLoadOp::LOAD } else { a.load_op };
            let store_op = if layouts.force_store { vk::AttachmentStoreOp::STORE } else { a.store_op };
            let initial_layout = if layouts.initial_is_general { vk::ImageLayout::GENERAL } else { a.initial_layout };
            let final_layout = if layouts.final_is_general { vk::ImageLayout::GENERAL } else { a.final_layout };
            attachment_description(a, load_op, store_op, initial_layout, final_layout)
        })
        .collect();
    let info = vk::RenderPassCreateInfo::builder().attachments(&descs).subpasses(subpasses);
    unsafe { device.create_render_pass(&info, None) }.map_err(Error::from)
}

/// Render passes derived around the target subpass. `rp1` is always
/// present; `rp0`/`rp2` are `None` exactly when the target is the first or
/// last subpass.
pub struct SplitRenderPasses {
    pub rp0: Option<vk::RenderPass>,
    pub rp1: vk::RenderPass,
    pub rp2: Option<vk::RenderPass>,
}

/// Splits `rp` around `target_subpass`. `subpasses` must be the exact
/// subpass description array the render pass was originally created with
/// (the splitter doesn't reconstruct subpass dependencies/attachment
/// references from the command tree; those come from wherever the layer's
/// render pass registry keeps the original `VkRenderPassCreateInfo`).
pub fn split(
    device: &ash::Device,
    rp: &BeginRenderPassCmd,
    target_subpass: u32,
    subpasses: &[vk::SubpassDescription],
) -> Result<SplitRenderPasses> {
    is_splittable(rp, target_subpass)?;
    let target = target_subpass as usize;
    if subpasses.len() != rp.subpass_count as usize {
        return Err(Error::RenderPassNotSplittable {
            subpass: target_subpass,
            reason: "subpass description count does not match the recorded render pass",
        });
    }
    let attachments: Vec<AttachmentInfo> = rp.attachments.to_vec();
    let has_rp2 = target + 1 < subpasses.len();

    // rp0: original initial layout in, GENERAL out (every attachment it
    // touches gets stored so rp1 can pick it back up via LOAD).
    let rp0 = if target > 0 {
        Some(build_segment(
            device,
            &attachments,
            &subpasses[..target],
            SegmentLayouts {
                force_load: false,
                force_store: true,
                initial_is_general: false,
                final_is_general: true,
            },
        )?)
    } else {
        None
    };

    // rp1: GENERAL in (unless it's also the first subpass, i.e. no rp0),
    // GENERAL out (unless it's also the last, i.e. no rp2).
    let rp1 = build_segment(
        device,
        &attachments,
        std::slice::from_ref(&subpasses[target]),
        SegmentLayouts {
            force_load: rp0.is_some(),
            force_store: has_rp2,
            initial_is_general: rp0.is_some(),
            final_is_general: has_rp2,
        },
    )?;

    // rp2: GENERAL in (handed off from rp1), original final layout out.
    let rp2 = if has_rp2 {
        Some(build_segment(
            device,
            &attachments,
            &subpasses[target + 1..],
            SegmentLayouts {
                force_load: true,
                force_store: false,
                initial_is_general: true,
                final_is_general: false,
            },
        )?)
    } else {
        None
    };

    Ok(SplitRenderPasses { rp0, rp1, rp2 })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(read_or_written_after: bool) -> AttachmentInfo {
        AttachmentInfo {
            view: vk::ImageView::null(),
            image: vk::Image::null(),
            format: vk::Format::R8G8B8A8_UNORM,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            aspect_mask: vk::ImageAspectFlags::COLOR,
            read_or_written_after,
        }
    }

    fn rp(multiview: bool, subpass_count: u32, attachments: Vec<AttachmentInfo>) -> BeginRenderPassCmd {
        let mut arena = crate::arena::Arena::new();
        BeginRenderPassCmd {
            render_pass: vk::RenderPass::null(),
            framebuffer: vk::Framebuffer::null(),
            render_area: vk::Rect2D::default(),
            clear_values: Default::default(),
            attachments: arena.copy_slice(&attachments),
            subpass_count,
            multiview,
            contents: vk::SubpassContents::INLINE,
        }
    }

    #[test]
    fn multiview_is_never_splittable() {
        let cmd = rp(true, 2, vec![attachment(false)]);
        assert!(is_splittable(&cmd, 0).is_err());
    }

    #[test]
    fn resolve_read_after_blocks_splitting() {
        let cmd = rp(false, 3, vec![attachment(true)]);
        assert!(is_splittable(&cmd, 1).is_err());
    }

    #[test]
    fn ordinary_multi_subpass_pass_is_splittable() {
        let cmd = rp(false, 3, vec![attachment(false)]);
        assert!(is_splittable(&cmd, 1).is_ok());
        assert!(is_splittable(&cmd, 5).is_err());
    }
}
