//! Render pass splitter against a real device: splitting a compatible
//! two-subpass render pass around its second subpass must produce three
//! valid, usable `VkRenderPass` handles (testable property 7).
//!
//! Requires a loadable Vulkan driver; `#[ignore]`d by default (see
//! `tests/framework/mod.rs`).

use anyhow::Result;
use ash::vk;

use vil_core::arena::Arena;
use vil_core::command::{AttachmentInfo, BeginRenderPassCmd};
use vil_core::render_pass::split;

mod framework;

fn single_color_attachment_rp(arena: &mut Arena, format: vk::Format) -> BeginRenderPassCmd {
    let attachments = [AttachmentInfo {
        view: vk::ImageView::null(),
        image: vk::Image::null(),
        format,
        samples: vk::SampleCountFlags::TYPE_1,
        load_op: vk::AttachmentLoadOp::CLEAR,
        store_op: vk::AttachmentStoreOp::STORE,
        stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
        stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
        initial_layout: vk::ImageLayout::UNDEFINED,
        final_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        aspect_mask: vk::ImageAspectFlags::COLOR,
        read_or_written_after: false,
    }];
    BeginRenderPassCmd {
        render_pass: vk::RenderPass::null(),
        framebuffer: vk::Framebuffer::null(),
        render_area: vk::Rect2D::default(),
        clear_values: arena.copy_slice(&[vk::ClearValue::default()]),
        attachments: arena.copy_slice(&attachments),
        subpass_count: 2,
        multiview: false,
        contents: vk::SubpassContents::INLINE,
    }
}

/// Splitting a two-subpass render pass around subpass 1 (the last one)
/// yields an `rp0`/`rp1` pair and no `rp2`; both handles must be real,
/// distinct, destroyable render passes.
#[test]
#[ignore]
fn splitting_last_subpass_yields_rp0_and_rp1_only() -> Result<()> {
    let ctx = framework::make_context()?;
    let mut arena = Arena::new();
    let rp_cmd = single_color_attachment_rp(&mut arena, vk::Format::R8G8B8A8_UNORM);

    let color_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let subpasses = [
        vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(std::slice::from_ref(&color_ref))
            .build(),
        vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(std::slice::from_ref(&color_ref))
            .build(),
    ];

    let split_passes = split(&ctx.device, &rp_cmd, 1, &subpasses)?;
    assert!(split_passes.rp0.is_some());
    assert!(split_passes.rp2.is_none());
    assert_ne!(split_passes.rp0.unwrap(), vk::RenderPass::null());
    assert_ne!(split_passes.rp1, vk::RenderPass::null());
    assert_ne!(split_passes.rp0.unwrap(), split_passes.rp1);

    unsafe {
        ctx.device.destroy_render_pass(split_passes.rp0.unwrap(), None);
        ctx.device.destroy_render_pass(split_passes.rp1, None);
    }
    Ok(())
}

/// A framebuffer built against the standalone `rp1` render pass must be
/// constructible, i.e. `rp1`'s attachment description is compatible with a
/// real image view of the declared format — this is what the hook
/// engine's mid-render-pass capture ultimately depends on.
#[test]
#[ignore]
fn rp1_is_usable_with_a_real_framebuffer() -> Result<()> {
    let ctx = framework::make_context()?;
    let mut arena = Arena::new();
    let format = vk::Format::R8G8B8A8_UNORM;
    let rp_cmd = single_color_attachment_rp(&mut arena, format);

    let color_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let subpasses = [vk::SubpassDescription::builder()
        .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
        .color_attachments(std::slice::from_ref(&color_ref))
        .build()];

    let split_passes = split(&ctx.device, &rp_cmd, 0, &subpasses)?;
    assert!(split_passes.rp0.is_none());
    assert!(split_passes.rp2.is_none());

    let extent = vk::Extent2D { width: 8, height: 8 };
    let (image, memory) = ctx.create_image_2d(format, extent, vk::ImageUsageFlags::COLOR_ATTACHMENT)?;
    let view_info = vk::ImageViewCreateInfo::builder()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });
    let view = unsafe { ctx.device.create_image_view(&view_info, None) }?;

    let fb_info = vk::FramebufferCreateInfo::builder()
        .render_pass(split_passes.rp1)
        .attachments(std::slice::from_ref(&view))
        .width(extent.width)
        .height(extent.height)
        .layers(1);
    let framebuffer = unsafe { ctx.device.create_framebuffer(&fb_info, None) }?;
    assert_ne!(framebuffer, vk::Framebuffer::null());

    unsafe {
        ctx.device.destroy_framebuffer(framebuffer, None);
        ctx.device.destroy_image_view(view, None);
        ctx.device.destroy_image(image, None);
        ctx.device.free_memory(memory, None);
        ctx.device.destroy_render_pass(split_passes.rp1, None);
    }
    Ok(())
}
