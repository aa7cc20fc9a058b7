//! Capture primitives and capture configuration used at the selected
//! command.

use ash::extensions::ext;
use ash::vk;

use crate::command::RecordContext;
use crate::copy::CopyPipelineBank;
use crate::error::Result;

/// Which framebuffer attachment list an [`AttachmentSelector`] indexes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Color,
    Input,
    DepthStencil,
}

/// Identifies one attachment to capture by kind and index within that kind
/// (chosen by kind and index rather than by raw attachment number).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentSelector {
    pub kind: AttachmentKind,
    pub id: u32,
}

/// Identifies one descriptor binding element to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBindingSelector {
    pub set: u32,
    pub binding: u32,
    pub element: u32,
    /// Capture an image descriptor through a compute shader that samples it
    /// and writes texels into a buffer, instead of a direct image copy.
    pub image_as_buffer: bool,
}

/// What the hook engine captures around the selected command. Changing
/// this invalidates every outstanding hook record: their capture layout
/// (which buffers/images they own) no longer matches.
#[derive(Debug, Clone, Default)]
pub struct HookOps {
    pub timing: bool,
    pub indirect_command: bool,
    pub attachments: Vec<AttachmentSelector>,
    pub descriptor_bindings: Vec<DescriptorBindingSelector>,
    pub transfer_src: bool,
    pub transfer_dst: bool,
    /// Which region of the target transfer command's region list
    /// `transfer_src`/`transfer_dst` derive their captured subresource/range
    /// from ("transferIdx").
    pub transfer_region_index: u32,
    pub vertex_buffers: bool,
    pub index_buffer: bool,
    pub transform_feedback: bool,
    pub accel_struct_builds: bool,
}

impl HookOps {
    pub fn is_empty(&self) -> bool {
        !self.timing
            && !self.indirect_command
            && self.attachments.is_empty()
            && self.descriptor_bindings.is_empty()
            && !self.transfer_src
            && !self.transfer_dst
            && !self.vertex_buffers
            && !self.index_buffer
            && !self.transform_feedback
            && !self.accel_struct_builds
    }
}

/// Writes a timestamp into `pool` at `query`, one of the two timing
/// writes bracketing the captured command.
pub fn write_timestamp(ctx: &RecordContext, pool: vk::QueryPool, query: u32) {
    unsafe {
        ctx.device
            .cmd_write_timestamp(ctx.cb, vk::PipelineStageFlags::ALL_COMMANDS, pool, query);
    }
}

/// Copies `size` bytes from `src` at `src_offset` into `dst` at offset 0
/// used by the indirect-command, descriptor-binding, and transfer capture
/// paths alike.
pub fn capture_buffer_region(
    ctx: &RecordContext,
    src: vk::Buffer,
    src_offset: vk::DeviceSize,
    dst: vk::Buffer,
    size: vk::DeviceSize,
) {
    let region = vk::BufferCopy {
        src_offset,
        dst_offset: 0,
        size,
    };
    unsafe {
        ctx.device.cmd_copy_buffer(ctx.cb, src, dst, std::slice::from_ref(&region));
    }
}

/// Copies the 4-byte draw count word a `DrawIndirectCount`-family command
/// reads, so the hook state can later bound the displayed argument list to
/// the count the device actually saw.
pub fn capture_indirect_count(ctx: &RecordContext, count_buffer: vk::Buffer, count_offset: vk::DeviceSize, dst: vk::Buffer) {
    capture_buffer_region(ctx, count_buffer, count_offset, dst, 4);
}

/// Direct image-to-image attachment copy, valid between rp0 and rp1 where
/// the attachment is guaranteed to be in `GENERAL` layout.
pub fn capture_attachment_direct(
    ctx: &RecordContext,
    src_image: vk::Image,
    src_layout: vk::ImageLayout,
    dst_image: vk::Image,
    dst_layout: vk::ImageLayout,
    aspect_mask: vk::ImageAspectFlags,
    extent: vk::Extent3D,
) {
    let subresource = vk::ImageSubresourceLayers {
        aspect_mask,
        mip_level: 0,
        base_array_layer: 0,
        layer_count: 1,
    };
    let region = vk::ImageCopy {
        src_subresource: subresource,
        src_offset: vk::Offset3D::default(),
        dst_subresource: subresource,
        dst_offset: vk::Offset3D::default(),
        extent,
    };
    unsafe {
        ctx.device.cmd_copy_image(
            ctx.cb,
            src_image,
            src_layout,
            dst_image,
            dst_layout,
            std::slice::from_ref(&region),
        );
    }
}

/// Copies up to `cap` bytes from a bound vertex or index buffer into an
/// owned capture buffer.
pub fn capture_bound_buffer(ctx: &RecordContext, src: vk::Buffer, src_offset: vk::DeviceSize, dst: vk::Buffer, cap: vk::DeviceSize) -> Result<()> {
    capture_buffer_region(ctx, src, src_offset, dst, cap);
    Ok(())
}

/// Either side of a transfer command's region at `transferIdx`, derived
/// from the command's own parameters rather than a separate registry
/// lookup — a `vkCmdCopyBuffer`/`vkCmdCopyImage`/etc. region already
/// carries everything needed to capture it.
#[derive(Debug, Clone, Copy)]
pub enum TransferTarget {
    Buffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    },
    Image {
        image: vk::Image,
        layout: vk::ImageLayout,
        subresource: vk::ImageSubresourceLayers,
        offset: vk::Offset3D,
        extent: vk::Extent3D,
    },
}

/// Copies a transfer command's buffer-side source/destination region into
/// an owned capture buffer.
pub fn capture_transfer_buffer(ctx: &RecordContext, buffer: vk::Buffer, offset: vk::DeviceSize, size: vk::DeviceSize, dst: vk::Buffer) {
    capture_buffer_region(ctx, buffer, offset, dst, size);
}

/// Copies a transfer command's image-side source/destination region into
/// an owned capture image sized to `extent`. `dst` is assumed freshly
/// created and in `GENERAL` layout, same assumption
/// [`capture_attachment_direct`] makes.
pub fn capture_transfer_image(
    ctx: &RecordContext,
    image: vk::Image,
    layout: vk::ImageLayout,
    subresource: vk::ImageSubresourceLayers,
    offset: vk::Offset3D,
    extent: vk::Extent3D,
    dst: vk::Image,
) {
    let dst_subresource = vk::ImageSubresourceLayers {
        aspect_mask: subresource.aspect_mask,
        mip_level: 0,
        base_array_layer: 0,
        layer_count: subresource.layer_count,
    };
    let region = vk::ImageCopy {
        src_subresource: subresource,
        src_offset: offset,
        dst_subresource,
        dst_offset: vk::Offset3D::default(),
        extent,
    };
    unsafe {
        ctx.device
            .cmd_copy_image(ctx.cb, image, layout, dst, vk::ImageLayout::GENERAL, std::slice::from_ref(&region));
    }
}

/// Binds an owned buffer as transform feedback buffer 0 and opens a
/// transform-feedback scope around the immediately following draw, so its
/// vertex/geometry-stage output lands in `dst` instead of (or alongside)
/// whatever the application itself bound. Requires the pipeline bound for
/// the draw to already emit transform-feedback varyings; this crate
/// doesn't patch shaders, so a pipeline that wasn't built with
/// `VK_EXT_transform_feedback` capture support just writes nothing.
pub fn begin_transform_feedback_capture(ctx: &RecordContext, xfb: &ext::TransformFeedback, dst: vk::Buffer, size: vk::DeviceSize) {
    unsafe {
        xfb.cmd_bind_transform_feedback_buffers(ctx.cb, 0, &[dst], &[0], &[size]);
        xfb.cmd_begin_transform_feedback(ctx.cb, 0, &[]);
    }
}

/// Closes the transform-feedback scope opened by
/// [`begin_transform_feedback_capture`].
pub fn end_transform_feedback_capture(ctx: &RecordContext, xfb: &ext::TransformFeedback) {
    unsafe {
        xfb.cmd_end_transform_feedback(ctx.cb, 0, &[]);
    }
}

/// Writes a combined-image-sampler + storage-buffer descriptor set for the
/// sampled-copy dispatch, then dispatches it.
pub fn capture_descriptor_image_sampled(
    ctx: &RecordContext,
    bank: &CopyPipelineBank,
    sampler: vk::Sampler,
    view: vk::ImageView,
    layout: vk::ImageLayout,
    format: vk::Format,
    extent: vk::Extent2D,
    descriptor_set: vk::DescriptorSet,
    dst_buffer: vk::Buffer,
) {
    let image_info = vk::DescriptorImageInfo {
        sampler,
        image_view: view,
        image_layout: layout,
    };
    let buffer_info = vk::DescriptorBufferInfo {
        buffer: dst_buffer,
        offset: 0,
        range: vk::WHOLE_SIZE,
    };
    let writes = [
        vk::WriteDescriptorSet::builder()
            .dst_set(descriptor_set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(std::slice::from_ref(&image_info))
            .build(),
        vk::WriteDescriptorSet::builder()
            .dst_set(descriptor_set)
            .dst_binding(1)
            .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
            .buffer_info(std::slice::from_ref(&buffer_info))
            .build(),
    ];
    unsafe { ctx.device.update_descriptor_sets(&writes, &[]) };
    crate::copy::dispatch_sampled_copy(ctx.device, ctx.cb, bank, descriptor_set, format, extent, 0);
}
