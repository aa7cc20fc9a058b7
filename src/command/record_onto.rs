//! Re-emission of a recorded [`CommandKind`] onto a target command buffer,
//! feeding both the render pass splitter's rp0/rp1/rp2 re-emission and the
//! hook engine's hook records.
//!
//! A command whose driver entry point comes from an extension that wasn't
//! loaded degrades gracefully: it's logged and skipped rather than
//! panicking, the same posture [`super::DeviceExtensions`] documents.

use ash::vk;

use crate::command::{Command, CommandKind, RecordContext};
use crate::error::{Error, Result};

fn missing_extension(name: &'static str) -> Error {
    log::warn!("skipping command that needs unloaded extension {name}");
    Error::Uncategorized(name)
}

fn vertex_buffer_arrays(
    buffers: &[crate::command::BoundVertexBuffer],
) -> (Vec<vk::Buffer>, Vec<vk::DeviceSize>) {
    buffers.iter().map(|b| (b.buffer, b.offset)).unzip()
}

fn dependency_info(barrier: &crate::command::BarrierCmd) -> vk::DependencyInfo {
    vk::DependencyInfo::builder()
        .dependency_flags(barrier.dependency_flags)
        .memory_barriers(&barrier.memory_barriers)
        .buffer_memory_barriers(&barrier.buffer_barriers)
        .image_memory_barriers(&barrier.image_barriers)
        .build()
}

/// Re-emits a single command's driver call onto `ctx.cb`. Does not
/// recurse into `cmd`'s children (container commands like
/// `BeginRenderPass`/`BeginRendering`/`BeginDebugUtilsLabel` only emit
/// their own begin/end call here; callers walking a subtree are
/// responsible for visiting children separately).
pub fn record_onto(cmd: &Command, ctx: &RecordContext) -> Result<()> {
    let dev = ctx.device;
    let cb = ctx.cb;
    match &cmd.kind {
        CommandKind::BindPipeline { bind_point, pipeline } => unsafe {
            dev.cmd_bind_pipeline(cb, *bind_point, *pipeline);
        },
        CommandKind::BindVertexBuffers { first_binding, buffers } => unsafe {
            let (bufs, offsets) = vertex_buffer_arrays(buffers);
            dev.cmd_bind_vertex_buffers(cb, *first_binding, &bufs, &offsets);
        },
        CommandKind::BindIndexBuffer(ib) => unsafe {
            dev.cmd_bind_index_buffer(cb, ib.buffer, ib.offset, ib.index_type);
        },
        CommandKind::BindDescriptorSets {
            bind_point,
            layout,
            first_set,
            sets,
            dynamic_offsets,
        } => unsafe {
            dev.cmd_bind_descriptor_sets(cb, *bind_point, *layout, *first_set, sets, dynamic_offsets);
        },
        CommandKind::PushDescriptorSet { bind_point, layout, set, writes } => {
            let ext = ctx
                .ext
                .push_descriptor
                .as_ref()
                .ok_or_else(|| missing_extension("VK_KHR_push_descriptor"))?;
            let mut image_storage = Vec::new();
            let mut buffer_storage = Vec::new();
            let mut texel_storage = Vec::new();
            let mut vk_writes = Vec::with_capacity(writes.len());
            for w in writes.iter() {
                let mut write = vk::WriteDescriptorSet::builder()
                    .dst_binding(w.binding)
                    .dst_array_element(w.first_array_element)
                    .descriptor_type(w.descriptor_type);
                match w.contents.first() {
                    Some(crate::command::PushDescriptorContents::Image { .. }) => {
                        let start = image_storage.len();
                        for c in w.contents.iter() {
                            if let crate::command::PushDescriptorContents::Image { sampler, view, layout } = c {
                                image_storage.push(
                                    vk::DescriptorImageInfo::builder()
                                        .sampler(*sampler)
                                        .image_view(*view)
                                        .image_layout(*layout)
                                        .build(),
                                );
                            }
                        }
                        write = write.image_info(&image_storage[start..]);
                    }
                    Some(crate::command::PushDescriptorContents::Buffer { .. }) => {
                        let start = buffer_storage.len();
                        for c in w.contents.iter() {
                            if let crate::command::PushDescriptorContents::Buffer { buffer, offset, range } = c {
                                buffer_storage.push(
                                    vk::DescriptorBufferInfo::builder()
                                        .buffer(*buffer)
                                        .offset(*offset)
                                        .range(*range)
                                        .build(),
                                );
                            }
                        }
                        write = write.buffer_info(&buffer_storage[start..]);
                    }
                    Some(crate::command::PushDescriptorContents::Texel(_)) => {
                        let start = texel_storage.len();
                        for c in w.contents.iter() {
                            if let crate::command::PushDescriptorContents::Texel(view) = c {
                                texel_storage.push(*view);
                            }
                        }
                        write = write.texel_buffer_view(&texel_storage[start..]);
                    }
                    None => {}
                }
                vk_writes.push(write.build());
            }
            unsafe {
                ext.cmd_push_descriptor_set(cb, *bind_point, *layout, *set, &vk_writes);
            }
        }
        CommandKind::PushConstants { layout, stages, offset, data } => unsafe {
            dev.cmd_push_constants(cb, *layout, *stages, *offset, data);
        },

        CommandKind::Barrier(barrier) => unsafe {
            dev.cmd_pipeline_barrier2(cb, &dependency_info(barrier));
        },
        CommandKind::SetEvent { event, stage_mask: _ } => unsafe {
            // Only the event's signal stage was captured (a simplification
            // over the full `VkDependencyInfo` the driver stores);
            // re-emit with an empty dependency info.
            let info = vk::DependencyInfo::builder();
            dev.cmd_set_event2(cb, *event, &info);
        },
        CommandKind::ResetEvent { event, stage_mask } => unsafe {
            dev.cmd_reset_event2(cb, *event, *stage_mask);
        },
        CommandKind::WaitEvents { events, barrier } => unsafe {
            let info = dependency_info(barrier);
            let infos = vec![info; events.len()];
            dev.cmd_wait_events2(cb, events, &infos);
        },

        CommandKind::Draw { vertex_count, instance_count, first_vertex, first_instance, .. } => unsafe {
            dev.cmd_draw(cb, *vertex_count, *instance_count, *first_vertex, *first_instance);
        },
        CommandKind::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
            ..
        } => unsafe {
            dev.cmd_draw_indexed(cb, *index_count, *instance_count, *first_index, *vertex_offset, *first_instance);
        },
        CommandKind::DrawIndirect { buffer, offset, draw_count, stride, indexed, .. } => unsafe {
            if *indexed {
                dev.cmd_draw_indexed_indirect(cb, *buffer, *offset, *draw_count, *stride);
            } else {
                dev.cmd_draw_indirect(cb, *buffer, *offset, *draw_count, *stride);
            }
        },
        CommandKind::DrawIndirectCount {
            buffer,
            offset,
            count_buffer,
            count_buffer_offset,
            max_draw_count,
            stride,
            indexed,
            ..
        } => unsafe {
            if *indexed {
                dev.cmd_draw_indexed_indirect_count(
                    cb,
                    *buffer,
                    *offset,
                    *count_buffer,
                    *count_buffer_offset,
                    *max_draw_count,
                    *stride,
                );
            } else {
                dev.cmd_draw_indirect_count(
                    cb,
                    *buffer,
                    *offset,
                    *count_buffer,
                    *count_buffer_offset,
                    *max_draw_count,
                    *stride,
                );
            }
        },

        CommandKind::Dispatch { x, y, z, .. } => unsafe {
            dev.cmd_dispatch(cb, *x, *y, *z);
        },
        CommandKind::DispatchIndirect { buffer, offset, .. } => unsafe {
            dev.cmd_dispatch_indirect(cb, *buffer, *offset);
        },
        CommandKind::DispatchBase { base, count, .. } => unsafe {
            dev.cmd_dispatch_base(cb, base[0], base[1], base[2], count[0], count[1], count[2]);
        },

        CommandKind::CopyBuffer { src, dst, regions } => unsafe {
            dev.cmd_copy_buffer(cb, *src, *dst, regions);
        },
        CommandKind::CopyImage { src, src_layout, dst, dst_layout, regions } => unsafe {
            dev.cmd_copy_image(cb, *src, *src_layout, *dst, *dst_layout, regions);
        },
        CommandKind::CopyBufferToImage { src, dst, dst_layout, regions } => unsafe {
            dev.cmd_copy_buffer_to_image(cb, *src, *dst, *dst_layout, regions);
        },
        CommandKind::CopyImageToBuffer { src, src_layout, dst, regions } => unsafe {
            dev.cmd_copy_image_to_buffer(cb, *src, *src_layout, *dst, regions);
        },
        CommandKind::BlitImage { src, src_layout, dst, dst_layout, regions, filter } => unsafe {
            dev.cmd_blit_image(cb, *src, *src_layout, *dst, *dst_layout, regions, *filter);
        },
        CommandKind::ResolveImage { src, src_layout, dst, dst_layout, regions } => unsafe {
            dev.cmd_resolve_image(cb, *src, *src_layout, *dst, *dst_layout, regions);
        },
        CommandKind::UpdateBuffer { buffer, offset, data } => unsafe {
            dev.cmd_update_buffer(cb, *buffer, *offset, data);
        },
        CommandKind::FillBuffer { buffer, offset, size, data } => unsafe {
            dev.cmd_fill_buffer(cb, *buffer, *offset, *size, *data);
        },
        CommandKind::ClearColorImage { image, layout, color, ranges } => unsafe {
            dev.cmd_clear_color_image(cb, *image, *layout, color, ranges);
        },
        CommandKind::ClearDepthStencilImage { image, layout, value, ranges } => unsafe {
            dev.cmd_clear_depth_stencil_image(cb, *image, *layout, value, ranges);
        },
        CommandKind::ClearAttachment { attachments, rects } => unsafe {
            dev.cmd_clear_attachments(cb, attachments, rects);
        },

        CommandKind::EndRenderPass => unsafe {
            dev.cmd_end_render_pass(cb);
        },
        CommandKind::EndDebugUtilsLabel => {
            if let Some(ext) = &ctx.ext.debug_utils {
                unsafe { ext.cmd_end_debug_utils_label(cb) };
            }
        }
        CommandKind::EndConditionalRendering => {
            if let Some(ext) = &ctx.ext.conditional_rendering {
                unsafe { ext.cmd_end_conditional_rendering(cb) };
            }
        }
        CommandKind::EndRendering => unsafe {
            dev.cmd_end_rendering(cb);
        },

        CommandKind::BeginQuery { pool, query, flags } => unsafe {
            dev.cmd_begin_query(cb, *pool, *query, *flags);
        },
        CommandKind::EndQuery { pool, query } => unsafe {
            dev.cmd_end_query(cb, *pool, *query);
        },
        CommandKind::ResetQueryPool { pool, first, count } => unsafe {
            dev.cmd_reset_query_pool(cb, *pool, *first, *count);
        },
        CommandKind::WriteTimestamp { pool, query, stage } => unsafe {
            dev.cmd_write_timestamp2(cb, *stage, *pool, *query);
        },
        CommandKind::CopyQueryPoolResults {
            pool,
            first,
            count,
            dst_buffer,
            dst_offset,
            stride,
            flags,
        } => unsafe {
            dev.cmd_copy_query_pool_results(cb, *pool, *first, *count, *dst_buffer, *dst_offset, *stride, *flags);
        },

        CommandKind::TraceRays {
            raygen,
            miss,
            hit,
            callable,
            width,
            height,
            depth,
            ..
        } => {
            let ext = ctx
                .ext
                .ray_tracing_pipeline
                .as_ref()
                .ok_or_else(|| missing_extension("VK_KHR_ray_tracing_pipeline"))?;
            unsafe { ext.cmd_trace_rays(cb, raygen, miss, hit, callable, *width, *height, *depth) };
        }
        CommandKind::TraceRaysIndirect {
            raygen,
            miss,
            hit,
            callable,
            indirect_device_address,
            ..
        } => {
            let ext = ctx
                .ext
                .ray_tracing_pipeline
                .as_ref()
                .ok_or_else(|| missing_extension("VK_KHR_ray_tracing_pipeline"))?;
            unsafe { ext.cmd_trace_rays_indirect(cb, raygen, miss, hit, callable, *indirect_device_address) };
        }

        CommandKind::BuildAccelStructs { infos } => {
            let ext = ctx
                .ext
                .acceleration_structure
                .as_ref()
                .ok_or_else(|| missing_extension("VK_KHR_acceleration_structure"))?;
            let geom_storage: Vec<Vec<vk::AccelerationStructureGeometryKHR>> =
                infos.iter().map(|i| i.geometries.iter().map(accel_struct_geometry).collect()).collect();
            let build_infos: Vec<vk::AccelerationStructureBuildGeometryInfoKHR> = infos
                .iter()
                .zip(geom_storage.iter())
                .map(|(info, geoms)| {
                    vk::AccelerationStructureBuildGeometryInfoKHR::builder()
                        .ty(info.ty)
                        .flags(info.flags)
                        .mode(info.mode)
                        .src_acceleration_structure(info.src)
                        .dst_acceleration_structure(info.dst)
                        .geometries(geoms)
                        .scratch_data(info.scratch_data)
                        .build()
                })
                .collect();
            let range_ptrs: Vec<Vec<vk::AccelerationStructureBuildRangeInfoKHR>> =
                infos.iter().map(|i| i.ranges.to_vec()).collect();
            let range_refs: Vec<&[vk::AccelerationStructureBuildRangeInfoKHR]> =
                range_ptrs.iter().map(|r| r.as_slice()).collect();
            unsafe { ext.cmd_build_acceleration_structures(cb, &build_infos, &range_refs) };
        }
        CommandKind::BuildAccelStructsIndirect {
            infos,
            indirect_addresses,
            indirect_strides,
        } => {
            let ext = ctx
                .ext
                .acceleration_structure
                .as_ref()
                .ok_or_else(|| missing_extension("VK_KHR_acceleration_structure"))?;
            let geom_storage: Vec<Vec<vk::AccelerationStructureGeometryKHR>> =
                infos.iter().map(|i| i.geometries.iter().map(accel_struct_geometry).collect()).collect();
            let build_infos: Vec<vk::AccelerationStructureBuildGeometryInfoKHR> = infos
                .iter()
                .zip(geom_storage.iter())
                .map(|(info, geoms)| {
                    vk::AccelerationStructureBuildGeometryInfoKHR::builder()
                        .ty(info.ty)
                        .flags(info.flags)
                        .mode(info.mode)
                        .src_acceleration_structure(info.src)
                        .dst_acceleration_structure(info.dst)
                        .geometries(geoms)
                        .scratch_data(info.scratch_data)
                        .build()
                })
                .collect();
            let max_primitive_counts: Vec<Vec<u32>> = infos
                .iter()
                .map(|i| i.ranges.iter().map(|r| r.primitive_count).collect())
                .collect();
            let max_primitive_count_ptrs: Vec<*const u32> =
                max_primitive_counts.iter().map(|v| v.as_ptr()).collect();
            unsafe {
                ext.cmd_build_acceleration_structures_indirect(
                    cb,
                    &build_infos,
                    indirect_addresses,
                    indirect_strides,
                    &max_primitive_count_ptrs,
                )
            };
        }
        CommandKind::CopyAccelStructure { src, dst, mode } => {
            let ext = ctx
                .ext
                .acceleration_structure
                .as_ref()
                .ok_or_else(|| missing_extension("VK_KHR_acceleration_structure"))?;
            let info = vk::CopyAccelerationStructureInfoKHR::builder()
                .src(*src)
                .dst(*dst)
                .mode(*mode);
            unsafe { ext.cmd_copy_acceleration_structure(cb, &info) };
        }
        CommandKind::CopyAccelStructToMemory { src, dst_address, mode } => {
            let ext = ctx
                .ext
                .acceleration_structure
                .as_ref()
                .ok_or_else(|| missing_extension("VK_KHR_acceleration_structure"))?;
            let info = vk::CopyAccelerationStructureToMemoryInfoKHR::builder()
                .src(*src)
                .dst(*dst_address)
                .mode(*mode);
            unsafe { ext.cmd_copy_acceleration_structure_to_memory(cb, &info) };
        }
        CommandKind::CopyMemoryToAccelStruct { src_address, dst, mode } => {
            let ext = ctx
                .ext
                .acceleration_structure
                .as_ref()
                .ok_or_else(|| missing_extension("VK_KHR_acceleration_structure"))?;
            let info = vk::CopyMemoryToAccelerationStructureInfoKHR::builder()
                .src(*src_address)
                .dst(*dst)
                .mode(*mode);
            unsafe { ext.cmd_copy_memory_to_acceleration_structure(cb, &info) };
        }
        CommandKind::WriteAccelStructsProperties { structs, query_type, pool, first_query } => {
            let ext = ctx
                .ext
                .acceleration_structure
                .as_ref()
                .ok_or_else(|| missing_extension("VK_KHR_acceleration_structure"))?;
            unsafe { ext.cmd_write_acceleration_structures_properties(cb, structs, *query_type, *pool, *first_query) };
        }

        CommandKind::BeginRenderPass(rp) => unsafe {
            let info = vk::RenderPassBeginInfo::builder()
                .render_pass(rp.render_pass)
                .framebuffer(rp.framebuffer)
                .render_area(rp.render_area)
                .clear_values(&rp.clear_values);
            dev.cmd_begin_render_pass(cb, &info, rp.contents);
        },
        CommandKind::FirstSubpass { .. } => {}
        CommandKind::NextSubpass { contents, .. } => unsafe {
            dev.cmd_next_subpass(cb, *contents);
        },
        CommandKind::ExecuteCommandsChild { command_buffer, .. } => unsafe {
            dev.cmd_execute_commands(cb, &[*command_buffer]);
        },
        CommandKind::ExecuteCommands => {}
        CommandKind::BeginDebugUtilsLabel { name, color } => {
            if let Some(ext) = &ctx.ext.debug_utils {
                let name_c = std::ffi::CString::new(&**name).unwrap_or_default();
                let label = vk::DebugUtilsLabelEXT::builder()
                    .label_name(&name_c)
                    .color(*color);
                unsafe { ext.cmd_begin_debug_utils_label(cb, &label) };
            }
        }
        CommandKind::BeginConditionalRendering { buffer, offset, flags } => {
            if let Some(ext) = &ctx.ext.conditional_rendering {
                let info = vk::ConditionalRenderingBeginInfoEXT::builder()
                    .buffer(*buffer)
                    .offset(*offset)
                    .flags(*flags);
                unsafe { ext.cmd_begin_conditional_rendering(cb, &info) };
            }
        }
        CommandKind::BeginRendering(r) => unsafe {
            let color_attachments: Vec<vk::RenderingAttachmentInfo> =
                r.color_attachments.iter().map(rendering_attachment_info).collect();
            let mut info = vk::RenderingInfo::builder()
                .flags(r.flags)
                .render_area(r.render_area)
                .layer_count(r.layer_count)
                .view_mask(r.view_mask)
                .color_attachments(&color_attachments);
            let depth_info = r.depth_attachment.as_ref().map(rendering_attachment_info);
            if let Some(depth) = &depth_info {
                info = info.depth_attachment(depth);
            }
            let stencil_info = r.stencil_attachment.as_ref().map(rendering_attachment_info);
            if let Some(stencil) = &stencil_info {
                info = info.stencil_attachment(stencil);
            }
            dev.cmd_begin_rendering(cb, &info);
        },

        CommandKind::SetViewport { first, viewports } => unsafe {
            dev.cmd_set_viewport(cb, *first, viewports);
        },
        CommandKind::SetScissor { first, scissors } => unsafe {
            dev.cmd_set_scissor(cb, *first, scissors);
        },
        CommandKind::SetLineWidth(w) => unsafe {
            dev.cmd_set_line_width(cb, *w);
        },
        CommandKind::SetDepthBias { constant, clamp, slope } => unsafe {
            dev.cmd_set_depth_bias(cb, *constant, *clamp, *slope);
        },
        CommandKind::SetBlendConstants(c) => unsafe {
            dev.cmd_set_blend_constants(cb, c);
        },
        CommandKind::SetStencilCompareMask { face_mask, value } => unsafe {
            dev.cmd_set_stencil_compare_mask(cb, *face_mask, *value);
        },
        CommandKind::SetStencilWriteMask { face_mask, value } => unsafe {
            dev.cmd_set_stencil_write_mask(cb, *face_mask, *value);
        },
        CommandKind::SetStencilReference { face_mask, value } => unsafe {
            dev.cmd_set_stencil_reference(cb, *face_mask, *value);
        },
        CommandKind::SetCullMode(mode) => unsafe {
            dev.cmd_set_cull_mode(cb, *mode);
        },
        CommandKind::SetFrontFace(face) => unsafe {
            dev.cmd_set_front_face(cb, *face);
        },
        CommandKind::SetPrimitiveTopology(topo) => unsafe {
            dev.cmd_set_primitive_topology(cb, *topo);
        },
        CommandKind::SetDepthTestEnable(e) => unsafe {
            dev.cmd_set_depth_test_enable(cb, *e);
        },
        CommandKind::SetDepthWriteEnable(e) => unsafe {
            dev.cmd_set_depth_write_enable(cb, *e);
        },
        CommandKind::SetDepthCompareOp(op) => unsafe {
            dev.cmd_set_depth_compare_op(cb, *op);
        },
        CommandKind::SetDepthBoundsTestEnable(e) => unsafe {
            dev.cmd_set_depth_bounds_test_enable(cb, *e);
        },
        CommandKind::SetStencilTestEnable(e) => unsafe {
            dev.cmd_set_stencil_test_enable(cb, *e);
        },
        CommandKind::SetStencilOp { face_mask, fail_op, pass_op, depth_fail_op, compare_op } => unsafe {
            dev.cmd_set_stencil_op(cb, *face_mask, *fail_op, *pass_op, *depth_fail_op, *compare_op);
        },
        CommandKind::SetRasterizerDiscardEnable(e) => unsafe {
            dev.cmd_set_rasterizer_discard_enable(cb, *e);
        },
        CommandKind::SetDepthBiasEnable(e) => unsafe {
            dev.cmd_set_depth_bias_enable(cb, *e);
        },
        CommandKind::SetPrimitiveRestartEnable(e) => unsafe {
            dev.cmd_set_primitive_restart_enable(cb, *e);
        },
        CommandKind::InsertDebugUtilsLabel { name, color } => {
            if let Some(ext) = &ctx.ext.debug_utils {
                let name_c = std::ffi::CString::new(&**name).unwrap_or_default();
                let label = vk::DebugUtilsLabelEXT::builder()
                    .label_name(&name_c)
                    .color(*color);
                unsafe { ext.cmd_insert_debug_utils_label(cb, &label) };
            }
        }
        CommandKind::SetFragmentShadingRate { .. } => {
            // VK_KHR_fragment_shading_rate isn't among the loaded extension
            // tables this layer tracks; re-emission is a no-op rather than
            // a hard error.
            log::debug!("skipping SetFragmentShadingRate: extension not tracked");
        }
    }
    Ok(())
}

fn rendering_attachment_info(
    a: &crate::command::RenderingAttachment,
) -> vk::RenderingAttachmentInfo {
    let mut info = vk::RenderingAttachmentInfo::builder()
        .image_view(a.view)
        .image_layout(a.layout)
        .resolve_mode(a.resolve_mode)
        .resolve_image_layout(a.resolve_layout)
        .load_op(a.load_op)
        .store_op(a.store_op)
        .clear_value(a.clear_value);
    if let Some(resolve_view) = a.resolve_view {
        info = info.resolve_image_view(resolve_view);
    }
    info.build()
}

fn accel_struct_geometry(g: &crate::command::AccelStructGeometry) -> vk::AccelerationStructureGeometryKHR {
    use crate::command::AccelStructGeometryData::*;
    let data = match &g.data {
        Triangles(t) => vk::AccelerationStructureGeometryDataKHR {
            triangles: vk::AccelerationStructureGeometryTrianglesDataKHR::builder()
                .vertex_format(t.vertex_format)
                .vertex_data(t.vertex_data)
                .vertex_stride(t.vertex_stride)
                .max_vertex(t.max_vertex)
                .index_type(t.index_type)
                .index_data(t.index_data)
                .transform_data(t.transform_data.unwrap_or(vk::DeviceOrHostAddressConstKHR { device_address: 0 }))
                .build(),
        },
        Aabbs(a) => vk::AccelerationStructureGeometryDataKHR {
            aabbs: vk::AccelerationStructureGeometryAabbsDataKHR::builder()
                .data(a.data)
                .stride(a.stride)
                .build(),
        },
        Instances(i) => vk::AccelerationStructureGeometryDataKHR {
            instances: vk::AccelerationStructureGeometryInstancesDataKHR::builder()
                .array_of_pointers(i.array_of_pointers)
                .data(i.data)
                .build(),
        },
    };
    let geom_type = match &g.data {
        Triangles(_) => vk::GeometryTypeKHR::TRIANGLES,
        Aabbs(_) => vk::GeometryTypeKHR::AABBS,
        Instances(_) => vk::GeometryTypeKHR::INSTANCES,
    };
    vk::AccelerationStructureGeometryKHR::builder()
        .geometry_type(geom_type)
        .geometry(data)
        .flags(g.flags)
        .build()
}
