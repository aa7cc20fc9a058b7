//! The closed command variant catalog.
//!
//! A C++-style open, virtually-dispatched `Command` base class hierarchy
//! doesn't translate well here: instead this uses one closed enum with a
//! small uniform capability set reachable through plain `match`es. There is
//! no v-table per command and every payload is `Copy`, satisfying the "no
//! non-trivial destructor, bump-freed" invariant the arena allocator
//! depends on.
//!
//! This module implements a representative subset spanning every command
//! category (`bind`, `sync`, `draw`, `dispatch`, `transfer`, `end`, `query`,
//! `trace-rays`, `build-accel-struct`, `begin-render-pass`,
//! `render-section`, `other`). See DESIGN.md for the commands intentionally
//! left out.

use ash::vk;

use crate::arena::{ArenaSlice, ArenaStr};

/// One of the twelve command groupings commands are classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCategory {
    Bind,
    Sync,
    Draw,
    Dispatch,
    Transfer,
    End,
    Query,
    TraceRays,
    BuildAccelStruct,
    BeginRenderPass,
    RenderSection,
    Other,
}

// ---------------------------------------------------------------------
// State snapshots
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct BoundVertexBuffer {
    pub buffer: vk::Buffer,
    pub offset: vk::DeviceSize,
}

#[derive(Debug, Clone, Copy)]
pub struct BoundIndexBuffer {
    pub buffer: vk::Buffer,
    pub offset: vk::DeviceSize,
    pub index_type: vk::IndexType,
}

#[derive(Debug, Clone, Copy)]
pub struct BoundDescriptorSet {
    pub set: vk::DescriptorSet,
    pub dynamic_offsets: ArenaSlice<u32>,
}

/// Dynamic state relevant to capture/replay. Covers the dynamic states
/// actually used by the hook engine's capture primitives, not every
/// `VkDynamicState` — vertex/index capture sizing is a possible future
/// addition, not a current one.
#[derive(Debug, Clone, Copy, Default)]
pub struct DynamicStateBlock {
    pub viewports: ArenaSlice<vk::Viewport>,
    pub scissors: ArenaSlice<vk::Rect2D>,
    pub line_width: f32,
    pub depth_bias: (f32, f32, f32),
    pub blend_constants: [f32; 4],
    pub depth_bounds: (f32, f32),
    pub stencil_compare_mask: (u32, u32),
    pub stencil_write_mask: (u32, u32),
    pub stencil_reference: (u32, u32),
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub primitive_topology: vk::PrimitiveTopology,
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub rasterizer_discard_enable: bool,
    pub primitive_restart_enable: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct GraphicsState {
    pub pipeline: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
    pub vertex_buffers: ArenaSlice<BoundVertexBuffer>,
    pub index_buffer: Option<BoundIndexBuffer>,
    pub descriptor_sets: ArenaSlice<BoundDescriptorSet>,
    pub dynamic: DynamicStateBlock,
    pub push_constants: ArenaSlice<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct ComputeState {
    pub pipeline: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
    pub descriptor_sets: ArenaSlice<BoundDescriptorSet>,
    pub push_constants: ArenaSlice<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct RayTracingState {
    pub pipeline: vk::Pipeline,
    pub pipeline_layout: vk::PipelineLayout,
    pub descriptor_sets: ArenaSlice<BoundDescriptorSet>,
    pub push_constants: ArenaSlice<u8>,
}

// ---------------------------------------------------------------------
// Render pass / dynamic rendering payload (feeds the splitter)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct AttachmentInfo {
    pub view: vk::ImageView,
    pub image: vk::Image,
    pub format: vk::Format,
    pub samples: vk::SampleCountFlags,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub stencil_load_op: vk::AttachmentLoadOp,
    pub stencil_store_op: vk::AttachmentStoreOp,
    pub initial_layout: vk::ImageLayout,
    pub final_layout: vk::ImageLayout,
    pub aspect_mask: vk::ImageAspectFlags,
    /// Whether a subpass strictly after the target reads or writes this
    /// attachment (via input attachment, resolve, or color/depth write).
    /// Feeds the splittability predicate.
    pub read_or_written_after: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct BeginRenderPassCmd {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub render_area: vk::Rect2D,
    pub clear_values: ArenaSlice<vk::ClearValue>,
    pub attachments: ArenaSlice<AttachmentInfo>,
    pub subpass_count: u32,
    pub multiview: bool,
    pub contents: vk::SubpassContents,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderingAttachment {
    pub view: vk::ImageView,
    pub layout: vk::ImageLayout,
    pub resolve_mode: vk::ResolveModeFlags,
    pub resolve_view: Option<vk::ImageView>,
    pub resolve_layout: vk::ImageLayout,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub clear_value: vk::ClearValue,
}

#[derive(Debug, Clone, Copy)]
pub struct BeginRenderingCmd {
    pub flags: vk::RenderingFlags,
    pub render_area: vk::Rect2D,
    pub layer_count: u32,
    pub view_mask: u32,
    pub color_attachments: ArenaSlice<RenderingAttachment>,
    pub depth_attachment: Option<RenderingAttachment>,
    pub stencil_attachment: Option<RenderingAttachment>,
}

// ---------------------------------------------------------------------
// Acceleration structure build payload
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct TrianglesGeometry {
    pub vertex_format: vk::Format,
    pub vertex_data: vk::DeviceOrHostAddressConstKHR,
    pub vertex_stride: vk::DeviceSize,
    pub max_vertex: u32,
    pub index_type: vk::IndexType,
    pub index_data: vk::DeviceOrHostAddressConstKHR,
    pub transform_data: Option<vk::DeviceOrHostAddressConstKHR>,
}

#[derive(Debug, Clone, Copy)]
pub struct AabbsGeometry {
    pub data: vk::DeviceOrHostAddressConstKHR,
    pub stride: vk::DeviceSize,
}

#[derive(Debug, Clone, Copy)]
pub struct InstancesGeometry {
    /// Array-of-pointers instance input is intentionally left unhandled
    /// (see DESIGN.md): when true, instance data behind the pointer table
    /// is treated as opaque and not dereferenced during capture.
    pub array_of_pointers: bool,
    pub data: vk::DeviceOrHostAddressConstKHR,
}

#[derive(Debug, Clone, Copy)]
pub enum AccelStructGeometryData {
    Triangles(TrianglesGeometry),
    Aabbs(AabbsGeometry),
    Instances(InstancesGeometry),
}

#[derive(Debug, Clone, Copy)]
pub struct AccelStructGeometry {
    pub flags: vk::GeometryFlagsKHR,
    pub data: AccelStructGeometryData,
}

#[derive(Debug, Clone, Copy)]
pub struct AccelStructBuildInfo {
    pub ty: vk::AccelerationStructureTypeKHR,
    pub flags: vk::BuildAccelerationStructureFlagsKHR,
    pub mode: vk::BuildAccelerationStructureModeKHR,
    pub src: vk::AccelerationStructureKHR,
    pub dst: vk::AccelerationStructureKHR,
    pub geometries: ArenaSlice<AccelStructGeometry>,
    pub ranges: ArenaSlice<vk::AccelerationStructureBuildRangeInfoKHR>,
    pub scratch_data: vk::DeviceOrHostAddressKHR,
}

// ---------------------------------------------------------------------
// Push descriptor payload (minimal projection: handles + types, enough to
// re-emit and to drive descriptor-binding capture; not a full DescriptorSet)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum PushDescriptorContents {
    Image {
        sampler: vk::Sampler,
        view: vk::ImageView,
        layout: vk::ImageLayout,
    },
    Buffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    },
    Texel(vk::BufferView),
}

#[derive(Debug, Clone, Copy)]
pub struct PushDescriptorWrite {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub first_array_element: u32,
    pub contents: ArenaSlice<PushDescriptorContents>,
}

// ---------------------------------------------------------------------
// Barrier payload (synchronization2-style, matching Barrier2CmdBase)
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct BarrierCmd {
    pub dependency_flags: vk::DependencyFlags,
    pub memory_barriers: ArenaSlice<vk::MemoryBarrier2>,
    pub buffer_barriers: ArenaSlice<vk::BufferMemoryBarrier2>,
    pub image_barriers: ArenaSlice<vk::ImageMemoryBarrier2>,
}

// ---------------------------------------------------------------------
// The variant catalog
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub enum CommandKind {
    // -- bind --
    BindPipeline {
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    },
    BindVertexBuffers {
        first_binding: u32,
        buffers: ArenaSlice<BoundVertexBuffer>,
    },
    BindIndexBuffer(BoundIndexBuffer),
    BindDescriptorSets {
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: ArenaSlice<vk::DescriptorSet>,
        dynamic_offsets: ArenaSlice<u32>,
    },
    PushDescriptorSet {
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        set: u32,
        writes: ArenaSlice<PushDescriptorWrite>,
    },
    PushConstants {
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: ArenaSlice<u8>,
    },

    // -- sync --
    Barrier(BarrierCmd),
    SetEvent {
        event: vk::Event,
        stage_mask: vk::PipelineStageFlags2,
    },
    ResetEvent {
        event: vk::Event,
        stage_mask: vk::PipelineStageFlags2,
    },
    WaitEvents {
        events: ArenaSlice<vk::Event>,
        barrier: BarrierCmd,
    },

    // -- draw --
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
        state: crate::arena::ArenaRef<GraphicsState>,
    },
    DrawIndexed {
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
        state: crate::arena::ArenaRef<GraphicsState>,
    },
    DrawIndirect {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        draw_count: u32,
        stride: u32,
        indexed: bool,
        state: crate::arena::ArenaRef<GraphicsState>,
    },
    DrawIndirectCount {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        count_buffer: vk::Buffer,
        count_buffer_offset: vk::DeviceSize,
        max_draw_count: u32,
        stride: u32,
        indexed: bool,
        state: crate::arena::ArenaRef<GraphicsState>,
    },

    // -- dispatch --
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
        state: crate::arena::ArenaRef<ComputeState>,
    },
    DispatchIndirect {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        state: crate::arena::ArenaRef<ComputeState>,
    },
    DispatchBase {
        base: [u32; 3],
        count: [u32; 3],
        state: crate::arena::ArenaRef<ComputeState>,
    },

    // -- transfer --
    CopyBuffer {
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: ArenaSlice<vk::BufferCopy>,
    },
    CopyImage {
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: ArenaSlice<vk::ImageCopy>,
    },
    CopyBufferToImage {
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: ArenaSlice<vk::BufferImageCopy>,
    },
    CopyImageToBuffer {
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Buffer,
        regions: ArenaSlice<vk::BufferImageCopy>,
    },
    BlitImage {
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: ArenaSlice<vk::ImageBlit>,
        filter: vk::Filter,
    },
    ResolveImage {
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: ArenaSlice<vk::ImageResolve>,
    },
    UpdateBuffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        data: ArenaSlice<u8>,
    },
    FillBuffer {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
        data: u32,
    },
    ClearColorImage {
        image: vk::Image,
        layout: vk::ImageLayout,
        color: vk::ClearColorValue,
        ranges: ArenaSlice<vk::ImageSubresourceRange>,
    },
    ClearDepthStencilImage {
        image: vk::Image,
        layout: vk::ImageLayout,
        value: vk::ClearDepthStencilValue,
        ranges: ArenaSlice<vk::ImageSubresourceRange>,
    },
    ClearAttachment {
        attachments: ArenaSlice<vk::ClearAttachment>,
        rects: ArenaSlice<vk::ClearRect>,
    },

    // -- end markers (no children) --
    EndRenderPass,
    EndDebugUtilsLabel,
    EndConditionalRendering,
    EndRendering,

    // -- query --
    BeginQuery {
        pool: vk::QueryPool,
        query: u32,
        flags: vk::QueryControlFlags,
    },
    EndQuery {
        pool: vk::QueryPool,
        query: u32,
    },
    ResetQueryPool {
        pool: vk::QueryPool,
        first: u32,
        count: u32,
    },
    WriteTimestamp {
        pool: vk::QueryPool,
        query: u32,
        stage: vk::PipelineStageFlags2,
    },
    CopyQueryPoolResults {
        pool: vk::QueryPool,
        first: u32,
        count: u32,
        dst_buffer: vk::Buffer,
        dst_offset: vk::DeviceSize,
        stride: vk::DeviceSize,
        flags: vk::QueryResultFlags,
    },

    // -- trace-rays --
    TraceRays {
        raygen: vk::StridedDeviceAddressRegionKHR,
        miss: vk::StridedDeviceAddressRegionKHR,
        hit: vk::StridedDeviceAddressRegionKHR,
        callable: vk::StridedDeviceAddressRegionKHR,
        width: u32,
        height: u32,
        depth: u32,
        state: crate::arena::ArenaRef<RayTracingState>,
    },
    TraceRaysIndirect {
        raygen: vk::StridedDeviceAddressRegionKHR,
        miss: vk::StridedDeviceAddressRegionKHR,
        hit: vk::StridedDeviceAddressRegionKHR,
        callable: vk::StridedDeviceAddressRegionKHR,
        indirect_device_address: vk::DeviceAddress,
        state: crate::arena::ArenaRef<RayTracingState>,
    },

    // -- build-accel-struct --
    BuildAccelStructs {
        infos: ArenaSlice<AccelStructBuildInfo>,
    },
    BuildAccelStructsIndirect {
        infos: ArenaSlice<AccelStructBuildInfo>,
        indirect_addresses: ArenaSlice<vk::DeviceAddress>,
        indirect_strides: ArenaSlice<u32>,
    },
    CopyAccelStructure {
        src: vk::AccelerationStructureKHR,
        dst: vk::AccelerationStructureKHR,
        mode: vk::CopyAccelerationStructureModeKHR,
    },
    CopyAccelStructToMemory {
        src: vk::AccelerationStructureKHR,
        dst_address: vk::DeviceOrHostAddressKHR,
        mode: vk::CopyAccelerationStructureModeKHR,
    },
    CopyMemoryToAccelStruct {
        src_address: vk::DeviceOrHostAddressConstKHR,
        dst: vk::AccelerationStructureKHR,
        mode: vk::CopyAccelerationStructureModeKHR,
    },
    WriteAccelStructsProperties {
        structs: ArenaSlice<vk::AccelerationStructureKHR>,
        query_type: vk::QueryType,
        pool: vk::QueryPool,
        first_query: u32,
    },

    // -- begin-render-pass (section) --
    BeginRenderPass(BeginRenderPassCmd),

    // -- render-section (sections and their direct markers) --
    FirstSubpass {
        contents: vk::SubpassContents,
    },
    NextSubpass {
        contents: vk::SubpassContents,
        subpass_index: u32,
    },
    ExecuteCommandsChild {
        /// Identity of the secondary `CommandRecord` executed here. The
        /// record itself is kept alive via the parent record's resource
        /// reference list; this id is what the
        /// matcher and hook engine key off of.
        record_id: u64,
        command_buffer: vk::CommandBuffer,
    },
    ExecuteCommands,
    BeginDebugUtilsLabel {
        name: ArenaStr,
        color: [f32; 4],
    },
    BeginConditionalRendering {
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        flags: vk::ConditionalRenderingFlagsEXT,
    },
    BeginRendering(BeginRenderingCmd),

    // -- other --
    SetViewport {
        first: u32,
        viewports: ArenaSlice<vk::Viewport>,
    },
    SetScissor {
        first: u32,
        scissors: ArenaSlice<vk::Rect2D>,
    },
    SetLineWidth(f32),
    SetDepthBias {
        constant: f32,
        clamp: f32,
        slope: f32,
    },
    SetBlendConstants([f32; 4]),
    SetStencilCompareMask {
        face_mask: vk::StencilFaceFlags,
        value: u32,
    },
    SetStencilWriteMask {
        face_mask: vk::StencilFaceFlags,
        value: u32,
    },
    SetStencilReference {
        face_mask: vk::StencilFaceFlags,
        value: u32,
    },
    SetCullMode(vk::CullModeFlags),
    SetFrontFace(vk::FrontFace),
    SetPrimitiveTopology(vk::PrimitiveTopology),
    SetDepthTestEnable(bool),
    SetDepthWriteEnable(bool),
    SetDepthCompareOp(vk::CompareOp),
    SetDepthBoundsTestEnable(bool),
    SetStencilTestEnable(bool),
    SetStencilOp {
        face_mask: vk::StencilFaceFlags,
        fail_op: vk::StencilOp,
        pass_op: vk::StencilOp,
        depth_fail_op: vk::StencilOp,
        compare_op: vk::CompareOp,
    },
    SetRasterizerDiscardEnable(bool),
    SetDepthBiasEnable(bool),
    SetPrimitiveRestartEnable(bool),
    InsertDebugUtilsLabel {
        name: ArenaStr,
        color: [f32; 4],
    },
    SetFragmentShadingRate {
        fragment_size: vk::Extent2D,
        combiner_ops: [vk::FragmentShadingRateCombinerOpKHR; 2],
    },
}

impl CommandKind {
    pub fn category(&self) -> CommandCategory {
        use CommandCategory::*;
        use CommandKind::*;
        match self {
            BindPipeline { .. }
            | BindVertexBuffers { .. }
            | BindIndexBuffer(_)
            | BindDescriptorSets { .. }
            | PushDescriptorSet { .. }
            | PushConstants { .. } => Bind,

            Barrier(_) | SetEvent { .. } | ResetEvent { .. } | WaitEvents { .. } => Sync,

            Draw { .. } | DrawIndexed { .. } | DrawIndirect { .. } | DrawIndirectCount { .. } => {
                Draw
            }

            Dispatch { .. } | DispatchIndirect { .. } | DispatchBase { .. } => Dispatch,

            CopyBuffer { .. }
            | CopyImage { .. }
            | CopyBufferToImage { .. }
            | CopyImageToBuffer { .. }
            | BlitImage { .. }
            | ResolveImage { .. }
            | UpdateBuffer { .. }
            | FillBuffer { .. }
            | ClearColorImage { .. }
            | ClearDepthStencilImage { .. }
            | ClearAttachment { .. } => Transfer,

            EndRenderPass | EndDebugUtilsLabel | EndConditionalRendering | EndRendering => End,

            BeginQuery { .. }
            | EndQuery { .. }
            | ResetQueryPool { .. }
            | WriteTimestamp { .. }
            | CopyQueryPoolResults { .. } => Query,

            TraceRays { .. } | TraceRaysIndirect { .. } => CommandCategory::TraceRays,

            BuildAccelStructs { .. }
            | BuildAccelStructsIndirect { .. }
            | CopyAccelStructure { .. }
            | CopyAccelStructToMemory { .. }
            | CopyMemoryToAccelStruct { .. }
            | WriteAccelStructsProperties { .. } => CommandCategory::BuildAccelStruct,

            CommandKind::BeginRenderPass(_) => CommandCategory::BeginRenderPass,

            FirstSubpass { .. }
            | NextSubpass { .. }
            | ExecuteCommandsChild { .. }
            | ExecuteCommands
            | BeginDebugUtilsLabel { .. }
            | BeginConditionalRendering { .. }
            | CommandKind::BeginRendering(_) => RenderSection,

            SetViewport { .. }
            | SetScissor { .. }
            | SetLineWidth(_)
            | SetDepthBias { .. }
            | SetBlendConstants(_)
            | SetStencilCompareMask { .. }
            | SetStencilWriteMask { .. }
            | SetStencilReference { .. }
            | SetCullMode(_)
            | SetFrontFace(_)
            | SetPrimitiveTopology(_)
            | SetDepthTestEnable(_)
            | SetDepthWriteEnable(_)
            | SetDepthCompareOp(_)
            | SetDepthBoundsTestEnable(_)
            | SetStencilTestEnable(_)
            | SetStencilOp { .. }
            | SetRasterizerDiscardEnable(_)
            | SetDepthBiasEnable(_)
            | SetPrimitiveRestartEnable(_)
            | InsertDebugUtilsLabel { .. }
            | SetFragmentShadingRate { .. } => Other,
        }
    }

    /// A short, stable name for display and for section-label formatting.
    /// Parent/section commands that carry a distinguishing parameter fold
    /// it into the name.
    pub fn name(&self) -> String {
        use CommandKind::*;
        match self {
            BindPipeline { .. } => "BindPipeline".into(),
            BindVertexBuffers { .. } => "BindVertexBuffers".into(),
            BindIndexBuffer(_) => "BindIndexBuffer".into(),
            BindDescriptorSets { .. } => "BindDescriptorSets".into(),
            PushDescriptorSet { .. } => "PushDescriptorSet".into(),
            PushConstants { .. } => "PushConstants".into(),
            Barrier(_) => "PipelineBarrier2".into(),
            SetEvent { .. } => "SetEvent2".into(),
            ResetEvent { .. } => "ResetEvent2".into(),
            WaitEvents { .. } => "WaitEvents2".into(),
            Draw { .. } => "Draw".into(),
            DrawIndexed { .. } => "DrawIndexed".into(),
            DrawIndirect { indexed, .. } => {
                if *indexed {
                    "DrawIndexedIndirect".into()
                } else {
                    "DrawIndirect".into()
                }
            }
            DrawIndirectCount { indexed, .. } => {
                if *indexed {
                    "DrawIndexedIndirectCount".into()
                } else {
                    "DrawIndirectCount".into()
                }
            }
            Dispatch { .. } => "Dispatch".into(),
            DispatchIndirect { .. } => "DispatchIndirect".into(),
            DispatchBase { .. } => "DispatchBase".into(),
            CopyBuffer { .. } => "CopyBuffer".into(),
            CopyImage { .. } => "CopyImage".into(),
            CopyBufferToImage { .. } => "CopyBufferToImage".into(),
            CopyImageToBuffer { .. } => "CopyImageToBuffer".into(),
            BlitImage { .. } => "BlitImage".into(),
            ResolveImage { .. } => "ResolveImage".into(),
            UpdateBuffer { .. } => "UpdateBuffer".into(),
            FillBuffer { .. } => "FillBuffer".into(),
            ClearColorImage { .. } => "ClearColorImage".into(),
            ClearDepthStencilImage { .. } => "ClearDepthStencilImage".into(),
            ClearAttachment { .. } => "ClearAttachment".into(),
            EndRenderPass => "EndRenderPass".into(),
            EndDebugUtilsLabel => "EndDebugLabel".into(),
            EndConditionalRendering => "EndConditionalRendering".into(),
            EndRendering => "EndRendering".into(),
            BeginQuery { .. } => "BeginQuery".into(),
            EndQuery { .. } => "EndQuery".into(),
            ResetQueryPool { .. } => "ResetQueryPool".into(),
            WriteTimestamp { .. } => "WriteTimestamp".into(),
            CopyQueryPoolResults { .. } => "CopyQueryPoolResults".into(),
            CommandKind::TraceRays { .. } => "TraceRays".into(),
            TraceRaysIndirect { .. } => "TraceRaysIndirect".into(),
            BuildAccelStructs { .. } => "BuildAccelerationStructures".into(),
            BuildAccelStructsIndirect { .. } => "BuildAccelerationStructuresIndirect".into(),
            CopyAccelStructure { .. } => "CopyAccelerationStructure".into(),
            CopyAccelStructToMemory { .. } => "CopyAccelerationStructureToMemory".into(),
            CopyMemoryToAccelStruct { .. } => "CopyMemoryToAccelerationStructure".into(),
            WriteAccelStructsProperties { .. } => "WriteAccelerationStructuresProperties".into(),
            CommandKind::BeginRenderPass(cmd) => {
                format!("BeginRenderPass(subpasses={})", cmd.subpass_count)
            }
            FirstSubpass { .. } => "<first subpass>".into(),
            NextSubpass { subpass_index, .. } => format!("NextSubpass({subpass_index})"),
            ExecuteCommandsChild { .. } => "<executed secondary>".into(),
            ExecuteCommands => "ExecuteCommands".into(),
            BeginDebugUtilsLabel { name, .. } => format!("Label({})", &**name),
            BeginConditionalRendering { .. } => "BeginConditionalRendering".into(),
            CommandKind::BeginRendering(_) => "BeginRendering".into(),
            SetViewport { .. } => "SetViewport".into(),
            SetScissor { .. } => "SetScissor".into(),
            SetLineWidth(_) => "SetLineWidth".into(),
            SetDepthBias { .. } => "SetDepthBias".into(),
            SetBlendConstants(_) => "SetBlendConstants".into(),
            SetStencilCompareMask { .. } => "SetStencilCompareMask".into(),
            SetStencilWriteMask { .. } => "SetStencilWriteMask".into(),
            SetStencilReference { .. } => "SetStencilReference".into(),
            SetCullMode(_) => "SetCullMode".into(),
            SetFrontFace(_) => "SetFrontFace".into(),
            SetPrimitiveTopology(_) => "SetPrimitiveTopology".into(),
            SetDepthTestEnable(_) => "SetDepthTestEnable".into(),
            SetDepthWriteEnable(_) => "SetDepthWriteEnable".into(),
            SetDepthCompareOp(_) => "SetDepthCompareOp".into(),
            SetDepthBoundsTestEnable(_) => "SetDepthBoundsTestEnable".into(),
            SetStencilTestEnable(_) => "SetStencilTestEnable".into(),
            SetStencilOp { .. } => "SetStencilOp".into(),
            SetRasterizerDiscardEnable(_) => "SetRasterizerDiscardEnable".into(),
            SetDepthBiasEnable(_) => "SetDepthBiasEnable".into(),
            SetPrimitiveRestartEnable(_) => "SetPrimitiveRestartEnable".into(),
            InsertDebugUtilsLabel { name, .. } => format!("InsertLabel({})", &**name),
            SetFragmentShadingRate { .. } => "SetFragmentShadingRate".into(),
        }
    }

    /// Whether this kind is ever recorded as a section/parent command
    /// (i.e. it may have children in the tree). See `tree.rs`.
    pub fn is_section(&self) -> bool {
        matches!(
            self,
            CommandKind::BeginRenderPass(_)
                | CommandKind::FirstSubpass { .. }
                | CommandKind::NextSubpass { .. }
                | CommandKind::ExecuteCommandsChild { .. }
                | CommandKind::ExecuteCommands
                | CommandKind::BeginDebugUtilsLabel { .. }
                | CommandKind::BeginConditionalRendering { .. }
                | CommandKind::BeginRendering(_)
        )
    }

    /// Whether this kind carries a recorded [`GraphicsState`]/[`ComputeState`]/
    /// [`RayTracingState`] snapshot (draw/dispatch/trace-rays).
    pub fn is_state_carrying(&self) -> bool {
        matches!(
            self,
            CommandKind::Draw { .. }
                | CommandKind::DrawIndexed { .. }
                | CommandKind::DrawIndirect { .. }
                | CommandKind::DrawIndirectCount { .. }
                | CommandKind::Dispatch { .. }
                | CommandKind::DispatchIndirect { .. }
                | CommandKind::DispatchBase { .. }
                | CommandKind::TraceRays { .. }
                | CommandKind::TraceRaysIndirect { .. }
        )
    }
}
