//! Resource registry: reference-counted wrappers around
//! driver handles, keyed by the raw handle value, with destruction
//! notification and short-term "zombie" retention.
//!
//! Uses a TTL/`next_frame` eviction scheme similar to a generational cache: a
//! destroyed handle doesn't vanish from the registry the instant
//! `vkDestroyBuffer` returns, because command records and hook state may
//! still reference the wrapper for a few frames. We
//! keep the wrapper alive, mark it destroyed, and only drop it once it has
//! aged past the zombie TTL.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ash::vk;
use ash::vk::Handle as _;

/// How many frames a destroyed handle's wrapper is kept around before
/// being dropped for good. Chosen generously relative to typical
/// frames-in-flight counts (2-3) to absorb late lookups from in-flight
/// submissions without holding onto zombies indefinitely.
pub const ZOMBIE_TTL_FRAMES: u64 = 8;

/// Every driver handle kind the registry tracks. Mirrors the `VIL_WRAP_*`
/// environment variables below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    Buffer,
    Image,
    ImageView,
    Sampler,
    DescriptorSet,
    DescriptorSetLayout,
    Pipeline,
    PipelineLayout,
    RenderPass,
    Framebuffer,
    CommandBuffer,
    QueryPool,
    Event,
    Semaphore,
    Fence,
    AccelerationStructure,
    ShaderModule,
    Swapchain,
    DeviceMemory,
    BufferView,
}

impl HandleKind {
    pub const ALL: &'static [HandleKind] = &[
        HandleKind::Buffer,
        HandleKind::Image,
        HandleKind::ImageView,
        HandleKind::Sampler,
        HandleKind::DescriptorSet,
        HandleKind::DescriptorSetLayout,
        HandleKind::Pipeline,
        HandleKind::PipelineLayout,
        HandleKind::RenderPass,
        HandleKind::Framebuffer,
        HandleKind::CommandBuffer,
        HandleKind::QueryPool,
        HandleKind::Event,
        HandleKind::Semaphore,
        HandleKind::Fence,
        HandleKind::AccelerationStructure,
        HandleKind::ShaderModule,
        HandleKind::Swapchain,
        HandleKind::DeviceMemory,
        HandleKind::BufferView,
    ];

    /// Suffix used in `VIL_WRAP_<KIND>` environment variable names.
    pub fn env_suffix(&self) -> &'static str {
        match self {
            HandleKind::Buffer => "BUFFER",
            HandleKind::Image => "IMAGE",
            HandleKind::ImageView => "IMAGE_VIEW",
            HandleKind::Sampler => "SAMPLER",
            HandleKind::DescriptorSet => "DESCRIPTOR_SET",
            HandleKind::DescriptorSetLayout => "DESCRIPTOR_SET_LAYOUT",
            HandleKind::Pipeline => "PIPELINE",
            HandleKind::PipelineLayout => "PIPELINE_LAYOUT",
            HandleKind::RenderPass => "RENDER_PASS",
            HandleKind::Framebuffer => "FRAMEBUFFER",
            HandleKind::CommandBuffer => "COMMAND_BUFFER",
            HandleKind::QueryPool => "QUERY_POOL",
            HandleKind::Event => "EVENT",
            HandleKind::Semaphore => "SEMAPHORE",
            HandleKind::Fence => "FENCE",
            HandleKind::AccelerationStructure => "ACCELERATION_STRUCTURE",
            HandleKind::ShaderModule => "SHADER_MODULE",
            HandleKind::Swapchain => "SWAPCHAIN",
            HandleKind::DeviceMemory => "DEVICE_MEMORY",
            HandleKind::BufferView => "BUFFER_VIEW",
        }
    }
}

/// Bound satisfied by every `ash` non-dispatchable/dispatchable handle
/// type, letting `Registry<H>` be generic over which Vulkan object it
/// tracks.
pub trait HandleKey: ash::vk::Handle + Copy + Eq + std::hash::Hash + Send + Sync + 'static {}
impl<T: ash::vk::Handle + Copy + Eq + std::hash::Hash + Send + Sync + 'static> HandleKey for T {}

/// A reference-counted wrapper around one driver handle. Destruction
/// doesn't drop this (the registry keeps it as a zombie for
/// [`ZOMBIE_TTL_FRAMES`]); it just flips `destroyed`.
pub struct RegistryEntry<H> {
    pub handle: H,
    pub kind: HandleKind,
    destroyed: AtomicBool,
    pub debug_name: Mutex<Option<String>>,
}

impl<H: Copy> RegistryEntry<H> {
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn mark_destroyed(&self) {
        self.destroyed.store(true, Ordering::Release);
    }
}

struct Zombie<H> {
    entry: Arc<RegistryEntry<H>>,
    destroyed_at_frame: u64,
}

/// Tracks every live (and recently-destroyed) handle of one kind.
pub struct Registry<H: HandleKey> {
    kind: HandleKind,
    live: Mutex<HashMap<H, Arc<RegistryEntry<H>>>>,
    zombies: Mutex<Vec<Zombie<H>>>,
}

impl<H: HandleKey> Registry<H> {
    pub fn new(kind: HandleKind) -> Self {
        Registry {
            kind,
            live: Mutex::new(HashMap::new()),
            zombies: Mutex::new(Vec::new()),
        }
    }

    /// Registers a newly-created handle, returning its wrapper.
    pub fn insert(&self, handle: H) -> Arc<RegistryEntry<H>> {
        let entry = Arc::new(RegistryEntry {
            handle,
            kind: self.kind,
            destroyed: AtomicBool::new(false),
            debug_name: Mutex::new(None),
        });
        self.live.lock().unwrap().insert(handle, entry.clone());
        entry
    }

    /// Looks up a handle, checking live entries first and falling back to
    /// not-yet-pruned zombies (a lookup racing a destruction notification
    /// should still see a valid, if `destroyed() == true`, wrapper).
    pub fn lookup(&self, handle: H) -> Option<Arc<RegistryEntry<H>>> {
        if let Some(entry) = self.live.lock().unwrap().get(&handle) {
            return Some(entry.clone());
        }
        self.zombies
            .lock()
            .unwrap()
            .iter()
            .find(|z| z.entry.handle == handle)
            .map(|z| z.entry.clone())
    }

    /// Moves `handle` from live into the zombie list, marking it
    /// destroyed. Returns the entry so callers (the device-wide pending
    /// record list) can invalidate anything still referencing it.
    pub fn notify_destroyed(&self, handle: H, current_frame: u64) -> Option<Arc<RegistryEntry<H>>> {
        let entry = self.live.lock().unwrap().remove(&handle)?;
        entry.mark_destroyed();
        self.zombies.lock().unwrap().push(Zombie {
            entry: entry.clone(),
            destroyed_at_frame: current_frame,
        });
        Some(entry)
    }

    /// Drops zombies older than [`ZOMBIE_TTL_FRAMES`]. Call once per
    /// frame, the same cadence a generational cache uses for its own
    /// `next_frame` eviction pass.
    pub fn collect_garbage(&self, current_frame: u64) {
        self.zombies
            .lock()
            .unwrap()
            .retain(|z| current_frame.saturating_sub(z.destroyed_at_frame) <= ZOMBIE_TTL_FRAMES);
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().unwrap().len()
    }
}

/// Type-erased, cloneable keep-alive handle, used by
/// [`crate::command::CommandRecord`]'s resource reference list so one
/// `Vec` can hold references across every handle kind.
#[derive(Clone)]
pub enum AnyHandleRef {
    Buffer(Arc<RegistryEntry<vk::Buffer>>),
    Image(Arc<RegistryEntry<vk::Image>>),
    ImageView(Arc<RegistryEntry<vk::ImageView>>),
    Sampler(Arc<RegistryEntry<vk::Sampler>>),
    DescriptorSet(Arc<RegistryEntry<vk::DescriptorSet>>),
    DescriptorSetLayout(Arc<RegistryEntry<vk::DescriptorSetLayout>>),
    Pipeline(Arc<RegistryEntry<vk::Pipeline>>),
    PipelineLayout(Arc<RegistryEntry<vk::PipelineLayout>>),
    RenderPass(Arc<RegistryEntry<vk::RenderPass>>),
    Framebuffer(Arc<RegistryEntry<vk::Framebuffer>>),
    CommandBuffer(Arc<RegistryEntry<vk::CommandBuffer>>),
    QueryPool(Arc<RegistryEntry<vk::QueryPool>>),
    Event(Arc<RegistryEntry<vk::Event>>),
    Semaphore(Arc<RegistryEntry<vk::Semaphore>>),
    Fence(Arc<RegistryEntry<vk::Fence>>),
    AccelerationStructure(Arc<RegistryEntry<vk::AccelerationStructureKHR>>),
    ShaderModule(Arc<RegistryEntry<vk::ShaderModule>>),
    Swapchain(Arc<RegistryEntry<vk::SwapchainKHR>>),
    DeviceMemory(Arc<RegistryEntry<vk::DeviceMemory>>),
    BufferView(Arc<RegistryEntry<vk::BufferView>>),
}

macro_rules! any_handle_ref_dispatch {
    ($self:expr, $entry:ident => $body:expr) => {
        match $self {
            AnyHandleRef::Buffer($entry) => $body,
            AnyHandleRef::Image($entry) => $body,
            AnyHandleRef::ImageView($entry) => $body,
            AnyHandleRef::Sampler($entry) => $body,
            AnyHandleRef::DescriptorSet($entry) => $body,
            AnyHandleRef::DescriptorSetLayout($entry) => $body,
            AnyHandleRef::Pipeline($entry) => $body,
            AnyHandleRef::PipelineLayout($entry) => $body,
            AnyHandleRef::RenderPass($entry) => $body,
            AnyHandleRef::Framebuffer($entry) => $body,
            AnyHandleRef::CommandBuffer($entry) => $body,
            AnyHandleRef::QueryPool($entry) => $body,
            AnyHandleRef::Event($entry) => $body,
            AnyHandleRef::Semaphore($entry) => $body,
            AnyHandleRef::Fence($entry) => $body,
            AnyHandleRef::AccelerationStructure($entry) => $body,
            AnyHandleRef::ShaderModule($entry) => $body,
            AnyHandleRef::Swapchain($entry) => $body,
            AnyHandleRef::DeviceMemory($entry) => $body,
            AnyHandleRef::BufferView($entry) => $body,
        }
    };
}

impl AnyHandleRef {
    pub fn is_destroyed(&self) -> bool {
        any_handle_ref_dispatch!(self, e => e.is_destroyed())
    }

    pub fn kind(&self) -> HandleKind {
        any_handle_ref_dispatch!(self, e => e.kind)
    }
}

/// Every per-device registry, one per handle kind. Owned by
/// [`crate::device::DeviceState`].
pub struct Registries {
    pub buffers: Registry<vk::Buffer>,
    pub images: Registry<vk::Image>,
    pub image_views: Registry<vk::ImageView>,
    pub samplers: Registry<vk::Sampler>,
    pub descriptor_sets: Registry<vk::DescriptorSet>,
    pub descriptor_set_layouts: Registry<vk::DescriptorSetLayout>,
    pub pipelines: Registry<vk::Pipeline>,
    pub pipeline_layouts: Registry<vk::PipelineLayout>,
    pub render_passes: Registry<vk::RenderPass>,
    pub framebuffers: Registry<vk::Framebuffer>,
    pub command_buffers: Registry<vk::CommandBuffer>,
    pub query_pools: Registry<vk::QueryPool>,
    pub events: Registry<vk::Event>,
    pub semaphores: Registry<vk::Semaphore>,
    pub fences: Registry<vk::Fence>,
    pub acceleration_structures: Registry<vk::AccelerationStructureKHR>,
    pub shader_modules: Registry<vk::ShaderModule>,
    pub swapchains: Registry<vk::SwapchainKHR>,
    pub device_memory: Registry<vk::DeviceMemory>,
    pub buffer_views: Registry<vk::BufferView>,
}

impl Default for Registries {
    fn default() -> Self {
        Registries {
            buffers: Registry::new(HandleKind::Buffer),
            images: Registry::new(HandleKind::Image),
            image_views: Registry::new(HandleKind::ImageView),
            samplers: Registry::new(HandleKind::Sampler),
            descriptor_sets: Registry::new(HandleKind::DescriptorSet),
            descriptor_set_layouts: Registry::new(HandleKind::DescriptorSetLayout),
            pipelines: Registry::new(HandleKind::Pipeline),
            pipeline_layouts: Registry::new(HandleKind::PipelineLayout),
            render_passes: Registry::new(HandleKind::RenderPass),
            framebuffers: Registry::new(HandleKind::Framebuffer),
            command_buffers: Registry::new(HandleKind::CommandBuffer),
            query_pools: Registry::new(HandleKind::QueryPool),
            events: Registry::new(HandleKind::Event),
            semaphores: Registry::new(HandleKind::Semaphore),
            fences: Registry::new(HandleKind::Fence),
            acceleration_structures: Registry::new(HandleKind::AccelerationStructure),
            shader_modules: Registry::new(HandleKind::ShaderModule),
            swapchains: Registry::new(HandleKind::Swapchain),
            device_memory: Registry::new(HandleKind::DeviceMemory),
            buffer_views: Registry::new(HandleKind::BufferView),
        }
    }
}

impl Registries {
    /// Runs garbage collection across every handle kind. Called once per
    /// frame boundary by `DeviceState`.
    pub fn collect_garbage(&self, current_frame: u64) {
        self.buffers.collect_garbage(current_frame);
        self.images.collect_garbage(current_frame);
        self.image_views.collect_garbage(current_frame);
        self.samplers.collect_garbage(current_frame);
        self.descriptor_sets.collect_garbage(current_frame);
        self.descriptor_set_layouts.collect_garbage(current_frame);
        self.pipelines.collect_garbage(current_frame);
        self.pipeline_layouts.collect_garbage(current_frame);
        self.render_passes.collect_garbage(current_frame);
        self.framebuffers.collect_garbage(current_frame);
        self.command_buffers.collect_garbage(current_frame);
        self.query_pools.collect_garbage(current_frame);
        self.events.collect_garbage(current_frame);
        self.semaphores.collect_garbage(current_frame);
        self.fences.collect_garbage(current_frame);
        self.acceleration_structures.collect_garbage(current_frame);
        self.shader_modules.collect_garbage(current_frame);
        self.swapchains.collect_garbage(current_frame);
        self.device_memory.collect_garbage(current_frame);
        self.buffer_views.collect_garbage(current_frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_lookup_returns_same_entry() {
        let reg: Registry<vk::Buffer> = Registry::new(HandleKind::Buffer);
        let handle = vk::Buffer::from_raw(42);
        let entry = reg.insert(handle);
        let looked_up = reg.lookup(handle).unwrap();
        assert!(Arc::ptr_eq(&entry, &looked_up));
        assert!(!looked_up.is_destroyed());
    }

    #[test]
    fn destroyed_handle_becomes_zombie_then_gets_pruned() {
        let reg: Registry<vk::Buffer> = Registry::new(HandleKind::Buffer);
        let handle = vk::Buffer::from_raw(7);
        reg.insert(handle);
        reg.notify_destroyed(handle, 10);
        let zombie = reg.lookup(handle).expect("zombie still lookup-able");
        assert!(zombie.is_destroyed());
        assert_eq!(reg.live_count(), 0);

        reg.collect_garbage(10 + ZOMBIE_TTL_FRAMES + 1);
        assert!(reg.lookup(handle).is_none());
    }

    #[test]
    fn any_handle_ref_reports_underlying_kind_and_state() {
        let reg: Registry<vk::Image> = Registry::new(HandleKind::Image);
        let handle = vk::Image::from_raw(99);
        let entry = reg.insert(handle);
        let any = AnyHandleRef::Image(entry);
        assert_eq!(any.kind(), HandleKind::Image);
        assert!(!any.is_destroyed());
    }
}
