//! A host-function bridge exposing native WebGPU to core WebAssembly modules.
//!
//! Guests import C-style `wgpu*` functions from module `"env"`. The embedding
//! engine resolves each declared import with [`set_callback_webgpu`] (or
//! defines the whole set at once with [`add_to_linker`]); every resolved
//! import is a thunk that unpacks wasm scalars and guest-memory descriptors,
//! invokes `wgpu-core`, and packs the result back as a handle or status code.
//!
//! Native objects never cross the boundary: the guest holds small-integer
//! handles into a per-store [`HandleTable`]. Guest-triggerable failures (bad
//! pointers, stale handles, native errors) are reported through the wire
//! protocol and never trap the guest.

use std::sync::Arc;

use wgpu_core::global::Global;
use wgpu_core::identity::IdentityManagerFactory;

mod dispatch;
mod enum_conversions;
mod error;
mod guest_memory;
mod handles;
mod thunks;
mod to_core_conversions;
mod wrapper_types;

pub use dispatch::{add_to_linker, define_on_linker, set_callback_webgpu, DispatchEntry, Thunk};
pub use error::{status, BridgeError};
pub use guest_memory::GuestMemory;
pub use handles::{HandleKind, HandleTable};

use wrapper_types::{Buffer, Device, RecordedComputePass, RecordedRenderPass, Resource};

#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) type Backend = wgpu_core::api::Vulkan;

#[cfg(target_os = "windows")]
pub(crate) type Backend = wgpu_core::api::Dx12;

#[cfg(any(target_os = "macos", target_os = "ios"))]
pub(crate) type Backend = wgpu_core::api::Metal;

#[cfg(all(
    not(target_os = "linux"),
    not(target_os = "android"),
    not(target_os = "windows"),
    not(target_os = "macos"),
    not(target_os = "ios"),
))]
pub(crate) type Backend = wgpu_core::api::Gl;

/// Host state giving the bridge access to its per-store context. Implemented
/// by the embedder's store data.
pub trait WebGpuView {
    fn webgpu(&mut self) -> &mut WebGpuCtx;
}

/// Per-store bridge state: the native WebGPU instance, the handle table, and
/// the last-error cell. One per wasm instance; the store's `&mut` discipline
/// serializes all access, so there is no locking here.
pub struct WebGpuCtx {
    pub(crate) instance: Arc<Global<IdentityManagerFactory>>,
    pub(crate) table: HandleTable<Resource>,
    pub(crate) last_error: Option<(u32, String)>,
}

impl WebGpuCtx {
    pub fn new() -> Self {
        let instance = Global::new(
            "webgpu-bridge",
            IdentityManagerFactory,
            wgpu_types::InstanceDescriptor {
                backends: wgpu_types::Backends::all(),
                ..Default::default()
            },
        );
        WebGpuCtx {
            instance: Arc::new(instance),
            table: HandleTable::new(),
            last_error: None,
        }
    }

    /// Code of the most recent failure, `0` if none.
    pub fn last_error_code(&self) -> u32 {
        self.last_error.as_ref().map(|(code, _)| *code).unwrap_or(0)
    }

    pub fn last_error_message(&self) -> Option<&str> {
        self.last_error.as_ref().map(|(_, message)| message.as_str())
    }

    pub(crate) fn global(&self) -> Arc<Global<IdentityManagerFactory>> {
        Arc::clone(&self.instance)
    }

    /// Parks a resource in the table under its own category.
    pub(crate) fn insert(&mut self, resource: Resource) -> u32 {
        self.table.alloc(resource.kind(), resource)
    }

    pub(crate) fn record_error(&mut self, err: &BridgeError) {
        log::debug!("guest call failed: {err}");
        self.last_error = Some((err.code(), err.to_string()));
    }

    /// Releases the table's refcount on a native object. Called with the
    /// resource already removed from the table.
    pub(crate) fn drop_native(&self, resource: Resource) {
        let global = &self.instance;
        match resource {
            // The native instance lives as long as the context itself.
            Resource::Instance => {}
            Resource::Adapter(id) => global.adapter_drop::<Backend>(id),
            Resource::Device(device) => {
                global.device_drop::<Backend>(device.device);
                global.queue_drop::<Backend>(device.queue);
            }
            // Queue handles are views; the queue itself is owned by the
            // device entry and dropped with it.
            Resource::Queue(_) => {}
            Resource::Buffer(buffer) => global.buffer_drop::<Backend>(buffer.id, false),
            Resource::Texture(id) => global.texture_drop::<Backend>(id, false),
            Resource::TextureView(id) => {
                if let Err(err) = global.texture_view_drop::<Backend>(id, false) {
                    log::warn!("texture view drop failed: {err}");
                }
            }
            Resource::Sampler(id) => global.sampler_drop::<Backend>(id),
            Resource::ShaderModule(id) => global.shader_module_drop::<Backend>(id),
            Resource::BindGroupLayout(id) => global.bind_group_layout_drop::<Backend>(id),
            Resource::PipelineLayout(id) => global.pipeline_layout_drop::<Backend>(id),
            Resource::BindGroup(id) => global.bind_group_drop::<Backend>(id),
            Resource::ComputePipeline(id) => global.compute_pipeline_drop::<Backend>(id),
            Resource::RenderPipeline(id) => global.render_pipeline_drop::<Backend>(id),
            Resource::CommandEncoder(id) => global.command_encoder_drop::<Backend>(id),
            // Recording state only; an unended pass is simply discarded.
            Resource::ComputePass(_) | Resource::RenderPass(_) => {}
            Resource::CommandBuffer(id) => global.command_buffer_drop::<Backend>(id),
        }
    }
}

impl Default for WebGpuCtx {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WebGpuCtx {
    fn drop(&mut self) {
        // Release whatever the guest leaked. Native refcounts make the
        // order irrelevant.
        let leaked: Vec<_> = self.table.drain().collect();
        for (kind, resource) in leaked {
            log::trace!("dropping leaked {kind} handle");
            self.drop_native(resource);
        }
    }
}

macro_rules! id_accessor {
    ($fn_name:ident, $kind:ident, $variant:ident, $id:ty) => {
        pub(crate) fn $fn_name(&self, handle: u32) -> Result<$id, BridgeError> {
            match self.table.get(handle, HandleKind::$kind)? {
                Resource::$variant(id) => Ok(*id),
                _ => Err(BridgeError::InvalidHandle(handle)),
            }
        }
    };
}

impl WebGpuCtx {
    id_accessor!(adapter_id, Adapter, Adapter, wgpu_core::id::AdapterId);
    id_accessor!(queue_id, Queue, Queue, wgpu_core::id::QueueId);
    id_accessor!(texture_id, Texture, Texture, wgpu_core::id::TextureId);
    id_accessor!(texture_view_id, TextureView, TextureView, wgpu_core::id::TextureViewId);
    id_accessor!(shader_module_id, ShaderModule, ShaderModule, wgpu_core::id::ShaderModuleId);
    id_accessor!(
        bind_group_layout_id,
        BindGroupLayout,
        BindGroupLayout,
        wgpu_core::id::BindGroupLayoutId
    );
    id_accessor!(
        pipeline_layout_id,
        PipelineLayout,
        PipelineLayout,
        wgpu_core::id::PipelineLayoutId
    );
    id_accessor!(bind_group_id, BindGroup, BindGroup, wgpu_core::id::BindGroupId);
    id_accessor!(
        compute_pipeline_id,
        ComputePipeline,
        ComputePipeline,
        wgpu_core::id::ComputePipelineId
    );
    id_accessor!(
        render_pipeline_id,
        RenderPipeline,
        RenderPipeline,
        wgpu_core::id::RenderPipelineId
    );
    id_accessor!(
        command_encoder_id,
        CommandEncoder,
        CommandEncoder,
        wgpu_core::id::CommandEncoderId
    );
    id_accessor!(command_buffer_id, CommandBuffer, CommandBuffer, wgpu_core::id::CommandBufferId);

    pub(crate) fn device(&self, handle: u32) -> Result<Device, BridgeError> {
        match self.table.get(handle, HandleKind::Device)? {
            Resource::Device(device) => Ok(*device),
            _ => Err(BridgeError::InvalidHandle(handle)),
        }
    }

    pub(crate) fn buffer(&self, handle: u32) -> Result<&Buffer, BridgeError> {
        match self.table.get(handle, HandleKind::Buffer)? {
            Resource::Buffer(buffer) => Ok(buffer),
            _ => Err(BridgeError::InvalidHandle(handle)),
        }
    }

    pub(crate) fn buffer_mut(&mut self, handle: u32) -> Result<&mut Buffer, BridgeError> {
        match self.table.get_mut(handle, HandleKind::Buffer)? {
            Resource::Buffer(buffer) => Ok(buffer),
            _ => Err(BridgeError::InvalidHandle(handle)),
        }
    }

    pub(crate) fn compute_pass_mut(
        &mut self,
        handle: u32,
    ) -> Result<&mut RecordedComputePass, BridgeError> {
        match self.table.get_mut(handle, HandleKind::ComputePass)? {
            Resource::ComputePass(pass) => Ok(pass),
            _ => Err(BridgeError::InvalidHandle(handle)),
        }
    }

    pub(crate) fn render_pass_mut(
        &mut self,
        handle: u32,
    ) -> Result<&mut RecordedRenderPass, BridgeError> {
        match self.table.get_mut(handle, HandleKind::RenderPass)? {
            Resource::RenderPass(pass) => Ok(pass),
            _ => Err(BridgeError::InvalidHandle(handle)),
        }
    }
}

/// The per-call view handed to every thunk: a bounds-checked window over the
/// guest's current linear memory plus the store's bridge context. Rebuilt on
/// every call, so memory growth between calls is observed.
pub struct BridgeCx<'a> {
    pub memory: GuestMemory<'a>,
    pub webgpu: &'a mut WebGpuCtx,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_files_a_resource_under_its_own_category() {
        let mut ctx = WebGpuCtx::new();
        let handle = ctx.insert(Resource::Instance);
        assert!(ctx.table.get(handle, HandleKind::Instance).is_ok());
        assert!(matches!(
            ctx.table.get(handle, HandleKind::Adapter),
            Err(BridgeError::WrongHandleKind { .. })
        ));
    }
}
