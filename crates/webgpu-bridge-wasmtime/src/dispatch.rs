//! Import resolution: the compile-time callback table and its lookup.
//!
//! Every supported guest import is one [`DispatchEntry`] in a `static`
//! table, keyed by (module, name). Resolution is a pure lookup, safe to
//! call from any thread; an unmatched name is a normal outcome the
//! embedder handles, not an error.

use anyhow::Context as _;
use wasmtime::{Caller, Engine, Func, FuncType, Linker, Store, Val, ValType};

use crate::guest_memory::GuestMemory;
use crate::{thunks, BridgeCx, WebGpuView};

/// A host implementation for one guest import. Unpacks the wasm-level
/// arguments, performs the native call, packs the wasm-level results.
pub type Thunk = fn(BridgeCx<'_>, &[Val], &mut [Val]) -> wasmtime::Result<()>;

pub struct DispatchEntry {
    pub module: &'static str,
    pub name: &'static str,
    pub params: &'static [ValType],
    pub results: &'static [ValType],
    pub(crate) thunk: Thunk,
}

impl DispatchEntry {
    /// The WASM signature the guest must import this function with.
    pub fn func_type(&self, engine: &Engine) -> FuncType {
        FuncType::new(engine, self.params.iter().cloned(), self.results.iter().cloned())
    }

    /// Wraps the thunk in a callable [`Func`]: the "callback plus
    /// environment" pair, where the environment is the store's host state.
    pub fn bind<T: WebGpuView>(&'static self, store: &mut Store<T>) -> Func {
        let ty = self.func_type(store.engine());
        Func::new(store, ty, move |caller, args, results| {
            invoke(self, caller, args, results)
        })
    }
}

/// Resolves one guest import. Byte-string inputs are compared by exact,
/// full-slice equality; no NUL scanning, no case folding. `None` simply
/// means "not provided by this bridge".
pub fn set_callback_webgpu(module_name: &[u8], name: &[u8]) -> Option<&'static DispatchEntry> {
    let entry = DISPATCH_TABLE
        .iter()
        .find(|entry| entry.module.as_bytes() == module_name && entry.name.as_bytes() == name);
    if entry.is_none() {
        log::trace!(
            "no callback for import {}/{}",
            String::from_utf8_lossy(module_name),
            String::from_utf8_lossy(name),
        );
    }
    entry
}

/// Defines a single resolved entry on a linker.
pub fn define_on_linker<T: WebGpuView>(
    linker: &mut Linker<T>,
    entry: &'static DispatchEntry,
) -> anyhow::Result<()> {
    let ty = entry.func_type(linker.engine());
    linker.func_new(entry.module, entry.name, ty, move |caller, args, results| {
        invoke(entry, caller, args, results)
    })?;
    Ok(())
}

/// Defines the whole callback table on a linker.
pub fn add_to_linker<T: WebGpuView>(linker: &mut Linker<T>) -> anyhow::Result<()> {
    for entry in DISPATCH_TABLE {
        define_on_linker(linker, entry)?;
    }
    Ok(())
}

fn invoke<T: WebGpuView>(
    entry: &'static DispatchEntry,
    mut caller: Caller<'_, T>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    // The memory view is re-acquired on every call so growth between calls
    // is observed.
    let memory = caller
        .get_export("memory")
        .and_then(|export| export.into_memory())
        .context("guest instance does not export a linear memory named `memory`")?;
    let (data, host) = memory.data_and_store_mut(&mut caller);
    let cx = BridgeCx {
        memory: GuestMemory::new(data),
        webgpu: host.webgpu(),
    };
    (entry.thunk)(cx, args, results)
}

macro_rules! entry {
    ($name:literal, ($($param:ident),*) -> $result:ident, $thunk:path) => {
        DispatchEntry {
            module: "env",
            name: $name,
            params: &[$(ValType::$param),*],
            results: &[ValType::$result],
            thunk: $thunk,
        }
    };
}

/// The callback table. Compile-time enumerable, so the guest-callable
/// surface is closed and auditable.
pub(crate) static DISPATCH_TABLE: &[DispatchEntry] = &[
    entry!("wgpuCreateInstance", () -> I32, thunks::create_instance),
    entry!("wgpuInstanceRequestAdapter", (I32, I32) -> I32, thunks::instance_request_adapter),
    entry!("wgpuInstanceRelease", (I32) -> I32, thunks::instance_release),
    entry!("wgpuAdapterRequestDevice", (I32, I32) -> I32, thunks::adapter_request_device),
    entry!("wgpuAdapterGetLimits", (I32, I32) -> I32, thunks::adapter_get_limits),
    entry!("wgpuAdapterRelease", (I32) -> I32, thunks::adapter_release),
    entry!("wgpuDeviceGetQueue", (I32) -> I32, thunks::device_get_queue),
    entry!("wgpuDeviceGetLimits", (I32, I32) -> I32, thunks::device_get_limits),
    entry!("wgpuDeviceCreateBuffer", (I32, I32) -> I32, thunks::device_create_buffer),
    entry!("wgpuDeviceCreateTexture", (I32, I32) -> I32, thunks::device_create_texture),
    entry!("wgpuDeviceCreateSampler", (I32, I32) -> I32, thunks::device_create_sampler),
    entry!("wgpuDeviceCreateShaderModule", (I32, I32) -> I32, thunks::device_create_shader_module),
    entry!(
        "wgpuDeviceCreateBindGroupLayout",
        (I32, I32) -> I32,
        thunks::device_create_bind_group_layout
    ),
    entry!(
        "wgpuDeviceCreatePipelineLayout",
        (I32, I32) -> I32,
        thunks::device_create_pipeline_layout
    ),
    entry!("wgpuDeviceCreateBindGroup", (I32, I32) -> I32, thunks::device_create_bind_group),
    entry!(
        "wgpuDeviceCreateComputePipeline",
        (I32, I32) -> I32,
        thunks::device_create_compute_pipeline
    ),
    entry!(
        "wgpuDeviceCreateRenderPipeline",
        (I32, I32) -> I32,
        thunks::device_create_render_pipeline
    ),
    entry!(
        "wgpuDeviceCreateCommandEncoder",
        (I32, I32) -> I32,
        thunks::device_create_command_encoder
    ),
    entry!("wgpuDevicePoll", (I32, I32) -> I32, thunks::device_poll),
    entry!("wgpuDeviceRelease", (I32) -> I32, thunks::device_release),
    entry!("wgpuQueueSubmit", (I32, I32, I32) -> I32, thunks::queue_submit),
    entry!("wgpuQueueWriteBuffer", (I32, I32, I64, I32, I32) -> I32, thunks::queue_write_buffer),
    entry!("wgpuQueueRelease", (I32) -> I32, thunks::queue_release),
    entry!("wgpuBufferMapAsync", (I32, I32, I64, I64) -> I32, thunks::buffer_map_async),
    entry!("wgpuBufferGetMapState", (I32) -> I32, thunks::buffer_get_map_state),
    entry!(
        "wgpuBufferReadMappedRange",
        (I32, I64, I32, I32) -> I32,
        thunks::buffer_read_mapped_range
    ),
    entry!(
        "wgpuBufferWriteMappedRange",
        (I32, I64, I32, I32) -> I32,
        thunks::buffer_write_mapped_range
    ),
    entry!("wgpuBufferUnmap", (I32) -> I32, thunks::buffer_unmap),
    entry!("wgpuBufferDestroy", (I32) -> I32, thunks::buffer_destroy),
    entry!("wgpuBufferRelease", (I32) -> I32, thunks::buffer_release),
    entry!("wgpuTextureCreateView", (I32, I32) -> I32, thunks::texture_create_view),
    entry!("wgpuTextureRelease", (I32) -> I32, thunks::texture_release),
    entry!("wgpuTextureViewRelease", (I32) -> I32, thunks::texture_view_release),
    entry!("wgpuSamplerRelease", (I32) -> I32, thunks::sampler_release),
    entry!("wgpuShaderModuleRelease", (I32) -> I32, thunks::shader_module_release),
    entry!("wgpuBindGroupLayoutRelease", (I32) -> I32, thunks::bind_group_layout_release),
    entry!("wgpuPipelineLayoutRelease", (I32) -> I32, thunks::pipeline_layout_release),
    entry!("wgpuBindGroupRelease", (I32) -> I32, thunks::bind_group_release),
    entry!("wgpuComputePipelineRelease", (I32) -> I32, thunks::compute_pipeline_release),
    entry!("wgpuRenderPipelineRelease", (I32) -> I32, thunks::render_pipeline_release),
    entry!(
        "wgpuCommandEncoderBeginComputePass",
        (I32, I32) -> I32,
        thunks::command_encoder_begin_compute_pass
    ),
    entry!(
        "wgpuCommandEncoderBeginRenderPass",
        (I32, I32) -> I32,
        thunks::command_encoder_begin_render_pass
    ),
    entry!(
        "wgpuCommandEncoderCopyBufferToBuffer",
        (I32, I32, I64, I32, I64, I64) -> I32,
        thunks::command_encoder_copy_buffer_to_buffer
    ),
    entry!("wgpuCommandEncoderFinish", (I32, I32) -> I32, thunks::command_encoder_finish),
    entry!("wgpuCommandEncoderRelease", (I32) -> I32, thunks::command_encoder_release),
    entry!(
        "wgpuComputePassEncoderSetPipeline",
        (I32, I32) -> I32,
        thunks::compute_pass_set_pipeline
    ),
    entry!(
        "wgpuComputePassEncoderSetBindGroup",
        (I32, I32, I32, I32, I32) -> I32,
        thunks::compute_pass_set_bind_group
    ),
    entry!(
        "wgpuComputePassEncoderDispatchWorkgroups",
        (I32, I32, I32, I32) -> I32,
        thunks::compute_pass_dispatch_workgroups
    ),
    entry!("wgpuComputePassEncoderEnd", (I32) -> I32, thunks::compute_pass_end),
    entry!("wgpuComputePassEncoderRelease", (I32) -> I32, thunks::compute_pass_release),
    entry!(
        "wgpuRenderPassEncoderSetPipeline",
        (I32, I32) -> I32,
        thunks::render_pass_set_pipeline
    ),
    entry!(
        "wgpuRenderPassEncoderSetBindGroup",
        (I32, I32, I32, I32, I32) -> I32,
        thunks::render_pass_set_bind_group
    ),
    entry!(
        "wgpuRenderPassEncoderSetVertexBuffer",
        (I32, I32, I32, I64, I64) -> I32,
        thunks::render_pass_set_vertex_buffer
    ),
    entry!(
        "wgpuRenderPassEncoderDraw",
        (I32, I32, I32, I32, I32) -> I32,
        thunks::render_pass_draw
    ),
    entry!("wgpuRenderPassEncoderEnd", (I32) -> I32, thunks::render_pass_end),
    entry!("wgpuRenderPassEncoderRelease", (I32) -> I32, thunks::render_pass_release),
    entry!("wgpuCommandBufferRelease", (I32) -> I32, thunks::command_buffer_release),
    entry!("wgpuGetLastErrorCode", () -> I32, thunks::get_last_error_code),
    entry!("wgpuGetLastErrorMessage", (I32, I32) -> I32, thunks::get_last_error_message),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_imports_resolve() {
        let entry = set_callback_webgpu(b"env", b"wgpuCreateInstance").unwrap();
        assert_eq!(entry.name, "wgpuCreateInstance");
        assert!(entry.params.is_empty());
        assert!(matches!(entry.results, [ValType::I32]));

        let entry = set_callback_webgpu(b"env", b"wgpuQueueWriteBuffer").unwrap();
        assert!(matches!(
            entry.params,
            [ValType::I32, ValType::I32, ValType::I64, ValType::I32, ValType::I32]
        ));
    }

    #[test]
    fn unknown_imports_do_not_resolve() {
        assert!(set_callback_webgpu(b"env", b"wgpuNonExistentFn").is_none());
        assert!(set_callback_webgpu(b"wasi_snapshot_preview1", b"wgpuCreateInstance").is_none());
        // Exact, full-slice comparison: no prefix or empty-string matches.
        assert!(set_callback_webgpu(b"env", b"wgpuCreateInstanc").is_none());
        assert!(set_callback_webgpu(b"env", b"wgpuCreateInstanceX").is_none());
        assert!(set_callback_webgpu(b"env", b"").is_none());
        assert!(set_callback_webgpu(b"", b"").is_none());
    }

    #[test]
    fn byte_string_inputs_need_not_be_utf8() {
        assert!(set_callback_webgpu(b"env", b"\xff\xfe\x00").is_none());
    }

    #[test]
    fn table_has_no_duplicate_keys() {
        for (index, entry) in DISPATCH_TABLE.iter().enumerate() {
            let duplicate = DISPATCH_TABLE[index + 1..]
                .iter()
                .any(|other| other.module == entry.module && other.name == entry.name);
            assert!(!duplicate, "duplicate table key {}/{}", entry.module, entry.name);
        }
    }

    #[test]
    fn resolution_is_safe_from_multiple_threads() {
        let lookups = std::thread::spawn(|| {
            (0..1000)
                .all(|_| set_callback_webgpu(b"env", b"wgpuDevicePoll").is_some())
        });
        let misses = std::thread::spawn(|| {
            (0..1000).all(|_| set_callback_webgpu(b"env", b"wgpuFrobnicate").is_none())
        });
        assert!(lookups.join().unwrap());
        assert!(misses.join().unwrap());
    }
}
