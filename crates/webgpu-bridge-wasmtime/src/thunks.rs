//! The host side of every guest-callable function.
//!
//! Each thunk follows the same shape: unpack wasm scalars and guest-memory
//! descriptors, invoke `wgpu-core`, pack a handle or status code back into
//! the result slot. Guest-triggerable failures are recorded in the
//! last-error cell and reported through the wire protocol; a thunk only
//! returns `Err` (a trap) for host-integration bugs such as a missing
//! result slot.

use std::borrow::Cow;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::bail;
use wasmtime::Val;

use crate::error::{status, BridgeError};
use crate::handles::HandleKind;
use crate::to_core_conversions as to_core;
use crate::wrapper_types::{
    map_state, Buffer, Device, MapState, RecordedComputePass, RecordedRenderPass, Resource,
};
use crate::{enum_conversions as enums, Backend, BridgeCx, WebGpuCtx};

fn arg_u32(args: &[Val], index: usize) -> wasmtime::Result<u32> {
    match args.get(index) {
        Some(Val::I32(value)) => Ok(*value as u32),
        _ => bail!("argument {index} is not an i32"),
    }
}

fn arg_u64(args: &[Val], index: usize) -> wasmtime::Result<u64> {
    match args.get(index) {
        Some(Val::I64(value)) => Ok(*value as u64),
        _ => bail!("argument {index} is not an i64"),
    }
}

fn set_result(results: &mut [Val], value: u32) -> wasmtime::Result<()> {
    match results.first_mut() {
        Some(slot) => {
            *slot = Val::I32(value as i32);
            Ok(())
        }
        None => bail!("missing result slot"),
    }
}

/// Packs a status-returning outcome: `0` on success, the taxonomy code on
/// failure, with the error recorded for `wgpuGetLastError*`.
fn finish_status(
    cx: &mut BridgeCx<'_>,
    results: &mut [Val],
    outcome: Result<(), BridgeError>,
) -> wasmtime::Result<()> {
    let code = match outcome {
        Ok(()) => status::SUCCESS,
        Err(err) => {
            cx.webgpu.record_error(&err);
            err.code()
        }
    };
    set_result(results, code)
}

/// Packs a value-returning outcome: the value on success, `0` on failure.
fn finish_u32(
    cx: &mut BridgeCx<'_>,
    results: &mut [Val],
    outcome: Result<u32, BridgeError>,
) -> wasmtime::Result<()> {
    let value = match outcome {
        Ok(value) => value,
        Err(err) => {
            cx.webgpu.record_error(&err);
            0
        }
    };
    set_result(results, value)
}

fn lock(cell: &Mutex<MapState>) -> MutexGuard<'_, MapState> {
    cell.lock().unwrap_or_else(|poison| poison.into_inner())
}

/// Frees a handle of the expected kind and drops the native object behind
/// it. A second release of the same handle is benign: it reports
/// `AlreadyReleased` and leaves all state untouched.
fn release(webgpu: &mut WebGpuCtx, handle: u32, kind: HandleKind) -> Result<(), BridgeError> {
    if let Err(err) = webgpu.table.get(handle, kind) {
        if matches!(err, BridgeError::AlreadyReleased(_)) {
            log::warn!("double release of {kind} handle {handle}");
        }
        return Err(err);
    }
    let (_, resource) = webgpu.table.free(handle)?;
    webgpu.drop_native(resource);
    Ok(())
}

macro_rules! release_thunks {
    ($($fn_name:ident => $kind:ident),* $(,)?) => {
        $(
            pub(crate) fn $fn_name(
                mut cx: BridgeCx<'_>,
                args: &[Val],
                results: &mut [Val],
            ) -> wasmtime::Result<()> {
                let handle = arg_u32(args, 0)?;
                let outcome = release(cx.webgpu, handle, HandleKind::$kind);
                finish_status(&mut cx, results, outcome)
            }
        )*
    };
}

release_thunks! {
    instance_release => Instance,
    adapter_release => Adapter,
    device_release => Device,
    queue_release => Queue,
    buffer_release => Buffer,
    texture_release => Texture,
    texture_view_release => TextureView,
    sampler_release => Sampler,
    shader_module_release => ShaderModule,
    bind_group_layout_release => BindGroupLayout,
    pipeline_layout_release => PipelineLayout,
    bind_group_release => BindGroup,
    compute_pipeline_release => ComputePipeline,
    render_pipeline_release => RenderPipeline,
    command_encoder_release => CommandEncoder,
    compute_pass_release => ComputePass,
    render_pass_release => RenderPass,
    command_buffer_release => CommandBuffer,
}

pub(crate) fn create_instance(
    mut cx: BridgeCx<'_>,
    _args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let handle = cx.webgpu.insert(Resource::Instance);
    log::trace!("created instance handle {handle}");
    finish_u32(&mut cx, results, Ok(handle))
}

pub(crate) fn instance_request_adapter(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let instance = arg_u32(args, 0)?;
    let options_ptr = arg_u32(args, 1)?;
    let outcome = (|| {
        cx.webgpu.table.get(instance, HandleKind::Instance)?;
        let options = if options_ptr == 0 {
            wgpu_core::instance::RequestAdapterOptions {
                power_preference: wgpu_types::PowerPreference::None,
                force_fallback_adapter: false,
                compatible_surface: None,
            }
        } else {
            to_core::request_adapter_options(&cx.memory, options_ptr)?
        };
        let global = cx.webgpu.global();
        let adapter = global
            .request_adapter(
                &options,
                wgpu_core::instance::AdapterInputs::Mask(wgpu_types::Backends::all(), |_| ()),
            )
            .map_err(BridgeError::native)?;
        Ok(cx.webgpu.insert(Resource::Adapter(adapter)))
    })();
    finish_u32(&mut cx, results, outcome)
}

pub(crate) fn adapter_request_device(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let adapter = arg_u32(args, 0)?;
    let descriptor_ptr = arg_u32(args, 1)?;
    let outcome = (|| {
        let adapter_id = cx.webgpu.adapter_id(adapter)?;
        let descriptor = if descriptor_ptr == 0 {
            wgpu_types::DeviceDescriptor {
                label: None,
                required_features: wgpu_types::Features::empty(),
                required_limits: wgpu_types::Limits::default(),
            }
        } else {
            to_core::device_descriptor(&cx.memory, descriptor_ptr)?
        };
        let global = cx.webgpu.global();
        let (device, queue, error) =
            global.adapter_request_device::<Backend>(adapter_id, &descriptor, None, (), ());
        if let Some(err) = error {
            return Err(BridgeError::native(err));
        }
        Ok(cx.webgpu.insert(Resource::Device(Device { device, queue })))
    })();
    finish_u32(&mut cx, results, outcome)
}

pub(crate) fn adapter_get_limits(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let adapter = arg_u32(args, 0)?;
    let out_ptr = arg_u32(args, 1)?;
    let outcome = (|| {
        let adapter_id = cx.webgpu.adapter_id(adapter)?;
        let limits = cx
            .webgpu
            .global()
            .adapter_limits::<Backend>(adapter_id)
            .map_err(BridgeError::native)?;
        to_core::write_limits(&mut cx.memory, out_ptr, &limits)
    })();
    finish_status(&mut cx, results, outcome)
}

pub(crate) fn device_get_queue(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let device = arg_u32(args, 0)?;
    let outcome = (|| {
        let device = cx.webgpu.device(device)?;
        Ok(cx.webgpu.insert(Resource::Queue(device.queue)))
    })();
    finish_u32(&mut cx, results, outcome)
}

pub(crate) fn device_get_limits(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let device = arg_u32(args, 0)?;
    let out_ptr = arg_u32(args, 1)?;
    let outcome = (|| {
        let device = cx.webgpu.device(device)?;
        let limits = cx
            .webgpu
            .global()
            .device_limits::<Backend>(device.device)
            .map_err(BridgeError::native)?;
        to_core::write_limits(&mut cx.memory, out_ptr, &limits)
    })();
    finish_status(&mut cx, results, outcome)
}

pub(crate) fn device_create_buffer(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let device = arg_u32(args, 0)?;
    let descriptor_ptr = arg_u32(args, 1)?;
    let outcome = (|| {
        let device = cx.webgpu.device(device)?;
        let descriptor = to_core::buffer_descriptor(&cx.memory, descriptor_ptr)?;
        let global = cx.webgpu.global();
        let (id, error) = global.device_create_buffer::<Backend>(device.device, &descriptor, ());
        if let Some(err) = error {
            return Err(BridgeError::native(err));
        }
        // A buffer mapped at creation is writable over its whole extent
        // without a MapAsync round trip, like the native API.
        let map = descriptor.mapped_at_creation.then(|| {
            Arc::new(Mutex::new(MapState::Mapped {
                offset: 0,
                size: descriptor.size,
            }))
        });
        Ok(cx.webgpu.insert(Resource::Buffer(Buffer {
            id,
            size: descriptor.size,
            map,
        })))
    })();
    finish_u32(&mut cx, results, outcome)
}

pub(crate) fn device_create_texture(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let device = arg_u32(args, 0)?;
    let descriptor_ptr = arg_u32(args, 1)?;
    let outcome = (|| {
        let device = cx.webgpu.device(device)?;
        let descriptor = to_core::texture_descriptor(&cx.memory, descriptor_ptr)?;
        let global = cx.webgpu.global();
        let (id, error) = global.device_create_texture::<Backend>(device.device, &descriptor, ());
        if let Some(err) = error {
            return Err(BridgeError::native(err));
        }
        Ok(cx.webgpu.insert(Resource::Texture(id)))
    })();
    finish_u32(&mut cx, results, outcome)
}

pub(crate) fn device_create_sampler(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let device = arg_u32(args, 0)?;
    let descriptor_ptr = arg_u32(args, 1)?;
    let outcome = (|| {
        let device = cx.webgpu.device(device)?;
        let descriptor = to_core::sampler_descriptor(&cx.memory, descriptor_ptr)?;
        let global = cx.webgpu.global();
        let (id, error) = global.device_create_sampler::<Backend>(device.device, &descriptor, ());
        if let Some(err) = error {
            return Err(BridgeError::native(err));
        }
        Ok(cx.webgpu.insert(Resource::Sampler(id)))
    })();
    finish_u32(&mut cx, results, outcome)
}

pub(crate) fn device_create_shader_module(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let device = arg_u32(args, 0)?;
    let descriptor_ptr = arg_u32(args, 1)?;
    let outcome = (|| {
        let device = cx.webgpu.device(device)?;
        let (descriptor, code) = to_core::shader_module_descriptor(&cx.memory, descriptor_ptr)?;
        let source = wgpu_core::pipeline::ShaderModuleSource::Wgsl(Cow::Owned(code));
        let global = cx.webgpu.global();
        let (id, error) =
            global.device_create_shader_module::<Backend>(device.device, &descriptor, source, ());
        if let Some(err) = error {
            return Err(BridgeError::native(err));
        }
        Ok(cx.webgpu.insert(Resource::ShaderModule(id)))
    })();
    finish_u32(&mut cx, results, outcome)
}

pub(crate) fn device_create_bind_group_layout(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let device = arg_u32(args, 0)?;
    let descriptor_ptr = arg_u32(args, 1)?;
    let outcome = (|| {
        let device = cx.webgpu.device(device)?;
        let descriptor = to_core::bind_group_layout_descriptor(&cx.memory, descriptor_ptr)?;
        let global = cx.webgpu.global();
        let (id, error) =
            global.device_create_bind_group_layout::<Backend>(device.device, &descriptor, ());
        if let Some(err) = error {
            return Err(BridgeError::native(err));
        }
        Ok(cx.webgpu.insert(Resource::BindGroupLayout(id)))
    })();
    finish_u32(&mut cx, results, outcome)
}

pub(crate) fn device_create_pipeline_layout(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let device = arg_u32(args, 0)?;
    let descriptor_ptr = arg_u32(args, 1)?;
    let outcome = (|| {
        let device = cx.webgpu.device(device)?;
        let descriptor =
            to_core::pipeline_layout_descriptor(&cx.memory, cx.webgpu, descriptor_ptr)?;
        let global = cx.webgpu.global();
        let (id, error) =
            global.device_create_pipeline_layout::<Backend>(device.device, &descriptor, ());
        if let Some(err) = error {
            return Err(BridgeError::native(err));
        }
        Ok(cx.webgpu.insert(Resource::PipelineLayout(id)))
    })();
    finish_u32(&mut cx, results, outcome)
}

pub(crate) fn device_create_bind_group(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let device = arg_u32(args, 0)?;
    let descriptor_ptr = arg_u32(args, 1)?;
    let outcome = (|| {
        let device = cx.webgpu.device(device)?;
        let descriptor = to_core::bind_group_descriptor(&cx.memory, cx.webgpu, descriptor_ptr)?;
        let global = cx.webgpu.global();
        let (id, error) =
            global.device_create_bind_group::<Backend>(device.device, &descriptor, ());
        if let Some(err) = error {
            return Err(BridgeError::native(err));
        }
        Ok(cx.webgpu.insert(Resource::BindGroup(id)))
    })();
    finish_u32(&mut cx, results, outcome)
}

fn implicit_pipeline_ids(
    layout: Option<wgpu_core::id::PipelineLayoutId>,
) -> Option<wgpu_core::device::ImplicitPipelineIds<'static, wgpu_core::identity::IdentityManagerFactory>>
{
    match layout {
        Some(_) => None,
        None => Some(wgpu_core::device::ImplicitPipelineIds {
            root_id: (),
            group_ids: &[(); wgpu_core::MAX_BIND_GROUPS],
        }),
    }
}

pub(crate) fn device_create_compute_pipeline(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let device = arg_u32(args, 0)?;
    let descriptor_ptr = arg_u32(args, 1)?;
    let outcome = (|| {
        let device = cx.webgpu.device(device)?;
        let descriptor =
            to_core::compute_pipeline_descriptor(&cx.memory, cx.webgpu, descriptor_ptr)?;
        let global = cx.webgpu.global();
        let (id, error) = global.device_create_compute_pipeline::<Backend>(
            device.device,
            &descriptor,
            (),
            implicit_pipeline_ids(descriptor.layout),
        );
        if let Some(err) = error {
            return Err(BridgeError::native(err));
        }
        Ok(cx.webgpu.insert(Resource::ComputePipeline(id)))
    })();
    finish_u32(&mut cx, results, outcome)
}

pub(crate) fn device_create_render_pipeline(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let device = arg_u32(args, 0)?;
    let descriptor_ptr = arg_u32(args, 1)?;
    let outcome = (|| {
        let device = cx.webgpu.device(device)?;
        let descriptor =
            to_core::render_pipeline_descriptor(&cx.memory, cx.webgpu, descriptor_ptr)?;
        let global = cx.webgpu.global();
        let (id, error) = global.device_create_render_pipeline::<Backend>(
            device.device,
            &descriptor,
            (),
            implicit_pipeline_ids(descriptor.layout),
        );
        if let Some(err) = error {
            return Err(BridgeError::native(err));
        }
        Ok(cx.webgpu.insert(Resource::RenderPipeline(id)))
    })();
    finish_u32(&mut cx, results, outcome)
}

pub(crate) fn device_create_command_encoder(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let device = arg_u32(args, 0)?;
    let descriptor_ptr = arg_u32(args, 1)?;
    let outcome = (|| {
        let device = cx.webgpu.device(device)?;
        let label = if descriptor_ptr == 0 {
            None
        } else {
            to_core::label_only_descriptor(&cx.memory, descriptor_ptr)?
        };
        let global = cx.webgpu.global();
        let (id, error) = global.device_create_command_encoder::<Backend>(
            device.device,
            &wgpu_types::CommandEncoderDescriptor { label },
            (),
        );
        if let Some(err) = error {
            return Err(BridgeError::native(err));
        }
        Ok(cx.webgpu.insert(Resource::CommandEncoder(id)))
    })();
    finish_u32(&mut cx, results, outcome)
}

/// Drives native maintenance. This is what completes outstanding buffer
/// maps: their callbacks fire here, on the guest's own thread.
pub(crate) fn device_poll(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let device = arg_u32(args, 0)?;
    let wait = arg_u32(args, 1)?;
    let outcome = (|| {
        let device = cx.webgpu.device(device)?;
        let maintain = if wait != 0 {
            wgpu_types::Maintain::Wait
        } else {
            wgpu_types::Maintain::Poll
        };
        cx.webgpu
            .global()
            .device_poll::<Backend>(device.device, maintain)
            .map_err(BridgeError::native)?;
        Ok(())
    })();
    finish_status(&mut cx, results, outcome)
}

/// Submitted command-buffer handles are consumed: ownership transfers to
/// the queue exactly like the native API, so the handles are freed whether
/// or not the submit itself succeeds.
pub(crate) fn queue_submit(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let queue = arg_u32(args, 0)?;
    let count = arg_u32(args, 1)?;
    let commands_ptr = arg_u32(args, 2)?;
    let outcome = (|| {
        let queue_id = cx.webgpu.queue_id(queue)?;
        let handles = cx.memory.read_u32_array(commands_ptr, count)?;
        let mut ids = Vec::with_capacity(handles.len());
        for &handle in &handles {
            ids.push(cx.webgpu.command_buffer_id(handle)?);
        }
        for &handle in &handles {
            let _ = cx.webgpu.table.free(handle);
        }
        cx.webgpu
            .global()
            .queue_submit::<Backend>(queue_id, &ids)
            .map_err(BridgeError::native)?;
        Ok(())
    })();
    finish_status(&mut cx, results, outcome)
}

pub(crate) fn queue_write_buffer(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let queue = arg_u32(args, 0)?;
    let buffer = arg_u32(args, 1)?;
    let offset = arg_u64(args, 2)?;
    let data_ptr = arg_u32(args, 3)?;
    let data_len = arg_u32(args, 4)?;
    let outcome = (|| {
        let queue_id = cx.webgpu.queue_id(queue)?;
        let buffer_id = cx.webgpu.buffer(buffer)?.id;
        let data = cx.memory.read_bytes(data_ptr, data_len)?;
        cx.webgpu
            .global()
            .queue_write_buffer::<Backend>(queue_id, buffer_id, offset, data)
            .map_err(BridgeError::native)
    })();
    finish_status(&mut cx, results, outcome)
}

/// Starts an asynchronous map. Completion is observed through
/// `wgpuBufferGetMapState` after pumping `wgpuDevicePoll`; the callback
/// writes into a cell shared with the buffer's table entry. A `size` of 0
/// maps to the end of the buffer.
pub(crate) fn buffer_map_async(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let buffer = arg_u32(args, 0)?;
    let mode = arg_u32(args, 1)?;
    let offset = arg_u64(args, 2)?;
    let size = arg_u64(args, 3)?;
    let outcome = (|| {
        let host = enums::map_mode(mode)?;
        let (buffer_id, buffer_size) = {
            let buffer = cx.webgpu.buffer(buffer)?;
            (buffer.id, buffer.size)
        };
        let end = if size == 0 {
            buffer_size
        } else {
            offset
                .checked_add(size)
                .ok_or(BridgeError::InvalidDescriptor("map range overflows"))?
        };
        let mapped_size = end.saturating_sub(offset);

        let cell = Arc::new(Mutex::new(MapState::Pending));
        let completion = Arc::clone(&cell);
        let callback = wgpu_core::resource::BufferMapCallback::from_rust(Box::new(
            move |result: wgpu_core::resource::BufferAccessResult| {
                let mut state = lock(&completion);
                *state = match result {
                    Ok(()) => MapState::Mapped {
                        offset,
                        size: mapped_size,
                    },
                    Err(err) => MapState::Failed(err.to_string()),
                };
            },
        ));
        let operation = wgpu_core::resource::BufferMapOperation {
            host,
            callback: Some(callback),
        };
        cx.webgpu
            .global()
            .buffer_map_async::<Backend>(buffer_id, offset..end, operation)
            .map_err(BridgeError::native)?;
        cx.webgpu.buffer_mut(buffer)?.map = Some(cell);
        Ok(())
    })();
    finish_status(&mut cx, results, outcome)
}

pub(crate) fn buffer_get_map_state(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let buffer = arg_u32(args, 0)?;
    let mut failure = None;
    let outcome = (|| {
        let buffer = cx.webgpu.buffer(buffer)?;
        let cell = match &buffer.map {
            Some(cell) => cell,
            None => return Ok(map_state::UNMAPPED),
        };
        let state = lock(cell);
        Ok(match &*state {
            MapState::Pending => map_state::PENDING,
            MapState::Mapped { .. } => map_state::MAPPED,
            MapState::Failed(message) => {
                failure = Some(message.clone());
                map_state::FAILED
            }
        })
    })();
    if let Some(message) = failure {
        cx.webgpu.record_error(&BridgeError::NativeError(message));
    }
    finish_u32(&mut cx, results, outcome)
}

/// Resolves a (handle, offset, len) triple against the buffer's mapped
/// region: returns the buffer id plus the region's absolute offset, size,
/// and the relative start, all validated.
fn mapped_region(
    webgpu: &WebGpuCtx,
    handle: u32,
    offset: u64,
    len: u64,
) -> Result<(wgpu_core::id::BufferId, u64, u64, usize), BridgeError> {
    let buffer = webgpu.buffer(handle)?;
    let cell = buffer.map.as_ref().ok_or(BridgeError::NotMapped(handle))?;
    let state = lock(cell);
    let (map_offset, map_size) = match &*state {
        MapState::Mapped { offset, size } => (*offset, *size),
        _ => return Err(BridgeError::NotMapped(handle)),
    };
    let end = offset
        .checked_add(len)
        .ok_or(BridgeError::InvalidDescriptor("mapped range overflows"))?;
    if end > map_size {
        return Err(BridgeError::InvalidDescriptor(
            "range exceeds the mapped region",
        ));
    }
    let start = usize::try_from(offset)
        .map_err(|_| BridgeError::InvalidDescriptor("mapped offset exceeds host addressing"))?;
    Ok((buffer.id, map_offset, map_size, start))
}

pub(crate) fn buffer_read_mapped_range(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let buffer = arg_u32(args, 0)?;
    let offset = arg_u64(args, 1)?;
    let dest_ptr = arg_u32(args, 2)?;
    let len = arg_u32(args, 3)?;
    let outcome = (|| {
        let (buffer_id, map_offset, map_size, start) =
            mapped_region(cx.webgpu, buffer, offset, len as u64)?;
        if len == 0 {
            return Ok(());
        }
        let (base, range_len) = cx
            .webgpu
            .global()
            .buffer_get_mapped_range::<Backend>(buffer_id, map_offset, Some(map_size))
            .map_err(BridgeError::native)?;
        // SAFETY: wgpu-core vouches for `range_len` readable bytes at
        // `base` until the buffer is unmapped, which cannot happen while
        // this call holds the store.
        let mapped = unsafe { std::slice::from_raw_parts(base, range_len as usize) };
        cx.memory.write_bytes(dest_ptr, &mapped[start..start + len as usize])
    })();
    finish_status(&mut cx, results, outcome)
}

pub(crate) fn buffer_write_mapped_range(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let buffer = arg_u32(args, 0)?;
    let offset = arg_u64(args, 1)?;
    let src_ptr = arg_u32(args, 2)?;
    let len = arg_u32(args, 3)?;
    let outcome = (|| {
        let (buffer_id, map_offset, map_size, start) =
            mapped_region(cx.webgpu, buffer, offset, len as u64)?;
        if len == 0 {
            return Ok(());
        }
        let data = cx.memory.read_bytes(src_ptr, len)?;
        let (base, range_len) = cx
            .webgpu
            .global()
            .buffer_get_mapped_range::<Backend>(buffer_id, map_offset, Some(map_size))
            .map_err(BridgeError::native)?;
        // SAFETY: as in the read path, plus exclusivity through the store.
        let mapped = unsafe { std::slice::from_raw_parts_mut(base, range_len as usize) };
        mapped[start..start + len as usize].copy_from_slice(data);
        Ok(())
    })();
    finish_status(&mut cx, results, outcome)
}

pub(crate) fn buffer_unmap(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let buffer = arg_u32(args, 0)?;
    let outcome = (|| {
        let buffer_id = cx.webgpu.buffer(buffer)?.id;
        cx.webgpu
            .global()
            .buffer_unmap::<Backend>(buffer_id)
            .map_err(BridgeError::native)?;
        cx.webgpu.buffer_mut(buffer)?.map = None;
        Ok(())
    })();
    finish_status(&mut cx, results, outcome)
}

pub(crate) fn buffer_destroy(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let buffer = arg_u32(args, 0)?;
    let outcome = (|| {
        let buffer_id = cx.webgpu.buffer(buffer)?.id;
        cx.webgpu
            .global()
            .buffer_destroy::<Backend>(buffer_id)
            .map_err(BridgeError::native)?;
        cx.webgpu.buffer_mut(buffer)?.map = None;
        Ok(())
    })();
    finish_status(&mut cx, results, outcome)
}

pub(crate) fn texture_create_view(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let texture = arg_u32(args, 0)?;
    let descriptor_ptr = arg_u32(args, 1)?;
    let outcome = (|| {
        let texture_id = cx.webgpu.texture_id(texture)?;
        let descriptor = if descriptor_ptr == 0 {
            wgpu_core::resource::TextureViewDescriptor::default()
        } else {
            to_core::texture_view_descriptor(&cx.memory, descriptor_ptr)?
        };
        let global = cx.webgpu.global();
        let (id, error) = global.texture_create_view::<Backend>(texture_id, &descriptor, ());
        if let Some(err) = error {
            return Err(BridgeError::native(err));
        }
        Ok(cx.webgpu.insert(Resource::TextureView(id)))
    })();
    finish_u32(&mut cx, results, outcome)
}

pub(crate) fn command_encoder_begin_compute_pass(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let encoder = arg_u32(args, 0)?;
    let descriptor_ptr = arg_u32(args, 1)?;
    let outcome = (|| {
        let encoder_id = cx.webgpu.command_encoder_id(encoder)?;
        let label = if descriptor_ptr == 0 {
            None
        } else {
            to_core::label_only_descriptor(&cx.memory, descriptor_ptr)?
        };
        let pass = wgpu_core::command::ComputePass::new(
            encoder_id,
            &wgpu_core::command::ComputePassDescriptor {
                label,
                timestamp_writes: None,
            },
        );
        Ok(cx.webgpu.insert(Resource::ComputePass(RecordedComputePass {
            encoder: encoder_id,
            pass: Some(pass),
        })))
    })();
    finish_u32(&mut cx, results, outcome)
}

pub(crate) fn command_encoder_begin_render_pass(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let encoder = arg_u32(args, 0)?;
    let descriptor_ptr = arg_u32(args, 1)?;
    let outcome = (|| {
        let encoder_id = cx.webgpu.command_encoder_id(encoder)?;
        if descriptor_ptr == 0 {
            return Err(BridgeError::InvalidDescriptor(
                "a render pass requires a descriptor",
            ));
        }
        let (label, attachments) =
            to_core::render_pass_descriptor(&cx.memory, cx.webgpu, descriptor_ptr)?;
        let descriptor = wgpu_core::command::RenderPassDescriptor {
            label,
            color_attachments: Cow::Owned(attachments),
            ..Default::default()
        };
        let pass = wgpu_core::command::RenderPass::new(encoder_id, &descriptor);
        Ok(cx.webgpu.insert(Resource::RenderPass(RecordedRenderPass {
            encoder: encoder_id,
            pass: Some(pass),
        })))
    })();
    finish_u32(&mut cx, results, outcome)
}

pub(crate) fn command_encoder_copy_buffer_to_buffer(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let encoder = arg_u32(args, 0)?;
    let source = arg_u32(args, 1)?;
    let source_offset = arg_u64(args, 2)?;
    let destination = arg_u32(args, 3)?;
    let destination_offset = arg_u64(args, 4)?;
    let size = arg_u64(args, 5)?;
    let outcome = (|| {
        let encoder_id = cx.webgpu.command_encoder_id(encoder)?;
        let source_id = cx.webgpu.buffer(source)?.id;
        let destination_id = cx.webgpu.buffer(destination)?.id;
        cx.webgpu
            .global()
            .command_encoder_copy_buffer_to_buffer::<Backend>(
                encoder_id,
                source_id,
                source_offset,
                destination_id,
                destination_offset,
                size,
            )
            .map_err(BridgeError::native)
    })();
    finish_status(&mut cx, results, outcome)
}

/// Finishing consumes the encoder handle; the native encoder id moves into
/// the command buffer, so release of the freed handle is not involved.
pub(crate) fn command_encoder_finish(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let encoder = arg_u32(args, 0)?;
    let descriptor_ptr = arg_u32(args, 1)?;
    let outcome = (|| {
        let encoder_id = cx.webgpu.command_encoder_id(encoder)?;
        let label = if descriptor_ptr == 0 {
            None
        } else {
            to_core::label_only_descriptor(&cx.memory, descriptor_ptr)?
        };
        cx.webgpu.table.free(encoder)?;
        let global = cx.webgpu.global();
        let (id, error) = global.command_encoder_finish::<Backend>(
            encoder_id,
            &wgpu_types::CommandBufferDescriptor { label },
        );
        if let Some(err) = error {
            return Err(BridgeError::native(err));
        }
        Ok(cx.webgpu.insert(Resource::CommandBuffer(id)))
    })();
    finish_u32(&mut cx, results, outcome)
}

pub(crate) fn compute_pass_set_pipeline(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let pass = arg_u32(args, 0)?;
    let pipeline = arg_u32(args, 1)?;
    let outcome = (|| {
        let pipeline_id = cx.webgpu.compute_pipeline_id(pipeline)?;
        let recorded = cx.webgpu.compute_pass_mut(pass)?;
        let recording = recorded.pass.as_mut().ok_or(BridgeError::PassEnded(pass))?;
        wgpu_core::command::compute_ffi::wgpu_compute_pass_set_pipeline(recording, pipeline_id);
        Ok(())
    })();
    finish_status(&mut cx, results, outcome)
}

pub(crate) fn compute_pass_set_bind_group(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let pass = arg_u32(args, 0)?;
    let index = arg_u32(args, 1)?;
    let bind_group = arg_u32(args, 2)?;
    let offsets_ptr = arg_u32(args, 3)?;
    let offset_count = arg_u32(args, 4)?;
    let outcome = (|| {
        let offsets = cx.memory.read_u32_array(offsets_ptr, offset_count)?;
        let bind_group_id = cx.webgpu.bind_group_id(bind_group)?;
        let recorded = cx.webgpu.compute_pass_mut(pass)?;
        let recording = recorded.pass.as_mut().ok_or(BridgeError::PassEnded(pass))?;
        // SAFETY: the pointer/length pair refers to `offsets`, which lives
        // past this call.
        unsafe {
            wgpu_core::command::compute_ffi::wgpu_compute_pass_set_bind_group(
                recording,
                index,
                bind_group_id,
                offsets.as_ptr(),
                offsets.len(),
            );
        }
        Ok(())
    })();
    finish_status(&mut cx, results, outcome)
}

pub(crate) fn compute_pass_dispatch_workgroups(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let pass = arg_u32(args, 0)?;
    let x = arg_u32(args, 1)?;
    let y = arg_u32(args, 2)?;
    let z = arg_u32(args, 3)?;
    let outcome = (|| {
        let recorded = cx.webgpu.compute_pass_mut(pass)?;
        let recording = recorded.pass.as_mut().ok_or(BridgeError::PassEnded(pass))?;
        wgpu_core::command::compute_ffi::wgpu_compute_pass_dispatch_workgroups(recording, x, y, z);
        Ok(())
    })();
    finish_status(&mut cx, results, outcome)
}

/// Ends recording and replays the pass onto its parent encoder. The handle
/// stays allocated until released, but further recording reports
/// `PassEnded`.
pub(crate) fn compute_pass_end(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let pass = arg_u32(args, 0)?;
    let outcome = (|| {
        let global = cx.webgpu.global();
        let recorded = cx.webgpu.compute_pass_mut(pass)?;
        let recording = recorded.pass.take().ok_or(BridgeError::PassEnded(pass))?;
        global
            .command_encoder_run_compute_pass::<Backend>(recorded.encoder, &recording)
            .map_err(BridgeError::native)
    })();
    finish_status(&mut cx, results, outcome)
}

pub(crate) fn render_pass_set_pipeline(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let pass = arg_u32(args, 0)?;
    let pipeline = arg_u32(args, 1)?;
    let outcome = (|| {
        let pipeline_id = cx.webgpu.render_pipeline_id(pipeline)?;
        let recorded = cx.webgpu.render_pass_mut(pass)?;
        let recording = recorded.pass.as_mut().ok_or(BridgeError::PassEnded(pass))?;
        wgpu_core::command::render_ffi::wgpu_render_pass_set_pipeline(recording, pipeline_id);
        Ok(())
    })();
    finish_status(&mut cx, results, outcome)
}

pub(crate) fn render_pass_set_bind_group(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let pass = arg_u32(args, 0)?;
    let index = arg_u32(args, 1)?;
    let bind_group = arg_u32(args, 2)?;
    let offsets_ptr = arg_u32(args, 3)?;
    let offset_count = arg_u32(args, 4)?;
    let outcome = (|| {
        let offsets = cx.memory.read_u32_array(offsets_ptr, offset_count)?;
        let bind_group_id = cx.webgpu.bind_group_id(bind_group)?;
        let recorded = cx.webgpu.render_pass_mut(pass)?;
        let recording = recorded.pass.as_mut().ok_or(BridgeError::PassEnded(pass))?;
        // SAFETY: as in the compute variant.
        unsafe {
            wgpu_core::command::render_ffi::wgpu_render_pass_set_bind_group(
                recording,
                index,
                bind_group_id,
                offsets.as_ptr(),
                offsets.len(),
            );
        }
        Ok(())
    })();
    finish_status(&mut cx, results, outcome)
}

/// A `size` of 0 binds to the end of the buffer.
pub(crate) fn render_pass_set_vertex_buffer(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let pass = arg_u32(args, 0)?;
    let slot = arg_u32(args, 1)?;
    let buffer = arg_u32(args, 2)?;
    let offset = arg_u64(args, 3)?;
    let size = arg_u64(args, 4)?;
    let outcome = (|| {
        let buffer_id = cx.webgpu.buffer(buffer)?.id;
        let recorded = cx.webgpu.render_pass_mut(pass)?;
        let recording = recorded.pass.as_mut().ok_or(BridgeError::PassEnded(pass))?;
        wgpu_core::command::render_ffi::wgpu_render_pass_set_vertex_buffer(
            recording,
            slot,
            buffer_id,
            offset,
            std::num::NonZeroU64::new(size),
        );
        Ok(())
    })();
    finish_status(&mut cx, results, outcome)
}

pub(crate) fn render_pass_draw(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let pass = arg_u32(args, 0)?;
    let vertex_count = arg_u32(args, 1)?;
    let instance_count = arg_u32(args, 2)?;
    let first_vertex = arg_u32(args, 3)?;
    let first_instance = arg_u32(args, 4)?;
    let outcome = (|| {
        let recorded = cx.webgpu.render_pass_mut(pass)?;
        let recording = recorded.pass.as_mut().ok_or(BridgeError::PassEnded(pass))?;
        wgpu_core::command::render_ffi::wgpu_render_pass_draw(
            recording,
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        );
        Ok(())
    })();
    finish_status(&mut cx, results, outcome)
}

pub(crate) fn render_pass_end(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let pass = arg_u32(args, 0)?;
    let outcome = (|| {
        let global = cx.webgpu.global();
        let recorded = cx.webgpu.render_pass_mut(pass)?;
        let recording = recorded.pass.take().ok_or(BridgeError::PassEnded(pass))?;
        global
            .command_encoder_run_render_pass::<Backend>(recorded.encoder, &recording)
            .map_err(BridgeError::native)
    })();
    finish_status(&mut cx, results, outcome)
}

pub(crate) fn get_last_error_code(
    mut cx: BridgeCx<'_>,
    _args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let code = cx.webgpu.last_error_code();
    finish_u32(&mut cx, results, Ok(code))
}

/// Copies the last error message (UTF-8, truncated to the buffer's
/// capacity) into guest memory and returns the number of bytes written.
pub(crate) fn get_last_error_message(
    mut cx: BridgeCx<'_>,
    args: &[Val],
    results: &mut [Val],
) -> wasmtime::Result<()> {
    let buf_ptr = arg_u32(args, 0)?;
    let buf_cap = arg_u32(args, 1)?;
    let outcome = {
        let message = cx
            .webgpu
            .last_error
            .as_ref()
            .map(|(_, message)| message.as_str())
            .unwrap_or("");
        let bytes = message.as_bytes();
        let written = bytes.len().min(buf_cap as usize);
        cx.memory
            .write_bytes(buf_ptr, &bytes[..written])
            .map(|()| written as u32)
    };
    finish_u32(&mut cx, results, outcome)
}
