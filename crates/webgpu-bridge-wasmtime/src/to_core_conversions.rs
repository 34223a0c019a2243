//! Wire-format descriptor decoding.
//!
//! Every descriptor the guest passes has a fixed little-endian layout,
//! documented field-by-field at its decode function. u64 fields sit on
//! 8-byte boundaries, everything else on 4-byte ones. Decoding reads the
//! whole struct through one bounds check, then parses in place; embedded
//! handles are resolved against the store's handle table.

use std::borrow::Cow;
use std::num::NonZeroU64;

use crate::enum_conversions as enums;
use crate::error::BridgeError;
use crate::guest_memory::GuestMemory;
use crate::WebGpuCtx;

/// One bounds-checked view of a fixed-size wire struct.
pub(crate) struct WireStruct<'a> {
    bytes: &'a [u8],
}

impl WireStruct<'_> {
    fn u32_at(&self, offset: usize) -> u32 {
        let b = &self.bytes[offset..offset + 4];
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    fn u64_at(&self, offset: usize) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.bytes[offset..offset + 8]);
        u64::from_le_bytes(raw)
    }

    fn f32_at(&self, offset: usize) -> f32 {
        f32::from_bits(self.u32_at(offset))
    }

    fn f64_at(&self, offset: usize) -> f64 {
        f64::from_bits(self.u64_at(offset))
    }
}

fn wire_struct<'a>(
    mem: &'a GuestMemory<'_>,
    ptr: u32,
    size: u32,
) -> Result<WireStruct<'a>, BridgeError> {
    Ok(WireStruct {
        bytes: mem.read_bytes(ptr, size)?,
    })
}

/// Reads a (ptr, count) array of fixed-size wire structs.
fn wire_array<'a>(
    mem: &'a GuestMemory<'_>,
    ptr: u32,
    count: u32,
    elem_size: u32,
) -> Result<impl Iterator<Item = WireStruct<'a>>, BridgeError> {
    let total = count
        .checked_mul(elem_size)
        .ok_or(BridgeError::InvalidDescriptor("array byte length overflows"))?;
    let bytes = mem.read_bytes(ptr, total)?;
    Ok(bytes
        .chunks_exact(elem_size as usize)
        .map(|chunk| WireStruct { bytes: chunk }))
}

/// Labels lead every descriptor: 0 label_ptr, 4 label_len; (0, 0) = none.
fn wire_label(
    mem: &GuestMemory<'_>,
    s: &WireStruct<'_>,
) -> Result<wgpu_core::Label<'static>, BridgeError> {
    Ok(mem.read_label(s.u32_at(0), s.u32_at(4))?.map(Cow::Owned))
}

/// Layout (8): 0 power_preference, 4 force_fallback_adapter.
pub(crate) fn request_adapter_options(
    mem: &GuestMemory<'_>,
    ptr: u32,
) -> Result<wgpu_core::instance::RequestAdapterOptions, BridgeError> {
    let s = wire_struct(mem, ptr, 8)?;
    Ok(wgpu_core::instance::RequestAdapterOptions {
        power_preference: enums::power_preference(s.u32_at(0))?,
        force_fallback_adapter: s.u32_at(4) != 0,
        compatible_surface: None,
    })
}

/// Layout (16): 0 label_ptr, 4 label_len, 8 required_limits_ptr
/// (0 = defaults), 12 reserved.
pub(crate) fn device_descriptor(
    mem: &GuestMemory<'_>,
    ptr: u32,
) -> Result<wgpu_types::DeviceDescriptor<wgpu_core::Label<'static>>, BridgeError> {
    let s = wire_struct(mem, ptr, 16)?;
    let limits_ptr = s.u32_at(8);
    let required_limits = if limits_ptr == 0 {
        wgpu_types::Limits::default()
    } else {
        limits(mem, limits_ptr)?
    };
    Ok(wgpu_types::DeviceDescriptor {
        label: wire_label(mem, &s)?,
        required_features: wgpu_types::Features::empty(),
        required_limits,
    })
}

/// The limits wire struct (104): 24 consecutive u32 fields at 0..96, then
/// u64 max_buffer_size at 96. A zero field means "keep the default". The
/// same offsets are used by [`write_limits`], so a round trip is exact.
pub(crate) fn limits(mem: &GuestMemory<'_>, ptr: u32) -> Result<wgpu_types::Limits, BridgeError> {
    let s = wire_struct(mem, ptr, 104)?;
    let mut limits = wgpu_types::Limits::default();
    macro_rules! take {
        ($offset:expr, $field:ident) => {
            let value = s.u32_at($offset);
            if value != 0 {
                limits.$field = value;
            }
        };
    }
    take!(0, max_texture_dimension_1d);
    take!(4, max_texture_dimension_2d);
    take!(8, max_texture_dimension_3d);
    take!(12, max_texture_array_layers);
    take!(16, max_bind_groups);
    take!(20, max_bindings_per_bind_group);
    take!(24, max_dynamic_uniform_buffers_per_pipeline_layout);
    take!(28, max_dynamic_storage_buffers_per_pipeline_layout);
    take!(32, max_sampled_textures_per_shader_stage);
    take!(36, max_samplers_per_shader_stage);
    take!(40, max_storage_buffers_per_shader_stage);
    take!(44, max_storage_textures_per_shader_stage);
    take!(48, max_uniform_buffers_per_shader_stage);
    take!(52, max_uniform_buffer_binding_size);
    take!(56, max_storage_buffer_binding_size);
    take!(60, max_vertex_buffers);
    take!(64, max_vertex_attributes);
    take!(68, max_vertex_buffer_array_stride);
    take!(72, max_compute_workgroup_storage_size);
    take!(76, max_compute_invocations_per_workgroup);
    take!(80, max_compute_workgroup_size_x);
    take!(84, max_compute_workgroup_size_y);
    take!(88, max_compute_workgroup_size_z);
    take!(92, max_compute_workgroups_per_dimension);
    let max_buffer_size = s.u64_at(96);
    if max_buffer_size != 0 {
        limits.max_buffer_size = max_buffer_size;
    }
    Ok(limits)
}

/// Encodes limits at the layout documented on [`limits`].
pub(crate) fn write_limits(
    mem: &mut GuestMemory<'_>,
    ptr: u32,
    limits: &wgpu_types::Limits,
) -> Result<(), BridgeError> {
    let mut bytes = [0u8; 104];
    macro_rules! put {
        ($offset:expr, $field:ident) => {
            bytes[$offset..$offset + 4].copy_from_slice(&limits.$field.to_le_bytes());
        };
    }
    put!(0, max_texture_dimension_1d);
    put!(4, max_texture_dimension_2d);
    put!(8, max_texture_dimension_3d);
    put!(12, max_texture_array_layers);
    put!(16, max_bind_groups);
    put!(20, max_bindings_per_bind_group);
    put!(24, max_dynamic_uniform_buffers_per_pipeline_layout);
    put!(28, max_dynamic_storage_buffers_per_pipeline_layout);
    put!(32, max_sampled_textures_per_shader_stage);
    put!(36, max_samplers_per_shader_stage);
    put!(40, max_storage_buffers_per_shader_stage);
    put!(44, max_storage_textures_per_shader_stage);
    put!(48, max_uniform_buffers_per_shader_stage);
    put!(52, max_uniform_buffer_binding_size);
    put!(56, max_storage_buffer_binding_size);
    put!(60, max_vertex_buffers);
    put!(64, max_vertex_attributes);
    put!(68, max_vertex_buffer_array_stride);
    put!(72, max_compute_workgroup_storage_size);
    put!(76, max_compute_invocations_per_workgroup);
    put!(80, max_compute_workgroup_size_x);
    put!(84, max_compute_workgroup_size_y);
    put!(88, max_compute_workgroup_size_z);
    put!(92, max_compute_workgroups_per_dimension);
    bytes[96..104].copy_from_slice(&limits.max_buffer_size.to_le_bytes());
    mem.write_bytes(ptr, &bytes)
}

/// Layout (24): 0 label_ptr, 4 label_len, 8 usage, 12 mapped_at_creation,
/// 16 size u64.
pub(crate) fn buffer_descriptor(
    mem: &GuestMemory<'_>,
    ptr: u32,
) -> Result<wgpu_core::resource::BufferDescriptor<'static>, BridgeError> {
    let s = wire_struct(mem, ptr, 24)?;
    Ok(wgpu_types::BufferDescriptor {
        label: wire_label(mem, &s)?,
        usage: enums::buffer_usages(s.u32_at(8))?,
        mapped_at_creation: s.u32_at(12) != 0,
        size: s.u64_at(16),
    })
}

/// Layout (48): 0 label_ptr, 4 label_len, 8 width, 12 height,
/// 16 depth_or_array_layers, 20 mip_level_count, 24 sample_count,
/// 28 dimension, 32 format, 36 usage, 40 view_formats_ptr,
/// 44 view_format_count.
pub(crate) fn texture_descriptor(
    mem: &GuestMemory<'_>,
    ptr: u32,
) -> Result<wgpu_core::resource::TextureDescriptor<'static>, BridgeError> {
    let s = wire_struct(mem, ptr, 48)?;
    let view_formats = mem
        .read_u32_array(s.u32_at(40), s.u32_at(44))?
        .into_iter()
        .map(enums::texture_format)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(wgpu_types::TextureDescriptor {
        label: wire_label(mem, &s)?,
        size: wgpu_types::Extent3d {
            width: s.u32_at(8),
            height: s.u32_at(12),
            depth_or_array_layers: s.u32_at(16),
        },
        mip_level_count: s.u32_at(20),
        sample_count: s.u32_at(24),
        dimension: enums::texture_dimension(s.u32_at(28))?,
        format: enums::texture_format(s.u32_at(32))?,
        usage: enums::texture_usages(s.u32_at(36))?,
        view_formats,
    })
}

/// Layout (36): 0 label_ptr, 4 label_len, 8 format (0 = inherit),
/// 12 dimension (0 = inherit), 16 aspect (0 = all), 20 base_mip_level,
/// 24 mip_level_count (0 = all), 28 base_array_layer,
/// 32 array_layer_count (0 = all).
pub(crate) fn texture_view_descriptor(
    mem: &GuestMemory<'_>,
    ptr: u32,
) -> Result<wgpu_core::resource::TextureViewDescriptor<'static>, BridgeError> {
    let s = wire_struct(mem, ptr, 36)?;
    let format = match s.u32_at(8) {
        0 => None,
        value => Some(enums::texture_format(value)?),
    };
    let dimension = match s.u32_at(12) {
        0 => None,
        value => Some(enums::texture_view_dimension(value)?),
    };
    Ok(wgpu_core::resource::TextureViewDescriptor {
        label: wire_label(mem, &s)?,
        format,
        dimension,
        range: wgpu_types::ImageSubresourceRange {
            aspect: enums::texture_aspect(s.u32_at(16))?,
            base_mip_level: s.u32_at(20),
            mip_level_count: match s.u32_at(24) {
                0 => None,
                count => Some(count),
            },
            base_array_layer: s.u32_at(28),
            array_layer_count: match s.u32_at(32) {
                0 => None,
                count => Some(count),
            },
        },
    })
}

/// Layout (48): 0 label_ptr, 4 label_len, 8/12/16 address_mode_u/v/w,
/// 20 mag_filter, 24 min_filter, 28 mipmap_filter, 32 lod_min_clamp f32,
/// 36 lod_max_clamp f32, 40 compare (0 = none), 44 max_anisotropy
/// (0 = 1).
pub(crate) fn sampler_descriptor(
    mem: &GuestMemory<'_>,
    ptr: u32,
) -> Result<wgpu_core::resource::SamplerDescriptor<'static>, BridgeError> {
    let s = wire_struct(mem, ptr, 48)?;
    let compare = match s.u32_at(40) {
        0 => None,
        value => Some(enums::compare_function(value)?),
    };
    Ok(wgpu_core::resource::SamplerDescriptor {
        label: wire_label(mem, &s)?,
        address_modes: [
            enums::address_mode(s.u32_at(8))?,
            enums::address_mode(s.u32_at(12))?,
            enums::address_mode(s.u32_at(16))?,
        ],
        mag_filter: enums::filter_mode(s.u32_at(20))?,
        min_filter: enums::filter_mode(s.u32_at(24))?,
        mipmap_filter: enums::filter_mode(s.u32_at(28))?,
        lod_min_clamp: s.f32_at(32),
        lod_max_clamp: s.f32_at(36),
        compare,
        anisotropy_clamp: s.u32_at(44).clamp(1, u16::MAX as u32) as u16,
        border_color: None,
    })
}

/// Layout (16): 0 label_ptr, 4 label_len, 8 code_ptr, 12 code_len.
/// The code is WGSL text. Returns the descriptor and the owned source.
pub(crate) fn shader_module_descriptor(
    mem: &GuestMemory<'_>,
    ptr: u32,
) -> Result<(wgpu_core::pipeline::ShaderModuleDescriptor<'static>, String), BridgeError> {
    let s = wire_struct(mem, ptr, 16)?;
    let code = mem.read_str(s.u32_at(8), s.u32_at(12))?.to_owned();
    let descriptor = wgpu_core::pipeline::ShaderModuleDescriptor {
        label: wire_label(mem, &s)?,
        shader_bound_checks: wgpu_types::ShaderBoundChecks::default(),
    };
    Ok((descriptor, code))
}

/// Layout (16): 0 label_ptr, 4 label_len, 8 entries_ptr, 12 entry_count.
/// Entry (24): 0 binding, 4 visibility, 8 buffer_type, 12
/// has_dynamic_offset, 16 min_binding_size u64 (0 = none). Only buffer
/// bindings are expressible; texture and sampler bindings come from
/// pipeline-implicit layouts.
pub(crate) fn bind_group_layout_descriptor(
    mem: &GuestMemory<'_>,
    ptr: u32,
) -> Result<wgpu_core::binding_model::BindGroupLayoutDescriptor<'static>, BridgeError> {
    let s = wire_struct(mem, ptr, 16)?;
    let mut entries = Vec::new();
    for entry in wire_array(mem, s.u32_at(8), s.u32_at(12), 24)? {
        entries.push(wgpu_types::BindGroupLayoutEntry {
            binding: entry.u32_at(0),
            visibility: enums::shader_stages(entry.u32_at(4))?,
            ty: wgpu_types::BindingType::Buffer {
                ty: enums::buffer_binding_type(entry.u32_at(8))?,
                has_dynamic_offset: entry.u32_at(12) != 0,
                min_binding_size: NonZeroU64::new(entry.u64_at(16)),
            },
            count: None,
        });
    }
    Ok(wgpu_core::binding_model::BindGroupLayoutDescriptor {
        label: wire_label(mem, &s)?,
        entries: Cow::Owned(entries),
    })
}

/// Layout (16): 0 label_ptr, 4 label_len, 8 bind_group_layouts_ptr
/// (u32 handle array), 12 bind_group_layout_count.
pub(crate) fn pipeline_layout_descriptor(
    mem: &GuestMemory<'_>,
    ctx: &WebGpuCtx,
    ptr: u32,
) -> Result<wgpu_core::binding_model::PipelineLayoutDescriptor<'static>, BridgeError> {
    let s = wire_struct(mem, ptr, 16)?;
    let layouts = mem
        .read_u32_array(s.u32_at(8), s.u32_at(12))?
        .into_iter()
        .map(|handle| ctx.bind_group_layout_id(handle))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(wgpu_core::binding_model::PipelineLayoutDescriptor {
        label: wire_label(mem, &s)?,
        bind_group_layouts: Cow::Owned(layouts),
        push_constant_ranges: Cow::Borrowed(&[]),
    })
}

/// Layout (20): 0 label_ptr, 4 label_len, 8 layout handle, 12 entries_ptr,
/// 16 entry_count. Entry (24): 0 binding, 4 buffer handle, 8 offset u64,
/// 16 size u64 (0 = whole remaining buffer).
pub(crate) fn bind_group_descriptor(
    mem: &GuestMemory<'_>,
    ctx: &WebGpuCtx,
    ptr: u32,
) -> Result<wgpu_core::binding_model::BindGroupDescriptor<'static>, BridgeError> {
    let s = wire_struct(mem, ptr, 20)?;
    let mut entries = Vec::new();
    for entry in wire_array(mem, s.u32_at(12), s.u32_at(16), 24)? {
        let buffer = ctx.buffer(entry.u32_at(4))?;
        entries.push(wgpu_core::binding_model::BindGroupEntry {
            binding: entry.u32_at(0),
            resource: wgpu_core::binding_model::BindingResource::Buffer(
                wgpu_core::binding_model::BufferBinding {
                    buffer_id: buffer.id,
                    offset: entry.u64_at(8),
                    size: NonZeroU64::new(entry.u64_at(16)),
                },
            ),
        });
    }
    Ok(wgpu_core::binding_model::BindGroupDescriptor {
        label: wire_label(mem, &s)?,
        layout: ctx.bind_group_layout_id(s.u32_at(8))?,
        entries: Cow::Owned(entries),
    })
}

/// Layout (24): 0 label_ptr, 4 label_len, 8 layout handle (0 = implicit),
/// 12 module handle, 16 entry_point_ptr, 20 entry_point_len.
pub(crate) fn compute_pipeline_descriptor(
    mem: &GuestMemory<'_>,
    ctx: &WebGpuCtx,
    ptr: u32,
) -> Result<wgpu_core::pipeline::ComputePipelineDescriptor<'static>, BridgeError> {
    let s = wire_struct(mem, ptr, 24)?;
    let layout = match s.u32_at(8) {
        0 => None,
        handle => Some(ctx.pipeline_layout_id(handle)?),
    };
    Ok(wgpu_core::pipeline::ComputePipelineDescriptor {
        label: wire_label(mem, &s)?,
        layout,
        stage: wgpu_core::pipeline::ProgrammableStageDescriptor {
            module: ctx.shader_module_id(s.u32_at(12))?,
            entry_point: Cow::Owned(mem.read_str(s.u32_at(16), s.u32_at(20))?.to_owned()),
        },
    })
}

/// Layout (96): 0 label_ptr, 4 label_len, 8 layout handle (0 = implicit),
/// 12 vertex module handle, 16 vertex_entry_ptr, 20 vertex_entry_len,
/// 24 vertex_buffers_ptr, 28 vertex_buffer_count, 32 fragment module
/// handle (0 = no fragment stage), 36 fragment_entry_ptr,
/// 40 fragment_entry_len, 44 targets_ptr, 48 target_count, 52 topology,
/// 56 strip_index_format (0 = none), 60 front_face, 64 cull_mode,
/// 68 sample_count (0 = 1), 72 sample_mask (0 = all), 76
/// alpha_to_coverage, 80..96 reserved, must be zero.
///
/// Vertex buffer layout (24): 0 array_stride u64, 8 step_mode,
/// 12 attribute_count, 16 attributes_ptr, 20 reserved. Attribute (16):
/// 0 format, 4 shader_location, 8 offset u64. Color target (12):
/// 0 format, 4 blend preset, 8 write_mask.
pub(crate) fn render_pipeline_descriptor(
    mem: &GuestMemory<'_>,
    ctx: &WebGpuCtx,
    ptr: u32,
) -> Result<wgpu_core::pipeline::RenderPipelineDescriptor<'static>, BridgeError> {
    let s = wire_struct(mem, ptr, 96)?;
    if (80..96).step_by(4).any(|offset| s.u32_at(offset) != 0) {
        return Err(BridgeError::InvalidDescriptor("reserved bytes must be zero"));
    }

    let layout = match s.u32_at(8) {
        0 => None,
        handle => Some(ctx.pipeline_layout_id(handle)?),
    };

    let mut vertex_buffers = Vec::new();
    for layout in wire_array(mem, s.u32_at(24), s.u32_at(28), 24)? {
        let mut attributes = Vec::new();
        for attribute in wire_array(mem, layout.u32_at(16), layout.u32_at(12), 16)? {
            attributes.push(wgpu_types::VertexAttribute {
                format: enums::vertex_format(attribute.u32_at(0))?,
                shader_location: attribute.u32_at(4),
                offset: attribute.u64_at(8),
            });
        }
        vertex_buffers.push(wgpu_core::pipeline::VertexBufferLayout {
            array_stride: layout.u64_at(0),
            step_mode: enums::vertex_step_mode(layout.u32_at(8))?,
            attributes: Cow::Owned(attributes),
        });
    }

    let fragment = match s.u32_at(32) {
        0 => None,
        module_handle => {
            let mut targets = Vec::new();
            for target in wire_array(mem, s.u32_at(44), s.u32_at(48), 12)? {
                targets.push(Some(wgpu_types::ColorTargetState {
                    format: enums::texture_format(target.u32_at(0))?,
                    blend: enums::blend_preset(target.u32_at(4))?,
                    write_mask: enums::color_writes(target.u32_at(8))?,
                }));
            }
            Some(wgpu_core::pipeline::FragmentState {
                stage: wgpu_core::pipeline::ProgrammableStageDescriptor {
                    module: ctx.shader_module_id(module_handle)?,
                    entry_point: Cow::Owned(
                        mem.read_str(s.u32_at(36), s.u32_at(40))?.to_owned(),
                    ),
                },
                targets: Cow::Owned(targets),
            })
        }
    };

    let strip_index_format = match s.u32_at(56) {
        0 => None,
        value => Some(enums::index_format(value)?),
    };
    let sample_count = match s.u32_at(68) {
        0 => 1,
        count => count,
    };
    let sample_mask = match s.u32_at(72) {
        0 => !0u64,
        mask => mask as u64,
    };

    Ok(wgpu_core::pipeline::RenderPipelineDescriptor {
        label: wire_label(mem, &s)?,
        layout,
        vertex: wgpu_core::pipeline::VertexState {
            stage: wgpu_core::pipeline::ProgrammableStageDescriptor {
                module: ctx.shader_module_id(s.u32_at(12))?,
                entry_point: Cow::Owned(mem.read_str(s.u32_at(16), s.u32_at(20))?.to_owned()),
            },
            buffers: Cow::Owned(vertex_buffers),
        },
        primitive: wgpu_types::PrimitiveState {
            topology: enums::primitive_topology(s.u32_at(52))?,
            strip_index_format,
            front_face: enums::front_face(s.u32_at(60))?,
            cull_mode: enums::cull_mode(s.u32_at(64))?,
            unclipped_depth: false,
            polygon_mode: wgpu_types::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu_types::MultisampleState {
            count: sample_count,
            mask: sample_mask,
            alpha_to_coverage_enabled: s.u32_at(76) != 0,
        },
        fragment,
        multiview: None,
    })
}

/// The label-only descriptors (8): 0 label_ptr, 4 label_len. Used for
/// command encoders, command buffers, and compute passes.
pub(crate) fn label_only_descriptor(
    mem: &GuestMemory<'_>,
    ptr: u32,
) -> Result<wgpu_core::Label<'static>, BridgeError> {
    let s = wire_struct(mem, ptr, 8)?;
    wire_label(mem, &s)
}

/// Layout (16): 0 label_ptr, 4 label_len, 8 color_attachments_ptr,
/// 12 color_attachment_count. Color attachment (48): 0 view handle,
/// 4 resolve_target handle (0 = none), 8 load_op, 12 store_op,
/// 16/24/32/40 clear color r/g/b/a as f64.
pub(crate) fn render_pass_descriptor(
    mem: &GuestMemory<'_>,
    ctx: &WebGpuCtx,
    ptr: u32,
) -> Result<
    (
        wgpu_core::Label<'static>,
        Vec<Option<wgpu_core::command::RenderPassColorAttachment>>,
    ),
    BridgeError,
> {
    let s = wire_struct(mem, ptr, 16)?;
    let mut attachments = Vec::new();
    for attachment in wire_array(mem, s.u32_at(8), s.u32_at(12), 48)? {
        let resolve_target = match attachment.u32_at(4) {
            0 => None,
            handle => Some(ctx.texture_view_id(handle)?),
        };
        attachments.push(Some(wgpu_core::command::RenderPassColorAttachment {
            view: ctx.texture_view_id(attachment.u32_at(0))?,
            resolve_target,
            channel: wgpu_core::command::PassChannel {
                load_op: enums::load_op(attachment.u32_at(8))?,
                store_op: enums::store_op(attachment.u32_at(12))?,
                clear_value: wgpu_types::Color {
                    r: attachment.f64_at(16),
                    g: attachment.f64_at(24),
                    b: attachment.f64_at(32),
                    a: attachment.f64_at(40),
                },
                read_only: false,
            },
        }));
    }
    Ok((wire_label(mem, &s)?, attachments))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_with(bytes: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; 256.max(bytes.len())];
        data[..bytes.len()].copy_from_slice(bytes);
        data
    }

    #[test]
    fn limits_round_trip_is_exact() {
        let mut reference = wgpu_types::Limits::default();
        reference.max_bind_groups = 7;
        reference.max_texture_dimension_2d = 16384;
        reference.max_compute_workgroup_size_x = 333;
        reference.max_buffer_size = 1 << 40;

        let mut data = vec![0u8; 128];
        {
            let mut mem = GuestMemory::new(&mut data);
            write_limits(&mut mem, 8, &reference).unwrap();
        }
        let mem = GuestMemory::new(&mut data);
        let decoded = limits(&mem, 8).unwrap();
        assert_eq!(decoded, reference);
    }

    #[test]
    fn zero_limit_fields_fall_back_to_defaults() {
        let mut data = vec![0u8; 128];
        let mem = GuestMemory::new(&mut data);
        assert_eq!(limits(&mem, 0).unwrap(), wgpu_types::Limits::default());
    }

    #[test]
    fn buffer_descriptor_decodes() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&200u32.to_le_bytes()); // label_ptr
        wire.extend_from_slice(&3u32.to_le_bytes()); // label_len
        wire.extend_from_slice(&wgpu_types::BufferUsages::STORAGE.bits().to_le_bytes());
        wire.extend_from_slice(&1u32.to_le_bytes()); // mapped_at_creation
        wire.extend_from_slice(&4096u64.to_le_bytes());
        let mut data = memory_with(&wire);
        data[200..203].copy_from_slice(b"buf");
        let mem = GuestMemory::new(&mut data);

        let descriptor = buffer_descriptor(&mem, 0).unwrap();
        assert_eq!(descriptor.label.as_deref(), Some("buf"));
        assert_eq!(descriptor.usage, wgpu_types::BufferUsages::STORAGE);
        assert!(descriptor.mapped_at_creation);
        assert_eq!(descriptor.size, 4096);
    }

    #[test]
    fn truncated_descriptor_is_out_of_bounds() {
        let mut data = vec![0u8; 16];
        let mem = GuestMemory::new(&mut data);
        assert!(matches!(
            buffer_descriptor(&mem, 0),
            Err(BridgeError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn bad_usage_bits_are_rejected() {
        let mut wire = [0u8; 24];
        wire[8..12].copy_from_slice(&0x8000_0000u32.to_le_bytes());
        let mut data = memory_with(&wire);
        let mem = GuestMemory::new(&mut data);
        assert!(matches!(
            buffer_descriptor(&mem, 0),
            Err(BridgeError::InvalidEnumValue { .. })
        ));
    }

    #[test]
    fn sampler_descriptor_decodes() {
        let mut wire = [0u8; 48];
        wire[8..12].copy_from_slice(&3u32.to_le_bytes()); // clamp
        wire[12..16].copy_from_slice(&1u32.to_le_bytes()); // repeat
        wire[16..20].copy_from_slice(&2u32.to_le_bytes()); // mirror
        wire[20..24].copy_from_slice(&2u32.to_le_bytes()); // linear
        wire[24..28].copy_from_slice(&1u32.to_le_bytes()); // nearest
        wire[28..32].copy_from_slice(&1u32.to_le_bytes());
        wire[36..40].copy_from_slice(&32.0f32.to_bits().to_le_bytes());
        wire[40..44].copy_from_slice(&4u32.to_le_bytes()); // less-equal
        wire[44..48].copy_from_slice(&16u32.to_le_bytes());
        let mut data = memory_with(&wire);
        let mem = GuestMemory::new(&mut data);

        let descriptor = sampler_descriptor(&mem, 0).unwrap();
        assert_eq!(
            descriptor.address_modes,
            [
                wgpu_types::AddressMode::ClampToEdge,
                wgpu_types::AddressMode::Repeat,
                wgpu_types::AddressMode::MirrorRepeat,
            ]
        );
        assert_eq!(descriptor.mag_filter, wgpu_types::FilterMode::Linear);
        assert_eq!(descriptor.lod_max_clamp, 32.0);
        assert_eq!(
            descriptor.compare,
            Some(wgpu_types::CompareFunction::LessEqual)
        );
        assert_eq!(descriptor.anisotropy_clamp, 16);
    }

    #[test]
    fn entry_array_length_overflow_is_rejected() {
        let mut wire = [0u8; 16];
        wire[12..16].copy_from_slice(&u32::MAX.to_le_bytes()); // entry_count
        let mut data = memory_with(&wire);
        let mem = GuestMemory::new(&mut data);
        assert!(matches!(
            bind_group_layout_descriptor(&mem, 0),
            Err(BridgeError::InvalidDescriptor(_))
        ));
    }
}
