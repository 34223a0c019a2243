//! Fallible conversions from wire `u32` discriminants to `wgpu-types` enums.
//!
//! Numbering follows webgpu.h where one exists. `0` is reserved for
//! "undefined" everywhere, so it is only accepted where a conversion
//! explicitly documents a default or "none" meaning. Unknown values are
//! reported as [`BridgeError::InvalidEnumValue`], never mapped to a fallback.

use crate::error::BridgeError;

fn invalid(what: &'static str, value: u32) -> BridgeError {
    BridgeError::InvalidEnumValue { what, value }
}

/// 0 undefined, 1 low-power, 2 high-performance.
pub(crate) fn power_preference(value: u32) -> Result<wgpu_types::PowerPreference, BridgeError> {
    Ok(match value {
        0 => wgpu_types::PowerPreference::None,
        1 => wgpu_types::PowerPreference::LowPower,
        2 => wgpu_types::PowerPreference::HighPerformance,
        _ => return Err(invalid("power preference", value)),
    })
}

pub(crate) fn texture_dimension(value: u32) -> Result<wgpu_types::TextureDimension, BridgeError> {
    Ok(match value {
        1 => wgpu_types::TextureDimension::D1,
        2 => wgpu_types::TextureDimension::D2,
        3 => wgpu_types::TextureDimension::D3,
        _ => return Err(invalid("texture dimension", value)),
    })
}

pub(crate) fn texture_view_dimension(
    value: u32,
) -> Result<wgpu_types::TextureViewDimension, BridgeError> {
    Ok(match value {
        1 => wgpu_types::TextureViewDimension::D1,
        2 => wgpu_types::TextureViewDimension::D2,
        3 => wgpu_types::TextureViewDimension::D2Array,
        4 => wgpu_types::TextureViewDimension::Cube,
        5 => wgpu_types::TextureViewDimension::CubeArray,
        6 => wgpu_types::TextureViewDimension::D3,
        _ => return Err(invalid("texture view dimension", value)),
    })
}

/// 0 is accepted as "all" so a zero-initialized view descriptor works.
pub(crate) fn texture_aspect(value: u32) -> Result<wgpu_types::TextureAspect, BridgeError> {
    Ok(match value {
        0 | 1 => wgpu_types::TextureAspect::All,
        2 => wgpu_types::TextureAspect::StencilOnly,
        3 => wgpu_types::TextureAspect::DepthOnly,
        _ => return Err(invalid("texture aspect", value)),
    })
}

pub(crate) fn address_mode(value: u32) -> Result<wgpu_types::AddressMode, BridgeError> {
    Ok(match value {
        1 => wgpu_types::AddressMode::Repeat,
        2 => wgpu_types::AddressMode::MirrorRepeat,
        3 => wgpu_types::AddressMode::ClampToEdge,
        _ => return Err(invalid("address mode", value)),
    })
}

pub(crate) fn filter_mode(value: u32) -> Result<wgpu_types::FilterMode, BridgeError> {
    Ok(match value {
        1 => wgpu_types::FilterMode::Nearest,
        2 => wgpu_types::FilterMode::Linear,
        _ => return Err(invalid("filter mode", value)),
    })
}

pub(crate) fn compare_function(value: u32) -> Result<wgpu_types::CompareFunction, BridgeError> {
    Ok(match value {
        1 => wgpu_types::CompareFunction::Never,
        2 => wgpu_types::CompareFunction::Less,
        3 => wgpu_types::CompareFunction::Equal,
        4 => wgpu_types::CompareFunction::LessEqual,
        5 => wgpu_types::CompareFunction::Greater,
        6 => wgpu_types::CompareFunction::NotEqual,
        7 => wgpu_types::CompareFunction::GreaterEqual,
        8 => wgpu_types::CompareFunction::Always,
        _ => return Err(invalid("compare function", value)),
    })
}

pub(crate) fn primitive_topology(
    value: u32,
) -> Result<wgpu_types::PrimitiveTopology, BridgeError> {
    Ok(match value {
        1 => wgpu_types::PrimitiveTopology::PointList,
        2 => wgpu_types::PrimitiveTopology::LineList,
        3 => wgpu_types::PrimitiveTopology::LineStrip,
        4 => wgpu_types::PrimitiveTopology::TriangleList,
        5 => wgpu_types::PrimitiveTopology::TriangleStrip,
        _ => return Err(invalid("primitive topology", value)),
    })
}

pub(crate) fn index_format(value: u32) -> Result<wgpu_types::IndexFormat, BridgeError> {
    Ok(match value {
        1 => wgpu_types::IndexFormat::Uint16,
        2 => wgpu_types::IndexFormat::Uint32,
        _ => return Err(invalid("index format", value)),
    })
}

pub(crate) fn front_face(value: u32) -> Result<wgpu_types::FrontFace, BridgeError> {
    Ok(match value {
        1 => wgpu_types::FrontFace::Ccw,
        2 => wgpu_types::FrontFace::Cw,
        _ => return Err(invalid("front face", value)),
    })
}

/// 1 none, 2 front, 3 back.
pub(crate) fn cull_mode(value: u32) -> Result<Option<wgpu_types::Face>, BridgeError> {
    Ok(match value {
        1 => None,
        2 => Some(wgpu_types::Face::Front),
        3 => Some(wgpu_types::Face::Back),
        _ => return Err(invalid("cull mode", value)),
    })
}

pub(crate) fn vertex_step_mode(value: u32) -> Result<wgpu_types::VertexStepMode, BridgeError> {
    Ok(match value {
        1 => wgpu_types::VertexStepMode::Vertex,
        2 => wgpu_types::VertexStepMode::Instance,
        _ => return Err(invalid("vertex step mode", value)),
    })
}

pub(crate) fn vertex_format(value: u32) -> Result<wgpu_types::VertexFormat, BridgeError> {
    Ok(match value {
        1 => wgpu_types::VertexFormat::Uint32,
        2 => wgpu_types::VertexFormat::Sint32,
        3 => wgpu_types::VertexFormat::Float32,
        4 => wgpu_types::VertexFormat::Float32x2,
        5 => wgpu_types::VertexFormat::Float32x3,
        6 => wgpu_types::VertexFormat::Float32x4,
        7 => wgpu_types::VertexFormat::Uint8x4,
        8 => wgpu_types::VertexFormat::Unorm8x4,
        9 => wgpu_types::VertexFormat::Uint16x2,
        10 => wgpu_types::VertexFormat::Uint16x4,
        11 => wgpu_types::VertexFormat::Sint32x2,
        12 => wgpu_types::VertexFormat::Sint32x3,
        13 => wgpu_types::VertexFormat::Sint32x4,
        14 => wgpu_types::VertexFormat::Uint32x2,
        15 => wgpu_types::VertexFormat::Uint32x3,
        16 => wgpu_types::VertexFormat::Uint32x4,
        _ => return Err(invalid("vertex format", value)),
    })
}

pub(crate) fn texture_format(value: u32) -> Result<wgpu_types::TextureFormat, BridgeError> {
    Ok(match value {
        1 => wgpu_types::TextureFormat::R8Unorm,
        2 => wgpu_types::TextureFormat::R8Uint,
        3 => wgpu_types::TextureFormat::R8Sint,
        4 => wgpu_types::TextureFormat::R16Uint,
        5 => wgpu_types::TextureFormat::R16Sint,
        6 => wgpu_types::TextureFormat::R16Float,
        7 => wgpu_types::TextureFormat::Rg8Unorm,
        8 => wgpu_types::TextureFormat::R32Float,
        9 => wgpu_types::TextureFormat::R32Uint,
        10 => wgpu_types::TextureFormat::R32Sint,
        11 => wgpu_types::TextureFormat::Rg16Float,
        12 => wgpu_types::TextureFormat::Rgba8Unorm,
        13 => wgpu_types::TextureFormat::Rgba8UnormSrgb,
        14 => wgpu_types::TextureFormat::Rgba8Snorm,
        15 => wgpu_types::TextureFormat::Rgba8Uint,
        16 => wgpu_types::TextureFormat::Rgba8Sint,
        17 => wgpu_types::TextureFormat::Bgra8Unorm,
        18 => wgpu_types::TextureFormat::Bgra8UnormSrgb,
        19 => wgpu_types::TextureFormat::Rg32Float,
        20 => wgpu_types::TextureFormat::Rgba16Float,
        21 => wgpu_types::TextureFormat::Rgba32Float,
        22 => wgpu_types::TextureFormat::Depth32Float,
        23 => wgpu_types::TextureFormat::Depth24Plus,
        24 => wgpu_types::TextureFormat::Depth24PlusStencil8,
        _ => return Err(invalid("texture format", value)),
    })
}

/// 1 uniform, 2 storage, 3 read-only storage.
pub(crate) fn buffer_binding_type(
    value: u32,
) -> Result<wgpu_types::BufferBindingType, BridgeError> {
    Ok(match value {
        1 => wgpu_types::BufferBindingType::Uniform,
        2 => wgpu_types::BufferBindingType::Storage { read_only: false },
        3 => wgpu_types::BufferBindingType::Storage { read_only: true },
        _ => return Err(invalid("buffer binding type", value)),
    })
}

/// 0 none, 1 replace, 2 premultiplied alpha blending.
pub(crate) fn blend_preset(value: u32) -> Result<Option<wgpu_types::BlendState>, BridgeError> {
    Ok(match value {
        0 => None,
        1 => Some(wgpu_types::BlendState::REPLACE),
        2 => Some(wgpu_types::BlendState::ALPHA_BLENDING),
        _ => return Err(invalid("blend preset", value)),
    })
}

pub(crate) fn load_op(value: u32) -> Result<wgpu_core::command::LoadOp, BridgeError> {
    Ok(match value {
        1 => wgpu_core::command::LoadOp::Clear,
        2 => wgpu_core::command::LoadOp::Load,
        _ => return Err(invalid("load op", value)),
    })
}

pub(crate) fn store_op(value: u32) -> Result<wgpu_core::command::StoreOp, BridgeError> {
    Ok(match value {
        1 => wgpu_core::command::StoreOp::Store,
        2 => wgpu_core::command::StoreOp::Discard,
        _ => return Err(invalid("store op", value)),
    })
}

/// 1 read, 2 write. Exactly one, matching a single map operation.
pub(crate) fn map_mode(value: u32) -> Result<wgpu_core::device::HostMap, BridgeError> {
    Ok(match value {
        1 => wgpu_core::device::HostMap::Read,
        2 => wgpu_core::device::HostMap::Write,
        _ => return Err(invalid("map mode", value)),
    })
}

pub(crate) fn buffer_usages(value: u32) -> Result<wgpu_types::BufferUsages, BridgeError> {
    wgpu_types::BufferUsages::from_bits(value).ok_or(invalid("buffer usage flags", value))
}

pub(crate) fn texture_usages(value: u32) -> Result<wgpu_types::TextureUsages, BridgeError> {
    wgpu_types::TextureUsages::from_bits(value).ok_or(invalid("texture usage flags", value))
}

pub(crate) fn shader_stages(value: u32) -> Result<wgpu_types::ShaderStages, BridgeError> {
    wgpu_types::ShaderStages::from_bits(value).ok_or(invalid("shader stage flags", value))
}

pub(crate) fn color_writes(value: u32) -> Result<wgpu_types::ColorWrites, BridgeError> {
    wgpu_types::ColorWrites::from_bits(value).ok_or(invalid("color write mask", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_not_a_valid_discriminant() {
        assert!(texture_dimension(0).is_err());
        assert!(filter_mode(0).is_err());
        assert!(primitive_topology(0).is_err());
        assert!(load_op(0).is_err());
        assert!(map_mode(0).is_err());
    }

    #[test]
    fn known_values_convert() {
        assert_eq!(
            power_preference(2).unwrap(),
            wgpu_types::PowerPreference::HighPerformance
        );
        assert_eq!(cull_mode(1).unwrap(), None);
        assert_eq!(cull_mode(3).unwrap(), Some(wgpu_types::Face::Back));
        assert_eq!(
            buffer_binding_type(3).unwrap(),
            wgpu_types::BufferBindingType::Storage { read_only: true }
        );
    }

    #[test]
    fn unknown_flag_bits_are_rejected() {
        assert!(buffer_usages(wgpu_types::BufferUsages::all().bits()).is_ok());
        assert!(buffer_usages(0x8000_0000).is_err());
        assert!(shader_stages(0xffff_ffff).is_err());
    }

    #[test]
    fn errors_carry_the_offending_value() {
        match texture_format(999) {
            Err(BridgeError::InvalidEnumValue { what, value }) => {
                assert_eq!(what, "texture format");
                assert_eq!(value, 999);
            }
            other => panic!("expected an enum error, got {other:?}"),
        }
    }
}
