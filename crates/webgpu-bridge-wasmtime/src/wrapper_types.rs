//! Host-side state parked behind each handle.
//!
//! Most entries are bare `wgpu-core` ids. Buffers and passes carry extra
//! bookkeeping: buffers track their asynchronous map request, passes hold the
//! recording object until the guest ends them.

use std::sync::{Arc, Mutex};

use wgpu_core::command::{ComputePass, RenderPass};
use wgpu_core::id;

use crate::handles::HandleKind;

pub(crate) enum Resource {
    Instance,
    Adapter(id::AdapterId),
    Device(Device),
    Queue(id::QueueId),
    Buffer(Buffer),
    Texture(id::TextureId),
    TextureView(id::TextureViewId),
    Sampler(id::SamplerId),
    ShaderModule(id::ShaderModuleId),
    BindGroupLayout(id::BindGroupLayoutId),
    PipelineLayout(id::PipelineLayoutId),
    BindGroup(id::BindGroupId),
    ComputePipeline(id::ComputePipelineId),
    RenderPipeline(id::RenderPipelineId),
    CommandEncoder(id::CommandEncoderId),
    ComputePass(RecordedComputePass),
    RenderPass(RecordedRenderPass),
    CommandBuffer(id::CommandBufferId),
}

impl Resource {
    pub(crate) fn kind(&self) -> HandleKind {
        match self {
            Resource::Instance => HandleKind::Instance,
            Resource::Adapter(_) => HandleKind::Adapter,
            Resource::Device(_) => HandleKind::Device,
            Resource::Queue(_) => HandleKind::Queue,
            Resource::Buffer(_) => HandleKind::Buffer,
            Resource::Texture(_) => HandleKind::Texture,
            Resource::TextureView(_) => HandleKind::TextureView,
            Resource::Sampler(_) => HandleKind::Sampler,
            Resource::ShaderModule(_) => HandleKind::ShaderModule,
            Resource::BindGroupLayout(_) => HandleKind::BindGroupLayout,
            Resource::PipelineLayout(_) => HandleKind::PipelineLayout,
            Resource::BindGroup(_) => HandleKind::BindGroup,
            Resource::ComputePipeline(_) => HandleKind::ComputePipeline,
            Resource::RenderPipeline(_) => HandleKind::RenderPipeline,
            Resource::CommandEncoder(_) => HandleKind::CommandEncoder,
            Resource::ComputePass(_) => HandleKind::ComputePass,
            Resource::RenderPass(_) => HandleKind::RenderPass,
            Resource::CommandBuffer(_) => HandleKind::CommandBuffer,
        }
    }
}

/// A device together with its queue. The queue id is owned by the device
/// entry; queue handles handed to the guest are views onto it.
#[derive(Clone, Copy)]
pub(crate) struct Device {
    pub device: id::DeviceId,
    pub queue: id::QueueId,
}

pub(crate) struct Buffer {
    pub id: id::BufferId,
    pub size: u64,
    /// Present from `wgpuBufferMapAsync` until `wgpuBufferUnmap`. Shared with
    /// the map-completion callback, which fires from `wgpuDevicePoll`.
    pub map: Option<Arc<Mutex<MapState>>>,
}

pub(crate) enum MapState {
    Pending,
    Mapped { offset: u64, size: u64 },
    Failed(String),
}

/// Guest-visible map-state codes for `wgpuBufferGetMapState`.
pub(crate) mod map_state {
    pub const UNMAPPED: u32 = 0;
    pub const PENDING: u32 = 1;
    pub const MAPPED: u32 = 2;
    pub const FAILED: u32 = 3;
}

/// A compute pass being recorded. `pass` is taken when the guest ends it;
/// recording onto the emptied slot reports an error rather than trapping.
pub(crate) struct RecordedComputePass {
    pub encoder: id::CommandEncoderId,
    pub pass: Option<ComputePass>,
}

pub(crate) struct RecordedRenderPass {
    pub encoder: id::CommandEncoderId,
    pub pass: Option<RenderPass>,
}
