//! Small-integer handles standing in for native WebGPU objects.
//!
//! Guests never see host pointers or `wgpu-core` ids. Every native object the
//! bridge creates is parked in a [`HandleTable`] and the guest gets back a
//! `u32` index. Handle `0` is permanently reserved so it can serve as the
//! "null" value in the wire protocol.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::BridgeError;

/// The category a handle was allocated under. Every lookup states the
/// category it expects, so a buffer handle can never be spent as a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Instance,
    Adapter,
    Device,
    Queue,
    Buffer,
    Texture,
    TextureView,
    Sampler,
    ShaderModule,
    BindGroupLayout,
    PipelineLayout,
    BindGroup,
    ComputePipeline,
    RenderPipeline,
    CommandEncoder,
    ComputePass,
    RenderPass,
    CommandBuffer,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandleKind::Instance => "instance",
            HandleKind::Adapter => "adapter",
            HandleKind::Device => "device",
            HandleKind::Queue => "queue",
            HandleKind::Buffer => "buffer",
            HandleKind::Texture => "texture",
            HandleKind::TextureView => "texture view",
            HandleKind::Sampler => "sampler",
            HandleKind::ShaderModule => "shader module",
            HandleKind::BindGroupLayout => "bind group layout",
            HandleKind::PipelineLayout => "pipeline layout",
            HandleKind::BindGroup => "bind group",
            HandleKind::ComputePipeline => "compute pipeline",
            HandleKind::RenderPipeline => "render pipeline",
            HandleKind::CommandEncoder => "command encoder",
            HandleKind::ComputePass => "compute pass",
            HandleKind::RenderPass => "render pass",
            HandleKind::CommandBuffer => "command buffer",
        };
        f.write_str(name)
    }
}

/// A slot-reusing table mapping `u32` handles to host resources.
///
/// Slot 0 is never handed out. Freed slots are recycled smallest-first, so a
/// long-lived guest does not grow the table without bound.
pub struct HandleTable<R> {
    slots: Vec<Option<(HandleKind, R)>>,
    free: BTreeSet<u32>,
}

impl<R> HandleTable<R> {
    pub fn new() -> Self {
        HandleTable {
            // Slot 0 stays vacant forever; it is the guest's null handle.
            slots: vec![None],
            free: BTreeSet::new(),
        }
    }

    /// Parks `value` in the table and returns its new handle.
    pub fn alloc(&mut self, kind: HandleKind, value: R) -> u32 {
        match self.free.pop_first() {
            Some(handle) => {
                self.slots[handle as usize] = Some((kind, value));
                handle
            }
            None => {
                let handle = self.slots.len() as u32;
                self.slots.push(Some((kind, value)));
                handle
            }
        }
    }

    pub fn get(&self, handle: u32, kind: HandleKind) -> Result<&R, BridgeError> {
        match self.slots.get(handle as usize) {
            Some(Some((actual, value))) => {
                if *actual == kind {
                    Ok(value)
                } else {
                    Err(BridgeError::WrongHandleKind {
                        handle,
                        expected: kind,
                        actual: *actual,
                    })
                }
            }
            Some(None) if self.free.contains(&handle) => {
                Err(BridgeError::AlreadyReleased(handle))
            }
            _ => Err(BridgeError::InvalidHandle(handle)),
        }
    }

    pub fn get_mut(&mut self, handle: u32, kind: HandleKind) -> Result<&mut R, BridgeError> {
        match self.slots.get_mut(handle as usize) {
            Some(Some((actual, value))) => {
                if *actual == kind {
                    Ok(value)
                } else {
                    Err(BridgeError::WrongHandleKind {
                        handle,
                        expected: kind,
                        actual: *actual,
                    })
                }
            }
            Some(None) if self.free.contains(&handle) => {
                Err(BridgeError::AlreadyReleased(handle))
            }
            _ => Err(BridgeError::InvalidHandle(handle)),
        }
    }

    /// Vacates the slot and returns what was in it. Releasing a slot that was
    /// already released reports [`BridgeError::AlreadyReleased`], which the
    /// calling thunk turns into a benign status code.
    pub fn free(&mut self, handle: u32) -> Result<(HandleKind, R), BridgeError> {
        match self.slots.get_mut(handle as usize) {
            Some(slot @ Some(_)) => {
                let entry = slot.take();
                self.free.insert(handle);
                // The match arm guarantees the slot was occupied.
                entry.ok_or(BridgeError::InvalidHandle(handle))
            }
            Some(None) if self.free.contains(&handle) => {
                Err(BridgeError::AlreadyReleased(handle))
            }
            _ => Err(BridgeError::InvalidHandle(handle)),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.slots.len() - 1 - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains every live entry, smallest handle first. Used on context
    /// teardown to drop native objects the guest leaked.
    pub fn drain(&mut self) -> impl Iterator<Item = (HandleKind, R)> + '_ {
        self.free.clear();
        self.slots.drain(..).flatten()
    }
}

impl<R> Default for HandleTable<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_start_at_one() {
        let mut table = HandleTable::new();
        assert_eq!(table.alloc(HandleKind::Buffer, 10u32), 1);
        assert_eq!(table.alloc(HandleKind::Buffer, 11u32), 2);
    }

    #[test]
    fn zero_is_never_valid() {
        let mut table = HandleTable::new();
        table.alloc(HandleKind::Buffer, 10u32);
        assert!(matches!(
            table.get(0, HandleKind::Buffer),
            Err(BridgeError::InvalidHandle(0))
        ));
        assert!(matches!(table.free(0), Err(BridgeError::InvalidHandle(0))));
    }

    #[test]
    fn lookup_returns_the_stored_value() {
        let mut table = HandleTable::new();
        let h = table.alloc(HandleKind::Buffer, 10u32);
        assert_eq!(table.get(h, HandleKind::Buffer).copied().unwrap(), 10);
        *table.get_mut(h, HandleKind::Buffer).unwrap() = 20;
        assert_eq!(table.get(h, HandleKind::Buffer).copied().unwrap(), 20);
    }

    #[test]
    fn category_mismatch_is_reported() {
        let mut table = HandleTable::new();
        let h = table.alloc(HandleKind::Buffer, 10u32);
        match table.get(h, HandleKind::Texture) {
            Err(BridgeError::WrongHandleKind { handle, expected, actual }) => {
                assert_eq!(handle, h);
                assert_eq!(expected, HandleKind::Texture);
                assert_eq!(actual, HandleKind::Buffer);
            }
            other => panic!("expected a category mismatch, got {other:?}"),
        }
    }

    #[test]
    fn free_then_get_is_stale() {
        let mut table = HandleTable::new();
        let h = table.alloc(HandleKind::Buffer, 10u32);
        assert!(table.free(h).is_ok());
        assert!(matches!(
            table.get(h, HandleKind::Buffer),
            Err(BridgeError::AlreadyReleased(_))
        ));
    }

    #[test]
    fn double_free_is_distinguishable() {
        let mut table = HandleTable::new();
        let h = table.alloc(HandleKind::Buffer, 10u32);
        table.free(h).unwrap();
        assert!(matches!(table.free(h), Err(BridgeError::AlreadyReleased(_))));
    }

    #[test]
    fn alloc_after_double_free_reuses_the_slot_once() {
        let mut table = HandleTable::new();
        let a = table.alloc(HandleKind::Buffer, 1u32);
        let b = table.alloc(HandleKind::Buffer, 2u32);
        table.free(a).unwrap();
        assert!(matches!(table.free(a), Err(BridgeError::AlreadyReleased(_))));
        // The double free poisons nothing: the slot comes back exactly once.
        assert_eq!(table.alloc(HandleKind::Buffer, 3u32), a);
        let c = table.alloc(HandleKind::Buffer, 4u32);
        assert_ne!(c, a);
        assert_ne!(c, b);
    }

    #[test]
    fn freed_slots_are_reused_smallest_first() {
        let mut table = HandleTable::new();
        let h1 = table.alloc(HandleKind::Buffer, 1u32);
        let h2 = table.alloc(HandleKind::Buffer, 2u32);
        let h3 = table.alloc(HandleKind::Buffer, 3u32);
        table.free(h3).unwrap();
        table.free(h1).unwrap();
        assert_eq!(table.alloc(HandleKind::Buffer, 4u32), h1);
        assert_eq!(table.alloc(HandleKind::Buffer, 5u32), h3);
        assert_eq!(table.get(h2, HandleKind::Buffer).copied().unwrap(), 2);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn reused_slot_takes_the_new_category() {
        let mut table = HandleTable::new();
        let h = table.alloc(HandleKind::Buffer, 1u32);
        table.free(h).unwrap();
        let h2 = table.alloc(HandleKind::Texture, 2u32);
        assert_eq!(h, h2);
        assert!(table.get(h2, HandleKind::Texture).is_ok());
        assert!(table.get(h2, HandleKind::Buffer).is_err());
    }

    #[test]
    fn drain_yields_leaked_entries() {
        let mut table = HandleTable::new();
        table.alloc(HandleKind::Buffer, 1u32);
        let h = table.alloc(HandleKind::Texture, 2u32);
        table.alloc(HandleKind::Sampler, 3u32);
        table.free(h).unwrap();
        let drained: Vec<_> = table.drain().collect();
        assert_eq!(
            drained,
            vec![(HandleKind::Buffer, 1), (HandleKind::Sampler, 3)]
        );
    }
}
