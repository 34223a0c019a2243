//! Error taxonomy for guest-visible failures.
//!
//! Every fallible bridge operation reports its outcome to the guest as a
//! status code; the full message is kept host-side and can be fetched with
//! `wgpuGetLastErrorMessage`. None of these errors ever traps the guest.

use std::fmt;

use crate::handles::HandleKind;

/// Guest-visible status codes. `0` is reserved for success.
pub mod status {
    pub const SUCCESS: u32 = 0;
    pub const OUT_OF_BOUNDS: u32 = 1;
    pub const INVALID_HANDLE: u32 = 2;
    pub const WRONG_HANDLE_KIND: u32 = 3;
    pub const INVALID_ENUM_VALUE: u32 = 4;
    pub const INVALID_DESCRIPTOR: u32 = 5;
    pub const ALREADY_RELEASED: u32 = 6;
    pub const NATIVE_ERROR: u32 = 7;
    pub const NOT_MAPPED: u32 = 8;
    pub const PASS_ENDED: u32 = 9;
}

/// A failure while servicing a single guest call.
#[derive(Debug)]
pub enum BridgeError {
    /// A (ptr, len) pair reached outside the guest's linear memory.
    OutOfBounds { ptr: u32, len: u32, memory_size: usize },
    /// A handle that was never allocated, or is out of range.
    InvalidHandle(u32),
    /// A live handle of the wrong category.
    WrongHandleKind {
        handle: u32,
        expected: HandleKind,
        actual: HandleKind,
    },
    /// A `u32` that is not a value of the expected enum.
    InvalidEnumValue { what: &'static str, value: u32 },
    /// A descriptor that decoded but cannot be honored.
    InvalidDescriptor(&'static str),
    /// The handle was valid once and has since been released.
    AlreadyReleased(u32),
    /// The native WebGPU implementation rejected the call.
    NativeError(String),
    /// Mapped-range access on a buffer that is not currently mapped.
    NotMapped(u32),
    /// Recording onto a pass that was already ended.
    PassEnded(u32),
}

impl BridgeError {
    pub fn code(&self) -> u32 {
        match self {
            BridgeError::OutOfBounds { .. } => status::OUT_OF_BOUNDS,
            BridgeError::InvalidHandle(_) => status::INVALID_HANDLE,
            BridgeError::WrongHandleKind { .. } => status::WRONG_HANDLE_KIND,
            BridgeError::InvalidEnumValue { .. } => status::INVALID_ENUM_VALUE,
            BridgeError::InvalidDescriptor(_) => status::INVALID_DESCRIPTOR,
            BridgeError::AlreadyReleased(_) => status::ALREADY_RELEASED,
            BridgeError::NativeError(_) => status::NATIVE_ERROR,
            BridgeError::NotMapped(_) => status::NOT_MAPPED,
            BridgeError::PassEnded(_) => status::PASS_ENDED,
        }
    }

    /// Wraps an error coming out of the native WebGPU implementation.
    pub fn native(err: impl std::error::Error) -> Self {
        BridgeError::NativeError(err.to_string())
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::OutOfBounds { ptr, len, memory_size } => write!(
                f,
                "guest range ({ptr}, {len}) is outside of linear memory of {memory_size} bytes"
            ),
            BridgeError::InvalidHandle(h) => write!(f, "invalid handle {h}"),
            BridgeError::WrongHandleKind { handle, expected, actual } => {
                write!(f, "handle {handle} is a {actual}, expected a {expected}")
            }
            BridgeError::InvalidEnumValue { what, value } => {
                write!(f, "{value} is not a valid {what}")
            }
            BridgeError::InvalidDescriptor(what) => write!(f, "invalid descriptor: {what}"),
            BridgeError::AlreadyReleased(h) => write!(f, "handle {h} was already released"),
            BridgeError::NativeError(msg) => write!(f, "{msg}"),
            BridgeError::NotMapped(h) => write!(f, "buffer {h} is not mapped"),
            BridgeError::PassEnded(h) => write!(f, "pass {h} has already ended"),
        }
    }
}

impl std::error::Error for BridgeError {}
