//! oneAPI Level Zero runtime for peerlink.
//!
//! The pointer-centric half of the interop pair. Allocations are device
//! pointers made exportable as dma-buf fds at allocation time; foreign fds
//! are imported into a context as device pointers, which kernels then
//! dereference directly. Kernels come from SPIR-V modules only.
//!
//! The loader library is opened at run time (see [`loader`]).

mod backend;
pub mod ffi;
pub mod loader;
pub mod status;

pub use backend::{LevelZeroBackend, ZeContext};
pub use loader::ZeApi;
pub use status::status_name;

/// Runtime name used in logs and errors.
pub const RUNTIME: &str = "level-zero";
