//! OpenCL runtime for peerlink.
//!
//! The buffer-centric half of the interop pair: `cl_mem` buffer objects
//! exported as dma-buf fds through `CL_MEM_ALLOCATION_HANDLE_INTEL` and
//! imported with `cl_khr_external_memory_dma_buf`. Unified memory goes
//! through `cl_intel_unified_shared_memory` when the platform has it.
//!
//! The ICD loader is opened at run time (see [`loader`]), so the crate
//! builds and its callers run on machines without OpenCL; they get
//! [`PeerlinkError::RuntimeUnavailable`](peerlink::PeerlinkError) instead.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use peerlink::DeviceContext;
//! use peerlink_opencl::OpenClBackend;
//!
//! let backend = Arc::new(OpenClBackend::load()?);
//! let gpu0 = DeviceContext::init(backend, 0)?;
//! ```

mod backend;
pub mod ffi;
pub mod loader;
pub mod status;
mod usm;

pub use backend::{OpenClBackend, OpenClContext};
pub use loader::OpenClApi;
pub use status::status_name;

/// Runtime name used in logs and errors.
pub const RUNTIME: &str = "opencl";
