//! Cross-runtime, cross-device GPU memory sharing.
//!
//! A [`DeviceContext`] opens one GPU through a [`Backend`]. Regions allocated
//! there export a process-shareable handle that another context, possibly of
//! a different runtime, imports as an [`ImportedRegion`]. A [`KernelRunner`]
//! dispatches kernels against local regions and such imports, so one GPU can
//! read and write another GPU's memory directly.

pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod kernel;
pub mod memory;
pub mod p2p;
pub mod types;

pub use config::PeerlinkConfig;
pub use context::DeviceContext;
pub use device::{Backend, HostBackend, HostFlavor, HostStats};
pub use error::{ErrorKind, PeerlinkError, Result};
pub use kernel::{CacheMode, KernelRunner, ProgramSource, TransferStats};
pub use memory::{DeviceMemory, ImportedRegion, MemoryRegion};
pub use p2p::{Scenario, ScenarioReport, Verification, WorkerMode};
pub use types::{BackingKind, ContextId, DeviceIndex, DeviceInfo, ImportInfo, NativeHandle, Operand};
