mod backend;
mod host;

pub use backend::Backend;
pub use host::{HOST_BUFFER_OBJECT_TYPE, HostBackend, HostContext, HostFlavor, HostKernel, HostStats, KernelArgs, status as host_status};
