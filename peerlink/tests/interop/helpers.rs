use peerlink::{DeviceContext, HostBackend, HostFlavor, PeerlinkConfig};
use std::sync::Arc;

pub type HostContext = Arc<DeviceContext<HostBackend>>;

/// Buffer-centric host runtime with two GPUs.
pub fn buffer_runtime() -> Arc<HostBackend> {
    Arc::new(HostBackend::new(2))
}

/// A buffer-centric runtime and a pointer-centric sibling sharing its handle
/// table, both exposing two GPUs.
pub fn runtime_pair() -> (Arc<HostBackend>, Arc<HostBackend>) {
    let buffers = HostBackend::new(2);
    let pointers = buffers.sibling("host-ptr", HostFlavor::PointerCentric);
    (Arc::new(buffers), Arc::new(pointers))
}

/// Contexts on GPU0 and GPU1.
pub fn open_two(backend: &Arc<HostBackend>) -> (HostContext, HostContext) {
    let a = DeviceContext::init(Arc::clone(backend), 0).unwrap();
    let b = DeviceContext::init(Arc::clone(backend), 1).unwrap();
    (a, b)
}

/// Default config with fewer iterations.
pub fn quick_config() -> PeerlinkConfig {
    PeerlinkConfig {
        iterations: 2,
        parallel_iterations: 2,
        ..PeerlinkConfig::default()
    }
}
