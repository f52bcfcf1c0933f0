use super::helpers::buffer_runtime;
use peerlink::{DeviceContext, ErrorKind, HostBackend, PeerlinkError};
use std::sync::Arc;

#[test]
fn test_init_succeeds_below_count() {
    let backend = buffer_runtime();
    for index in 0..2 {
        let ctx = DeviceContext::init(Arc::clone(&backend), index).unwrap();
        ctx.drain().unwrap();
        assert_eq!(ctx.runtime(), "host");
    }
    assert_eq!(backend.stats().contexts_created, 2);
}

#[test]
fn test_init_at_count_is_configuration_error() {
    let backend = buffer_runtime();
    let err = DeviceContext::init(Arc::clone(&backend), 2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(matches!(
        err,
        PeerlinkError::DeviceIndexOutOfRange { index: 2, count: 2 }
    ));
    assert_eq!(backend.stats().contexts_created, 0);
}

#[test]
fn test_no_gpu_platform() {
    let backend = Arc::new(HostBackend::new(0));
    let err = DeviceContext::init(backend, 0).unwrap_err();
    assert!(matches!(err, PeerlinkError::NoGpuDevice { .. }));
}

#[test]
fn test_context_outlives_handle_drop_until_regions_go() {
    let backend = buffer_runtime();
    let ctx = DeviceContext::init(Arc::clone(&backend), 0).unwrap();
    let region = ctx.allocate_buffer(16, None).unwrap();
    drop(ctx);
    assert_eq!(backend.stats().contexts_destroyed, 0);
    drop(region);
    assert_eq!(backend.stats().contexts_destroyed, 1);
    assert_eq!(backend.stats().frees, 1);
}
