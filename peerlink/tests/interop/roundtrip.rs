use super::helpers::{buffer_runtime, open_two, runtime_pair};
use peerlink::types::fill_pattern;
use peerlink::{BackingKind, DeviceContext, DeviceMemory};

#[test]
fn test_export_import_preserves_values() {
    let backend = buffer_runtime();
    let (a, b) = open_two(&backend);
    let init = fill_pattern(2048, 0);
    let region = a.allocate_buffer(2048 * 4, Some(&init)).unwrap();

    let handle = region.derive_handle().unwrap();
    let view = b.import_from_handle(handle, 2048 * 4).unwrap();
    assert_eq!(view.read(2048, 0).unwrap(), init);
    assert_eq!(view.context_id(), b.id());
}

#[test]
fn test_derive_handle_twice_is_same_memory() {
    let backend = buffer_runtime();
    let (a, b) = open_two(&backend);
    let region = a.allocate_buffer(64, Some(&[42; 16])).unwrap();
    let h1 = region.derive_handle().unwrap();
    let h2 = region.derive_handle().unwrap();
    assert_eq!(h1, h2);
    assert_eq!(region.read_all().unwrap(), vec![42; 16]);

    let first = b.import_from_handle(h1, 64).unwrap();
    let second = b.import_from_handle(h2, 64).unwrap();
    assert_eq!(first.read(16, 0).unwrap(), second.read(16, 0).unwrap());
}

#[test]
fn test_buffer_into_pointer_runtime() {
    let (buffers, pointers) = runtime_pair();
    let ocl = DeviceContext::init(buffers, 0).unwrap();
    let ze = DeviceContext::init(pointers, 0).unwrap();
    let init = fill_pattern(512, 0);
    let region = ocl.allocate_buffer(512 * 4, Some(&init)).unwrap();

    let view = ze
        .import_from_handle(region.derive_handle().unwrap(), 512 * 4)
        .unwrap();
    assert_eq!(view.operand().kind(), BackingKind::Unified);
    assert_eq!(view.read(512, 0).unwrap(), init);
}

#[test]
fn test_unified_handle_path() {
    let backend = buffer_runtime();
    let (a, b) = open_two(&backend);
    let region = b.allocate_unified(100, 7).unwrap();
    assert_eq!(region.kind(), BackingKind::Unified);
    let view = a
        .import_from_handle(region.derive_handle().unwrap(), 400)
        .unwrap();
    assert_eq!(view.read(100, 0).unwrap(), fill_pattern(100, 7));
}

#[test]
fn test_release_import_leaves_origin_intact() {
    let backend = buffer_runtime();
    let (a, b) = open_two(&backend);
    let region = a.allocate_buffer(16, Some(&[1, 2, 3, 4])).unwrap();
    let handle = region.derive_handle().unwrap();

    b.import_from_handle(handle, 16).unwrap().release().unwrap();
    drop(b.import_from_handle(handle, 16).unwrap());

    assert_eq!(backend.stats().imports_released, 2);
    assert_eq!(region.read_all().unwrap(), vec![1, 2, 3, 4]);
    // The handle stays importable while the origin lives.
    assert!(b.import_from_handle(handle, 16).is_ok());
}

#[test]
fn test_import_larger_than_export_rejected() {
    let backend = buffer_runtime();
    let (a, b) = open_two(&backend);
    let region = a.allocate_buffer(16, None).unwrap();
    let err = b
        .import_from_handle(region.derive_handle().unwrap(), 17)
        .unwrap_err();
    assert!(err.to_string().contains("requested 17 bytes"));
    assert_eq!(backend.stats().imports, 1);
    assert_eq!(backend.stats().imports_released, 1);
}
