use super::helpers::{buffer_runtime, open_two};
use peerlink::kernel::builtin;
use peerlink::types::fill_pattern;
use peerlink::{CacheMode, DeviceMemory, ErrorKind, KernelRunner, PeerlinkError, ProgramSource};
use std::sync::Arc;

#[test]
fn test_write_to_remote_copies_into_peer() {
    let backend = buffer_runtime();
    let (a, b) = open_two(&backend);
    let init = fill_pattern(512, 0);
    let src = a.allocate_buffer(2048, Some(&init)).unwrap();
    let dst = b.allocate_buffer(2048, Some(&[0; 512])).unwrap();

    let view = a.import_from_handle(dst.derive_handle().unwrap(), 2048).unwrap();
    let mut runner = KernelRunner::new(Arc::clone(&a), CacheMode::SingleShot, "-cl-std=CL2.0");
    let stats = runner
        .dispatch(
            &ProgramSource::text(builtin::WRITE_KERNEL_SOURCE),
            builtin::WRITE_TO_REMOTE,
            &[&src as &dyn DeviceMemory, &view],
            512,
        )
        .unwrap();
    assert_eq!(stats.bytes, 2048);

    assert_eq!(dst.read_all().unwrap(), init);
}

#[test]
fn test_read_from_remote_triples() {
    let backend = buffer_runtime();
    let (a, b) = open_two(&backend);
    let init = fill_pattern(256, 0);
    let local = a.allocate_buffer(1024, Some(&[0; 256])).unwrap();
    let remote = b.allocate_buffer(1024, Some(&init)).unwrap();

    let view = a.import_from_handle(remote.derive_handle().unwrap(), 1024).unwrap();
    let mut runner = KernelRunner::new(Arc::clone(&a), CacheMode::SingleShot, "");
    runner
        .dispatch(
            &ProgramSource::text(builtin::READ_KERNEL_SOURCE),
            builtin::READ_FROM_REMOTE,
            &[&local as &dyn DeviceMemory, &view],
            256,
        )
        .unwrap();

    let expected: Vec<u32> = init.iter().map(|v| v * 3).collect();
    assert_eq!(local.read_all().unwrap(), expected);
    assert_eq!(remote.read_all().unwrap(), init);
}

#[test]
fn test_accumulate_three_operands() {
    let backend = buffer_runtime();
    let (a, b) = open_two(&backend);
    let lhs = b.allocate_unified(64, 0).unwrap();
    let rhs = b.allocate_unified(64, 7).unwrap();
    let dst = a.allocate_buffer(256, None).unwrap();
    let lv = a.import_from_handle(lhs.derive_handle().unwrap(), 256).unwrap();
    let rv = a.import_from_handle(rhs.derive_handle().unwrap(), 256).unwrap();

    let mut runner = KernelRunner::new(Arc::clone(&a), CacheMode::SingleShot, "");
    runner
        .dispatch(
            &ProgramSource::text(builtin::ACCUMULATE_KERNEL_SOURCE),
            builtin::ACCUMULATE_REMOTE,
            &[&dst as &dyn DeviceMemory, &lv, &rv],
            64,
        )
        .unwrap();

    let out = dst.read_all().unwrap();
    assert_eq!(out[0], 7);
    assert_eq!(out[63], 63 + 63 + 7);
}

#[test]
fn test_operand_count_validated() {
    let backend = buffer_runtime();
    let (a, _b) = open_two(&backend);
    let one = a.allocate_buffer(16, None).unwrap();
    let mut runner = KernelRunner::new(Arc::clone(&a), CacheMode::SingleShot, "");
    let source = ProgramSource::text(builtin::WRITE_KERNEL_SOURCE);

    let err = runner
        .dispatch(&source, builtin::WRITE_TO_REMOTE, &[&one as &dyn DeviceMemory], 4)
        .unwrap_err();
    assert!(matches!(err, PeerlinkError::InvalidOperands(_)));

    let ops: [&dyn DeviceMemory; 4] = [&one, &one, &one, &one];
    assert!(runner.dispatch(&source, builtin::WRITE_TO_REMOTE, &ops, 4).is_err());
    assert_eq!(backend.stats().programs_built, 0);
}

#[test]
fn test_accumulate_missing_operand_is_driver_error() {
    let backend = buffer_runtime();
    let (a, _b) = open_two(&backend);
    let x = a.allocate_buffer(64, Some(&fill_pattern(16, 0))).unwrap();
    let y = a.allocate_buffer(64, None).unwrap();
    let source = ProgramSource::text(builtin::ACCUMULATE_KERNEL_SOURCE);
    let mut runner = KernelRunner::new(Arc::clone(&a), CacheMode::Cached, "");

    let err = runner
        .dispatch(&source, builtin::ACCUMULATE_REMOTE, &[&x as &dyn DeviceMemory, &y], 16)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DriverCall);
    assert!(err.to_string().contains("INVALID_KERNEL_ARGS"), "{err}");

    // The runtime keeps working, and the cached kernel binds afresh.
    assert_eq!(x.read_all().unwrap(), fill_pattern(16, 0));
    let z = a.allocate_buffer(64, Some(&[1; 16])).unwrap();
    runner
        .dispatch(&source, builtin::ACCUMULATE_REMOTE, &[&y as &dyn DeviceMemory, &x, &z], 16)
        .unwrap();
    assert_eq!(y.read_all().unwrap()[15], 16);
    let err = runner
        .dispatch(&source, builtin::ACCUMULATE_REMOTE, &[&x as &dyn DeviceMemory, &y], 16)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DriverCall);
}

#[test]
fn test_import_of_own_region_aliases_it() {
    let backend = buffer_runtime();
    let (a, _b) = open_two(&backend);
    let buf = a.allocate_buffer(16, Some(&[1, 2, 3, 4])).unwrap();
    let view = a.import_from_handle(buf.derive_handle().unwrap(), 16).unwrap();

    let mut runner = KernelRunner::new(Arc::clone(&a), CacheMode::SingleShot, "");
    runner
        .dispatch(
            &ProgramSource::text(builtin::READ_KERNEL_SOURCE),
            builtin::READ_FROM_REMOTE,
            &[&buf as &dyn DeviceMemory, &view],
            4,
        )
        .unwrap();
    assert_eq!(buf.read_all().unwrap(), vec![3, 6, 9, 12]);
    assert_eq!(view.read(4, 0).unwrap(), vec![3, 6, 9, 12]);
}

#[test]
fn test_foreign_operand_rejected() {
    let backend = buffer_runtime();
    let (a, b) = open_two(&backend);
    let local = a.allocate_buffer(16, None).unwrap();
    let elsewhere = b.allocate_buffer(16, None).unwrap();
    let mut runner = KernelRunner::new(Arc::clone(&a), CacheMode::SingleShot, "");

    let err = runner
        .dispatch(
            &ProgramSource::text(builtin::WRITE_KERNEL_SOURCE),
            builtin::WRITE_TO_REMOTE,
            &[&local as &dyn DeviceMemory, &elsewhere],
            4,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        PeerlinkError::ForeignOperand { operand_ctx, runner_ctx }
            if operand_ctx == b.id().as_u64() && runner_ctx == a.id().as_u64()
    ));
}

#[test]
fn test_launch_beyond_operand_rejected() {
    let backend = buffer_runtime();
    let (a, _b) = open_two(&backend);
    let x = a.allocate_buffer(16, None).unwrap();
    let y = a.allocate_buffer(16, None).unwrap();
    let mut runner = KernelRunner::new(Arc::clone(&a), CacheMode::SingleShot, "");
    let err = runner
        .dispatch(
            &ProgramSource::text(builtin::WRITE_KERNEL_SOURCE),
            builtin::WRITE_TO_REMOTE,
            &[&x as &dyn DeviceMemory, &y],
            5,
        )
        .unwrap_err();
    assert!(matches!(err, PeerlinkError::InvalidOperands(_)));
}

#[test]
fn test_build_failure_carries_log() {
    let backend = buffer_runtime();
    let (a, _b) = open_two(&backend);
    let x = a.allocate_buffer(16, None).unwrap();
    let y = a.allocate_buffer(16, None).unwrap();
    let mut runner = KernelRunner::new(Arc::clone(&a), CacheMode::Cached, "-cl-std=CL2.0");

    let err = runner
        .dispatch(
            &ProgramSource::text("void not_a_kernel(global int *a) {}"),
            "not_a_kernel",
            &[&x as &dyn DeviceMemory, &y],
            4,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Build);
    match err {
        PeerlinkError::Build { entry, log, .. } => {
            assert_eq!(entry, "not_a_kernel");
            assert!(log.contains("declares no kernels"));
            assert!(log.contains("-cl-std=CL2.0"));
        }
        other => panic!("expected build error, got {other:?}"),
    }
    assert_eq!(runner.cached_kernels(), 0);
}

#[test]
fn test_unknown_entry_releases_program() {
    let backend = buffer_runtime();
    let (a, _b) = open_two(&backend);
    let x = a.allocate_buffer(16, None).unwrap();
    let y = a.allocate_buffer(16, None).unwrap();
    let mut runner = KernelRunner::new(Arc::clone(&a), CacheMode::Cached, "");

    let err = runner
        .dispatch(
            &ProgramSource::text(builtin::WRITE_KERNEL_SOURCE),
            "write_to_nowhere",
            &[&x as &dyn DeviceMemory, &y],
            4,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DriverCall);
    assert_eq!(backend.stats().programs_built, 1);
    assert_eq!(backend.stats().programs_released, 1);
}

#[test]
fn test_device_to_device_copy() {
    let backend = buffer_runtime();
    let (a, b) = open_two(&backend);
    let local = a.allocate_buffer(32, Some(&[5; 8])).unwrap();
    let remote = b.allocate_buffer(32, Some(&[0; 8])).unwrap();
    let view = a.import_from_handle(remote.derive_handle().unwrap(), 32).unwrap();
    let runner = KernelRunner::new(Arc::clone(&a), CacheMode::Cached, "");

    let stats = runner.copy(&local, &view, 32).unwrap();
    assert_eq!(stats.bytes, 32);
    assert_eq!(remote.read_all().unwrap(), vec![5; 8]);

    assert!(matches!(
        runner.copy(&local, &view, 33),
        Err(PeerlinkError::SizeMismatch { expected: 33, actual: 32 })
    ));
    assert!(matches!(
        runner.copy(&local, &remote, 4),
        Err(PeerlinkError::ForeignOperand { .. })
    ));
}
