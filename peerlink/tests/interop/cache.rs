use super::helpers::{buffer_runtime, open_two};
use peerlink::kernel::builtin;
use peerlink::{CacheMode, DeviceMemory, KernelRunner, ProgramSource};
use std::sync::Arc;

#[test]
fn test_cached_runner_builds_once() {
    let backend = buffer_runtime();
    let (a, _b) = open_two(&backend);
    let x = a.allocate_buffer(64, Some(&[1; 16])).unwrap();
    let y = a.allocate_buffer(64, None).unwrap();
    let source = ProgramSource::text(builtin::WRITE_KERNEL_SOURCE);

    let mut runner = KernelRunner::new(Arc::clone(&a), CacheMode::Cached, "");
    for _ in 0..3 {
        runner
            .dispatch(&source, builtin::WRITE_TO_REMOTE, &[&x as &dyn DeviceMemory, &y], 16)
            .unwrap();
    }
    assert_eq!(backend.stats().programs_built, 1);
    assert_eq!(backend.stats().launches, 3);
    assert!(runner.is_cached(&source, builtin::WRITE_TO_REMOTE));
    assert_eq!(runner.cached_kernels(), 1);

    drop(runner);
    assert_eq!(backend.stats().kernels_released, 1);
    assert_eq!(backend.stats().programs_released, 1);
}

#[test]
fn test_single_shot_builds_every_dispatch() {
    let backend = buffer_runtime();
    let (a, _b) = open_two(&backend);
    let x = a.allocate_buffer(64, None).unwrap();
    let y = a.allocate_buffer(64, None).unwrap();
    let source = ProgramSource::text(builtin::WRITE_KERNEL_SOURCE);

    let mut runner = KernelRunner::new(Arc::clone(&a), CacheMode::SingleShot, "");
    for _ in 0..2 {
        runner
            .dispatch(&source, builtin::WRITE_TO_REMOTE, &[&x as &dyn DeviceMemory, &y], 16)
            .unwrap();
        assert_eq!(runner.cached_kernels(), 0);
    }
    let stats = backend.stats();
    assert_eq!(stats.programs_built, 2);
    assert_eq!(stats.programs_released, 2);
    assert_eq!(stats.kernels_released, 2);
}

#[test]
fn test_distinct_entries_cached_separately() {
    let backend = buffer_runtime();
    let (a, _b) = open_two(&backend);
    let x = a.allocate_buffer(64, None).unwrap();
    let y = a.allocate_buffer(64, None).unwrap();
    let write = ProgramSource::text(builtin::WRITE_KERNEL_SOURCE);
    let read = ProgramSource::text(builtin::READ_KERNEL_SOURCE);

    let mut runner = KernelRunner::new(Arc::clone(&a), CacheMode::Cached, "");
    runner
        .dispatch(&write, builtin::WRITE_TO_REMOTE, &[&x as &dyn DeviceMemory, &y], 16)
        .unwrap();
    runner
        .dispatch(&read, builtin::READ_FROM_REMOTE, &[&x as &dyn DeviceMemory, &y], 16)
        .unwrap();
    assert_eq!(runner.cached_kernels(), 2);

    assert!(runner.evict(&write, builtin::WRITE_TO_REMOTE).unwrap());
    assert!(!runner.evict(&write, builtin::WRITE_TO_REMOTE).unwrap());
    assert_eq!(runner.cached_kernels(), 1);

    runner.clear().unwrap();
    assert_eq!(runner.cached_kernels(), 0);
    assert_eq!(backend.stats().programs_released, 2);
}

#[test]
fn test_rebuild_after_eviction() {
    let backend = buffer_runtime();
    let (a, _b) = open_two(&backend);
    let x = a.allocate_buffer(64, None).unwrap();
    let y = a.allocate_buffer(64, None).unwrap();
    let source = ProgramSource::text(builtin::SCALE_KERNEL_SOURCE);

    let mut runner = KernelRunner::new(Arc::clone(&a), CacheMode::Cached, "");
    runner
        .dispatch(&source, builtin::SCALE_TO_REMOTE, &[&x as &dyn DeviceMemory, &y], 16)
        .unwrap();
    runner.evict(&source, builtin::SCALE_TO_REMOTE).unwrap();
    runner
        .dispatch(&source, builtin::SCALE_TO_REMOTE, &[&x as &dyn DeviceMemory, &y], 16)
        .unwrap();
    assert_eq!(backend.stats().programs_built, 2);
}
