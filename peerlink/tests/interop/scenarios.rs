use super::helpers::{buffer_runtime, quick_config, runtime_pair};
use peerlink::p2p::{self, Scenario};
use peerlink::{HostBackend, PeerlinkConfig, PeerlinkError, ProgramSource};
use std::sync::Arc;

#[test]
fn test_ocl_p2p_512_passes() {
    let backend = buffer_runtime();
    let report = p2p::ocl_p2p(&backend, &quick_config(), 512).unwrap();
    assert_eq!(report.scenario, Scenario::OclP2p);
    assert!(report.passed());
    assert_eq!(report.checks.len(), 1);
    assert_eq!(report.checks[0].verification.to_string(), "Pass (100%)");
    assert_eq!(report.transfers.len(), 2);
    assert_eq!(backend.stats().programs_built, 1);
    assert_eq!(backend.stats().imports_released, 2);
    assert_eq!(backend.live_allocations(), 0);
}

#[test]
fn test_ocl_p2p_copy_passes() {
    let backend = buffer_runtime();
    let report = p2p::ocl_p2p_copy(&backend, &quick_config(), 1024).unwrap();
    assert!(report.passed());
    assert_eq!(report.checks.len(), 2);
    // Remote write + remote read per iteration.
    assert_eq!(report.transfers.len(), 4);
    assert_eq!(backend.stats().copies, 4);
}

#[test]
fn test_remote_read_passes() {
    let backend = buffer_runtime();
    let report = p2p::remote_read(&backend, &quick_config(), 300).unwrap();
    assert!(report.passed());
}

#[test]
fn test_accumulate_passes() {
    let backend = buffer_runtime();
    let report = p2p::accumulate(&backend, &quick_config(), 2048).unwrap();
    assert!(report.passed());
    let dst = &report.previews.last().unwrap().values;
    assert_eq!(dst[..3], [7, 9, 11]);
}

#[test]
fn test_simple_interop_passes() {
    let (buffers, pointers) = runtime_pair();
    let report = p2p::simple_interop(&buffers, &pointers, &quick_config(), 512).unwrap();
    assert!(report.passed());
    assert_eq!(pointers.stats().imports, 1);
    assert_eq!(pointers.stats().imports_released, 1);
}

#[test]
fn test_interop_p2p_passes_with_text_kernel() {
    let (buffers, pointers) = runtime_pair();
    let config = quick_config();
    let source = p2p::remote_write_source(&config).unwrap();
    let report = p2p::interop_p2p(&buffers, &pointers, &config, 512, &source).unwrap();
    assert!(report.passed());
    assert_eq!(report.transfers[0].label, "local_write_to_remote");
    assert_eq!(pointers.stats().programs_built, 1);
    assert_eq!(pointers.stats().programs_released, 1);
    assert_eq!(buffers.live_allocations(), 0);
}

#[test]
fn test_interop_p2p_wrong_factor_reports_mismatch() {
    let (buffers, pointers) = runtime_pair();
    let config = PeerlinkConfig {
        expect_factor: 1,
        ..quick_config()
    };
    let source = p2p::remote_write_source(&config).unwrap();
    let report = p2p::interop_p2p(&buffers, &pointers, &config, 64, &source).unwrap();
    assert!(!report.passed());
    let verification = report.checks[0].verification;
    // Only the zero element survives ×5 unchanged.
    assert_eq!(verification.mismatched, 63);
    let err = verification.into_result().unwrap_err();
    assert!(!err.is_fatal());
}

#[test]
fn test_pointer_runtime_rejects_spirv_on_host() {
    let (buffers, pointers) = runtime_pair();
    let source = ProgramSource::SpirV(vec![0x07, 0x23, 0x02, 0x03]);
    let err = p2p::interop_p2p(&buffers, &pointers, &quick_config(), 64, &source).unwrap_err();
    assert!(matches!(err, PeerlinkError::Build { .. }));
}

#[test]
fn test_peer_index_out_of_range() {
    let backend = Arc::new(HostBackend::new(1));
    let err = p2p::ocl_p2p(&backend, &quick_config(), 64).unwrap_err();
    assert!(matches!(
        err,
        PeerlinkError::DeviceIndexOutOfRange { index: 1, count: 1 }
    ));
}
