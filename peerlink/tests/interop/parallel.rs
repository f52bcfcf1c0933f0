use super::helpers::{buffer_runtime, quick_config};
use peerlink::p2p::{self, Scenario, WorkerMode};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_way_parallel_no_mismatch() {
    let backend = buffer_runtime();
    let report = p2p::p2p_two_way(&backend, &quick_config(), 4096, WorkerMode::Parallel)
        .await
        .unwrap();
    assert_eq!(report.scenario, Scenario::OclP2pParallel);
    assert_eq!(report.checks.len(), 2);
    for check in &report.checks {
        assert_eq!(check.verification.mismatched, 0, "{}", check.label);
    }
    // Two workers × two iterations.
    assert_eq!(report.transfers.len(), 4);
    assert_eq!(backend.stats().imports, 4);
    assert_eq!(backend.stats().imports_released, 4);
}

#[tokio::test]
async fn test_two_way_sequential_no_mismatch() {
    let backend = buffer_runtime();
    let report = p2p::p2p_two_way(&backend, &quick_config(), 1000, WorkerMode::Sequential)
        .await
        .unwrap();
    assert_eq!(report.scenario, Scenario::OclP2pSequential);
    assert!(report.passed());
    assert_eq!(report.checks[0].label, "gpu0->gpu1");
    assert_eq!(report.checks[1].label, "gpu1->gpu0");
}

#[tokio::test]
async fn test_two_way_every_resource_released() {
    let backend = buffer_runtime();
    p2p::p2p_two_way(&backend, &quick_config(), 256, WorkerMode::Parallel)
        .await
        .unwrap();
    let stats = backend.stats();
    assert_eq!(backend.live_allocations(), 0);
    assert_eq!(stats.contexts_created, stats.contexts_destroyed);
    assert_eq!(stats.kernels_created, stats.kernels_released);
}
