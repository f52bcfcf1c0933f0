//! Two-direction P2P: one worker per GPU, each writing into the other.

use std::sync::Arc;

use futures::future::try_join_all;

use crate::config::PeerlinkConfig;
use crate::context::DeviceContext;
use crate::device::Backend;
use crate::error::{PeerlinkError, Result};
use crate::kernel::{CacheMode, KernelRunner, ProgramSource, TransferStats, builtin};
use crate::memory::{DeviceMemory, MemoryRegion};
use crate::p2p::orchestrator::{Scenario, ScenarioReport};
use crate::p2p::verify::{Expected, compare};
use crate::types::{ELEMENT_SIZE, NativeHandle, fill_pattern};

/// How the two workers are run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMode {
    /// Each worker on its own blocking task; both joined before verifying.
    Parallel,
    /// Workers run inline, one after the other.
    Sequential,
}

impl WorkerMode {
    fn scenario(self) -> Scenario {
        match self {
            WorkerMode::Parallel => Scenario::OclP2pParallel,
            WorkerMode::Sequential => Scenario::OclP2pSequential,
        }
    }
}

/// State owned by one direction. Only the remote handle crosses over from
/// the other side.
struct Worker<B: Backend> {
    label: String,
    ctx: Arc<DeviceContext<B>>,
    src: MemoryRegion<B>,
    remote: NativeHandle,
    elem_count: usize,
    iterations: usize,
    build_options: String,
}

struct WorkerOutcome<B: Backend> {
    label: String,
    src: MemoryRegion<B>,
    transfers: Vec<(String, TransferStats)>,
}

impl<B: Backend> Worker<B> {
    fn run(self) -> Result<WorkerOutcome<B>> {
        let source = ProgramSource::text(builtin::SCALE_KERNEL_SOURCE);
        let size = self.elem_count * ELEMENT_SIZE;
        let mut runner = KernelRunner::new(Arc::clone(&self.ctx), CacheMode::Cached, self.build_options);
        let mut transfers = Vec::with_capacity(self.iterations);

        for i in 0..self.iterations {
            let view = self.ctx.import_from_handle(self.remote, size)?;
            let stats = runner.dispatch(
                &source,
                builtin::SCALE_TO_REMOTE,
                &[&self.src as &dyn DeviceMemory, &view],
                self.elem_count,
            )?;
            view.release()?;
            transfers.push((format!("{} #{i}", self.label), stats));
        }
        tracing::debug!(worker = %self.label, iterations = self.iterations, "worker done");

        Ok(WorkerOutcome {
            label: self.label,
            src: self.src,
            transfers,
        })
    }
}

/// Four buffers, two per GPU. GPU0 scales its first buffer into GPU1's
/// first, GPU1 scales its second buffer into GPU0's second. Each
/// destination must hold five times its worker's source.
pub async fn p2p_two_way<B: Backend>(
    backend: &Arc<B>,
    config: &PeerlinkConfig,
    elem_count: usize,
    mode: WorkerMode,
) -> Result<ScenarioReport> {
    let mut report = ScenarioReport::new(mode.scenario(), elem_count);
    let size = elem_count * ELEMENT_SIZE;
    let init = fill_pattern(elem_count, 0);

    let ctx0 = DeviceContext::init_with(Arc::clone(backend), config.local_device, config)?;
    let ctx1 = DeviceContext::init_with(Arc::clone(backend), config.peer_device, config)?;

    let buf00 = ctx0.allocate_buffer(size, Some(&init))?;
    let buf01 = ctx0.allocate_buffer(size, Some(&init))?;
    let buf10 = ctx1.allocate_buffer(size, Some(&init))?;
    let buf11 = ctx1.allocate_buffer(size, Some(&init))?;

    let h10 = buf10.derive_handle()?;
    let h01 = buf01.derive_handle()?;

    let workers = vec![
        Worker {
            label: "gpu0->gpu1".into(),
            ctx: Arc::clone(&ctx0),
            src: buf00,
            remote: h10,
            elem_count,
            iterations: config.parallel_iterations,
            build_options: config.large_buffer_build_options.clone(),
        },
        Worker {
            label: "gpu1->gpu0".into(),
            ctx: Arc::clone(&ctx1),
            src: buf11,
            remote: h01,
            elem_count,
            iterations: config.parallel_iterations,
            build_options: config.large_buffer_build_options.clone(),
        },
    ];

    let outcomes = match mode {
        WorkerMode::Parallel => {
            let tasks = workers
                .into_iter()
                .map(|worker| tokio::task::spawn_blocking(move || worker.run()));
            try_join_all(tasks)
                .await
                .map_err(|e| PeerlinkError::TaskJoin(e.to_string()))?
                .into_iter()
                .collect::<Result<Vec<_>>>()?
        }
        WorkerMode::Sequential => workers
            .into_iter()
            .map(Worker::run)
            .collect::<Result<Vec<_>>>()?,
    };

    // Outcomes keep worker order: [gpu0->gpu1, gpu1->gpu0].
    let destinations = [&buf10, &buf01];
    for (outcome, dst) in outcomes.iter().zip(destinations) {
        for (label, stats) in &outcome.transfers {
            report.transfer(label.clone(), *stats);
        }
        let src = outcome.src.read_all()?;
        report.preview(format!("{} destination", outcome.label), dst.preview(config.preview_len)?);
        report.check(
            outcome.label.clone(),
            compare(&dst.read_all()?, Expected::Scaled { src: &src, factor: 5 }),
        );
    }
    Ok(report)
}
