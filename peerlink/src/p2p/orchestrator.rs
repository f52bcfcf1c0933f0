//! End-to-end P2P scenarios.
//!
//! Every scenario opens its own contexts, allocates and fills source
//! buffers, moves data across an export/import boundary and compares the
//! readback with the expected transform. Results (previews, transfer stats,
//! verifications) come back in a [`ScenarioReport`]; printing is left to the
//! caller.

use std::sync::Arc;

use crate::config::PeerlinkConfig;
use crate::context::DeviceContext;
use crate::device::Backend;
use crate::error::Result;
use crate::kernel::{CacheMode, KernelRunner, ProgramSource, TransferStats, builtin};
use crate::memory::DeviceMemory;
use crate::p2p::verify::{Expected, Verification, compare};
use crate::types::{ELEMENT_SIZE, PATTERN_PERIOD, fill_pattern};

/// Scenario names accepted by [`Scenario::from_str`](std::str::FromStr).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scenario {
    /// Buffer-runtime buffers on both GPUs, remote write issued by the
    /// pointer runtime on GPU0.
    #[default]
    InteropP2p,
    /// Export from the buffer runtime, import into the pointer runtime.
    SimpleInterop,
    /// GPU0 writes into GPU1's buffer with `write_to_remote`.
    OclP2p,
    /// GPU0 copies into and back out of GPU1's buffer.
    OclP2pCopy,
    /// GPU0 pulls GPU1's buffer with `read_from_remote`.
    RemoteRead,
    /// GPU0 sums two unified allocations of GPU1.
    Accumulate,
    /// Both directions at once, one blocking task per direction.
    OclP2pParallel,
    /// Both directions, one after the other.
    OclP2pSequential,
}

impl Scenario {
    pub const ALL: [Scenario; 8] = [
        Scenario::InteropP2p,
        Scenario::SimpleInterop,
        Scenario::OclP2p,
        Scenario::OclP2pCopy,
        Scenario::RemoteRead,
        Scenario::Accumulate,
        Scenario::OclP2pParallel,
        Scenario::OclP2pSequential,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::InteropP2p => "interop-p2p",
            Scenario::SimpleInterop => "simple-interop",
            Scenario::OclP2p => "ocl-p2p",
            Scenario::OclP2pCopy => "ocl-p2p-copy",
            Scenario::RemoteRead => "remote-read",
            Scenario::Accumulate => "accumulate",
            Scenario::OclP2pParallel => "ocl-p2p-parallel",
            Scenario::OclP2pSequential => "ocl-p2p-sequential",
        }
    }

    /// Whether the scenario drives the pointer runtime as well.
    pub fn uses_pointer_runtime(self) -> bool {
        matches!(self, Scenario::InteropP2p | Scenario::SimpleInterop)
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scenario `{0}`")]
pub struct ParseScenarioError(pub String);

impl std::str::FromStr for Scenario {
    type Err = ParseScenarioError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == s)
            .ok_or_else(|| ParseScenarioError(s.to_string()))
    }
}

/// First elements of a region at some point of a scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub label: String,
    pub values: Vec<u32>,
}

/// One timed dispatch or copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub label: String,
    pub stats: TransferStats,
}

/// One readback comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub label: String,
    pub verification: Verification,
}

/// Everything a scenario observed.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub elem_count: usize,
    pub previews: Vec<Preview>,
    pub transfers: Vec<Transfer>,
    pub checks: Vec<Check>,
}

impl ScenarioReport {
    pub(crate) fn new(scenario: Scenario, elem_count: usize) -> Self {
        Self {
            scenario,
            elem_count,
            previews: Vec::new(),
            transfers: Vec::new(),
            checks: Vec::new(),
        }
    }

    /// True when every check passed.
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.verification.passed())
    }

    pub(crate) fn preview(&mut self, label: impl Into<String>, values: Vec<u32>) {
        self.previews.push(Preview {
            label: label.into(),
            values,
        });
    }

    pub(crate) fn transfer(&mut self, label: impl Into<String>, stats: TransferStats) {
        self.transfers.push(Transfer {
            label: label.into(),
            stats,
        });
    }

    pub(crate) fn check(&mut self, label: impl Into<String>, verification: Verification) {
        let label = label.into();
        if verification.passed() {
            tracing::info!(scenario = %self.scenario, check = %label, "verification passed");
        } else {
            tracing::warn!(
                scenario = %self.scenario,
                check = %label,
                mismatched = verification.mismatched,
                total = verification.total,
                "verification failed"
            );
        }
        self.checks.push(Check {
            label,
            verification,
        });
    }
}

/// Program holding the pointer-runtime remote-write kernel: the configured
/// SPIR-V module, or its OpenCL C rendition when none is configured.
pub fn remote_write_source(config: &PeerlinkConfig) -> Result<ProgramSource> {
    match &config.spirv_path {
        Some(path) => ProgramSource::spirv_file(path),
        None => Ok(ProgramSource::text(builtin::LOCAL_WRITE_KERNEL_SOURCE)),
    }
}

fn open_pair<B: Backend>(
    backend: &Arc<B>,
    config: &PeerlinkConfig,
) -> Result<(Arc<DeviceContext<B>>, Arc<DeviceContext<B>>)> {
    let local = DeviceContext::init_with(Arc::clone(backend), config.local_device, config)?;
    let peer = DeviceContext::init_with(Arc::clone(backend), config.peer_device, config)?;
    Ok((local, peer))
}

/// Remote write issued by the pointer runtime between two buffer-runtime
/// buffers.
///
/// Buffers with the fill pattern live on the local and the peer GPU. The
/// pointer-runtime context of the local GPU imports both and runs
/// `remote` (entry `config.remote_entry`) with operands `(peer view,
/// local view)`. The peer buffer must then hold `pattern * expect_factor`.
pub fn interop_p2p<A: Backend, Z: Backend>(
    buffers: &Arc<A>,
    pointers: &Arc<Z>,
    config: &PeerlinkConfig,
    elem_count: usize,
    remote: &ProgramSource,
) -> Result<ScenarioReport> {
    let mut report = ScenarioReport::new(Scenario::InteropP2p, elem_count);
    let size = elem_count * ELEMENT_SIZE;
    let init = fill_pattern(elem_count, 0);

    let (a0, a1) = open_pair(buffers, config)?;
    let (z0, z1) = open_pair(pointers, config)?;

    let buf0 = a0.allocate_buffer(size, Some(&init))?;
    let buf1 = a1.allocate_buffer(size, Some(&init))?;
    report.preview("buf0 on gpu0", buf0.preview(config.preview_len)?);
    report.preview("buf1 on gpu1", buf1.preview(config.preview_len)?);

    let h0 = buf0.derive_handle()?;
    let h1 = buf1.derive_handle()?;

    let local_view = z0.import_from_handle(h0, size)?;
    let peer_view = z0.import_from_handle(h1, size)?;
    let own_view = z1.import_from_handle(h1, size)?;
    report.preview("buf0 seen by pointer runtime", local_view.read(config.preview_len.min(elem_count), 0)?);
    report.preview("buf1 seen by pointer runtime", own_view.read(config.preview_len.min(elem_count), 0)?);
    own_view.release()?;

    let mut runner = KernelRunner::new(Arc::clone(&z0), CacheMode::SingleShot, config.ze_build_flags.clone());
    let stats = runner.dispatch(
        remote,
        &config.remote_entry,
        &[&peer_view as &dyn DeviceMemory, &local_view],
        elem_count,
    )?;
    report.transfer(config.remote_entry.clone(), stats);

    peer_view.release()?;
    local_view.release()?;

    report.preview("buf0 on gpu0 after remote write", buf0.preview(config.preview_len)?);
    report.preview("buf1 on gpu1 after remote write", buf1.preview(config.preview_len)?);
    report.check(
        "buf1 on gpu1",
        compare(
            &buf1.read_all()?,
            Expected::Scaled {
                src: &init,
                factor: config.expect_factor,
            },
        ),
    );

    buf0.free()?;
    buf1.free()?;
    Ok(report)
}

/// Export a buffer-runtime buffer and read it back through the pointer
/// runtime on the same GPU.
pub fn simple_interop<A: Backend, Z: Backend>(
    buffers: &Arc<A>,
    pointers: &Arc<Z>,
    config: &PeerlinkConfig,
    elem_count: usize,
) -> Result<ScenarioReport> {
    let mut report = ScenarioReport::new(Scenario::SimpleInterop, elem_count);
    let size = elem_count * ELEMENT_SIZE;
    let init = fill_pattern(elem_count, 0);

    let a = DeviceContext::init_with(Arc::clone(buffers), config.local_device, config)?;
    let z = DeviceContext::init_with(Arc::clone(pointers), config.local_device, config)?;

    let buf = a.allocate_buffer(size, Some(&init))?;
    report.preview("buffer", buf.preview(config.preview_len)?);
    let handle = buf.derive_handle()?;

    let view = z.import_from_handle(handle, size)?;
    let readback = view.read(elem_count, 0)?;
    report.preview("imported view", readback.iter().copied().take(config.preview_len).collect());
    report.check("imported view", compare(&readback, Expected::identity(&init)));
    view.release()?;

    buf.free()?;
    Ok(report)
}

/// The local GPU repeatedly imports the peer's buffer and writes into it
/// with `write_to_remote`.
pub fn ocl_p2p<A: Backend>(
    buffers: &Arc<A>,
    config: &PeerlinkConfig,
    elem_count: usize,
) -> Result<ScenarioReport> {
    let mut report = ScenarioReport::new(Scenario::OclP2p, elem_count);
    let size = elem_count * ELEMENT_SIZE;
    let init = fill_pattern(elem_count, 0);
    let source = ProgramSource::text(builtin::WRITE_KERNEL_SOURCE);

    let (a0, a1) = open_pair(buffers, config)?;
    let src = a0.allocate_buffer(size, Some(&init))?;
    let dst = a1.allocate_buffer(size, Some(&vec![0; elem_count]))?;
    report.preview("src on gpu0", src.preview(config.preview_len)?);
    report.preview("dst on gpu1", dst.preview(config.preview_len)?);

    let mut runner = KernelRunner::new(
        Arc::clone(&a0),
        CacheMode::Cached,
        config.large_buffer_build_options.clone(),
    );
    for i in 0..config.iterations {
        let handle = dst.derive_handle()?;
        let view = a0.import_from_handle(handle, size)?;
        let stats = runner.dispatch(&source, builtin::WRITE_TO_REMOTE, &[&src as &dyn DeviceMemory, &view], elem_count)?;
        report.transfer(format!("write_to_remote #{i}"), stats);
        report.preview(format!("dst seen by gpu0 #{i}"), view.read(config.preview_len.min(elem_count), 0)?);
        view.release()?;
    }

    report.check("dst on gpu1", compare(&dst.read_all()?, Expected::identity(&init)));
    Ok(report)
}

/// Remote write then remote read with explicit copies through an import.
pub fn ocl_p2p_copy<A: Backend>(
    buffers: &Arc<A>,
    config: &PeerlinkConfig,
    elem_count: usize,
) -> Result<ScenarioReport> {
    let mut report = ScenarioReport::new(Scenario::OclP2pCopy, elem_count);
    let size = elem_count * ELEMENT_SIZE;
    let init: Vec<u32> = (0..elem_count)
        .map(|i| ((i * 3) % PATTERN_PERIOD) as u32)
        .collect();

    let (a0, a1) = open_pair(buffers, config)?;
    let local = a0.allocate_buffer(size, Some(&init))?;
    let remote = a1.allocate_buffer(size, Some(&vec![0; elem_count]))?;
    report.preview("local on gpu0", local.preview(config.preview_len)?);
    report.preview("remote on gpu1", remote.preview(config.preview_len)?);

    let runner = KernelRunner::new(Arc::clone(&a0), CacheMode::Cached, config.large_buffer_build_options.clone());
    for i in 0..config.iterations {
        let view = a0.import_from_handle(remote.derive_handle()?, size)?;
        let write = runner.copy(&local, &view, size)?;
        report.transfer(format!("remote write #{i}"), write);
        let read = runner.copy(&view, &local, size)?;
        report.transfer(format!("remote read #{i}"), read);
        report.preview(format!("remote seen by gpu0 #{i}"), view.read(config.preview_len.min(elem_count), 0)?);
        view.release()?;
    }

    report.check("remote on gpu1", compare(&remote.read_all()?, Expected::identity(&init)));
    report.check("local on gpu0", compare(&local.read_all()?, Expected::identity(&init)));
    Ok(report)
}

/// The local GPU pulls the peer's buffer with `read_from_remote` (×3).
pub fn remote_read<A: Backend>(
    buffers: &Arc<A>,
    config: &PeerlinkConfig,
    elem_count: usize,
) -> Result<ScenarioReport> {
    let mut report = ScenarioReport::new(Scenario::RemoteRead, elem_count);
    let size = elem_count * ELEMENT_SIZE;
    let init = fill_pattern(elem_count, 0);
    let source = ProgramSource::text(builtin::READ_KERNEL_SOURCE);

    let (a0, a1) = open_pair(buffers, config)?;
    let dst = a0.allocate_buffer(size, Some(&vec![0; elem_count]))?;
    let src = a1.allocate_buffer(size, Some(&init))?;
    report.preview("src on gpu1", src.preview(config.preview_len)?);

    let mut runner = KernelRunner::new(Arc::clone(&a0), CacheMode::Cached, config.large_buffer_build_options.clone());
    for i in 0..config.iterations {
        let view = a0.import_from_handle(src.derive_handle()?, size)?;
        let stats = runner.dispatch(&source, builtin::READ_FROM_REMOTE, &[&dst as &dyn DeviceMemory, &view], elem_count)?;
        report.transfer(format!("read_from_remote #{i}"), stats);
        view.release()?;
    }

    report.preview("dst on gpu0", dst.preview(config.preview_len)?);
    report.check(
        "dst on gpu0",
        compare(&dst.read_all()?, Expected::Scaled { src: &init, factor: 3 }),
    );
    Ok(report)
}

/// Two unified allocations on the peer GPU, exported through the
/// unified-memory path and summed by the local GPU.
pub fn accumulate<A: Backend>(
    buffers: &Arc<A>,
    config: &PeerlinkConfig,
    elem_count: usize,
) -> Result<ScenarioReport> {
    let mut report = ScenarioReport::new(Scenario::Accumulate, elem_count);
    let size = elem_count * ELEMENT_SIZE;
    let source = ProgramSource::text(builtin::ACCUMULATE_KERNEL_SOURCE);

    let (a0, a1) = open_pair(buffers, config)?;
    let lhs = a1.allocate_unified(elem_count, 0)?;
    let rhs = a1.allocate_unified(elem_count, 7)?;
    let dst = a0.allocate_buffer(size, Some(&vec![0; elem_count]))?;
    report.preview("lhs on gpu1", lhs.preview(config.preview_len)?);
    report.preview("rhs on gpu1", rhs.preview(config.preview_len)?);

    let lhs_view = a0.import_from_handle(lhs.derive_handle()?, size)?;
    let rhs_view = a0.import_from_handle(rhs.derive_handle()?, size)?;

    let mut runner = KernelRunner::new(Arc::clone(&a0), CacheMode::SingleShot, config.build_options.clone());
    let stats = runner.dispatch(
        &source,
        builtin::ACCUMULATE_REMOTE,
        &[&dst as &dyn DeviceMemory, &lhs_view, &rhs_view],
        elem_count,
    )?;
    report.transfer(builtin::ACCUMULATE_REMOTE, stats);
    lhs_view.release()?;
    rhs_view.release()?;

    let expected_lhs = fill_pattern(elem_count, 0);
    let expected_rhs = fill_pattern(elem_count, 7);
    report.preview("dst on gpu0", dst.preview(config.preview_len)?);
    report.check(
        "dst on gpu0",
        compare(
            &dst.read_all()?,
            Expected::PairwiseSum {
                lhs: &expected_lhs,
                rhs: &expected_rhs,
            },
        ),
    );
    Ok(report)
}
