//! `interop <size_kb>`: run one cross-runtime / cross-device scenario and
//! print its previews and verification results.
//!
//! Logging goes through `tracing` to stderr (filter from `PEERLINK_LOG`,
//! default `info`); results go to stdout. A failed verification is reported and
//! the process still exits 0; any other error exits 1.

mod cli;

use std::process::ExitCode;
use std::sync::Arc;

use peerlink::p2p::{self, WorkerMode, render_preview};
use peerlink::{PeerlinkConfig, Result, Scenario, ScenarioReport};
use peerlink_opencl::OpenClBackend;
use peerlink_ze::LevelZeroBackend;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, USAGE};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("PEERLINK_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli, config: &PeerlinkConfig) -> Result<ScenarioReport> {
    let n = cli.elem_count();
    let buffers = Arc::new(OpenClBackend::load()?);

    match cli.scenario {
        Scenario::InteropP2p => {
            let pointers = Arc::new(LevelZeroBackend::load()?);
            let remote = p2p::remote_write_source(config)?;
            p2p::interop_p2p(&buffers, &pointers, config, n, &remote)
        }
        Scenario::SimpleInterop => {
            let pointers = Arc::new(LevelZeroBackend::load()?);
            p2p::simple_interop(&buffers, &pointers, config, n)
        }
        Scenario::OclP2p => p2p::ocl_p2p(&buffers, config, n),
        Scenario::OclP2pCopy => p2p::ocl_p2p_copy(&buffers, config, n),
        Scenario::RemoteRead => p2p::remote_read(&buffers, config, n),
        Scenario::Accumulate => p2p::accumulate(&buffers, config, n),
        Scenario::OclP2pParallel => {
            p2p::p2p_two_way(&buffers, config, n, WorkerMode::Parallel).await
        }
        Scenario::OclP2pSequential => {
            p2p::p2p_two_way(&buffers, config, n, WorkerMode::Sequential).await
        }
    }
}

fn print_report(report: &ScenarioReport) {
    println!("scenario {} over {} elements", report.scenario, report.elem_count);
    for preview in &report.previews {
        println!("{}:", preview.label);
        println!("{}", render_preview(&preview.values));
    }
    for transfer in &report.transfers {
        println!("{}: {}", transfer.label, transfer.stats);
    }
    for check in &report.checks {
        println!("Compare data result: {} ({})", check.verification, check.label);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let Some(cli) = Cli::from_args(std::env::args_os()) else {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    };
    let config = PeerlinkConfig::from_env();
    tracing::info!(scenario = %cli.scenario, size_kb = cli.size_kb, "starting");

    match run(&cli, &config).await {
        Ok(report) => {
            print_report(&report);
            if !report.passed() {
                tracing::warn!(scenario = %report.scenario, "verification failed");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(kind = %e.kind(), "{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
