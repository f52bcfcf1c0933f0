//! Cross-device scenarios and readback verification.

mod orchestrator;
mod verify;
mod worker;

pub use orchestrator::{
    Check, ParseScenarioError, Preview, Scenario, ScenarioReport, Transfer, accumulate,
    interop_p2p, ocl_p2p, ocl_p2p_copy, remote_read, remote_write_source, simple_interop,
};
pub use verify::{Expected, Verification, compare, render_preview};
pub use worker::{WorkerMode, p2p_two_way};
