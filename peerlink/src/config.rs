//! Runtime-configurable parameters for peerlink.
//!
//! All values have sensible defaults. Override via environment variables
//! (prefixed `PEERLINK_`) or by constructing a custom `PeerlinkConfig`.

use std::path::PathBuf;

use crate::types::DeviceIndex;

/// Build options, device selection and scenario knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerlinkConfig {
    /// OpenCL build options for single-shot dispatches.
    pub build_options: String,

    /// OpenCL build options for cached runners, which move large buffers.
    pub large_buffer_build_options: String,

    /// Build flags passed to Level Zero module creation.
    pub ze_build_flags: String,

    /// Alignment of unified-memory allocations in bytes.
    pub unified_alignment: usize,

    /// Number of leading elements shown by buffer previews.
    pub preview_len: usize,

    /// Loop count of the single-threaded P2P scenarios.
    pub iterations: usize,

    /// Loop count of each worker in the two-direction scenario.
    pub parallel_iterations: usize,

    /// Device index of the "local" GPU.
    pub local_device: DeviceIndex,

    /// Device index of the "peer" GPU.
    pub peer_device: DeviceIndex,

    /// SPIR-V module with the pointer-runtime remote-write kernel.
    pub spirv_path: Option<PathBuf>,

    /// Entry point of the pointer-runtime remote-write kernel.
    pub remote_entry: String,

    /// Factor the remote-write kernel applies; checked on readback.
    pub expect_factor: u32,
}

impl Default for PeerlinkConfig {
    fn default() -> Self {
        Self {
            build_options: "-cl-std=CL2.0".into(),
            large_buffer_build_options:
                "-cl-std=CL2.0 -cl-intel-greater-than-4GB-buffer-required".into(),
            ze_build_flags: String::new(),
            unified_alignment: 16,
            preview_len: 16,
            iterations: 4,
            parallel_iterations: 2,
            local_device: 0,
            peer_device: 1,
            spirv_path: None,
            remote_entry: "local_write_to_remote".into(),
            expect_factor: 5,
        }
    }
}

impl PeerlinkConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `PEERLINK_BUILD_OPTIONS`
    /// - `PEERLINK_LARGE_BUFFER_BUILD_OPTIONS`
    /// - `PEERLINK_ZE_BUILD_FLAGS`
    /// - `PEERLINK_UNIFIED_ALIGNMENT`
    /// - `PEERLINK_PREVIEW_LEN`
    /// - `PEERLINK_ITERATIONS`
    /// - `PEERLINK_PARALLEL_ITERATIONS`
    /// - `PEERLINK_LOCAL_DEVICE`
    /// - `PEERLINK_PEER_DEVICE`
    /// - `PEERLINK_SPIRV_PATH`
    /// - `PEERLINK_REMOTE_ENTRY`
    /// - `PEERLINK_EXPECT_FACTOR`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(v) = lookup("PEERLINK_BUILD_OPTIONS") {
            cfg.build_options = v;
        }
        if let Some(v) = lookup("PEERLINK_LARGE_BUFFER_BUILD_OPTIONS") {
            cfg.large_buffer_build_options = v;
        }
        if let Some(v) = lookup("PEERLINK_ZE_BUILD_FLAGS") {
            cfg.ze_build_flags = v;
        }
        if let Some(v) = lookup("PEERLINK_UNIFIED_ALIGNMENT") {
            if let Ok(n) = v.parse::<usize>() {
                if n.is_power_of_two() {
                    cfg.unified_alignment = n;
                }
            }
        }
        if let Some(v) = lookup("PEERLINK_PREVIEW_LEN") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.preview_len = n;
            }
        }
        if let Some(v) = lookup("PEERLINK_ITERATIONS") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.iterations = n;
            }
        }
        if let Some(v) = lookup("PEERLINK_PARALLEL_ITERATIONS") {
            if let Ok(n) = v.parse::<usize>() {
                cfg.parallel_iterations = n;
            }
        }
        if let Some(v) = lookup("PEERLINK_LOCAL_DEVICE") {
            if let Ok(n) = v.parse::<DeviceIndex>() {
                cfg.local_device = n;
            }
        }
        if let Some(v) = lookup("PEERLINK_PEER_DEVICE") {
            if let Ok(n) = v.parse::<DeviceIndex>() {
                cfg.peer_device = n;
            }
        }
        if let Some(v) = lookup("PEERLINK_SPIRV_PATH") {
            if !v.trim().is_empty() {
                cfg.spirv_path = Some(PathBuf::from(v.trim()));
            }
        }
        if let Some(v) = lookup("PEERLINK_REMOTE_ENTRY") {
            if !v.trim().is_empty() {
                cfg.remote_entry = v.trim().to_string();
            }
        }
        if let Some(v) = lookup("PEERLINK_EXPECT_FACTOR") {
            if let Ok(n) = v.parse::<u32>() {
                cfg.expect_factor = n;
            }
        }

        cfg
    }
}
