use crate::types::DeviceIndex;

pub type Result<T> = std::result::Result<T, PeerlinkError>;

/// Failure classes every error maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input or environment: device index, sizes, operands, missing runtime.
    Configuration,
    /// A runtime call returned a non-success status.
    DriverCall,
    /// Kernel program compilation failed.
    Build,
    /// Readback did not match the expected transform.
    VerificationMismatch,
}

impl ErrorKind {
    /// Verification mismatches are reported, everything else aborts the run.
    pub const fn is_fatal(self) -> bool {
        !matches!(self, ErrorKind::VerificationMismatch)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Configuration => f.write_str("configuration error"),
            ErrorKind::DriverCall => f.write_str("driver call error"),
            ErrorKind::Build => f.write_str("build error"),
            ErrorKind::VerificationMismatch => f.write_str("verification mismatch"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PeerlinkError {
    #[error("no GPU device for index {index}: platform exposes {count} GPU device(s)")]
    DeviceIndexOutOfRange { index: DeviceIndex, count: usize },

    #[error("{runtime}: no platform exposes a GPU device")]
    NoGpuDevice { runtime: &'static str },

    #[error("{runtime}: {call} failed with status {status} ({status_name})")]
    DriverCall {
        runtime: &'static str,
        call: &'static str,
        status: i64,
        status_name: &'static str,
    },

    #[error("build of kernel `{entry}` failed with status {status}:\n{log}")]
    Build {
        entry: String,
        status: i64,
        log: String,
    },

    #[error("verification failed: {mismatched}/{total} elements differ")]
    VerificationMismatch { mismatched: usize, total: usize },

    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("import of handle {handle} requested {requested} bytes but the allocation has {actual}")]
    ImportSizeMismatch {
        handle: u64,
        requested: usize,
        actual: usize,
    },

    #[error("invalid kernel operands: {0}")]
    InvalidOperands(String),

    #[error("operand belongs to context {operand_ctx}, runner is bound to context {runner_ctx}")]
    ForeignOperand { operand_ctx: u64, runner_ctx: u64 },

    #[error("device context {0} has already been released")]
    ContextReleased(u64),

    #[error("{runtime}: {operation} is not supported")]
    Unsupported {
        runtime: &'static str,
        operation: &'static str,
    },

    #[error("{runtime} runtime unavailable: {message}")]
    RuntimeUnavailable {
        runtime: &'static str,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker task failed: {0}")]
    TaskJoin(String),
}

impl PeerlinkError {
    /// Create a `DriverCall` error for a failed runtime entry point.
    pub fn driver_call(
        runtime: &'static str,
        call: &'static str,
        status: i64,
        status_name: &'static str,
    ) -> Self {
        Self::DriverCall {
            runtime,
            call,
            status,
            status_name,
        }
    }

    /// Create an `Unsupported` error.
    pub fn unsupported(runtime: &'static str, operation: &'static str) -> Self {
        Self::Unsupported { runtime, operation }
    }

    /// Create a `RuntimeUnavailable` error with just a message.
    pub fn runtime_unavailable(runtime: &'static str, message: impl Into<String>) -> Self {
        Self::RuntimeUnavailable {
            runtime,
            message: message.into(),
            source: None,
        }
    }

    /// Create a `RuntimeUnavailable` error with a message and a source error.
    pub fn runtime_unavailable_with_source(
        runtime: &'static str,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::RuntimeUnavailable {
            runtime,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Taxonomy class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PeerlinkError::DriverCall { .. } => ErrorKind::DriverCall,
            PeerlinkError::Build { .. } => ErrorKind::Build,
            PeerlinkError::VerificationMismatch { .. } => ErrorKind::VerificationMismatch,
            PeerlinkError::DeviceIndexOutOfRange { .. }
            | PeerlinkError::NoGpuDevice { .. }
            | PeerlinkError::SizeMismatch { .. }
            | PeerlinkError::ImportSizeMismatch { .. }
            | PeerlinkError::InvalidOperands(_)
            | PeerlinkError::ForeignOperand { .. }
            | PeerlinkError::ContextReleased(_)
            | PeerlinkError::Unsupported { .. }
            | PeerlinkError::RuntimeUnavailable { .. }
            | PeerlinkError::Io(_)
            | PeerlinkError::TaskJoin(_) => ErrorKind::Configuration,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind().is_fatal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_index_display() {
        let e = PeerlinkError::DeviceIndexOutOfRange { index: 2, count: 2 };
        assert_eq!(
            e.to_string(),
            "no GPU device for index 2: platform exposes 2 GPU device(s)"
        );
        assert_eq!(e.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_driver_call_display() {
        let e = PeerlinkError::driver_call("opencl", "clCreateBuffer", -61, "CL_INVALID_BUFFER_SIZE");
        assert_eq!(
            e.to_string(),
            "opencl: clCreateBuffer failed with status -61 (CL_INVALID_BUFFER_SIZE)"
        );
        assert_eq!(e.kind(), ErrorKind::DriverCall);
    }

    #[test]
    fn test_build_error_carries_log() {
        let e = PeerlinkError::Build {
            entry: "write_to_remote".into(),
            status: -11,
            log: "error: use of undeclared identifier 'idx'".into(),
        };
        assert!(e.to_string().contains("undeclared identifier"));
        assert_eq!(e.kind(), ErrorKind::Build);
    }

    #[test]
    fn test_only_verification_is_non_fatal() {
        let mismatch = PeerlinkError::VerificationMismatch {
            mismatched: 3,
            total: 512,
        };
        assert!(!mismatch.is_fatal());
        assert!(PeerlinkError::ContextReleased(1).is_fatal());
        assert!(PeerlinkError::unsupported("ze", "buffer allocation").is_fatal());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "kernel.spv");
        let e: PeerlinkError = io_err.into();
        assert!(e.to_string().contains("kernel.spv"));
        assert_eq!(e.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_runtime_unavailable_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "libOpenCL.so.1");
        let e = PeerlinkError::runtime_unavailable_with_source("opencl", "load failed", io_err);
        assert!(std::error::Error::source(&e).is_some());
        assert_eq!(e.to_string(), "opencl runtime unavailable: load failed");
    }

    #[test]
    fn test_all_variants_display() {
        let errors: Vec<PeerlinkError> = vec![
            PeerlinkError::DeviceIndexOutOfRange { index: 1, count: 1 },
            PeerlinkError::NoGpuDevice { runtime: "host" },
            PeerlinkError::driver_call("ze", "zeMemAllocDevice", 0x7000_0002, "ZE_RESULT_ERROR_OUT_OF_DEVICE_MEMORY"),
            PeerlinkError::Build {
                entry: "k".into(),
                status: -11,
                log: String::new(),
            },
            PeerlinkError::VerificationMismatch {
                mismatched: 1,
                total: 2,
            },
            PeerlinkError::SizeMismatch {
                expected: 8,
                actual: 4,
            },
            PeerlinkError::ImportSizeMismatch {
                handle: 7,
                requested: 64,
                actual: 32,
            },
            PeerlinkError::InvalidOperands("one operand".into()),
            PeerlinkError::ForeignOperand {
                operand_ctx: 1,
                runner_ctx: 2,
            },
            PeerlinkError::ContextReleased(3),
            PeerlinkError::unsupported("ze", "buffer allocation"),
            PeerlinkError::runtime_unavailable("opencl", "not found"),
            PeerlinkError::TaskJoin("panicked".into()),
        ];
        for e in &errors {
            assert!(!e.to_string().is_empty(), "empty display for {e:?}");
        }
    }
}
