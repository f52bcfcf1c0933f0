//! Run-time loading of the OpenCL ICD loader.

use std::ffi::OsStr;

use libloading::{Library, Symbol};
use peerlink::{PeerlinkError, Result};

use crate::RUNTIME;
use crate::ffi::*;

/// Library opened when `PEERLINK_OPENCL_LIB` is unset.
pub const DEFAULT_LIBRARY: &str = "libOpenCL.so.1";

/// Environment variable overriding the library path.
pub const LIBRARY_ENV: &str = "PEERLINK_OPENCL_LIB";

/// Resolve `name` from `lib` as a value of type `T` (a function pointer).
///
/// # Safety
/// `T` must match the symbol's real signature.
pub(crate) unsafe fn symbol<T: Copy>(lib: &Library, name: &'static str) -> Result<T> {
    let mut bytes = Vec::with_capacity(name.len() + 1);
    bytes.extend_from_slice(name.as_bytes());
    bytes.push(0);
    let sym: Symbol<'_, T> = unsafe { lib.get(&bytes) }.map_err(|e| {
        PeerlinkError::runtime_unavailable_with_source(RUNTIME, format!("missing symbol {name}"), e)
    })?;
    Ok(*sym)
}

/// Core OpenCL entry points, resolved once per process.
pub struct OpenClApi {
    pub(crate) get_platform_ids: clGetPlatformIDs_fn,
    pub(crate) get_device_ids: clGetDeviceIDs_fn,
    pub(crate) get_device_info: clGetDeviceInfo_fn,
    pub(crate) create_context: clCreateContext_fn,
    pub(crate) create_command_queue: clCreateCommandQueue_fn,
    pub(crate) release_command_queue: clReleaseCommandQueue_fn,
    pub(crate) release_context: clReleaseContext_fn,
    pub(crate) release_mem_object: clReleaseMemObject_fn,
    pub(crate) release_kernel: clReleaseKernel_fn,
    pub(crate) release_program: clReleaseProgram_fn,
    pub(crate) create_buffer: clCreateBuffer_fn,
    pub(crate) create_buffer_with_properties: clCreateBufferWithProperties_fn,
    pub(crate) enqueue_write_buffer: clEnqueueWriteBuffer_fn,
    pub(crate) enqueue_read_buffer: clEnqueueReadBuffer_fn,
    pub(crate) enqueue_copy_buffer: clEnqueueCopyBuffer_fn,
    pub(crate) finish: clFinish_fn,
    pub(crate) get_mem_object_info: clGetMemObjectInfo_fn,
    pub(crate) create_program_with_source: clCreateProgramWithSource_fn,
    /// OpenCL 2.1; absent on older loaders.
    pub(crate) create_program_with_il: Option<clCreateProgramWithIL_fn>,
    pub(crate) build_program: clBuildProgram_fn,
    pub(crate) get_program_build_info: clGetProgramBuildInfo_fn,
    pub(crate) create_kernel: clCreateKernel_fn,
    pub(crate) set_kernel_arg: clSetKernelArg_fn,
    pub(crate) enqueue_nd_range_kernel: clEnqueueNDRangeKernel_fn,
    pub(crate) get_extension_function_address_for_platform:
        clGetExtensionFunctionAddressForPlatform_fn,
    _lib: Library,
}

impl OpenClApi {
    /// Open the library named by `PEERLINK_OPENCL_LIB`, or the default.
    pub fn load() -> Result<Self> {
        match std::env::var_os(LIBRARY_ENV) {
            Some(path) if !path.is_empty() => Self::load_from(path),
            _ => Self::load_from(DEFAULT_LIBRARY),
        }
    }

    /// Open the OpenCL library at `path` and resolve every entry point.
    pub fn load_from(path: impl AsRef<OsStr>) -> Result<Self> {
        let path = path.as_ref();
        let lib = unsafe { Library::new(path) }.map_err(|e| {
            PeerlinkError::runtime_unavailable_with_source(
                RUNTIME,
                format!("cannot open {}", path.to_string_lossy()),
                e,
            )
        })?;

        unsafe {
            Ok(Self {
                get_platform_ids: symbol(&lib, "clGetPlatformIDs")?,
                get_device_ids: symbol(&lib, "clGetDeviceIDs")?,
                get_device_info: symbol(&lib, "clGetDeviceInfo")?,
                create_context: symbol(&lib, "clCreateContext")?,
                create_command_queue: symbol(&lib, "clCreateCommandQueue")?,
                release_command_queue: symbol(&lib, "clReleaseCommandQueue")?,
                release_context: symbol(&lib, "clReleaseContext")?,
                release_mem_object: symbol(&lib, "clReleaseMemObject")?,
                release_kernel: symbol(&lib, "clReleaseKernel")?,
                release_program: symbol(&lib, "clReleaseProgram")?,
                create_buffer: symbol(&lib, "clCreateBuffer")?,
                create_buffer_with_properties: symbol(&lib, "clCreateBufferWithProperties")?,
                enqueue_write_buffer: symbol(&lib, "clEnqueueWriteBuffer")?,
                enqueue_read_buffer: symbol(&lib, "clEnqueueReadBuffer")?,
                enqueue_copy_buffer: symbol(&lib, "clEnqueueCopyBuffer")?,
                finish: symbol(&lib, "clFinish")?,
                get_mem_object_info: symbol(&lib, "clGetMemObjectInfo")?,
                create_program_with_source: symbol(&lib, "clCreateProgramWithSource")?,
                create_program_with_il: symbol(&lib, "clCreateProgramWithIL").ok(),
                build_program: symbol(&lib, "clBuildProgram")?,
                get_program_build_info: symbol(&lib, "clGetProgramBuildInfo")?,
                create_kernel: symbol(&lib, "clCreateKernel")?,
                set_kernel_arg: symbol(&lib, "clSetKernelArg")?,
                enqueue_nd_range_kernel: symbol(&lib, "clEnqueueNDRangeKernel")?,
                get_extension_function_address_for_platform: symbol(
                    &lib,
                    "clGetExtensionFunctionAddressForPlatform",
                )?,
                _lib: lib,
            })
        }
    }
}

impl std::fmt::Debug for OpenClApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenClApi")
            .field("il_programs", &self.create_program_with_il.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library_is_runtime_unavailable() {
        let err = OpenClApi::load_from("/nonexistent/libOpenCL.so.404").unwrap_err();
        assert!(matches!(
            err,
            PeerlinkError::RuntimeUnavailable {
                runtime: "opencl",
                ..
            }
        ));
        assert!(err.to_string().contains("libOpenCL.so.404"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
