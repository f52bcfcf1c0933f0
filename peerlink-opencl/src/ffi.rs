//! OpenCL types, constants and entry-point signatures.
//!
//! Only the subset peerlink calls. Entry points are resolved at run time by
//! [`OpenClApi`](crate::loader::OpenClApi), so nothing here links against
//! the ICD loader.

#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_void};

pub type cl_int = i32;
pub type cl_uint = u32;
pub type cl_ulong = u64;
pub type cl_bool = cl_uint;
pub type cl_bitfield = cl_ulong;

pub type cl_device_type = cl_bitfield;
pub type cl_mem_flags = cl_bitfield;
pub type cl_command_queue_properties = cl_bitfield;
pub type cl_mem_properties = cl_ulong;
pub type cl_mem_properties_intel = cl_bitfield;
pub type cl_device_info = cl_uint;
pub type cl_mem_info = cl_uint;
pub type cl_mem_object_type = cl_uint;
pub type cl_mem_info_intel = cl_uint;
pub type cl_program_build_info = cl_uint;
pub type cl_context_properties = isize;

pub type cl_platform_id = *mut c_void;
pub type cl_device_id = *mut c_void;
pub type cl_context = *mut c_void;
pub type cl_command_queue = *mut c_void;
pub type cl_mem = *mut c_void;
pub type cl_program = *mut c_void;
pub type cl_kernel = *mut c_void;
pub type cl_event = *mut c_void;

pub const CL_SUCCESS: cl_int = 0;
pub const CL_TRUE: cl_bool = 1;
pub const CL_FALSE: cl_bool = 0;

pub const CL_DEVICE_TYPE_GPU: cl_device_type = 1 << 2;

pub const CL_DEVICE_GLOBAL_MEM_SIZE: cl_device_info = 0x101F;
pub const CL_DEVICE_NAME: cl_device_info = 0x102B;

pub const CL_MEM_READ_WRITE: cl_mem_flags = 1 << 0;
pub const CL_MEM_ALLOW_UNRESTRICTED_SIZE_INTEL: cl_mem_flags = 1 << 23;

pub const CL_MEM_TYPE: cl_mem_info = 0x1100;
pub const CL_MEM_SIZE: cl_mem_info = 0x1102;

/// dma-buf fd of a buffer or USM allocation (Intel extension query).
pub const CL_MEM_ALLOCATION_HANDLE_INTEL: cl_uint = 0x10050;

/// `cl_khr_external_memory_dma_buf` property key.
pub const CL_EXTERNAL_MEMORY_HANDLE_DMA_BUF_KHR: cl_mem_properties = 0x2067;

pub const CL_PROGRAM_BUILD_LOG: cl_program_build_info = 0x1183;

pub type BuildNotify = Option<unsafe extern "C" fn(cl_program, *mut c_void)>;
pub type ContextNotify = Option<unsafe extern "C" fn(*const c_char, *const c_void, usize, *mut c_void)>;

// ── Core entry points ────────────────────────────────────────────────

pub type clGetPlatformIDs_fn =
    unsafe extern "C" fn(cl_uint, *mut cl_platform_id, *mut cl_uint) -> cl_int;

pub type clGetDeviceIDs_fn = unsafe extern "C" fn(
    cl_platform_id,
    cl_device_type,
    cl_uint,
    *mut cl_device_id,
    *mut cl_uint,
) -> cl_int;

pub type clGetDeviceInfo_fn =
    unsafe extern "C" fn(cl_device_id, cl_device_info, usize, *mut c_void, *mut usize) -> cl_int;

pub type clCreateContext_fn = unsafe extern "C" fn(
    *const cl_context_properties,
    cl_uint,
    *const cl_device_id,
    ContextNotify,
    *mut c_void,
    *mut cl_int,
) -> cl_context;

pub type clCreateCommandQueue_fn = unsafe extern "C" fn(
    cl_context,
    cl_device_id,
    cl_command_queue_properties,
    *mut cl_int,
) -> cl_command_queue;

pub type clReleaseCommandQueue_fn = unsafe extern "C" fn(cl_command_queue) -> cl_int;
pub type clReleaseContext_fn = unsafe extern "C" fn(cl_context) -> cl_int;
pub type clReleaseMemObject_fn = unsafe extern "C" fn(cl_mem) -> cl_int;
pub type clReleaseKernel_fn = unsafe extern "C" fn(cl_kernel) -> cl_int;
pub type clReleaseProgram_fn = unsafe extern "C" fn(cl_program) -> cl_int;

pub type clCreateBuffer_fn =
    unsafe extern "C" fn(cl_context, cl_mem_flags, usize, *mut c_void, *mut cl_int) -> cl_mem;

pub type clCreateBufferWithProperties_fn = unsafe extern "C" fn(
    cl_context,
    *const cl_mem_properties,
    cl_mem_flags,
    usize,
    *mut c_void,
    *mut cl_int,
) -> cl_mem;

pub type clEnqueueWriteBuffer_fn = unsafe extern "C" fn(
    cl_command_queue,
    cl_mem,
    cl_bool,
    usize,
    usize,
    *const c_void,
    cl_uint,
    *const cl_event,
    *mut cl_event,
) -> cl_int;

pub type clEnqueueReadBuffer_fn = unsafe extern "C" fn(
    cl_command_queue,
    cl_mem,
    cl_bool,
    usize,
    usize,
    *mut c_void,
    cl_uint,
    *const cl_event,
    *mut cl_event,
) -> cl_int;

pub type clEnqueueCopyBuffer_fn = unsafe extern "C" fn(
    cl_command_queue,
    cl_mem,
    cl_mem,
    usize,
    usize,
    usize,
    cl_uint,
    *const cl_event,
    *mut cl_event,
) -> cl_int;

pub type clFinish_fn = unsafe extern "C" fn(cl_command_queue) -> cl_int;

pub type clGetMemObjectInfo_fn =
    unsafe extern "C" fn(cl_mem, cl_mem_info, usize, *mut c_void, *mut usize) -> cl_int;

pub type clCreateProgramWithSource_fn = unsafe extern "C" fn(
    cl_context,
    cl_uint,
    *const *const c_char,
    *const usize,
    *mut cl_int,
) -> cl_program;

pub type clCreateProgramWithIL_fn =
    unsafe extern "C" fn(cl_context, *const c_void, usize, *mut cl_int) -> cl_program;

pub type clBuildProgram_fn = unsafe extern "C" fn(
    cl_program,
    cl_uint,
    *const cl_device_id,
    *const c_char,
    BuildNotify,
    *mut c_void,
) -> cl_int;

pub type clGetProgramBuildInfo_fn = unsafe extern "C" fn(
    cl_program,
    cl_device_id,
    cl_program_build_info,
    usize,
    *mut c_void,
    *mut usize,
) -> cl_int;

pub type clCreateKernel_fn =
    unsafe extern "C" fn(cl_program, *const c_char, *mut cl_int) -> cl_kernel;

pub type clSetKernelArg_fn = unsafe extern "C" fn(cl_kernel, cl_uint, usize, *const c_void) -> cl_int;

pub type clEnqueueNDRangeKernel_fn = unsafe extern "C" fn(
    cl_command_queue,
    cl_kernel,
    cl_uint,
    *const usize,
    *const usize,
    *const usize,
    cl_uint,
    *const cl_event,
    *mut cl_event,
) -> cl_int;

pub type clGetExtensionFunctionAddressForPlatform_fn =
    unsafe extern "C" fn(cl_platform_id, *const c_char) -> *mut c_void;

// ── cl_intel_unified_shared_memory ───────────────────────────────────

pub type clDeviceMemAllocINTEL_fn = unsafe extern "C" fn(
    cl_context,
    cl_device_id,
    *const cl_mem_properties_intel,
    usize,
    cl_uint,
    *mut cl_int,
) -> *mut c_void;

pub type clEnqueueMemcpyINTEL_fn = unsafe extern "C" fn(
    cl_command_queue,
    cl_bool,
    *mut c_void,
    *const c_void,
    usize,
    cl_uint,
    *const cl_event,
    *mut cl_event,
) -> cl_int;

pub type clMemBlockingFreeINTEL_fn = unsafe extern "C" fn(cl_context, *mut c_void) -> cl_int;

pub type clGetMemAllocInfoINTEL_fn = unsafe extern "C" fn(
    cl_context,
    *const c_void,
    cl_mem_info_intel,
    usize,
    *mut c_void,
    *mut usize,
) -> cl_int;

pub type clSetKernelArgMemPointerINTEL_fn =
    unsafe extern "C" fn(cl_kernel, cl_uint, *const c_void) -> cl_int;
