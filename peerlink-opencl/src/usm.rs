//! `cl_intel_unified_shared_memory` entry points.
//!
//! Extension functions are per platform and come from
//! `clGetExtensionFunctionAddressForPlatform`, not from the library's
//! export table.

use std::ffi::CStr;
use std::os::raw::c_void;

use crate::ffi::*;
use crate::loader::OpenClApi;

#[derive(Debug, Clone, Copy)]
pub(crate) struct UsmApi {
    pub(crate) device_mem_alloc: clDeviceMemAllocINTEL_fn,
    pub(crate) enqueue_memcpy: clEnqueueMemcpyINTEL_fn,
    pub(crate) mem_blocking_free: clMemBlockingFreeINTEL_fn,
    pub(crate) get_mem_alloc_info: clGetMemAllocInfoINTEL_fn,
    pub(crate) set_kernel_arg_mem_pointer: clSetKernelArgMemPointerINTEL_fn,
}

/// Look up `name` on `platform`; null when the platform lacks it.
unsafe fn extension(api: &OpenClApi, platform: cl_platform_id, name: &CStr) -> *mut c_void {
    unsafe { (api.get_extension_function_address_for_platform)(platform, name.as_ptr()) }
}

impl UsmApi {
    /// Resolve the USM functions of `platform`. `None` if any is missing.
    pub(crate) fn load(api: &OpenClApi, platform: cl_platform_id) -> Option<Self> {
        unsafe {
            let alloc = extension(api, platform, c"clDeviceMemAllocINTEL");
            let memcpy = extension(api, platform, c"clEnqueueMemcpyINTEL");
            let free = extension(api, platform, c"clMemBlockingFreeINTEL");
            let info = extension(api, platform, c"clGetMemAllocInfoINTEL");
            let arg = extension(api, platform, c"clSetKernelArgMemPointerINTEL");
            if [alloc, memcpy, free, info, arg].iter().any(|p| p.is_null()) {
                return None;
            }
            Some(Self {
                device_mem_alloc: std::mem::transmute::<*mut c_void, clDeviceMemAllocINTEL_fn>(alloc),
                enqueue_memcpy: std::mem::transmute::<*mut c_void, clEnqueueMemcpyINTEL_fn>(memcpy),
                mem_blocking_free: std::mem::transmute::<*mut c_void, clMemBlockingFreeINTEL_fn>(free),
                get_mem_alloc_info: std::mem::transmute::<*mut c_void, clGetMemAllocInfoINTEL_fn>(info),
                set_kernel_arg_mem_pointer: std::mem::transmute::<
                    *mut c_void,
                    clSetKernelArgMemPointerINTEL_fn,
                >(arg),
            })
        }
    }
}
