//! oneAPI Level Zero types, constants and entry-point signatures.
//!
//! Only the subset peerlink calls. Descriptor structs mirror `ze_api.h`
//! field for field; every one starts with `stype` and `pNext`.

#![allow(non_camel_case_types, non_snake_case)]

use std::os::raw::{c_char, c_void};

pub type ze_result_t = u32;
pub type ze_structure_type_t = u32;

pub type ze_driver_handle_t = *mut c_void;
pub type ze_device_handle_t = *mut c_void;
pub type ze_context_handle_t = *mut c_void;
pub type ze_command_queue_handle_t = *mut c_void;
pub type ze_command_list_handle_t = *mut c_void;
pub type ze_fence_handle_t = *mut c_void;
pub type ze_event_handle_t = *mut c_void;
pub type ze_module_handle_t = *mut c_void;
pub type ze_module_build_log_handle_t = *mut c_void;
pub type ze_kernel_handle_t = *mut c_void;

pub const ZE_RESULT_SUCCESS: ze_result_t = 0;
pub const ZE_RESULT_ERROR_MODULE_BUILD_FAILURE: ze_result_t = 0x7000_0004;

pub const ZE_STRUCTURE_TYPE_DEVICE_PROPERTIES: ze_structure_type_t = 0x3;
pub const ZE_STRUCTURE_TYPE_DEVICE_MEMORY_PROPERTIES: ze_structure_type_t = 0x7;
pub const ZE_STRUCTURE_TYPE_CONTEXT_DESC: ze_structure_type_t = 0xd;
pub const ZE_STRUCTURE_TYPE_COMMAND_QUEUE_DESC: ze_structure_type_t = 0xe;
pub const ZE_STRUCTURE_TYPE_COMMAND_LIST_DESC: ze_structure_type_t = 0xf;
pub const ZE_STRUCTURE_TYPE_DEVICE_MEM_ALLOC_DESC: ze_structure_type_t = 0x15;
pub const ZE_STRUCTURE_TYPE_MEMORY_ALLOCATION_PROPERTIES: ze_structure_type_t = 0x17;
pub const ZE_STRUCTURE_TYPE_EXTERNAL_MEMORY_EXPORT_DESC: ze_structure_type_t = 0x18;
pub const ZE_STRUCTURE_TYPE_EXTERNAL_MEMORY_IMPORT_FD: ze_structure_type_t = 0x19;
pub const ZE_STRUCTURE_TYPE_EXTERNAL_MEMORY_EXPORT_FD: ze_structure_type_t = 0x1a;
pub const ZE_STRUCTURE_TYPE_MODULE_DESC: ze_structure_type_t = 0x1b;
pub const ZE_STRUCTURE_TYPE_KERNEL_DESC: ze_structure_type_t = 0x1d;

pub const ZE_DEVICE_TYPE_GPU: u32 = 1;
pub const ZE_EXTERNAL_MEMORY_TYPE_FLAG_DMA_BUF: u32 = 1 << 1;
pub const ZE_MODULE_FORMAT_IL_SPIRV: u32 = 0;
pub const ZE_COMMAND_QUEUE_MODE_DEFAULT: u32 = 0;

pub const ZE_MAX_DEVICE_NAME: usize = 256;
pub const ZE_MAX_DEVICE_UUID_SIZE: usize = 16;

#[repr(C)]
pub struct ze_device_properties_t {
    pub stype: ze_structure_type_t,
    pub pNext: *mut c_void,
    pub type_: u32,
    pub vendorId: u32,
    pub deviceId: u32,
    pub flags: u32,
    pub subdeviceId: u32,
    pub coreClockRate: u32,
    pub maxMemAllocSize: u64,
    pub maxHardwareContexts: u32,
    pub maxCommandQueuePriority: u32,
    pub numThreadsPerEU: u32,
    pub physicalEUSimdWidth: u32,
    pub numEUsPerSubslice: u32,
    pub numSubslicesPerSlice: u32,
    pub numSlices: u32,
    pub timerResolution: u64,
    pub timestampValidBits: u32,
    pub kernelTimestampValidBits: u32,
    pub uuid: [u8; ZE_MAX_DEVICE_UUID_SIZE],
    pub name: [c_char; ZE_MAX_DEVICE_NAME],
}

#[repr(C)]
pub struct ze_device_memory_properties_t {
    pub stype: ze_structure_type_t,
    pub pNext: *mut c_void,
    pub flags: u32,
    pub maxClockRate: u32,
    pub maxBusWidth: u32,
    pub totalSize: u64,
    pub name: [c_char; ZE_MAX_DEVICE_NAME],
}

#[repr(C)]
pub struct ze_context_desc_t {
    pub stype: ze_structure_type_t,
    pub pNext: *const c_void,
    pub flags: u32,
}

#[repr(C)]
pub struct ze_command_queue_desc_t {
    pub stype: ze_structure_type_t,
    pub pNext: *const c_void,
    pub ordinal: u32,
    pub index: u32,
    pub flags: u32,
    pub mode: u32,
    pub priority: u32,
}

#[repr(C)]
pub struct ze_command_list_desc_t {
    pub stype: ze_structure_type_t,
    pub pNext: *const c_void,
    pub commandQueueGroupOrdinal: u32,
    pub flags: u32,
}

#[repr(C)]
pub struct ze_device_mem_alloc_desc_t {
    pub stype: ze_structure_type_t,
    pub pNext: *const c_void,
    pub flags: u32,
    pub ordinal: u32,
}

#[repr(C)]
pub struct ze_external_memory_export_desc_t {
    pub stype: ze_structure_type_t,
    pub pNext: *const c_void,
    pub flags: u32,
}

#[repr(C)]
pub struct ze_external_memory_import_fd_t {
    pub stype: ze_structure_type_t,
    pub pNext: *const c_void,
    pub flags: u32,
    pub fd: i32,
}

#[repr(C)]
pub struct ze_external_memory_export_fd_t {
    pub stype: ze_structure_type_t,
    pub pNext: *const c_void,
    pub flags: u32,
    pub fd: i32,
}

#[repr(C)]
pub struct ze_memory_allocation_properties_t {
    pub stype: ze_structure_type_t,
    pub pNext: *mut c_void,
    pub type_: u32,
    pub id: u64,
    pub pageSize: u64,
}

#[repr(C)]
pub struct ze_module_desc_t {
    pub stype: ze_structure_type_t,
    pub pNext: *const c_void,
    pub format: u32,
    pub inputSize: usize,
    pub pInputModule: *const u8,
    pub pBuildFlags: *const c_char,
    pub pConstants: *const c_void,
}

#[repr(C)]
pub struct ze_kernel_desc_t {
    pub stype: ze_structure_type_t,
    pub pNext: *const c_void,
    pub flags: u32,
    pub pKernelName: *const c_char,
}

#[repr(C)]
pub struct ze_group_count_t {
    pub groupCountX: u32,
    pub groupCountY: u32,
    pub groupCountZ: u32,
}

// ── Entry points ─────────────────────────────────────────────────────

pub type zeInit_fn = unsafe extern "C" fn(u32) -> ze_result_t;
pub type zeDriverGet_fn = unsafe extern "C" fn(*mut u32, *mut ze_driver_handle_t) -> ze_result_t;
pub type zeDeviceGet_fn =
    unsafe extern "C" fn(ze_driver_handle_t, *mut u32, *mut ze_device_handle_t) -> ze_result_t;
pub type zeDeviceGetProperties_fn =
    unsafe extern "C" fn(ze_device_handle_t, *mut ze_device_properties_t) -> ze_result_t;
pub type zeDeviceGetMemoryProperties_fn = unsafe extern "C" fn(
    ze_device_handle_t,
    *mut u32,
    *mut ze_device_memory_properties_t,
) -> ze_result_t;

pub type zeContextCreate_fn = unsafe extern "C" fn(
    ze_driver_handle_t,
    *const ze_context_desc_t,
    *mut ze_context_handle_t,
) -> ze_result_t;
pub type zeContextDestroy_fn = unsafe extern "C" fn(ze_context_handle_t) -> ze_result_t;

pub type zeCommandQueueCreate_fn = unsafe extern "C" fn(
    ze_context_handle_t,
    ze_device_handle_t,
    *const ze_command_queue_desc_t,
    *mut ze_command_queue_handle_t,
) -> ze_result_t;
pub type zeCommandQueueDestroy_fn = unsafe extern "C" fn(ze_command_queue_handle_t) -> ze_result_t;
pub type zeCommandQueueExecuteCommandLists_fn = unsafe extern "C" fn(
    ze_command_queue_handle_t,
    u32,
    *mut ze_command_list_handle_t,
    ze_fence_handle_t,
) -> ze_result_t;
pub type zeCommandQueueSynchronize_fn =
    unsafe extern "C" fn(ze_command_queue_handle_t, u64) -> ze_result_t;

pub type zeCommandListCreate_fn = unsafe extern "C" fn(
    ze_context_handle_t,
    ze_device_handle_t,
    *const ze_command_list_desc_t,
    *mut ze_command_list_handle_t,
) -> ze_result_t;
pub type zeCommandListClose_fn = unsafe extern "C" fn(ze_command_list_handle_t) -> ze_result_t;
pub type zeCommandListDestroy_fn = unsafe extern "C" fn(ze_command_list_handle_t) -> ze_result_t;
pub type zeCommandListAppendMemoryCopy_fn = unsafe extern "C" fn(
    ze_command_list_handle_t,
    *mut c_void,
    *const c_void,
    usize,
    ze_event_handle_t,
    u32,
    *mut ze_event_handle_t,
) -> ze_result_t;
pub type zeCommandListAppendLaunchKernel_fn = unsafe extern "C" fn(
    ze_command_list_handle_t,
    ze_kernel_handle_t,
    *const ze_group_count_t,
    ze_event_handle_t,
    u32,
    *mut ze_event_handle_t,
) -> ze_result_t;

pub type zeMemAllocDevice_fn = unsafe extern "C" fn(
    ze_context_handle_t,
    *const ze_device_mem_alloc_desc_t,
    usize,
    usize,
    ze_device_handle_t,
    *mut *mut c_void,
) -> ze_result_t;
pub type zeMemFree_fn = unsafe extern "C" fn(ze_context_handle_t, *mut c_void) -> ze_result_t;
pub type zeMemGetAllocProperties_fn = unsafe extern "C" fn(
    ze_context_handle_t,
    *const c_void,
    *mut ze_memory_allocation_properties_t,
    *mut ze_device_handle_t,
) -> ze_result_t;
pub type zeMemGetAddressRange_fn = unsafe extern "C" fn(
    ze_context_handle_t,
    *const c_void,
    *mut *mut c_void,
    *mut usize,
) -> ze_result_t;

pub type zeModuleCreate_fn = unsafe extern "C" fn(
    ze_context_handle_t,
    ze_device_handle_t,
    *const ze_module_desc_t,
    *mut ze_module_handle_t,
    *mut ze_module_build_log_handle_t,
) -> ze_result_t;
pub type zeModuleDestroy_fn = unsafe extern "C" fn(ze_module_handle_t) -> ze_result_t;
pub type zeModuleBuildLogGetString_fn =
    unsafe extern "C" fn(ze_module_build_log_handle_t, *mut usize, *mut c_char) -> ze_result_t;
pub type zeModuleBuildLogDestroy_fn =
    unsafe extern "C" fn(ze_module_build_log_handle_t) -> ze_result_t;

pub type zeKernelCreate_fn = unsafe extern "C" fn(
    ze_module_handle_t,
    *const ze_kernel_desc_t,
    *mut ze_kernel_handle_t,
) -> ze_result_t;
pub type zeKernelDestroy_fn = unsafe extern "C" fn(ze_kernel_handle_t) -> ze_result_t;
pub type zeKernelSetArgumentValue_fn =
    unsafe extern "C" fn(ze_kernel_handle_t, u32, usize, *const c_void) -> ze_result_t;
pub type zeKernelSuggestGroupSize_fn = unsafe extern "C" fn(
    ze_kernel_handle_t,
    u32,
    u32,
    u32,
    *mut u32,
    *mut u32,
    *mut u32,
) -> ze_result_t;
pub type zeKernelSetGroupSize_fn =
    unsafe extern "C" fn(ze_kernel_handle_t, u32, u32, u32) -> ze_result_t;
