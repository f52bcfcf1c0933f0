//! Run-time loading of the Level Zero loader library.

use std::ffi::OsStr;

use libloading::{Library, Symbol};
use peerlink::{PeerlinkError, Result};

use crate::RUNTIME;
use crate::ffi::*;

/// Library opened when `PEERLINK_ZE_LIB` is unset.
pub const DEFAULT_LIBRARY: &str = "libze_loader.so.1";

/// Environment variable overriding the library path.
pub const LIBRARY_ENV: &str = "PEERLINK_ZE_LIB";

unsafe fn symbol<T: Copy>(lib: &Library, name: &'static str) -> Result<T> {
    let mut bytes = Vec::with_capacity(name.len() + 1);
    bytes.extend_from_slice(name.as_bytes());
    bytes.push(0);
    let sym: Symbol<'_, T> = unsafe { lib.get(&bytes) }.map_err(|e| {
        PeerlinkError::runtime_unavailable_with_source(RUNTIME, format!("missing symbol {name}"), e)
    })?;
    Ok(*sym)
}

/// Level Zero entry points, resolved once per process.
pub struct ZeApi {
    pub(crate) init: zeInit_fn,
    pub(crate) driver_get: zeDriverGet_fn,
    pub(crate) device_get: zeDeviceGet_fn,
    pub(crate) device_get_properties: zeDeviceGetProperties_fn,
    pub(crate) device_get_memory_properties: zeDeviceGetMemoryProperties_fn,
    pub(crate) context_create: zeContextCreate_fn,
    pub(crate) context_destroy: zeContextDestroy_fn,
    pub(crate) command_queue_create: zeCommandQueueCreate_fn,
    pub(crate) command_queue_destroy: zeCommandQueueDestroy_fn,
    pub(crate) command_queue_execute: zeCommandQueueExecuteCommandLists_fn,
    pub(crate) command_queue_synchronize: zeCommandQueueSynchronize_fn,
    pub(crate) command_list_create: zeCommandListCreate_fn,
    pub(crate) command_list_close: zeCommandListClose_fn,
    pub(crate) command_list_destroy: zeCommandListDestroy_fn,
    pub(crate) append_memory_copy: zeCommandListAppendMemoryCopy_fn,
    pub(crate) append_launch_kernel: zeCommandListAppendLaunchKernel_fn,
    pub(crate) mem_alloc_device: zeMemAllocDevice_fn,
    pub(crate) mem_free: zeMemFree_fn,
    pub(crate) mem_get_alloc_properties: zeMemGetAllocProperties_fn,
    pub(crate) mem_get_address_range: zeMemGetAddressRange_fn,
    pub(crate) module_create: zeModuleCreate_fn,
    pub(crate) module_destroy: zeModuleDestroy_fn,
    pub(crate) build_log_get_string: zeModuleBuildLogGetString_fn,
    pub(crate) build_log_destroy: zeModuleBuildLogDestroy_fn,
    pub(crate) kernel_create: zeKernelCreate_fn,
    pub(crate) kernel_destroy: zeKernelDestroy_fn,
    pub(crate) kernel_set_argument_value: zeKernelSetArgumentValue_fn,
    pub(crate) kernel_suggest_group_size: zeKernelSuggestGroupSize_fn,
    pub(crate) kernel_set_group_size: zeKernelSetGroupSize_fn,
    _lib: Library,
}

impl ZeApi {
    /// Open the library named by `PEERLINK_ZE_LIB`, or the default.
    pub fn load() -> Result<Self> {
        match std::env::var_os(LIBRARY_ENV) {
            Some(path) if !path.is_empty() => Self::load_from(path),
            _ => Self::load_from(DEFAULT_LIBRARY),
        }
    }

    /// Open the loader at `path`, resolve every entry point and run `zeInit`.
    pub fn load_from(path: impl AsRef<OsStr>) -> Result<Self> {
        let path = path.as_ref();
        let lib = unsafe { Library::new(path) }.map_err(|e| {
            PeerlinkError::runtime_unavailable_with_source(
                RUNTIME,
                format!("cannot open {}", path.to_string_lossy()),
                e,
            )
        })?;

        let api = unsafe {
            Self {
                init: symbol(&lib, "zeInit")?,
                driver_get: symbol(&lib, "zeDriverGet")?,
                device_get: symbol(&lib, "zeDeviceGet")?,
                device_get_properties: symbol(&lib, "zeDeviceGetProperties")?,
                device_get_memory_properties: symbol(&lib, "zeDeviceGetMemoryProperties")?,
                context_create: symbol(&lib, "zeContextCreate")?,
                context_destroy: symbol(&lib, "zeContextDestroy")?,
                command_queue_create: symbol(&lib, "zeCommandQueueCreate")?,
                command_queue_destroy: symbol(&lib, "zeCommandQueueDestroy")?,
                command_queue_execute: symbol(&lib, "zeCommandQueueExecuteCommandLists")?,
                command_queue_synchronize: symbol(&lib, "zeCommandQueueSynchronize")?,
                command_list_create: symbol(&lib, "zeCommandListCreate")?,
                command_list_close: symbol(&lib, "zeCommandListClose")?,
                command_list_destroy: symbol(&lib, "zeCommandListDestroy")?,
                append_memory_copy: symbol(&lib, "zeCommandListAppendMemoryCopy")?,
                append_launch_kernel: symbol(&lib, "zeCommandListAppendLaunchKernel")?,
                mem_alloc_device: symbol(&lib, "zeMemAllocDevice")?,
                mem_free: symbol(&lib, "zeMemFree")?,
                mem_get_alloc_properties: symbol(&lib, "zeMemGetAllocProperties")?,
                mem_get_address_range: symbol(&lib, "zeMemGetAddressRange")?,
                module_create: symbol(&lib, "zeModuleCreate")?,
                module_destroy: symbol(&lib, "zeModuleDestroy")?,
                build_log_get_string: symbol(&lib, "zeModuleBuildLogGetString")?,
                build_log_destroy: symbol(&lib, "zeModuleBuildLogDestroy")?,
                kernel_create: symbol(&lib, "zeKernelCreate")?,
                kernel_destroy: symbol(&lib, "zeKernelDestroy")?,
                kernel_set_argument_value: symbol(&lib, "zeKernelSetArgumentValue")?,
                kernel_suggest_group_size: symbol(&lib, "zeKernelSuggestGroupSize")?,
                kernel_set_group_size: symbol(&lib, "zeKernelSetGroupSize")?,
                _lib: lib,
            }
        };

        crate::status::check("zeInit", unsafe { (api.init)(0) })?;
        Ok(api)
    }
}

impl std::fmt::Debug for ZeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZeApi").finish_non_exhaustive()
    }
}
