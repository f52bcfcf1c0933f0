//! [`Backend`] implementation over oneAPI Level Zero.
//!
//! Level Zero is device-pointer-centric: every allocation is a
//! `zeMemAllocDevice` pointer, there are no buffer objects. Allocations are
//! made exportable up front by chaining an external-memory export
//! descriptor; imports chain a dma-buf import descriptor into the same call.
//!
//! Work is recorded into a fresh command list per operation, executed on
//! the context's queue and synchronized before the list is destroyed, so
//! every enqueueing method returns with the queue idle.

use std::ffi::CString;
use std::os::raw::{c_char, c_void};
use std::ptr;
use std::sync::Arc;

use peerlink::kernel::ProgramSource;
use peerlink::{Backend, DeviceInfo, ImportInfo, NativeHandle, Operand, PeerlinkError, Result};

use crate::RUNTIME;
use crate::ffi::*;
use crate::loader::ZeApi;
use crate::status::check;

const NO_TIMEOUT: u64 = u64::MAX;

fn to_raw<T>(p: *mut T) -> u64 {
    p as usize as u64
}

fn from_raw<T>(raw: u64) -> *mut T {
    raw as usize as *mut T
}

fn c_name(bytes: &[c_char]) -> String {
    let bytes: Vec<u8> = bytes.iter().take_while(|&&c| c != 0).map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn pointer(operand: Operand, operation: &'static str) -> Result<*mut c_void> {
    match operand {
        Operand::Pointer(raw) => Ok(from_raw(raw)),
        Operand::Buffer(_) => Err(PeerlinkError::unsupported(RUNTIME, operation)),
    }
}

/// Native state of one Level Zero device: context plus command queue.
pub struct ZeContext {
    driver: ze_driver_handle_t,
    device: ze_device_handle_t,
    context: ze_context_handle_t,
    queue: ze_command_queue_handle_t,
}

// SAFETY: Level Zero handles may be used from any thread; command lists are
// created per call and never shared.
unsafe impl Send for ZeContext {}
unsafe impl Sync for ZeContext {}

impl std::fmt::Debug for ZeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZeContext")
            .field("driver", &self.driver)
            .field("device", &self.device)
            .field("context", &self.context)
            .field("queue", &self.queue)
            .finish()
    }
}

/// The Level Zero runtime, loaded at run time.
#[derive(Debug, Clone)]
pub struct LevelZeroBackend {
    api: Arc<ZeApi>,
}

impl LevelZeroBackend {
    /// Load the Level Zero loader (see [`ZeApi::load`]).
    pub fn load() -> Result<Self> {
        Ok(Self::from_api(Arc::new(ZeApi::load()?)))
    }

    pub fn from_api(api: Arc<ZeApi>) -> Self {
        Self { api }
    }

    fn drivers(&self) -> Result<Vec<ze_driver_handle_t>> {
        let mut count = 0u32;
        unsafe {
            check("zeDriverGet", (self.api.driver_get)(&mut count, ptr::null_mut()))?;
            let mut drivers = vec![ptr::null_mut(); count as usize];
            check("zeDriverGet", (self.api.driver_get)(&mut count, drivers.as_mut_ptr()))?;
            drivers.truncate(count as usize);
            Ok(drivers)
        }
    }

    fn properties(&self, device: ze_device_handle_t) -> Result<ze_device_properties_t> {
        let mut props = ze_device_properties_t {
            stype: ZE_STRUCTURE_TYPE_DEVICE_PROPERTIES,
            pNext: ptr::null_mut(),
            type_: 0,
            vendorId: 0,
            deviceId: 0,
            flags: 0,
            subdeviceId: 0,
            coreClockRate: 0,
            maxMemAllocSize: 0,
            maxHardwareContexts: 0,
            maxCommandQueuePriority: 0,
            numThreadsPerEU: 0,
            physicalEUSimdWidth: 0,
            numEUsPerSubslice: 0,
            numSubslicesPerSlice: 0,
            numSlices: 0,
            timerResolution: 0,
            timestampValidBits: 0,
            kernelTimestampValidBits: 0,
            uuid: [0; ZE_MAX_DEVICE_UUID_SIZE],
            name: [0; ZE_MAX_DEVICE_NAME],
        };
        unsafe {
            check("zeDeviceGetProperties", (self.api.device_get_properties)(device, &mut props))?;
        }
        Ok(props)
    }

    fn gpus_of(&self, driver: ze_driver_handle_t) -> Result<Vec<ze_device_handle_t>> {
        let mut count = 0u32;
        let devices = unsafe {
            check("zeDeviceGet", (self.api.device_get)(driver, &mut count, ptr::null_mut()))?;
            let mut devices = vec![ptr::null_mut(); count as usize];
            check("zeDeviceGet", (self.api.device_get)(driver, &mut count, devices.as_mut_ptr()))?;
            devices.truncate(count as usize);
            devices
        };
        let mut gpus = Vec::with_capacity(devices.len());
        for device in devices {
            if self.properties(device)?.type_ == ZE_DEVICE_TYPE_GPU {
                gpus.push(device);
            }
        }
        Ok(gpus)
    }

    fn total_memory(&self, device: ze_device_handle_t) -> Result<u64> {
        let mut count = 0u32;
        unsafe {
            check(
                "zeDeviceGetMemoryProperties",
                (self.api.device_get_memory_properties)(device, &mut count, ptr::null_mut()),
            )?;
            let mut props: Vec<ze_device_memory_properties_t> = (0..count)
                .map(|_| ze_device_memory_properties_t {
                    stype: ZE_STRUCTURE_TYPE_DEVICE_MEMORY_PROPERTIES,
                    pNext: ptr::null_mut(),
                    flags: 0,
                    maxClockRate: 0,
                    maxBusWidth: 0,
                    totalSize: 0,
                    name: [0; ZE_MAX_DEVICE_NAME],
                })
                .collect();
            check(
                "zeDeviceGetMemoryProperties",
                (self.api.device_get_memory_properties)(device, &mut count, props.as_mut_ptr()),
            )?;
            Ok(props.iter().take(count as usize).map(|p| p.totalSize).sum())
        }
    }

    /// Record one command with `record`, run it and wait for the queue.
    fn submit(
        &self,
        ctx: &ZeContext,
        call: &'static str,
        record: impl FnOnce(ze_command_list_handle_t) -> ze_result_t,
    ) -> Result<()> {
        let api = &self.api;
        let desc = ze_command_list_desc_t {
            stype: ZE_STRUCTURE_TYPE_COMMAND_LIST_DESC,
            pNext: ptr::null(),
            commandQueueGroupOrdinal: 0,
            flags: 0,
        };
        let mut list: ze_command_list_handle_t = ptr::null_mut();
        unsafe {
            check(
                "zeCommandListCreate",
                (api.command_list_create)(ctx.context, ctx.device, &desc, &mut list),
            )?;
        }

        let run = || -> Result<()> {
            check(call, record(list))?;
            unsafe {
                check("zeCommandListClose", (api.command_list_close)(list))?;
                check(
                    "zeCommandQueueExecuteCommandLists",
                    (api.command_queue_execute)(ctx.queue, 1, &mut list, ptr::null_mut()),
                )?;
                check(
                    "zeCommandQueueSynchronize",
                    (api.command_queue_synchronize)(ctx.queue, NO_TIMEOUT),
                )
            }
        };
        let result = run();

        let destroyed = unsafe { (api.command_list_destroy)(list) };
        if destroyed != ZE_RESULT_SUCCESS {
            tracing::warn!(
                status = crate::status::status_name(destroyed),
                "zeCommandListDestroy failed"
            );
        }
        result
    }

    fn memcpy(&self, ctx: &ZeContext, dst: *mut c_void, src: *const c_void, size: usize) -> Result<()> {
        let append = self.api.append_memory_copy;
        self.submit(ctx, "zeCommandListAppendMemoryCopy", |list| unsafe {
            append(list, dst, src, size, ptr::null_mut(), 0, ptr::null_mut())
        })
    }

    fn alloc(&self, ctx: &ZeContext, size: usize, alignment: usize, chain: *const c_void) -> Result<*mut c_void> {
        let desc = ze_device_mem_alloc_desc_t {
            stype: ZE_STRUCTURE_TYPE_DEVICE_MEM_ALLOC_DESC,
            pNext: chain,
            flags: 0,
            ordinal: 0,
        };
        let mut out: *mut c_void = ptr::null_mut();
        unsafe {
            check(
                "zeMemAllocDevice",
                (self.api.mem_alloc_device)(ctx.context, &desc, size, alignment, ctx.device, &mut out),
            )?;
        }
        Ok(out)
    }

    fn build_log(&self, log: ze_module_build_log_handle_t) -> String {
        if log.is_null() {
            return String::new();
        }
        let api = &self.api;
        let mut size = 0usize;
        let text = unsafe {
            let status = (api.build_log_get_string)(log, &mut size, ptr::null_mut());
            if status != ZE_RESULT_SUCCESS {
                format!("<build log unavailable: {}>", crate::status::status_name(status))
            } else {
                let mut buf: Vec<c_char> = vec![0; size.max(1)];
                let status = (api.build_log_get_string)(log, &mut size, buf.as_mut_ptr());
                if status != ZE_RESULT_SUCCESS {
                    format!("<build log unavailable: {}>", crate::status::status_name(status))
                } else {
                    c_name(&buf)
                }
            }
        };
        unsafe {
            (api.build_log_destroy)(log);
        }
        text
    }

    /// Largest group size the driver suggests for `global_size`, or 1 when
    /// the suggestion fails or does not divide the range.
    fn group_size(&self, kernel: ze_kernel_handle_t, global_size: u32) -> u32 {
        let (mut x, mut y, mut z) = (0u32, 0u32, 0u32);
        let status = unsafe {
            (self.api.kernel_suggest_group_size)(kernel, global_size, 1, 1, &mut x, &mut y, &mut z)
        };
        if status != ZE_RESULT_SUCCESS || x == 0 || global_size % x != 0 {
            tracing::debug!(
                status = crate::status::status_name(status),
                suggested = x,
                global_size,
                "falling back to group size 1"
            );
            1
        } else {
            x
        }
    }
}

impl Backend for LevelZeroBackend {
    type Context = ZeContext;

    fn name(&self) -> &'static str {
        RUNTIME
    }

    fn gpu_devices(&self) -> Result<Vec<DeviceInfo>> {
        for driver in self.drivers()? {
            let devices = self.gpus_of(driver)?;
            if devices.is_empty() {
                continue;
            }
            tracing::info!(driver = ?driver, gpus = devices.len(), "selected Level Zero driver");
            return devices
                .into_iter()
                .enumerate()
                .map(|(index, device)| {
                    Ok(DeviceInfo {
                        index,
                        platform: to_raw(driver),
                        device: to_raw(device),
                        name: c_name(&self.properties(device)?.name),
                        global_mem_bytes: self.total_memory(device)?,
                    })
                })
                .collect();
        }
        Err(PeerlinkError::NoGpuDevice { runtime: RUNTIME })
    }

    fn create_context(&self, info: &DeviceInfo) -> Result<ZeContext> {
        let api = &self.api;
        let driver: ze_driver_handle_t = from_raw(info.platform);
        let device: ze_device_handle_t = from_raw(info.device);

        let context_desc = ze_context_desc_t {
            stype: ZE_STRUCTURE_TYPE_CONTEXT_DESC,
            pNext: ptr::null(),
            flags: 0,
        };
        let mut context: ze_context_handle_t = ptr::null_mut();
        unsafe {
            check("zeContextCreate", (api.context_create)(driver, &context_desc, &mut context))?;
        }

        let queue_desc = ze_command_queue_desc_t {
            stype: ZE_STRUCTURE_TYPE_COMMAND_QUEUE_DESC,
            pNext: ptr::null(),
            ordinal: 0,
            index: 0,
            flags: 0,
            mode: ZE_COMMAND_QUEUE_MODE_DEFAULT,
            priority: 0,
        };
        let mut queue: ze_command_queue_handle_t = ptr::null_mut();
        let status = unsafe { (api.command_queue_create)(context, device, &queue_desc, &mut queue) };
        if let Err(e) = check("zeCommandQueueCreate", status) {
            unsafe {
                (api.context_destroy)(context);
            }
            return Err(e);
        }

        tracing::debug!(context = ?context, queue = ?queue, "created Level Zero context");
        Ok(ZeContext {
            driver,
            device,
            context,
            queue,
        })
    }

    fn destroy_context(&self, ctx: &mut ZeContext) -> Result<()> {
        let api = &self.api;
        unsafe {
            let queue = (api.command_queue_destroy)(ctx.queue);
            let context = (api.context_destroy)(ctx.context);
            ctx.queue = ptr::null_mut();
            ctx.context = ptr::null_mut();
            check("zeCommandQueueDestroy", queue)?;
            check("zeContextDestroy", context)
        }
    }

    fn finish(&self, ctx: &ZeContext) -> Result<()> {
        unsafe {
            check(
                "zeCommandQueueSynchronize",
                (self.api.command_queue_synchronize)(ctx.queue, NO_TIMEOUT),
            )
        }
    }

    fn alloc_unified(&self, ctx: &ZeContext, size: usize, alignment: usize) -> Result<Operand> {
        let export = ze_external_memory_export_desc_t {
            stype: ZE_STRUCTURE_TYPE_EXTERNAL_MEMORY_EXPORT_DESC,
            pNext: ptr::null(),
            flags: ZE_EXTERNAL_MEMORY_TYPE_FLAG_DMA_BUF,
        };
        let addr = self.alloc(ctx, size, alignment, (&export as *const ze_external_memory_export_desc_t).cast())?;
        Ok(Operand::Pointer(to_raw(addr)))
    }

    fn free(&self, ctx: &ZeContext, mem: Operand) -> Result<()> {
        let addr = pointer(mem, "buffer objects")?;
        unsafe { check("zeMemFree", (self.api.mem_free)(ctx.context, addr)) }
    }

    fn write(&self, ctx: &ZeContext, dst: Operand, offset: usize, data: &[u8]) -> Result<()> {
        let dst = pointer(dst, "buffer objects")?;
        let dst = unsafe { dst.cast::<u8>().add(offset).cast() };
        self.memcpy(ctx, dst, data.as_ptr().cast(), data.len())
    }

    fn read(&self, ctx: &ZeContext, src: Operand, offset: usize, out: &mut [u8]) -> Result<()> {
        let src = pointer(src, "buffer objects")?;
        let src = unsafe { src.cast::<u8>().add(offset).cast_const().cast() };
        self.memcpy(ctx, out.as_mut_ptr().cast(), src, out.len())
    }

    fn copy(&self, ctx: &ZeContext, src: Operand, dst: Operand, size: usize) -> Result<()> {
        let src = pointer(src, "buffer objects")?;
        let dst = pointer(dst, "buffer objects")?;
        self.memcpy(ctx, dst, src.cast_const(), size)
    }

    fn export_handle(&self, ctx: &ZeContext, mem: Operand) -> Result<NativeHandle> {
        let addr = pointer(mem, "buffer export")?;
        let mut export_fd = ze_external_memory_export_fd_t {
            stype: ZE_STRUCTURE_TYPE_EXTERNAL_MEMORY_EXPORT_FD,
            pNext: ptr::null(),
            flags: ZE_EXTERNAL_MEMORY_TYPE_FLAG_DMA_BUF,
            fd: -1,
        };
        let mut props = ze_memory_allocation_properties_t {
            stype: ZE_STRUCTURE_TYPE_MEMORY_ALLOCATION_PROPERTIES,
            pNext: (&mut export_fd as *mut ze_external_memory_export_fd_t).cast(),
            type_: 0,
            id: 0,
            pageSize: 0,
        };
        unsafe {
            check(
                "zeMemGetAllocProperties",
                (self.api.mem_get_alloc_properties)(ctx.context, addr.cast_const(), &mut props, ptr::null_mut()),
            )?;
        }
        if export_fd.fd < 0 {
            return Err(PeerlinkError::unsupported(RUNTIME, "dma-buf export of this allocation"));
        }
        Ok(NativeHandle::new(export_fd.fd as u64))
    }

    fn import_handle(&self, ctx: &ZeContext, handle: NativeHandle, size: usize) -> Result<Operand> {
        let import = ze_external_memory_import_fd_t {
            stype: ZE_STRUCTURE_TYPE_EXTERNAL_MEMORY_IMPORT_FD,
            pNext: ptr::null(),
            flags: ZE_EXTERNAL_MEMORY_TYPE_FLAG_DMA_BUF,
            fd: handle.as_u64() as i32,
        };
        let addr = self.alloc(ctx, size, 0, (&import as *const ze_external_memory_import_fd_t).cast())?;
        Ok(Operand::Pointer(to_raw(addr)))
    }

    fn query_import(&self, ctx: &ZeContext, mem: Operand) -> Result<ImportInfo> {
        let addr = pointer(mem, "buffer objects")?;
        let mut base: *mut c_void = ptr::null_mut();
        let mut size = 0usize;
        let mut props = ze_memory_allocation_properties_t {
            stype: ZE_STRUCTURE_TYPE_MEMORY_ALLOCATION_PROPERTIES,
            pNext: ptr::null_mut(),
            type_: 0,
            id: 0,
            pageSize: 0,
        };
        unsafe {
            check(
                "zeMemGetAddressRange",
                (self.api.mem_get_address_range)(ctx.context, addr.cast_const(), &mut base, &mut size),
            )?;
            check(
                "zeMemGetAllocProperties",
                (self.api.mem_get_alloc_properties)(ctx.context, addr.cast_const(), &mut props, ptr::null_mut()),
            )?;
        }
        Ok(ImportInfo {
            size,
            object_type: props.type_,
        })
    }

    fn release_import(&self, ctx: &ZeContext, mem: Operand) -> Result<()> {
        self.free(ctx, mem)
    }

    fn build_program(&self, ctx: &ZeContext, source: &ProgramSource, options: &str) -> Result<u64> {
        let ProgramSource::SpirV(il) = source else {
            return Err(PeerlinkError::unsupported(
                RUNTIME,
                "OpenCL C programs (configure a SPIR-V module)",
            ));
        };
        let flags = CString::new(options)
            .map_err(|_| PeerlinkError::InvalidOperands("build flags contain a NUL byte".into()))?;
        let desc = ze_module_desc_t {
            stype: ZE_STRUCTURE_TYPE_MODULE_DESC,
            pNext: ptr::null(),
            format: ZE_MODULE_FORMAT_IL_SPIRV,
            inputSize: il.len(),
            pInputModule: il.as_ptr(),
            pBuildFlags: flags.as_ptr(),
            pConstants: ptr::null(),
        };
        let mut module: ze_module_handle_t = ptr::null_mut();
        let mut log: ze_module_build_log_handle_t = ptr::null_mut();
        let status = unsafe { (self.api.module_create)(ctx.context, ctx.device, &desc, &mut module, &mut log) };
        let log = self.build_log(log);

        if status != ZE_RESULT_SUCCESS && !module.is_null() {
            unsafe {
                (self.api.module_destroy)(module);
            }
        }
        if status == ZE_RESULT_ERROR_MODULE_BUILD_FAILURE {
            return Err(PeerlinkError::Build {
                entry: String::new(),
                status: i64::from(status),
                log,
            });
        }
        check("zeModuleCreate", status)?;
        Ok(to_raw(module))
    }

    fn create_kernel(&self, _ctx: &ZeContext, program: u64, entry: &str) -> Result<u64> {
        let name = CString::new(entry)
            .map_err(|_| PeerlinkError::InvalidOperands("kernel name contains a NUL byte".into()))?;
        let desc = ze_kernel_desc_t {
            stype: ZE_STRUCTURE_TYPE_KERNEL_DESC,
            pNext: ptr::null(),
            flags: 0,
            pKernelName: name.as_ptr(),
        };
        let mut kernel: ze_kernel_handle_t = ptr::null_mut();
        unsafe {
            check("zeKernelCreate", (self.api.kernel_create)(from_raw(program), &desc, &mut kernel))?;
        }
        Ok(to_raw(kernel))
    }

    fn set_kernel_arg(&self, _ctx: &ZeContext, kernel: u64, index: u32, operand: Operand) -> Result<()> {
        let addr = pointer(operand, "buffer kernel arguments")?;
        unsafe {
            check(
                "zeKernelSetArgumentValue",
                (self.api.kernel_set_argument_value)(
                    from_raw(kernel),
                    index,
                    std::mem::size_of::<*mut c_void>(),
                    (&addr as *const *mut c_void).cast(),
                ),
            )
        }
    }

    fn launch(&self, ctx: &ZeContext, kernel: u64, global_size: usize) -> Result<()> {
        let global = u32::try_from(global_size).map_err(|_| {
            PeerlinkError::InvalidOperands(format!("launch of {global_size} items exceeds the 32-bit range"))
        })?;
        let kernel: ze_kernel_handle_t = from_raw(kernel);
        let group = self.group_size(kernel, global);
        unsafe {
            check("zeKernelSetGroupSize", (self.api.kernel_set_group_size)(kernel, group, 1, 1))?;
        }
        let groups = ze_group_count_t {
            groupCountX: global / group,
            groupCountY: 1,
            groupCountZ: 1,
        };
        let append = self.api.append_launch_kernel;
        self.submit(ctx, "zeCommandListAppendLaunchKernel", |list| unsafe {
            append(list, kernel, &groups, ptr::null_mut(), 0, ptr::null_mut())
        })
    }

    fn release_kernel(&self, _ctx: &ZeContext, kernel: u64) -> Result<()> {
        unsafe { check("zeKernelDestroy", (self.api.kernel_destroy)(from_raw(kernel))) }
    }

    fn release_program(&self, _ctx: &ZeContext, program: u64) -> Result<()> {
        unsafe { check("zeModuleDestroy", (self.api.module_destroy)(from_raw(program))) }
    }

    fn global_mem_size(&self, ctx: &ZeContext) -> Result<u64> {
        self.total_memory(ctx.device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_name_stops_at_nul() {
        let mut raw = [0 as c_char; 16];
        for (dst, src) in raw.iter_mut().zip(b"Arc A770") {
            *dst = *src as c_char;
        }
        assert_eq!(c_name(&raw), "Arc A770");
        assert_eq!(c_name(&[0; 4]), "");
    }

    #[test]
    fn test_buffer_operands_unsupported() {
        let err = pointer(Operand::Buffer(0x10), "buffer export").unwrap_err();
        assert_eq!(err.to_string(), "level-zero: buffer export is not supported");
        assert_eq!(pointer(Operand::Pointer(0x20), "x").unwrap(), 0x20 as *mut c_void);
    }
}
