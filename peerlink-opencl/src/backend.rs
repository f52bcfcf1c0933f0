//! [`Backend`] implementation over the OpenCL runtime.
//!
//! Buffer objects are `cl_mem`; unified memory goes through the Intel USM
//! extension. Handles are dma-buf fds: exported with
//! `CL_MEM_ALLOCATION_HANDLE_INTEL`, imported with
//! `clCreateBufferWithProperties` and `CL_EXTERNAL_MEMORY_HANDLE_DMA_BUF_KHR`.

use std::ffi::CString;
use std::os::raw::c_void;
use std::ptr;
use std::sync::Arc;

use peerlink::kernel::ProgramSource;
use peerlink::{Backend, DeviceInfo, ImportInfo, NativeHandle, Operand, PeerlinkError, Result};

use crate::RUNTIME;
use crate::ffi::*;
use crate::loader::OpenClApi;
use crate::status::check;
use crate::usm::UsmApi;

fn to_raw<T>(p: *mut T) -> u64 {
    p as usize as u64
}

fn from_raw<T>(raw: u64) -> *mut T {
    raw as usize as *mut T
}

/// Native state of one OpenCL device: context plus in-order queue.
pub struct OpenClContext {
    platform: cl_platform_id,
    device: cl_device_id,
    context: cl_context,
    queue: cl_command_queue,
    usm: Option<UsmApi>,
}

// SAFETY: OpenCL objects are reference counted and every API call on them is
// thread-safe (OpenCL 1.1+).
unsafe impl Send for OpenClContext {}
unsafe impl Sync for OpenClContext {}

impl OpenClContext {
    fn usm(&self, operation: &'static str) -> Result<&UsmApi> {
        self.usm
            .as_ref()
            .ok_or_else(|| PeerlinkError::unsupported(RUNTIME, operation))
    }
}

/// The OpenCL runtime, loaded at run time.
#[derive(Debug, Clone)]
pub struct OpenClBackend {
    api: Arc<OpenClApi>,
}

impl OpenClBackend {
    /// Load the OpenCL library (see [`OpenClApi::load`]).
    pub fn load() -> Result<Self> {
        Ok(Self::from_api(Arc::new(OpenClApi::load()?)))
    }

    pub fn from_api(api: Arc<OpenClApi>) -> Self {
        Self { api }
    }

    fn platforms(&self) -> Result<Vec<cl_platform_id>> {
        let api = &self.api;
        let mut count: cl_uint = 0;
        unsafe {
            check("clGetPlatformIDs", (api.get_platform_ids)(0, ptr::null_mut(), &mut count))?;
            let mut platforms = vec![ptr::null_mut(); count as usize];
            check(
                "clGetPlatformIDs",
                (api.get_platform_ids)(count, platforms.as_mut_ptr(), ptr::null_mut()),
            )?;
            Ok(platforms)
        }
    }

    fn gpus_of(&self, platform: cl_platform_id) -> Result<Vec<cl_device_id>> {
        let api = &self.api;
        let mut count: cl_uint = 0;
        unsafe {
            // CL_DEVICE_NOT_FOUND just means no GPU on this platform.
            let status = (api.get_device_ids)(platform, CL_DEVICE_TYPE_GPU, 0, ptr::null_mut(), &mut count);
            if status != CL_SUCCESS || count == 0 {
                return Ok(Vec::new());
            }
            let mut devices = vec![ptr::null_mut(); count as usize];
            check(
                "clGetDeviceIDs",
                (api.get_device_ids)(platform, CL_DEVICE_TYPE_GPU, count, devices.as_mut_ptr(), ptr::null_mut()),
            )?;
            Ok(devices)
        }
    }

    fn device_name(&self, device: cl_device_id) -> Result<String> {
        let mut name = [0u8; 1024];
        unsafe {
            check(
                "clGetDeviceInfo",
                (self.api.get_device_info)(
                    device,
                    CL_DEVICE_NAME,
                    name.len(),
                    name.as_mut_ptr().cast(),
                    ptr::null_mut(),
                ),
            )?;
        }
        let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
        Ok(String::from_utf8_lossy(&name[..end]).into_owned())
    }

    fn device_global_mem(&self, device: cl_device_id) -> Result<u64> {
        let mut size: cl_ulong = 0;
        unsafe {
            check(
                "clGetDeviceInfo",
                (self.api.get_device_info)(
                    device,
                    CL_DEVICE_GLOBAL_MEM_SIZE,
                    std::mem::size_of::<cl_ulong>(),
                    (&mut size as *mut cl_ulong).cast(),
                    ptr::null_mut(),
                ),
            )?;
        }
        Ok(size)
    }

    fn build_log(&self, ctx: &OpenClContext, program: cl_program) -> String {
        let api = &self.api;
        let mut size = 0usize;
        unsafe {
            let status = (api.get_program_build_info)(
                program,
                ctx.device,
                CL_PROGRAM_BUILD_LOG,
                0,
                ptr::null_mut(),
                &mut size,
            );
            if status != CL_SUCCESS {
                return format!("<build log unavailable: {}>", crate::status::status_name(status));
            }
            let mut log = vec![0u8; size + 1];
            let status = (api.get_program_build_info)(
                program,
                ctx.device,
                CL_PROGRAM_BUILD_LOG,
                log.len(),
                log.as_mut_ptr().cast(),
                ptr::null_mut(),
            );
            if status != CL_SUCCESS {
                return format!("<build log unavailable: {}>", crate::status::status_name(status));
            }
            let end = log.iter().position(|&b| b == 0).unwrap_or(log.len());
            String::from_utf8_lossy(&log[..end]).into_owned()
        }
    }

    fn c_string(value: &str, what: &'static str) -> Result<CString> {
        CString::new(value)
            .map_err(|_| PeerlinkError::InvalidOperands(format!("{what} contains a NUL byte")))
    }
}

impl Backend for OpenClBackend {
    type Context = OpenClContext;

    fn name(&self) -> &'static str {
        RUNTIME
    }

    fn gpu_devices(&self) -> Result<Vec<DeviceInfo>> {
        for platform in self.platforms()? {
            let devices = self.gpus_of(platform)?;
            if devices.is_empty() {
                continue;
            }
            tracing::info!(platform = ?platform, gpus = devices.len(), "selected OpenCL platform");
            return devices
                .into_iter()
                .enumerate()
                .map(|(index, device)| {
                    Ok(DeviceInfo {
                        index,
                        platform: to_raw(platform),
                        device: to_raw(device),
                        name: self.device_name(device)?,
                        global_mem_bytes: self.device_global_mem(device)?,
                    })
                })
                .collect();
        }
        Err(PeerlinkError::NoGpuDevice { runtime: RUNTIME })
    }

    fn create_context(&self, info: &DeviceInfo) -> Result<OpenClContext> {
        let api = &self.api;
        let platform: cl_platform_id = from_raw(info.platform);
        let device: cl_device_id = from_raw(info.device);
        let mut err = CL_SUCCESS;
        unsafe {
            let context = (api.create_context)(ptr::null(), 1, &device, None, ptr::null_mut(), &mut err);
            check("clCreateContext", err)?;

            let queue = (api.create_command_queue)(context, device, 0, &mut err);
            if let Err(e) = check("clCreateCommandQueue", err) {
                (api.release_context)(context);
                return Err(e);
            }

            let usm = UsmApi::load(api, platform);
            if usm.is_none() {
                tracing::debug!(device = %info.name, "platform lacks cl_intel_unified_shared_memory");
            }
            tracing::debug!(context = ?context, queue = ?queue, "created OpenCL context");

            Ok(OpenClContext {
                platform,
                device,
                context,
                queue,
                usm,
            })
        }
    }

    fn destroy_context(&self, ctx: &mut OpenClContext) -> Result<()> {
        let api = &self.api;
        unsafe {
            let queue = (api.release_command_queue)(ctx.queue);
            let context = (api.release_context)(ctx.context);
            ctx.queue = ptr::null_mut();
            ctx.context = ptr::null_mut();
            check("clReleaseCommandQueue", queue)?;
            check("clReleaseContext", context)
        }
    }

    fn finish(&self, ctx: &OpenClContext) -> Result<()> {
        unsafe { check("clFinish", (self.api.finish)(ctx.queue)) }
    }

    fn alloc_buffer(&self, ctx: &OpenClContext, size: usize) -> Result<Operand> {
        let mut err = CL_SUCCESS;
        let mem = unsafe {
            (self.api.create_buffer)(
                ctx.context,
                CL_MEM_READ_WRITE | CL_MEM_ALLOW_UNRESTRICTED_SIZE_INTEL,
                size,
                ptr::null_mut(),
                &mut err,
            )
        };
        check("clCreateBuffer", err)?;
        Ok(Operand::Buffer(to_raw(mem)))
    }

    fn alloc_unified(&self, ctx: &OpenClContext, size: usize, alignment: usize) -> Result<Operand> {
        let usm = ctx.usm("unified memory allocation")?;
        let mut err = CL_SUCCESS;
        let ptr = unsafe {
            (usm.device_mem_alloc)(
                ctx.context,
                ctx.device,
                ptr::null(),
                size,
                alignment as cl_uint,
                &mut err,
            )
        };
        check("clDeviceMemAllocINTEL", err)?;
        Ok(Operand::Pointer(to_raw(ptr)))
    }

    fn free(&self, ctx: &OpenClContext, mem: Operand) -> Result<()> {
        unsafe {
            match mem {
                Operand::Buffer(raw) => check("clReleaseMemObject", (self.api.release_mem_object)(from_raw(raw))),
                Operand::Pointer(raw) => {
                    let usm = ctx.usm("unified memory free")?;
                    check("clMemBlockingFreeINTEL", (usm.mem_blocking_free)(ctx.context, from_raw(raw)))
                }
            }
        }
    }

    fn write(&self, ctx: &OpenClContext, dst: Operand, offset: usize, data: &[u8]) -> Result<()> {
        unsafe {
            match dst {
                Operand::Buffer(raw) => check(
                    "clEnqueueWriteBuffer",
                    (self.api.enqueue_write_buffer)(
                        ctx.queue,
                        from_raw(raw),
                        CL_TRUE,
                        offset,
                        data.len(),
                        data.as_ptr().cast(),
                        0,
                        ptr::null(),
                        ptr::null_mut(),
                    ),
                ),
                Operand::Pointer(raw) => {
                    let usm = ctx.usm("unified memory write")?;
                    check(
                        "clEnqueueMemcpyINTEL",
                        (usm.enqueue_memcpy)(
                            ctx.queue,
                            CL_TRUE,
                            from_raw::<u8>(raw).add(offset).cast(),
                            data.as_ptr().cast(),
                            data.len(),
                            0,
                            ptr::null(),
                            ptr::null_mut(),
                        ),
                    )
                }
            }
        }
    }

    fn read(&self, ctx: &OpenClContext, src: Operand, offset: usize, out: &mut [u8]) -> Result<()> {
        unsafe {
            match src {
                Operand::Buffer(raw) => check(
                    "clEnqueueReadBuffer",
                    (self.api.enqueue_read_buffer)(
                        ctx.queue,
                        from_raw(raw),
                        CL_TRUE,
                        offset,
                        out.len(),
                        out.as_mut_ptr().cast(),
                        0,
                        ptr::null(),
                        ptr::null_mut(),
                    ),
                ),
                Operand::Pointer(raw) => {
                    let usm = ctx.usm("unified memory read")?;
                    check(
                        "clEnqueueMemcpyINTEL",
                        (usm.enqueue_memcpy)(
                            ctx.queue,
                            CL_TRUE,
                            out.as_mut_ptr().cast(),
                            from_raw::<u8>(raw).add(offset).cast_const().cast(),
                            out.len(),
                            0,
                            ptr::null(),
                            ptr::null_mut(),
                        ),
                    )
                }
            }
        }
    }

    fn copy(&self, ctx: &OpenClContext, src: Operand, dst: Operand, size: usize) -> Result<()> {
        unsafe {
            match (src, dst) {
                (Operand::Buffer(s), Operand::Buffer(d)) => check(
                    "clEnqueueCopyBuffer",
                    (self.api.enqueue_copy_buffer)(
                        ctx.queue,
                        from_raw(s),
                        from_raw(d),
                        0,
                        0,
                        size,
                        0,
                        ptr::null(),
                        ptr::null_mut(),
                    ),
                ),
                (Operand::Pointer(s), Operand::Pointer(d)) => {
                    let usm = ctx.usm("unified memory copy")?;
                    check(
                        "clEnqueueMemcpyINTEL",
                        (usm.enqueue_memcpy)(
                            ctx.queue,
                            CL_FALSE,
                            from_raw(d),
                            from_raw::<c_void>(s).cast_const(),
                            size,
                            0,
                            ptr::null(),
                            ptr::null_mut(),
                        ),
                    )
                }
                _ => Err(PeerlinkError::unsupported(
                    RUNTIME,
                    "copy between buffer and unified memory",
                )),
            }
        }
    }

    fn export_handle(&self, ctx: &OpenClContext, mem: Operand) -> Result<NativeHandle> {
        let mut handle: u64 = 0;
        let out: *mut c_void = (&mut handle as *mut u64).cast();
        unsafe {
            match mem {
                Operand::Buffer(raw) => check(
                    "clGetMemObjectInfo(CL_MEM_ALLOCATION_HANDLE_INTEL)",
                    (self.api.get_mem_object_info)(
                        from_raw(raw),
                        CL_MEM_ALLOCATION_HANDLE_INTEL,
                        std::mem::size_of::<u64>(),
                        out,
                        ptr::null_mut(),
                    ),
                )?,
                Operand::Pointer(raw) => {
                    let usm = ctx.usm("unified memory export")?;
                    check(
                        "clGetMemAllocInfoINTEL(CL_MEM_ALLOCATION_HANDLE_INTEL)",
                        (usm.get_mem_alloc_info)(
                            ctx.context,
                            from_raw::<c_void>(raw).cast_const(),
                            CL_MEM_ALLOCATION_HANDLE_INTEL,
                            std::mem::size_of::<u64>(),
                            out,
                            ptr::null_mut(),
                        ),
                    )?
                }
            }
        }
        Ok(NativeHandle::new(handle))
    }

    fn import_handle(&self, ctx: &OpenClContext, handle: NativeHandle, size: usize) -> Result<Operand> {
        let properties: [cl_mem_properties; 3] =
            [CL_EXTERNAL_MEMORY_HANDLE_DMA_BUF_KHR, handle.as_u64(), 0];
        let mut err = CL_SUCCESS;
        let mem = unsafe {
            (self.api.create_buffer_with_properties)(
                ctx.context,
                properties.as_ptr(),
                0,
                size,
                ptr::null_mut(),
                &mut err,
            )
        };
        check("clCreateBufferWithProperties", err)?;
        Ok(Operand::Buffer(to_raw(mem)))
    }

    fn query_import(&self, _ctx: &OpenClContext, mem: Operand) -> Result<ImportInfo> {
        let Operand::Buffer(raw) = mem else {
            return Err(PeerlinkError::unsupported(RUNTIME, "query of a non-buffer import"));
        };
        let mut size: usize = 0;
        let mut object_type: cl_mem_object_type = 0;
        unsafe {
            check(
                "clGetMemObjectInfo(CL_MEM_SIZE)",
                (self.api.get_mem_object_info)(
                    from_raw(raw),
                    CL_MEM_SIZE,
                    std::mem::size_of::<usize>(),
                    (&mut size as *mut usize).cast(),
                    ptr::null_mut(),
                ),
            )?;
            check(
                "clGetMemObjectInfo(CL_MEM_TYPE)",
                (self.api.get_mem_object_info)(
                    from_raw(raw),
                    CL_MEM_TYPE,
                    std::mem::size_of::<cl_mem_object_type>(),
                    (&mut object_type as *mut cl_mem_object_type).cast(),
                    ptr::null_mut(),
                ),
            )?;
        }
        Ok(ImportInfo { size, object_type })
    }

    fn release_import(&self, _ctx: &OpenClContext, mem: Operand) -> Result<()> {
        unsafe { check("clReleaseMemObject", (self.api.release_mem_object)(from_raw(mem.raw()))) }
    }

    fn build_program(&self, ctx: &OpenClContext, source: &ProgramSource, options: &str) -> Result<u64> {
        let api = &self.api;
        let options = Self::c_string(options, "build options")?;
        let mut err = CL_SUCCESS;
        let program = unsafe {
            match source {
                ProgramSource::Text(text) => {
                    let strings = [text.as_ptr().cast()];
                    let lengths = [text.len()];
                    let program = (api.create_program_with_source)(
                        ctx.context,
                        1,
                        strings.as_ptr(),
                        lengths.as_ptr(),
                        &mut err,
                    );
                    check("clCreateProgramWithSource", err)?;
                    program
                }
                ProgramSource::SpirV(il) => {
                    let create = api
                        .create_program_with_il
                        .ok_or_else(|| PeerlinkError::unsupported(RUNTIME, "SPIR-V programs"))?;
                    let program = create(ctx.context, il.as_ptr().cast(), il.len(), &mut err);
                    check("clCreateProgramWithIL", err)?;
                    program
                }
            }
        };

        let status = unsafe {
            (api.build_program)(program, 1, &ctx.device, options.as_ptr(), None, ptr::null_mut())
        };
        if status != CL_SUCCESS {
            let log = self.build_log(ctx, program);
            unsafe {
                (api.release_program)(program);
            }
            return Err(PeerlinkError::Build {
                entry: String::new(),
                status: i64::from(status),
                log,
            });
        }
        Ok(to_raw(program))
    }

    fn create_kernel(&self, _ctx: &OpenClContext, program: u64, entry: &str) -> Result<u64> {
        let name = Self::c_string(entry, "kernel name")?;
        let mut err = CL_SUCCESS;
        let kernel = unsafe { (self.api.create_kernel)(from_raw(program), name.as_ptr(), &mut err) };
        check("clCreateKernel", err)?;
        Ok(to_raw(kernel))
    }

    fn set_kernel_arg(&self, ctx: &OpenClContext, kernel: u64, index: u32, operand: Operand) -> Result<()> {
        unsafe {
            match operand {
                Operand::Buffer(raw) => {
                    let mem: cl_mem = from_raw(raw);
                    check(
                        "clSetKernelArg",
                        (self.api.set_kernel_arg)(
                            from_raw(kernel),
                            index,
                            std::mem::size_of::<cl_mem>(),
                            (&mem as *const cl_mem).cast(),
                        ),
                    )
                }
                Operand::Pointer(raw) => {
                    let usm = ctx.usm("pointer kernel arguments")?;
                    check(
                        "clSetKernelArgMemPointerINTEL",
                        (usm.set_kernel_arg_mem_pointer)(
                            from_raw(kernel),
                            index,
                            from_raw::<c_void>(raw).cast_const(),
                        ),
                    )
                }
            }
        }
    }

    fn launch(&self, ctx: &OpenClContext, kernel: u64, global_size: usize) -> Result<()> {
        let global = [global_size];
        unsafe {
            check(
                "clEnqueueNDRangeKernel",
                (self.api.enqueue_nd_range_kernel)(
                    ctx.queue,
                    from_raw(kernel),
                    1,
                    ptr::null(),
                    global.as_ptr(),
                    ptr::null(),
                    0,
                    ptr::null(),
                    ptr::null_mut(),
                ),
            )
        }
    }

    fn release_kernel(&self, _ctx: &OpenClContext, kernel: u64) -> Result<()> {
        unsafe { check("clReleaseKernel", (self.api.release_kernel)(from_raw(kernel))) }
    }

    fn release_program(&self, _ctx: &OpenClContext, program: u64) -> Result<()> {
        unsafe { check("clReleaseProgram", (self.api.release_program)(from_raw(program))) }
    }

    fn global_mem_size(&self, ctx: &OpenClContext) -> Result<u64> {
        self.device_global_mem(ctx.device)
    }
}

impl std::fmt::Debug for OpenClContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenClContext")
            .field("platform", &self.platform)
            .field("device", &self.device)
            .field("context", &self.context)
            .field("queue", &self.queue)
            .field("usm", &self.usm.is_some())
            .finish()
    }
}
