//! In-process reference runtime backed by host memory.
//!
//! Devices, queues and allocations are simulated. Allocations live in a
//! handle table ("fabric") that sibling backends share, the way two driver
//! runtimes in one process share the OS file-descriptor table: a handle
//! exported through one backend imports through any sibling. Work executes
//! at enqueue time, so `finish` only records the drain.
//!
//! Kernels are host closures registered by entry-point name together with
//! their argument count. Building a program parses the `kernel void <name>(`
//! declarations of its OpenCL C text; creating a kernel requires the name to
//! be declared by the program and registered with the backend. A launch
//! consumes the bound arguments, so every launch binds all of them again.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::device::backend::Backend;
use crate::error::{PeerlinkError, Result};
use crate::kernel::{ProgramSource, builtin};
use crate::types::{
    BackingKind, DeviceInfo, ELEMENT_SIZE, ImportInfo, NativeHandle, Operand, bytes_to_u32s,
    u32s_to_bytes,
};

/// Status codes reported by the host runtime. Values follow OpenCL.
pub mod status {
    pub const BUILD_PROGRAM_FAILURE: i64 = -11;
    pub const INVALID_VALUE: i64 = -30;
    pub const INVALID_DEVICE: i64 = -33;
    pub const INVALID_CONTEXT: i64 = -34;
    pub const INVALID_MEM_OBJECT: i64 = -38;
    pub const INVALID_PROGRAM: i64 = -44;
    pub const INVALID_KERNEL_NAME: i64 = -46;
    pub const INVALID_KERNEL: i64 = -48;
    pub const INVALID_ARG_INDEX: i64 = -49;
    pub const INVALID_KERNEL_ARGS: i64 = -52;
    pub const INVALID_GLOBAL_WORK_SIZE: i64 = -63;
    pub const OUT_OF_RESOURCES: i64 = -5;

    pub fn name(status: i64) -> &'static str {
        match status {
            BUILD_PROGRAM_FAILURE => "BUILD_PROGRAM_FAILURE",
            INVALID_VALUE => "INVALID_VALUE",
            INVALID_DEVICE => "INVALID_DEVICE",
            INVALID_CONTEXT => "INVALID_CONTEXT",
            INVALID_MEM_OBJECT => "INVALID_MEM_OBJECT",
            INVALID_PROGRAM => "INVALID_PROGRAM",
            INVALID_KERNEL_NAME => "INVALID_KERNEL_NAME",
            INVALID_KERNEL => "INVALID_KERNEL",
            INVALID_ARG_INDEX => "INVALID_ARG_INDEX",
            INVALID_KERNEL_ARGS => "INVALID_KERNEL_ARGS",
            INVALID_GLOBAL_WORK_SIZE => "INVALID_GLOBAL_WORK_SIZE",
            OUT_OF_RESOURCES => "OUT_OF_RESOURCES",
            _ => "UNKNOWN",
        }
    }
}

/// Object type reported for imported allocations (`CL_MEM_OBJECT_BUFFER`).
pub const HOST_BUFFER_OBJECT_TYPE: u32 = 0x10F0;

/// Work-item body of a host kernel: `(global_id, arguments)`.
pub type HostKernel = Arc<dyn Fn(usize, &mut KernelArgs<'_>) + Send + Sync>;

/// The bound arguments of one launch, as `u32` elements.
///
/// Arguments naming the same allocation (a region and an import of it) share
/// one copy, so a write through either is visible through both. Whatever the
/// body writes is stored back after the launch.
pub struct KernelArgs<'a> {
    slots: &'a mut [Vec<u32>],
    bindings: &'a [usize],
}

impl KernelArgs<'_> {
    /// Number of bound arguments; always the kernel's registered arity.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get(&self, arg: usize, id: usize) -> u32 {
        self.slots[self.bindings[arg]][id]
    }

    pub fn set(&mut self, arg: usize, id: usize, value: u32) {
        let slot = self.bindings[arg];
        self.slots[slot][id] = value;
    }
}

#[derive(Clone)]
struct RegisteredKernel {
    arity: u32,
    body: HostKernel,
}

/// Which runtime shape a host backend imitates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostFlavor {
    /// Buffer objects and unified pointers; imports come back as buffers.
    BufferCentric,
    /// Device pointers only; imports come back as pointers.
    PointerCentric,
}

/// Counters of runtime calls, for observing lifecycle behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    pub contexts_created: usize,
    pub contexts_destroyed: usize,
    pub allocations: usize,
    pub frees: usize,
    pub exports: usize,
    pub imports: usize,
    pub imports_released: usize,
    pub programs_built: usize,
    pub programs_released: usize,
    pub kernels_created: usize,
    pub kernels_released: usize,
    pub launches: usize,
    pub copies: usize,
    pub finishes: usize,
}

/// Native state of one host context.
#[derive(Debug)]
pub struct HostContext {
    id: u64,
    device: usize,
}

struct View {
    ctx: u64,
    kind: BackingKind,
    alloc: u64,
    imported: bool,
}

struct HostKernelObject {
    entry: String,
    arity: u32,
    args: BTreeMap<u32, Operand>,
}

#[derive(Default)]
struct Fabric {
    next_id: u64,
    next_fd: u64,
    allocations: HashMap<u64, Vec<u8>>,
    views: HashMap<u64, View>,
    fd_to_alloc: HashMap<u64, u64>,
    alloc_to_fd: HashMap<u64, u64>,
    programs: HashMap<u64, Vec<String>>,
    kernels: HashMap<u64, HostKernelObject>,
}

impl Fabric {
    fn id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Reference runtime backed by host memory. See the module docs.
#[derive(Clone)]
pub struct HostBackend {
    name: &'static str,
    flavor: HostFlavor,
    device_count: usize,
    fabric: Arc<Mutex<Fabric>>,
    kernels: Arc<RwLock<HashMap<String, RegisteredKernel>>>,
    stats: Arc<Mutex<HostStats>>,
}

impl std::fmt::Debug for HostBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBackend")
            .field("name", &self.name)
            .field("flavor", &self.flavor)
            .field("device_count", &self.device_count)
            .finish()
    }
}

impl HostBackend {
    /// Buffer-centric host runtime exposing `device_count` GPUs, with the
    /// built-in scenario kernels registered.
    pub fn new(device_count: usize) -> Self {
        let backend = Self {
            name: "host",
            flavor: HostFlavor::BufferCentric,
            device_count,
            fabric: Arc::new(Mutex::new(Fabric {
                next_fd: 3,
                ..Fabric::default()
            })),
            kernels: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(Mutex::new(HostStats::default())),
        };
        backend.register_builtin_kernels();
        backend
    }

    /// A second runtime in the same process: shares the handle table and the
    /// kernel registry, keeps its own call counters.
    pub fn sibling(&self, name: &'static str, flavor: HostFlavor) -> Self {
        Self {
            name,
            flavor,
            device_count: self.device_count,
            fabric: Arc::clone(&self.fabric),
            kernels: Arc::clone(&self.kernels),
            stats: Arc::new(Mutex::new(HostStats::default())),
        }
    }

    pub fn flavor(&self) -> HostFlavor {
        self.flavor
    }

    /// Register (or replace) the host implementation of kernel `entry`,
    /// taking exactly `arity` arguments.
    pub fn register_kernel<F>(&self, entry: impl Into<String>, arity: u32, body: F)
    where
        F: Fn(usize, &mut KernelArgs<'_>) + Send + Sync + 'static,
    {
        if let Ok(mut kernels) = self.kernels.write() {
            kernels.insert(
                entry.into(),
                RegisteredKernel {
                    arity,
                    body: Arc::new(body),
                },
            );
        }
    }

    pub fn stats(&self) -> HostStats {
        self.stats.lock().map(|s| *s).unwrap_or_default()
    }

    /// Number of live allocations in the shared handle table.
    pub fn live_allocations(&self) -> usize {
        self.fabric.lock().map(|f| f.allocations.len()).unwrap_or(0)
    }

    fn register_builtin_kernels(&self) {
        self.register_kernel(builtin::WRITE_TO_REMOTE, 2, |id, a| {
            let v = a.get(0, id);
            a.set(1, id, v);
        });
        self.register_kernel(builtin::READ_FROM_REMOTE, 2, |id, a| {
            let v = a.get(1, id).wrapping_mul(3);
            a.set(0, id, v);
        });
        self.register_kernel(builtin::SCALE_TO_REMOTE, 2, |id, a| {
            let v = a.get(0, id).wrapping_mul(5);
            a.set(1, id, v);
        });
        self.register_kernel(builtin::ACCUMULATE_REMOTE, 3, |id, a| {
            let v = a.get(1, id).wrapping_add(a.get(2, id));
            a.set(0, id, v);
        });
        self.register_kernel(builtin::LOCAL_WRITE_TO_REMOTE, 2, |id, a| {
            let v = a.get(1, id).wrapping_mul(5);
            a.set(0, id, v);
        });
    }

    fn fail(&self, call: &'static str, status: i64) -> PeerlinkError {
        PeerlinkError::driver_call(self.name, call, status, status::name(status))
    }

    fn fabric(&self) -> Result<MutexGuard<'_, Fabric>> {
        self.fabric
            .lock()
            .map_err(|_| self.fail("fabric lock", status::OUT_OF_RESOURCES))
    }

    fn count(&self, f: impl FnOnce(&mut HostStats)) {
        if let Ok(mut s) = self.stats.lock() {
            f(&mut s);
        }
    }

    /// Resolve an operand of `ctx` to its allocation id.
    fn resolve(
        &self,
        fabric: &Fabric,
        ctx: &HostContext,
        mem: Operand,
        call: &'static str,
    ) -> Result<u64> {
        match fabric.views.get(&mem.raw()) {
            Some(view)
                if view.ctx == ctx.id
                    && view.kind == mem.kind()
                    && fabric.allocations.contains_key(&view.alloc) =>
            {
                Ok(view.alloc)
            }
            _ => Err(self.fail(call, status::INVALID_MEM_OBJECT)),
        }
    }

    fn allocate(&self, ctx: &HostContext, size: usize, kind: BackingKind) -> Result<Operand> {
        if size == 0 {
            return Err(self.fail("alloc", status::INVALID_VALUE));
        }
        let mut fabric = self.fabric()?;
        let alloc = fabric.id();
        fabric.allocations.insert(alloc, vec![0u8; size]);
        let raw = fabric.id();
        fabric.views.insert(
            raw,
            View {
                ctx: ctx.id,
                kind,
                alloc,
                imported: false,
            },
        );
        drop(fabric);
        self.count(|s| s.allocations += 1);
        Ok(Operand::new(kind, raw))
    }
}

/// Entry points declared by `kernel void <name>(` in OpenCL C text.
fn declared_kernels(source: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut rest = source;
    while let Some(pos) = rest.find("kernel void ") {
        let after = &rest[pos + "kernel void ".len()..];
        let name: String = after
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if !name.is_empty() {
            entries.push(name);
        }
        rest = after;
    }
    entries
}

impl Backend for HostBackend {
    type Context = HostContext;

    fn name(&self) -> &'static str {
        self.name
    }

    fn gpu_devices(&self) -> Result<Vec<DeviceInfo>> {
        if self.device_count == 0 {
            return Err(PeerlinkError::NoGpuDevice { runtime: self.name });
        }
        Ok((0..self.device_count)
            .map(|i| DeviceInfo {
                index: i,
                platform: 1,
                device: 0x100 + i as u64,
                name: format!("Host Device {i}"),
                global_mem_bytes: 1 << 30,
            })
            .collect())
    }

    fn create_context(&self, device: &DeviceInfo) -> Result<HostContext> {
        if device.index >= self.device_count {
            return Err(self.fail("create_context", status::INVALID_DEVICE));
        }
        let id = self.fabric()?.id();
        self.count(|s| s.contexts_created += 1);
        Ok(HostContext {
            id,
            device: device.index,
        })
    }

    fn destroy_context(&self, ctx: &mut HostContext) -> Result<()> {
        let mut fabric = self.fabric()?;
        let ctx_id = ctx.id;
        fabric.views.retain(|_, v| v.ctx != ctx_id);
        drop(fabric);
        self.count(|s| s.contexts_destroyed += 1);
        Ok(())
    }

    fn finish(&self, _ctx: &HostContext) -> Result<()> {
        self.count(|s| s.finishes += 1);
        Ok(())
    }

    fn alloc_buffer(&self, ctx: &HostContext, size: usize) -> Result<Operand> {
        match self.flavor {
            HostFlavor::BufferCentric => self.allocate(ctx, size, BackingKind::Buffer),
            HostFlavor::PointerCentric => {
                Err(PeerlinkError::unsupported(self.name, "buffer allocation"))
            }
        }
    }

    fn alloc_unified(&self, ctx: &HostContext, size: usize, alignment: usize) -> Result<Operand> {
        if !alignment.is_power_of_two() {
            return Err(self.fail("alloc_unified", status::INVALID_VALUE));
        }
        self.allocate(ctx, size, BackingKind::Unified)
    }

    fn free(&self, ctx: &HostContext, mem: Operand) -> Result<()> {
        let mut fabric = self.fabric()?;
        let alloc = self.resolve(&fabric, ctx, mem, "free")?;
        if fabric.views.get(&mem.raw()).is_some_and(|v| v.imported) {
            return Err(self.fail("free", status::INVALID_MEM_OBJECT));
        }
        fabric.views.remove(&mem.raw());
        fabric.allocations.remove(&alloc);
        if let Some(fd) = fabric.alloc_to_fd.remove(&alloc) {
            fabric.fd_to_alloc.remove(&fd);
        }
        drop(fabric);
        self.count(|s| s.frees += 1);
        Ok(())
    }

    fn write(&self, ctx: &HostContext, dst: Operand, offset: usize, data: &[u8]) -> Result<()> {
        let mut fabric = self.fabric()?;
        let alloc = self.resolve(&fabric, ctx, dst, "write")?;
        let bytes = fabric
            .allocations
            .get_mut(&alloc)
            .ok_or_else(|| self.fail("write", status::INVALID_MEM_OBJECT))?;
        let end = offset
            .checked_add(data.len())
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| self.fail("write", status::INVALID_VALUE))?;
        bytes[offset..end].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, ctx: &HostContext, src: Operand, offset: usize, out: &mut [u8]) -> Result<()> {
        let fabric = self.fabric()?;
        let alloc = self.resolve(&fabric, ctx, src, "read")?;
        let bytes = fabric
            .allocations
            .get(&alloc)
            .ok_or_else(|| self.fail("read", status::INVALID_MEM_OBJECT))?;
        let end = offset
            .checked_add(out.len())
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| self.fail("read", status::INVALID_VALUE))?;
        out.copy_from_slice(&bytes[offset..end]);
        Ok(())
    }

    fn copy(&self, ctx: &HostContext, src: Operand, dst: Operand, size: usize) -> Result<()> {
        let mut fabric = self.fabric()?;
        let src_alloc = self.resolve(&fabric, ctx, src, "copy")?;
        let dst_alloc = self.resolve(&fabric, ctx, dst, "copy")?;
        let data = match fabric.allocations.get(&src_alloc) {
            Some(bytes) if size <= bytes.len() => bytes[..size].to_vec(),
            _ => return Err(self.fail("copy", status::INVALID_VALUE)),
        };
        match fabric.allocations.get_mut(&dst_alloc) {
            Some(bytes) if size <= bytes.len() => bytes[..size].copy_from_slice(&data),
            _ => return Err(self.fail("copy", status::INVALID_VALUE)),
        }
        drop(fabric);
        self.count(|s| s.copies += 1);
        Ok(())
    }

    fn export_handle(&self, ctx: &HostContext, mem: Operand) -> Result<NativeHandle> {
        let mut fabric = self.fabric()?;
        let alloc = self.resolve(&fabric, ctx, mem, "export_handle")?;
        let fd = match fabric.alloc_to_fd.get(&alloc) {
            Some(&fd) => fd,
            None => {
                let fd = fabric.next_fd;
                fabric.next_fd += 1;
                fabric.alloc_to_fd.insert(alloc, fd);
                fabric.fd_to_alloc.insert(fd, alloc);
                fd
            }
        };
        drop(fabric);
        self.count(|s| s.exports += 1);
        Ok(NativeHandle::new(fd))
    }

    fn import_handle(&self, ctx: &HostContext, handle: NativeHandle, size: usize) -> Result<Operand> {
        if size == 0 {
            return Err(self.fail("import_handle", status::INVALID_VALUE));
        }
        let mut fabric = self.fabric()?;
        let alloc = *fabric
            .fd_to_alloc
            .get(&handle.as_u64())
            .ok_or_else(|| self.fail("import_handle", status::INVALID_MEM_OBJECT))?;
        let kind = match self.flavor {
            HostFlavor::BufferCentric => BackingKind::Buffer,
            HostFlavor::PointerCentric => BackingKind::Unified,
        };
        let raw = fabric.id();
        fabric.views.insert(
            raw,
            View {
                ctx: ctx.id,
                kind,
                alloc,
                imported: true,
            },
        );
        drop(fabric);
        self.count(|s| s.imports += 1);
        Ok(Operand::new(kind, raw))
    }

    fn query_import(&self, ctx: &HostContext, mem: Operand) -> Result<ImportInfo> {
        let fabric = self.fabric()?;
        let alloc = self.resolve(&fabric, ctx, mem, "query_import")?;
        let size = fabric.allocations.get(&alloc).map_or(0, Vec::len);
        Ok(ImportInfo {
            size,
            object_type: HOST_BUFFER_OBJECT_TYPE,
        })
    }

    fn release_import(&self, ctx: &HostContext, mem: Operand) -> Result<()> {
        let mut fabric = self.fabric()?;
        match fabric.views.get(&mem.raw()) {
            Some(view) if view.ctx == ctx.id && view.imported => {
                fabric.views.remove(&mem.raw());
            }
            _ => return Err(self.fail("release_import", status::INVALID_MEM_OBJECT)),
        }
        drop(fabric);
        self.count(|s| s.imports_released += 1);
        Ok(())
    }

    fn build_program(&self, _ctx: &HostContext, source: &ProgramSource, options: &str) -> Result<u64> {
        let entries = match source {
            ProgramSource::Text(text) => declared_kernels(text),
            ProgramSource::SpirV(_) => {
                return Err(PeerlinkError::Build {
                    entry: String::new(),
                    status: status::BUILD_PROGRAM_FAILURE,
                    log: "error: host runtime builds OpenCL C text only".into(),
                });
            }
        };
        if entries.is_empty() {
            return Err(PeerlinkError::Build {
                entry: String::new(),
                status: status::BUILD_PROGRAM_FAILURE,
                log: format!("error: program declares no kernels (options: {options})"),
            });
        }
        let mut fabric = self.fabric()?;
        let program = fabric.id();
        fabric.programs.insert(program, entries);
        drop(fabric);
        self.count(|s| s.programs_built += 1);
        Ok(program)
    }

    fn create_kernel(&self, _ctx: &HostContext, program: u64, entry: &str) -> Result<u64> {
        let arity = self
            .kernels
            .read()
            .ok()
            .and_then(|k| k.get(entry).map(|r| r.arity));
        let mut fabric = self.fabric()?;
        let declared = fabric
            .programs
            .get(&program)
            .ok_or_else(|| self.fail("create_kernel", status::INVALID_PROGRAM))?
            .iter()
            .any(|e| e == entry);
        let arity = match arity {
            Some(arity) if declared => arity,
            _ => return Err(self.fail("create_kernel", status::INVALID_KERNEL_NAME)),
        };
        let kernel = fabric.id();
        fabric.kernels.insert(
            kernel,
            HostKernelObject {
                entry: entry.to_string(),
                arity,
                args: BTreeMap::new(),
            },
        );
        drop(fabric);
        self.count(|s| s.kernels_created += 1);
        Ok(kernel)
    }

    fn set_kernel_arg(&self, ctx: &HostContext, kernel: u64, index: u32, operand: Operand) -> Result<()> {
        let mut fabric = self.fabric()?;
        self.resolve(&fabric, ctx, operand, "set_kernel_arg")?;
        let obj = fabric
            .kernels
            .get_mut(&kernel)
            .ok_or_else(|| self.fail("set_kernel_arg", status::INVALID_KERNEL))?;
        if index >= obj.arity {
            return Err(self.fail("set_kernel_arg", status::INVALID_ARG_INDEX));
        }
        obj.args.insert(index, operand);
        Ok(())
    }

    fn launch(&self, ctx: &HostContext, kernel: u64, global_size: usize) -> Result<()> {
        let mut fabric = self.fabric()?;
        let (entry, arity, args) = match fabric.kernels.get_mut(&kernel) {
            Some(obj) => (obj.entry.clone(), obj.arity, std::mem::take(&mut obj.args)),
            None => return Err(self.fail("launch", status::INVALID_KERNEL)),
        };
        let body = self
            .kernels
            .read()
            .ok()
            .and_then(|k| k.get(&entry).map(|r| Arc::clone(&r.body)))
            .ok_or_else(|| self.fail("launch", status::INVALID_KERNEL))?;

        // Every argument index below the arity must be bound.
        if args.len() != arity as usize || args.keys().enumerate().any(|(i, &idx)| i as u32 != idx) {
            return Err(self.fail("launch", status::INVALID_KERNEL_ARGS));
        }

        // One copy per allocation; aliased arguments bind to the same slot.
        let mut allocs: Vec<u64> = Vec::with_capacity(args.len());
        let mut data = Vec::with_capacity(args.len());
        let mut bindings = Vec::with_capacity(args.len());
        for operand in args.values() {
            let alloc = self.resolve(&fabric, ctx, *operand, "launch")?;
            if let Some(slot) = allocs.iter().position(|&a| a == alloc) {
                bindings.push(slot);
                continue;
            }
            let bytes = fabric
                .allocations
                .get(&alloc)
                .ok_or_else(|| self.fail("launch", status::INVALID_MEM_OBJECT))?;
            if bytes.len() / ELEMENT_SIZE < global_size {
                return Err(self.fail("launch", status::INVALID_GLOBAL_WORK_SIZE));
            }
            bindings.push(allocs.len());
            allocs.push(alloc);
            data.push(bytes_to_u32s(bytes));
        }

        let mut bound = KernelArgs {
            slots: &mut data,
            bindings: &bindings,
        };
        for id in 0..global_size {
            body(id, &mut bound);
        }

        for (alloc, values) in allocs.into_iter().zip(data) {
            if let Some(bytes) = fabric.allocations.get_mut(&alloc) {
                *bytes = u32s_to_bytes(&values);
            }
        }
        drop(fabric);
        self.count(|s| s.launches += 1);
        tracing::debug!(runtime = self.name, device = ctx.device, entry = %entry, global_size, "host launch");
        Ok(())
    }

    fn release_kernel(&self, _ctx: &HostContext, kernel: u64) -> Result<()> {
        if self.fabric()?.kernels.remove(&kernel).is_none() {
            return Err(self.fail("release_kernel", status::INVALID_KERNEL));
        }
        self.count(|s| s.kernels_released += 1);
        Ok(())
    }

    fn release_program(&self, _ctx: &HostContext, program: u64) -> Result<()> {
        if self.fabric()?.programs.remove(&program).is_none() {
            return Err(self.fail("release_program", status::INVALID_PROGRAM));
        }
        self.count(|s| s.programs_released += 1);
        Ok(())
    }

    fn global_mem_size(&self, _ctx: &HostContext) -> Result<u64> {
        Ok(1 << 30)
    }
}
