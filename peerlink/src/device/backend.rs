use crate::error::{PeerlinkError, Result};
use crate::kernel::ProgramSource;
use crate::types::{DeviceInfo, ImportInfo, NativeHandle, Operand};

/// A GPU compute runtime peerlink can drive.
///
/// peerlink operates on raw `u64` handles: buffer objects, device pointers,
/// programs and kernels are all passed back and forth as integers, tagged
/// with [`Operand`] where the kind matters. Each runtime owns the mapping
/// from those integers to its native objects.
///
/// - [`HostBackend`](crate::HostBackend) (built-in): host memory, in-process handle table.
/// - Driver runtimes: OpenCL (buffer-centric) and Level Zero
///   (device-pointer-centric), implemented in their own crates.
///
/// # Queue model
///
/// Every context has one in-order queue. Methods that enqueue work (`write`,
/// `read`, `copy`, `launch`) may return before the work completes, except
/// where noted; [`finish`](Backend::finish) blocks until the queue is idle.
/// Callers always drain after enqueueing, so the observable model is
/// synchronous.
pub trait Backend: Send + Sync + 'static {
    /// Native context + queue state of one device.
    type Context: Send + Sync;

    /// Short runtime name used in logs and errors.
    fn name(&self) -> &'static str;

    /// GPU devices of the first platform that exposes at least one.
    fn gpu_devices(&self) -> Result<Vec<DeviceInfo>>;

    /// Create a context and a single in-order queue bound to `device`.
    fn create_context(&self, device: &DeviceInfo) -> Result<Self::Context>;

    /// Release queue, then context. Called exactly once per context.
    fn destroy_context(&self, ctx: &mut Self::Context) -> Result<()>;

    /// Block until every operation enqueued on the queue has completed.
    fn finish(&self, ctx: &Self::Context) -> Result<()>;

    /// Allocate a read-write buffer object of `size` bytes.
    ///
    /// Default: unsupported (pointer-only runtimes).
    fn alloc_buffer(&self, _ctx: &Self::Context, _size: usize) -> Result<Operand> {
        Err(PeerlinkError::unsupported(self.name(), "buffer allocation"))
    }

    /// Allocate `size` bytes of device memory addressed by pointer.
    fn alloc_unified(&self, ctx: &Self::Context, size: usize, alignment: usize)
    -> Result<Operand>;

    /// Release an allocation made by this runtime.
    fn free(&self, ctx: &Self::Context, mem: Operand) -> Result<()>;

    /// Blocking host-to-device write of `data` at byte `offset`.
    fn write(&self, ctx: &Self::Context, dst: Operand, offset: usize, data: &[u8]) -> Result<()>;

    /// Blocking device-to-host read into `out` from byte `offset`.
    fn read(&self, ctx: &Self::Context, src: Operand, offset: usize, out: &mut [u8]) -> Result<()>;

    /// Enqueue a device-to-device copy of `size` bytes.
    fn copy(&self, ctx: &Self::Context, src: Operand, dst: Operand, size: usize) -> Result<()>;

    /// Derive the process-shareable handle of an allocation.
    ///
    /// Must not change the allocation; repeated calls name the same memory.
    fn export_handle(&self, ctx: &Self::Context, mem: Operand) -> Result<NativeHandle>;

    /// Map a foreign allocation into this context.
    ///
    /// The result is a wrapper: releasing it never frees the origin memory.
    fn import_handle(&self, ctx: &Self::Context, handle: NativeHandle, size: usize)
    -> Result<Operand>;

    /// Real size and object type of an imported allocation.
    fn query_import(&self, ctx: &Self::Context, mem: Operand) -> Result<ImportInfo>;

    /// Release the local wrapper created by [`import_handle`](Backend::import_handle).
    fn release_import(&self, ctx: &Self::Context, mem: Operand) -> Result<()>;

    /// Build `source` with `options`.
    ///
    /// On failure returns [`PeerlinkError::Build`] carrying the full build
    /// log; the partially built program is released by the runtime.
    fn build_program(&self, ctx: &Self::Context, source: &ProgramSource, options: &str)
    -> Result<u64>;

    /// Create the kernel `entry` from a built program.
    fn create_kernel(&self, ctx: &Self::Context, program: u64, entry: &str) -> Result<u64>;

    /// Bind `operand` to positional argument `index`.
    fn set_kernel_arg(&self, ctx: &Self::Context, kernel: u64, index: u32, operand: Operand)
    -> Result<()>;

    /// Enqueue a 1-D launch over `[0, global_size)` with runtime-chosen grouping.
    fn launch(&self, ctx: &Self::Context, kernel: u64, global_size: usize) -> Result<()>;

    fn release_kernel(&self, ctx: &Self::Context, kernel: u64) -> Result<()>;

    fn release_program(&self, ctx: &Self::Context, program: u64) -> Result<()>;

    /// Global memory size of the context's device in bytes.
    fn global_mem_size(&self, ctx: &Self::Context) -> Result<u64>;
}
