//! Per-device runtime state: context plus one in-order command queue.
//!
//! Lifecycle:
//! 1. `DeviceContext::init()` validates the device index and creates the
//!    context and queue.
//! 2. Regions, imports and runners hold an `Arc` to the context.
//! 3. `teardown()` (or the last drop) releases queue then context, once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::PeerlinkConfig;
use crate::device::Backend;
use crate::error::{PeerlinkError, Result};
use crate::memory::{ImportedRegion, MemoryRegion};
use crate::types::{
    ContextId, DeviceIndex, DeviceInfo, ELEMENT_SIZE, NativeHandle, Operand, bytes_to_u32s,
    u32s_to_bytes,
};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// One physical GPU opened through a [`Backend`].
pub struct DeviceContext<B: Backend> {
    backend: Arc<B>,
    device: DeviceInfo,
    id: ContextId,
    unified_alignment: usize,
    /// `None` once torn down.
    native: RwLock<Option<B::Context>>,
}

impl<B: Backend> DeviceContext<B> {
    /// Open GPU `device_index` of the first platform that exposes a GPU.
    pub fn init(backend: Arc<B>, device_index: DeviceIndex) -> Result<Arc<Self>> {
        Self::init_with(backend, device_index, &PeerlinkConfig::default())
    }

    /// Like [`init`](Self::init), taking allocation parameters from `config`.
    pub fn init_with(
        backend: Arc<B>,
        device_index: DeviceIndex,
        config: &PeerlinkConfig,
    ) -> Result<Arc<Self>> {
        let devices = backend.gpu_devices()?;
        let count = devices.len();
        let device = devices
            .into_iter()
            .nth(device_index)
            .ok_or(PeerlinkError::DeviceIndexOutOfRange {
                index: device_index,
                count,
            })?;

        let native = backend.create_context(&device)?;
        let id = ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed));
        tracing::info!(
            runtime = backend.name(),
            ctx = %id,
            index = device.index,
            name = %device.name,
            "opened device"
        );

        Ok(Arc::new(Self {
            backend,
            device,
            id,
            unified_alignment: config.unified_alignment,
            native: RwLock::new(Some(native)),
        }))
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Short name of the runtime this context was opened with.
    pub fn runtime(&self) -> &'static str {
        self.backend.name()
    }

    pub fn unified_alignment(&self) -> usize {
        self.unified_alignment
    }

    pub fn is_live(&self) -> bool {
        self.native
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Run `f` against the native context, failing if it was torn down.
    pub(crate) fn with_native<R>(&self, f: impl FnOnce(&B, &B::Context) -> Result<R>) -> Result<R> {
        let guard = self.native.read().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(native) => f(&self.backend, native),
            None => Err(PeerlinkError::ContextReleased(self.id.as_u64())),
        }
    }

    /// Block until every operation enqueued on the queue has completed.
    pub fn drain(&self) -> Result<()> {
        self.with_native(|b, ctx| b.finish(ctx))
    }

    /// Global memory size of the device in bytes.
    pub fn global_mem_size(&self) -> Result<u64> {
        self.with_native(|b, ctx| b.global_mem_size(ctx))
    }

    /// Write `values` at element `offset` of `dst`, then drain.
    pub fn write_u32(&self, dst: Operand, offset: usize, values: &[u32]) -> Result<()> {
        let bytes = u32s_to_bytes(values);
        self.with_native(|b, ctx| {
            b.write(ctx, dst, offset * ELEMENT_SIZE, &bytes)?;
            b.finish(ctx)
        })
    }

    /// Read `count` elements starting at element `offset` of `src`.
    pub fn read_u32(&self, src: Operand, offset: usize, count: usize) -> Result<Vec<u32>> {
        let mut bytes = vec![0u8; count * ELEMENT_SIZE];
        self.with_native(|b, ctx| {
            b.finish(ctx)?;
            b.read(ctx, src, offset * ELEMENT_SIZE, &mut bytes)
        })?;
        Ok(bytes_to_u32s(&bytes))
    }

    /// Allocate a buffer-backed region of `size` bytes.
    ///
    /// `initial`, if given, must cover exactly `size` bytes; it is written
    /// and drained before returning.
    pub fn allocate_buffer(
        self: &Arc<Self>,
        size: usize,
        initial: Option<&[u32]>,
    ) -> Result<MemoryRegion<B>> {
        MemoryRegion::buffer(self, size, initial)
    }

    /// Allocate a unified-memory region of `elem_count` elements filled with
    /// `offset + (i mod 1024)`.
    pub fn allocate_unified(
        self: &Arc<Self>,
        elem_count: usize,
        offset: u32,
    ) -> Result<MemoryRegion<B>> {
        MemoryRegion::unified(self, elem_count, offset)
    }

    /// Import a foreign allocation named by `handle` into this context.
    pub fn import_from_handle(
        self: &Arc<Self>,
        handle: NativeHandle,
        size: usize,
    ) -> Result<ImportedRegion<B>> {
        ImportedRegion::import(self, handle, size)
    }

    /// Release queue and context. Idempotent.
    pub fn teardown(&self) -> Result<()> {
        let taken = self
            .native
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match taken {
            Some(mut native) => {
                self.backend.destroy_context(&mut native)?;
                tracing::debug!(runtime = self.runtime(), ctx = %self.id, "device context released");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl<B: Backend> Drop for DeviceContext<B> {
    fn drop(&mut self) {
        if let Err(e) = self.teardown() {
            tracing::warn!(runtime = self.runtime(), ctx = %self.id, error = %e, "device context teardown failed");
        }
    }
}

impl<B: Backend> std::fmt::Debug for DeviceContext<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceContext")
            .field("runtime", &self.runtime())
            .field("id", &self.id)
            .field("device", &self.device)
            .field("live", &self.is_live())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HostBackend;

    #[test]
    fn test_init_every_valid_index() {
        let backend = Arc::new(HostBackend::new(3));
        for index in 0..3 {
            let ctx = DeviceContext::init(Arc::clone(&backend), index).unwrap();
            assert_eq!(ctx.device().index, index);
            ctx.drain().unwrap();
        }
    }

    #[test]
    fn test_index_equal_to_count_creates_nothing() {
        let backend = Arc::new(HostBackend::new(2));
        let err = DeviceContext::init(Arc::clone(&backend), 2).unwrap_err();
        assert!(matches!(
            err,
            PeerlinkError::DeviceIndexOutOfRange { index: 2, count: 2 }
        ));
        assert_eq!(backend.stats().contexts_created, 0);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let backend = Arc::new(HostBackend::new(1));
        let ctx = DeviceContext::init(Arc::clone(&backend), 0).unwrap();
        ctx.teardown().unwrap();
        ctx.teardown().unwrap();
        drop(ctx);
        assert_eq!(backend.stats().contexts_destroyed, 1);
    }

    #[test]
    fn test_operations_after_teardown_fail() {
        let backend = Arc::new(HostBackend::new(1));
        let ctx = DeviceContext::init(backend, 0).unwrap();
        ctx.teardown().unwrap();
        assert!(!ctx.is_live());
        assert!(matches!(ctx.drain(), Err(PeerlinkError::ContextReleased(_))));
        assert!(ctx.allocate_buffer(16, None).is_err());
    }

    #[test]
    fn test_context_ids_are_unique() {
        let backend = Arc::new(HostBackend::new(2));
        let a = DeviceContext::init(Arc::clone(&backend), 0).unwrap();
        let b = DeviceContext::init(backend, 1).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_global_mem_size() {
        let backend = Arc::new(HostBackend::new(1));
        let ctx = DeviceContext::init(backend, 0).unwrap();
        assert_eq!(ctx.global_mem_size().unwrap(), 1 << 30);
    }
}
