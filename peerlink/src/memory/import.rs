use std::sync::Arc;

use super::{DeviceMemory, check_span, private};
use crate::context::DeviceContext;
use crate::device::Backend;
use crate::error::{PeerlinkError, Result};
use crate::types::{ContextId, ImportInfo, NativeHandle, Operand};

/// A foreign allocation mapped into a [`DeviceContext`].
///
/// Does not own the memory it names: [`release`](Self::release) and drop
/// only release the local import wrapper, the exporting region stays valid.
pub struct ImportedRegion<B: Backend> {
    ctx: Arc<DeviceContext<B>>,
    operand: Operand,
    size: usize,
    handle: NativeHandle,
    info: Option<ImportInfo>,
    released: bool,
}

impl<B: Backend> ImportedRegion<B> {
    pub(crate) fn import(
        ctx: &Arc<DeviceContext<B>>,
        handle: NativeHandle,
        size: usize,
    ) -> Result<Self> {
        let operand = ctx.with_native(|b, native| b.import_handle(native, handle, size))?;
        let mut region = Self {
            ctx: Arc::clone(ctx),
            operand,
            size,
            handle,
            info: None,
            released: false,
        };

        match ctx.with_native(|b, native| b.query_import(native, operand)) {
            Ok(info) if info.size < size => {
                // Dropping `region` releases the wrapper.
                return Err(PeerlinkError::ImportSizeMismatch {
                    handle: handle.as_u64(),
                    requested: size,
                    actual: info.size,
                });
            }
            Ok(info) => {
                tracing::info!(
                    runtime = ctx.runtime(),
                    ctx = %ctx.id(),
                    %handle,
                    %operand,
                    size = info.size,
                    object_type = format_args!("0x{:x}", info.object_type),
                    "imported memory handle"
                );
                region.info = Some(info);
            }
            Err(e) => {
                tracing::warn!(
                    runtime = ctx.runtime(),
                    %handle,
                    error = %e,
                    "import succeeded but size/type query failed"
                );
            }
        }
        Ok(region)
    }

    /// Handle this region was imported from.
    pub fn handle(&self) -> NativeHandle {
        self.handle
    }

    /// Size and object type reported by the runtime, if the query succeeded.
    pub fn info(&self) -> Option<ImportInfo> {
        self.info
    }

    pub fn context(&self) -> &Arc<DeviceContext<B>> {
        &self.ctx
    }

    /// Read `count` elements starting at element `offset`.
    pub fn read(&self, count: usize, offset: usize) -> Result<Vec<u32>> {
        check_span(self.size, offset, count)?;
        self.ctx.read_u32(self.operand, offset, count)
    }

    /// Release the local import wrapper.
    pub fn release(mut self) -> Result<()> {
        self.release_wrapper()
    }

    fn release_wrapper(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.ctx
            .with_native(|b, native| b.release_import(native, self.operand))?;
        tracing::debug!(ctx = %self.ctx.id(), handle = %self.handle, "released import");
        Ok(())
    }
}

impl<B: Backend> private::Sealed for ImportedRegion<B> {}

impl<B: Backend> DeviceMemory for ImportedRegion<B> {
    fn operand(&self) -> Operand {
        self.operand
    }

    fn size_bytes(&self) -> usize {
        self.size
    }

    fn context_id(&self) -> ContextId {
        self.ctx.id()
    }
}

impl<B: Backend> Drop for ImportedRegion<B> {
    fn drop(&mut self) {
        if let Err(e) = self.release_wrapper() {
            tracing::warn!(handle = %self.handle, error = %e, "failed to release import");
        }
    }
}

impl<B: Backend> std::fmt::Debug for ImportedRegion<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportedRegion")
            .field("ctx", &self.ctx.id())
            .field("handle", &self.handle)
            .field("operand", &self.operand)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{HOST_BUFFER_OBJECT_TYPE, HostBackend};

    #[test]
    fn test_import_reports_real_size() {
        let backend = Arc::new(HostBackend::new(2));
        let a = DeviceContext::init(Arc::clone(&backend), 0).unwrap();
        let b = DeviceContext::init(Arc::clone(&backend), 1).unwrap();
        let region = a.allocate_buffer(64, None).unwrap();
        let handle = region.derive_handle().unwrap();

        let imported = b.import_from_handle(handle, 32).unwrap();
        let info = imported.info().unwrap();
        assert_eq!(info.size, 64);
        assert_eq!(info.object_type, HOST_BUFFER_OBJECT_TYPE);
        assert_eq!(imported.context_id(), b.id());
    }

    #[test]
    fn test_oversized_import_is_rejected_and_released() {
        let backend = Arc::new(HostBackend::new(2));
        let a = DeviceContext::init(Arc::clone(&backend), 0).unwrap();
        let b = DeviceContext::init(Arc::clone(&backend), 1).unwrap();
        let region = a.allocate_buffer(16, None).unwrap();
        let handle = region.derive_handle().unwrap();

        let err = b.import_from_handle(handle, 32).unwrap_err();
        assert!(matches!(
            err,
            PeerlinkError::ImportSizeMismatch {
                requested: 32,
                actual: 16,
                ..
            }
        ));
        assert_eq!(backend.stats().imports_released, 1);
    }

    #[test]
    fn test_release_keeps_origin() {
        let backend = Arc::new(HostBackend::new(2));
        let a = DeviceContext::init(Arc::clone(&backend), 0).unwrap();
        let b = DeviceContext::init(Arc::clone(&backend), 1).unwrap();
        let region = a.allocate_buffer(8, Some(&[9, 8])).unwrap();
        let imported = b
            .import_from_handle(region.derive_handle().unwrap(), 8)
            .unwrap();
        assert_eq!(imported.read(2, 0).unwrap(), vec![9, 8]);
        imported.release().unwrap();
        assert_eq!(region.read_all().unwrap(), vec![9, 8]);
        assert_eq!(backend.stats().frees, 0);
    }

    #[test]
    fn test_unknown_handle_is_driver_error() {
        let backend = Arc::new(HostBackend::new(1));
        let ctx = DeviceContext::init(backend, 0).unwrap();
        let err = ctx
            .import_from_handle(NativeHandle::new(999), 8)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DriverCall);
    }
}
