use std::sync::{Arc, OnceLock};

use super::{DeviceMemory, check_span, private};
use crate::context::DeviceContext;
use crate::device::Backend;
use crate::error::{PeerlinkError, Result};
use crate::types::{BackingKind, ContextId, ELEMENT_SIZE, NativeHandle, Operand, fill_pattern};

/// One allocation owned by a [`DeviceContext`].
///
/// Freed explicitly with [`free`](Self::free) or on drop. The native handle
/// is derived on first request and cached.
pub struct MemoryRegion<B: Backend> {
    ctx: Arc<DeviceContext<B>>,
    operand: Operand,
    size: usize,
    handle: OnceLock<NativeHandle>,
    freed: bool,
}

impl<B: Backend> MemoryRegion<B> {
    pub(crate) fn buffer(
        ctx: &Arc<DeviceContext<B>>,
        size: usize,
        initial: Option<&[u32]>,
    ) -> Result<Self> {
        if let Some(data) = initial {
            let actual = data.len() * ELEMENT_SIZE;
            if actual != size {
                return Err(PeerlinkError::SizeMismatch {
                    expected: size,
                    actual,
                });
            }
        }

        let operand = ctx.with_native(|b, native| b.alloc_buffer(native, size))?;
        let region = Self::wrap(ctx, operand, size);
        if let Some(data) = initial {
            // On failure the region drops and frees the allocation.
            ctx.write_u32(operand, 0, data)?;
        }
        tracing::debug!(ctx = %ctx.id(), %operand, size, "allocated buffer");
        Ok(region)
    }

    pub(crate) fn unified(
        ctx: &Arc<DeviceContext<B>>,
        elem_count: usize,
        offset: u32,
    ) -> Result<Self> {
        let size = elem_count * ELEMENT_SIZE;
        let alignment = ctx.unified_alignment();
        let operand = ctx.with_native(|b, native| b.alloc_unified(native, size, alignment))?;
        let region = Self::wrap(ctx, operand, size);
        ctx.write_u32(operand, 0, &fill_pattern(elem_count, offset))?;
        tracing::debug!(ctx = %ctx.id(), %operand, size, alignment, "allocated unified memory");
        Ok(region)
    }

    fn wrap(ctx: &Arc<DeviceContext<B>>, operand: Operand, size: usize) -> Self {
        Self {
            ctx: Arc::clone(ctx),
            operand,
            size,
            handle: OnceLock::new(),
            freed: false,
        }
    }

    /// Process-shareable handle of this allocation. Idempotent.
    pub fn derive_handle(&self) -> Result<NativeHandle> {
        if let Some(handle) = self.handle.get() {
            return Ok(*handle);
        }
        let handle = self
            .ctx
            .with_native(|b, native| b.export_handle(native, self.operand))?;
        let handle = *self.handle.get_or_init(|| handle);
        tracing::info!(
            runtime = self.ctx.runtime(),
            ctx = %self.ctx.id(),
            kind = %self.kind(),
            %handle,
            "exported memory handle"
        );
        Ok(handle)
    }

    /// Cached handle, if one was derived.
    pub fn handle(&self) -> Option<NativeHandle> {
        self.handle.get().copied()
    }

    /// Read `count` elements starting at element `offset`.
    pub fn read(&self, count: usize, offset: usize) -> Result<Vec<u32>> {
        check_span(self.size, offset, count)?;
        self.ctx.read_u32(self.operand, offset, count)
    }

    /// Write `values` starting at element `offset`.
    pub fn write(&self, offset: usize, values: &[u32]) -> Result<()> {
        check_span(self.size, offset, values.len())?;
        self.ctx.write_u32(self.operand, offset, values)
    }

    /// First `count` elements (fewer if the region is shorter).
    pub fn preview(&self, count: usize) -> Result<Vec<u32>> {
        self.read(count.min(self.elem_count()), 0)
    }

    /// Read the whole region.
    pub fn read_all(&self) -> Result<Vec<u32>> {
        self.read(self.elem_count(), 0)
    }

    pub fn kind(&self) -> BackingKind {
        self.operand.kind()
    }

    pub fn context(&self) -> &Arc<DeviceContext<B>> {
        &self.ctx
    }

    /// Release the allocation.
    pub fn free(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if self.freed {
            return Ok(());
        }
        self.freed = true;
        self.ctx
            .with_native(|b, native| b.free(native, self.operand))?;
        tracing::debug!(ctx = %self.ctx.id(), operand = %self.operand, "freed region");
        Ok(())
    }
}

impl<B: Backend> private::Sealed for MemoryRegion<B> {}

impl<B: Backend> DeviceMemory for MemoryRegion<B> {
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

impl<B: Backend> Drop for MemoryRegion<B> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(operand = %self.operand, error = %e, "failed to free region");
        }
    }
}

impl<B: Backend> std::fmt::Debug for MemoryRegion<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRegion")
            .field("ctx", &self.ctx.id())
            .field("operand", &self.operand)
            .field("size", &self.size)
            .field("handle", &self.handle.get())
            .finish()
    }
}
