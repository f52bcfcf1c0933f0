//! Device allocations and foreign-handle imports.
//!
//! Both region types satisfy [`DeviceMemory`], the view a
//! [`KernelRunner`](crate::KernelRunner) binds as a kernel operand.

mod import;
mod region;

pub use import::ImportedRegion;
pub use region::MemoryRegion;

use crate::error::{PeerlinkError, Result};
use crate::types::{ContextId, ELEMENT_SIZE, Operand};

mod private {
    pub trait Sealed {}
}

/// Memory a kernel can be dispatched against.
///
/// Sealed: implemented by [`MemoryRegion`] and [`ImportedRegion`] only.
pub trait DeviceMemory: private::Sealed {
    /// Operand the runtime binds for this memory.
    fn operand(&self) -> Operand;

    fn size_bytes(&self) -> usize;

    /// Context the memory is addressable from.
    fn context_id(&self) -> ContextId;

    fn elem_count(&self) -> usize {
        self.size_bytes() / ELEMENT_SIZE
    }
}

/// Check that elements `[offset, offset + count)` fit in `size` bytes.
pub(crate) fn check_span(size: usize, offset: usize, count: usize) -> Result<()> {
    let needed = offset
        .checked_add(count)
        .and_then(|n| n.checked_mul(ELEMENT_SIZE))
        .unwrap_or(usize::MAX);
    if needed > size {
        return Err(PeerlinkError::SizeMismatch {
            expected: needed,
            actual: size,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_span() {
        assert!(check_span(16, 0, 4).is_ok());
        assert!(check_span(16, 2, 2).is_ok());
        assert!(matches!(
            check_span(16, 2, 3),
            Err(PeerlinkError::SizeMismatch {
                expected: 20,
                actual: 16
            })
        ));
        assert!(check_span(16, usize::MAX, 1).is_err());
    }
}
