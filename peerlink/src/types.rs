/// Index into the enumerated GPU list of the selected platform.
pub type DeviceIndex = usize;

/// Size of one buffer element. All scenario data is `u32`.
pub const ELEMENT_SIZE: usize = std::mem::size_of::<u32>();

/// Fill patterns repeat with this period.
pub const PATTERN_PERIOD: usize = 1024;

/// Process-unique identity of a [`DeviceContext`](crate::DeviceContext).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub(crate) u64);

impl ContextId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Process-wide sharable handle naming a physical allocation (a dma-buf fd).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(u64);

impl NativeHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fd={}", self.0)
    }
}

/// How an allocation is backed in its runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackingKind {
    /// Runtime buffer object (`cl_mem`-style).
    Buffer,
    /// Unified / device-pointer allocation.
    Unified,
}

impl std::fmt::Display for BackingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackingKind::Buffer => f.write_str("buffer"),
            BackingKind::Unified => f.write_str("unified"),
        }
    }
}

/// A memory reference as a runtime sees it.
///
/// The tag decides how a kernel argument is bound and which copy path a
/// runtime takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Opaque buffer object handle.
    Buffer(u64),
    /// Raw device pointer.
    Pointer(u64),
}

impl Operand {
    pub fn new(kind: BackingKind, raw: u64) -> Self {
        match kind {
            BackingKind::Buffer => Operand::Buffer(raw),
            BackingKind::Unified => Operand::Pointer(raw),
        }
    }

    pub fn kind(self) -> BackingKind {
        match self {
            Operand::Buffer(_) => BackingKind::Buffer,
            Operand::Pointer(_) => BackingKind::Unified,
        }
    }

    pub fn raw(self) -> u64 {
        match self {
            Operand::Buffer(raw) | Operand::Pointer(raw) => raw,
        }
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Buffer(raw) => write!(f, "buffer(0x{raw:x})"),
            Operand::Pointer(raw) => write!(f, "ptr(0x{raw:x})"),
        }
    }
}

/// A GPU selected from a platform's device list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Position in the enumerated GPU list.
    pub index: DeviceIndex,
    /// Raw platform / driver handle.
    pub platform: u64,
    /// Raw device handle.
    pub device: u64,
    pub name: String,
    pub global_mem_bytes: u64,
}

/// Real size and object type of an imported allocation, as reported by the
/// importing runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportInfo {
    pub size: usize,
    pub object_type: u32,
}

/// Deterministic fill pattern: `offset + (i mod 1024)`.
pub fn fill_pattern(elem_count: usize, offset: u32) -> Vec<u32> {
    (0..elem_count)
        .map(|i| offset.wrapping_add((i % PATTERN_PERIOD) as u32))
        .collect()
}

pub(crate) fn u32s_to_bytes(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_ne_bytes()).collect()
}

pub(crate) fn bytes_to_u32s(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(ELEMENT_SIZE)
        .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_pattern_wraps_at_period() {
        let p = fill_pattern(2050, 0);
        assert_eq!(p[0], 0);
        assert_eq!(p[1023], 1023);
        assert_eq!(p[1024], 0);
        assert_eq!(p[2049], 1);
    }

    #[test]
    fn test_fill_pattern_offset() {
        let p = fill_pattern(4, 7);
        assert_eq!(p, vec![7, 8, 9, 10]);
    }

    #[test]
    fn test_operand_tag_follows_kind() {
        let b = Operand::new(BackingKind::Buffer, 0x10);
        let p = Operand::new(BackingKind::Unified, 0x20);
        assert_eq!(b, Operand::Buffer(0x10));
        assert_eq!(p.kind(), BackingKind::Unified);
        assert_eq!(p.raw(), 0x20);
        assert_eq!(b.to_string(), "buffer(0x10)");
    }

    #[test]
    fn test_byte_conversion() {
        let values = vec![1u32, 0xdead_beef, 42];
        let bytes = u32s_to_bytes(&values);
        assert_eq!(bytes.len(), 12);
        assert_eq!(bytes_to_u32s(&bytes), values);
    }

    #[test]
    fn test_native_handle_display() {
        assert_eq!(NativeHandle::new(17).to_string(), "fd=17");
    }
}
