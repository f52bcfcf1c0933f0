//! Kernel program sources and their cache identity.

use std::path::Path;

use crate::error::Result;

/// A compilable kernel program, opaque to peerlink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramSource {
    /// OpenCL C source text.
    Text(String),
    /// SPIR-V intermediate binary.
    SpirV(Vec<u8>),
}

impl ProgramSource {
    pub fn text(source: impl Into<String>) -> Self {
        ProgramSource::Text(source.into())
    }

    /// Read a SPIR-V module from disk.
    pub fn spirv_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(ProgramSource::SpirV(std::fs::read(path)?))
    }

    pub fn format(&self) -> &'static str {
        match self {
            ProgramSource::Text(_) => "text",
            ProgramSource::SpirV(_) => "spirv",
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ProgramSource::Text(s) => s.as_bytes(),
            ProgramSource::SpirV(b) => b,
        }
    }

    /// Stable 64-bit identity over format and content; the kernel cache key.
    pub fn identity(&self) -> u64 {
        fnv1a([self.format().as_bytes(), self.as_bytes()])
    }
}

/// Compute a non-zero FNV-1a hash over an iterator of byte slices.
fn fnv1a<I, S>(parts: I) -> u64
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut h: u64 = 0xcbf29ce484222325; // FNV-1a offset basis
    for part in parts {
        for &b in part.as_ref() {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        // Separator so ("ab", "c") and ("a", "bc") differ.
        h ^= 0xff;
        h = h.wrapping_mul(0x100000001b3);
    }
    if h == 0 { 1 } else { h }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_deterministic() {
        let a = ProgramSource::text("kernel void k(global int *a) {}");
        let b = ProgramSource::text("kernel void k(global int *a) {}");
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn test_identity_differs_by_content() {
        let a = ProgramSource::text("kernel void a() {}");
        let b = ProgramSource::text("kernel void b() {}");
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn test_identity_differs_by_format() {
        let text = ProgramSource::text("abc");
        let spirv = ProgramSource::SpirV(b"abc".to_vec());
        assert_ne!(text.identity(), spirv.identity());
    }

    #[test]
    fn test_fnv1a_part_boundaries() {
        assert_ne!(fnv1a(["ab", "c"]), fnv1a(["a", "bc"]));
    }

    #[test]
    fn test_spirv_file_missing() {
        let err = ProgramSource::spirv_file("/nonexistent/peerlink/kernel.spv").unwrap_err();
        assert!(matches!(err, crate::PeerlinkError::Io(_)));
    }
}
