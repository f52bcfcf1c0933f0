//! Readback comparison and buffer previews.

use crate::error::{PeerlinkError, Result};

/// What a readback should contain.
#[derive(Debug, Clone, Copy)]
pub enum Expected<'a> {
    /// `actual[i] == src[i] * factor` (wrapping); identity is factor 1.
    Scaled { src: &'a [u32], factor: u32 },
    /// `actual[i] == lhs[i] + rhs[i]` (wrapping).
    PairwiseSum { lhs: &'a [u32], rhs: &'a [u32] },
}

impl<'a> Expected<'a> {
    pub fn identity(src: &'a [u32]) -> Self {
        Expected::Scaled { src, factor: 1 }
    }

    fn at(&self, i: usize) -> Option<u32> {
        match *self {
            Expected::Scaled { src, factor } => src.get(i).map(|v| v.wrapping_mul(factor)),
            Expected::PairwiseSum { lhs, rhs } => {
                Some(lhs.get(i)?.wrapping_add(*rhs.get(i)?))
            }
        }
    }
}

/// Outcome of comparing a readback against its expectation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    pub mismatched: usize,
    pub total: usize,
}

impl Verification {
    pub fn passed(&self) -> bool {
        self.mismatched == 0
    }

    /// Share of mismatching elements in percent.
    pub fn mismatch_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.mismatched as f64 / self.total as f64
    }

    /// `Err(VerificationMismatch)` unless every element matched.
    pub fn into_result(self) -> Result<()> {
        if self.passed() {
            Ok(())
        } else {
            Err(PeerlinkError::VerificationMismatch {
                mismatched: self.mismatched,
                total: self.total,
            })
        }
    }
}

impl std::fmt::Display for Verification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.passed() {
            f.write_str("Pass (100%)")
        } else {
            write!(f, "Failed ({}%)", self.mismatch_percent())
        }
    }
}

/// Count elements of `actual` that differ from `expected`. Elements with no
/// expected counterpart count as mismatches.
pub fn compare(actual: &[u32], expected: Expected<'_>) -> Verification {
    let mismatched = actual
        .iter()
        .enumerate()
        .filter(|&(i, v)| expected.at(i) != Some(*v))
        .count();
    Verification {
        mismatched,
        total: actual.len(),
    }
}

/// Comma-separated values, 16 per line.
pub fn render_preview(values: &[u32]) -> String {
    values
        .chunks(16)
        .map(|line| {
            line.iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
