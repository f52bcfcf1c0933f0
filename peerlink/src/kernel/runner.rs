use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::context::DeviceContext;
use crate::device::Backend;
use crate::error::{PeerlinkError, Result};
use crate::kernel::ProgramSource;
use crate::memory::DeviceMemory;
use crate::types::ELEMENT_SIZE;

const BYTES_PER_GIB: f64 = (1u64 << 30) as f64;

/// What happens to a compiled kernel after its dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Build, dispatch, release.
    SingleShot,
    /// Keep the program and kernel for later dispatches of the same entry.
    Cached,
}

/// Timing of one synchronous dispatch or copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferStats {
    pub elapsed: Duration,
    pub bytes: usize,
}

impl TransferStats {
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1e3
    }

    pub fn kilobytes(&self) -> usize {
        self.bytes / 1024
    }

    /// Bandwidth in GiB/s (1024³ bytes per second); zero when no time was
    /// measured.
    pub fn gib_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.bytes as f64 / secs / BYTES_PER_GIB
    }
}

impl std::fmt::Display for TransferStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.3} ms, {} KB, {:.3} GiB/s",
            self.elapsed_ms(),
            self.kilobytes(),
            self.gib_per_sec()
        )
    }
}

/// Cache key: (source identity, entry point).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KernelKey {
    pub source_id: u64,
    pub entry: String,
}

impl KernelKey {
    pub fn new(source: &ProgramSource, entry: &str) -> Self {
        Self {
            source_id: source.identity(),
            entry: entry.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CompiledKernel {
    program: u64,
    kernel: u64,
}

/// Builds and dispatches kernels on one [`DeviceContext`].
///
/// Every dispatch is synchronous: operands are bound, the kernel is launched
/// over `[0, elem_count)` and the queue is drained before returning.
pub struct KernelRunner<B: Backend> {
    ctx: Arc<DeviceContext<B>>,
    mode: CacheMode,
    build_options: String,
    cache: HashMap<KernelKey, CompiledKernel>,
}

impl<B: Backend> KernelRunner<B> {
    pub fn new(ctx: Arc<DeviceContext<B>>, mode: CacheMode, build_options: impl Into<String>) -> Self {
        Self {
            ctx,
            mode,
            build_options: build_options.into(),
            cache: HashMap::new(),
        }
    }

    pub fn context(&self) -> &Arc<DeviceContext<B>> {
        &self.ctx
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    pub fn build_options(&self) -> &str {
        &self.build_options
    }

    /// Number of compiled kernels currently held.
    pub fn cached_kernels(&self) -> usize {
        self.cache.len()
    }

    pub fn is_cached(&self, source: &ProgramSource, entry: &str) -> bool {
        self.cache.contains_key(&KernelKey::new(source, entry))
    }

    /// Run `entry` of `source` over `[0, elem_count)` against `operands`,
    /// bound positionally.
    pub fn dispatch(
        &mut self,
        source: &ProgramSource,
        entry: &str,
        operands: &[&dyn DeviceMemory],
        elem_count: usize,
    ) -> Result<TransferStats> {
        if !(2..=3).contains(&operands.len()) {
            return Err(PeerlinkError::InvalidOperands(format!(
                "`{entry}` takes 2 or 3 operands, got {}",
                operands.len()
            )));
        }
        for (i, operand) in operands.iter().enumerate() {
            self.check_local(*operand)?;
            if operand.elem_count() < elem_count {
                return Err(PeerlinkError::InvalidOperands(format!(
                    "operand {i} holds {} elements, launch covers {elem_count}",
                    operand.elem_count()
                )));
            }
        }

        let key = KernelKey::new(source, entry);
        let compiled = self.lookup_or_build(&key, source)?;

        let start = Instant::now();
        let launched = self.ctx.with_native(|b, native| {
            for (i, operand) in operands.iter().enumerate() {
                b.set_kernel_arg(native, compiled.kernel, i as u32, operand.operand())?;
            }
            b.launch(native, compiled.kernel, elem_count)?;
            b.finish(native)
        });
        let elapsed = start.elapsed();

        if self.mode == CacheMode::SingleShot {
            self.evict_key(&key)?;
        }
        launched?;

        let stats = TransferStats {
            elapsed,
            bytes: elem_count * ELEMENT_SIZE,
        };
        tracing::info!(
            runtime = self.ctx.runtime(),
            ctx = %self.ctx.id(),
            entry,
            elapsed_ms = stats.elapsed_ms(),
            kb = stats.kilobytes(),
            gibps = stats.gib_per_sec(),
            "kernel dispatch complete"
        );
        Ok(stats)
    }

    /// Device-to-device copy of `bytes` from `src` to `dst`.
    pub fn copy(
        &self,
        src: &dyn DeviceMemory,
        dst: &dyn DeviceMemory,
        bytes: usize,
    ) -> Result<TransferStats> {
        self.check_local(src)?;
        self.check_local(dst)?;
        let shortest = src.size_bytes().min(dst.size_bytes());
        if bytes > shortest {
            return Err(PeerlinkError::SizeMismatch {
                expected: bytes,
                actual: shortest,
            });
        }

        let start = Instant::now();
        self.ctx.with_native(|b, native| {
            b.copy(native, src.operand(), dst.operand(), bytes)?;
            b.finish(native)
        })?;
        let stats = TransferStats {
            elapsed: start.elapsed(),
            bytes,
        };
        tracing::info!(
            runtime = self.ctx.runtime(),
            ctx = %self.ctx.id(),
            src = %src.operand(),
            dst = %dst.operand(),
            elapsed_ms = stats.elapsed_ms(),
            kb = stats.kilobytes(),
            gibps = stats.gib_per_sec(),
            "copy complete"
        );
        Ok(stats)
    }

    /// Release the cached kernel for `(source, entry)`. Returns whether one
    /// was cached.
    pub fn evict(&mut self, source: &ProgramSource, entry: &str) -> Result<bool> {
        self.evict_key(&KernelKey::new(source, entry))
    }

    /// Release every cached kernel. Stops at the first release failure;
    /// entries not yet released stay cached.
    pub fn clear(&mut self) -> Result<()> {
        let keys: Vec<KernelKey> = self.cache.keys().cloned().collect();
        for key in keys {
            self.evict_key(&key)?;
        }
        Ok(())
    }

    fn check_local(&self, memory: &dyn DeviceMemory) -> Result<()> {
        if memory.context_id() != self.ctx.id() {
            return Err(PeerlinkError::ForeignOperand {
                operand_ctx: memory.context_id().as_u64(),
                runner_ctx: self.ctx.id().as_u64(),
            });
        }
        Ok(())
    }

    fn lookup_or_build(&mut self, key: &KernelKey, source: &ProgramSource) -> Result<CompiledKernel> {
        if let Some(compiled) = self.cache.get(key) {
            tracing::debug!(entry = %key.entry, "kernel cache hit");
            return Ok(*compiled);
        }

        let entry = key.entry.as_str();
        let options = self.build_options.as_str();
        let compiled = self.ctx.with_native(|b, native| {
            let program = match b.build_program(native, source, options) {
                Ok(program) => program,
                Err(PeerlinkError::Build { status, log, .. }) => {
                    tracing::error!(entry, status, format = source.format(), "build failed:\n{log}");
                    return Err(PeerlinkError::Build {
                        entry: entry.to_string(),
                        status,
                        log,
                    });
                }
                Err(e) => return Err(e),
            };
            match b.create_kernel(native, program, entry) {
                Ok(kernel) => Ok(CompiledKernel { program, kernel }),
                Err(e) => {
                    if let Err(release) = b.release_program(native, program) {
                        tracing::warn!(entry, error = %release, "failed to release program");
                    }
                    Err(e)
                }
            }
        })?;

        tracing::debug!(entry, format = source.format(), options, "built kernel");
        self.cache.insert(key.clone(), compiled);
        Ok(compiled)
    }

    fn evict_key(&mut self, key: &KernelKey) -> Result<bool> {
        let Some(compiled) = self.cache.remove(key) else {
            return Ok(false);
        };
        self.ctx.with_native(|b, native| {
            b.release_kernel(native, compiled.kernel)?;
            b.release_program(native, compiled.program)
        })?;
        tracing::debug!(entry = %key.entry, "released kernel");
        Ok(true)
    }
}

impl<B: Backend> Drop for KernelRunner<B> {
    fn drop(&mut self) {
        if let Err(e) = self.clear() {
            tracing::warn!(ctx = %self.ctx.id(), error = %e, "failed to release cached kernels");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bandwidth() {
        let stats = TransferStats {
            elapsed: Duration::from_millis(2),
            bytes: 4 << 20,
        };
        // 4 MiB in 2 ms is 2000 MiB/s.
        assert!((stats.gib_per_sec() - 2000.0 / 1024.0).abs() < 1e-9);
        assert_eq!(stats.kilobytes(), 4096);
        assert!((stats.elapsed_ms() - 2.0).abs() < 1e-9);
        assert_eq!(stats.to_string(), "2.000 ms, 4096 KB, 1.953 GiB/s");
    }

    #[test]
    fn test_zero_elapsed_bandwidth() {
        let stats = TransferStats {
            elapsed: Duration::ZERO,
            bytes: 1024,
        };
        assert_eq!(stats.gib_per_sec(), 0.0);
    }

    #[test]
    fn test_key_depends_on_source_and_entry() {
        let a = ProgramSource::text("kernel void a() {}");
        let b = ProgramSource::text("kernel void b() {}");
        assert_eq!(KernelKey::new(&a, "a"), KernelKey::new(&a, "a"));
        assert_ne!(KernelKey::new(&a, "a"), KernelKey::new(&b, "a"));
        assert_ne!(KernelKey::new(&a, "a"), KernelKey::new(&a, "b"));
    }
}
