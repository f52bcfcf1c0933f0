pub mod builtin;
mod runner;
mod source;

pub use runner::{CacheMode, KernelKey, KernelRunner, TransferStats};
pub use source::ProgramSource;
