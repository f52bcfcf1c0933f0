//! OpenCL C kernels used by the P2P scenarios.
//!
//! Every kernel takes `global int *` operands and indexes them with
//! `get_global_id(0)`.

/// `src2[id] = src1[id]`: push local data into a (remote) destination.
pub const WRITE_TO_REMOTE: &str = "write_to_remote";

/// `src1[id] = src2[id] * 3`: pull remote data into a local destination.
pub const READ_FROM_REMOTE: &str = "read_from_remote";

/// `dst[id] = src[id] * 5`: the two-direction P2P workload.
pub const SCALE_TO_REMOTE: &str = "scale_to_remote";

/// `dst[id] = a[id] + b[id]`: combine two imported sources.
pub const ACCUMULATE_REMOTE: &str = "accumulate_remote";

/// `remote[id] = local[id] * 5`: remote write issued from the pointer runtime.
pub const LOCAL_WRITE_TO_REMOTE: &str = "local_write_to_remote";

pub const WRITE_KERNEL_SOURCE: &str = "\
kernel void write_to_remote(global int *src1, global int *src2)
{
  const int id = get_global_id(0);
  src2[id] = src1[id];
}
";

pub const READ_KERNEL_SOURCE: &str = "\
kernel void read_from_remote(global int *src1, global int *src2)
{
  const int id = get_global_id(0);
  src1[id] = src2[id] * 3;
}
";

pub const SCALE_KERNEL_SOURCE: &str = "\
kernel void scale_to_remote(global int *src, global int *dst)
{
  const int id = get_global_id(0);
  dst[id] = src[id] * 5;
}
";

pub const ACCUMULATE_KERNEL_SOURCE: &str = "\
kernel void accumulate_remote(global int *dst, global int *a, global int *b)
{
  const int id = get_global_id(0);
  dst[id] = a[id] + b[id];
}
";

/// OpenCL C rendition of the pointer-runtime remote-write kernel, for
/// runtimes that build from text.
pub const LOCAL_WRITE_KERNEL_SOURCE: &str = "\
kernel void local_write_to_remote(global int *remote, global int *local)
{
  const int id = get_global_id(0);
  remote[id] = local[id] * 5;
}
";
