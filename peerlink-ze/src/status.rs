//! Level Zero result codes.

use peerlink::{PeerlinkError, Result};

use crate::RUNTIME;
use crate::ffi::{ZE_RESULT_SUCCESS, ze_result_t};

/// Symbolic name of a `ze_result_t`.
pub fn status_name(result: ze_result_t) -> &'static str {
    match result {
        0x0 => "ZE_RESULT_SUCCESS",
        0x1 => "ZE_RESULT_NOT_READY",
        0x7000_0001 => "ZE_RESULT_ERROR_DEVICE_LOST",
        0x7000_0002 => "ZE_RESULT_ERROR_OUT_OF_HOST_MEMORY",
        0x7000_0003 => "ZE_RESULT_ERROR_OUT_OF_DEVICE_MEMORY",
        0x7000_0004 => "ZE_RESULT_ERROR_MODULE_BUILD_FAILURE",
        0x7000_0005 => "ZE_RESULT_ERROR_MODULE_LINK_FAILURE",
        0x7000_0006 => "ZE_RESULT_ERROR_DEVICE_REQUIRES_RESET",
        0x7000_0007 => "ZE_RESULT_ERROR_DEVICE_IN_LOW_POWER_STATE",
        0x7001_0000 => "ZE_RESULT_ERROR_INSUFFICIENT_PERMISSIONS",
        0x7001_0001 => "ZE_RESULT_ERROR_NOT_AVAILABLE",
        0x7002_0000 => "ZE_RESULT_ERROR_DEPENDENCY_UNAVAILABLE",
        0x7800_0001 => "ZE_RESULT_ERROR_UNINITIALIZED",
        0x7800_0002 => "ZE_RESULT_ERROR_UNSUPPORTED_VERSION",
        0x7800_0003 => "ZE_RESULT_ERROR_UNSUPPORTED_FEATURE",
        0x7800_0004 => "ZE_RESULT_ERROR_INVALID_ARGUMENT",
        0x7800_0005 => "ZE_RESULT_ERROR_INVALID_NULL_HANDLE",
        0x7800_0006 => "ZE_RESULT_ERROR_HANDLE_OBJECT_IN_USE",
        0x7800_0007 => "ZE_RESULT_ERROR_INVALID_NULL_POINTER",
        0x7800_0008 => "ZE_RESULT_ERROR_INVALID_SIZE",
        0x7800_0009 => "ZE_RESULT_ERROR_UNSUPPORTED_SIZE",
        0x7800_000a => "ZE_RESULT_ERROR_UNSUPPORTED_ALIGNMENT",
        0x7800_000b => "ZE_RESULT_ERROR_INVALID_SYNCHRONIZATION_OBJECT",
        0x7800_000c => "ZE_RESULT_ERROR_INVALID_ENUMERATION",
        0x7800_000d => "ZE_RESULT_ERROR_UNSUPPORTED_ENUMERATION",
        0x7800_000e => "ZE_RESULT_ERROR_UNSUPPORTED_IMAGE_FORMAT",
        0x7800_000f => "ZE_RESULT_ERROR_INVALID_NATIVE_BINARY",
        0x7800_0010 => "ZE_RESULT_ERROR_INVALID_GLOBAL_NAME",
        0x7800_0011 => "ZE_RESULT_ERROR_INVALID_KERNEL_NAME",
        0x7800_0012 => "ZE_RESULT_ERROR_INVALID_FUNCTION_NAME",
        0x7800_0013 => "ZE_RESULT_ERROR_INVALID_GROUP_SIZE_DIMENSION",
        0x7800_0014 => "ZE_RESULT_ERROR_INVALID_GLOBAL_WIDTH_DIMENSION",
        0x7800_0015 => "ZE_RESULT_ERROR_INVALID_KERNEL_ARGUMENT_INDEX",
        0x7800_0016 => "ZE_RESULT_ERROR_INVALID_KERNEL_ARGUMENT_SIZE",
        0x7800_0017 => "ZE_RESULT_ERROR_INVALID_KERNEL_ATTRIBUTE_VALUE",
        0x7800_0018 => "ZE_RESULT_ERROR_INVALID_MODULE_UNLINKED",
        0x7800_0019 => "ZE_RESULT_ERROR_INVALID_COMMAND_LIST_TYPE",
        0x7800_001a => "ZE_RESULT_ERROR_OVERLAPPING_REGIONS",
        _ => "ZE_RESULT_ERROR_UNKNOWN",
    }
}

/// Map a non-success result of `call` to a `DriverCall` error.
pub(crate) fn check(call: &'static str, result: ze_result_t) -> Result<()> {
    if result == ZE_RESULT_SUCCESS {
        Ok(())
    } else {
        Err(PeerlinkError::driver_call(
            RUNTIME,
            call,
            i64::from(result),
            status_name(result),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_names() {
        assert_eq!(status_name(0), "ZE_RESULT_SUCCESS");
        assert_eq!(status_name(0x7000_0004), "ZE_RESULT_ERROR_MODULE_BUILD_FAILURE");
        assert_eq!(status_name(0x7800_0011), "ZE_RESULT_ERROR_INVALID_KERNEL_NAME");
        assert_eq!(status_name(0x7fff_fffe), "ZE_RESULT_ERROR_UNKNOWN");
    }

    #[test]
    fn test_check_maps_to_driver_call() {
        assert!(check("zeInit", ZE_RESULT_SUCCESS).is_ok());
        let err = check("zeMemAllocDevice", 0x7000_0003).unwrap_err();
        assert_eq!(
            err.to_string(),
            "level-zero: zeMemAllocDevice failed with status 1879048195 \
             (ZE_RESULT_ERROR_OUT_OF_DEVICE_MEMORY)"
        );
        assert_eq!(err.kind(), peerlink::ErrorKind::DriverCall);
    }
}
