use std::os::raw::c_int;

pub use soconnect_pkt::{Error, Result};

/// Build an `Error::internal` carrying the driver's errno text, mirroring the
/// teacher's `DpdkError::ffi_err` formatting (`rpkt-dpdk/src/error.rs`).
pub(crate) fn ffi_err<S: AsRef<str>>(errno: c_int, msg: S) -> Error {
    Error::internal(format!(
        "{} (errno {}: {})",
        msg.as_ref(),
        errno,
        errno_str(errno)
    ))
}

pub(crate) fn service_err<S: AsRef<str>>(msg: S) -> Error {
    Error::internal(msg.as_ref().to_string())
}

fn errno_str(errno: c_int) -> &'static str {
    match errno.abs() {
        libc::ENODEV => "no such device",
        libc::ENOTSUP => "operation not supported",
        libc::EBUSY => "device or resource busy",
        libc::EINVAL => "invalid argument",
        libc::ENOMEM => "out of memory",
        _ => "unknown error",
    }
}
