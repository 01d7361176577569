use std::ffi::{c_char, CString};
use std::ptr;

use rawhandle_core::RegistryError;

/// Various representations of things that may go wrong
#[repr(C)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RhStatusCode {
    /// Everything is okay, operation succeeded
    RhOk = 0,
    /// The file could not be opened or is not a raw file
    RhOpenFailed,
    /// The file is a raw file but its data could not be unpacked
    RhUnpackFailed,
    /// The image id is not registered (never issued or already released)
    RhInvalidHandle,
    /// The embedded thumbnail could not be unpacked
    RhThumbnailUnpackFailed,
    /// The thumbnail was unpacked but could not be copied out
    RhThumbnailExtractFailed,
    /// The thumbnail is not in the required encoding
    RhThumbnailFormatUnsupported,
    /// A required pointer argument was null
    RhNullArgument,
    /// The path is not valid on this platform
    RhInvalidPath,
    /// Malloc failed
    RhMallocFailed,
}

impl From<&RegistryError> for RhStatusCode {
    fn from(err: &RegistryError) -> Self {
        match err {
            RegistryError::OpenFailed { .. } => RhStatusCode::RhOpenFailed,
            RegistryError::UnpackFailed { .. } => RhStatusCode::RhUnpackFailed,
            RegistryError::InvalidHandle(_) => RhStatusCode::RhInvalidHandle,
            RegistryError::ThumbnailUnpackFailed { .. } => RhStatusCode::RhThumbnailUnpackFailed,
            RegistryError::ThumbnailExtractFailed(_) => RhStatusCode::RhThumbnailExtractFailed,
            RegistryError::ThumbnailFormatUnsupported { .. } => {
                RhStatusCode::RhThumbnailFormatUnsupported
            }
        }
    }
}

/// A status indicator that tells you more about things that went wrong
///
/// To create an instance use `rh_status_new`, and free it with
/// `rh_status_free`.
///
/// For quickly checking if an operation succeeded use `rh_status_ok`,
/// `rh_status_code` gives the exact reason and `rh_status_message` a
/// human readable description.
#[repr(C)]
pub struct RhStatus {
    pub code: RhStatusCode,
    /// A short message indicating what went wrong
    pub message: *mut c_char,
}

impl RhStatus {
    fn okay() -> RhStatus {
        RhStatus {
            code: RhStatusCode::RhOk,
            message: CString::default().into_raw(),
        }
    }

    fn replace_message(&mut self, message: CString) {
        let old = std::mem::replace(&mut self.message, message.into_raw());
        if !old.is_null() {
            // safety: every message is created by CString::into_raw
            drop(unsafe { CString::from_raw(old) });
        }
    }
}

impl Drop for RhStatus {
    fn drop(&mut self) {
        if !self.message.is_null() {
            drop(unsafe { CString::from_raw(self.message) });
            self.message = ptr::null_mut();
        }
    }
}

/// Record an outcome in `status`. A null `status` is ignored.
///
/// # Safety
///
/// `status` must be null or come from `rh_status_new`.
pub(crate) unsafe fn set_status<T: Into<Vec<u8>>>(
    status: *mut RhStatus,
    code: RhStatusCode,
    message: T,
) {
    let Some(status) = (unsafe { status.as_mut() }) else {
        return;
    };
    let message = CString::new(message).unwrap_or_else(|e| {
        // Interior NULs are cut off at the first one
        let end = e.nul_position();
        let mut bytes = e.into_vec();
        bytes.truncate(end);
        CString::new(bytes).unwrap_or_default()
    });
    status.code = code;
    status.replace_message(message);
}

pub(crate) unsafe fn set_ok(status: *mut RhStatus) {
    unsafe { set_status(status, RhStatusCode::RhOk, "") }
}

pub(crate) unsafe fn set_error(status: *mut RhStatus, err: &RegistryError) {
    unsafe { set_status(status, RhStatusCode::from(err), err.to_string()) }
}

/// Create a new status struct
///
/// This can be passed around to functions that report progress via
/// status
///
/// Remember to free it with `rh_status_free`
#[no_mangle]
pub extern "C" fn rh_status_new() -> *mut RhStatus {
    Box::into_raw(Box::new(RhStatus::okay()))
}

/// \brief Check if an operation succeeded
///
/// @param status: Operation status
///
/// @returns true if everything is okay, if status is null or something went bad returns false
///
/// # Safety
///
/// `status` must be null or come from `rh_status_new`.
#[no_mangle]
pub unsafe extern "C" fn rh_status_ok(status: *const RhStatus) -> bool {
    unsafe { rh_status_code(status) == RhStatusCode::RhOk }
}

/// Return the status code contained in the status
///
/// \returns RhStatusCode, `RhNullArgument` if `status` is null
///
/// # Safety
///
/// `status` must be null or come from `rh_status_new`.
#[no_mangle]
pub unsafe extern "C" fn rh_status_code(status: *const RhStatus) -> RhStatusCode {
    match unsafe { status.as_ref() } {
        Some(status) => status.code,
        None => RhStatusCode::RhNullArgument,
    }
}

/// Returns a null terminated string that contains more details about
/// what went wrong
///
/// The string is owned by the status and lives until the next call that
/// writes to it, or until `rh_status_free`.
///
/// \returns: The message contained, if `status` is null, returns null
///
/// # Safety
///
/// `status` must be null or come from `rh_status_new`.
#[no_mangle]
pub unsafe extern "C" fn rh_status_message(status: *const RhStatus) -> *const c_char {
    match unsafe { status.as_ref() } {
        Some(status) => status.message,
        None => ptr::null(),
    }
}

/// Destroy a status indicator, freeing its message
///
/// # Safety
///
/// `status` must be null or come from `rh_status_new`, and must not be
/// used afterwards.
#[no_mangle]
pub unsafe extern "C" fn rh_status_free(status: *mut RhStatus) {
    if !status.is_null() {
        drop(unsafe { Box::from_raw(status) });
    }
}
