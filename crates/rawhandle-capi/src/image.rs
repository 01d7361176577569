use std::ffi::{c_char, CStr, CString};
use std::path::PathBuf;
use std::ptr;
use std::sync::OnceLock;

use log::debug;
use rawhandle_core::{ImageId, Metadata};

use crate::errno::{set_error, set_ok, set_status, RhStatus, RhStatusCode};
use crate::registry;

/// Camera and exposure metadata
///
/// `make` and `model` are owned by the struct; free them with
/// `rh_metadata_free`.
#[repr(C)]
pub struct RhMetadata {
    pub make: *mut c_char,
    pub model: *mut c_char,
    pub iso: f32,
    /// Exposure time in seconds
    pub shutter: f32,
    /// Aperture as f-number
    pub aperture: f32,
}

impl RhMetadata {
    fn from_metadata(meta: Metadata) -> RhMetadata {
        RhMetadata {
            make: into_c_string(meta.make),
            model: into_c_string(meta.model),
            iso: meta.iso,
            shutter: meta.shutter,
            aperture: meta.aperture,
        }
    }
}

fn into_c_string(value: String) -> *mut c_char {
    // Decoder strings never carry interior NULs; drop anything after one
    let bytes: Vec<u8> = value.into_bytes().into_iter().take_while(|&b| b != 0).collect();
    CString::new(bytes).unwrap_or_default().into_raw()
}

#[cfg(unix)]
fn path_from_c(path: &CStr) -> Option<PathBuf> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    Some(PathBuf::from(OsStr::from_bytes(path.to_bytes())))
}

#[cfg(not(unix))]
fn path_from_c(path: &CStr) -> Option<PathBuf> {
    path.to_str().ok().map(PathBuf::from)
}

/// Return the version of the raw decoder backing the registry
///
/// The string is static and must not be freed.
#[no_mangle]
pub extern "C" fn rh_decoder_version() -> *const c_char {
    static VERSION: OnceLock<CString> = OnceLock::new();
    VERSION
        .get_or_init(|| {
            CString::new(registry().decoder_version()).unwrap_or_default()
        })
        .as_ptr()
}

/// \brief Open and unpack a raw file and register it
///
/// @param path: File path, MUST be null terminated. On unix any byte
/// string is accepted, elsewhere it must be UTF-8
///
/// @param id: Receives the new image id on success, CANNOT be null
///
/// @param status: Operation status, can be null
///
/// \returns true on success. Every successful call must be paired with
/// one `rh_image_release`
///
/// # Safety
///
/// `path` must be null or a valid C string, `id` null or writable, and
/// `status` null or from `rh_status_new`.
#[no_mangle]
pub unsafe extern "C" fn rh_image_create(
    path: *const c_char,
    id: *mut u64,
    status: *mut RhStatus,
) -> bool {
    if path.is_null() || id.is_null() {
        unsafe { set_status(status, RhStatusCode::RhNullArgument, "path and id cannot be null") };
        return false;
    }

    let c_path = unsafe { CStr::from_ptr(path) };
    let Some(path) = path_from_c(c_path) else {
        unsafe {
            set_status(
                status,
                RhStatusCode::RhInvalidPath,
                format!("Path is not valid UTF-8: {}", c_path.to_string_lossy()),
            )
        };
        return false;
    };

    match registry().create(&path) {
        Ok(new_id) => {
            unsafe {
                *id = new_id.get();
                set_ok(status);
            }
            true
        }
        Err(e) => {
            unsafe { set_error(status, &e) };
            false
        }
    }
}

/// \brief Release an image
///
/// Unknown or already released ids are ignored
#[no_mangle]
pub extern "C" fn rh_image_release(id: u64) {
    registry().release(ImageId::from_raw(id));
}

/// \brief Read camera and exposure metadata of an image
///
/// @param id: Image id returned by `rh_image_create`
///
/// @param out: Receives the metadata on success, CANNOT be null. Free its
/// strings with `rh_metadata_free`
///
/// @param status: Operation status, can be null
///
/// \returns true on success, false with `RhInvalidHandle` if `id` is not
/// registered
///
/// # Safety
///
/// `out` must be null or writable, `status` null or from `rh_status_new`.
#[no_mangle]
pub unsafe extern "C" fn rh_image_metadata(
    id: u64,
    out: *mut RhMetadata,
    status: *mut RhStatus,
) -> bool {
    if out.is_null() {
        unsafe { set_status(status, RhStatusCode::RhNullArgument, "out cannot be null") };
        return false;
    }

    match registry().metadata(ImageId::from_raw(id)) {
        Ok(meta) => {
            unsafe {
                out.write(RhMetadata::from_metadata(meta));
                set_ok(status);
            }
            true
        }
        Err(e) => {
            unsafe { set_error(status, &e) };
            false
        }
    }
}

/// \brief Read the full sensor size of an image
///
/// @param id: Image id returned by `rh_image_create`
///
/// @param width, height: Receive the size on success, CANNOT be null
///
/// @param status: Operation status, can be null
///
/// \returns true on success, false with `RhInvalidHandle` if `id` is not
/// registered
///
/// # Safety
///
/// `width` and `height` must be null or writable, `status` null or from
/// `rh_status_new`.
#[no_mangle]
pub unsafe extern "C" fn rh_image_dimensions(
    id: u64,
    width: *mut u32,
    height: *mut u32,
    status: *mut RhStatus,
) -> bool {
    if width.is_null() || height.is_null() {
        unsafe { set_status(status, RhStatusCode::RhNullArgument, "width and height cannot be null") };
        return false;
    }

    match registry().dimensions(ImageId::from_raw(id)) {
        Ok((w, h)) => {
            unsafe {
                *width = w;
                *height = h;
                set_ok(status);
            }
            true
        }
        Err(e) => {
            unsafe { set_error(status, &e) };
            false
        }
    }
}

/// Free the strings held by a metadata struct filled by `rh_image_metadata`
///
/// The struct itself belongs to the caller. Its string pointers are
/// nulled so a second call is harmless.
///
/// # Safety
///
/// `meta` must be null or point at a struct filled by `rh_image_metadata`.
#[no_mangle]
pub unsafe extern "C" fn rh_metadata_free(meta: *mut RhMetadata) {
    let Some(meta) = (unsafe { meta.as_mut() }) else {
        return;
    };
    for field in [&mut meta.make, &mut meta.model] {
        let raw = std::mem::replace(field, ptr::null_mut());
        if !raw.is_null() {
            drop(unsafe { CString::from_raw(raw) });
        }
    }
}

/// \brief Extract the embedded thumbnail of an image
///
/// The allocator used is `libc::malloc`; free the result with
/// `rh_thumbnail_free` (or `free`).
///
/// @param id: Image id returned by `rh_image_create`
///
/// @param len: Receives the thumbnail length in bytes, CANNOT be null
///
/// @param status: Operation status, can be null
///
/// \returns A pointer to the thumbnail bytes, or null on failure with the
/// reason in `status`. A failure leaves the image registered
///
/// # Safety
///
/// `len` must be null or writable, `status` null or from `rh_status_new`.
#[no_mangle]
pub unsafe extern "C" fn rh_image_thumbnail(
    id: u64,
    len: *mut usize,
    status: *mut RhStatus,
) -> *mut u8 {
    if len.is_null() {
        unsafe { set_status(status, RhStatusCode::RhNullArgument, "len cannot be null") };
        return ptr::null_mut();
    }

    let bytes = match registry().thumbnail(ImageId::from_raw(id)) {
        Ok(bytes) => bytes,
        Err(e) => {
            unsafe { set_error(status, &e) };
            return ptr::null_mut();
        }
    };

    let output = unsafe { libc::malloc(bytes.len().max(1)) }.cast::<u8>();
    if output.is_null() {
        unsafe {
            set_status(
                status,
                RhStatusCode::RhMallocFailed,
                format!("Malloc failed to allocate buffer with size of {}", bytes.len()),
            )
        };
        return ptr::null_mut();
    }

    unsafe {
        ptr::copy_nonoverlapping(bytes.as_ptr(), output, bytes.len());
        *len = bytes.len();
        set_ok(status);
    }
    debug!("Handed {} thumbnail bytes for image {} to C", bytes.len(), id);
    output
}

/// Free a buffer returned by `rh_image_thumbnail`
///
/// # Safety
///
/// `buf` must be null or a pointer returned by `rh_image_thumbnail` that
/// has not been freed yet.
#[no_mangle]
pub unsafe extern "C" fn rh_thumbnail_free(buf: *mut u8) {
    if !buf.is_null() {
        unsafe { libc::free(buf.cast()) };
    }
}
