//! C bindings to rawhandle-core
//!
//! Every function here is a thin translation onto one process-wide
//! [`ImageRegistry`], created on first use. C callers hold only the `u64`
//! ids it hands out and must call `rh_image_release` once per successful
//! `rh_image_create`.
//!
//! Errors are reported through an [`RhStatus`] created with
//! `rh_status_new`.

use std::sync::OnceLock;

use rawhandle_core::{ImageRegistry, RawloaderDecoder};

mod errno;
mod image;

pub use errno::{RhStatus, RhStatusCode};
pub use image::RhMetadata;

fn registry() -> &'static ImageRegistry<RawloaderDecoder> {
    static REGISTRY: OnceLock<ImageRegistry<RawloaderDecoder>> = OnceLock::new();
    REGISTRY.get_or_init(ImageRegistry::default)
}
