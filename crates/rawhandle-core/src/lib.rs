//! rawhandle core - decoded RAW image registry
//!
//! This crate keeps decoded RAW photos alive behind opaque numeric ids so
//! that several front-ends (a desktop GUI, scripting bindings, C callers)
//! can share one set of decoded images.
//!
//! # Module Structure
//!
//! - `registry` - the thread-safe [`ImageRegistry`]
//! - `decoder` - the [`RawDecoder`] seam and the `rawloader`-backed decoder
//! - `types` - ids, metadata and thumbnail formats
//! - `options` - registry and decoder configuration
//! - `error` - error types
//!
//! # Usage
//!
//! ```ignore
//! use rawhandle_core::ImageRegistry;
//!
//! let registry = ImageRegistry::default();
//! let id = registry.create("DSC01234.ARW")?;
//! let meta = registry.metadata(id)?;
//! println!("{} {} ISO {}", meta.make, meta.model, meta.iso);
//! let jpeg = registry.thumbnail(id)?;
//! registry.release(id);
//! ```

pub mod decoder;
pub mod error;
pub mod options;
pub mod registry;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use decoder::{DecoderSession, MemoryThumbnail, RawDecoder, RawloaderDecoder};
pub use error::{DecodeError, RegistryError};
pub use options::{RawDecoderOptions, RegistryOptions};
pub use registry::ImageRegistry;
pub use types::{ImageId, Metadata, ThumbnailFormat, ThumbnailKind};

/// Version of this crate.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
