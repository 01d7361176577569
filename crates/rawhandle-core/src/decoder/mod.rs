//! The raw decoder seam.
//!
//! The registry never decodes anything itself. It drives a [`RawDecoder`]
//! through a fixed sequence:
//!
//! - [`RawDecoder::open`] recognizes the file and returns a session
//! - [`DecoderSession::unpack`] decodes the raw data
//! - [`DecoderSession::unpack_thumbnail`] locates the embedded preview
//! - [`DecoderSession::make_memory_thumbnail`] hands out a copy of it
//!
//! Thumbnails come back as a guard implementing [`MemoryThumbnail`]. The
//! guard owns decoder-managed memory and releases it when dropped, so
//! callers copy what they need and let it fall out of scope.
//!
//! [`RawloaderDecoder`] is the bundled implementation.

mod exposure;
mod preview;
mod rawloader_backend;

pub use preview::{is_raw_header, locate_preview, Preview};
pub use rawloader_backend::{RawloaderDecoder, RawloaderSession, RawloaderThumbnail};

use std::path::Path;

use crate::error::DecodeError;
use crate::types::ThumbnailFormat;

/// Factory for decoder sessions.
pub trait RawDecoder: Send + Sync {
    /// Per-file decoder state.
    type Session: DecoderSession;

    /// Version string of the underlying decoding library.
    fn version(&self) -> String;

    /// Open `path` and check that it is a raw file this decoder understands.
    fn open(&self, path: &Path) -> Result<Self::Session, DecodeError>;
}

/// State for one opened raw file.
///
/// Metadata readers are only meaningful after a successful
/// [`unpack`](DecoderSession::unpack).
pub trait DecoderSession: Send {
    /// Guard over a decoder-produced thumbnail buffer.
    type Thumbnail: MemoryThumbnail;

    fn unpack(&mut self) -> Result<(), DecodeError>;

    fn unpack_thumbnail(&mut self) -> Result<(), DecodeError>;

    /// Produce an in-memory thumbnail from the last unpacked one.
    fn make_memory_thumbnail(&mut self) -> Option<Self::Thumbnail>;

    fn make(&self) -> &str;
    fn model(&self) -> &str;
    /// Full sensor size as `(width, height)`, `(0, 0)` before unpack.
    fn dimensions(&self) -> (u32, u32);
    fn iso_speed(&self) -> f32;
    /// Exposure time in seconds.
    fn shutter(&self) -> f32;
    fn aperture(&self) -> f32;
}

/// A thumbnail buffer whose memory belongs to the decoder.
///
/// Dropping the value releases that memory.
pub trait MemoryThumbnail {
    fn format(&self) -> ThumbnailFormat;
    fn data(&self) -> &[u8];
}
