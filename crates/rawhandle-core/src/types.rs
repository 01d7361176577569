//! Core value types shared by the registry and its callers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier for a decoded image held by an [`ImageRegistry`].
///
/// Identifiers start at 1, increase monotonically and are never reused
/// within one registry, even after the image is released.
///
/// [`ImageRegistry`]: crate::ImageRegistry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(u64);

impl ImageId {
    /// Wrap a raw identifier received from a caller.
    ///
    /// Any value is accepted; ids that were never issued simply fail
    /// lookups with `InvalidHandle`.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The numeric value handed across language boundaries.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for ImageId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<ImageId> for u64 {
    fn from(id: ImageId) -> Self {
        id.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Camera and exposure metadata for a decoded image.
///
/// Values are read straight from the decoder. Fields the file does not
/// carry come back as an empty string or `0.0`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Camera make (e.g., "SONY").
    pub make: String,
    /// Camera model (e.g., "ILCE-6600").
    pub model: String,
    /// ISO sensitivity.
    pub iso: f32,
    /// Exposure time in seconds.
    pub shutter: f32,
    /// Aperture as f-number.
    pub aperture: f32,
}

/// Encoding family of a thumbnail, used to request a specific format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThumbnailKind {
    /// A complete JPEG stream.
    Jpeg,
    /// Packed, uncompressed pixel rows.
    Bitmap,
}

impl fmt::Display for ThumbnailKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThumbnailKind::Jpeg => f.write_str("JPEG"),
            ThumbnailKind::Bitmap => f.write_str("bitmap"),
        }
    }
}

/// Full description of a thumbnail produced by a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThumbnailFormat {
    /// JPEG stream with the dimensions found in its frame header.
    Jpeg { width: u32, height: u32 },
    /// Interleaved pixels, `colors` samples of `bits` each, row-major.
    Bitmap {
        width: u32,
        height: u32,
        colors: u16,
        bits: u16,
    },
}

impl ThumbnailFormat {
    /// The encoding family of this format.
    pub fn kind(&self) -> ThumbnailKind {
        match self {
            ThumbnailFormat::Jpeg { .. } => ThumbnailKind::Jpeg,
            ThumbnailFormat::Bitmap { .. } => ThumbnailKind::Bitmap,
        }
    }

    /// Pixel dimensions as `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        match *self {
            ThumbnailFormat::Jpeg { width, height } => (width, height),
            ThumbnailFormat::Bitmap { width, height, .. } => (width, height),
        }
    }
}
