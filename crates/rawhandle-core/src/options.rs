//! Registry and decoder configuration.

use serde::{Deserialize, Serialize};

use crate::types::ThumbnailKind;

/// Options controlling an [`ImageRegistry`](crate::ImageRegistry).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryOptions {
    /// When set, `thumbnail` rejects thumbnails of any other encoding
    /// with `ThumbnailFormatUnsupported`.
    pub thumbnail_format: Option<ThumbnailKind>,
}

impl RegistryOptions {
    /// Create options with every check disabled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require thumbnails to be of the given encoding.
    pub fn set_thumbnail_format(mut self, kind: ThumbnailKind) -> Self {
        self.thumbnail_format = Some(kind);
        self
    }
}

/// Options for [`RawloaderDecoder`](crate::decoder::RawloaderDecoder).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDecoderOptions {
    /// SubIFD JPEGs smaller than this are treated as tiny thumbnails and
    /// skipped in favour of IFD1.
    pub min_subifd_preview_len: usize,
    /// Fall back to scanning the file for JPEG markers when the IFD
    /// chain yields nothing.
    pub scan_for_markers: bool,
    /// Smallest JPEG accepted by the marker scan.
    pub min_scanned_preview_len: usize,
    /// Accept uncompressed 8-bit RGB strips as bitmap thumbnails.
    pub allow_bitmap_previews: bool,
}

impl Default for RawDecoderOptions {
    fn default() -> Self {
        Self {
            min_subifd_preview_len: 10_000,
            scan_for_markers: true,
            min_scanned_preview_len: 50_000,
            allow_bitmap_previews: true,
        }
    }
}

impl RawDecoderOptions {
    pub fn set_min_subifd_preview_len(mut self, len: usize) -> Self {
        self.min_subifd_preview_len = len;
        self
    }

    pub fn set_scan_for_markers(mut self, yes: bool) -> Self {
        self.scan_for_markers = yes;
        self
    }

    pub fn set_min_scanned_preview_len(mut self, len: usize) -> Self {
        self.min_scanned_preview_len = len;
        self
    }

    pub fn set_allow_bitmap_previews(mut self, yes: bool) -> Self {
        self.allow_bitmap_previews = yes;
        self
    }
}
