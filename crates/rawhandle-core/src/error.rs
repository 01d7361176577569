//! Error types for decoding and registry operations.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{ImageId, ThumbnailKind};

/// Failures reported by a raw decoder.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is readable but is not a recognized raw container.
    #[error("Not a recognized raw format")]
    UnrecognizedFormat,

    /// The container was recognized but its contents could not be decoded.
    #[error("Corrupted or incomplete raw file: {0}")]
    Corrupted(String),

    /// No embedded thumbnail could be located.
    #[error("No embedded thumbnail found")]
    NoThumbnail,

    /// The decoder refused an operation in its current state.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

/// Failures reported by [`ImageRegistry`](crate::ImageRegistry) operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The decoder could not open the path.
    #[error("Failed to open {}: {source}", path.display())]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    /// The file was opened but unpacking its raw data failed.
    #[error("Failed to unpack {}: {source}", path.display())]
    UnpackFailed {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    /// The identifier is not currently registered.
    #[error("Invalid image handle {0}")]
    InvalidHandle(ImageId),

    /// The decoder could not unpack the embedded thumbnail.
    #[error("Failed to unpack thumbnail for image {id}: {source}")]
    ThumbnailUnpackFailed {
        id: ImageId,
        #[source]
        source: DecodeError,
    },

    /// The thumbnail was unpacked but no in-memory copy could be produced.
    #[error("Failed to create memory thumbnail for image {0}")]
    ThumbnailExtractFailed(ImageId),

    /// The thumbnail is not in the requested encoding.
    #[error("Thumbnail for image {id} is {found}, expected {expected}")]
    ThumbnailFormatUnsupported {
        id: ImageId,
        expected: ThumbnailKind,
        found: ThumbnailKind,
    },
}

impl RegistryError {
    /// The identifier this error refers to, if any.
    pub fn image_id(&self) -> Option<ImageId> {
        match self {
            RegistryError::OpenFailed { .. } | RegistryError::UnpackFailed { .. } => None,
            RegistryError::InvalidHandle(id) | RegistryError::ThumbnailExtractFailed(id) => {
                Some(*id)
            }
            RegistryError::ThumbnailUnpackFailed { id, .. }
            | RegistryError::ThumbnailFormatUnsupported { id, .. } => Some(*id),
        }
    }
}
