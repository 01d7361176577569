//! The image registry: decoded raw images keyed by [`ImageId`].
//!
//! A single mutex guards both the map and the id counter. Every operation
//! takes it, so operations on the registry are linearizable:
//!
//! - `create` decodes outside the lock, then allocates the id and inserts
//!   the session in one critical section. An id is never visible before
//!   its image is ready.
//! - `thumbnail` holds the lock for the whole extraction, since it
//!   mutates decoder state.
//! - `release` racing a lookup of the same id resolves to one order or
//!   the other; the lookup sees the full image or `InvalidHandle`.
//!
//! The lock is coarse: a thumbnail of one image blocks metadata reads of
//! another.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use crate::decoder::{DecoderSession, MemoryThumbnail, RawDecoder, RawloaderDecoder};
use crate::error::RegistryError;
use crate::options::RegistryOptions;
use crate::types::{ImageId, Metadata, ThumbnailKind};

struct RegistryState<S> {
    next_id: u64,
    images: HashMap<ImageId, S>,
}

/// Thread-safe owner of every decoded image.
///
/// Share it between callers with an `Arc`. Dropping the registry drops all
/// images still held.
pub struct ImageRegistry<D: RawDecoder> {
    decoder: D,
    options: RegistryOptions,
    state: Mutex<RegistryState<D::Session>>,
}

impl<D: RawDecoder> ImageRegistry<D> {
    /// Create an empty registry around `decoder`.
    pub fn new(decoder: D) -> Self {
        Self::with_options(decoder, RegistryOptions::default())
    }

    pub fn with_options(decoder: D, options: RegistryOptions) -> Self {
        Self {
            decoder,
            options,
            state: Mutex::new(RegistryState {
                next_id: 1,
                images: HashMap::new(),
            }),
        }
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    pub fn options(&self) -> &RegistryOptions {
        &self.options
    }

    /// Version string of the underlying decoder. Never fails.
    pub fn decoder_version(&self) -> String {
        self.decoder.version()
    }

    // Every critical section is a single insert, remove or lookup, so a
    // panic inside one cannot leave the map half-updated.
    fn lock(&self) -> MutexGuard<'_, RegistryState<D::Session>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open and unpack the raw file at `path` and register it.
    ///
    /// # Errors
    ///
    /// - `RegistryError::OpenFailed` - unreadable path or not a raw file
    /// - `RegistryError::UnpackFailed` - recognized but undecodable
    ///
    /// On failure nothing is registered.
    pub fn create(&self, path: impl AsRef<Path>) -> Result<ImageId, RegistryError> {
        let path = path.as_ref();

        let mut session = self.decoder.open(path).map_err(|source| {
            warn!("Failed to open {}: {}", path.display(), source);
            RegistryError::OpenFailed {
                path: path.to_path_buf(),
                source,
            }
        })?;

        // A failed unpack drops the session here, before any registry change
        session.unpack().map_err(|source| {
            warn!("Failed to unpack {}: {}", path.display(), source);
            RegistryError::UnpackFailed {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let mut state = self.lock();
        let id = ImageId::from_raw(state.next_id);
        state.next_id += 1;
        state.images.insert(id, session);
        drop(state);

        debug!("Registered {} as image {}", path.display(), id);
        Ok(id)
    }

    /// Drop the image registered under `id`.
    ///
    /// Unknown and already-released ids are ignored.
    pub fn release(&self, id: ImageId) {
        let removed = self.lock().images.remove(&id);
        // The session is freed outside the lock
        if removed.is_some() {
            debug!("Released image {}", id);
        }
    }

    /// Camera and exposure metadata of image `id`.
    ///
    /// # Errors
    ///
    /// `RegistryError::InvalidHandle` if `id` is not registered.
    pub fn metadata(&self, id: ImageId) -> Result<Metadata, RegistryError> {
        let state = self.lock();
        let session = state
            .images
            .get(&id)
            .ok_or(RegistryError::InvalidHandle(id))?;

        Ok(Metadata {
            make: session.make().to_string(),
            model: session.model().to_string(),
            iso: session.iso_speed(),
            shutter: session.shutter(),
            aperture: session.aperture(),
        })
    }

    /// Full sensor size of image `id` as `(width, height)`.
    ///
    /// # Errors
    ///
    /// `RegistryError::InvalidHandle` if `id` is not registered.
    pub fn dimensions(&self, id: ImageId) -> Result<(u32, u32), RegistryError> {
        self.lock()
            .images
            .get(&id)
            .map(|session| session.dimensions())
            .ok_or(RegistryError::InvalidHandle(id))
    }

    /// Extract the embedded thumbnail of image `id`.
    ///
    /// The bytes are a fresh copy on every call. If
    /// [`RegistryOptions::thumbnail_format`] is set, thumbnails of another
    /// encoding are rejected.
    ///
    /// # Errors
    ///
    /// - `RegistryError::InvalidHandle` - `id` is not registered
    /// - `RegistryError::ThumbnailUnpackFailed` - no thumbnail could be unpacked
    /// - `RegistryError::ThumbnailExtractFailed` - no in-memory copy was produced
    /// - `RegistryError::ThumbnailFormatUnsupported` - wrong encoding
    ///
    /// A failed extraction leaves the image registered and usable.
    pub fn thumbnail(&self, id: ImageId) -> Result<Vec<u8>, RegistryError> {
        self.extract_thumbnail(id, self.options.thumbnail_format)
    }

    /// Like [`thumbnail`](Self::thumbnail), but require the given encoding.
    pub fn thumbnail_as(&self, id: ImageId, kind: ThumbnailKind) -> Result<Vec<u8>, RegistryError> {
        self.extract_thumbnail(id, Some(kind))
    }

    fn extract_thumbnail(
        &self,
        id: ImageId,
        expected: Option<ThumbnailKind>,
    ) -> Result<Vec<u8>, RegistryError> {
        let mut state = self.lock();
        let session = state
            .images
            .get_mut(&id)
            .ok_or(RegistryError::InvalidHandle(id))?;

        session.unpack_thumbnail().map_err(|source| {
            warn!("Failed to unpack thumbnail for image {}: {}", id, source);
            RegistryError::ThumbnailUnpackFailed { id, source }
        })?;

        // The guard releases decoder memory on every return below
        let thumb = session
            .make_memory_thumbnail()
            .ok_or(RegistryError::ThumbnailExtractFailed(id))?;

        let found = thumb.format().kind();
        if let Some(expected) = expected {
            if found != expected {
                return Err(RegistryError::ThumbnailFormatUnsupported {
                    id,
                    expected,
                    found,
                });
            }
        }

        let bytes = thumb.data().to_vec();
        debug!("Extracted {} byte {} thumbnail for image {}", bytes.len(), found, id);
        Ok(bytes)
    }

    /// Whether `id` is currently registered.
    pub fn contains(&self, id: ImageId) -> bool {
        self.lock().images.contains_key(&id)
    }

    /// Number of registered images.
    pub fn len(&self) -> usize {
        self.lock().images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ImageRegistry<RawloaderDecoder> {
    fn default() -> Self {
        Self::new(RawloaderDecoder::new())
    }
}
