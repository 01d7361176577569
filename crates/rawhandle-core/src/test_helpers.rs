//! Shared test utilities for the rawhandle-core test suite.
//!
//! Provides [`ScriptedDecoder`], an in-memory decoder whose per-path
//! behaviour is set up by the test, with counters for live sessions and
//! live thumbnail guards so tests can check that nothing leaks.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::decoder::{DecoderSession, MemoryThumbnail, RawDecoder};
use crate::error::DecodeError;
use crate::types::ThumbnailFormat;

/// Shared counter that survives the decoder it came from.
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    fn inc(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    fn dec(&self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

// =========================================================================
// Scripted images
// =========================================================================

/// What the scripted decoder returns for one path.
#[derive(Debug, Clone)]
pub struct ScriptedImage {
    make: String,
    model: String,
    width: u32,
    height: u32,
    iso: f32,
    shutter: f32,
    aperture: f32,
    unpack_fails: bool,
    thumbnail_unpack_fails: bool,
    memory_thumbnail: bool,
    thumbnail_format: ThumbnailFormat,
    thumbnail: Vec<u8>,
}

impl ScriptedImage {
    fn new(make: &str, model: &str, size: (u32, u32), exposure: (f32, f32, f32)) -> Self {
        let (width, height) = size;
        let (iso, shutter, aperture) = exposure;
        Self {
            make: make.to_string(),
            model: model.to_string(),
            width,
            height,
            iso,
            shutter,
            aperture,
            unpack_fails: false,
            thumbnail_unpack_fails: false,
            memory_thumbnail: true,
            thumbnail_format: ThumbnailFormat::Jpeg {
                width: 160,
                height: 120,
            },
            thumbnail: vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9],
        }
    }

    pub fn sony() -> Self {
        Self::new("SONY", "ILCE-6600", (6000, 4000), (400.0, 0.004, 2.8))
    }

    pub fn nikon() -> Self {
        Self::new("NIKON CORPORATION", "D850", (8256, 5504), (64.0, 0.008, 8.0))
    }

    pub fn unpack_fails(mut self) -> Self {
        self.unpack_fails = true;
        self
    }

    pub fn thumbnail_unpack_fails(mut self) -> Self {
        self.thumbnail_unpack_fails = true;
        self
    }

    pub fn no_memory_thumbnail(mut self) -> Self {
        self.memory_thumbnail = false;
        self
    }

    pub fn bitmap_thumbnail(mut self) -> Self {
        self.thumbnail_format = ThumbnailFormat::Bitmap {
            width: 4,
            height: 2,
            colors: 3,
            bits: 8,
        };
        self.thumbnail = (0..24).collect();
        self
    }

    pub fn thumbnail_format(&self) -> ThumbnailFormat {
        self.thumbnail_format
    }
}

// =========================================================================
// Decoder
// =========================================================================

#[derive(Debug, Default)]
pub struct ScriptedDecoder {
    images: HashMap<PathBuf, ScriptedImage>,
    sessions: Counter,
    thumbnails: Counter,
    thumbnails_made: Counter,
    thumbnail_unpacks: Counter,
}

impl ScriptedDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `path` open successfully with the given behaviour.
    pub fn with_image(mut self, path: impl Into<PathBuf>, image: ScriptedImage) -> Self {
        self.images.insert(path.into(), image);
        self
    }

    /// Sessions opened and not yet dropped.
    pub fn live_sessions(&self) -> usize {
        self.sessions.get()
    }

    pub fn session_counter(&self) -> Counter {
        self.sessions.clone()
    }

    /// Thumbnail guards handed out and not yet dropped.
    pub fn live_thumbnails(&self) -> usize {
        self.thumbnails.get()
    }

    pub fn thumbnails_made(&self) -> usize {
        self.thumbnails_made.get()
    }

    pub fn thumbnail_unpacks(&self) -> usize {
        self.thumbnail_unpacks.get()
    }
}

impl RawDecoder for ScriptedDecoder {
    type Session = ScriptedSession;

    fn version(&self) -> String {
        "scripted 1.0".to_string()
    }

    fn open(&self, path: &Path) -> Result<ScriptedSession, DecodeError> {
        let image = self
            .images
            .get(path)
            .cloned()
            .ok_or_else(|| DecodeError::Io(io::ErrorKind::NotFound.into()))?;

        self.sessions.inc();
        Ok(ScriptedSession {
            image,
            thumbnail_ready: false,
            sessions: self.sessions.clone(),
            thumbnails: self.thumbnails.clone(),
            thumbnails_made: self.thumbnails_made.clone(),
            thumbnail_unpacks: self.thumbnail_unpacks.clone(),
        })
    }
}

pub struct ScriptedSession {
    image: ScriptedImage,
    thumbnail_ready: bool,
    sessions: Counter,
    thumbnails: Counter,
    thumbnails_made: Counter,
    thumbnail_unpacks: Counter,
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.sessions.dec();
    }
}

impl DecoderSession for ScriptedSession {
    type Thumbnail = ScriptedThumbnail;

    fn unpack(&mut self) -> Result<(), DecodeError> {
        if self.image.unpack_fails {
            return Err(DecodeError::Corrupted("scripted unpack failure".to_string()));
        }
        Ok(())
    }

    fn unpack_thumbnail(&mut self) -> Result<(), DecodeError> {
        self.thumbnail_unpacks.inc();
        if self.image.thumbnail_unpack_fails {
            self.thumbnail_ready = false;
            return Err(DecodeError::NoThumbnail);
        }
        self.thumbnail_ready = true;
        Ok(())
    }

    fn make_memory_thumbnail(&mut self) -> Option<ScriptedThumbnail> {
        if !self.thumbnail_ready || !self.image.memory_thumbnail {
            return None;
        }
        self.thumbnails.inc();
        self.thumbnails_made.inc();
        Some(ScriptedThumbnail {
            format: self.image.thumbnail_format,
            data: self.image.thumbnail.clone(),
            live: self.thumbnails.clone(),
        })
    }

    fn make(&self) -> &str {
        &self.image.make
    }

    fn model(&self) -> &str {
        &self.image.model
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.image.width, self.image.height)
    }

    fn iso_speed(&self) -> f32 {
        self.image.iso
    }

    fn shutter(&self) -> f32 {
        self.image.shutter
    }

    fn aperture(&self) -> f32 {
        self.image.aperture
    }
}

pub struct ScriptedThumbnail {
    format: ThumbnailFormat,
    data: Vec<u8>,
    live: Counter,
}

impl Drop for ScriptedThumbnail {
    fn drop(&mut self) {
        self.live.dec();
    }
}

impl MemoryThumbnail for ScriptedThumbnail {
    fn format(&self) -> ThumbnailFormat {
        self.format
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}
