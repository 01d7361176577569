//! Decoder backed by the `rawloader` crate.
//!
//! `rawloader` does the heavy lifting of unpacking sensor data. Camera
//! exposure settings come from the EXIF block and thumbnails from the
//! preview locator, since `rawloader` exposes neither.
//!
//! The file is read once, in `open`. Every later step works on that copy,
//! so a handle keeps describing the file as it was when opened even if the
//! path is later overwritten or deleted.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use log::{debug, trace};

use super::exposure::{read_exposure, Exposure};
use super::preview::{is_raw_header, locate_preview, Preview};
use super::{DecoderSession, MemoryThumbnail, RawDecoder};
use crate::error::DecodeError;
use crate::options::RawDecoderOptions;
use crate::types::ThumbnailFormat;

// Keep in step with the workspace manifest.
const DECODER_VERSION: &str = "rawloader 0.37";

/// [`RawDecoder`] built on `rawloader`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawloaderDecoder {
    options: RawDecoderOptions,
}

impl RawloaderDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RawDecoderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RawDecoderOptions {
        &self.options
    }
}

impl RawDecoder for RawloaderDecoder {
    type Session = RawloaderSession;

    fn version(&self) -> String {
        DECODER_VERSION.to_string()
    }

    fn open(&self, path: &Path) -> Result<RawloaderSession, DecodeError> {
        let bytes = std::fs::read(path)?;

        if !is_raw_header(&bytes) {
            return Err(DecodeError::UnrecognizedFormat);
        }

        trace!("Opened raw container {} ({} bytes)", path.display(), bytes.len());
        Ok(RawloaderSession::new(path.to_path_buf(), bytes, self.options))
    }
}

/// One raw file opened by [`RawloaderDecoder`].
pub struct RawloaderSession {
    path: PathBuf,
    bytes: Vec<u8>,
    options: RawDecoderOptions,
    image: Option<rawloader::RawImage>,
    make: String,
    model: String,
    exposure: Exposure,
    thumbnail: Option<Preview>,
}

impl RawloaderSession {
    fn new(path: PathBuf, bytes: Vec<u8>, options: RawDecoderOptions) -> Self {
        Self {
            path,
            bytes,
            options,
            image: None,
            make: String::new(),
            model: String::new(),
            exposure: Exposure::default(),
            thumbnail: None,
        }
    }

    /// Path this session was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File contents as read by `open`.
    pub fn file_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The decoded sensor data, once unpacked.
    pub fn raw_image(&self) -> Option<&rawloader::RawImage> {
        self.image.as_ref()
    }
}

impl DecoderSession for RawloaderSession {
    type Thumbnail = RawloaderThumbnail;

    fn unpack(&mut self) -> Result<(), DecodeError> {
        let image = rawloader::decode(&mut Cursor::new(self.bytes.as_slice()))
            .map_err(|e| DecodeError::Corrupted(e.to_string()))?;

        self.make = image.make.trim().to_string();
        self.model = image.model.trim().to_string();
        self.exposure = read_exposure(&self.bytes);

        debug!(
            "Unpacked {}: {} {} {}x{}",
            self.path.display(),
            self.make,
            self.model,
            image.width,
            image.height
        );
        self.image = Some(image);
        Ok(())
    }

    fn unpack_thumbnail(&mut self) -> Result<(), DecodeError> {
        self.thumbnail = None;
        self.thumbnail = Some(locate_preview(&self.bytes, &self.options)?);
        Ok(())
    }

    fn make_memory_thumbnail(&mut self) -> Option<RawloaderThumbnail> {
        self.thumbnail.as_ref().map(|preview| RawloaderThumbnail {
            format: preview.format,
            data: preview.data.clone(),
        })
    }

    fn make(&self) -> &str {
        &self.make
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> (u32, u32) {
        self.image.as_ref().map_or((0, 0), |image| {
            (
                u32::try_from(image.width).unwrap_or(u32::MAX),
                u32::try_from(image.height).unwrap_or(u32::MAX),
            )
        })
    }

    fn iso_speed(&self) -> f32 {
        self.exposure.iso
    }

    fn shutter(&self) -> f32 {
        self.exposure.shutter
    }

    fn aperture(&self) -> f32 {
        self.exposure.aperture
    }
}

/// In-memory thumbnail produced by [`RawloaderSession`].
#[derive(Debug)]
pub struct RawloaderThumbnail {
    format: ThumbnailFormat,
    data: Vec<u8>,
}

impl MemoryThumbnail for RawloaderThumbnail {
    fn format(&self) -> ThumbnailFormat {
        self.format
    }

    fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::ExtendedColorType;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    /// TIFF whose IFD0 points at an embedded 8x8 JPEG.
    fn tiff_with_jpeg() -> (Vec<u8>, Vec<u8>) {
        let pixels = vec![128u8; 8 * 8 * 3];
        let mut jpeg = Vec::new();
        JpegEncoder::new(&mut jpeg)
            .encode(&pixels, 8, 8, ExtendedColorType::Rgb8)
            .unwrap();

        let mut out = vec![0x49, 0x49, 0x2A, 0x00, 8, 0, 0, 0];
        out.extend_from_slice(&2u16.to_le_bytes());
        for (tag, value) in [(0x0201u16, 64u32), (0x0202, jpeg.len() as u32)] {
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&4u16.to_le_bytes());
            out.extend_from_slice(&1u32.to_le_bytes());
            out.extend_from_slice(&value.to_le_bytes());
        }
        out.extend_from_slice(&0u32.to_le_bytes());
        out.resize(64, 0);
        out.extend_from_slice(&jpeg);
        (out, jpeg)
    }

    #[test]
    fn test_version_is_not_empty() {
        let version = RawloaderDecoder::new().version();
        assert!(version.contains('.'));
    }

    #[test]
    fn test_open_missing_file() {
        let result = RawloaderDecoder::new().open(Path::new("/nonexistent/path.nef"));
        assert!(matches!(result, Err(DecodeError::Io(_))));
    }

    #[test]
    fn test_open_text_file() {
        let file = write_temp(b"just some notes, not a photo\n");
        let result = RawloaderDecoder::new().open(file.path());
        assert!(matches!(result, Err(DecodeError::UnrecognizedFormat)));
    }

    #[test]
    fn test_open_empty_file() {
        let file = write_temp(&[]);
        let result = RawloaderDecoder::new().open(file.path());
        assert!(matches!(result, Err(DecodeError::UnrecognizedFormat)));
    }

    #[test]
    fn test_open_accepts_tiff_container() {
        let (bytes, _) = tiff_with_jpeg();
        let file = write_temp(&bytes);

        let session = RawloaderDecoder::new().open(file.path()).unwrap();
        assert_eq!(session.path(), file.path());
        assert!(session.raw_image().is_none());
        assert_eq!(session.make(), "");
        assert_eq!(session.iso_speed(), 0.0);
    }

    #[test]
    fn test_unpack_rejects_tiff_without_camera() {
        let (bytes, _) = tiff_with_jpeg();
        let file = write_temp(&bytes);

        let mut session = RawloaderDecoder::new().open(file.path()).unwrap();
        let result = session.unpack();
        assert!(matches!(result, Err(DecodeError::Corrupted(_))));
        assert!(session.raw_image().is_none());
    }

    #[test]
    fn test_thumbnail_roundtrip_through_session() {
        let (bytes, jpeg) = tiff_with_jpeg();
        let file = write_temp(&bytes);

        let mut session = RawloaderDecoder::new().open(file.path()).unwrap();
        assert!(session.make_memory_thumbnail().is_none());

        session.unpack_thumbnail().unwrap();
        let thumb = session.make_memory_thumbnail().unwrap();
        assert_eq!(thumb.format(), ThumbnailFormat::Jpeg { width: 8, height: 8 });
        assert_eq!(thumb.data(), jpeg.as_slice());
    }

    #[test]
    fn test_thumbnail_survives_file_replacement() {
        let (bytes, jpeg) = tiff_with_jpeg();
        let file = write_temp(&bytes);

        let mut session = RawloaderDecoder::new().open(file.path()).unwrap();
        session.unpack_thumbnail().unwrap();

        // Swap in a different preview at the same path
        let mut other = bytes.clone();
        let larger = {
            let mut out = Vec::new();
            JpegEncoder::new(&mut out)
                .encode(&vec![40u8; 16 * 16 * 3], 16, 16, ExtendedColorType::Rgb8)
                .unwrap();
            out
        };
        other.truncate(64);
        other[30..34].copy_from_slice(&(larger.len() as u32).to_le_bytes());
        other.extend_from_slice(&larger);
        std::fs::write(file.path(), &other).unwrap();

        session.unpack_thumbnail().unwrap();
        let thumb = session.make_memory_thumbnail().unwrap();
        assert_eq!(thumb.format(), ThumbnailFormat::Jpeg { width: 8, height: 8 });
        assert_eq!(thumb.data(), jpeg.as_slice());
    }

    #[test]
    fn test_thumbnail_survives_file_deletion() {
        let (bytes, jpeg) = tiff_with_jpeg();
        let file = write_temp(&bytes);
        let mut session = RawloaderDecoder::new().open(file.path()).unwrap();

        let path = file.path().to_path_buf();
        file.close().unwrap();
        assert!(!path.exists());

        session.unpack_thumbnail().unwrap();
        assert_eq!(session.make_memory_thumbnail().unwrap().data(), jpeg.as_slice());
        assert_eq!(session.file_bytes(), bytes.as_slice());
    }

    #[test]
    fn test_dimensions_before_unpack() {
        let (bytes, _) = tiff_with_jpeg();
        let file = write_temp(&bytes);
        let session = RawloaderDecoder::new().open(file.path()).unwrap();
        assert_eq!(session.dimensions(), (0, 0));
    }
}
