//! Embedded preview location for raw files.
//!
//! Most raw formats are TIFF containers that carry one or more finished
//! previews next to the sensor data: a large JPEG in a SubIFD, a smaller
//! EXIF thumbnail in IFD1, and on some cameras an uncompressed RGB strip
//! in IFD0. This module walks the IFD chain and returns the best of them
//! without touching the sensor data.
//!
//! Containers that are not TIFF-based (CR3, RAF, MRW, X3F) fall back to
//! scanning for JPEG markers.

use std::io::{Cursor, Read, Seek, SeekFrom};

use image::{ImageFormat, ImageReader};
use log::trace;

use crate::error::DecodeError;
use crate::options::RawDecoderOptions;
use crate::types::ThumbnailFormat;

// TIFF constants
const TIFF_MAGIC_LE: [u8; 4] = [0x49, 0x49, 0x2A, 0x00]; // II + 42
const TIFF_MAGIC_BE: [u8; 4] = [0x4D, 0x4D, 0x00, 0x2A]; // MM + 42

// TIFF variants with their own magic numbers
const ORF_MAGIC_RO: [u8; 4] = *b"IIRO";
const ORF_MAGIC_RS: [u8; 4] = *b"IIRS";
const ORF_MAGIC_BE: [u8; 4] = *b"MMOR";
const RW2_MAGIC: [u8; 4] = [0x49, 0x49, 0x55, 0x00];

// Non-TIFF containers
const FUJI_MAGIC: &[u8] = b"FUJIFILM";
const MRW_MAGIC: &[u8] = b"\0MRM";
const X3F_MAGIC: &[u8] = b"FOVb";
const CR3_BRAND: &[u8] = b"ftypcrx ";

// TIFF tag IDs
const TAG_IMAGE_WIDTH: u16 = 0x0100;
const TAG_IMAGE_LENGTH: u16 = 0x0101;
const TAG_COMPRESSION: u16 = 0x0103;
const TAG_STRIP_OFFSETS: u16 = 0x0111;
const TAG_SAMPLES_PER_PIXEL: u16 = 0x0115;
const TAG_STRIP_BYTE_COUNTS: u16 = 0x0117;
const TAG_SUBIFD: u16 = 0x014A;
const TAG_JPEG_OFFSET: u16 = 0x0201; // JpegInterchangeFormat
const TAG_JPEG_LENGTH: u16 = 0x0202; // JpegInterchangeFormatLength

const TYPE_SHORT: u16 = 3;

const COMPRESSION_NONE: u32 = 1;
const COMPRESSION_JPEG: u32 = 6;
const COMPRESSION_JPEG_OLD: u32 = 7;

const MAX_IFD_ENTRIES: u16 = 1000;
const MAX_SUBIFDS: u32 = 16;

// JPEG magic bytes
const JPEG_START: [u8; 2] = [0xFF, 0xD8];

// The main TIFF structure lives in the first few KB.
const SCAN_START_OFFSET: usize = 8192;

/// A preview found inside a raw file, copied out of the file bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub format: ThumbnailFormat,
    pub data: Vec<u8>,
}

/// Check whether `header` starts like a raw container we know.
///
/// At least 16 bytes should be passed; shorter input is only matched
/// against the 4-byte magics.
pub fn is_raw_header(header: &[u8]) -> bool {
    if header.len() < 4 {
        return false;
    }
    let magic = &header[..4];
    if magic == TIFF_MAGIC_LE
        || magic == TIFF_MAGIC_BE
        || magic == ORF_MAGIC_RO
        || magic == ORF_MAGIC_RS
        || magic == ORF_MAGIC_BE
        || magic == RW2_MAGIC
    {
        return true;
    }
    header.starts_with(FUJI_MAGIC)
        || header.starts_with(MRW_MAGIC)
        || header.starts_with(X3F_MAGIC)
        || header.get(4..12) == Some(CR3_BRAND)
}

/// Locate the best embedded preview in a raw file.
///
/// # Errors
///
/// - `DecodeError::UnrecognizedFormat` - the bytes are not a raw container
/// - `DecodeError::Corrupted` - the TIFF structure is truncated
/// - `DecodeError::NoThumbnail` - no usable preview was found
pub fn locate_preview(bytes: &[u8], options: &RawDecoderOptions) -> Result<Preview, DecodeError> {
    if !is_raw_header(bytes) {
        return Err(DecodeError::UnrecognizedFormat);
    }

    if let Some(little_endian) = tiff_byte_order(bytes) {
        if let Some(preview) = locate_in_tiff(bytes, little_endian, options)? {
            return Ok(preview);
        }
    }

    if options.scan_for_markers {
        if let Some(preview) = scan_for_jpeg(bytes, options.min_scanned_preview_len) {
            trace!("Preview found by marker scan ({} bytes)", preview.data.len());
            return Ok(preview);
        }
    }

    Err(DecodeError::NoThumbnail)
}

fn tiff_byte_order(bytes: &[u8]) -> Option<bool> {
    if bytes.len() < 8 {
        return None;
    }
    match &bytes[..2] {
        b"II" => Some(true),
        b"MM" => Some(false),
        _ => None,
    }
}

fn locate_in_tiff(
    bytes: &[u8],
    little_endian: bool,
    options: &RawDecoderOptions,
) -> Result<Option<Preview>, DecodeError> {
    let mut cursor = Cursor::new(bytes);
    seek_to(&mut cursor, 4)?;
    let ifd0_offset = read_u32(&mut cursor, little_endian)?;
    let ifd0 = parse_ifd_at(&mut cursor, ifd0_offset, little_endian)?;

    let subifds: Vec<Ifd> = subifd_offsets(&ifd0.entries, &mut cursor, little_endian)
        .into_iter()
        .filter_map(|offset| parse_ifd_at(&mut cursor, offset, little_endian).ok())
        .collect();

    let ifd1 = if ifd0.next != 0 {
        parse_ifd_at(&mut cursor, ifd0.next, little_endian).ok()
    } else {
        None
    };

    // SubIFDs usually hold the large preview; tiny ones are a last resort
    let largest_subifd = subifds
        .iter()
        .filter_map(|dir| jpeg_from_entries(&dir.entries, bytes))
        .max_by_key(|preview| preview.data.len());

    if let Some(preview) = largest_subifd
        .as_ref()
        .filter(|p| p.data.len() > options.min_subifd_preview_len)
    {
        trace!("Preview found in SubIFD ({} bytes)", preview.data.len());
        return Ok(Some(preview.clone()));
    }

    if let Some(preview) = ifd1.as_ref().and_then(|dir| jpeg_from_entries(&dir.entries, bytes)) {
        trace!("Preview found in IFD1 ({} bytes)", preview.data.len());
        return Ok(Some(preview));
    }

    if let Some(preview) = jpeg_from_entries(&ifd0.entries, bytes) {
        trace!("Preview found in IFD0 ({} bytes)", preview.data.len());
        return Ok(Some(preview));
    }

    if largest_subifd.is_some() {
        return Ok(largest_subifd);
    }

    if options.allow_bitmap_previews {
        let bitmap = std::iter::once(&ifd0)
            .chain(ifd1.as_ref())
            .chain(subifds.iter())
            .find_map(|dir| bitmap_from_entries(&dir.entries, bytes));
        if let Some(preview) = bitmap {
            trace!("Bitmap preview found ({:?})", preview.format);
            return Ok(Some(preview));
        }
    }

    Ok(None)
}

// IFD entry structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct IfdEntry {
    tag: u16,
    count: u32,
    /// Inline value for SHORT entries, otherwise the raw value/offset field.
    value: u32,
}

struct Ifd {
    entries: Vec<IfdEntry>,
    next: u32,
}

fn seek_to<R: Seek>(reader: &mut R, offset: u64) -> Result<(), DecodeError> {
    reader
        .seek(SeekFrom::Start(offset))
        .map(|_| ())
        .map_err(|e| DecodeError::Corrupted(format!("Failed to seek to {}: {}", offset, e)))
}

fn read_u16<R: Read>(reader: &mut R, little_endian: bool) -> Result<u16, DecodeError> {
    let mut buf = [0u8; 2];
    reader
        .read_exact(&mut buf)
        .map_err(|e| DecodeError::Corrupted(format!("Failed to read u16: {}", e)))?;
    Ok(if little_endian {
        u16::from_le_bytes(buf)
    } else {
        u16::from_be_bytes(buf)
    })
}

fn read_u32<R: Read>(reader: &mut R, little_endian: bool) -> Result<u32, DecodeError> {
    let mut buf = [0u8; 4];
    reader
        .read_exact(&mut buf)
        .map_err(|e| DecodeError::Corrupted(format!("Failed to read u32: {}", e)))?;
    Ok(if little_endian {
        u32::from_le_bytes(buf)
    } else {
        u32::from_be_bytes(buf)
    })
}

fn parse_ifd_at<R: Read + Seek>(
    reader: &mut R,
    offset: u32,
    little_endian: bool,
) -> Result<Ifd, DecodeError> {
    seek_to(reader, offset as u64)?;
    parse_ifd(reader, little_endian)
}

fn parse_ifd<R: Read>(reader: &mut R, little_endian: bool) -> Result<Ifd, DecodeError> {
    let entry_count = read_u16(reader, little_endian)?;

    if entry_count > MAX_IFD_ENTRIES {
        return Err(DecodeError::Corrupted("Too many IFD entries".to_string()));
    }

    let mut entries = Vec::with_capacity(entry_count as usize);

    for _ in 0..entry_count {
        let tag = read_u16(reader, little_endian)?;
        let typ = read_u16(reader, little_endian)?;
        let count = read_u32(reader, little_endian)?;

        let mut raw = [0u8; 4];
        reader
            .read_exact(&mut raw)
            .map_err(|e| DecodeError::Corrupted(format!("Failed to read IFD value: {}", e)))?;

        // SHORT values are left-justified in the value field
        let value = if typ == TYPE_SHORT && count <= 2 {
            let short = [raw[0], raw[1]];
            u32::from(if little_endian {
                u16::from_le_bytes(short)
            } else {
                u16::from_be_bytes(short)
            })
        } else if little_endian {
            u32::from_le_bytes(raw)
        } else {
            u32::from_be_bytes(raw)
        };

        entries.push(IfdEntry { tag, count, value });
    }

    let next = read_u32(reader, little_endian).unwrap_or(0);

    Ok(Ifd { entries, next })
}

fn find_entry(entries: &[IfdEntry], tag: u16) -> Option<&IfdEntry> {
    entries.iter().find(|entry| entry.tag == tag)
}

fn entry_value(entries: &[IfdEntry], tag: u16) -> Option<u32> {
    find_entry(entries, tag).map(|entry| entry.value)
}

fn subifd_offsets<R: Read + Seek>(
    entries: &[IfdEntry],
    reader: &mut R,
    little_endian: bool,
) -> Vec<u32> {
    let Some(entry) = find_entry(entries, TAG_SUBIFD) else {
        return Vec::new();
    };
    match entry.count {
        0 => Vec::new(),
        1 => vec![entry.value],
        count => {
            // More than one SubIFD: the value points at an array of offsets
            if seek_to(reader, entry.value as u64).is_err() {
                return Vec::new();
            }
            (0..count.min(MAX_SUBIFDS))
                .map_while(|_| read_u32(reader, little_endian).ok())
                .collect()
        }
    }
}

/// Offset and length of a single-strip image.
fn single_strip(entries: &[IfdEntry]) -> Option<(u32, u32)> {
    let offsets = find_entry(entries, TAG_STRIP_OFFSETS)?;
    let counts = find_entry(entries, TAG_STRIP_BYTE_COUNTS)?;
    if offsets.count != 1 || counts.count != 1 {
        return None;
    }
    Some((offsets.value, counts.value))
}

/// Safely extract a slice from file bytes if within bounds.
/// Returns None if offset + length exceeds file size or length is zero.
#[inline]
fn extract_slice(file_bytes: &[u8], offset: usize, length: usize) -> Option<&[u8]> {
    if length == 0 || offset.checked_add(length)? > file_bytes.len() {
        return None;
    }
    Some(&file_bytes[offset..offset + length])
}

/// Check if a byte slice starts with JPEG magic bytes.
#[inline]
fn is_jpeg_data(data: &[u8]) -> bool {
    data.starts_with(&JPEG_START)
}

/// Accept `data` as a JPEG preview if its frame header parses.
fn jpeg_preview(data: &[u8]) -> Option<Preview> {
    if !is_jpeg_data(data) {
        return None;
    }
    let (width, height) = ImageReader::with_format(Cursor::new(data), ImageFormat::Jpeg)
        .into_dimensions()
        .ok()?;
    Some(Preview {
        format: ThumbnailFormat::Jpeg { width, height },
        data: data.to_vec(),
    })
}

fn jpeg_from_entries(entries: &[IfdEntry], file_bytes: &[u8]) -> Option<Preview> {
    // JPEG interchange format first (most common for thumbnails)
    if let (Some(offset), Some(length)) = (
        entry_value(entries, TAG_JPEG_OFFSET),
        entry_value(entries, TAG_JPEG_LENGTH),
    ) {
        if let Some(preview) = extract_slice(file_bytes, offset as usize, length as usize)
            .and_then(jpeg_preview)
        {
            return Some(preview);
        }
    }

    // Strip-based JPEG (used by some cameras)
    let compression = entry_value(entries, TAG_COMPRESSION)?;
    if compression != COMPRESSION_JPEG && compression != COMPRESSION_JPEG_OLD {
        return None;
    }
    let (offset, length) = single_strip(entries)?;
    extract_slice(file_bytes, offset as usize, length as usize).and_then(jpeg_preview)
}

/// Uncompressed 8-bit RGB strip, as Nikon stores in IFD0.
fn bitmap_from_entries(entries: &[IfdEntry], file_bytes: &[u8]) -> Option<Preview> {
    if entry_value(entries, TAG_COMPRESSION)? != COMPRESSION_NONE {
        return None;
    }
    if entry_value(entries, TAG_SAMPLES_PER_PIXEL).unwrap_or(1) != 3 {
        return None;
    }
    let width = entry_value(entries, TAG_IMAGE_WIDTH)?;
    let height = entry_value(entries, TAG_IMAGE_LENGTH)?;
    let (offset, length) = single_strip(entries)?;

    let expected = (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(3)?;
    if expected != length as usize {
        return None;
    }

    let data = extract_slice(file_bytes, offset as usize, length as usize)?;
    Some(Preview {
        format: ThumbnailFormat::Bitmap {
            width,
            height,
            colors: 3,
            bits: 8,
        },
        data: data.to_vec(),
    })
}

/// Byte length of the JPEG stream starting at `bytes[0]`.
///
/// Marker segments are skipped by their declared length up to SOS, so an
/// EXIF thumbnail nested in APP1 never ends the outer stream. Entropy-coded
/// data is scanned for the next non-stuffed, non-restart marker; anything
/// other than EOI there (progressive scans) resumes the segment walk.
fn jpeg_extent(bytes: &[u8]) -> Option<usize> {
    if !is_jpeg_data(bytes) {
        return None;
    }
    let mut pos = 2;
    loop {
        // Fill bytes may pad a marker
        while bytes.get(pos) == Some(&0xFF) && bytes.get(pos + 1) == Some(&0xFF) {
            pos += 1;
        }
        if *bytes.get(pos)? != 0xFF {
            return None;
        }
        let marker = *bytes.get(pos + 1)?;
        pos += 2;
        match marker {
            0xD9 => return Some(pos),
            0x01 | 0xD0..=0xD7 => continue,
            0xD8 | 0x00 => return None,
            _ => {}
        }

        let len = u16::from_be_bytes([*bytes.get(pos)?, *bytes.get(pos + 1)?]) as usize;
        if len < 2 {
            return None;
        }
        pos = pos.checked_add(len)?;
        if pos > bytes.len() {
            return None;
        }

        if marker == 0xDA {
            loop {
                if *bytes.get(pos)? == 0xFF {
                    match *bytes.get(pos + 1)? {
                        0x00 | 0xD0..=0xD7 | 0xFF => pos += 1,
                        _ => break,
                    }
                } else {
                    pos += 1;
                }
            }
        }
    }
}

/// Scan for embedded JPEG by looking for JPEG markers.
/// This is a fallback method when IFD parsing doesn't find the preview.
fn scan_for_jpeg(bytes: &[u8], min_len: usize) -> Option<Preview> {
    let last = bytes.len().saturating_sub(1);
    let mut start = SCAN_START_OFFSET.min(bytes.len());

    while start < last {
        if !bytes[start..].starts_with(&JPEG_START) {
            start += 1;
            continue;
        }
        if let Some(len) = jpeg_extent(&bytes[start..]) {
            if len > min_len {
                if let Some(preview) = jpeg_preview(&bytes[start..start + len]) {
                    return Some(preview);
                }
            }
        }
        start += 2;
    }
    None
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: arbitrary bytes behind a TIFF header never panic.
        #[test]
        fn prop_locate_preview_never_panics(
            le in any::<bool>(),
            body in prop::collection::vec(any::<u8>(), 0..1024),
        ) {
            let mut file = if le { TIFF_MAGIC_LE.to_vec() } else { TIFF_MAGIC_BE.to_vec() };
            file.extend(body);
            let _ = locate_preview(&file, &RawDecoderOptions::default());
        }

        /// Property: anything that is not a raw header is rejected up front.
        #[test]
        fn prop_non_raw_rejected(body in prop::collection::vec(any::<u8>(), 0..256)) {
            prop_assume!(!is_raw_header(&body));
            let result = locate_preview(&body, &RawDecoderOptions::default());
            prop_assert!(matches!(result, Err(DecodeError::UnrecognizedFormat)));
        }
    }
}
