//! Exposure settings read from a raw file's EXIF block.

use std::io::Cursor;

use exif::{Exif, In, Reader, Tag, Value};
use log::trace;

/// ISO, exposure time (seconds) and f-number. Zero when absent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Exposure {
    pub iso: f32,
    pub shutter: f32,
    pub aperture: f32,
}

/// Read exposure settings from the container in `bytes`.
///
/// Files without readable EXIF give an all-zero [`Exposure`].
pub(crate) fn read_exposure(bytes: &[u8]) -> Exposure {
    let mut cursor = Cursor::new(bytes);
    let exif = match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        Err(e) => {
            trace!("No EXIF exposure data: {}", e);
            return Exposure::default();
        }
    };

    let iso = first_number(&exif, Tag::PhotographicSensitivity)
        .or_else(|| first_number(&exif, Tag::ISOSpeed));
    let shutter = first_number(&exif, Tag::ExposureTime)
        .or_else(|| first_number(&exif, Tag::ShutterSpeedValue).map(apex_to_seconds));
    let aperture = first_number(&exif, Tag::FNumber)
        .or_else(|| first_number(&exif, Tag::ApertureValue).map(apex_to_f_number));

    Exposure {
        iso: iso.unwrap_or(0.0) as f32,
        shutter: shutter.unwrap_or(0.0) as f32,
        aperture: aperture.unwrap_or(0.0) as f32,
    }
}

fn first_number(exif: &Exif, tag: Tag) -> Option<f64> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let value = match field.value {
        Value::Rational(ref v) => v.first().map(|r| r.to_f64()),
        Value::SRational(ref v) => v.first().map(|r| r.to_f64()),
        _ => field.value.get_uint(0).map(f64::from),
    }?;
    value.is_finite().then_some(value)
}

/// APEX Tv to exposure time: t = 2^-Tv.
fn apex_to_seconds(tv: f64) -> f64 {
    (-tv).exp2()
}

/// APEX Av to f-number: N = 2^(Av/2).
fn apex_to_f_number(av: f64) -> f64 {
    (av / 2.0).exp2()
}
