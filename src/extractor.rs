//! GPS position and capture time from image metadata.
//!
//! The EXIF block is located with `kamadak-exif`, which understands JPEG,
//! TIFF, PNG (`eXIf`), HEIF and WebP containers. A photo without a GPS group,
//! or with one that cannot be interpreted, yields no coordinates; only bytes
//! that are not a readable image at all are reported as an error.

use std::io::{BufRead, BufReader, Cursor, Seek};
use std::path::Path;

use exif::{Exif, In, Tag, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::Coordinates;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hemisphere {
    North,
    South,
    East,
    West,
}

impl Hemisphere {
    /// Parses an EXIF reference byte (`N`/`S` or `E`/`W`) for the given axis.
    pub fn from_ref(reference: u8, axis: Axis) -> Option<Self> {
        match (axis, reference.to_ascii_uppercase()) {
            (Axis::Latitude, b'N') => Some(Self::North),
            (Axis::Latitude, b'S') => Some(Self::South),
            (Axis::Longitude, b'E') => Some(Self::East),
            (Axis::Longitude, b'W') => Some(Self::West),
            _ => None,
        }
    }

    fn sign(self) -> f64 {
        match self {
            Self::North | Self::East => 1.0,
            Self::South | Self::West => -1.0,
        }
    }
}

/// Sexagesimal angle with a hemisphere reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dms {
    pub degrees: f64,
    pub minutes: f64,
    pub seconds: f64,
    pub hemisphere: Hemisphere,
}

impl Dms {
    pub fn to_decimal(&self) -> f64 {
        let magnitude = self.degrees + self.minutes / 60.0 + self.seconds / 3600.0;
        self.hemisphere.sign() * magnitude
    }

    /// Whole degrees and minutes, fractional seconds.
    pub fn from_decimal(value: f64, axis: Axis) -> Self {
        let hemisphere = match (axis, value.is_sign_negative()) {
            (Axis::Latitude, false) => Hemisphere::North,
            (Axis::Latitude, true) => Hemisphere::South,
            (Axis::Longitude, false) => Hemisphere::East,
            (Axis::Longitude, true) => Hemisphere::West,
        };

        let abs = value.abs();
        let degrees = abs.trunc();
        let rem = (abs - degrees) * 60.0;
        let minutes = rem.trunc();
        let seconds = (rem - minutes) * 60.0;

        Self {
            degrees,
            minutes,
            seconds,
            hemisphere,
        }
    }
}

/// What could be read from a photo's metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoMetadata {
    pub coordinates: Option<Coordinates>,
    pub captured_at: Option<String>,
}

pub fn extract_from_bytes(bytes: &[u8]) -> Result<PhotoMetadata> {
    extract_from_reader(&mut Cursor::new(bytes))
}

pub fn extract_from_path(path: &Path) -> Result<PhotoMetadata> {
    let file = std::fs::File::open(path)?;
    extract_from_reader(&mut BufReader::new(file))
}

pub fn extract_from_reader<R: BufRead + Seek>(reader: &mut R) -> Result<PhotoMetadata> {
    let exif = match exif::Reader::new().read_from_container(reader) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(container)) => {
            debug!("No EXIF block in {} container", container);
            return Ok(PhotoMetadata::default());
        }
        Err(e) => return Err(Error::Unreadable(e.to_string())),
    };

    Ok(PhotoMetadata {
        coordinates: read_coordinates(&exif),
        captured_at: read_capture_time(&exif),
    })
}

/// Returns `None` for both missing and malformed GPS data.
pub fn read_coordinates(exif: &Exif) -> Option<Coordinates> {
    if exif.get_field(Tag::GPSLatitude, In::PRIMARY).is_none()
        && exif.get_field(Tag::GPSLongitude, In::PRIMARY).is_none()
    {
        debug!("No GPS position tags present");
        return None;
    }

    let latitude = read_axis(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, Axis::Latitude)?;
    let longitude = read_axis(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, Axis::Longitude)?;

    let Some(coordinates) = Coordinates::new(latitude, longitude) else {
        warn!(
            "GPS position out of range: lat={}, lon={}",
            latitude, longitude
        );
        return None;
    };

    Some(coordinates.with_altitude(read_altitude(exif)))
}

fn read_axis(exif: &Exif, value_tag: Tag, ref_tag: Tag, axis: Axis) -> Option<f64> {
    let Some(field) = exif.get_field(value_tag, In::PRIMARY) else {
        warn!("{} is missing", value_tag);
        return None;
    };
    let Some(components) = rational_components(&field.value) else {
        warn!("{} is malformed: {}", value_tag, field.display_value());
        return None;
    };

    let reference = exif
        .get_field(ref_tag, In::PRIMARY)
        .and_then(|f| first_ascii_byte(&f.value));
    let Some(reference) = reference else {
        warn!("{} is missing or malformed", ref_tag);
        return None;
    };

    decimal_from_components(&components, reference, axis)
}

/// DMS components plus a reference byte to signed decimal degrees.
pub fn decimal_from_components(components: &[f64], reference: u8, axis: Axis) -> Option<f64> {
    let [degrees, minutes, seconds] = components else {
        debug!("Expected 3 DMS components, got {}", components.len());
        return None;
    };
    if components.iter().any(|c| !c.is_finite() || *c < 0.0) {
        debug!("Invalid DMS components: {:?}", components);
        return None;
    }
    let hemisphere = Hemisphere::from_ref(reference, axis)?;

    let dms = Dms {
        degrees: *degrees,
        minutes: *minutes,
        seconds: *seconds,
        hemisphere,
    };
    Some(dms.to_decimal())
}

fn rational_components(value: &Value) -> Option<Vec<f64>> {
    match value {
        Value::Rational(v) => Some(v.iter().map(|r| r.to_f64()).collect()),
        Value::SRational(v) => Some(v.iter().map(|r| r.to_f64()).collect()),
        _ => None,
    }
}

fn first_ascii_byte(value: &Value) -> Option<u8> {
    match value {
        Value::Ascii(v) => v
            .first()
            .and_then(|s| s.iter().copied().find(|b| !b.is_ascii_whitespace())),
        _ => None,
    }
}

fn read_altitude(exif: &Exif) -> Option<f64> {
    let field = exif.get_field(Tag::GPSAltitude, In::PRIMARY)?;
    let altitude = match &field.value {
        Value::Rational(v) => v.first()?.to_f64(),
        _ => {
            debug!("GPSAltitude is malformed: {}", field.display_value());
            return None;
        }
    };
    if !altitude.is_finite() {
        return None;
    }

    // 1 = 海面下
    let below_sea_level = exif
        .get_field(Tag::GPSAltitudeRef, In::PRIMARY)
        .and_then(|f| match &f.value {
            Value::Byte(v) => v.first().copied(),
            _ => None,
        })
        == Some(1);

    Some(if below_sea_level { -altitude } else { altitude })
}

/// `DateTimeOriginal`, falling back to `DateTime`.
pub fn read_capture_time(exif: &Exif) -> Option<String> {
    [Tag::DateTimeOriginal, Tag::DateTime]
        .into_iter()
        .filter_map(|tag| exif.get_field(tag, In::PRIMARY))
        .find_map(|field| match &field.value {
            Value::Ascii(v) => v
                .first()
                .and_then(|s| exif::DateTime::from_ascii(s).ok())
                .map(|dt| {
                    format!(
                        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}",
                        dt.year, dt.month, dt.day, dt.hour, dt.minute, dt.second
                    )
                }),
            _ => None,
        })
}
