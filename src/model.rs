use std::fmt;
use std::path::PathBuf;

/// A validated position in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
    altitude: Option<f64>,
}

impl Coordinates {
    /// Returns `None` when either value is non-finite or out of range.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        valid.then_some(Self {
            latitude,
            longitude,
            altitude: None,
        })
    }

    /// Non-finite altitudes are dropped.
    pub fn with_altitude(mut self, altitude: Option<f64>) -> Self {
        self.altitude = altitude.filter(|a| a.is_finite());
        self
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Metres above sea level; negative below.
    pub fn altitude(&self) -> Option<f64> {
        self.altitude
    }

    /// KML tuple order: `lon,lat[,alt]`.
    pub fn to_kml_tuple(&self) -> String {
        match self.altitude {
            Some(alt) => format!("{},{},{}", self.longitude, self.latitude, alt),
            None => format!("{},{}", self.longitude, self.latitude),
        }
    }
}

/// Filesystem-safe identifier of a stored photo.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhotoId(String);

impl PhotoId {
    pub(crate) fn new(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct PhotoRecord {
    pub id: PhotoId,
    pub original_filename: String,
    /// Generated file name inside the uploads directory.
    pub stored_name: String,
    pub stored_path: PathBuf,
    pub coordinates: Option<Coordinates>,
    /// `YYYY-MM-DDTHH:MM:SS`, camera local time.
    pub captured_at: Option<String>,
}

impl PhotoRecord {
    pub fn has_location(&self) -> bool {
        self.coordinates.is_some()
    }
}

/// A submitted file: the name it arrived with and its raw contents.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}
