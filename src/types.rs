use chrono::{DateTime, Duration, NaiveDate, Utc};
use ndarray::Array2;
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Complex SLC sample as stored in Sentinel-1 measurement data (I + jQ, 16-bit each)
pub type SarCInt16 = Complex<i16>;

/// Real-valued calibrated intensity sample
pub type SarReal = f32;

/// 2D complex SLC raster (azimuth x range)
pub type SarCInt16Image = Array2<SarCInt16>;

/// 2D real raster (azimuth x range)
pub type SarRealImage = Array2<SarReal>;

/// Speed of light in vacuum (m/s)
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Seconds per day, used to convert azimuth times between seconds and fractional days
pub const SECONDS_IN_DAY: f64 = 86_400.0;

/// Nanoseconds per second
pub const ONE_BILLION: f64 = 1.0e9;

/// Polarization modes for Sentinel-1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Polarization {
    VV,
    VH,
    HV,
    HH,
}

impl std::fmt::Display for Polarization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Polarization::VV => write!(f, "VV"),
            Polarization::VH => write!(f, "VH"),
            Polarization::HV => write!(f, "HV"),
            Polarization::HH => write!(f, "HH"),
        }
    }
}

impl FromStr for Polarization {
    type Err = SarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "VV" => Ok(Polarization::VV),
            "VH" => Ok(Polarization::VH),
            "HV" => Ok(Polarization::HV),
            "HH" => Ok(Polarization::HH),
            other => Err(SarError::InvalidFormat(format!("Invalid polarization: {}", other))),
        }
    }
}

/// Sentinel-1 acquisition mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcquisitionMode {
    IW, // Interferometric Wide swath
    EW, // Extra Wide swath
    SM, // StripMap
    WV, // Wave
}

impl AcquisitionMode {
    /// Number of TOPSAR sub-swaths for this mode, `None` for non-TOPSAR modes
    pub fn subswath_count(&self) -> Option<usize> {
        match self {
            AcquisitionMode::IW => Some(3),
            AcquisitionMode::EW => Some(5),
            AcquisitionMode::SM | AcquisitionMode::WV => None,
        }
    }

    /// Name of the n-th sub-swath (0-based ordinal), e.g. `IW2` for ordinal 1
    pub fn subswath_name(&self, ordinal: usize) -> String {
        format!("{}{}", self, ordinal + 1)
    }
}

impl std::fmt::Display for AcquisitionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquisitionMode::IW => write!(f, "IW"),
            AcquisitionMode::EW => write!(f, "EW"),
            AcquisitionMode::SM => write!(f, "SM"),
            AcquisitionMode::WV => write!(f, "WV"),
        }
    }
}

impl FromStr for AcquisitionMode {
    type Err = SarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "IW" => Ok(AcquisitionMode::IW),
            "EW" => Ok(AcquisitionMode::EW),
            "SM" | "S1" | "S2" | "S3" | "S4" | "S5" | "S6" => Ok(AcquisitionMode::SM),
            "WV" => Ok(AcquisitionMode::WV),
            other => Err(SarError::UnsupportedAcquisitionGeometry(format!(
                "Unknown acquisition mode: {}",
                other
            ))),
        }
    }
}

/// Kind of raster carried by a band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BandKind {
    /// Uncalibrated SLC, an in-phase/quadrature pair of 16-bit integer rasters
    Complex,
    Sigma0,
    Beta0,
    Gamma0,
    Dn,
}

impl BandKind {
    /// Calibrated kinds in the order target bands are created
    pub const CALIBRATED: [BandKind; 4] = [BandKind::Sigma0, BandKind::Beta0, BandKind::Gamma0, BandKind::Dn];

    pub fn is_calibrated(&self) -> bool {
        !matches!(self, BandKind::Complex)
    }
}

impl std::fmt::Display for BandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BandKind::Complex => write!(f, "Complex"),
            BandKind::Sigma0 => write!(f, "Sigma0"),
            BandKind::Beta0 => write!(f, "Beta0"),
            BandKind::Gamma0 => write!(f, "Gamma0"),
            BandKind::Dn => write!(f, "DN"),
        }
    }
}

/// A band as seen by the merge engine: what it holds and for which polarization.
/// Storage names are only derived from this at the I/O boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BandIdentity {
    pub kind: BandKind,
    pub polarization: Polarization,
}

impl BandIdentity {
    pub fn new(kind: BandKind, polarization: Polarization) -> Self {
        Self { kind, polarization }
    }

    pub fn complex(polarization: Polarization) -> Self {
        Self::new(BandKind::Complex, polarization)
    }
}

impl std::fmt::Display for BandIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.kind, self.polarization)
    }
}

/// Pixel rectangle, `x`/`y` of the upper-left corner plus size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl TileRect {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self { x, y, width, height }
    }

    /// One past the last column
    pub fn x_max(&self) -> usize {
        self.x + self.width
    }

    /// One past the last row
    pub fn y_max(&self) -> usize {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.x_max() && y >= self.y && y < self.y_max()
    }

    /// Intersection with another rectangle, `None` when they do not overlap
    pub fn intersection(&self, other: &TileRect) -> Option<TileRect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.x_max().min(other.x_max());
        let y1 = self.y_max().min(other.y_max());
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some(TileRect::new(x0, y0, x1 - x0, y1 - y0))
    }
}

impl std::fmt::Display for TileRect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[x={}, y={}, w={}, h={}]", self.x, self.y, self.width, self.height)
    }
}

fn mjd2000_epoch() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or_default()
}

/// UTC time to fractional days since 2000-01-01T00:00:00 (MJD2000)
pub fn utc_to_mjd2000(time: &DateTime<Utc>) -> f64 {
    let elapsed = time.signed_duration_since(mjd2000_epoch());
    match elapsed.num_microseconds() {
        Some(us) => us as f64 / (SECONDS_IN_DAY * 1.0e6),
        None => elapsed.num_milliseconds() as f64 / (SECONDS_IN_DAY * 1.0e3),
    }
}

/// Fractional days since 2000-01-01T00:00:00 (MJD2000) to UTC time
pub fn mjd2000_to_utc(days: f64) -> DateTime<Utc> {
    let micros = (days * SECONDS_IN_DAY * 1.0e6).round() as i64;
    mjd2000_epoch() + Duration::microseconds(micros)
}

/// Error types for TOPSAR deburst/merge processing
#[derive(Debug, thiserror::Error)]
pub enum SarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("XML parsing error: {0}")]
    XmlParsing(String),

    #[error("Geometry inconsistency: {context}")]
    GeometryInconsistency { context: String },

    #[error("Unsupported acquisition geometry: {0}")]
    UnsupportedAcquisitionGeometry(String),

    #[error("Missing band {band} for sub-swath {subswath}")]
    MissingBand { band: String, subswath: String },

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

impl SarError {
    pub(crate) fn geometry(context: impl Into<String>) -> Self {
        SarError::GeometryInconsistency { context: context.into() }
    }
}

/// Result type for SAR operations
pub type SarResult<T> = Result<T, SarError>;
