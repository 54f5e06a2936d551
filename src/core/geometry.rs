use crate::types::{
    mjd2000_to_utc, AcquisitionMode, Polarization, SarError, SarResult, SECONDS_IN_DAY, SPEED_OF_LIGHT,
};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Burst timing table of one sub-swath.
///
/// All bursts share `lines_per_burst` and `samples_per_burst`; burst *i* occupies
/// source lines `i * lines_per_burst .. (i + 1) * lines_per_burst`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BurstTable {
    pub lines_per_burst: usize,
    pub samples_per_burst: usize,
    first_line_time: Vec<f64>,
    last_line_time: Vec<f64>,
    first_valid_sample: Vec<Vec<i32>>,
    last_valid_sample: Vec<Vec<i32>>,
}

impl BurstTable {
    /// Build the table from burst first-line azimuth times (fractional days).
    /// Last-line times are derived as `first + (lines_per_burst - 1) * azimuth_time_interval`.
    pub fn new(
        lines_per_burst: usize,
        samples_per_burst: usize,
        first_line_time: Vec<f64>,
        azimuth_time_interval: f64,
    ) -> Self {
        let span = lines_per_burst.saturating_sub(1) as f64 * azimuth_time_interval;
        let last_line_time = first_line_time.iter().map(|t| t + span).collect();
        Self {
            lines_per_burst,
            samples_per_burst,
            first_line_time,
            last_line_time,
            first_valid_sample: Vec::new(),
            last_valid_sample: Vec::new(),
        }
    }

    /// Attach per-burst valid sample bounds (one entry per burst line, -1 for no valid data)
    pub fn with_valid_samples(
        mut self,
        first_valid_sample: Vec<Vec<i32>>,
        last_valid_sample: Vec<Vec<i32>>,
    ) -> SarResult<Self> {
        if first_valid_sample.len() != self.len() || last_valid_sample.len() != self.len() {
            return Err(SarError::Metadata(format!(
                "Valid sample tables cover {}/{} bursts, expected {}",
                first_valid_sample.len(),
                last_valid_sample.len(),
                self.len()
            )));
        }
        self.first_valid_sample = first_valid_sample;
        self.last_valid_sample = last_valid_sample;
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.first_line_time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_line_time.is_empty()
    }

    pub fn first_line_time(&self, burst: usize) -> f64 {
        self.first_line_time[burst]
    }

    pub fn last_line_time(&self, burst: usize) -> f64 {
        self.last_line_time[burst]
    }

    pub fn first_line_times(&self) -> &[f64] {
        &self.first_line_time
    }

    /// Valid sample range `(first, last)` of a line within a burst, `None` when the
    /// annotation carries no bounds or marks the line invalid
    pub fn valid_samples(&self, burst: usize, line_in_burst: usize) -> Option<(usize, usize)> {
        let first = *self.first_valid_sample.get(burst)?.get(line_in_burst)?;
        let last = *self.last_valid_sample.get(burst)?.get(line_in_burst)?;
        if first < 0 || last < first {
            return None;
        }
        Some((first as usize, last as usize))
    }
}

/// Field of the geolocation tie-point grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeoField {
    AzimuthTime,
    SlantRangeTime,
    Latitude,
    Longitude,
    IncidenceAngle,
}

/// Geolocation tie-point grid of one sub-swath (`rows` x `points per row`).
///
/// Azimuth time increases down each column, slant range time increases along the
/// first row. Columns share slant range time across rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoLocationGrid {
    azimuth_time: Array2<f64>,
    slant_range_time: Array2<f64>,
    latitude: Array2<f64>,
    longitude: Array2<f64>,
    incidence_angle: Array2<f64>,
}

/// One annotated geolocation grid point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocationPoint {
    pub azimuth_time: f64,
    pub slant_range_time: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub incidence_angle: f64,
}

impl GeoLocationGrid {
    pub fn new(
        azimuth_time: Array2<f64>,
        slant_range_time: Array2<f64>,
        latitude: Array2<f64>,
        longitude: Array2<f64>,
        incidence_angle: Array2<f64>,
    ) -> SarResult<Self> {
        let dim = azimuth_time.dim();
        for (name, field) in [
            ("slant range time", &slant_range_time),
            ("latitude", &latitude),
            ("longitude", &longitude),
            ("incidence angle", &incidence_angle),
        ] {
            if field.dim() != dim {
                return Err(SarError::Metadata(format!(
                    "Geolocation grid {} has shape {:?}, expected {:?}",
                    name,
                    field.dim(),
                    dim
                )));
            }
        }

        let (rows, cols) = dim;
        if rows < 2 || cols < 2 {
            return Err(SarError::Metadata(format!(
                "Geolocation grid needs at least 2x2 points, got {}x{}",
                rows, cols
            )));
        }

        for j in 0..cols - 1 {
            if slant_range_time[[0, j + 1]] <= slant_range_time[[0, j]] {
                return Err(SarError::Metadata(format!(
                    "Geolocation grid slant range time not increasing at column {}",
                    j + 1
                )));
            }
        }
        for j in 0..cols {
            for i in 0..rows - 1 {
                if azimuth_time[[i + 1, j]] <= azimuth_time[[i, j]] {
                    return Err(SarError::Metadata(format!(
                        "Geolocation grid azimuth time not increasing at row {}, column {}",
                        i + 1,
                        j
                    )));
                }
            }
        }

        Ok(Self {
            azimuth_time,
            slant_range_time,
            latitude,
            longitude,
            incidence_angle,
        })
    }

    /// Build the grid from annotation points listed row by row
    pub fn from_points(points: &[GeoLocationPoint], points_per_line: usize) -> SarResult<Self> {
        if points_per_line == 0 || points.len() % points_per_line != 0 {
            return Err(SarError::Metadata(format!(
                "{} geolocation points do not form rows of {}",
                points.len(),
                points_per_line
            )));
        }
        let shape = (points.len() / points_per_line, points_per_line);
        let field = |f: fn(&GeoLocationPoint) -> f64| {
            Array2::from_shape_fn(shape, |(i, j)| f(&points[i * points_per_line + j]))
        };
        Self::new(
            field(|p| p.azimuth_time),
            field(|p| p.slant_range_time),
            field(|p| p.latitude),
            field(|p| p.longitude),
            field(|p| p.incidence_angle),
        )
    }

    pub fn num_lines(&self) -> usize {
        self.azimuth_time.nrows()
    }

    pub fn points_per_line(&self) -> usize {
        self.azimuth_time.ncols()
    }

    pub fn field(&self, field: GeoField) -> &Array2<f64> {
        match field {
            GeoField::AzimuthTime => &self.azimuth_time,
            GeoField::SlantRangeTime => &self.slant_range_time,
            GeoField::Latitude => &self.latitude,
            GeoField::Longitude => &self.longitude,
            GeoField::IncidenceAngle => &self.incidence_angle,
        }
    }
}

/// One thermal noise range vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseVector {
    /// Azimuth time of the vector (fractional days)
    pub time: f64,
    pub line: i64,
    /// Range sample breakpoints, increasing
    pub pixels: Vec<i64>,
    pub values: Vec<f32>,
}

/// Noise vectors of a sub-swath keyed by polarization, ordered by line
pub type NoiseTable = HashMap<Polarization, Vec<NoiseVector>>;

/// Timing and raster parameters of one sub-swath as read from its annotation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubSwathParams {
    pub name: String,
    pub index: usize,
    pub num_lines: usize,
    pub num_samples: usize,
    /// Azimuth time of the first line (fractional days)
    pub first_line_time: f64,
    /// Azimuth time of the last line (fractional days)
    pub last_line_time: f64,
    /// Azimuth time per line (fractional days)
    pub azimuth_time_interval: f64,
    /// One-way slant range time to the first pixel (s)
    pub slant_range_time_to_first_pixel: f64,
    /// Range pixel spacing (m)
    pub range_pixel_spacing: f64,
}

/// Immutable geometry table of one sub-swath
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubSwathGeometry {
    pub name: String,
    pub index: usize,
    pub num_lines: usize,
    pub num_samples: usize,
    pub first_line_time: f64,
    pub last_line_time: f64,
    pub azimuth_time_interval: f64,
    pub slant_range_time_to_first_pixel: f64,
    pub slant_range_time_to_last_pixel: f64,
    pub range_pixel_spacing: f64,
    pub bursts: BurstTable,
    pub geo_grid: GeoLocationGrid,
    pub noise: NoiseTable,
}

impl SubSwathGeometry {
    pub fn new(params: SubSwathParams, bursts: BurstTable, geo_grid: GeoLocationGrid) -> SarResult<Self> {
        if params.num_samples == 0 || params.num_lines == 0 {
            return Err(SarError::Metadata(format!(
                "Sub-swath {} has an empty raster ({} x {})",
                params.name, params.num_lines, params.num_samples
            )));
        }
        if !(params.azimuth_time_interval > 0.0) || !(params.range_pixel_spacing > 0.0) {
            return Err(SarError::Metadata(format!(
                "Sub-swath {} has non-positive sampling intervals",
                params.name
            )));
        }
        if params.last_line_time < params.first_line_time {
            return Err(SarError::Metadata(format!(
                "Sub-swath {} last line time precedes first line time",
                params.name
            )));
        }
        if bursts.is_empty() || bursts.lines_per_burst == 0 {
            return Err(SarError::Metadata(format!("Sub-swath {} has no bursts", params.name)));
        }

        let slant_range_time_to_last_pixel = params.slant_range_time_to_first_pixel
            + (params.num_samples - 1) as f64 * params.range_pixel_spacing / SPEED_OF_LIGHT;

        Ok(Self {
            name: params.name,
            index: params.index,
            num_lines: params.num_lines,
            num_samples: params.num_samples,
            first_line_time: params.first_line_time,
            last_line_time: params.last_line_time,
            azimuth_time_interval: params.azimuth_time_interval,
            slant_range_time_to_first_pixel: params.slant_range_time_to_first_pixel,
            slant_range_time_to_last_pixel,
            range_pixel_spacing: params.range_pixel_spacing,
            bursts,
            geo_grid,
            noise: NoiseTable::new(),
        })
    }

    /// Attach thermal noise vectors
    pub fn with_noise(mut self, noise: NoiseTable) -> Self {
        self.noise = noise;
        self
    }

    /// Whether an azimuth time falls within `[first_line_time, last_line_time]`
    pub fn covers_time(&self, azimuth_time: f64) -> bool {
        azimuth_time >= self.first_line_time && azimuth_time <= self.last_line_time
    }

    /// Nearest sample of a slant range time, unclamped
    pub fn nearest_sample(&self, slant_range_time: f64) -> f64 {
        ((slant_range_time - self.slant_range_time_to_first_pixel) / (self.range_pixel_spacing / SPEED_OF_LIGHT))
            .round()
    }

    /// Whether a slant range time rounds onto one of the sub-swath's samples.
    ///
    /// Decided in sample space so a target column landing on the last sample is
    /// covered even when its time differs from `slant_range_time_to_last_pixel` by an ulp.
    pub fn covers_slant_range(&self, slant_range_time: f64) -> bool {
        let sx = self.nearest_sample(slant_range_time);
        sx >= 0.0 && sx <= (self.num_samples - 1) as f64
    }
}

/// Geometry of the merged target raster, derived once from the sub-swaths
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetGeometry {
    pub width: usize,
    pub height: usize,
    pub first_line_time: f64,
    pub last_line_time: f64,
    pub line_time_interval: f64,
    pub slant_range_time_to_first_pixel: f64,
    pub slant_range_time_to_last_pixel: f64,
    pub delta_slant_range_time: f64,
}

impl TargetGeometry {
    pub fn from_subswaths(subswaths: &[SubSwathGeometry]) -> SarResult<Self> {
        let (first, last) = match (subswaths.first(), subswaths.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(SarError::Metadata("No sub-swaths to merge".to_string())),
        };

        let first_line_time = subswaths.iter().map(|s| s.first_line_time).fold(f64::INFINITY, f64::min);
        let last_line_time = subswaths.iter().map(|s| s.last_line_time).fold(f64::NEG_INFINITY, f64::max);
        let line_time_interval = first.azimuth_time_interval;
        let slant_range_time_to_first_pixel = first.slant_range_time_to_first_pixel;
        let slant_range_time_to_last_pixel = last.slant_range_time_to_last_pixel;
        let delta_slant_range_time = first.range_pixel_spacing / SPEED_OF_LIGHT;

        let height = ((last_line_time - first_line_time) / line_time_interval).round();
        let width = ((slant_range_time_to_last_pixel - slant_range_time_to_first_pixel) / delta_slant_range_time).round();
        if !(height >= 1.0) || !(width >= 1.0) {
            return Err(SarError::geometry(format!(
                "Target extent is empty ({} x {})",
                width, height
            )));
        }

        Ok(Self {
            width: width as usize,
            height: height as usize,
            first_line_time,
            last_line_time,
            line_time_interval,
            slant_range_time_to_first_pixel,
            slant_range_time_to_last_pixel,
            delta_slant_range_time,
        })
    }

    /// Azimuth time of a target line
    pub fn line_time(&self, y: usize) -> f64 {
        self.first_line_time + y as f64 * self.line_time_interval
    }

    /// One-way slant range time of a target column
    pub fn slant_range_time(&self, x: usize) -> f64 {
        self.slant_range_time_to_first_pixel + x as f64 * self.delta_slant_range_time
    }

    pub fn line_time_interval_seconds(&self) -> f64 {
        self.line_time_interval * SECONDS_IN_DAY
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        mjd2000_to_utc(self.first_line_time)
    }

    pub fn stop_time(&self) -> DateTime<Utc> {
        mjd2000_to_utc(self.last_line_time)
    }
}

/// Product-level attributes checked before any geometry is built
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDescriptor {
    pub mission: String,
    pub product_type: String,
    pub acquisition_mode: String,
}

impl ProductDescriptor {
    /// Accept Sentinel-1 TOPSAR SLC products only, returning the acquisition mode
    pub fn validate(&self) -> SarResult<AcquisitionMode> {
        if !self.mission.to_uppercase().starts_with("SENTINEL-1") {
            return Err(SarError::UnsupportedAcquisitionGeometry(format!(
                "{} is not a valid mission for Sentinel-1 product",
                self.mission
            )));
        }
        if self.product_type != "SLC" {
            return Err(SarError::UnsupportedAcquisitionGeometry(format!(
                "{} is not a SLC product",
                self.product_type
            )));
        }
        let mode: AcquisitionMode = self.acquisition_mode.parse()?;
        if mode.subswath_count().is_none() {
            return Err(SarError::UnsupportedAcquisitionGeometry(
                "Acquisition mode is not IW or EW".to_string(),
            ));
        }
        Ok(mode)
    }
}

/// Frozen geometry of a whole TOPSAR product: ordered sub-swaths plus target grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductGeometry {
    mode: AcquisitionMode,
    subswaths: Vec<SubSwathGeometry>,
    target: TargetGeometry,
}

impl ProductGeometry {
    pub fn new(mode: AcquisitionMode, subswaths: Vec<SubSwathGeometry>) -> SarResult<Self> {
        let expected = mode.subswath_count().ok_or_else(|| {
            SarError::UnsupportedAcquisitionGeometry(format!("{} is not a TOPSAR acquisition mode", mode))
        })?;
        if subswaths.len() != expected {
            return Err(SarError::UnsupportedAcquisitionGeometry(format!(
                "{} mode expects {} sub-swaths, got {}",
                mode,
                expected,
                subswaths.len()
            )));
        }

        for (i, sw) in subswaths.iter().enumerate() {
            if sw.index != i {
                return Err(SarError::Metadata(format!(
                    "Sub-swath {} listed at position {} but has index {}",
                    sw.name, i, sw.index
                )));
            }
        }
        for pair in subswaths.windows(2) {
            let (near, far) = (&pair[0], &pair[1]);
            if far.slant_range_time_to_first_pixel <= near.slant_range_time_to_first_pixel {
                return Err(SarError::geometry(format!(
                    "Sub-swaths {} and {} are not ordered by slant range",
                    near.name, far.name
                )));
            }
            if far.slant_range_time_to_first_pixel > near.slant_range_time_to_last_pixel {
                return Err(SarError::geometry(format!(
                    "Range gap between {} (ends {:.9e} s) and {} (starts {:.9e} s)",
                    near.name, near.slant_range_time_to_last_pixel, far.name, far.slant_range_time_to_first_pixel
                )));
            }
        }

        let target = TargetGeometry::from_subswaths(&subswaths)?;
        log::info!(
            "🧭 {} product geometry: {} sub-swaths, target {} x {} (lines x samples)",
            mode,
            subswaths.len(),
            target.height,
            target.width
        );

        Ok(Self { mode, subswaths, target })
    }

    pub fn mode(&self) -> AcquisitionMode {
        self.mode
    }

    pub fn subswaths(&self) -> &[SubSwathGeometry] {
        &self.subswaths
    }

    pub fn subswath(&self, index: usize) -> &SubSwathGeometry {
        &self.subswaths[index]
    }

    /// Extent and sampling of the merged raster, for whoever allocates the output
    pub fn target_extent(&self) -> &TargetGeometry {
        &self.target
    }

    /// Polarizations for which every sub-swath carries noise vectors
    pub fn noise_polarizations(&self) -> Vec<Polarization> {
        let mut pols: Vec<Polarization> = self
            .subswaths
            .first()
            .map(|s| s.noise.keys().copied().collect())
            .unwrap_or_default();
        pols.retain(|p| self.subswaths.iter().all(|s| s.noise.contains_key(p)));
        pols.sort();
        pols
    }
}
