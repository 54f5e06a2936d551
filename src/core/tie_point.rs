//! Tie-point grid synthesis for the merged product.
//!
//! Every control point is interpolated inside the tie-point table of the single
//! sub-swath that owns its slant range time, so geometry is never blended across
//! sub-swath boundaries.

use crate::core::coordinates::{bilinear_index, subswath_index_for_slant_range};
use crate::core::geometry::{GeoField, ProductGeometry};
use crate::types::{SarError, SarResult, ONE_BILLION};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Field of the synthesized target geolocation grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiePointField {
    Latitude,
    Longitude,
    /// Two-way slant range time in nanoseconds
    SlantRangeTime,
    IncidenceAngle,
}

/// Sparse geolocation grid attached to the merged raster.
///
/// Control point `(i, j)` sits at target pixel `(j * sub_sampling_x, i * sub_sampling_y)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeolocationGrid {
    pub width: usize,
    pub height: usize,
    pub sub_sampling_x: usize,
    pub sub_sampling_y: usize,
    /// Degrees
    pub latitude: Array2<f32>,
    /// Degrees
    pub longitude: Array2<f32>,
    /// Two-way slant range time (ns)
    pub slant_range_time_ns: Array2<f32>,
    /// Degrees
    pub incidence_angle: Array2<f32>,
}

/// Latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Corners of the merged raster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CornerCoordinates {
    pub first_near: GeoPoint,
    pub first_far: GeoPoint,
    pub last_near: GeoPoint,
    pub last_far: GeoPoint,
}

/// Summary of the merged product handed to whoever writes its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetMetadata {
    pub num_output_lines: usize,
    pub num_samples_per_line: usize,
    pub first_line_time: DateTime<Utc>,
    pub last_line_time: DateTime<Utc>,
    /// Seconds
    pub line_time_interval: f64,
    pub corners: CornerCoordinates,
}

/// Sample the coordinate mapper on a `grid_width` x `grid_height` lattice spanning the target
pub fn synthesize_geolocation_grid(
    geometry: &ProductGeometry,
    grid_width: usize,
    grid_height: usize,
) -> SarResult<GeolocationGrid> {
    let target = geometry.target_extent();
    if grid_width < 2 || grid_height < 2 {
        return Err(SarError::Processing(format!(
            "Tie-point grid must be at least 2x2, got {}x{}",
            grid_width, grid_height
        )));
    }
    let sub_sampling_x = target.width / grid_width;
    let sub_sampling_y = target.height / grid_height;
    if sub_sampling_x == 0 || sub_sampling_y == 0 {
        return Err(SarError::Processing(format!(
            "Tie-point grid {}x{} is denser than the target raster {}x{}",
            grid_width, grid_height, target.width, target.height
        )));
    }

    log::debug!(
        "Synthesizing {}x{} tie-point grid, sub-sampling {}x{}",
        grid_width,
        grid_height,
        sub_sampling_x,
        sub_sampling_y
    );

    let shape = (grid_height, grid_width);
    let mut latitude = Array2::<f32>::zeros(shape);
    let mut longitude = Array2::<f32>::zeros(shape);
    let mut slant_range_time_ns = Array2::<f32>::zeros(shape);
    let mut incidence_angle = Array2::<f32>::zeros(shape);

    for i in 0..grid_height {
        let y = i * sub_sampling_y;
        let azimuth_time = target.line_time(y);
        for j in 0..grid_width {
            let x = j * sub_sampling_x;
            let slant_range_time = target.slant_range_time(x);
            let sw_index = subswath_index_for_slant_range(geometry.subswaths(), slant_range_time).ok_or_else(|| {
                SarError::geometry(format!(
                    "tie point ({}, {}) at slant range time {:.9e} s not covered by any sub-swath",
                    x, y, slant_range_time
                ))
            })?;
            let sw = geometry.subswath(sw_index);
            let index = bilinear_index(azimuth_time, slant_range_time, sw)?;
            let grid = &sw.geo_grid;

            latitude[[i, j]] = index.interpolate(grid.field(GeoField::Latitude)) as f32;
            longitude[[i, j]] = index.interpolate(grid.field(GeoField::Longitude)) as f32;
            slant_range_time_ns[[i, j]] =
                (index.interpolate(grid.field(GeoField::SlantRangeTime)) * 2.0 * ONE_BILLION) as f32;
            incidence_angle[[i, j]] = index.interpolate(grid.field(GeoField::IncidenceAngle)) as f32;
        }
    }

    Ok(GeolocationGrid {
        width: grid_width,
        height: grid_height,
        sub_sampling_x,
        sub_sampling_y,
        latitude,
        longitude,
        slant_range_time_ns,
        incidence_angle,
    })
}

impl GeolocationGrid {
    pub fn field(&self, field: TiePointField) -> &Array2<f32> {
        match field {
            TiePointField::Latitude => &self.latitude,
            TiePointField::Longitude => &self.longitude,
            TiePointField::SlantRangeTime => &self.slant_range_time_ns,
            TiePointField::IncidenceAngle => &self.incidence_angle,
        }
    }

    /// Value at an arbitrary target pixel position, bilinear inside the grid and
    /// linearly extrapolated from the border cells outside it
    pub fn pixel_value(&self, field: TiePointField, x: f64, y: f64) -> f64 {
        let data = self.field(field);
        let gx = x / self.sub_sampling_x as f64;
        let gy = y / self.sub_sampling_y as f64;
        let j0 = (gx.floor().max(0.0) as usize).min(self.width - 2);
        let i0 = (gy.floor().max(0.0) as usize).min(self.height - 2);
        let wx = gx - j0 as f64;
        let wy = gy - i0 as f64;

        let v00 = data[[i0, j0]] as f64;
        let v01 = data[[i0, j0 + 1]] as f64;
        let v10 = data[[i0 + 1, j0]] as f64;
        let v11 = data[[i0 + 1, j0 + 1]] as f64;
        (1.0 - wy) * ((1.0 - wx) * v00 + wx * v01) + wy * ((1.0 - wx) * v10 + wx * v11)
    }

    pub fn geo_point(&self, x: f64, y: f64) -> GeoPoint {
        GeoPoint {
            latitude: self.pixel_value(TiePointField::Latitude, x, y),
            longitude: self.pixel_value(TiePointField::Longitude, x, y),
        }
    }

    /// Corner coordinates of a `target_width` x `target_height` raster
    pub fn corner_coordinates(&self, target_width: usize, target_height: usize) -> CornerCoordinates {
        let (w, h) = (target_width as f64, target_height as f64);
        CornerCoordinates {
            first_near: self.geo_point(0.0, 0.0),
            first_far: self.geo_point(w, 0.0),
            last_near: self.geo_point(0.0, h),
            last_far: self.geo_point(w, h),
        }
    }
}

/// Timing, extent and corners of the merged product
pub fn target_metadata(geometry: &ProductGeometry, grid: &GeolocationGrid) -> TargetMetadata {
    let target = geometry.target_extent();
    TargetMetadata {
        num_output_lines: target.height,
        num_samples_per_line: target.width,
        first_line_time: target.start_time(),
        last_line_time: target.stop_time(),
        line_time_interval: target.line_time_interval_seconds(),
        corners: grid.corner_coordinates(target.width, target.height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn grid() -> GeolocationGrid {
        let lat = Array2::from_shape_fn((3, 4), |(i, j)| (10.0 + i as f64 - 0.5 * j as f64) as f32);
        GeolocationGrid {
            width: 4,
            height: 3,
            sub_sampling_x: 10,
            sub_sampling_y: 5,
            longitude: lat.mapv(|v| v * 2.0),
            slant_range_time_ns: lat.clone(),
            incidence_angle: lat.clone(),
            latitude: lat,
        }
    }

    #[test]
    fn test_pixel_value_on_node() {
        let g = grid();
        assert_abs_diff_eq!(g.pixel_value(TiePointField::Latitude, 20.0, 5.0), 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_pixel_value_extrapolates() {
        let g = grid();
        // planar field: lat = 10 + y/5 - 0.05 x
        assert_abs_diff_eq!(g.pixel_value(TiePointField::Latitude, 40.0, 15.0), 11.0, epsilon = 1e-5);
        assert_abs_diff_eq!(g.pixel_value(TiePointField::Latitude, 15.0, 2.5), 9.75, epsilon = 1e-5);
    }

    #[test]
    fn test_corner_coordinates() {
        let g = grid();
        let corners = g.corner_coordinates(40, 15);
        assert_abs_diff_eq!(corners.first_near.latitude, 10.0, epsilon = 1e-6);
        assert_abs_diff_eq!(corners.last_far.latitude, 11.0, epsilon = 1e-5);
        assert_abs_diff_eq!(corners.last_far.longitude, 22.0, epsilon = 1e-5);
    }
}
