//! Coordinate mapping between the merged target raster and sub-swath sources.
//!
//! Everything here is a pure lookup against the frozen geometry tables, safe to call
//! from any number of threads.

use crate::core::geometry::{GeoField, SubSwathGeometry, TargetGeometry};
use crate::types::{SarError, SarResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Source sample of a sub-swath for a target column, rounded and clamped to the
/// sub-swath raster
pub fn sample_index_in_source(target: &TargetGeometry, tx: usize, subswath: &SubSwathGeometry) -> usize {
    let sx = ((target.slant_range_time(tx) - subswath.slant_range_time_to_first_pixel)
        / target.delta_slant_range_time)
        .round();
    if sx <= 0.0 {
        0
    } else {
        (sx as usize).min(subswath.num_samples - 1)
    }
}

/// Target column for a sub-swath sample. May fall outside the target raster for
/// samples beyond the merged extent.
pub fn target_sample_index(target: &TargetGeometry, sx: usize, subswath: &SubSwathGeometry) -> i64 {
    let slr = subswath.slant_range_time_to_first_pixel + sx as f64 * target.delta_slant_range_time;
    ((slr - target.slant_range_time_to_first_pixel) / target.delta_slant_range_time).round() as i64
}

/// Range-time interval `[start, end)` owned by sub-swath `i` once each overlap is
/// split at the midpoint of the neighbouring edges
pub fn subswath_range_bounds(subswaths: &[SubSwathGeometry], i: usize) -> (f64, f64) {
    let sw = &subswaths[i];
    let start = if i == 0 {
        sw.slant_range_time_to_first_pixel
    } else {
        0.5 * (sw.slant_range_time_to_first_pixel + subswaths[i - 1].slant_range_time_to_last_pixel)
    };
    let end = if i + 1 == subswaths.len() {
        sw.slant_range_time_to_last_pixel
    } else {
        0.5 * (sw.slant_range_time_to_last_pixel + subswaths[i + 1].slant_range_time_to_first_pixel)
    };
    (start, end)
}

/// Sub-swath owning a slant range time under the midpoint split, `None` outside
/// the merged range coverage
pub fn subswath_index_for_slant_range(subswaths: &[SubSwathGeometry], slant_range_time: f64) -> Option<usize> {
    (0..subswaths.len()).find(|&i| {
        let (start, end) = subswath_range_bounds(subswaths, i);
        slant_range_time >= start && slant_range_time < end
    })
}

/// Enclosing tie-point cell and fractional offsets of a query point.
///
/// `mu_y` leaves `[0, 1)` when the query lies above the first or below the last
/// grid row; the blend then extrapolates linearly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BilinearIndex {
    pub i0: usize,
    pub i1: usize,
    pub j0: usize,
    pub j1: usize,
    pub mu_x: f64,
    pub mu_y: f64,
}

impl BilinearIndex {
    /// Bilinear blend of one grid field at this index
    pub fn interpolate(&self, field: &Array2<f64>) -> f64 {
        interpolate(field, self)
    }
}

/// Locate the tie-point cell of a sub-swath that encloses `(azimuth_time, slant_range_time)`
pub fn bilinear_index(azimuth_time: f64, slant_range_time: f64, subswath: &SubSwathGeometry) -> SarResult<BilinearIndex> {
    let grid = &subswath.geo_grid;
    let slr = grid.field(GeoField::SlantRangeTime);
    let az = grid.field(GeoField::AzimuthTime);
    let cols = grid.points_per_line();
    let rows = grid.num_lines();

    let j0 = (0..cols - 1)
        .find(|&j| slr[[0, j]] <= slant_range_time && slr[[0, j + 1]] > slant_range_time)
        .ok_or_else(|| {
            SarError::geometry(format!(
                "slant range time {:.9e} s outside tie-point grid of {} [{:.9e}, {:.9e})",
                slant_range_time,
                subswath.name,
                slr[[0, 0]],
                slr[[0, cols - 1]]
            ))
        })?;
    let j1 = j0 + 1;
    let mu_x = (slant_range_time - slr[[0, j0]]) / (slr[[0, j1]] - slr[[0, j0]]);

    let row_time = |i: usize| (1.0 - mu_x) * az[[i, j0]] + mu_x * az[[i, j1]];
    let last_interior = rows - 2;
    let i0 = (0..rows - 1)
        .find(|&i| {
            let (t0, t1) = (row_time(i), row_time(i + 1));
            (i == 0 && azimuth_time < t0) || (i == last_interior && azimuth_time >= t1) || (t0 <= azimuth_time && azimuth_time < t1)
        })
        .ok_or_else(|| {
            SarError::geometry(format!(
                "azimuth time {:.12} d not bracketed by tie-point rows of {}",
                azimuth_time, subswath.name
            ))
        })?;
    let i1 = i0 + 1;
    let (t0, t1) = (row_time(i0), row_time(i1));
    let mu_y = (azimuth_time - t0) / (t1 - t0);

    Ok(BilinearIndex { i0, i1, j0, j1, mu_x, mu_y })
}

/// Standard bilinear blend of the four cell corners
pub fn interpolate(field: &Array2<f64>, index: &BilinearIndex) -> f64 {
    let f00 = field[[index.i0, index.j0]];
    let f01 = field[[index.i0, index.j1]];
    let f10 = field[[index.i1, index.j0]];
    let f11 = field[[index.i1, index.j1]];
    (1.0 - index.mu_y) * ((1.0 - index.mu_x) * f00 + index.mu_x * f01)
        + index.mu_y * ((1.0 - index.mu_x) * f10 + index.mu_x * f11)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::{BurstTable, GeoLocationGrid, SubSwathParams};
    use crate::types::SPEED_OF_LIGHT;
    use approx::assert_abs_diff_eq;

    const RPS: f64 = 2.329562;
    const DT: f64 = 1.0e-8;

    fn delta() -> f64 {
        RPS / SPEED_OF_LIGHT
    }

    fn subswath(index: usize, first_sample: f64, samples: usize) -> SubSwathGeometry {
        let slr0 = 5.0e-3 + first_sample * delta();
        let rows = 4;
        let cols = 5;
        let col_slr = |j: usize| slr0 - 2.0 * delta() + j as f64 * (samples as f64 + 4.0) / (cols - 1) as f64 * delta();
        let az = Array2::from_shape_fn((rows, cols), |(i, j)| 7000.0 + (i as f64 * 60.0 + j as f64 * 0.5) * DT);
        let slr = Array2::from_shape_fn((rows, cols), |(_, j)| col_slr(j));
        let lat = Array2::from_shape_fn((rows, cols), |(i, j)| 45.0 + i as f64 * 0.1 - j as f64 * 0.02);
        let lon = Array2::from_shape_fn((rows, cols), |(i, j)| 7.0 - i as f64 * 0.03 + j as f64 * 0.2);
        let inc = Array2::from_shape_fn((rows, cols), |(_, j)| 30.0 + j as f64);
        let params = SubSwathParams {
            name: format!("IW{}", index + 1),
            index,
            num_lines: 200,
            num_samples: samples,
            first_line_time: 7000.0,
            last_line_time: 7000.0 + 199.0 * DT,
            azimuth_time_interval: DT,
            slant_range_time_to_first_pixel: slr0,
            range_pixel_spacing: RPS,
        };
        SubSwathGeometry::new(
            params,
            BurstTable::new(200, samples, vec![7000.0], DT),
            GeoLocationGrid::new(az, slr, lat, lon, inc).unwrap(),
        )
        .unwrap()
    }

    fn three() -> Vec<SubSwathGeometry> {
        vec![subswath(0, 0.0, 400), subswath(1, 394.0, 400), subswath(2, 788.0, 400)]
    }

    #[test]
    fn test_sample_index_rounding_and_clamping() {
        let swaths = three();
        let target = TargetGeometry::from_subswaths(&swaths).unwrap();
        assert_eq!(sample_index_in_source(&target, 0, &swaths[1]), 0);
        assert_eq!(sample_index_in_source(&target, 397, &swaths[1]), 3);
        assert_eq!(sample_index_in_source(&target, 1000, &swaths[0]), 399);
        assert_eq!(target_sample_index(&target, 3, &swaths[1]), 397);
    }

    #[test]
    fn test_range_split_at_midpoint() {
        let swaths = three();
        let mid = 0.5 * (swaths[0].slant_range_time_to_last_pixel + swaths[1].slant_range_time_to_first_pixel);
        let eps = 1.0e-3 * delta();
        assert_eq!(subswath_index_for_slant_range(&swaths, mid), Some(1));
        assert_eq!(subswath_index_for_slant_range(&swaths, mid - eps), Some(0));
        assert_eq!(subswath_index_for_slant_range(&swaths, swaths[0].slant_range_time_to_first_pixel), Some(0));
        assert_eq!(subswath_index_for_slant_range(&swaths, swaths[2].slant_range_time_to_last_pixel), None);
        assert_eq!(subswath_index_for_slant_range(&swaths, 1.0e-3), None);
    }

    #[test]
    fn test_bilinear_index_on_grid_node() {
        let sw = subswath(0, 0.0, 400);
        let grid = &sw.geo_grid;
        let az = grid.field(GeoField::AzimuthTime)[[2, 1]];
        let slr = grid.field(GeoField::SlantRangeTime)[[2, 1]];
        let idx = bilinear_index(az, slr, &sw).unwrap();
        assert_eq!((idx.i0, idx.j0), (2, 1));
        assert_eq!(idx.mu_x, 0.0);
        assert_eq!(idx.mu_y, 0.0);
        let lat = grid.field(GeoField::Latitude);
        assert_eq!(idx.interpolate(lat), lat[[2, 1]]);
    }

    #[test]
    fn test_bilinear_index_extrapolates_outside_rows() {
        let sw = subswath(0, 0.0, 400);
        let slr = sw.geo_grid.field(GeoField::SlantRangeTime)[[0, 0]];
        let before = bilinear_index(7000.0 - 30.0 * DT, slr, &sw).unwrap();
        assert_eq!(before.i0, 0);
        assert!(before.mu_y < 0.0);

        let after = bilinear_index(7000.0 + 400.0 * DT, slr, &sw).unwrap();
        assert_eq!(after.i1, 3);
        assert!(after.mu_y > 1.0);
    }

    #[test]
    fn test_bilinear_index_rejects_range_outside_grid() {
        let sw = subswath(0, 0.0, 400);
        match bilinear_index(7000.0, 1.0e-3, &sw) {
            Err(SarError::GeometryInconsistency { context }) => assert!(context.contains("IW1")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_interpolate_blend() {
        let field = Array2::from_shape_vec((2, 2), vec![0.0, 10.0, 20.0, 30.0]).unwrap();
        let idx = BilinearIndex { i0: 0, i1: 1, j0: 0, j1: 1, mu_x: 0.25, mu_y: 0.5 };
        assert_abs_diff_eq!(interpolate(&field, &idx), 12.5, epsilon = 1e-12);
    }
}
