//! Synthetic three sub-swath IW product shared by the integration tests.
//!
//! Every sub-swath has 200 lines of 400 samples in two bursts of 100 lines, the
//! second burst starting 90 lines after the first. Sub-swath `k` starts `2k` lines
//! later in azimuth and `394k` samples further in range, which gives a 193 x 1187
//! target with six overlapping samples at each range seam.

#![allow(dead_code)]

use ndarray::Array2;
use sardine_topsar::core::{BurstTable, GeoLocationGrid, NoiseTable, NoiseVector, SubSwathGeometry, SubSwathParams};
use sardine_topsar::types::SPEED_OF_LIGHT;
use sardine_topsar::{AcquisitionMode, MemoryTileSource, Polarization, ProductGeometry, SarCInt16};
use sardine_topsar::{BandIdentity, BandKind};

pub const T0: f64 = 7300.0;
pub const DT: f64 = 2.4e-8;
pub const S0: f64 = 5.0e-3;
pub const RANGE_PIXEL_SPACING: f64 = 2.329562;
pub const NUM_LINES: usize = 200;
pub const NUM_SAMPLES: usize = 400;
pub const LINES_PER_BURST: usize = 100;
pub const BURST_STEP: usize = 90;
pub const RANGE_STEP: usize = 394;

pub const TARGET_WIDTH: usize = 1187;
pub const TARGET_HEIGHT: usize = 193;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn delta() -> f64 {
    RANGE_PIXEL_SPACING / SPEED_OF_LIGHT
}

pub fn first_line_time(k: usize) -> f64 {
    T0 + (2 * k) as f64 * DT
}

/// Latitude is linear in target line, longitude and incidence angle in target column
pub fn expected_latitude(y: f64) -> f64 {
    40.0 + 0.001 * y
}

pub fn expected_longitude(x: f64) -> f64 {
    10.0 + 0.0005 * x
}

pub fn expected_incidence(x: f64) -> f64 {
    30.0 + 0.01 * x
}

fn geo_grid(k: usize, num_samples: usize, range_step: usize) -> GeoLocationGrid {
    let t0 = first_line_time(k);
    let first_pixel = S0 + (range_step * k) as f64 * delta();
    let n = num_samples as f64;
    let rows = [-10.0, 100.0, 210.0];
    let cols = [-20.0, 0.25 * n, 0.5 * n, 0.75 * n, n + 20.0];

    let az = Array2::from_shape_fn((3, 5), |(i, _)| t0 + rows[i] * DT);
    let slr = Array2::from_shape_fn((3, 5), |(_, j)| first_pixel + cols[j] * delta());
    let line = |i: usize| (az[[i, 0]] - T0) / DT;
    let column = |j: usize| (slr[[0, j]] - S0) / delta();

    let lat = Array2::from_shape_fn((3, 5), |(i, _)| expected_latitude(line(i)));
    let lon = Array2::from_shape_fn((3, 5), |(_, j)| expected_longitude(column(j)));
    let inc = Array2::from_shape_fn((3, 5), |(_, j)| expected_incidence(column(j)));
    GeoLocationGrid::new(az, slr, lat, lon, inc).expect("valid synthetic grid")
}

pub fn subswath(k: usize) -> SubSwathGeometry {
    subswath_with(k, NUM_SAMPLES, RANGE_STEP)
}

/// Sub-swath `k` of `num_samples` samples, starting `range_step * k` samples into the target
pub fn subswath_with(k: usize, num_samples: usize, range_step: usize) -> SubSwathGeometry {
    let t0 = first_line_time(k);
    let params = SubSwathParams {
        name: format!("IW{}", k + 1),
        index: k,
        num_lines: NUM_LINES,
        num_samples,
        first_line_time: t0,
        last_line_time: t0 + (BURST_STEP + LINES_PER_BURST - 1) as f64 * DT,
        azimuth_time_interval: DT,
        slant_range_time_to_first_pixel: S0 + (range_step * k) as f64 * delta(),
        range_pixel_spacing: RANGE_PIXEL_SPACING,
    };
    let bursts = BurstTable::new(
        LINES_PER_BURST,
        num_samples,
        vec![t0, t0 + BURST_STEP as f64 * DT],
        DT,
    );
    SubSwathGeometry::new(params, bursts, geo_grid(k, num_samples, range_step)).expect("valid synthetic sub-swath")
}

/// Constant noise level per sub-swath for `pol`
pub fn with_flat_noise(sw: SubSwathGeometry, pol: Polarization, level: f32) -> SubSwathGeometry {
    let t0 = sw.first_line_time;
    let vector = |line: i64| NoiseVector {
        time: t0 + line as f64 * DT,
        line,
        pixels: vec![0, 399],
        values: vec![level, level],
    };
    let mut noise = NoiseTable::new();
    noise.insert(pol, vec![vector(0), vector(199)]);
    sw.with_noise(noise)
}

pub fn product_geometry() -> ProductGeometry {
    ProductGeometry::new(AcquisitionMode::IW, (0..3).map(subswath).collect()).expect("valid synthetic product")
}

/// Source pixel of sub-swath `k`: the real part encodes sub-swath and line, the
/// imaginary part the sample
pub fn source_pixel(k: usize, sy: usize, sx: usize) -> SarCInt16 {
    SarCInt16::new((1000 * (k + 1) + sy) as i16, (sx + 1) as i16)
}

pub fn complex_raster(k: usize) -> Array2<SarCInt16> {
    Array2::from_shape_fn((NUM_LINES, NUM_SAMPLES), |(sy, sx)| source_pixel(k, sy, sx))
}

pub fn real_raster(k: usize) -> Array2<f32> {
    Array2::from_shape_fn((NUM_LINES, NUM_SAMPLES), |(sy, sx)| (1000 * (k + 1) + sy) as f32 + sx as f32 * 1.0e-3)
}

pub fn complex_source(pol: Polarization) -> MemoryTileSource {
    let mut source = MemoryTileSource::new();
    for k in 0..3 {
        source.insert_complex(k, BandIdentity::complex(pol), complex_raster(k));
    }
    source
}

pub fn sigma0_source(pol: Polarization) -> MemoryTileSource {
    let mut source = MemoryTileSource::new();
    for k in 0..3 {
        source.insert_real(k, BandIdentity::new(BandKind::Sigma0, pol), real_raster(k));
    }
    source
}

/// Source line for a sub-swath-local line, `None` on the last line of the second
/// burst where the half-open burst interval makes the answer depend on rounding
pub fn source_line(local: usize) -> Option<usize> {
    let mid = BURST_STEP as f64 + 0.5 * (LINES_PER_BURST - 1 - BURST_STEP) as f64;
    if local < BURST_STEP || (local as f64) < mid {
        Some(local)
    } else if local < BURST_STEP + LINES_PER_BURST - 1 {
        Some(LINES_PER_BURST + local - BURST_STEP)
    } else {
        None
    }
}

/// Expected `(sub-swath, source line, source sample)` of a target pixel under the
/// midpoint seam rule. `Some(None)` for pixels no sub-swath covers, `None` for
/// pixels whose answer sits on a float boundary.
pub fn expected_source(x: usize, y: usize) -> Option<Option<(usize, usize, usize)>> {
    let covering: Vec<usize> = (0..3)
        .filter(|&k| {
            let (x0, y0) = (RANGE_STEP * k, 2 * k);
            x >= x0 && x < x0 + NUM_SAMPLES && y >= y0 && y <= y0 + BURST_STEP + LINES_PER_BURST - 1
        })
        .collect();

    let k = match covering.as_slice() {
        [] => return Some(None),
        [k] => *k,
        [near, far] => {
            let middle = 0.5 * ((RANGE_STEP * near + NUM_SAMPLES - 1) + RANGE_STEP * far) as f64;
            if x as f64 >= middle {
                *far
            } else {
                *near
            }
        }
        _ => unreachable!("at most two sub-swaths overlap"),
    };

    let sy = source_line(y - 2 * k)?;
    Some(Some((k, sy, x - RANGE_STEP * k)))
}
