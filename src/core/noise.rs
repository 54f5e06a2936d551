//! Thermal noise lookup, used only to rank overlapping sub-swaths at the seam.

use crate::core::coordinates::sample_index_in_source;
use crate::core::geometry::{NoiseVector, SubSwathGeometry, TargetGeometry};
use crate::types::{Polarization, SarError, SarResult};

/// Bracketing entries `(lower index, increment, lower position, upper position)` of a
/// sorted breakpoint list, clamped to the first or last entry outside the list
fn bracket(position: i64, breakpoints: &[i64]) -> (usize, usize, i64, i64) {
    let last = breakpoints.len() - 1;
    if position < breakpoints[0] {
        return (0, 0, breakpoints[0], breakpoints[0]);
    }
    if position >= breakpoints[last] {
        return (last, 0, breakpoints[last], breakpoints[last]);
    }
    let i = breakpoints
        .windows(2)
        .position(|w| position >= w[0] && position < w[1])
        .unwrap_or(last);
    (i, 1, breakpoints[i], breakpoints[i + 1])
}

fn fraction(position: i64, p0: i64, p1: i64) -> f64 {
    if p0 == p1 {
        0.0
    } else {
        (position - p0) as f64 / (p1 - p0) as f64
    }
}

fn lut_value(vector: &NoiseVector, index: usize, subswath: &str) -> SarResult<f64> {
    vector.values.get(index).map(|v| *v as f64).ok_or_else(|| {
        SarError::Metadata(format!(
            "Noise vector at line {} of {} has no value for breakpoint {}",
            vector.line, subswath, index
        ))
    })
}

/// Interpolated noise level of a sub-swath at a target column and azimuth time
pub fn subswath_noise(
    target: &TargetGeometry,
    tx: usize,
    target_line_time: f64,
    subswath: &SubSwathGeometry,
    polarization: Polarization,
) -> SarResult<f64> {
    let vectors = subswath
        .noise
        .get(&polarization)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            SarError::Metadata(format!("No {} noise vectors for sub-swath {}", polarization, subswath.name))
        })?;

    let sx = sample_index_in_source(target, tx, subswath) as i64;
    let sy = ((target_line_time - vectors[0].time) / target.line_time_interval) as i64;

    let lines: Vec<i64> = vectors.iter().map(|v| v.line).collect();
    let (v0, v_inc, l0, l1) = bracket(sy, &lines);
    let lower = &vectors[v0];
    let upper = &vectors[v0 + v_inc];

    if lower.pixels.is_empty() {
        return Err(SarError::Metadata(format!(
            "Noise vector at line {} of {} has no pixel breakpoints",
            lower.line, subswath.name
        )));
    }
    let (p0_idx, p_inc, p0, p1) = bracket(sx, &lower.pixels);

    let dx = fraction(sx, p0, p1);
    let dy = fraction(sy, l0, l1);

    let v00 = lut_value(lower, p0_idx, &subswath.name)?;
    let v01 = lut_value(lower, p0_idx + p_inc, &subswath.name)?;
    let v10 = lut_value(upper, p0_idx, &subswath.name)?;
    let v11 = lut_value(upper, p0_idx + p_inc, &subswath.name)?;

    Ok((1.0 - dy) * ((1.0 - dx) * v00 + dx * v01) + dy * ((1.0 - dx) * v10 + dx * v11))
}
