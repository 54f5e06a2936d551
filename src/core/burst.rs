//! Burst locator: target azimuth line -> source line within a sub-swath's burst table.

use crate::core::coordinates::sample_index_in_source;
use crate::core::geometry::{SubSwathGeometry, TargetGeometry};
use crate::types::TileRect;

/// A burst matching a target azimuth time and the source line it maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstCandidate {
    pub burst_index: usize,
    pub source_line: usize,
}

/// Second matching burst when the target time lies in the overlap of two consecutive bursts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstOverlap {
    pub later: BurstCandidate,
    /// Mean of the earlier burst's last line time and the later burst's first line time
    pub mid_time: f64,
}

/// Resolution of one target line against one sub-swath.
/// Absence of any matching burst is expressed by `locate_burst` returning `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstResolution {
    pub target_time: f64,
    pub first: BurstCandidate,
    pub overlap: Option<BurstOverlap>,
}

impl BurstResolution {
    /// Selected source line: the later burst from the midpoint time on, the earlier one before it
    pub fn source_line(&self) -> usize {
        match self.overlap {
            Some(overlap) if self.target_time >= overlap.mid_time => overlap.later.source_line,
            _ => self.first.source_line,
        }
    }

    /// Burst the selected source line belongs to
    pub fn burst_index(&self) -> usize {
        match self.overlap {
            Some(overlap) if self.target_time >= overlap.mid_time => overlap.later.burst_index,
            _ => self.first.burst_index,
        }
    }

    /// Largest candidate source line
    pub fn max_source_line(&self) -> usize {
        self.overlap
            .map_or(self.first.source_line, |o| o.later.source_line.max(self.first.source_line))
    }
}

/// Resolve an azimuth time against the bursts of a sub-swath.
///
/// A burst matches when `first_line_time <= t < last_line_time`; at most two
/// consecutive bursts can match.
pub fn locate_burst(target_time: f64, subswath: &SubSwathGeometry) -> Option<BurstResolution> {
    let bursts = &subswath.bursts;
    let mut matches = (0..bursts.len())
        .filter(|&i| target_time >= bursts.first_line_time(i) && target_time < bursts.last_line_time(i))
        .map(|i| BurstCandidate {
            burst_index: i,
            source_line: i * bursts.lines_per_burst
                + ((target_time - bursts.first_line_time(i)) / subswath.azimuth_time_interval).round() as usize,
        });

    let first = matches.next()?;
    let overlap = matches.next().map(|later| BurstOverlap {
        later,
        mid_time: 0.5 * (bursts.last_line_time(first.burst_index) + bursts.first_line_time(later.burst_index)),
    });

    Some(BurstResolution { target_time, first, overlap })
}

/// Resolve a target line against the bursts of a sub-swath
pub fn locate_target_line(target: &TargetGeometry, y: usize, subswath: &SubSwathGeometry) -> Option<BurstResolution> {
    locate_burst(target.line_time(y), subswath)
}

/// First target row covered by a sub-swath (truncated toward zero)
pub fn compute_y_min(target: &TargetGeometry, subswath: &SubSwathGeometry) -> i64 {
    ((subswath.first_line_time - target.first_line_time) / target.line_time_interval) as i64
}

/// Last target row covered by a sub-swath (truncated toward zero)
pub fn compute_y_max(target: &TargetGeometry, subswath: &SubSwathGeometry) -> i64 {
    ((subswath.last_line_time - target.first_line_time) / target.line_time_interval) as i64
}

/// Source rectangle of a sub-swath needed to fill a target tile.
///
/// Columns come from the sample mapping at the tile's left and right edges; rows
/// from the burst locator at the tile's top and bottom, falling back to the full
/// raster height where those rows hit no burst.
pub fn source_rectangle(target: &TargetGeometry, tile: &TileRect, subswath: &SubSwathGeometry) -> TileRect {
    let x0 = sample_index_in_source(target, tile.x, subswath);
    let x_max = sample_index_in_source(target, tile.x_max().saturating_sub(1), subswath);

    let y0 = locate_target_line(target, tile.y, subswath).map_or(0, |r| r.first.source_line);
    let y_max = locate_target_line(target, tile.y_max().saturating_sub(1), subswath)
        .map_or(subswath.num_lines - 1, |r| r.max_source_line());

    let y_max = y_max.max(y0).min(subswath.num_lines - 1);
    let y0 = y0.min(y_max);
    TileRect::new(x0, y0, x_max.saturating_sub(x0) + 1, y_max - y0 + 1)
}
