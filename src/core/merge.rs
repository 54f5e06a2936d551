//! Tile merge engine: deburst and sub-swath merge of one output tile at a time.
//!
//! Tiles are independent. A `TopsarMerge` only reads its frozen geometry, so any
//! number of tiles can be computed concurrently against the same instance as long
//! as each destination buffer belongs to one worker.

use crate::core::bands::BandPlan;
use crate::core::burst::{compute_y_max, compute_y_min, locate_target_line, source_rectangle};
use crate::core::coordinates::sample_index_in_source;
use crate::core::geometry::{ProductGeometry, SubSwathGeometry};
use crate::core::noise::subswath_noise;
use crate::core::tie_point::{synthesize_geolocation_grid, GeolocationGrid};
use crate::types::{
    BandIdentity, BandKind, Polarization, SarCInt16, SarCInt16Image, SarError, SarReal, SarRealImage, SarResult,
    TileRect,
};
use ndarray::{s, Array2};
use serde::{Deserialize, Serialize};

/// Squared amplitude below which a complex SLC sample is treated as an edge artifact
pub const DEFAULT_EDGE_INTENSITY_THRESHOLD: f64 = 300.0;

/// How the primary sub-swath is chosen where two sub-swaths overlap in range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SeamSelection {
    /// Split the overlap at the midpoint of the two sub-swath edges
    #[default]
    Midpoint,
    /// Prefer the sub-swath with the lower thermal noise level
    NoiseLevel,
}

/// Merge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Squared-amplitude threshold for degenerate complex samples
    pub edge_intensity_threshold: f64,
    /// Tie-point grid columns
    pub tie_point_grid_width: usize,
    /// Tie-point grid rows
    pub tie_point_grid_height: usize,
    /// Preferred output tile width (samples)
    pub tile_width: usize,
    /// Preferred output tile height (lines)
    pub tile_height: usize,
    pub seam_selection: SeamSelection,
    /// Compute tiles of a whole-band merge in parallel
    pub parallel: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            edge_intensity_threshold: DEFAULT_EDGE_INTENSITY_THRESHOLD,
            tie_point_grid_width: 20,
            tie_point_grid_height: 5,
            tile_width: 500,
            tile_height: 50,
            seam_selection: SeamSelection::Midpoint,
            parallel: true,
        }
    }
}

/// Thresholds deciding whether a source sample is unusable at a seam
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegenerateCriteria {
    pub intensity_threshold: f64,
    pub no_data_value: f64,
}

/// Read-only access to source sub-swath rasters.
///
/// Implementations must tolerate concurrent calls from several worker threads.
pub trait TileSource: Sync {
    /// Complex samples of `band` inside `rect` of a sub-swath raster
    fn fetch_complex(&self, subswath: &SubSwathGeometry, band: BandIdentity, rect: TileRect) -> SarResult<SarCInt16Image>;

    /// Calibrated samples of `band` inside `rect` of a sub-swath raster
    fn fetch_real(&self, subswath: &SubSwathGeometry, band: BandIdentity, rect: TileRect) -> SarResult<SarRealImage>;

    /// Declared no-data value of a calibrated source band
    fn no_data_value(&self, _subswath: &SubSwathGeometry, _band: BandIdentity) -> f64 {
        0.0
    }
}

/// Sample types the merge engine can move from source to target
pub trait MergeSample: Copy + Default + Send + Sync + 'static {
    fn is_degenerate(&self, criteria: &DegenerateCriteria) -> bool;

    fn fetch(
        source: &dyn TileSource,
        subswath: &SubSwathGeometry,
        band: BandIdentity,
        rect: TileRect,
    ) -> SarResult<Array2<Self>>;
}

impl MergeSample for SarCInt16 {
    fn is_degenerate(&self, criteria: &DegenerateCriteria) -> bool {
        let (i, q) = (self.re as f64, self.im as f64);
        i * i + q * q < criteria.intensity_threshold
    }

    fn fetch(
        source: &dyn TileSource,
        subswath: &SubSwathGeometry,
        band: BandIdentity,
        rect: TileRect,
    ) -> SarResult<Array2<Self>> {
        source.fetch_complex(subswath, band, rect)
    }
}

impl MergeSample for SarReal {
    fn is_degenerate(&self, criteria: &DegenerateCriteria) -> bool {
        *self as f64 == criteria.no_data_value
    }

    fn fetch(
        source: &dyn TileSource,
        subswath: &SubSwathGeometry,
        band: BandIdentity,
        rect: TileRect,
    ) -> SarResult<Array2<Self>> {
        source.fetch_real(subswath, band, rect)
    }
}

/// Fetched block of a source raster, addressed in sub-swath coordinates
#[derive(Debug, Clone)]
pub struct SourceTile<T> {
    pub rect: TileRect,
    pub data: Array2<T>,
}

impl<T: Copy> SourceTile<T> {
    pub fn new(rect: TileRect, data: Array2<T>) -> SarResult<Self> {
        if data.dim() != (rect.height, rect.width) {
            return Err(SarError::Processing(format!(
                "Source tile {} returned {:?} samples",
                rect,
                data.dim()
            )));
        }
        Ok(Self { rect, data })
    }

    /// Sample at sub-swath coordinates, `None` outside the fetched block
    pub fn get(&self, sx: usize, sy: usize) -> Option<T> {
        if self.rect.contains(sx, sy) {
            Some(self.data[[sy - self.rect.y, sx - self.rect.x]])
        } else {
            None
        }
    }
}

/// Pixel buffer of a target tile
#[derive(Debug, Clone, PartialEq)]
pub enum TileData {
    Complex(SarCInt16Image),
    Real(SarRealImage),
}

impl TileData {
    /// Zero-filled buffer of the sample type a band kind needs
    pub fn zeros(kind: BandKind, height: usize, width: usize) -> Self {
        match kind {
            BandKind::Complex => TileData::Complex(Array2::from_elem((height, width), SarCInt16::default())),
            _ => TileData::Real(Array2::zeros((height, width))),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        match self {
            TileData::Complex(data) => data.dim(),
            TileData::Real(data) => data.dim(),
        }
    }

    /// Copy a tile into this buffer at the tile's position
    fn paste(&mut self, rect: &TileRect, tile: &TileData) -> SarResult<()> {
        let (rows, cols) = (rect.y..rect.y_max(), rect.x..rect.x_max());
        match (self, tile) {
            (TileData::Complex(dst), TileData::Complex(src)) => dst.slice_mut(s![rows, cols]).assign(src),
            (TileData::Real(dst), TileData::Real(src)) => dst.slice_mut(s![rows, cols]).assign(src),
            _ => {
                return Err(SarError::Processing(format!(
                    "Tile {} sample type differs from the band raster",
                    rect
                )))
            }
        }
        Ok(())
    }
}

/// Destination of one band for one target rectangle, owned by the computing worker
#[derive(Debug, Clone)]
pub struct TargetTile {
    pub band: BandIdentity,
    pub rect: TileRect,
    pub data: TileData,
}

impl TargetTile {
    pub fn new(band: BandIdentity, rect: TileRect) -> Self {
        Self {
            band,
            rect,
            data: TileData::zeros(band.kind, rect.height, rect.width),
        }
    }
}

/// Sub-swath choice for one target pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeamChoice {
    pub primary: usize,
    /// Overlapping neighbour used to repair degenerate primary samples
    pub secondary: Option<usize>,
}

/// TOPSAR deburst and merge processor
pub struct TopsarMerge {
    geometry: ProductGeometry,
    bands: BandPlan,
    config: MergeConfig,
}

impl TopsarMerge {
    /// Create a merge processor over frozen product geometry
    pub fn new(geometry: ProductGeometry, bands: BandPlan, config: MergeConfig) -> SarResult<Self> {
        log::info!(
            "🔗 Initializing TOPSAR merge for {} {} sub-swaths",
            geometry.subswaths().len(),
            geometry.mode()
        );

        if !config.edge_intensity_threshold.is_finite() || config.edge_intensity_threshold < 0.0 {
            return Err(SarError::Processing(format!(
                "Invalid edge intensity threshold {}",
                config.edge_intensity_threshold
            )));
        }
        if config.tile_width == 0 || config.tile_height == 0 {
            return Err(SarError::Processing("Tile size must be non-zero".to_string()));
        }

        if config.seam_selection == SeamSelection::NoiseLevel {
            for pol in &bands.polarizations {
                for sw in geometry.subswaths() {
                    if sw.noise.get(pol).map_or(true, |v| v.is_empty()) {
                        return Err(SarError::Metadata(format!(
                            "Noise-level seam selection needs {} noise vectors for {}",
                            pol, sw.name
                        )));
                    }
                }
            }
        }

        let target = geometry.target_extent();
        log::info!(
            "📐 Target raster {} x {} (lines x samples), line interval {:.6} s",
            target.height,
            target.width,
            target.line_time_interval_seconds()
        );

        Ok(Self { geometry, bands, config })
    }

    pub fn geometry(&self) -> &ProductGeometry {
        &self.geometry
    }

    pub fn bands(&self) -> &BandPlan {
        &self.bands
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Tie-point grid of the merged product at the configured density
    pub fn geolocation_grid(&self) -> SarResult<GeolocationGrid> {
        synthesize_geolocation_grid(
            &self.geometry,
            self.config.tie_point_grid_width,
            self.config.tie_point_grid_height,
        )
    }

    /// Contiguous range `first..=last` of sub-swaths whose range coverage holds the
    /// tile's leftmost and rightmost samples
    pub fn candidate_subswaths(&self, rect: &TileRect) -> SarResult<(usize, usize)> {
        let target = self.geometry.target_extent();
        let left = target.slant_range_time(rect.x);
        let right = target.slant_range_time(rect.x_max().saturating_sub(1));
        let subswaths = self.geometry.subswaths();

        let first = subswaths.iter().position(|sw| sw.covers_slant_range(left));
        let last = subswaths.iter().rposition(|sw| sw.covers_slant_range(right));
        match (first, last) {
            (Some(first), Some(last)) if first <= last => Ok((first, last)),
            _ => Err(SarError::geometry(format!(
                "tile {} spans slant range times [{:.9e}, {:.9e}] s outside sub-swath coverage",
                rect, left, right
            ))),
        }
    }

    /// Primary and optional secondary sub-swath of a target pixel among the candidates
    /// `first..=last`, `None` where no candidate covers the pixel
    pub fn select_subswaths(
        &self,
        tx: usize,
        ty: usize,
        first: usize,
        last: usize,
        polarization: Polarization,
    ) -> SarResult<Option<SeamChoice>> {
        let target = self.geometry.target_extent();
        let slant_range_time = target.slant_range_time(tx);
        let line_time = target.line_time(ty);

        let mut covering = (first..=last).filter(|&i| {
            let sw = self.geometry.subswath(i);
            sw.covers_time(line_time) && sw.covers_slant_range(slant_range_time)
        });
        let s0 = match covering.next() {
            Some(i) => i,
            None => return Ok(None),
        };
        let s1 = match covering.next() {
            Some(i) => i,
            None => return Ok(Some(SeamChoice { primary: s0, secondary: None })),
        };

        let later_first = match self.config.seam_selection {
            SeamSelection::Midpoint => {
                let middle = 0.5
                    * (self.geometry.subswath(s0).slant_range_time_to_last_pixel
                        + self.geometry.subswath(s1).slant_range_time_to_first_pixel);
                slant_range_time >= middle
            }
            SeamSelection::NoiseLevel => {
                let noise0 = subswath_noise(target, tx, line_time, self.geometry.subswath(s0), polarization)?;
                let noise1 = subswath_noise(target, tx, line_time, self.geometry.subswath(s1), polarization)?;
                noise0 > noise1
            }
        };

        Ok(Some(if later_first {
            SeamChoice { primary: s1, secondary: Some(s0) }
        } else {
            SeamChoice { primary: s0, secondary: Some(s1) }
        }))
    }

    /// Fill one target tile.
    ///
    /// The tile buffer is only replaced when the whole tile succeeds; on error it
    /// keeps its previous contents.
    pub fn compute_output_tile(&self, source: &dyn TileSource, tile: &mut TargetTile) -> SarResult<()> {
        if !self.bands.contains(&tile.band) {
            return Err(SarError::Processing(format!("Band {} is not produced by this merge", tile.band)));
        }
        if tile.data.dim() != (tile.rect.height, tile.rect.width) {
            return Err(SarError::Processing(format!(
                "Tile buffer {:?} does not match rectangle {}",
                tile.data.dim(),
                tile.rect
            )));
        }
        if tile.rect.is_empty() {
            return Ok(());
        }
        let target = self.geometry.target_extent();
        if tile.rect.x_max() > target.width || tile.rect.y_max() > target.height {
            return Err(SarError::geometry(format!(
                "tile {} exceeds target raster {} x {}",
                tile.rect, target.width, target.height
            )));
        }

        let mut scratch = tile.data.clone();
        match (&mut scratch, tile.band.kind) {
            (TileData::Complex(data), BandKind::Complex) => self.merge_into(source, tile.band, tile.rect, data)?,
            (TileData::Real(data), kind) if kind.is_calibrated() => {
                self.merge_into(source, tile.band, tile.rect, data)?
            }
            _ => {
                return Err(SarError::Processing(format!(
                    "Tile buffer sample type does not match band {}",
                    tile.band
                )))
            }
        }
        tile.data = scratch;
        Ok(())
    }

    /// Fill every target band for one rectangle
    pub fn compute_tile_stack(&self, source: &dyn TileSource, rect: TileRect) -> SarResult<Vec<TargetTile>> {
        self.bands
            .target_bands()
            .into_iter()
            .map(|band| {
                let mut tile = TargetTile::new(band, rect);
                self.compute_output_tile(source, &mut tile)?;
                Ok(tile)
            })
            .collect()
    }

    /// Tiles of the preferred size covering the target raster, row-major
    pub fn tile_layout(&self) -> Vec<TileRect> {
        let target = self.geometry.target_extent();
        let (tw, th) = (self.config.tile_width, self.config.tile_height);
        (0..target.height)
            .step_by(th)
            .flat_map(|y| {
                (0..target.width)
                    .step_by(tw)
                    .map(move |x| TileRect::new(x, y, tw.min(target.width - x), th.min(target.height - y)))
            })
            .collect()
    }

    /// Merge a whole band by computing and assembling every tile of the layout
    pub fn merge_band(&self, source: &dyn TileSource, band: BandIdentity) -> SarResult<TileData> {
        let target = self.geometry.target_extent();
        let layout = self.tile_layout();
        log::info!("🎯 Merging band {} in {} tiles", band, layout.len());

        let compute = |rect: TileRect| -> SarResult<TargetTile> {
            let mut tile = TargetTile::new(band, rect);
            self.compute_output_tile(source, &mut tile)?;
            Ok(tile)
        };

        let tiles: Vec<TargetTile> = if self.config.parallel {
            Self::run_parallel(layout, compute)?
        } else {
            layout.into_iter().map(compute).collect::<SarResult<_>>()?
        };

        let mut raster = TileData::zeros(band.kind, target.height, target.width);
        for tile in &tiles {
            raster.paste(&tile.rect, &tile.data)?;
        }

        log::info!("✅ Band {} merged ({} x {})", band, target.height, target.width);
        Ok(raster)
    }

    /// Merge every target band
    pub fn merge_product(&self, source: &dyn TileSource) -> SarResult<Vec<(BandIdentity, TileData)>> {
        self.bands
            .target_bands()
            .into_iter()
            .map(|band| Ok((band, self.merge_band(source, band)?)))
            .collect()
    }

    #[cfg(feature = "parallel")]
    fn run_parallel<F>(layout: Vec<TileRect>, compute: F) -> SarResult<Vec<TargetTile>>
    where
        F: Fn(TileRect) -> SarResult<TargetTile> + Sync + Send,
    {
        use rayon::prelude::*;
        layout.into_par_iter().map(compute).collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn run_parallel<F>(layout: Vec<TileRect>, compute: F) -> SarResult<Vec<TargetTile>>
    where
        F: Fn(TileRect) -> SarResult<TargetTile> + Sync + Send,
    {
        layout.into_iter().map(compute).collect()
    }

    fn merge_into<T: MergeSample>(
        &self,
        source: &dyn TileSource,
        band: BandIdentity,
        rect: TileRect,
        out: &mut Array2<T>,
    ) -> SarResult<()> {
        let target = self.geometry.target_extent();
        let (first, last) = self.candidate_subswaths(&rect)?;

        let tiles = (first..=last)
            .map(|i| {
                let sw = self.geometry.subswath(i);
                let src_rect = source_rectangle(target, &rect, sw);
                SourceTile::new(src_rect, T::fetch(source, sw, band, src_rect)?)
            })
            .collect::<SarResult<Vec<_>>>()?;

        if first == last {
            log::debug!("Tile {} inside {}", rect, self.geometry.subswath(first).name);
            self.fill_single_subswath(rect, first, &tiles[0], out);
            return Ok(());
        }

        log::debug!(
            "Tile {} spans {}..{}",
            rect,
            self.geometry.subswath(first).name,
            self.geometry.subswath(last).name
        );
        let criteria = DegenerateCriteria {
            intensity_threshold: self.config.edge_intensity_threshold,
            no_data_value: source.no_data_value(self.geometry.subswath(first), band),
        };
        let unrepaired = self.fill_overlap(rect, first, last, &tiles, band.polarization, &criteria, out)?;
        if unrepaired > 0 {
            log::warn!(
                "⚠️  {} seam sample(s) of {} in tile {} had no valid neighbour",
                unrepaired,
                band,
                rect
            );
        }
        Ok(())
    }

    /// Row-wise copy for a tile covered by one sub-swath
    fn fill_single_subswath<T: MergeSample>(
        &self,
        rect: TileRect,
        k: usize,
        tile: &SourceTile<T>,
        out: &mut Array2<T>,
    ) {
        let target = self.geometry.target_extent();
        let sw = self.geometry.subswath(k);

        let first_y = (rect.y as i64).max(compute_y_min(target, sw));
        let last_y = (rect.y_max() as i64).min(compute_y_max(target, sw) + 1);
        if first_y >= last_y {
            return;
        }

        let sx0 = ((target.slant_range_time(rect.x) - sw.slant_range_time_to_first_pixel)
            / target.delta_slant_range_time)
            .round() as i64;
        let src_lo = sx0.max(tile.rect.x as i64);
        let src_hi = (sx0 + rect.width as i64).min(tile.rect.x_max() as i64);
        if src_lo >= src_hi {
            return;
        }
        let len = (src_hi - src_lo) as usize;
        let dst_col = (src_lo - sx0) as usize;
        let src_col = src_lo as usize - tile.rect.x;

        for y in first_y as usize..last_y as usize {
            let sy = match locate_target_line(target, y, sw) {
                Some(resolution) => resolution.source_line(),
                None => continue,
            };
            if sy < tile.rect.y || sy >= tile.rect.y_max() {
                continue;
            }
            out.slice_mut(s![y - rect.y, dst_col..dst_col + len])
                .assign(&tile.data.slice(s![sy - tile.rect.y, src_col..src_col + len]));
        }
    }

    /// Source sample of sub-swath `k` for a target pixel. `None` when the line hits
    /// no burst, `Some(None)` when the sample lies outside the fetched block.
    fn sample_at<T: MergeSample>(
        &self,
        tx: usize,
        ty: usize,
        k: usize,
        first: usize,
        tiles: &[SourceTile<T>],
    ) -> Option<Option<T>> {
        let target = self.geometry.target_extent();
        let sw = self.geometry.subswath(k);
        let resolution = locate_target_line(target, ty, sw)?;
        let sx = sample_index_in_source(target, tx, sw);
        Some(tiles[k - first].get(sx, resolution.source_line()))
    }

    /// Per-pixel merge across overlapping sub-swaths; returns the number of
    /// degenerate samples that could not be repaired from the neighbour
    #[allow(clippy::too_many_arguments)]
    fn fill_overlap<T: MergeSample>(
        &self,
        rect: TileRect,
        first: usize,
        last: usize,
        tiles: &[SourceTile<T>],
        polarization: Polarization,
        criteria: &DegenerateCriteria,
        out: &mut Array2<T>,
    ) -> SarResult<usize> {
        let mut unrepaired = 0;

        for ty in rect.y..rect.y_max() {
            for tx in rect.x..rect.x_max() {
                let choice = match self.select_subswaths(tx, ty, first, last, polarization)? {
                    Some(choice) => choice,
                    None => continue,
                };
                let primary = match self.sample_at(tx, ty, choice.primary, first, tiles) {
                    Some(sample) => sample,
                    None => continue,
                };

                let mut value = primary.unwrap_or_default();
                let degenerate = primary.map_or(true, |v| v.is_degenerate(criteria));
                if degenerate {
                    if let Some(secondary) = choice.secondary {
                        match self.sample_at(tx, ty, secondary, first, tiles).flatten() {
                            Some(v) if !v.is_degenerate(criteria) => value = v,
                            _ => unrepaired += 1,
                        }
                    }
                }
                out[[ty - rect.y, tx - rect.x]] = value;
            }
        }

        Ok(unrepaired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria() -> DegenerateCriteria {
        DegenerateCriteria {
            intensity_threshold: DEFAULT_EDGE_INTENSITY_THRESHOLD,
            no_data_value: 0.0,
        }
    }

    #[test]
    fn test_complex_degenerate_threshold() {
        let c = criteria();
        assert!(SarCInt16::new(0, 0).is_degenerate(&c));
        assert!(SarCInt16::new(10, 13).is_degenerate(&c)); // 269
        assert!(SarCInt16::new(10, 14).is_degenerate(&c)); // 296
        assert!(!SarCInt16::new(10, 17).is_degenerate(&c)); // 389
        assert!(!SarCInt16::new(-20, 0).is_degenerate(&c));
    }

    #[test]
    fn test_real_degenerate_is_exact_no_data() {
        let c = DegenerateCriteria { no_data_value: -9999.0, ..criteria() };
        assert!((-9999.0f32).is_degenerate(&c));
        assert!(!(0.0f32).is_degenerate(&c));
        assert!(!(1.0e-6f32).is_degenerate(&criteria()));
    }

    #[test]
    fn test_source_tile_addressing() {
        let data = Array2::from_shape_fn((2, 3), |(r, c)| (r * 10 + c) as f32);
        let tile = SourceTile::new(TileRect::new(5, 7, 3, 2), data).unwrap();
        assert_eq!(tile.get(6, 8), Some(11.0));
        assert_eq!(tile.get(4, 7), None);
        assert_eq!(tile.get(5, 9), None);
        assert!(SourceTile::new(TileRect::new(0, 0, 2, 2), Array2::<f32>::zeros((3, 2))).is_err());
    }

    #[test]
    fn test_default_config() {
        let config = MergeConfig::default();
        assert_eq!(config.edge_intensity_threshold, 300.0);
        assert_eq!((config.tie_point_grid_width, config.tie_point_grid_height), (20, 5));
        assert_eq!((config.tile_width, config.tile_height), (500, 50));
        assert_eq!(config.seam_selection, SeamSelection::Midpoint);
    }

    #[test]
    fn test_tile_data_zeros_by_kind() {
        assert!(matches!(TileData::zeros(BandKind::Complex, 2, 3), TileData::Complex(_)));
        assert_eq!(TileData::zeros(BandKind::Gamma0, 2, 3).dim(), (2, 3));
    }
}
