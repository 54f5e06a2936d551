use crate::core::geometry::SubSwathGeometry;
use crate::core::merge::TileSource;
use crate::types::{BandIdentity, SarCInt16Image, SarError, SarRealImage, SarResult, TileRect};
use ndarray::{s, Array2};
use std::collections::HashMap;

/// Whole sub-swath raster held in memory
#[derive(Debug, Clone)]
pub enum Raster {
    Complex(SarCInt16Image),
    Real(SarRealImage),
}

/// Tile source over rasters already loaded into memory, keyed by sub-swath index and band
#[derive(Debug, Clone, Default)]
pub struct MemoryTileSource {
    rasters: HashMap<(usize, BandIdentity), Raster>,
    no_data: HashMap<(usize, BandIdentity), f64>,
}

/// Copy `rect` out of a raster; samples outside the raster stay at the default value
fn extract<T: Copy + Default>(raster: &Array2<T>, rect: TileRect) -> Array2<T> {
    let mut block = Array2::from_elem((rect.height, rect.width), T::default());
    let (rows, cols) = raster.dim();
    if let Some(inside) = rect.intersection(&TileRect::new(0, 0, cols, rows)) {
        let (dy, dx) = (inside.y - rect.y, inside.x - rect.x);
        block
            .slice_mut(s![dy..dy + inside.height, dx..dx + inside.width])
            .assign(&raster.slice(s![inside.y..inside.y_max(), inside.x..inside.x_max()]));
    }
    block
}

impl MemoryTileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_complex(&mut self, subswath: usize, band: BandIdentity, raster: SarCInt16Image) {
        self.rasters.insert((subswath, band), Raster::Complex(raster));
    }

    pub fn insert_real(&mut self, subswath: usize, band: BandIdentity, raster: SarRealImage) {
        self.rasters.insert((subswath, band), Raster::Real(raster));
    }

    /// Declare the no-data value of a calibrated band
    pub fn set_no_data_value(&mut self, subswath: usize, band: BandIdentity, value: f64) {
        self.no_data.insert((subswath, band), value);
    }

    fn raster(&self, subswath: &SubSwathGeometry, band: BandIdentity) -> SarResult<&Raster> {
        self.rasters
            .get(&(subswath.index, band))
            .ok_or_else(|| SarError::MissingBand {
                band: band.to_string(),
                subswath: subswath.name.clone(),
            })
    }
}

impl TileSource for MemoryTileSource {
    fn fetch_complex(&self, subswath: &SubSwathGeometry, band: BandIdentity, rect: TileRect) -> SarResult<SarCInt16Image> {
        match self.raster(subswath, band)? {
            Raster::Complex(data) => Ok(extract(data, rect)),
            Raster::Real(_) => Err(SarError::InvalidFormat(format!(
                "Band {} of {} holds real samples",
                band, subswath.name
            ))),
        }
    }

    fn fetch_real(&self, subswath: &SubSwathGeometry, band: BandIdentity, rect: TileRect) -> SarResult<SarRealImage> {
        match self.raster(subswath, band)? {
            Raster::Real(data) => Ok(extract(data, rect)),
            Raster::Complex(_) => Err(SarError::InvalidFormat(format!(
                "Band {} of {} holds complex samples",
                band, subswath.name
            ))),
        }
    }

    fn no_data_value(&self, subswath: &SubSwathGeometry, band: BandIdentity) -> f64 {
        self.no_data.get(&(subswath.index, band)).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_pads_outside_raster() {
        let raster = Array2::from_shape_fn((3, 4), |(r, c)| (r * 4 + c) as f32 + 1.0);
        let block = extract(&raster, TileRect::new(2, 1, 3, 3));
        assert_eq!(block.dim(), (3, 3));
        assert_eq!(block[[0, 0]], 7.0);
        assert_eq!(block[[1, 1]], 12.0);
        assert_eq!(block[[0, 2]], 0.0);
        assert_eq!(block[[2, 0]], 0.0);
    }
}
