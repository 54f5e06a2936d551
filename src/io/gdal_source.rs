use crate::core::geometry::SubSwathGeometry;
use crate::core::merge::TileSource;
use crate::io::band_names::source_band_names;
use crate::types::{
    AcquisitionMode, BandIdentity, SarCInt16, SarCInt16Image, SarError, SarRealImage, SarResult, TileRect,
};
use gdal::raster::GdalType;
use gdal::Dataset;
use ndarray::{Array2, Zip};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One raster band of a GDAL-readable file
#[derive(Debug, Clone)]
pub struct RasterRef {
    pub path: PathBuf,
    /// 1-based GDAL band index
    pub band: isize,
}

impl RasterRef {
    pub fn new<P: AsRef<Path>>(path: P, band: isize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            band,
        }
    }

    fn read_block<T: GdalType + Copy>(&self, rect: TileRect) -> SarResult<Array2<T>> {
        let dataset = Dataset::open(&self.path)?;
        let rasterband = dataset.rasterband(self.band)?;
        let window = (rect.x as isize, rect.y as isize);
        let size = (rect.width, rect.height);
        let buffer = rasterband.read_as::<T>(window, size, size, None)?;
        Array2::from_shape_vec((rect.height, rect.width), buffer.data).map_err(|e| {
            SarError::InvalidFormat(format!("Block {} of {}: {}", rect, self.path.display(), e))
        })
    }

    fn no_data_value(&self) -> Option<f64> {
        let dataset = Dataset::open(&self.path).ok()?;
        let rasterband = dataset.rasterband(self.band).ok()?;
        rasterband.no_data_value()
    }
}

#[derive(Debug, Clone)]
enum GdalRaster {
    /// In-phase and quadrature rasters
    Complex { i: RasterRef, q: RasterRef },
    Real(RasterRef),
}

/// Tile source reading sub-swath bands from disk through GDAL.
///
/// Datasets are opened per fetch, so the source holds no GDAL handles and can be
/// shared between worker threads.
#[derive(Debug, Clone, Default)]
pub struct GdalTileSource {
    rasters: HashMap<(usize, BandIdentity), GdalRaster>,
}

impl GdalTileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_complex(&mut self, subswath: usize, band: BandIdentity, i: RasterRef, q: RasterRef) {
        self.rasters.insert((subswath, band), GdalRaster::Complex { i, q });
    }

    pub fn insert_real(&mut self, subswath: usize, band: BandIdentity, raster: RasterRef) {
        self.rasters.insert((subswath, band), GdalRaster::Real(raster));
    }

    /// Register split-product band files (`<band name>.img`, one band each) found in
    /// `dir` for every sub-swath of `mode` and every given band
    pub fn from_band_files<P: AsRef<Path>>(dir: P, mode: AcquisitionMode, bands: &[BandIdentity]) -> SarResult<Self> {
        let count = mode.subswath_count().ok_or_else(|| {
            SarError::UnsupportedAcquisitionGeometry(format!("{} is not a TOPSAR acquisition mode", mode))
        })?;
        let mut source = Self::new();

        for index in 0..count {
            let swath = mode.subswath_name(index);
            for band in bands {
                let paths = source_band_names(band, &swath)
                    .into_iter()
                    .map(|name| {
                        let path = dir.as_ref().join(format!("{}.img", name));
                        if path.exists() {
                            Ok(path)
                        } else {
                            Err(SarError::MissingBand {
                                band: name,
                                subswath: swath.clone(),
                            })
                        }
                    })
                    .collect::<SarResult<Vec<PathBuf>>>()?;

                match paths.as_slice() {
                    [i, q] => source.insert_complex(index, *band, RasterRef::new(i, 1), RasterRef::new(q, 1)),
                    [path] => source.insert_real(index, *band, RasterRef::new(path, 1)),
                    _ => {
                        return Err(SarError::Processing(format!(
                            "Unexpected storage layout for band {}",
                            band
                        )))
                    }
                }
            }
        }

        log::info!("🗂️  Registered {} band rasters from {}", source.rasters.len(), dir.as_ref().display());
        Ok(source)
    }

    fn raster(&self, subswath: &SubSwathGeometry, band: BandIdentity) -> SarResult<&GdalRaster> {
        self.rasters
            .get(&(subswath.index, band))
            .ok_or_else(|| SarError::MissingBand {
                band: band.to_string(),
                subswath: subswath.name.clone(),
            })
    }
}

impl TileSource for GdalTileSource {
    fn fetch_complex(&self, subswath: &SubSwathGeometry, band: BandIdentity, rect: TileRect) -> SarResult<SarCInt16Image> {
        match self.raster(subswath, band)? {
            GdalRaster::Complex { i, q } => {
                let re = i.read_block::<i16>(rect)?;
                let im = q.read_block::<i16>(rect)?;
                Ok(Zip::from(&re).and(&im).map_collect(|&re, &im| SarCInt16::new(re, im)))
            }
            GdalRaster::Real(_) => Err(SarError::InvalidFormat(format!(
                "Band {} of {} is not complex",
                band, subswath.name
            ))),
        }
    }

    fn fetch_real(&self, subswath: &SubSwathGeometry, band: BandIdentity, rect: TileRect) -> SarResult<SarRealImage> {
        match self.raster(subswath, band)? {
            GdalRaster::Real(raster) => raster.read_block::<f32>(rect),
            GdalRaster::Complex { .. } => Err(SarError::InvalidFormat(format!(
                "Band {} of {} is complex",
                band, subswath.name
            ))),
        }
    }

    fn no_data_value(&self, subswath: &SubSwathGeometry, band: BandIdentity) -> f64 {
        match self.raster(subswath, band) {
            Ok(GdalRaster::Real(raster)) => raster.no_data_value().unwrap_or(0.0),
            _ => 0.0,
        }
    }
}
