use crate::core::{BandPlan, MergeConfig, SourceBandSet, TileData, TopsarMerge};
use crate::io::{MemoryTileSource, SafeArchive, SafeProduct};
use crate::types::{BandIdentity, BandKind, Polarization, SarCInt16, SarError};
use ndarray::{Array2, Zip};
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyTopsarProduct>()?;
    Ok(())
}

fn runtime_error(e: SarError) -> PyErr {
    PyRuntimeError::new_err(format!("{}", e))
}

fn parse_polarization(value: &str) -> PyResult<Polarization> {
    value
        .parse::<Polarization>()
        .map_err(|e| PyValueError::new_err(format!("{}", e)))
}

fn parse_calibrated_kind(value: &str) -> PyResult<BandKind> {
    match value {
        "Sigma0" | "sigma0" => Ok(BandKind::Sigma0),
        "Beta0" | "beta0" => Ok(BandKind::Beta0),
        "Gamma0" | "gamma0" => Ok(BandKind::Gamma0),
        "DN" | "dn" => Ok(BandKind::Dn),
        _ => Err(PyValueError::new_err(format!("Invalid calibration band kind: {}", value))),
    }
}

/// Python wrapper around a SAFE product's merge geometry
#[pyclass(name = "TopsarProduct")]
struct PyTopsarProduct {
    product: SafeProduct,
}

impl PyTopsarProduct {
    fn merge(&self, source: &MemoryTileSource, calibrated: bool, band: BandIdentity) -> Result<TileData, SarError> {
        let geometry = self.product.geometry.clone();
        let mut bands = SourceBandSet::new(calibrated, self.product.polarizations.clone());
        for sw in geometry.subswaths() {
            bands.insert(sw.index, band);
        }
        let plan = BandPlan::resolve(&geometry, &bands, &[band.polarization])?;
        let merge = TopsarMerge::new(geometry, plan, MergeConfig::default())?;
        merge.merge_band(source, band)
    }

    fn check_raster_count(&self, count: usize) -> PyResult<()> {
        let expected = self.product.geometry.subswaths().len();
        if count != expected {
            return Err(PyValueError::new_err(format!(
                "Expected one raster per sub-swath ({}), got {}",
                expected, count
            )));
        }
        Ok(())
    }
}

#[pymethods]
impl PyTopsarProduct {
    #[new]
    #[pyo3(signature = (zip_path, polarizations=None))]
    fn new(zip_path: String, polarizations: Option<Vec<String>>) -> PyResult<Self> {
        let requested = polarizations
            .unwrap_or_default()
            .iter()
            .map(|p| parse_polarization(p))
            .collect::<PyResult<Vec<_>>>()?;
        let mut archive = SafeArchive::new(&zip_path).map_err(runtime_error)?;
        let product = archive.read_product(&requested).map_err(runtime_error)?;
        Ok(Self { product })
    }

    fn polarizations(&self) -> Vec<String> {
        self.product.polarizations.iter().map(|p| p.to_string()).collect()
    }

    fn subswath_names(&self) -> Vec<String> {
        self.product.geometry.subswaths().iter().map(|s| s.name.clone()).collect()
    }

    /// Size and timing of the merged raster
    fn target_extent<'py>(&self, py: Python<'py>) -> PyResult<&'py PyDict> {
        let target = self.product.geometry.target_extent();
        let dict = PyDict::new(py);
        dict.set_item("width", target.width)?;
        dict.set_item("height", target.height)?;
        dict.set_item("first_line_time", target.start_time().to_rfc3339())?;
        dict.set_item("last_line_time", target.stop_time().to_rfc3339())?;
        dict.set_item("line_time_interval", target.line_time_interval_seconds())?;
        dict.set_item("slant_range_time_to_first_pixel", target.slant_range_time_to_first_pixel)?;
        dict.set_item("delta_slant_range_time", target.delta_slant_range_time)?;
        Ok(dict)
    }

    /// Tie-point grids of the merged raster as numpy arrays
    #[pyo3(signature = (width=20, height=5))]
    fn geolocation_grid<'py>(&self, py: Python<'py>, width: usize, height: usize) -> PyResult<&'py PyDict> {
        let grid = crate::core::synthesize_geolocation_grid(&self.product.geometry, width, height)
            .map_err(runtime_error)?;
        let dict = PyDict::new(py);
        dict.set_item("sub_sampling_x", grid.sub_sampling_x)?;
        dict.set_item("sub_sampling_y", grid.sub_sampling_y)?;
        dict.set_item("latitude", grid.latitude.into_pyarray(py))?;
        dict.set_item("longitude", grid.longitude.into_pyarray(py))?;
        dict.set_item("slant_range_time", grid.slant_range_time_ns.into_pyarray(py))?;
        dict.set_item("incidence_angle", grid.incidence_angle.into_pyarray(py))?;
        Ok(dict)
    }

    /// Merge one calibrated band given one raster per sub-swath
    #[pyo3(signature = (kind, polarization, rasters, no_data=0.0))]
    fn merge_calibrated<'py>(
        &self,
        py: Python<'py>,
        kind: &str,
        polarization: &str,
        rasters: Vec<PyReadonlyArray2<'py, f32>>,
        no_data: f64,
    ) -> PyResult<&'py PyArray2<f32>> {
        self.check_raster_count(rasters.len())?;
        let band = BandIdentity::new(parse_calibrated_kind(kind)?, parse_polarization(polarization)?);

        let mut source = MemoryTileSource::new();
        for (index, raster) in rasters.iter().enumerate() {
            source.insert_real(index, band, raster.as_array().to_owned());
            source.set_no_data_value(index, band, no_data);
        }

        let merged = py.allow_threads(|| self.merge(&source, true, band)).map_err(runtime_error)?;
        match merged {
            TileData::Real(data) => Ok(data.into_pyarray(py)),
            TileData::Complex(_) => Err(PyRuntimeError::new_err("Calibrated merge returned complex data")),
        }
    }

    /// Merge complex SLC data given i and q rasters per sub-swath; returns `(i, q)`
    fn merge_complex<'py>(
        &self,
        py: Python<'py>,
        polarization: &str,
        i_rasters: Vec<PyReadonlyArray2<'py, i16>>,
        q_rasters: Vec<PyReadonlyArray2<'py, i16>>,
    ) -> PyResult<(&'py PyArray2<i16>, &'py PyArray2<i16>)> {
        self.check_raster_count(i_rasters.len())?;
        self.check_raster_count(q_rasters.len())?;
        let band = BandIdentity::complex(parse_polarization(polarization)?);

        let mut source = MemoryTileSource::new();
        for (index, (i, q)) in i_rasters.iter().zip(q_rasters.iter()).enumerate() {
            let (i, q) = (i.as_array(), q.as_array());
            if i.dim() != q.dim() {
                return Err(PyValueError::new_err(format!("i/q shape mismatch for sub-swath {}", index + 1)));
            }
            let data: Array2<SarCInt16> = Zip::from(&i).and(&q).map_collect(|&re, &im| SarCInt16::new(re, im));
            source.insert_complex(index, band, data);
        }

        let merged = py.allow_threads(|| self.merge(&source, false, band)).map_err(runtime_error)?;
        match merged {
            TileData::Complex(data) => {
                let i = data.mapv(|c| c.re).into_pyarray(py);
                let q = data.mapv(|c| c.im).into_pyarray(py);
                Ok((i, q))
            }
            TileData::Real(_) => Err(PyRuntimeError::new_err("Complex merge returned real data")),
        }
    }
}
