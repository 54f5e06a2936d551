use crate::core::bands::SourceBandSet;
use crate::core::geometry::{NoiseTable, ProductDescriptor, ProductGeometry};
use crate::io::annotation::AnnotationParser;
use crate::io::noise::NoiseParser;
use crate::types::{AcquisitionMode, BandIdentity, Polarization, SarError, SarResult};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use zip::ZipArchive;

/// Sub-swath number (1-based) and polarization of an annotation file
pub type SwathKey = (usize, Polarization);

/// Product-level view of a Sentinel-1 SLC SAFE archive
#[derive(Debug, Clone)]
pub struct SafeProduct {
    pub descriptor: ProductDescriptor,
    pub mode: AcquisitionMode,
    pub polarizations: Vec<Polarization>,
    pub geometry: ProductGeometry,
}

impl SafeProduct {
    /// Complex source bands present in the archive
    pub fn band_set(&self) -> SourceBandSet {
        let mut set = SourceBandSet::new(false, self.polarizations.clone());
        for sw in self.geometry.subswaths() {
            for pol in &self.polarizations {
                set.insert(sw.index, BandIdentity::complex(*pol));
            }
        }
        set
    }
}

/// Reader for the annotation side of a zipped Sentinel-1 SLC product
pub struct SafeArchive {
    zip_path: PathBuf,
    archive: Option<ZipArchive<File>>,
}

impl SafeArchive {
    /// Create a new reader for a zipped SAFE product
    pub fn new<P: AsRef<Path>>(zip_path: P) -> SarResult<Self> {
        let zip_path = zip_path.as_ref().to_path_buf();

        if !zip_path.exists() {
            return Err(SarError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", zip_path.display()),
            )));
        }

        Ok(Self { zip_path, archive: None })
    }

    /// Open the ZIP archive
    fn open_archive(&mut self) -> SarResult<&mut ZipArchive<File>> {
        if self.archive.is_none() {
            let file = File::open(&self.zip_path)?;
            let archive = ZipArchive::new(file)
                .map_err(|e| SarError::InvalidFormat(format!("Failed to open ZIP: {}", e)))?;
            self.archive = Some(archive);
        }
        self.archive
            .as_mut()
            .ok_or_else(|| SarError::Processing("ZIP archive not open".to_string()))
    }

    /// List all files in the archive
    pub fn list_files(&mut self) -> SarResult<Vec<String>> {
        let archive = self.open_archive()?;
        let mut files = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let file = archive
                .by_index(i)
                .map_err(|e| SarError::InvalidFormat(format!("Failed to access file {}: {}", i, e)))?;
            files.push(file.name().to_string());
        }

        Ok(files)
    }

    /// Read one archive member as UTF-8 text
    pub fn read_file(&mut self, name: &str) -> SarResult<String> {
        let archive = self.open_archive()?;
        let mut file = archive
            .by_name(name)
            .map_err(|e| SarError::InvalidFormat(format!("Failed to read {}: {}", name, e)))?;
        let mut content = String::new();
        file.read_to_string(&mut content)?;
        Ok(content)
    }

    fn match_files(&mut self, pattern: &str) -> SarResult<BTreeMap<SwathKey, String>> {
        let re = Regex::new(pattern).map_err(|e| SarError::Processing(format!("Invalid file pattern: {}", e)))?;
        let mut found = BTreeMap::new();

        for file in self.list_files()? {
            let caps = match re.captures(&file) {
                Some(caps) => caps,
                None => continue,
            };
            let swath: usize = caps[2]
                .parse()
                .map_err(|_| SarError::InvalidFormat(format!("Bad swath number in {}", file)))?;
            let pol: Polarization = caps[3].parse()?;
            found.insert((swath, pol), file);
        }

        Ok(found)
    }

    /// Sub-swath annotation files keyed by swath number and polarization
    pub fn find_annotation_files(&mut self) -> SarResult<BTreeMap<SwathKey, String>> {
        let found =
            self.match_files(r"(?i)annotation/s1[abcd]-(iw|ew)(\d)-slc-(vv|vh|hv|hh)-[^/]*\.xml$")?;
        if found.is_empty() {
            return Err(SarError::InvalidFormat("No annotation files found".to_string()));
        }
        Ok(found)
    }

    /// Noise annotation files keyed by swath number and polarization
    pub fn find_noise_files(&mut self) -> SarResult<BTreeMap<SwathKey, String>> {
        self.match_files(r"(?i)annotation/calibration/noise-s1[abcd]-(iw|ew)(\d)-slc-(vv|vh|hv|hh)-[^/]*\.xml$")
    }

    /// Validate the product and build its merge geometry.
    ///
    /// Geometry comes from the first selected polarization; noise vectors of every
    /// selected polarization are attached when the archive carries them. An empty
    /// `requested` list selects every polarization in the archive.
    pub fn read_product(&mut self, requested: &[Polarization]) -> SarResult<SafeProduct> {
        let annotations = self.find_annotation_files()?;
        let noise_files = self.find_noise_files()?;

        let available: BTreeSet<Polarization> = annotations.keys().map(|(_, p)| *p).collect();
        let polarizations: Vec<Polarization> = if requested.is_empty() {
            available.iter().copied().collect()
        } else {
            requested.to_vec()
        };
        for pol in &polarizations {
            if !available.contains(pol) {
                return Err(SarError::MissingBand {
                    band: format!("{} polarization", pol),
                    subswath: self.zip_path.display().to_string(),
                });
            }
        }
        let reference_pol = polarizations
            .first()
            .copied()
            .ok_or_else(|| SarError::Metadata("No polarization selected".to_string()))?;

        let swath_numbers: BTreeSet<usize> = annotations.keys().map(|(n, _)| *n).collect();
        let mut descriptor: Option<ProductDescriptor> = None;
        let mut mode = AcquisitionMode::IW;
        let mut subswaths = Vec::with_capacity(swath_numbers.len());

        for (index, number) in swath_numbers.iter().enumerate() {
            let name = annotations.get(&(*number, reference_pol)).ok_or_else(|| SarError::MissingBand {
                band: format!("{} annotation", reference_pol),
                subswath: format!("swath {}", number),
            })?;
            let root = AnnotationParser::parse_annotation(&self.read_file(name)?)?;

            if descriptor.is_none() {
                let d = AnnotationParser::product_descriptor(&root);
                mode = d.validate()?;
                descriptor = Some(d);
            }

            let mut noise = NoiseTable::new();
            for pol in &polarizations {
                if let Some(noise_name) = noise_files.get(&(*number, *pol)) {
                    let vectors = NoiseParser::read_noise_vectors(&self.read_file(noise_name)?)?;
                    noise.insert(*pol, vectors);
                }
            }

            subswaths.push(AnnotationParser::subswath_geometry(&root, index)?.with_noise(noise));
        }

        let descriptor =
            descriptor.ok_or_else(|| SarError::Metadata("Archive holds no sub-swath annotation".to_string()))?;
        log::info!(
            "📦 {} {} {} product with {} sub-swath(s), polarizations {:?}",
            descriptor.mission,
            descriptor.product_type,
            mode,
            subswaths.len(),
            polarizations
        );

        let geometry = ProductGeometry::new(mode, subswaths)?;
        Ok(SafeProduct {
            descriptor,
            mode,
            polarizations,
            geometry,
        })
    }
}
