//! Storage band names of split Sentinel-1 products (`i_IW1_VV`, `Sigma0_IW2_VH`, ...).
//!
//! The merge engine works on `BandIdentity`; names only exist at this boundary.

use crate::core::bands::SourceBandSet;
use crate::types::{AcquisitionMode, BandIdentity, BandKind, Polarization, SarError, SarResult};
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

fn kind_prefixes(kind: BandKind) -> Vec<&'static str> {
    match kind {
        BandKind::Complex => vec!["i", "q"],
        BandKind::Sigma0 => vec!["Sigma0"],
        BandKind::Beta0 => vec!["Beta0"],
        BandKind::Gamma0 => vec!["Gamma0"],
        BandKind::Dn => vec!["DN"],
    }
}

/// Source band names of a band in one sub-swath; complex bands have an i and a q raster
pub fn source_band_names(band: &BandIdentity, subswath: &str) -> Vec<String> {
    kind_prefixes(band.kind)
        .into_iter()
        .map(|prefix| format!("{}_{}_{}", prefix, subswath, band.polarization))
        .collect()
}

/// Names of the merged target bands
pub fn target_band_names(band: &BandIdentity) -> Vec<String> {
    kind_prefixes(band.kind)
        .into_iter()
        .map(|prefix| format!("{}_{}", prefix, band.polarization))
        .collect()
}

/// Parsed source band name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBandName {
    pub prefix: String,
    /// 0-based sub-swath ordinal
    pub subswath: usize,
    pub polarization: Polarization,
}

fn band_name_regex() -> SarResult<Regex> {
    Regex::new(r"^(i|q|Sigma0|Beta0|Gamma0|DN)_(IW|EW)(\d)_(VV|VH|HV|HH)$")
        .map_err(|e| SarError::Processing(format!("Invalid band name pattern: {}", e)))
}

/// Parse a source band name, `None` for bands that do not follow the convention
pub fn parse_source_band_name(name: &str, mode: AcquisitionMode) -> SarResult<Option<SourceBandName>> {
    let re = band_name_regex()?;
    let caps = match re.captures(name) {
        Some(caps) => caps,
        None => return Ok(None),
    };
    if &caps[2] != mode.to_string().as_str() {
        return Ok(None);
    }
    let number: usize = caps[3]
        .parse()
        .map_err(|_| SarError::InvalidFormat(format!("Bad sub-swath number in band {}", name)))?;
    if number == 0 {
        return Err(SarError::InvalidFormat(format!("Bad sub-swath number in band {}", name)));
    }
    Ok(Some(SourceBandName {
        prefix: caps[1].to_string(),
        subswath: number - 1,
        polarization: caps[4].parse()?,
    }))
}

/// Build the source band set from a product's band names.
///
/// With `calibrated` set, only calibration bands count; otherwise a complex band is
/// present where both its i and q rasters are.
pub fn source_band_set<S: AsRef<str>>(names: &[S], mode: AcquisitionMode, calibrated: bool) -> SarResult<SourceBandSet> {
    let mut parsed = Vec::new();
    for name in names {
        if let Some(band) = parse_source_band_name(name.as_ref(), mode)? {
            parsed.push(band);
        }
    }

    let polarizations: BTreeSet<Polarization> = parsed.iter().map(|b| b.polarization).collect();
    let mut set = SourceBandSet::new(calibrated, polarizations.into_iter().collect());

    if calibrated {
        for band in &parsed {
            let kind = match band.prefix.as_str() {
                "Sigma0" => BandKind::Sigma0,
                "Beta0" => BandKind::Beta0,
                "Gamma0" => BandKind::Gamma0,
                "DN" => BandKind::Dn,
                _ => continue,
            };
            set.insert(band.subswath, BandIdentity::new(kind, band.polarization));
        }
    } else {
        let present: HashSet<(&str, usize, Polarization)> =
            parsed.iter().map(|b| (b.prefix.as_str(), b.subswath, b.polarization)).collect();
        for band in parsed.iter().filter(|b| b.prefix == "i") {
            if present.contains(&("q", band.subswath, band.polarization)) {
                set.insert(band.subswath, BandIdentity::complex(band.polarization));
            }
        }
    }

    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        let band = BandIdentity::complex(Polarization::VH);
        assert_eq!(source_band_names(&band, "IW3"), vec!["i_IW3_VH", "q_IW3_VH"]);
        assert_eq!(target_band_names(&band), vec!["i_VH", "q_VH"]);
        let sigma = BandIdentity::new(BandKind::Sigma0, Polarization::VV);
        assert_eq!(target_band_names(&sigma), vec!["Sigma0_VV"]);
    }

    #[test]
    fn test_complex_band_needs_both_components() {
        let names = ["i_IW1_VV", "q_IW1_VV", "i_IW2_VV", "Intensity_IW1_VV"];
        let set = source_band_set(&names, AcquisitionMode::IW, false).unwrap();
        assert!(set.contains(0, &BandIdentity::complex(Polarization::VV)));
        assert!(!set.contains(1, &BandIdentity::complex(Polarization::VV)));
        assert_eq!(set.polarizations, vec![Polarization::VV]);
    }

    #[test]
    fn test_calibrated_detection() {
        let names = ["Sigma0_EW5_HH", "Beta0_EW5_HH", "Sigma0_IW1_HH"];
        let set = source_band_set(&names, AcquisitionMode::EW, true).unwrap();
        assert!(set.contains(4, &BandIdentity::new(BandKind::Beta0, Polarization::HH)));
        assert!(!set.contains(0, &BandIdentity::new(BandKind::Sigma0, Polarization::HH)));
        assert_eq!(set.calibration_kinds(), vec![BandKind::Sigma0, BandKind::Beta0]);
    }
}
