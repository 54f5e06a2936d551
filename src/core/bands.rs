use crate::core::geometry::ProductGeometry;
use crate::types::{BandIdentity, BandKind, Polarization, SarError, SarResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::collections::HashSet;

/// Bands present on the source product, as reported by the I/O layer
#[derive(Debug, Clone, Default)]
pub struct SourceBandSet {
    /// Whether the source carries calibrated intensity bands instead of complex pairs
    pub calibrated: bool,
    /// Polarizations present on the product, in product order
    pub polarizations: Vec<Polarization>,
    /// `(sub-swath index, band)` pairs present on the source
    pub available: HashSet<(usize, BandIdentity)>,
}

impl SourceBandSet {
    pub fn new(calibrated: bool, polarizations: Vec<Polarization>) -> Self {
        Self {
            calibrated,
            polarizations,
            available: HashSet::new(),
        }
    }

    pub fn insert(&mut self, subswath: usize, band: BandIdentity) {
        self.available.insert((subswath, band));
    }

    pub fn contains(&self, subswath: usize, band: &BandIdentity) -> bool {
        self.available.contains(&(subswath, *band))
    }

    /// Calibrated kinds present for any sub-swath and polarization
    pub fn calibration_kinds(&self) -> Vec<BandKind> {
        let present: BTreeSet<BandKind> = self.available.iter().map(|(_, b)| b.kind).collect();
        BandKind::CALIBRATED
            .iter()
            .copied()
            .filter(|k| present.contains(k))
            .collect()
    }
}

/// Target bands produced by a merge, checked against the source up front
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandPlan {
    pub calibrated: bool,
    pub polarizations: Vec<Polarization>,
    pub kinds: Vec<BandKind>,
}

impl BandPlan {
    /// Resolve polarizations and band kinds, failing with `MissingBand` when a
    /// selected band is absent from any sub-swath. An empty request selects every
    /// product polarization.
    pub fn resolve(
        geometry: &ProductGeometry,
        source: &SourceBandSet,
        requested: &[Polarization],
    ) -> SarResult<Self> {
        let polarizations: Vec<Polarization> = if requested.is_empty() {
            source.polarizations.clone()
        } else {
            requested.to_vec()
        };
        if polarizations.is_empty() {
            return Err(SarError::Metadata("Product lists no polarizations".to_string()));
        }
        for pol in &polarizations {
            if !source.polarizations.contains(pol) {
                return Err(SarError::MissingBand {
                    band: format!("{} polarization", pol),
                    subswath: geometry.mode().to_string(),
                });
            }
        }

        let kinds = if source.calibrated {
            let kinds = source.calibration_kinds();
            if kinds.is_empty() {
                return Err(SarError::MissingBand {
                    band: "Sigma0, Beta0, Gamma0 or DN".to_string(),
                    subswath: geometry.mode().to_string(),
                });
            }
            kinds
        } else {
            vec![BandKind::Complex]
        };

        let plan = Self {
            calibrated: source.calibrated,
            polarizations,
            kinds,
        };

        for sw in geometry.subswaths() {
            for band in plan.target_bands() {
                if !source.contains(sw.index, &band) {
                    return Err(SarError::MissingBand {
                        band: band.to_string(),
                        subswath: sw.name.clone(),
                    });
                }
            }
        }

        log::info!(
            "📡 Merging {} band(s): {}",
            plan.target_bands().len(),
            plan.target_bands().iter().map(|b| b.to_string()).collect::<Vec<_>>().join(", ")
        );
        Ok(plan)
    }

    /// Target bands, grouped by polarization
    pub fn target_bands(&self) -> Vec<BandIdentity> {
        self.polarizations
            .iter()
            .flat_map(|pol| self.kinds.iter().map(move |kind| BandIdentity::new(*kind, *pol)))
            .collect()
    }

    pub fn contains(&self, band: &BandIdentity) -> bool {
        self.polarizations.contains(&band.polarization) && self.kinds.contains(&band.kind)
    }
}
