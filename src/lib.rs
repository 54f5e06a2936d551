//! sardine-topsar: TOPSAR deburst and sub-swath merge for Sentinel-1 SLC products
//!
//! Turns the overlapping, burst-structured sub-swaths of an IW or EW SLC product
//! into one continuously sampled raster with a consistent geolocation grid.
//!
//! The engine in [`core`] works on frozen per-sub-swath geometry tables and pulls
//! source pixels through a [`core::TileSource`]; [`io`] builds those tables from
//! Sentinel-1 annotation files and provides in-memory, cached and GDAL-backed
//! tile sources.

pub mod types;
pub mod core;
pub mod io;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    AcquisitionMode, BandIdentity, BandKind, Polarization, SarCInt16, SarCInt16Image, SarError, SarReal,
    SarRealImage, SarResult, TileRect,
};

pub use crate::core::{
    synthesize_geolocation_grid, BandPlan, GeolocationGrid, MergeConfig, ProductGeometry, SeamSelection,
    SourceBandSet, SubSwathGeometry, TargetGeometry, TargetTile, TileData, TileSource, TopsarMerge,
};

pub use io::{AnnotationParser, CachedTileSource, MemoryTileSource, SafeArchive};
