//! Product I/O boundary: annotation parsing, archive access, band naming and tile sources

pub mod annotation;
pub mod noise;
pub mod safe;
pub mod band_names;
pub mod memory;
pub mod cache;
#[cfg(feature = "gdal")]
pub mod gdal_source;

pub use annotation::AnnotationParser;
pub use noise::NoiseParser;
pub use safe::{SafeArchive, SafeProduct};
pub use memory::MemoryTileSource;
pub use cache::CachedTileSource;
#[cfg(feature = "gdal")]
pub use gdal_source::{GdalTileSource, RasterRef};
