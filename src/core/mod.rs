//! TOPSAR deburst and merge engine

pub mod geometry;
pub mod coordinates;
pub mod burst;
pub mod noise;
pub mod tie_point;
pub mod bands;
pub mod merge;

// Re-export main types
pub use geometry::{
    BurstTable, GeoField, GeoLocationGrid, GeoLocationPoint, NoiseTable, NoiseVector, ProductDescriptor,
    ProductGeometry, SubSwathGeometry, SubSwathParams, TargetGeometry,
};
pub use coordinates::{
    bilinear_index, interpolate, sample_index_in_source, subswath_index_for_slant_range, target_sample_index,
    BilinearIndex,
};
pub use burst::{compute_y_max, compute_y_min, locate_burst, locate_target_line, source_rectangle, BurstResolution};
pub use tie_point::{
    synthesize_geolocation_grid, target_metadata, CornerCoordinates, GeoPoint, GeolocationGrid, TargetMetadata,
    TiePointField,
};
pub use bands::{BandPlan, SourceBandSet};
pub use merge::{
    DegenerateCriteria, MergeConfig, MergeSample, SeamSelection, TargetTile, TileData, TileSource, TopsarMerge,
    DEFAULT_EDGE_INTENSITY_THRESHOLD,
};
