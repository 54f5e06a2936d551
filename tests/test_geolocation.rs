mod common;

use approx::assert_abs_diff_eq;
use sardine_topsar::core::{
    bilinear_index, subswath_index_for_slant_range, synthesize_geolocation_grid, target_metadata, GeoField,
    TiePointField,
};
use sardine_topsar::SarError;

#[test]
fn test_tie_point_grid_follows_sub_swath_grids() {
    common::init_logging();
    let geometry = common::product_geometry();
    let grid = synthesize_geolocation_grid(&geometry, 20, 5).expect("Failed to synthesize grid");

    assert_eq!((grid.width, grid.height), (20, 5));
    assert_eq!((grid.sub_sampling_x, grid.sub_sampling_y), (59, 38));
    assert_eq!(grid.latitude.dim(), (5, 20));

    for i in 0..grid.height {
        for j in 0..grid.width {
            let (x, y) = ((j * grid.sub_sampling_x) as f64, (i * grid.sub_sampling_y) as f64);
            assert_abs_diff_eq!(grid.latitude[[i, j]] as f64, common::expected_latitude(y), epsilon = 1e-4);
            assert_abs_diff_eq!(grid.longitude[[i, j]] as f64, common::expected_longitude(x), epsilon = 1e-4);
            assert_abs_diff_eq!(grid.incidence_angle[[i, j]] as f64, common::expected_incidence(x), epsilon = 1e-4);

            // two-way slant range time in nanoseconds
            let expected_ns = (common::S0 + x * common::delta()) * 2.0e9;
            assert_abs_diff_eq!(grid.slant_range_time_ns[[i, j]] as f64, expected_ns, epsilon = expected_ns * 1e-6);
        }
    }
}

#[test]
fn test_tie_point_owner_switches_at_seam_midpoint() {
    let geometry = common::product_geometry();
    let target = geometry.target_extent();

    assert_eq!(subswath_index_for_slant_range(geometry.subswaths(), target.slant_range_time(396)), Some(0));
    assert_eq!(subswath_index_for_slant_range(geometry.subswaths(), target.slant_range_time(397)), Some(1));
    assert_eq!(subswath_index_for_slant_range(geometry.subswaths(), target.slant_range_time(791)), Some(2));
    assert_eq!(subswath_index_for_slant_range(geometry.subswaths(), common::S0 - common::delta()), None);
}

#[test]
fn test_bilinear_index_extrapolates_before_first_row() {
    let geometry = common::product_geometry();
    let sw = geometry.subswath(0);
    let slr = common::S0 + 50.0 * common::delta();

    // first grid row sits 10 lines before the sub-swath start
    let index = bilinear_index(common::T0 - 20.0 * common::DT, slr, sw).expect("index");
    assert_eq!((index.i0, index.i1), (0, 1));
    assert!(index.mu_y < 0.0);
    assert_abs_diff_eq!(
        index.interpolate(sw.geo_grid.field(GeoField::Latitude)),
        common::expected_latitude(-20.0),
        epsilon = 1e-6
    );

    assert!(matches!(
        bilinear_index(common::T0, common::S0 - 100.0 * common::delta(), sw),
        Err(SarError::GeometryInconsistency { .. })
    ));
}

#[test]
fn test_target_metadata_corners() {
    let geometry = common::product_geometry();
    let grid = synthesize_geolocation_grid(&geometry, 20, 5).unwrap();
    let metadata = target_metadata(&geometry, &grid);

    assert_eq!(metadata.num_output_lines, common::TARGET_HEIGHT);
    assert_eq!(metadata.num_samples_per_line, common::TARGET_WIDTH);
    assert_abs_diff_eq!(metadata.line_time_interval, common::DT * 86400.0, epsilon = 1e-12);
    assert!(metadata.last_line_time > metadata.first_line_time);

    let (w, h) = (common::TARGET_WIDTH as f64, common::TARGET_HEIGHT as f64);
    let corners = metadata.corners;
    assert_abs_diff_eq!(corners.first_near.latitude, common::expected_latitude(0.0), epsilon = 1e-3);
    assert_abs_diff_eq!(corners.first_near.longitude, common::expected_longitude(0.0), epsilon = 1e-3);
    assert_abs_diff_eq!(corners.first_far.longitude, common::expected_longitude(w), epsilon = 1e-3);
    assert_abs_diff_eq!(corners.last_near.latitude, common::expected_latitude(h), epsilon = 1e-3);
    assert_abs_diff_eq!(corners.last_far.latitude, common::expected_latitude(h), epsilon = 1e-3);
    assert_abs_diff_eq!(corners.last_far.longitude, common::expected_longitude(w), epsilon = 1e-3);
}

#[test]
fn test_pixel_value_between_nodes() {
    let geometry = common::product_geometry();
    let grid = synthesize_geolocation_grid(&geometry, 20, 5).unwrap();

    let value = grid.pixel_value(TiePointField::IncidenceAngle, 600.5, 77.0);
    assert_abs_diff_eq!(value, common::expected_incidence(600.5), epsilon = 1e-4);
}

#[test]
fn test_grid_denser_than_target_rejected() {
    let geometry = common::product_geometry();
    assert!(matches!(
        synthesize_geolocation_grid(&geometry, 2000, 5),
        Err(SarError::Processing(_))
    ));
    assert!(synthesize_geolocation_grid(&geometry, 1, 5).is_err());
}
