//! End-to-end run on a 4×4 grid holding a single 2 m column.

use std::f64::consts::{PI, SQRT_2};

use approx::assert_relative_eq;
use canopy_core::direction::Direction;
use canopy_core::frontal::directional_frontal_area;
use canopy_core::interpolation::U_STAR_RATIO_SAMPLES;
use canopy_core::io::{GeoTiffStore, RasterStore};
use canopy_core::layers::{extract_layer, layer_count};
use canopy_core::{run_dispersion, CanopyConfig, Grid};

const UREF: f64 = 5.0;

fn column_field() -> Grid {
    let mut hf = Grid::filled(4, 4, 0.0);
    hf.set(1, 1, 2.0);
    hf
}

fn config() -> CanopyConfig {
    CanopyConfig {
        layer_depth: 1.0,
        aggregate_resolution: 1,
        reference_velocity: UREF,
        ..CanopyConfig::default()
    }
}

#[test]
fn column_splits_into_two_full_layers() {
    let hf = column_field();
    assert_eq!(layer_count(&hf, 1.0).unwrap(), 2);
    for index in 1..=2 {
        let layer = extract_layer(&hf, 1.0, index).unwrap();
        assert_eq!(layer.get(1, 1), 1.0);
        assert_eq!(layer.data.iter().filter(|&&v| v > 0.0).count(), 1);
    }
}

#[test]
fn north_wind_frontal_area_is_column_height_step() {
    let layer = extract_layer(&column_field(), 1.0, 1).unwrap();
    let fa = directional_frontal_area(&layer, Direction::N, config().effective_max_height());
    // |sin 270°| · (1 − 0) on the north face; everything else is sheltered or flat.
    assert_relative_eq!(fa.get(1, 1), 1.0, max_relative = 1e-6);
    assert_eq!(fa.data.iter().filter(|&&v| v != 0.0).count(), 1);
}

#[test]
fn dispersion_potential_for_column() {
    let result = run_dispersion(&column_field(), &config()).unwrap();
    assert_eq!(result.layer_count(), 2);

    let ud_open = U_STAR_RATIO_SAMPLES[0] * UREF / (PI * SQRT_2);
    let ud_sat = 0.12 * UREF / (PI * SQRT_2);

    for layer in &result.layers {
        assert_eq!(layer.coverage.get(1, 1), 1.0);
        assert_eq!(layer.coverage.get(0, 0), 0.0);
        assert_relative_eq!(layer.exchange_velocity.get(1, 1) as f64, ud_sat, max_relative = 1e-6);
        assert_relative_eq!(layer.exchange_velocity.get(3, 3) as f64, ud_open, max_relative = 1e-6);
    }

    // Layer 1 under the fully covered column cell has no ventilation.
    assert_eq!(result.potentials[0].value(1, 1), None);
    // Open ground: two equal resistances in series.
    assert_relative_eq!(result.potentials[0].get(0, 0) as f64, ud_open / 2.0, max_relative = 1e-5);
    // Top layer reduces to its own exchange velocity.
    assert_relative_eq!(result.potentials[1].get(1, 1) as f64, ud_sat, max_relative = 1e-5);

    assert_relative_eq!(result.average.get(1, 1) as f64, ud_sat, max_relative = 1e-5);
    assert_relative_eq!(result.average.get(2, 3) as f64, 0.75 * ud_open, max_relative = 1e-5);
}

#[test]
fn derived_fields_survive_geotiff_round_trip() {
    let mut hf = column_field();
    hf.cell_size = 2.0;
    hf.origin_x = 833_976.0;
    hf.origin_y = 825_612.5;
    let result = run_dispersion(&hf, &config()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    // λf has no gaps; layer 1's potential carries the no-data sentinel.
    for (name, field) in [("fad", &result.layers[0].frontal_area), ("v", &result.potentials[0])] {
        let path = dir.path().join(format!("layer_1_{name}.tif"));
        GeoTiffStore.save(field, &path).unwrap();
        let back = GeoTiffStore.load(&path).unwrap();

        assert_eq!((back.width, back.height), (field.width, field.height), "{name}");
        assert_eq!(back.cell_size, 2.0, "{name}");
        assert_eq!((back.origin_x, back.origin_y), (833_976.0, 825_612.5), "{name}");
        assert_eq!(back.nodata, field.nodata, "{name}");
        for (a, b) in field.data.iter().zip(&back.data) {
            assert_eq!(a.to_bits(), b.to_bits(), "{name}");
        }
    }
    let v = GeoTiffStore.load(&dir.path().join("layer_1_v.tif")).unwrap();
    assert_eq!(v.value(1, 1), None);
    assert!(v.value(0, 0).is_some());
}
