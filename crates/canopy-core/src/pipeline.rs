//! Pipeline orchestrator: runs every stage of the multilayer dispersion
//! model in order.
//!
//! Per layer `i = 1..N`:
//!   extract layer → site coverage ratio → frontal area density →
//!   mass-exchange velocity.
//! Then per layer: dispersion potential from all layers at and above it,
//! and finally the cell-wise average of the per-layer potentials.
use std::time::Instant;

use tracing::{debug, info, instrument};

use crate::config::CanopyConfig;
use crate::coverage::coverage_ratio;
use crate::dispersion::{average_potential, dispersion_potential};
use crate::error::{CanopyError, Result};
use crate::frontal::frontal_area_density;
use crate::grid::{
    CoverageField, DispersionPotentialField, ExchangeVelocityField, FrontalAreaField, HeightField,
};
use crate::interpolation::InterpolationTable;
use crate::layers::{extract_layer, layer_count};
use crate::velocity::exchange_velocity;

/// Derived products retained for one layer once its height slice is dropped.
#[derive(Debug, Clone)]
pub struct LayerProducts {
    /// 1-based layer index.
    pub index: usize,
    pub coverage: CoverageField,
    pub frontal_area: FrontalAreaField,
    pub exchange_velocity: ExchangeVelocityField,
}

/// Full output of the dispersion pipeline.
#[derive(Debug, Clone)]
pub struct DispersionResult {
    /// Bottom layer first.
    pub layers: Vec<LayerProducts>,
    /// Dispersion potential per layer, bottom layer first.
    pub potentials: Vec<DispersionPotentialField>,
    /// Cell-wise mean of `potentials`.
    pub average: DispersionPotentialField,
    pub elapsed_ms: u64,
}

impl DispersionResult {
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

fn layer_products(
    hf: &HeightField,
    index: usize,
    config: &CanopyConfig,
    table: &InterpolationTable,
) -> Result<LayerProducts> {
    info!(layer = index, "processing layer");
    let layer = extract_layer(hf, config.layer_depth, index)?;
    let coverage = coverage_ratio(&layer, config.aggregate_resolution, config.edge_mode)?;
    let frontal_area = frontal_area_density(&layer, config)?;
    let exchange_velocity = exchange_velocity(&frontal_area, config.reference_velocity, table, config.extrapolation)
        .map_err(|e| e.in_layer(index))?;
    debug!(
        layer = index,
        coverage_cells = coverage.valid_count(),
        "layer products ready"
    );
    Ok(LayerProducts {
        index,
        coverage,
        frontal_area,
        exchange_velocity,
    })
}

/// Run the dispersion model with the default λf → u*/Uref table.
pub fn run_dispersion(hf: &HeightField, config: &CanopyConfig) -> Result<DispersionResult> {
    run_dispersion_with_table(hf, config, &InterpolationTable::friction_velocity_ratio())
}

/// Run the dispersion model with a caller-supplied λf → u*/Uref table.
#[instrument(skip_all, fields(width = hf.width, height = hf.height))]
pub fn run_dispersion_with_table(
    hf: &HeightField,
    config: &CanopyConfig,
    table: &InterpolationTable,
) -> Result<DispersionResult> {
    let t0 = Instant::now();
    config.validate()?;
    hf.validate()?;

    let n_layers = layer_count(hf, config.layer_depth)?;
    if n_layers == 0 {
        return Err(CanopyError::invalid(
            "heightfield",
            "max height <= 0",
            "no building rises above ground",
        ));
    }
    info!(
        max_height = hf.max_value().unwrap_or(0.0),
        layers = n_layers,
        layer_depth = config.layer_depth,
        "urban canopy divided into layers"
    );

    #[cfg(feature = "threading")]
    let layers: Vec<LayerProducts> = {
        use rayon::prelude::*;
        (1..=n_layers)
            .into_par_iter()
            .map(|i| layer_products(hf, i, config, table))
            .collect::<Result<_>>()?
    };
    #[cfg(not(feature = "threading"))]
    let layers: Vec<LayerProducts> = (1..=n_layers)
        .map(|i| layer_products(hf, i, config, table))
        .collect::<Result<_>>()?;

    let velocities: Vec<ExchangeVelocityField> = layers.iter().map(|l| l.exchange_velocity.clone()).collect();
    let coverages: Vec<CoverageField> = layers.iter().map(|l| l.coverage.clone()).collect();

    let potentials = (1..=n_layers)
        .map(|i| {
            debug!(layer = i, "computing dispersion potential");
            dispersion_potential(i, &velocities, &coverages, config.on_degenerate)
        })
        .collect::<Result<Vec<_>>>()?;
    let average = average_potential(&potentials)?;

    let elapsed_ms = t0.elapsed().as_millis() as u64;
    info!(elapsed_ms, "dispersion model finished");

    Ok(DispersionResult {
        layers,
        potentials,
        average,
        elapsed_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Degenerate;
    use crate::grid::Grid;
    use approx::assert_relative_eq;

    #[test]
    fn empty_canopy_is_rejected() {
        let hf = Grid::filled(4, 4, 0.0);
        let config = CanopyConfig { aggregate_resolution: 2, ..CanopyConfig::default() };
        assert!(matches!(
            run_dispersion(&hf, &config),
            Err(CanopyError::InvalidParameter { name: "heightfield", .. })
        ));
    }

    #[test]
    fn out_of_range_lambda_f_reports_layer_and_cell() {
        // 1.25 m column, 1 m layers: layer 1 saturates, layer 2 holds a
        // 0.25 m stub whose λf (~0.31) falls past the table's upper bound.
        let mut hf = Grid::filled(3, 3, 0.0);
        hf.set(1, 1, 1.25);
        let table = InterpolationTable::new(vec![0.0, 0.2], vec![0.1, 0.1]).unwrap();
        let config = CanopyConfig {
            layer_depth: 1.0,
            aggregate_resolution: 1,
            extrapolation: crate::config::Extrapolation::Fail,
            ..CanopyConfig::default()
        };
        let err = run_dispersion_with_table(&hf, &config, &table).unwrap_err();
        assert!(matches!(
            err,
            CanopyError::OutOfRangeInterpolation { layer: Some(2), cell: Some((1, 1)), .. }
        ));
        assert!(err.to_string().contains("in layer 2 at (1, 1)"));
    }

    #[test]
    fn non_finite_height_aborts_run() {
        let mut hf = Grid::filled(4, 4, 5.0);
        hf.set(3, 3, f32::INFINITY);
        let config = CanopyConfig { aggregate_resolution: 2, ..CanopyConfig::default() };
        assert!(matches!(
            run_dispersion(&hf, &config),
            Err(CanopyError::InvalidParameter { name: "heightfield", .. })
        ));
    }

    #[test]
    fn invalid_config_aborts_before_work() {
        let hf = Grid::filled(4, 4, 5.0);
        let config = CanopyConfig { layer_depth: -1.0, ..CanopyConfig::default() };
        assert!(run_dispersion(&hf, &config).is_err());
    }

    #[test]
    fn uniform_block_fully_covered_layer_is_nodata_below_top() {
        // Every cell 20 m tall, depth 10: two layers, both fully covered.
        let hf = Grid::filled(4, 4, 20.0);
        let config = CanopyConfig { aggregate_resolution: 2, layer_depth: 10.0, ..CanopyConfig::default() };
        let result = run_dispersion(&hf, &config).unwrap();
        assert_eq!(result.layer_count(), 2);

        // Layer 1 sits under a fully covered layer: no ventilation.
        assert!(result.potentials[0].data.iter().all(|&v| v == crate::grid::DEFAULT_NODATA));
        // Top layer: V equals its exchange velocity.
        let ud = &result.layers[1].exchange_velocity;
        for (v, u) in result.potentials[1].data.iter().zip(&ud.data) {
            assert_relative_eq!(*v, *u, max_relative = 1e-6);
        }
        // Average ignores the no-data layer.
        assert_eq!(result.average.data, result.potentials[1].data);

        let strict = CanopyConfig { on_degenerate: Degenerate::Fail, ..config };
        assert!(matches!(
            run_dispersion(&hf, &strict),
            Err(CanopyError::DivisionByZero { layer: 1, .. })
        ));
    }
}
