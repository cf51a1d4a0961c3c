//! Frontal area density (λf) from a single canopy layer.
//!
//! For each of the 16 compass directions the windward-facing wall area of
//! every cell is estimated from the height drop to its upwind neighbours:
//! one neighbour along the row axis weighted by `|sin θ|`, one along the
//! column axis weighted by `|cos θ|`. The 16 fields are averaged and then
//! block-averaged to the aggregate resolution.
//!
//! Wall area per cell equals λf only for 1 m cells; other cell sizes are
//! accepted but logged.
use tracing::{debug, warn};

use crate::aggregate::block_mean;
use crate::config::CanopyConfig;
use crate::direction::Direction;
use crate::error::Result;
use crate::grid::{FrontalAreaField, Grid, Layer};

/// Height drops at or below this (after 4-decimal rounding) are ignored.
const EPSILON: f64 = 1e-5;

#[inline]
fn round4(v: f64) -> f64 {
    (v * 1e4).round() / 1e4
}

/// Per-cell frontal area for one direction, as f64 row-major values.
fn scan_direction(layer: &Layer, direction: Direction, max_height: f64) -> Vec<f64> {
    let rows = layer.height as isize;
    let cols = layer.width as isize;
    let theta = direction.theta();
    let w_row = theta.sin().abs();
    let w_col = theta.cos().abs();
    let (dr, dc) = direction.step();

    let clamped = |r: isize, c: isize| -> f64 {
        let h = layer.value(r as usize, c as usize).unwrap_or(0.0) as f64;
        h.min(max_height)
    };

    let mut out = Vec::with_capacity(layer.data.len());
    for r in 0..rows {
        for c in 0..cols {
            let h = clamped(r, c);
            let mut area = 0.0;

            let nr = r + dr;
            if (0..rows).contains(&nr) {
                let hn = clamped(nr, c);
                if round4(h) - round4(hn) > EPSILON {
                    area += w_row * (h - hn);
                }
            }

            let nc = c + dc;
            if (0..cols).contains(&nc) {
                let hn = clamped(r, nc);
                if round4(h) - round4(hn) > EPSILON {
                    area += w_col * (h - hn);
                }
            }

            out.push(round4(area));
        }
    }
    out
}

/// Frontal area of every cell for a single wind direction, at native resolution.
pub fn directional_frontal_area(layer: &Layer, direction: Direction, max_height: f64) -> Grid {
    let data = scan_direction(layer, direction, max_height)
        .into_iter()
        .map(|v| v as f32)
        .collect();
    let mut out = layer.with_data(data);
    out.nodata = None;
    out
}

/// Direction-independent frontal area: the cell-wise mean over all 16 directions.
pub fn mean_frontal_area(layer: &Layer, max_height: f64) -> Grid {
    #[cfg(feature = "threading")]
    let fields: Vec<Vec<f64>> = {
        use rayon::prelude::*;
        Direction::ALL
            .par_iter()
            .map(|&d| scan_direction(layer, d, max_height))
            .collect()
    };
    #[cfg(not(feature = "threading"))]
    let fields: Vec<Vec<f64>> = Direction::ALL
        .iter()
        .map(|&d| scan_direction(layer, d, max_height))
        .collect();

    for (d, field) in Direction::ALL.iter().zip(&fields) {
        debug!(direction = d.label(), total = field.iter().sum::<f64>(), "direction scanned");
    }

    let n = fields.len() as f64;
    let data = (0..layer.data.len())
        .map(|i| (fields.iter().map(|f| f[i]).sum::<f64>() / n) as f32)
        .collect();
    let mut out = layer.with_data(data);
    out.nodata = None;
    out
}

/// Frontal area density of `layer` at `config.aggregate_resolution`.
pub fn frontal_area_density(layer: &Layer, config: &CanopyConfig) -> Result<FrontalAreaField> {
    if (layer.cell_size - 1.0).abs() > 1e-9 {
        warn!(
            cell_size = layer.cell_size,
            "frontal area assumes 1 m cells; λf will be scaled by the cell size"
        );
    }
    let mean = mean_frontal_area(layer, config.effective_max_height());
    block_mean(&mean, config.aggregate_resolution, config.edge_mode)
}
