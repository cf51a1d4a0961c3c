//! Multilayer vertical dispersion potential.
//!
//! Each layer `k` at or above layer `i` contributes a resistance
//! `1 / (ud_k · (1 − λp_{k+1}))`, where `λp_{k+1}` is the coverage of the
//! layer above (0 above the top layer). Resistances add in series and the
//! potential is the reciprocal of their sum:
//!
//! ```text
//! V_i = 1 / Σ_{k=i..N} 1 / (ud_k · (1 − λp_{k+1}))
//! ```
use crate::config::Degenerate;
use crate::error::{CanopyError, Result};
use crate::grid::{CoverageField, DispersionPotentialField, ExchangeVelocityField, Grid, DEFAULT_NODATA};

fn check_stack(velocities: &[ExchangeVelocityField], coverages: &[CoverageField]) -> Result<()> {
    if velocities.is_empty() {
        return Err(CanopyError::invalid("layers", 0, "at least one layer is required"));
    }
    if velocities.len() != coverages.len() {
        return Err(CanopyError::invalid(
            "layers",
            format!("{} velocity / {} coverage", velocities.len(), coverages.len()),
            "every layer needs both an exchange velocity and a coverage field",
        ));
    }
    let first = &velocities[0];
    for g in velocities.iter().chain(coverages.iter()) {
        first.ensure_same_shape(g)?;
    }
    Ok(())
}

/// Dispersion potential of layer `index` (1-based) given the exchange
/// velocity and coverage fields of all `N` layers, bottom first.
///
/// Cells with a no-data input come out as no-data. A zero denominator is
/// handled per `on_degenerate`.
pub fn dispersion_potential(
    index: usize,
    velocities: &[ExchangeVelocityField],
    coverages: &[CoverageField],
    on_degenerate: Degenerate,
) -> Result<DispersionPotentialField> {
    check_stack(velocities, coverages)?;
    let n_layers = velocities.len();
    if index == 0 || index > n_layers {
        return Err(CanopyError::invalid(
            "layer_index",
            index,
            format!("must be within 1..={n_layers}"),
        ));
    }

    let shape = &velocities[0];
    let mut data = Vec::with_capacity(shape.data.len());
    let mut any_nodata = false;

    for row in 0..shape.height {
        for col in 0..shape.width {
            let mut resistance = 0.0f64;
            let mut defined = true;
            for k in index..=n_layers {
                let ud = velocities[k - 1].value(row, col);
                let above = if k == n_layers { Some(0.0) } else { coverages[k].value(row, col) };
                let (Some(ud), Some(above)) = (ud, above) else {
                    defined = false;
                    break;
                };
                let denom = ud as f64 * (1.0 - above as f64);
                if denom == 0.0 {
                    match on_degenerate {
                        Degenerate::Fail => return Err(CanopyError::DivisionByZero { layer: k, row, col }),
                        Degenerate::NoData => {
                            defined = false;
                            break;
                        }
                    }
                }
                resistance += 1.0 / denom;
            }
            if defined {
                data.push((1.0 / resistance) as f32);
            } else {
                any_nodata = true;
                data.push(DEFAULT_NODATA);
            }
        }
    }

    let mut out = shape.with_data(data);
    out.nodata = if any_nodata { Some(DEFAULT_NODATA) } else { None };
    Ok(out)
}

/// Cell-wise mean of the per-layer potentials, skipping no-data cells.
/// A cell that is no-data in every layer stays no-data.
pub fn average_potential(fields: &[DispersionPotentialField]) -> Result<DispersionPotentialField> {
    let Some(first) = fields.first() else {
        return Err(CanopyError::invalid("layers", 0, "at least one layer is required"));
    };
    for g in fields {
        first.ensure_same_shape(g)?;
    }

    let mut any_nodata = false;
    let data = (0..first.height)
        .flat_map(|row| (0..first.width).map(move |col| (row, col)))
        .map(|(row, col)| {
            let (sum, n) = fields
                .iter()
                .filter_map(|g| g.value(row, col))
                .fold((0.0f64, 0usize), |(s, n), v| (s + v as f64, n + 1));
            if n == 0 {
                any_nodata = true;
                DEFAULT_NODATA
            } else {
                (sum / n as f64) as f32
            }
        })
        .collect();

    let mut out: Grid = first.with_data(data);
    out.nodata = if any_nodata { Some(DEFAULT_NODATA) } else { None };
    Ok(out)
}
