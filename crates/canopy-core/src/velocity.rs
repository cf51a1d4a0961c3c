//! Mass-exchange velocity from frontal area density.
//!
//! `u* = ratio(λf) · Uref`, where `ratio` saturates at 0.12 for
//! λf ≥ 0.4 and comes from the interpolation table below that.
//! The exchange velocity is `u* / (π·√2)`.
use std::f64::consts::{PI, SQRT_2};

use crate::config::Extrapolation;
use crate::error::{CanopyError, Result};
use crate::grid::{ExchangeVelocityField, FrontalAreaField, DEFAULT_NODATA};
use crate::interpolation::InterpolationTable;

/// λf from which u*/Uref is held constant.
pub const SATURATION_LAMBDA_F: f64 = 0.4;
/// u*/Uref in the saturated regime.
pub const SATURATION_RATIO: f64 = 0.12;

/// u*/Uref for a single λf value.
pub fn friction_velocity_ratio(lambda_f: f64, table: &InterpolationTable, policy: Extrapolation) -> Result<f64> {
    if lambda_f >= SATURATION_LAMBDA_F {
        return Ok(SATURATION_RATIO);
    }
    table.evaluate(lambda_f, policy)
}

/// Exchange velocity (m/s) for a single λf value.
pub fn exchange_velocity_at(
    lambda_f: f64,
    reference_velocity: f64,
    table: &InterpolationTable,
    policy: Extrapolation,
) -> Result<f64> {
    let u_star = friction_velocity_ratio(lambda_f, table, policy)? * reference_velocity;
    Ok(u_star / (PI * SQRT_2))
}

/// Exchange velocity for every cell of `fad`. No-data cells stay no-data.
pub fn exchange_velocity(
    fad: &FrontalAreaField,
    reference_velocity: f64,
    table: &InterpolationTable,
    policy: Extrapolation,
) -> Result<ExchangeVelocityField> {
    if !reference_velocity.is_finite() || reference_velocity <= 0.0 {
        return Err(CanopyError::invalid(
            "reference_velocity",
            reference_velocity,
            "must be a positive number",
        ));
    }

    let mut data = Vec::with_capacity(fad.data.len());
    let mut any_nodata = false;
    for row in 0..fad.height {
        for col in 0..fad.width {
            let Some(lambda_f) = fad.value(row, col) else {
                any_nodata = true;
                data.push(DEFAULT_NODATA);
                continue;
            };
            let ud = exchange_velocity_at(lambda_f as f64, reference_velocity, table, policy).map_err(|e| match e {
                CanopyError::OutOfRangeInterpolation { value, min, max, layer, .. } => {
                    CanopyError::OutOfRangeInterpolation { value, min, max, layer, cell: Some((row, col)) }
                }
                other => other,
            })?;
            data.push(ud as f32);
        }
    }

    let mut out = fad.with_data(data);
    if any_nodata {
        out.nodata = Some(DEFAULT_NODATA);
    }
    Ok(out)
}
