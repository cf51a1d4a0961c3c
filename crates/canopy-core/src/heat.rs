//! Near-ground air temperature rise from anthropogenic heat (AH).
//!
//! Given the AH flux Qa, site coverage λp and frontal area density λf of a
//! canopy, the temperature rise is
//!
//! ```text
//! ΔT = (1 / Dc) · Qa / (Uref · (1 − λp)) · (1 − 0.12 · √(2 / λf))
//! ```
//!
//! Canopies sparser than `lambda_f_limit` are treated as fully ventilated
//! (ΔT = 0).
use serde::{Deserialize, Serialize};

use crate::error::{CanopyError, Result};
use crate::grid::{Grid, DEFAULT_NODATA};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatParams {
    /// Dispersion coefficient Dc.
    pub dispersion_coefficient: f64,
    /// λf below which no temperature rise is computed.
    pub lambda_f_limit: f64,
}

impl Default for HeatParams {
    fn default() -> Self {
        Self {
            dispersion_coefficient: 17.183,
            lambda_f_limit: 0.03,
        }
    }
}

/// ΔT for a single cell. `None` when the canopy is fully covered (λp = 1).
pub fn temperature_rise_at(qa: f64, lambda_p: f64, lambda_f: f64, reference_velocity: f64, params: &HeatParams) -> Option<f64> {
    if lambda_f < params.lambda_f_limit {
        return Some(0.0);
    }
    let open = 1.0 - lambda_p;
    if open == 0.0 {
        return None;
    }
    let dilution = qa / (reference_velocity * open);
    Some(dilution / params.dispersion_coefficient * (1.0 - 0.12 * (2.0 / lambda_f).sqrt()))
}

/// ΔT for every cell. All three inputs must share dimensions; the result
/// takes the georeferencing of `qa`.
pub fn temperature_rise(
    qa: &Grid,
    lambda_p: &Grid,
    lambda_f: &Grid,
    reference_velocity: f64,
    params: &HeatParams,
) -> Result<Grid> {
    if !reference_velocity.is_finite() || reference_velocity <= 0.0 {
        return Err(CanopyError::invalid(
            "reference_velocity",
            reference_velocity,
            "must be a positive number",
        ));
    }
    if !params.dispersion_coefficient.is_finite() || params.dispersion_coefficient <= 0.0 {
        return Err(CanopyError::invalid(
            "dispersion_coefficient",
            params.dispersion_coefficient,
            "must be a positive number",
        ));
    }
    qa.ensure_same_shape(lambda_p)?;
    qa.ensure_same_shape(lambda_f)?;

    let mut any_nodata = false;
    let mut data = Vec::with_capacity(qa.data.len());
    for row in 0..qa.height {
        for col in 0..qa.width {
            let cell = match (qa.value(row, col), lambda_p.value(row, col), lambda_f.value(row, col)) {
                (Some(q), Some(p), Some(f)) => temperature_rise_at(q as f64, p as f64, f as f64, reference_velocity, params),
                _ => None,
            };
            match cell {
                Some(v) => data.push(v as f32),
                None => {
                    any_nodata = true;
                    data.push(DEFAULT_NODATA);
                }
            }
        }
    }

    let mut out = qa.with_data(data);
    out.nodata = if any_nodata { Some(DEFAULT_NODATA) } else { None };
    Ok(out)
}
