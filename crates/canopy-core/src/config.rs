//! Run configuration threaded through every pipeline stage.

use serde::{Deserialize, Serialize};

use crate::aggregate::EdgeMode;
use crate::error::{CanopyError, Result};

/// Behaviour of the λf → u*/Uref lookup outside the table's sample domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extrapolation {
    /// Return the nearest end sample.
    #[default]
    Clamp,
    /// Abort with `OutOfRangeInterpolation`.
    Fail,
}

/// What the dispersion combiner does with a zero resistance denominator
/// (zero exchange velocity or full coverage of the layer above).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degenerate {
    /// Mark the cell as no-data.
    #[default]
    NoData,
    /// Abort with `DivisionByZero`.
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CanopyConfig {
    /// Vertical depth of each canopy layer in metres.
    pub layer_depth: f64,
    /// Aggregation block size, in input cells per side.
    pub aggregate_resolution: usize,
    /// Reference wind velocity Uref in m/s.
    pub reference_velocity: f64,
    /// Height clamp for the frontal-area scan. `None` = `layer_depth + 1`.
    pub max_height: Option<f64>,
    pub extrapolation: Extrapolation,
    pub on_degenerate: Degenerate,
    pub edge_mode: EdgeMode,
}

impl Default for CanopyConfig {
    fn default() -> Self {
        Self {
            layer_depth: 10.0,
            aggregate_resolution: 200,
            reference_velocity: 7.4,
            max_height: None,
            extrapolation: Extrapolation::Clamp,
            on_degenerate: Degenerate::NoData,
            edge_mode: EdgeMode::Truncate,
        }
    }
}

impl CanopyConfig {
    pub fn effective_max_height(&self) -> f64 {
        self.max_height.unwrap_or(self.layer_depth + 1.0)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.layer_depth.is_finite() || self.layer_depth <= 0.0 {
            return Err(CanopyError::invalid("layer_depth", self.layer_depth, "must be a positive number"));
        }
        if self.aggregate_resolution == 0 {
            return Err(CanopyError::invalid("aggregate_resolution", 0, "must be at least 1"));
        }
        if !self.reference_velocity.is_finite() || self.reference_velocity <= 0.0 {
            return Err(CanopyError::invalid(
                "reference_velocity",
                self.reference_velocity,
                "must be a positive number",
            ));
        }
        if let Some(h) = self.max_height {
            if !h.is_finite() || h <= 0.0 {
                return Err(CanopyError::invalid("max_height", h, "must be a positive number"));
            }
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}
