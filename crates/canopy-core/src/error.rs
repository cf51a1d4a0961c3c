//! Error types shared by every canopy stage.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanopyError {
    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error(
        "Frontal area density {value} outside interpolation domain [{min}, {max}]{}",
        location(.layer, .cell)
    )]
    OutOfRangeInterpolation {
        value: f64,
        min: f64,
        max: f64,
        /// 1-based layer, when raised inside the pipeline.
        layer: Option<usize>,
        /// `(row, col)` of the offending cell, when raised on a grid.
        cell: Option<(usize, usize)>,
    },

    #[error("Division by zero in layer {layer} at ({row}, {col}): no ventilation")]
    DivisionByZero { layer: usize, row: usize, col: usize },

    #[error("Grid size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error: {0}")]
    Tiff(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn location(layer: &Option<usize>, cell: &Option<(usize, usize)>) -> String {
    match (layer, cell) {
        (Some(l), Some((r, c))) => format!(" in layer {l} at ({r}, {c})"),
        (Some(l), None) => format!(" in layer {l}"),
        (None, Some((r, c))) => format!(" at ({r}, {c})"),
        (None, None) => String::new(),
    }
}

impl CanopyError {
    pub(crate) fn invalid(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        CanopyError::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Attach the layer index to errors raised while processing one layer.
    pub(crate) fn in_layer(self, index: usize) -> Self {
        match self {
            CanopyError::OutOfRangeInterpolation { value, min, max, cell, .. } => {
                CanopyError::OutOfRangeInterpolation { value, min, max, layer: Some(index), cell }
            }
            other => other,
        }
    }
}

impl From<tiff::TiffError> for CanopyError {
    fn from(e: tiff::TiffError) -> Self {
        CanopyError::Tiff(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CanopyError>;
