//! Horizontal slicing of a building-height field into fixed-depth layers.
//!
//! Layer `i` (1-based) keeps the part of each building between
//! `depth·(i−1)` and `depth·i`, shifted down to `[0, depth]`.
use crate::error::{CanopyError, Result};
use crate::grid::{HeightField, Layer};

fn check_depth(depth: f64) -> Result<()> {
    if !depth.is_finite() || depth <= 0.0 {
        return Err(CanopyError::invalid("layer_depth", depth, "must be a positive number"));
    }
    Ok(())
}

/// Upper bound on the number of layers a single run may produce.
pub const MAX_LAYERS: usize = 10_000;

/// Reject infinite or negative heights. No-data cells are not inspected.
fn check_heights(hf: &HeightField) -> Result<()> {
    let bad = hf
        .data
        .iter()
        .enumerate()
        .find(|&(_, &h)| !hf.is_nodata(h) && (!h.is_finite() || h < 0.0));
    if let Some((i, &h)) = bad {
        let (row, col) = (i / hf.width.max(1), i % hf.width.max(1));
        return Err(CanopyError::invalid(
            "heightfield",
            h,
            format!("height at ({row}, {col}) must be finite and non-negative"),
        ));
    }
    Ok(())
}

/// Number of layers needed to cover the tallest building: `ceil(max / depth)`.
/// Zero when no cell rises above ground.
pub fn layer_count(hf: &HeightField, depth: f64) -> Result<usize> {
    check_depth(depth)?;
    check_heights(hf)?;
    let max = hf.max_value().unwrap_or(0.0) as f64;
    if max <= 0.0 {
        return Ok(0);
    }
    let count = (max / depth).ceil();
    if count > MAX_LAYERS as f64 {
        return Err(CanopyError::invalid(
            "heightfield",
            max,
            format!("needs {count} layers of {depth} m, limit is {MAX_LAYERS}"),
        ));
    }
    Ok(count as usize)
}

/// Extract layer `index` of `hf`.
///
/// Per cell: `clamp(h − depth·(index−1), 0, depth)`. No-data cells are
/// treated as ground and come out as 0; the returned layer carries no
/// no-data value.
pub fn extract_layer(hf: &HeightField, depth: f64, index: usize) -> Result<Layer> {
    check_depth(depth)?;
    if index == 0 {
        return Err(CanopyError::invalid("layer_index", index, "layers are numbered from 1"));
    }
    let base = depth * (index - 1) as f64;
    let data = hf
        .data
        .iter()
        .map(|&h| {
            if hf.is_nodata(h) {
                return 0.0;
            }
            (h as f64 - base).clamp(0.0, depth) as f32
        })
        .collect();

    let mut layer = hf.with_data(data);
    layer.nodata = None;
    Ok(layer)
}
