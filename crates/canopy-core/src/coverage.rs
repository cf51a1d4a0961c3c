//! Site coverage ratio (λp): fraction of plan area occupied within a layer.
use crate::aggregate::{block_sum, EdgeMode};
use crate::error::Result;
use crate::grid::{CoverageField, Layer};

/// Occupied cells (`> 0`) per block, divided by the full block area `block²`.
pub fn coverage_ratio(layer: &Layer, block: usize, edge: EdgeMode) -> Result<CoverageField> {
    let mask = layer.with_data(
        layer
            .data
            .iter()
            .map(|&v| if !layer.is_nodata(v) && v > 0.0 { 1.0 } else { 0.0 })
            .collect(),
    );
    let mut ratio = block_sum(&mask, block, edge)?;
    let area = (block * block) as f64;
    for v in ratio.data.iter_mut() {
        *v = (*v as f64 / area) as f32;
    }
    Ok(ratio)
}
