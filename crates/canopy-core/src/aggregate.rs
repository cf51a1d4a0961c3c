//! Non-overlapping block reduction to a coarser grid.
//!
//! A `block × block` window of input cells becomes one output cell whose
//! size is `cell_size · block`; the upper-left origin is unchanged.
//! No-data cells are skipped, and a block without any data cell is no-data.
use serde::{Deserialize, Serialize};

use crate::error::{CanopyError, Result};
use crate::grid::{Grid, DEFAULT_NODATA};

/// Treatment of the partial blocks at the right and bottom edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeMode {
    /// Drop partial blocks.
    #[default]
    Truncate,
    /// Keep partial blocks, reducing over the cells that exist.
    Expand,
}

#[derive(Clone, Copy)]
enum Reducer {
    Mean,
    Sum,
}

fn out_dims(grid: &Grid, block: usize, edge: EdgeMode) -> Result<(usize, usize)> {
    if block == 0 {
        return Err(CanopyError::invalid("aggregate_resolution", 0, "must be at least 1"));
    }
    let dims = match edge {
        EdgeMode::Truncate => (grid.width / block, grid.height / block),
        EdgeMode::Expand => (grid.width.div_ceil(block), grid.height.div_ceil(block)),
    };
    if dims.0 == 0 || dims.1 == 0 {
        return Err(CanopyError::invalid(
            "aggregate_resolution",
            block,
            format!("grid of {}x{} cells holds no complete block", grid.width, grid.height),
        ));
    }
    Ok(dims)
}

fn reduce(grid: &Grid, block: usize, edge: EdgeMode, reducer: Reducer) -> Result<Grid> {
    let (out_w, out_h) = out_dims(grid, block, edge)?;
    let mut data = Vec::with_capacity(out_w * out_h);
    let mut any_nodata = false;

    for br in 0..out_h {
        for bc in 0..out_w {
            let r_end = ((br + 1) * block).min(grid.height);
            let c_end = ((bc + 1) * block).min(grid.width);
            let mut sum = 0.0f64;
            let mut n = 0usize;
            for r in br * block..r_end {
                for c in bc * block..c_end {
                    if let Some(v) = grid.value(r, c) {
                        sum += v as f64;
                        n += 1;
                    }
                }
            }
            if n == 0 {
                any_nodata = true;
                data.push(DEFAULT_NODATA);
                continue;
            }
            let v = match reducer {
                Reducer::Mean => sum / n as f64,
                Reducer::Sum => sum,
            };
            data.push(v as f32);
        }
    }

    let nodata = if any_nodata { Some(DEFAULT_NODATA) } else { grid.nodata };
    Ok(Grid {
        data,
        width: out_w,
        height: out_h,
        cell_size: grid.cell_size * block as f64,
        origin_x: grid.origin_x,
        origin_y: grid.origin_y,
        nodata,
    })
}

/// Mean of the data cells in each block.
pub fn block_mean(grid: &Grid, block: usize, edge: EdgeMode) -> Result<Grid> {
    reduce(grid, block, edge, Reducer::Mean)
}

/// Sum of the data cells in each block.
pub fn block_sum(grid: &Grid, block: usize, edge: EdgeMode) -> Result<Grid> {
    reduce(grid, block, edge, Reducer::Sum)
}
