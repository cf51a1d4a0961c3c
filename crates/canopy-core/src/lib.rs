//! Multilayer urban canopy model for pollutant dispersion.
//!
//! A building-height raster is sliced into fixed-depth layers. For each
//! layer the site coverage ratio (λp) and frontal area density (λf) are
//! computed on a coarse grid, λf is turned into a mass-exchange velocity,
//! and the layers are combined into a vertical dispersion potential.

pub mod aggregate;
pub mod config;
pub mod coverage;
pub mod direction;
pub mod dispersion;
pub mod error;
pub mod frontal;
pub mod grid;
pub mod heat;
pub mod interpolation;
pub mod io;
pub mod layers;
pub mod pipeline;
pub mod velocity;

pub use config::{CanopyConfig, Degenerate, Extrapolation};
pub use error::{CanopyError, Result};
pub use grid::{Grid, HeightField, DEFAULT_NODATA};
pub use pipeline::{run_dispersion, run_dispersion_with_table, DispersionResult, LayerProducts};
