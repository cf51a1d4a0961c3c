use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CanopyError, Result};

/// Sentinel written into derived fields for cells with no defined value.
pub const DEFAULT_NODATA: f32 = -9999.0;

/// A 2D raster grid storing cell values as f32, row-major.
/// Row 0 is the northern edge (raster storage order).
/// Georeferencing math uses f64; cell values use f32.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    /// Row-major cell values. NaN cells are written to JSON as `null`.
    #[serde(with = "nan_cells")]
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
    /// Side length of a square cell in map units (metres).
    pub cell_size: f64,
    /// Upper-left corner of the grid in map units.
    pub origin_x: f64,
    pub origin_y: f64,
    #[serde(default, with = "nodata_value")]
    pub nodata: Option<f32>,
}

/// JSON has no NaN: cells round-trip through `null`.
mod nan_cells {
    use super::*;

    pub fn serialize<S: Serializer>(data: &[f32], s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_seq(data.iter().map(|v| if v.is_nan() { None } else { Some(*v) }))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Vec<f32>, D::Error> {
        let cells = Vec::<Option<f32>>::deserialize(d)?;
        Ok(cells.into_iter().map(|v| v.unwrap_or(f32::NAN)).collect())
    }
}

/// A NaN no-data value is written as the string `"nan"`, `null` means none.
mod nodata_value {
    use serde::de::Error;

    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f32),
        Text(String),
    }

    pub fn serialize<S: Serializer>(nodata: &Option<f32>, s: S) -> std::result::Result<S::Ok, S::Error> {
        match nodata {
            None => s.serialize_none(),
            Some(v) if v.is_nan() => s.serialize_some("nan"),
            Some(v) => s.serialize_some(v),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<f32>, D::Error> {
        match Option::<Repr>::deserialize(d)? {
            None => Ok(None),
            Some(Repr::Number(v)) => Ok(Some(v)),
            Some(Repr::Text(t)) if t.eq_ignore_ascii_case("nan") => Ok(Some(f32::NAN)),
            Some(Repr::Text(t)) => Err(D::Error::custom(format!("invalid no-data value {t:?}"))),
        }
    }
}

/// Building height per cell, in metres.
pub type HeightField = Grid;
/// One height band of a [`HeightField`], values in `[0, depth]`.
pub type Layer = Grid;
/// Direction-averaged frontal area density (λf) at aggregate resolution.
pub type FrontalAreaField = Grid;
/// Site coverage ratio (λp) at aggregate resolution.
pub type CoverageField = Grid;
/// Mass-exchange velocity (m/s) at aggregate resolution.
pub type ExchangeVelocityField = Grid;
/// Vertical dispersion potential (m/s) at aggregate resolution.
pub type DispersionPotentialField = Grid;

impl Grid {
    /// Create a new grid filled with the given value.
    pub fn new(width: usize, height: usize, cell_size: f64, origin_x: f64, origin_y: f64, fill: f32) -> Self {
        Self {
            data: vec![fill; width * height],
            width,
            height,
            cell_size,
            origin_x,
            origin_y,
            nodata: None,
        }
    }

    /// Create a grid of 1 m cells anchored at the origin.
    pub fn filled(width: usize, height: usize, fill: f32) -> Self {
        Self::new(width, height, 1.0, 0.0, 0.0, fill)
    }

    /// Wrap existing row-major data in a grid of 1 m cells.
    pub fn from_vec(data: Vec<f32>, width: usize, height: usize) -> Result<Self> {
        if data.len() != width * height {
            return Err(CanopyError::SizeMismatch {
                er: height,
                ec: width,
                ar: data.len() / width.max(1),
                ac: width,
            });
        }
        Ok(Self {
            data,
            width,
            height,
            cell_size: 1.0,
            origin_x: 0.0,
            origin_y: 0.0,
            nodata: None,
        })
    }

    /// Same georeferencing, new data. `data` must have `width × height` cells.
    pub fn with_data(&self, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), self.width * self.height);
        Self {
            data,
            width: self.width,
            height: self.height,
            cell_size: self.cell_size,
            origin_x: self.origin_x,
            origin_y: self.origin_y,
            nodata: self.nodata,
        }
    }

    pub fn with_nodata(mut self, nodata: f32) -> Self {
        self.nodata = Some(nodata);
        self
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.width + col] = val;
    }

    #[inline]
    pub fn is_nodata(&self, v: f32) -> bool {
        v.is_nan() || self.nodata == Some(v)
    }

    /// Cell value, or `None` for no-data cells.
    #[inline]
    pub fn value(&self, row: usize, col: usize) -> Option<f32> {
        let v = self.get(row, col);
        if self.is_nodata(v) { None } else { Some(v) }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Largest valid cell value, `None` if every cell is no-data.
    pub fn max_value(&self) -> Option<f32> {
        self.data
            .iter()
            .copied()
            .filter(|&v| !self.is_nodata(v))
            .fold(None, |acc, v| Some(acc.map_or(v, |m: f32| m.max(v))))
    }

    /// Number of cells holding a valid value.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|&&v| !self.is_nodata(v)).count()
    }

    pub fn ensure_same_shape(&self, other: &Grid) -> Result<()> {
        if self.width != other.width || self.height != other.height {
            return Err(CanopyError::SizeMismatch {
                er: self.height,
                ec: self.width,
                ar: other.height,
                ac: other.width,
            });
        }
        Ok(())
    }

    /// Reject grids with no cells or a non-positive cell size.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(CanopyError::invalid(
                "grid",
                format!("{}x{}", self.width, self.height),
                "grid has no cells",
            ));
        }
        if self.data.len() != self.width * self.height {
            return Err(CanopyError::SizeMismatch {
                er: self.height,
                ec: self.width,
                ar: self.data.len() / self.width,
                ac: self.width,
            });
        }
        if self.cell_size.is_nan() || self.cell_size <= 0.0 {
            return Err(CanopyError::invalid("cell_size", self.cell_size, "must be positive"));
        }
        Ok(())
    }
}
