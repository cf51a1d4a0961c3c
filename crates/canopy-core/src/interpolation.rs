//! Piecewise-linear 1D lookup tables.
use crate::config::Extrapolation;
use crate::error::{CanopyError, Result};

/// Frontal area density samples of the default u*/Uref curve.
pub const LAMBDA_F_SAMPLES: [f64; 31] = [
    0.05037364, 0.057729945, 0.063935876, 0.06945358, 0.075428836, 0.08071492, 0.08645887,
    0.09289184, 0.09955517, 0.10828367, 0.11724094, 0.12596802, 0.13676041, 0.14893006,
    0.16293468, 0.17624964, 0.1895624, 0.20149805, 0.21297409, 0.22513852, 0.23661457,
    0.2529098, 0.2646143, 0.2779253, 0.29927123, 0.31831923, 0.34081247, 0.359863, 0.3763891,
    0.40232477, 0.43239823,
];

/// Friction velocity normalised by the reference velocity, u*/Uref.
pub const U_STAR_RATIO_SAMPLES: [f64; 31] = [
    0.097159654, 0.10717187, 0.11468071, 0.122659355, 0.12907284, 0.13501716, 0.13970931,
    0.14471413, 0.15050131, 0.15534855, 0.1594132, 0.162852, 0.16550735, 0.16800556, 0.16893794,
    0.1689317, 0.16673452, 0.16485097, 0.16249816, 0.15983203, 0.15747923, 0.15340272,
    0.14995433, 0.1460357, 0.14211331, 0.13600108, 0.13160865, 0.12800033, 0.12517567,
    0.11968617, 0.11967205,
];

/// Immutable table of `(x, y)` samples with strictly increasing `x`.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolationTable {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl InterpolationTable {
    pub fn new(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self> {
        if xs.len() != ys.len() {
            return Err(CanopyError::invalid(
                "interpolation_table",
                format!("{} x / {} y", xs.len(), ys.len()),
                "x and y sample counts differ",
            ));
        }
        if xs.len() < 2 {
            return Err(CanopyError::invalid("interpolation_table", xs.len(), "needs at least two samples"));
        }
        if xs.iter().chain(ys.iter()).any(|v| !v.is_finite()) {
            return Err(CanopyError::invalid("interpolation_table", "non-finite", "samples must be finite"));
        }
        if let Some(w) = xs.windows(2).find(|w| w[1] <= w[0]) {
            return Err(CanopyError::invalid(
                "interpolation_table",
                format!("{} -> {}", w[0], w[1]),
                "x samples must be strictly increasing",
            ));
        }
        Ok(Self { xs, ys })
    }

    /// λf → u*/Uref curve for urban canopies.
    pub fn friction_velocity_ratio() -> Self {
        Self {
            xs: LAMBDA_F_SAMPLES.to_vec(),
            ys: U_STAR_RATIO_SAMPLES.to_vec(),
        }
    }

    /// Sample domain `(min, max)`.
    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    /// Interpolated value at `x`, or `None` when `x` lies outside the domain.
    pub fn get(&self, x: f64) -> Option<f64> {
        let (min, max) = self.domain();
        if !(min..=max).contains(&x) {
            return None;
        }
        // Index of the first sample strictly greater than x.
        let hi = self.xs.partition_point(|&s| s <= x);
        if hi == self.xs.len() {
            return Some(self.ys[hi - 1]);
        }
        let lo = hi - 1;
        let t = (x - self.xs[lo]) / (self.xs[hi] - self.xs[lo]);
        Some(self.ys[lo] + t * (self.ys[hi] - self.ys[lo]))
    }

    /// Interpolated value at `x` with `policy` applied outside the domain.
    /// The error carries no layer or cell; grid-level callers fill them in.
    pub fn evaluate(&self, x: f64, policy: Extrapolation) -> Result<f64> {
        if let Some(y) = self.get(x) {
            return Ok(y);
        }
        let (min, max) = self.domain();
        match policy {
            Extrapolation::Clamp if x < min => Ok(self.ys[0]),
            Extrapolation::Clamp if x > max => Ok(self.ys[self.ys.len() - 1]),
            _ => Err(CanopyError::OutOfRangeInterpolation { value: x, min, max, layer: None, cell: None }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn hits_samples_exactly() {
        let t = InterpolationTable::friction_velocity_ratio();
        for (x, y) in LAMBDA_F_SAMPLES.iter().zip(U_STAR_RATIO_SAMPLES.iter()) {
            assert_abs_diff_eq!(t.get(*x).unwrap(), *y, epsilon = 1e-12);
        }
    }

    #[test]
    fn linear_between_samples() {
        let t = InterpolationTable::new(vec![0.0, 1.0, 3.0], vec![0.0, 10.0, 30.0]).unwrap();
        assert_abs_diff_eq!(t.get(0.5).unwrap(), 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(t.get(2.0).unwrap(), 20.0, epsilon = 1e-12);
    }

    #[test]
    fn extrapolation_policies() {
        let t = InterpolationTable::friction_velocity_ratio();
        assert!(t.get(0.0).is_none());
        assert_eq!(t.evaluate(0.0, Extrapolation::Clamp).unwrap(), U_STAR_RATIO_SAMPLES[0]);
        assert_eq!(t.evaluate(0.9, Extrapolation::Clamp).unwrap(), U_STAR_RATIO_SAMPLES[30]);
        assert!(matches!(
            t.evaluate(0.01, Extrapolation::Fail),
            Err(CanopyError::OutOfRangeInterpolation { layer: None, cell: None, .. })
        ));
        assert!(t.evaluate(f64::NAN, Extrapolation::Clamp).is_err());
    }

    #[test]
    fn rejects_degenerate_domains() {
        assert!(InterpolationTable::new(vec![1.0], vec![1.0]).is_err());
        assert!(InterpolationTable::new(vec![0.0, 0.0], vec![1.0, 2.0]).is_err());
        assert!(InterpolationTable::new(vec![0.0, 1.0], vec![1.0]).is_err());
        assert!(InterpolationTable::new(vec![1.0, 0.5], vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn default_table_is_valid() {
        let t = InterpolationTable::friction_velocity_ratio();
        let rebuilt = InterpolationTable::new(LAMBDA_F_SAMPLES.to_vec(), U_STAR_RATIO_SAMPLES.to_vec()).unwrap();
        assert_eq!(t, rebuilt);
    }
}
