use serde::{Deserialize, Serialize};

/// The 16 compass directions the frontal area is averaged over.
///
/// Angles follow the raster scan convention used by the frontal-area
/// accumulator: W = 0°, S = 90°, E = 180°, N = 270°, stepping 22.5°.
/// `sin θ` drives the row step and `cos θ` the column step, so the wind
/// from N compares each cell with its northern neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    N,
    NNE,
    NE,
    ENE,
    E,
    ESE,
    SE,
    SSE,
    S,
    SSW,
    SW,
    WSW,
    W,
    WNW,
    NW,
    NNW,
}

impl Direction {
    pub const ALL: [Direction; 16] = [
        Direction::N,
        Direction::NNE,
        Direction::NE,
        Direction::ENE,
        Direction::E,
        Direction::ESE,
        Direction::SE,
        Direction::SSE,
        Direction::S,
        Direction::SSW,
        Direction::SW,
        Direction::WSW,
        Direction::W,
        Direction::WNW,
        Direction::NW,
        Direction::NNW,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Direction::N => "N",
            Direction::NNE => "NNE",
            Direction::NE => "NE",
            Direction::ENE => "ENE",
            Direction::E => "E",
            Direction::ESE => "ESE",
            Direction::SE => "SE",
            Direction::SSE => "SSE",
            Direction::S => "S",
            Direction::SSW => "SSW",
            Direction::SW => "SW",
            Direction::WSW => "WSW",
            Direction::W => "W",
            Direction::WNW => "WNW",
            Direction::NW => "NW",
            Direction::NNW => "NNW",
        }
    }

    /// Scan angle in degrees.
    pub fn angle_deg(self) -> f64 {
        // Each step clockwise on the compass is 22.5° back on the scan angle.
        let step = self as usize as f64;
        (270.0 - 22.5 * step).rem_euclid(360.0)
    }

    pub fn theta(self) -> f64 {
        self.angle_deg().to_radians()
    }

    /// Neighbour step `(d_row, d_col)`: `(sign(sin θ), −sign(cos θ))`.
    pub fn step(self) -> (isize, isize) {
        let theta = self.theta();
        (sign(theta.sin()), -sign(theta.cos()))
    }
}

/// Sign with a tolerance so that sin 180° and cos 90° count as zero.
fn sign(v: f64) -> isize {
    const TOL: f64 = 1e-12;
    if v > TOL {
        1
    } else if v < -TOL {
        -1
    } else {
        0
    }
}
