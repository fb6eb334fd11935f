use ndarray::Array2;

use crate::interpolate::BicubicGrid;
use crate::pattern_log::PatternLog;

/// Energy levels of the dipole calibration grid [MeV].
const GRID_ENERGIES: [f64; 5] = [70.0, 100.0, 150.0, 190.0, 230.0];

/// Per-energy linear field maps for the crossline (X) dipole:
/// field = slope * position + intercept, [T/mm] and [T].
const X_FIELD_COEFFS: [(f64, f64); 5] = [
    (0.002355, -0.0004194),
    (0.002833, 0.000004815),
    (0.003521, -0.002142),
    (0.003984, 0.00002222),
    (0.004423, -0.002717),
];

/// Per-energy linear field maps for the inline (Y) dipole.
const Y_FIELD_COEFFS: [(f64, f64); 5] = [
    (-0.001862, -0.00001595),
    (-0.002262, 0.0004443),
    (-0.002817, 0.001138),
    (-0.003185, 0.0006288),
    (-0.003558, 0.001441),
];

/// Position samples of the calibration grid: -250..250 mm at 0.1 mm steps.
const POSITION_MIN_MM: f64 = -250.0;
const POSITION_STEP_MM: f64 = 0.1;
const POSITION_SAMPLES: usize = 5001;

/// The (energy, position) -> field surfaces driving the two scanning
/// dipoles.
///
/// Each surface is fit over a synthetic calibration grid built from the
/// per-energy linear maps above, then evaluated at (layer energy, sample
/// position) for every log sample. Evaluation is pure.
#[derive(Debug, Clone)]
pub struct MagnetFieldSurfaces {
    x_surface: BicubicGrid,
    y_surface: BicubicGrid,
}

impl MagnetFieldSurfaces {
    pub fn new() -> Self {
        Self {
            x_surface: Self::build_surface(&X_FIELD_COEFFS),
            y_surface: Self::build_surface(&Y_FIELD_COEFFS),
        }
    }

    fn build_surface(coeffs: &[(f64, f64); 5]) -> BicubicGrid {
        let positions: Vec<f64> = (0..POSITION_SAMPLES)
            .map(|k| POSITION_MIN_MM + k as f64 * POSITION_STEP_MM)
            .collect();
        let mut grid = Array2::zeros((GRID_ENERGIES.len(), positions.len()));
        for (level, &(slope, intercept)) in coeffs.iter().enumerate() {
            for (sample, &position) in positions.iter().enumerate() {
                grid[[level, sample]] = slope * position + intercept;
            }
        }
        BicubicGrid::new(GRID_ENERGIES.to_vec(), positions, grid)
    }

    /// Crossline dipole field [T] at an energy and beam position.
    pub fn x_field(&self, energy: f64, position_mm: f64) -> f64 {
        self.x_surface.eval(energy, position_mm)
    }

    /// Inline dipole field [T] at an energy and beam position.
    pub fn y_field(&self, energy: f64, position_mm: f64) -> f64 {
        self.y_surface.eval(energy, position_mm)
    }

    /// Instantaneous field series for one energy layer, one value per
    /// pattern-log sample.
    pub fn layer_series(&self, log: &PatternLog, energy: f64) -> (Vec<f64>, Vec<f64>) {
        let x_series = log
            .x_positions()
            .iter()
            .map(|&p| self.x_field(energy, p as f64))
            .collect();
        let y_series = log
            .y_positions()
            .iter()
            .map(|&p| self.y_field(energy, p as f64))
            .collect();
        (x_series, y_series)
    }
}

impl Default for MagnetFieldSurfaces {
    fn default() -> Self {
        Self::new()
    }
}
