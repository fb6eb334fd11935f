use ndarray::ArrayView1;

use crate::interpolate::Pchip;

/// Energy nodes of both correction factor tables, 70-230 MeV in 10 MeV steps.
const CORRECTION_ENERGY_NODES: [f64; 17] = [
    70.0, 80.0, 90.0, 100.0, 110.0, 120.0, 130.0, 140.0, 150.0, 160.0, 170.0, 180.0, 190.0, 200.0,
    210.0, 220.0, 230.0,
];

/// Protons delivered per unit dose, relative to 70 MeV.
const PROTON_PER_DOSE_FACTORS: [f64; 17] = [
    1.0,
    1.12573609032495,
    1.25147616113001,
    1.36888442326936,
    1.48668286253201,
    1.60497205195899,
    1.71741194754422,
    1.82898327045955,
    1.94071715123743,
    2.04829230739643,
    2.16168786761159,
    2.27629228444253,
    2.39246901674031,
    2.50561983301185,
    2.63593473689952,
    2.75663921459094,
    2.89392497566575,
];

/// Dose per monitor count, relative to 70 MeV.
const DOSE_PER_MU_FACTORS: [f64; 17] = [
    1.0,
    0.989255716854649,
    0.973421729297953,
    0.967281770613755,
    0.958215625815887,
    0.946937840980162,
    0.942685675037711,
    0.940168906626851,
    0.931161417057087,
    0.918762676945622,
    0.904569498824145,
    0.888164591949398,
    0.876689052268837,
    0.872826195199581,
    0.871540965585644,
    0.859481169160383,
    0.8524232713089,
];

/// The two fitted monitor-to-particle correction curves, evaluated at a
/// layer's nominal energy.
#[derive(Debug, Clone)]
pub struct CorrectionCurves {
    proton_per_dose: Pchip,
    dose_per_mu: Pchip,
}

impl CorrectionCurves {
    pub fn new() -> Self {
        Self {
            proton_per_dose: Pchip::new(
                CORRECTION_ENERGY_NODES.to_vec(),
                PROTON_PER_DOSE_FACTORS.to_vec(),
            ),
            dose_per_mu: Pchip::new(CORRECTION_ENERGY_NODES.to_vec(), DOSE_PER_MU_FACTORS.to_vec()),
        }
    }

    pub fn proton_per_dose(&self, energy: f64) -> f64 {
        self.proton_per_dose.eval(energy)
    }

    pub fn dose_per_mu(&self, energy: f64) -> f64 {
        self.dose_per_mu.eval(energy)
    }
}

impl Default for CorrectionCurves {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert one layer's raw dose monitor column into particle counts.
///
/// `curves` is `None` when calibration mode has the correction factors
/// toggled off; the monitor range factor and the dose dividing factor are
/// always applied. Values stay floating point; rounding to whole particles
/// happens at artifact emission.
pub fn particle_counts(
    raw: ArrayView1<'_, f32>,
    energy: f64,
    range_factor: f64,
    divisor: f64,
    curves: Option<&CorrectionCurves>,
) -> Vec<f64> {
    let curve_factor = match curves {
        Some(c) => c.proton_per_dose(energy) * c.dose_per_mu(energy),
        None => 1.0,
    };
    raw.iter()
        .map(|&count| count as f64 * curve_factor * range_factor / divisor)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor_range::range_factor;
    use ndarray::Array1;

    #[test]
    fn node_values_are_reproduced_exactly() {
        let curves = CorrectionCurves::new();
        assert_eq!(curves.proton_per_dose(70.0), 1.0);
        assert_eq!(curves.proton_per_dose(230.0), 2.89392497566575);
        assert_eq!(curves.dose_per_mu(70.0), 1.0);
        assert_eq!(curves.dose_per_mu(230.0), 0.8524232713089);
    }

    #[test]
    fn interior_evaluation_is_smooth_across_nodes() {
        let curves = CorrectionCurves::new();
        for node in [100.0, 150.0, 190.0] {
            let below = curves.proton_per_dose(node - 1e-7);
            let above = curves.proton_per_dose(node + 1e-7);
            assert!((below - above).abs() < 1e-5);
        }
    }

    #[test]
    fn extrapolation_clamps_to_the_boundary_factors() {
        let curves = CorrectionCurves::new();
        assert_eq!(curves.proton_per_dose(50.0), 1.0);
        assert_eq!(curves.proton_per_dose(300.0), 2.89392497566575);
    }

    #[test]
    fn monitor_range_and_divisor_apply_without_curves() {
        let raw = Array1::from(vec![1000.0_f32]);
        let counts = particle_counts(raw.view(), 150.0, range_factor(3).unwrap(), 10.0, None);
        assert!((counts[0] - 297.8723404255319).abs() < 1e-9);
    }

    #[test]
    fn curves_multiply_into_the_production_pipeline() {
        let curves = CorrectionCurves::new();
        let raw = Array1::from(vec![500.0_f32, 0.0]);
        let counts = particle_counts(raw.view(), 70.0, 1.0, 1.0, Some(&curves));
        // Both factors are exactly 1.0 at the 70 MeV node
        assert!((counts[0] - 500.0).abs() < 1e-9);
        assert_eq!(counts[1], 0.0);
    }
}
