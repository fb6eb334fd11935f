use crate::error::PlanError;
use crate::plan_document::{BeamNode, PlanDocument};

/// The expected modality tag of a scanned ion plan.
const EXPECTED_MODALITY: &str = "RTPLAN";

/// How control points are folded into energy layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionMode {
    /// Clinical plans: collapse repeated energies and track per-layer MU.
    #[default]
    Production,
    /// Calibration plans with multi-layer distinction: collapse repeated
    /// energies, MU is not tracked.
    CalibrationMerged,
    /// Calibration plans without multi-layer distinction: every control
    /// point becomes its own layer entry.
    CalibrationPerPoint,
}

/// One beam (treatment field) of the plan.
#[derive(Debug, Clone, PartialEq)]
pub struct BeamRecord {
    pub name: String,
    pub has_range_shifter: bool,
    /// Snout position in mm, from the beam's first control point.
    pub snout_position: f64,
    /// Nominal energies of the beam's energy layers, in delivery order.
    pub energies: Vec<f64>,
    /// Per-layer MU weights; empty in the calibration modes.
    pub layer_mu: Vec<f64>,
}

/// Structured model of a treatment plan, one [`BeamRecord`] per beam.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanModel {
    pub patient_id: String,
    pub plan_date: String,
    pub plan_name: String,
    /// Nominal energy unit, captured once from the first control point of
    /// the first beam.
    pub energy_unit: String,
    pub beams: Vec<BeamRecord>,
}

impl PlanModel {
    /// Walk a plan document and build the model.
    ///
    /// Fails with [`PlanError::InvalidPlan`] when the modality is not an ion
    /// treatment plan. A beam without a range-shifter node is recorded as
    /// having no degrader; that is not an error.
    pub fn extract(doc: &PlanDocument, mode: ExtractionMode) -> Result<Self, PlanError> {
        if doc.modality != EXPECTED_MODALITY {
            return Err(PlanError::InvalidPlan(doc.modality.clone()));
        }

        let mut energy_unit = String::new();
        let mut beams = Vec::with_capacity(doc.beams.len());
        for (beam_index, beam) in doc.beams.iter().enumerate() {
            let first = beam
                .control_points
                .first()
                .ok_or_else(|| PlanError::EmptyBeam(beam.beam_name.clone()))?;
            if beam_index == 0 {
                energy_unit = first.nominal_energy_unit.clone().unwrap_or_default();
            }
            let snout_position = first.snout_position.unwrap_or(0.0);

            let (energies, layer_mu) = collapse_layers(beam, mode);
            beams.push(BeamRecord {
                name: beam.beam_name.clone(),
                has_range_shifter: beam.range_shifter.is_some(),
                snout_position,
                energies,
                layer_mu,
            });
        }

        Ok(Self {
            patient_id: doc.patient_id.clone(),
            plan_date: doc.plan_date.clone(),
            plan_name: doc.plan_name.clone(),
            energy_unit,
            beams,
        })
    }

    /// Total number of energy layers across all beams.
    pub fn layer_count(&self) -> usize {
        self.beams.iter().map(|b| b.energies.len()).sum()
    }
}

/// Fold a beam's control points into energy layers.
///
/// A new layer begins whenever the nominal energy differs from the previous
/// control point's (except in per-point mode, which keeps every control
/// point). In production mode a layer's MU is the cumulative meterset at its
/// last control point minus the cumulative at the end of the previous layer.
fn collapse_layers(beam: &BeamNode, mode: ExtractionMode) -> (Vec<f64>, Vec<f64>) {
    let mut energies = Vec::new();
    let mut layer_mu = Vec::new();

    if mode == ExtractionMode::CalibrationPerPoint {
        energies.extend(beam.control_points.iter().map(|cp| cp.nominal_energy));
        return (energies, layer_mu);
    }

    let mut previous_energy: Option<f64> = None;
    let mut closed_meterset = 0.0;
    let mut last_meterset = 0.0;
    for cp in &beam.control_points {
        match previous_energy {
            Some(energy) if energy == cp.nominal_energy => (),
            Some(_) => {
                // Energy changed: the running layer is complete
                layer_mu.push(last_meterset - closed_meterset);
                closed_meterset = last_meterset;
                energies.push(cp.nominal_energy);
            }
            None => energies.push(cp.nominal_energy),
        }
        previous_energy = Some(cp.nominal_energy);
        last_meterset = cp.cumulative_meterset_weight.unwrap_or(0.0);
    }
    if !energies.is_empty() {
        layer_mu.push(last_meterset - closed_meterset);
    }

    if mode == ExtractionMode::CalibrationMerged {
        layer_mu.clear();
    }
    (energies, layer_mu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan_document::{ControlPointNode, RangeShifterNode};

    fn control_point(energy: f64, meterset: f64) -> ControlPointNode {
        ControlPointNode {
            nominal_energy: energy,
            nominal_energy_unit: None,
            snout_position: None,
            cumulative_meterset_weight: Some(meterset),
        }
    }

    fn document(beams: Vec<BeamNode>) -> PlanDocument {
        PlanDocument {
            modality: "RTPLAN".to_string(),
            patient_id: "PT0001".to_string(),
            plan_date: "20240509".to_string(),
            plan_name: "qa_plan".to_string(),
            beams,
        }
    }

    fn single_beam() -> BeamNode {
        let mut points: Vec<ControlPointNode> = [
            (70.0, 0.1),
            (70.0, 0.3),
            (100.0, 0.5),
            (100.0, 0.6),
            (150.0, 1.0),
        ]
        .iter()
        .map(|&(e, m)| control_point(e, m))
        .collect();
        points[0].nominal_energy_unit = Some("MEV".to_string());
        points[0].snout_position = Some(250.0);
        BeamNode {
            beam_name: "G0".to_string(),
            range_shifter: None,
            control_points: points,
        }
    }

    #[test]
    fn collapses_layers_and_splits_meterset_per_layer() {
        let doc = document(vec![single_beam()]);
        let model = PlanModel::extract(&doc, ExtractionMode::Production).unwrap();

        assert_eq!(model.energy_unit, "MEV");
        let beam = &model.beams[0];
        assert_eq!(beam.energies, vec![70.0, 100.0, 150.0]);
        assert_eq!(beam.layer_mu.len(), beam.energies.len());
        for (mu, expected) in beam.layer_mu.iter().zip([0.3, 0.3, 0.4]) {
            assert!((mu - expected).abs() < 1e-9);
        }
        assert_eq!(beam.snout_position, 250.0);
        assert!(!beam.has_range_shifter);
        assert_eq!(model.layer_count(), 3);
    }

    #[test]
    fn calibration_merged_keeps_boundaries_without_mu() {
        let doc = document(vec![single_beam()]);
        let model = PlanModel::extract(&doc, ExtractionMode::CalibrationMerged).unwrap();
        let beam = &model.beams[0];
        assert_eq!(beam.energies, vec![70.0, 100.0, 150.0]);
        assert!(beam.layer_mu.is_empty());
    }

    #[test]
    fn calibration_per_point_keeps_every_control_point() {
        let doc = document(vec![single_beam()]);
        let model = PlanModel::extract(&doc, ExtractionMode::CalibrationPerPoint).unwrap();
        let beam = &model.beams[0];
        assert_eq!(beam.energies, vec![70.0, 70.0, 100.0, 100.0, 150.0]);
        assert!(beam.layer_mu.is_empty());
        assert_eq!(model.layer_count(), 5);
    }

    #[test]
    fn range_shifter_presence_is_recorded_per_beam() {
        let mut with_shifter = single_beam();
        with_shifter.range_shifter = Some(RangeShifterNode {
            id: "RS01".to_string(),
        });
        let doc = document(vec![with_shifter, single_beam()]);
        let model = PlanModel::extract(&doc, ExtractionMode::Production).unwrap();
        assert!(model.beams[0].has_range_shifter);
        assert!(!model.beams[1].has_range_shifter);
    }

    #[test]
    fn rejects_a_non_plan_modality() {
        let mut doc = document(vec![single_beam()]);
        doc.modality = "CT".to_string();
        match PlanModel::extract(&doc, ExtractionMode::Production) {
            Err(PlanError::InvalidPlan(m)) => assert_eq!(m, "CT"),
            other => panic!("expected InvalidPlan, got {other:?}"),
        }
    }
}
