use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::PlanError;

/// On-disk rendition of the fields extracted from a clinical ion plan.
///
/// The clinical-data parsing itself happens upstream; its exporter writes
/// this YAML tree and [`crate::plan::PlanModel::extract`] walks it. Tags the
/// exporter did not find are simply absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDocument {
    pub modality: String,
    pub patient_id: String,
    pub plan_date: String,
    pub plan_name: String,
    pub beams: Vec<BeamNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeamNode {
    pub beam_name: String,
    /// Present only when the beam carries a range shifter sequence.
    #[serde(default)]
    pub range_shifter: Option<RangeShifterNode>,
    pub control_points: Vec<ControlPointNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeShifterNode {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlPointNode {
    pub nominal_energy: f64,
    /// Populated on the first control point of the first beam.
    #[serde(default)]
    pub nominal_energy_unit: Option<String>,
    /// Populated on the first control point of each beam.
    #[serde(default)]
    pub snout_position: Option<f64>,
    #[serde(default)]
    pub cumulative_meterset_weight: Option<f64>,
}

impl PlanDocument {
    /// Read a plan document from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, PlanError> {
        if !path.exists() {
            return Err(PlanError::BadFilePath(path.to_path_buf()));
        }
        let yaml_str = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }
}
