use std::path::{Path, PathBuf};

use crate::correction::{particle_counts, CorrectionCurves};
use crate::error::GenerateError;
use crate::log_set::LogSet;
use crate::magnet_field::MagnetFieldSurfaces;
use crate::monitor_range::MonitorRangeTable;
use crate::optics::{energy_spread, BeamOptics};
use crate::plan::PlanModel;
use crate::task::Progress;

/// Options governing one generation run, distilled from the job config.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Directory under which the per-patient output tree is created.
    pub output_root: PathBuf,
    /// Dose monitor dividing factor; 1, 10 or 100.
    pub dose_divisor: u32,
    /// Apply the correction curves (always true outside calibration mode).
    pub apply_corrections: bool,
    /// Optional material-model include line for the control files.
    pub material_include: Option<String>,
    /// Folder holding the TOPAS base-code templates.
    pub template_dir: PathBuf,
}

/// Outcome of a completed generation run: the corrected, unrounded particle
/// series of every energy layer, in flattened plan order.
#[derive(Debug, Clone, Default)]
pub struct GenerationResult {
    pub particle_counts: Vec<Vec<f64>>,
}

impl GenerationResult {
    /// Whole-particle totals per layer, rounded the same way the emitted
    /// artifacts are.
    pub fn layer_totals(&self) -> Vec<u64> {
        self.particle_counts
            .iter()
            .map(|layer| layer.iter().map(|v| v.round().max(0.0) as u64).sum())
            .collect()
    }
}

/// Everything a per-layer emitter needs, computed once up front.
#[derive(Debug, Clone)]
pub struct PreparedLayer {
    pub energy: f64,
    pub sigma_x: f64,
    pub sigma_y: f64,
    pub sigma_x_prime: f64,
    pub sigma_y_prime: f64,
    pub energy_spread: f64,
    /// Sample times [ms] from the pattern log.
    pub times_ms: Vec<f32>,
    /// Sample positions [mm] from the pattern log.
    pub x_positions: Vec<f32>,
    pub y_positions: Vec<f32>,
    /// Dipole field series [T], one value per sample.
    pub x_tesla: Vec<f64>,
    pub y_tesla: Vec<f64>,
    /// Corrected particle counts, unrounded.
    pub particles: Vec<f64>,
}

/// Validation gate run before any filesystem write: the plan and log layer
/// counts must agree and the monitor ranges must be assigned and confirmed.
pub fn validate(
    plan: &PlanModel,
    logs: &LogSet,
    ranges: &MonitorRangeTable,
) -> Result<(), GenerateError> {
    let plan_layers = plan.layer_count();
    let log_layers = logs.layer_count();
    if plan_layers != log_layers {
        return Err(GenerateError::CountMismatch {
            plan: plan_layers,
            logs: log_layers,
        });
    }
    if !ranges.is_confirmed() {
        return Err(GenerateError::RangesNotConfirmed);
    }
    if ranges.len() != log_layers {
        return Err(GenerateError::CountMismatch {
            plan: plan_layers,
            logs: ranges.len(),
        });
    }
    Ok(())
}

/// Interpolate and correct the whole dataset once, beam by beam.
///
/// Advances the progress fraction in three fixed 10% steps: spot optics,
/// dipole fields, monitor corrections.
pub fn prepare_layers(
    plan: &PlanModel,
    logs: &LogSet,
    ranges: &MonitorRangeTable,
    options: &GenerateOptions,
    progress: &Progress,
) -> Vec<Vec<PreparedLayer>> {
    let optics = BeamOptics::new();
    let mut prepared: Vec<Vec<PreparedLayer>> = Vec::with_capacity(plan.beams.len());
    let mut global_index = 0;
    for beam in &plan.beams {
        let mut layers = Vec::with_capacity(beam.energies.len());
        for &energy in &beam.energies {
            let log = &logs.pattern_logs[global_index];
            layers.push(PreparedLayer {
                energy,
                sigma_x: optics.sigma_x(energy),
                sigma_y: optics.sigma_y(energy),
                sigma_x_prime: optics.sigma_x_prime(energy),
                sigma_y_prime: optics.sigma_y_prime(energy),
                energy_spread: energy_spread(energy),
                times_ms: log.times().to_vec(),
                x_positions: log.x_positions().to_vec(),
                y_positions: log.y_positions().to_vec(),
                x_tesla: Vec::new(),
                y_tesla: Vec::new(),
                particles: Vec::new(),
            });
            global_index += 1;
        }
        prepared.push(layers);
    }
    progress.add(0.1);

    let surfaces = MagnetFieldSurfaces::new();
    let mut global_index = 0;
    for layers in prepared.iter_mut() {
        for layer in layers.iter_mut() {
            let log = &logs.pattern_logs[global_index];
            let (x_tesla, y_tesla) = surfaces.layer_series(log, layer.energy);
            layer.x_tesla = x_tesla;
            layer.y_tesla = y_tesla;
            global_index += 1;
        }
    }
    progress.add(0.1);

    let curves = options.apply_corrections.then(CorrectionCurves::new);
    let divisor = options.dose_divisor as f64;
    let mut global_index = 0;
    for layers in prepared.iter_mut() {
        for layer in layers.iter_mut() {
            let log = &logs.pattern_logs[global_index];
            // Codes were validated at table build time
            let range_factor = ranges.factor(global_index).unwrap_or(1.0);
            layer.particles = particle_counts(
                log.dose_monitor(),
                layer.energy,
                range_factor,
                divisor,
                curves.as_ref(),
            );
            global_index += 1;
        }
    }
    progress.add(0.1);

    prepared
}

/// Create the per-patient output root. An existing folder is never
/// overwritten; generation fails before any write happens.
pub fn create_output_root(
    patient_id: &str,
    options: &GenerateOptions,
) -> Result<PathBuf, GenerateError> {
    let root = options.output_root.join(patient_id);
    if root.exists() {
        return Err(GenerateError::OutputExists(root));
    }
    std::fs::create_dir_all(&root)?;
    Ok(root)
}

/// Energy part of a layer's folder and file names: rounded to two decimals
/// with trailing zeros trimmed.
pub fn energy_label(energy: f64) -> String {
    let rounded = (energy * 100.0).round() / 100.0;
    format!("{rounded}")
}

/// Per-field share of the emission stage, which accounts for the remaining
/// 70% after preparation.
pub fn field_progress_share(beam_count: usize) -> f32 {
    0.7 / beam_count.max(1) as f32
}

pub(crate) fn require_template(template_dir: &Path, name: &str) -> Result<PathBuf, GenerateError> {
    let path = template_dir.join(name);
    if !path.exists() {
        return Err(GenerateError::TemplateMissing(path));
    }
    Ok(path)
}
