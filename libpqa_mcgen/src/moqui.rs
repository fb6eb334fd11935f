use std::fmt::Write as _;

use crate::error::GenerateError;
use crate::generate::{
    create_output_root, energy_label, field_progress_share, prepare_layers, validate,
    GenerateOptions, GenerationResult, PreparedLayer,
};
use crate::log_set::LogSet;
use crate::monitor_range::MonitorRangeTable;
use crate::plan::PlanModel;
use crate::task::Progress;

/// Generate the MOQUI input tree: one delimited time-series file per energy
/// layer, directly under `<output>/<patientID>/Field<i>/`.
///
/// No templates or run scripts are involved; validation and preparation are
/// shared with the TOPAS variant.
pub fn generate(
    plan: &PlanModel,
    logs: &LogSet,
    ranges: &MonitorRangeTable,
    options: &GenerateOptions,
    progress: &Progress,
) -> Result<GenerationResult, GenerateError> {
    validate(plan, logs, ranges)?;

    progress.set(0.0);
    let prepared = prepare_layers(plan, logs, ranges, options, progress);
    let root = create_output_root(&plan.patient_id, options)?;

    let mut result = GenerationResult::default();
    let share = field_progress_share(plan.beams.len());
    for (beam_index, layers) in prepared.iter().enumerate() {
        let field_dir = root.join(format!("Field{}", beam_index + 1));
        std::fs::create_dir(&field_dir)?;

        for (layer_index, layer) in layers.iter().enumerate() {
            let file_name = format!(
                "{:02}_{}MeV.csv",
                layer_index + 1,
                energy_label(layer.energy)
            );
            std::fs::write(field_dir.join(file_name), layer_csv(layer))?;
            result.particle_counts.push(layer.particles.clone());
        }
        progress.add(share);
        log::info!(
            "Field {} written with {} layer files",
            beam_index + 1,
            layers.len()
        );
    }

    progress.set(1.0);
    Ok(result)
}

/// One layer's (time, X, Y, particle count) tuples, comma-joined on a
/// single continuous line with no trailing comma.
fn layer_csv(layer: &PreparedLayer) -> String {
    let mut text = String::new();
    let samples = layer.times_ms.len();
    for index in 0..samples {
        write!(
            text,
            "{:.6},{:.6},{:.6},{}",
            layer.times_ms[index],
            layer.x_positions[index],
            layer.y_positions[index],
            layer.particles[index].round() as i64
        )
        .unwrap();
        if index + 1 < samples {
            text.push(',');
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::tests::{test_logs, test_options, test_plan};

    fn confirmed_ranges(layers: usize) -> MonitorRangeTable {
        let mut ranges = MonitorRangeTable::manual(layers);
        ranges.confirm();
        ranges
    }

    #[test]
    fn emits_one_csv_per_energy_layer() {
        let workspace = tempfile::tempdir().unwrap();
        let log_dir = tempfile::tempdir().unwrap();

        let plan = test_plan(&[100.0, 150.0]);
        let logs = test_logs(log_dir.path(), 2);
        let options = test_options(workspace.path(), workspace.path());
        let progress = Progress::default();

        let result =
            generate(&plan, &logs, &confirmed_ranges(2), &options, &progress).unwrap();

        let field_dir = workspace.path().join("PT0001/Field1");
        assert!(field_dir.join("01_100MeV.csv").is_file());
        assert!(field_dir.join("02_150MeV.csv").is_file());
        assert_eq!(std::fs::read_dir(&field_dir).unwrap().count(), 2);
        assert_eq!(result.particle_counts.len(), 2);
        assert_eq!(progress.get(), 1.0);
    }

    #[test]
    fn layer_files_hold_one_continuous_tuple_line() {
        let workspace = tempfile::tempdir().unwrap();
        let log_dir = tempfile::tempdir().unwrap();

        let plan = test_plan(&[100.0]);
        let logs = test_logs(log_dir.path(), 1);
        let options = test_options(workspace.path(), workspace.path());

        generate(
            &plan,
            &logs,
            &confirmed_ranges(1),
            &options,
            &Progress::default(),
        )
        .unwrap();

        let contents = std::fs::read_to_string(
            workspace.path().join("PT0001/Field1/01_100MeV.csv"),
        )
        .unwrap();
        assert!(!contents.contains('\n'));
        assert!(!contents.ends_with(','));
        // Two samples of four values each
        assert_eq!(contents.split(',').count(), 8);
    }

    #[test]
    fn preexisting_output_folder_fails_without_writing() {
        let workspace = tempfile::tempdir().unwrap();
        let log_dir = tempfile::tempdir().unwrap();
        let existing = workspace.path().join("PT0001");
        std::fs::create_dir(&existing).unwrap();

        let plan = test_plan(&[100.0]);
        let logs = test_logs(log_dir.path(), 1);
        let options = test_options(workspace.path(), workspace.path());

        let result = generate(
            &plan,
            &logs,
            &confirmed_ranges(1),
            &options,
            &Progress::default(),
        );
        assert!(matches!(result, Err(GenerateError::OutputExists(_))));
        assert_eq!(std::fs::read_dir(&existing).unwrap().count(), 0);
    }
}
