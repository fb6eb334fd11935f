use std::fmt::Write as _;
use std::path::Path;

use crate::error::GenerateError;
use crate::generate::{
    create_output_root, energy_label, field_progress_share, prepare_layers, require_template,
    validate, GenerateOptions, GenerationResult, PreparedLayer,
};
use crate::log_set::LogSet;
use crate::monitor_range::MonitorRangeTable;
use crate::plan::{BeamRecord, PlanModel};
use crate::task::Progress;

/// Simulation loop deck copied into every layer folder; also what the run
/// script invokes.
const RUN_TEMPLATE: &str = "Loop_PretreatmentQA.txt";
/// Nozzle geometry for layers 1-9 within a field.
const NOZZLE_TEMPLATE_LOW: &str = "SMC_PBN_Nozzle_1.txt";
/// Nozzle geometry for layers 10 and above.
const NOZZLE_TEMPLATE_HIGH: &str = "SMC_PBN_Nozzle_2.txt";
/// Name the copied nozzle template takes inside a layer folder.
const NOZZLE_NAME: &str = "SMC_PBN_Nozzle.txt";

/// Generate the TOPAS input tree: `<output>/<patientID>/Field<i>/<n>-<E>/`
/// with copied templates and a generated control file per energy layer,
/// plus a per-field run script.
///
/// Validation and template checks run before anything is written; a failure
/// after emission starts leaves the partial tree on disk.
pub fn generate(
    plan: &PlanModel,
    logs: &LogSet,
    ranges: &MonitorRangeTable,
    options: &GenerateOptions,
    progress: &Progress,
) -> Result<GenerationResult, GenerateError> {
    validate(plan, logs, ranges)?;
    let run_template = require_template(&options.template_dir, RUN_TEMPLATE)?;
    let nozzle_low = require_template(&options.template_dir, NOZZLE_TEMPLATE_LOW)?;
    let nozzle_high = require_template(&options.template_dir, NOZZLE_TEMPLATE_HIGH)?;

    progress.set(0.0);
    let prepared = prepare_layers(plan, logs, ranges, options, progress);
    let root = create_output_root(&plan.patient_id, options)?;

    let mut result = GenerationResult::default();
    let share = field_progress_share(plan.beams.len());
    for (beam_index, (beam, layers)) in plan.beams.iter().zip(&prepared).enumerate() {
        let field_dir = root.join(format!("Field{}", beam_index + 1));
        std::fs::create_dir(&field_dir)?;
        std::fs::write(field_dir.join("run.sh"), run_script(layers))?;

        for (layer_index, layer) in layers.iter().enumerate() {
            let layer_dir = field_dir.join(format!(
                "{}-{}",
                layer_index + 1,
                energy_label(layer.energy)
            ));
            std::fs::create_dir(&layer_dir)?;

            std::fs::copy(&run_template, layer_dir.join(RUN_TEMPLATE))?;
            let nozzle_template = if layer_index + 1 < 10 {
                &nozzle_low
            } else {
                &nozzle_high
            };
            copy_nozzle_template(nozzle_template, &layer_dir, layer_index + 1)?;

            let control_name = format!("ControlNozzle_{}.txt", layer_index + 1);
            std::fs::write(
                layer_dir.join(control_name),
                control_file(beam, layer, options),
            )?;

            result.particle_counts.push(layer.particles.clone());
        }
        progress.add(share);
        log::info!(
            "Field {} written with {} energy layers",
            beam_index + 1,
            layers.len()
        );
    }

    progress.set(1.0);
    Ok(result)
}

/// Copy a nozzle template into the layer folder under its generic name and
/// point it at the layer's control file.
fn copy_nozzle_template(
    template: &Path,
    layer_dir: &Path,
    layer_number: usize,
) -> Result<(), GenerateError> {
    let mut contents = std::fs::read_to_string(template)?;
    if !contents.ends_with('\n') {
        contents.push('\n');
    }
    writeln!(contents, "includeFile  = ControlNozzle_{layer_number}.txt")
        .expect("writing to a String cannot fail");
    std::fs::write(layer_dir.join(NOZZLE_NAME), contents)?;
    Ok(())
}

/// Shell script running every layer folder of a field in order.
fn run_script(layers: &[PreparedLayer]) -> String {
    let mut script = String::new();
    script.push_str("StartTime=$(date '+%Y-%m-%d %H:%M:%S')\n");
    for (layer_index, layer) in layers.iter().enumerate() {
        writeln!(script, "cd {}-{}", layer_index + 1, energy_label(layer.energy)).unwrap();
        script.push_str("echo $?\n");
        writeln!(script, "topas {RUN_TEMPLATE}").unwrap();
        script.push_str("cd ..\n");
    }
    script.push_str("EndTime=$(date '+%Y-%m-%d %H:%M:%S')\n");
    script.push_str("echo \"Start Time : \" $StartTime\n");
    script.push_str("echo \"End Time : \" $EndTime\n");
    script
}

/// The generated per-layer control file: beam parameters, optional range
/// shifter, the two dipole step functions and the particle weight series.
fn control_file(beam: &BeamRecord, layer: &PreparedLayer, options: &GenerateOptions) -> String {
    let mut text = String::new();
    if let Some(include) = &options.material_include {
        writeln!(text, "IncludeFile = {include}").unwrap();
        text.push('\n');
    }

    text.push_str("## Beam parameters ##\n\n");
    writeln!(
        text,
        "d:So/MyBeam/BeamEnergy = {} MeV",
        energy_label(layer.energy)
    )
    .unwrap();
    writeln!(
        text,
        "u:So/MyBeam/BeamEnergySpread = {:.6}",
        layer.energy_spread
    )
    .unwrap();
    writeln!(text, "d:So/MyBeam/SigmaX = {:.6} mm", layer.sigma_x).unwrap();
    writeln!(text, "u:So/MyBeam/SigmaXprime = {:.6}", layer.sigma_x_prime).unwrap();
    writeln!(text, "d:So/MyBeam/SigmaY = {:.6} mm", layer.sigma_y).unwrap();
    writeln!(text, "u:So/MyBeam/SigmaYprime = {:.6}", layer.sigma_y_prime).unwrap();
    text.push('\n');

    if beam.has_range_shifter {
        text.push_str("## Range Shifter ##\n\n");
        text.push_str("s:Ge/RangeShift/Type = \"TsBox\"\n");
        text.push_str("s:Ge/RangeShift/Parent = \"Phantom\"\n");
        text.push_str("s:Ge/RangeShift/Material = \"water\"\n");
        text.push_str("d:Ge/RangeShift/HLX = 200. mm\n");
        text.push_str("d:Ge/RangeShift/HLY = 200. mm\n");
        text.push_str("d:Ge/RangeShift/HLZ = 20. mm\n");
        writeln!(
            text,
            "d:Ge/RangeShift/TransZ = {}. mm",
            (beam.snout_position + 20.0).round()
        )
        .unwrap();
        text.push('\n');
    }

    let samples = layer.times_ms.len();
    text.push_str("## Dipole magnet control ##\n\n");
    for (dipole, series) in [("Dipolemagnet1st", &layer.x_tesla), ("Dipolemagnet2nd", &layer.y_tesla)] {
        writeln!(text, "s:Tf/{dipole}/Function = \"step\"").unwrap();
        writeln!(text, "dv:Tf/{dipole}/Times = {samples}").unwrap();
        push_f32_series(&mut text, &layer.times_ms, "ms");
        writeln!(text, "dv:Tf/{dipole}/values = {samples}").unwrap();
        push_f64_series(&mut text, series, "tesla");
    }
    text.push('\n');
    writeln!(
        text,
        "d:Tf/TimelineEnd = {:.6} ms",
        layer.times_ms.last().copied().unwrap_or(0.0)
    )
    .unwrap();
    writeln!(text, "i:Tf/NumberofsequentialTimes = {samples}").unwrap();
    text.push('\n');

    text.push_str("## Particle Weight ##\n\n");
    text.push_str("s:Tf/Particles/Function = \"step\"\n");
    writeln!(text, "dv:Tf/Particles/Times = {samples}").unwrap();
    push_f32_series(&mut text, &layer.times_ms, "ms");
    writeln!(text, "iv:Tf/Particles/values = {samples}").unwrap();
    let counts: Vec<String> = layer
        .particles
        .iter()
        .map(|v| format!("{}", v.round() as i64))
        .collect();
    text.push_str(&counts.join(" "));
    text.push('\n');
    text
}

fn push_f32_series(text: &mut String, series: &[f32], unit: &str) {
    let joined: Vec<String> = series.iter().map(|v| format!("{v:.6}")).collect();
    text.push_str(&joined.join(" "));
    writeln!(text, " {unit}").unwrap();
}

fn push_f64_series(text: &mut String, series: &[f64], unit: &str) {
    let joined: Vec<String> = series.iter().map(|v| format!("{v:.6}")).collect();
    text.push_str(&joined.join(" "));
    writeln!(text, " {unit}").unwrap();
}
