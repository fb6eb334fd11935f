use clap::{Arg, ArgAction, Command};
use indicatif::{MultiProgress, ProgressBar};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use libpqa_mcgen::calib_config::CalibConfig;
use libpqa_mcgen::config::{Config, EngineTarget};
use libpqa_mcgen::divide::divide_pattern_log;
use libpqa_mcgen::error::{ExportError, GenerateError};
use libpqa_mcgen::export::{export_magnet_csv, export_pattern_csv};
use libpqa_mcgen::generate::{GenerateOptions, GenerationResult};
use libpqa_mcgen::log_set::LogSet;
use libpqa_mcgen::monitor_range::MonitorRangeTable;
use libpqa_mcgen::plan::PlanModel;
use libpqa_mcgen::plan_document::PlanDocument;
use libpqa_mcgen::session::Session;
use libpqa_mcgen::task::{TaskHandle, TaskKind};
use libpqa_mcgen::{moqui, topas};

fn make_template_config(path: &Path) {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).unwrap();
    let mut file = File::create(path).expect("Could not create template config file!");
    file.write_all(yaml_str.as_bytes())
        .expect("Failed to write yaml data to file!");
}

/// Poll a task until it finishes, mirroring its progress to the bar, then
/// take its result.
fn wait_for<T>(task: TaskHandle<T>, bar: &ProgressBar) -> Option<T> {
    loop {
        bar.set_position((task.progress() * 100.0) as u64);
        if task.is_finished() {
            bar.set_position(100);
            match task.join() {
                Ok(result) => return Some(result),
                Err(_) => {
                    log::error!("Failed to join the background task!");
                    return None;
                }
            }
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
}

fn report_particle_totals(plan: &PlanModel, result: &GenerationResult) {
    let totals = result.layer_totals();
    let mut offset = 0;
    log::info!("Generated proton particles:");
    for (beam_index, beam) in plan.beams.iter().enumerate() {
        log::info!("Field {}", beam_index + 1);
        for layer_index in 0..beam.energies.len() {
            log::info!(
                "  Energy layer {} : {}",
                layer_index + 1,
                totals[offset + layer_index]
            );
        }
        offset += beam.energies.len();
    }
}

fn run_generation(config: &Config, session: &mut Session, pb_manager: &MultiProgress) -> bool {
    let calib = session.calib.expect("Calibration constants are loaded");

    // Load the plan
    log::info!("Loading plan from {}...", config.plan_path.to_string_lossy());
    let plan_path = config.plan_path.clone();
    let mode = config.extraction_mode();
    let plan_task = session
        .tasks
        .spawn(TaskKind::PlanLoad, move |_| {
            let doc = PlanDocument::from_file(&plan_path)?;
            PlanModel::extract(&doc, mode)
        })
        .expect("No plan load can be outstanding yet");
    let bar = pb_manager.add(ProgressBar::new(100));
    match wait_for(plan_task, &bar) {
        Some(Ok(plan)) => {
            log::info!(
                "Plan loaded: patient {}, {} beams, {} energy layers",
                plan.patient_id,
                plan.beams.len(),
                plan.layer_count()
            );
            session.plan = Some(plan);
        }
        Some(Err(e)) => {
            log::error!("{e}");
            return false;
        }
        None => return false,
    }

    // Load the log set
    log::info!(
        "Loading log files from {}...",
        config.log_path.to_string_lossy()
    );
    let log_path = config.log_path.clone();
    let pattern_only = config.pattern_only;
    let log_task = session
        .tasks
        .spawn(TaskKind::LogLoad, move |_| {
            LogSet::load(&log_path, &calib, pattern_only)
        })
        .expect("No log load can be outstanding yet");
    let bar = pb_manager.add(ProgressBar::new(100));
    match wait_for(log_task, &bar) {
        Some(Ok(logs)) => {
            log::info!("Decoded {} log layers", logs.layer_count());
            session.logs = Some(logs);
        }
        Some(Err(e)) => {
            log::error!("{e}");
            return false;
        }
        None => return false,
    }
    let layer_count = session.logs.as_ref().unwrap().layer_count();

    // Monitor ranges: from the table file or the manual list
    let mut ranges = match &config.range_table_path {
        Some(table_path) => {
            log::info!(
                "Loading monitor range table from {}...",
                table_path.to_string_lossy()
            );
            let table_path = table_path.clone();
            let range_task = session
                .tasks
                .spawn(TaskKind::RangeTableLoad, move |_| {
                    MonitorRangeTable::from_file(&table_path, layer_count)
                })
                .expect("No range table load can be outstanding yet");
            let bar = pb_manager.add(ProgressBar::new(100));
            match wait_for(range_task, &bar) {
                Some(Ok(table)) => table,
                Some(Err(e)) => {
                    log::error!("{e}");
                    return false;
                }
                None => return false,
            }
        }
        None => {
            if config.manual_ranges.len() != layer_count {
                log::error!(
                    "Config lists {} manual monitor range codes but the log set has {} layers",
                    config.manual_ranges.len(),
                    layer_count
                );
                return false;
            }
            let mut table = MonitorRangeTable::manual(layer_count);
            for (layer, &code) in config.manual_ranges.iter().enumerate() {
                if let Err(e) = table.set_code(layer, code) {
                    log::error!("{e}");
                    return false;
                }
            }
            table
        }
    };
    ranges.confirm();
    session.ranges = Some(ranges);

    // Generate
    let options = GenerateOptions {
        output_root: config.output_path.clone(),
        dose_divisor: config.dose_dividing_factor,
        apply_corrections: config.corrections_enabled(),
        material_include: config.material_include.clone(),
        template_dir: config.template_path.clone(),
    };
    let (plan, logs, range_table) = match session.generation_inputs() {
        Ok(inputs) => inputs,
        Err(e) => {
            log::error!("{e}");
            return false;
        }
    };
    let engine = config.engine;
    log::info!("Generating {engine:?} input decks...");

    let kind = match engine {
        EngineTarget::Topas => TaskKind::TopasGenerate,
        EngineTarget::Moqui => TaskKind::MoquiGenerate,
    };
    let generate_task = session
        .tasks
        .spawn(
            kind,
            move |progress| -> Result<GenerationResult, GenerateError> {
                match engine {
                    EngineTarget::Topas => {
                        topas::generate(&plan, &logs, &range_table, &options, progress)
                    }
                    EngineTarget::Moqui => {
                        moqui::generate(&plan, &logs, &range_table, &options, progress)
                    }
                }
            },
        )
        .expect("No generation can be outstanding yet");
    let bar = pb_manager.add(ProgressBar::new(100));
    match wait_for(generate_task, &bar) {
        Some(Ok(result)) => {
            log::info!("Input decks successfully generated.");
            report_particle_totals(session.plan.as_ref().unwrap(), &result);
            true
        }
        Some(Err(e)) => {
            log::error!("Generation failed with error: {e}");
            false
        }
        None => false,
    }
}

/// Load the log set synchronously for the side utilities.
fn load_logs_for_utility(config: &Config, calib: &CalibConfig) -> Option<LogSet> {
    match LogSet::load(&config.log_path, calib, config.pattern_only) {
        Ok(logs) => Some(logs),
        Err(e) => {
            log::error!("{e}");
            None
        }
    }
}

fn main() {
    // Create a cli
    let matches = Command::new("pqa_mcgen_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(
            Command::new("export")
                .about("Export one log layer as spreadsheet-style CSV files")
                .arg(
                    Arg::new("layer")
                        .short('l')
                        .long("layer")
                        .help("Zero-based layer index")
                        .action(ArgAction::Set),
                ),
        )
        .subcommand(
            Command::new("divide")
                .about("Split one pattern log into line-segment .ptn files")
                .arg(
                    Arg::new("layer")
                        .short('l')
                        .long("layer")
                        .help("Zero-based layer index")
                        .action(ArgAction::Set),
                ),
        )
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .help("Path to the job configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    LogWrapper::new(pb_manager.clone(), logger)
        .try_init()
        .expect("Could not create logging/progress!");

    // Parse the cli
    let config_path = PathBuf::from(matches.get_one::<String>("path").expect("We require args"));

    if let Some(("new", _)) = matches.subcommand() {
        log::info!(
            "Making a template config at {}...",
            config_path.to_string_lossy()
        );
        make_template_config(&config_path);
        log::info!("Done.");
        return;
    }

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    log::info!("Config successfully loaded.");
    log::info!("Plan Path: {}", config.plan_path.to_string_lossy());
    log::info!("Log Path: {}", config.log_path.to_string_lossy());
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!("Engine: {:?}", config.engine);
    log::info!("Dose dividing factor: {}", config.dose_dividing_factor);
    log::info!("Pattern only: {}", config.pattern_only);
    log::info!("Calibration mode: {}", config.calibration_mode);

    // The constants file gates everything downstream
    let calib = match CalibConfig::from_file(&config.calib_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };

    match matches.subcommand() {
        Some(("export", sub_matches)) => {
            let layer: usize = sub_matches
                .get_one::<String>("layer")
                .map(|v| v.parse().expect("Layer index must be a number"))
                .unwrap_or(0);
            let Some(logs) = load_logs_for_utility(&config, &calib) else {
                return;
            };
            if logs.pattern_logs.get(layer).is_none() {
                log::error!("The log set has no layer with index {layer}");
                return;
            }
            let session = Session::new(calib);
            let out_dir = config.output_path.clone();
            let task = session
                .tasks
                .spawn(TaskKind::SpreadsheetExport, move |_| {
                    let mut written = vec![export_pattern_csv(&logs.pattern_logs[layer], &out_dir)?];
                    if let Some(magnet) = logs.magnet_logs.get(layer) {
                        written.push(export_magnet_csv(magnet, &out_dir)?);
                    }
                    Ok::<_, ExportError>(written)
                })
                .expect("No export can be outstanding yet");
            let bar = pb_manager.add(ProgressBar::new(100));
            match wait_for(task, &bar) {
                Some(Ok(paths)) => {
                    for path in paths {
                        log::info!("Wrote {}", path.to_string_lossy());
                    }
                    log::info!("Done.");
                }
                Some(Err(e)) => log::error!("{e}"),
                None => (),
            }
        }
        Some(("divide", sub_matches)) => {
            let layer: usize = sub_matches
                .get_one::<String>("layer")
                .map(|v| v.parse().expect("Layer index must be a number"))
                .unwrap_or(0);
            let Some(logs) = load_logs_for_utility(&config, &calib) else {
                return;
            };
            if logs.pattern_logs.get(layer).is_none() || logs.magnet_logs.get(layer).is_none() {
                log::error!("Division needs a pattern/magnet pair at index {layer}");
                return;
            }
            let session = Session::new(calib);
            let out_dir = config.output_path.clone();
            let task = session
                .tasks
                .spawn(TaskKind::LogDivision, move |_| {
                    divide_pattern_log(
                        &logs.pattern_logs[layer],
                        &logs.magnet_logs[layer],
                        &calib,
                        &out_dir,
                    )
                })
                .expect("No division can be outstanding yet");
            let bar = pb_manager.add(ProgressBar::new(100));
            match wait_for(task, &bar) {
                Some(Ok(paths)) => {
                    log::info!("Wrote {} line segment files", paths.len());
                    log::info!("Done.");
                }
                Some(Err(e)) => log::error!("{e}"),
                None => (),
            }
        }
        _ => {
            let mut session = Session::new(calib);
            if run_generation(&config, &mut session, &pb_manager) {
                log::info!("Done.");
            }
        }
    }
}
