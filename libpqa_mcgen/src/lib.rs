//! # pqa_mcgen
//!
//! pqa_mcgen turns machine-recorded scanning delivery logs and a treatment
//! plan into per-energy-layer input decks for Monte Carlo dose engines, for
//! proton-therapy pretreatment QA. It decodes the two proprietary big-endian
//! log formats written by the scanning control system (`.ptn` spot-pattern
//! logs and `.mgn` magnet set-point logs), extracts an ordered beam/energy-
//! layer model from the clinical plan, converts raw dose-monitor counts to
//! particle counts through the commissioned correction curves, interpolates
//! spot optics and dipole fields, and writes one input tree per patient for
//! either the TOPAS or the MOQUI transport engine.
//!
//! ## Inputs
//!
//! - A machine constants file (`KEY value` lines) with the nine offset/gain
//!   constants used to turn raw log words into mm and ms. Loaded once at
//!   startup; nothing decodes without it.
//! - A directory of `.ptn` (and, unless pattern-only mode is on, `.mgn`) log
//!   files, one pair per energy layer, paired with the plan by filename
//!   order.
//! - The extracted clinical plan document as a YAML tree (the DICOM reading
//!   happens upstream).
//! - A monitor range assignment: one code in 2-5 per log file, entered
//!   manually or loaded from a one-column table with a zero sentinel row.
//!
//! ## Output
//!
//! A directory tree rooted at `<output>/<patientID>/Field<i>/`, holding
//! either per-layer TOPAS folders (copied base decks plus a generated
//! control file and a per-field `run.sh`) or per-layer MOQUI time-series
//! files. An existing patient folder is never overwritten. Spreadsheet-style
//! CSV exports and line-segment log division are available as side
//! utilities.
//!
//! ## Tasks
//!
//! Loading and generation run as background tasks behind typed handles with
//! their own progress fractions; at most one task of each kind may run at a
//! time. See [`task::TaskRegistry`]. The CLI in `pqa_mcgen_cli` is a thin
//! polling loop over these handles.
pub mod calib_config;
pub mod config;
pub mod correction;
pub mod divide;
pub mod error;
pub mod export;
pub mod generate;
pub mod interpolate;
pub mod log_set;
pub mod magnet_field;
pub mod magnet_log;
pub mod monitor_range;
pub mod moqui;
pub mod optics;
pub mod pattern_log;
pub mod plan;
pub mod plan_document;
pub mod session;
pub mod task;
pub mod topas;
