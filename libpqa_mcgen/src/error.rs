use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalibConfigError {
    #[error("Could not load calibration constants as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Calibration constants failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Calibration constant {0} is missing from the constants file")]
    MissingKey(&'static str),
    #[error("Calibration constant {key} has an unparsable value: {value}")]
    BadValue { key: String, value: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Config dose dividing factor {0} is not one of 1, 10, 100")]
    BadDivisor(u32),
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Could not load plan document as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Plan document failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Plan document failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
    #[error("Document modality is {0:?}; expected an ion treatment plan (RTPLAN)")]
    InvalidPlan(String),
    #[error("Beam {0:?} has no control points")]
    EmptyBeam(String),
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Could not open log file because {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Log file decoding failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("File {0:?} does not carry a recognized log extension")]
    UnknownFormat(PathBuf),
}

#[derive(Debug, Error)]
pub enum LogSetError {
    #[error("Log directory scan failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("No pattern log files were found in {0:?}")]
    NoPatternLogs(PathBuf),
    #[error("No magnet log files were found in {0:?}")]
    NoMagnetLogs(PathBuf),
    #[error("Found {patterns} pattern logs but {magnets} magnet logs; the sets must pair 1:1")]
    UnpairedLogs { patterns: usize, magnets: usize },
    #[error("Failed to decode {} log files in the set", .0.len())]
    DecodeFailures(Vec<(PathBuf, DecodeError)>),
}

#[derive(Debug, Error)]
pub enum RangeTableError {
    #[error("Could not load monitor range table as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Monitor range table failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Monitor range table failed to parse an integer: {0}")]
    ParsingError(#[from] std::num::ParseIntError),
    #[error("Monitor range table has {found} entries but the log set has {expected} layers")]
    LengthMismatch { expected: usize, found: usize },
    #[error("Monitor range table sentinel row must be zero, found {0}")]
    BadSentinel(i64),
    #[error("Monitor range code {0} is not one of 2, 3, 4, 5")]
    BadCode(i64),
    #[error("Monitor range settings are confirmed; reset them before editing")]
    Confirmed,
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Generation failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Plan model is not loaded")]
    PlanNotLoaded,
    #[error("Log set is not loaded")]
    LogsNotLoaded,
    #[error("Monitor range codes are not confirmed for the loaded log set")]
    RangesNotConfirmed,
    #[error("Plan has {plan} energy layers but the log set provides {logs}")]
    CountMismatch { plan: usize, logs: usize },
    #[error("Output folder {0:?} already exists; refusing to overwrite")]
    OutputExists(PathBuf),
    #[error("Template resource {0:?} is missing")]
    TemplateMissing(PathBuf),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Export failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("A {0} task is already running; wait for it to finish")]
    AlreadyRunning(&'static str),
}
