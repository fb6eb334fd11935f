use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::plan::ExtractionMode;

/// Which simulation engine the generated input decks target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineTarget {
    Topas,
    Moqui,
}

/// Structure representing a processing job. Contains pathing and generation
/// options. Configs are serializable and deserializable to YAML using serde
/// and serde_yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Extracted clinical plan document (YAML tree).
    pub plan_path: PathBuf,
    /// Directory holding the `.ptn` (and `.mgn`) log files.
    pub log_path: PathBuf,
    /// Machine constants file (`KEY value` lines).
    pub calib_path: PathBuf,
    /// Monitor range table; when absent, `manual_ranges` is used instead.
    pub range_table_path: Option<PathBuf>,
    /// Manual monitor range codes, one per energy layer in log order.
    pub manual_ranges: Vec<u8>,
    /// Directory under which the per-patient output tree is created.
    pub output_path: PathBuf,
    /// Folder holding the TOPAS base-code templates.
    pub template_path: PathBuf,
    pub engine: EngineTarget,
    /// Dose monitor dividing factor; 1, 10 or 100.
    pub dose_dividing_factor: u32,
    /// Run without magnet logs.
    pub pattern_only: bool,
    pub calibration_mode: bool,
    /// Apply the correction curves in calibration mode.
    pub calibration_use_corrections: bool,
    /// Distinguish repeated energy layers in calibration mode.
    pub calibration_multi_layer: bool,
    /// Optional material-model include written at the top of each control
    /// file (e.g. a HU-to-material conversion).
    pub material_include: Option<String>,
}

impl Default for Config {
    /// Generate a new Config object. Paths are empty/invalid placeholders.
    fn default() -> Self {
        Self {
            plan_path: PathBuf::from("None"),
            log_path: PathBuf::from("None"),
            calib_path: PathBuf::from("None"),
            range_table_path: None,
            manual_ranges: Vec::new(),
            output_path: PathBuf::from("."),
            template_path: PathBuf::from("./topas_base_code"),
            engine: EngineTarget::Topas,
            dose_dividing_factor: 10,
            pattern_only: false,
            calibration_mode: false,
            calibration_use_corrections: true,
            calibration_multi_layer: false,
            material_include: None,
        }
    }
}

impl Config {
    /// Read the configuration in a YAML file.
    /// Returns a Config if successful.
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;
        let config = serde_yaml::from_str::<Self>(&yaml_str)?;
        if !matches!(config.dose_dividing_factor, 1 | 10 | 100) {
            return Err(ConfigError::BadDivisor(config.dose_dividing_factor));
        }
        Ok(config)
    }

    /// Plan extraction mode implied by the calibration toggles.
    pub fn extraction_mode(&self) -> ExtractionMode {
        if !self.calibration_mode {
            ExtractionMode::Production
        } else if self.calibration_multi_layer {
            ExtractionMode::CalibrationMerged
        } else {
            ExtractionMode::CalibrationPerPoint
        }
    }

    /// Whether the correction curves apply to this job (always in
    /// production, toggled in calibration mode).
    pub fn corrections_enabled(&self) -> bool {
        !self.calibration_mode || self.calibration_use_corrections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_round_trips_through_yaml() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        let config = Config::read_config_file(file.path()).unwrap();
        assert_eq!(config.dose_dividing_factor, 10);
        assert_eq!(config.engine, EngineTarget::Topas);
    }

    #[test]
    fn rejects_an_unknown_dividing_factor() {
        let mut config = Config::default();
        config.dose_dividing_factor = 42;
        let yaml = serde_yaml::to_string(&config).unwrap();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        assert!(matches!(
            Config::read_config_file(file.path()),
            Err(ConfigError::BadDivisor(42))
        ));
    }

    #[test]
    fn calibration_toggles_select_the_extraction_mode() {
        let mut config = Config::default();
        assert_eq!(config.extraction_mode(), ExtractionMode::Production);
        config.calibration_mode = true;
        assert_eq!(config.extraction_mode(), ExtractionMode::CalibrationPerPoint);
        config.calibration_multi_layer = true;
        assert_eq!(config.extraction_mode(), ExtractionMode::CalibrationMerged);
    }
}
