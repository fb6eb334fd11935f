use std::collections::HashMap;
use std::path::Path;

use crate::error::CalibConfigError;

/// The nine scale constants used to interpret raw log words as physical
/// units: offset/gain pairs for the magnet-log set points (PRESET), the
/// pattern-log positions (POS), and the pattern-log time step.
///
/// They are loaded once from the machine constants file before any decoding
/// and are read-only afterwards; decoding cannot run without them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibConfig {
    pub x_preset_offset: f32,
    pub y_preset_offset: f32,
    pub x_preset_gain: f32,
    pub y_preset_gain: f32,
    pub time_gain: f32,
    pub x_pos_offset: f32,
    pub y_pos_offset: f32,
    pub x_pos_gain: f32,
    pub y_pos_gain: f32,
}

impl CalibConfig {
    /// Read the constants file. Lines are `KEY value`; blank lines and lines
    /// starting with `#` are skipped. All nine keys must be present.
    pub fn from_file(path: &Path) -> Result<Self, CalibConfigError> {
        if !path.exists() {
            return Err(CalibConfigError::BadFilePath(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let mut values = HashMap::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            let parsed = value
                .parse::<f32>()
                .map_err(|_| CalibConfigError::BadValue {
                    key: key.to_string(),
                    value: value.to_string(),
                })?;
            values.insert(key.to_string(), parsed);
        }

        let get = |key: &'static str| {
            values
                .get(key)
                .copied()
                .ok_or(CalibConfigError::MissingKey(key))
        };

        Ok(Self {
            x_preset_offset: get("XPRESETOFFSET")?,
            y_preset_offset: get("YPRESETOFFSET")?,
            x_preset_gain: get("XPRESETGAIN")?,
            y_preset_gain: get("YPRESETGAIN")?,
            time_gain: get("TIMEGAIN")?,
            x_pos_offset: get("XPOSOFFSET")?,
            y_pos_offset: get("YPOSOFFSET")?,
            x_pos_gain: get("XPOSGAIN")?,
            y_pos_gain: get("YPOSGAIN")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL_FILE: &str = "\
XPRESETOFFSET 16384.0
YPRESETOFFSET 16384.0
XPRESETGAIN 0.0244
YPRESETGAIN 0.0244

# pattern log section
TIMEGAIN 0.1
XPOSOFFSET 32768.0
YPOSOFFSET 32768.0
XPOSGAIN 0.0122
YPOSGAIN 0.0122
";

    #[test]
    fn parses_a_complete_constants_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL_FILE.as_bytes()).unwrap();
        let config = CalibConfig::from_file(file.path()).unwrap();
        assert_eq!(config.time_gain, 0.1);
        assert_eq!(config.x_preset_offset, 16384.0);
        assert_eq!(config.y_pos_gain, 0.0122);
    }

    #[test]
    fn rejects_a_file_with_a_missing_key() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"TIMEGAIN 0.1\n").unwrap();
        match CalibConfig::from_file(file.path()) {
            Err(CalibConfigError::MissingKey(_)) => (),
            other => panic!("expected MissingKey, got {other:?}"),
        }
    }

    #[test]
    fn rejects_a_missing_path() {
        let result = CalibConfig::from_file(Path::new("/nonexistent/constants.txt"));
        assert!(matches!(result, Err(CalibConfigError::BadFilePath(_))));
    }
}
