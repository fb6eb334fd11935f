use std::path::{Path, PathBuf};

use crate::calib_config::CalibConfig;
use crate::error::{DecodeError, LogSetError};
use crate::magnet_log::MagnetLog;
use crate::pattern_log::PatternLog;

const PATTERN_EXTENSION: &str = "ptn";
const MAGNET_EXTENSION: &str = "mgn";

/// A single decoded log of either format.
#[derive(Debug, Clone)]
pub enum DecodedLog {
    Pattern(PatternLog),
    Magnet(MagnetLog),
}

/// Decode one log file, selecting the format from its extension.
pub fn decode_log(path: &Path, calib: &CalibConfig) -> Result<DecodedLog, DecodeError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(PATTERN_EXTENSION) => Ok(DecodedLog::Pattern(PatternLog::decode(path, calib)?)),
        Some(MAGNET_EXTENSION) => Ok(DecodedLog::Magnet(MagnetLog::decode(path, calib)?)),
        _ => Err(DecodeError::UnknownFormat(path.to_path_buf())),
    }
}

/// The matched pattern/magnet log working set for one delivery.
///
/// Pattern and magnet logs are paired 1:1 by their position in the
/// filename-sorted lists; index `k` of both lists belongs to the `k`-th
/// energy layer of the flattened plan. In pattern-only mode the magnet list
/// stays empty.
#[derive(Debug, Clone, Default)]
pub struct LogSet {
    pub pattern_logs: Vec<PatternLog>,
    pub magnet_logs: Vec<MagnetLog>,
    pub pattern_only: bool,
}

impl LogSet {
    /// Scan a directory for log files and decode them all.
    ///
    /// File lists are sorted by name before pairing so the association with
    /// plan layers does not depend on the filesystem's enumeration order.
    /// Per-file decode failures do not abort the remaining files; they are
    /// collected and surfaced together once the batch finishes.
    pub fn load(
        directory: &Path,
        calib: &CalibConfig,
        pattern_only: bool,
    ) -> Result<Self, LogSetError> {
        let (pattern_paths, magnet_paths) = Self::scan_directory(directory, pattern_only)?;

        if pattern_paths.is_empty() {
            return Err(LogSetError::NoPatternLogs(directory.to_path_buf()));
        }
        if !pattern_only {
            if magnet_paths.is_empty() {
                return Err(LogSetError::NoMagnetLogs(directory.to_path_buf()));
            }
            if pattern_paths.len() != magnet_paths.len() {
                return Err(LogSetError::UnpairedLogs {
                    patterns: pattern_paths.len(),
                    magnets: magnet_paths.len(),
                });
            }
        }

        let total_bytes: u64 = pattern_paths
            .iter()
            .chain(magnet_paths.iter())
            .filter_map(|p| p.metadata().ok())
            .map(|m| m.len())
            .sum();
        log::info!(
            "Decoding {} log files ({})",
            pattern_paths.len() + magnet_paths.len(),
            human_bytes::human_bytes(total_bytes as f64)
        );

        let mut failures: Vec<(PathBuf, DecodeError)> = Vec::new();
        let mut pattern_logs = Vec::with_capacity(pattern_paths.len());
        for path in &pattern_paths {
            match PatternLog::decode(path, calib) {
                Ok(log) => pattern_logs.push(log),
                Err(e) => {
                    log::error!("Failed to decode {}: {e}", path.to_string_lossy());
                    failures.push((path.clone(), e));
                }
            }
        }
        let mut magnet_logs = Vec::with_capacity(magnet_paths.len());
        for path in &magnet_paths {
            match MagnetLog::decode(path, calib) {
                Ok(log) => magnet_logs.push(log),
                Err(e) => {
                    log::error!("Failed to decode {}: {e}", path.to_string_lossy());
                    failures.push((path.clone(), e));
                }
            }
        }

        if !failures.is_empty() {
            return Err(LogSetError::DecodeFailures(failures));
        }

        Ok(Self {
            pattern_logs,
            magnet_logs,
            pattern_only,
        })
    }

    /// Collect `.ptn` (and, unless pattern-only, `.mgn`) paths, sorted by
    /// file name.
    fn scan_directory(
        directory: &Path,
        pattern_only: bool,
    ) -> Result<(Vec<PathBuf>, Vec<PathBuf>), LogSetError> {
        let mut pattern_paths = Vec::new();
        let mut magnet_paths = Vec::new();
        for entry in directory.read_dir()? {
            let path = entry?.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some(PATTERN_EXTENSION) => pattern_paths.push(path),
                Some(MAGNET_EXTENSION) if !pattern_only => magnet_paths.push(path),
                _ => (),
            }
        }
        pattern_paths.sort();
        magnet_paths.sort();
        Ok((pattern_paths, magnet_paths))
    }

    /// Number of per-layer log entries available to pair with plan layers.
    pub fn layer_count(&self) -> usize {
        self.pattern_logs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::magnet_log::tests::write_log as write_mgn;
    use crate::pattern_log::tests::{test_calib, write_log as write_ptn};

    const PTN_ROW: [u16; 8] = [1100, 2100, 10, 20, 500, 600, 1, 1];
    const MGN_RECORD: (u32, [u16; 5]) = (1000, [0, 0, 120, 220, 1]);

    #[test]
    fn pairs_logs_sorted_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        // Written out of order on purpose
        write_ptn(dir.path(), "layer_02.ptn", &[PTN_ROW]);
        write_ptn(dir.path(), "layer_01.ptn", &[PTN_ROW, PTN_ROW]);
        write_mgn(dir.path(), "layer_02.mgn", &[MGN_RECORD]);
        write_mgn(dir.path(), "layer_01.mgn", &[MGN_RECORD, MGN_RECORD]);

        let set = LogSet::load(dir.path(), &test_calib(), false).unwrap();
        assert_eq!(set.layer_count(), 2);
        assert_eq!(set.pattern_logs[0].file_name(), "layer_01.ptn");
        assert_eq!(set.pattern_logs[0].rows(), 2);
        assert_eq!(set.magnet_logs[0].file_name(), "layer_01.mgn");
        assert_eq!(set.magnet_logs[0].rows(), 2);
    }

    #[test]
    fn rejects_mismatched_pattern_and_magnet_counts() {
        let dir = tempfile::tempdir().unwrap();
        write_ptn(dir.path(), "a.ptn", &[PTN_ROW]);
        write_ptn(dir.path(), "b.ptn", &[PTN_ROW]);
        write_mgn(dir.path(), "a.mgn", &[MGN_RECORD]);

        match LogSet::load(dir.path(), &test_calib(), false) {
            Err(LogSetError::UnpairedLogs { patterns, magnets }) => {
                assert_eq!((patterns, magnets), (2, 1));
            }
            other => panic!("expected UnpairedLogs, got {other:?}"),
        }
    }

    #[test]
    fn pattern_only_mode_ignores_magnet_files() {
        let dir = tempfile::tempdir().unwrap();
        write_ptn(dir.path(), "a.ptn", &[PTN_ROW]);

        let set = LogSet::load(dir.path(), &test_calib(), true).unwrap();
        assert_eq!(set.layer_count(), 1);
        assert!(set.magnet_logs.is_empty());
        assert!(set.pattern_only);
    }

    #[test]
    fn empty_directory_reports_no_pattern_logs() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            LogSet::load(dir.path(), &test_calib(), true),
            Err(LogSetError::NoPatternLogs(_))
        ));
    }

    #[test]
    fn single_file_decode_dispatches_on_the_extension() {
        let dir = tempfile::tempdir().unwrap();
        let ptn = write_ptn(dir.path(), "a.ptn", &[PTN_ROW]);
        let mgn = write_mgn(dir.path(), "a.mgn", &[MGN_RECORD]);
        assert!(matches!(
            decode_log(&ptn, &test_calib()),
            Ok(DecodedLog::Pattern(_))
        ));
        assert!(matches!(
            decode_log(&mgn, &test_calib()),
            Ok(DecodedLog::Magnet(_))
        ));

        let other = dir.path().join("notes.txt");
        std::fs::write(&other, "not a log").unwrap();
        assert!(matches!(
            decode_log(&other, &test_calib()),
            Err(DecodeError::UnknownFormat(_))
        ));
    }

    #[test]
    fn collects_per_file_failures_without_aborting_siblings() {
        let dir = tempfile::tempdir().unwrap();
        write_ptn(dir.path(), "good.ptn", &[PTN_ROW]);
        // A directory with a log extension opens but cannot be read
        std::fs::create_dir(dir.path().join("broken.ptn")).unwrap();

        match LogSet::load(dir.path(), &test_calib(), true) {
            Err(LogSetError::DecodeFailures(failures)) => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].0.ends_with("broken.ptn"));
            }
            other => panic!("expected DecodeFailures, got {other:?}"),
        }
    }
}
