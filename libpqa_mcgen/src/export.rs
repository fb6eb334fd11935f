use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::error::ExportError;
use crate::magnet_log::MagnetLog;
use crate::pattern_log::PatternLog;

/// Write one pattern log as a spreadsheet-style CSV with columns
/// (time [ms], X position, Y position, MU count).
///
/// The file lands next to the requested directory as `<stem>_ptn.csv`;
/// returns the written path.
pub fn export_pattern_csv(log: &PatternLog, out_dir: &Path) -> Result<PathBuf, ExportError> {
    let stem = log
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "pattern".to_string());
    let out_path = out_dir.join(format!("{stem}_ptn.csv"));

    let mut text = String::from("Time (ms),X Position,Y Position,MU count\n");
    let times = log.times();
    let xs = log.x_positions();
    let ys = log.y_positions();
    let doses = log.dose_monitor();
    for row in 0..log.rows() {
        writeln!(
            text,
            "{:.6},{:.6},{:.6},{}",
            times[row], xs[row], ys[row], doses[row] as i64
        )
        .expect("writing to a String cannot fail");
    }

    std::fs::write(&out_path, text)?;
    Ok(out_path)
}

/// Write one magnet log as a spreadsheet-style CSV with columns
/// (segment number, time [ms], X position, Y position).
///
/// Times are converted from microseconds to milliseconds; segments number
/// the set points from 1.
pub fn export_magnet_csv(log: &MagnetLog, out_dir: &Path) -> Result<PathBuf, ExportError> {
    let stem = log
        .path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "magnet".to_string());
    let out_path = out_dir.join(format!("{stem}_mgn.csv"));

    let mut text = String::from("Segment number,Time (ms),X Position,Y Position\n");
    let times_ms = log.times_ms();
    let xs = log.x_positions();
    let ys = log.y_positions();
    for row in 0..log.rows() {
        writeln!(
            text,
            "{},{:.6},{:.6},{:.6}",
            row + 1,
            times_ms[row],
            xs[row],
            ys[row]
        )
        .expect("writing to a String cannot fail");
    }

    std::fs::write(&out_path, text)?;
    Ok(out_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::magnet_log::tests::write_log as write_mgn;
    use crate::magnet_log::MagnetLog;
    use crate::pattern_log::tests::{test_calib, write_log as write_ptn};

    #[test]
    fn pattern_export_has_a_header_and_one_row_per_sample() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_ptn(
            dir.path(),
            "delivery.ptn",
            &[
                [1100, 2100, 10, 20, 500, 600, 1, 1],
                [1200, 2200, 11, 21, 700, 800, 1, 1],
            ],
        );
        let log = PatternLog::decode(&path, &test_calib()).unwrap();

        let out = export_pattern_csv(&log, dir.path()).unwrap();
        assert!(out.ends_with("delivery_ptn.csv"));
        let contents = std::fs::read_to_string(out).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Time (ms),X Position,Y Position,MU count");
        assert!(lines[1].ends_with(",500"));
    }

    #[test]
    fn magnet_export_numbers_segments_and_converts_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_mgn(
            dir.path(),
            "delivery.mgn",
            &[(1000, [0, 0, 120, 220, 1]), (2500, [0, 0, 130, 230, 1])],
        );
        let log = MagnetLog::decode(&path, &test_calib()).unwrap();

        let out = export_magnet_csv(&log, dir.path()).unwrap();
        let contents = std::fs::read_to_string(out).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "Segment number,Time (ms),X Position,Y Position");
        assert!(lines[1].starts_with("1,1.000000,"));
        assert!(lines[2].starts_with("2,2.500000,"));
    }
}
