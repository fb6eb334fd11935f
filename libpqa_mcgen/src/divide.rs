use byteorder::{BigEndian, WriteBytesExt};
use std::path::{Path, PathBuf};

use crate::calib_config::CalibConfig;
use crate::error::ExportError;
use crate::magnet_log::MagnetLog;
use crate::pattern_log::{PatternLog, COL_X, COL_X_SIZE, COL_Y, COL_Y_SIZE, RAW_WORDS_PER_ROW};

/// Split one pattern log into line-segment slices and re-encode each slice
/// as an individual `.ptn` file in the original big-endian layout.
///
/// Segment boundaries come from the magnet log's set-point times: segment
/// `k` spans set points `k+1` to `k+2` (the first set point is the move to
/// the line start and carries no irradiation). Calibrated columns are pushed
/// back through the inverse transform so the slices decode like the source
/// file. Returns the written paths.
pub fn divide_pattern_log(
    pattern: &PatternLog,
    magnet: &MagnetLog,
    calib: &CalibConfig,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, ExportError> {
    if magnet.rows() < 3 {
        return Ok(Vec::new());
    }

    let name = pattern.file_name();
    let segment_dir = out_dir.join(format!("{name}_linesegment"));
    std::fs::create_dir_all(&segment_dir)?;

    let boundaries = magnet.times_ms();
    let times = pattern.times();
    let mut written = Vec::new();
    for segment in 0..magnet.rows() - 2 {
        let start = boundaries[segment + 1];
        let end = boundaries[segment + 2];

        let rows: Vec<usize> = (0..pattern.rows())
            .filter(|&row| times[row] >= start && times[row] < end)
            .collect();
        if rows.is_empty() {
            continue;
        }

        let mut bytes = Vec::with_capacity(rows.len() * RAW_WORDS_PER_ROW * 2);
        for &row in &rows {
            for column in 1..=RAW_WORDS_PER_ROW {
                let value = pattern.data[[row, column]];
                let raw = match column {
                    COL_X => value / calib.x_pos_gain + calib.x_pos_offset,
                    COL_Y => value / calib.y_pos_gain + calib.y_pos_offset,
                    COL_X_SIZE => value / calib.x_pos_gain,
                    COL_Y_SIZE => value / calib.y_pos_gain,
                    _ => value,
                };
                bytes
                    .write_u16::<BigEndian>(raw.round() as u16)
                    .expect("writing to a Vec cannot fail");
            }
        }

        let path = segment_dir.join(format!("{name}_linesegment{}.ptn", segment + 1));
        std::fs::write(&path, bytes)?;
        written.push(path);
    }

    Ok(written)
}
