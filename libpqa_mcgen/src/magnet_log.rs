use byteorder::{BigEndian, ReadBytesExt};
use ndarray::{Array2, ArrayView1};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::calib_config::CalibConfig;
use crate::error::DecodeError;

/// Bytes in one raw magnet record: a 32-bit time word plus five 16-bit words.
pub const RECORD_BYTES: usize = 14;
/// Logical columns per decoded row; the 4-byte time counts as one column.
pub const COLUMNS: usize = 6;

pub const COL_TIME: usize = 0;
pub const COL_X: usize = 3;
pub const COL_Y: usize = 4;
pub const COL_BEAM_ON: usize = 5;

/// One decoded magnet set-point log.
///
/// Rows are (time [us], reserved, reserved, X [mm], Y [mm], beam on/off).
/// Unlike the pattern log, the time column is read verbatim from the stream.
#[derive(Debug, Clone)]
pub struct MagnetLog {
    pub path: PathBuf,
    pub data: Array2<f32>,
}

impl MagnetLog {
    /// Decode a `.mgn` file. The stream is a repeating 14-byte big-endian
    /// record unit; any trailing partial record is discarded.
    pub fn decode(path: &Path, calib: &CalibConfig) -> Result<Self, DecodeError> {
        if !path.exists() {
            return Err(DecodeError::BadFilePath(path.to_path_buf()));
        }
        let mut reader = BufReader::new(File::open(path)?);

        let mut rows: Vec<[f32; COLUMNS]> = Vec::new();
        'records: loop {
            let time = match reader.read_u32::<BigEndian>() {
                Ok(t) => t,
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(DecodeError::IOError(e)),
            };
            let mut row = [0.0_f32; COLUMNS];
            row[COL_TIME] = time as f32;
            for column in row.iter_mut().skip(1) {
                match reader.read_u16::<BigEndian>() {
                    Ok(word) => *column = word as f32,
                    Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break 'records,
                    Err(e) => return Err(DecodeError::IOError(e)),
                }
            }
            rows.push(row);
        }

        let mut data = Array2::<f32>::zeros((rows.len(), COLUMNS));
        for (index, row) in rows.iter().enumerate() {
            for (column, &value) in row.iter().enumerate() {
                data[[index, column]] = value;
            }
            data[[index, COL_X]] = (row[COL_X] - calib.x_preset_offset) * calib.x_preset_gain;
            data[[index, COL_Y]] = (row[COL_Y] - calib.y_preset_offset) * calib.y_preset_gain;
        }

        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    /// Set-point times in microseconds, verbatim from the stream.
    pub fn times_us(&self) -> ArrayView1<'_, f32> {
        self.data.column(COL_TIME)
    }

    /// Set-point times converted to milliseconds.
    pub fn times_ms(&self) -> Vec<f32> {
        self.times_us().iter().map(|&t| t / 1000.0).collect()
    }

    pub fn x_positions(&self) -> ArrayView1<'_, f32> {
        self.data.column(COL_X)
    }

    pub fn y_positions(&self) -> ArrayView1<'_, f32> {
        self.data.column(COL_Y)
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pattern_log::tests::test_calib;
    use byteorder::WriteBytesExt;
    use std::io::Write;

    /// Encode (time, words[5]) records as a big-endian `.mgn` byte stream.
    pub(crate) fn encode_records(records: &[(u32, [u16; 5])]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for (time, words) in records {
            bytes.write_u32::<BigEndian>(*time).unwrap();
            for &word in words {
                bytes.write_u16::<BigEndian>(word).unwrap();
            }
        }
        bytes
    }

    pub(crate) fn write_log(dir: &Path, name: &str, records: &[(u32, [u16; 5])]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(&encode_records(records)).unwrap();
        path
    }

    #[test]
    fn decodes_shape_and_reads_time_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let records = [
            (0, [0, 0, 120, 220, 1]),
            (2500, [0, 0, 130, 230, 1]),
            (5000, [0, 0, 140, 240, 0]),
        ];
        let path = write_log(dir.path(), "a.mgn", &records);

        let log = MagnetLog::decode(&path, &test_calib()).unwrap();
        assert_eq!(log.data.dim(), (3, COLUMNS));
        assert_eq!(log.times_us()[1], 2500.0);
        assert!((log.times_ms()[1] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn row_count_is_floor_of_byte_length_over_record_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut bytes = encode_records(&[(0, [0, 0, 1, 2, 3]), (10, [0, 0, 4, 5, 6])]);
        bytes.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef, 0x00]); // partial third record
        let path = dir.path().join("ragged.mgn");
        std::fs::write(&path, &bytes).unwrap();

        let log = MagnetLog::decode(&path, &test_calib()).unwrap();
        assert_eq!(log.rows(), bytes.len() / RECORD_BYTES);
        assert_eq!(log.rows(), 2);
    }

    #[test]
    fn applies_preset_calibration_to_positions() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_log(dir.path(), "cal.mgn", &[(0, [7, 8, 120, 220, 1])]);
        let log = MagnetLog::decode(&path, &test_calib()).unwrap();

        assert!((log.data[[0, COL_X]] - (120.0 - 100.0) * 0.5).abs() < 1e-6);
        assert!((log.data[[0, COL_Y]] - (220.0 - 200.0) * 0.25).abs() < 1e-6);
        // Reserved words pass through untouched
        assert_eq!(log.data[[0, 1]], 7.0);
        assert_eq!(log.data[[0, 2]], 8.0);
    }
}
