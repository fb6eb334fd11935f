use byteorder::{BigEndian, ReadBytesExt};
use ndarray::{Array2, ArrayView1};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::calib_config::CalibConfig;
use crate::error::DecodeError;

/// Number of 16-bit words in one raw pattern record.
pub const RAW_WORDS_PER_ROW: usize = 8;
/// Columns of a decoded row: the raw record plus the synthesized time.
pub const COLUMNS: usize = RAW_WORDS_PER_ROW + 1;

pub const COL_TIME: usize = 0;
pub const COL_X: usize = 1;
pub const COL_Y: usize = 2;
pub const COL_X_SIZE: usize = 3;
pub const COL_Y_SIZE: usize = 4;
pub const COL_DOSE1: usize = 5;
pub const COL_DOSE2: usize = 6;
pub const COL_LAYER: usize = 7;
pub const COL_BEAM_ON: usize = 8;

/// One decoded spot-pattern log.
///
/// Rows are (time [ms], X [mm], Y [mm], X size [mm], Y size [mm],
/// dose monitor 1 [a.u.], dose monitor 2 [a.u.], layer number, beam on/off).
/// The time column is synthesized as row index times the configured time
/// gain; it is not present in the byte stream.
#[derive(Debug, Clone)]
pub struct PatternLog {
    pub path: PathBuf,
    pub data: Array2<f32>,
}

impl PatternLog {
    /// Decode a `.ptn` file. The stream is a flat sequence of big-endian
    /// 16-bit words; any trailing partial record is discarded.
    pub fn decode(path: &Path, calib: &CalibConfig) -> Result<Self, DecodeError> {
        if !path.exists() {
            return Err(DecodeError::BadFilePath(path.to_path_buf()));
        }
        let mut reader = BufReader::new(File::open(path)?);

        let mut words: Vec<f32> = Vec::new();
        loop {
            match reader.read_u16::<BigEndian>() {
                Ok(word) => words.push(word as f32),
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(DecodeError::IOError(e)),
            }
        }

        let rows = words.len() / RAW_WORDS_PER_ROW;
        let mut data = Array2::<f32>::zeros((rows, COLUMNS));
        for row in 0..rows {
            data[[row, COL_TIME]] = row as f32 * calib.time_gain;
            for word in 0..RAW_WORDS_PER_ROW {
                data[[row, word + 1]] = words[row * RAW_WORDS_PER_ROW + word];
            }
        }

        // Position and size calibration in place
        for row in 0..rows {
            data[[row, COL_X]] = (data[[row, COL_X]] - calib.x_pos_offset) * calib.x_pos_gain;
            data[[row, COL_Y]] = (data[[row, COL_Y]] - calib.y_pos_offset) * calib.y_pos_gain;
            data[[row, COL_X_SIZE]] *= calib.x_pos_gain;
            data[[row, COL_Y_SIZE]] *= calib.y_pos_gain;
        }

        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn times(&self) -> ArrayView1<'_, f32> {
        self.data.column(COL_TIME)
    }

    pub fn x_positions(&self) -> ArrayView1<'_, f32> {
        self.data.column(COL_X)
    }

    pub fn y_positions(&self) -> ArrayView1<'_, f32> {
        self.data.column(COL_Y)
    }

    /// Dose monitor 1, the MU-count channel used for particle conversion.
    pub fn dose_monitor(&self) -> ArrayView1<'_, f32> {
        self.data.column(COL_DOSE1)
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
