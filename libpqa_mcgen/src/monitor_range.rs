use std::path::Path;

use crate::error::RangeTableError;

/// Default code for manual entry; range 2 is the lowest clinical full scale.
const DEFAULT_CODE: u8 = 2;

/// Full-scale multiplier for a monitor range code.
///
/// Codes map to the dose monitor's full range setting:
/// (2) 470 nA, (3) 1400 nA, (4) 4200 nA, (5) 12600 nA.
pub fn range_factor(code: u8) -> Option<f64> {
    match code {
        2 => Some(1.0),
        3 => Some(2.978723404255319),
        4 => Some(8.936170212765957),
        5 => Some(26.80851063829787),
        _ => None,
    }
}

/// Per-log-file monitor range codes.
///
/// Built either manually (every layer starts at code 2) or from a tabular
/// file. Once confirmed the table is immutable until explicitly reset, so a
/// generation run always sees a frozen assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorRangeTable {
    codes: Vec<u8>,
    confirmed: bool,
}

impl MonitorRangeTable {
    /// Start a manual assignment with one default code per energy layer.
    pub fn manual(layer_count: usize) -> Self {
        Self {
            codes: vec![DEFAULT_CODE; layer_count],
            confirmed: false,
        }
    }

    /// Load codes from a tabular file: one numeric cell per row for rows
    /// 1..N, then a sentinel row that must be zero. The row count has to
    /// match the layer count exactly.
    pub fn from_file(path: &Path, layer_count: usize) -> Result<Self, RangeTableError> {
        if !path.exists() {
            return Err(RangeTableError::BadFilePath(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path)?;
        let mut cells = Vec::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            cells.push(line.parse::<i64>()?);
        }

        if cells.len() != layer_count + 1 {
            return Err(RangeTableError::LengthMismatch {
                expected: layer_count,
                found: cells.len().saturating_sub(1),
            });
        }
        let sentinel = cells.pop().unwrap();
        if sentinel != 0 {
            return Err(RangeTableError::BadSentinel(sentinel));
        }

        let mut codes = Vec::with_capacity(cells.len());
        for cell in cells {
            let code = u8::try_from(cell).map_err(|_| RangeTableError::BadCode(cell))?;
            if range_factor(code).is_none() {
                return Err(RangeTableError::BadCode(cell));
            }
            codes.push(code);
        }

        Ok(Self {
            codes,
            confirmed: false,
        })
    }

    /// Change one layer's code. Rejected after the table is confirmed.
    pub fn set_code(&mut self, layer: usize, code: u8) -> Result<(), RangeTableError> {
        if self.confirmed {
            return Err(RangeTableError::Confirmed);
        }
        if range_factor(code).is_none() {
            return Err(RangeTableError::BadCode(code as i64));
        }
        if let Some(slot) = self.codes.get_mut(layer) {
            *slot = code;
        }
        Ok(())
    }

    /// Freeze the assignment for generation.
    pub fn confirm(&mut self) {
        self.confirmed = true;
    }

    /// Lift the freeze so codes can be edited or reloaded.
    pub fn reset(&mut self) {
        self.confirmed = false;
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn code(&self, layer: usize) -> Option<u8> {
        self.codes.get(layer).copied()
    }

    /// Multiplier for one layer's code.
    pub fn factor(&self, layer: usize) -> Option<f64> {
        self.code(layer).and_then(range_factor)
    }
}
