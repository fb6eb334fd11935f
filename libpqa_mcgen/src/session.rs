use crate::calib_config::CalibConfig;
use crate::error::GenerateError;
use crate::log_set::LogSet;
use crate::monitor_range::MonitorRangeTable;
use crate::plan::PlanModel;
use crate::task::TaskRegistry;

/// Owns the datasets shared between the processing tasks.
///
/// Each dataset is written once by the task that produced it and is
/// read-only to every other consumer afterwards; the task registry keeps two
/// tasks of the same kind from racing on a slot. Dropping a dataset (or
/// calling [`Session::reset`]) is the only way to replace it.
#[derive(Debug, Default)]
pub struct Session {
    pub calib: Option<CalibConfig>,
    pub plan: Option<PlanModel>,
    pub logs: Option<LogSet>,
    pub ranges: Option<MonitorRangeTable>,
    pub tasks: TaskRegistry,
}

impl Session {
    pub fn new(calib: CalibConfig) -> Self {
        Self {
            calib: Some(calib),
            ..Self::default()
        }
    }

    /// Drop every loaded dataset and monitor-range assignment. The
    /// calibration constants stay; they are process-wide and read-only.
    pub fn reset(&mut self) {
        self.plan = None;
        self.logs = None;
        self.ranges = None;
    }

    /// Drop only the monitor-range assignment so it can be rebuilt.
    pub fn reset_ranges(&mut self) {
        self.ranges = None;
    }

    /// Clone out the three datasets a generation task consumes, failing
    /// when one of them has not been loaded yet. Generation threads own
    /// their copies; the session's datasets stay readable meanwhile.
    pub fn generation_inputs(
        &self,
    ) -> Result<(PlanModel, LogSet, MonitorRangeTable), GenerateError> {
        let plan = self.plan.clone().ok_or(GenerateError::PlanNotLoaded)?;
        let logs = self.logs.clone().ok_or(GenerateError::LogsNotLoaded)?;
        let ranges = self
            .ranges
            .clone()
            .ok_or(GenerateError::RangesNotConfirmed)?;
        Ok((plan, logs, ranges))
    }
}
