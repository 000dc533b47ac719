//! Batch scheduler status records.

use orchestra_core::status::ScheduleStatus;

/// Number of header lines the status command prints before the records.
const HEADER_LINES: usize = 2;

/// One line of status output: the backend state and exit code of one
/// attempt or job step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatusRecord {
    pub state: String,
    pub exit_code: String,
}

impl JobStatusRecord {
    /// Map the backend state onto a schedule status. Returns `None` for
    /// states this build does not recognise.
    pub fn schedule_status(&self) -> Option<ScheduleStatus> {
        // sacct marks truncated states with a trailing `+`.
        match self.state.trim_end_matches('+') {
            "PENDING" | "CONFIGURING" | "REQUEUED" | "REQUEUE_HOLD" | "RESIZING" | "SUSPENDED" => {
                Some(ScheduleStatus::Pending)
            }
            "RUNNING" | "COMPLETING" | "STAGE_OUT" => Some(ScheduleStatus::Running),
            "COMPLETED" => Some(ScheduleStatus::Completed),
            "FAILED" | "CANCELLED" | "TIMEOUT" | "NODE_FAIL" | "OUT_OF_MEMORY" | "BOOT_FAIL"
            | "DEADLINE" | "PREEMPTED" | "REVOKED" => Some(ScheduleStatus::Failed),
            _ => None,
        }
    }
}

/// Parse status command output, skipping the two header lines.
///
/// A state may span several tokens (`CANCELLED by 1000`); the first token
/// is the state and the last is the exit code.
pub fn parse_status_output(stdout: &str) -> Vec<JobStatusRecord> {
    stdout
        .lines()
        .skip(HEADER_LINES)
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            let state = tokens.first()?;
            let exit_code = if tokens.len() > 1 {
                tokens[tokens.len() - 1]
            } else {
                ""
            };
            Some(JobStatusRecord {
                state: state.to_string(),
                exit_code: exit_code.to_string(),
            })
        })
        .collect()
}

/// Status of the job as a whole: the first record describes the
/// allocation, later ones its steps.
pub fn overall_status(records: &[JobStatusRecord]) -> Option<(ScheduleStatus, &JobStatusRecord)> {
    let record = records.first()?;
    record.schedule_status().map(|status| (status, record))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
