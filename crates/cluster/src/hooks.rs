//! Files written into a job's working directory.

use orchestra_core::status::ScheduleStatus;
use orchestra_core::types::Id;

pub const JOB_SCRIPT: &str = "start.sh";
pub const NOTIFY_START_SCRIPT: &str = "notify_start.sh";
pub const NOTIFY_OK_SCRIPT: &str = "notify_ok.sh";
pub const NOTIFY_NOT_OK_SCRIPT: &str = "notify_not_ok.sh";
pub const OUTPUT_DIR: &str = "out";
/// Holds the backend job id once the job has been submitted.
pub const SUBMITTED_MARKER: &str = "submitted";

/// A lifecycle hook: which script, which batch dependency triggers it and
/// which status it reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hook {
    pub script: &'static str,
    pub dependency: &'static str,
    pub status: ScheduleStatus,
}

/// Start, success and failure hooks, in submission order.
pub const HOOKS: [Hook; 3] = [
    Hook {
        script: NOTIFY_START_SCRIPT,
        dependency: "after",
        status: ScheduleStatus::Running,
    },
    Hook {
        script: NOTIFY_OK_SCRIPT,
        dependency: "afterok",
        status: ScheduleStatus::Completed,
    },
    Hook {
        script: NOTIFY_NOT_OK_SCRIPT,
        dependency: "afternotok",
        status: ScheduleStatus::Failed,
    },
];

/// Body of a hook script that publishes `status` for the schedule through
/// `notify_command publish-status`.
pub fn render_notify_script(
    notify_command: &str,
    schedule_id: Id,
    job_id: Id,
    status: ScheduleStatus,
) -> String {
    format!(
        "#!/bin/bash\n\
         set -euo pipefail\n\
         \n\
         exec {notify_command} publish-status \\\n\
         \x20   --schedule-id {schedule_id} \\\n\
         \x20   --job-id {job_id} \\\n\
         \x20   --status {status}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_script_invokes_publish_status() {
        let (schedule_id, job_id) = (Id::new_v4(), Id::new_v4());
        let script =
            render_notify_script("orchestra-worker", schedule_id, job_id, ScheduleStatus::Running);

        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains("exec orchestra-worker publish-status"));
        assert!(script.contains(&format!("--schedule-id {schedule_id}")));
        assert!(script.contains(&format!("--job-id {job_id}")));
        assert!(script.trim_end().ends_with("--status RUNNING"));
    }

    #[test]
    fn hooks_cover_every_outcome() {
        let statuses: Vec<ScheduleStatus> = HOOKS.iter().map(|hook| hook.status).collect();
        assert_eq!(
            statuses,
            vec![
                ScheduleStatus::Running,
                ScheduleStatus::Completed,
                ScheduleStatus::Failed
            ]
        );
    }
}
