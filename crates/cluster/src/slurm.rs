//! Slurm backend.
//!
//! Each dispatch gets a working directory `<jobs_dir>/<job_id>/<schedule_id>`
//! holding `start.sh`, the three notify hooks and an `out/` directory. The
//! main job is submitted with `sbatch --output <out> start.sh`; each hook is
//! then submitted with a dependency on it (`after`, `afterok`,
//! `afternotok`), so Slurm itself reports RUNNING, COMPLETED or FAILED by
//! invoking `publish-status` on the worker binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use orchestra_core::config::{env_opt, env_or, env_parse, ConfigError};
use orchestra_core::message::DispatchPayload;

use crate::command::{run_command, split_command_line};
use crate::hooks::{self, HOOKS, JOB_SCRIPT, OUTPUT_DIR, SUBMITTED_MARKER};
use crate::status::{parse_status_output, JobStatusRecord};
use crate::{ClusterBackend, ClusterError};

/// Earliest start time passed to the status command so old jobs are found.
const STATUS_START_TIME: &str = "1970-01-02";

#[derive(Debug, Clone, PartialEq)]
pub struct SlurmConfig {
    /// Root of the per-job working directories.
    pub jobs_dir: PathBuf,
    /// Submit command line, e.g. `sbatch` or `sbatch --partition=gpu`.
    pub submit_command: String,
    pub status_command: String,
    /// Command the hook scripts run; must accept `publish-status`.
    pub notify_command: String,
    pub command_timeout: Duration,
}

impl SlurmConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                                   |
    /// |------------------------|-------------------------------------------|
    /// | `JOBS_DIR`             | `$XDG_DATA_HOME/orchestra/jobs`           |
    /// | `SUBMIT_COMMAND`       | `sbatch`                                  |
    /// | `STATUS_COMMAND`       | `sacct`                                   |
    /// | `NOTIFY_COMMAND`       | `orchestra-worker`                        |
    /// | `COMMAND_TIMEOUT_SECS` | `60`                                      |
    pub fn from_env() -> Result<Self, ConfigError> {
        let jobs_dir = match env_opt("JOBS_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_data_home().join("orchestra").join("jobs"),
        };
        Ok(Self {
            jobs_dir,
            submit_command: env_or("SUBMIT_COMMAND", "sbatch"),
            status_command: env_or("STATUS_COMMAND", "sacct"),
            notify_command: env_or("NOTIFY_COMMAND", "orchestra-worker"),
            command_timeout: Duration::from_secs(env_parse("COMMAND_TIMEOUT_SECS", 60u64)?),
        })
    }
}

fn default_data_home() -> PathBuf {
    if let Some(dir) = env_opt("XDG_DATA_HOME") {
        return PathBuf::from(dir);
    }
    match env_opt("HOME") {
        Some(home) => PathBuf::from(home).join(".local").join("share"),
        None => PathBuf::from("."),
    }
}

pub struct SlurmCluster {
    config: SlurmConfig,
}

impl SlurmCluster {
    pub const NAME: &'static str = "slurm";

    pub fn new(config: SlurmConfig) -> Self {
        Self { config }
    }

    pub fn job_dir(&self, dispatch: &DispatchPayload) -> PathBuf {
        self.config
            .jobs_dir
            .join(dispatch.job_id.to_string())
            .join(dispatch.schedule_id.to_string())
    }

    /// `<submit command> [extra args] --output <out> <script>`; returns the job id.
    async fn sbatch(&self, extra: &[String], out_dir: &Path, script: &Path) -> Result<String, ClusterError> {
        let mut argv = split_command_line(&self.config.submit_command);
        argv.extend(extra.iter().cloned());
        argv.push("--output".to_string());
        argv.push(out_dir.display().to_string());
        argv.push(script.display().to_string());

        let output = run_command(&argv, self.config.command_timeout).await?;
        parse_job_id(&output.stdout)
            .ok_or_else(|| ClusterError::UnparseableSubmitOutput(output.stdout.clone()))
    }
}

/// Job id from submit output: the last token (`Submitted batch job 45`),
/// with any `;cluster` suffix from `--parsable` removed.
pub(crate) fn parse_job_id(stdout: &str) -> Option<String> {
    let token = stdout.split_whitespace().last()?;
    let id = token.split(';').next().unwrap_or(token);
    (!id.is_empty()).then(|| id.to_string())
}

async fn write_file(path: &Path, contents: &str) -> Result<(), ClusterError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| ClusterError::io(path, e))
}

#[cfg(unix)]
async fn make_executable(path: &Path) -> Result<(), ClusterError> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|e| ClusterError::io(path, e))
}

#[cfg(not(unix))]
async fn make_executable(_path: &Path) -> Result<(), ClusterError> {
    Ok(())
}

#[async_trait]
impl ClusterBackend for SlurmCluster {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn prepare_job(&self, dispatch: &DispatchPayload) -> Result<PathBuf, ClusterError> {
        let dir = self.job_dir(dispatch);
        let out_dir = dir.join(OUTPUT_DIR);
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|e| ClusterError::io(&out_dir, e))?;

        let script = dir.join(JOB_SCRIPT);
        write_file(&script, &dispatch.script).await?;
        make_executable(&script).await?;

        for hook in HOOKS {
            let path = dir.join(hook.script);
            let body = hooks::render_notify_script(
                &self.config.notify_command,
                dispatch.schedule_id,
                dispatch.job_id,
                hook.status,
            );
            write_file(&path, &body).await?;
            make_executable(&path).await?;
        }

        tracing::debug!(
            schedule_id = %dispatch.schedule_id,
            job_id = %dispatch.job_id,
            dir = %dir.display(),
            "Prepared job directory",
        );
        Ok(dir)
    }

    async fn submit_job(&self, dispatch: &DispatchPayload) -> Result<String, ClusterError> {
        let dir = self.job_dir(dispatch);
        let marker = dir.join(SUBMITTED_MARKER);

        // A redelivered dispatch must not submit the job twice.
        if let Ok(existing) = tokio::fs::read_to_string(&marker).await {
            let existing = existing.trim().to_string();
            if !existing.is_empty() {
                tracing::info!(
                    schedule_id = %dispatch.schedule_id,
                    external_id = %existing,
                    "Schedule already submitted, skipping",
                );
                return Ok(existing);
            }
        }

        let dir = self.prepare_job(dispatch).await?;
        let out_dir = dir.join(OUTPUT_DIR);

        let main_id = self.sbatch(&[], &out_dir, &dir.join(JOB_SCRIPT)).await?;
        write_file(&marker, &main_id).await?;
        tracing::info!(
            schedule_id = %dispatch.schedule_id,
            job_id = %dispatch.job_id,
            external_id = %main_id,
            "Submitted job",
        );

        // The main job is already queued; a missing hook only loses push
        // notifications, which `poll` can recover.
        for hook in HOOKS {
            let dependency = format!("--dependency={}:{main_id}", hook.dependency);
            match self.sbatch(&[dependency], &out_dir, &dir.join(hook.script)).await {
                Ok(hook_id) => tracing::debug!(
                    external_id = %main_id,
                    hook = hook.script,
                    hook_id = %hook_id,
                    "Submitted notify hook",
                ),
                Err(e) => tracing::error!(
                    schedule_id = %dispatch.schedule_id,
                    external_id = %main_id,
                    hook = hook.script,
                    error = %e,
                    "Failed to submit notify hook",
                ),
            }
        }

        Ok(main_id)
    }

    async fn get_job_status(&self, external_id: &str) -> Result<Vec<JobStatusRecord>, ClusterError> {
        let mut argv = split_command_line(&self.config.status_command);
        argv.extend(
            ["-S", STATUS_START_TIME, "--format", "State,ExitCode", "-j", external_id]
                .into_iter()
                .map(str::to_string),
        );
        let output = run_command(&argv, self.config.command_timeout).await?;
        Ok(parse_status_output(&output.stdout))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
