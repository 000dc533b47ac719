//! The "create schedule" saga.
//!
//! | # | Step                | forward                                         | backward        |
//! |---|---------------------|-------------------------------------------------|-----------------|
//! | 0 | `select_cluster`    | load the job and cluster pool, run the policy   | none            |
//! | 1 | `persist_schedule`  | insert a `PENDING` schedule on that cluster     | delete that row |
//! | 2 | `dispatch_schedule` | publish `dispatch_schedule` on the cluster topic | none            |
//!
//! Steps 1 and 2 take the job and cluster chosen by step 0 through
//! [`StepInput::output_at`] references, so nothing is re-read between steps.

use std::sync::Arc;

use async_trait::async_trait;
use orchestra_core::error::CoreError;
use orchestra_core::message::{DispatchPayload, Envelope};
use orchestra_core::types::Id;
use orchestra_db::models::cluster::Cluster;
use orchestra_db::models::job::Job;
use orchestra_db::models::schedule::{NewSchedule, Schedule};
use orchestra_db::{Store, StoreError};
use orchestra_flow::{Executor, Flow, FlowError, FlowExecError, Prop, Step, StepInput};
use orchestra_messenger::MessengerRegistry;
use orchestra_scheduler::Scheduler;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

pub const SCHEDULE_FLOW: &str = "create_schedule";

/// The requested job does not exist. User-facing.
pub const JOB_NOT_FOUND: &str = "job_not_found";
/// The cluster pool was empty. User-facing.
pub const NO_CLUSTER_AVAILABLE: &str = "no_cluster_available";
/// The selected cluster names a messenger that is not registered.
pub const UNKNOWN_MESSENGER: &str = "unknown_messenger";
pub const STORE_ERROR: &str = "store_error";
pub const PUBLISH_FAILED: &str = "publish_failed";

const STEP_SELECT_CLUSTER: &str = "select_cluster";
const STEP_PERSIST_SCHEDULE: &str = "persist_schedule";
const STEP_DISPATCH_SCHEDULE: &str = "dispatch_schedule";

/// Collaborators the saga's steps need.
#[derive(Clone)]
pub struct ScheduleContext {
    pub store: Arc<dyn Store>,
    pub scheduler: Arc<dyn Scheduler>,
    pub messengers: Arc<MessengerRegistry>,
}

/// Build the saga that schedules `job_id` on behalf of `owner_id`.
pub fn build_schedule_flow(
    ctx: &ScheduleContext,
    job_id: Id,
    owner_id: &str,
) -> Result<Flow, FlowError> {
    let mut flow = Flow::new(SCHEDULE_FLOW);

    let select = flow.add_step(
        SelectCluster {
            store: Arc::clone(&ctx.store),
            scheduler: Arc::clone(&ctx.scheduler),
        },
        vec![Prop::new("job id", json!(job_id)).into()],
    )?;

    let persist = flow.add_step(
        PersistSchedule {
            store: Arc::clone(&ctx.store),
        },
        vec![
            StepInput::output_at(select, 0, "job"),
            StepInput::output_at(select, 1, "selected cluster"),
            Prop::new("owner id", json!(owner_id)).into(),
        ],
    )?;

    flow.add_step(
        DispatchSchedule {
            messengers: Arc::clone(&ctx.messengers),
        },
        vec![
            StepInput::output_at(select, 0, "job"),
            StepInput::output_at(select, 1, "selected cluster"),
            StepInput::output_at(persist, 0, "schedule"),
        ],
    )?;

    Ok(flow)
}

/// Build and run the saga for one job.
pub async fn schedule_job(
    ctx: &ScheduleContext,
    job_id: Id,
    owner_id: &str,
) -> Result<Flow, FlowError> {
    let flow = build_schedule_flow(ctx, job_id, owner_id)?;
    Ok(Executor::new().run(flow).await)
}

/// The schedule a finished saga persisted, if it got that far.
pub fn persisted_schedule(flow: &Flow) -> Option<Schedule> {
    flow.forward_outputs().get(1)?.first()?.decode().ok()
}

// ---------------------------------------------------------------------------
// Prop helpers
// ---------------------------------------------------------------------------

fn input<T: DeserializeOwned>(props: &[Prop], index: usize, what: &str) -> Result<T, FlowExecError> {
    let prop = props.get(index).ok_or_else(|| {
        FlowExecError::internal(
            format!("Missing {what}"),
            format!("expected at least {} props, got {}", index + 1, props.len()),
        )
    })?;
    prop.decode()
        .map_err(|e| FlowExecError::internal(format!("Unable to decode {what}"), e))
}

fn output<T: Serialize>(description: &str, value: &T) -> Result<Prop, FlowExecError> {
    Prop::from_serialize(description, value)
        .map_err(|e| FlowExecError::internal(format!("Unable to encode {description}"), e))
}

fn store_error(description: String, err: StoreError) -> FlowExecError {
    FlowExecError::new(STORE_ERROR, description, err)
}

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

struct SelectCluster {
    store: Arc<dyn Store>,
    scheduler: Arc<dyn Scheduler>,
}

#[async_trait]
impl Step for SelectCluster {
    fn name(&self) -> &str {
        STEP_SELECT_CLUSTER
    }

    /// Outputs `[job, cluster]`.
    async fn forward(&self, inputs: &[Prop]) -> Result<Vec<Prop>, FlowExecError> {
        let job_id: Id = input(inputs, 0, "job id")?;

        let job = self
            .store
            .get_job(job_id)
            .await
            .map_err(|e| store_error(format!("Unable to load job {job_id}"), e))?
            .ok_or_else(|| {
                FlowExecError::new(
                    JOB_NOT_FOUND,
                    format!("Job {job_id} not found"),
                    CoreError::NotFound {
                        entity: "Job",
                        id: job_id,
                    },
                )
                .user_facing()
            })?;

        let pool = self
            .store
            .list_clusters()
            .await
            .map_err(|e| store_error("Unable to load clusters".to_string(), e))?;

        let cluster_id = self.scheduler.schedule(&job, &pool).map_err(|e| {
            FlowExecError::new(
                NO_CLUSTER_AVAILABLE,
                format!("No cluster available to run job {job_id}"),
                e,
            )
            .user_facing()
        })?;

        let cluster = pool
            .into_iter()
            .find(|cluster| cluster.id == cluster_id)
            .ok_or_else(|| {
                FlowExecError::internal(
                    format!("Scheduler {} picked a cluster outside the pool", self.scheduler.name()),
                    format!("cluster {cluster_id}"),
                )
            })?;

        tracing::info!(
            job_id = %job.id,
            cluster_id = %cluster.id,
            cluster = %cluster.name,
            scheduler = self.scheduler.name(),
            "Cluster selected",
        );
        Ok(vec![output("job", &job)?, output("selected cluster", &cluster)?])
    }
}

struct PersistSchedule {
    store: Arc<dyn Store>,
}

#[async_trait]
impl Step for PersistSchedule {
    fn name(&self) -> &str {
        STEP_PERSIST_SCHEDULE
    }

    async fn forward(&self, inputs: &[Prop]) -> Result<Vec<Prop>, FlowExecError> {
        let job: Job = input(inputs, 0, "job")?;
        let cluster: Cluster = input(inputs, 1, "selected cluster")?;
        let owner_id: String = input(inputs, 2, "owner id")?;

        let new_schedule = NewSchedule {
            id: Id::new_v4(),
            job_id: job.id,
            assigned_cluster_id: cluster.id,
            owner_id,
        };
        let schedule = self
            .store
            .insert_schedule(&new_schedule)
            .await
            .map_err(|e| store_error(format!("Unable to save schedule for job {}", job.id), e))?;

        tracing::info!(
            schedule_id = %schedule.id,
            job_id = %schedule.job_id,
            cluster_id = %schedule.assigned_cluster_id,
            "Schedule persisted",
        );
        Ok(vec![output("schedule", &schedule)?])
    }

    /// Deletes the row, so a failed dispatch leaves no `PENDING` schedule behind.
    async fn backward(&self, _inputs: &[Prop], outputs: &[Prop]) -> Result<Vec<Prop>, FlowExecError> {
        let schedule: Schedule = input(outputs, 0, "schedule")?;

        let removed = self
            .store
            .delete_schedule(schedule.id)
            .await
            .map_err(|e| store_error(format!("Unable to delete schedule {}", schedule.id), e))?;

        if removed {
            tracing::info!(schedule_id = %schedule.id, "Schedule deleted");
        } else {
            tracing::warn!(schedule_id = %schedule.id, "Schedule already gone");
        }
        Ok(vec![Prop::new("deleted schedule id", json!(schedule.id))])
    }
}

struct DispatchSchedule {
    messengers: Arc<MessengerRegistry>,
}

#[async_trait]
impl Step for DispatchSchedule {
    fn name(&self) -> &str {
        STEP_DISPATCH_SCHEDULE
    }

    async fn forward(&self, inputs: &[Prop]) -> Result<Vec<Prop>, FlowExecError> {
        let job: Job = input(inputs, 0, "job")?;
        let cluster: Cluster = input(inputs, 1, "selected cluster")?;
        let schedule: Schedule = input(inputs, 2, "schedule")?;

        let binding = cluster.transport_binding();
        let messenger = self.messengers.get(binding.messenger).ok_or_else(|| {
            FlowExecError::new(
                UNKNOWN_MESSENGER,
                format!(
                    "Cluster {} is bound to unknown messenger {:?}",
                    cluster.name, binding.messenger
                ),
                format!("registered messengers: {:?}", self.messengers.names()),
            )
        })?;

        let envelope = Envelope::dispatch(&DispatchPayload {
            job_id: job.id,
            schedule_id: schedule.id,
            script: job.script,
            cluster_capability_requirements: job.cluster_caps_req,
        })
        .map_err(|e| FlowExecError::internal("Unable to build dispatch envelope", e))?;

        let message_id = messenger
            .publish(&envelope, binding.topic)
            .await
            .map_err(|e| {
                FlowExecError::new(
                    PUBLISH_FAILED,
                    format!("Unable to dispatch schedule {}", schedule.id),
                    e,
                )
            })?;

        tracing::info!(
            schedule_id = %schedule.id,
            messenger = binding.messenger,
            topic = binding.topic,
            message_id = %message_id,
            "Schedule dispatched",
        );
        Ok(vec![Prop::new("message id", json!(message_id))])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
