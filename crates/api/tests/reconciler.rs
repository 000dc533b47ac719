//! Status reconciliation against the in-memory store and messenger.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use common::Harness;
use orchestra_api::engine::StatusReconciler;
use orchestra_core::message::{Envelope, StatusUpdatePayload};
use orchestra_core::status::ScheduleStatus;
use orchestra_core::types::Id;
use orchestra_db::models::cluster::{Cluster, NewCluster};
use orchestra_db::models::job::{Job, NewJob};
use orchestra_db::models::schedule::{NewSchedule, Schedule, ScheduleFilter, ScheduleUpdate};
use orchestra_db::{MemoryStore, Store, StoreError};
use orchestra_messenger::{MemoryMessenger, MessageHandler, Messenger};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

async fn pending_schedule(harness: &Harness) -> Schedule {
    let job = harness.job("j1").await;
    let cluster = harness.cluster("c1", "cluster-c1").await;
    harness
        .store
        .insert_schedule(&NewSchedule {
            id: Id::new_v4(),
            job_id: job.id,
            assigned_cluster_id: cluster.id,
            owner_id: "u1".to_string(),
        })
        .await
        .unwrap()
}

fn update(schedule: &Schedule, status: ScheduleStatus) -> Envelope {
    Envelope::status_update(&StatusUpdatePayload {
        schedule_id: schedule.id,
        job_id: schedule.job_id,
        status,
        exit_info: None,
    })
    .unwrap()
}

async fn status_of(harness: &Harness, id: Id) -> ScheduleStatus {
    harness.store.get_schedule(id).await.unwrap().unwrap().status
}

// ---------------------------------------------------------------------------
// Test: RUNNING then COMPLETED ends COMPLETED; a replayed RUNNING is ignored
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_only_moves_forward() {
    let harness = Harness::new();
    let schedule = pending_schedule(&harness).await;
    let reconciler = StatusReconciler::new(harness.store.clone());

    reconciler.handle(update(&schedule, ScheduleStatus::Running)).await.unwrap();
    assert_eq!(status_of(&harness, schedule.id).await, ScheduleStatus::Running);

    reconciler.handle(update(&schedule, ScheduleStatus::Completed)).await.unwrap();
    assert_eq!(status_of(&harness, schedule.id).await, ScheduleStatus::Completed);

    let replay = reconciler
        .on_status_message(&update(&schedule, ScheduleStatus::Running))
        .await
        .unwrap();
    assert!(replay.is_none());
    assert_eq!(status_of(&harness, schedule.id).await, ScheduleStatus::Completed);
}

#[tokio::test]
async fn duplicate_update_is_a_no_op() {
    let harness = Harness::new();
    let schedule = pending_schedule(&harness).await;
    let reconciler = StatusReconciler::new(harness.store.clone());

    let first = reconciler
        .on_status_message(&update(&schedule, ScheduleStatus::Running))
        .await
        .unwrap();
    let second = reconciler
        .on_status_message(&update(&schedule, ScheduleStatus::Running))
        .await
        .unwrap();

    assert!(first.is_some());
    assert!(second.is_none());
}

// ---------------------------------------------------------------------------
// Test: timestamps come from the envelope
// ---------------------------------------------------------------------------

#[tokio::test]
async fn transitions_stamp_start_and_finish() {
    let harness = Harness::new();
    let schedule = pending_schedule(&harness).await;
    let reconciler = StatusReconciler::new(harness.store.clone());

    let started = Utc.with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap();
    let finished = Utc.with_ymd_and_hms(2026, 10, 14, 9, 5, 0).unwrap();

    let mut running = update(&schedule, ScheduleStatus::Running);
    running.timestamp = started;
    reconciler.handle(running).await.unwrap();

    let mut failed = update(&schedule, ScheduleStatus::Failed);
    failed.timestamp = finished;
    let updated = reconciler.on_status_message(&failed).await.unwrap().unwrap();

    assert_eq!(updated.status, ScheduleStatus::Failed);
    assert_eq!(updated.started_at, Some(started));
    assert_eq!(updated.finished_at, Some(finished));
}

#[tokio::test]
async fn lost_start_notification_still_records_start() {
    let harness = Harness::new();
    let schedule = pending_schedule(&harness).await;
    let reconciler = StatusReconciler::new(harness.store.clone());

    let updated = reconciler
        .on_status_message(&update(&schedule, ScheduleStatus::Completed))
        .await
        .unwrap()
        .unwrap();

    assert!(updated.started_at.is_some());
    assert_eq!(updated.started_at, updated.finished_at);
}

// ---------------------------------------------------------------------------
// Test: messages that cannot apply are acknowledged, store failures are not
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_schedule_is_dropped() {
    let harness = Harness::new();
    let mut ghost = pending_schedule(&harness).await;
    ghost.id = Id::new_v4();
    let reconciler = StatusReconciler::new(harness.store.clone());

    let result = reconciler
        .on_status_message(&update(&ghost, ScheduleStatus::Running))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn malformed_and_foreign_messages_are_ignored() {
    let harness = Harness::new();
    let reconciler = StatusReconciler::new(harness.store.clone());

    let malformed = Envelope::new(
        orchestra_core::message::MessageType::StatusUpdate,
        serde_json::json!({ "schedule_id": 7 }),
    );
    reconciler.handle(malformed).await.unwrap();

    let foreign = Envelope::new(
        orchestra_core::message::MessageType::Unknown,
        serde_json::json!({}),
    );
    reconciler.handle(foreign).await.unwrap();
}

#[tokio::test]
async fn store_failure_requests_redelivery() {
    let harness = Harness::new();
    let schedule = pending_schedule(&harness).await;
    let reconciler = StatusReconciler::new(harness.store.clone());
    harness.store.set_fail_writes(true);

    let result = reconciler.handle(update(&schedule, ScheduleStatus::Running)).await;

    assert!(result.is_err());
    assert_eq!(status_of(&harness, schedule.id).await, ScheduleStatus::Pending);
}

// ---------------------------------------------------------------------------
// Test: updates published on the status topic reach the store
// ---------------------------------------------------------------------------

#[tokio::test]
async fn subscription_applies_published_updates() {
    let harness = Harness::new();
    let schedule = pending_schedule(&harness).await;
    // One handler at a time so the two updates apply in publish order.
    let messenger = MemoryMessenger::with_max_in_flight(1);

    messenger
        .publish(&update(&schedule, ScheduleStatus::Running), "status")
        .await
        .unwrap();
    messenger
        .publish(&update(&schedule, ScheduleStatus::Completed), "status")
        .await
        .unwrap();

    let reconciler = Arc::new(StatusReconciler::new(harness.store.clone()));
    messenger
        .subscribe(
            "status",
            reconciler,
            Some(Duration::from_millis(200)),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let stored = harness.store.get_schedule(schedule.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ScheduleStatus::Completed);
    assert!(stored.started_at.is_some());
    assert_eq!(messenger.acked("status"), 2);
    assert_eq!(messenger.pending("status"), 0);
}

// ---------------------------------------------------------------------------
// Test: concurrent updates for one schedule
// ---------------------------------------------------------------------------

/// Holds the first write of `RUNNING` until released, so a later update can
/// overtake it.
struct HeldRunningUpdate {
    inner: Arc<MemoryStore>,
    held: AtomicBool,
    entered: Notify,
    release: Notify,
}

impl HeldRunningUpdate {
    fn new(inner: Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            held: AtomicBool::new(false),
            entered: Notify::new(),
            release: Notify::new(),
        })
    }
}

#[async_trait]
impl Store for HeldRunningUpdate {
    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }

    async fn insert_job(&self, input: &NewJob) -> Result<Job, StoreError> {
        self.inner.insert_job(input).await
    }

    async fn get_job(&self, id: Id) -> Result<Option<Job>, StoreError> {
        self.inner.get_job(id).await
    }

    async fn insert_cluster(&self, input: &NewCluster) -> Result<Cluster, StoreError> {
        self.inner.insert_cluster(input).await
    }

    async fn get_cluster(&self, id: Id) -> Result<Option<Cluster>, StoreError> {
        self.inner.get_cluster(id).await
    }

    async fn list_clusters(&self) -> Result<Vec<Cluster>, StoreError> {
        self.inner.list_clusters().await
    }

    async fn insert_schedule(&self, input: &NewSchedule) -> Result<Schedule, StoreError> {
        self.inner.insert_schedule(input).await
    }

    async fn get_schedule(&self, id: Id) -> Result<Option<Schedule>, StoreError> {
        self.inner.get_schedule(id).await
    }

    async fn update_schedule(
        &self,
        id: Id,
        update: &ScheduleUpdate,
    ) -> Result<Option<Schedule>, StoreError> {
        if update.status == Some(ScheduleStatus::Running)
            && !self.held.swap(true, Ordering::SeqCst)
        {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.update_schedule(id, update).await
    }

    async fn delete_schedule(&self, id: Id) -> Result<bool, StoreError> {
        self.inner.delete_schedule(id).await
    }

    async fn query_schedules(&self, filter: &ScheduleFilter) -> Result<Vec<Schedule>, StoreError> {
        self.inner.query_schedules(filter).await
    }
}

async fn wait_for_status(harness: &Harness, id: Id, status: ScheduleStatus) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while status_of(harness, id).await != status {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("status never reached");
}

#[tokio::test]
async fn overtaken_running_update_does_not_regress_completed() {
    let harness = Harness::new();
    let schedule = pending_schedule(&harness).await;
    let store = HeldRunningUpdate::new(harness.store.clone());
    let reconciler = Arc::new(StatusReconciler::new(store.clone()));

    // RUNNING reads PENDING, then stalls inside its write.
    let running = {
        let reconciler = Arc::clone(&reconciler);
        let envelope = update(&schedule, ScheduleStatus::Running);
        tokio::spawn(async move { reconciler.on_status_message(&envelope).await })
    };
    store.entered.notified().await;

    let completed = reconciler
        .on_status_message(&update(&schedule, ScheduleStatus::Completed))
        .await
        .unwrap();
    assert_eq!(completed.map(|s| s.status), Some(ScheduleStatus::Completed));

    store.release.notify_one();
    let overtaken = running.await.unwrap().unwrap();

    assert!(overtaken.is_none());
    let stored = harness.store.get_schedule(schedule.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ScheduleStatus::Completed);
    assert!(stored.started_at.is_some());
    assert!(stored.finished_at.is_some());
}

#[tokio::test]
async fn concurrent_subscription_handlers_keep_status_monotonic() {
    let harness = Harness::new();
    let schedule = pending_schedule(&harness).await;
    let store = HeldRunningUpdate::new(harness.store.clone());
    let messenger = Arc::new(MemoryMessenger::with_max_in_flight(4));

    messenger
        .publish(&update(&schedule, ScheduleStatus::Running), "status")
        .await
        .unwrap();
    messenger
        .publish(&update(&schedule, ScheduleStatus::Completed), "status")
        .await
        .unwrap();

    let subscription = {
        let messenger = Arc::clone(&messenger);
        let reconciler = Arc::new(StatusReconciler::new(store.clone()));
        tokio::spawn(async move {
            messenger
                .subscribe(
                    "status",
                    reconciler,
                    Some(Duration::from_millis(500)),
                    &CancellationToken::new(),
                )
                .await
        })
    };

    // COMPLETED can only land while RUNNING is held if both are in flight.
    wait_for_status(&harness, schedule.id, ScheduleStatus::Completed).await;
    store.release.notify_one();
    subscription.await.unwrap().unwrap();

    assert_eq!(status_of(&harness, schedule.id).await, ScheduleStatus::Completed);
    assert_eq!(messenger.acked("status"), 2);
    assert_eq!(messenger.nacked("status"), 0);
}
