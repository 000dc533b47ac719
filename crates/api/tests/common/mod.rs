#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use orchestra_api::config::ServerConfig;
use orchestra_api::engine::ScheduleContext;
use orchestra_api::router::build_app_router;
use orchestra_api::state::AppState;
use orchestra_db::models::cluster::{Cluster, NewCluster};
use orchestra_db::models::job::{Job, NewJob};
use orchestra_db::{MemoryStore, Store};
use orchestra_messenger::{MemoryMessenger, MessengerConfig, MessengerRegistry};
use orchestra_scheduler::RandomScheduler;
use tower::ServiceExt;

/// In-memory collaborators plus the state built from them.
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub messenger: Arc<MemoryMessenger>,
    pub state: AppState,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let messenger = Arc::new(MemoryMessenger::new());
        let messengers = MessengerRegistry::new().with(MemoryMessenger::NAME, messenger.clone());

        let state = AppState {
            store: store.clone(),
            scheduler: Arc::new(RandomScheduler::with_seed(42)),
            messengers: Arc::new(messengers),
        };
        Self {
            store,
            messenger,
            state,
        }
    }

    pub fn context(&self) -> ScheduleContext {
        self.state.schedule_context()
    }

    pub fn app(&self) -> Router {
        build_app_router(self.state.clone(), &test_config())
    }

    pub async fn job(&self, name: &str) -> Job {
        self.store
            .insert_job(&NewJob {
                name: name.to_string(),
                description: String::new(),
                script: format!("#!/bin/bash\necho {name}\n"),
                specification: serde_json::json!({}),
                metadata: None,
                cluster_caps_req: Some("cpu".to_string()),
                owner_id: "u1".to_string(),
            })
            .await
            .unwrap()
    }

    /// A cluster bound to the memory messenger on `topic`.
    pub async fn cluster(&self, name: &str, topic: &str) -> Cluster {
        self.cluster_on(name, MemoryMessenger::NAME, topic).await
    }

    pub async fn cluster_on(&self, name: &str, messenger: &str, topic: &str) -> Cluster {
        self.store
            .insert_cluster(&NewCluster {
                name: name.to_string(),
                cluster_type: "slurm".to_string(),
                capabilities: None,
                messenger: messenger.to_string(),
                messenger_queue: topic.to_string(),
            })
            .await
            .unwrap()
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        database_url: "postgres://unused".to_string(),
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        scheduler: RandomScheduler::NAME.to_string(),
        status_messenger: MemoryMessenger::NAME.to_string(),
        status_subscription: "status".to_string(),
        messenger: MessengerConfig::memory_only(),
    }
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST a JSON body, optionally as `user`.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    user: Option<&str>,
) -> Response {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    app.oneshot(request).await.unwrap()
}
