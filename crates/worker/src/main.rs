use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use orchestra_cluster::DispatchHandler;
use orchestra_core::message::StatusUpdatePayload;
use orchestra_messenger::{MessageHandler, Messenger};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use orchestra_worker::cli::{Cli, Command};
use orchestra_worker::commands::{self, EchoHandler};
use orchestra_worker::config::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing();

    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;
    let messengers = orchestra_messenger::build_registry(&config.messenger)
        .await
        .context("Failed to build messenger registry")?;

    match cli.command {
        Command::Subscribe {
            subscription,
            timeout_secs,
        } => {
            let backends = commands::backend_registry(&config);
            let backend = commands::backend(&backends, &config.cluster_backend)?;
            let messenger = commands::messenger(&messengers, &config.dispatch_messenger)?;
            let subscription = subscription.unwrap_or_else(|| config.dispatch_subscription.clone());

            tracing::info!(
                backend = backend.name(),
                messenger = messenger.name(),
                subscription = %subscription,
                "Waiting for dispatched schedules",
            );
            let handler = Arc::new(DispatchHandler::new(backend));
            run_subscription(messenger, &subscription, handler, timeout_secs).await?;
        }

        Command::Echo {
            subscription,
            messenger,
            timeout_secs,
        } => {
            let name = messenger.unwrap_or_else(|| config.dispatch_messenger.clone());
            let messenger = commands::messenger(&messengers, &name)?;
            run_subscription(messenger, &subscription, Arc::new(EchoHandler), timeout_secs).await?;
        }

        Command::PublishStatus {
            schedule_id,
            job_id,
            status,
            exit_info,
        } => {
            let messenger = commands::messenger(&messengers, &config.status_messenger)?;
            let update = StatusUpdatePayload {
                schedule_id,
                job_id,
                status,
                exit_info,
            };
            commands::publish_status(messenger.as_ref(), &config.status_topic, &update).await?;
        }

        Command::Poll {
            schedule_id,
            job_id,
            external_id,
        } => {
            let backends = commands::backend_registry(&config);
            let backend = commands::backend(&backends, &config.cluster_backend)?;
            let messenger = commands::messenger(&messengers, &config.status_messenger)?;
            let status = commands::poll_status(
                backend.as_ref(),
                messenger.as_ref(),
                &config.status_topic,
                schedule_id,
                job_id,
                &external_id,
            )
            .await?;
            match status {
                Some(status) => println!("{status}"),
                None => println!("UNKNOWN"),
            }
        }
    }

    Ok(())
}

/// Run `handler` on `subscription` until Ctrl-C or the optional timeout.
async fn run_subscription(
    messenger: Arc<dyn Messenger>,
    subscription: &str,
    handler: Arc<dyn MessageHandler>,
    timeout_secs: Option<u64>,
) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => tracing::info!("Received SIGINT (Ctrl-C), stopping subscription"),
                Err(e) => tracing::error!(error = %e, "Failed to install Ctrl-C handler"),
            }
            cancel.cancel();
        });
    }

    messenger
        .subscribe(
            subscription,
            handler,
            timeout_secs.map(Duration::from_secs),
            &cancel,
        )
        .await
        .with_context(|| format!("Subscription {subscription:?} failed"))?;

    tracing::info!(subscription, "Subscription stopped");
    Ok(())
}

/// `RUST_LOG` selects levels; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "orchestra_worker=debug,orchestra_cluster=debug,orchestra_messenger=info".into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    // Hook scripts capture stdout, so logs go to stderr.
    if std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json")) {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
