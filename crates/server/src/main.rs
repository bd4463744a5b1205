//! Subscribe-rs server entry point.

use std::sync::Arc;

use subscribe_common::{Config, SystemClock};
use subscribe_core::{
    EventPublisherService, NoOpEventPublisher, StatusCheckQueue, SubscriptionNotifier,
};
use subscribe_db::repositories::{NotificationRepository, SubscriptionRepository};
use subscribe_queue::{RedisPubSub, SchedulerConfig, run_scheduler};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "subscribe=debug".into()),
        )
        .init();

    if let Err(e) = dotenvy::dotenv() {
        info!(reason = %e, "No .env file loaded");
    }

    info!("Starting subscribe-rs server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = subscribe_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    subscribe_db::migrate(&db).await?;
    info!("Migrations completed");

    let db = Arc::new(db);

    // Real-time sink; without Redis notifications are only stored
    let pubsub = match &config.redis {
        Some(redis) => match RedisPubSub::from_config(redis).await {
            Ok(pubsub) => {
                info!(prefix = %redis.prefix, "Connected to Redis Pub/Sub");
                Some(Arc::new(pubsub))
            }
            Err(e) => {
                warn!(error = %e, "Failed to connect to Redis, real-time push disabled");
                None
            }
        },
        None => {
            info!("Redis not configured, real-time push disabled");
            None
        }
    };
    let event_publisher: EventPublisherService = match &pubsub {
        Some(pubsub) => pubsub.clone() as EventPublisherService,
        None => Arc::new(NoOpEventPublisher),
    };

    // Initialize repositories
    let subscription_repo = SubscriptionRepository::new(Arc::clone(&db));
    let notification_repo = NotificationRepository::new(Arc::clone(&db));

    let mut notifier = SubscriptionNotifier::new(subscription_repo, notification_repo);
    notifier.set_event_publisher(event_publisher);

    // The worker is the only writer of subscription status
    let queue = StatusCheckQueue::new(config.scheduler.queue_capacity);
    let sender = queue.sender();
    let worker = queue.start(notifier, Arc::new(SystemClock));

    let scheduler_config = SchedulerConfig::from(&config.scheduler);
    info!(
        interval_secs = scheduler_config.status_check_interval.as_secs(),
        "Starting status check scheduler"
    );
    let scheduler = run_scheduler(scheduler_config, Arc::new(sender));

    shutdown_signal().await;

    // Dropping the scheduler releases the last sender and lets the worker drain
    scheduler.abort();
    if let Err(e) = scheduler.await {
        if !e.is_cancelled() {
            error!(error = %e, "Scheduler task failed");
        }
    }
    if let Err(e) = worker.await {
        error!(error = %e, "Status check worker failed");
    }

    if let Some(pubsub) = pubsub {
        if let Err(e) = pubsub.shutdown().await {
            warn!(error = %e, "Failed to shut down Redis Pub/Sub");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
