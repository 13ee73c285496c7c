//! Subscription Service Background Worker
//!
//! Handles scheduled jobs:
//! - Subscription invariant checks (hourly)
//! - Heartbeat (every 5 minutes)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use subsvc_shared::{create_pool, PoolSettings};
use subsvc_subscriptions::{InvariantCheckSummary, InvariantChecker, ViolationSeverity};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

/// Log the outcome of an invariant check run
fn log_check_summary(summary: &InvariantCheckSummary) {
    if summary.healthy {
        info!(
            checks_run = summary.checks_run,
            "Subscription invariants hold"
        );
        return;
    }

    warn!(
        checks_run = summary.checks_run,
        checks_failed = summary.checks_failed,
        violations = summary.violations.len(),
        "Subscription invariant violations found"
    );

    for violation in &summary.violations {
        match violation.severity {
            ViolationSeverity::Critical | ViolationSeverity::High => error!(
                invariant = %violation.invariant,
                severity = %violation.severity,
                user_ids = ?violation.user_ids,
                context = %violation.context,
                "{}",
                violation.description
            ),
            ViolationSeverity::Medium | ViolationSeverity::Low => warn!(
                invariant = %violation.invariant,
                severity = %violation.severity,
                user_ids = ?violation.user_ids,
                "{}",
                violation.description
            ),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    info!("Starting Subscription Service Worker");

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = create_pool(
        &database_url,
        PoolSettings {
            max_connections: 5,
            ..PoolSettings::default()
        },
    )
    .await?;

    let checker = Arc::new(InvariantChecker::new(pool));
    let scheduler = JobScheduler::new().await?;

    // Job 1: Invariant checks, at minute 0 of every hour
    let hourly_checker = checker.clone();
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _l| {
            let checker = hourly_checker.clone();
            Box::pin(async move {
                info!("Running scheduled subscription invariant checks");
                match checker.run_all_checks().await {
                    Ok(summary) => log_check_summary(&summary),
                    Err(e) => error!(error = %e, "Invariant check run failed"),
                }
            })
        })?)
        .await?;
    info!("Scheduled: Subscription invariant checks (hourly)");

    // Job 2: Heartbeat (every 5 minutes)
    scheduler
        .add(Job::new_async("0 */5 * * * *", |_uuid, _l| {
            Box::pin(async move {
                info!("Worker heartbeat - all systems operational");
            })
        })?)
        .await?;
    info!("Scheduled: Heartbeat (every 5 minutes)");

    info!("Starting job scheduler");
    scheduler.start().await?;
    info!("Subscription Service Worker started with 2 scheduled jobs");

    // Jobs run on the scheduler's own tasks
    loop {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
}
