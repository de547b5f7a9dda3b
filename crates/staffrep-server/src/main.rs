//! Staffrep Server — process bootstrap.
//!
//! Loads the staff configuration, connects the configured store, runs
//! migrations and reports how many users are waiting on a rank change.
//! The chat gateway attaches to the engine from outside this process.

use std::collections::HashSet;
use std::process::ExitCode;

use staffrep_core::error::StaffResult;
use staffrep_core::models::request::Decision;
use staffrep_core::models::user::LeaderboardField;
use staffrep_core::ports::{ErrorTracker, EventSource, TrackedEvent};
use staffrep_core::repository::UserRepository;
use staffrep_db::{DbConfig, UserStore, open_store};
use staffrep_engine::StaffConfig;
use staffrep_engine::service::ELIGIBILITY_SCAN_LIMIT;
use staffrep_engine::threshold::{Standing, ThresholdEvaluator};
use staffrep_engine::tracker::TracingErrorTracker;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "staffConfig.json";

#[tokio::main]
async fn main() -> ExitCode {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("staffrep=info"));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    let tracker = match std::env::var("ERROR_LOG_DIR") {
        Ok(dir) => TracingErrorTracker::with_log_dir(dir),
        Err(_) => TracingErrorTracker::new(),
    };

    tracing::info!("Starting staffrep server...");
    match run().await {
        Ok(()) => {
            tracing::info!("staffrep server stopped.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let id = tracker.track(TrackedEvent::fatal(EventSource::Startup, e.to_string()));
            tracing::error!(correlation_id = %id, "startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> StaffResult<()> {
    let config_path =
        std::env::var("STAFF_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = StaffConfig::load(&config_path)?;
    tracing::info!(
        path = %config_path,
        ranks = config.hierarchy().len(),
        "staff configuration loaded"
    );

    let db_config = DbConfig::from_env()?;
    let store = open_store(&db_config).await?;

    let waiting = count_over_threshold(&store, ThresholdEvaluator::new(config.thresholds)).await?;
    tracing::info!(users = waiting, "users currently over a rank threshold");
    Ok(())
}

/// Users over either threshold, counted once.
async fn count_over_threshold(
    store: &UserStore,
    evaluator: ThresholdEvaluator,
) -> StaffResult<usize> {
    let mut seen = HashSet::new();
    for field in [LeaderboardField::PositiveRep, LeaderboardField::NegativeRep] {
        for record in store.leaderboard(field, ELIGIBILITY_SCAN_LIMIT).await? {
            if evaluator.evaluate(Standing::from(&record)) != Decision::None {
                seen.insert(record.user_id);
            }
        }
    }
    Ok(seen.len())
}
