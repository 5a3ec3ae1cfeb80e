use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, instrument};

use super::service::{RoomService, SweepReport};

/// Configuration for the cleanup task
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// How often to run the sweep
    pub cleanup_interval: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(5 * 60), // 5 minutes
        }
    }
}

/// Starts the background task that expires idle rooms and drops silent players
#[instrument(skip(room_service))]
pub async fn start_cleanup_task(room_service: Arc<RoomService>, config: CleanupConfig) {
    info!(
        cleanup_interval_secs = config.cleanup_interval.as_secs(),
        heartbeat_timeout_secs = room_service.config().heartbeat_timeout.as_secs(),
        "Starting room cleanup background task"
    );

    let mut cleanup_interval = interval(config.cleanup_interval);

    loop {
        cleanup_interval.tick().await;
        run_cleanup(&room_service).await;
    }
}

/// One sweep; the store absorbs storage failures so a sweep never errors out
async fn run_cleanup(room_service: &RoomService) -> SweepReport {
    debug!("Running room cleanup task");
    let report = room_service.sweep().await;

    if report == SweepReport::default() {
        debug!("Nothing to clean up");
    } else {
        info!(
            expired_rooms = report.expired_rooms,
            expired_players = report.expired_players,
            disconnected_players = report.disconnected_players,
            "Room cleanup completed"
        );
    }
    report
}
