use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{CloseReason, RoomDirectory, SessionRegistry};

#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Period between probe cycles.
    pub interval: Duration,
    /// Maximum silence tolerated before a session is evicted.
    pub liveness_window: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            liveness_window: Duration::from_secs(60),
        }
    }
}

/// Periodic liveness prober.
///
/// Owned by the service lifecycle: started once at boot, stopped on
/// shutdown through the watch channel, which the task checks every cycle.
/// Eviction runs the same teardown path as an ordinary disconnect.
pub struct HeartbeatMonitor {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl HeartbeatMonitor {
    pub fn start(
        sessions: SessionRegistry,
        rooms: RoomDirectory,
        config: HeartbeatConfig,
    ) -> Self {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let window = config.liveness_window;

        let task = tokio::spawn(async move {
            let mut ticker = time::interval(config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                interval_secs = config.interval.as_secs(),
                window_secs = window.as_secs(),
                "heartbeat monitor started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => run_cycle(&sessions, &rooms, window).await,
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("heartbeat monitor stopped");
                            return;
                        }
                    }
                }
            }
        });

        Self { shutdown, task }
    }

    /// Signal the task and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

async fn run_cycle(sessions: &SessionRegistry, rooms: &RoomDirectory, window: Duration) {
    let snapshot = sessions.snapshot().await;
    if snapshot.is_empty() {
        debug!("no active sessions, skipping heartbeat cycle");
        return;
    }

    let now = Instant::now();
    for session in snapshot {
        if !session.handle.is_open() {
            // The transport is already gone; run the ordinary teardown.
            evict(sessions, rooms, &session.key).await;
            continue;
        }

        // A failed probe is logged but never evicts by itself; eviction is
        // decided solely by the elapsed-time check below.
        if let Err(e) = session.handle.send_probe() {
            warn!(key = %session.key, error = %e, "liveness probe failed");
        }

        if now.duration_since(session.last_seen) > window {
            warn!(key = %session.key, "session exceeded liveness window, evicting");
            session.handle.close(CloseReason::NotReliable);
            evict(sessions, rooms, &session.key).await;
        }
    }
}

/// Same teardown path as an ordinary disconnect.
async fn evict(sessions: &SessionRegistry, rooms: &RoomDirectory, key: &str) {
    sessions.remove(key).await;
    rooms.prune_from_all(key).await;
}
