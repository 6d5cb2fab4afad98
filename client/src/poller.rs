use std::time::Duration;

use matatena_core::SessionSnapshot;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::rest::RestClient;

/// Polls the session snapshot on a fixed interval until the receiver goes
/// away. Failed polls are logged and retried on the next tick.
pub fn spawn_poller(
    rest: RestClient,
    game_id: String,
    interval: Duration,
    snapshots: mpsc::UnboundedSender<SessionSnapshot>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match rest.get_state(&game_id).await {
                Ok(snapshot) => {
                    debug!(game_id = %game_id, ledger_len = snapshot.ledger_len(), "polled");
                    if snapshots.send(snapshot).is_err() {
                        break;
                    }
                }
                Err(e) => warn!(game_id = %game_id, error = %e, "poll failed"),
            }
            if snapshots.is_closed() {
                break;
            }
        }
    })
}
