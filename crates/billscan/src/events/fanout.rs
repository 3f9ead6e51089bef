use std::sync::Arc;

use log::{info, warn};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::{ConnectionRegistry, JobEventChannel};

/// Spawns the task draining `channel` into every listener of `registry`.
///
/// The task ends when the channel closes.
pub fn spawn_fanout(channel: &JobEventChannel, registry: Arc<ConnectionRegistry>) -> JoinHandle<()> {
    let mut rx = channel.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(payload) => {
                        registry.broadcast(&payload);
                    }
                    Err(e) => warn!("Failed to serialize job event: {}", e),
                },
                Err(RecvError::Lagged(n)) => {
                    warn!("Job event fan-out lagged, missed {} events", n);
                }
                Err(RecvError::Closed) => {
                    info!("Job event channel closed, stopping fan-out");
                    break;
                }
            }
        }
    })
}
