//! The bounded go-live watch.
//!
//! Once the encoder starts pushing data, the bound stream takes a few
//! seconds to report `active`; only then may the broadcast transition to
//! live. This task polls the stream status once a second and gives up
//! after a fixed number of polls, so a dead ingest path force-stops the
//! outer streaming session instead of hanging it forever.

use crate::error::AuthError;
use crate::services::youtube::broadcast::BroadcastCoordinator;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// How often the bound stream's status is polled.
pub const STREAM_ACTIVE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How many polls to attempt before giving up on the stream ever going
/// active.
pub const STREAM_ACTIVE_POLL_LIMIT: u32 = 14;

/// How a go-live watch ended.
#[derive(Debug)]
pub enum StreamActiveOutcome {
    /// The provider reported the stream as receiving data; the broadcast
    /// can go live.
    BecameActive,
    /// The poll budget ran out without the stream going active; the outer
    /// streaming session must be force-stopped.
    TimedOut,
    /// The stop signal fired before the stream went active.
    Cancelled,
    /// A status query failed; the outer streaming operation must be
    /// aborted.
    Failed(AuthError),
}

/// Polls the bound stream until it reports `active`, the poll budget runs
/// out, a query fails, or `stop` signals that the user ended the stream.
pub async fn wait_for_stream_active(
    coordinator: &BroadcastCoordinator,
    stream_id: &str,
    stop: watch::Receiver<bool>,
) -> StreamActiveOutcome {
    wait_with_interval(coordinator, stream_id, stop, STREAM_ACTIVE_POLL_INTERVAL).await
}

pub(crate) async fn wait_with_interval(
    coordinator: &BroadcastCoordinator,
    stream_id: &str,
    mut stop: watch::Receiver<bool>,
    poll_interval: Duration,
) -> StreamActiveOutcome {
    if *stop.borrow() {
        return StreamActiveOutcome::Cancelled;
    }

    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut polls = 0u32;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                polls += 1;
                match coordinator.find_stream(stream_id).await {
                    Ok(stream) if stream.is_active() => {
                        tracing::info!(stream = stream_id, polls, "stream went active");
                        return StreamActiveOutcome::BecameActive;
                    }
                    Ok(stream) => {
                        tracing::trace!(
                            stream = stream_id,
                            polls,
                            status = ?stream.status,
                            "stream not active yet"
                        );
                        if polls >= STREAM_ACTIVE_POLL_LIMIT {
                            tracing::warn!(
                                stream = stream_id,
                                "stream never went active, forcing stop"
                            );
                            return StreamActiveOutcome::TimedOut;
                        }
                    }
                    Err(e) => {
                        tracing::error!(stream = stream_id, error = %e, "stream status query failed");
                        return StreamActiveOutcome::Failed(e);
                    }
                }
            }
            changed = stop.changed() => {
                match changed {
                    Ok(()) if !*stop.borrow() => {}
                    // Stop requested, or the sender side is gone.
                    _ => {
                        tracing::debug!(stream = stream_id, "go-live watch cancelled");
                        return StreamActiveOutcome::Cancelled;
                    }
                }
            }
        }
    }
}

/// Runs the go-live watch as a background task.
pub fn spawn_stream_active_watch(
    coordinator: BroadcastCoordinator,
    stream_id: String,
    stop: watch::Receiver<bool>,
) -> JoinHandle<StreamActiveOutcome> {
    tokio::spawn(async move { wait_for_stream_active(&coordinator, &stream_id, stop).await })
}
