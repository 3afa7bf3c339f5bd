//! Background eviction of pending callbacks that never got a response.
//!
//! Only meaningful when `callbackTimeout` is configured; without it each
//! tick is a no-op.

use std::sync::{Arc, Weak};
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::BridgeEndpoint;

/// Handle to a running expiry task. Dropping it stops the task.
pub struct ExpiryTaskHandle {
    _join_handle: JoinHandle<()>,
    cancel_token: CancellationToken,
}

impl ExpiryTaskHandle {
    pub fn stop(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for ExpiryTaskHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Spawn a task that calls [`BridgeEndpoint::evict_expired`] every `period`.
///
/// The task holds only a weak reference and exits once the endpoint is
/// dropped. Must be called from within a tokio runtime.
pub fn spawn_expiry_task(endpoint: &Arc<BridgeEndpoint>, period: Duration) -> ExpiryTaskHandle {
    let cancel_token = CancellationToken::new();
    let join_handle = tokio::spawn(expiry_loop(
        Arc::downgrade(endpoint),
        period,
        cancel_token.clone(),
    ));

    ExpiryTaskHandle {
        _join_handle: join_handle,
        cancel_token,
    }
}

async fn expiry_loop(endpoint: Weak<BridgeEndpoint>, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(target: "script_bridge::expiry", "Expiry task cancelled");
                break;
            }
            _ = interval.tick() => {
                let Some(endpoint) = endpoint.upgrade() else {
                    debug!(target: "script_bridge::expiry", "Endpoint dropped, stopping expiry task");
                    break;
                };
                endpoint.evict_expired();
            }
        }
    }
}
