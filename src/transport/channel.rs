//! In-process transport over tokio mpsc channels.
//!
//! Each direction is an unbounded channel. The sending side pushes encoded
//! text through a [`ChannelTransport`]; a delivery task on the receiving
//! side drains the channel and feeds each text to its endpoint's
//! `on_transport_message`. Ordering within one direction is FIFO.

use std::sync::Arc;

use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{Transport, TransportError};
use crate::config::BridgeSettings;
use crate::endpoint::BridgeEndpoint;

/// Sending half of one direction.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelTransport {
    /// Create a transport and the receiver its messages arrive on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Transport for ChannelTransport {
    fn deliver(&self, encoded: String) -> Result<(), TransportError> {
        self.tx.send(encoded).map_err(|_| TransportError::Closed)
    }
}

/// Handle to a running delivery task.
///
/// Dropping the handle cancels the task. The task also ends on its own when
/// every sender of its channel is gone.
pub struct DeliveryTaskHandle {
    join_handle: Option<JoinHandle<()>>,
    cancel_token: CancellationToken,
}

impl DeliveryTaskHandle {
    /// Stop delivering and wait for the task to finish.
    pub async fn shutdown(mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for DeliveryTaskHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Spawn a task feeding every text received on `rx` to `endpoint`.
///
/// Must be called from within a tokio runtime.
pub fn spawn_delivery_task(
    rx: mpsc::UnboundedReceiver<String>,
    endpoint: Arc<BridgeEndpoint>,
) -> DeliveryTaskHandle {
    let cancel_token = CancellationToken::new();
    let join_handle = tokio::spawn(delivery_loop(rx, endpoint, cancel_token.clone()));

    DeliveryTaskHandle {
        join_handle: Some(join_handle),
        cancel_token,
    }
}

async fn delivery_loop(
    mut rx: mpsc::UnboundedReceiver<String>,
    endpoint: Arc<BridgeEndpoint>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                debug!(
                    target: "script_bridge::transport",
                    "Delivery task cancelled, shutting down"
                );
                break;
            }
            received = rx.recv() => {
                match received {
                    Some(text) => endpoint.on_transport_message(&text),
                    None => {
                        debug!(
                            target: "script_bridge::transport",
                            "Delivery channel closed, shutting down"
                        );
                        break;
                    }
                }
            }
        }
    }
}

/// Two endpoints wired to each other, with the tasks that feed them.
pub struct ConnectedPair {
    pub a: Arc<BridgeEndpoint>,
    pub b: Arc<BridgeEndpoint>,
    pub a_delivery: DeliveryTaskHandle,
    pub b_delivery: DeliveryTaskHandle,
}

/// Build two endpoints that talk to each other over channels.
///
/// Must be called from within a tokio runtime.
pub fn connect_pair(a_settings: BridgeSettings, b_settings: BridgeSettings) -> ConnectedPair {
    let (a_to_b, b_inbox) = ChannelTransport::new();
    let (b_to_a, a_inbox) = ChannelTransport::new();

    let a = Arc::new(BridgeEndpoint::new(Arc::new(a_to_b), a_settings));
    let b = Arc::new(BridgeEndpoint::new(Arc::new(b_to_a), b_settings));

    let a_delivery = spawn_delivery_task(a_inbox, Arc::clone(&a));
    let b_delivery = spawn_delivery_task(b_inbox, Arc::clone(&b));

    ConnectedPair {
        a,
        b,
        a_delivery,
        b_delivery,
    }
}
