//! Injection transport for an embedded script context.
//!
//! Outbound messages become evaluation commands of the form
//! `NS._receive( JSON.parse( decodeURIComponent( "..." ) ) );`. Commands are
//! queued rather than evaluated in place: the context that owns the script
//! engine (typically a UI thread) drains the [`ScriptCommandQueue`] and
//! evaluates each command in order, so senders on any thread never touch
//! the engine directly.
//!
//! The script side is set up once per context lifetime with
//! [`bootstrap_script`]. It posts percent-encoded Message text back to the
//! host, which passes it to `BridgeEndpoint::on_transport_message`.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::{Transport, TransportError};
use crate::config::{BridgeSettings, is_valid_namespace};
use crate::endpoint::BridgeEndpoint;
use crate::error::{BridgeError, BridgeResult};
use crate::protocol::eval_command;

const BOOTSTRAP_TEMPLATE: &str = include_str!("script/bootstrap.js");
const NAMESPACE_PLACEHOLDER: &str = "__NAMESPACE__";

/// Render the script-side bootstrap routine for `namespace`.
///
/// The routine installs `window.<namespace>` with `register`, `send`,
/// `dispatch` and `_receive`, keeping its own handler and callback tables
/// and its own callback counter. Fails if `namespace` is not a bare
/// script identifier.
pub fn bootstrap_script(namespace: &str) -> BridgeResult<String> {
    check_namespace(namespace)?;
    Ok(BOOTSTRAP_TEMPLATE.replace(NAMESPACE_PLACEHOLDER, namespace))
}

/// The namespace is spliced into script source unquoted.
fn check_namespace(namespace: &str) -> BridgeResult<()> {
    if is_valid_namespace(namespace) {
        Ok(())
    } else {
        Err(BridgeError::config(format!(
            "namespace {:?} is not a script identifier",
            namespace
        )))
    }
}

/// Transport that turns encoded messages into queued evaluation commands.
#[derive(Debug, Clone)]
pub struct ScriptTransport {
    namespace: String,
    commands: mpsc::UnboundedSender<String>,
}

impl ScriptTransport {
    pub fn new(namespace: impl Into<String>) -> BridgeResult<(Self, ScriptCommandQueue)> {
        let namespace = namespace.into();
        check_namespace(&namespace)?;

        let (commands, rx) = mpsc::unbounded_channel();
        let transport = Self {
            namespace,
            commands,
        };
        Ok((transport, ScriptCommandQueue { rx }))
    }
}

impl Transport for ScriptTransport {
    fn deliver(&self, encoded: String) -> Result<(), TransportError> {
        self.commands
            .send(eval_command(&self.namespace, &encoded))
            .map_err(|_| TransportError::Closed)
    }
}

/// Evaluation commands waiting to run on the script context.
#[derive(Debug)]
pub struct ScriptCommandQueue {
    rx: mpsc::UnboundedReceiver<String>,
}

impl ScriptCommandQueue {
    /// Wait for the next command. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Take the next command if one is ready.
    pub fn try_recv(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// Take every command that is ready, in order.
    pub fn drain(&mut self) -> Vec<String> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

/// Create a host endpoint whose outbound messages are queued as evaluation
/// commands for the script context named by `settings.namespace`.
pub fn attach(settings: BridgeSettings) -> BridgeResult<(Arc<BridgeEndpoint>, ScriptCommandQueue)> {
    let (transport, queue) = ScriptTransport::new(settings.namespace.clone())?;
    let endpoint = Arc::new(BridgeEndpoint::new(Arc::new(transport), settings));
    Ok((endpoint, queue))
}
