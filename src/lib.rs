pub mod config;
pub mod endpoint;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use config::{BridgeSettings, UnknownHandlerPolicy, load_settings};
pub use endpoint::{BridgeEndpoint, Responder, spawn_expiry_task};
pub use error::{BridgeError, BridgeResult};
pub use protocol::{CallKind, CallbackId, Message, ResponseError, decode, encode};
pub use transport::{Transport, TransportError};
