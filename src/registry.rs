//! Registries owned by a bridge endpoint.
//!
//! - `handlers` - name to locally registered handler
//! - `pending` - correlation id to the callback awaiting a response

mod handlers;
mod pending;

pub use handlers::{Handler, HandlerRegistry};
pub use pending::{Callback, PendingCallbacks};
