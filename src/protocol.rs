//! Wire protocol shared by both sides of the bridge.
//!
//! ## Module Structure
//!
//! - `message` - Message record exchanged between the two contexts
//! - `callback_id` - CallbackId correlation token
//! - `codec` - JSON + percent-encoding for the text-only channel
//! - `error_response` - Structured error payloads carried in `data`

mod callback_id;
mod codec;
mod error_response;
mod message;

pub use callback_id::CallbackId;
pub use codec::{DecodeError, EVAL_SAFE, EncodeError, decode, encode, eval_command};
pub use error_response::{ErrorCodes, ResponseError};
pub use message::{CallKind, Message};
