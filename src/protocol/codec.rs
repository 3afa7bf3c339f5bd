//! Text codec for the injection channel.
//!
//! A Message is serialized to JSON and then percent-encoded so the result
//! can sit inside a double-quoted string of a remote evaluation command.
//! Decoding reverses both steps and only ever parses structured data; the
//! payload is never evaluated.

use std::borrow::Cow;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use thiserror::Error;

use super::{CallKind, Message};

/// Characters left unescaped: the URL host-allowed ASCII set.
///
/// Everything else, notably `"`, `\`, `%`, whitespace and all non-ASCII
/// bytes, is escaped, which keeps the text inert inside a script string
/// literal and decodable with `decodeURIComponent`.
pub const EVAL_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b'-')
    .remove(b'.')
    .remove(b':')
    .remove(b';')
    .remove(b'=')
    .remove(b'[')
    .remove(b']')
    .remove(b'_')
    .remove(b'~');

/// Failure to turn wire text into a Message.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Percent-decoded bytes were not UTF-8
    #[error("wire text is not valid UTF-8 after percent-decoding")]
    InvalidUtf8,

    /// Not well-formed JSON, or a mandatory field such as `call` is missing
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A `send` message without a non-empty `handlerName`
    #[error("send message is missing handlerName")]
    MissingHandlerName,
}

/// Failure to serialize a Message.
#[derive(Debug, Error)]
#[error("failed to serialize message: {0}")]
pub struct EncodeError(#[from] serde_json::Error);

/// Encode a Message into transport-safe text.
pub fn encode(message: &Message) -> Result<String, EncodeError> {
    let json = serde_json::to_string(message)?;
    Ok(utf8_percent_encode(&json, EVAL_SAFE).to_string())
}

/// Decode transport text produced by [`encode`] (or its script-side twin).
///
/// Text starting with `{` is parsed as plain JSON, as older script-side
/// bootstraps posted it unencoded. Encoded text never starts with `{`
/// because the brace itself is escaped.
pub fn decode(text: &str) -> Result<Message, DecodeError> {
    let json = if text.starts_with('{') {
        Cow::Borrowed(text)
    } else {
        percent_decode_str(text)
            .decode_utf8()
            .map_err(|_| DecodeError::InvalidUtf8)?
    };
    let message: Message = serde_json::from_str(&json)?;

    if message.call == CallKind::Send
        && message.handler_name.as_deref().is_none_or(str::is_empty)
    {
        return Err(DecodeError::MissingHandlerName);
    }

    Ok(message)
}

/// Render the command that hands `encoded` to the script-side `_receive`.
pub fn eval_command(namespace: &str, encoded: &str) -> String {
    format!("{namespace}._receive( JSON.parse( decodeURIComponent( \"{encoded}\" ) ) );")
}
